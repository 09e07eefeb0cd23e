//! Request-to-key translation for the serving layer.
//!
//! HTTP routing is left to the host application. These types turn the path
//! and query pieces it extracts into [`CacheKey`]s, so that every route keys
//! the cache the same way.
//!
//! # Example
//!
//! ```
//! use chunkcache::serving::{ChunkRequest, TileRequest};
//!
//! let chunk = ChunkRequest::parse("era5", "t2m/0.3.12").unwrap();
//! assert_eq!(chunk.key().to_string(), "era5/t2m/0.3.12");
//!
//! let tile = TileRequest::new("t2m", 4, 8, 5).with_time("2020-01-01");
//! assert_eq!(
//!     tile.key("era5").to_string(),
//!     "era5/t2m/4.8.5?format=png&time=2020-01-01"
//! );
//! ```

use thiserror::Error;

use crate::cache::{CacheKey, ChunkCoords, KeyParseError};

/// Zarr metadata documents that share the `{var}/{name}` path shape with
/// chunk requests but are never cached chunk results.
pub const METADATA_KEYS: [&str; 4] = [".zarray", ".zattrs", ".zgroup", ".zmetadata"];

/// Default tile image format.
pub const DEFAULT_TILE_FORMAT: &str = "png";

/// Default dataset coordinate labels for tile bounds.
pub const DEFAULT_X_LABEL: &str = "x";
pub const DEFAULT_Y_LABEL: &str = "y";

/// Errors translating a request into a cache key.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    /// The path names a metadata document, not a chunk.
    #[error("'{path}' is a metadata request, not a chunk")]
    Metadata { path: String },

    /// The path does not have the `{variable}/{chunk}` shape.
    #[error("Malformed chunk path '{path}' - expected '{{variable}}/{{chunk}}'")]
    MalformedPath { path: String },

    /// The chunk component could not be parsed.
    #[error(transparent)]
    InvalidChunk(#[from] KeyParseError),
}

/// A request for one encoded zarr chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRequest {
    dataset_id: String,
    variable: String,
    coords: ChunkCoords,
}

impl ChunkRequest {
    /// Parse a `{variable}/{chunk}` path, e.g. `"t2m/0.3.12"`.
    ///
    /// The variable may itself contain `/` (nested groups); the chunk id is
    /// always the last component.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Metadata`] for `.zarray`, `.zattrs`, `.zgroup` and
    ///   `.zmetadata` paths
    /// - [`RequestError::MalformedPath`] if there is no variable component
    /// - [`RequestError::InvalidChunk`] if the chunk id is not numeric
    pub fn parse(dataset_id: impl Into<String>, path: &str) -> Result<Self, RequestError> {
        let trimmed = path.trim_matches('/');

        let (variable, chunk) = match trimmed.rsplit_once('/') {
            Some((variable, chunk)) => (variable, chunk),
            None => (trimmed, ""),
        };

        if is_metadata(chunk) || is_metadata(variable) {
            return Err(RequestError::Metadata {
                path: path.to_string(),
            });
        }

        if variable.is_empty() || chunk.is_empty() {
            return Err(RequestError::MalformedPath {
                path: path.to_string(),
            });
        }

        Ok(Self {
            dataset_id: dataset_id.into(),
            variable: variable.to_string(),
            coords: ChunkCoords::parse(chunk)?,
        })
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn coords(&self) -> &ChunkCoords {
        &self.coords
    }

    /// Cache key for this chunk.
    pub fn key(&self) -> CacheKey {
        CacheKey::chunk(
            self.dataset_id.as_str(),
            self.variable.as_str(),
            self.coords.clone(),
        )
    }
}

fn is_metadata(component: &str) -> bool {
    METADATA_KEYS.contains(&component)
}

/// A request for one rendered XYZ map tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRequest {
    pub variable: String,
    pub z: u32,
    pub x: u32,
    pub y: u32,
    /// Image format, case-insensitive.
    pub format: String,
    /// Time slice for time-varying datasets.
    pub time: Option<String>,
    /// Dataset coordinate label used as the tile x axis.
    pub x_label: String,
    /// Dataset coordinate label used as the tile y axis.
    pub y_label: String,
}

impl TileRequest {
    /// Create a request with the default format and coordinate labels.
    pub fn new(variable: impl Into<String>, z: u32, x: u32, y: u32) -> Self {
        Self {
            variable: variable.into(),
            z,
            x,
            y,
            format: DEFAULT_TILE_FORMAT.to_string(),
            time: None,
            x_label: DEFAULT_X_LABEL.to_string(),
            y_label: DEFAULT_Y_LABEL.to_string(),
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.time = Some(time.into());
        self
    }

    pub fn with_labels(mut self, x_label: impl Into<String>, y_label: impl Into<String>) -> Self {
        self.x_label = x_label.into();
        self.y_label = y_label.into();
        self
    }

    /// Cache key for this tile.
    ///
    /// Coordinate labels only appear in the key when they differ from the
    /// defaults, so the common case keeps short keys.
    pub fn key(&self, dataset_id: &str) -> CacheKey {
        let mut key = CacheKey::tile(
            dataset_id,
            self.variable.as_str(),
            self.z,
            self.x,
            self.y,
            &self.format,
            self.time.as_deref(),
        );

        if self.x_label != DEFAULT_X_LABEL {
            key = key.with_param("xlab", self.x_label.as_str());
        }
        if self.y_label != DEFAULT_Y_LABEL {
            key = key.with_param("ylab", self.y_label.as_str());
        }
        key
    }
}
