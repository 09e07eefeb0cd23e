//! Cache keys for chunk results.
//!
//! A [`CacheKey`] identifies one materialized chunk: the dataset it came from,
//! the variable, the chunk coordinates and any transform parameters that
//! influenced the result (output format, time slice, ...).
//!
//! # Key Format
//!
//! Keys render as `"{dataset}/{variable}/{c0.c1...}"`, followed by
//! `?{k=v&...}` when transform parameters are present. Example:
//! `"era5/t2m/0.3.12?format=png&time=2020-01-01"`.
//!
//! Parameters are stored sorted by name so that keys built with the same
//! parameters in a different order compare equal and hash identically.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Error parsing a chunk identifier.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyParseError {
    /// The chunk id was empty.
    #[error("Empty chunk id")]
    Empty,

    /// A component of the chunk id was not a non-negative integer.
    #[error("Invalid chunk id '{input}' - expected dot-separated indices like '0.1.2'")]
    InvalidCoordinate { input: String },
}

/// Chunk coordinates within an N-dimensional array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoords(Vec<u64>);

impl ChunkCoords {
    /// Create coordinates from chunk indices.
    pub fn new(indices: impl Into<Vec<u64>>) -> Self {
        Self(indices.into())
    }

    /// Parse a zarr-style chunk id (`"0.1.2"`).
    ///
    /// # Examples
    ///
    /// ```
    /// use chunkcache::cache::ChunkCoords;
    ///
    /// let coords = ChunkCoords::parse("0.1.2").unwrap();
    /// assert_eq!(coords.indices(), &[0, 1, 2]);
    /// assert!(ChunkCoords::parse("0.x").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, KeyParseError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(KeyParseError::Empty);
        }

        s.split('.')
            .map(|part| {
                part.parse::<u64>()
                    .map_err(|_| KeyParseError::InvalidCoordinate {
                        input: s.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// The chunk indices, one per array dimension.
    pub fn indices(&self) -> &[u64] {
        &self.0
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for ChunkCoords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, index) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", index)?;
        }
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct KeyParts {
    dataset: String,
    variable: String,
    coords: ChunkCoords,
    params: Vec<(String, String)>,
}

/// Identifier for one cached chunk result.
///
/// Cheap to clone (shared internally) and immutable once built. The builder
/// methods consume the key and return a new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(Arc<KeyParts>);

impl CacheKey {
    /// Create a key for a chunk of a dataset variable.
    ///
    /// # Arguments
    ///
    /// * `dataset` - Dataset identity (e.g. the dataset id attribute)
    /// * `variable` - Variable name within the dataset
    /// * `coords` - Chunk coordinates
    pub fn chunk(
        dataset: impl Into<String>,
        variable: impl Into<String>,
        coords: ChunkCoords,
    ) -> Self {
        Self(Arc::new(KeyParts {
            dataset: dataset.into(),
            variable: variable.into(),
            coords,
            params: Vec::new(),
        }))
    }

    /// Create a key for an XYZ map tile rendered from a variable.
    ///
    /// The tile position becomes the coordinates `z.x.y`; output format and
    /// optional time slice become transform parameters.
    pub fn tile(
        dataset: impl Into<String>,
        variable: impl Into<String>,
        z: u32,
        x: u32,
        y: u32,
        format: &str,
        time: Option<&str>,
    ) -> Self {
        let key = Self::chunk(
            dataset,
            variable,
            ChunkCoords::new(vec![z as u64, x as u64, y as u64]),
        )
        .with_param("format", format.to_lowercase());

        match time {
            Some(t) => key.with_param("time", t),
            None => key,
        }
    }

    /// Return a new key with a transform parameter set.
    ///
    /// Setting an existing parameter replaces its value.
    pub fn with_param(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        let mut parts = Arc::try_unwrap(self.0).unwrap_or_else(|shared| KeyParts {
            dataset: shared.dataset.clone(),
            variable: shared.variable.clone(),
            coords: shared.coords.clone(),
            params: shared.params.clone(),
        });

        match parts.params.binary_search_by(|(k, _)| k.as_str().cmp(name.as_str())) {
            Ok(pos) => parts.params[pos].1 = value,
            Err(pos) => parts.params.insert(pos, (name, value)),
        }

        Self(Arc::new(parts))
    }

    /// Dataset identity.
    pub fn dataset(&self) -> &str {
        &self.0.dataset
    }

    /// Variable name.
    pub fn variable(&self) -> &str {
        &self.0.variable
    }

    /// Chunk coordinates.
    pub fn coords(&self) -> &ChunkCoords {
        &self.0.coords
    }

    /// Look up a transform parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.0
            .params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// All transform parameters, sorted by name.
    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.0.dataset, self.0.variable, self.0.coords)?;
        for (i, (k, v)) in self.0.params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{}{}={}", sep, k, v)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_parse_chunk_id() {
        assert_eq!(ChunkCoords::parse("0").unwrap().indices(), &[0]);
        assert_eq!(ChunkCoords::parse("3.0.12").unwrap().indices(), &[3, 0, 12]);
        assert_eq!(ChunkCoords::parse(" 1.2 ").unwrap().ndim(), 2);
    }

    #[test]
    fn test_parse_chunk_id_invalid() {
        assert_eq!(ChunkCoords::parse(""), Err(KeyParseError::Empty));
        assert!(ChunkCoords::parse("1..2").is_err());
        assert!(ChunkCoords::parse("-1.0").is_err());
        assert!(ChunkCoords::parse(".zarray").is_err());
    }

    #[test]
    fn test_display_without_params() {
        let key = CacheKey::chunk("era5", "t2m", ChunkCoords::new(vec![0, 3, 12]));
        assert_eq!(key.to_string(), "era5/t2m/0.3.12");
    }

    #[test]
    fn test_params_are_sorted() {
        let a = CacheKey::chunk("ds", "v", ChunkCoords::new(vec![1]))
            .with_param("time", "2020")
            .with_param("format", "png");
        let b = CacheKey::chunk("ds", "v", ChunkCoords::new(vec![1]))
            .with_param("format", "png")
            .with_param("time", "2020");

        assert_eq!(a, b);
        assert_eq!(a.to_string(), "ds/v/1?format=png&time=2020");

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_with_param_replaces_value() {
        let key = CacheKey::chunk("ds", "v", ChunkCoords::new(vec![0]))
            .with_param("format", "png")
            .with_param("format", "jpeg");

        assert_eq!(key.param("format"), Some("jpeg"));
        assert_eq!(key.params().count(), 1);
    }

    #[test]
    fn test_with_param_on_shared_key_leaves_original() {
        let base = CacheKey::chunk("ds", "v", ChunkCoords::new(vec![0]));
        let shared = base.clone();
        let derived = shared.with_param("format", "png");

        assert_eq!(base.param("format"), None);
        assert_eq!(derived.param("format"), Some("png"));
        assert_ne!(base, derived);
    }

    #[test]
    fn test_tile_key() {
        let key = CacheKey::tile("ds", "air", 4, 7, 9, "PNG", Some("2013-01-01"));
        assert_eq!(key.coords().indices(), &[4, 7, 9]);
        assert_eq!(key.param("format"), Some("png"));
        assert_eq!(key.to_string(), "ds/air/4.7.9?format=png&time=2013-01-01");

        let untimed = CacheKey::tile("ds", "air", 4, 7, 9, "png", None);
        assert_eq!(untimed.param("time"), None);
        assert_ne!(key, untimed);
    }

    #[test]
    fn test_different_datasets_differ() {
        let a = CacheKey::chunk("a", "v", ChunkCoords::new(vec![0]));
        let b = CacheKey::chunk("b", "v", ChunkCoords::new(vec![0]));
        assert_ne!(a, b);
    }
}
