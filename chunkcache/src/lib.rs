//! chunkcache - Bounded, cost-aware caching for lazily computed array chunks
//!
//! A server publishing large multidimensional datasets computes chunk
//! payloads (encoded zarr chunks, rendered map tiles) on demand. This library
//! keeps the expensive results in memory under a byte budget and makes sure
//! concurrent requests for the same chunk only compute it once.
//!
//! # High-Level API
//!
//! The [`gateway`] module is the entry point for request handlers:
//!
//! ```
//! use bytes::Bytes;
//! use chunkcache::gateway::ComputeGateway;
//! use chunkcache::serving::ChunkRequest;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = ComputeGateway::with_capacity(256 * 1024 * 1024)?;
//!
//! let request = ChunkRequest::parse("air_temperature", "air/0.0.0")?;
//! let chunk = gateway
//!     .fetch(request.key(), || async {
//!         // Slice, encode and compress the chunk here.
//!         Ok::<_, std::io::Error>(Bytes::from_static(b"encoded chunk"))
//!     })
//!     .await?;
//! # assert_eq!(chunk.len(), 13);
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`cache`] - keys, cost model and the bounded [`cache::Store`]
//! - [`gateway`] - cache-or-compute with single-flight de-duplication
//! - [`serving`] - request path to cache key translation
//! - [`config`] - `~/.chunkcache/config.ini` handling
//! - [`logging`] - tracing subscriber setup

pub mod cache;
pub mod config;
pub mod gateway;
pub mod logging;
pub mod serving;

/// Version of the chunkcache library and CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
