//! Tilepress - streaming vector-tile assembly and archive writing
//!
//! This library takes an ordered stream of per-tile feature groups, encodes
//! each group into a gzip-compressed vector tile on a pool of workers, and
//! appends the results to an mbtiles archive in strict tile order.
//!
//! # High-Level API
//!
//! ```ignore
//! use tilepress::archive::{MbtilesArchive, TilesetInfo};
//! use tilepress::config::PipelineConfig;
//! use tilepress::pipeline::run_pipeline;
//! use tilepress::tile::PostProcessorRegistry;
//!
//! let config = PipelineConfig::default();
//! let archive = MbtilesArchive::open("output.mbtiles")?;
//!
//! // `store` is any FeatureStore producing tiles in ascending coord order.
//! let summary = run_pipeline(
//!     store,
//!     Box::new(archive),
//!     PostProcessorRegistry::new(),
//!     TilesetInfo::default(),
//!     config,
//! )
//! .await?;
//! println!("wrote {} tiles", summary.tiles_written);
//! ```

pub mod archive;
pub mod config;
pub mod coord;
pub mod logging;
pub mod pipeline;
pub mod telemetry;
pub mod tile;

/// Version of the tilepress library.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
