//! Tile content model and upstream seams.
//!
//! The pipeline does not ingest raw source data itself; it consumes an
//! ordered stream of per-tile feature groups through the [`FeatureStore`]
//! and [`TileFeatures`] traits and turns each group into a compressed byte
//! blob. The vector-tile byte layout produced by [`TileData::encode`] is a
//! deterministic container: equal inputs always yield equal bytes, which the
//! encoder's adjacent-tile memoization relies on.

mod gzip;
mod postprocess;

pub use gzip::gzip_compress;
pub use postprocess::{LayerPostProcessor, PostProcessError, PostProcessorRegistry};

use crate::coord::TileCoord;
use std::fmt;
use std::sync::Arc;

/// A single feature within a tile layer: a stable id plus the feature's
/// pre-encoded payload (geometry and attributes), opaque to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerFeature {
    pub id: u64,
    pub payload: Vec<u8>,
}

impl LayerFeature {
    pub fn new(id: u64, payload: Vec<u8>) -> Self {
        Self { id, payload }
    }
}

/// A named, ordered list of features.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileLayer {
    pub name: String,
    pub features: Vec<LayerFeature>,
}

/// An in-memory vector tile: ordered layers of features.
///
/// Layer order is preserved through encoding so that two tiles built from
/// identical contents encode to identical bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TileData {
    layers: Vec<TileLayer>,
}

impl TileData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a layer. Layers are encoded in insertion order.
    pub fn push_layer(&mut self, name: impl Into<String>, features: Vec<LayerFeature>) {
        self.layers.push(TileLayer {
            name: name.into(),
            features,
        });
    }

    pub fn layers(&self) -> &[TileLayer] {
        &self.layers
    }

    /// Swaps out one layer's feature list, returning the previous features.
    /// Returns `None` when the layer is not present.
    pub fn replace_layer_features(
        &mut self,
        name: &str,
        features: Vec<LayerFeature>,
    ) -> Option<Vec<LayerFeature>> {
        let layer = self.layers.iter_mut().find(|l| l.name == name)?;
        Some(std::mem::replace(&mut layer.features, features))
    }

    /// Takes one layer's feature list, leaving it empty. Returns `None` when
    /// the layer is not present.
    pub(crate) fn take_layer_features(&mut self, name: &str) -> Option<Vec<LayerFeature>> {
        let layer = self.layers.iter_mut().find(|l| l.name == name)?;
        Some(std::mem::take(&mut layer.features))
    }

    /// Encodes the tile into its canonical byte layout.
    ///
    /// Layout: layer count, then per layer a length-prefixed name, a feature
    /// count, and per feature the id and a length-prefixed payload. All
    /// integers little-endian; no timestamps or other varying state.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_size_hint());
        out.extend_from_slice(&(self.layers.len() as u32).to_le_bytes());
        for layer in &self.layers {
            out.extend_from_slice(&(layer.name.len() as u32).to_le_bytes());
            out.extend_from_slice(layer.name.as_bytes());
            out.extend_from_slice(&(layer.features.len() as u32).to_le_bytes());
            for feature in &layer.features {
                out.extend_from_slice(&feature.id.to_le_bytes());
                out.extend_from_slice(&(feature.payload.len() as u32).to_le_bytes());
                out.extend_from_slice(&feature.payload);
            }
        }
        out
    }

    fn encoded_size_hint(&self) -> usize {
        4 + self
            .layers
            .iter()
            .map(|l| {
                8 + l.name.len()
                    + l.features
                        .iter()
                        .map(|f| 12 + f.payload.len())
                        .sum::<usize>()
            })
            .sum::<usize>()
    }
}

/// Failure raised while assembling a tile's in-memory representation.
#[derive(Debug, Clone)]
pub struct TileBuildError {
    pub message: String,
}

impl TileBuildError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for TileBuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TileBuildError {}

/// The features that fall within one tile, owned by the upstream store.
///
/// `has_same_contents` drives the encoder's adjacent-tile memoization: it
/// must be reflexive, and tiles it reports equal must build to identical
/// bytes.
pub trait TileFeatures: Send + Sync {
    /// The tile this group belongs to.
    fn coord(&self) -> TileCoord;

    /// How many features the built tile will carry, used by the reader's
    /// batch sizing.
    fn num_features_to_emit(&self) -> u64;

    /// How many source features were examined to produce this group, used
    /// for progress accounting.
    fn num_features_processed(&self) -> u64;

    /// Assembles the in-memory tile.
    fn build_tile(&self) -> Result<TileData, TileBuildError>;

    /// Whether this group would build a byte-identical tile to `other`.
    fn has_same_contents(&self, other: &dyn TileFeatures) -> bool;
}

/// An ordered, finite, once-iterable stream of per-tile feature groups.
///
/// Groups must arrive in ascending [`TileCoord`] order; the writer enforces
/// this when ordered output is requested.
pub trait FeatureStore: Send {
    /// Total number of source features, for progress reporting.
    fn num_features(&self) -> u64;

    /// Consumes the store, yielding its tiles in order.
    fn into_iter(self: Box<Self>) -> Box<dyn Iterator<Item = Arc<dyn TileFeatures>> + Send>;
}

/// A tile ready for the archive: its coordinate and compressed bytes.
#[derive(Debug, Clone)]
pub struct TileEntry {
    pub coord: TileCoord,
    pub bytes: Vec<u8>,
}
