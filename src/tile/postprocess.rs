//! Per-layer post-processing hook.
//!
//! Embedding tools may register a processor per layer name; the encoder
//! invokes it with the tile's zoom and the layer's features just before
//! encoding. Returning `None` keeps the original features; returning an
//! error fails the tile (and with it the batch).

use super::{LayerFeature, TileData};
use std::collections::HashMap;
use thiserror::Error;

/// A registered per-layer hook.
///
/// Called with `(zoom, features)`; must be stateless from the pipeline's
/// perspective since encoder workers invoke it concurrently.
pub type LayerPostProcessor = dyn Fn(u8, Vec<LayerFeature>) -> Result<Option<Vec<LayerFeature>>, PostProcessError>
    + Send
    + Sync;

/// Failure raised by a layer post-processor.
#[derive(Debug, Error)]
#[error("post-processing layer {layer} failed: {message}")]
pub struct PostProcessError {
    pub layer: String,
    pub message: String,
}

impl PostProcessError {
    pub fn new(layer: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            layer: layer.into(),
            message: message.into(),
        }
    }
}

/// Registry of post-processors keyed by layer name.
#[derive(Default)]
pub struct PostProcessorRegistry {
    by_layer: HashMap<String, Box<LayerPostProcessor>>,
}

impl PostProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a processor for one layer, replacing any previous one.
    pub fn register<F>(&mut self, layer: impl Into<String>, processor: F)
    where
        F: Fn(u8, Vec<LayerFeature>) -> Result<Option<Vec<LayerFeature>>, PostProcessError>
            + Send
            + Sync
            + 'static,
    {
        self.by_layer.insert(layer.into(), Box::new(processor));
    }

    pub fn is_empty(&self) -> bool {
        self.by_layer.is_empty()
    }

    /// Runs every registered processor against its layer in `tile`, if
    /// present. A `None` result restores the layer's original features.
    pub fn apply(&self, zoom: u8, tile: &mut TileData) -> Result<(), PostProcessError> {
        if self.by_layer.is_empty() {
            return Ok(());
        }
        let layer_names: Vec<String> = tile.layers().iter().map(|l| l.name.clone()).collect();
        for name in layer_names {
            let Some(processor) = self.by_layer.get(&name) else {
                continue;
            };
            let Some(original) = tile.take_layer_features(&name) else {
                continue;
            };
            match processor(zoom, original.clone())? {
                Some(replacement) => {
                    tile.replace_layer_features(&name, replacement);
                }
                None => {
                    tile.replace_layer_features(&name, original);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile_with_two_layers() -> TileData {
        let mut tile = TileData::new();
        tile.push_layer("water", vec![LayerFeature::new(1, vec![1, 2, 3])]);
        tile.push_layer("roads", vec![LayerFeature::new(2, vec![4, 5])]);
        tile
    }

    #[test]
    fn test_apply_replaces_registered_layer() {
        let mut registry = PostProcessorRegistry::new();
        registry.register("water", |zoom, mut features| {
            assert_eq!(zoom, 9);
            features.push(LayerFeature::new(99, vec![zoom]));
            Ok(Some(features))
        });

        let mut tile = tile_with_two_layers();
        registry.apply(9, &mut tile).unwrap();

        assert_eq!(tile.layers()[0].features.len(), 2);
        assert_eq!(tile.layers()[0].features[1].id, 99);
        // Unregistered layer untouched.
        assert_eq!(tile.layers()[1].features.len(), 1);
    }

    #[test]
    fn test_none_keeps_original_features() {
        let mut registry = PostProcessorRegistry::new();
        registry.register("water", |_zoom, _features| Ok(None));

        let mut tile = tile_with_two_layers();
        let before = tile.clone();
        registry.apply(5, &mut tile).unwrap();
        assert_eq!(tile, before);
    }

    #[test]
    fn test_error_propagates() {
        let mut registry = PostProcessorRegistry::new();
        registry.register("roads", |_zoom, _features| {
            Err(PostProcessError::new("roads", "bad geometry"))
        });

        let mut tile = tile_with_two_layers();
        let err = registry.apply(5, &mut tile).unwrap_err();
        assert_eq!(err.layer, "roads");
    }

    #[test]
    fn test_empty_registry_is_a_no_op() {
        let registry = PostProcessorRegistry::new();
        let mut tile = tile_with_two_layers();
        let before = tile.clone();
        registry.apply(0, &mut tile).unwrap();
        assert_eq!(tile, before);
    }
}
