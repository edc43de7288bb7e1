//! Batch handoff types.
//!
//! A batch travels to the encoder as a [`TileBatch`] carrying a one-shot
//! completion sender, and to the writer as a [`PendingBatch`] carrying the
//! matching receiver. In ordered mode the reader tees the pending half into
//! the writer queue at emission time; in unordered mode the batch carries
//! its own pending half and the encoder forwards it once complete.

use super::error::EncodeError;
use crate::tile::{TileEntry, TileFeatures};
use std::sync::Arc;
use tokio::sync::oneshot;

/// What a completed batch resolves to: entries in input order, or the
/// failure that killed the batch.
pub(crate) type BatchResult = Result<Vec<TileEntry>, EncodeError>;

/// A group of tiles moving through the encoder as a unit.
pub(crate) struct TileBatch {
    /// Input tiles; output entries follow this order exactly.
    pub tiles: Vec<Arc<dyn TileFeatures>>,
    /// Completion handle; the one-shot guarantees at-most-once completion.
    pub done: oneshot::Sender<BatchResult>,
    /// Present in unordered mode only; forwarded to the writer on completion.
    pub pending: Option<PendingBatch>,
}

/// The writer's view of a batch: a future of its entries.
pub(crate) struct PendingBatch {
    pub done: oneshot::Receiver<BatchResult>,
}

impl TileBatch {
    /// Creates an empty batch and, when `carry_pending` is false, hands the
    /// pending half back for the caller to route to the writer itself.
    pub fn new(carry_pending: bool) -> (Self, Option<PendingBatch>) {
        let (done, rx) = oneshot::channel();
        let pending = PendingBatch { done: rx };
        if carry_pending {
            (
                Self {
                    tiles: Vec::new(),
                    done,
                    pending: Some(pending),
                },
                None,
            )
        } else {
            (
                Self {
                    tiles: Vec::new(),
                    done,
                    pending: None,
                },
                Some(pending),
            )
        }
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}
