//! Run telemetry: lock-free counters plus the strings built from them.
//!
//! Stage workers receive an [`TelemetryRegistry`] handle at construction and
//! record into it; an external progress logger (or the pipeline's own
//! interval task) polls it for display.

mod format;
mod progress;
mod registry;

pub use format::{format_integer, format_storage};
pub use progress::{last_tile_line, log_zoom_summary};
pub use registry::{TelemetryRegistry, ZoomSummary};
