//! Chart overlay reconciliation
//!
//! Keeps horizontal price lines for positions and limit orders in step with
//! the upstream entity sets, restores user drawings on chart init, and reacts
//! to chart lifecycle changes.

pub mod cache;
pub mod engine;
pub mod lifecycle;
pub mod persistence;
pub mod pricing;
pub mod style;

use crate::chart::ChartError;

pub use cache::{LineCache, LineRecord};
pub use engine::{LineReconciler, PassInput, PassReport};
pub use lifecycle::{NotifyOutcome, OverlayChange, OverlayController};
pub use persistence::{DrawingStore, FileDrawingStore, MemoryDrawingStore, RestoreReport, SavedShape};
pub use style::{LabelAlignment, LineRole, LineStyle};

/// Error types for overlay operations
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("Chart {op} failed: {source}")]
    Chart {
        op: &'static str,
        #[source]
        source: ChartError,
    },
    #[error("Corrupted drawings: {0}")]
    CorruptDrawings(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
