//! Chart adapter boundary
//!
//! The charting widget is an external, stateful drawing surface. It hands out
//! opaque handles for every shape it draws and has no notion of which
//! position or order a shape belongs to. Everything in this crate talks to it
//! through [`ChartAdapter`].

pub mod mock;

use std::fmt;

use crate::overlay::persistence::SavedShape;
use crate::overlay::style::LineStyle;

pub use mock::{ChartCall, DrawnShape, MockChart};

/// Opaque identifier issued by the chart for a drawn shape.
///
/// Only adapters mint handles; the overlay stores and forwards them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineHandle(String);

impl LineHandle {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Anchor point of a horizontal line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineAnchor {
    /// Unix timestamp in seconds
    pub time: i64,
    pub price: f64,
}

/// Error types for chart widget operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChartError {
    #[error("Stale handle: {0}")]
    StaleHandle(LineHandle),
    #[error("Chart widget is not ready")]
    NotReady,
    #[error("Chart rejected request: {0}")]
    Rejected(String),
}

impl ChartError {
    /// Deleting an already-invalid handle still leaves the line gone
    pub fn is_stale_handle(&self) -> bool {
        matches!(self, ChartError::StaleHandle(_))
    }
}

/// Operations the overlay needs from a charting widget
pub trait ChartAdapter {
    /// Draw a horizontal price line and return its handle
    fn create_horizontal_line(
        &mut self,
        anchor: LineAnchor,
        style: &LineStyle,
        label: &str,
    ) -> Result<LineHandle, ChartError>;

    /// Replay a saved multi-point drawing
    fn create_multipoint_shape(&mut self, shape: &SavedShape) -> Result<LineHandle, ChartError>;

    /// Remove a previously created shape
    fn delete_entity(&mut self, handle: &LineHandle) -> Result<(), ChartError>;

    /// Symbol currently displayed by the widget
    fn active_symbol(&self) -> String;

    fn is_ready(&self) -> bool;
}

impl<C: ChartAdapter + ?Sized> ChartAdapter for Box<C> {
    fn create_horizontal_line(
        &mut self,
        anchor: LineAnchor,
        style: &LineStyle,
        label: &str,
    ) -> Result<LineHandle, ChartError> {
        (**self).create_horizontal_line(anchor, style, label)
    }

    fn create_multipoint_shape(&mut self, shape: &SavedShape) -> Result<LineHandle, ChartError> {
        (**self).create_multipoint_shape(shape)
    }

    fn delete_entity(&mut self, handle: &LineHandle) -> Result<(), ChartError> {
        (**self).delete_entity(handle)
    }

    fn active_symbol(&self) -> String {
        (**self).active_symbol()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}
