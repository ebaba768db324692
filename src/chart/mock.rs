//! In-memory chart widget
//!
//! Records every adapter call, keeps the set of shapes currently drawn, and
//! supports failure injection. Used by tests and by the scenario replay
//! binary in place of a real charting widget.

use std::collections::BTreeMap;

use tracing::debug;

use super::{ChartAdapter, ChartError, LineAnchor, LineHandle};
use crate::overlay::persistence::SavedShape;
use crate::overlay::style::LineStyle;
use crate::trading::normalize_symbol;

/// One adapter call as observed by the mock
#[derive(Debug, Clone, PartialEq)]
pub enum ChartCall {
    CreateLine {
        handle: LineHandle,
        anchor: LineAnchor,
        label: String,
    },
    CreateShape {
        handle: LineHandle,
        name: String,
    },
    Delete {
        handle: LineHandle,
    },
}

/// A shape currently present on the mock chart
#[derive(Debug, Clone, PartialEq)]
pub enum DrawnShape {
    Line {
        anchor: LineAnchor,
        style: LineStyle,
        label: String,
    },
    Drawing {
        name: String,
        text: Option<String>,
    },
}

impl DrawnShape {
    pub fn label(&self) -> Option<&str> {
        match self {
            DrawnShape::Line { label, .. } => Some(label),
            DrawnShape::Drawing { text, .. } => text.as_deref(),
        }
    }

    pub fn price(&self) -> Option<f64> {
        match self {
            DrawnShape::Line { anchor, .. } => Some(anchor.price),
            DrawnShape::Drawing { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureRule {
    NextCreate,
    NextDelete,
    /// Fail once after this many further successful calls
    AfterCalls(usize),
}

/// Mock chart widget
#[derive(Debug, Clone)]
pub struct MockChart {
    symbol: String,
    ready: bool,
    generation: u64,
    next_id: u64,
    shapes: BTreeMap<LineHandle, DrawnShape>,
    calls: Vec<ChartCall>,
    failures: Vec<FailureRule>,
}

impl MockChart {
    /// Create a ready chart displaying `symbol`
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: normalize_symbol(&symbol.into()),
            ready: true,
            generation: 1,
            next_id: 1,
            shapes: BTreeMap::new(),
            calls: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn set_symbol(&mut self, symbol: impl Into<String>) {
        self.symbol = normalize_symbol(&symbol.into());
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Tear the widget down: every shape and handle is gone
    pub fn reset(&mut self) {
        debug!(
            "Mock chart generation {} torn down with {} shapes",
            self.generation,
            self.shapes.len()
        );
        self.shapes.clear();
        self.ready = false;
        self.generation += 1;
    }

    /// Drop a shape without going through the adapter, making its handle stale
    pub fn invalidate(&mut self, handle: &LineHandle) -> bool {
        self.shapes.remove(handle).is_some()
    }

    pub fn fail_next_create(&mut self) {
        self.failures.push(FailureRule::NextCreate);
    }

    pub fn fail_next_delete(&mut self) {
        self.failures.push(FailureRule::NextDelete);
    }

    /// Let `successful` more calls through, then fail the following one
    pub fn fail_after_calls(&mut self, successful: usize) {
        self.failures.push(FailureRule::AfterCalls(successful));
    }

    pub fn calls(&self) -> &[ChartCall] {
        &self.calls
    }

    /// Return and forget the recorded calls
    pub fn take_calls(&mut self) -> Vec<ChartCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn shapes(&self) -> impl Iterator<Item = (&LineHandle, &DrawnShape)> {
        self.shapes.iter()
    }

    pub fn shape(&self, handle: &LineHandle) -> Option<&DrawnShape> {
        self.shapes.get(handle)
    }

    /// Horizontal lines currently drawn
    pub fn lines(&self) -> Vec<&DrawnShape> {
        self.shapes
            .values()
            .filter(|s| matches!(s, DrawnShape::Line { .. }))
            .collect()
    }

    /// Free-hand drawings currently present
    pub fn drawings(&self) -> Vec<&DrawnShape> {
        self.shapes
            .values()
            .filter(|s| matches!(s, DrawnShape::Drawing { .. }))
            .collect()
    }

    pub fn create_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, ChartCall::CreateLine { .. }))
            .count()
    }

    pub fn delete_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, ChartCall::Delete { .. }))
            .count()
    }

    fn check_failure(&mut self, is_create: bool) -> Result<(), ChartError> {
        let mut fired = None;
        for (idx, rule) in self.failures.iter_mut().enumerate() {
            match rule {
                FailureRule::NextCreate if is_create => {
                    fired = Some(idx);
                    break;
                }
                FailureRule::NextDelete if !is_create => {
                    fired = Some(idx);
                    break;
                }
                FailureRule::AfterCalls(0) => {
                    fired = Some(idx);
                    break;
                }
                _ => {}
            }
        }

        if let Some(idx) = fired {
            self.failures.remove(idx);
            return Err(ChartError::Rejected("injected failure".to_string()));
        }

        for rule in self.failures.iter_mut() {
            if let FailureRule::AfterCalls(remaining) = rule {
                *remaining -= 1;
            }
        }
        Ok(())
    }

    fn mint_handle(&mut self) -> LineHandle {
        let handle = LineHandle::new(format!("g{}-{}", self.generation, self.next_id));
        self.next_id += 1;
        handle
    }
}

impl ChartAdapter for MockChart {
    fn create_horizontal_line(
        &mut self,
        anchor: LineAnchor,
        style: &LineStyle,
        label: &str,
    ) -> Result<LineHandle, ChartError> {
        if !self.ready {
            return Err(ChartError::NotReady);
        }
        self.check_failure(true)?;

        let handle = self.mint_handle();
        self.shapes.insert(
            handle.clone(),
            DrawnShape::Line {
                anchor,
                style: *style,
                label: label.to_string(),
            },
        );
        self.calls.push(ChartCall::CreateLine {
            handle: handle.clone(),
            anchor,
            label: label.to_string(),
        });
        Ok(handle)
    }

    fn create_multipoint_shape(&mut self, shape: &SavedShape) -> Result<LineHandle, ChartError> {
        if !self.ready {
            return Err(ChartError::NotReady);
        }
        if shape.points.is_empty() {
            return Err(ChartError::Rejected(format!(
                "shape '{}' has no points",
                shape.name
            )));
        }
        self.check_failure(true)?;

        let handle = self.mint_handle();
        self.shapes.insert(
            handle.clone(),
            DrawnShape::Drawing {
                name: shape.name.clone(),
                text: shape.options.text.clone(),
            },
        );
        self.calls.push(ChartCall::CreateShape {
            handle: handle.clone(),
            name: shape.name.clone(),
        });
        Ok(handle)
    }

    fn delete_entity(&mut self, handle: &LineHandle) -> Result<(), ChartError> {
        self.check_failure(false)?;
        self.calls.push(ChartCall::Delete {
            handle: handle.clone(),
        });
        match self.shapes.remove(handle) {
            Some(_) => Ok(()),
            None => Err(ChartError::StaleHandle(handle.clone())),
        }
    }

    fn active_symbol(&self) -> String {
        self.symbol.clone()
    }

    fn is_ready(&self) -> bool {
        self.ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::style::{LabelAlignment, LineRole, style_for};

    fn anchor(price: f64) -> LineAnchor {
        LineAnchor { time: 0, price }
    }

    #[test]
    fn test_create_and_delete() {
        let mut chart = MockChart::new("sol");
        let style = style_for(LineRole::Entry, LabelAlignment::Right);
        let handle = chart
            .create_horizontal_line(anchor(100.0), &style, "Long Entry")
            .unwrap();

        assert_eq!(chart.active_symbol(), "SOL");
        assert_eq!(chart.lines().len(), 1);
        chart.delete_entity(&handle).unwrap();
        assert!(chart.lines().is_empty());
        assert_eq!(
            chart.delete_entity(&handle),
            Err(ChartError::StaleHandle(handle.clone()))
        );
        assert_eq!(chart.create_count(), 1);
        assert_eq!(chart.delete_count(), 2);
    }

    #[test]
    fn test_reset_invalidates_handles() {
        let mut chart = MockChart::new("SOL");
        let style = style_for(LineRole::Entry, LabelAlignment::Right);
        let old = chart.create_horizontal_line(anchor(1.0), &style, "x").unwrap();

        chart.reset();
        assert!(!chart.is_ready());
        assert_eq!(
            chart.create_horizontal_line(anchor(1.0), &style, "x"),
            Err(ChartError::NotReady)
        );

        chart.set_ready(true);
        let new = chart.create_horizontal_line(anchor(1.0), &style, "x").unwrap();
        assert_ne!(old, new);
        assert!(chart.delete_entity(&old).unwrap_err().is_stale_handle());
    }

    #[test]
    fn test_failure_injection() {
        let mut chart = MockChart::new("SOL");
        let style = style_for(LineRole::Entry, LabelAlignment::Right);

        chart.fail_next_create();
        assert!(matches!(
            chart.create_horizontal_line(anchor(1.0), &style, "x"),
            Err(ChartError::Rejected(_))
        ));
        assert!(chart.create_horizontal_line(anchor(1.0), &style, "x").is_ok());

        chart.fail_after_calls(1);
        assert!(chart.create_horizontal_line(anchor(2.0), &style, "y").is_ok());
        assert!(chart.create_horizontal_line(anchor(3.0), &style, "z").is_err());
        assert!(chart.create_horizontal_line(anchor(3.0), &style, "z").is_ok());
    }
}
