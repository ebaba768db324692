//! Overlay lifecycle controller
//!
//! The host calls [`OverlayController::notify`] whenever positions, orders,
//! flags, or the chart itself change. Each notification runs to completion
//! before the next one is handled, and errors from the chart boundary are
//! turned into the drawing-error callback instead of propagating.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use super::OverlayError;
use super::engine::{LineReconciler, PassInput, PassReport};
use super::persistence::{DrawingStore, RestoreReport, restore_drawings};
use super::style::LabelAlignment;
use crate::chart::ChartAdapter;
use crate::metrics::PassMetrics;
use crate::trading::{LimitOrder, OverlayFlags, Position, Snapshot};

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send>;
type DrawingErrorCallback = Box<dyn FnMut() + Send>;

/// Change notifications accepted by the controller
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayChange {
    PositionsChanged(Vec<Position>),
    OrdersChanged(Vec<LimitOrder>),
    FlagsChanged(OverlayFlags),
    /// The chart switched to another symbol
    SymbolChanged,
    /// The widget finished (re)initializing
    ChartReady,
    /// The widget was destroyed; every handle it issued is invalid
    ChartTornDown,
    /// Delete everything and redraw from scratch
    ResyncRequested,
}

impl OverlayChange {
    pub fn kind(&self) -> &'static str {
        match self {
            OverlayChange::PositionsChanged(_) => "positions",
            OverlayChange::OrdersChanged(_) => "orders",
            OverlayChange::FlagsChanged(_) => "flags",
            OverlayChange::SymbolChanged => "symbol",
            OverlayChange::ChartReady => "ready",
            OverlayChange::ChartTornDown => "torn-down",
            OverlayChange::ResyncRequested => "resync",
        }
    }
}

/// What a notification did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// A pass ran to completion
    Reconciled(PassReport),
    /// The chart is not ready; the snapshot was stored for later
    Deferred,
    /// The cache was emptied after a chart teardown
    CacheCleared { forgotten: usize },
    /// The pass aborted and the drawing-error callback fired
    Failed(String),
}

/// Drives the reconciler from change notifications
pub struct OverlayController<C, S> {
    chart: C,
    store: S,
    reconciler: LineReconciler,
    snapshot: Snapshot,
    ready: bool,
    label_alignment: LabelAlignment,
    clock: Clock,
    on_drawing_error: Option<DrawingErrorCallback>,
    metrics: PassMetrics,
    last_restore: Option<RestoreReport>,
    /// A full redraw is owed to the next pass that can draw
    pending_redraw: bool,
}

impl<C, S> OverlayController<C, S>
where
    C: ChartAdapter,
    S: DrawingStore,
{
    /// Create a controller; the chart counts as not ready until `ChartReady`
    pub fn new(chart: C, store: S) -> Self {
        Self {
            chart,
            store,
            reconciler: LineReconciler::new(),
            snapshot: Snapshot::default(),
            ready: false,
            label_alignment: LabelAlignment::default(),
            clock: Box::new(Utc::now),
            on_drawing_error: None,
            metrics: PassMetrics::default(),
            last_restore: None,
            pending_redraw: false,
        }
    }

    pub fn with_flags(mut self, flags: OverlayFlags) -> Self {
        self.snapshot.flags = flags;
        self
    }

    pub fn with_label_alignment(mut self, label_alignment: LabelAlignment) -> Self {
        self.label_alignment = label_alignment;
        self
    }

    /// Override the time source used to anchor order lines
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + 'static,
    {
        self.clock = Box::new(clock);
        self
    }

    /// Register the callback invoked when a pass fails
    pub fn on_drawing_error<F>(mut self, callback: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.on_drawing_error = Some(Box::new(callback));
        self
    }

    pub fn chart(&self) -> &C {
        &self.chart
    }

    pub fn chart_mut(&mut self) -> &mut C {
        &mut self.chart
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn reconciler(&self) -> &LineReconciler {
        &self.reconciler
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Whether the next drawable pass will tear down and redraw every line
    pub fn has_pending_redraw(&self) -> bool {
        self.pending_redraw
    }

    pub fn metrics(&self) -> &PassMetrics {
        &self.metrics
    }

    pub fn last_restore(&self) -> Option<RestoreReport> {
        self.last_restore
    }

    /// Handle one change notification
    pub fn notify(&mut self, change: OverlayChange) -> NotifyOutcome {
        debug!("Overlay notified: {}", change.kind());

        match change {
            OverlayChange::PositionsChanged(positions) => {
                self.snapshot.positions = positions;
                self.run_pass()
            }
            OverlayChange::OrdersChanged(orders) => {
                self.snapshot.orders = orders;
                self.run_pass()
            }
            OverlayChange::FlagsChanged(flags) => {
                let relabel =
                    flags.toggle_size_usd_in_chart != self.snapshot.flags.toggle_size_usd_in_chart;
                self.snapshot.flags = flags;
                if relabel {
                    self.pending_redraw = true;
                }
                self.run_pass()
            }
            OverlayChange::SymbolChanged => {
                info!("Chart symbol is now {}", self.chart.active_symbol());
                self.run_pass()
            }
            OverlayChange::ChartReady => {
                if !self.chart.is_ready() {
                    warn!("Ready signal while the widget still reports not ready, waiting");
                    return NotifyOutcome::Deferred;
                }
                if !self.ready {
                    self.ready = true;
                    info!("Chart ready on {}", self.chart.active_symbol());
                    let symbol = self.chart.active_symbol();
                    self.last_restore =
                        Some(restore_drawings(&mut self.chart, &mut self.store, &symbol));
                }
                self.run_pass()
            }
            OverlayChange::ChartTornDown => {
                self.ready = false;
                // The next pass starts from an empty cache, labels included
                self.pending_redraw = false;
                let forgotten = self.reconciler.invalidate();
                info!("Chart torn down, {} cached lines dropped", forgotten);
                NotifyOutcome::CacheCleared { forgotten }
            }
            OverlayChange::ResyncRequested => {
                self.pending_redraw = true;
                self.run_pass()
            }
        }
    }

    fn can_draw(&self) -> bool {
        if !self.ready {
            return false;
        }
        if !self.chart.is_ready() {
            warn!("Chart reported not ready, deferring overlay pass");
            return false;
        }
        true
    }

    fn run_pass(&mut self) -> NotifyOutcome {
        if !self.can_draw() {
            return NotifyOutcome::Deferred;
        }
        let result = if self.pending_redraw {
            self.pending_redraw = false;
            self.redraw()
        } else {
            self.reconcile()
        };
        self.finish(result)
    }

    /// Delete every line, then reconcile from an empty cache
    fn redraw(&mut self) -> Result<PassReport, OverlayError> {
        debug!("Redrawing every overlay line");
        let mut report = self.reconciler.teardown(&mut self.chart)?;
        report += self.reconcile()?;
        Ok(report)
    }

    fn reconcile(&mut self) -> Result<PassReport, OverlayError> {
        let symbol = self.chart.active_symbol();
        let input = PassInput {
            positions: &self.snapshot.positions,
            orders: &self.snapshot.orders,
            flags: self.snapshot.flags,
            symbol: &symbol,
            now: (self.clock)(),
            label_alignment: self.label_alignment,
        };
        self.reconciler.reconcile(&mut self.chart, &input)
    }

    fn finish(&mut self, result: Result<PassReport, OverlayError>) -> NotifyOutcome {
        match result {
            Ok(report) => {
                self.metrics.record_pass(&report);
                NotifyOutcome::Reconciled(report)
            }
            Err(err) => {
                error!("Overlay pass aborted: {}", err);
                self.metrics.record_failure();
                if let Some(callback) = self.on_drawing_error.as_mut() {
                    callback();
                }
                NotifyOutcome::Failed(err.to_string())
            }
        }
    }
}
