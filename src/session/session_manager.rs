//! Session Manager hosting an overlay controller
//!
//! Plays the host role: it owns the chart widget (here the in-memory
//! [`MockChart`]), translates scenario steps into chart lifecycle changes and
//! overlay notifications, and reacts to drawing errors.

use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

use crate::chart::{ChartCall, MockChart};
use crate::config::Config;
use crate::metrics::PassMetrics;
use crate::overlay::{DrawingStore, NotifyOutcome, OverlayChange, OverlayController, RestoreReport};

use super::action_channel::{ActionChannel, SessionEvent};
use super::scenario::{FailureTarget, Scenario, ScenarioStep};

/// Session state tracking
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Starting,
    Running,
    Terminated,
}

/// Result of applying one step
#[derive(Debug, Clone, PartialEq)]
pub struct StepLog {
    pub index: usize,
    pub description: String,
    pub outcome: Option<NotifyOutcome>,
    /// Adapter calls issued while handling the step
    pub calls: Vec<ChartCall>,
}

/// Session statistics for monitoring
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub steps_processed: u64,
    pub drawing_errors: u64,
    pub resyncs: u64,
}

/// Everything a finished session reports
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub steps: Vec<StepLog>,
    pub stats: SessionStats,
    pub metrics: PassMetrics,
    pub cached_lines: usize,
    pub drawn_lines: usize,
    pub last_restore: Option<RestoreReport>,
}

type Controller = OverlayController<MockChart, Box<dyn DrawingStore + Send>>;

/// Main session manager
pub struct SessionManager {
    controller: Controller,
    action_channel: ActionChannel,
    state: SessionState,
    stats: SessionStats,
    steps: Vec<StepLog>,
    /// Incremented by the drawing-error callback
    drawing_errors: Arc<AtomicU64>,
    /// Resync automatically after a failed pass
    auto_resync: bool,
}

impl SessionManager {
    /// Create a new SessionManager with a chart that is not yet ready
    pub fn new(config: &Config, store: Box<dyn DrawingStore + Send>) -> Self {
        info!("Creating new SessionManager on {}", config.chart.default_symbol);

        let mut chart = MockChart::new(config.chart.default_symbol.clone());
        chart.set_ready(false);

        let drawing_errors = Arc::new(AtomicU64::new(0));
        let errors = drawing_errors.clone();

        let controller = OverlayController::new(chart, store)
            .with_flags(config.overlay.flags())
            .with_label_alignment(config.chart.label_alignment)
            .on_drawing_error(move || {
                errors.fetch_add(1, Ordering::SeqCst);
            });

        Self {
            controller,
            action_channel: ActionChannel::new(),
            state: SessionState::Starting,
            stats: SessionStats::default(),
            steps: Vec::new(),
            drawing_errors,
            auto_resync: true,
        }
    }

    pub fn with_auto_resync(mut self, enabled: bool) -> Self {
        self.auto_resync = enabled;
        self
    }

    /// Sender half for feeding steps from elsewhere
    pub fn action_channel(&self) -> ActionChannel {
        self.action_channel.clone()
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Queue every step of `scenario`, then process the queue to completion
    pub async fn play(&mut self, scenario: &Scenario) -> Result<SessionSummary> {
        info!("Playing scenario '{}' ({} steps)", scenario.name, scenario.steps.len());

        if let Some(symbol) = &scenario.symbol {
            self.controller.chart_mut().set_symbol(symbol.clone());
        }

        self.action_channel.send_scenario(scenario)?;
        self.run().await
    }

    /// Process events until shutdown
    pub async fn run(&mut self) -> Result<SessionSummary> {
        self.state = SessionState::Running;

        while let Some(event) = self.action_channel.next_event().await {
            match event {
                SessionEvent::Step(step) => self.apply_step(step),
                SessionEvent::ShutdownRequested => {
                    info!("Received shutdown request");
                    break;
                }
            }
        }

        self.state = SessionState::Terminated;
        Ok(self.summary())
    }

    /// Apply one step synchronously
    pub fn apply_step(&mut self, step: ScenarioStep) {
        let index = self.steps.len();
        let description = step.describe();
        let errors_before = self.drawing_errors.load(Ordering::SeqCst);

        let outcome = match step {
            ScenarioStep::Ready => {
                self.controller.chart_mut().set_ready(true);
                Some(self.controller.notify(OverlayChange::ChartReady))
            }
            ScenarioStep::Reset => {
                self.controller.chart_mut().reset();
                Some(self.controller.notify(OverlayChange::ChartTornDown))
            }
            ScenarioStep::Symbol { symbol } => {
                self.controller.chart_mut().set_symbol(symbol);
                Some(self.controller.notify(OverlayChange::SymbolChanged))
            }
            ScenarioStep::Positions { positions } => {
                Some(self.controller.notify(OverlayChange::PositionsChanged(positions)))
            }
            ScenarioStep::Orders { orders } => {
                Some(self.controller.notify(OverlayChange::OrdersChanged(orders)))
            }
            ScenarioStep::Flags { flags } => {
                Some(self.controller.notify(OverlayChange::FlagsChanged(flags)))
            }
            ScenarioStep::Resync => {
                self.stats.resyncs += 1;
                Some(self.controller.notify(OverlayChange::ResyncRequested))
            }
            ScenarioStep::FailNext { target } => {
                let chart = self.controller.chart_mut();
                match target {
                    FailureTarget::Create => chart.fail_next_create(),
                    FailureTarget::Delete => chart.fail_next_delete(),
                }
                None
            }
        };

        self.stats.steps_processed += 1;
        let mut calls = self.controller.chart_mut().take_calls();

        if self.drawing_errors.load(Ordering::SeqCst) > errors_before {
            self.stats.drawing_errors += 1;
            if self.auto_resync {
                warn!("Drawing error on step {}, forcing resync", index);
                self.stats.resyncs += 1;
                let resync = self.controller.notify(OverlayChange::ResyncRequested);
                if let NotifyOutcome::Failed(err) = resync {
                    warn!("Resync after drawing error failed: {}", err);
                }
                calls.extend(self.controller.chart_mut().take_calls());
            }
        }

        self.steps.push(StepLog {
            index,
            description,
            outcome,
            calls,
        });
    }

    fn summary(&self) -> SessionSummary {
        SessionSummary {
            steps: self.steps.clone(),
            stats: self.stats.clone(),
            metrics: self.controller.metrics().clone(),
            cached_lines: self.controller.reconciler().cache().len(),
            drawn_lines: self.controller.chart().lines().len(),
            last_restore: self.controller.last_restore(),
        }
    }
}
