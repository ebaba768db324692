//! Recorded scenarios for replaying overlay sessions

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::trading::{LimitOrder, OverlayFlags, Position, Side};

/// Which adapter call an injected failure hits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureTarget {
    Create,
    Delete,
}

/// One step of a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ScenarioStep {
    /// Chart widget finished initializing
    Ready,
    /// Chart widget destroyed
    Reset,
    Symbol { symbol: String },
    Positions { positions: Vec<Position> },
    Orders { orders: Vec<LimitOrder> },
    Flags { flags: OverlayFlags },
    Resync,
    FailNext { target: FailureTarget },
}

impl ScenarioStep {
    pub fn describe(&self) -> String {
        match self {
            ScenarioStep::Ready => "chart ready".to_string(),
            ScenarioStep::Reset => "chart reset".to_string(),
            ScenarioStep::Symbol { symbol } => format!("symbol -> {}", symbol),
            ScenarioStep::Positions { positions } => format!("{} positions", positions.len()),
            ScenarioStep::Orders { orders } => format!("{} limit orders", orders.len()),
            ScenarioStep::Flags { flags } => format!(
                "flags break_even={} size_in_label={}",
                flags.show_break_even_line, flags.toggle_size_usd_in_chart
            ),
            ScenarioStep::Resync => "resync".to_string(),
            ScenarioStep::FailNext { target } => format!("fail next {:?}", target).to_lowercase(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    /// Symbol the chart starts on
    #[serde(default)]
    pub symbol: Option<String>,
    pub steps: Vec<ScenarioStep>,
}

impl Scenario {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file: {}", path.as_ref().display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse scenario file: {}", path.as_ref().display()))
    }

    /// Built-in walkthrough of the overlay's main behaviours
    pub fn demo() -> Self {
        let opened = DateTime::<Utc>::from_timestamp(1_714_564_800, 0).unwrap_or_default();
        let position = |liquidation: f64, entry: f64| Position {
            address: "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU".to_string(),
            symbol: "SOL".to_string(),
            side: Side::Long,
            entry_price: entry,
            liquidation_price: Some(liquidation),
            take_profit_price: None,
            stop_loss_price: None,
            break_even_price: Some(entry * 1.0012),
            size_usd: 2_500.0,
            open_time: opened,
        };
        let order = LimitOrder {
            id: 7,
            symbol: "SOL".to_string(),
            side: Side::Short,
            trigger_price: 50.0,
            size_usd: Some(800.0),
        };

        let break_even = OverlayFlags {
            show_break_even_line: true,
            toggle_size_usd_in_chart: false,
        };
        let sized = OverlayFlags {
            show_break_even_line: false,
            toggle_size_usd_in_chart: true,
        };

        Self {
            name: "demo".to_string(),
            symbol: Some("SOL".to_string()),
            steps: vec![
                ScenarioStep::Ready,
                ScenarioStep::Positions {
                    positions: vec![position(80.0, 100.0)],
                },
                ScenarioStep::Positions {
                    positions: vec![position(82.0, 100.0)],
                },
                ScenarioStep::Flags { flags: break_even },
                ScenarioStep::Flags {
                    flags: OverlayFlags::default(),
                },
                ScenarioStep::Orders {
                    orders: vec![order.clone()],
                },
                ScenarioStep::Symbol {
                    symbol: "BTC".to_string(),
                },
                ScenarioStep::Symbol {
                    symbol: "SOL".to_string(),
                },
                ScenarioStep::Flags { flags: sized },
                ScenarioStep::FailNext {
                    target: FailureTarget::Create,
                },
                ScenarioStep::Positions {
                    positions: vec![position(82.0, 101.0)],
                },
                ScenarioStep::Reset,
                ScenarioStep::Ready,
                ScenarioStep::Positions { positions: vec![] },
                ScenarioStep::Orders { orders: vec![] },
            ],
        }
    }
}
