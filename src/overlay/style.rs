//! Line style catalog for position and order price lines

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Semantic purpose of a drawn horizontal price line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LineRole {
    Entry,
    Liquidation,
    TakeProfit,
    StopLoss,
    BreakEven,
    LimitOrderTrigger,
    /// Reserved for a future limit price field; never drawn today
    LimitOrderLimit,
}

/// Which kind of entity a role belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleScope {
    Position,
    LimitOrder,
}

impl LineRole {
    pub const POSITION_ROLES: [LineRole; 5] = [
        LineRole::Entry,
        LineRole::Liquidation,
        LineRole::TakeProfit,
        LineRole::StopLoss,
        LineRole::BreakEven,
    ];

    pub const ORDER_ROLES: [LineRole; 2] = [LineRole::LimitOrderTrigger, LineRole::LimitOrderLimit];

    pub fn scope(self) -> RoleScope {
        match self {
            LineRole::LimitOrderTrigger | LineRole::LimitOrderLimit => RoleScope::LimitOrder,
            _ => RoleScope::Position,
        }
    }

    /// Label template stem, prefixed with the side when rendered
    pub fn label_stem(self) -> &'static str {
        match self {
            LineRole::Entry => "Entry",
            LineRole::Liquidation => "Liq.",
            LineRole::TakeProfit => "TP",
            LineRole::StopLoss => "SL",
            LineRole::BreakEven => "BE",
            LineRole::LimitOrderTrigger => "Limit",
            LineRole::LimitOrderLimit => "Limit Px",
        }
    }
}

impl fmt::Display for LineRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LineRole::Entry => "entry",
            LineRole::Liquidation => "liquidation",
            LineRole::TakeProfit => "take-profit",
            LineRole::StopLoss => "stop-loss",
            LineRole::BreakEven => "break-even",
            LineRole::LimitOrderTrigger => "limit-trigger",
            LineRole::LimitOrderLimit => "limit-limit",
        };
        write!(f, "{}", name)
    }
}

/// RGB color packed as 0xRRGGBB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineColor(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DashPattern {
    Solid,
    Dotted,
    Dashed,
}

/// Horizontal placement of the line label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelAlignment {
    Left,
    #[default]
    Right,
}

impl FromStr for LabelAlignment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(LabelAlignment::Left),
            "right" => Ok(LabelAlignment::Right),
            other => Err(format!("Unknown label alignment: {}", other)),
        }
    }
}

/// Display style handed to the chart adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineStyle {
    pub color: LineColor,
    pub dash: DashPattern,
    pub width: u8,
    pub label_alignment: LabelAlignment,
}

/// Look up the fixed style for a role
pub fn style_for(role: LineRole, label_alignment: LabelAlignment) -> LineStyle {
    let (color, dash, width) = match role {
        LineRole::Entry => (0x3B82F6, DashPattern::Solid, 2),
        LineRole::Liquidation => (0xF97316, DashPattern::Dashed, 1),
        LineRole::TakeProfit => (0x22C55E, DashPattern::Dashed, 1),
        LineRole::StopLoss => (0xEF4444, DashPattern::Dashed, 1),
        LineRole::BreakEven => (0xEAB308, DashPattern::Dotted, 1),
        LineRole::LimitOrderTrigger => (0xA855F7, DashPattern::Dashed, 1),
        LineRole::LimitOrderLimit => (0x94A3B8, DashPattern::Dotted, 1),
    };

    LineStyle {
        color: LineColor(color),
        dash,
        width,
        label_alignment,
    }
}
