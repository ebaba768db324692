//! Price derivation rules and line labels
//!
//! `None` from a derivation means no line should exist for that role right now.

use super::style::LineRole;
use crate::trading::{LimitOrder, OverlayFlags, Position, Side};

/// Target price of a position-scoped line
pub fn derive_position_price(role: LineRole, position: &Position, flags: &OverlayFlags) -> Option<f64> {
    let price = match role {
        LineRole::Entry => Some(position.entry_price),
        LineRole::Liquidation => position.liquidation_price,
        LineRole::TakeProfit => position.take_profit_price,
        LineRole::StopLoss => position.stop_loss_price,
        LineRole::BreakEven if flags.show_break_even_line => position.break_even_price,
        LineRole::BreakEven => None,
        LineRole::LimitOrderTrigger | LineRole::LimitOrderLimit => None,
    };
    price.filter(|p| usable_price(*p))
}

/// Target price of an order-scoped line
pub fn derive_order_price(role: LineRole, order: &LimitOrder) -> Option<f64> {
    match role {
        LineRole::LimitOrderTrigger => Some(order.trigger_price).filter(|p| usable_price(*p)),
        // No limit price field upstream yet
        LineRole::LimitOrderLimit => None,
        _ => None,
    }
}

fn usable_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// Render the label shown next to a line.
///
/// The label never takes part in the redraw decision.
pub fn line_label(role: LineRole, side: Side, size_usd: Option<f64>, flags: &OverlayFlags) -> String {
    let base = format!("{} {}", side, role.label_stem());
    match size_usd {
        Some(size) if flags.toggle_size_usd_in_chart && size.is_finite() => {
            format!("{} {}", base, format_size_usd(size))
        }
        _ => base,
    }
}

/// Format a USD amount with thousands separators and cents, e.g. `$12,345.60`
pub fn format_size_usd(size: f64) -> String {
    let cents = (size.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let frac = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if size < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, grouped, frac)
}
