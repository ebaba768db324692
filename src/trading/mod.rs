//! Trading entities consumed by the overlay engine
//!
//! Positions and limit orders are produced upstream. The engine only reads
//! snapshots of them and never mutates their sources.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position or order direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "Long"),
            Side::Short => write!(f, "Short"),
        }
    }
}

/// Logical identity a chart line is anchored to.
///
/// Positions are keyed by their on-chain address, limit orders by their
/// numeric id. The two namespaces can never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKey {
    Position(String),
    LimitOrder(u64),
}

impl EntityKey {
    pub fn is_position(&self) -> bool {
        matches!(self, EntityKey::Position(_))
    }

    pub fn is_limit_order(&self) -> bool {
        matches!(self, EntityKey::LimitOrder(_))
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Position(address) => write!(f, "{}", address),
            EntityKey::LimitOrder(id) => write!(f, "limit-{}", id),
        }
    }
}

/// Open position snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Unique on-chain address
    pub address: String,
    /// Token symbol the position trades
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    #[serde(default)]
    pub liquidation_price: Option<f64>,
    #[serde(default)]
    pub take_profit_price: Option<f64>,
    #[serde(default)]
    pub stop_loss_price: Option<f64>,
    #[serde(default)]
    pub break_even_price: Option<f64>,
    /// Position size in USD
    pub size_usd: f64,
    pub open_time: DateTime<Utc>,
}

impl Position {
    pub fn key(&self) -> EntityKey {
        EntityKey::Position(self.address.clone())
    }
}

/// Pending limit order snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitOrder {
    pub id: u64,
    pub symbol: String,
    pub side: Side,
    pub trigger_price: f64,
    #[serde(default)]
    pub size_usd: Option<f64>,
}

impl LimitOrder {
    pub fn key(&self) -> EntityKey {
        EntityKey::LimitOrder(self.id)
    }
}

/// Display flags that shape which lines exist and how they are labelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayFlags {
    pub show_break_even_line: bool,
    pub toggle_size_usd_in_chart: bool,
}

/// Latest upstream state as last reported to the overlay
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub positions: Vec<Position>,
    pub orders: Vec<LimitOrder>,
    pub flags: OverlayFlags,
}

/// Normalize a token symbol for comparison
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}

/// Case-insensitive symbol comparison ignoring surrounding whitespace
pub fn same_symbol(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_keys_never_collide() {
        let position = EntityKey::Position("limit-7".to_string());
        let order = EntityKey::LimitOrder(7);
        assert_ne!(position, order);
        assert_eq!(order.to_string(), "limit-7");
        assert!(order.is_limit_order());
        assert!(position.is_position());
    }

    #[test]
    fn test_symbol_matching() {
        assert!(same_symbol("sol", "SOL"));
        assert!(same_symbol(" SOL ", "sol"));
        assert!(!same_symbol("SOL", "BTC"));
        assert_eq!(normalize_symbol(" eth "), "ETH");
    }

    #[test]
    fn test_position_deserialization_defaults() {
        let json = r#"{
            "address": "P1",
            "symbol": "SOL",
            "side": "long",
            "entry_price": 100.0,
            "size_usd": 250.0,
            "open_time": "2024-05-01T12:00:00Z"
        }"#;
        let position: Position = serde_json::from_str(json).unwrap();
        assert_eq!(position.side, Side::Long);
        assert_eq!(position.liquidation_price, None);
        assert_eq!(position.key(), EntityKey::Position("P1".to_string()));
    }
}
