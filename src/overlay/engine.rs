//! Reconciliation engine
//!
//! One pass diffs the line cache against the current positions and limit
//! orders and issues the minimal set of create/delete calls. The chart has no
//! update-in-place primitive, so a changed price is a delete followed by a
//! create. Passes are not atomic: when a hard adapter failure aborts a pass,
//! slots handled before it keep their new state and the cache still matches
//! what is drawn.

use std::collections::HashSet;
use std::ops::AddAssign;

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use tracing::{debug, info, warn};

use super::OverlayError;
use super::cache::{LineCache, LineRecord};
use super::pricing::{derive_order_price, derive_position_price, line_label};
use super::style::{LabelAlignment, LineRole, RoleScope, style_for};
use crate::chart::{ChartAdapter, LineAnchor};
use crate::trading::{EntityKey, LimitOrder, OverlayFlags, Position, Side, normalize_symbol, same_symbol};

/// Everything one pass reconciles against
#[derive(Debug, Clone, Copy)]
pub struct PassInput<'a> {
    pub positions: &'a [Position],
    pub orders: &'a [LimitOrder],
    pub flags: OverlayFlags,
    /// Symbol currently displayed by the chart
    pub symbol: &'a str,
    /// Anchor time for order lines
    pub now: DateTime<Utc>,
    pub label_alignment: LabelAlignment,
}

/// Adapter calls issued by a pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub created: usize,
    pub deleted: usize,
    /// Deletes the chart answered with a stale handle
    pub stale_deletes: usize,
    /// Slots whose price matched the cached value
    pub unchanged: usize,
}

impl PassReport {
    pub fn adapter_calls(&self) -> usize {
        self.created + self.deleted + self.stale_deletes
    }

    pub fn is_noop(&self) -> bool {
        self.adapter_calls() == 0
    }
}

impl AddAssign for PassReport {
    fn add_assign(&mut self, other: Self) {
        self.created += other.created;
        self.deleted += other.deleted;
        self.stale_deletes += other.stale_deletes;
        self.unchanged += other.unchanged;
    }
}

/// Desired state of one `(key, role)` slot
struct SlotTarget<'a> {
    key: &'a EntityKey,
    role: LineRole,
    price: Option<f64>,
    anchor_time: i64,
    side: Side,
    size_usd: Option<f64>,
    symbol: &'a str,
}

/// Owns the line cache and keeps it in step with the chart
#[derive(Debug, Default)]
pub struct LineReconciler {
    cache: LineCache,
}

impl LineReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache(&self) -> &LineCache {
        &self.cache
    }

    /// Forget every handle without touching the chart.
    ///
    /// Used when the widget has been torn down and all handles are invalid.
    pub fn invalidate(&mut self) -> usize {
        let forgotten = self.cache.clear().len();
        if forgotten > 0 {
            info!("Line cache cleared, {} handles forgotten", forgotten);
        }
        forgotten
    }

    /// Delete every cached line and empty the cache
    pub fn teardown<C>(&mut self, chart: &mut C) -> Result<PassReport, OverlayError>
    where
        C: ChartAdapter + ?Sized,
    {
        let mut report = PassReport::default();
        for (key, role) in self.cache.slots_where(|_| true) {
            self.delete_slot(chart, &key, role, &mut report)?;
        }
        debug!("Teardown removed {} lines", report.deleted + report.stale_deletes);
        Ok(report)
    }

    /// Run one reconciliation pass
    pub fn reconcile<C>(&mut self, chart: &mut C, input: &PassInput<'_>) -> Result<PassReport, OverlayError>
    where
        C: ChartAdapter + ?Sized,
    {
        let mut report = PassReport::default();

        self.prune_detached(chart, input, &mut report)?;

        if !input.flags.show_break_even_line {
            for (key, role) in self.cache.slots_where(|r| r.role == LineRole::BreakEven) {
                self.delete_slot(chart, &key, role, &mut report)?;
            }
        }

        for position in input
            .positions
            .iter()
            .filter(|p| same_symbol(&p.symbol, input.symbol))
        {
            let key = position.key();
            for role in LineRole::POSITION_ROLES {
                let target = SlotTarget {
                    key: &key,
                    role,
                    price: derive_position_price(role, position, &input.flags),
                    anchor_time: position.open_time.timestamp(),
                    side: position.side,
                    size_usd: Some(position.size_usd),
                    symbol: &position.symbol,
                };
                self.sync_slot(chart, &target, input, &mut report)?;
            }
        }

        let now = input.now.timestamp();
        for order in input
            .orders
            .iter()
            .filter(|o| same_symbol(&o.symbol, input.symbol))
        {
            let key = order.key();
            for role in LineRole::ORDER_ROLES {
                let target = SlotTarget {
                    key: &key,
                    role,
                    price: derive_order_price(role, order),
                    anchor_time: now,
                    side: order.side,
                    size_usd: order.size_usd,
                    symbol: &order.symbol,
                };
                self.sync_slot(chart, &target, input, &mut report)?;
            }
        }

        if !report.is_noop() {
            info!(
                "Overlay pass on {}: {} created, {} deleted, {} stale, {} unchanged",
                input.symbol, report.created, report.deleted, report.stale_deletes, report.unchanged
            );
        }
        Ok(report)
    }

    /// Delete lines whose entity is gone or no longer shown on this symbol
    fn prune_detached<C>(
        &mut self,
        chart: &mut C,
        input: &PassInput<'_>,
        report: &mut PassReport,
    ) -> Result<(), OverlayError>
    where
        C: ChartAdapter + ?Sized,
    {
        let live_positions: HashSet<EntityKey> = input
            .positions
            .iter()
            .filter(|p| same_symbol(&p.symbol, input.symbol))
            .map(Position::key)
            .collect();
        let live_orders: HashSet<EntityKey> = input
            .orders
            .iter()
            .filter(|o| same_symbol(&o.symbol, input.symbol))
            .map(LimitOrder::key)
            .collect();

        let detached = self.cache.slots_where(|record| {
            let live = match record.role.scope() {
                RoleScope::Position => &live_positions,
                RoleScope::LimitOrder => &live_orders,
            };
            !live.contains(&record.key) || !same_symbol(&record.symbol, input.symbol)
        });

        for (key, role) in detached {
            debug!("Pruning detached {} line for {}", role, key);
            self.delete_slot(chart, &key, role, report)?;
        }
        Ok(())
    }

    fn sync_slot<C>(
        &mut self,
        chart: &mut C,
        target: &SlotTarget<'_>,
        input: &PassInput<'_>,
        report: &mut PassReport,
    ) -> Result<(), OverlayError>
    where
        C: ChartAdapter + ?Sized,
    {
        let cached = self.cache.get(target.key, target.role).map(|r| r.value);

        let price = match (target.price, cached) {
            (None, None) => return Ok(()),
            (None, Some(_)) => return self.delete_slot(chart, target.key, target.role, report),
            (Some(price), Some(value)) if value == OrderedFloat(price) => {
                report.unchanged += 1;
                return Ok(());
            }
            (Some(price), _) => price,
        };

        if cached.is_some() {
            self.release_handle(chart, target.key, target.role, report)?;
        }

        let style = style_for(target.role, input.label_alignment);
        let label = line_label(target.role, target.side, target.size_usd, &input.flags);
        let anchor = LineAnchor {
            time: target.anchor_time,
            price,
        };

        match chart.create_horizontal_line(anchor, &style, &label) {
            Ok(handle) => {
                debug!("Drew {} line for {} at {} ({})", target.role, target.key, price, handle);
                self.cache.upsert(LineRecord {
                    key: target.key.clone(),
                    role: target.role,
                    handle,
                    value: OrderedFloat(price),
                    symbol: normalize_symbol(target.symbol),
                });
                report.created += 1;
                Ok(())
            }
            Err(source) => {
                // The old handle, if any, is already gone
                self.cache.remove(target.key, target.role);
                Err(OverlayError::Chart { op: "create", source })
            }
        }
    }

    /// Delete the slot's line and drop its record
    fn delete_slot<C>(
        &mut self,
        chart: &mut C,
        key: &EntityKey,
        role: LineRole,
        report: &mut PassReport,
    ) -> Result<(), OverlayError>
    where
        C: ChartAdapter + ?Sized,
    {
        if self.cache.contains(key, role) {
            self.release_handle(chart, key, role, report)?;
            self.cache.remove(key, role);
        }
        Ok(())
    }

    /// Delete the slot's handle on the chart, leaving the record in place.
    ///
    /// A stale handle counts as deleted. Any other failure leaves the record
    /// untouched so the next pass retries it.
    fn release_handle<C>(
        &mut self,
        chart: &mut C,
        key: &EntityKey,
        role: LineRole,
        report: &mut PassReport,
    ) -> Result<(), OverlayError>
    where
        C: ChartAdapter + ?Sized,
    {
        let Some(record) = self.cache.get(key, role) else {
            return Ok(());
        };

        match chart.delete_entity(&record.handle) {
            Ok(()) => {
                report.deleted += 1;
                Ok(())
            }
            Err(err) if err.is_stale_handle() => {
                warn!("Deleting {} line for {}: {}", role, key, err);
                report.stale_deletes += 1;
                Ok(())
            }
            Err(source) => Err(OverlayError::Chart { op: "delete", source }),
        }
    }
}
