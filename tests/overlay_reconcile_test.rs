//! Reconciliation pass tests against the in-memory chart

use chartsync::chart::{ChartAdapter, ChartCall, DrawnShape, MockChart};
use chartsync::overlay::{LabelAlignment, LineReconciler, LineRole, PassInput, PassReport};
use chartsync::trading::{EntityKey, LimitOrder, OverlayFlags, Position, Side};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashSet;

fn opened() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 2, 8, 30, 0).unwrap()
}

fn position(address: &str, symbol: &str, entry: f64, liquidation: Option<f64>) -> Position {
    Position {
        address: address.to_string(),
        symbol: symbol.to_string(),
        side: Side::Long,
        entry_price: entry,
        liquidation_price: liquidation,
        take_profit_price: None,
        stop_loss_price: None,
        break_even_price: None,
        size_usd: 1_000.0,
        open_time: opened(),
    }
}

fn order(id: u64, symbol: &str, trigger: f64) -> LimitOrder {
    LimitOrder {
        id,
        symbol: symbol.to_string(),
        side: Side::Short,
        trigger_price: trigger,
        size_usd: None,
    }
}

fn break_even_on() -> OverlayFlags {
    OverlayFlags {
        show_break_even_line: true,
        toggle_size_usd_in_chart: false,
    }
}

fn pass(
    reconciler: &mut LineReconciler,
    chart: &mut MockChart,
    positions: &[Position],
    orders: &[LimitOrder],
    flags: OverlayFlags,
) -> PassReport {
    let symbol = chart.active_symbol();
    let input = PassInput {
        positions,
        orders,
        flags,
        symbol: &symbol,
        now: now(),
        label_alignment: LabelAlignment::Right,
    };
    reconciler.reconcile(chart, &input).unwrap()
}

fn roles_for(reconciler: &LineReconciler, key: &EntityKey) -> Vec<(LineRole, f64)> {
    reconciler
        .cache()
        .iter()
        .filter(|r| &r.key == key)
        .map(|r| (r.role, r.price()))
        .collect()
}

fn assert_cache_matches_chart(reconciler: &LineReconciler, chart: &MockChart) {
    let mut slots = HashSet::new();
    for record in reconciler.cache().iter() {
        assert!(
            slots.insert((record.key.clone(), record.role)),
            "duplicate record for {} {}",
            record.key,
            record.role
        );
        match chart.shape(&record.handle) {
            Some(DrawnShape::Line { anchor, .. }) => assert_eq!(anchor.price, record.price()),
            other => panic!("record {} points at {:?}", record.handle, other),
        }
    }
    assert_eq!(reconciler.cache().len(), chart.lines().len());
}

#[test]
fn single_long_position_draws_entry_and_liquidation() {
    let mut chart = MockChart::new("SOL");
    let mut reconciler = LineReconciler::new();
    let positions = vec![position("P1", "SOL", 100.0, Some(80.0))];

    let report = pass(&mut reconciler, &mut chart, &positions, &[], OverlayFlags::default());

    assert_eq!(report.created, 2);
    assert_eq!(report.deleted, 0);
    let roles = roles_for(&reconciler, &EntityKey::Position("P1".to_string()));
    assert_eq!(roles, vec![(LineRole::Entry, 100.0), (LineRole::Liquidation, 80.0)]);
    assert_cache_matches_chart(&reconciler, &chart);
}

#[test]
fn changed_liquidation_redraws_only_that_line() {
    let mut chart = MockChart::new("SOL");
    let mut reconciler = LineReconciler::new();
    pass(
        &mut reconciler,
        &mut chart,
        &[position("P1", "SOL", 100.0, Some(80.0))],
        &[],
        OverlayFlags::default(),
    );
    let entry_handle = reconciler
        .cache()
        .get(&EntityKey::Position("P1".to_string()), LineRole::Entry)
        .map(|r| r.handle.clone())
        .unwrap();
    chart.take_calls();

    let report = pass(
        &mut reconciler,
        &mut chart,
        &[position("P1", "SOL", 100.0, Some(82.0))],
        &[],
        OverlayFlags::default(),
    );

    assert_eq!(report.created, 1);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.unchanged, 1);
    let calls = chart.take_calls();
    assert!(matches!(calls[0], ChartCall::Delete { .. }));
    match &calls[1] {
        ChartCall::CreateLine { anchor, .. } => assert_eq!(anchor.price, 82.0),
        other => panic!("unexpected call {:?}", other),
    }
    assert!(calls.iter().all(|c| !matches!(c, ChartCall::Delete { handle } if *handle == entry_handle)));
    assert_cache_matches_chart(&reconciler, &chart);
}

#[test]
fn removed_position_deletes_all_its_lines() {
    let mut chart = MockChart::new("SOL");
    let mut reconciler = LineReconciler::new();
    pass(
        &mut reconciler,
        &mut chart,
        &[position("P1", "SOL", 100.0, Some(80.0))],
        &[],
        OverlayFlags::default(),
    );

    let report = pass(&mut reconciler, &mut chart, &[], &[], OverlayFlags::default());

    assert_eq!(report.deleted, 2);
    assert_eq!(report.created, 0);
    assert!(reconciler.cache().is_empty());
    assert!(chart.lines().is_empty());
}

#[test]
fn order_lines_are_removed_when_symbol_changes() {
    let mut chart = MockChart::new("SOL");
    let mut reconciler = LineReconciler::new();
    let orders = vec![order(7, "SOL", 50.0)];

    let report = pass(&mut reconciler, &mut chart, &[], &orders, OverlayFlags::default());
    assert_eq!(report.created, 1);
    let record = reconciler
        .cache()
        .get(&EntityKey::LimitOrder(7), LineRole::LimitOrderTrigger)
        .unwrap();
    assert_eq!(record.price(), 50.0);
    match chart.shape(&record.handle) {
        Some(DrawnShape::Line { anchor, .. }) => assert_eq!(anchor.time, now().timestamp()),
        other => panic!("unexpected shape {:?}", other),
    }

    chart.set_symbol("BTC");
    let report = pass(&mut reconciler, &mut chart, &[], &orders, OverlayFlags::default());

    assert_eq!(report.deleted, 1);
    assert_eq!(report.created, 0);
    assert!(reconciler.cache().is_empty());
    assert!(chart.lines().is_empty());
}

#[test]
fn disabling_break_even_deletes_exactly_one_line() {
    let mut chart = MockChart::new("SOL");
    let mut reconciler = LineReconciler::new();
    let mut p1 = position("P1", "SOL", 100.0, Some(80.0));
    p1.break_even_price = Some(100.12);
    let positions = vec![p1];

    let report = pass(&mut reconciler, &mut chart, &positions, &[], break_even_on());
    assert_eq!(report.created, 3);
    chart.take_calls();

    let report = pass(&mut reconciler, &mut chart, &positions, &[], OverlayFlags::default());

    assert_eq!(report.deleted, 1);
    assert_eq!(report.created, 0);
    assert_eq!(chart.take_calls().len(), 1);
    assert!(reconciler.cache().iter().all(|r| r.role != LineRole::BreakEven));
    assert_cache_matches_chart(&reconciler, &chart);
}

#[test]
fn identical_inputs_issue_no_calls() {
    let mut chart = MockChart::new("SOL");
    let mut reconciler = LineReconciler::new();
    let mut p1 = position("P1", "SOL", 100.0, Some(80.0));
    p1.take_profit_price = Some(130.0);
    p1.stop_loss_price = Some(90.0);
    let positions = vec![p1, position("P2", "SOL", 95.0, None)];
    let orders = vec![order(7, "SOL", 50.0), order(8, "SOL", 140.0)];

    pass(&mut reconciler, &mut chart, &positions, &orders, OverlayFlags::default());
    chart.take_calls();

    let report = pass(&mut reconciler, &mut chart, &positions, &orders, OverlayFlags::default());

    assert!(report.is_noop());
    assert_eq!(report.unchanged, 7);
    assert!(chart.calls().is_empty());
}

#[test]
fn other_symbols_produce_no_lines() {
    let mut chart = MockChart::new("SOL");
    let mut reconciler = LineReconciler::new();

    let report = pass(
        &mut reconciler,
        &mut chart,
        &[position("P1", "BTC", 60_000.0, Some(50_000.0)), position("P2", "sol", 100.0, None)],
        &[order(7, "ETH", 3_000.0)],
        OverlayFlags::default(),
    );

    assert_eq!(report.created, 1);
    assert_eq!(reconciler.cache().len(), 1);
    assert!(reconciler
        .cache()
        .get(&EntityKey::Position("P2".to_string()), LineRole::Entry)
        .is_some());
}

#[test]
fn break_even_never_cached_while_flag_off() {
    let mut chart = MockChart::new("SOL");
    let mut reconciler = LineReconciler::new();
    let mut p1 = position("P1", "SOL", 100.0, None);
    p1.break_even_price = Some(101.0);

    for _ in 0..3 {
        pass(&mut reconciler, &mut chart, &[p1.clone()], &[], OverlayFlags::default());
        assert!(reconciler.cache().iter().all(|r| r.role != LineRole::BreakEven));
    }
}

#[test]
fn reset_then_pass_creates_everything_fresh() {
    let mut chart = MockChart::new("SOL");
    let mut reconciler = LineReconciler::new();
    let positions = vec![position("P1", "SOL", 100.0, Some(80.0))];
    let orders = vec![order(7, "SOL", 50.0)];
    pass(&mut reconciler, &mut chart, &positions, &orders, OverlayFlags::default());

    chart.reset();
    assert_eq!(reconciler.invalidate(), 3);
    assert!(reconciler.cache().is_empty());
    chart.set_ready(true);
    chart.take_calls();

    let report = pass(&mut reconciler, &mut chart, &positions, &orders, OverlayFlags::default());

    assert_eq!(report.created, 3);
    assert_eq!(report.deleted + report.stale_deletes, 0);
    assert_eq!(chart.delete_count(), 0);
    assert_cache_matches_chart(&reconciler, &chart);
}

#[test]
fn stale_handle_is_dropped_without_failing() {
    let mut chart = MockChart::new("SOL");
    let mut reconciler = LineReconciler::new();
    pass(
        &mut reconciler,
        &mut chart,
        &[position("P1", "SOL", 100.0, Some(80.0))],
        &[],
        OverlayFlags::default(),
    );
    let handle = reconciler
        .cache()
        .get(&EntityKey::Position("P1".to_string()), LineRole::Liquidation)
        .map(|r| r.handle.clone())
        .unwrap();
    assert!(chart.invalidate(&handle));

    let report = pass(
        &mut reconciler,
        &mut chart,
        &[position("P1", "SOL", 100.0, None)],
        &[],
        OverlayFlags::default(),
    );

    assert_eq!(report.stale_deletes, 1);
    assert_eq!(reconciler.cache().len(), 1);
    assert_cache_matches_chart(&reconciler, &chart);
}

#[test]
fn aborted_pass_heals_on_resync() {
    let mut chart = MockChart::new("SOL");
    let mut reconciler = LineReconciler::new();
    let positions = vec![
        position("P1", "SOL", 100.0, Some(80.0)),
        position("P2", "SOL", 90.0, Some(70.0)),
    ];

    chart.fail_after_calls(2);
    let symbol = "SOL".to_string();
    let input = PassInput {
        positions: &positions,
        orders: &[],
        flags: OverlayFlags::default(),
        symbol: &symbol,
        now: now(),
        label_alignment: LabelAlignment::Left,
    };
    assert!(reconciler.reconcile(&mut chart, &input).is_err());

    // Slots handled before the failure keep their lines
    assert_eq!(reconciler.cache().len(), 2);
    assert_cache_matches_chart(&reconciler, &chart);

    let report = reconciler.teardown(&mut chart).unwrap();
    assert_eq!(report.deleted, 2);
    let report = reconciler.reconcile(&mut chart, &input).unwrap();
    assert_eq!(report.created, 4);
    assert_cache_matches_chart(&reconciler, &chart);
}

#[test]
fn limit_order_limit_role_is_never_drawn() {
    let mut chart = MockChart::new("SOL");
    let mut reconciler = LineReconciler::new();

    pass(&mut reconciler, &mut chart, &[], &[order(7, "SOL", 50.0)], OverlayFlags::default());

    assert!(reconciler
        .cache()
        .get(&EntityKey::LimitOrder(7), LineRole::LimitOrderLimit)
        .is_none());
}

#[test]
fn removing_an_order_keeps_position_lines() {
    let mut chart = MockChart::new("SOL");
    let mut reconciler = LineReconciler::new();
    let positions = vec![position("P1", "SOL", 100.0, Some(80.0))];
    pass(&mut reconciler, &mut chart, &positions, &[order(7, "SOL", 50.0)], OverlayFlags::default());
    chart.take_calls();

    let report = pass(&mut reconciler, &mut chart, &positions, &[], OverlayFlags::default());

    assert_eq!(report.deleted, 1);
    assert_eq!(report.unchanged, 2);
    assert!(reconciler.cache().iter().all(|r| r.key.is_position()));
    assert_cache_matches_chart(&reconciler, &chart);
}
