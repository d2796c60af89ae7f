use chrono::{TimeZone, Utc};
use pairstream::alert::{AlertRegistry, AlertSpec, Operator};
use pairstream::analytics::engine::{AnalyticsResult, SpreadPoint};

fn spec(symbol_x: &str, symbol_y: &str, operator: Operator, threshold: f64) -> AlertSpec {
    AlertSpec {
        symbol_x: symbol_x.to_string(),
        symbol_y: symbol_y.to_string(),
        metric: "zscore".to_string(),
        operator,
        threshold,
        message: Some("pair dislocated".to_string()),
    }
}

/// Analytics result whose only relevant feature is the latest z-score.
fn result_with_z(z_scores: &[f64]) -> AnalyticsResult {
    let t0 = Utc.with_ymd_and_hms(2024, 5, 17, 9, 0, 0).unwrap();
    AnalyticsResult {
        hedge_ratio: 1.0,
        hedge_r2: 1.0,
        correlation: 0.9,
        spread: z_scores
            .iter()
            .enumerate()
            .map(|(i, &z)| SpreadPoint {
                time: t0 + chrono::Duration::minutes(i as i64),
                spread: z,
                z_score: z,
            })
            .collect(),
        rolling_correlation: Vec::new(),
    }
}

#[test]
fn add_assigns_monotonic_ids_from_one() {
    let mut registry = AlertRegistry::new();
    let a = registry.add(spec("BTCUSDT", "ETHUSDT", Operator::Gt, 2.0));
    let b = registry.add(spec("BTCUSDT", "ETHUSDT", Operator::Lt, -2.0));
    assert_eq!(a.id, 1);
    assert_eq!(b.id, 2);
    assert!(a.active);

    // A removed id is never reused.
    registry.remove(2);
    let c = registry.add(spec("BTCUSDT", "ETHUSDT", Operator::Gte, 1.5));
    assert_eq!(c.id, 3);
}

#[test]
fn list_returns_snapshot_in_insertion_order() {
    let mut registry = AlertRegistry::new();
    registry.add(spec("BTCUSDT", "ETHUSDT", Operator::Gt, 2.0));
    registry.add(spec("SOLUSDT", "ETHUSDT", Operator::Lt, -1.0));
    let rules = registry.list();
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0].id, 1);
    assert_eq!(rules[1].id, 2);
    assert_eq!(rules[1].symbol_x, "SOLUSDT");
}

#[test]
fn remove_unknown_id_is_a_noop() {
    let mut registry = AlertRegistry::new();
    registry.add(spec("BTCUSDT", "ETHUSDT", Operator::Gt, 2.0));
    registry.remove(99);
    assert_eq!(registry.list().len(), 1);

    registry.remove(1);
    assert!(registry.list().is_empty());
    registry.remove(1);
    assert!(registry.list().is_empty());
}

#[test]
fn evaluate_fires_on_threshold_crossing() {
    let mut registry = AlertRegistry::new();
    registry.add(spec("BTCUSDT", "ETHUSDT", Operator::Gt, 2.0));

    let triggers = registry.evaluate(&result_with_z(&[0.1, 2.5]), "BTCUSDT", "ETHUSDT");
    assert_eq!(triggers.len(), 1);
    assert!((triggers[0].current_value - 2.5).abs() < f64::EPSILON);
    assert_eq!(triggers[0].rule.id, 1);

    let triggers = registry.evaluate(&result_with_z(&[2.5, 1.9]), "BTCUSDT", "ETHUSDT");
    assert!(triggers.is_empty());
}

#[test]
fn evaluate_uses_only_the_latest_z_score() {
    let mut registry = AlertRegistry::new();
    registry.add(spec("BTCUSDT", "ETHUSDT", Operator::Gt, 2.0));
    // Earlier points cross the threshold but the latest does not.
    let triggers = registry.evaluate(&result_with_z(&[3.0, 4.0, 0.5]), "BTCUSDT", "ETHUSDT");
    assert!(triggers.is_empty());
}

#[test]
fn empty_spread_never_triggers() {
    let mut registry = AlertRegistry::new();
    registry.add(spec("BTCUSDT", "ETHUSDT", Operator::Lte, 100.0));
    let triggers = registry.evaluate(&result_with_z(&[]), "BTCUSDT", "ETHUSDT");
    assert!(triggers.is_empty());
}

#[test]
fn pair_matching_is_case_normalized_and_exact() {
    let mut registry = AlertRegistry::new();
    registry.add(spec("btcusdt", "ethusdt", Operator::Gt, 1.0));

    let hit = registry.evaluate(&result_with_z(&[2.0]), "BTCUSDT", "ETHUSDT");
    assert_eq!(hit.len(), 1);

    // Swapped pair does not match.
    let miss = registry.evaluate(&result_with_z(&[2.0]), "ETHUSDT", "BTCUSDT");
    assert!(miss.is_empty());
}

#[test]
fn all_operators_compare_as_documented() {
    let cases = [
        (Operator::Gt, 2.0, 2.5, true),
        (Operator::Gt, 2.0, 2.0, false),
        (Operator::Lt, -2.0, -2.5, true),
        (Operator::Lt, -2.0, -2.0, false),
        (Operator::Gte, 2.0, 2.0, true),
        (Operator::Lte, 2.0, 2.0, true),
        (Operator::Eq, 1.5, 1.5, true),
        (Operator::Eq, 1.5, 1.50001, false),
    ];
    for (operator, threshold, z, expected) in cases {
        let mut registry = AlertRegistry::new();
        registry.add(spec("BTCUSDT", "ETHUSDT", operator, threshold));
        let triggers = registry.evaluate(&result_with_z(&[z]), "BTCUSDT", "ETHUSDT");
        assert_eq!(
            triggers.len() == 1,
            expected,
            "{:?} {} vs z {}",
            operator,
            threshold,
            z
        );
    }
}

#[test]
fn missing_message_gets_a_default() {
    let mut registry = AlertRegistry::new();
    let rule = registry.add(AlertSpec {
        symbol_x: "BTCUSDT".to_string(),
        symbol_y: "ETHUSDT".to_string(),
        metric: "zscore".to_string(),
        operator: Operator::Gte,
        threshold: 2.0,
        message: None,
    });
    assert_eq!(rule.message, "zscore gte 2");
}

#[test]
fn every_evaluation_refires_independently() {
    let mut registry = AlertRegistry::new();
    registry.add(spec("BTCUSDT", "ETHUSDT", Operator::Gt, 1.0));
    let result = result_with_z(&[2.0]);
    for _ in 0..3 {
        assert_eq!(registry.evaluate(&result, "BTCUSDT", "ETHUSDT").len(), 1);
    }
}
