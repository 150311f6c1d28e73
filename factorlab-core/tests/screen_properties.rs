//! Scoring properties checked against hand-computed values.
//!
//! 1. Momentum omits series that cannot reach back a full window
//! 2. Momentum is a per-ticker ratio, independent of price level
//! 3. RSI signal branch boundaries at exactly 30 and 70
//! 4. An empty fundamental snapshot scores 0.44
//! 5. Worked composite example: 0.565
//! 6. Ranker idempotence and truncation
//! 7. A ScoreBreakdown recomputes to its stored composite

use chrono::NaiveDate;
use factorlab_core::domain::{Bar, FundamentalSnapshot, PriceSeries, TickerMap};
use factorlab_core::scoring::{
    composite, fundamental, fundamental_of, momentum, momentum_detailed, rank, rank_map,
    rsi_signal, technical, Omission, ScoreBreakdown, Weights,
};

// ── Helpers ─────────────────────────────────────────────────────────

const EPS: f64 = 1e-12;

fn approx(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < EPS,
        "expected {expected}, got {actual}"
    );
}

fn series(ticker: &str, closes: &[f64]) -> PriceSeries {
    let base = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            date: base + chrono::Duration::days(i as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000,
        })
        .collect();
    PriceSeries::new(ticker, bars)
}

fn universe(entries: &[(&str, &[f64])]) -> TickerMap<PriceSeries> {
    entries
        .iter()
        .map(|(t, closes)| (t.to_string(), series(t, closes)))
        .collect()
}

fn map(entries: &[(&str, f64)]) -> TickerMap<f64> {
    entries.iter().map(|(t, v)| (t.to_string(), *v)).collect()
}

// ── 1. Momentum omission ────────────────────────────────────────────

#[test]
fn momentum_omits_series_shorter_than_window() {
    let window = 5;
    let data = universe(&[
        ("SHORT", &[1.0, 2.0, 3.0]),
        ("EXACT", &[1.0, 2.0, 3.0, 4.0, 5.0]),
        ("ENOUGH", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
    ]);
    let scored = momentum_detailed(&data, window);

    assert!(!scored.scores.contains_key("SHORT"));
    assert!(!scored.scores.contains_key("EXACT"));
    approx(scored.scores["ENOUGH"], 5.0);
    assert_eq!(
        scored.omitted["SHORT"],
        Omission::InsufficientHistory { bars: 3, required: 6 }
    );
    assert_eq!(scored.omitted.len(), 2);
}

#[test]
fn empty_universe_gives_empty_momentum() {
    assert!(momentum(&TickerMap::new(), 30).is_empty());
}

// ── 2. Momentum values ──────────────────────────────────────────────

#[test]
fn momentum_worked_examples() {
    let data = universe(&[("UP", &[100.0, 110.0]), ("DOWN", &[50.0, 45.0])]);
    let m = momentum(&data, 1);
    approx(m["UP"], 0.10);
    approx(m["DOWN"], -0.10);
}

#[test]
fn momentum_uses_window_endpoints_only() {
    // Path between the endpoints is irrelevant.
    let data = universe(&[
        ("SMOOTH", &[10.0, 11.0, 12.0, 13.0]),
        ("JAGGED", &[10.0, 30.0, 1.0, 13.0]),
    ]);
    let m = momentum(&data, 3);
    approx(m["SMOOTH"], m["JAGGED"]);
    approx(m["SMOOTH"], 0.3);
}

// ── 3. RSI boundaries ───────────────────────────────────────────────

#[test]
fn rsi_signal_lower_boundary_is_inclusive() {
    approx(rsi_signal(30.0), -0.4);
    approx(rsi_signal(29.999), 0.5);
}

#[test]
fn rsi_signal_upper_boundary_is_inclusive() {
    approx(rsi_signal(70.0), 0.4);
    approx(rsi_signal(70.001), -0.3);
}

#[test]
fn technical_on_short_history_keeps_only_defined_terms() {
    // 15 bars: RSI(14) is defined, SMA(20) and SMA(50) are not.
    let closes: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
    let data = universe(&[("T", &closes)]);
    let t = technical(&data);
    let b = &t["T"];

    assert!(b.indicators.sma_20.is_none());
    assert!(b.indicators.sma_50.is_none());
    assert!(b.signals.sma20_signal.is_none());
    assert!(b.signals.rsi_signal.is_some());
    // Monotone gains: RSI 100, overbought.
    approx(b.signals.rsi_signal.unwrap(), -0.3);
}

// ── 4. Fundamental defaults ─────────────────────────────────────────

#[test]
fn empty_snapshot_scores_044() {
    let b = fundamental_of(&FundamentalSnapshot::default());
    approx(b.composite, 0.3 * 0.5 + 0.3 * 0.3 + 0.2 * 0.5 + 0.2 * 0.5);
    approx(b.composite, 0.44);
}

#[test]
fn fundamental_covers_every_snapshot_ticker() {
    let mut snaps = TickerMap::new();
    snaps.insert("A".to_string(), FundamentalSnapshot::default());
    snaps.insert(
        "B".to_string(),
        FundamentalSnapshot {
            pe_ratio: Some(17.5),
            dividend_yield: Some(5.0),
            price_to_book: Some(0.8),
            roe: Some(20.0),
            ..Default::default()
        },
    );
    let f = fundamental(&snaps);
    assert_eq!(f.len(), 2);
    // pe 17.5 is the midpoint of [10, 25]: 1.0; yield >= 4: 1.0; pb < 1: 1.0; roe >= 15: 1.0.
    approx(f["B"].composite, 1.0);
}

// ── 5. Composite worked example ─────────────────────────────────────

#[test]
fn composite_worked_example() {
    let out = composite(
        &map(&[("X", 0.2)]),
        &map(&[("X", 0.0)]),
        &map(&[("X", 0.6)]),
        &Weights::default(),
    );
    let x = &out["X"];
    approx(x.norm_momentum, 0.6);
    approx(x.norm_technical, 0.5);
    approx(x.composite, 0.565);
}

#[test]
fn composite_scores_union_of_factor_maps() {
    let out = composite(
        &map(&[("M", 0.1)]),
        &map(&[("T", 0.2)]),
        &map(&[("F", 0.3)]),
        &Weights::default(),
    );
    let keys: Vec<&str> = out.keys().map(String::as_str).collect();
    assert_eq!(keys, ["F", "M", "T"]);
    // Missing factors contribute raw 0 before normalisation.
    approx(out["F"].momentum, 0.0);
    approx(out["F"].norm_momentum, 0.5);
}

// ── 6. Ranker ───────────────────────────────────────────────────────

#[test]
fn ranker_is_idempotent() {
    let first = rank_map(&map(&[("A", 0.3), ("B", 0.9), ("C", 0.5), ("D", 0.5)]), 3);
    let again = rank(first.iter().map(|e| (e.ticker.clone(), e.score)), 3);
    assert_eq!(first, again);
}

#[test]
fn ranker_truncation() {
    let scores = map(&[("A", 0.1), ("B", 0.3), ("C", 0.2)]);

    let all = rank_map(&scores, 10);
    let tickers: Vec<&str> = all.iter().map(|e| e.ticker.as_str()).collect();
    assert_eq!(tickers, ["B", "C", "A"]);

    assert!(rank_map(&scores, 0).is_empty());
}

// ── 7. Breakdown round trip ─────────────────────────────────────────

#[test]
fn breakdown_recomputes_from_intermediates() {
    let w = Weights::default();
    let b = ScoreBreakdown::combine(0.37, -0.12, 0.58, &w);
    let manual =
        b.norm_momentum * w.momentum + b.norm_technical * w.technical + b.fundamental * w.fundamental;
    assert!((manual - b.composite).abs() < 1e-9);

    let mut again = b;
    again.recompute(&w);
    assert!((again.composite - b.composite).abs() < 1e-9);
}
