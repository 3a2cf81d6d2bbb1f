//! Property tests over randomly generated candle series.

use mabounce::prelude::*;
use proptest::prelude::*;

/// Valid candle from a base price and fractions of its range
fn candle_strategy() -> impl Strategy<Value = (f64, f64, f64, f64, f64)> {
    (1.0f64..1000.0, 0.0f64..20.0, 0.0f64..20.0, 0.0f64..=1.0, 0.0f64..=1.0)
}

fn build(raw: &[(f64, f64, f64, f64, f64)]) -> Vec<Candle> {
    raw.iter()
        .enumerate()
        .map(|(i, &(base, up, down, of, cf))| {
            let low = (base - down).max(0.01);
            let high = base + up;
            let open = (low + (high - low) * of).clamp(low, high);
            let close = (low + (high - low) * cf).clamp(low, high);
            Candle::new(i as i64, open, high, low, close, 1.0)
        })
        .collect()
}

fn series_strategy(max_len: usize) -> impl Strategy<Value = Vec<Candle>> {
    prop::collection::vec(candle_strategy(), 1..max_len).prop_map(|raw| build(&raw))
}

proptest! {
    #[test]
    fn sma_matches_trailing_mean(candles in series_strategy(200), p in 1usize..40) {
        let ma = MovingAverageSeries::sma(&candles, Period::new(p).unwrap());
        for i in 0..candles.len() {
            match ma.get(i) {
                None => prop_assert!(i + 1 < p),
                Some(v) => {
                    prop_assert!(i + 1 >= p);
                    let mean = candles[i + 1 - p..=i].iter().map(|c| c.close).sum::<f64>() / p as f64;
                    prop_assert!((v - mean).abs() <= 1e-9 * mean.abs().max(1.0));
                }
            }
        }
    }

    #[test]
    fn ema_seeds_with_first_close(candles in series_strategy(100), p in 1usize..300) {
        let ma = MovingAverageSeries::ema(&candles, Period::new(p).unwrap());
        prop_assert_eq!(ma.get(0), Some(candles[0].close));
        prop_assert!(ma.iter().all(|v| v.is_some()));
    }

    #[test]
    fn classify_is_deterministic_and_inside_range(
        candles in series_strategy(50),
        ma_frac in -0.2f64..1.2,
        alpha in 0.01f64..=1.0,
    ) {
        for c in &candles {
            let ma = c.low + (c.high - c.low) * ma_frac;
            let first = classify(c, Some(ma), alpha);
            prop_assert_eq!(first, classify(c, Some(ma), alpha));
            if let Some(side) = first {
                prop_assert!(ma >= c.low && ma <= c.high);
                match side {
                    Side::Bull => prop_assert!(ma < c.body_low()),
                    Side::Bear => prop_assert!(ma > c.body_high()),
                }
            }
        }
    }

    #[test]
    fn degenerate_candle_never_touches(price in 0.01f64..1e6, ma in 0.0f64..1e6, alpha in 0.01f64..=1.0) {
        let flat = Candle::new(0, price, price, price, price, 1.0);
        prop_assert_eq!(classify(&flat, Some(ma), alpha), None);
        prop_assert_eq!(classify(&flat, Some(price), alpha), None);
    }

    #[test]
    fn prefix_isolation_agrees_with_scan(
        sides in prop::collection::vec(prop::option::weighted(0.3, prop::bool::ANY), 0..120),
        n_pre in 0usize..12,
        n_post in 0usize..12,
    ) {
        let flags = TouchFlags::from_sides(
            sides.iter().map(|s| s.map(|bull| if bull { Side::Bull } else { Side::Bear })).collect(),
        );
        let bools = flags.as_bools();
        let window = IsolationWindow { n_pre, n_post };
        for i in 0..bools.len() {
            prop_assert_eq!(flags.is_isolated(i, window), is_isolated(&bools, i, n_pre, n_post));
        }
        let zero = IsolationWindow::default();
        prop_assert_eq!(flags.isolated_events(zero).count(), flags.count());
    }

    #[test]
    fn outcomes_are_well_formed(
        candles in series_strategy(150),
        target in 0.001f64..0.2,
        lookahead in 1usize..60,
        bull in prop::bool::ANY,
    ) {
        let evaluator = TargetEvaluator::new(target, lookahead).unwrap();
        let side = if bull { Side::Bull } else { Side::Bear };
        for index in 0..candles.len() {
            let o = evaluator.evaluate(&candles, TouchEvent { index, side });
            prop_assert!(o.adverse_max_pct >= 0.0);
            prop_assert!(o.bars_scanned <= lookahead);
            prop_assert!(index + o.bars_scanned < candles.len());
            prop_assert_eq!(o.success, o.time_to_target.is_some());
            prop_assert_eq!(o.success, o.reason == OutcomeReason::TargetReached);
        }
    }

    #[test]
    fn rising_closes_reach_target_without_adverse_move(
        steps in prop::collection::vec(0.01f64..5.0, 1..80),
        anchor in any::<prop::sample::Index>(),
        reach in 0.05f64..0.95,
    ) {
        let mut closes = vec![100.0];
        for step in &steps {
            let next = closes[closes.len() - 1] + step;
            closes.push(next);
        }
        let candles: Vec<Candle> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle::new(i as i64, c, c, c, c, 1.0))
            .collect();

        let index = anchor.index(closes.len() - 1);
        let top = closes[closes.len() - 1];
        let target = (top - closes[index]) / closes[index] * reach;
        let evaluator = TargetEvaluator::unbounded(target).unwrap();
        let level = evaluator.target_level(closes[index], Side::Bull);
        let first_hit = (index + 1..closes.len()).find(|&j| closes[j] >= level).unwrap();

        let o = evaluator.evaluate(&candles, TouchEvent { index, side: Side::Bull });
        prop_assert!(o.success);
        prop_assert_eq!(o.reason, OutcomeReason::TargetReached);
        prop_assert_eq!(o.time_to_target, Some(first_hit - index));
        prop_assert_eq!(o.adverse_max_pct, 0.0);
    }

    #[test]
    fn rows_balance_and_rates_recompute(candles in series_strategy(300), p in 2usize..30) {
        let engine = EngineBuilder::new()
            .ma_periods(p, p)
            .isolation(1, 1)
            .min_events(0)
            .build()
            .unwrap();
        let series = CandleSeries::new("P/Q", "5m", candles).unwrap();
        let report = engine.analyze_series(&series);
        for row in &report.rows {
            prop_assert_eq!(row.wins + row.losses, row.total_events);
            prop_assert_eq!(row.returned + row.timeouts, row.losses);
            prop_assert_eq!(row.bull_events + row.bear_events, row.total_events);
            let expected = (100.0 * row.wins as f64 / row.total_events as f64 * 100.0).round() / 100.0;
            prop_assert_eq!(row.win_rate, expected);
        }
    }
}
