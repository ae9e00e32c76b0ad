//! Integration tests for the evaluation pipeline

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use stbchef::consensus::ConsensusEngine;
    use stbchef::notification::{AlertContext, NotificationGate};
    use stbchef::persistence::{parse_ticks, EngineState, JsonFileStore, StateStore, TradeLog};
    use stbchef::rebalance::{
        AllocationBand, AmountUnit, PortfolioRebalancer, PortfolioSnapshot, RebalanceReason,
    };
    use stbchef::replay::{run_replay, ReplaySummary};
    use stbchef::scoring::AccuracyRating;
    use stbchef::threshold::{ThresholdConfig, ThresholdMode, ThresholdPolicy};
    use stbchef::volatility::{volatility_pct, VolatilityEstimator};
    use stbchef::{
        Decision, DecisionSet, EngineConfig, EngineContext, MarketRegime, ModelId, TickInput,
        TickOutcome,
    };

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn at(minutes: i64) -> DateTime<Utc> {
        t0() + Duration::minutes(minutes)
    }

    fn calls(g: Option<Decision>, q: Option<Decision>, m: Option<Decision>) -> DecisionSet {
        DecisionSet::new(g, q, m)
    }

    fn temp_dir(test_name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("stbchef_it_{}_{}", test_name, uuid::Uuid::new_v4()))
    }

    // ============================================================================
    // End-to-end scoring
    // ============================================================================

    #[test]
    fn test_end_to_end_price_sequence() {
        use Decision::*;
        let mut engine = EngineContext::default();

        let opening = calls(Some(Buy), Some(Buy), Some(Hold));
        let first = engine.on_tick(TickInput::new(2000.0, at(0), opening));
        assert!(first.report().unwrap().scored.is_empty());

        // +1% against a threshold derived from [2000, 2020]
        let follow_up = calls(Some(Sell), Some(Hold), Some(Hold));
        let second = engine.on_tick(TickInput::new(2020.0, at(1), follow_up));
        let report = second.report().unwrap();
        assert_eq!(report.volatility, 0.0);
        assert!((report.threshold - 0.4).abs() < 1e-9);
        assert_eq!(report.scored.len(), 3);

        for record in &report.scored {
            assert!((record.price_change_pct - 1.0).abs() < 1e-9);
            match record.decision {
                Buy => {
                    assert!(record.is_correct);
                    assert!(record.score >= 1.0);
                    assert!((record.score - 1.06).abs() < 1e-9);
                }
                Hold => {
                    // 1% is beyond 1.5x the threshold: a missed move
                    assert!(!record.is_correct);
                    assert!((record.score - 0.3).abs() < 1e-9);
                }
                Sell => panic!("no SELL was pending"),
            }
        }

        // -1.485% against a threshold from [2000, 2020, 1990]
        let third = engine.on_tick(TickInput::new(1990.0, at(2), DecisionSet::default()));
        let report = third.report().unwrap();
        let expected_vol = volatility_pct(&[2000.0, 2020.0, 1990.0], VolatilityEstimator::StdDev);
        assert!((report.volatility - expected_vol).abs() < 1e-9);
        assert!(report.volatility > 1.0 && report.volatility < 3.0);
        assert!((report.threshold - 0.5).abs() < 1e-9);

        let sell = report
            .scored
            .iter()
            .find(|r| r.model == ModelId::Gemini)
            .unwrap();
        assert!(sell.is_correct);
        let change: f64 = (1990.0 - 2020.0) / 2020.0 * 100.0;
        assert!((sell.score - (1.0 + (change.abs() - 0.5) / 10.0)).abs() < 1e-9);

        // no pending calls left
        let fourth = engine.on_tick(TickInput::new(2050.0, at(3), DecisionSet::default()));
        assert!(fourth.report().unwrap().scored.is_empty());

        let scoring = engine.scoring();
        assert_eq!(scoring.tracker(ModelId::Gemini).accuracy().correct, 2);
        assert_eq!(scoring.tracker(ModelId::Gemini).accuracy().total, 2);
        assert_eq!(scoring.raw_accuracy_of(ModelId::Mistral), 0.0);
        assert_eq!(scoring.accuracy_of(ModelId::Gemini), 100.0);
        assert_eq!(scoring.stats_of(ModelId::Mistral).rating, AccuracyRating::Poor);
    }

    #[test]
    fn test_invalid_ticks_do_not_advance_counters() {
        let mut engine = EngineContext::default();
        engine.on_tick(TickInput::new(2000.0, at(0), calls(Some(Decision::Buy), None, None)));

        for bad in [0.0, -10.0, f64::NAN, f64::INFINITY] {
            let outcome = engine.on_tick(TickInput::new(bad, at(1), DecisionSet::default()));
            assert!(matches!(outcome, TickOutcome::Skipped(_)));
        }
        assert_eq!(engine.volatility().len(), 1);
        assert_eq!(engine.scoring().tracker(ModelId::Gemini).accuracy().total, 0);

        // the pending call survives and is scored by the next good tick
        let next = engine.on_tick(TickInput::new(2100.0, at(2), DecisionSet::default()));
        assert_eq!(next.report().unwrap().scored.len(), 1);
    }

    #[test]
    fn test_alternate_formulas_are_configurable() {
        let mut config = EngineConfig::default();
        config.threshold = ThresholdConfig {
            mode: ThresholdMode::Scaled,
            base: 1.0,
        };
        config.scoring.hold_miss_score = 0.25;
        let mut engine = EngineContext::new(config);

        engine.on_tick(TickInput::new(2000.0, at(0), calls(None, None, Some(Decision::Hold))));
        let report = engine
            .on_tick(TickInput::new(2100.0, at(1), DecisionSet::default()))
            .report()
            .cloned()
            .unwrap();

        // zero volatility clamps to 0.5 in scaled mode
        assert!((report.threshold - 0.5).abs() < 1e-9);
        assert_eq!(report.scored[0].score, 0.25);
    }

    // ============================================================================
    // Thresholds, consensus, rebalancing, notification
    // ============================================================================

    #[test]
    fn test_threshold_monotonic_and_base_at_two_percent() {
        let policy = ThresholdPolicy::default();
        assert_eq!(policy.threshold_for(2.0), policy.base());

        let mut prev = 0.0;
        for i in 0..=100 {
            let t = policy.threshold_for(i as f64 * 0.1);
            assert!(t >= prev);
            prev = t;
        }
    }

    #[test]
    fn test_consensus_cases() {
        use Decision::*;
        assert_eq!(ConsensusEngine::consensus(&calls(Some(Buy), Some(Buy), Some(Sell))), Some(Buy));
        assert_eq!(ConsensusEngine::consensus(&calls(Some(Buy), Some(Sell), Some(Hold))), None);
        assert_eq!(ConsensusEngine::consensus(&calls(Some(Buy), None, None)), None);
    }

    #[test]
    fn test_rebalance_severe_and_midpoint() {
        let rebalancer = PortfolioRebalancer::default();
        let band = AllocationBand::new(20.0, 80.0);

        // 5% ETH of $10,000
        let low = PortfolioSnapshot::new(0.25, 9500.0, 2000.0);
        let sells = calls(Some(Decision::Sell), Some(Decision::Sell), None);
        let d = rebalancer.decide_with_band(&low, band, Some(Decision::Sell), &sells);
        assert_eq!(d.action, Decision::Buy);
        assert_eq!(d.reason, RebalanceReason::SevereImbalance);
        assert!((d.amount - 1500.0).abs() < 1e-6);

        // 50% ETH with SELL consensus: midpoint 35%, not the 20% bound
        let even = PortfolioSnapshot::new(2.5, 5000.0, 2000.0);
        let d = rebalancer.decide_with_band(&even, band, Some(Decision::Sell), &sells);
        assert_eq!(d.action, Decision::Sell);
        assert_eq!(d.unit, AmountUnit::Eth);
        assert!((d.amount - 0.75).abs() < 1e-9);
        assert_eq!(d.direction, "ETH → USDC");
        assert_eq!(d.agreeing_names(), vec!["Gemini", "Groq"]);
    }

    #[test]
    fn test_notification_throttle_window() {
        let ctx = AlertContext {
            allocation_out_of_range: true,
            agreeing_models: 0,
        };

        let mut gate = NotificationGate::default();
        assert!(gate.should_notify(Decision::Buy, at(0), ctx));
        gate.record_notified(Decision::Buy, at(0));
        assert!(!gate.should_notify(Decision::Buy, at(4), ctx));

        let mut gate = NotificationGate::default();
        gate.record_notified(Decision::Buy, at(0));
        assert!(gate.should_notify(Decision::Buy, at(6), ctx));
    }

    #[test]
    fn test_engine_alerts_follow_regime_band() {
        let mut engine = EngineContext::default();
        // 50% ETH: off-band in both regimes, but within the severe slack
        let snapshot = PortfolioSnapshot::new(2.5, 5000.0, 2000.0);

        let bearish = engine
            .on_tick(
                TickInput::new(2000.0, at(0), DecisionSet::default())
                    .with_portfolio(snapshot, MarketRegime::Bearish),
            )
            .report()
            .cloned()
            .unwrap();
        let decision = bearish.rebalance.unwrap();
        assert_eq!(decision.action, Decision::Sell);
        assert_eq!(decision.reason, RebalanceReason::Allocation);
        assert!(bearish.notify);

        let bullish = engine
            .on_tick(
                TickInput::new(2000.0, at(1), DecisionSet::default())
                    .with_portfolio(snapshot, MarketRegime::Bullish),
            )
            .report()
            .cloned()
            .unwrap();
        assert_eq!(bullish.rebalance.unwrap().action, Decision::Buy);
        assert!(bullish.notify);
    }

    // ============================================================================
    // Persistence and replay
    // ============================================================================

    #[test]
    fn test_state_survives_file_round_trip() {
        let dir = temp_dir("state");
        let store = JsonFileStore::new(dir.join("engine_state.json"));

        let mut engine = EngineContext::default();
        let buy = calls(Some(Decision::Buy), None, None);
        engine.on_tick(TickInput::new(2000.0, at(0), buy));
        engine.on_tick(TickInput::new(2050.0, at(1), buy));
        store.save(&engine.snapshot()).unwrap();

        let state: EngineState = store.load().unwrap().unwrap();
        let mut restored = EngineContext::default();
        restored.restore(state).unwrap();

        let tracker = restored.scoring().tracker(ModelId::Gemini);
        assert_eq!(tracker.accuracy().total, 1);
        assert_eq!(tracker.history().len(), 1);
        assert_eq!(tracker.pending().map(|p| p.decision), Some(Decision::Buy));
        assert!(!restored.ensure_session(at(2)));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_replay_counts_and_logs_trades() {
        let csv = "\
timestamp,price,gemini,groq,mistral,eth_balance,usdc_balance,fear_greed
2024-05-01T12:00:00Z,2000,BUY,BUY,HOLD,0.25,9500,30
2024-05-01T12:01:00Z,,,,,,,
2024-05-01T12:02:00Z,2020,,,,0.25,9500,30
";
        let ticks = parse_ticks(csv.as_bytes()).unwrap();

        let dir = temp_dir("replay");
        let log_path = dir.join("trades.csv");
        let mut log = TradeLog::open(&log_path).unwrap();

        let mut engine = EngineContext::default();
        let mut summary = ReplaySummary::default();
        run_replay(&mut engine, ticks, 0, Some(&mut log), &mut summary)
            .await
            .unwrap();

        assert_eq!(
            summary,
            ReplaySummary {
                evaluated: 2,
                skipped: 1,
                scored: 3,
                alerts: 1,
            }
        );

        let content = std::fs::read_to_string(&log_path).unwrap();
        assert_eq!(content.lines().count(), 4);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_replay_on_interval() {
        let ticks: Vec<TickInput> = (0..3)
            .map(|i| TickInput::new(2000.0 + i as f64, at(i), DecisionSet::default()))
            .collect();

        let mut engine = EngineContext::default();
        let mut summary = ReplaySummary::default();
        run_replay(&mut engine, ticks, 1, None, &mut summary)
            .await
            .unwrap();

        assert_eq!(summary.evaluated, 3);
        assert_eq!(engine.volatility().len(), 3);
    }
}
