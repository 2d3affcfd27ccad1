//! Progressive learning over closed positions.
//!
//! Once per cycle (with a 15-minute cache) the retrospective queries the
//! 90-day position history, derives fresh multipliers by piecewise rules,
//! blends them into the persisted prior via EMA and stores the result. A
//! strategy with under five closed trades never moves its multipliers.

use crate::domain::learning::{
    AdaptiveParams, ClosedPosition, EMA_ALPHA, LpStats, MIN_SAMPLES_FOR_DEVIATION,
    PredictionCalibration, StrategyKind, StrategyStats, confidence_for_samples,
};
use crate::domain::ports::PositionLedger;
use crate::infrastructure::persistence::KvRepository;
use crate::infrastructure::persistence::kv_repository::ADAPTIVE_PARAMS_KEY;
use chrono::{DateTime, Duration, Utc};
use statrs::statistics::Statistics;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const CACHE_TTL_MINUTES: i64 = 15;
const RETROSPECTIVE_WINDOW_DAYS: i64 = 90;
const RECENT_TRADES: usize = 10;

pub struct LearningEngine {
    ledger: Option<Arc<dyn PositionLedger>>,
    kv: KvRepository,
    cache: Mutex<Option<(DateTime<Utc>, AdaptiveParams)>>,
}

impl LearningEngine {
    pub fn new(ledger: Option<Arc<dyn PositionLedger>>, kv: KvRepository) -> Self {
        Self {
            ledger,
            kv,
            cache: Mutex::new(None),
        }
    }

    /// The adaptive parameters for this cycle: cached, else recomputed,
    /// else the persisted prior, else defaults.
    pub async fn current(&self) -> AdaptiveParams {
        {
            let cache = self.cache.lock().await;
            if let Some((at, params)) = cache.as_ref()
                && Utc::now() - *at < Duration::minutes(CACHE_TTL_MINUTES)
            {
                return params.clone();
            }
        }

        let params = self.retrospective().await;
        *self.cache.lock().await = Some((Utc::now(), params.clone()));
        params
    }

    async fn persisted_prior(&self) -> AdaptiveParams {
        match self.kv.get(ADAPTIVE_PARAMS_KEY).await {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_default(),
            Ok(None) => AdaptiveParams::default(),
            Err(e) => {
                warn!("learning: prior read failed: {}", e);
                AdaptiveParams::default()
            }
        }
    }

    async fn retrospective(&self) -> AdaptiveParams {
        let prior = self.persisted_prior().await;

        let Some(ledger) = &self.ledger else {
            debug!("learning: no position ledger, using prior");
            return prior;
        };

        let since = Utc::now() - Duration::days(RETROSPECTIVE_WINDOW_DAYS);
        let positions = match ledger.closed_positions(since).await {
            Ok(positions) => positions,
            Err(e) => {
                debug!("learning: ledger unavailable, using prior: {}", e);
                return prior;
            }
        };

        let stats = compute_strategy_stats(&positions);
        let lp_stats = compute_lp_stats(&positions);
        let calibration = compute_calibration(&positions);
        let fresh = derive_multipliers(&stats, &lp_stats, &calibration);

        let blended = AdaptiveParams::ema_blend(&prior, &fresh, EMA_ALPHA);
        info!(
            "learning: {} closed positions, confidence {:.2}, kelly x{:.2}, lp range x{:.2}",
            positions.len(),
            blended.confidence,
            blended.kelly_multiplier,
            blended.lp_range_multiplier
        );

        match serde_json::to_value(&blended) {
            Ok(value) => {
                if let Err(e) = self.kv.put(ADAPTIVE_PARAMS_KEY, &value).await {
                    warn!("learning: persist failed: {}", e);
                }
            }
            Err(e) => warn!("learning: serialize failed: {}", e),
        }

        blended
    }
}

/// Per-strategy digest over the retrospective window.
pub fn compute_strategy_stats(
    positions: &[ClosedPosition],
) -> HashMap<StrategyKind, StrategyStats> {
    let mut by_strategy: HashMap<StrategyKind, Vec<&ClosedPosition>> = HashMap::new();
    for position in positions {
        by_strategy.entry(position.strategy).or_default().push(position);
    }

    by_strategy
        .into_iter()
        .map(|(strategy, mut trades)| {
            trades.sort_by_key(|p| p.closed_at);
            let pnls: Vec<f64> = trades.iter().map(|p| p.pnl_usd).collect();
            let wins = pnls.iter().filter(|p| **p > 0.0).count();
            let total = trades.len();

            let mean = Statistics::mean(pnls.iter().copied());
            let std_dev = if total > 1 {
                Statistics::std_dev(pnls.iter().copied())
            } else {
                0.0
            };
            let sharpe_approx = if std_dev > 0.0 { mean / std_dev } else { 0.0 };

            // Max drawdown over the cumulative PnL path.
            let mut peak = 0.0f64;
            let mut cumulative = 0.0f64;
            let mut max_drawdown = 0.0f64;
            for pnl in &pnls {
                cumulative += pnl;
                peak = peak.max(cumulative);
                max_drawdown = max_drawdown.max(peak - cumulative);
            }

            let recent: Vec<&&ClosedPosition> =
                trades.iter().rev().take(RECENT_TRADES).collect();
            let recent_wins = recent.iter().filter(|p| p.pnl_usd > 0.0).count();

            let stats = StrategyStats {
                total_trades: total,
                win_rate: wins as f64 / total as f64,
                avg_pnl_usd: mean,
                sharpe_approx,
                max_drawdown_usd: max_drawdown,
                recent_win_rate: recent_wins as f64 / recent.len().max(1) as f64,
                avg_hold_hours: trades.iter().map(|p| p.hold_hours()).sum::<f64>()
                    / total as f64,
            };
            (strategy, stats)
        })
        .collect()
}

/// LP-specific digest: range discipline plus PnL-per-day rankings.
pub fn compute_lp_stats(positions: &[ClosedPosition]) -> LpStats {
    let lp: Vec<&ClosedPosition> = positions
        .iter()
        .filter(|p| p.strategy == StrategyKind::LiquidityPool)
        .collect();
    if lp.is_empty() {
        return LpStats::default();
    }

    let out_of_range = lp.iter().filter(|p| p.out_of_range == Some(true)).count();
    let rebalance_count: u32 = lp.iter().filter_map(|p| p.rebalances).sum();

    let mut by_chain: HashMap<String, (f64, f64)> = HashMap::new();
    let mut by_pair: HashMap<String, (f64, f64)> = HashMap::new();
    for position in &lp {
        let days = (position.hold_hours() / 24.0).max(1.0 / 24.0);
        if let Some(chain) = &position.chain {
            let entry = by_chain.entry(chain.clone()).or_insert((0.0, 0.0));
            entry.0 += position.pnl_usd;
            entry.1 += days;
        }
        if let Some(pair) = &position.pair {
            let entry = by_pair.entry(pair.clone()).or_insert((0.0, 0.0));
            entry.0 += position.pnl_usd;
            entry.1 += days;
        }
    }

    let rank = |map: HashMap<String, (f64, f64)>| {
        let mut ranked: Vec<(String, f64)> = map
            .into_iter()
            .map(|(key, (pnl, days))| (key, pnl / days))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    };

    LpStats {
        out_of_range_rate: out_of_range as f64 / lp.len() as f64,
        rebalance_count,
        pnl_per_day_by_chain: rank(by_chain),
        pnl_per_day_by_pair: rank(by_pair),
    }
}

/// Prediction-market calibration: Brier score, overconfidence, gap.
pub fn compute_calibration(positions: &[ClosedPosition]) -> PredictionCalibration {
    let bets: Vec<(&f64, bool)> = positions
        .iter()
        .filter(|p| p.strategy == StrategyKind::Polymarket)
        .filter_map(|p| Some((p.predicted_prob.as_ref()?, p.won?)))
        .collect();
    if bets.is_empty() {
        return PredictionCalibration::default();
    }

    let n = bets.len() as f64;
    let brier_score = bets
        .iter()
        .map(|(prob, won)| {
            let outcome = if *won { 1.0 } else { 0.0 };
            (**prob - outcome).powi(2)
        })
        .sum::<f64>()
        / n;

    // Overconfident: predicted >70% and lost.
    let overconfident = bets
        .iter()
        .filter(|(prob, won)| **prob > 0.7 && !*won)
        .count();

    let mean_predicted = bets.iter().map(|(prob, _)| **prob).sum::<f64>() / n;
    let win_rate = bets.iter().filter(|(_, won)| *won).count() as f64 / n;

    PredictionCalibration {
        brier_score,
        overconfidence_rate: overconfident as f64 / n,
        calibration_gap: mean_predicted - win_rate,
    }
}

/// Piecewise multiplier derivation. Strategies under the sample floor stay
/// at 1.0.
pub fn derive_multipliers(
    stats: &HashMap<StrategyKind, StrategyStats>,
    lp_stats: &LpStats,
    calibration: &PredictionCalibration,
) -> AdaptiveParams {
    let mut params = AdaptiveParams::default();

    let mut total_samples = 0usize;
    for (strategy, digest) in stats {
        total_samples += digest.total_trades;
        params
            .strategy_samples
            .insert(strategy.as_str().to_string(), digest.total_trades);
        let sharpe_component = (digest.sharpe_approx / 2.0).clamp(-1.0, 1.0);
        params.strategy_scores.insert(
            strategy.as_str().to_string(),
            (digest.win_rate * 0.6 + (sharpe_component + 1.0) / 2.0 * 0.4).clamp(0.0, 1.0),
        );
    }
    params.confidence = confidence_for_samples(total_samples);

    if let Some(poly) = stats.get(&StrategyKind::Polymarket)
        && poly.total_trades >= MIN_SAMPLES_FOR_DEVIATION
    {
        if poly.win_rate < 0.4 {
            params.kelly_multiplier = 0.5;
        } else if poly.win_rate > 0.6 && poly.recent_win_rate >= 0.5 {
            params.kelly_multiplier = 1.2;
        }
        if calibration.brier_score > 0.3 || calibration.calibration_gap > 0.1 {
            // Overconfident model: demand more edge before betting.
            params.min_edge_override = Some(0.08);
        }
    }

    if let Some(hedge) = stats.get(&StrategyKind::Hedge)
        && hedge.total_trades >= MIN_SAMPLES_FOR_DEVIATION
    {
        if hedge.win_rate < 0.4 {
            params.stop_loss_multiplier = 0.8;
        } else if hedge.win_rate > 0.6 {
            params.stop_loss_multiplier = 1.1;
        }
        if hedge.avg_pnl_usd < 0.0 {
            params.hedge_bias_multiplier = 1.1;
        }
    }

    if let Some(lp) = stats.get(&StrategyKind::LiquidityPool)
        && lp.total_trades >= MIN_SAMPLES_FOR_DEVIATION
        && lp_stats.out_of_range_rate > 0.4
    {
        params.lp_range_multiplier = 1.3;
    }

    params.updated_at = Utc::now();
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(strategy: StrategyKind, pnl: f64, days_ago: i64) -> ClosedPosition {
        ClosedPosition {
            strategy,
            pnl_usd: pnl,
            opened_at: Utc::now() - Duration::days(days_ago) - Duration::hours(12),
            closed_at: Utc::now() - Duration::days(days_ago),
            chain: None,
            pair: None,
            out_of_range: None,
            rebalances: None,
            predicted_prob: None,
            won: None,
        }
    }

    fn lp_position(pnl: f64, pair: &str, out_of_range: bool, days_ago: i64) -> ClosedPosition {
        ClosedPosition {
            chain: Some("solana".to_string()),
            pair: Some(pair.to_string()),
            out_of_range: Some(out_of_range),
            rebalances: Some(1),
            ..position(StrategyKind::LiquidityPool, pnl, days_ago)
        }
    }

    fn bet(prob: f64, won: bool, days_ago: i64) -> ClosedPosition {
        ClosedPosition {
            predicted_prob: Some(prob),
            won: Some(won),
            ..position(StrategyKind::Polymarket, if won { 10.0 } else { -10.0 }, days_ago)
        }
    }

    #[test]
    fn test_win_rate_and_recent_window() {
        let mut positions = Vec::new();
        for i in 0..20 {
            positions.push(position(StrategyKind::Hedge, if i < 10 { 5.0 } else { -5.0 }, 20 - i));
        }
        let stats = compute_strategy_stats(&positions);
        let hedge = &stats[&StrategyKind::Hedge];
        assert_eq!(hedge.total_trades, 20);
        assert!((hedge.win_rate - 0.5).abs() < 1e-9);
        // The 10 most recent closes are all losers
        assert_eq!(hedge.recent_win_rate, 0.0);
        assert!(hedge.max_drawdown_usd > 0.0);
    }

    #[test]
    fn test_under_sample_floor_leaves_multipliers_alone() {
        let positions = vec![
            bet(0.8, false, 3),
            bet(0.8, false, 2),
            bet(0.8, false, 1),
        ];
        let stats = compute_strategy_stats(&positions);
        let calibration = compute_calibration(&positions);
        let params = derive_multipliers(&stats, &LpStats::default(), &calibration);
        // 3 losing trades but only 3 samples: nothing moves
        assert_eq!(params.kelly_multiplier, 1.0);
        assert!(params.min_edge_override.is_none());
    }

    #[test]
    fn test_losing_polymarket_halves_kelly() {
        let positions: Vec<ClosedPosition> =
            (0..8).map(|i| bet(0.6, i % 4 == 0, i)).collect();
        // 2 wins of 8: win rate 0.25 < 0.4
        let stats = compute_strategy_stats(&positions);
        let calibration = compute_calibration(&positions);
        let params = derive_multipliers(&stats, &LpStats::default(), &calibration);
        assert_eq!(params.kelly_multiplier, 0.5);
    }

    #[test]
    fn test_out_of_range_widens_lp_band() {
        let positions: Vec<ClosedPosition> = (0..6)
            .map(|i| lp_position(2.0, "SOL/USDC", i % 2 == 0, i))
            .collect();
        let stats = compute_strategy_stats(&positions);
        let lp_stats = compute_lp_stats(&positions);
        assert!((lp_stats.out_of_range_rate - 0.5).abs() < 1e-9);
        let params = derive_multipliers(&stats, &lp_stats, &PredictionCalibration::default());
        assert_eq!(params.lp_range_multiplier, 1.3);
    }

    #[test]
    fn test_pnl_per_day_ranking() {
        let positions = vec![
            lp_position(10.0, "SOL/USDC", false, 5),
            lp_position(50.0, "WIF/SOL", false, 5),
            lp_position(-5.0, "SOL/USDC", false, 3),
        ];
        let lp_stats = compute_lp_stats(&positions);
        assert_eq!(lp_stats.pnl_per_day_by_pair[0].0, "WIF/SOL");
    }

    #[test]
    fn test_overconfident_model_raises_edge_floor() {
        // 6 bets at 80% confidence, half lost
        let positions: Vec<ClosedPosition> =
            (0..6).map(|i| bet(0.8, i % 2 == 0, i)).collect();
        let stats = compute_strategy_stats(&positions);
        let calibration = compute_calibration(&positions);
        assert!(calibration.calibration_gap > 0.1);
        let params = derive_multipliers(&stats, &LpStats::default(), &calibration);
        assert_eq!(params.min_edge_override, Some(0.08));
    }

    #[test]
    fn test_brier_score_perfect_and_worst() {
        let perfect = vec![bet(1.0, true, 1), bet(0.0, false, 2)];
        // bet() with won=false flips pnl but prob 0.0 predicted a loss
        let calibration = compute_calibration(&perfect);
        assert!(calibration.brier_score < 1e-9);
    }
}
