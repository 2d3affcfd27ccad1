//! Per-cycle portfolio snapshot.
//!
//! Assembled fresh at the top of every decision cycle from the collaborator
//! ports; never persisted except as a summarised audit row. Liquid-staking
//! token balances fold into their underlying asset before the
//! minimum-exposure filter runs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Liquid-staking derivatives folded into SOL for hedge aggregation.
pub const SOL_LST_SYMBOLS: &[&str] = &["JITOSOL", "MSOL", "BSOL", "JUPSOL", "INF"];

pub const UNDERLYING_SOL: &str = "SOL";

/// A wallet token balance as reported by the wallet collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBalance {
    pub mint: String,
    pub symbol: String,
    pub balance: f64,
    pub usd_value: f64,
}

/// One open perpetual-futures position on the hedge venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerpPosition {
    pub coin: String,
    /// Signed size; negative is short.
    pub size: f64,
    pub entry_price: f64,
    pub mark_price: f64,
    pub liquidation_price: Option<f64>,
    pub margin_used_usd: f64,
    pub unrealized_pnl_usd: f64,
}

impl PerpPosition {
    pub fn is_short(&self) -> bool {
        self.size < 0.0
    }

    pub fn notional_usd(&self) -> f64 {
        self.size.abs() * self.mark_price
    }

    /// Loss as a percentage of margin; zero when the position is in profit.
    pub fn loss_pct_of_margin(&self) -> f64 {
        if self.unrealized_pnl_usd >= 0.0 || self.margin_used_usd <= 0.0 {
            0.0
        } else {
            -self.unrealized_pnl_usd / self.margin_used_usd * 100.0
        }
    }

    /// Distance to the liquidation price as a percent of mark.
    pub fn liquidation_distance_pct(&self) -> Option<f64> {
        let liq = self.liquidation_price?;
        if self.mark_price <= 0.0 {
            return None;
        }
        Some((liq - self.mark_price).abs() / self.mark_price * 100.0)
    }
}

/// Perp account summary from the hedge venue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerpAccountSummary {
    pub margin_available_usd: f64,
    pub account_value_usd: f64,
    pub positions: Vec<PerpPosition>,
}

impl PerpAccountSummary {
    pub fn short_usd_for(&self, coin: &str) -> f64 {
        self.positions
            .iter()
            .filter(|p| p.coin == coin && p.is_short())
            .map(|p| p.notional_usd())
            .sum()
    }

    pub fn total_short_usd(&self) -> f64 {
        self.positions
            .iter()
            .filter(|p| p.is_short())
            .map(|p| p.notional_usd())
            .sum()
    }
}

/// A concentrated-LP position on one of the two LP venues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LpPosition {
    pub venue: String,
    pub chain: String,
    pub position_id: String,
    pub pair: String,
    pub value_usd: f64,
    pub in_range: bool,
    pub pending_fees_usd: f64,
}

/// Lending protocol account view.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LendingAccount {
    pub deposits_usd: f64,
    pub borrows_usd: f64,
    pub health_factor: f64,
    pub ltv: f64,
    /// Set when the account is running an LST leverage loop.
    pub lst_loop_active: bool,
}

/// Staking service position.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StakePosition {
    pub staked_sol: f64,
    pub value_usd: f64,
}

/// One aggregated treasury exposure after LST folding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreasuryExposure {
    pub symbol: String,
    /// Balance in underlying units (SOL-equivalent for folded LSTs).
    pub balance: f64,
    pub usd_value: f64,
    /// Tradeable as a perpetual on the hedge venue.
    pub hl_listed: bool,
}

/// The full snapshot handed to the rule blocks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortfolioState {
    pub sol_balance: f64,
    pub sol_price_usd: f64,
    pub usdc_balance: f64,
    pub wallet_tokens: Vec<TokenBalance>,
    pub stake: StakePosition,
    pub lending: Option<LendingAccount>,
    pub perp: PerpAccountSummary,
    pub lp_positions: Vec<LpPosition>,
    pub total_portfolio_usd: f64,
    pub treasury_exposures: Vec<TreasuryExposure>,
    /// shortUsd / hedgeableUsd across the whole treasury.
    pub hedge_ratio: f64,
}

impl PortfolioState {
    pub fn hedgeable_usd(&self) -> f64 {
        self.treasury_exposures
            .iter()
            .filter(|e| e.hl_listed)
            .map(|e| e.usd_value)
            .sum()
    }

    /// Recompute the aggregate hedge ratio from exposures and perp shorts.
    pub fn recompute_hedge_ratio(&mut self) {
        let hedgeable = self.hedgeable_usd();
        self.hedge_ratio = if hedgeable > 0.0 {
            self.perp.total_short_usd() / hedgeable
        } else {
            0.0
        };
    }
}

/// Fold raw balances into treasury exposures.
///
/// SOL-denominated LSTs are merged into the single SOL entry (balance in
/// SOL-equivalent units, USD summed); the minimum-exposure filter is applied
/// only after that aggregation so a stack of small LST positions still hedges
/// as one exposure.
pub fn aggregate_exposures(
    balances: &[TokenBalance],
    sol_price_usd: f64,
    hl_listed: &[String],
    min_exposure_usd: f64,
) -> Vec<TreasuryExposure> {
    let mut merged: HashMap<String, TreasuryExposure> = HashMap::new();

    for balance in balances {
        let upper = balance.symbol.to_uppercase();
        let is_lst = SOL_LST_SYMBOLS.contains(&upper.as_str());
        let symbol = if is_lst {
            UNDERLYING_SOL.to_string()
        } else {
            upper
        };

        let units = if is_lst && sol_price_usd > 0.0 {
            balance.usd_value / sol_price_usd
        } else {
            balance.balance
        };

        let entry = merged.entry(symbol.clone()).or_insert(TreasuryExposure {
            symbol: symbol.clone(),
            balance: 0.0,
            usd_value: 0.0,
            hl_listed: hl_listed.iter().any(|c| c.eq_ignore_ascii_case(&symbol)),
        });
        entry.balance += units;
        entry.usd_value += balance.usd_value;
    }

    let mut exposures: Vec<TreasuryExposure> = merged
        .into_values()
        .filter(|e| e.usd_value >= min_exposure_usd)
        .collect();
    exposures.sort_by(|a, b| {
        b.usd_value
            .partial_cmp(&a.usd_value)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    exposures
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balance(symbol: &str, amount: f64, usd: f64) -> TokenBalance {
        TokenBalance {
            mint: format!("mint-{}", symbol.to_lowercase()),
            symbol: symbol.to_string(),
            balance: amount,
            usd_value: usd,
        }
    }

    #[test]
    fn test_lst_folds_before_min_exposure_filter() {
        // Raw SOL $40 is under the $50 threshold on its own; folded with
        // JitoSOL $225 the aggregate survives as a single SOL entry.
        let balances = vec![balance("SOL", 0.25, 40.0), balance("JitoSOL", 1.3, 225.0)];
        let exposures =
            aggregate_exposures(&balances, 160.0, &["SOL".to_string(), "BTC".to_string()], 50.0);

        assert_eq!(exposures.len(), 1);
        let sol = &exposures[0];
        assert_eq!(sol.symbol, "SOL");
        assert!((sol.usd_value - 265.0).abs() < 1e-9);
        assert!(sol.hl_listed);
        // 0.25 SOL + 225/160 SOL-equivalent
        assert!((sol.balance - (0.25 + 225.0 / 160.0)).abs() < 1e-9);
    }

    #[test]
    fn test_min_exposure_filters_unfolded_dust() {
        let balances = vec![balance("SOL", 10.0, 1600.0), balance("BONK", 1e9, 12.0)];
        let exposures = aggregate_exposures(&balances, 160.0, &["SOL".to_string()], 50.0);
        assert_eq!(exposures.len(), 1);
        assert_eq!(exposures[0].symbol, "SOL");
    }

    #[test]
    fn test_unlisted_exposure_not_hedgeable() {
        let balances = vec![balance("WIF", 500.0, 800.0)];
        let exposures = aggregate_exposures(&balances, 160.0, &["SOL".to_string()], 50.0);
        assert_eq!(exposures.len(), 1);
        assert!(!exposures[0].hl_listed);

        let state = PortfolioState {
            treasury_exposures: exposures,
            ..Default::default()
        };
        assert_eq!(state.hedgeable_usd(), 0.0);
    }

    #[test]
    fn test_loss_pct_of_margin() {
        let position = PerpPosition {
            coin: "SOL".to_string(),
            size: -10.0,
            entry_price: 100.0,
            mark_price: 104.0,
            liquidation_price: None,
            margin_used_usd: 100.0,
            unrealized_pnl_usd: -40.0,
        };
        assert!((position.loss_pct_of_margin() - 40.0).abs() < 1e-9);

        let winner = PerpPosition {
            unrealized_pnl_usd: 25.0,
            ..position.clone()
        };
        assert_eq!(winner.loss_pct_of_margin(), 0.0);
    }

    #[test]
    fn test_liquidation_distance() {
        let position = PerpPosition {
            coin: "SOL".to_string(),
            size: -10.0,
            entry_price: 95.0,
            mark_price: 100.0,
            liquidation_price: Some(108.0),
            margin_used_usd: 100.0,
            unrealized_pnl_usd: -50.0,
        };
        let distance = position.liquidation_distance_pct().unwrap();
        assert!((distance - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_hedge_ratio() {
        let mut state = PortfolioState {
            treasury_exposures: vec![TreasuryExposure {
                symbol: "SOL".to_string(),
                balance: 10.0,
                usd_value: 1000.0,
                hl_listed: true,
            }],
            perp: PerpAccountSummary {
                margin_available_usd: 500.0,
                account_value_usd: 900.0,
                positions: vec![PerpPosition {
                    coin: "SOL".to_string(),
                    size: -2.5,
                    entry_price: 100.0,
                    mark_price: 100.0,
                    liquidation_price: None,
                    margin_used_usd: 50.0,
                    unrealized_pnl_usd: 0.0,
                }],
            },
            ..Default::default()
        };
        state.recompute_hedge_ratio();
        assert!((state.hedge_ratio - 0.25).abs() < 1e-9);
    }
}
