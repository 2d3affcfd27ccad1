//! Portfolio gathering: concurrent collaborator reads with degrade-to-zero.
//!
//! Every source is optional and every failure defaults to an empty slice of
//! the snapshot at debug level; a venue outage costs one cycle's visibility,
//! never the cycle itself.

use super::EngineServices;
use crate::config::EngineEnvConfig;
use crate::domain::portfolio::{
    LendingAccount, PerpAccountSummary, PortfolioState, StakePosition, TokenBalance,
    UNDERLYING_SOL, aggregate_exposures,
};
use rust_decimal::prelude::ToPrimitive;
use tracing::debug;

async fn fetch_sol_price(services: &EngineServices) -> f64 {
    let Some(market) = &services.market else {
        return 0.0;
    };
    match market.get_price(UNDERLYING_SOL).await {
        Ok(price) => price,
        Err(e) => {
            debug!("gather: SOL price unavailable: {}", e);
            0.0
        }
    }
}

async fn fetch_balance(services: &EngineServices, asset: &str) -> f64 {
    let Some(wallet) = &services.wallet else {
        return 0.0;
    };
    match wallet.get_balance(asset).await {
        Ok(balance) => balance.to_f64().unwrap_or(0.0),
        Err(e) => {
            debug!("gather: {} balance unavailable: {}", asset, e);
            0.0
        }
    }
}

async fn fetch_wallet_tokens(services: &EngineServices) -> Vec<TokenBalance> {
    let Some(wallet) = &services.wallet else {
        return Vec::new();
    };
    match wallet.get_wallet_token_balances().await {
        Ok(tokens) => tokens,
        Err(e) => {
            debug!("gather: wallet tokens unavailable: {}", e);
            Vec::new()
        }
    }
}

async fn fetch_stake(services: &EngineServices, sol_price: f64) -> StakePosition {
    let Some(staking) = &services.staking else {
        return StakePosition::default();
    };
    match staking.get_stake_position(sol_price).await {
        Ok(position) => position,
        Err(e) => {
            debug!("gather: stake position unavailable: {}", e);
            StakePosition::default()
        }
    }
}

async fn fetch_lending(services: &EngineServices) -> Option<LendingAccount> {
    let lending = services.lending.as_ref()?;
    match lending.get_position().await {
        Ok(account) => Some(account),
        Err(e) => {
            debug!("gather: lending position unavailable: {}", e);
            None
        }
    }
}

async fn fetch_perp(services: &EngineServices) -> (PerpAccountSummary, Vec<String>) {
    let Some(perp) = &services.perp else {
        return (PerpAccountSummary::default(), Vec::new());
    };
    let summary = match perp.get_account_summary().await {
        Ok(summary) => summary,
        Err(e) => {
            debug!("gather: perp account unavailable: {}", e);
            PerpAccountSummary::default()
        }
    };
    let listed = match perp.get_hl_listed_coins().await {
        Ok(listed) => listed,
        Err(e) => {
            debug!("gather: listed coins unavailable: {}", e);
            Vec::new()
        }
    };
    (summary, listed)
}

async fn fetch_lp_positions(services: &EngineServices) -> Vec<crate::domain::portfolio::LpPosition> {
    let mut positions = Vec::new();
    for venue in &services.lp_venues {
        match venue.get_positions().await {
            Ok(mut venue_positions) => positions.append(&mut venue_positions),
            Err(e) => debug!("gather: {} positions unavailable: {}", venue.venue_name(), e),
        }
    }
    positions
}

/// Assemble the full snapshot for one cycle.
#[tracing::instrument(skip_all)]
pub async fn gather_portfolio(
    services: &EngineServices,
    config: &EngineEnvConfig,
) -> PortfolioState {
    let sol_price = fetch_sol_price(services).await;

    let (sol_balance, usdc_balance, wallet_tokens, stake, lending, (perp, hl_listed), lp_positions) = tokio::join!(
        fetch_balance(services, UNDERLYING_SOL),
        fetch_balance(services, "USDC"),
        fetch_wallet_tokens(services),
        fetch_stake(services, sol_price),
        fetch_lending(services),
        fetch_perp(services),
        fetch_lp_positions(services),
    );

    // Exposure inputs: spot SOL, staked SOL and every wallet token. LSTs
    // fold into SOL inside the aggregation, then the minimum filter runs.
    let mut balances = wallet_tokens.clone();
    if sol_balance > 0.0 {
        balances.push(TokenBalance {
            mint: "native".to_string(),
            symbol: UNDERLYING_SOL.to_string(),
            balance: sol_balance,
            usd_value: sol_balance * sol_price,
        });
    }
    if stake.value_usd > 0.0 {
        balances.push(TokenBalance {
            mint: "staked".to_string(),
            symbol: UNDERLYING_SOL.to_string(),
            balance: stake.staked_sol,
            usd_value: stake.value_usd,
        });
    }

    let treasury_exposures = aggregate_exposures(
        &balances,
        sol_price,
        &hl_listed,
        config.hedge_min_exposure_usd,
    );

    let lending_net = lending
        .as_ref()
        .map(|l| l.deposits_usd - l.borrows_usd)
        .unwrap_or(0.0);
    let tokens_usd: f64 = wallet_tokens.iter().map(|t| t.usd_value).sum();
    let lp_usd: f64 = lp_positions.iter().map(|p| p.value_usd).sum();

    let total_portfolio_usd = sol_balance * sol_price
        + usdc_balance
        + tokens_usd
        + stake.value_usd
        + lending_net
        + perp.account_value_usd
        + lp_usd;

    let mut state = PortfolioState {
        sol_balance,
        sol_price_usd: sol_price,
        usdc_balance,
        wallet_tokens,
        stake,
        lending,
        perp,
        lp_positions,
        total_portfolio_usd,
        treasury_exposures,
        hedge_ratio: 0.0,
    };
    state.recompute_hedge_ratio();
    state
}
