//! Collaborator ports.
//!
//! Every external service the core talks to sits behind one of these traits.
//! All of them are optional at wiring time (`Option<Arc<dyn …>>`): an absent
//! collaborator disables the rules that need it, it is never an error.

use crate::domain::learning::ClosedPosition;
use crate::domain::portfolio::{
    LendingAccount, LpPosition, PerpAccountSummary, StakePosition, TokenBalance,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Quote for one asset from the market-data source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceQuote {
    pub usd: f64,
    pub change_24h_pct: f64,
}

/// Receipt returned by any side-effectful collaborator call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_id: String,
    pub detail: Option<String>,
}

#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn get_price(&self, symbol: &str) -> Result<f64>;
    async fn get_prices(&self, ids: &[String]) -> Result<HashMap<String, PriceQuote>>;
}

#[async_trait]
pub trait WalletService: Send + Sync {
    async fn get_balance(&self, asset: &str) -> Result<Decimal>;
    async fn get_wallet_token_balances(&self) -> Result<Vec<TokenBalance>>;
}

/// Request to open or extend a treasury hedge on the perp venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HedgeRequest {
    pub coin: String,
    pub exposure_usd: f64,
    pub leverage: f64,
}

#[async_trait]
pub trait PerpVenue: Send + Sync {
    async fn get_account_summary(&self) -> Result<PerpAccountSummary>;
    async fn hedge_treasury(&self, request: HedgeRequest) -> Result<TxReceipt>;
    /// `is_buy` true closes a short (reduce-only).
    async fn close_position(&self, coin: &str, size: f64, is_buy: bool) -> Result<TxReceipt>;
    async fn get_hl_listed_coins(&self) -> Result<Vec<String>>;
}

/// Scout context forwarded into the prediction-market scanner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoutContext {
    pub narratives: Vec<String>,
    pub trending_symbols: Vec<String>,
}

/// One scannable prediction-market opportunity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionOpportunity {
    pub market_id: String,
    pub token_id: String,
    pub question: String,
    pub implied_prob: f64,
    pub model_prob: f64,
    pub max_size_usd: f64,
}

impl PredictionOpportunity {
    pub fn edge(&self) -> f64 {
        self.model_prob - self.implied_prob
    }
}

/// An open prediction-market position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionPosition {
    pub market_id: String,
    pub token_id: String,
    pub question: String,
    pub size_usd: f64,
    pub entry_prob: f64,
    pub current_prob: f64,
}

#[async_trait]
pub trait PredictionMarket: Send + Sync {
    async fn scan_opportunities(
        &self,
        headroom_usd: f64,
        scout: &ScoutContext,
    ) -> Result<Vec<PredictionOpportunity>>;
    async fn fetch_market(&self, market_id: &str) -> Result<serde_json::Value>;
    async fn place_buy_order(
        &self,
        market_id: &str,
        token_id: &str,
        size_usd: f64,
    ) -> Result<TxReceipt>;
    async fn fetch_positions(&self) -> Result<Vec<PredictionPosition>>;
    async fn exit_position(&self, position: &PredictionPosition, fraction: f64)
        -> Result<TxReceipt>;
}

#[async_trait]
pub trait StakingService: Send + Sync {
    async fn stake_sol(&self, amount: f64) -> Result<TxReceipt>;
    async fn instant_unstake(&self, amount: f64) -> Result<TxReceipt>;
    async fn get_stake_position(&self, sol_price_usd: f64) -> Result<StakePosition>;
}

/// Live deposit/borrow APYs from the lending protocol.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LendingApys {
    /// asset -> deposit APY (fraction, 0.05 = 5%).
    pub deposit: HashMap<String, f64>,
    /// asset -> borrow APY (fraction).
    pub borrow: HashMap<String, f64>,
}

/// One loopable LST listed by the lending protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LstAsset {
    pub symbol: String,
    pub staking_apy: f64,
    pub max_ltv: f64,
}

#[async_trait]
pub trait LendingProtocol: Send + Sync {
    async fn get_position(&self) -> Result<LendingAccount>;
    async fn get_apys(&self) -> Result<LendingApys>;
    async fn deposit(&self, asset: &str, amount: f64) -> Result<TxReceipt>;
    async fn borrow(&self, asset: &str, amount: f64) -> Result<TxReceipt>;
    async fn repay(&self, asset: &str, amount: f64) -> Result<TxReceipt>;
    async fn loop_lst(&self, lst: &str, amount: f64) -> Result<TxReceipt>;
    async fn unwind_lst_loop(&self) -> Result<TxReceipt>;
    async fn get_lst_assets(&self) -> Result<Vec<LstAsset>>;
}

/// A scored pool candidate from discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolCandidate {
    pub venue: String,
    pub chain: String,
    pub address: String,
    pub pair: String,
    pub tick_spacing: u32,
    pub fee_rate_bps: u32,
    pub tvl_usd: f64,
    pub volume_24h_usd: f64,
    pub apr: f64,
    pub stable: bool,
}

/// Request to open a concentrated-LP position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenLpRequest {
    pub pool_address: String,
    pub pair: String,
    pub size_usd: f64,
    /// Half-width of the range around the current price, as a fraction.
    pub range_width: f64,
}

#[async_trait]
pub trait LpVenue: Send + Sync {
    fn venue_name(&self) -> &str;
    async fn get_positions(&self) -> Result<Vec<LpPosition>>;
    async fn open_position(&self, request: OpenLpRequest) -> Result<TxReceipt>;
    async fn rebalance_position(&self, position_id: &str) -> Result<TxReceipt>;
    async fn claim_fees(&self, position_id: &str) -> Result<TxReceipt>;
    async fn discover_pools(&self) -> Result<Vec<PoolCandidate>>;
}

/// A bridge/flash-arb opportunity with profit already netted of costs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashArbOpportunity {
    pub route: String,
    pub size_usd: f64,
    pub net_profit_usd: f64,
}

#[async_trait]
pub trait BridgeService: Send + Sync {
    async fn scan_for_opportunity(&self) -> Result<Option<FlashArbOpportunity>>;
    async fn execute_flash_arb(&self, opportunity: &FlashArbOpportunity) -> Result<TxReceipt>;
}

/// Outbound publication sinks. Absent sinks are skipped silently.
#[async_trait]
pub trait PublicationSink: Send + Sync {
    async fn post_to_x(&self, content: &str) -> Result<()>;
    async fn post_to_channel(&self, content: &str) -> Result<()>;
    async fn post_to_admin(&self, content: &str) -> Result<()>;
    async fn post_to_farcaster(&self, content: &str, channel: &str) -> Result<()>;
    async fn post_to_telegram(&self, chat_id: i64, content: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatSeverity {
    Critical,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Threat {
    pub severity: ThreatSeverity,
    pub description: String,
}

/// Verdict from the outbound content filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanVerdict {
    pub clean: bool,
    pub threats: Vec<Threat>,
}

impl ScanVerdict {
    pub fn has_critical(&self) -> bool {
        self.threats
            .iter()
            .any(|t| t.severity == ThreatSeverity::Critical)
    }
}

/// Read-only after construction; safe to share across handlers.
pub trait ContentFilter: Send + Sync {
    fn scan_outbound(&self, text: &str, destination: &str) -> ScanVerdict;
}

/// Closed-position history used by the learning retrospective.
#[async_trait]
pub trait PositionLedger: Send + Sync {
    async fn closed_positions(&self, since: DateTime<Utc>) -> Result<Vec<ClosedPosition>>;
}
