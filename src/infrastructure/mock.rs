//! Mock collaborators for tests.
//!
//! Every mock records the side-effectful calls it receives so tests can
//! assert that approval-tier and dry-run decisions never reach a
//! collaborator.

use crate::domain::learning::ClosedPosition;
use crate::domain::portfolio::{
    LendingAccount, LpPosition, PerpAccountSummary, StakePosition, TokenBalance,
};
use crate::domain::ports::{
    BridgeService, ContentFilter, FlashArbOpportunity, HedgeRequest, LendingApys, LendingProtocol,
    LpVenue, LstAsset, MarketDataSource, OpenLpRequest, PerpVenue, PoolCandidate,
    PositionLedger, PredictionMarket, PredictionOpportunity, PredictionPosition, PriceQuote,
    PublicationSink, ScanVerdict, ScoutContext, StakingService, Threat, ThreatSeverity, TxReceipt,
    WalletService,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

fn receipt(prefix: &str) -> TxReceipt {
    TxReceipt {
        tx_id: format!("{}-{}", prefix, uuid::Uuid::new_v4()),
        detail: None,
    }
}

/// Shared call log so a test can assert exactly which side effects ran.
#[derive(Clone, Default)]
pub struct CallLog {
    calls: Arc<RwLock<Vec<String>>>,
}

impl CallLog {
    pub async fn record(&self, call: impl Into<String>) {
        self.calls.write().await.push(call.into());
    }

    pub async fn calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }

    pub async fn is_empty(&self) -> bool {
        self.calls.read().await.is_empty()
    }

    pub async fn count_matching(&self, needle: &str) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| c.contains(needle))
            .count()
    }
}

#[derive(Clone, Default)]
pub struct MockMarketDataSource {
    prices: Arc<RwLock<HashMap<String, PriceQuote>>>,
}

impl MockMarketDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_price(&self, symbol: &str, usd: f64) {
        self.prices.write().await.insert(
            symbol.to_string(),
            PriceQuote {
                usd,
                change_24h_pct: 0.0,
            },
        );
    }
}

#[async_trait]
impl MarketDataSource for MockMarketDataSource {
    async fn get_price(&self, symbol: &str) -> Result<f64> {
        self.prices
            .read()
            .await
            .get(symbol)
            .map(|q| q.usd)
            .ok_or_else(|| anyhow::anyhow!("No mock price for {}", symbol))
    }

    async fn get_prices(&self, ids: &[String]) -> Result<HashMap<String, PriceQuote>> {
        let prices = self.prices.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| prices.get(id).map(|q| (id.clone(), q.clone())))
            .collect())
    }
}

#[derive(Clone, Default)]
pub struct MockWalletService {
    balances: Arc<RwLock<HashMap<String, Decimal>>>,
    tokens: Arc<RwLock<Vec<TokenBalance>>>,
}

impl MockWalletService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_balance(&self, asset: &str, amount: Decimal) {
        self.balances
            .write()
            .await
            .insert(asset.to_string(), amount);
    }

    pub async fn set_tokens(&self, tokens: Vec<TokenBalance>) {
        *self.tokens.write().await = tokens;
    }
}

#[async_trait]
impl WalletService for MockWalletService {
    async fn get_balance(&self, asset: &str) -> Result<Decimal> {
        Ok(self
            .balances
            .read()
            .await
            .get(asset)
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    async fn get_wallet_token_balances(&self) -> Result<Vec<TokenBalance>> {
        Ok(self.tokens.read().await.clone())
    }
}

#[derive(Clone)]
pub struct MockPerpVenue {
    pub log: CallLog,
    summary: Arc<RwLock<PerpAccountSummary>>,
    listed: Arc<RwLock<Vec<String>>>,
}

impl MockPerpVenue {
    pub fn new() -> Self {
        Self {
            log: CallLog::default(),
            summary: Arc::new(RwLock::new(PerpAccountSummary::default())),
            listed: Arc::new(RwLock::new(vec!["SOL".to_string(), "BTC".to_string()])),
        }
    }

    pub async fn set_summary(&self, summary: PerpAccountSummary) {
        *self.summary.write().await = summary;
    }

    pub async fn set_listed(&self, coins: Vec<String>) {
        *self.listed.write().await = coins;
    }
}

impl Default for MockPerpVenue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PerpVenue for MockPerpVenue {
    async fn get_account_summary(&self) -> Result<PerpAccountSummary> {
        Ok(self.summary.read().await.clone())
    }

    async fn hedge_treasury(&self, request: HedgeRequest) -> Result<TxReceipt> {
        self.log
            .record(format!(
                "hedge_treasury:{}:{:.2}",
                request.coin, request.exposure_usd
            ))
            .await;
        Ok(receipt("hedge"))
    }

    async fn close_position(&self, coin: &str, size: f64, is_buy: bool) -> Result<TxReceipt> {
        self.log
            .record(format!("close_position:{}:{:.4}:{}", coin, size, is_buy))
            .await;
        Ok(receipt("close"))
    }

    async fn get_hl_listed_coins(&self) -> Result<Vec<String>> {
        Ok(self.listed.read().await.clone())
    }
}

#[derive(Clone)]
pub struct MockPredictionMarket {
    pub log: CallLog,
    opportunities: Arc<RwLock<Vec<PredictionOpportunity>>>,
    positions: Arc<RwLock<Vec<PredictionPosition>>>,
}

impl MockPredictionMarket {
    pub fn new() -> Self {
        Self {
            log: CallLog::default(),
            opportunities: Arc::new(RwLock::new(Vec::new())),
            positions: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn set_opportunities(&self, opportunities: Vec<PredictionOpportunity>) {
        *self.opportunities.write().await = opportunities;
    }

    pub async fn set_positions(&self, positions: Vec<PredictionPosition>) {
        *self.positions.write().await = positions;
    }
}

impl Default for MockPredictionMarket {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PredictionMarket for MockPredictionMarket {
    async fn scan_opportunities(
        &self,
        _headroom_usd: f64,
        _scout: &ScoutContext,
    ) -> Result<Vec<PredictionOpportunity>> {
        Ok(self.opportunities.read().await.clone())
    }

    async fn fetch_market(&self, market_id: &str) -> Result<serde_json::Value> {
        Ok(serde_json::json!({"id": market_id}))
    }

    async fn place_buy_order(
        &self,
        market_id: &str,
        _token_id: &str,
        size_usd: f64,
    ) -> Result<TxReceipt> {
        self.log
            .record(format!("place_buy_order:{}:{:.2}", market_id, size_usd))
            .await;
        Ok(receipt("poly"))
    }

    async fn fetch_positions(&self) -> Result<Vec<PredictionPosition>> {
        Ok(self.positions.read().await.clone())
    }

    async fn exit_position(
        &self,
        position: &PredictionPosition,
        fraction: f64,
    ) -> Result<TxReceipt> {
        self.log
            .record(format!("exit_position:{}:{:.2}", position.market_id, fraction))
            .await;
        Ok(receipt("poly-exit"))
    }
}

#[derive(Clone)]
pub struct MockStakingService {
    pub log: CallLog,
    position: Arc<RwLock<StakePosition>>,
}

impl MockStakingService {
    pub fn new() -> Self {
        Self {
            log: CallLog::default(),
            position: Arc::new(RwLock::new(StakePosition::default())),
        }
    }

    pub async fn set_position(&self, position: StakePosition) {
        *self.position.write().await = position;
    }
}

impl Default for MockStakingService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StakingService for MockStakingService {
    async fn stake_sol(&self, amount: f64) -> Result<TxReceipt> {
        self.log.record(format!("stake_sol:{:.4}", amount)).await;
        Ok(receipt("stake"))
    }

    async fn instant_unstake(&self, amount: f64) -> Result<TxReceipt> {
        self.log
            .record(format!("instant_unstake:{:.4}", amount))
            .await;
        Ok(receipt("unstake"))
    }

    async fn get_stake_position(&self, _sol_price_usd: f64) -> Result<StakePosition> {
        Ok(self.position.read().await.clone())
    }
}

#[derive(Clone)]
pub struct MockLendingProtocol {
    pub log: CallLog,
    position: Arc<RwLock<LendingAccount>>,
    apys: Arc<RwLock<LendingApys>>,
    lst_assets: Arc<RwLock<Vec<LstAsset>>>,
    /// When set, deposit calls fail; used to exercise the borrow rollback.
    fail_deposits: Arc<RwLock<bool>>,
}

impl MockLendingProtocol {
    pub fn new() -> Self {
        Self {
            log: CallLog::default(),
            position: Arc::new(RwLock::new(LendingAccount::default())),
            apys: Arc::new(RwLock::new(LendingApys::default())),
            lst_assets: Arc::new(RwLock::new(Vec::new())),
            fail_deposits: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn set_position(&self, position: LendingAccount) {
        *self.position.write().await = position;
    }

    pub async fn set_apys(&self, apys: LendingApys) {
        *self.apys.write().await = apys;
    }

    pub async fn set_lst_assets(&self, assets: Vec<LstAsset>) {
        *self.lst_assets.write().await = assets;
    }

    pub async fn fail_deposits(&self, fail: bool) {
        *self.fail_deposits.write().await = fail;
    }
}

impl Default for MockLendingProtocol {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LendingProtocol for MockLendingProtocol {
    async fn get_position(&self) -> Result<LendingAccount> {
        Ok(self.position.read().await.clone())
    }

    async fn get_apys(&self) -> Result<LendingApys> {
        Ok(self.apys.read().await.clone())
    }

    async fn deposit(&self, asset: &str, amount: f64) -> Result<TxReceipt> {
        if *self.fail_deposits.read().await {
            anyhow::bail!("deposit rejected by venue");
        }
        self.log
            .record(format!("deposit:{}:{:.2}", asset, amount))
            .await;
        Ok(receipt("deposit"))
    }

    async fn borrow(&self, asset: &str, amount: f64) -> Result<TxReceipt> {
        self.log
            .record(format!("borrow:{}:{:.2}", asset, amount))
            .await;
        Ok(receipt("borrow"))
    }

    async fn repay(&self, asset: &str, amount: f64) -> Result<TxReceipt> {
        self.log
            .record(format!("repay:{}:{:.2}", asset, amount))
            .await;
        Ok(receipt("repay"))
    }

    async fn loop_lst(&self, lst: &str, amount: f64) -> Result<TxReceipt> {
        self.log
            .record(format!("loop_lst:{}:{:.2}", lst, amount))
            .await;
        Ok(receipt("loop"))
    }

    async fn unwind_lst_loop(&self) -> Result<TxReceipt> {
        self.log.record("unwind_lst_loop").await;
        Ok(receipt("unwind"))
    }

    async fn get_lst_assets(&self) -> Result<Vec<LstAsset>> {
        Ok(self.lst_assets.read().await.clone())
    }
}

#[derive(Clone)]
pub struct MockLpVenue {
    name: String,
    pub log: CallLog,
    positions: Arc<RwLock<Vec<LpPosition>>>,
    pools: Arc<RwLock<Vec<PoolCandidate>>>,
}

impl MockLpVenue {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            log: CallLog::default(),
            positions: Arc::new(RwLock::new(Vec::new())),
            pools: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn set_positions(&self, positions: Vec<LpPosition>) {
        *self.positions.write().await = positions;
    }

    pub async fn set_pools(&self, pools: Vec<PoolCandidate>) {
        *self.pools.write().await = pools;
    }
}

#[async_trait]
impl LpVenue for MockLpVenue {
    fn venue_name(&self) -> &str {
        &self.name
    }

    async fn get_positions(&self) -> Result<Vec<LpPosition>> {
        Ok(self.positions.read().await.clone())
    }

    async fn open_position(&self, request: OpenLpRequest) -> Result<TxReceipt> {
        self.log
            .record(format!(
                "open_position:{}:{:.2}",
                request.pair, request.size_usd
            ))
            .await;
        Ok(receipt("lp-open"))
    }

    async fn rebalance_position(&self, position_id: &str) -> Result<TxReceipt> {
        self.log
            .record(format!("rebalance_position:{}", position_id))
            .await;
        Ok(receipt("lp-rebalance"))
    }

    async fn claim_fees(&self, position_id: &str) -> Result<TxReceipt> {
        self.log.record(format!("claim_fees:{}", position_id)).await;
        Ok(receipt("lp-claim"))
    }

    async fn discover_pools(&self) -> Result<Vec<PoolCandidate>> {
        Ok(self.pools.read().await.clone())
    }
}

#[derive(Clone)]
pub struct MockBridgeService {
    pub log: CallLog,
    opportunity: Arc<RwLock<Option<FlashArbOpportunity>>>,
}

impl MockBridgeService {
    pub fn new() -> Self {
        Self {
            log: CallLog::default(),
            opportunity: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn set_opportunity(&self, opportunity: Option<FlashArbOpportunity>) {
        *self.opportunity.write().await = opportunity;
    }
}

impl Default for MockBridgeService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BridgeService for MockBridgeService {
    async fn scan_for_opportunity(&self) -> Result<Option<FlashArbOpportunity>> {
        Ok(self.opportunity.read().await.clone())
    }

    async fn execute_flash_arb(&self, opportunity: &FlashArbOpportunity) -> Result<TxReceipt> {
        self.log
            .record(format!("execute_flash_arb:{}", opportunity.route))
            .await;
        Ok(receipt("arb"))
    }
}

/// Recording sink: stores every publish by destination.
#[derive(Clone, Default)]
pub struct RecordingSink {
    posts: Arc<RwLock<Vec<(String, String)>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn posts(&self) -> Vec<(String, String)> {
        self.posts.read().await.clone()
    }

    pub async fn posts_to(&self, destination: &str) -> Vec<String> {
        self.posts
            .read()
            .await
            .iter()
            .filter(|(dest, _)| dest == destination)
            .map(|(_, content)| content.clone())
            .collect()
    }
}

#[async_trait]
impl PublicationSink for RecordingSink {
    async fn post_to_x(&self, content: &str) -> Result<()> {
        self.posts
            .write()
            .await
            .push(("x".to_string(), content.to_string()));
        Ok(())
    }

    async fn post_to_channel(&self, content: &str) -> Result<()> {
        self.posts
            .write()
            .await
            .push(("channel".to_string(), content.to_string()));
        Ok(())
    }

    async fn post_to_admin(&self, content: &str) -> Result<()> {
        self.posts
            .write()
            .await
            .push(("admin".to_string(), content.to_string()));
        Ok(())
    }

    async fn post_to_farcaster(&self, content: &str, channel: &str) -> Result<()> {
        self.posts
            .write()
            .await
            .push((format!("farcaster:{}", channel), content.to_string()));
        Ok(())
    }

    async fn post_to_telegram(&self, chat_id: i64, content: &str) -> Result<()> {
        self.posts
            .write()
            .await
            .push((format!("telegram:{}", chat_id), content.to_string()));
        Ok(())
    }
}

/// Content filter with a fixed list of trigger substrings.
pub struct KeywordContentFilter {
    critical_markers: Vec<String>,
    warning_markers: Vec<String>,
}

impl KeywordContentFilter {
    pub fn new(critical: &[&str], warning: &[&str]) -> Self {
        Self {
            critical_markers: critical.iter().map(|s| s.to_string()).collect(),
            warning_markers: warning.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ContentFilter for KeywordContentFilter {
    fn scan_outbound(&self, text: &str, _destination: &str) -> ScanVerdict {
        let mut threats = Vec::new();
        for marker in &self.critical_markers {
            if text.contains(marker.as_str()) {
                threats.push(Threat {
                    severity: ThreatSeverity::Critical,
                    description: format!("matched blocked marker '{}'", marker),
                });
            }
        }
        for marker in &self.warning_markers {
            if text.contains(marker.as_str()) {
                threats.push(Threat {
                    severity: ThreatSeverity::Warning,
                    description: format!("matched warning marker '{}'", marker),
                });
            }
        }
        ScanVerdict {
            clean: threats.is_empty(),
            threats,
        }
    }
}

#[derive(Clone, Default)]
pub struct MockPositionLedger {
    positions: Arc<RwLock<Vec<ClosedPosition>>>,
}

impl MockPositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_positions(&self, positions: Vec<ClosedPosition>) {
        *self.positions.write().await = positions;
    }
}

#[async_trait]
impl PositionLedger for MockPositionLedger {
    async fn closed_positions(&self, since: DateTime<Utc>) -> Result<Vec<ClosedPosition>> {
        Ok(self
            .positions
            .read()
            .await
            .iter()
            .filter(|p| p.closed_at > since)
            .cloned()
            .collect())
    }
}
