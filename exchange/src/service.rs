//! Exchange service: the operations exposed to request handlers.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use coinrate_common::{
    AccountId, ExchangeError, RateOverride, RateRecord, Result, TradeDirection,
};
use coinrate_fx::{RateCascade, RateState, SharedRateCache};
use coinrate_ledger::{Account, BalanceUpdate, Balances, Ledger};

use crate::config::BootstrapConfig;
use crate::executor::{TradeExecutor, TradeQuote, TradeRequest, TradeResult};
use crate::metrics::{Metrics, SharedMetrics};

/// Identity attached to a request by the session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Caller {
    pub account_id: Option<AccountId>,
    pub is_admin: bool,
}

impl Caller {
    /// A request with no resolved account.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn account(account_id: AccountId, is_admin: bool) -> Self {
        Self {
            account_id: Some(account_id),
            is_admin,
        }
    }

    pub fn require_account(&self) -> Result<AccountId> {
        self.account_id.ok_or(ExchangeError::Unauthenticated)
    }

    pub fn require_admin(&self) -> Result<AccountId> {
        let id = self.require_account()?;
        if !self.is_admin {
            return Err(ExchangeError::Unauthorized(
                "administrator access required".to_string(),
            ));
        }
        Ok(id)
    }
}

/// Holds the rate cache, ledger and executor shared by every request.
pub struct ExchangeService {
    rates: SharedRateCache,
    cascade: Option<Arc<RateCascade>>,
    ledger: Arc<Ledger>,
    executor: TradeExecutor,
    metrics: SharedMetrics,
}

impl ExchangeService {
    /// Create a service over an existing cache and ledger.
    pub fn new(rates: SharedRateCache, ledger: Arc<Ledger>, executor: TradeExecutor) -> Self {
        Self {
            rates,
            cascade: None,
            ledger,
            executor,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Report the cascade's counters alongside the service metrics.
    pub fn with_cascade(mut self, cascade: Arc<RateCascade>) -> Self {
        self.cascade = Some(cascade);
        self
    }

    /// Create the administrative account if it does not exist yet.
    #[instrument(skip(self, bootstrap), fields(username = %bootstrap.admin_username))]
    pub fn init(&self, bootstrap: &BootstrapConfig) -> Result<Account> {
        if let Some(existing) = self.ledger.find_by_username(&bootstrap.admin_username) {
            if !existing.is_admin {
                return Err(ExchangeError::ConfigurationError(format!(
                    "account {} exists but is not an administrator",
                    existing.username
                )));
            }
            debug!(account = %existing.id, "Administrator already present");
            return Ok(existing);
        }

        let admin = self.ledger.seed_account(
            &bootstrap.admin_username,
            true,
            Balances::new(bootstrap.admin_primary, bootstrap.admin_secondary),
        )?;
        info!(account = %admin.id, "Administrator account created");
        Ok(admin)
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn rates(&self) -> &SharedRateCache {
        &self.rates
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    /// Resolve the caller for a request carrying `account_id`.
    ///
    /// An id that names no account is treated as unauthenticated.
    pub fn caller(&self, account_id: Option<AccountId>) -> Result<Caller> {
        match account_id {
            None => Ok(Caller::anonymous()),
            Some(id) => self
                .ledger
                .get_account(&id)
                .map(|account| Caller::account(account.id, account.is_admin))
                .map_err(|_| ExchangeError::Unauthenticated),
        }
    }

    /// Current rate, refreshed per the cache policy.
    #[instrument(skip(self))]
    pub async fn current_rate(&self) -> Result<RateRecord> {
        Ok(self.rates.get_current_rate().await?)
    }

    pub fn rate_state(&self) -> RateState {
        self.rates.state()
    }

    /// Pin the rate. Admin only.
    #[instrument(skip(self, request), fields(price = %request.price))]
    pub fn set_rate_override(&self, caller: &Caller, request: &RateOverride) -> Result<RateRecord> {
        let admin = caller.require_admin()?;
        let record = self.rates.set_override(request)?;
        self.metrics.rate_override_set();
        info!(admin = %admin, "Rate pinned by administrator");
        Ok(record)
    }

    /// Drop any override and fetch a live rate. Admin only.
    ///
    /// Fails when every provider is unreachable; the previous record, pinned
    /// or not, stays in place.
    #[instrument(skip(self))]
    pub async fn reset_rate(&self, caller: &Caller) -> Result<RateRecord> {
        let admin = caller.require_admin()?;
        match self.rates.clear_override().await {
            Ok(record) => {
                self.metrics.rate_reset(true);
                info!(admin = %admin, source = %record.source, "Rate reset to live");
                Ok(record)
            }
            Err(e) => {
                self.metrics.rate_reset(false);
                warn!(admin = %admin, error = %e, "Rate reset failed");
                Err(e.into())
            }
        }
    }

    /// Spend `primary_amount` for secondary.
    pub async fn buy(&self, caller: &Caller, primary_amount: Decimal) -> Result<TradeResult> {
        self.trade(caller, TradeDirection::Buy, primary_amount).await
    }

    /// Spend `secondary_amount` for primary.
    pub async fn sell(&self, caller: &Caller, secondary_amount: Decimal) -> Result<TradeResult> {
        self.trade(caller, TradeDirection::Sell, secondary_amount).await
    }

    #[instrument(skip(self, caller), fields(account = ?caller.account_id))]
    async fn trade(
        &self,
        caller: &Caller,
        direction: TradeDirection,
        amount: Decimal,
    ) -> Result<TradeResult> {
        let account_id = caller.require_account()?;

        let outcome = match self.trade_rate().await {
            Ok(rate) => {
                let request = TradeRequest {
                    account_id,
                    direction,
                    amount,
                };
                self.executor.execute(&self.ledger, &request, &rate)
            }
            Err(e) => Err(e),
        };

        match &outcome {
            Ok(_) => self.metrics.trade_executed(direction),
            Err(_) => self.metrics.trade_rejected(direction),
        }
        outcome
    }

    /// Preview a trade at the current rate without touching balances.
    #[instrument(skip(self))]
    pub async fn quote(&self, direction: TradeDirection, amount: Decimal) -> Result<TradeQuote> {
        let rate = self.trade_rate().await?;
        self.executor.quote(direction, amount, &rate)
    }

    /// Overwrite an account's balances. Admin only.
    #[instrument(skip(self, caller, update))]
    pub fn set_account_balance(
        &self,
        caller: &Caller,
        account_id: AccountId,
        update: &BalanceUpdate,
    ) -> Result<Account> {
        caller.require_admin()?;
        self.ledger.set_balances(&account_id, update)
    }

    /// Open a non-administrative account with zero balances.
    #[instrument(skip(self))]
    pub fn register(&self, username: &str) -> Result<Account> {
        let account = self.ledger.open_account(username, false)?;
        self.metrics.account_opened();
        Ok(account)
    }

    /// The caller's own account.
    pub fn account(&self, caller: &Caller) -> Result<Account> {
        let id = caller.require_account()?;
        self.ledger.get_account(&id)
    }

    /// Prometheus text for the service, cache and cascade.
    pub fn render_metrics(&self) -> String {
        let cascade = self.cascade.as_ref().map(|c| c.stats());
        self.metrics
            .to_prometheus(&self.rates.stats(), cascade.as_ref())
    }

    /// The rate a trade may execute at. Synthetic fallback prices are
    /// informational only.
    async fn trade_rate(&self) -> Result<RateRecord> {
        match self.rates.get_current_rate().await {
            Ok(rate) if rate.synthetic => {
                debug!("Only a synthetic rate is available; refusing to trade");
                Err(ExchangeError::RateUnavailable)
            }
            Ok(rate) => Ok(rate),
            Err(e) => {
                debug!(error = %e, "No rate available for trade");
                Err(ExchangeError::RateUnavailable)
            }
        }
    }
}

/// Shared exchange service.
pub type SharedExchangeService = Arc<ExchangeService>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TradeConfig;
    use coinrate_fx::{MockRateSource, RateCache, RateCacheConfig, RateSource};
    use coinrate_ledger::EntryKind;
    use rust_decimal_macros::dec;

    struct Fixture {
        service: ExchangeService,
        source: Arc<MockRateSource>,
        admin: Caller,
    }

    fn fixture_with(source: MockRateSource, cache_config: RateCacheConfig) -> Fixture {
        let source = Arc::new(source);
        let rates = Arc::new(RateCache::with_config(source.clone(), cache_config));
        let service = ExchangeService::new(
            rates,
            Arc::new(Ledger::new()),
            TradeExecutor::new(TradeConfig::unrestricted()),
        );
        let admin = service.init(&BootstrapConfig::default()).unwrap();
        Fixture {
            service,
            source,
            admin: Caller::account(admin.id, true),
        }
    }

    fn fixture(price: Decimal) -> Fixture {
        fixture_with(MockRateSource::new("mock", price), RateCacheConfig::default())
    }

    fn trader(service: &ExchangeService, primary: Decimal, secondary: Decimal) -> Caller {
        let account = service
            .ledger()
            .seed_account("trader", false, Balances::new(primary, secondary))
            .unwrap();
        Caller::account(account.id, false)
    }

    #[tokio::test]
    async fn test_current_rate_fetches_once_within_interval() {
        let f = fixture(dec!(50000));

        let first = f.service.current_rate().await.unwrap();
        let second = f.service.current_rate().await.unwrap();

        assert_eq!(first.price, dec!(50000));
        assert_eq!(second.price, dec!(50000));
        assert_eq!(f.source.calls(), 1);
        assert_eq!(f.service.rate_state(), RateState::Fresh);
    }

    #[tokio::test]
    async fn test_failover_result_is_cached_as_live() {
        let sources: Vec<Arc<dyn RateSource>> = vec![
            Arc::new(MockRateSource::failing("p1")),
            Arc::new(MockRateSource::failing("p2")),
            Arc::new(MockRateSource::new("p3", dec!(61000))),
        ];
        let cascade = Arc::new(RateCascade::new(sources));
        let rates = Arc::new(RateCache::new(cascade.clone()));
        let service = ExchangeService::new(rates, Arc::new(Ledger::new()), TradeExecutor::default())
            .with_cascade(cascade);

        let record = service.current_rate().await.unwrap();
        assert_eq!(record.price, dec!(61000));
        assert_eq!(record.source, "p3");
        assert!(!record.is_manual_override);
        assert!(service.render_metrics().contains("coinrate_provider_failures_total 2"));
    }

    #[tokio::test]
    async fn test_override_requires_admin() {
        let f = fixture(dec!(50000));
        let user = trader(&f.service, dec!(0), dec!(0));

        let err = f
            .service
            .set_rate_override(&user, &RateOverride::price(dec!(1)))
            .unwrap_err();
        assert_eq!(err.error_code(), "UNAUTHORIZED");

        let err = f
            .service
            .set_rate_override(&Caller::anonymous(), &RateOverride::price(dec!(1)))
            .unwrap_err();
        assert_eq!(err, ExchangeError::Unauthenticated);

        let err = f.service.reset_rate(&user).await.unwrap_err();
        assert_eq!(err.error_code(), "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_override_then_reset() {
        let f = fixture(dec!(50000));

        f.service
            .set_rate_override(&f.admin, &RateOverride::price(dec!(70000)))
            .unwrap();
        assert_eq!(f.service.current_rate().await.unwrap().price, dec!(70000));
        assert_eq!(f.source.calls(), 0);

        f.source.set_price(dec!(52000));
        let live = f.service.reset_rate(&f.admin).await.unwrap();
        assert_eq!(live.price, dec!(52000));
        assert!(!live.is_manual_override);
        assert_eq!(f.service.rate_state(), RateState::Fresh);
    }

    #[tokio::test]
    async fn test_reset_fails_when_providers_down() {
        let f = fixture(dec!(50000));
        f.service
            .set_rate_override(&f.admin, &RateOverride::price(dec!(70000)))
            .unwrap();
        f.source.fail();

        let err = f.service.reset_rate(&f.admin).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(f.service.rate_state(), RateState::Pinned);
        assert_eq!(f.service.metrics().snapshot().rate_reset_failures, 1);
    }

    #[tokio::test]
    async fn test_buy_and_sell() {
        let f = fixture(dec!(50000));
        let user = trader(&f.service, dec!(1000.00), dec!(0));

        let bought = f.service.buy(&user, dec!(500)).await.unwrap();
        assert_eq!(bought.resulting_primary_balance, dec!(500.00));
        assert_eq!(bought.resulting_secondary_balance, dec!(0.01));

        f.service
            .set_rate_override(&f.admin, &RateOverride::price(dec!(60000)))
            .unwrap();
        let sold = f.service.sell(&user, dec!(0.005)).await.unwrap();
        assert_eq!(sold.amount_primary, dec!(300.00));
        assert_eq!(sold.resulting_primary_balance, dec!(800.00));
        assert_eq!(sold.resulting_secondary_balance, dec!(0.005));

        let snapshot = f.service.metrics().snapshot();
        assert_eq!(snapshot.buys_executed, 1);
        assert_eq!(snapshot.sells_executed, 1);
    }

    #[tokio::test]
    async fn test_trade_requires_account() {
        let f = fixture(dec!(50000));
        let err = f.service.buy(&Caller::anonymous(), dec!(10)).await.unwrap_err();
        assert_eq!(err, ExchangeError::Unauthenticated);
    }

    #[tokio::test]
    async fn test_trade_without_rate_is_rejected() {
        let f = fixture_with(MockRateSource::failing("down"), RateCacheConfig::default());
        let user = trader(&f.service, dec!(1000), dec!(0));

        let err = f.service.buy(&user, dec!(100)).await.unwrap_err();
        assert_eq!(err, ExchangeError::RateUnavailable);

        let account = f.service.account(&user).unwrap();
        assert_eq!(account.primary_balance, dec!(1000));
        assert_eq!(f.service.metrics().snapshot().buys_rejected, 1);
    }

    #[tokio::test]
    async fn test_synthetic_rate_is_served_but_not_traded() {
        let config = RateCacheConfig {
            fallback_price: Some(dec!(65000)),
            ..Default::default()
        };
        let f = fixture_with(MockRateSource::failing("down"), config);
        let user = trader(&f.service, dec!(1000), dec!(0));

        let record = f.service.current_rate().await.unwrap();
        assert!(record.synthetic);
        assert_eq!(record.price, dec!(65000));

        let err = f.service.buy(&user, dec!(100)).await.unwrap_err();
        assert_eq!(err, ExchangeError::RateUnavailable);
        let err = f.service.quote(TradeDirection::Buy, dec!(100)).await.unwrap_err();
        assert_eq!(err, ExchangeError::RateUnavailable);
    }

    #[tokio::test]
    async fn test_quote_uses_current_rate() {
        let f = fixture(dec!(40000));
        let quote = f.service.quote(TradeDirection::Buy, dec!(100)).await.unwrap();
        assert_eq!(quote.amount_secondary, dec!(0.0025));
        assert_eq!(quote.rate_used, dec!(40000));
    }

    #[test]
    fn test_quote_from_blocking_context() {
        let f = fixture(dec!(50000));
        let quote = tokio_test::block_on(f.service.quote(TradeDirection::Sell, dec!(0.001))).unwrap();
        assert_eq!(quote.amount_primary, dec!(50.00));
        assert_eq!(quote.amount_secondary, dec!(0.001));
    }

    #[tokio::test]
    async fn test_admin_sets_balances() {
        let f = fixture(dec!(50000));
        let user = trader(&f.service, dec!(10), dec!(0));
        let id = user.account_id.unwrap();

        let update = BalanceUpdate {
            primary: None,
            secondary: Some(dec!(1.5)),
        };
        let err = f.service.set_account_balance(&user, id, &update).unwrap_err();
        assert_eq!(err.error_code(), "UNAUTHORIZED");

        let account = f.service.set_account_balance(&f.admin, id, &update).unwrap();
        assert_eq!(account.primary_balance, dec!(10));
        assert_eq!(account.secondary_balance, dec!(1.5));
        assert_eq!(
            f.service.ledger().entries(&id).last().unwrap().kind,
            EntryKind::AdminSet
        );

        let negative = BalanceUpdate {
            primary: Some(dec!(-1)),
            secondary: None,
        };
        let err = f.service.set_account_balance(&f.admin, id, &negative).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_AMOUNT");

        let err = f
            .service
            .set_account_balance(&f.admin, AccountId::new(), &update)
            .unwrap_err();
        assert_eq!(err.error_code(), "ACCOUNT_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_register_and_resolve_caller() {
        let f = fixture(dec!(50000));

        let account = f.service.register("satoshi").unwrap();
        assert!(!account.is_admin);
        assert_eq!(account.primary_balance, Decimal::ZERO);

        let err = f.service.register("satoshi").unwrap_err();
        assert_eq!(err.error_code(), "DUPLICATE_ACCOUNT");

        let caller = f.service.caller(Some(account.id)).unwrap();
        assert_eq!(caller, Caller::account(account.id, false));
        assert_eq!(f.service.account(&caller).unwrap().username, "satoshi");

        let err = f.service.caller(Some(AccountId::new())).unwrap_err();
        assert_eq!(err, ExchangeError::Unauthenticated);
        assert_eq!(f.service.caller(None).unwrap(), Caller::anonymous());
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let f = fixture(dec!(50000));
        let again = f.service.init(&BootstrapConfig::default()).unwrap();
        assert_eq!(Some(again.id), f.admin.account_id);
        assert_eq!(f.service.ledger().len(), 1);
    }

    #[tokio::test]
    async fn test_init_rejects_non_admin_with_admin_name() {
        let rates = Arc::new(RateCache::new(Arc::new(MockRateSource::new("m", dec!(1)))));
        let service = ExchangeService::new(rates, Arc::new(Ledger::new()), TradeExecutor::default());
        service.register("admin").unwrap();

        let err = service.init(&BootstrapConfig::default()).unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    }
}
