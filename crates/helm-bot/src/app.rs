//! Application wiring and the decision cycle.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use helm_core::ExecutionReport;
use helm_exchange::{ExchangeClient, MarketData, RawBalance};
use helm_execution::{
    ExecutionAdapter, ExecutionService, LiveAdapter, PaperAdapter,
};
use helm_persistence::{JsonlStore, Store};
use helm_portfolio::PortfolioLedger;
use helm_risk::{KillSwitch, RiskContext, RiskEngine};

use crate::config::{AppConfig, OperatingMode};
use crate::error::{AppError, AppResult};
use crate::ingest;
use crate::market::PaperMarket;
use crate::strategy::{ConstantMixStrategy, StrategyProvider};

/// Owns every component and runs one decision cycle at a time:
/// strategies, then risk, then execution, then reconciliation, then a
/// snapshot. No state is shared across cycles except through the ledger
/// and the store.
pub struct Application {
    config: AppConfig,
    kill_switch: Arc<KillSwitch>,
    engine: RiskEngine,
    service: ExecutionService,
    ledger: PortfolioLedger,
    store: Arc<dyn Store>,
    market: Arc<dyn MarketData>,
    adapter: Arc<dyn ExecutionAdapter>,
    client: Option<Arc<dyn ExchangeClient>>,
    strategies: Vec<Box<dyn StrategyProvider>>,
}

impl Application {
    /// Paper-mode application: everything in-process, no transport.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        if config.mode == OperatingMode::Live {
            return Err(AppError::Config(
                "live mode requires an exchange transport; use Application::with_exchange"
                    .to_string(),
            ));
        }
        let market: Arc<dyn MarketData> = Arc::new(PaperMarket::new(&config.paper.prices));
        Self::build(config, None, market)
    }

    /// Live-mode application with an injected transport and market feed.
    pub fn with_exchange(
        config: AppConfig,
        client: Arc<dyn ExchangeClient>,
        market: Arc<dyn MarketData>,
    ) -> AppResult<Self> {
        Self::build(config, Some(client), market)
    }

    fn build(
        config: AppConfig,
        client: Option<Arc<dyn ExchangeClient>>,
        market: Arc<dyn MarketData>,
    ) -> AppResult<Self> {
        config.validate()?;

        let store: Arc<dyn Store> = Arc::new(JsonlStore::open(&config.store_dir)?);

        let adapter: Arc<dyn ExecutionAdapter> = match (&config.mode, &client) {
            (OperatingMode::Paper, _) => Arc::new(PaperAdapter::new(market.clone())),
            (OperatingMode::Live, Some(client)) => Arc::new(LiveAdapter::new(
                client.clone(),
                market.clone(),
                config.execution.clone(),
            )),
            (OperatingMode::Live, None) => {
                return Err(AppError::Config(
                    "live mode requires an exchange transport".to_string(),
                ))
            }
        };

        let kill_switch = Arc::new(KillSwitch::new());
        let engine = RiskEngine::new(config.risk.clone(), kill_switch.clone());
        let service = ExecutionService::new(
            adapter.clone(),
            store.clone(),
            market.clone(),
            config.execution.clone(),
        );
        let ledger = PortfolioLedger::new(config.ledger.clone());
        let strategies: Vec<Box<dyn StrategyProvider>> =
            vec![Box::new(ConstantMixStrategy::from_config(&config.strategy)?)];

        info!(
            mode = ?config.mode,
            adapter = adapter.name(),
            store = %config.store_dir,
            "application built"
        );

        Ok(Self {
            config,
            kill_switch,
            engine,
            service,
            ledger,
            store,
            market,
            adapter,
            client,
            strategies,
        })
    }

    /// Operator latch feeding the risk engine's kill switch.
    pub fn kill_switch(&self) -> Arc<KillSwitch> {
        self.kill_switch.clone()
    }

    pub fn ledger(&self) -> &PortfolioLedger {
        &self.ledger
    }

    /// Rebuild all in-memory state from the store: ledger replay from
    /// full trade/cash-flow history, snapshot history for the drawdown
    /// high-water mark, and open orders into the service's indices.
    pub fn rehydrate(&mut self) -> AppResult<()> {
        let trades = self.store.get_trades()?;
        let flows = self.store.get_cash_flows()?;
        self.ledger.replay(&trades, &flows);
        self.ledger.load_snapshots(self.store.get_snapshots()?);
        let open = self.service.load_open_orders()?;
        info!(
            trades = trades.len(),
            cash_flows = flows.len(),
            open_orders = open,
            "state rehydrated"
        );
        Ok(())
    }

    /// One full decision cycle.
    pub fn run_cycle(&mut self) -> AppResult<ExecutionReport> {
        if let Err(e) = self.adapter.heartbeat() {
            warn!(error = %e, "heartbeat refresh failed");
        }

        self.sync_ledger()?;

        let mut intents = Vec::new();
        for strategy in &self.strategies {
            intents.extend(strategy.generate_intents(&self.ledger, self.market.as_ref()));
        }

        let ctx = RiskContext::from_ledger(&self.ledger, self.market.as_ref());
        let status = self.engine.evaluate_status(&ctx);
        let plan = self.engine.build_plan(&intents, &ctx, self.market.as_ref());
        let report = self.service.execute_plan(&plan, &status)?;

        if let Err(e) = self.service.reconcile_orders() {
            warn!(error = %e, "order reconciliation failed");
        }

        if self.client.is_none() {
            // Paper fills land in this same cycle's report.
            for trade in ingest::trades_from_report(&report) {
                self.store.save_trade(&trade)?;
                self.ledger.apply_trade(&trade);
            }
            let balances = self.paper_balances();
            self.ledger.set_balances(&balances);
        }

        let snapshot = self.ledger.take_snapshot(self.market.as_ref());
        self.store.save_snapshot(&snapshot)?;
        let cutoff = Utc::now() - Duration::hours(self.config.ledger.snapshot_retention_hours);
        self.store.prune_snapshots(cutoff)?;

        info!(
            plan = %report.plan_id,
            orders = report.orders.len(),
            equity = %snapshot.equity,
            "cycle complete"
        );
        Ok(report)
    }

    /// Live mode: pull trades, cash flows, and balances from the venue
    /// and fold them into the ledger, then check for drift. Paper mode:
    /// synthesize balances from position state so equity is meaningful.
    fn sync_ledger(&mut self) -> AppResult<()> {
        let Some(client) = self.client.clone() else {
            let balances = self.paper_balances();
            self.ledger.set_balances(&balances);
            return Ok(());
        };

        let remote_trades = client.get_trades_history()?;
        for record in ingest::trades_from_history(self.store.as_ref(), &remote_trades) {
            self.store.save_trade(&record)?;
            self.ledger.apply_trade(&record);
        }

        let entries = client.get_ledger_entries()?;
        for flow in ingest::flows_from_entries(&entries) {
            self.store.save_cash_flow(&flow)?;
            self.ledger.apply_cash_flow(&flow);
        }

        let balances = client.get_balances()?;
        if self.ledger.reconcile(&balances, self.market.as_ref()) {
            warn!("drift detected, next cycle's risk gate will see it");
        }
        Ok(())
    }

    /// Paper balances: starting cash plus realized PnL minus the cost
    /// tied up in open positions, plus the positions themselves.
    fn paper_balances(&self) -> Vec<RawBalance> {
        let mut cash = self.config.paper.starting_cash_usd + self.ledger.realized_total();
        let mut balances = Vec::new();
        for position in self.ledger.positions().filter(|p| p.is_open()) {
            cash -= position.cost_basis();
            balances.push(RawBalance {
                asset: position.base_asset.clone(),
                total: position.size.inner(),
                hold: Decimal::ZERO,
            });
        }
        balances.push(RawBalance {
            asset: self.config.ledger.base_currency.clone(),
            total: cash,
            hold: Decimal::ZERO,
        });
        balances
    }

    /// Run cycles until shutdown is requested.
    pub async fn run(&mut self) -> AppResult<()> {
        self.rehydrate()?;

        let period = std::time::Duration::from_secs(self.config.cycle_interval_secs);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let outcome = tokio::task::block_in_place(|| self.run_cycle());
                    if let Err(e) = outcome {
                        error!(error = %e, "cycle failed");
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }
        self.shutdown()
    }

    /// Graceful shutdown: nothing left resting on a live venue.
    pub fn shutdown(&mut self) -> AppResult<()> {
        if self.config.execution.live {
            let canceled = self.service.cancel_all()?;
            info!(canceled, "canceled working orders on shutdown");
        }
        info!("shutdown complete");
        Ok(())
    }
}
