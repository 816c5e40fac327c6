use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::SettlementConfig;
use crate::notify::Notifier;
use crate::services::{BetEngine, DrawScheduler, LotteryRegistry, SettlementEngine, WalletService};
use crate::store::Store;

/// Application state: every engine wired explicitly at startup so
/// handlers and tests see the same construction path.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub wallet: Arc<WalletService>,
    pub registry: Arc<LotteryRegistry>,
    pub bets: Arc<BetEngine>,
    pub settlement: Arc<SettlementEngine>,
    pub scheduler: Arc<DrawScheduler>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        settlement_config: SettlementConfig,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let wallet = Arc::new(WalletService::new(store.clone()));
        let registry = Arc::new(LotteryRegistry::new(store.clone()));
        let bets = Arc::new(BetEngine::new(
            store.clone(),
            wallet.clone(),
            registry.clone(),
        ));
        let settlement = Arc::new(SettlementEngine::new(
            store.clone(),
            wallet.clone(),
            registry.clone(),
            notifier,
            settlement_config,
        ));
        let scheduler = Arc::new(DrawScheduler::new(store.clone()));

        Self {
            store,
            wallet,
            registry,
            bets,
            settlement,
            scheduler,
            metrics,
        }
    }
}
