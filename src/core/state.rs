// Application state (AppState)

use crate::core::config::Config;
use crate::daemon::stats::{CliStatsSource, StatsSource};
use crate::daemon::sync::ConfigSynchronizer;
use crate::services::{auth::AuthService, entitlement::EntitlementService, traffic::TrafficReader};
use crate::stores::{payment_store::PaymentStore, tariff_catalog::TariffCatalog, user_store::UserStore};
use crate::wal::wal::Wal;
use anyhow::{Context, Result};
use std::sync::Arc;

/// Shared application state
///
/// Built once at startup; every store and service handle lives here and is
/// passed to handlers through axum's `State`.
#[derive(Clone)]
pub struct AppState {
    /// Accounts
    pub users: Arc<UserStore>,

    /// Tariff catalog from configuration
    pub tariffs: Arc<TariffCatalog>,

    pub payments: Arc<PaymentStore>,

    /// Daemon config writer and restart queue
    pub sync: Arc<ConfigSynchronizer>,

    pub entitlement: Arc<EntitlementService>,

    pub auth: Arc<AuthService>,

    pub traffic: Arc<TrafficReader>,

    /// Journal shared by the user and payment stores
    pub wal: Arc<Wal>,

    /// Configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Must be called inside a tokio runtime
    pub fn new(config: Config, wal: Wal) -> Result<Self> {
        let source = Arc::new(CliStatsSource::new(
            config.stats.command.clone(),
            config.stats.server.clone(),
        ));

        Self::with_stats_source(config, wal, source)
    }

    pub fn with_stats_source(
        config: Config,
        wal: Wal,
        source: Arc<dyn StatsSource>,
    ) -> Result<Self> {
        let config = Arc::new(config);
        let wal = Arc::new(wal);

        let users = Arc::new(UserStore::new(Arc::clone(&wal)));
        let payments = Arc::new(PaymentStore::new(Arc::clone(&wal)));
        let tariffs = Arc::new(TariffCatalog::new(config.tariffs.iter().cloned()));

        let sync = Arc::new(ConfigSynchronizer::new(
            Arc::clone(&users),
            &config.daemon,
            &config.subscription,
        ));

        let entitlement = Arc::new(EntitlementService::new(
            Arc::clone(&users),
            Arc::clone(&tariffs),
            Arc::clone(&payments),
        ));

        let auth = AuthService::new(
            Arc::clone(&users),
            Arc::clone(&tariffs),
            Arc::clone(&sync),
            &config.auth,
            config.registration.default_tariff_id,
        )
        .context("Failed to initialize auth service")?;

        let traffic = Arc::new(TrafficReader::new(
            Arc::clone(&users),
            Arc::clone(&entitlement),
            Arc::clone(&sync),
            source,
            config.stats.directions.clone(),
        ));

        Ok(Self {
            users,
            tariffs,
            payments,
            sync,
            entitlement,
            auth: Arc::new(auth),
            traffic,
            wal,
            config,
        })
    }
}
