use crate::core::error::TrafficError;
use crate::daemon::stats::{stat_name, StatsSource};
use crate::daemon::sync::ConfigSynchronizer;
use crate::models::user::User;
use crate::services::entitlement::EntitlementService;
use crate::stores::user_store::UserStore;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Result of one traffic read
#[derive(Debug, Clone)]
pub struct TrafficReport {
    /// User record after the read (counter stored, ban applied if any)
    pub user: Arc<User>,
    /// Bytes summed over the configured directions
    pub traffic: u64,
    pub within_limit: bool,
}

/// Reads per-user counters from the daemon and enforces tariff ceilings
pub struct TrafficReader {
    users: Arc<UserStore>,
    entitlement: Arc<EntitlementService>,
    sync: Arc<ConfigSynchronizer>,
    source: Arc<dyn StatsSource>,
    directions: Vec<String>,
}

impl TrafficReader {
    pub fn new(
        users: Arc<UserStore>,
        entitlement: Arc<EntitlementService>,
        sync: Arc<ConfigSynchronizer>,
        source: Arc<dyn StatsSource>,
        directions: Vec<String>,
    ) -> Self {
        Self {
            users,
            entitlement,
            sync,
            source,
            directions,
        }
    }

    /// Read the counters for `uuid`, store the total and ban the user if it
    /// is over the ceiling.
    ///
    /// A fresh ban triggers a config rebuild and restart so the identity
    /// token leaves the daemon. Sync failures at that point are logged; the
    /// ban itself is already stored.
    pub async fn get_user_traffic(&self, uuid: &str) -> Result<TrafficReport, TrafficError> {
        let user = self
            .users
            .get_by_uuid(uuid)
            .ok_or_else(|| TrafficError::UnknownToken(uuid.to_string()))?;

        let mut traffic: u64 = 0;
        for direction in &self.directions {
            let bytes = self.source.query(&stat_name(uuid, direction)).await?;
            traffic = traffic.saturating_add(bytes);
        }

        debug!(user_id = user.id, traffic, "Traffic counters read");

        let mut user = self.entitlement.record_usage(user.id, traffic)?;
        let within_limit = self.entitlement.check_usage(user.id, traffic)?;

        if !within_limit && !user.is_banned {
            warn!(user_id = user.id, traffic, "Traffic ceiling exceeded, banning user");
            user = self.entitlement.set_ban(user.id, true)?;

            if let Err(e) = self.sync.apply() {
                error!(
                    user_id = user.id,
                    error = %e,
                    "Failed to remove banned user from daemon config"
                );
            }
        }

        Ok(TrafficReport {
            user,
            traffic,
            within_limit,
        })
    }
}
