use crate::core::error::{EntitlementError, StoreError};
use crate::models::payment::{Payment, PaymentStatus};
use crate::models::user::User;
use crate::stores::payment_store::PaymentStore;
use crate::stores::tariff_catalog::TariffCatalog;
use crate::stores::user_store::UserStore;
use crate::utils::time::one_month_after;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

/// Tariff, expiry, ban and payment rules for user accounts.
///
/// This only touches the stores. Callers that change anything the daemon
/// sees (tariff level, ban flag) follow up with a config sync.
pub struct EntitlementService {
    users: Arc<UserStore>,
    tariffs: Arc<TariffCatalog>,
    payments: Arc<PaymentStore>,
}

impl EntitlementService {
    pub fn new(
        users: Arc<UserStore>,
        tariffs: Arc<TariffCatalog>,
        payments: Arc<PaymentStore>,
    ) -> Self {
        Self {
            users,
            tariffs,
            payments,
        }
    }

    fn user(&self, user_id: u32) -> Result<Arc<User>, EntitlementError> {
        self.users
            .get(user_id)
            .ok_or(EntitlementError::UserNotFound(user_id))
    }

    fn update_user<F>(&self, user_id: u32, change: F) -> Result<Arc<User>, EntitlementError>
    where
        F: FnOnce(&mut User),
    {
        self.users.update(user_id, change).map_err(|e| match e {
            StoreError::NotFound(_) => EntitlementError::UserNotFound(user_id),
            other => other.into(),
        })
    }

    /// Switch to `tariff_id` and restart the billing period from now
    pub fn change_tariff(&self, user_id: u32, tariff_id: u32) -> Result<Arc<User>, EntitlementError> {
        self.user(user_id)?;

        if !self.tariffs.contains(tariff_id) {
            warn!(user_id, tariff_id, "Tariff change to unknown tariff rejected");
            return Err(EntitlementError::TariffNotFound(tariff_id));
        }

        let expires_at = one_month_after(Utc::now());
        let user = self.update_user(user_id, |user| {
            user.tariff_id = tariff_id;
            user.tariff_expires_at = expires_at;
        })?;

        info!(user_id, tariff_id, expires_at = %expires_at, "Tariff changed");
        Ok(user)
    }

    /// Extend the current period by one month from the stored expiry.
    /// Never lifts a ban.
    pub fn auto_renew(&self, user_id: u32) -> Result<Arc<User>, EntitlementError> {
        let user = self.update_user(user_id, |user| {
            user.tariff_expires_at = one_month_after(user.tariff_expires_at);
        })?;

        info!(user_id, expires_at = %user.tariff_expires_at, "Tariff renewed");
        Ok(user)
    }

    /// `true` while `observed_bytes` is within the user's tariff ceiling
    pub fn check_usage(&self, user_id: u32, observed_bytes: u64) -> Result<bool, EntitlementError> {
        let user = self.user(user_id)?;
        let tariff = self
            .tariffs
            .get(user.tariff_id)
            .ok_or(EntitlementError::TariffNotFound(user.tariff_id))?;

        Ok(tariff.allows(observed_bytes))
    }

    /// Store the latest traffic counter on the user record
    pub fn record_usage(&self, user_id: u32, used_bytes: u64) -> Result<Arc<User>, EntitlementError> {
        self.update_user(user_id, |user| user.used_traffic = used_bytes)
    }

    pub fn set_ban(&self, user_id: u32, banned: bool) -> Result<Arc<User>, EntitlementError> {
        let user = self.update_user(user_id, |user| user.is_banned = banned)?;

        if banned {
            warn!(user_id, "User banned");
        } else {
            info!(user_id, "User unbanned");
        }

        Ok(user)
    }

    pub fn tariff_expiry(&self, user_id: u32) -> Result<DateTime<Utc>, EntitlementError> {
        Ok(self.user(user_id)?.tariff_expires_at)
    }

    /// Record a pending payment. Does not activate the tariff.
    pub fn record_payment(
        &self,
        user_id: u32,
        amount: i64,
        tariff_id: u32,
        payment_method: &str,
    ) -> Result<Arc<Payment>, EntitlementError> {
        self.user(user_id)?;

        if !self.tariffs.contains(tariff_id) {
            return Err(EntitlementError::TariffNotFound(tariff_id));
        }

        let payment = self
            .payments
            .create(user_id, amount, tariff_id, payment_method)?;

        info!(
            user_id,
            payment_id = payment.id,
            amount,
            tariff_id,
            method = payment_method,
            "Payment recorded"
        );

        Ok(payment)
    }

    pub fn list_payments(&self, user_id: u32) -> Result<Vec<Arc<Payment>>, EntitlementError> {
        self.user(user_id)?;
        Ok(self.payments.list_for_user(user_id))
    }

    /// A payment owned by `user_id`; someone else's payment is reported as missing
    pub fn get_payment(&self, user_id: u32, payment_id: u32) -> Result<Arc<Payment>, EntitlementError> {
        self.payments
            .get(payment_id)
            .filter(|payment| payment.user_id == user_id)
            .ok_or(EntitlementError::PaymentNotFound(payment_id))
    }

    pub fn update_payment_status(
        &self,
        user_id: u32,
        payment_id: u32,
        status: &str,
    ) -> Result<Arc<Payment>, EntitlementError> {
        let status: PaymentStatus = status.parse().map_err(EntitlementError::InvalidStatus)?;

        self.get_payment(user_id, payment_id)?;

        let payment = self.payments.set_status(payment_id, status)?;
        info!(user_id, payment_id, status = %status, "Payment status updated");

        Ok(payment)
    }
}
