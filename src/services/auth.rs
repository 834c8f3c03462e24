use crate::core::config::AuthConfig;
use crate::core::error::{AuthError, StoreError};
use crate::daemon::sync::ConfigSynchronizer;
use crate::models::user::{NewUser, User};
use crate::services::token::TokenSigner;
use crate::stores::tariff_catalog::TariffCatalog;
use crate::stores::user_store::UserStore;
use crate::utils::time::one_month_after;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Registration, login and account lifecycle.
///
/// Anything that adds or removes a user also rebuilds the daemon config, so
/// the identity token list never lags the user store for longer than one
/// restart.
pub struct AuthService {
    users: Arc<UserStore>,
    tariffs: Arc<TariffCatalog>,
    sync: Arc<ConfigSynchronizer>,
    signer: TokenSigner,
    params: Params,
    default_tariff_id: u32,
}

impl AuthService {
    pub fn new(
        users: Arc<UserStore>,
        tariffs: Arc<TariffCatalog>,
        sync: Arc<ConfigSynchronizer>,
        config: &AuthConfig,
        default_tariff_id: u32,
    ) -> Result<Self, AuthError> {
        let params = Params::new(
            config.argon2_memory_kib,
            config.argon2_iterations,
            1,
            None,
        )
        .map_err(|e| AuthError::Hash(format!("invalid argon2 parameters: {}", e)))?;

        Ok(Self {
            users,
            tariffs,
            sync,
            signer: TokenSigner::new(&config.jwt_secret, config.token_ttl_days),
            params,
            default_tariff_id,
        })
    }

    fn hasher(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        self.hasher()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Hash(e.to_string()))
    }

    fn verify_password(&self, password: &str, stored: &str) -> bool {
        match PasswordHash::new(stored) {
            Ok(parsed) => self
                .hasher()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    /// Create an account on the default tariff and add it to the daemon.
    ///
    /// The user is persisted before the daemon config is rebuilt; a sync
    /// failure is returned but the account stays.
    pub fn register(&self, email: &str, password: &str) -> Result<Arc<User>, AuthError> {
        let email = email.trim();

        if email.is_empty() || !email.contains('@') {
            return Err(AuthError::InvalidInput("a valid email is required".to_string()));
        }

        if password.is_empty() {
            return Err(AuthError::InvalidInput("password must not be empty".to_string()));
        }

        if !self.tariffs.contains(self.default_tariff_id) {
            return Err(AuthError::TariffNotFound(self.default_tariff_id));
        }

        let now = Utc::now();
        let user = self.users.insert(NewUser {
            email: email.to_string(),
            password_hash: self.hash_password(password)?,
            uuid: Uuid::new_v4().to_string(),
            tariff_id: self.default_tariff_id,
            created_at: now,
            tariff_expires_at: one_month_after(now),
        })?;

        info!(user_id = user.id, email = %user.email, uuid = %user.uuid, "User registered");

        self.sync.apply()?;

        Ok(user)
    }

    /// Email + password login. Returns a bearer token.
    pub fn login(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let user = self.users.get_by_email(email).ok_or(AuthError::NotFound)?;

        if !self.verify_password(password, &user.password_hash) {
            warn!(user_id = user.id, "Login failed: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        info!(user_id = user.id, "User logged in");
        self.signer.issue(user.id, &user.uuid)
    }

    pub fn login_telegram(&self, telegram_id: i64) -> Result<String, AuthError> {
        let user = self
            .users
            .get_by_telegram(telegram_id)
            .ok_or(AuthError::NotFound)?;

        info!(user_id = user.id, telegram_id, "User logged in via Telegram");
        self.signer.issue(user.id, &user.uuid)
    }

    pub fn link_telegram(&self, user_id: u32, telegram_id: i64) -> Result<Arc<User>, AuthError> {
        let user = self
            .users
            .update(user_id, |user| user.telegram_id = Some(telegram_id))
            .map_err(|e| match e {
                StoreError::NotFound(_) => AuthError::NotFound,
                other => other.into(),
            })?;

        info!(user_id, telegram_id, "Telegram account linked");
        Ok(user)
    }

    /// Resolve a bearer token to a user id. Tokens of deleted accounts are
    /// rejected, as are tokens whose identity token no longer matches the
    /// account behind the id.
    pub fn verify_token(&self, token: &str) -> Result<u32, AuthError> {
        let claims = self.signer.verify(token)?;

        match self.users.get(claims.user_id) {
            Some(user) if user.uuid == claims.uuid => Ok(claims.user_id),
            _ => Err(AuthError::InvalidToken),
        }
    }

    /// Remove the account and drop its identity token from the daemon
    pub fn delete_account(&self, user_id: u32) -> Result<(), AuthError> {
        let user = self.users.remove(user_id).map_err(|e| match e {
            StoreError::NotFound(_) => AuthError::NotFound,
            other => other.into(),
        })?;

        info!(user_id, uuid = %user.uuid, "Account deleted");

        self.sync.apply()?;
        Ok(())
    }

    /// Acknowledged for every address so the endpoint can't be used to probe
    /// for accounts. No mail is sent.
    pub fn request_password_reset(&self, email: &str) {
        match self.users.get_by_email(email) {
            Some(user) => info!(user_id = user.id, "Password reset requested"),
            None => info!("Password reset requested for unknown email"),
        }
    }
}
