use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account record as kept in the user store and the journal.
///
/// `password_hash` is part of the stored record only. Anything sent to
/// clients goes through [`crate::models::account::UserResponse`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u32,
    pub email: String,
    pub password_hash: String,
    /// Identity token; the principal id inside the proxy daemon
    pub uuid: String,
    pub tariff_id: u32,
    pub is_banned: bool,
    pub created_at: DateTime<Utc>,
    pub tariff_expires_at: DateTime<Utc>,
    /// Last observed cumulative traffic in bytes
    #[serde(default)]
    pub used_traffic: u64,
    #[serde(default)]
    pub telegram_id: Option<i64>,
}

/// Fields supplied at registration. The store assigns the id.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub uuid: String,
    pub tariff_id: u32,
    pub created_at: DateTime<Utc>,
    pub tariff_expires_at: DateTime<Utc>,
}

impl User {
    pub fn from_new(id: u32, new: NewUser) -> Self {
        Self {
            id,
            email: new.email,
            password_hash: new.password_hash,
            uuid: new.uuid,
            tariff_id: new.tariff_id,
            is_banned: false,
            created_at: new.created_at,
            tariff_expires_at: new.tariff_expires_at,
            used_traffic: 0,
            telegram_id: None,
        }
    }
}
