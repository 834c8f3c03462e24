use crate::models::user::User;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// Either email + password or a linked Telegram id
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub telegram_id: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangeTariffRequest {
    pub tariff_id: u32,
}

#[derive(Debug, Deserialize)]
pub struct LinkTelegramRequest {
    pub telegram_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

/// Client-visible view of a [`User`]; never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: u32,
    pub email: String,
    pub uuid: String,
    pub tariff_id: u32,
    pub is_banned: bool,
    pub created_at: DateTime<Utc>,
    pub tariff_expires_at: DateTime<Utc>,
    pub used_traffic: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_id: Option<i64>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            uuid: user.uuid.clone(),
            tariff_id: user.tariff_id,
            is_banned: user.is_banned,
            created_at: user.created_at,
            tariff_expires_at: user.tariff_expires_at,
            used_traffic: user.used_traffic,
            telegram_id: user.telegram_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub id: u32,
    pub email: String,
    pub uuid: String,
    pub tariff_id: u32,
    pub traffic: u64,
    pub expires_at: DateTime<Utc>,
    pub is_banned: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckTokenResponse {
    pub user_id: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrafficResponse {
    pub traffic: u64,
    pub limit: u64,
    pub banned: bool,
}
