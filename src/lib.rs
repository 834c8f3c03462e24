pub mod core {
    pub mod config;
    pub mod error;
    pub mod routes;
    pub mod startup;
    pub mod state;
    pub mod tracing_init;
}

pub mod daemon {
    pub mod profile;
    pub mod restart;
    pub mod schema;
    pub mod stats;
    pub mod sync;
}

pub mod handlers {
    pub mod account;
    pub mod admin;
    pub mod fallback;
    pub mod health;
    pub mod payments;
    pub mod subscription;
    pub mod tariffs;
    pub mod traffic;
}

pub mod models {
    pub mod account;
    pub mod admin;
    pub mod payment;
    pub mod tariff;
    pub mod user;
}

pub mod services {
    pub mod auth;
    pub mod entitlement;
    pub mod token;
    pub mod traffic;
}

pub mod stores {
    pub mod payment_store;
    pub mod tariff_catalog;
    pub mod user_store;
}

pub mod utils {
    pub mod auth;
    pub mod encoding;
    pub mod time;
}

pub mod wal {
    pub mod wal;
}
