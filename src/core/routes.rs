// HTTP routes configuration

use crate::core::state::AppState;
use crate::handlers::{account, admin, fallback, health, payments, subscription, tariffs, traffic};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Public endpoints
        .route("/register", post(account::register_handler))
        .route("/login", post(account::login_handler))
        .route("/health", get(health::health_handler))
        .route("/tariffs", get(tariffs::tariffs_handler))
        .route("/subscription.txt", get(subscription::subscription_file_handler))

        // User endpoints (require bearer token)
        .route("/user/me", get(account::me_handler))
        .route("/user/check-token", get(account::check_token_handler))
        .route("/user/change-tariff", post(account::change_tariff_handler))
        .route("/user/link-telegram", post(account::link_telegram_handler))
        .route("/user/delete-account", post(account::delete_account_handler))
        .route(
            "/user/request-password-reset",
            post(account::request_password_reset_handler),
        )
        .route("/user/traffic", get(traffic::traffic_handler))
        .route(
            "/user/payments",
            get(payments::list_payments_handler).post(payments::create_payment_handler),
        )
        .route(
            "/user/payments/{id}",
            get(payments::get_payment_handler).put(payments::update_payment_handler),
        )
        .route("/user/subscription", get(subscription::user_subscription_handler))
        .route("/user/config", get(subscription::user_config_handler))
        .route("/user/hiddify-config", get(subscription::hiddify_config_handler))

        // Admin endpoints (require X-Admin-Key)
        .route("/admin/users", get(admin::list_users_handler))
        .route("/admin/ban/{id}", post(admin::ban_handler))
        .route("/admin/renew/{id}", post(admin::renew_handler))
        .route("/admin/daemon/reload", post(admin::reload_handler))
        .route("/admin/daemon/restart", post(admin::restart_handler))

        // 404 fallback for all unmatched routes
        .fallback(fallback::fallback_handler)

        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{tests::sample_toml, Config};
    use crate::daemon::schema::tests::TEMPLATE;
    use crate::daemon::stats::StatsSource;
    use crate::services::traffic::tests::FakeStats;
    use crate::wal::wal::Wal;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::fs;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct TestApp {
        dir: TempDir,
        state: Arc<AppState>,
        stats: Arc<FakeStats>,
        router: Router,
    }

    fn create_test_app() -> TestApp {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config_template.json"), TEMPLATE).unwrap();

        let config = Config::from_toml(&sample_toml(dir.path())).unwrap();
        let wal = Wal::new(config.storage.journal_path.clone()).unwrap();
        let stats = Arc::new(FakeStats::default());
        let state = Arc::new(
            AppState::with_stats_source(config, wal, Arc::clone(&stats) as Arc<dyn StatsSource>)
                .unwrap(),
        );
        let router = build_router(Arc::clone(&state));

        TestApp {
            dir,
            state,
            stats,
            router,
        }
    }

    impl TestApp {
        async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            (status, bytes.to_vec())
        }

        async fn json(
            &self,
            method: &str,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
            }
            let request = match body {
                Some(body) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let (status, bytes) = self.send(request).await;
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or(Value::Null)
            };
            (status, value)
        }

        async fn admin(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
            let mut builder = Request::builder()
                .method(method)
                .uri(uri)
                .header("X-Admin-Key", "test-admin-key");
            let request = match body {
                Some(body) => {
                    builder = builder.header(header::CONTENT_TYPE, "application/json");
                    builder.body(Body::from(body.to_string())).unwrap()
                }
                None => builder.body(Body::empty()).unwrap(),
            };

            let (status, bytes) = self.send(request).await;
            (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
        }

        async fn register_and_login(&self, email: &str) -> (Value, String) {
            let (status, user) = self
                .json("POST", "/register", None, Some(json!({"email": email, "password": "pw"})))
                .await;
            assert_eq!(status, StatusCode::CREATED);

            let (status, body) = self
                .json("POST", "/login", None, Some(json!({"email": email, "password": "pw"})))
                .await;
            assert_eq!(status, StatusCode::OK);

            (user, body["token"].as_str().unwrap().to_string())
        }

        fn daemon_config(&self) -> String {
            fs::read_to_string(self.dir.path().join("config.json")).unwrap()
        }
    }

    #[tokio::test]
    async fn test_register_login_delete_flow() {
        let app = create_test_app();

        let (user, token) = app.register_and_login("a@x.com").await;
        let uuid = user["uuid"].as_str().unwrap().to_string();
        assert_eq!(user["tariff_id"], 1);
        assert!(user.get("password_hash").is_none());
        assert!(app.daemon_config().contains(&uuid));

        let (status, body) = app.json("GET", "/user/check-token", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user_id"], user["id"]);

        let (status, _) = app
            .json("POST", "/user/delete-account", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app
            .json("POST", "/login", None, Some(json!({"email": "a@x.com", "password": "pw"})))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(!app.daemon_config().contains(&uuid));
    }

    #[tokio::test]
    async fn test_login_errors() {
        let app = create_test_app();
        app.register_and_login("a@x.com").await;

        let (status, body) = app
            .json("POST", "/login", None, Some(json!({"email": "a@x.com", "password": "bad"})))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);

        let (status, _) = app
            .json("POST", "/register", None, Some(json!({"email": "a@x.com", "password": "pw"})))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = app
            .json("POST", "/register", None, Some(json!({"email": "nope", "password": "pw"})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_user_routes_require_token() {
        let app = create_test_app();

        let (status, _) = app.json("GET", "/user/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app.json("GET", "/user/me", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_me_falls_back_to_stored_traffic() {
        let app = create_test_app();
        let (user, token) = app.register_and_login("a@x.com").await;

        // no counters configured: stats read fails
        let (status, body) = app.json("GET", "/user/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["traffic"], 0);
        assert_eq!(body["uuid"], user["uuid"]);

        let (status, _) = app.json("GET", "/user/traffic", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_traffic_over_limit_bans() {
        let app = create_test_app();
        let (user, token) = app.register_and_login("a@x.com").await;
        let uuid = user["uuid"].as_str().unwrap();

        app.stats.set(uuid, "uplink", 10_485_760);
        app.stats.set(uuid, "downlink", 1);

        let (status, body) = app.json("GET", "/user/traffic", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["traffic"], 10_485_761u64);
        assert_eq!(body["limit"], 10_485_760u64);
        assert_eq!(body["banned"], true);
        assert!(!app.daemon_config().contains(uuid));
    }

    #[tokio::test]
    async fn test_change_tariff_and_renew() {
        let app = create_test_app();
        let (user, token) = app.register_and_login("a@x.com").await;

        let (status, _) = app
            .json("POST", "/user/change-tariff", Some(&token), Some(json!({"tariff_id": 99})))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = app
            .json("POST", "/user/change-tariff", Some(&token), Some(json!({"tariff_id": 2})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tariff_id"], 2);
        assert!(app.daemon_config().contains("\"level\": 2"));

        // renewal is an admin action only
        let (status, _) = app.json("POST", "/user/renew", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let uri = format!("/admin/renew/{}", user["id"]);
        let (status, renewed) = app.admin("POST", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(
            renewed["tariff_expires_at"].as_str().unwrap()
                > body["tariff_expires_at"].as_str().unwrap()
        );
    }

    #[tokio::test]
    async fn test_payment_routes() {
        let app = create_test_app();
        let (_a, token_a) = app.register_and_login("a@x.com").await;
        let (_b, token_b) = app.register_and_login("b@x.com").await;

        let (status, payment) = app
            .json(
                "POST",
                "/user/payments",
                Some(&token_a),
                Some(json!({"amount": 500, "tariff_id": 2, "payment_method": "card"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(payment["status"], "pending");
        let id = payment["id"].as_u64().unwrap();

        let (status, list) = app.json("GET", "/user/payments", Some(&token_a), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);

        let uri = format!("/user/payments/{}", id);
        let (status, _) = app.json("GET", &uri, Some(&token_b), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, updated) = app
            .json("PUT", &uri, Some(&token_a), Some(json!({"status": "completed"})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["status"], "completed");

        let (status, _) = app
            .json("PUT", &uri, Some(&token_a), Some(json!({"status": "refunded"})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_subscription_routes() {
        let app = create_test_app();
        let (user, token) = app.register_and_login("a@x.com").await;
        let uuid = user["uuid"].as_str().unwrap();

        let (status, body) = app
            .send(Request::get("/subscription.txt").body(Body::empty()).unwrap())
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8(body).unwrap().contains(uuid));

        let request = Request::get("/user/subscription")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let (status, body) = app.send(request).await;
        assert_eq!(status, StatusCode::OK);
        let line = String::from_utf8(body).unwrap();
        assert!(line.starts_with(&format!("vless://{}@vpn.example.com:10000?", uuid)));
        assert!(line.ends_with("#a%40x.com"));

        let (status, profile) = app.json("GET", "/user/config", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["client"]["id"], uuid);

        let request = Request::get("/user/hiddify-config")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let (status, body) = app.send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8(body).unwrap().contains("proxy-groups"));
    }

    #[tokio::test]
    async fn test_admin_ban_unban() {
        let app = create_test_app();
        let (user, _token) = app.register_and_login("a@x.com").await;
        let uuid = user["uuid"].as_str().unwrap();
        let uri = format!("/admin/ban/{}", user["id"]);

        let (status, body) = app.admin("POST", &uri, Some(json!({"ban": true}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_banned"], true);
        assert!(!app.daemon_config().contains(uuid));

        let (status, _) = app.admin("POST", &uri, Some(json!({"ban": false}))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(app.daemon_config().contains(uuid));

        let (status, _) = app.admin("POST", "/admin/ban/999", Some(json!({"ban": true}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_admin_routes() {
        let app = create_test_app();
        app.register_and_login("a@x.com").await;

        let (status, body) = app.admin("GET", "/admin/users", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["users"].as_array().unwrap().len(), 1);

        let (status, body) = app.admin("POST", "/admin/daemon/reload", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["clients"], 1);

        let (status, _) = app.admin("POST", "/admin/daemon/restart", None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app.admin("POST", "/admin/renew/1", None).await;
        assert_eq!(status, StatusCode::OK);

        let request = Request::get("/admin/users")
            .header("X-Admin-Key", "wrong")
            .body(Body::empty())
            .unwrap();
        let (status, _) = app.send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_public_routes() {
        let app = create_test_app();

        let (status, body) = app.json("GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = app.json("GET", "/tariffs", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (status, body) = app.json("GET", "/nope", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);

        assert_eq!(app.state.users.len(), 0);
    }

    #[tokio::test]
    async fn test_telegram_login() {
        let app = create_test_app();
        let (user, token) = app.register_and_login("a@x.com").await;

        let (status, _) = app
            .json("POST", "/user/link-telegram", Some(&token), Some(json!({"telegram_id": 4242})))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app
            .json("POST", "/login", None, Some(json!({"telegram_id": 4242})))
            .await;
        assert_eq!(status, StatusCode::OK);

        let tg_token = body["token"].as_str().unwrap();
        let (_, check) = app.json("GET", "/user/check-token", Some(tg_token), None).await;
        assert_eq!(check["user_id"], user["id"]);

        let (status, _) = app
            .json("POST", "/user/request-password-reset", Some(&token), Some(json!({"email": "a@x.com"})))
            .await;
        assert_eq!(status, StatusCode::OK);
    }
}
