//! Integration tests for the health endpoint

use fridgechef::configuration::{ApplicationSettings, JwtSettings};
use fridgechef::startup::run;
use fridgechef::users::InMemoryUserStore;
use std::net::TcpListener;
use std::sync::Arc;

fn jwt_settings(secret: &str) -> JwtSettings {
    JwtSettings {
        secret: secret.to_string(),
        issuer: "fridgechef".to_string(),
        access_token_expire_minutes: 30,
        refresh_token_expire_days: 7,
    }
}

fn spawn_app() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let server = run(
        listener,
        Arc::new(InMemoryUserStore::new()),
        ApplicationSettings::default(),
        jwt_settings("health-check-secret-0123456789abcdefgh"),
    )
    .expect("Failed to create server");

    let _ = tokio::spawn(async move {
        let _ = server.await;
    });

    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn health_check_works() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/health", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get("Strict-Transport-Security")
            .and_then(|v| v.to_str().ok()),
        Some("max-age=31536000; includeSubDomains")
    );

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, serde_json::json!({"status": "healthy"}));
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(404, response.status().as_u16());
}

#[test]
fn server_refuses_to_start_without_secret() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");

    let result = run(
        listener,
        Arc::new(InMemoryUserStore::new()),
        ApplicationSettings::default(),
        jwt_settings(""),
    );

    assert!(result.is_err());
}
