mod common;

use anyhow::Result;
use reqwest::{header, StatusCode};
use serde_json::{json, Value};

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = reqwest::get(format!("{}/health", server.base_url)).await?;

    // OK with a database, SERVICE_UNAVAILABLE without one
    let status = res.status();
    assert!(
        status == StatusCode::OK || status == StatusCode::SERVICE_UNAVAILABLE,
        "unexpected status: {}",
        status
    );
    let body: Value = res.json().await?;
    assert_eq!(body["success"], json!(status == StatusCode::OK));
    Ok(())
}

#[tokio::test]
async fn root_describes_the_service() -> Result<()> {
    let server = common::ensure_server().await?;
    let body: Value = reqwest::get(format!("{}/", server.base_url)).await?.json().await?;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["name"], json!("Bootcamp API"));
    Ok(())
}

#[tokio::test]
async fn me_requires_a_token() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = reqwest::get(server.url("/auth/me")).await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await?;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"], json!("Not authorized to access this route"));
    Ok(())
}

#[tokio::test]
async fn garbage_bearer_token_is_rejected() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = reqwest::Client::new()
        .get(server.url("/auth/me"))
        .bearer_auth("not-a-jwt")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn login_without_credentials_is_bad_request() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = reqwest::Client::new()
        .post(server.url("/auth/login"))
        .json(&json!({ "email": "someone@example.com" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], json!("Please send an email and a Password"));
    Ok(())
}

#[tokio::test]
async fn logout_expires_the_cookie() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = reqwest::get(server.url("/auth/logout")).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let cookie = res
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(cookie.starts_with("token=none"), "cookie: {}", cookie);
    Ok(())
}
