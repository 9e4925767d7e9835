#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};

static SERVER: OnceLock<TestServer> = OnceLock::new();

/// Unreachable database used when no real one is configured; /health reports 503
const OFFLINE_DATABASE_URL: &str = "postgres://postgres@127.0.0.1:1/bootcamp_offline";

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let database_url = database_url().unwrap_or_else(|| OFFLINE_DATABASE_URL.to_string());

        // Cargo builds the server binary for integration tests
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_bootcamp-api"));
        cmd.env("PORT", port.to_string())
            .env("DATABASE_URL", database_url)
            .env("DATABASE_CONNECTION_TIMEOUT", "2")
            .env("JWT_SECRET", "integration-test-secret")
            .env("AGGREGATE_TIMEOUT_MS", "5000")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                // Ready once /health answers, whether or not the database is up
                if resp.status() == StatusCode::OK || resp.status() == StatusCode::SERVICE_UNAVAILABLE {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(15)).await?;
    Ok(server)
}

fn database_url() -> Option<String> {
    let _ = dotenvy::dotenv();
    std::env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty())
}

/// Database-backed tests return early unless DATABASE_URL points at a real server
pub fn database_configured() -> bool {
    if database_url().is_some() {
        return true;
    }
    eprintln!("DATABASE_URL not set; skipping database-backed test");
    false
}

/// Register a fresh account and return its bearer token
pub async fn register(server: &TestServer, role: &str) -> Result<String> {
    let email = format!("{}-{}@example.com", role, uuid::Uuid::new_v4().simple());
    let res = reqwest::Client::new()
        .post(server.url("/auth/register"))
        .json(&json!({
            "name": format!("Test {}", role),
            "email": email,
            "password": "123456",
            "role": role
        }))
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::OK, "register failed: {}", res.status());
    let body: Value = res.json().await?;
    body["token"]
        .as_str()
        .map(str::to_string)
        .context("register response without token")
}
