#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tower::ServiceExt;

use sentinel_api::app::{app, AppState};
use sentinel_api::auth::JwtSecretManager;
use sentinel_api::config::{AppConfig, EnvSource, MapEnv};
use sentinel_api::startup::{CheckContext, StartupReport};

pub fn context(env: MapEnv) -> CheckContext {
    let config = Arc::new(AppConfig::from_source(&env));
    let env: Arc<dyn EnvSource> = Arc::new(env);
    CheckContext::new(config, env.clone(), Arc::new(JwtSecretManager::new(env)))
}

pub fn state(env: MapEnv, report: StartupReport) -> AppState {
    let ctx = context(env);
    AppState::new(ctx.config, report, ctx.jwt)
}

pub fn router(env: MapEnv, report: StartupReport) -> Router {
    app(state(env, report))
}

/// Drive one request through the router in-process.
pub async fn get(router: Router, uri: &str, bearer: Option<&str>) -> Result<(StatusCode, Value)> {
    let mut request = Request::builder().uri(uri);
    if let Some(token) = bearer {
        request = request.header("authorization", format!("Bearer {}", token));
    }
    let response = router.oneshot(request.body(Body::empty())?).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let body = serde_json::from_slice(&bytes)?;
    Ok((status, body))
}

/// Serve `router` on an ephemeral localhost port.
pub async fn spawn_http(router: Router) -> Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(addr)
}

/// Tiny RESP server: AUTH (checked against `password`), SELECT, CLIENT, PING.
pub async fn spawn_mock_redis(password: Option<&'static str>) -> Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve_redis_connection(stream, password));
        }
    });
    Ok(addr)
}

async fn serve_redis_connection(stream: TcpStream, password: Option<&'static str>) {
    let mut conn = BufReader::new(stream);
    while let Some(args) = read_command(&mut conn).await {
        let command = args.first().map(|s| s.to_ascii_uppercase()).unwrap_or_default();
        let reply = match command.as_str() {
            "AUTH" => {
                if args.last().map(String::as_str) == password {
                    "+OK\r\n"
                } else {
                    "-WRONGPASS invalid username-password pair\r\n"
                }
            }
            "SELECT" | "CLIENT" => "+OK\r\n",
            "PING" => "+PONG\r\n",
            _ => "-ERR unknown command\r\n",
        };
        if conn.get_mut().write_all(reply.as_bytes()).await.is_err() {
            return;
        }
    }
}

async fn read_command(conn: &mut BufReader<TcpStream>) -> Option<Vec<String>> {
    let mut line = String::new();
    if conn.read_line(&mut line).await.ok()? == 0 {
        return None;
    }
    let count: usize = line.trim_end().strip_prefix('*')?.parse().ok()?;
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        line.clear();
        conn.read_line(&mut line).await.ok()?; // $len
        line.clear();
        conn.read_line(&mut line).await.ok()?;
        args.push(line.trim_end().to_string());
    }
    Some(args)
}

/// ClickHouse HTTP interface stand-in: `/ping` and `SELECT 1`, sent either as
/// the `query` parameter or as the request body.
pub async fn spawn_mock_clickhouse(ping_reply: &'static str) -> Result<SocketAddr> {
    use axum::extract::Query;
    use axum::routing::{any, get};
    use std::collections::HashMap;

    let router = Router::new()
        .route("/ping", get(move || async move { ping_reply }))
        .route(
            "/",
            any(|Query(params): Query<HashMap<String, String>>, body: String| async move {
                let sql = params.get("query").cloned().unwrap_or(body);
                if sql.trim() == "SELECT 1" {
                    (StatusCode::OK, "1\n")
                } else {
                    (StatusCode::BAD_REQUEST, "Code: 62. Syntax error")
                }
            }),
        );
    spawn_http(router).await
}
