use async_trait::async_trait;
use futures::future::join_all;
use std::path::Path;
use tokio::net::TcpStream;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use super::{CheckContext, CheckError, StartupCheck};
use crate::config::AppConfig;

/// Local host health: writable directories, memory, outbound network.
pub struct SystemChecker;

impl SystemChecker {
    pub fn checks() -> Vec<Box<dyn StartupCheck>> {
        vec![
            Box::new(FilePermissions),
            Box::new(MemoryAndResources),
            Box::new(NetworkConnectivity),
        ]
    }
}

pub struct FilePermissions;

#[async_trait]
impl StartupCheck for FilePermissions {
    fn name(&self) -> &'static str {
        "file_permissions"
    }

    fn is_critical(&self, config: &AppConfig) -> bool {
        config.environment.is_deployed()
    }

    async fn run(&self, ctx: &CheckContext) -> Result<String, CheckError> {
        let dirs = &ctx.config.startup.writable_dirs;
        if dirs.is_empty() {
            return Ok("No writable directories configured".to_string());
        }

        let mut failures = Vec::new();
        for dir in dirs {
            if let Err(e) = probe_writable(Path::new(dir)).await {
                failures.push(format!("{}: {}", dir, e));
            }
        }

        if failures.is_empty() {
            Ok(format!("Directories writable: {}", dirs.join(", ")))
        } else {
            Err(CheckError::failed(format!(
                "Directories not writable: {}",
                failures.join("; ")
            )))
        }
    }
}

async fn probe_writable(dir: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let probe = dir.join(format!(".write-probe-{}", Uuid::new_v4().simple()));
    tokio::fs::write(&probe, b"ok").await?;
    tokio::fs::remove_file(&probe).await
}

pub struct MemoryAndResources;

#[async_trait]
impl StartupCheck for MemoryAndResources {
    fn name(&self) -> &'static str {
        "memory_and_resources"
    }

    fn is_critical(&self, _config: &AppConfig) -> bool {
        false
    }

    async fn run(&self, ctx: &CheckContext) -> Result<String, CheckError> {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        let available_mb = match tokio::fs::read_to_string("/proc/meminfo").await {
            Ok(meminfo) => parse_mem_available_kb(&meminfo).map(|kb| kb / 1024),
            Err(e) => {
                debug!("meminfo unavailable: {}", e);
                None
            }
        };

        let minimum = ctx.config.startup.min_available_memory_mb;
        match available_mb {
            Some(mb) if mb < minimum => Err(CheckError::failed(format!(
                "Low memory: {} MB available, {} MB required ({} CPUs)",
                mb, minimum, cpus
            ))),
            Some(mb) => Ok(format!("{} MB memory available, {} CPUs", mb, cpus)),
            None => Ok(format!("Memory information unavailable, {} CPUs", cpus)),
        }
    }
}

/// `MemAvailable` in kB from `/proc/meminfo` contents.
fn parse_mem_available_kb(meminfo: &str) -> Option<u64> {
    meminfo
        .lines()
        .find_map(|line| line.strip_prefix("MemAvailable:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|n| n.parse().ok())
}

pub struct NetworkConnectivity;

#[async_trait]
impl StartupCheck for NetworkConnectivity {
    fn name(&self) -> &'static str {
        "network_connectivity"
    }

    fn is_critical(&self, _config: &AppConfig) -> bool {
        false
    }

    fn is_slow(&self) -> bool {
        true
    }

    async fn run(&self, ctx: &CheckContext) -> Result<String, CheckError> {
        let targets = probe_targets(&ctx.config);
        if targets.is_empty() {
            return Ok("No network targets configured".to_string());
        }

        // Hosts are probed concurrently, each within half the check budget, so the
        // per-host report always lands before the orchestrator's timeout.
        let per_host = ctx.config.startup.check_timeout() / 2;
        let outcomes = join_all(targets.iter().map(|target| async move {
            match tokio::time::timeout(per_host, TcpStream::connect(target.as_str())).await {
                Ok(Ok(_)) => {
                    debug!(%target, "reachable");
                    None
                }
                Ok(Err(e)) => Some(format!("{} ({})", target, e)),
                Err(_) => Some(format!("{} (timed out after {:?})", target, per_host)),
            }
        }))
        .await;
        let unreachable: Vec<String> = outcomes.into_iter().flatten().collect();

        if unreachable.is_empty() {
            Ok(format!("{} network targets reachable", targets.len()))
        } else {
            Err(CheckError::failed(format!(
                "Unreachable: {}",
                unreachable.join(", ")
            )))
        }
    }
}

/// `host:port` targets: explicit probe hosts plus every configured service URL.
pub(crate) fn probe_targets(config: &AppConfig) -> Vec<String> {
    let mut targets: Vec<String> = config.startup.network_probe_hosts.clone();

    for (_, raw) in config.services.urls() {
        let Ok(url) = Url::parse(raw) else {
            continue;
        };
        let Some(host) = url.host_str() else {
            continue;
        };
        if let Some(port) = url.port().or_else(|| default_port(url.scheme())) {
            let target = format!("{}:{}", host, port);
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
    }

    targets
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "postgres" | "postgresql" => Some(5432),
        "redis" | "rediss" => Some(6379),
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    }
}
