use clap::Args;
use std::sync::Arc;

use crate::cli::utils::{output_error, output_success, to_value};
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::startup::{StartupCheckResult, StartupReport};

#[derive(Args, Debug, Clone, Default)]
pub struct CheckArgs {
    #[arg(long, help = "Skip slow checks (network, schema, provider probes)")]
    pub fast: bool,

    #[arg(long, help = "Per-check timeout in seconds")]
    pub timeout: Option<u64>,
}

impl CheckArgs {
    pub fn apply(&self, config: &mut AppConfig) {
        if self.fast {
            config.startup.fast_mode = true;
        }
        if let Some(timeout) = self.timeout {
            config.startup.check_timeout_secs = timeout;
        }
        // The CLI always runs the checks; SKIP_STARTUP_CHECKS only gates the server boot.
        config.startup.skip_checks = false;
    }
}

pub async fn handle(args: CheckArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let mut config = AppConfig::from_env();
    args.apply(&mut config);

    let checker = crate::default_checker(Arc::new(config));
    let report = checker.run_all_checks().await;

    if output_format == OutputFormat::Text {
        print_table(&report);
    }

    let summary = format!(
        "{}/{} checks passed in {:.0} ms ({} critical, {} non-critical failures)",
        report.passed, report.total_checks, report.duration_ms, report.failed_critical, report.failed_non_critical
    );
    let data = Some(to_value(&report)?);
    if report.success {
        output_success(output_format, &summary, data)
    } else {
        output_error(output_format, &summary, data)?;
        anyhow::bail!("critical startup checks failed")
    }
}

fn print_table(report: &StartupReport) {
    println!("Startup checks ({})", report.environment);
    for result in &report.results {
        println!("  {} {:<22} {:>8.1} ms  {}", marker(result), result.name, result.duration_ms, result.message);
    }
}

fn marker(result: &StartupCheckResult) -> &'static str {
    match (result.success, result.critical) {
        (true, _) => "✓",
        (false, true) => "✗",
        (false, false) => "⚠",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_override_config() {
        let mut config = AppConfig::development();
        config.startup.skip_checks = true;
        CheckArgs { fast: true, timeout: Some(3) }.apply(&mut config);
        assert!(config.startup.fast_mode);
        assert!(!config.startup.skip_checks);
        assert_eq!(config.startup.check_timeout_secs, 3);
    }

    #[test]
    fn markers() {
        assert_eq!(marker(&StartupCheckResult::passed("a", "ok")), "✓");
        assert_eq!(marker(&StartupCheckResult::failed("a", "no")), "✗");
        assert_eq!(marker(&StartupCheckResult::failed("a", "no").non_critical()), "⚠");
    }
}
