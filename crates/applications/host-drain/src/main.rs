//! empty-host - migrate every VM off a hypervisor
//!
//! ## Usage
//!
//! ```bash
//! # Preview what would move (dry run is the default)
//! empty-host -c zone-ams1 -f hv-ams1-01 -t hv-ams1-02
//!
//! # Disable the source host and migrate for real
//! empty-host -c zone-ams1 -f hv-ams1-01 -t hv-ams1-02 -d --exec
//!
//! # Only one tenant's VMs (system VMs and routers stay put)
//! empty-host -c zone-ams1 -f hv-ams1-01 -t hv-ams1-02 --domain customer-a --exec
//! ```
//!
//! Press Ctrl+C to stop after the VM currently migrating.

use anyhow::Context;
use clap::Parser;
use host_drain::{
    install_interrupt_handler, CancellationToken, CosmicClient, Credentials, DomainFilter,
    DrainOptions, JobWaiter, Outcome, DEFAULT_CONFIG_PATH, DEFAULT_MAX_RETRIES,
    DEFAULT_POLL_INTERVAL_SECS,
};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Empty a hypervisor by migrating its VMs to another hypervisor
#[derive(Parser, Debug)]
#[command(name = "empty-host")]
#[command(about = "Migrate all user, system and router VMs from one hypervisor to another", long_about = None)]
struct Cli {
    /// Cosmic/CloudStack zone (profile section in the config file)
    #[arg(short = 'c', long = "config-profile")]
    zone: String,

    /// Disable the 'from' host if it has VMs
    #[arg(short = 'd', long = "disablehost")]
    disable_host: bool,

    /// From hypervisor
    #[arg(short = 'f', long = "from")]
    source: String,

    /// To hypervisor
    #[arg(short = 't', long = "to")]
    destination: String,

    /// Alternate config file
    #[arg(long = "config", default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Execute migration (default is a dry run)
    #[arg(long = "exec")]
    exec: bool,

    /// Only migrate VMs from this domain
    #[arg(long = "domain", conflicts_with = "except_domain")]
    domain: Option<String>,

    /// Migrate all VMs except those in this domain
    #[arg(long = "exceptdomain")]
    except_domain: Option<String>,

    /// Status polls per migration job before giving up
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    job_retries: u32,

    /// Seconds between job status polls
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
    job_interval: u64,
}

impl Cli {
    fn drain_options(&self) -> anyhow::Result<DrainOptions> {
        let filter = DomainFilter::from_flags(self.domain.clone(), self.except_domain.clone())?;

        Ok(DrainOptions::new(&self.source, &self.destination)
            .with_disable_host(self.disable_host)
            .with_dry_run(!self.exec)
            .with_filter(filter)
            .with_waiter(JobWaiter::with_budget(
                self.job_retries,
                Duration::from_secs(self.job_interval),
            )))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Progress goes to stdout, diagnostics to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "host_drain=info,empty_host=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let options = cli.drain_options()?;

    let credentials = Credentials::load(&cli.config, &cli.zone)
        .with_context(|| format!("cannot use profile '{}' from {}", cli.zone, cli.config))?;
    let client = CosmicClient::new(&credentials).context("failed to build API client")?;

    let token = CancellationToken::new();
    let _interrupts = install_interrupt_handler(token.clone());

    if options.dry_run {
        info!("Dry run, pass --exec to migrate");
    }

    let report = host_drain::run(&client, &options, token, std::io::stdout())
        .await
        .context("drain aborted")?;

    if report.cancelled {
        info!(
            processed = report.outcomes.len(),
            "Stopped by operator"
        );
    }
    if report.host_state.is_disabled() {
        info!(host = %report.source, "Host left disabled");
    }
    if !report.all_succeeded() {
        warn!(
            failed = report.count(Outcome::Failed),
            "Some migrations were unsuccessful"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("empty-host").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["-c", "ams1", "-f", "hv-01", "-t", "hv-02"]).unwrap();
        assert_eq!(cli.config, DEFAULT_CONFIG_PATH);
        assert!(!cli.exec);
        assert!(!cli.disable_host);

        let options = cli.drain_options().unwrap();
        assert!(options.dry_run);
        assert_eq!(options.filter, DomainFilter::None);
        assert_eq!(options.waiter.max_retries(), DEFAULT_MAX_RETRIES);
        assert_eq!(options.waiter.interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_long_flags() {
        let cli = parse(&[
            "--config-profile", "ams1",
            "--from", "hv-01",
            "--to", "hv-02",
            "--disablehost",
            "--exec",
            "--exceptdomain", "internal",
            "--config", "/etc/cloudmonkey.ini",
            "--job-retries", "30",
        ])
        .unwrap();

        let options = cli.drain_options().unwrap();
        assert!(!options.dry_run);
        assert!(options.disable_host);
        assert_eq!(options.filter, DomainFilter::Exclude("internal".to_string()));
        assert_eq!(options.waiter.max_retries(), 30);
        assert_eq!(cli.config, "/etc/cloudmonkey.ini");
    }

    #[test]
    fn test_domain_flags_conflict() {
        let err = parse(&[
            "-c", "ams1", "-f", "hv-01", "-t", "hv-02", "--domain", "a", "--exceptdomain", "b",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_required_flags() {
        assert!(parse(&["-c", "ams1", "-f", "hv-01"]).is_err());
        assert!(parse(&["-f", "hv-01", "-t", "hv-02"]).is_err());
    }
}
