//! CLI Entry Point for nvme-harness
//!
//! Provides command-line interface for:
//! - Running the built-in smoke suite against the mock driver
//! - Printing the resolved configuration
//!
//! # Usage
//!
//! Run the smoke suite:
//! ```bash
//! nvme-harness run --pciaddr 02:00.0
//! ```
//!
//! Show configuration after file, environment and flag overrides:
//! ```bash
//! NVME_HARNESS_LOG__LEVEL=debug nvme-harness show-config
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nvme_driver_mock::MockDriver;
use nvme_harness::config::{HarnessConfig, DEFAULT_PATH};
use nvme_harness::options::DeviceOptions;
use nvme_harness::session::Session;
use nvme_harness::{suite, tracing_setup};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "nvme-harness", version)]
#[command(about = "Fixture layer for hardware-in-the-loop NVMe tests", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log format (pretty, compact, json)
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the smoke suite against the mock driver
    Run {
        #[command(flatten)]
        device: DeviceOptions,

        /// Simulate a driver without read verification support
        #[arg(long)]
        verify_unsupported: bool,
    },

    /// Print the resolved configuration
    ShowConfig {
        #[command(flatten)]
        device: DeviceOptions,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let path = cli.config.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_PATH));
    let config = HarnessConfig::load_from(&path)
        .with_context(|| format!("loading configuration from {}", path.display()))?
        .with_log(cli.log_level.clone(), cli.log_format.clone());

    match cli.command {
        Commands::Run {
            device,
            verify_unsupported,
        } => run_suite(config.with_pciaddr(device.pciaddr), verify_unsupported),
        Commands::ShowConfig { device } => {
            let config = config.with_pciaddr(device.pciaddr);
            config.validate()?;
            print!("{}", config.to_toml()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_suite(config: HarnessConfig, verify_unsupported: bool) -> Result<ExitCode> {
    config.validate()?;
    tracing_setup::init_from_config(&config)?;

    let driver = if verify_unsupported {
        MockDriver::without_verify()
    } else {
        MockDriver::new()
    };

    let mut session = Session::from_config(&config, Arc::new(driver));
    let cases = suite::smoke_suite();
    for case in &cases {
        let item = session.run(case);
        let detail = item
            .reports()
            .find_map(|r| r.message.clone())
            .map(|m| format!(" ({})", m))
            .unwrap_or_default();
        println!("{:<28} {}{}", item.name(), item.outcome(), detail);
    }

    let report = session.finish();
    for err in &report.teardown_errors {
        eprintln!("session teardown error: {}", err);
    }

    println!();
    println!("{}", report.summary);

    if !report.summary.all_passed() || !report.teardown_errors.is_empty() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
