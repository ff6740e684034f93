mod config;
mod driver;
mod telemetry;

use clap::Parser;
use config::{CliArgs, DriverConfig};
use driver::Report;
use telemetry::init_telemetry;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = DriverConfig::try_from(args)?;

    init_telemetry()?;
    log_startup_info(&config);

    let report = driver::run(&config)?;
    print_report(&report);

    if !report.is_exact() {
        anyhow::bail!(
            "delivery mismatch: {} lost, {} duplicated",
            report.lost,
            report.duplicated
        );
    }

    tracing::info!("Load run complete");
    Ok(())
}

fn log_startup_info(config: &DriverConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting load run with full config: {config:#?}");
    } else {
        tracing::info!(
            "Starting load run: {} jobs, {} producers, {} workers",
            config.jobs,
            config.producers,
            config.workers
        );
    }
}

fn print_report(report: &Report) {
    println!("delivered:  {}", report.delivered);
    println!("lost:       {}", report.lost);
    println!("duplicated: {}", report.duplicated);
    println!("elapsed:    {:?}", report.elapsed);
    println!("throughput: {:.0} jobs/s", report.throughput());
    for (worker, count) in report.per_worker.iter().enumerate() {
        println!("worker {worker:>4}: {count}");
    }
}
