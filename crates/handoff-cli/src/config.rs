use anyhow::bail;
use clap::Parser;
use handoff::DEFAULT_THREAD_PREFIX;

/// Runtime configuration for the `handoff-cli` load driver.
///
/// All values are parsed from CLI arguments or environment variables (a `.env`
/// file is honored), with defaults sized for a quick local run.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "handoff-cli",
    version,
    about = "Drives a handoff worker pool with synthetic load and verifies delivery"
)]
pub struct CliArgs {
    /// Number of workers in the pool. Defaults to the number of logical CPUs.
    ///
    /// Environment variable: `HANDOFF_WORKERS`
    #[arg(long, env = "HANDOFF_WORKERS")]
    pub workers: Option<usize>,

    /// Total number of jobs to dispatch.
    ///
    /// Environment variable: `HANDOFF_JOBS`
    #[arg(long, env = "HANDOFF_JOBS", default_value_t = 10_000)]
    pub jobs: u64,

    /// Number of producer threads submitting jobs concurrently. Jobs are
    /// split as evenly as possible between them.
    ///
    /// Environment variable: `HANDOFF_PRODUCERS`
    #[arg(long, env = "HANDOFF_PRODUCERS", default_value_t = 4)]
    pub producers: usize,

    /// Simulated processing time per job, in microseconds.
    ///
    /// Environment variable: `HANDOFF_WORK_US`
    #[arg(long, env = "HANDOFF_WORK_US", default_value_t = 0)]
    pub work_us: u64,

    /// Prefix for worker thread names.
    ///
    /// Environment variable: `HANDOFF_THREAD_PREFIX`
    #[arg(long, env = "HANDOFF_THREAD_PREFIX", default_value_t = String::from(DEFAULT_THREAD_PREFIX))]
    pub thread_prefix: String,
}

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub workers: usize,
    pub jobs: u64,
    pub producers: usize,
    pub work_us: u64,
    pub thread_prefix: String,
}

impl TryFrom<CliArgs> for DriverConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let workers = args.workers.unwrap_or_else(num_cpus::get);

        if workers == 0 {
            bail!("HANDOFF_WORKERS must be greater than 0");
        }

        if args.producers == 0 {
            bail!("HANDOFF_PRODUCERS must be greater than 0");
        }

        if args.thread_prefix.is_empty() {
            bail!("HANDOFF_THREAD_PREFIX must not be empty");
        }

        Ok(Self {
            workers,
            jobs: args.jobs,
            producers: args.producers,
            work_us: args.work_us,
            thread_prefix: args.thread_prefix,
        })
    }
}
