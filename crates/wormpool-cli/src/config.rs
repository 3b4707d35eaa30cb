use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use wormpool::PoolConfig;

/// Runtime configuration for the `wormpool-load` binary.
///
/// These settings size the elastic pool and shape the synthetic workload that
/// is pushed through it. All values are parsed from CLI arguments or
/// environment variables (a `.env` file is honored).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "wormpool-load",
    version,
    about = "Drive synthetic load through an elastic worker pool"
)]
pub struct CliArgs {
    /// Number of permanent workers.
    ///
    /// Environment variable: `MIN_WORKERS`
    #[arg(long, env = "MIN_WORKERS", default_value_t = 10)]
    pub min_workers: usize,

    /// Cap on concurrently live temporary workers. Any negative value means
    /// unlimited, in which case no overflow buffer is used.
    ///
    /// Environment variable: `MAX_TEMP_WORKERS`
    #[arg(long, env = "MAX_TEMP_WORKERS", default_value_t = -1, allow_negative_numbers = true)]
    pub max_temp_workers: i64,

    /// Capacity of the queue read by permanent workers.
    ///
    /// Environment variable: `PRIMARY_QUEUE_CAPACITY`
    #[arg(long, env = "PRIMARY_QUEUE_CAPACITY", default_value_t = 100)]
    pub primary_queue_capacity: usize,

    /// Capacity of the queue read by temporary workers.
    ///
    /// Environment variable: `TEMP_QUEUE_CAPACITY`
    #[arg(long, env = "TEMP_QUEUE_CAPACITY", default_value_t = 100)]
    pub temp_queue_capacity: usize,

    /// Milliseconds a temporary worker waits for work before retiring.
    ///
    /// Environment variable: `IDLE_TIMEOUT_MS`
    #[arg(long, env = "IDLE_TIMEOUT_MS", default_value_t = 60_000)]
    pub idle_timeout_ms: u64,

    /// Number of synthetic tasks to submit.
    ///
    /// Environment variable: `TASKS`
    #[arg(long, env = "TASKS", default_value_t = 10_000)]
    pub tasks: u64,

    /// Simulated duration of each task in milliseconds.
    ///
    /// Environment variable: `TASK_MILLIS`
    #[arg(long, env = "TASK_MILLIS", default_value_t = 5)]
    pub task_millis: u64,

    /// Make every Nth task panic (0 disables).
    ///
    /// Environment variable: `PANIC_EVERY`
    #[arg(long, env = "PANIC_EVERY", default_value_t = 0)]
    pub panic_every: u64,

    /// Make every Nth task return an error (0 disables).
    ///
    /// Environment variable: `FAIL_EVERY`
    #[arg(long, env = "FAIL_EVERY", default_value_t = 0)]
    pub fail_every: u64,

    /// Seconds to wait for workers when shutting down.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT_SECS`
    #[arg(long, env = "SHUTDOWN_TIMEOUT_SECS", default_value_t = 10)]
    pub shutdown_timeout_secs: u64,

    /// Tokio worker threads. Defaults to the number of logical CPUs.
    ///
    /// Environment variable: `RUNTIME_THREADS`
    #[arg(long, env = "RUNTIME_THREADS")]
    pub runtime_threads: Option<usize>,

    /// Emit logs as JSON instead of human-readable text.
    #[arg(long, env = "LOG_JSON", default_value_t = false)]
    pub log_json: bool,
}

#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub pool: PoolConfig,
    pub tasks: u64,
    pub task_duration: Duration,
    pub panic_every: u64,
    pub fail_every: u64,
    pub shutdown_timeout: Duration,
    pub runtime_threads: usize,
    pub log_json: bool,
}

impl TryFrom<CliArgs> for LoadConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let runtime_threads = args.runtime_threads.unwrap_or_else(num_cpus::get);
        if runtime_threads == 0 {
            bail!("RUNTIME_THREADS must be greater than 0");
        }

        let max_temp_workers = if args.max_temp_workers < 0 {
            None
        } else {
            Some(usize::try_from(args.max_temp_workers)?)
        };

        let pool = PoolConfig {
            min_workers: args.min_workers,
            max_temp_workers,
            primary_queue_capacity: args.primary_queue_capacity,
            temp_queue_capacity: args.temp_queue_capacity,
            idle_timeout: Duration::from_millis(args.idle_timeout_ms),
            hook: None,
        };
        pool.validate()?;

        Ok(Self {
            pool,
            tasks: args.tasks,
            task_duration: Duration::from_millis(args.task_millis),
            panic_every: args.panic_every,
            fail_every: args.fail_every,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout_secs),
            runtime_threads,
            log_json: args.log_json,
        })
    }
}
