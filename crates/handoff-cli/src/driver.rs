//! Synthetic load against a [`Pool`].
//!
//! Every job is a numeric id. Workers bump a per-job delivery counter and a
//! per-worker tally, so after the pool is closed the driver can tell exactly
//! which jobs were lost or delivered more than once.

use crate::config::DriverConfig;
use core::time::Duration;
use handoff::Pool;
use portable_atomic::{AtomicU32, AtomicU64, Ordering};
use std::{
    sync::Arc,
    thread::{scope, sleep},
    time::Instant,
};

/// Outcome of one load run.
#[derive(Debug, Clone)]
pub struct Report {
    pub delivered: u64,
    pub lost: u64,
    pub duplicated: u64,
    pub elapsed: Duration,
    pub per_worker: Vec<u64>,
}

impl Report {
    /// Whether every job was delivered exactly once.
    pub const fn is_exact(&self) -> bool {
        self.lost == 0 && self.duplicated == 0
    }

    /// Delivered jobs per second.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.delivered as f64 / secs
    }
}

struct Tally {
    deliveries: Vec<AtomicU32>,
    per_worker: Vec<AtomicU64>,
}

/// Builds a pool from `config`, pushes every job through it and closes it.
///
/// # Errors
///
/// Fails if the pool cannot be built, if a producer is rejected by the pool,
/// or if a worker panicked.
pub fn run(config: &DriverConfig) -> anyhow::Result<Report> {
    let jobs = usize::try_from(config.jobs)?;
    let tally = Arc::new(Tally {
        deliveries: (0..jobs).map(|_| AtomicU32::new(0)).collect(),
        per_worker: (0..config.workers).map(|_| AtomicU64::new(0)).collect(),
    });

    let work = Duration::from_micros(config.work_us);
    let workers = (0..config.workers).map(|index| {
        let tally = Arc::clone(&tally);
        move |job: usize| {
            if !work.is_zero() {
                sleep(work);
            }
            tally.deliveries[job].fetch_add(1, Ordering::Relaxed);
            tally.per_worker[index].fetch_add(1, Ordering::Relaxed);
        }
    });

    let pool = Pool::builder()
        .name(config.thread_prefix.as_str())
        .build(workers)?;

    tracing::debug!("Pool ready: {pool:?}");

    let start = Instant::now();
    scope(|s| -> anyhow::Result<()> {
        let handles: Vec<_> = split(jobs, config.producers)
            .map(|range| {
                let pool = &pool;
                s.spawn(move || -> handoff::Result<()> {
                    for job in range {
                        pool.try_process(job)?;
                    }
                    Ok(())
                })
            })
            .collect();

        for handle in handles {
            match handle.join() {
                Ok(result) => result?,
                Err(_) => anyhow::bail!("producer thread panicked"),
            }
        }
        Ok(())
    })?;

    pool.close()?;
    let elapsed = start.elapsed();

    let mut report = Report {
        delivered: 0,
        lost: 0,
        duplicated: 0,
        elapsed,
        per_worker: tally
            .per_worker
            .iter()
            .map(|count| count.load(Ordering::Relaxed))
            .collect(),
    };
    for count in &tally.deliveries {
        match count.load(Ordering::Relaxed) {
            0 => report.lost += 1,
            1 => report.delivered += 1,
            n => {
                report.delivered += 1;
                report.duplicated += u64::from(n - 1);
            }
        }
    }

    Ok(report)
}

/// Splits `0..jobs` into `parts` contiguous ranges whose lengths differ by at
/// most one.
fn split(jobs: usize, parts: usize) -> impl Iterator<Item = core::ops::Range<usize>> {
    let base = jobs / parts;
    let extra = jobs % parts;
    (0..parts).scan(0, move |start, part| {
        let len = base + usize::from(part < extra);
        let range = *start..*start + len;
        *start += len;
        Some(range)
    })
}
