// src/main.rs
//! Zero Kernel demo host
//!
//! Drives a task pool and an event pool from a fixed-rate tick loop: agents
//! work through randomly prioritized jobs and publish a completion event for
//! each, which is dispatched on the next tick.

use anyhow::{Context, Result};
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use zero_kernel::event::{EventArgs, EventEmitter, EventHandler, EventPool};
use zero_kernel::observability::{init_metrics, init_tracing};
use zero_kernel::reference::{Reference, ReferencePool};
use zero_kernel::task::{StartTaskStatus, Task, TaskAgent, TaskBase, TaskPool};
use zero_kernel::utils::config::KernelConfig;
use zero_kernel::BuildInfo;

const JOB_FINISHED: i32 = 1;

/// Job needing a number of ticks of work
#[derive(Default)]
struct BakeJob {
    base: TaskBase,
    steps: u32,
}

impl Reference for BakeJob {
    fn clear(&mut self) {
        self.base.clear();
        self.steps = 0;
    }
}

impl Task for BakeJob {
    fn base(&self) -> &TaskBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TaskBase {
        &mut self.base
    }

    fn description(&self) -> Option<String> {
        Some(format!("{} steps left", self.steps))
    }
}

#[derive(Default)]
struct JobFinished {
    serial_id: u64,
    agent: usize,
}

impl Reference for JobFinished {
    fn clear(&mut self) {
        *self = Self::default();
    }
}

impl EventArgs for JobFinished {
    fn id(&self) -> i32 {
        JOB_FINISHED
    }
}

struct BakeAgent {
    index: usize,
    events: EventEmitter<JobFinished>,
}

impl BakeAgent {
    fn publish(&self, job: &BakeJob) {
        let serial_id = job.base().serial_id();
        let references = self.events.references();
        let published = references.acquire::<JobFinished>().and_then(|handle| {
            references.with_mut(handle, |event| {
                event.serial_id = serial_id;
                event.agent = self.index;
            })?;
            self.events.fire(None, handle)
        });
        if let Err(e) = published {
            warn!("Failed to publish completion of task {}: {}", serial_id, e);
        }
    }
}

impl TaskAgent<BakeJob> for BakeAgent {
    fn start(&mut self, job: &mut BakeJob) -> StartTaskStatus {
        if job.steps == 0 {
            self.publish(job);
            StartTaskStatus::Done
        } else {
            StartTaskStatus::CanResume
        }
    }

    fn update(&mut self, job: &mut BakeJob, _elapsed: Duration, _real_elapsed: Duration) {
        job.steps = job.steps.saturating_sub(1);
        if job.steps == 0 {
            job.base_mut().set_done(true);
            self.publish(job);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = KernelConfig::load().context("failed to load configuration")?;

    // Initialize observability (tracing, metrics)
    init_tracing(&config.logging)?;
    let metrics = init_metrics()?;

    let build = BuildInfo::current();
    info!(
        "Starting Zero Kernel v{} ({}, built with {})",
        build.version, build.git_hash, build.rustc_version
    );
    info!("Configuration loaded: {:?}", config);

    let references = Arc::new(ReferencePool::from_config(&config));

    let finished = Arc::new(AtomicU64::new(0));
    let mut events = EventPool::<JobFinished>::new(Arc::clone(&references), config.event.mode);
    {
        let finished = Arc::clone(&finished);
        events.subscribe(
            JOB_FINISHED,
            EventHandler::new(move |_ctx, event: &JobFinished| {
                finished.fetch_add(1, Ordering::Relaxed);
                debug!("Task {} finished on agent {}", event.serial_id, event.agent);
            }),
        )?;
    }

    let mut tasks = TaskPool::<BakeJob>::new(Arc::clone(&references));
    for index in 0..config.task.agent_count {
        tasks.add_agent(BakeAgent {
            index,
            events: events.emitter(),
        });
    }

    references.add::<BakeJob>(config.demo.task_count)?;
    {
        let mut rng = rand::thread_rng();
        for n in 0..config.demo.task_count {
            let handle = references.acquire::<BakeJob>()?;
            let priority = rng.gen_range(0..4);
            let steps = rng.gen_range(0..20);
            references.with_mut(handle, |job| {
                job.base
                    .initialize(Some(format!("oven-{}", n % 3)), priority, None);
                job.steps = steps;
            })?;
            tasks.add_task(handle)?;
        }
    }
    info!(
        "Queued {} tasks on {} agents",
        tasks.waiting_task_count(),
        tasks.total_agent_count()
    );

    let tick = Duration::from_millis(config.demo.tick_ms.max(1));
    let mut interval = tokio::time::interval(tick);
    let started = Instant::now();
    let mut last = started;
    let mut ticks = 0u64;

    // Graceful shutdown handler
    let shutdown_signal = tokio::signal::ctrl_c();
    tokio::pin!(shutdown_signal);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = Instant::now();
                let real_elapsed = now - last;
                last = now;

                let updated = tasks
                    .update(tick, real_elapsed)
                    .and_then(|_| events.update(tick, real_elapsed));
                if let Err(e) = updated {
                    if e.is_reference_error() {
                        error!("Tick {} failed on a pooled reference misuse: {}", ticks, e);
                    } else {
                        error!("Tick {} failed: {}", ticks, e);
                    }
                    break;
                }

                ticks += 1;
                if tasks.waiting_task_count() == 0
                    && tasks.working_agent_count() == 0
                    && events.event_count() == 0
                {
                    info!("All tasks finished after {} ticks", ticks);
                    break;
                }
                if config.demo.ticks > 0 && ticks >= config.demo.ticks {
                    info!("Stopping after {} ticks", ticks);
                    break;
                }
            }
            signal = &mut shutdown_signal => {
                if let Err(e) = signal {
                    error!("Failed to listen for shutdown signal: {}", e);
                }
                info!("Received shutdown signal, cleaning up...");
                break;
            }
        }
    }

    info!(
        "Completed {} tasks in {:?} ({:?})",
        finished.load(Ordering::Relaxed),
        started.elapsed(),
        tasks.stats()
    );
    info!(
        "Reference pools: {}",
        serde_json::to_string(&references.infos())?
    );

    tasks.shutdown()?;
    events.shutdown()?;
    references.shutdown();

    debug!("Final metrics:\n{}", metrics.render());
    Ok(())
}
