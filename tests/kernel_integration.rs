//! Integration Tests - pools sharing one reference pool
//!
//! Agents of a task pool publish completion events through an emitter; the
//! event pool dispatches them on the following tick. Every pooled instance
//! must end up back in its collection.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use zero_kernel::event::{EventArgs, EventEmitter, EventHandler, EventPool, EventPoolMode};
use zero_kernel::reference::{Reference, ReferencePool, ReferenceStrictCheckType};
use zero_kernel::task::{StartTaskStatus, Task, TaskAgent, TaskBase, TaskPool, TaskStatus};
use zero_kernel::utils::config::{HostConfig, KernelConfig};
use zero_kernel::{KernelError, MinHeap};

const TICK: Duration = Duration::from_millis(16);
const DELIVERED: i32 = 100;

#[derive(Default)]
struct Delivery {
    base: TaskBase,
    distance: u32,
}

impl Reference for Delivery {
    fn clear(&mut self) {
        self.base.clear();
        self.distance = 0;
    }
}

impl Task for Delivery {
    fn base(&self) -> &TaskBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut TaskBase {
        &mut self.base
    }
}

#[derive(Default)]
struct Delivered {
    serial_id: u64,
    courier: usize,
}

impl Reference for Delivered {
    fn clear(&mut self) {
        self.serial_id = 0;
        self.courier = 0;
    }
}

impl EventArgs for Delivered {
    fn id(&self) -> i32 {
        DELIVERED
    }
}

struct Courier {
    index: usize,
    events: EventEmitter<Delivered>,
}

impl TaskAgent<Delivery> for Courier {
    fn start(&mut self, _task: &mut Delivery) -> StartTaskStatus {
        StartTaskStatus::CanResume
    }

    fn update(&mut self, task: &mut Delivery, _elapsed: Duration, _real_elapsed: Duration) {
        task.distance = task.distance.saturating_sub(1);
        if task.distance > 0 {
            return;
        }
        task.base_mut().set_done(true);

        let references = self.events.references();
        let handle = references.acquire::<Delivered>().unwrap();
        let serial_id = task.base().serial_id();
        let courier = self.index;
        references
            .with_mut(handle, |event| {
                event.serial_id = serial_id;
                event.courier = courier;
            })
            .unwrap();
        self.events.fire(None, handle).unwrap();
    }
}

fn queue(
    references: &ReferencePool,
    pool: &mut TaskPool<Delivery>,
    priority: i32,
    distance: u32,
) -> u64 {
    let handle = references.acquire::<Delivery>().unwrap();
    references
        .with_mut(handle, |task| {
            task.base.initialize(Some("parcel".to_string()), priority, None);
            task.distance = distance;
        })
        .unwrap();
    pool.add_task(handle).unwrap()
}

#[test]
fn test_tasks_publish_events_and_everything_is_recycled() {
    let references = Arc::new(ReferencePool::new(true));
    let mut events = EventPool::<Delivered>::new(Arc::clone(&references), EventPoolMode::default());
    let log = Arc::new(Mutex::new(Vec::new()));
    {
        let log = Arc::clone(&log);
        events
            .subscribe(
                DELIVERED,
                EventHandler::new(move |_ctx, event: &Delivered| {
                    log.lock().push(event.serial_id);
                }),
            )
            .unwrap();
    }

    let mut tasks = TaskPool::<Delivery>::new(Arc::clone(&references));
    for index in 0..2 {
        tasks.add_agent(Courier {
            index,
            events: events.emitter(),
        });
    }

    let low = queue(&references, &mut tasks, 1, 1);
    let high = queue(&references, &mut tasks, 9, 3);
    let mid = queue(&references, &mut tasks, 5, 1);

    // Two agents: the two highest priorities start first
    tasks.update(TICK, TICK).unwrap();
    let doing: Vec<u64> = tasks
        .all_task_infos()
        .into_iter()
        .filter(|info| info.status == TaskStatus::Doing)
        .map(|info| info.serial_id)
        .collect();
    assert_eq!(doing, vec![high, mid]);

    for _ in 0..10 {
        tasks.update(TICK, TICK).unwrap();
        events.update(TICK, TICK).unwrap();
    }

    let mut delivered = log.lock().clone();
    assert_eq!(delivered.len(), 3);
    assert_eq!(delivered[0], mid);
    delivered.sort_unstable();
    assert_eq!(delivered, vec![low, high, mid]);

    assert_eq!(tasks.waiting_task_count(), 0);
    assert_eq!(tasks.working_agent_count(), 0);
    assert_eq!(events.event_count(), 0);

    for info in references.infos() {
        assert_eq!(info.using_count, 0, "{} still in use", info.type_name);
        assert_eq!(info.acquire_count, info.release_count);
        assert_eq!(info.add_count as usize, info.unused_count);
    }

    tasks.shutdown().unwrap();
    events.shutdown().unwrap();
    references.shutdown();
    assert_eq!(references.count(), 0);
}

#[test]
fn test_removed_tasks_never_publish() {
    let references = Arc::new(ReferencePool::new(true));
    let mut events = EventPool::<Delivered>::new(
        Arc::clone(&references),
        EventPoolMode::default().with_no_handler(),
    );
    let mut tasks = TaskPool::<Delivery>::new(Arc::clone(&references));
    tasks.add_agent(Courier {
        index: 0,
        events: events.emitter(),
    });

    queue(&references, &mut tasks, 0, 5);
    queue(&references, &mut tasks, 0, 5);
    tasks.update(TICK, TICK).unwrap();

    assert_eq!(tasks.task_infos("parcel").len(), 2);
    assert_eq!(tasks.remove_tasks("parcel").unwrap(), 2);
    assert_eq!(tasks.free_agent_count(), 1);

    events.update(TICK, TICK).unwrap();
    let deliveries = references.collection::<Delivered>().unwrap().info();
    assert_eq!(deliveries.acquire_count, 0);

    let parcels = references.collection::<Delivery>().unwrap().info();
    assert_eq!(parcels.using_count, 0);
    assert_eq!(parcels.release_count, 2);
}

#[test]
fn test_strict_check_follows_host_profile() {
    let mut config = KernelConfig::default();
    config.host = HostConfig {
        development: false,
        editor: false,
    };
    config.reference.strict_check = ReferenceStrictCheckType::OnlyEnableWhenDevelopment;

    let lenient = ReferencePool::from_config(&config);
    assert!(!lenient.strict_check());
    let handle = lenient.acquire::<Delivered>().unwrap();
    lenient.release(handle).unwrap();
    lenient.release(handle).unwrap();
    assert_eq!(lenient.collection::<Delivered>().unwrap().info().release_count, 1);

    config.reference.strict_check = ReferenceStrictCheckType::AlwaysEnable;
    let strict = ReferencePool::from_config(&config);
    let handle = strict.acquire::<Delivered>().unwrap();
    strict.release(handle).unwrap();
    assert!(matches!(
        strict.release(handle),
        Err(KernelError::DoubleRelease { .. })
    ));
}

#[test]
fn test_min_heap_schedules_by_deadline() {
    let mut timers =
        MinHeap::with_comparator(|a: &(u64, &str), b: &(u64, &str)| a.0.cmp(&b.0));
    timers.push((30, "autosave"));
    timers.push((5, "blink"));
    timers.push((12, "respawn"));

    let order: Vec<&str> = std::iter::from_fn(|| timers.pop().map(|(_, name)| name)).collect();
    assert_eq!(order, vec!["blink", "respawn", "autosave"]);
}
