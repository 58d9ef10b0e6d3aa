//! Worker thread pool
//!
//! One OS thread per `WorkerDescriptor`. Each thread:
//!
//! 1. pins itself to its core, if it has one (failure ends the worker)
//! 2. calls its step function until the budget runs out, a stop is
//!    requested, the step reports `Done`, or the step fails
//! 3. returns a `WorkerResult`
//!
//! Live per-worker state sits in a shared array of atomics so the owner
//! can watch progress without touching the workers.

use fica_core::{
    AffinityError, Backoff, ExitStatus, PoolError, PoolResult, Step, StepResult, StopToken,
    Stopwatch, WorkerDescriptor, WorkerResult, WorkerState,
};
use fica_core::{fdebug, ferror, finfo, fwarn};

use crate::affinity;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// What a step function sees on each call
#[derive(Debug)]
pub struct WorkerContext {
    index: usize,
    core: Option<usize>,
    iteration: u64,
    items: u64,
    bytes: u64,
    clock: Stopwatch,
    stop: StopToken,
}

impl WorkerContext {
    fn new(desc: &WorkerDescriptor, stop: StopToken) -> Self {
        Self {
            index: desc.index,
            core: desc.core,
            iteration: 0,
            items: 0,
            bytes: 0,
            clock: Stopwatch::start(),
            stop,
        }
    }

    /// Worker index
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Core this worker is pinned to
    #[inline]
    pub fn core(&self) -> Option<usize> {
        self.core
    }

    /// Step calls completed before this one
    #[inline]
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Items processed so far
    #[inline]
    pub fn items_processed(&self) -> u64 {
        self.items
    }

    /// Bytes moved so far
    #[inline]
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Time since the loop started
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.clock.elapsed()
    }

    /// Lets long-running steps bail out early
    #[inline]
    pub fn stop_requested(&self) -> bool {
        self.stop.is_stop_requested()
    }
}

struct WorkerHandle {
    index: usize,
    core: Option<usize>,
    handle: JoinHandle<WorkerResult>,
}

/// A running set of worker threads
pub struct WorkerPool {
    handles: Vec<WorkerHandle>,
    /// Indexed by worker index
    states: Arc<[AtomicU8]>,
    stop: StopToken,
}

impl WorkerPool {
    /// Start one thread per descriptor, all sharing `step`.
    ///
    /// Fails with `PoolError::Config` before spawning anything if the
    /// descriptors do not fit the machine.
    pub fn start<F>(descriptors: Vec<WorkerDescriptor>, step: F) -> PoolResult<Self>
    where
        F: Fn(&mut WorkerContext) -> StepResult + Send + Sync + 'static,
    {
        let step = Arc::new(step);
        Self::start_with(descriptors, move |_desc| {
            let step = Arc::clone(&step);
            move |ctx: &mut WorkerContext| (*step)(ctx)
        })
    }

    /// Start one thread per descriptor, each with its own step built by
    /// `factory`.
    ///
    /// `factory` runs on the calling thread, once per descriptor, in order.
    /// Use it to hand each worker its own channel or queue end.
    pub fn start_with<M, S>(descriptors: Vec<WorkerDescriptor>, factory: M) -> PoolResult<Self>
    where
        M: FnMut(&WorkerDescriptor) -> S,
        S: FnMut(&mut WorkerContext) -> StepResult + Send + 'static,
    {
        Self::start_inner(
            descriptors,
            factory,
            affinity::available_core_count(),
            affinity::bind_current_thread,
        )
    }

    /// `start_with` with the core count and bind call supplied by the caller
    pub(crate) fn start_inner<M, S>(
        descriptors: Vec<WorkerDescriptor>,
        mut factory: M,
        available: usize,
        bind: BindFn,
    ) -> PoolResult<Self>
    where
        M: FnMut(&WorkerDescriptor) -> S,
        S: FnMut(&mut WorkerContext) -> StepResult + Send + 'static,
    {
        validate_descriptors(&descriptors, available)?;

        let n = descriptors.len();
        let states: Arc<[AtomicU8]> = (0..n)
            .map(|_| AtomicU8::new(WorkerState::Created.into()))
            .collect();

        // Owns every handle from the first spawn on; dropping it mid-start
        // (factory panic) stops the workers already running.
        let mut pool = Self {
            handles: Vec::with_capacity(n),
            states,
            stop: StopToken::new(),
        };

        finfo!("starting {} workers", n);

        for desc in descriptors {
            let step = factory(&desc);
            let (index, core) = (desc.index, desc.core);
            let states_ref = Arc::clone(&pool.states);
            let stop_ref = pool.stop.clone();

            let spawned = thread::Builder::new()
                .name(format!("fica-worker-{}", index))
                .spawn(move || run_worker(desc, step, &states_ref, stop_ref, bind));

            match spawned {
                Ok(handle) => {
                    fdebug!("spawned worker {} (core {:?})", index, core);
                    pool.handles.push(WorkerHandle { index, core, handle });
                }
                Err(e) => {
                    ferror!("failed to spawn worker {}: {}", index, e);
                    pool.stop.stop();
                    for h in std::mem::take(&mut pool.handles) {
                        let _ = h.handle.join();
                    }
                    return Err(PoolError::SpawnFailed {
                        worker: index,
                        errno: e.raw_os_error(),
                    });
                }
            }
        }

        Ok(pool)
    }

    /// Ask every worker to stop at its next iteration boundary.
    ///
    /// Does not wait; call `join_all` for that.
    pub fn request_stop(&self) {
        fdebug!("stop requested");
        self.stop.stop();
    }

    /// Handle another thread can use to stop this pool
    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    /// Live state of worker `index`
    pub fn worker_state(&self, index: usize) -> Option<WorkerState> {
        self.states
            .get(index)
            .map(|s| WorkerState::from(s.load(Ordering::Acquire)))
    }

    /// Number of workers
    #[inline]
    pub fn num_workers(&self) -> usize {
        self.states.len()
    }

    /// True once every worker thread has exited
    pub fn all_finished(&self) -> bool {
        self.handles.iter().all(|h| h.handle.is_finished())
    }

    /// Wait for every worker; results in worker-index order.
    pub fn join_all(mut self) -> Vec<WorkerResult> {
        let handles = std::mem::take(&mut self.handles);
        let mut results: Vec<WorkerResult> = handles
            .into_iter()
            .map(|h| match h.handle.join() {
                Ok(result) => result,
                Err(_) => {
                    ferror!("worker {} panicked outside its step", h.index);
                    let slot = &self.states[h.index];
                    if !WorkerState::from(slot.load(Ordering::Acquire)).is_terminated() {
                        slot.store(WorkerState::Failed.into(), Ordering::Release);
                    }
                    WorkerResult::not_started(h.index, h.core, ExitStatus::Panicked)
                }
            })
            .collect();
        results.sort_by_key(|r| r.index);
        results
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            // Dropped without join_all: let the workers wind down on their own.
            self.stop.stop();
        }
    }
}

/// Reject descriptor sets that cannot run on this machine.
fn validate_descriptors(descriptors: &[WorkerDescriptor], available: usize) -> PoolResult<()> {
    use fica_core::ConfigError;

    let n = descriptors.len();
    if n == 0 || n > available {
        return Err(ConfigError::WorkerCount { requested: n, available }.into());
    }
    let mut seen = vec![false; n];
    for d in descriptors {
        if d.index >= n {
            return Err(ConfigError::IndexOutOfRange { index: d.index, workers: n }.into());
        }
        if std::mem::replace(&mut seen[d.index], true) {
            return Err(ConfigError::DuplicateIndex(d.index).into());
        }
        if let Some(core) = d.core {
            if core >= available {
                return Err(ConfigError::CoreOutOfRange {
                    worker: d.index,
                    core,
                    available,
                }
                .into());
            }
        }
    }
    Ok(())
}

/// Pins the calling worker thread to a core
pub(crate) type BindFn = fn(usize) -> Result<(), AffinityError>;

#[inline]
fn set_state(slot: &AtomicU8, state: WorkerState) {
    let prev = WorkerState::from(slot.swap(state.into(), Ordering::AcqRel));
    debug_assert!(
        prev.can_transition_to(state),
        "bad worker transition {} -> {}",
        prev,
        state
    );
}

/// Worker thread body
fn run_worker<S>(
    desc: WorkerDescriptor,
    mut step: S,
    states: &[AtomicU8],
    stop: StopToken,
    bind: BindFn,
) -> WorkerResult
where
    S: FnMut(&mut WorkerContext) -> StepResult,
{
    let slot = &states[desc.index];

    if let Some(core) = desc.core {
        set_state(slot, WorkerState::Binding);
        if let Err(e) = bind(core) {
            fwarn!("bind to core {} failed: {}", core, e);
            set_state(slot, WorkerState::Failed);
            return WorkerResult::not_started(
                desc.index,
                desc.core,
                ExitStatus::AffinityBindFailure(e),
            );
        }
        fdebug!("bound to core {}", core);
    }

    set_state(slot, WorkerState::Running);
    let mut ctx = WorkerContext::new(&desc, stop);
    let mut backoff = Backoff::new(desc.idle);

    let status = loop {
        if ctx.stop.is_stop_requested() {
            break ExitStatus::Stopped;
        }
        if desc.budget.exhausted(ctx.iteration, ctx.elapsed()) {
            break ExitStatus::BudgetExhausted;
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| step(&mut ctx)));
        ctx.iteration += 1;

        match outcome {
            Ok(Ok(Step::Processed { bytes })) => {
                ctx.items += 1;
                ctx.bytes += bytes;
                backoff.reset();
            }
            Ok(Ok(Step::Idle)) => backoff.snooze(),
            Ok(Ok(Step::Done)) => break ExitStatus::Finished,
            Ok(Err(e)) => {
                ferror!("step {} failed: {}", ctx.iteration, e);
                break ExitStatus::HardwareError(e);
            }
            Err(_) => {
                ferror!("step {} panicked", ctx.iteration);
                break ExitStatus::Panicked;
            }
        }
    };

    let result = WorkerResult {
        index: desc.index,
        core: desc.core,
        state: status.final_state(),
        status,
        iterations: ctx.iteration,
        items: ctx.items,
        bytes: ctx.bytes,
        elapsed: ctx.elapsed(),
    };
    set_state(slot, result.state);
    finfo!("{}", result);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use fica_core::{Budget, ConfigError, HardwareError, WorkQueue};
    use std::sync::atomic::{AtomicBool, AtomicU64};
    use std::time::Instant;

    fn cores() -> usize {
        affinity::available_core_count()
    }

    #[test]
    fn test_too_many_workers_rejected_before_spawn() {
        let calls = Arc::new(AtomicU64::new(0));
        let calls2 = Arc::clone(&calls);

        let descriptors = (0..cores() + 1)
            .map(|i| WorkerDescriptor::new(i).budget(Budget::passes(1)))
            .collect();
        let err = WorkerPool::start(descriptors, move |_| {
            calls2.fetch_add(1, Ordering::Relaxed);
            Ok(Step::item())
        })
        .err()
        .unwrap();

        assert_eq!(
            err,
            PoolError::Config(ConfigError::WorkerCount {
                requested: cores() + 1,
                available: cores(),
            })
        );
        thread::sleep(Duration::from_millis(20));
        assert_eq!(calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_empty_and_bad_descriptors_rejected() {
        let err = WorkerPool::start(Vec::new(), |_| Ok(Step::item())).err().unwrap();
        assert!(matches!(err, PoolError::Config(ConfigError::WorkerCount { requested: 0, .. })));

        let err = WorkerPool::start(vec![WorkerDescriptor::new(0).core(cores())], |_| {
            Ok(Step::item())
        })
        .err()
        .unwrap();
        assert!(matches!(err, PoolError::Config(ConfigError::CoreOutOfRange { .. })));

        let err = WorkerPool::start(vec![WorkerDescriptor::new(1)], |_| Ok(Step::item()))
            .err()
            .unwrap();
        assert_eq!(
            err,
            PoolError::Config(ConfigError::IndexOutOfRange { index: 1, workers: 1 })
        );

        if cores() >= 2 {
            let err = WorkerPool::start(
                vec![WorkerDescriptor::new(0), WorkerDescriptor::new(0)],
                |_| Ok(Step::item()),
            )
            .err()
            .unwrap();
            assert_eq!(err, PoolError::Config(ConfigError::DuplicateIndex(0)));
        }
    }

    #[test]
    fn test_deadline_completes_near_two_seconds() {
        let pool = WorkerPool::start(
            vec![WorkerDescriptor::new(0).budget(Budget::deadline(Duration::from_secs(2)))],
            |_| Ok(Step::item()),
        )
        .unwrap();
        let results = pool.join_all();

        let r = &results[0];
        assert_eq!(r.state, WorkerState::Completed);
        assert_eq!(r.status, ExitStatus::BudgetExhausted);
        assert!(r.elapsed >= Duration::from_secs(2));
        assert!(r.elapsed < Duration::from_millis(2_500), "elapsed {:?}", r.elapsed);
        assert!(r.items > 0);
        assert_eq!(r.items, r.iterations);
    }

    #[test]
    fn test_pass_budget() {
        let pool = WorkerPool::start(
            vec![WorkerDescriptor::new(0).budget(Budget::passes(300))],
            |_| Ok(Step::bytes(8)),
        )
        .unwrap();
        let r = pool.join_all().remove(0);
        assert_eq!(r.status, ExitStatus::BudgetExhausted);
        assert_eq!(r.iterations, 300);
        assert_eq!(r.items, 300);
        assert_eq!(r.bytes, 2_400);
    }

    #[test]
    fn test_hardware_error_on_fifth_call() {
        let workers = cores().min(2);
        let descriptors = (0..workers)
            .map(|i| WorkerDescriptor::new(i).budget(Budget::passes(100)))
            .collect();

        let pool = WorkerPool::start_with(descriptors, |desc| {
            let failing = desc.index == 0;
            let mut calls = 0u32;
            move |_ctx: &mut WorkerContext| {
                calls += 1;
                if failing && calls == 5 {
                    Err(HardwareError::Device("link down"))
                } else {
                    Ok(Step::item())
                }
            }
        })
        .unwrap();
        let results = pool.join_all();

        assert_eq!(results[0].state, WorkerState::Failed);
        assert_eq!(
            results[0].status,
            ExitStatus::HardwareError(HardwareError::Device("link down"))
        );
        assert_eq!(results[0].items, 4);

        if workers == 2 {
            assert_eq!(results[1].state, WorkerState::Completed);
            assert_eq!(results[1].items, 100);
        }
    }

    #[test]
    fn test_results_in_index_order() {
        let workers = cores().min(3);
        // Hand the descriptors over in reverse
        let descriptors = (0..workers)
            .rev()
            .map(|i| WorkerDescriptor::new(i).budget(Budget::passes(1)))
            .collect();

        let pool = WorkerPool::start(descriptors, |ctx| {
            // Lower indices finish last
            let ms = (3 - ctx.index() as u64) * 20;
            thread::sleep(Duration::from_millis(ms));
            Ok(Step::item())
        })
        .unwrap();

        let indices: Vec<_> = pool.join_all().iter().map(|r| r.index).collect();
        assert_eq!(indices, (0..workers).collect::<Vec<_>>());
    }

    #[test]
    fn test_request_stop() {
        let pool = WorkerPool::start(vec![WorkerDescriptor::new(0)], |_| Ok(Step::Idle)).unwrap();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(pool.worker_state(0), Some(WorkerState::Running));

        let start = Instant::now();
        pool.request_stop();
        let r = pool.join_all().remove(0);

        assert_eq!(r.status, ExitStatus::Stopped);
        assert_eq!(r.state, WorkerState::Completed);
        assert_eq!(r.items, 0);
        assert!(r.iterations > 0);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_stop_token_from_other_thread() {
        let pool = WorkerPool::start(vec![WorkerDescriptor::new(0)], |_| {
            thread::sleep(Duration::from_millis(1));
            Ok(Step::item())
        })
        .unwrap();
        let token = pool.stop_token();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            token.stop();
        });
        let r = pool.join_all().remove(0);
        assert_eq!(r.status, ExitStatus::Stopped);
    }

    #[test]
    fn test_step_done_finishes() {
        let pool = WorkerPool::start(vec![WorkerDescriptor::new(0)], |ctx| {
            if ctx.items_processed() == 10 {
                Ok(Step::Done)
            } else {
                Ok(Step::item())
            }
        })
        .unwrap();
        let r = pool.join_all().remove(0);
        assert_eq!(r.status, ExitStatus::Finished);
        assert_eq!(r.state, WorkerState::Completed);
        assert_eq!(r.items, 10);
        assert_eq!(r.iterations, 11);
    }

    #[test]
    fn test_panicking_step_reported() {
        let pool = WorkerPool::start(vec![WorkerDescriptor::new(0)], |ctx| {
            if ctx.iteration() == 3 {
                panic!("step blew up");
            }
            Ok(Step::item())
        })
        .unwrap();
        let r = pool.join_all().remove(0);
        assert_eq!(r.status, ExitStatus::Panicked);
        assert_eq!(r.state, WorkerState::Failed);
        assert_eq!(r.items, 3);
    }

    #[test]
    fn test_worker_state_after_join() {
        let pool = WorkerPool::start(
            vec![WorkerDescriptor::new(0).budget(Budget::passes(5))],
            |_| Ok(Step::item()),
        )
        .unwrap();
        while !pool.all_finished() {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(pool.worker_state(0), Some(WorkerState::Completed));
        assert_eq!(pool.worker_state(1), None);
        pool.join_all();
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_bound_worker_runs_on_its_core() {
        let core = *affinity::allowed_cores().last().unwrap();
        let pool = WorkerPool::start(
            vec![WorkerDescriptor::new(0).core(core).budget(Budget::passes(1))],
            move |ctx| {
                assert_eq!(ctx.core(), Some(core));
                if affinity::allowed_cores() == vec![core] {
                    Ok(Step::item())
                } else {
                    Err(HardwareError::Device("not pinned"))
                }
            },
        )
        .unwrap();
        let r = pool.join_all().remove(0);
        assert_eq!(r.state, WorkerState::Completed, "{}", r);
        assert_eq!(r.core, Some(core));
        assert_eq!(r.items, 1);
    }

    #[test]
    fn test_producer_consumer_through_queue() {
        if cores() < 2 {
            return;
        }
        const ITEMS: u64 = 10_000;
        let queue = Arc::new(WorkQueue::new());
        let received = Arc::new(AtomicU64::new(0));

        let descriptors = vec![
            WorkerDescriptor::new(0).budget(Budget::passes(ITEMS)),
            WorkerDescriptor::new(1).budget(Budget::deadline(Duration::from_secs(10))),
        ];
        let received2 = Arc::clone(&received);
        let pool = WorkerPool::start_with(descriptors, |desc| {
            let queue = Arc::clone(&queue);
            let received = Arc::clone(&received2);
            let producer = desc.index == 0;
            let mut next = 0u64;
            move |_ctx: &mut WorkerContext| {
                if producer {
                    queue.enqueue(next).map_err(|_| HardwareError::Device("queue full"))?;
                    next += 1;
                    return Ok(Step::item());
                }
                match queue.dequeue() {
                    Some(v) => {
                        // Single producer: strictly increasing
                        if v != next {
                            return Err(HardwareError::Device("out of order"));
                        }
                        next += 1;
                        received.fetch_add(1, Ordering::Relaxed);
                        if next == ITEMS {
                            Ok(Step::Done)
                        } else {
                            Ok(Step::item())
                        }
                    }
                    None => Ok(Step::Idle),
                }
            }
        })
        .unwrap();

        let results = pool.join_all();
        assert!(results.iter().all(|r| r.is_success()), "{:?}", results);
        assert_eq!(results[1].status, ExitStatus::Finished);
        assert_eq!(received.load(Ordering::Relaxed), ITEMS);
        assert!(queue.is_empty());
    }

    fn refuse_bind(_core: usize) -> Result<(), AffinityError> {
        Err(AffinityError::Os(22))
    }

    fn exploding_bind(_core: usize) -> Result<(), AffinityError> {
        panic!("bind exploded");
    }

    /// Sets the flag when the owning step is dropped, i.e. when its worker exits
    struct SetOnDrop(Arc<AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_bind_failure_is_fatal_for_that_worker_only() {
        let calls = Arc::new(AtomicU64::new(0));
        let descriptors = vec![
            WorkerDescriptor::new(0).core(0).budget(Budget::passes(10)),
            WorkerDescriptor::new(1).budget(Budget::passes(10)),
        ];

        let pool = WorkerPool::start_inner(
            descriptors,
            |desc| {
                let calls = Arc::clone(&calls);
                let index = desc.index;
                move |_ctx: &mut WorkerContext| -> StepResult {
                    if index == 0 {
                        calls.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(Step::item())
                }
            },
            2,
            refuse_bind,
        )
        .unwrap();
        let results = pool.join_all();

        let bound = &results[0];
        assert_eq!(bound.state, WorkerState::Failed);
        assert_eq!(bound.status, ExitStatus::AffinityBindFailure(AffinityError::Os(22)));
        assert_eq!(bound.items, 0);
        assert_eq!(bound.iterations, 0);
        assert_eq!(bound.elapsed, Duration::ZERO);
        assert_eq!(calls.load(Ordering::Relaxed), 0);

        // The unbound sibling never calls the binder and runs its budget out
        assert_eq!(results[1].state, WorkerState::Completed);
        assert_eq!(results[1].status, ExitStatus::BudgetExhausted);
        assert_eq!(results[1].items, 10);
    }

    #[test]
    fn test_factory_panic_stops_started_workers() {
        let exited = Arc::new(AtomicBool::new(false));
        let exited2 = Arc::clone(&exited);

        let started = panic::catch_unwind(AssertUnwindSafe(|| {
            WorkerPool::start_inner(
                vec![WorkerDescriptor::new(0), WorkerDescriptor::new(1)],
                |desc| {
                    if desc.index == 1 {
                        panic!("no step for worker 1");
                    }
                    let guard = SetOnDrop(Arc::clone(&exited2));
                    move |_ctx: &mut WorkerContext| -> StepResult {
                        let _held = &guard;
                        Ok(Step::Idle)
                    }
                },
                2,
                refuse_bind,
            )
        }));
        assert!(started.is_err());

        // Worker 0 has a forever budget; only the stop flag can end it
        let deadline = Instant::now() + Duration::from_secs(5);
        while !exited.load(Ordering::SeqCst) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(exited.load(Ordering::SeqCst));
    }

    #[test]
    fn test_panic_outside_step_marks_state_failed() {
        let pool = WorkerPool::start_inner(
            vec![WorkerDescriptor::new(0).core(0)],
            |_desc| |_ctx: &mut WorkerContext| -> StepResult { Ok(Step::item()) },
            1,
            exploding_bind,
        )
        .unwrap();
        let states = Arc::clone(&pool.states);

        let r = pool.join_all().remove(0);
        assert_eq!(r.status, ExitStatus::Panicked);
        assert_eq!(r.state, WorkerState::Failed);
        assert_eq!(WorkerState::from(states[0].load(Ordering::Acquire)), WorkerState::Failed);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "bad worker transition")]
    fn test_set_state_rejects_bad_transition() {
        let slot = AtomicU8::new(WorkerState::Completed.into());
        set_state(&slot, WorkerState::Running);
    }
}
