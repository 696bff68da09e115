//! Keyed job scheduler
//!
//! A fixed pool of background worker threads executes jobs with mutual
//! exclusion keyed by an arbitrary string (here: the project name). Jobs
//! sharing a key run one at a time in submission order; jobs with distinct
//! keys run concurrently with no relative ordering guarantee. Submission is
//! non-blocking and callers never wait on job execution.
//!
//! There is no cancellation, timeout or retry: a job that panics is caught
//! and logged, and simply does not re-run. `wait_idle` blocks until every
//! submitted job has finished, which the CLI uses to drain before exit.

use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use log::{debug, error};

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct SchedulerState {
    /// Pending jobs per key, FIFO
    queues: HashMap<String, VecDeque<Job>>,
    /// Keys with pending jobs and no job currently executing
    ready: VecDeque<String>,
    /// Keys whose job is currently executing
    active: HashSet<String>,
    /// Jobs submitted and not yet finished
    outstanding: usize,
    shutdown: bool,
}

struct SchedulerInner {
    state: Mutex<SchedulerState>,
    /// Signals workers that a key became ready (or shutdown was requested)
    work_cv: Condvar,
    /// Signals `wait_idle` callers that outstanding reached zero
    idle_cv: Condvar,
}

/// Scheduler with per-key mutual exclusion over a fixed worker pool.
pub struct KeyedScheduler {
    inner: Arc<SchedulerInner>,
    workers: Vec<JoinHandle<()>>,
}

impl KeyedScheduler {
    /// Start a scheduler with `workers` background threads (at least one).
    pub fn new(workers: usize) -> Self {
        let inner = Arc::new(SchedulerInner {
            state: Mutex::new(SchedulerState::default()),
            work_cv: Condvar::new(),
            idle_cv: Condvar::new(),
        });

        let handles = (0..workers.max(1))
            .map(|index| {
                let inner = Arc::clone(&inner);
                std::thread::Builder::new()
                    .name(format!("shutter-worker-{index}"))
                    .spawn(move || worker_loop(&inner))
                    .expect("failed to spawn scheduler worker")
            })
            .collect();

        Self {
            inner,
            workers: handles,
        }
    }

    /// Submit `job` under `key`. Non-blocking; the job executes off the
    /// caller's thread once no earlier job with the same key is running.
    pub fn schedule(&self, key: &str, job: impl FnOnce() + Send + 'static) {
        let mut state = self.inner.state.lock().unwrap();
        if state.shutdown {
            debug!("scheduler is shutting down; dropping job for '{key}'");
            return;
        }

        state
            .queues
            .entry(key.to_string())
            .or_default()
            .push_back(Box::new(job));
        state.outstanding += 1;

        if !state.active.contains(key) && !state.ready.iter().any(|k| k == key) {
            state.ready.push_back(key.to_string());
            self.inner.work_cv.notify_one();
        }
    }

    /// Block until every submitted job (including jobs submitted by running
    /// jobs) has finished.
    pub fn wait_idle(&self) {
        let mut state = self.inner.state.lock().unwrap();
        while state.outstanding > 0 {
            state = self.inner.idle_cv.wait(state).unwrap();
        }
    }

    /// Jobs submitted and not yet finished.
    pub fn outstanding(&self) -> usize {
        self.inner.state.lock().unwrap().outstanding
    }
}

impl Drop for KeyedScheduler {
    /// Running jobs finish; queued jobs that never started are discarded.
    /// Callers that need a full drain call `wait_idle` first.
    fn drop(&mut self) {
        {
            let mut state = self.inner.state.lock().unwrap();
            state.shutdown = true;
        }
        self.inner.work_cv.notify_all();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(inner: &SchedulerInner) {
    loop {
        let (key, job) = {
            let mut state = inner.state.lock().unwrap();
            loop {
                if state.shutdown {
                    return;
                }
                if let Some(key) = state.ready.pop_front() {
                    let job = state
                        .queues
                        .get_mut(&key)
                        .and_then(VecDeque::pop_front)
                        .expect("ready key must have a pending job");
                    state.active.insert(key.clone());
                    break (key, job);
                }
                state = inner.work_cv.wait(state).unwrap();
            }
        };

        if catch_unwind(AssertUnwindSafe(job)).is_err() {
            error!("job for '{key}' panicked; it will not re-run");
        }

        let mut state = inner.state.lock().unwrap();
        state.active.remove(&key);
        state.outstanding -= 1;

        let has_more = state.queues.get(&key).is_some_and(|q| !q.is_empty());
        if has_more {
            state.ready.push_back(key.clone());
            inner.work_cv.notify_one();
        } else {
            state.queues.remove(&key);
        }

        if state.outstanding == 0 {
            inner.idle_cv.notify_all();
        }
    }
}
