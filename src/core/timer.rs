// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Timer abstraction and the tokio-backed production timer

use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

/// Callback run when a timer elapses
pub type ElapsedHandler = Arc<dyn Fn() + Send + Sync + 'static>;

/// One-shot or repeating timer.
///
/// Dropping a timer stops it and detaches its handler. A handler already
/// running when the timer is stopped may still complete, so handlers
/// re-check their own state before acting.
pub trait Timer: Send + Sync {
    fn interval(&self) -> Duration;

    /// Takes effect on the next `start`
    fn set_interval(&self, interval: Duration);

    fn auto_reset(&self) -> bool;

    fn set_handler(&self, handler: ElapsedHandler);

    /// Starts the timer, restarting the countdown if it is already running
    fn start(&self);

    fn stop(&self);

    fn is_running(&self) -> bool;
}

/// Creates timers
pub trait TimerFactory: Send + Sync {
    fn create(&self, interval: Duration, auto_reset: bool) -> Box<dyn Timer>;
}

/// Runtime used when timers are created outside any tokio context
static SHARED_RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Timers that sleep as tasks on a tokio runtime
#[derive(Debug, Clone)]
pub struct TokioTimerFactory {
    handle: Handle,
}

impl TokioTimerFactory {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Uses the caller's runtime, or a shared single-worker runtime when
    /// called outside one.
    pub fn system() -> std::io::Result<Self> {
        if let Ok(handle) = Handle::try_current() {
            return Ok(Self::new(handle));
        }
        if let Some(runtime) = SHARED_RUNTIME.get() {
            return Ok(Self::new(runtime.handle().clone()));
        }

        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("hazardwatch-timer")
            .enable_time()
            .build()?;
        // A racing caller may have installed its runtime first; ours is then dropped.
        Ok(Self::new(SHARED_RUNTIME.get_or_init(|| runtime).handle().clone()))
    }
}

impl TimerFactory for TokioTimerFactory {
    fn create(&self, interval: Duration, auto_reset: bool) -> Box<dyn Timer> {
        Box::new(TokioTimer::new(self.handle.clone(), interval, auto_reset))
    }
}

struct TokioTimerState {
    interval: Duration,
    auto_reset: bool,
    handler: Option<ElapsedHandler>,
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl TokioTimerState {
    fn halt(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

pub struct TokioTimer {
    handle: Handle,
    state: Arc<Mutex<TokioTimerState>>,
}

impl TokioTimer {
    pub fn new(handle: Handle, interval: Duration, auto_reset: bool) -> Self {
        Self {
            handle,
            state: Arc::new(Mutex::new(TokioTimerState {
                interval,
                auto_reset,
                handler: None,
                generation: 0,
                task: None,
            })),
        }
    }

    async fn run(state: Weak<Mutex<TokioTimerState>>, generation: u64, interval: Duration, auto_reset: bool) {
        loop {
            tokio::time::sleep(interval).await;

            let handler = {
                let Some(state) = state.upgrade() else { return };
                let mut state = state.lock();
                if state.generation != generation {
                    return;
                }
                if !auto_reset {
                    state.task = None;
                }
                state.handler.clone()
            };

            if let Some(handler) = handler {
                handler();
            }

            if !auto_reset {
                return;
            }
        }
    }
}

impl Timer for TokioTimer {
    fn interval(&self) -> Duration {
        self.state.lock().interval
    }

    fn set_interval(&self, interval: Duration) {
        self.state.lock().interval = interval;
    }

    fn auto_reset(&self) -> bool {
        self.state.lock().auto_reset
    }

    fn set_handler(&self, handler: ElapsedHandler) {
        self.state.lock().handler = Some(handler);
    }

    fn start(&self) {
        let mut state = self.state.lock();
        state.halt();

        let generation = state.generation;
        let interval = state.interval;
        // A zero-interval repeat would spin; it fires once instead.
        let auto_reset = state.auto_reset && !interval.is_zero();
        let weak = Arc::downgrade(&self.state);

        state.task = Some(
            self.handle
                .spawn(TokioTimer::run(weak, generation, interval, auto_reset)),
        );
    }

    fn stop(&self) {
        self.state.lock().halt();
    }

    fn is_running(&self) -> bool {
        self.state.lock().task.is_some()
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.halt();
        state.handler = None;
    }
}
