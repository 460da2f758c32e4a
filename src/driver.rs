use std::{
    any::Any,
    hash::Hash,
    io,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Instant,
};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, trace};

use crate::wheel::Core;

pub(crate) const THREAD_NAME: &str = "ringwheel-tick";

/// Cooperative stop flag with an interruptible wait.
struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl StopSignal {
    fn new() -> Self {
        Self {
            stopped: Mutex::new(false),
            wake: Condvar::new(),
        }
    }

    fn stop(&self) {
        *self.stopped.lock() = true;
        self.wake.notify_all();
    }

    fn is_stopped(&self) -> bool {
        *self.stopped.lock()
    }

    /// Block until `deadline` or a stop request. Returns `true` if stopped.
    ///
    /// Early wakeups that are not a stop request are logged and the wait
    /// resumes; they never end the loop.
    fn wait_until(&self, deadline: Instant) -> bool {
        let mut stopped = self.stopped.lock();
        loop {
            if *stopped {
                return true;
            }
            if self.wake.wait_until(&mut stopped, deadline).timed_out() {
                return *stopped;
            }
            if !*stopped {
                debug!("tick wait woke early, resuming");
            }
        }
    }
}

/// Handle to the background tick thread.
pub(crate) struct Ticker {
    signal: Arc<StopSignal>,
    handle: JoinHandle<()>,
}

impl Ticker {
    pub(crate) fn spawn<K, V>(core: Arc<Core<K, V>>) -> io::Result<Self>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        let signal = Arc::new(StopSignal::new());
        let loop_signal = Arc::clone(&signal);

        let handle = thread::Builder::new()
            .name(THREAD_NAME.into())
            .spawn(move || run(core, loop_signal))?;

        Ok(Self { signal, handle })
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Request a stop and wait for the loop to exit. Entries still on the
    /// wheel are left in place.
    pub(crate) fn stop(self) {
        self.signal.stop();

        // Stopping from inside the consumer: the loop exits on its own.
        if self.handle.thread().id() == thread::current().id() {
            return;
        }

        if let Err(panic) = self.handle.join() {
            error!(reason = panic_message(&*panic), "tick loop terminated by panic");
        }
    }
}

fn run<K, V>(core: Arc<Core<K, V>>, signal: Arc<StopSignal>)
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    // Held for the life of the loop: this thread is the only cursor mutator.
    let _driving = core.driving.lock();
    let tick = core.config.tick;

    info!(
        wheel_size = core.config.wheel_size,
        tick = ?tick,
        "tick loop started"
    );

    let mut next_tick = Instant::now();
    while !signal.is_stopped() {
        let (cursor, expired) = core.tick();
        trace!(cursor, expired = expired.len(), "tick");
        core.deliver(cursor, expired);

        let now = Instant::now();
        next_tick += tick;
        if next_tick <= now {
            next_tick = now + tick;
        }

        if signal.wait_until(next_tick) {
            break;
        }
    }

    info!(cursor = core.cursor(), "tick loop stopped");
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}
