// Tick thread and shared engine handle
// One timer-driven scheduling loop per engine, never leaked, never doubled

use crate::engine::Engine;
use crate::error::EngineResult;
use crate::sequencer::transport::{PlayMode, TransportAction, TransportState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

/// Background thread calling `Engine::tick` every interval
///
/// The engine lock is taken only for the duration of one tick. The thread exits
/// on its own when the engine stops playing, and is cancelled and joined on drop.
pub struct TickThread {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl TickThread {
    pub fn spawn<E: Engine>(
        engine: Arc<Mutex<E>>,
        name: &str,
        interval: Duration,
    ) -> EngineResult<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let thread_name = format!("{}-scheduler", name);

        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                tracing::debug!(thread = %thread_name, ?interval, "scheduler thread started");
                let mut ticks: u64 = 0;

                while !stop_flag.load(Ordering::Acquire) {
                    {
                        let mut engine = match engine.lock() {
                            Ok(guard) => guard,
                            Err(_) => {
                                tracing::error!(thread = %thread_name, "engine lock poisoned");
                                break;
                            }
                        };
                        if !engine.is_playing() {
                            break;
                        }
                        engine.tick();
                        ticks += 1;
                        if !engine.is_playing() {
                            break;
                        }
                    }
                    thread::park_timeout(interval);
                }

                tracing::debug!(thread = %thread_name, ticks, "scheduler thread exited");
            })?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// True once the thread has returned
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Ask the thread to exit and wait for it
    pub fn cancel(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                tracing::error!("scheduler thread panicked");
            }
        }
    }
}

impl Drop for TickThread {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Engine behind `Arc<Mutex<_>>` plus its tick thread
///
/// Clones share both the engine and the thread.
pub struct SharedEngine<E: Engine> {
    engine: Arc<Mutex<E>>,
    ticker: Arc<Mutex<Option<TickThread>>>,
}

impl<E: Engine> Clone for SharedEngine<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            ticker: Arc::clone(&self.ticker),
        }
    }
}

impl<E: Engine> SharedEngine<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            ticker: Arc::new(Mutex::new(None)),
        }
    }

    /// Lock the engine for editing
    pub fn lock(&self) -> MutexGuard<'_, E> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with the engine locked
    pub fn with<R>(&self, f: impl FnOnce(&mut E) -> R) -> R {
        f(&mut self.lock())
    }

    /// Start (or switch) playback and make sure exactly one tick thread runs
    pub fn play(&self, mode: PlayMode) -> EngineResult<TransportAction> {
        let mut ticker = self.ticker.lock().unwrap_or_else(PoisonError::into_inner);

        let pending = self.lock().transport().transition(mode);
        let ticking = ticker.as_ref().is_some_and(|t| !t.is_finished());
        if pending == TransportAction::NoOp && ticking {
            return Ok(TransportAction::NoOp);
        }

        // The old thread must be gone before the engine is restarted
        if let Some(mut old) = ticker.take() {
            old.cancel();
        }

        let (action, name, interval) = {
            let mut engine = self.lock();
            let action = engine.play(mode);
            (action, engine.name(), engine.tick_interval())
        };
        *ticker = Some(TickThread::spawn(Arc::clone(&self.engine), name, interval)?);
        tracing::info!(engine = name, ?mode, ?action, "transport playing");
        Ok(action)
    }

    /// Stop playback; the tick thread is joined before the engine is touched
    pub fn stop(&self) {
        let mut ticker = self.ticker.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut thread) = ticker.take() {
            thread.cancel();
        }
        let mut engine = self.lock();
        engine.stop();
        tracing::info!(engine = engine.name(), "transport stopped");
    }

    pub fn transport(&self) -> TransportState {
        self.lock().transport()
    }

    /// True while a tick thread is alive
    pub fn is_ticking(&self) -> bool {
        self.ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    /// Minimal engine counting ticks, stopping itself after `limit`
    struct CountingEngine {
        state: TransportState,
        ticks: u32,
        limit: u32,
    }

    impl CountingEngine {
        fn new(limit: u32) -> Self {
            Self {
                state: TransportState::Stopped,
                ticks: 0,
                limit,
            }
        }
    }

    impl Engine for CountingEngine {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn tick_interval(&self) -> Duration {
            Duration::from_millis(1)
        }

        fn transport(&self) -> TransportState {
            self.state
        }

        fn play(&mut self, mode: PlayMode) -> TransportAction {
            let action = self.state.transition(mode);
            self.state = TransportState::playing(mode);
            action
        }

        fn stop(&mut self) {
            self.state = TransportState::Stopped;
        }

        fn tick(&mut self) {
            self.ticks += 1;
            if self.ticks >= self.limit {
                self.state = TransportState::Stopped;
            }
        }
    }

    fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_thread_exits_when_engine_stops_itself() {
        let shared = SharedEngine::new(CountingEngine::new(5));
        assert_eq!(shared.play(PlayMode::Pattern).unwrap(), TransportAction::Start);

        wait_until(|| !shared.is_ticking());
        assert_eq!(shared.lock().ticks, 5);
        assert_eq!(shared.transport(), TransportState::Stopped);
    }

    #[test]
    fn test_stop_joins_thread() {
        let shared = SharedEngine::new(CountingEngine::new(u32::MAX));
        shared.play(PlayMode::Timeline).unwrap();
        wait_until(|| shared.lock().ticks > 2);

        shared.stop();
        assert!(!shared.is_ticking());
        let ticks = shared.lock().ticks;
        thread::sleep(Duration::from_millis(10));
        assert_eq!(shared.lock().ticks, ticks);
    }

    #[test]
    fn test_same_mode_is_noop_and_other_mode_restarts() {
        let shared = SharedEngine::new(CountingEngine::new(u32::MAX));
        shared.play(PlayMode::Pattern).unwrap();

        assert_eq!(shared.play(PlayMode::Pattern).unwrap(), TransportAction::NoOp);
        assert_eq!(shared.play(PlayMode::Timeline).unwrap(), TransportAction::Restart);
        assert_eq!(shared.transport(), TransportState::PlayingTimeline);
        assert!(shared.is_ticking());

        shared.stop();
    }

    #[test]
    fn test_dropping_last_handle_joins_thread() {
        let shared = SharedEngine::new(CountingEngine::new(u32::MAX));
        let engine = Arc::clone(&shared.engine);
        shared.play(PlayMode::Pattern).unwrap();
        drop(shared);

        let ticks = engine.lock().unwrap().ticks;
        thread::sleep(Duration::from_millis(10));
        assert_eq!(engine.lock().unwrap().ticks, ticks);
    }
}
