use crate::activity::ActivityEvent;
use crate::config::LockConfig;
use crate::controller::{LockController, LockPhase, UnlockResult};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

/// Session collaborator invoked when the unlock-attempt ceiling is reached.
///
/// The service fires it and does not wait on completion; logging the user
/// out may itself be asynchronous.
#[async_trait]
pub trait SessionTerminator: Send + Sync {
    async fn terminate(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Hosts a [`LockController`] behind a single-shot idle timer.
///
/// There is at most one pending deadline at any time; every qualifying
/// activity event replaces it (last reset wins). Expiry engages the lock,
/// a successful unlock re-arms the countdown, and [`LockService::teardown`]
/// cancels everything.
///
/// All state lives in this instance, so multiple services (e.g. in tests)
/// never interfere with each other.
pub struct LockService {
    controller: Arc<Mutex<LockController>>,
    terminator: Arc<dyn SessionTerminator>,
    deadline_tx: watch::Sender<Option<Instant>>,
    timer: Option<JoinHandle<()>>,
}

impl LockService {
    /// Creates the service and spawns its timer task. Must be called from
    /// within a tokio runtime.
    #[must_use]
    pub fn new(terminator: Arc<dyn SessionTerminator>) -> Self {
        let controller = Arc::new(Mutex::new(LockController::new()));
        let (deadline_tx, deadline_rx) = watch::channel(None);

        let timer = tokio::spawn(Self::run_timer(
            Arc::clone(&controller),
            deadline_tx.clone(),
            deadline_rx,
        ));

        info!("inactivity lock service started");
        Self {
            controller,
            terminator,
            deadline_tx,
            timer: Some(timer),
        }
    }

    async fn run_timer(
        controller: Arc<Mutex<LockController>>,
        deadline_tx: watch::Sender<Option<Instant>>,
        mut deadline_rx: watch::Receiver<Option<Instant>>,
    ) {
        loop {
            let deadline = *deadline_rx.borrow_and_update();
            if let Some(at) = deadline {
                tokio::select! {
                    () = sleep_until(at) => {
                        info!("idle timeout elapsed; engaging screen lock");
                        if let Ok(mut controller) = controller.lock() {
                            controller.engage_lock();
                        }
                        // Deadline consumed; nothing pending until rearmed.
                        deadline_tx.send_replace(None);
                    }
                    changed = deadline_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            } else if deadline_rx.changed().await.is_err() {
                break;
            }
        }
    }

    /// Applies the lock configuration together with the current session
    /// status, arming or disarming the idle countdown.
    ///
    /// Disarming cancels any pending deadline but never dismisses an
    /// already-engaged lock screen.
    #[allow(clippy::expect_used)]
    pub fn configure(&self, config: LockConfig, user_present: bool) {
        let phase = {
            let mut controller = self
                .controller
                .lock()
                .expect("unable to acquire the lock controller");
            controller.configure(config, user_present)
        };

        match phase {
            LockPhase::Idle => {
                self.rearm();
                debug!("inactivity lock armed");
            }
            LockPhase::Unarmed | LockPhase::Locked => {
                self.deadline_tx.send_replace(None);
                debug!(?phase, "inactivity countdown disarmed");
            }
        }
    }

    /// Records one qualifying activity event, replacing the pending idle
    /// deadline. Synchronous bookkeeping only; never blocks.
    ///
    /// Activity while locked or unarmed is ignored.
    #[allow(clippy::expect_used)]
    pub fn record_activity(&self, event: ActivityEvent) {
        let armed = {
            let controller = self
                .controller
                .lock()
                .expect("unable to acquire the lock controller");
            controller.phase() == LockPhase::Idle
        };
        if armed {
            debug!(%event, "activity; idle countdown reset");
            self.rearm();
        }
    }

    /// Processes a PIN entry from the lock screen.
    ///
    /// PIN verification and the timer re-arm are two separate steps joined
    /// here: a successful unlock restarts the idle countdown from this
    /// moment. Reaching the attempt ceiling fires the session terminator
    /// exactly once, without waiting on its completion.
    #[allow(clippy::expect_used)]
    pub fn attempt_unlock(&self, candidate: &str) -> UnlockResult {
        let (was_locked, result, phase) = {
            let mut controller = self
                .controller
                .lock()
                .expect("unable to acquire the lock controller");
            let was_locked = controller.is_locked();
            let result = controller.attempt_unlock(candidate);
            (was_locked, result, controller.phase())
        };

        match result {
            // Only a real unlock restarts the countdown; a spurious PIN
            // submission while idle must not touch the pending deadline.
            UnlockResult::Unlocked if was_locked && phase == LockPhase::Idle => self.rearm(),
            UnlockResult::Unlocked | UnlockResult::InvalidPin { .. } => {}
            UnlockResult::ForcedLogout => {
                self.deadline_tx.send_replace(None);
                let terminator = Arc::clone(&self.terminator);
                tokio::spawn(async move {
                    if let Err(e) = terminator.terminate().await {
                        warn!("session termination failed: {e}");
                    }
                });
            }
        }
        result
    }

    /// Cancels the timer task and disarms the controller. Idempotent and
    /// callable from any state; after teardown the service stays inert.
    #[allow(clippy::expect_used)]
    pub fn teardown(&mut self) {
        self.deadline_tx.send_replace(None);
        if let Some(timer) = self.timer.take() {
            timer.abort();
            info!("inactivity lock service stopped");
        }
        let mut controller = self
            .controller
            .lock()
            .expect("unable to acquire the lock controller");
        controller.disarm();
    }

    /// Remaining idle budget, `None` when no deadline is pending.
    #[must_use]
    pub fn time_until_lock(&self) -> Option<Duration> {
        self.deadline_tx
            .borrow()
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// The `locked` observable the host shell renders the overlay from.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn locked_watch(&self) -> watch::Receiver<bool> {
        self.controller
            .lock()
            .expect("unable to acquire the lock controller")
            .locked_watch()
    }

    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn is_locked(&self) -> bool {
        self.controller
            .lock()
            .expect("unable to acquire the lock controller")
            .is_locked()
    }

    /// Failed-attempt count for the "Attempts: N / 3" display.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn failed_attempts(&self) -> u32 {
        self.controller
            .lock()
            .expect("unable to acquire the lock controller")
            .failed_attempts()
    }

    #[allow(clippy::expect_used)]
    fn rearm(&self) {
        let timeout = {
            let controller = self
                .controller
                .lock()
                .expect("unable to acquire the lock controller");
            controller.config().timeout()
        };
        let now = Instant::now();
        // A saturated timeout can overflow Instant; push the deadline out
        // further than any session lives instead.
        let deadline = now
            .checked_add(timeout)
            .unwrap_or_else(|| now + Duration::from_secs(u64::from(u32::MAX)));
        self.deadline_tx.send_replace(Some(deadline));
    }
}

impl Drop for LockService {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{advance, sleep};

    #[derive(Default)]
    struct CountingTerminator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SessionTerminator for CountingTerminator {
        async fn terminate(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn armed_config() -> LockConfig {
        LockConfig {
            enabled: true,
            pin: "4321".to_string(),
            timeout_minutes: 5,
        }
    }

    fn service() -> (LockService, Arc<CountingTerminator>) {
        let terminator = Arc::new(CountingTerminator::default());
        let service = LockService::new(Arc::clone(&terminator) as Arc<dyn SessionTerminator>);
        (service, terminator)
    }

    /// Let the timer task observe whatever just changed.
    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_engages_after_idle_timeout() {
        let (service, _) = service();
        service.configure(armed_config(), true);
        assert!(!service.is_locked());

        sleep(Duration::from_secs(5 * 60 + 1)).await;
        settle().await;

        assert!(service.is_locked());
        // Consumed deadline: nothing pending while locked.
        assert!(service.time_until_lock().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_or_pinless_config_never_arms() {
        let (service, _) = service();

        service.configure(LockConfig::default(), true);
        assert!(service.time_until_lock().is_none());

        service.configure(
            LockConfig {
                pin: String::new(),
                ..armed_config()
            },
            true,
        );
        assert!(service.time_until_lock().is_none());

        service.configure(armed_config(), false);
        assert!(service.time_until_lock().is_none());

        sleep(Duration::from_secs(24 * 3600)).await;
        settle().await;
        assert!(!service.is_locked());
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_defers_the_deadline() {
        let (service, _) = service();
        service.configure(armed_config(), true);

        // Activity just shy of the deadline pushes it out.
        sleep(Duration::from_secs(4 * 60 + 59)).await;
        service.record_activity(ActivityEvent::PointerMove);
        settle().await;

        // The original five-minute mark passes without a lock.
        sleep(Duration::from_secs(62)).await;
        settle().await;
        assert!(!service.is_locked());

        // A full quiet window after the last activity does lock.
        sleep(Duration::from_secs(5 * 60)).await;
        settle().await;
        assert!(service.is_locked());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlock_restarts_the_countdown() {
        let (service, _) = service();
        service.configure(armed_config(), true);

        sleep(Duration::from_secs(5 * 60 + 1)).await;
        settle().await;
        assert!(service.is_locked());

        assert_eq!(service.attempt_unlock("4321"), UnlockResult::Unlocked);
        assert!(!service.is_locked());
        assert!(service.time_until_lock().is_some());

        // The countdown restarted from the unlock moment.
        sleep(Duration::from_secs(5 * 60 + 1)).await;
        settle().await;
        assert!(service.is_locked());
    }

    #[tokio::test(start_paused = true)]
    async fn test_third_wrong_pin_terminates_session_once() {
        let (service, terminator) = service();
        service.configure(armed_config(), true);

        sleep(Duration::from_secs(5 * 60 + 1)).await;
        settle().await;
        assert!(service.is_locked());

        assert_eq!(
            service.attempt_unlock("1111"),
            UnlockResult::InvalidPin { attempts: 1 }
        );
        assert_eq!(
            service.attempt_unlock("2222"),
            UnlockResult::InvalidPin { attempts: 2 }
        );
        assert_eq!(service.attempt_unlock("3333"), UnlockResult::ForcedLogout);

        settle().await;
        assert_eq!(terminator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spurious_unlock_while_idle_keeps_deadline() {
        let (service, _) = service();
        service.configure(armed_config(), true);

        advance(Duration::from_secs(4 * 60)).await;
        // A stray PIN submission from the host while nothing is locked.
        assert_eq!(service.attempt_unlock("4321"), UnlockResult::Unlocked);
        assert_eq!(
            service.time_until_lock(),
            Some(Duration::from_secs(60)),
            "spurious unlock must not reset the countdown"
        );

        // The original deadline still holds.
        sleep(Duration::from_secs(61)).await;
        settle().await;
        assert!(service.is_locked());
    }

    #[tokio::test(start_paused = true)]
    async fn test_absurd_persisted_timeout_arms_without_panicking() {
        let (service, _) = service();
        service.configure(
            LockConfig {
                timeout_minutes: u64::MAX,
                ..armed_config()
            },
            true,
        );

        assert!(service.time_until_lock().is_some());
        sleep(Duration::from_secs(365 * 24 * 3600)).await;
        settle().await;
        assert!(!service.is_locked());
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_is_idempotent_and_inert() {
        let (mut service, _) = service();
        service.configure(armed_config(), true);

        service.teardown();
        service.teardown();

        sleep(Duration::from_secs(7 * 24 * 3600)).await;
        settle().await;
        assert!(!service.is_locked());
        assert!(service.time_until_lock().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_before_configure_is_safe() {
        let (mut service, _) = service();
        service.teardown();
        service.configure(armed_config(), true);

        sleep(Duration::from_secs(5 * 60 + 1)).await;
        settle().await;
        // Torn down: the timer task is gone, so nothing may fire.
        assert!(!service.is_locked());
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_until_lock_counts_down() {
        let (service, _) = service();
        service.configure(armed_config(), true);

        let full = service.time_until_lock().unwrap();
        assert_eq!(full, Duration::from_secs(5 * 60));

        advance(Duration::from_secs(60)).await;
        let remaining = service.time_until_lock().unwrap();
        assert_eq!(remaining, Duration::from_secs(4 * 60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_locked_watch_notifies_host() {
        let (service, _) = service();
        let mut watch = service.locked_watch();
        service.configure(armed_config(), true);

        sleep(Duration::from_secs(5 * 60 + 1)).await;
        watch.changed().await.unwrap();
        assert!(*watch.borrow());

        service.attempt_unlock("4321");
        watch.changed().await.unwrap();
        assert!(!*watch.borrow());
    }
}
