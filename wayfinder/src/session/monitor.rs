// Fixed-interval session upkeep running on the tokio runtime.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

use super::{SessionManager, SessionWarning};

/// Handle to a running session timer. Dropping it stops the timer.
#[derive(Debug)]
pub struct SessionTimer {
    task: Option<JoinHandle<()>>,
}

impl SessionTimer {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SessionTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Tick `manager` every `period`: each tick samples performance and checks
/// the session timeout. Timeout warnings are forwarded on `warnings`; a
/// closed receiver does not stop the timer.
pub fn spawn_session_timer(
    manager: Arc<Mutex<SessionManager>>,
    period: Duration,
    warnings: mpsc::UnboundedSender<SessionWarning>,
) -> SessionTimer {
    let period = period.max(Duration::from_millis(1));
    let task = tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let mut manager = manager.lock().await;
            if manager.is_disposed() {
                engine::session_log!(debug, "session manager disposed, stopping timer");
                break;
            }
            if let Some(warning) = manager.on_timer_tick().await {
                engine::session_log!(warn, %warning, "session timer raised a warning");
                let _ = warnings.send(warning);
            }
        }
    });

    SessionTimer { task: Some(task) }
}
