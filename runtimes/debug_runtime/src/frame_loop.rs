// Fixed-rate frame loop driving the navigation system.
//
// The navigation system is owned by this task alone. Commands from the HTTP
// side are drained at the top of each frame, before `update`, so a request
// always observes a whole frame.

use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use wayfinder::sim::FlatWorld;
use wayfinder::NavigationSystem;

use crate::commands::{FrameSnapshot, RuntimeCommand};

pub struct FrameLoop {
    navigation: NavigationSystem<FlatWorld>,
    commands: mpsc::UnboundedReceiver<RuntimeCommand>,
    period: Duration,
    frame_limit: Option<u64>,
    frame_index: u64,
    started: Instant,
}

enum Drain {
    Continue,
    Stop,
}

impl FrameLoop {
    pub fn new(
        navigation: NavigationSystem<FlatWorld>,
        commands: mpsc::UnboundedReceiver<RuntimeCommand>,
        frame_rate: u32,
        frame_limit: Option<u64>,
    ) -> Self {
        Self {
            navigation,
            commands,
            period: Duration::from_secs_f64(1.0 / f64::from(frame_rate.max(1))),
            frame_limit,
            frame_index: 0,
            started: Instant::now(),
        }
    }

    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Frame loop running at {:?} per frame", self.period);

        loop {
            ticker.tick().await;

            if let Drain::Stop = self.drain_commands() {
                break;
            }

            let outcome = self.navigation.update();
            if let Some(transition) = outcome.transition {
                debug!(from = ?transition.from, to = ?transition.to, "mode transition");
            }

            self.frame_index += 1;
            if self.frame_limit.is_some_and(|limit| self.frame_index >= limit) {
                info!("Reached frame limit of {}", self.frame_index);
                break;
            }
        }

        self.navigation.dispose();
        info!("Frame loop stopped after {} frames", self.frame_index);
    }

    fn drain_commands(&mut self) -> Drain {
        loop {
            let command = match self.commands.try_recv() {
                Ok(command) => command,
                Err(TryRecvError::Empty) => return Drain::Continue,
                Err(TryRecvError::Disconnected) => return Drain::Stop,
            };

            match command {
                RuntimeCommand::GetNavigation(reply) => {
                    let _ = reply.send(self.snapshot());
                }
                RuntimeCommand::SetInput(patch, reply) => {
                    let _ = reply.send(patch.apply(&mut self.navigation));
                }
                RuntimeCommand::Teleport(request, reply) => {
                    let _ = reply.send(request.apply(&mut self.navigation));
                }
                RuntimeCommand::SetImmersive(session) => {
                    self.navigation.set_immersive_session(session);
                }
                RuntimeCommand::Shutdown => return Drain::Stop,
            }
        }
    }

    fn snapshot(&self) -> FrameSnapshot {
        FrameSnapshot {
            frame_index: self.frame_index,
            total_ms: self.started.elapsed().as_millis() as u64,
            navigation: self.navigation.navigation_state(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::InputPatch;
    use engine::ManualClock;
    use std::sync::Arc;
    use tokio::sync::oneshot;
    use wayfinder::WayfinderConfig;

    fn frame_loop(frame_limit: Option<u64>) -> (FrameLoop, mpsc::UnboundedSender<RuntimeCommand>) {
        let navigation = NavigationSystem::new(
            FlatWorld::new(0.0),
            Arc::new(ManualClock::new(0)),
            &WayfinderConfig::default(),
        );
        let (tx, rx) = mpsc::unbounded_channel();
        (FrameLoop::new(navigation, rx, 1_000, frame_limit), tx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_at_frame_limit() {
        let (frames, _tx) = frame_loop(Some(5));
        frames.run().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_are_answered_before_update() {
        let (frames, tx) = frame_loop(None);
        let handle = tokio::spawn(frames.run());

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(RuntimeCommand::SetInput(
            InputPatch::SnapTurnAngle { value: 0.5 },
            reply_tx,
        ))
        .unwrap();
        assert_eq!(reply_rx.await.unwrap().value, Some(0.5));

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(RuntimeCommand::GetNavigation(reply_tx)).unwrap();
        let snapshot = reply_rx.await.unwrap();
        assert_eq!(snapshot.navigation.snap_turn_angle, 0.5);

        tx.send(RuntimeCommand::Shutdown).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_sender_stops_loop() {
        let (frames, tx) = frame_loop(None);
        drop(tx);
        frames.run().await;
    }
}
