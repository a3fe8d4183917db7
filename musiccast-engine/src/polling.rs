//! PollingLoop - the single task that drives one device session
//!
//! Every request to a device is issued from this loop, one at a time, so
//! the at-most-one-in-flight guarantee holds by construction. Between
//! requests the loop waits on three things, in priority order:
//! cancellation, queued commands, and the next poll deadline.
//!
//! Queued commands pre-empt polling, but once the routine poll deadline has
//! passed the loop polls after each command, so a steady stream of
//! commands cannot starve the device's state refresh.

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument};

use crate::backoff::apply_jitter;
use crate::queue::CommandReceiver;
use crate::session::{DeviceSession, PollOutcome};

/// Resolves once the loop has made its first contact attempt
///
/// Also resolves (with an error) if the loop exits before attempting.
pub type FirstAttempt = oneshot::Receiver<()>;

/// Drives one [`DeviceSession`] on its poll cadence and command queue
pub struct PollingLoop {
    session: DeviceSession,
    commands: CommandReceiver,
    cancel: CancellationToken,
    first_attempt: Option<oneshot::Sender<()>>,
    startup_jitter: f64,
}

impl PollingLoop {
    pub fn new(
        session: DeviceSession,
        commands: CommandReceiver,
        cancel: CancellationToken,
        startup_jitter: f64,
    ) -> (Self, FirstAttempt) {
        let (tx, rx) = oneshot::channel();
        let polling = Self {
            session,
            commands,
            cancel,
            first_attempt: Some(tx),
            startup_jitter,
        };
        (polling, rx)
    }

    /// Spawn the loop onto the current Tokio runtime
    pub fn spawn(self) -> JoinHandle<()> {
        let span = info_span!("device", device_id = %self.session.id());
        tokio::spawn(self.run().instrument(span))
    }

    /// Run until cancelled
    pub async fn run(mut self) {
        if self.cancel.is_cancelled() {
            self.commands.close();
            return;
        }

        let mut next_poll = if self.session.connection_state().rejects_commands() {
            // Already known to be offline; the first attempt is settled
            Instant::now() + self.session.next_poll_delay()
        } else {
            let outcome = self.session.poll().await;
            Self::log_outcome(&outcome);
            Instant::now() + self.first_delay()
        };
        self.signal_first_attempt();

        info!(
            state = %self.session.connection_state(),
            "Device loop started"
        );

        let mut refresh_at: Option<Instant> = None;
        loop {
            if let Some(deadline) = self.session.take_refresh_deadline() {
                refresh_at = Some(deadline);
            }
            let wake_at = refresh_at.map_or(next_poll, |deadline| deadline.min(next_poll));

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                Some(pending) = self.commands.recv() => {
                    let was_offline = self.session.connection_state().rejects_commands();
                    self.session.execute(pending).await;

                    if !was_offline && self.session.connection_state().rejects_commands() {
                        // The command took the device offline; retry on the backoff schedule
                        refresh_at = None;
                        next_poll = Instant::now() + self.session.next_poll_delay();
                    } else if Instant::now() >= next_poll {
                        // A routine poll is overdue; at most one command runs ahead of it
                        refresh_at = None;
                        next_poll = self.poll_now().await;
                    }
                }

                _ = sleep_until(wake_at) => {
                    refresh_at = None;
                    next_poll = self.poll_now().await;
                }
            }
        }

        self.commands.close();
        info!("Device loop stopped");
    }

    /// Poll right away and return the deadline of the following poll
    async fn poll_now(&mut self) -> Instant {
        let outcome = self.session.poll().await;
        Self::log_outcome(&outcome);
        Instant::now() + self.session.next_poll_delay()
    }

    /// Delay after first contact, spread across devices
    fn first_delay(&self) -> std::time::Duration {
        let delay = self.session.next_poll_delay();
        if self.session.connection_state().rejects_commands() {
            return delay;
        }
        apply_jitter(delay, self.startup_jitter, &mut rand::thread_rng())
    }

    fn signal_first_attempt(&mut self) {
        if let Some(tx) = self.first_attempt.take() {
            let _ = tx.send(());
        }
    }

    fn log_outcome(outcome: &PollOutcome) {
        match outcome {
            PollOutcome::Updated(snapshot) => debug!(
                power = ?snapshot.power,
                playback = ?snapshot.playback,
                volume = snapshot.volume,
                "Snapshot updated"
            ),
            PollOutcome::Unchanged => debug!("Snapshot unchanged"),
            PollOutcome::Failed(err) => debug!(error = %err, "Poll failed"),
        }
    }
}
