//! DeviceSession - the state machine for one device
//!
//! A session owns everything about one device's liveness: the connect
//! handshake, routine polls, command execution and failure bookkeeping.
//! It is driven exclusively by its own [`PollingLoop`](crate::PollingLoop),
//! so no two of its operations ever overlap, and it publishes every
//! observable change to the shared state store.
//!
//! Transitions:
//!
//! ```text
//! Disconnected -> Connecting -> Connected <-> Degraded
//!                     ^   |                      |
//!                     |   v                      v
//!                     +-- Retrying <-------------+
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use musiccast_api::{ApiError, DeviceInfo, DeviceTransport, Features};
use state_store::StateStore;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::backoff::BackoffPolicy;
use crate::command::{CommandOutcome, DeviceCommand, PendingCommand, RejectReason};
use crate::config::EngineConfig;
use crate::model::{
    ConnectionState, DeviceId, DeviceIdentity, DeviceSnapshot, DeviceView, FailureRecord,
};

/// Result of one poll
#[derive(Debug)]
pub enum PollOutcome {
    /// A snapshot differing from the previous one was published
    Updated(DeviceSnapshot),
    /// The device answered with the same state as before
    Unchanged,
    /// The poll failed and was counted against the device
    Failed(ApiError),
}

impl PollOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, PollOutcome::Failed(_))
    }
}

/// Connection, polling and command state machine for one device
pub struct DeviceSession {
    identity: DeviceIdentity,
    transport: Arc<dyn DeviceTransport>,
    store: StateStore<DeviceId, DeviceView>,
    config: Arc<EngineConfig>,
    backoff: BackoffPolicy,
    connection: ConnectionState,
    snapshot: Option<DeviceSnapshot>,
    features: Features,
    info: Option<DeviceInfo>,
    failures: FailureRecord,
    refresh_at: Option<Instant>,
}

impl DeviceSession {
    pub fn new(
        identity: DeviceIdentity,
        transport: Arc<dyn DeviceTransport>,
        store: StateStore<DeviceId, DeviceView>,
        config: Arc<EngineConfig>,
    ) -> Self {
        let backoff = config.backoff();
        Self {
            identity,
            transport,
            store,
            config,
            backoff,
            connection: ConnectionState::Disconnected,
            snapshot: None,
            features: Features::default(),
            info: None,
            failures: FailureRecord::default(),
            refresh_at: None,
        }
    }

    pub fn id(&self) -> &DeviceId {
        &self.identity.id
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection
    }

    pub fn snapshot(&self) -> Option<&DeviceSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn failures(&self) -> &FailureRecord {
        &self.failures
    }

    /// Poll the device
    ///
    /// Runs the connect handshake when there is no live connection,
    /// otherwise fetches status and play info and merges them into a new
    /// snapshot. Never fails: errors are recorded and returned as
    /// [`PollOutcome::Failed`].
    pub async fn poll(&mut self) -> PollOutcome {
        self.refresh_at = None;
        if self.connection.is_online() {
            self.refresh().await
        } else {
            self.connect().await
        }
    }

    /// Mark the device offline before any contact, e.g. for an unusable address
    pub fn start_offline(&mut self, error: &ApiError) {
        warn!(
            device_id = %self.identity.id,
            address = %self.identity.address,
            error = %error,
            "Device cannot be contacted; starting in retrying state"
        );
        self.record_failure(error);
    }

    /// Delay until the next poll should start
    ///
    /// The fixed poll interval while online, the jittered backoff interval
    /// while retrying.
    pub fn next_poll_delay(&self) -> Duration {
        match self.connection {
            ConnectionState::Retrying => {
                let nominal = self.failures.backoff.unwrap_or(self.backoff.base);
                self.backoff.jittered(nominal)
            }
            _ => self.config.poll_interval,
        }
    }

    /// Deadline of a confirming poll requested by an applied command
    pub fn take_refresh_deadline(&mut self) -> Option<Instant> {
        self.refresh_at.take()
    }

    /// Execute a dequeued command and deliver its outcome
    pub async fn execute(&mut self, pending: PendingCommand) {
        let outcome = self.apply(&pending.command).await;
        debug!(
            device_id = %self.identity.id,
            command = %pending.command,
            waited = ?pending.issued_at.elapsed(),
            outcome = %outcome,
            "Command finished"
        );
        pending.resolve(outcome);
    }

    /// Execute one command against the device
    pub async fn apply(&mut self, command: &DeviceCommand) -> CommandOutcome {
        if !self.connection.is_online() {
            return CommandOutcome::TransportFailed(self.failures.last_error_or_network());
        }

        let wire = match command.resolve(self.snapshot.as_ref()) {
            Ok(wire) => wire,
            Err(reason) => {
                debug!(device_id = %self.identity.id, command = %command, %reason, "Command rejected locally");
                return CommandOutcome::Rejected(reason);
            }
        };

        let request = wire.to_request(&self.identity.zone);
        let result = self.timed(self.transport.send_command(&request)).await;
        match result {
            Ok(()) => {
                if self.failures.consecutive_failures > 0 {
                    self.failures.reset();
                    self.publish();
                }
                self.refresh_at = Some(Instant::now() + self.config.post_command_refresh);
                CommandOutcome::Applied
            }
            Err(ApiError::InvalidParameter(msg)) => {
                CommandOutcome::Rejected(RejectReason::DeviceRejected(msg))
            }
            Err(err) => {
                let kind = err.kind();
                self.record_failure(&err);
                CommandOutcome::TransportFailed(kind)
            }
        }
    }

    async fn connect(&mut self) -> PollOutcome {
        self.set_connection(ConnectionState::Connecting);

        match self.handshake().await {
            Ok((info, features, snapshot)) => {
                let changed = self.snapshot.as_ref() != Some(&snapshot);
                info!(
                    device_id = %self.identity.id,
                    model = %info.model_name,
                    power = ?snapshot.power,
                    "Connected"
                );
                self.info = Some(info);
                self.features = features;
                self.snapshot = Some(snapshot.clone());
                self.failures.reset();
                self.connection = ConnectionState::Connected;
                self.publish();

                if changed {
                    PollOutcome::Updated(snapshot)
                } else {
                    PollOutcome::Unchanged
                }
            }
            Err(err) => {
                self.record_failure(&err);
                PollOutcome::Failed(err)
            }
        }
    }

    async fn handshake(&self) -> musiccast_api::Result<(DeviceInfo, Features, DeviceSnapshot)> {
        let info = self.timed(self.transport.fetch_device_info()).await?;
        let features = self.timed(self.transport.fetch_features()).await?;
        let status = self.timed(self.transport.fetch_status()).await?;
        let play_info = self.timed(self.transport.fetch_play_info()).await?;

        let snapshot =
            DeviceSnapshot::from_responses(&status, &play_info, &features, &self.identity.zone);
        Ok((info, features, snapshot))
    }

    async fn refresh(&mut self) -> PollOutcome {
        let fetched = async {
            let status = self.timed(self.transport.fetch_status()).await?;
            let play_info = self.timed(self.transport.fetch_play_info()).await?;
            Ok::<_, ApiError>(DeviceSnapshot::from_responses(
                &status,
                &play_info,
                &self.features,
                &self.identity.zone,
            ))
        }
        .await;

        match fetched {
            Ok(snapshot) => {
                if self.connection == ConnectionState::Degraded {
                    info!(device_id = %self.identity.id, "Recovered");
                }
                let changed = self.snapshot.as_ref() != Some(&snapshot);
                self.snapshot = Some(snapshot.clone());
                self.failures.reset();
                self.connection = ConnectionState::Connected;
                self.publish();

                if changed {
                    PollOutcome::Updated(snapshot)
                } else {
                    PollOutcome::Unchanged
                }
            }
            Err(err) => {
                self.record_failure(&err);
                PollOutcome::Failed(err)
            }
        }
    }

    fn record_failure(&mut self, err: &ApiError) {
        self.failures.record(err.kind(), Instant::now());
        let threshold = self.config.offline_threshold;

        let next = match self.connection {
            ConnectionState::Connected | ConnectionState::Degraded
                if !self.failures.is_offline(threshold) =>
            {
                ConnectionState::Degraded
            }
            _ => ConnectionState::Retrying,
        };

        if next == ConnectionState::Retrying {
            let entering = self.failures.backoff.is_none();
            let backoff = self.backoff.next(self.failures.backoff);
            self.failures.backoff = Some(backoff);
            if entering {
                warn!(
                    device_id = %self.identity.id,
                    failures = self.failures.consecutive_failures,
                    error = %err,
                    ?backoff,
                    "Device offline"
                );
            } else {
                debug!(
                    device_id = %self.identity.id,
                    error = %err,
                    ?backoff,
                    "Reconnect attempt failed"
                );
            }
        } else {
            debug!(
                device_id = %self.identity.id,
                failures = self.failures.consecutive_failures,
                error = %err,
                "Request failed"
            );
        }

        self.connection = next;
        self.publish();
    }

    fn set_connection(&mut self, connection: ConnectionState) {
        if self.connection != connection {
            self.connection = connection;
            self.publish();
        }
    }

    /// Commit the current state as one atomic view replacement
    fn publish(&self) {
        let view = DeviceView {
            identity: self.identity.clone(),
            connection: self.connection,
            snapshot: self.snapshot.clone(),
            stale: self.snapshot.is_some() && self.connection != ConnectionState::Connected,
            available: self.connection.is_online(),
            info: self.info.clone(),
            failures: self.failures.clone(),
        };
        self.store.insert(self.identity.id.clone(), view);
    }

    async fn timed<T, F>(&self, request: F) -> musiccast_api::Result<T>
    where
        F: Future<Output = musiccast_api::Result<T>>,
    {
        match tokio::time::timeout(self.config.request_timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use musiccast_api::{PowerState, TransportErrorKind};

    fn session_with(transport: &ScriptedTransport, config: EngineConfig) -> DeviceSession {
        let identity = DeviceIdentity::new("den", "Den", "10.0.0.2", 80);
        let store = StateStore::new();
        store.insert(identity.id.clone(), DeviceView::new(identity.clone()));
        DeviceSession::new(identity, Arc::new(transport.clone()), store, Arc::new(config))
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_poll_connects() {
        let transport = ScriptedTransport::new();
        let mut session = session_with(&transport, EngineConfig::default());

        let outcome = session.poll().await;

        assert!(matches!(outcome, PollOutcome::Updated(_)));
        assert_eq!(session.connection_state(), ConnectionState::Connected);
        assert_eq!(session.snapshot().unwrap().power, PowerState::On);
        assert_eq!(transport.fetch_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_poll_is_unchanged() {
        let transport = ScriptedTransport::new();
        let mut session = session_with(&transport, EngineConfig::default());
        session.poll().await;

        assert!(matches!(session.poll().await, PollOutcome::Unchanged));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_degrade_then_retry() {
        let transport = ScriptedTransport::new();
        let mut session = session_with(&transport, EngineConfig::default());
        session.poll().await;

        transport.set_offline(true);
        session.poll().await;
        assert_eq!(session.connection_state(), ConnectionState::Degraded);
        session.poll().await;
        assert_eq!(session.connection_state(), ConnectionState::Degraded);
        session.poll().await;
        assert_eq!(session.connection_state(), ConnectionState::Retrying);
        assert_eq!(session.failures().backoff, Some(Duration::from_secs(5)));
        assert!(session.snapshot().is_some());

        transport.set_offline(false);
        assert!(session.poll().await.is_success());
        assert_eq!(session.connection_state(), ConnectionState::Connected);
        assert_eq!(session.failures().consecutive_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_contact_failure_goes_straight_to_retrying() {
        let transport = ScriptedTransport::new();
        transport.set_offline(true);
        let mut session = session_with(&transport, EngineConfig::default());

        assert!(matches!(session.poll().await, PollOutcome::Failed(_)));
        assert_eq!(session.connection_state(), ConnectionState::Retrying);
        assert!(session.snapshot().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let transport = ScriptedTransport::new();
        let config = EngineConfig::default().with_request_timeout(Duration::from_secs(1));
        let mut session = session_with(&transport, config);
        session.poll().await;

        transport.set_latency(Duration::from_secs(5));
        match session.poll().await {
            PollOutcome::Failed(ApiError::Timeout) => {}
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(session.failures().last_error, Some(TransportErrorKind::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_while_retrying_skips_transport() {
        let transport = ScriptedTransport::new();
        transport.set_offline(true);
        let mut session = session_with(&transport, EngineConfig::default());
        session.poll().await;
        let calls = transport.calls().len();

        let outcome = session.apply(&DeviceCommand::PowerOn).await;

        assert_eq!(
            outcome,
            CommandOutcome::TransportFailed(TransportErrorKind::Network)
        );
        assert_eq!(transport.calls().len(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_applied_command_requests_confirming_poll() {
        let transport = ScriptedTransport::new();
        let mut session = session_with(&transport, EngineConfig::default());
        session.poll().await;

        let before = Instant::now();
        assert!(session.apply(&DeviceCommand::MuteToggle).await.is_applied());

        let deadline = session.take_refresh_deadline().unwrap();
        assert_eq!(deadline - before, Duration::from_millis(500));
        assert!(session.take_refresh_deadline().is_none());
        // Commands never write predicted values
        assert!(!session.snapshot().unwrap().mute);
    }

    #[tokio::test(start_paused = true)]
    async fn test_device_rejection_is_not_a_failure() {
        let transport = ScriptedTransport::new();
        let mut session = session_with(&transport, EngineConfig::default());
        session.poll().await;

        transport.fail_next(ApiError::InvalidParameter("response code 4".to_string()));
        let outcome = session.apply(&DeviceCommand::Next).await;

        assert!(matches!(
            outcome,
            CommandOutcome::Rejected(RejectReason::DeviceRejected(_))
        ));
        assert_eq!(session.failures().consecutive_failures, 0);
        assert_eq!(session.connection_state(), ConnectionState::Connected);
    }
}
