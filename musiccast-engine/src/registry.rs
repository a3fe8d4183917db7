//! DeviceRegistry - owns every device session and its lifecycle
//!
//! The registry builds one session, queue and polling loop per configured
//! device, reports readiness only after every device has attempted first
//! contact, and is the entry point consumers use to read state and issue
//! commands.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use state_store::{ChangeFeed, StateStore, Subscription};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::{CommandOutcome, CommandTicket, DeviceCommand};
use crate::config::{DeviceConfig, EngineConfig};
use crate::error::{EngineError, Result};
use crate::factory::{HttpTransportFactory, TransportFactory, UnusableTransport};
use crate::model::{ConnectionState, DeviceId, DeviceSnapshot, DeviceView};
use crate::polling::PollingLoop;
use crate::queue::{self, CommandQueue};
use crate::session::DeviceSession;

/// Becomes ready once every device has attempted first contact
#[derive(Debug, Clone)]
pub struct ReadySignal {
    rx: watch::Receiver<bool>,
}

impl ReadySignal {
    pub fn is_ready(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until ready
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        // A dropped sender means the registry is gone; nothing left to wait for
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// Wait until ready or `timeout` elapses; returns whether ready
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait()).await.is_ok()
    }
}

/// What happened to each device loop during shutdown
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Loops that exited on their own
    pub stopped: Vec<DeviceId>,
    /// Loops that were still running at the deadline and got aborted
    pub aborted: Vec<DeviceId>,
    pub elapsed: Duration,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.aborted.is_empty()
    }

    pub fn into_result(self) -> Result<()> {
        if self.is_clean() {
            Ok(())
        } else {
            Err(EngineError::ShutdownTimeout {
                aborted: self.aborted,
            })
        }
    }
}

/// Owns the sessions of all configured devices
pub struct DeviceRegistry {
    config: Arc<EngineConfig>,
    factory: Arc<dyn TransportFactory>,
    store: StateStore<DeviceId, DeviceView>,
    queues: RwLock<HashMap<DeviceId, CommandQueue>>,
    tasks: Mutex<Vec<(DeviceId, JoinHandle<()>)>>,
    ready: Mutex<Option<ReadySignal>>,
    cancel: CancellationToken,
    started: AtomicBool,
}

impl DeviceRegistry {
    /// Create a registry that builds transports with `factory`
    pub fn new(config: EngineConfig, factory: impl TransportFactory + 'static) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            factory: Arc::new(factory),
            store: StateStore::new(),
            queues: RwLock::new(HashMap::new()),
            tasks: Mutex::new(Vec::new()),
            ready: Mutex::new(None),
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
        })
    }

    /// Create a registry talking HTTP to real devices
    pub fn with_http(config: EngineConfig) -> Result<Self> {
        let factory = HttpTransportFactory::new(config.request_timeout);
        Self::new(config, factory)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register the enabled devices and start their loops
    ///
    /// Must be called from within a Tokio runtime. Returns as soon as every
    /// loop is spawned; the returned signal becomes ready once each device
    /// has attempted first contact, whether or not it succeeded.
    pub fn start(&self, devices: Vec<DeviceConfig>) -> Result<ReadySignal> {
        let devices: Vec<DeviceConfig> = devices.into_iter().filter(|d| d.enabled).collect();
        self.check_devices(&devices)?;

        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(EngineError::AlreadyStarted);
        }

        let mut attempts = Vec::with_capacity(devices.len());
        let mut queues = self.queues.write();
        let mut tasks = self.tasks.lock();

        for device in &devices {
            let identity = device.identity();
            let id = identity.id.clone();
            self.store.insert(id.clone(), DeviceView::new(identity.clone()));

            let session = match self.factory.create(&identity) {
                Ok(transport) => DeviceSession::new(
                    identity,
                    transport,
                    self.store.clone(),
                    Arc::clone(&self.config),
                ),
                Err(err) => {
                    let transport = Arc::new(UnusableTransport::new(err.to_string()));
                    let mut session = DeviceSession::new(
                        identity,
                        transport,
                        self.store.clone(),
                        Arc::clone(&self.config),
                    );
                    session.start_offline(&err);
                    session
                }
            };

            let (queue, receiver) = queue::channel(id.clone(), self.config.command_queue_capacity);
            let (polling, first_attempt) = PollingLoop::new(
                session,
                receiver,
                self.cancel.child_token(),
                self.config.startup_jitter,
            );

            tasks.push((id.clone(), polling.spawn()));
            queues.insert(id, queue);
            attempts.push(first_attempt);
        }
        drop(tasks);
        drop(queues);

        let (ready_tx, ready_rx) = watch::channel(false);
        let signal = ReadySignal { rx: ready_rx };
        *self.ready.lock() = Some(signal.clone());

        let count = attempts.len();
        tokio::spawn(async move {
            // A loop that exits before its first attempt also settles its slot
            join_all(attempts).await;
            ready_tx.send_replace(true);
            info!(devices = count, "Registry ready");
        });

        info!(devices = count, "Registry started");
        Ok(signal)
    }

    fn check_devices(&self, devices: &[DeviceConfig]) -> Result<()> {
        if devices.len() > self.config.max_devices {
            return Err(EngineError::TooManyDevices {
                count: devices.len(),
                max: self.config.max_devices,
            });
        }

        let mut seen = HashSet::new();
        for device in devices {
            if device.id.as_str().is_empty() {
                return Err(EngineError::Configuration(
                    "Device id must not be empty".to_string(),
                ));
            }
            if !seen.insert(&device.id) {
                return Err(EngineError::DuplicateDevice(device.id.clone()));
            }
        }
        Ok(())
    }

    /// Readiness of a started registry
    pub fn ready(&self) -> Option<ReadySignal> {
        self.ready.lock().clone()
    }

    /// Ids of all registered devices, sorted
    pub fn device_ids(&self) -> Vec<DeviceId> {
        let mut ids = self.store.ids();
        ids.sort();
        ids
    }

    /// Full view of a device
    pub fn view(&self, id: &DeviceId) -> Option<Arc<DeviceView>> {
        self.store.get(id)
    }

    /// Last committed snapshot; `None` until the first successful poll
    pub fn current_snapshot(&self, id: &DeviceId) -> Option<DeviceSnapshot> {
        self.store.get(id)?.snapshot.clone()
    }

    pub fn connection_state(&self, id: &DeviceId) -> Option<ConnectionState> {
        self.store.get(id).map(|view| view.connection)
    }

    /// Follow one device's view
    pub fn subscribe(&self, id: &DeviceId) -> Result<Subscription<DeviceView>> {
        self.store
            .subscribe(id)
            .ok_or_else(|| EngineError::UnknownDevice(id.clone()))
    }

    /// Field-level change events of all devices
    pub fn changes(&self) -> ChangeFeed<DeviceId> {
        self.store.changes()
    }

    /// Queue a command, returning once it is enqueued
    ///
    /// Commands that cannot succeed are answered without queuing: a device
    /// that is offline or mid-reconnect yields `TransportFailed`, and a command invalid for
    /// the last snapshot (unknown input, unknown sound program) yields
    /// `Rejected`. Neither reaches the transport.
    pub async fn submit(&self, id: &DeviceId, command: DeviceCommand) -> Result<CommandTicket> {
        if !self.started.load(Ordering::Acquire) {
            return Err(EngineError::NotStarted);
        }

        let queue = self
            .queues
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownDevice(id.clone()))?;
        let view = self
            .store
            .get(id)
            .ok_or_else(|| EngineError::UnknownDevice(id.clone()))?;

        if view.rejects_commands() {
            debug!(device_id = %id, command = %command, "Device offline; failing command");
            let outcome = CommandOutcome::TransportFailed(view.failures.last_error_or_network());
            return Ok(CommandTicket::resolved(id.clone(), outcome));
        }

        if let Err(reason) = command.resolve(view.snapshot.as_ref()) {
            debug!(device_id = %id, command = %command, %reason, "Command rejected");
            return Ok(CommandTicket::resolved(
                id.clone(),
                CommandOutcome::Rejected(reason),
            ));
        }

        Ok(queue.enqueue(command).await)
    }

    /// Submit a command and wait for its outcome
    pub async fn issue_command(&self, id: &DeviceId, command: DeviceCommand) -> Result<CommandOutcome> {
        let ticket = self.submit(id, command).await?;
        Ok(ticket.outcome().await)
    }

    /// Stop every device loop
    ///
    /// Loops finish the request they are in the middle of, then exit.
    /// Loops still running after `timeout` are aborted and listed in the
    /// report.
    pub async fn shutdown(&self, timeout: Duration) -> ShutdownReport {
        let started_at = Instant::now();
        self.cancel.cancel();

        let tasks = std::mem::take(&mut *self.tasks.lock());
        let deadline = started_at + timeout;

        let results = join_all(tasks.into_iter().map(|(id, mut handle)| async move {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => (id, true),
                Ok(Err(err)) => {
                    warn!(device_id = %id, error = %err, "Device loop ended abnormally");
                    (id, true)
                }
                Err(_) => {
                    handle.abort();
                    (id, false)
                }
            }
        }))
        .await;

        let mut report = ShutdownReport::default();
        for (id, stopped) in results {
            if stopped {
                report.stopped.push(id);
            } else {
                report.aborted.push(id);
            }
        }
        report.stopped.sort();
        report.aborted.sort();
        report.elapsed = started_at.elapsed();

        if report.is_clean() {
            info!(devices = report.stopped.len(), elapsed = ?report.elapsed, "Registry shut down");
        } else {
            warn!(aborted = ?report.aborted, "Registry shut down with aborted device loops");
        }
        report
    }
}

impl Drop for DeviceRegistry {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
