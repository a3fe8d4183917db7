//! Per-device command queue
//!
//! A bounded channel feeding the device's own loop. Submitting only waits
//! for queue space; execution happens later on the device loop, which
//! takes queued commands ahead of its next routine poll.

use tokio::sync::mpsc;
use tracing::debug;

use crate::command::{CommandOutcome, CommandTicket, DeviceCommand, PendingCommand, RejectReason};
use crate::model::DeviceId;

/// Create a queue for one device
pub fn channel(device_id: DeviceId, capacity: usize) -> (CommandQueue, CommandReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        CommandQueue {
            device_id: device_id.clone(),
            tx,
        },
        CommandReceiver { device_id, rx },
    )
}

/// Submitting side of a device's command queue
#[derive(Debug, Clone)]
pub struct CommandQueue {
    device_id: DeviceId,
    tx: mpsc::Sender<PendingCommand>,
}

impl CommandQueue {
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Enqueue a command, waiting only for queue space
    pub async fn enqueue(&self, command: DeviceCommand) -> CommandTicket {
        let (pending, ticket) = PendingCommand::new(self.device_id.clone(), command);
        match self.tx.send(pending).await {
            Ok(()) => ticket,
            Err(mpsc::error::SendError(pending)) => {
                debug!(device_id = %self.device_id, command = %pending.command, "Queue closed");
                pending.resolve(CommandOutcome::Rejected(RejectReason::ShuttingDown));
                ticket
            }
        }
    }

    /// Whether the device loop has stopped accepting commands
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving side, owned by the device loop
#[derive(Debug)]
pub struct CommandReceiver {
    device_id: DeviceId,
    rx: mpsc::Receiver<PendingCommand>,
}

impl CommandReceiver {
    pub async fn recv(&mut self) -> Option<PendingCommand> {
        self.rx.recv().await
    }

    /// Stop accepting commands and refuse everything still queued
    pub fn close(&mut self) {
        self.rx.close();
        let mut dropped = 0;
        while let Ok(pending) = self.rx.try_recv() {
            pending.resolve(CommandOutcome::Rejected(RejectReason::ShuttingDown));
            dropped += 1;
        }
        if dropped > 0 {
            debug!(device_id = %self.device_id, dropped, "Refused queued commands on close");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_order() {
        let (queue, mut receiver) = channel(DeviceId::new("den"), 4);
        let _t1 = queue.enqueue(DeviceCommand::PowerOn).await;
        let _t2 = queue.enqueue(DeviceCommand::VolumeUp(1)).await;

        assert_eq!(receiver.recv().await.unwrap().command, DeviceCommand::PowerOn);
        assert_eq!(receiver.recv().await.unwrap().command, DeviceCommand::VolumeUp(1));
    }

    #[tokio::test]
    async fn test_close_refuses_pending_and_new_commands() {
        let (queue, mut receiver) = channel(DeviceId::new("den"), 4);
        let queued = queue.enqueue(DeviceCommand::Play).await;

        receiver.close();

        assert_eq!(
            queued.outcome().await,
            CommandOutcome::Rejected(RejectReason::ShuttingDown)
        );
        assert!(queue.is_closed());
        let late = queue.enqueue(DeviceCommand::Pause).await;
        assert_eq!(
            late.outcome().await,
            CommandOutcome::Rejected(RejectReason::ShuttingDown)
        );
    }
}
