//! Device commands and their outcomes
//!
//! A [`DeviceCommand`] is what a caller asks for. Commands that depend on
//! device state (toggles, clamping, input validation) are resolved against
//! the last committed snapshot into a wire-level [`Command`] just before
//! they are sent.

use std::fmt;

use musiccast_api::{Command, PowerAction, RepeatMode, TransportAction, TransportErrorKind};
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::model::{DeviceId, DeviceSnapshot};

/// A control request for one device
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeviceCommand {
    PowerOn,
    PowerOff,
    PowerToggle,
    /// Raise volume by a number of native steps
    VolumeUp(u32),
    /// Lower volume by a number of native steps
    VolumeDown(u32),
    /// Set volume in native steps; clamped to the device maximum
    VolumeSet(u32),
    /// Set volume as a 0-100 percentage of the device maximum
    VolumePercent(u8),
    MuteSet(bool),
    /// Flip mute relative to the last snapshot
    MuteToggle,
    /// Select an input by id; must be in the available-inputs list
    SelectInput(String),
    /// Select a sound program by id; must be in the sound-program list
    SelectSoundProgram(String),
    Play,
    Pause,
    Stop,
    PlayPause,
    Next,
    Previous,
    SetRepeat(RepeatMode),
    SetShuffle(bool),
}

impl DeviceCommand {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            DeviceCommand::PowerOn => "power_on",
            DeviceCommand::PowerOff => "power_off",
            DeviceCommand::PowerToggle => "power_toggle",
            DeviceCommand::VolumeUp(_) => "volume_up",
            DeviceCommand::VolumeDown(_) => "volume_down",
            DeviceCommand::VolumeSet(_) => "volume_set",
            DeviceCommand::VolumePercent(_) => "volume_percent",
            DeviceCommand::MuteSet(_) => "mute_set",
            DeviceCommand::MuteToggle => "mute_toggle",
            DeviceCommand::SelectInput(_) => "select_input",
            DeviceCommand::SelectSoundProgram(_) => "select_sound_program",
            DeviceCommand::Play => "play",
            DeviceCommand::Pause => "pause",
            DeviceCommand::Stop => "stop",
            DeviceCommand::PlayPause => "play_pause",
            DeviceCommand::Next => "next",
            DeviceCommand::Previous => "previous",
            DeviceCommand::SetRepeat(_) => "set_repeat",
            DeviceCommand::SetShuffle(_) => "set_shuffle",
        }
    }

    /// Resolve against the last snapshot into the request to send
    ///
    /// Fails without any network activity when the command cannot apply to
    /// the device as last seen.
    pub fn resolve(&self, snapshot: Option<&DeviceSnapshot>) -> Result<Command, RejectReason> {
        let command = match self {
            DeviceCommand::PowerOn => Command::Power(PowerAction::On),
            DeviceCommand::PowerOff => Command::Power(PowerAction::Standby),
            DeviceCommand::PowerToggle => Command::Power(PowerAction::Toggle),
            DeviceCommand::VolumeUp(step) => Command::VolumeUp(Self::step(*step)?),
            DeviceCommand::VolumeDown(step) => Command::VolumeDown(Self::step(*step)?),
            DeviceCommand::VolumeSet(volume) => {
                let snapshot = snapshot.ok_or(RejectReason::NotReady)?;
                Command::SetVolume((*volume).min(snapshot.max_volume))
            }
            DeviceCommand::VolumePercent(percent) => {
                let snapshot = snapshot.ok_or(RejectReason::NotReady)?;
                Command::SetVolume(snapshot.volume_from_percent(*percent))
            }
            DeviceCommand::MuteSet(enable) => Command::SetMute(*enable),
            DeviceCommand::MuteToggle => {
                let snapshot = snapshot.ok_or(RejectReason::NotReady)?;
                Command::SetMute(!snapshot.mute)
            }
            DeviceCommand::SelectInput(input) => {
                let snapshot = snapshot.ok_or(RejectReason::NotReady)?;
                if !snapshot.has_input(input) {
                    return Err(RejectReason::UnknownInput(input.clone()));
                }
                Command::SetInput(input.clone())
            }
            DeviceCommand::SelectSoundProgram(program) => {
                let snapshot = snapshot.ok_or(RejectReason::NotReady)?;
                if !snapshot.has_sound_program(program) {
                    return Err(RejectReason::UnknownSoundProgram(program.clone()));
                }
                Command::SetSoundProgram(program.clone())
            }
            DeviceCommand::Play => Command::Transport(TransportAction::Play),
            DeviceCommand::Pause => Command::Transport(TransportAction::Pause),
            DeviceCommand::Stop => Command::Transport(TransportAction::Stop),
            DeviceCommand::PlayPause => Command::Transport(TransportAction::PlayPause),
            DeviceCommand::Next => Command::Transport(TransportAction::Next),
            DeviceCommand::Previous => Command::Transport(TransportAction::Previous),
            DeviceCommand::SetRepeat(mode) => Command::SetRepeat(*mode),
            DeviceCommand::SetShuffle(on) => Command::SetShuffle(*on),
        };
        Ok(command)
    }

    fn step(step: u32) -> Result<u32, RejectReason> {
        if step == 0 {
            return Err(RejectReason::InvalidValue(
                "volume step must be at least 1".to_string(),
            ));
        }
        Ok(step)
    }
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a command was refused without being applied
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// Input id is not in the available-inputs list
    UnknownInput(String),
    /// Sound program id is not in the sound-program list
    UnknownSoundProgram(String),
    /// Argument out of the accepted range
    InvalidValue(String),
    /// The command needs device state that is not known yet
    NotReady,
    /// The device refused the request (response code 3 or 4)
    DeviceRejected(String),
    /// The device loop stopped before the command ran
    ShuttingDown,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::UnknownInput(input) => write!(f, "unknown input '{}'", input),
            RejectReason::UnknownSoundProgram(program) => {
                write!(f, "unknown sound program '{}'", program)
            }
            RejectReason::InvalidValue(msg) => write!(f, "invalid value: {}", msg),
            RejectReason::NotReady => f.write_str("device state not known yet"),
            RejectReason::DeviceRejected(msg) => write!(f, "rejected by device: {}", msg),
            RejectReason::ShuttingDown => f.write_str("device loop stopped"),
        }
    }
}

/// Final result of a submitted command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The device acknowledged the command
    Applied,
    /// The command was refused; retrying it unchanged will not help
    Rejected(RejectReason),
    /// The device could not be reached
    TransportFailed(TransportErrorKind),
}

impl CommandOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, CommandOutcome::Applied)
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutcome::Applied => f.write_str("applied"),
            CommandOutcome::Rejected(reason) => write!(f, "rejected ({})", reason),
            CommandOutcome::TransportFailed(kind) => write!(f, "transport failed ({:?})", kind),
        }
    }
}

/// A command waiting in, or taken from, a device's queue
#[derive(Debug)]
pub struct PendingCommand {
    pub device_id: DeviceId,
    pub command: DeviceCommand,
    pub issued_at: Instant,
    respond_to: oneshot::Sender<CommandOutcome>,
}

impl PendingCommand {
    /// Create a pending command and the ticket that will observe its outcome
    pub fn new(device_id: DeviceId, command: DeviceCommand) -> (Self, CommandTicket) {
        let (respond_to, rx) = oneshot::channel();
        let ticket = CommandTicket {
            device_id: device_id.clone(),
            rx,
        };
        let pending = Self {
            device_id,
            command,
            issued_at: Instant::now(),
            respond_to,
        };
        (pending, ticket)
    }

    /// Deliver the outcome to the ticket holder
    pub fn resolve(self, outcome: CommandOutcome) {
        // The caller may have stopped waiting
        let _ = self.respond_to.send(outcome);
    }
}

/// Handle to the eventual outcome of a submitted command
#[derive(Debug)]
pub struct CommandTicket {
    device_id: DeviceId,
    rx: oneshot::Receiver<CommandOutcome>,
}

impl CommandTicket {
    /// A ticket that is already resolved
    pub fn resolved(device_id: DeviceId, outcome: CommandOutcome) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(outcome);
        Self { device_id, rx }
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Wait for the outcome
    ///
    /// A command dropped without an answer (its device loop exited)
    /// resolves as `Rejected(ShuttingDown)`.
    pub async fn outcome(self) -> CommandOutcome {
        self.rx
            .await
            .unwrap_or(CommandOutcome::Rejected(RejectReason::ShuttingDown))
    }

    /// The outcome if it is already known
    pub fn try_outcome(&mut self) -> Option<CommandOutcome> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => {
                Some(CommandOutcome::Rejected(RejectReason::ShuttingDown))
            }
        }
    }
}
