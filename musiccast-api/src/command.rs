//! Wire-level control commands
//!
//! Each [`Command`] maps to exactly one Extended Control GET request.
//! Anything that needs device state to resolve (toggling mute, clamping
//! a volume) is resolved by the caller before a `Command` is built.

use crate::service::Service;
use crate::types::RepeatMode;

/// Power actions accepted by `{zone}/setPower`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerAction {
    /// Switch on
    On,
    /// Switch to standby
    Standby,
    /// Let the device flip its own state
    Toggle,
}

impl PowerAction {
    fn as_wire(&self) -> &'static str {
        match self {
            PowerAction::On => "on",
            PowerAction::Standby => "standby",
            PowerAction::Toggle => "toggle",
        }
    }
}

/// Transport actions accepted by `netusb/setPlayback`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportAction {
    /// Start playback
    Play,
    /// Pause playback
    Pause,
    /// Stop playback
    Stop,
    /// Toggle between play and pause
    PlayPause,
    /// Skip to the next track
    Next,
    /// Go back to the previous track
    Previous,
}

impl TransportAction {
    fn as_wire(&self) -> &'static str {
        match self {
            TransportAction::Play => "play",
            TransportAction::Pause => "pause",
            TransportAction::Stop => "stop",
            TransportAction::PlayPause => "toggle",
            TransportAction::Next => "next",
            TransportAction::Previous => "previous",
        }
    }
}

/// A fully resolved command, ready to be sent
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    /// `{zone}/setPower`
    Power(PowerAction),
    /// `{zone}/setVolume?volume=N` (already clamped by the caller)
    SetVolume(u32),
    /// `{zone}/setVolume?volume=up&step=N`
    VolumeUp(u32),
    /// `{zone}/setVolume?volume=down&step=N`
    VolumeDown(u32),
    /// `{zone}/setMute`
    SetMute(bool),
    /// `{zone}/setInput`
    SetInput(String),
    /// `{zone}/setSoundProgram`
    SetSoundProgram(String),
    /// `netusb/setPlayback`
    Transport(TransportAction),
    /// `netusb/setRepeat`
    SetRepeat(RepeatMode),
    /// `netusb/setShuffle`
    SetShuffle(bool),
}

/// A command rendered to endpoint + query parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    /// API group the request targets
    pub service: Service,
    /// Endpoint path relative to the API prefix, e.g. `main/setMute`
    pub endpoint: String,
    /// Query parameters in send order
    pub params: Vec<(&'static str, String)>,
}

impl Command {
    /// Short name for logs
    pub fn action(&self) -> &'static str {
        match self {
            Command::Power(_) => "setPower",
            Command::SetVolume(_) | Command::VolumeUp(_) | Command::VolumeDown(_) => "setVolume",
            Command::SetMute(_) => "setMute",
            Command::SetInput(_) => "setInput",
            Command::SetSoundProgram(_) => "setSoundProgram",
            Command::Transport(_) => "setPlayback",
            Command::SetRepeat(_) => "setRepeat",
            Command::SetShuffle(_) => "setShuffle",
        }
    }

    fn service(&self) -> Service {
        match self {
            Command::Transport(_) | Command::SetRepeat(_) | Command::SetShuffle(_) => Service::NetUsb,
            _ => Service::Zone,
        }
    }

    /// Render this command for `zone`
    pub fn to_request(&self, zone: &str) -> CommandRequest {
        let params = match self {
            Command::Power(action) => vec![("power", action.as_wire().to_string())],
            Command::SetVolume(volume) => vec![("volume", volume.to_string())],
            Command::VolumeUp(step) => vec![("volume", "up".to_string()), ("step", step.to_string())],
            Command::VolumeDown(step) => {
                vec![("volume", "down".to_string()), ("step", step.to_string())]
            }
            Command::SetMute(enable) => vec![("enable", enable.to_string())],
            Command::SetInput(input) => vec![("input", input.clone())],
            Command::SetSoundProgram(program) => vec![("program", program.clone())],
            Command::Transport(action) => vec![("playback", action.as_wire().to_string())],
            Command::SetRepeat(mode) => vec![("repeat", mode.as_wire().to_string())],
            Command::SetShuffle(on) => {
                vec![("shuffle", if *on { "on" } else { "off" }.to_string())]
            }
        };

        let service = self.service();
        CommandRequest {
            service,
            endpoint: service.endpoint(zone, self.action()),
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Command::Power(PowerAction::On), "main/setPower", vec![("power", "on")])]
    #[case(Command::SetVolume(45), "main/setVolume", vec![("volume", "45")])]
    #[case(Command::VolumeDown(2), "main/setVolume", vec![("volume", "down"), ("step", "2")])]
    #[case(Command::SetMute(true), "main/setMute", vec![("enable", "true")])]
    #[case(Command::SetInput("hdmi1".to_string()), "main/setInput", vec![("input", "hdmi1")])]
    #[case(Command::SetSoundProgram("straight".to_string()), "main/setSoundProgram", vec![("program", "straight")])]
    #[case(Command::Transport(TransportAction::PlayPause), "netusb/setPlayback", vec![("playback", "toggle")])]
    #[case(Command::SetRepeat(RepeatMode::All), "netusb/setRepeat", vec![("repeat", "all")])]
    #[case(Command::SetShuffle(false), "netusb/setShuffle", vec![("shuffle", "off")])]
    fn test_to_request(
        #[case] command: Command,
        #[case] endpoint: &str,
        #[case] params: Vec<(&'static str, &str)>,
    ) {
        let request = command.to_request("main");
        assert_eq!(request.endpoint, endpoint);
        let expected: Vec<(&'static str, String)> =
            params.into_iter().map(|(k, v)| (k, v.to_string())).collect();
        assert_eq!(request.params, expected);
    }

    #[test]
    fn test_zone_substitution() {
        let request = Command::SetMute(false).to_request("zone2");
        assert_eq!(request.endpoint, "zone2/setMute");
        assert_eq!(request.service, Service::Zone);

        let request = Command::Transport(TransportAction::Next).to_request("zone2");
        assert_eq!(request.endpoint, "netusb/setPlayback");
        assert_eq!(request.service, Service::NetUsb);
    }
}
