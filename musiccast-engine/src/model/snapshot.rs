//! Device snapshot - the full coalesced state of one device

use std::time::Duration;

use musiccast_api::{
    friendly_input_name, friendly_sound_program_name, shuffle_from_wire, Features, PlayInfoResponse, PlaybackState, PowerState,
    RepeatMode, StatusResponse,
};
use serde::{Deserialize, Serialize};

/// Volume bound assumed when neither status nor features report one
pub const DEFAULT_MAX_VOLUME: u32 = 100;

/// Metadata of the current track
///
/// Every field is optional; empty strings reported by the device map to `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Absolute album art URL
    pub artwork_url: Option<String>,
}

impl TrackInfo {
    /// Build from a `getPlayInfo` body
    pub fn from_play_info(play_info: &PlayInfoResponse) -> Self {
        Self {
            title: non_empty(&play_info.track),
            artist: non_empty(&play_info.artist),
            album: non_empty(&play_info.album),
            artwork_url: non_empty(&play_info.albumart_url),
        }
    }

    /// Check if track info has any meaningful content
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.artist.is_none() && self.album.is_none()
    }
}

/// A selectable input with its display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSource {
    pub id: String,
    pub name: String,
}

impl InputSource {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let name = friendly_input_name(&id);
        Self { id, name }
    }
}

/// A DSP sound program with its display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundProgram {
    pub id: String,
    pub name: String,
}

impl SoundProgram {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let name = friendly_sound_program_name(&id);
        Self { id, name }
    }
}

/// Immutable, fully populated state of one device
///
/// Built from a status and a play-info response taken back to back, plus
/// the feature list fetched during the connect handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub power: PowerState,
    pub playback: PlaybackState,
    /// Device volume in native steps, within `0..=max_volume`
    pub volume: u32,
    pub max_volume: u32,
    pub mute: bool,
    /// Active input id
    pub input: String,
    pub track: TrackInfo,
    pub position: Option<Duration>,
    pub duration: Option<Duration>,
    pub repeat: RepeatMode,
    pub shuffle: bool,
    pub inputs: Vec<InputSource>,
    pub sound_program: Option<String>,
    pub sound_programs: Vec<SoundProgram>,
}

impl DeviceSnapshot {
    /// Merge one poll's responses into a snapshot
    pub fn from_responses(
        status: &StatusResponse,
        play_info: &PlayInfoResponse,
        features: &Features,
        zone: &str,
    ) -> Self {
        let max_volume = status
            .max_volume
            .or_else(|| features.max_volume(zone))
            .filter(|max| *max > 0)
            .unwrap_or(DEFAULT_MAX_VOLUME);
        let power = PowerState::from_wire(&status.power);
        let playback = PlaybackState::from_wire(&play_info.playback);

        // Standby or stopped devices keep reporting the last track; drop it
        let idle = power == PowerState::Standby || playback == PlaybackState::Stopped;
        let (track, position, duration) = if idle {
            (TrackInfo::default(), None, None)
        } else {
            (
                TrackInfo::from_play_info(play_info),
                u64::try_from(play_info.play_time).ok().map(Duration::from_secs),
                u64::try_from(play_info.total_time)
                    .ok()
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs),
            )
        };

        Self {
            power,
            playback,
            volume: status.volume.min(max_volume),
            max_volume,
            mute: status.mute,
            input: status.input.clone(),
            track,
            position,
            duration,
            repeat: RepeatMode::from_wire(&play_info.repeat),
            shuffle: shuffle_from_wire(&play_info.shuffle),
            inputs: features.inputs(zone).into_iter().map(InputSource::new).collect(),
            sound_program: status.sound_program.as_deref().and_then(non_empty),
            sound_programs: features
                .sound_programs(zone)
                .into_iter()
                .map(SoundProgram::new)
                .collect(),
        }
    }

    /// Volume as a 0-100 percentage of `max_volume`, rounded down
    pub fn volume_percent(&self) -> u8 {
        if self.max_volume == 0 {
            return 0;
        }
        let percent = u64::from(self.volume) * 100 / u64::from(self.max_volume);
        percent.min(100) as u8
    }

    /// Device volume for a 0-100 percentage, rounded down
    pub fn volume_from_percent(&self, percent: u8) -> u32 {
        let percent = u64::from(percent.min(100));
        (percent * u64::from(self.max_volume) / 100) as u32
    }

    /// Whether `id` is among the selectable inputs
    pub fn has_input(&self, id: &str) -> bool {
        self.inputs.iter().any(|input| input.id == id)
    }

    /// Whether `id` is among the selectable sound programs
    pub fn has_sound_program(&self, id: &str) -> bool {
        self.sound_programs.iter().any(|program| program.id == id)
    }

    /// Display name of the active sound program
    pub fn sound_program_name(&self) -> Option<String> {
        let active = self.sound_program.as_deref()?;
        let name = self
            .sound_programs
            .iter()
            .find(|program| program.id == active)
            .map(|program| program.name.clone())
            .unwrap_or_else(|| friendly_sound_program_name(active));
        Some(name)
    }

    /// Display name of the active input
    pub fn input_name(&self) -> String {
        self.inputs
            .iter()
            .find(|input| input.id == self.input)
            .map(|input| input.name.clone())
            .unwrap_or_else(|| friendly_input_name(&self.input))
    }

    /// Names of the fields that differ from `previous`
    pub fn diff(&self, previous: &Self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        macro_rules! compare {
            ($($field:ident),* $(,)?) => {
                $(
                    if self.$field != previous.$field {
                        fields.push(stringify!($field));
                    }
                )*
            };
        }
        compare!(
            power,
            playback,
            volume,
            max_volume,
            mute,
            input,
            track,
            position,
            duration,
            repeat,
            shuffle,
            inputs,
            sound_program,
            sound_programs,
        );
        fields
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use musiccast_api::{RangeStep, SystemFeatures, SystemInput, ZoneFeatures};

    fn features() -> Features {
        Features {
            system: SystemFeatures {
                input_list: vec![SystemInput {
                    id: "spotify".to_string(),
                }],
            },
            zone: vec![ZoneFeatures {
                id: "main".to_string(),
                input_list: vec!["hdmi1".to_string(), "net_radio".to_string()],
                sound_program_list: vec!["straight".to_string(), "munich".to_string()],
                range_step: vec![RangeStep {
                    id: "volume".to_string(),
                    min: 0,
                    max: 161,
                    step: 1,
                }],
            }],
        }
    }

    fn status() -> StatusResponse {
        StatusResponse {
            power: "on".to_string(),
            volume: 80,
            max_volume: None,
            mute: false,
            input: "hdmi1".to_string(),
            sound_program: Some("straight".to_string()),
        }
    }

    fn play_info() -> PlayInfoResponse {
        PlayInfoResponse {
            playback: "play".to_string(),
            repeat: "all".to_string(),
            shuffle: "on".to_string(),
            artist: "Nils Frahm".to_string(),
            album: "Spaces".to_string(),
            track: "Says".to_string(),
            play_time: 42,
            total_time: 0,
            albumart_url: String::new(),
            input: "net_radio".to_string(),
        }
    }

    #[test]
    fn test_from_responses() {
        let snapshot = DeviceSnapshot::from_responses(&status(), &play_info(), &features(), "main");

        assert_eq!(snapshot.power, PowerState::On);
        assert_eq!(snapshot.playback, PlaybackState::Playing);
        assert_eq!(snapshot.max_volume, 161);
        assert_eq!(snapshot.volume, 80);
        assert_eq!(snapshot.repeat, RepeatMode::All);
        assert!(snapshot.shuffle);
        assert_eq!(snapshot.track.title.as_deref(), Some("Says"));
        assert_eq!(snapshot.track.artwork_url, None);
        assert_eq!(snapshot.position, Some(Duration::from_secs(42)));
        assert_eq!(snapshot.duration, None);
        assert_eq!(snapshot.sound_program.as_deref(), Some("straight"));
        assert!(snapshot.has_input("net_radio"));
        assert!(!snapshot.has_input("spotify"));
        assert!(snapshot.has_sound_program("munich"));
        assert!(!snapshot.has_sound_program("Munich Hall"));
        assert_eq!(snapshot.input_name(), "HDMI 1");
        assert_eq!(
            snapshot.sound_programs,
            vec![SoundProgram::new("straight"), SoundProgram::new("munich")]
        );
        assert_eq!(snapshot.sound_programs[1].name, "Munich Hall");
        assert_eq!(snapshot.sound_program_name().as_deref(), Some("Straight"));
    }

    #[test]
    fn test_sound_program_name_outside_feature_list() {
        let mut status = status();
        status.sound_program = Some("surr_decoder".to_string());
        let snapshot = DeviceSnapshot::from_responses(&status, &play_info(), &features(), "main");
        assert_eq!(snapshot.sound_program_name().as_deref(), Some("Surround Decoder"));

        status.sound_program = None;
        let snapshot = DeviceSnapshot::from_responses(&status, &play_info(), &features(), "main");
        assert_eq!(snapshot.sound_program_name(), None);
    }

    #[test]
    fn test_status_max_volume_wins_and_clamps() {
        let mut status = status();
        status.max_volume = Some(60);
        status.volume = 75;

        let snapshot = DeviceSnapshot::from_responses(&status, &play_info(), &features(), "main");
        assert_eq!(snapshot.max_volume, 60);
        assert_eq!(snapshot.volume, 60);
    }

    #[test]
    fn test_stopped_clears_media() {
        let mut play_info = play_info();
        play_info.playback = "stop".to_string();
        play_info.total_time = 240;

        let snapshot = DeviceSnapshot::from_responses(&status(), &play_info, &features(), "main");
        assert_eq!(snapshot.position, None);
        assert_eq!(snapshot.duration, None);
        assert!(snapshot.track.is_empty());
    }

    #[test]
    fn test_standby_clears_media() {
        let mut status = status();
        status.power = "standby".to_string();

        let snapshot = DeviceSnapshot::from_responses(&status, &play_info(), &features(), "main");
        assert_eq!(snapshot.playback, PlaybackState::Playing);
        assert_eq!(snapshot.track, TrackInfo::default());
        assert_eq!(snapshot.position, None);
    }

    #[test]
    fn test_paused_keeps_media() {
        let mut play_info = play_info();
        play_info.playback = "pause".to_string();
        play_info.total_time = 240;

        let snapshot = DeviceSnapshot::from_responses(&status(), &play_info, &features(), "main");
        assert_eq!(snapshot.track.title.as_deref(), Some("Says"));
        assert_eq!(snapshot.position, Some(Duration::from_secs(42)));
        assert_eq!(snapshot.duration, Some(Duration::from_secs(240)));
    }

    #[test]
    fn test_volume_percent() {
        let mut snapshot =
            DeviceSnapshot::from_responses(&status(), &play_info(), &features(), "main");
        snapshot.max_volume = 161;
        snapshot.volume = 80;
        assert_eq!(snapshot.volume_percent(), 49);
        assert_eq!(snapshot.volume_from_percent(50), 80);
        assert_eq!(snapshot.volume_from_percent(200), 161);

        snapshot.max_volume = 0;
        assert_eq!(snapshot.volume_percent(), 0);
    }

    #[test]
    fn test_diff() {
        let before = DeviceSnapshot::from_responses(&status(), &play_info(), &features(), "main");
        let mut after = before.clone();
        assert!(after.diff(&before).is_empty());

        after.volume = 90;
        after.mute = true;
        after.track.title = Some("Familiar".to_string());
        assert_eq!(after.diff(&before), vec!["volume", "mute", "track"]);
    }
}
