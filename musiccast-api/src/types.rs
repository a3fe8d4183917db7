//! Response bodies and the value types parsed out of them
//!
//! Response structs keep the device's raw strings; the small enums below
//! are parsed from them with tolerant `from_wire` helpers so unexpected
//! firmware values degrade to a sensible default instead of failing a poll.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ============================================================================
// Value enums
// ============================================================================

/// Amplifier power state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerState {
    /// Zone is powered on
    On,
    /// Zone is in standby
    Standby,
}

impl PowerState {
    /// Parse from the `power` field of `getStatus`
    pub fn from_wire(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "on" => PowerState::On,
            _ => PowerState::Standby,
        }
    }
}

/// Network/USB player state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PlaybackState {
    /// Audio is playing
    Playing,
    /// Playback is paused
    Paused,
    /// Playback is stopped
    #[default]
    Stopped,
}

impl PlaybackState {
    /// Parse from the `playback` field of `getPlayInfo`
    ///
    /// Seeking states (`fast_forward`, `fast_reverse`) count as playing.
    pub fn from_wire(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "play" | "fast_forward" | "fast_reverse" => PlaybackState::Playing,
            "pause" => PlaybackState::Paused,
            _ => PlaybackState::Stopped,
        }
    }
}

/// Repeat mode of the network/USB player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RepeatMode {
    /// No repeat
    #[default]
    Off,
    /// Repeat the current track
    One,
    /// Repeat the whole queue
    All,
}

impl RepeatMode {
    /// Parse from the `repeat` field of `getPlayInfo`
    pub fn from_wire(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "one" => RepeatMode::One,
            "all" => RepeatMode::All,
            _ => RepeatMode::Off,
        }
    }

    /// Value used by `netusb/setRepeat`
    pub fn as_wire(&self) -> &'static str {
        match self {
            RepeatMode::Off => "off",
            RepeatMode::One => "one",
            RepeatMode::All => "all",
        }
    }
}

/// Parse the `shuffle` field (`off`, `on`, and newer `songs`/`album` values)
pub fn shuffle_from_wire(value: &str) -> bool {
    !matches!(value.to_ascii_lowercase().as_str(), "" | "off")
}

// ============================================================================
// Responses
// ============================================================================

/// `system/getDeviceInfo`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DeviceInfo {
    /// Model name, e.g. `RX-V685`
    pub model_name: String,
    /// Hardware identifier reported by the device
    pub device_id: String,
    /// Firmware version (numeric on real devices, a string on some)
    #[serde(deserialize_with = "string_or_number")]
    pub system_version: String,
    /// Extended Control API version
    #[serde(deserialize_with = "string_or_number")]
    pub api_version: String,
}

/// `{zone}/getStatus`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StatusResponse {
    /// `on` or `standby`
    pub power: String,
    /// Current volume in device units
    pub volume: u32,
    /// Upper volume bound, when the firmware reports it here
    pub max_volume: Option<u32>,
    /// Mute flag
    pub mute: bool,
    /// Active input id
    pub input: String,
    /// Active DSP sound program, if the zone has one
    pub sound_program: Option<String>,
}

/// `netusb/getPlayInfo`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PlayInfoResponse {
    /// `play`, `pause`, `stop`, ...
    pub playback: String,
    /// `off`, `one`, `all`
    pub repeat: String,
    /// `off`, `on`, ...
    pub shuffle: String,
    /// Track artist
    pub artist: String,
    /// Track album
    pub album: String,
    /// Track title
    pub track: String,
    /// Elapsed seconds
    pub play_time: i64,
    /// Track length in seconds (0 when unknown)
    pub total_time: i64,
    /// Album art; device-relative paths are resolved by the transport
    pub albumart_url: String,
    /// Input the play info refers to
    pub input: String,
}

/// `system/getFeatures` (the parts the SDK uses)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Features {
    /// System-wide feature block
    pub system: SystemFeatures,
    /// Per-zone feature blocks
    pub zone: Vec<ZoneFeatures>,
}

/// System block of `getFeatures`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SystemFeatures {
    /// Every input the device knows about
    pub input_list: Vec<SystemInput>,
}

/// One entry of the system input list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SystemInput {
    /// Input id, e.g. `hdmi1`
    pub id: String,
}

/// Zone block of `getFeatures`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ZoneFeatures {
    /// Zone id, e.g. `main`
    pub id: String,
    /// Inputs selectable in this zone
    pub input_list: Vec<String>,
    /// DSP programs selectable in this zone
    pub sound_program_list: Vec<String>,
    /// Numeric ranges (volume among them)
    pub range_step: Vec<RangeStep>,
}

/// A numeric range advertised by the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RangeStep {
    /// Range id, e.g. `volume`
    pub id: String,
    /// Lower bound
    pub min: i64,
    /// Upper bound
    pub max: i64,
    /// Step size
    pub step: i64,
}

impl Features {
    /// Feature block for `zone`
    pub fn zone(&self, zone: &str) -> Option<&ZoneFeatures> {
        self.zone.iter().find(|z| z.id == zone)
    }

    /// Inputs selectable in `zone`, falling back to the system list
    pub fn inputs(&self, zone: &str) -> Vec<String> {
        match self.zone(zone) {
            Some(z) if !z.input_list.is_empty() => z.input_list.clone(),
            _ => self.system.input_list.iter().map(|i| i.id.clone()).collect(),
        }
    }

    /// Sound programs selectable in `zone`
    pub fn sound_programs(&self, zone: &str) -> Vec<String> {
        self.zone(zone)
            .map(|z| z.sound_program_list.clone())
            .unwrap_or_default()
    }

    /// Upper volume bound advertised for `zone`
    pub fn max_volume(&self, zone: &str) -> Option<u32> {
        self.zone(zone)?
            .range_step
            .iter()
            .find(|r| r.id == "volume")
            .and_then(|r| u32::try_from(r.max).ok())
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

// ============================================================================
// Input names
// ============================================================================

/// Human readable name for an input id
///
/// ```rust
/// use musiccast_api::friendly_input_name;
///
/// assert_eq!(friendly_input_name("hdmi1"), "HDMI 1");
/// assert_eq!(friendly_input_name("net_radio"), "Net Radio");
/// ```
pub fn friendly_input_name(id: &str) -> String {
    let known = match id {
        "hdmi" => Some("HDMI"),
        "spotify" => Some("Spotify"),
        "airplay" => Some("AirPlay"),
        "bluetooth" => Some("Bluetooth"),
        "usb" => Some("USB"),
        "tuner" => Some("Tuner"),
        "optical" => Some("Optical"),
        "coaxial" => Some("Coaxial"),
        "tv" => Some("TV"),
        "mc_link" => Some("MusicCast Link"),
        "server" => Some("Server"),
        "net_radio" => Some("Net Radio"),
        "phono" => Some("Phono"),
        "analog" => Some("Analog"),
        _ => None,
    };
    if let Some(name) = known {
        return name.to_string();
    }

    // hdmi1 -> HDMI 1, av2 -> AV 2
    let split = id.find(|c: char| c.is_ascii_digit());
    if let Some(pos) = split {
        let (prefix, number) = id.split_at(pos);
        if !prefix.is_empty() && prefix.len() <= 4 && !prefix.contains('_') {
            return format!("{} {}", prefix.to_ascii_uppercase(), number);
        }
    }

    title_case(id)
}

/// Human readable name for a DSP sound program id
///
/// ```rust
/// use musiccast_api::friendly_sound_program_name;
///
/// assert_eq!(friendly_sound_program_name("2ch_stereo"), "2-Channel Stereo");
/// assert_eq!(friendly_sound_program_name("pop_rock"), "Pop Rock");
/// ```
pub fn friendly_sound_program_name(id: &str) -> String {
    let known = match id {
        "munich" => "Munich Hall",
        "vienna" => "Vienna Hall",
        "amsterdam" => "Amsterdam Concert Hall",
        "freiburg" => "Freiburg Cathedral",
        "royaumont" => "Royaumont Abbey",
        "chamber" => "Chamber Music",
        "village_vanguard" => "Village Vanguard Jazz Club",
        "warehouse_loft" => "Warehouse Loft",
        "cellar_club" => "Cellar Club",
        "roxy_theatre" => "Roxy Theatre",
        "bottom_line" => "Bottom Line",
        "sports" => "Sports",
        "action_game" => "Action Game",
        "roleplaying_game" => "RPG Game",
        "music_video" => "Music Video",
        "recital_opera" => "Recital/Opera",
        "standard" => "Standard",
        "spectacle" => "Spectacle",
        "sci-fi" => "Sci-Fi",
        "adventure" => "Adventure",
        "drama" => "Drama",
        "mono_movie" => "Mono Movie",
        "enhanced" => "Enhanced",
        "2ch_stereo" => "2-Channel Stereo",
        "all_ch_stereo" => "All Channel Stereo",
        "surr_decoder" => "Surround Decoder",
        "straight" => "Straight",
        other => return title_case(other),
    };
    known.to_string()
}

fn title_case(id: &str) -> String {
    id.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
