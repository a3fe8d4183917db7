/// The API groups exposed by a MusicCast device
///
/// Extended Control endpoints are namespaced by function: system-wide
/// information, per-zone amplifier controls, and the network/USB player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// `system/...` - device info and feature discovery
    System,

    /// `{zone}/...` - power, volume, mute, input and sound program
    Zone,

    /// `netusb/...` - playback info and transport controls
    NetUsb,
}

/// Zone used when none is configured
pub const MAIN_ZONE: &str = "main";

impl Service {
    /// Get the name of this service as a string
    pub fn name(&self) -> &'static str {
        match self {
            Service::System => "System",
            Service::Zone => "Zone",
            Service::NetUsb => "NetUsb",
        }
    }

    /// Build the endpoint path for `action` within this service
    ///
    /// ```rust
    /// use musiccast_api::Service;
    ///
    /// assert_eq!(Service::Zone.endpoint("main", "getStatus"), "main/getStatus");
    /// assert_eq!(Service::NetUsb.endpoint("main", "setRepeat"), "netusb/setRepeat");
    /// ```
    pub fn endpoint(&self, zone: &str, action: &str) -> String {
        match self {
            Service::System => format!("system/{}", action),
            Service::Zone => format!("{}/{}", zone, action),
            Service::NetUsb => format!("netusb/{}", action),
        }
    }
}
