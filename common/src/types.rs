use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectivityState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "DISCONNECTED",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
        }
    }

    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinate {
    #[serde(rename = "lat")]
    pub latitude: f32,
    #[serde(rename = "lon")]
    pub longitude: f32,
}

impl GeoCoordinate {
    /// Bengaluru; used until (and unless) the location lookup succeeds.
    pub const FALLBACK: Self = Self {
        latitude: 12.9716,
        longitude: 77.5946,
    };

    pub fn new(latitude: f32, longitude: f32) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl Default for GeoCoordinate {
    fn default() -> Self {
        Self::FALLBACK
    }
}

pub const CONDITION_PLACEHOLDER: &str = "---";

/// Last known-good weather reading. `None` fields mean no fetch has ever
/// succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSnapshot {
    pub temperature_c: Option<f32>,
    pub condition_code: Option<i32>,
    pub condition_text: String,
}

impl WeatherSnapshot {
    pub fn absent() -> Self {
        Self {
            temperature_c: None,
            condition_code: None,
            condition_text: CONDITION_PLACEHOLDER.to_string(),
        }
    }

    pub fn is_absent(&self) -> bool {
        self.temperature_c.is_none() && self.condition_code.is_none()
    }

    pub fn temperature_text(&self) -> String {
        match self.temperature_c {
            Some(temp) if temp.is_finite() => format!("{temp:.1}°C"),
            _ => "--°C".to_string(),
        }
    }
}

impl Default for WeatherSnapshot {
    fn default() -> Self {
        Self::absent()
    }
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderModel {
    pub time_text: String,
    pub date_text: String,
    pub temperature_text: String,
    pub condition_text: String,
    pub connected: bool,
    pub time_synced: bool,
}
