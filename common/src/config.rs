use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::types::GeoCoordinate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub ui_refresh_ms: u64,
    pub weather_refresh_ms: u64,
    pub wifi_retry_ms: u64,
    pub touch_debounce_ms: u64,
    pub loop_idle_ms: u64,
    pub startup_link_wait_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            ui_refresh_ms: 30_000,
            weather_refresh_ms: 900_000,
            wifi_retry_ms: 300_000,
            touch_debounce_ms: 200,
            loop_idle_ms: 20,
            startup_link_wait_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSyncConfig {
    pub servers: Vec<String>,
    pub utc_offset_secs: i32,
    pub max_attempts: u8,
    pub retry_interval_ms: u64,
    pub min_plausible_epoch: i64,
}

impl Default for TimeSyncConfig {
    fn default() -> Self {
        Self {
            servers: vec!["pool.ntp.org".to_string(), "time.google.com".to_string()],
            utc_offset_secs: 19_800,
            max_attempts: 10,
            retry_interval_ms: 500,
            min_plausible_epoch: 100_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub endpoint: String,
    pub fallback: GeoCoordinate,
    pub timeout_ms: u64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://ip-api.com/json".to_string(),
            fallback: GeoCoordinate::FALLBACK,
            timeout_ms: 15_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    pub endpoint: String,
    pub timezone: String,
    /// Open-Meteo is queried with certificate checks off on the device; set
    /// this to `true` wherever a CA bundle is available.
    pub verify_certificates: bool,
    pub timeout_ms: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.open-meteo.com/v1/forecast".to_string(),
            timezone: "Asia/Kolkata".to_string(),
            verify_certificates: false,
            timeout_ms: 15_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub wifi_ssid: String,
    pub wifi_pass: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub time_sync: TimeSyncConfig,
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

impl SchedulerConfig {
    pub fn sanitize(&mut self) {
        self.ui_refresh_ms = self.ui_refresh_ms.clamp(1_000, 3_600_000);
        self.weather_refresh_ms = self.weather_refresh_ms.clamp(60_000, 86_400_000);
        self.wifi_retry_ms = self.wifi_retry_ms.clamp(5_000, 3_600_000);
        self.touch_debounce_ms = self.touch_debounce_ms.min(2_000);
        self.loop_idle_ms = self.loop_idle_ms.min(1_000);
        self.startup_link_wait_ms = self.startup_link_wait_ms.min(60_000);
    }
}

impl TimeSyncConfig {
    pub fn sanitize(&mut self) {
        self.servers.retain(|server| !server.trim().is_empty());
        if self.servers.is_empty() {
            self.servers = Self::default().servers;
        }
        // Offsets beyond +/-14h do not exist.
        self.utc_offset_secs = self.utc_offset_secs.clamp(-14 * 3_600, 14 * 3_600);
        self.max_attempts = self.max_attempts.clamp(1, 60);
        self.retry_interval_ms = self.retry_interval_ms.clamp(50, 10_000);
        if self.min_plausible_epoch < 0 {
            self.min_plausible_epoch = 0;
        }
    }
}

impl LocationConfig {
    pub fn sanitize(&mut self) {
        if !self.fallback.is_valid() {
            self.fallback = GeoCoordinate::FALLBACK;
        }
        self.timeout_ms = self.timeout_ms.clamp(1_000, 60_000);
    }
}

impl WeatherConfig {
    pub fn sanitize(&mut self) {
        if self.timezone.parse::<Tz>().is_err() {
            self.timezone = Self::default().timezone;
        }
        self.timeout_ms = self.timeout_ms.clamp(1_000, 60_000);
    }
}

impl DisplayConfig {
    pub fn sanitize(&mut self) {
        self.scheduler.sanitize();
        self.time_sync.sanitize();
        self.location.sanitize();
        self.weather.sanitize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_device_timers() {
        let config = DisplayConfig::default();

        assert_eq!(config.scheduler.ui_refresh_ms, 30_000);
        assert_eq!(config.scheduler.weather_refresh_ms, 15 * 60 * 1_000);
        assert_eq!(config.scheduler.wifi_retry_ms, 5 * 60 * 1_000);
        assert_eq!(config.time_sync.utc_offset_secs, 19_800);
        assert_eq!(config.location.fallback, GeoCoordinate::FALLBACK);
        assert!(!config.weather.verify_certificates);
    }

    #[test]
    fn sanitize_restores_invalid_values() {
        let mut config = DisplayConfig::default();
        config.weather.timezone = "Mars/Olympus_Mons".to_string();
        config.time_sync.servers = vec!["  ".to_string()];
        config.time_sync.max_attempts = 0;
        config.location.fallback = GeoCoordinate::new(200.0, 0.0);
        config.scheduler.ui_refresh_ms = 0;

        config.sanitize();

        assert_eq!(config.weather.timezone, "Asia/Kolkata");
        assert_eq!(config.time_sync.servers.len(), 2);
        assert_eq!(config.time_sync.max_attempts, 1);
        assert_eq!(config.location.fallback, GeoCoordinate::FALLBACK);
        assert_eq!(config.scheduler.ui_refresh_ms, 1_000);
    }

    #[test]
    fn partial_json_fills_missing_sections() {
        let raw = r#"{"network":{"wifi_ssid":"home","wifi_pass":"secret"}}"#;
        let config: DisplayConfig = serde_json::from_str(raw).unwrap();

        assert_eq!(config.network.wifi_ssid, "home");
        assert_eq!(config.scheduler.ui_refresh_ms, 30_000);
        assert_eq!(config.weather.endpoint, "https://api.open-meteo.com/v1/forecast");
    }

    #[test]
    fn location_section_keeps_defaults_for_missing_keys() {
        let raw = r#"{"location":{"timeout_ms":0}}"#;
        let mut config: DisplayConfig = serde_json::from_str(raw).unwrap();

        assert_eq!(config.location.endpoint, "http://ip-api.com/json");
        assert_eq!(config.location.fallback, GeoCoordinate::FALLBACK);

        config.sanitize();
        assert_eq!(config.location.timeout_ms, 1_000);
    }
}
