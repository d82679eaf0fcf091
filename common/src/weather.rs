use serde::Deserialize;
use tracing::{debug, info};

use crate::{
    config::WeatherConfig,
    error::FetchError,
    http::{expect_ok, HttpPort, HttpRequest},
    types::{GeoCoordinate, WeatherSnapshot},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherCondition {
    Clear,
    MostlyClear,
    PartlyCloudy,
    Overcast,
    Fog,
    Rain,
    Snow,
    Showers,
    Thunder,
    Unknown,
}

impl WeatherCondition {
    /// WMO weather interpretation codes as reported by Open-Meteo.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Clear,
            1 => Self::MostlyClear,
            2 => Self::PartlyCloudy,
            3 => Self::Overcast,
            45 | 48 => Self::Fog,
            61 | 63 | 65 => Self::Rain,
            71 | 73 | 75 => Self::Snow,
            80..=82 => Self::Showers,
            95 => Self::Thunder,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::MostlyClear => "Mostly Clear",
            Self::PartlyCloudy => "Partly Cloudy",
            Self::Overcast => "Overcast",
            Self::Fog => "Fog",
            Self::Rain => "Rain",
            Self::Snow => "Snow",
            Self::Showers => "Showers",
            Self::Thunder => "Thunder",
            Self::Unknown => "Unknown",
        }
    }
}

pub fn map_weather_code(code: i32) -> &'static str {
    WeatherCondition::from_code(code).as_str()
}

#[derive(Deserialize)]
struct ForecastRoot {
    current_weather: Option<CurrentWeather>,
}

#[derive(Deserialize)]
struct CurrentWeather {
    temperature: Option<f32>,
    weathercode: Option<i32>,
}

pub fn parse_current_weather(json: &str) -> Result<WeatherSnapshot, FetchError> {
    let root: ForecastRoot = serde_json::from_str(json)?;
    let current = root
        .current_weather
        .ok_or_else(|| FetchError::Parse("missing current_weather".to_string()))?;

    let temperature = current
        .temperature
        .filter(|temp| temp.is_finite())
        .ok_or_else(|| FetchError::Parse("missing current_weather.temperature".to_string()))?;
    let code = current
        .weathercode
        .ok_or_else(|| FetchError::Parse("missing current_weather.weathercode".to_string()))?;

    Ok(WeatherSnapshot {
        temperature_c: Some(temperature),
        condition_code: Some(code),
        condition_text: map_weather_code(code).to_string(),
    })
}

pub fn build_weather_url(endpoint: &str, coord: GeoCoordinate, timezone: &str) -> String {
    format!(
        "{endpoint}?latitude={:.6}&longitude={:.6}&current_weather=true&timezone={}",
        coord.latitude,
        coord.longitude,
        encode_query_value(timezone)
    )
}

fn encode_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct WeatherProvider {
    config: WeatherConfig,
}

impl WeatherProvider {
    pub fn new(config: WeatherConfig) -> Self {
        Self { config }
    }

    /// One GET, no retries. On error the caller keeps its previous snapshot.
    pub fn refresh<H: HttpPort>(
        &self,
        http: &mut H,
        coord: GeoCoordinate,
    ) -> Result<WeatherSnapshot, FetchError> {
        let url = build_weather_url(&self.config.endpoint, coord, &self.config.timezone);
        debug!("weather request: {url}");

        let response = http.get(&HttpRequest {
            url: &url,
            verify_certificates: self.config.verify_certificates,
            timeout_ms: self.config.timeout_ms,
        })?;
        let snapshot = parse_current_weather(&expect_ok(response)?)?;

        info!(
            "weather: {} code={:?} ({})",
            snapshot.temperature_text(),
            snapshot.condition_code,
            snapshot.condition_text
        );
        Ok(snapshot)
    }
}
