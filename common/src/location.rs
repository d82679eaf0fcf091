use serde::Deserialize;
use tracing::info;

use crate::{
    config::LocationConfig,
    error::FetchError,
    http::{expect_ok, HttpPort, HttpRequest},
    types::GeoCoordinate,
};

const SUCCESS_STATUS: &str = "success";

#[derive(Deserialize)]
struct IpApiResponse {
    status: Option<String>,
    message: Option<String>,
    lat: Option<f32>,
    lon: Option<f32>,
}

pub fn parse_location(json: &str) -> Result<GeoCoordinate, FetchError> {
    let response: IpApiResponse = serde_json::from_str(json)?;

    match response.status.as_deref() {
        Some(SUCCESS_STATUS) => {}
        Some(status) => {
            let reason = response.message.unwrap_or_else(|| "no reason given".to_string());
            return Err(FetchError::Logical(format!("status `{status}`: {reason}")));
        }
        None => return Err(FetchError::Parse("missing status".to_string())),
    }

    let (Some(lat), Some(lon)) = (response.lat, response.lon) else {
        return Err(FetchError::Parse("missing lat/lon".to_string()));
    };

    let coord = GeoCoordinate::new(lat, lon);
    if !coord.is_valid() {
        return Err(FetchError::Parse(format!("coordinate out of range: {lat}, {lon}")));
    }
    Ok(coord)
}

/// IP-based geolocation, tried at most once per process.
#[derive(Debug, Clone)]
pub struct LocationResolver {
    endpoint: String,
    timeout_ms: u64,
    attempted: bool,
}

impl LocationResolver {
    pub fn new(config: &LocationConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            timeout_ms: config.timeout_ms,
            attempted: false,
        }
    }

    /// `None` once the single attempt has been spent.
    pub fn resolve_once<H: HttpPort>(
        &mut self,
        http: &mut H,
    ) -> Option<Result<GeoCoordinate, FetchError>> {
        if self.attempted {
            return None;
        }
        self.attempted = true;

        let result = http
            .get(&HttpRequest {
                url: &self.endpoint,
                verify_certificates: true,
                timeout_ms: self.timeout_ms,
            })
            .and_then(expect_ok)
            .and_then(|body| parse_location(&body));

        if let Ok(coord) = &result {
            info!("location: {:.4}, {:.4}", coord.latitude, coord.longitude);
        }
        Some(result)
    }
}
