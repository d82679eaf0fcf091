use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::types::{RenderModel, WeatherSnapshot};

/// Draws one complete frame. Implementations hold no scheduling state.
pub trait Renderer {
    fn render(&mut self, model: &RenderModel);
}

pub fn project(
    epoch_secs: i64,
    utc_offset_secs: i32,
    snapshot: &WeatherSnapshot,
    connected: bool,
    time_synced: bool,
) -> RenderModel {
    let offset = FixedOffset::east_opt(utc_offset_secs).unwrap_or_else(|| Utc.fix());
    let local = DateTime::<Utc>::from_timestamp(epoch_secs, 0)
        .unwrap_or_default()
        .with_timezone(&offset);

    RenderModel {
        time_text: local.format("%H:%M").to_string(),
        date_text: local.format("%a %d %b %Y").to_string(),
        temperature_text: snapshot.temperature_text(),
        condition_text: snapshot.condition_text.clone(),
        connected,
        time_synced,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn projects_local_time_and_weather() {
        let snapshot = WeatherSnapshot {
            temperature_c: Some(27.5),
            condition_code: Some(63),
            condition_text: "Rain".to_string(),
        };

        let model = project(1_700_000_000, 19_800, &snapshot, true, true);

        assert_eq!(
            model,
            RenderModel {
                time_text: "03:43".to_string(),
                date_text: "Wed 15 Nov 2023".to_string(),
                temperature_text: "27.5°C".to_string(),
                condition_text: "Rain".to_string(),
                connected: true,
                time_synced: true,
            }
        );
    }

    #[test]
    fn unsynced_clock_still_renders() {
        let model = project(0, 19_800, &WeatherSnapshot::absent(), false, false);

        assert_eq!(model.time_text, "05:30");
        assert_eq!(model.date_text, "Thu 01 Jan 1970");
        assert_eq!(model.temperature_text, "--°C");
        assert_eq!(model.condition_text, "---");
        assert!(!model.connected);
    }
}
