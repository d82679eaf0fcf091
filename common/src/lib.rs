pub mod clock;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod http;
pub mod location;
pub mod render;
pub mod scheduler;
pub mod time_sync;
pub mod touch;
pub mod types;
pub mod weather;

pub use clock::{elapsed_ms, BootClock, MonotonicClock, Tick, WallClock};
pub use config::{
    DisplayConfig, LocationConfig, NetworkConfig, SchedulerConfig, TimeSyncConfig, WeatherConfig,
};
pub use connectivity::{ConnectivityManager, LinkPort};
pub use error::{FetchError, FetchErrorKind, LinkError};
pub use http::{HttpPort, HttpRequest, HttpResponse, MAX_BODY_BYTES};
pub use location::{parse_location, LocationResolver};
pub use render::{project, Renderer};
pub use scheduler::{Collaborators, RefreshScheduler, RenderReason, SchedulerAction};
pub use time_sync::{TimeSource, TimeSyncStatus, TimeSynchronizer};
pub use touch::{EdgeDetector, TouchTrigger};
pub use types::{ConnectivityState, GeoCoordinate, RenderModel, WeatherSnapshot};
pub use weather::{map_weather_code, parse_current_weather, WeatherCondition, WeatherProvider};
