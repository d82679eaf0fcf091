use tracing::{debug, info, warn};

use crate::{
    clock::{elapsed_ms, MonotonicClock, Tick},
    config::{DisplayConfig, SchedulerConfig},
    connectivity::{ConnectivityManager, LinkPort},
    error::FetchErrorKind,
    http::HttpPort,
    location::LocationResolver,
    render::{project, Renderer},
    time_sync::{TimeSource, TimeSyncStatus, TimeSynchronizer},
    touch::TouchTrigger,
    types::{ConnectivityState, GeoCoordinate, WeatherSnapshot},
    weather::WeatherProvider,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderReason {
    Setup,
    Timer,
    Touch,
}

/// What a `setup` or `tick` call actually did, in execution order.
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerAction {
    WifiRetry,
    TimeSync(TimeSyncStatus),
    LocationResolved(GeoCoordinate),
    LocationFailed(FetchErrorKind),
    WeatherRefreshed { touch: bool },
    WeatherFailed { kind: FetchErrorKind, touch: bool },
    Render(RenderReason),
}

/// The device-side collaborators the scheduler drives.
pub struct Collaborators<L, H, T, R> {
    pub link: L,
    pub http: H,
    pub time: T,
    pub renderer: R,
}

/// Owns every piece of mutable display state. Only the event-loop thread may
/// call into it.
pub struct RefreshScheduler<L, H, T, R> {
    config: SchedulerConfig,
    utc_offset_secs: i32,

    connectivity: ConnectivityManager<L>,
    http: H,
    time: T,
    renderer: R,

    time_sync: TimeSynchronizer,
    location: LocationResolver,
    weather: WeatherProvider,

    coordinate: GeoCoordinate,
    snapshot: WeatherSnapshot,
    touch: TouchTrigger,

    last_ui_draw: Tick,
    last_weather_fetch: Tick,
}

impl<L, H, T, R> RefreshScheduler<L, H, T, R>
where
    L: LinkPort,
    H: HttpPort,
    T: TimeSource,
    R: Renderer,
{
    pub fn new(config: &DisplayConfig, collaborators: Collaborators<L, H, T, R>, now: Tick) -> Self {
        let Collaborators {
            link,
            http,
            time,
            renderer,
        } = collaborators;

        Self {
            config: config.scheduler.clone(),
            utc_offset_secs: config.time_sync.utc_offset_secs,
            connectivity: ConnectivityManager::new(link, config.scheduler.wifi_retry_ms, now),
            http,
            time,
            renderer,
            time_sync: TimeSynchronizer::new(config.time_sync.clone()),
            location: LocationResolver::new(&config.location),
            weather: WeatherProvider::new(config.weather.clone()),
            coordinate: config.location.fallback,
            snapshot: WeatherSnapshot::absent(),
            touch: TouchTrigger::new(config.scheduler.touch_debounce_ms),
            last_ui_draw: now,
            last_weather_fetch: now,
        }
    }

    pub fn connectivity(&self) -> &ConnectivityManager<L> {
        &self.connectivity
    }

    pub fn connectivity_mut(&mut self) -> &mut ConnectivityManager<L> {
        &mut self.connectivity
    }

    pub fn connectivity_state(&self) -> ConnectivityState {
        self.connectivity.state()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn http_mut(&mut self) -> &mut H {
        &mut self.http
    }

    pub fn time_source_mut(&mut self) -> &mut T {
        &mut self.time
    }

    pub fn coordinate(&self) -> GeoCoordinate {
        self.coordinate
    }

    pub fn snapshot(&self) -> &WeatherSnapshot {
        &self.snapshot
    }

    pub fn time_sync_status(&self) -> TimeSyncStatus {
        self.time_sync.status()
    }

    pub fn last_ui_draw(&self) -> Tick {
        self.last_ui_draw
    }

    pub fn last_weather_fetch(&self) -> Tick {
        self.last_weather_fetch
    }

    pub fn touch_pending(&self) -> bool {
        self.touch.is_pending()
    }

    /// Starts the first association attempt.
    pub fn begin_connect(&mut self) {
        self.connectivity.initiate();
    }

    /// Touch collaborator entry point. Returns `false` if coalesced.
    pub fn register_touch(&mut self, now: Tick) -> bool {
        let accepted = self.touch.register(now);
        if !accepted {
            debug!("touch coalesced into pending trigger");
        }
        accepted
    }

    /// Startup work: location and first weather fetch when the link is already
    /// up, then every timer restarts at the tick setup finished on and one frame
    /// is forced.
    pub fn setup<C: MonotonicClock>(&mut self, clock: &C) -> Vec<SchedulerAction> {
        let mut actions = Vec::new();

        if self.connectivity.is_connected() {
            self.advance_time_sync(clock.now_ms(), &mut actions);
            self.resolve_location(&mut actions);
            self.refresh_weather(false, &mut actions);
        } else {
            warn!("no link at startup; keeping fallback location and no weather");
        }

        // Read after the blocking fetches so timer periods start here.
        let now = clock.now_ms();
        self.connectivity.reset_backoff(now);
        self.last_weather_fetch = now;
        self.last_ui_draw = now;
        self.render(RenderReason::Setup, &mut actions);

        actions
    }

    pub fn poll<C: MonotonicClock>(&mut self, clock: &C) -> Vec<SchedulerAction> {
        self.tick(clock.now_ms())
    }

    pub fn tick(&mut self, now: Tick) -> Vec<SchedulerAction> {
        let mut actions = Vec::new();

        if self.connectivity.maintain(now) {
            actions.push(SchedulerAction::WifiRetry);
        }

        self.advance_time_sync(now, &mut actions);

        if elapsed_ms(now, self.last_ui_draw) > self.config.ui_refresh_ms {
            self.render(RenderReason::Timer, &mut actions);
            self.last_ui_draw = now;
        }

        if self.connectivity.is_connected()
            && elapsed_ms(now, self.last_weather_fetch) > self.config.weather_refresh_ms
        {
            self.refresh_weather(false, &mut actions);
            self.last_weather_fetch = now;
        }

        // Cleared before dispatch so the trigger is handled at most once.
        if self.touch.take_ready(now) {
            info!("touch: immediate refresh");
            if self.connectivity.is_connected() {
                self.refresh_weather(true, &mut actions);
            }
            self.render(RenderReason::Touch, &mut actions);
        }

        actions
    }

    fn advance_time_sync(&mut self, now: Tick, actions: &mut Vec<SchedulerAction>) {
        if self.time_sync.status() == TimeSyncStatus::NotStarted {
            if !self.connectivity.is_connected() {
                return;
            }
            if self.time_sync.start(&mut self.time) == TimeSyncStatus::Failed {
                actions.push(SchedulerAction::TimeSync(TimeSyncStatus::Failed));
                return;
            }
        }

        if let Some(status) = self.time_sync.poll(&self.time, now) {
            actions.push(SchedulerAction::TimeSync(status));
        }
    }

    fn resolve_location(&mut self, actions: &mut Vec<SchedulerAction>) {
        match self.location.resolve_once(&mut self.http) {
            Some(Ok(coord)) => {
                self.coordinate = coord;
                actions.push(SchedulerAction::LocationResolved(coord));
            }
            Some(Err(err)) => {
                warn!(
                    "location lookup failed, using {:.4}, {:.4}: {err}",
                    self.coordinate.latitude, self.coordinate.longitude
                );
                actions.push(SchedulerAction::LocationFailed(err.kind()));
            }
            None => {}
        }
    }

    fn refresh_weather(&mut self, touch: bool, actions: &mut Vec<SchedulerAction>) {
        match self.weather.refresh(&mut self.http, self.coordinate) {
            Ok(snapshot) => {
                self.snapshot = snapshot;
                actions.push(SchedulerAction::WeatherRefreshed { touch });
            }
            Err(err) => {
                warn!("weather refresh failed, keeping previous snapshot: {err}");
                actions.push(SchedulerAction::WeatherFailed {
                    kind: err.kind(),
                    touch,
                });
            }
        }
    }

    fn render(&mut self, reason: RenderReason, actions: &mut Vec<SchedulerAction>) {
        let epoch_secs = self.time.epoch_secs();
        let model = project(
            epoch_secs,
            self.utc_offset_secs,
            &self.snapshot,
            self.connectivity.is_connected(),
            self.time_sync.is_plausible(epoch_secs),
        );
        debug!("render ({reason:?}): {} {}", model.time_text, model.temperature_text);
        self.renderer.render(&model);
        actions.push(SchedulerAction::Render(reason));
    }
}
