use std::{thread, time::Duration};

use anyhow::{anyhow, Context};
use chrono::Utc;
use embedded_svc::{
    http::{client::Client as HttpClient, Method, Status},
    io::Read,
    wifi::{AuthMethod, ClientConfiguration, Configuration},
};
use esp_idf_hal::gpio::{PinDriver, Pull};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::prelude::Peripherals,
    http::client::{Configuration as HttpClientConfiguration, EspHttpConnection},
    log::EspLogger,
    nvs::EspDefaultNvsPartition,
    sntp::{EspSntp, SntpConf},
    wifi::EspWifi,
};
use log::{debug, info, warn};

use weatherclock_common::{
    BootClock, Collaborators, DisplayConfig, EdgeDetector, FetchError, HttpPort, HttpRequest,
    HttpResponse, LinkError, LinkPort, MonotonicClock, NetworkConfig, RefreshScheduler,
    RenderModel, Renderer, SchedulerAction, TimeSource, TimeSyncConfig, WallClock,
    MAX_BODY_BYTES,
};

const READ_CHUNK: usize = 1024;
const STARTUP_POLL: Duration = Duration::from_millis(100);

type EspScheduler = RefreshScheduler<EspLink, EspHttp, EspTime, LogRenderer>;

pub fn run() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    let mut config = DisplayConfig::default();
    ensure_wifi_defaults(&mut config.network);
    config.sanitize();
    info!(
        "config: ssid=`{}`, weather every {}s, tz `{}`, verify tls {}",
        config.network.wifi_ssid,
        config.scheduler.weather_refresh_ms / 1_000,
        config.weather.timezone,
        config.weather.verify_certificates,
    );

    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;
    let Peripherals { modem, pins, .. } = Peripherals::take()?;

    let wifi = EspWifi::new(modem, sys_loop, Some(nvs_partition))
        .context("failed to create wifi driver")?;

    // XPT2046 T_IRQ: idles high, pulled low while the panel is touched.
    let mut touch_irq = PinDriver::input(pins.gpio21).context("failed to claim touch IRQ")?;
    touch_irq.set_pull(Pull::Up)?;

    let clock = BootClock::new();
    let mut scheduler = RefreshScheduler::new(
        &config,
        Collaborators {
            link: EspLink::new(wifi, &config.network),
            http: EspHttp,
            time: EspTime::default(),
            renderer: LogRenderer,
        },
        clock.now_ms(),
    );

    scheduler.begin_connect();
    wait_for_link(&scheduler, &clock, config.scheduler.startup_link_wait_ms);
    report(&scheduler.setup(&clock));

    let idle = Duration::from_millis(config.scheduler.loop_idle_ms);
    let mut edges = EdgeDetector::default();
    loop {
        if edges.update(touch_irq.is_low()) {
            scheduler.register_touch(clock.now_ms());
        }
        report(&scheduler.poll(&clock));
        thread::sleep(idle);
    }
}

fn ensure_wifi_defaults(network: &mut NetworkConfig) {
    if network.wifi_ssid.is_empty() {
        if let Some(ssid) = option_env!("WIFI_SSID") {
            network.wifi_ssid = ssid.to_string();
        }
    }

    if network.wifi_pass.is_empty() {
        if let Some(pass) = option_env!("WIFI_PASS") {
            network.wifi_pass = pass.to_string();
        }
    }
}

fn wait_for_link(scheduler: &EspScheduler, clock: &BootClock, wait_ms: u64) {
    let start = clock.now_ms();
    while !scheduler.connectivity().is_connected() {
        if clock.elapsed_ms(start) >= wait_ms {
            warn!("wifi not connected after {wait_ms}ms; starting offline");
            return;
        }
        thread::sleep(STARTUP_POLL);
    }
    info!("wifi connected after {}ms", clock.elapsed_ms(start));
}

fn report(actions: &[SchedulerAction]) {
    for action in actions {
        match action {
            SchedulerAction::Render(reason) => debug!("rendered ({reason:?})"),
            SchedulerAction::WeatherFailed { kind, touch } => {
                warn!("weather refresh failed ({kind:?}, touch={touch})")
            }
            SchedulerAction::LocationFailed(kind) => warn!("location lookup failed ({kind:?})"),
            other => info!("{other:?}"),
        }
    }
}

struct EspLink {
    wifi: EspWifi<'static>,
    ssid: String,
    pass: String,
    started: bool,
}

impl EspLink {
    fn new(wifi: EspWifi<'static>, network: &NetworkConfig) -> Self {
        Self {
            wifi,
            ssid: network.wifi_ssid.clone(),
            pass: network.wifi_pass.clone(),
            started: false,
        }
    }

    fn start_station(&mut self) -> anyhow::Result<()> {
        if self.ssid.is_empty() {
            return Err(anyhow!("wifi credentials missing"));
        }

        let auth_method = if self.pass.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPAWPA2Personal
        };

        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration {
                ssid: self
                    .ssid
                    .as_str()
                    .try_into()
                    .map_err(|_| anyhow!("wifi ssid too long"))?,
                password: self
                    .pass
                    .as_str()
                    .try_into()
                    .map_err(|_| anyhow!("wifi password too long"))?,
                auth_method,
                ..Default::default()
            }))?;
        self.wifi.start()?;
        info!("wifi started, station `{}`", self.ssid);
        Ok(())
    }
}

impl LinkPort for EspLink {
    fn begin(&mut self) -> Result<(), LinkError> {
        if !self.started {
            self.start_station()
                .map_err(|err| LinkError(format!("{err:#}")))?;
            self.started = true;
        }
        // Returns immediately; association completes in the driver.
        self.wifi
            .connect()
            .map_err(|err| LinkError(format!("{err:?}")))
    }

    fn disconnect(&mut self) {
        if !self.started {
            return;
        }
        if let Err(err) = self.wifi.disconnect() {
            debug!("wifi disconnect: {err:?}");
        }
    }

    fn is_link_up(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false) && self.wifi.sta_netif().is_up().unwrap_or(false)
    }
}

struct EspHttp;

impl HttpPort for EspHttp {
    fn get(&mut self, request: &HttpRequest<'_>) -> Result<HttpResponse, FetchError> {
        let transport = |err: esp_idf_svc::io::EspIOError| FetchError::Transport(format!("{err:?}"));

        let config = HttpClientConfiguration {
            timeout: Some(Duration::from_millis(request.timeout_ms)),
            crt_bundle_attach: if request.verify_certificates {
                Some(esp_idf_svc::sys::esp_crt_bundle_attach)
            } else {
                None
            },
            ..Default::default()
        };
        let connection = EspHttpConnection::new(&config)
            .map_err(|err| FetchError::Transport(format!("{err:?}")))?;
        let mut client = HttpClient::wrap(connection);

        let mut response = client
            .request(Method::Get, request.url, &[])
            .map_err(transport)?
            .submit()
            .map_err(transport)?;
        let status = response.status();

        let mut body = Vec::new();
        let mut chunk = [0_u8; READ_CHUNK];
        loop {
            let read = response.read(&mut chunk).map_err(transport)?;
            if read == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..read]);
            if body.len() > MAX_BODY_BYTES {
                return Err(FetchError::Parse(format!(
                    "response too large (>{MAX_BODY_BYTES} bytes)"
                )));
            }
        }

        let body = String::from_utf8(body)
            .map_err(|err| FetchError::Parse(format!("body is not UTF-8: {err}")))?;
        debug!("GET {} -> {status} ({} bytes)", request.url, body.len());
        Ok(HttpResponse { status, body })
    }
}

/// SNTP keeps the system clock in UTC; the display offset is applied when a
/// frame is projected.
#[derive(Default)]
struct EspTime {
    sntp: Option<EspSntp<'static>>,
}

impl WallClock for EspTime {
    fn epoch_secs(&self) -> i64 {
        Utc::now().timestamp()
    }
}

impl TimeSource for EspTime {
    fn configure(&mut self, config: &TimeSyncConfig) -> Result<(), FetchError> {
        if self.sntp.is_some() {
            return Ok(());
        }

        let mut conf = SntpConf::default();
        for (slot, server) in conf.servers.iter_mut().zip(&config.servers) {
            *slot = server.as_str();
        }

        let sntp = EspSntp::new(&conf)
            .map_err(|err| FetchError::Transport(format!("failed to start SNTP: {err:?}")))?;
        info!("SNTP started ({:?})", config.servers);
        self.sntp = Some(sntp);
        Ok(())
    }
}

/// Hand-off point for the panel driver: each frame is complete and
/// self-contained.
struct LogRenderer;

impl Renderer for LogRenderer {
    fn render(&mut self, model: &RenderModel) {
        info!(
            "frame: {} | {} | {} {} | {}{}",
            model.time_text,
            model.date_text,
            model.temperature_text,
            model.condition_text,
            if model.connected { "online" } else { "offline" },
            if model.time_synced { "" } else { " | clock not set" },
        );
    }
}
