use std::{
    io::{self, BufRead, ErrorKind},
    net::{TcpStream, ToSocketAddrs},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        mpsc::{self, Receiver},
        Arc,
    },
    thread,
    time::Duration,
};

use anyhow::Context;
use chrono::Utc;
use tracing::{debug, info, warn};

use weatherclock_common::{
    BootClock, Collaborators, DisplayConfig, FetchError, HttpPort, HttpRequest, HttpResponse,
    LinkError, LinkPort, MonotonicClock, RefreshScheduler, RenderModel, Renderer,
    SchedulerAction, TimeSource, TimeSyncConfig, WallClock, MAX_BODY_BYTES,
};

const LINK_PROBE_TIMEOUT: Duration = Duration::from_secs(3);
const LINK_RECHECK: Duration = Duration::from_secs(10);
const STARTUP_POLL: Duration = Duration::from_millis(100);

type HostScheduler = RefreshScheduler<HostLink, ReqwestHttp, SystemClock, TerminalRenderer>;

pub fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = load_config();
    info!(
        "config loaded: ssid=`{}`, weather every {}s, ui every {}s, tz `{}`",
        config.network.wifi_ssid,
        config.scheduler.weather_refresh_ms / 1_000,
        config.scheduler.ui_refresh_ms / 1_000,
        config.weather.timezone,
    );

    let clock = BootClock::new();
    let link = HostLink::new(probe_target(&config.weather.endpoint)?);
    let http = ReqwestHttp::new()?;

    let mut scheduler = RefreshScheduler::new(
        &config,
        Collaborators {
            link,
            http,
            time: SystemClock,
            renderer: TerminalRenderer,
        },
        clock.now_ms(),
    );

    scheduler.begin_connect();
    wait_for_link(&scheduler, &clock, config.scheduler.startup_link_wait_ms);
    report(&scheduler.setup(&clock));

    let touches = spawn_touch_reader()?;
    info!("press Enter to simulate a touch");

    let idle = Duration::from_millis(config.scheduler.loop_idle_ms);
    loop {
        for () in touches.try_iter() {
            scheduler.register_touch(clock.now_ms());
        }
        report(&scheduler.poll(&clock));
        thread::sleep(idle);
    }
}

fn load_config() -> DisplayConfig {
    let path = std::env::var("WEATHERCLOCK_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./.weatherclock/config.json"));

    let mut config = match read_config_file(&path) {
        Ok(config) => config,
        Err(err) => {
            warn!("failed to load config from {}: {err:#}", path.display());
            DisplayConfig::default()
        }
    };

    if let Ok(ssid) = std::env::var("WIFI_SSID") {
        config.network.wifi_ssid = ssid;
    }
    if let Ok(pass) = std::env::var("WIFI_PASS") {
        config.network.wifi_pass = pass;
    }
    if let Ok(value) = std::env::var("WEATHER_VERIFY_TLS") {
        match parse_flag(&value) {
            Some(flag) => config.weather.verify_certificates = flag,
            None => warn!("ignoring WEATHER_VERIFY_TLS=`{value}`"),
        }
    }

    config.sanitize();
    config
}

fn read_config_file(path: &Path) -> anyhow::Result<DisplayConfig> {
    match std::fs::read(path) {
        Ok(raw) => serde_json::from_slice::<DisplayConfig>(&raw)
            .with_context(|| format!("invalid JSON in {}", path.display())),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(DisplayConfig::default()),
        Err(err) => Err(err.into()),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn probe_target(endpoint: &str) -> anyhow::Result<String> {
    let url = reqwest::Url::parse(endpoint)
        .with_context(|| format!("invalid weather endpoint `{endpoint}`"))?;
    let host = url
        .host_str()
        .with_context(|| format!("weather endpoint `{endpoint}` has no host"))?;
    let port = url.port_or_known_default().unwrap_or(443);
    Ok(format!("{host}:{port}"))
}

fn wait_for_link(scheduler: &HostScheduler, clock: &BootClock, wait_ms: u64) {
    let start = clock.now_ms();
    while !scheduler.connectivity().is_connected() {
        if clock.elapsed_ms(start) >= wait_ms {
            warn!("network not reachable after {wait_ms}ms; starting offline");
            return;
        }
        thread::sleep(STARTUP_POLL);
    }
    info!("network reachable after {}ms", clock.elapsed_ms(start));
}

fn spawn_touch_reader() -> anyhow::Result<Receiver<()>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("touch".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                if line.is_err() || tx.send(()).is_err() {
                    break;
                }
            }
            debug!("stdin closed; touch input disabled");
        })
        .context("failed to spawn touch reader")?;
    Ok(rx)
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

/// Stands in for the station radio: the link is up while the weather host
/// accepts TCP connections. A monitor thread keeps re-probing so a lost route
/// reads as a dropped association.
struct HostLink {
    target: String,
    recheck: Duration,
    up: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
}

impl HostLink {
    fn new(target: String) -> Self {
        Self::with_recheck(target, LINK_RECHECK)
    }

    fn with_recheck(target: String, recheck: Duration) -> Self {
        Self {
            target,
            recheck,
            up: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl LinkPort for HostLink {
    fn begin(&mut self) -> Result<(), LinkError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let current = self.generation.clone();
        let up = self.up.clone();
        let target = self.target.clone();
        let recheck = self.recheck;

        thread::Builder::new()
            .name("link-monitor".to_string())
            .spawn(move || {
                // A disconnect or newer attempt retires this monitor.
                while current.load(Ordering::SeqCst) == generation {
                    let reachable = probe(&target);
                    if current.load(Ordering::SeqCst) != generation {
                        break;
                    }
                    let was_up = up.swap(reachable, Ordering::SeqCst);
                    if was_up != reachable {
                        debug!("link {target}: reachable={reachable}");
                    }
                    if was_up && !reachable {
                        // Association lost; only a new `begin` brings it back.
                        break;
                    }
                    thread::sleep(recheck);
                }
            })
            .map(|_| ())
            .map_err(|err| LinkError(err.to_string()))
    }

    fn disconnect(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.up.store(false, Ordering::SeqCst);
    }

    fn is_link_up(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }
}

fn probe(target: &str) -> bool {
    let Ok(mut addrs) = target.to_socket_addrs() else {
        return false;
    };
    addrs.any(|addr| TcpStream::connect_timeout(&addr, LINK_PROBE_TIMEOUT).is_ok())
}

struct ReqwestHttp {
    verified: reqwest::blocking::Client,
    insecure: reqwest::blocking::Client,
}

impl ReqwestHttp {
    fn new() -> anyhow::Result<Self> {
        let verified = reqwest::blocking::Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        let insecure = reqwest::blocking::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { verified, insecure })
    }
}

impl HttpPort for ReqwestHttp {
    fn get(&mut self, request: &HttpRequest<'_>) -> Result<HttpResponse, FetchError> {
        let client = if request.verify_certificates {
            &self.verified
        } else {
            &self.insecure
        };

        let response = client
            .get(request.url)
            .timeout(Duration::from_millis(request.timeout_ms))
            .send()
            .map_err(|err| FetchError::Transport(err.to_string()))?;

        let status = response.status().as_u16();
        if let Some(length) = response.content_length() {
            if length > MAX_BODY_BYTES as u64 {
                return Err(FetchError::Parse(format!("response too large ({length} bytes)")));
            }
        }
        let body = response
            .text()
            .map_err(|err| FetchError::Transport(err.to_string()))?;

        debug!("GET {} -> {status} ({} bytes)", request.url, body.len());
        Ok(HttpResponse { status, body })
    }
}

/// The OS keeps the host clock in sync; there is nothing to configure.
struct SystemClock;

impl WallClock for SystemClock {
    fn epoch_secs(&self) -> i64 {
        Utc::now().timestamp()
    }
}

impl TimeSource for SystemClock {
    fn configure(&mut self, config: &TimeSyncConfig) -> Result<(), FetchError> {
        debug!("host clock is OS-managed; ignoring servers {:?}", config.servers);
        Ok(())
    }
}

struct TerminalRenderer;

impl Renderer for TerminalRenderer {
    fn render(&mut self, model: &RenderModel) {
        let link = if model.connected { "online" } else { "offline" };
        let sync = if model.time_synced { "" } else { " (clock not set)" };
        println!("+------------------------------+");
        println!("| {:>5}{:<23} |", model.time_text, sync);
        println!("| {:<28} |", model.date_text);
        println!("| {:<9} {:<18} |", model.temperature_text, model.condition_text);
        println!("| {:<28} |", link);
        println!("+------------------------------+");
        info!(
            "frame: {} {} {} {} [{link}]",
            model.time_text, model.date_text, model.temperature_text, model.condition_text
        );
    }
}
