use tracing::{debug, info, warn};

use crate::{
    clock::{elapsed_ms, Tick, WallClock},
    config::TimeSyncConfig,
    error::FetchError,
};

/// Network-backed wall clock (SNTP on device, the OS clock on a host).
pub trait TimeSource: WallClock {
    /// Points the clock at the configured servers and offset. Returns as soon
    /// as the request is issued; the clock becomes plausible some time later.
    fn configure(&mut self, config: &TimeSyncConfig) -> Result<(), FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSyncStatus {
    NotStarted,
    Polling { attempts: u8 },
    Synced { epoch_secs: i64 },
    Failed,
}

/// Bounded sampling of the wall clock after SNTP has been configured. Each
/// `poll` takes at most one sample, so the event loop never sleeps here.
#[derive(Debug, Clone)]
pub struct TimeSynchronizer {
    config: TimeSyncConfig,
    status: TimeSyncStatus,
    last_sample: Option<Tick>,
}

impl TimeSynchronizer {
    pub fn new(config: TimeSyncConfig) -> Self {
        Self {
            config,
            status: TimeSyncStatus::NotStarted,
            last_sample: None,
        }
    }

    pub fn status(&self) -> TimeSyncStatus {
        self.status
    }

    pub fn is_plausible(&self, epoch_secs: i64) -> bool {
        epoch_secs > self.config.min_plausible_epoch
    }

    /// Only the first call does anything.
    pub fn start<S: TimeSource>(&mut self, source: &mut S) -> TimeSyncStatus {
        if self.status != TimeSyncStatus::NotStarted {
            return self.status;
        }

        match source.configure(&self.config) {
            Ok(()) => {
                info!(
                    "time sync started (servers {:?}, offset {}s)",
                    self.config.servers, self.config.utc_offset_secs
                );
                self.status = TimeSyncStatus::Polling { attempts: 0 };
            }
            Err(err) => {
                warn!("time sync could not be configured: {err}");
                self.status = TimeSyncStatus::Failed;
            }
        }
        self.status
    }

    /// Returns the new status when this call finished the protocol.
    pub fn poll<S: WallClock>(&mut self, source: &S, now: Tick) -> Option<TimeSyncStatus> {
        let TimeSyncStatus::Polling { attempts } = self.status else {
            return None;
        };

        if let Some(last) = self.last_sample {
            if elapsed_ms(now, last) < self.config.retry_interval_ms {
                return None;
            }
        }

        self.last_sample = Some(now);
        let attempts = attempts.saturating_add(1);
        let epoch_secs = source.epoch_secs();

        if self.is_plausible(epoch_secs) {
            info!("time synchronized after {attempts} sample(s): epoch {epoch_secs}");
            self.status = TimeSyncStatus::Synced { epoch_secs };
            return Some(self.status);
        }

        if attempts >= self.config.max_attempts {
            warn!("NTP sync failed after {attempts} samples; clock left unsynchronized");
            self.status = TimeSyncStatus::Failed;
            return Some(self.status);
        }

        debug!("wall clock not plausible yet ({epoch_secs}), attempt {attempts}");
        self.status = TimeSyncStatus::Polling { attempts };
        None
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::Cell;

    use super::*;

    #[derive(Debug, Default)]
    pub(crate) struct FakeTimeSource {
        pub epoch: Cell<i64>,
        pub configured: u32,
        pub samples: Cell<u32>,
        pub refuse: bool,
    }

    impl WallClock for FakeTimeSource {
        fn epoch_secs(&self) -> i64 {
            self.samples.set(self.samples.get() + 1);
            self.epoch.get()
        }
    }

    impl TimeSource for FakeTimeSource {
        fn configure(&mut self, _config: &TimeSyncConfig) -> Result<(), FetchError> {
            if self.refuse {
                return Err(FetchError::Transport("sntp unavailable".to_string()));
            }
            self.configured += 1;
            Ok(())
        }
    }

    #[test]
    fn accepts_first_plausible_sample() {
        let mut sync = TimeSynchronizer::new(TimeSyncConfig::default());
        let mut source = FakeTimeSource::default();
        sync.start(&mut source);

        assert_eq!(sync.poll(&source, 0), None);
        assert_eq!(sync.poll(&source, 100), None);

        source.epoch.set(1_790_000_000);
        assert_eq!(
            sync.poll(&source, 500),
            Some(TimeSyncStatus::Synced {
                epoch_secs: 1_790_000_000
            })
        );
        assert_eq!(source.samples.get(), 2);
    }

    #[test]
    fn gives_up_after_bounded_attempts() {
        let mut sync = TimeSynchronizer::new(TimeSyncConfig::default());
        let mut source = FakeTimeSource::default();
        source.epoch.set(42);
        sync.start(&mut source);

        let mut outcome = None;
        for now in (0..10_000).step_by(50) {
            if let Some(status) = sync.poll(&source, now) {
                outcome = Some((status, now));
                break;
            }
        }

        assert_eq!(outcome, Some((TimeSyncStatus::Failed, 4_500)));
        assert_eq!(source.samples.get(), 10);

        source.epoch.set(1_790_000_000);
        assert_eq!(sync.poll(&source, 20_000), None);
        assert_eq!(sync.status(), TimeSyncStatus::Failed);
    }

    #[test]
    fn start_is_one_shot() {
        let mut sync = TimeSynchronizer::new(TimeSyncConfig::default());
        let mut source = FakeTimeSource::default();

        sync.start(&mut source);
        sync.start(&mut source);

        assert_eq!(source.configured, 1);
    }

    #[test]
    fn configure_failure_ends_protocol() {
        let mut sync = TimeSynchronizer::new(TimeSyncConfig::default());
        let mut source = FakeTimeSource {
            refuse: true,
            ..FakeTimeSource::default()
        };

        assert_eq!(sync.start(&mut source), TimeSyncStatus::Failed);
        assert_eq!(sync.poll(&source, 0), None);
    }
}
