use tracing::{debug, info, warn};

use crate::{
    clock::{elapsed_ms, Tick},
    error::LinkError,
    types::ConnectivityState,
};

/// Station-mode radio. Association is asynchronous: `begin` only starts it and
/// the result shows up later through `is_link_up`.
pub trait LinkPort {
    fn begin(&mut self) -> Result<(), LinkError>;

    /// Drops any association, including a half-open attempt.
    fn disconnect(&mut self);

    fn is_link_up(&self) -> bool;
}

#[derive(Debug)]
pub struct ConnectivityManager<L> {
    link: L,
    retry_period_ms: u64,
    last_retry: Tick,
    attempt_pending: bool,
}

impl<L: LinkPort> ConnectivityManager<L> {
    pub fn new(link: L, retry_period_ms: u64, now: Tick) -> Self {
        Self {
            link,
            retry_period_ms,
            last_retry: now,
            attempt_pending: false,
        }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn last_retry(&self) -> Tick {
        self.last_retry
    }

    /// Restarts the retry window, e.g. once startup has finished.
    pub fn reset_backoff(&mut self, now: Tick) {
        self.last_retry = now;
    }

    pub fn state(&self) -> ConnectivityState {
        if self.link.is_link_up() {
            ConnectivityState::Connected
        } else if self.attempt_pending {
            ConnectivityState::Connecting
        } else {
            ConnectivityState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn initiate(&mut self) {
        match self.state() {
            ConnectivityState::Connected => return,
            ConnectivityState::Connecting => {
                debug!("wifi association already in progress");
                return;
            }
            ConnectivityState::Disconnected => {}
        }

        match self.link.begin() {
            Ok(()) => {
                self.attempt_pending = true;
                info!("wifi connect initiated");
            }
            Err(err) => {
                self.attempt_pending = false;
                warn!("wifi connect could not be initiated: {err}");
            }
        }
    }

    /// Returns `true` when a retry was issued on this call.
    pub fn maintain(&mut self, now: Tick) -> bool {
        if self.link.is_link_up() {
            self.attempt_pending = false;
            return false;
        }

        if elapsed_ms(now, self.last_retry) < self.retry_period_ms {
            return false;
        }

        self.last_retry = now;
        info!("wifi retry (state {})", self.state().as_str());
        self.link.disconnect();
        self.attempt_pending = false;
        self.initiate();
        true
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[derive(Debug, Default)]
    pub(crate) struct FakeLink {
        pub up: bool,
        pub begins: u32,
        pub disconnects: u32,
        pub refuse: bool,
        pub up_on_begin: bool,
    }

    impl LinkPort for FakeLink {
        fn begin(&mut self) -> Result<(), LinkError> {
            if self.refuse {
                return Err(LinkError("radio busy".to_string()));
            }
            self.begins += 1;
            if self.up_on_begin {
                self.up = true;
            }
            Ok(())
        }

        fn disconnect(&mut self) {
            self.disconnects += 1;
            self.up = false;
        }

        fn is_link_up(&self) -> bool {
            self.up
        }
    }

    #[test]
    fn initiate_moves_to_connecting_and_is_idempotent() {
        let mut manager = ConnectivityManager::new(FakeLink::default(), 300_000, 0);
        assert_eq!(manager.state(), ConnectivityState::Disconnected);

        manager.initiate();
        manager.initiate();

        assert_eq!(manager.state(), ConnectivityState::Connecting);
        assert_eq!(manager.link().begins, 1);
    }

    #[test]
    fn refused_begin_stays_disconnected() {
        let link = FakeLink {
            refuse: true,
            ..FakeLink::default()
        };
        let mut manager = ConnectivityManager::new(link, 300_000, 0);

        manager.initiate();

        assert_eq!(manager.state(), ConnectivityState::Disconnected);
    }

    #[test]
    fn maintain_is_noop_while_connected() {
        let mut manager = ConnectivityManager::new(FakeLink::default(), 1_000, 0);
        manager.link_mut().up = true;

        assert!(!manager.maintain(10_000));
        assert_eq!(manager.link().disconnects, 0);
        assert_eq!(manager.state(), ConnectivityState::Connected);
    }

    #[test]
    fn maintain_retries_at_most_once_per_period() {
        let mut manager = ConnectivityManager::new(FakeLink::default(), 1_000, 0);
        manager.initiate();

        let mut retries = 0;
        for now in (0..=5_000).step_by(7) {
            if manager.maintain(now) {
                retries += 1;
            }
        }

        // Retries land at roughly 1001, 2002, 3003 and 4004.
        assert_eq!(retries, 4);
        assert_eq!(manager.link().disconnects, 4);
        assert_eq!(manager.link().begins, 5);
    }

    #[test]
    fn retry_tears_down_before_reinitiating() {
        let mut manager = ConnectivityManager::new(FakeLink::default(), 1_000, 0);
        manager.initiate();

        assert!(!manager.maintain(999));
        assert!(manager.maintain(1_000));

        assert_eq!(manager.last_retry(), 1_000);
        assert_eq!(manager.link().disconnects, 1);
        assert_eq!(manager.state(), ConnectivityState::Connecting);
    }

    #[test]
    fn link_loss_is_seen_as_disconnected() {
        let mut manager = ConnectivityManager::new(FakeLink::default(), 1_000, 0);
        manager.initiate();
        manager.link_mut().up = true;
        manager.maintain(100);
        assert_eq!(manager.state(), ConnectivityState::Connected);

        manager.link_mut().up = false;

        assert_eq!(manager.state(), ConnectivityState::Disconnected);
    }

    #[test]
    fn retry_period_survives_tick_wrap() {
        let start = u64::MAX - 500;
        let mut manager = ConnectivityManager::new(FakeLink::default(), 1_000, start);

        assert!(!manager.maintain(start.wrapping_add(999)));
        assert!(manager.maintain(start.wrapping_add(1_000)));
    }
}
