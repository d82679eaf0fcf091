use crate::clock::{elapsed_ms, Tick};

/// One-shot "user touched the screen" flag. A touch that arrives while one is
/// already pending is folded into it.
#[derive(Debug, Clone)]
pub struct TouchTrigger {
    debounce_ms: u64,
    pending_since: Option<Tick>,
}

impl TouchTrigger {
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            debounce_ms,
            pending_since: None,
        }
    }

    /// Returns `false` when the touch was coalesced into a pending one.
    pub fn register(&mut self, now: Tick) -> bool {
        if self.pending_since.is_some() {
            return false;
        }
        self.pending_since = Some(now);
        true
    }

    pub fn is_pending(&self) -> bool {
        self.pending_since.is_some()
    }

    /// Clears and returns `true` once the debounce delay has passed.
    pub fn take_ready(&mut self, now: Tick) -> bool {
        match self.pending_since {
            Some(since) if elapsed_ms(now, since) >= self.debounce_ms => {
                self.pending_since = None;
                true
            }
            _ => false,
        }
    }
}

/// Turns a polled touch level (IRQ pin or `touched()` query) into press edges.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeDetector {
    last_level: bool,
}

impl EdgeDetector {
    pub fn update(&mut self, touched: bool) -> bool {
        let rising = touched && !self.last_level;
        self.last_level = touched;
        rising
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waits_for_debounce_then_fires_once() {
        let mut trigger = TouchTrigger::new(200);
        assert!(trigger.register(1_000));

        assert!(!trigger.take_ready(1_100));
        assert!(trigger.is_pending());
        assert!(trigger.take_ready(1_200));
        assert!(!trigger.take_ready(1_300));
        assert!(!trigger.is_pending());
    }

    #[test]
    fn second_touch_before_consumption_is_coalesced() {
        let mut trigger = TouchTrigger::new(200);

        assert!(trigger.register(0));
        assert!(!trigger.register(50));
        assert!(trigger.take_ready(250));
        assert!(!trigger.take_ready(10_000));
    }

    #[test]
    fn edge_detector_reports_presses_not_holds() {
        let mut edges = EdgeDetector::default();
        let levels = [false, true, true, true, false, true, false];

        let presses: Vec<bool> = levels.iter().map(|level| edges.update(*level)).collect();

        assert_eq!(presses, vec![false, true, false, false, false, true, false]);
    }
}
