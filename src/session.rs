use parking_lot::Mutex;
use std::ops::RangeInclusive;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;
use std::time::{Duration, Instant};

/// How often the watchdog checks the clock.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

// -------------- Modes --------------
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClickMode {
    Butterfly,
    Jitter,
    Drag,
    Normal,
}

impl ClickMode {
    pub const ALL: [ClickMode; 4] = [
        ClickMode::Butterfly,
        ClickMode::Jitter,
        ClickMode::Drag,
        ClickMode::Normal,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ClickMode::Butterfly => "Butterfly Click",
            ClickMode::Jitter => "Jitter Click",
            ClickMode::Drag => "Drag Click",
            ClickMode::Normal => "Normal Click",
        }
    }

    pub fn index(self) -> usize {
        match self {
            ClickMode::Butterfly => 0,
            ClickMode::Jitter => 1,
            ClickMode::Drag => 2,
            ClickMode::Normal => 3,
        }
    }
}

// -------------- CPS math --------------
/// `None` when there is nothing to divide: zero clicks, or a duration
/// that never accumulated (a single click).
pub fn cps(clicks: u32, duration: Duration) -> Option<f64> {
    if clicks == 0 {
        return None;
    }
    let secs = duration.as_secs_f64();
    if secs <= 0.0 {
        return None;
    }
    Some(clicks as f64 / secs)
}

// -------------- Session state --------------
#[derive(Clone, Copy, Debug)]
pub struct SessionLimits {
    /// Idle time that ends a run.
    pub idle_timeout: Duration,
    /// Score over a fixed window instead of waiting for idle.
    pub window: Option<Duration>,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(2),
            window: None,
        }
    }
}

/// Bounds shared by the CLI flags and the settings UI.
pub const IDLE_SECS_RANGE: RangeInclusive<f32> = 0.5..=10.0;
pub const WINDOW_SECS_RANGE: RangeInclusive<f32> = 1.0..=60.0;

impl SessionLimits {
    /// Builds limits from raw seconds, clamped to the shared ranges.
    /// The `max`/`min` order also maps a NaN parse to the floor.
    pub fn from_secs(idle: f32, window: Option<f32>) -> Self {
        let idle = idle
            .max(*IDLE_SECS_RANGE.start())
            .min(*IDLE_SECS_RANGE.end());
        Self {
            idle_timeout: Duration::from_secs_f32(idle),
            window: window.map(|secs| {
                let secs = secs
                    .max(*WINDOW_SECS_RANGE.start())
                    .min(*WINDOW_SECS_RANGE.end());
                Duration::from_secs_f32(secs)
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Outcome {
    Scored { cps: f64, clicks: u32 },
    /// The run ended before any duration accumulated.
    TooShort { clicks: u32 },
}

#[derive(Debug, Default)]
pub struct SessionState {
    pub mode: Option<ClickMode>,
    pub clicks: u32,
    pub started: Option<Instant>,
    pub last_click: Option<Instant>,
    /// Most recent scored CPS per mode, indexed by `ClickMode::index`.
    pub last_cps: [f64; 4],
    /// Set by the watchdog when it closes a run.
    pub outcome: Option<Outcome>,
}

impl SessionState {
    /// Registers one click. Returns true when this click opened a new run
    /// (caller spawns the watchdog). Switching modes resets the counters
    /// first, so the click counts toward the new mode only.
    pub fn record_click(&mut self, mode: ClickMode, now: Instant) -> bool {
        if self.mode != Some(mode) {
            self.reset();
            self.mode = Some(mode);
        }
        let first = self.clicks == 0;
        if first {
            self.started = Some(now);
            self.outcome = None;
        }
        self.clicks += 1;
        self.last_click = Some(now);
        first
    }

    /// Instantaneous CPS against the wall clock, for the live readout.
    pub fn live_cps(&self, now: Instant) -> Option<f64> {
        let started = self.started?;
        cps(self.clicks, now - started)
    }

    /// Clears the current run. The scoreboard survives, matching the
    /// Reset button behavior.
    pub fn reset(&mut self) {
        self.mode = None;
        self.clicks = 0;
        self.started = None;
        self.last_click = None;
        self.outcome = None;
    }

    /// Closes the run: scores it, updates the scoreboard, and clears the
    /// counters so the next click on the same mode starts fresh.
    /// `window` is the fixed test duration when one expired; idle runs
    /// score over first-click..last-click.
    pub fn finalize(&mut self, window: Option<Duration>) {
        let outcome = match (self.mode, self.started, self.last_click) {
            (Some(mode), Some(started), Some(last)) => {
                let duration = window.unwrap_or(last - started);
                match cps(self.clicks, duration) {
                    Some(value) => {
                        self.last_cps[mode.index()] = value;
                        Outcome::Scored {
                            cps: value,
                            clicks: self.clicks,
                        }
                    }
                    None => Outcome::TooShort {
                        clicks: self.clicks,
                    },
                }
            }
            _ => Outcome::TooShort {
                clicks: self.clicks,
            },
        };
        if let Some(mode) = self.mode {
            match outcome {
                Outcome::Scored { cps, clicks } => {
                    log::info!("{}: {} clicks, {:.2} cps", mode.label(), clicks, cps);
                }
                Outcome::TooShort { clicks } => {
                    log::info!("{}: {} clicks, too short to score", mode.label(), clicks);
                }
            }
        }
        self.outcome = Some(outcome);
        self.clicks = 0;
        self.started = None;
        self.last_click = None;
    }
}

// -------------- Watchdog --------------
/// Background thread that ends a run on inactivity or window expiry,
/// then nudges the UI through `on_done`.
pub struct Watchdog {
    running: Arc<AtomicBool>,
}

impl Watchdog {
    pub fn spawn<F>(state: Arc<Mutex<SessionState>>, limits: SessionLimits, on_done: F) -> Self
    where
        F: Fn() + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = Arc::clone(&running);

        thread::spawn(move || loop {
            if !running_clone.load(Ordering::Relaxed) {
                break;
            }
            thread::sleep(POLL_INTERVAL);

            let now = Instant::now();
            let mut st = state.lock();
            let (Some(started), Some(last)) = (st.started, st.last_click) else {
                // Run already closed elsewhere (Reset); nothing to watch.
                continue;
            };

            let window_done = limits.window.map_or(false, |w| now - started >= w);
            let idle = now - last > limits.idle_timeout;
            if window_done || idle {
                st.finalize(limits.window.filter(|_| window_done));
                running_clone.store(false, Ordering::Relaxed);
                drop(st);
                on_done();
                break;
            }
        });

        Self { running }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_cps_exact_division() {
        assert_eq!(cps(30, Duration::from_secs(3)), Some(10.0));
        assert_eq!(cps(15, Duration::from_secs(2)), Some(7.5));
        assert_eq!(cps(1, Duration::from_millis(500)), Some(2.0));
    }

    #[test]
    fn test_cps_never_divides_degenerate_runs() {
        assert_eq!(cps(0, Duration::from_secs(5)), None);
        assert_eq!(cps(10, Duration::ZERO), None);
    }

    #[test]
    fn test_mode_switch_resets_counter() {
        let mut state = SessionState::default();
        let now = Instant::now();
        state.record_click(ClickMode::Butterfly, now);
        state.record_click(ClickMode::Butterfly, now + Duration::from_millis(100));
        state.record_click(ClickMode::Butterfly, now + Duration::from_millis(200));
        assert_eq!(state.clicks, 3);

        let first = state.record_click(ClickMode::Jitter, now + Duration::from_millis(300));
        assert!(first);
        assert_eq!(state.mode, Some(ClickMode::Jitter));
        assert_eq!(state.clicks, 1);
    }

    #[test]
    fn test_first_click_opens_run() {
        let mut state = SessionState::default();
        let now = Instant::now();
        assert!(state.record_click(ClickMode::Normal, now));
        assert!(!state.record_click(ClickMode::Normal, now + Duration::from_millis(50)));
        assert_eq!(state.clicks, 2);
        assert_eq!(state.started, Some(now));
    }

    #[test]
    fn test_finalize_idle_scores_over_click_span() {
        let mut state = SessionState::default();
        let start = Instant::now();
        // 9 clicks spanning exactly 4 s scores 2.25.
        for i in 0..=8 {
            state.record_click(ClickMode::Drag, start + Duration::from_millis(i * 500));
        }
        state.finalize(None);

        assert_eq!(
            state.outcome,
            Some(Outcome::Scored {
                cps: 2.25,
                clicks: 9
            })
        );
        assert_eq!(state.last_cps[ClickMode::Drag.index()], 2.25);
        assert_eq!(state.clicks, 0);
        assert!(state.started.is_none());
    }

    #[test]
    fn test_finalize_window_scores_over_full_window() {
        let mut state = SessionState::default();
        let start = Instant::now();
        state.record_click(ClickMode::Butterfly, start);
        for i in 1..40 {
            state.record_click(ClickMode::Butterfly, start + Duration::from_millis(i * 50));
        }
        state.finalize(Some(Duration::from_secs(5)));

        assert_eq!(
            state.outcome,
            Some(Outcome::Scored {
                cps: 8.0,
                clicks: 40
            })
        );
        assert_eq!(state.last_cps[ClickMode::Butterfly.index()], 8.0);
    }

    #[test]
    fn test_finalize_single_click_leaves_scoreboard() {
        let mut state = SessionState::default();
        state.record_click(ClickMode::Jitter, Instant::now());
        state.finalize(None);

        assert_eq!(state.outcome, Some(Outcome::TooShort { clicks: 1 }));
        assert_eq!(state.last_cps[ClickMode::Jitter.index()], 0.0);
    }

    #[test]
    fn test_reset_keeps_scoreboard() {
        let mut state = SessionState::default();
        state.last_cps[ClickMode::Normal.index()] = 6.5;
        state.record_click(ClickMode::Normal, Instant::now());
        state.reset();

        assert_eq!(state.clicks, 0);
        assert!(state.mode.is_none());
        assert_eq!(state.last_cps[ClickMode::Normal.index()], 6.5);
    }

    #[test]
    fn test_watchdog_fires_on_inactivity() {
        let state = Arc::new(Mutex::new(SessionState::default()));
        {
            let mut st = state.lock();
            let start = Instant::now() - Duration::from_secs(2);
            st.record_click(ClickMode::Normal, start);
            st.record_click(ClickMode::Normal, start + Duration::from_secs(1));
        }
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);

        let limits = SessionLimits {
            idle_timeout: Duration::from_millis(50),
            window: None,
        };
        let dog = Watchdog::spawn(Arc::clone(&state), limits, move || {
            fired_clone.fetch_add(1, Ordering::Relaxed);
        });

        thread::sleep(Duration::from_millis(400));
        assert!(!dog.is_running());
        assert_eq!(fired.load(Ordering::Relaxed), 1);
        let st = state.lock();
        assert!(matches!(st.outcome, Some(Outcome::Scored { clicks: 2, .. })));
    }

    #[test]
    fn test_watchdog_window_expiry_fires() {
        let state = Arc::new(Mutex::new(SessionState::default()));
        {
            let mut st = state.lock();
            let start = Instant::now() - Duration::from_millis(600);
            st.record_click(ClickMode::Butterfly, start);
            st.record_click(ClickMode::Butterfly, Instant::now());
        }
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);

        // Last click is fresh, so only the expired window can end the run.
        let limits = SessionLimits {
            idle_timeout: Duration::from_secs(60),
            window: Some(Duration::from_millis(500)),
        };
        let dog = Watchdog::spawn(Arc::clone(&state), limits, move || {
            fired_clone.fetch_add(1, Ordering::Relaxed);
        });

        thread::sleep(Duration::from_millis(400));
        assert!(!dog.is_running());
        assert_eq!(fired.load(Ordering::Relaxed), 1);
        // Scores over the full window: 2 clicks / 0.5 s.
        assert_eq!(
            state.lock().outcome,
            Some(Outcome::Scored {
                cps: 4.0,
                clicks: 2
            })
        );
    }

    #[test]
    fn test_watchdog_idle_ends_window_run_over_click_span() {
        let state = Arc::new(Mutex::new(SessionState::default()));
        {
            let mut st = state.lock();
            let start = Instant::now() - Duration::from_secs(2);
            st.record_click(ClickMode::Jitter, start);
            st.record_click(ClickMode::Jitter, start + Duration::from_millis(500));
        }
        let limits = SessionLimits {
            idle_timeout: Duration::from_millis(50),
            window: Some(Duration::from_secs(5)),
        };
        let dog = Watchdog::spawn(Arc::clone(&state), limits, || {});

        thread::sleep(Duration::from_millis(400));
        assert!(!dog.is_running());
        // Idle ended the run before the window elapsed; the score covers
        // the click span, not the unexpired window: 2 clicks / 0.5 s.
        assert_eq!(
            state.lock().outcome,
            Some(Outcome::Scored {
                cps: 4.0,
                clicks: 2
            })
        );
    }

    #[test]
    fn test_limits_from_secs_shared_clamp() {
        let limits = SessionLimits::from_secs(0.05, Some(0.2));
        assert_eq!(limits.idle_timeout, Duration::from_secs_f32(0.5));
        assert_eq!(limits.window, Some(Duration::from_secs(1)));

        let limits = SessionLimits::from_secs(99.0, Some(600.0));
        assert_eq!(limits.idle_timeout, Duration::from_secs(10));
        assert_eq!(limits.window, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_watchdog_stop() {
        let state = Arc::new(Mutex::new(SessionState::default()));
        state.lock().record_click(ClickMode::Drag, Instant::now());

        let limits = SessionLimits {
            idle_timeout: Duration::from_secs(60),
            window: None,
        };
        let dog = Watchdog::spawn(Arc::clone(&state), limits, || {});
        assert!(dog.is_running());

        dog.stop();
        assert!(!dog.is_running());
        // The run is left open; no outcome was written.
        thread::sleep(Duration::from_millis(150));
        assert!(state.lock().outcome.is_none());
    }
}
