//! Loader Widget: Procedural "waiting" animation shown before content.
//!
//! A row of cells that each start as a filler dot, then cycle through random
//! glyphs. Cells with a final value (the optional label) settle on it once
//! their lifetime runs out. A trailing ellipsis spins on its own cadence.
//!
//! The loader is a pure state machine: every transition takes the current
//! [`Instant`], and randomness comes from an injected [`Rng`], so tests can
//! drive it without sleeping.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};

/// Glyphs a cycling cell picks from.
pub const GLYPHS: &[char] = &[
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'A', 'B', 'C',
    'D', 'E', 'F', '~', '!', '@', '#', '$', '%', '^', '&', '*', '(', ')', '+', '=', '_',
];

/// Glyph shown by a cell that has not started yet.
pub const FILLER: char = '.';

const ELLIPSIS_FRAMES: [&str; 4] = ["", ".", "..", "..."];

/// Configuration for the loader animation.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Number of cycling cells.
    pub cell_count: usize,
    /// Interval between glyph updates.
    pub step_interval: Duration,
    /// Interval between ellipsis frames.
    pub ellipsis_interval: Duration,
    /// The animation starts as if this much time had already passed, so
    /// the first frame is fully formed.
    pub initial_boost: Duration,
    /// Delay before the first fragment is fetched.
    pub warmup: Duration,
    /// Minimum time on screen once displayed, even if stopped earlier.
    pub min_visible: Duration,
    /// A cell's start delay is `delay_unit * k` for `k` in `0..delay_steps`.
    pub delay_steps: u32,
    /// Unit of the per-cell start delay.
    pub delay_unit: Duration,
    /// Optional text revealed after the cycling cells.
    pub label: Option<String>,
    /// How long label cells cycle before settling.
    pub label_settle: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            cell_count: 30,
            step_interval: Duration::from_secs(1) / 22,
            ellipsis_interval: Duration::from_millis(220),
            initial_boost: Duration::from_millis(200),
            warmup: Duration::from_millis(50),
            min_visible: Duration::from_millis(350),
            delay_steps: 3,
            delay_unit: Duration::from_millis(40),
            label: None,
            label_settle: Duration::from_millis(400),
        }
    }
}

/// Animation phase of a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderPhase {
    /// Waiting for its start delay; shows the filler glyph.
    Initial,
    /// Shows a random glyph on every step.
    Cycling,
    /// Shows its final value for good.
    Settled,
}

/// One animated cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderChar {
    /// Value to settle on. Cells without one cycle until torn down.
    pub final_value: Option<char>,
    /// What the cell currently shows.
    pub current_value: Option<char>,
    /// Time before the cell starts cycling.
    pub initial_delay: Duration,
    /// Time spent cycling before settling.
    pub lifetime: Option<Duration>,
}

impl LoaderChar {
    /// Phase of the cell `elapsed` after the animation start.
    ///
    /// Only cells with both a final value and a lifetime ever settle.
    pub fn phase(&self, elapsed: Duration) -> LoaderPhase {
        if elapsed < self.initial_delay {
            return LoaderPhase::Initial;
        }
        match (self.final_value, self.lifetime) {
            (Some(_), Some(lifetime)) if elapsed > self.initial_delay + lifetime => {
                LoaderPhase::Settled
            }
            _ => LoaderPhase::Cycling,
        }
    }
}

/// The loader state machine.
#[derive(Debug)]
pub struct Loader<R = StdRng> {
    config: LoaderConfig,
    chars: Vec<LoaderChar>,
    /// When the loader was first displayed.
    display_start: Instant,
    active: bool,
    stop_requested: bool,
    ellipsis_idx: usize,
    /// Widest view produced so far, in chars.
    last_width: usize,
    rng: R,
}

impl Loader<StdRng> {
    /// Create an active loader with the default configuration.
    pub fn new(now: Instant) -> Self {
        Self::with_config(LoaderConfig::default(), now)
    }

    /// Create an active loader seeded from OS entropy.
    pub fn with_config(config: LoaderConfig, now: Instant) -> Self {
        Self::with_rng(config, now, StdRng::from_entropy())
    }
}

impl<R: Rng> Loader<R> {
    /// Create an active loader drawing randomness from `rng`.
    ///
    /// The first frame is computed immediately.
    pub fn with_rng(config: LoaderConfig, now: Instant, mut rng: R) -> Self {
        let steps = config.delay_steps.max(1);
        let delay = |rng: &mut R| config.delay_unit * rng.gen_range(0..steps);

        let mut chars: Vec<LoaderChar> = (0..config.cell_count)
            .map(|_| LoaderChar {
                final_value: None,
                current_value: None,
                initial_delay: delay(&mut rng),
                lifetime: None,
            })
            .collect();

        if let Some(label) = &config.label {
            for c in std::iter::once(' ').chain(label.chars()) {
                let initial_delay = delay(&mut rng);
                chars.push(LoaderChar {
                    final_value: Some(c),
                    current_value: None,
                    initial_delay,
                    lifetime: Some(config.label_settle),
                });
            }
        }

        let mut loader = Self {
            config,
            chars,
            display_start: now,
            active: true,
            stop_requested: false,
            ellipsis_idx: 0,
            last_width: 0,
            rng,
        };
        loader.update(now);
        loader
    }

    /// The loader's configuration.
    pub const fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// The animated cells.
    pub fn chars(&self) -> &[LoaderChar] {
        &self.chars
    }

    /// Whether the loader is still on screen.
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Ask the loader to wind down. Idempotent.
    ///
    /// It stays active until `min_visible` has passed since it was first
    /// displayed; the next [`update`](Self::update) after that deactivates it.
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    /// Whether a stop has been requested.
    pub const fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    /// Advance every cell to its state at `now`.
    pub fn update(&mut self, now: Instant) {
        if !self.active {
            return;
        }

        let shown_for = now.saturating_duration_since(self.display_start);
        let elapsed = shown_for + self.config.initial_boost;
        for cell in &mut self.chars {
            cell.current_value = match cell.phase(elapsed) {
                LoaderPhase::Initial => Some(FILLER),
                LoaderPhase::Cycling => Some(GLYPHS[self.rng.gen_range(0..GLYPHS.len())]),
                LoaderPhase::Settled => cell.final_value,
            };
        }

        if self.stop_requested && shown_for >= self.config.min_visible {
            tracing::debug!(?shown_for, "loader deactivated");
            self.active = false;
        }
    }

    /// Step the trailing ellipsis.
    pub fn advance_ellipsis(&mut self) {
        if !self.active {
            return;
        }
        self.ellipsis_idx = (self.ellipsis_idx + 1) % ELLIPSIS_FRAMES.len();
    }

    /// Render the loader as a single line.
    ///
    /// When the line is narrower than a previous one it is padded with
    /// spaces so stale glyphs get overwritten.
    pub fn view(&mut self) -> String {
        let glyphs: String = self.chars.iter().filter_map(|c| c.current_value).collect();
        let glyphs = glyphs.trim();

        let mut text = if glyphs.is_empty() {
            FILLER.to_string().repeat(self.config.cell_count / 2)
        } else {
            glyphs.to_string()
        };
        text.push(' ');
        text.push_str(ELLIPSIS_FRAMES[self.ellipsis_idx]);

        let width = text.chars().count();
        if width < self.last_width {
            text.extend(std::iter::repeat(' ').take(self.last_width - width));
        } else {
            self.last_width = width;
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(config: LoaderConfig, now: Instant) -> Loader {
        Loader::with_rng(config, now, StdRng::seed_from_u64(7))
    }

    #[test]
    fn test_first_frame_is_fully_formed() {
        let now = Instant::now();
        let mut loader = seeded(LoaderConfig::default(), now);

        // Boost exceeds the longest start delay, so every cell cycles
        assert!(loader
            .chars()
            .iter()
            .all(|c| c.phase(Duration::from_millis(200)) == LoaderPhase::Cycling));
        let view = loader.view();
        let glyphs = view.trim_end();
        assert_eq!(glyphs.chars().count(), 30);
        assert!(glyphs.chars().all(|c| GLYPHS.contains(&c)));
        assert!(view.ends_with(' '));
    }

    #[test]
    fn test_start_delays_use_configured_steps() {
        let loader = seeded(LoaderConfig::default(), Instant::now());
        let allowed = [0, 40, 80].map(Duration::from_millis);
        assert!(loader.chars().iter().all(|c| allowed.contains(&c.initial_delay)));
        assert!(loader.chars().iter().all(|c| c.final_value.is_none()));
    }

    #[test]
    fn test_delayed_cells_start_as_filler() {
        let config = LoaderConfig {
            initial_boost: Duration::ZERO,
            delay_unit: Duration::from_secs(10),
            delay_steps: 2,
            ..LoaderConfig::default()
        };
        let loader = seeded(config, Instant::now());
        for cell in loader.chars() {
            if cell.initial_delay.is_zero() {
                assert!(GLYPHS.contains(&cell.current_value.unwrap()));
            } else {
                assert_eq!(cell.current_value, Some(FILLER));
            }
        }

        let cell = LoaderChar {
            final_value: None,
            current_value: None,
            initial_delay: Duration::from_millis(80),
            lifetime: None,
        };
        assert_eq!(cell.phase(Duration::from_millis(10)), LoaderPhase::Initial);
        assert_eq!(cell.phase(Duration::from_secs(60)), LoaderPhase::Cycling);
    }

    #[test]
    fn test_settling_requires_final_value_and_lifetime() {
        let mut cell = LoaderChar {
            final_value: Some('x'),
            current_value: None,
            initial_delay: Duration::ZERO,
            lifetime: Some(Duration::from_millis(100)),
        };
        assert_eq!(cell.phase(Duration::from_millis(50)), LoaderPhase::Cycling);
        assert_eq!(cell.phase(Duration::from_millis(150)), LoaderPhase::Settled);

        cell.lifetime = None;
        assert_eq!(cell.phase(Duration::from_secs(60)), LoaderPhase::Cycling);
    }

    #[test]
    fn test_label_settles() {
        let now = Instant::now();
        let config = LoaderConfig {
            cell_count: 0,
            label: Some("Thinking".into()),
            ..LoaderConfig::default()
        };
        let mut loader = seeded(config, now);
        loader.update(now + Duration::from_secs(2));
        assert_eq!(loader.view(), "Thinking ");
    }

    #[test]
    fn test_stop_waits_for_min_visibility() {
        let t0 = Instant::now();
        let mut loader = seeded(LoaderConfig::default(), t0);

        loader.request_stop();
        loader.update(t0 + Duration::from_millis(100));
        assert!(loader.is_active());

        loader.update(t0 + Duration::from_millis(349));
        assert!(loader.is_active());

        loader.update(t0 + Duration::from_millis(350));
        assert!(!loader.is_active());
    }

    #[test]
    fn test_stop_after_min_visibility_deactivates_on_next_update() {
        let t0 = Instant::now();
        let mut loader = seeded(LoaderConfig::default(), t0);
        loader.update(t0 + Duration::from_secs(1));
        assert!(loader.is_active());

        loader.request_stop();
        assert!(loader.is_active());
        loader.update(t0 + Duration::from_secs(1));
        assert!(!loader.is_active());
    }

    #[test]
    fn test_request_stop_is_idempotent() {
        let t0 = Instant::now();
        let mut loader = seeded(LoaderConfig::default(), t0);
        loader.request_stop();
        loader.request_stop();
        assert!(loader.stop_requested());

        loader.update(t0 + Duration::from_millis(400));
        assert!(!loader.is_active());
        loader.request_stop();
        loader.update(t0 + Duration::from_millis(800));
        assert!(!loader.is_active());
    }

    #[test]
    fn test_inactive_loader_is_frozen() {
        let t0 = Instant::now();
        let mut loader = seeded(LoaderConfig::default(), t0);
        loader.request_stop();
        loader.update(t0 + Duration::from_millis(400));

        let before = loader.view();
        loader.update(t0 + Duration::from_millis(500));
        loader.advance_ellipsis();
        assert_eq!(loader.view(), before);
    }

    #[test]
    fn test_view_pads_when_ellipsis_shrinks() {
        let t0 = Instant::now();
        let mut loader = seeded(LoaderConfig::default(), t0);
        let base = loader.view().chars().count();

        for _ in 0..3 {
            loader.advance_ellipsis();
        }
        let widest = loader.view();
        assert!(widest.ends_with(" ..."));
        assert_eq!(widest.chars().count(), base + 3);

        // Wraps back to the empty frame
        loader.advance_ellipsis();
        let shrunk = loader.view();
        assert_eq!(shrunk.chars().count(), base + 3);
        assert!(shrunk.ends_with("    "));
    }

    #[test]
    fn test_empty_glyphs_fall_back_to_dots() {
        let mut loader = seeded(LoaderConfig::default(), Instant::now());
        for cell in &mut loader.chars {
            cell.current_value = None;
        }
        assert_eq!(loader.view(), "............... ");
    }
}
