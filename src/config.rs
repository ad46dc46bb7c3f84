use crate::error::ConfigError;

// Timing (in milliseconds)
pub const GRAVITY_MS: u64 = 500;
pub const SOFT_DROP_MS: u64 = 20;
pub const CLEAR_PHASE_MS: u64 = 120;
pub const COUNTDOWN_MS: u64 = 1000;
pub const FRAME_MS: u64 = 16;

pub const SESSION_SECS: u32 = 7 * 60;
pub const REPEAT_PERIOD: u32 = 7;
pub const POPUP_TICKS: u32 = 70;

/// Pointer hit-box for the start button, exclusive on every edge.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PlayRegion {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl PlayRegion {
    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.left < x && x < self.right && self.top < y && y < self.bottom
    }

    pub fn is_empty(&self) -> bool {
        self.right - self.left < 2 || self.bottom - self.top < 2
    }
}

impl Default for PlayRegion {
    fn default() -> Self {
        Self {
            left: 200,
            top: 160,
            right: 280,
            bottom: 240,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub gravity_ms: u64,
    pub soft_drop_ms: u64,
    pub clear_phase_ms: u64,
    pub countdown_ms: u64,
    pub frame_ms: u64,
    pub session_secs: u32,
    /// Frames between repeated moves while a side key is held.
    pub repeat_period: u32,
    /// Frames a score popup floats before it is banked.
    pub popup_ticks: u32,
    /// Fixed seed for the piece generator; entropy when `None`.
    pub seed: Option<u64>,
    pub play_region: PlayRegion,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gravity_ms: GRAVITY_MS,
            soft_drop_ms: SOFT_DROP_MS,
            clear_phase_ms: CLEAR_PHASE_MS,
            countdown_ms: COUNTDOWN_MS,
            frame_ms: FRAME_MS,
            session_secs: SESSION_SECS,
            repeat_period: REPEAT_PERIOD,
            popup_ticks: POPUP_TICKS,
            seed: None,
            play_region: PlayRegion::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let intervals = [
            ("gravity", self.gravity_ms),
            ("soft drop", self.soft_drop_ms),
            ("clear phase", self.clear_phase_ms),
            ("countdown", self.countdown_ms),
            ("frame", self.frame_ms),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, ms)| *ms == 0) {
            return Err(ConfigError::ZeroInterval { name: *name });
        }
        if self.soft_drop_ms >= self.gravity_ms {
            return Err(ConfigError::SoftDropNotFaster {
                gravity_ms: self.gravity_ms,
                soft_drop_ms: self.soft_drop_ms,
            });
        }
        if self.session_secs == 0 {
            return Err(ConfigError::ZeroSession);
        }
        if self.repeat_period == 0 {
            return Err(ConfigError::ZeroRepeatPeriod);
        }
        if self.play_region.is_empty() {
            let PlayRegion {
                left,
                top,
                right,
                bottom,
            } = self.play_region;
            return Err(ConfigError::EmptyPlayRegion {
                left,
                top,
                right,
                bottom,
            });
        }
        Ok(())
    }
}
