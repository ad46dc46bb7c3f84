use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} interval must be at least 1 ms")]
    ZeroInterval { name: &'static str },

    #[error("soft drop interval ({soft_drop_ms} ms) must be shorter than gravity ({gravity_ms} ms)")]
    SoftDropNotFaster { gravity_ms: u64, soft_drop_ms: u64 },

    #[error("session length must be at least one second")]
    ZeroSession,

    #[error("auto-repeat period must be at least one frame")]
    ZeroRepeatPeriod,

    #[error("play region {left}..{right} x {top}..{bottom} contains no point")]
    EmptyPlayRegion {
        left: i32,
        top: i32,
        right: i32,
        bottom: i32,
    },
}
