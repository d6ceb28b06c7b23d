//! # Reporting Constants
//!
//! Fixed values shared across the handpay reporting core.

use std::time::Duration;

/// Level identifiers reported alongside a handpay
pub mod levels {
    /// Non-progressive top award (game win or bonus)
    pub const NON_PROGRESSIVE_TOP_AWARD: u8 = 0x40;
    /// Cancelled credits handpay
    pub const CANCELLED_CREDIT: u8 = 0x80;
}

/// Defaults used when no configuration overrides them
pub mod defaults {
    use super::Duration;

    pub const QUEUE_CAPACITY: usize = 5;
    pub const EXCEPTION_INTERVAL: Duration = Duration::from_secs(15);
    pub const MIN_EXCEPTION_INTERVAL: Duration = Duration::from_millis(100);
}

/// Environment variables read by logging and configuration
pub mod env {
    pub const ENVIRONMENT: &str = "HANDPAY_ENV";
    pub const LOG_FORMAT: &str = "HANDPAY_LOG_FORMAT";
    pub const CONFIG_DIR: &str = "HANDPAY_CONFIG_DIR";
    pub const OVERRIDE_PREFIX: &str = "HANDPAY";
}
