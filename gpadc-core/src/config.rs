//! Timing and clocking knobs for one device instance.

use embassy_time::Duration;

/// Bound on the completion wait; must exceed the periodic sample interval (~0.6 s).
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(1_000);

/// Idle time after the last resume hold is released before the block is suspended.
pub const DEFAULT_AUTOSUSPEND_DELAY: Duration = Duration::from_millis(500);

/// Settle time after the voltage multiplexer switches channel.
pub const DEFAULT_CHANNEL_SETTLE: Duration = Duration::from_millis(10);

/// Settle time after switching between ADC and touchscreen mode.
pub const DEFAULT_MODE_SETTLE: Duration = Duration::from_millis(100);

/// Module clock rate programmed at attach.
pub const DEFAULT_MODULE_CLOCK_HZ: u32 = 4_000_000;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct GpadcConfig {
    read_timeout: Duration,
    autosuspend_delay: Duration,
    channel_settle: Duration,
    mode_settle: Duration,
    module_clock_hz: u32,
}

impl GpadcConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            autosuspend_delay: DEFAULT_AUTOSUSPEND_DELAY,
            channel_settle: DEFAULT_CHANNEL_SETTLE,
            mode_settle: DEFAULT_MODE_SETTLE,
            module_clock_hz: DEFAULT_MODULE_CLOCK_HZ,
        }
    }

    #[must_use]
    pub const fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_autosuspend_delay(mut self, delay: Duration) -> Self {
        self.autosuspend_delay = delay;
        self
    }

    /// Overrides both settle delays; hosts without analog front ends use zero.
    #[must_use]
    pub const fn with_settle(mut self, channel: Duration, mode: Duration) -> Self {
        self.channel_settle = channel;
        self.mode_settle = mode;
        self
    }

    #[must_use]
    pub const fn with_module_clock_hz(mut self, hz: u32) -> Self {
        self.module_clock_hz = hz;
        self
    }

    #[must_use]
    pub const fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    #[must_use]
    pub const fn autosuspend_delay(&self) -> Duration {
        self.autosuspend_delay
    }

    #[must_use]
    pub const fn channel_settle(&self) -> Duration {
        self.channel_settle
    }

    #[must_use]
    pub const fn mode_settle(&self) -> Duration {
        self.mode_settle
    }

    #[must_use]
    pub const fn module_clock_hz(&self) -> u32 {
        self.module_clock_hz
    }
}

impl Default for GpadcConfig {
    fn default() -> Self {
        Self::new()
    }
}
