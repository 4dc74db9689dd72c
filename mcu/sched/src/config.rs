//! Scheduler configuration

/// Configuration for the scheduler and the main loop built on it.
#[derive(Debug, Clone, Copy)]
pub struct SchedConfig {
    /// Name used in log output
    pub name: &'static str,
    /// Heartbeat period in microseconds; the coarse clock counts these
    pub heartbeat_us: u32,
    /// Called by the main loop after every pass over the task handlers
    pub idle_callback: Option<fn()>,
}

impl SchedConfig {
    /// Default configuration: a 1 ms heartbeat and no idle callback
    pub const DEFAULT: Self = Self {
        name: "mcu",
        heartbeat_us: 1000,
        idle_callback: None,
    };

    /// Creates a new configuration builder.
    pub const fn builder() -> SchedConfigBuilder {
        SchedConfigBuilder {
            config: Self::DEFAULT,
        }
    }
}

impl Default for SchedConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Builder for scheduler configuration; usable in `const` context.
#[derive(Debug, Clone, Copy)]
pub struct SchedConfigBuilder {
    config: SchedConfig,
}

impl Default for SchedConfigBuilder {
    fn default() -> Self {
        SchedConfig::builder()
    }
}

impl SchedConfigBuilder {
    /// Sets the scheduler name.
    pub const fn name(mut self, name: &'static str) -> Self {
        self.config.name = name;
        self
    }

    /// Sets the heartbeat period in microseconds.
    pub const fn heartbeat_us(mut self, us: u32) -> Self {
        self.config.heartbeat_us = us;
        self
    }

    /// Sets the idle callback function.
    pub const fn idle_callback(mut self, callback: fn()) -> Self {
        self.config.idle_callback = Some(callback);
        self
    }

    /// Builds the configuration.
    pub const fn build(self) -> SchedConfig {
        self.config
    }
}
