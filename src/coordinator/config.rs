use std::time::Duration;

/// Configuration for the coordinator hub
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// How far ahead a play is scheduled (default: 300ms)
    pub play_lead: Duration,

    /// How far ahead a seek is scheduled (default: 100ms)
    pub seek_lead: Duration,

    /// How far ahead a pause is scheduled (default: 0)
    pub pause_lead: Duration,

    /// Delay between a client's first `client_ready` and its initial seek (default: 1 second)
    pub initial_sync_delay: Duration,

    /// How long issued command ids are remembered for loop prevention (default: 5 seconds)
    pub command_retention: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            play_lead: Duration::from_millis(300),
            seek_lead: Duration::from_millis(100),
            pause_lead: Duration::ZERO,
            initial_sync_delay: Duration::from_secs(1),
            command_retention: Duration::from_secs(5),
        }
    }
}

impl CoordinatorConfig {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> CoordinatorConfigBuilder {
        CoordinatorConfigBuilder::default()
    }
}

/// Builder for `CoordinatorConfig`
#[derive(Debug, Clone, Default)]
pub struct CoordinatorConfigBuilder {
    config: CoordinatorConfig,
}

impl CoordinatorConfigBuilder {
    /// Set the scheduling lead for each command type
    #[must_use]
    pub fn leads(mut self, play: Duration, pause: Duration, seek: Duration) -> Self {
        self.config.play_lead = play;
        self.config.pause_lead = pause;
        self.config.seek_lead = seek;
        self
    }

    /// Set the initial sync delay
    #[must_use]
    pub fn initial_sync_delay(mut self, delay: Duration) -> Self {
        self.config.initial_sync_delay = delay;
        self
    }

    /// Set issued command id retention
    #[must_use]
    pub fn command_retention(mut self, retention: Duration) -> Self {
        self.config.command_retention = retention;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> CoordinatorConfig {
        self.config
    }
}
