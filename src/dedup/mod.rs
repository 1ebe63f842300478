//! Command replay protection.
//!
//! Applied command ids are remembered for a fixed retention window and then
//! evicted, so replayed or retried duplicates are ignored while a legitimately
//! reissued command later on still goes through.

use std::collections::HashMap;
use std::time::Duration;

use crate::types::{CommandId, CommandType};

#[cfg(test)]
mod tests;

/// Time-bounded set of recently applied command ids.
#[derive(Debug, Clone)]
pub struct CommandDeduplicator {
    /// Id -> local expiry time (milliseconds)
    expires_at: HashMap<CommandId, f64>,
    /// Retention window in milliseconds
    retention_ms: f64,
    /// Duplicates rejected so far
    duplicates: u64,
}

impl CommandDeduplicator {
    /// Default retention window.
    pub const DEFAULT_RETENTION: Duration = Duration::from_secs(5);

    /// Create a deduplicator with the given retention window.
    #[must_use]
    pub fn new(retention: Duration) -> Self {
        Self {
            expires_at: HashMap::new(),
            retention_ms: retention.as_secs_f64() * 1000.0,
            duplicates: 0,
        }
    }

    /// Whether `id` has not been applied within the retention window.
    pub fn should_apply(&mut self, id: &CommandId, now_ms: f64) -> bool {
        self.evict_expired(now_ms);
        if self.expires_at.contains_key(id) {
            self.duplicates += 1;
            false
        } else {
            true
        }
    }

    /// Record `id` as applied; it is retained until `now + retention`.
    pub fn remember(&mut self, id: CommandId, now_ms: f64) {
        self.evict_expired(now_ms);
        self.expires_at.insert(id, now_ms + self.retention_ms);
    }

    /// Check-and-remember in one step. Returns `true` if the id was fresh.
    pub fn admit(&mut self, id: &CommandId, now_ms: f64) -> bool {
        if self.should_apply(id, now_ms) {
            self.remember(id.clone(), now_ms);
            true
        } else {
            false
        }
    }

    /// Drop ids whose retention has elapsed.
    pub fn evict_expired(&mut self, now_ms: f64) {
        self.expires_at.retain(|_, expiry| *expiry > now_ms);
    }

    /// Number of ids currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.expires_at.len()
    }

    /// Whether nothing is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expires_at.is_empty()
    }

    /// Duplicates rejected so far.
    #[must_use]
    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.expires_at.clear();
    }
}

impl Default for CommandDeduplicator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RETENTION)
    }
}

/// One deduplicator per command type, so command classes never collide.
#[derive(Debug, Clone)]
pub struct CommandLedger {
    play: CommandDeduplicator,
    pause: CommandDeduplicator,
    seek: CommandDeduplicator,
}

impl CommandLedger {
    /// Create a ledger with the given retention window.
    #[must_use]
    pub fn new(retention: Duration) -> Self {
        Self {
            play: CommandDeduplicator::new(retention),
            pause: CommandDeduplicator::new(retention),
            seek: CommandDeduplicator::new(retention),
        }
    }

    /// Deduplicator for one command type.
    pub fn for_type(&mut self, kind: CommandType) -> &mut CommandDeduplicator {
        match kind {
            CommandType::Play => &mut self.play,
            CommandType::Pause => &mut self.pause,
            CommandType::Seek => &mut self.seek,
        }
    }

    /// Check-and-remember `id` for `kind`.
    pub fn admit(&mut self, kind: CommandType, id: &CommandId, now_ms: f64) -> bool {
        self.for_type(kind).admit(id, now_ms)
    }

    /// Total duplicates rejected across all types.
    #[must_use]
    pub fn duplicates(&self) -> u64 {
        self.play.duplicates() + self.pause.duplicates() + self.seek.duplicates()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.play.clear();
        self.pause.clear();
        self.seek.clear();
    }
}

impl Default for CommandLedger {
    fn default() -> Self {
        Self::new(CommandDeduplicator::DEFAULT_RETENTION)
    }
}
