//! Session events and status

mod events;
mod status;
#[cfg(test)]
mod tests;

pub use events::{EventBus, EventFilter, SessionEvent};
pub use status::{SessionStatus, StatusWatch};
