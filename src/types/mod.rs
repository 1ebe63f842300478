//! Core types

mod command;
mod config;


pub use command::{ClientId, ClockOffset, Command, CommandId, CommandType, SessionPhase};
pub use config::{SyncConfig, SyncConfigBuilder};
