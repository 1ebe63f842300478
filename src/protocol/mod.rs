//! Protocol module

pub mod wire;

pub use wire::{ClientMessage, ServerMessage, decode, encode};
