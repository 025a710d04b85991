//! CLI command implementations.

pub mod compact;
pub mod dump;
pub mod frames;
pub mod inspect;
pub mod verify;
