//! Playtalk terminal front-end.
//!
//! Loads the agent configuration from the environment and drives a
//! [`playtalk_core::SessionHandle`] from standard input. The `playtalk`
//! binary wires this to the WebSocket connector and the audio devices.

pub mod audio;
pub mod config;
pub mod console;
