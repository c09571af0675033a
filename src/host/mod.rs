//! Headless frontend integration: JSON contract, router and stdio bridge.

pub mod channel;
pub mod contract;
pub mod platform;
pub mod stdio;

pub use channel::{HostCommandClient, HostCommandServer, HostRouter, command_channel};
pub use contract::{CommandEnvelope, CommandName, EventEnvelope, ResponseEnvelope};
pub use platform::BridgeSpeechPlatform;
pub use stdio::{run_bridge, run_stdio_bridge};
