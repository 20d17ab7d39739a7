pub mod config;
pub mod error;
pub mod handoff;
pub mod io;
pub mod launcher;
pub mod paths;
pub mod poller;
pub mod probe;
pub mod provisioner;
pub mod sequencer;

pub use error::{BootError, Result};
