//! # Configuration
//!
//! Process-level settings for the controller, loaded from the environment.

mod controller;

pub use controller::ControllerConfig;
