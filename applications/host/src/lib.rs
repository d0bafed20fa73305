//! Mellow host application
//!
//! Entry-point plumbing for the native media bridge: starts the application
//! context (registering the media plugin before the host bridge finishes
//! initializing) and replays scripted web-layer traffic against it.

pub mod script;

pub use script::{parse_script, run_script, LifecycleStep, ScriptError, ScriptReport, ScriptStep};
