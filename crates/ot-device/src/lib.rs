//! Device readout intake.
//!
//! This crate contains the collaborator contract between timing
//! hardware and the computation pipeline:
//! - [`ReadoutSource`]: anything that supplies raw card readouts
//! - [`DeviceWorker`]: one blocking poll thread per device, feeding a
//!   single-consumer channel
//! - [`JsonlSource`]: a JSON-lines log source for replay and testing

pub mod source;
pub mod worker;

pub use source::{JsonlSource, ReadoutSource, SourceError};
pub use worker::DeviceWorker;
