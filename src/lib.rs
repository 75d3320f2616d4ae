//! # PCB strip readout tools
//!
//! Ideal wire geometry and waveform frame utilities for the PCB strip readout
//! test stand:
//!  - [wires]: ideal strip geometry of the 3 readout planes
//!  - [frames]: waveform frames archived in numpy `.npz` files
//!  - [plot] and [report]: frame intensity images assembled into paginated documents
//!  - [activity]: selection of the frames with signal in the collection channels

pub mod activity;
mod config;
mod error;
pub mod frames;
pub mod plot;
pub mod report;
pub mod wires;

pub use config::Config;
pub use error::{Error, Result};
pub use frames::{Frame, FrameStore, MemoryStore, NpzStore, FRAME_PREFIX};
