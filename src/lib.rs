//! Train Track - a log monitor that reconstructs train routes and delay state.
//!
//! This library provides the tracking engine, the event parser, and the
//! resumable tailer behind the monitor binary.

pub mod dedup;
pub mod engine;
pub mod model;
pub mod parse;
pub mod tail;
pub mod types;
