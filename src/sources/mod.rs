//! Frame source implementations

pub mod synthetic;

pub use synthetic::{SyntheticConfig, SyntheticSource, Tone};
