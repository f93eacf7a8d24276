//! Core types for the acoustic pipeline.
//!
//! - [`AudioFrame`] is one 512-sample PCM capture unit with its timestamp,
//!   frame number and capture flags
//! - [`FrameFlags`] and [`StatusFlags`] are the capture mask and the packet
//!   status byte derived from it
//! - [`UpdateRate`] controls how often dashboard subscribers see new records
//!
//! ## Usage Example
//!
//! ```rust
//! use acoustic_node::types::{AudioFrame, FrameFlags, FRAME_SIZE};
//!
//! let frame = AudioFrame::new([0i16; FRAME_SIZE], 1_000, 7, FrameFlags::empty())
//!     .with_flags(FrameFlags::new(FrameFlags::CLIPPING));
//!
//! assert_eq!(frame.samples().len(), 512);
//! assert!(frame.flags.has_flag(FrameFlags::CLIPPING));
//! ```

mod flags;
mod frame;
mod update_rate;

pub use flags::{FrameFlags, StatusFlags, seq_after_u16};
pub use frame::{AudioFrame, DEFAULT_FRAMES_PER_PACKET, FRAME_SIZE, SAMPLE_RATE, frame_period};
pub use update_rate::UpdateRate;
