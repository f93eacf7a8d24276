//! Bitmask types for capture errors and packet status

use serde::{Deserialize, Serialize};

/// Capture error/status bits reported by the acquisition hardware per frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameFlags(pub u8);

impl FrameFlags {
    /// DMA transfer error.
    pub const DMA_ERROR: u8 = 0x01;
    /// Capture buffer overflow.
    pub const OVERFLOW: u8 = 0x02;
    /// ADC clipping detected.
    pub const CLIPPING: u8 = 0x04;

    /// No flags set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Create flags from a raw mask.
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Check if a specific bit is set.
    pub fn is_set(&self, bit: u8) -> bool {
        bit < 8 && (self.0 & (1 << bit)) != 0
    }

    /// Check if any bit of `flag` is set.
    pub fn has_flag(&self, flag: u8) -> bool {
        (self.0 & flag) != 0
    }

    /// True when no bit is set.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Get the raw mask.
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Merge another mask into this one.
    pub fn insert(&mut self, other: FrameFlags) {
        self.0 |= other.0;
    }
}

impl std::ops::BitOr for FrameFlags {
    type Output = FrameFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        FrameFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for FrameFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.insert(rhs);
    }
}

/// Status byte carried in the telemetry packet.
///
/// The byte holds the raw capture bits of [`FrameFlags`], OR-ed over the
/// window: 0x01 DMA error, 0x02 overflow, 0x04 clipping. Receivers that
/// expect clipping on bit 1 will read a capture overflow there instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusFlags(pub u8);

impl StatusFlags {
    /// Status byte is the low byte of the window's accumulated capture mask.
    pub fn from_window_mask(mask: FrameFlags) -> Self {
        Self(mask.value())
    }

    /// The capture bits this byte was built from
    pub fn capture_flags(&self) -> FrameFlags {
        FrameFlags::new(self.0)
    }

    /// A DMA error occurred during the window.
    pub fn has_error(&self) -> bool {
        self.capture_flags().has_flag(FrameFlags::DMA_ERROR)
    }

    /// A frame in the window was dropped for overflow.
    pub fn has_overflow(&self) -> bool {
        self.capture_flags().has_flag(FrameFlags::OVERFLOW)
    }

    /// ADC clipping was detected during the window.
    pub fn has_clipping(&self) -> bool {
        self.capture_flags().has_flag(FrameFlags::CLIPPING)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

/// Compare 16-bit sequence numbers with wraparound using the half-range rule.
/// Returns true if `a` is considered newer than `b`.
pub fn seq_after_u16(a: u16, b: u16) -> bool {
    if a == b {
        return false;
    }
    a.wrapping_sub(b) < 0x8000
}
