//! Telemetry packet structure and byte-exact codec
//!
//! ## Packet Layout (64 bytes, little-endian)
//!
//! ```text
//! offset  size  field
//!      0     1  version
//!      1     1  reserved1
//!      2     2  seq_number
//!      4     4  timestamp_ms
//!      8     2  rms_raw (Q15)
//!     10     2  rms_reserved
//!     12     2  zcr_count
//!     14     2  zcr_rate (%)
//!     16     2  spl_db
//!     18     2  peak_amplitude
//!     20    32  fft_band[8] (u32 each)
//!     52     1  node_id
//!     53     1  status_flags
//!     54     2  error_count
//!     56     4  uptime_sec
//!     60     4  reserved3
//! ```
//!
//! Fields are written one by one at fixed offsets; the in-memory layout of
//! [`TelemetryRecord`] plays no part in the encoding.

use crate::features::{BAND_MAGNITUDE_MAX, Q15_MAX, SPL_MAX_DB};
use crate::{Result, SensorError};
use tracing::trace;

/// Size of an encoded packet.
pub const PACKET_SIZE: usize = 64;

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Number of spectral bands carried per packet.
pub const BAND_COUNT: usize = 8;

const OFFSET_VERSION: usize = 0;
const OFFSET_RESERVED1: usize = 1;
const OFFSET_SEQ: usize = 2;
const OFFSET_TIMESTAMP: usize = 4;
const OFFSET_RMS: usize = 8;
const OFFSET_RMS_RESERVED: usize = 10;
const OFFSET_ZCR_COUNT: usize = 12;
const OFFSET_ZCR_RATE: usize = 14;
const OFFSET_SPL: usize = 16;
const OFFSET_PEAK: usize = 18;
const OFFSET_BANDS: usize = 20;
const OFFSET_NODE_ID: usize = OFFSET_BANDS + BAND_COUNT * 4;
const OFFSET_STATUS: usize = 53;
const OFFSET_ERROR_COUNT: usize = 54;
const OFFSET_UPTIME: usize = 56;
const OFFSET_RESERVED3: usize = 60;

const _: () = assert!(OFFSET_NODE_ID == 52);
const _: () = assert!(OFFSET_RESERVED3 + 4 == PACKET_SIZE);

/// One telemetry packet: the feature summary of a single analysis window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TelemetryRecord {
    pub version: u8,
    pub reserved1: u8,
    pub seq_number: u16,
    pub timestamp_ms: u32,
    pub rms_raw: u16,
    pub rms_reserved: u16,
    pub zcr_count: u16,
    pub zcr_rate: u16,
    pub spl_db: u16,
    pub peak_amplitude: u16,
    pub fft_band: [u32; BAND_COUNT],
    pub node_id: u8,
    pub status_flags: u8,
    pub error_count: u16,
    pub uptime_sec: u32,
    pub reserved3: u32,
}

impl TelemetryRecord {
    /// Size of the encoded packet in bytes
    pub const SIZE: usize = PACKET_SIZE;

    /// Empty record carrying the current protocol version
    pub fn new() -> Self {
        Self { version: PROTOCOL_VERSION, ..Self::default() }
    }

    /// Encode into the fixed 64-byte wire layout.
    pub fn encode(&self) -> [u8; PACKET_SIZE] {
        let mut buf = [0u8; PACKET_SIZE];

        buf[OFFSET_VERSION] = self.version;
        buf[OFFSET_RESERVED1] = self.reserved1;
        put_u16_le(&mut buf, OFFSET_SEQ, self.seq_number);
        put_u32_le(&mut buf, OFFSET_TIMESTAMP, self.timestamp_ms);
        put_u16_le(&mut buf, OFFSET_RMS, self.rms_raw);
        put_u16_le(&mut buf, OFFSET_RMS_RESERVED, self.rms_reserved);
        put_u16_le(&mut buf, OFFSET_ZCR_COUNT, self.zcr_count);
        put_u16_le(&mut buf, OFFSET_ZCR_RATE, self.zcr_rate);
        put_u16_le(&mut buf, OFFSET_SPL, self.spl_db);
        put_u16_le(&mut buf, OFFSET_PEAK, self.peak_amplitude);
        for (i, band) in self.fft_band.iter().enumerate() {
            put_u32_le(&mut buf, OFFSET_BANDS + i * 4, *band);
        }
        buf[OFFSET_NODE_ID] = self.node_id;
        buf[OFFSET_STATUS] = self.status_flags;
        put_u16_le(&mut buf, OFFSET_ERROR_COUNT, self.error_count);
        put_u32_le(&mut buf, OFFSET_UPTIME, self.uptime_sec);
        put_u32_le(&mut buf, OFFSET_RESERVED3, self.reserved3);

        buf
    }

    /// Decode a datagram. The payload must be exactly 64 bytes.
    ///
    /// No range checks happen here; call [`TelemetryRecord::validate`] for
    /// those, so reserved and out-of-range values still round-trip.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() != PACKET_SIZE {
            return Err(SensorError::Parse {
                context: "Telemetry packet decoding".to_string(),
                details: format!("expected {} bytes, got {}", PACKET_SIZE, data.len()),
            });
        }

        let mut fft_band = [0u32; BAND_COUNT];
        for (i, band) in fft_band.iter_mut().enumerate() {
            *band = parse_u32_le(data, OFFSET_BANDS + i * 4)?;
        }

        let record = Self {
            version: data[OFFSET_VERSION],
            reserved1: data[OFFSET_RESERVED1],
            seq_number: parse_u16_le(data, OFFSET_SEQ)?,
            timestamp_ms: parse_u32_le(data, OFFSET_TIMESTAMP)?,
            rms_raw: parse_u16_le(data, OFFSET_RMS)?,
            rms_reserved: parse_u16_le(data, OFFSET_RMS_RESERVED)?,
            zcr_count: parse_u16_le(data, OFFSET_ZCR_COUNT)?,
            zcr_rate: parse_u16_le(data, OFFSET_ZCR_RATE)?,
            spl_db: parse_u16_le(data, OFFSET_SPL)?,
            peak_amplitude: parse_u16_le(data, OFFSET_PEAK)?,
            fft_band,
            node_id: data[OFFSET_NODE_ID],
            status_flags: data[OFFSET_STATUS],
            error_count: parse_u16_le(data, OFFSET_ERROR_COUNT)?,
            uptime_sec: parse_u32_le(data, OFFSET_UPTIME)?,
            reserved3: parse_u32_le(data, OFFSET_RESERVED3)?,
        };

        trace!(seq = record.seq_number, node = record.node_id, "Decoded telemetry packet");
        Ok(record)
    }

    /// Check the protocol version and the documented field ranges.
    pub fn validate(&self) -> Result<()> {
        if self.version != PROTOCOL_VERSION {
            return Err(SensorError::Protocol { expected: PROTOCOL_VERSION, found: self.version });
        }

        check_range("rms_raw", self.rms_raw.into(), Q15_MAX.into())?;
        check_range("zcr_rate", self.zcr_rate.into(), 100)?;
        check_range("spl_db", self.spl_db.into(), SPL_MAX_DB.into())?;
        check_range("peak_amplitude", self.peak_amplitude.into(), Q15_MAX.into())?;
        for band in self.fft_band {
            check_range("fft_band", band.into(), BAND_MAGNITUDE_MAX.into())?;
        }

        Ok(())
    }
}

fn check_range(field: &'static str, value: u64, max: u64) -> Result<()> {
    if value > max {
        return Err(SensorError::FieldRange { field, value, max });
    }
    Ok(())
}

fn put_u16_le(buf: &mut [u8; PACKET_SIZE], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32_le(buf: &mut [u8; PACKET_SIZE], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Safe byte parsing helpers with bounds checking
fn parse_u16_le(data: &[u8], offset: usize) -> Result<u16> {
    if offset + 2 > data.len() {
        return Err(SensorError::Parse {
            context: "Integer parsing".to_string(),
            details: format!(
                "Insufficient data for u16 at offset {} (need 2 bytes, have {})",
                offset,
                data.len().saturating_sub(offset)
            ),
        });
    }
    Ok(u16::from_le_bytes([data[offset], data[offset + 1]]))
}

fn parse_u32_le(data: &[u8], offset: usize) -> Result<u32> {
    if offset + 4 > data.len() {
        return Err(SensorError::Parse {
            context: "Integer parsing".to_string(),
            details: format!(
                "Insufficient data for u32 at offset {} (need 4 bytes, have {})",
                offset,
                data.len().saturating_sub(offset)
            ),
        });
    }
    Ok(u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    prop_compose! {
        fn arb_record()(
            header in (any::<u8>(), any::<u8>(), any::<u16>(), any::<u32>()),
            scalars in (any::<u16>(), any::<u16>(), any::<u16>(), any::<u16>(), any::<u16>(), any::<u16>()),
            fft_band in any::<[u32; BAND_COUNT]>(),
            trailer in (any::<u8>(), any::<u8>(), any::<u16>(), any::<u32>(), any::<u32>()),
        ) -> TelemetryRecord {
            TelemetryRecord {
                version: header.0,
                reserved1: header.1,
                seq_number: header.2,
                timestamp_ms: header.3,
                rms_raw: scalars.0,
                rms_reserved: scalars.1,
                zcr_count: scalars.2,
                zcr_rate: scalars.3,
                spl_db: scalars.4,
                peak_amplitude: scalars.5,
                fft_band,
                node_id: trailer.0,
                status_flags: trailer.1,
                error_count: trailer.2,
                uptime_sec: trailer.3,
                reserved3: trailer.4,
            }
        }
    }

    proptest! {
        #[test]
        fn encode_decode_preserves_every_field(record in arb_record()) {
            let bytes = record.encode();
            prop_assert_eq!(bytes.len(), PACKET_SIZE);
            let decoded = TelemetryRecord::decode(&bytes).unwrap();
            prop_assert_eq!(decoded, record);
            prop_assert_eq!(decoded.encode(), bytes);
        }

        #[test]
        fn decode_rejects_wrong_lengths(len in 0usize..200) {
            prop_assume!(len != PACKET_SIZE);
            let data = vec![0u8; len];
            let is_parse_error = matches!(TelemetryRecord::decode(&data), Err(SensorError::Parse { .. }));
            prop_assert!(is_parse_error);
        }
    }

    #[test]
    fn fields_land_at_documented_offsets() {
        let record = TelemetryRecord {
            version: 0x01,
            reserved1: 0xAA,
            seq_number: 0x0201,
            timestamp_ms: 0x0605_0403,
            rms_raw: 0x0807,
            rms_reserved: 0x0A09,
            zcr_count: 0x0C0B,
            zcr_rate: 0x0E0D,
            spl_db: 0x100F,
            peak_amplitude: 0x1211,
            fft_band: [0x1615_1413, 0, 0, 0, 0, 0, 0, 0x3433_3231],
            node_id: 0x35,
            status_flags: 0x36,
            error_count: 0x3837,
            uptime_sec: 0x3C3B_3A39,
            reserved3: 0x403F_3E3D,
        };

        let bytes = record.encode();
        assert_eq!(&bytes[0..4], &[0x01, 0xAA, 0x01, 0x02]);
        assert_eq!(&bytes[4..8], &[0x03, 0x04, 0x05, 0x06]);
        assert_eq!(&bytes[8..20], &[0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F, 0x10, 0x11, 0x12]);
        assert_eq!(&bytes[20..24], &[0x13, 0x14, 0x15, 0x16]);
        assert_eq!(&bytes[48..52], &[0x31, 0x32, 0x33, 0x34]);
        assert_eq!(&bytes[52..64], &[0x35, 0x36, 0x37, 0x38, 0x39, 0x3A, 0x3B, 0x3C, 0x3D, 0x3E, 0x3F, 0x40]);
    }

    #[test]
    fn validate_accepts_legal_record() {
        let record = TelemetryRecord {
            rms_raw: Q15_MAX,
            zcr_rate: 100,
            spl_db: 120,
            peak_amplitude: Q15_MAX,
            fft_band: [BAND_MAGNITUDE_MAX; BAND_COUNT],
            node_id: 3,
            ..TelemetryRecord::new()
        };
        record.validate().unwrap();
    }

    #[test]
    fn validate_rejects_version_and_ranges() {
        let wrong_version = TelemetryRecord { version: 9, ..TelemetryRecord::new() };
        assert!(matches!(
            wrong_version.validate(),
            Err(SensorError::Protocol { expected: 1, found: 9 })
        ));

        let loud = TelemetryRecord { spl_db: 121, ..TelemetryRecord::new() };
        assert!(matches!(loud.validate(), Err(SensorError::FieldRange { field: "spl_db", .. })));

        let mut bands = TelemetryRecord::new();
        bands.fft_band[3] = BAND_MAGNITUDE_MAX + 1;
        assert!(matches!(bands.validate(), Err(SensorError::FieldRange { field: "fft_band", .. })));
    }

    #[test]
    fn parse_helpers_report_short_input() {
        assert!(parse_u16_le(&[1], 0).is_err());
        assert!(parse_u32_le(&[1, 2, 3, 4], 2).is_err());
        assert_eq!(parse_u32_le(&[1, 0, 0, 0], 0).unwrap(), 1);
    }
}
