//! # Device Protocol Codec
//!
//! Stateless encode/decode for the fixed-size binary frames exchanged with
//! the sensor device.
//!
//! ## Frame Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Command Frame (16 bytes)                            │
//! │                                                                         │
//! │  offset  0    1..5        5..N              15                          │
//! │        ┌────┬──────────┬────────────────┬────────┐                      │
//! │        │cmd │ host time│ command payload│checksum│                      │
//! │        │char│ (BE u32) │ (cmd-specific) │        │                      │
//! │        └────┴──────────┴────────────────┴────────┘                      │
//! │                                                                         │
//! │  Host time (UTC seconds) rides in EVERY outbound command - payload for  │
//! │  the commands that need it, nonce for the rest.                         │
//! │                                                                         │
//! │  Commands:                                                              │
//! │   'I' read config; non-zero byte at offset 5 = write logging interval   │
//! │       then read back                                                    │
//! │   'i' read extended identity suffix                                     │
//! │   'S' read current sample      'G' read most recent stored sample       │
//! │   'D' delete sample (target time BE u32 at offset 5)                    │
//! │   'P' read stored-sample count 'B' enter bootloader (no response)       │
//! │                                                                         │
//! │  Checksum = low 8 bits of the sum of all preceding bytes, written as    │
//! │  the LAST step over the final frame contents.                           │
//! │                                                                         │
//! │  Sample responses are 16 bytes, or 32 on GPS-equipped variants; the     │
//! │  long form appends a validity flag, latitude/longitude as signed        │
//! │  (degrees, fraction) i32 pairs, and a quadrant code.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The codec validates and reports; it never retries. The empty-sample
//! sentinel (all channels zero) is the caller's check, not the codec's.

use thiserror::Error;

use airgate_core::{ApiSupport, GpsFix, Sample};

// =============================================================================
// Frame Constants
// =============================================================================

/// Length of every outbound command frame.
pub const COMMAND_FRAME_LEN: usize = 16;

/// Length of a standard response frame.
pub const RESPONSE_FRAME_LEN: usize = 16;

/// Length of a sample response from GPS-equipped variants.
pub const GPS_RESPONSE_FRAME_LEN: usize = 32;

const HOST_TIME_OFFSET: usize = 1;
const PAYLOAD_OFFSET: usize = 5;

// =============================================================================
// Errors
// =============================================================================

/// Malformed frame. Fatal to the single command that produced it, never to
/// the session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Frame is not exactly the expected length.
    #[error("Bad frame length: expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },

    /// Recomputed checksum does not match the frame's checksum byte.
    #[error("Checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    Checksum { expected: u8, actual: u8 },
}

// =============================================================================
// Commands
// =============================================================================

/// One device command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `I` - read the device configuration.
    ReadConfig,
    /// `I` with a non-zero interval byte - write the logging interval, the
    /// response is the config read back.
    WriteLoggingInterval(u8),
    /// `i` - read the extended identity suffix.
    ReadExtendedId,
    /// `S` - read the sample currently being measured.
    ReadCurrentSample,
    /// `G` - read the most recent stored sample.
    ReadHistoricSample,
    /// `D` - delete the stored sample with the given device timestamp.
    DeleteSample { sample_time: u32 },
    /// `P` - read the count of stored samples.
    ReadSampleCount,
    /// `B` - enter bootloader mode. No response; the session is unusable
    /// afterward and the caller must disconnect.
    EnterBootloader,
}

impl Command {
    /// ASCII command prefix carried in byte 0.
    pub fn prefix(&self) -> u8 {
        match self {
            Command::ReadConfig | Command::WriteLoggingInterval(_) => b'I',
            Command::ReadExtendedId => b'i',
            Command::ReadCurrentSample => b'S',
            Command::ReadHistoricSample => b'G',
            Command::DeleteSample { .. } => b'D',
            Command::ReadSampleCount => b'P',
            Command::EnterBootloader => b'B',
        }
    }

    /// Expected response length for this command on a device with the given
    /// capability set.
    pub fn response_len(&self, api: &ApiSupport) -> usize {
        match self {
            Command::EnterBootloader => 0,
            Command::ReadCurrentSample | Command::ReadHistoricSample => {
                if api.has_gps {
                    GPS_RESPONSE_FRAME_LEN
                } else {
                    RESPONSE_FRAME_LEN
                }
            }
            _ => RESPONSE_FRAME_LEN,
        }
    }
}

// =============================================================================
// Checksum
// =============================================================================

/// Low 8 bits of the sum of all bytes before the checksum position.
pub fn checksum(frame: &[u8]) -> u8 {
    frame[..frame.len() - 1]
        .iter()
        .fold(0u32, |acc, &b| acc.wrapping_add(b as u32)) as u8
}

/// Writes the checksum into the last byte. Always the final encode step,
/// computed over the finished frame contents.
pub fn finalize(frame: &mut [u8]) {
    let sum = checksum(frame);
    let last = frame.len() - 1;
    frame[last] = sum;
}

/// Validates length and checksum.
pub fn verify(frame: &[u8], expected_len: usize) -> Result<(), CodecError> {
    if frame.len() != expected_len {
        return Err(CodecError::Length {
            expected: expected_len,
            actual: frame.len(),
        });
    }
    let expected = checksum(frame);
    let actual = frame[frame.len() - 1];
    if expected != actual {
        return Err(CodecError::Checksum { expected, actual });
    }
    Ok(())
}

// =============================================================================
// Command Encoding
// =============================================================================

/// Builds the command frame: prefix, host time, command payload, checksum.
pub fn encode(command: &Command, host_time: u32) -> Vec<u8> {
    let mut frame = vec![0u8; COMMAND_FRAME_LEN];
    frame[0] = command.prefix();
    frame[HOST_TIME_OFFSET..HOST_TIME_OFFSET + 4].copy_from_slice(&host_time.to_be_bytes());

    match command {
        Command::WriteLoggingInterval(minutes) => {
            frame[PAYLOAD_OFFSET] = *minutes;
        }
        Command::DeleteSample { sample_time } => {
            frame[PAYLOAD_OFFSET..PAYLOAD_OFFSET + 4]
                .copy_from_slice(&sample_time.to_be_bytes());
        }
        _ => {}
    }

    finalize(&mut frame);
    frame
}

// =============================================================================
// Response Decoding
// =============================================================================

/// Fields of a decoded config response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFrame {
    pub id: String,
    pub protocol_version: u16,
    pub hardware_version: u16,
    pub firmware_version: u16,
    pub logging_interval: u16,
}

fn read_u16(frame: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([frame[at], frame[at + 1]])
}

fn read_u32(frame: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([frame[at], frame[at + 1], frame[at + 2], frame[at + 3]])
}

fn read_i32(frame: &[u8], at: usize) -> i32 {
    i32::from_be_bytes([frame[at], frame[at + 1], frame[at + 2], frame[at + 3]])
}

fn read_text(frame: &[u8]) -> String {
    String::from_utf8_lossy(frame)
        .trim_end_matches(['\0', ' '])
        .to_string()
}

/// Decodes an `I` response.
pub fn decode_config(frame: &[u8]) -> Result<ConfigFrame, CodecError> {
    verify(frame, RESPONSE_FRAME_LEN)?;
    Ok(ConfigFrame {
        protocol_version: frame[1] as u16,
        hardware_version: frame[2] as u16,
        firmware_version: frame[3] as u16,
        logging_interval: read_u16(frame, 4),
        id: read_text(&frame[6..14]),
    })
}

/// Decodes an `i` response: the extended identity suffix.
pub fn decode_extended_id(frame: &[u8]) -> Result<String, CodecError> {
    verify(frame, RESPONSE_FRAME_LEN)?;
    Ok(read_text(&frame[1..15]))
}

/// Decodes an `S`/`G` response into a sample.
///
/// `download_time_ms` is the host-assigned acquisition timestamp. The caller
/// checks `Sample::is_empty()` for the no-data sentinel (an all-zero frame
/// carries a valid zero checksum).
pub fn decode_sample(
    frame: &[u8],
    has_gps: bool,
    download_time_ms: i64,
) -> Result<Sample, CodecError> {
    let expected_len = if has_gps {
        GPS_RESPONSE_FRAME_LEN
    } else {
        RESPONSE_FRAME_LEN
    };
    verify(frame, expected_len)?;

    let gps = if has_gps {
        Some(GpsFix {
            is_valid: frame[13] != 0,
            latitude: format_coordinate(read_i32(frame, 14), read_i32(frame, 18)),
            longitude: format_coordinate(read_i32(frame, 22), read_i32(frame, 26)),
            quadrant: quadrant_label(frame[30]).to_string(),
        })
    } else {
        None
    };

    Ok(Sample {
        database_id: None,
        sample_time: read_u32(frame, 1),
        download_time_ms,
        raw_particle_count: read_u16(frame, 5),
        particle_count: read_u16(frame, 7),
        temperature_tenths_f: read_u16(frame, 9),
        humidity: read_u16(frame, 11),
        gps,
    })
}

/// Decodes a `P` response: count of stored samples.
pub fn decode_sample_count(frame: &[u8]) -> Result<u32, CodecError> {
    verify(frame, RESPONSE_FRAME_LEN)?;
    Ok(read_u32(frame, 1))
}

/// Validates a bare acknowledgement response (`D`).
pub fn decode_ack(frame: &[u8]) -> Result<(), CodecError> {
    verify(frame, RESPONSE_FRAME_LEN)
}

// =============================================================================
// GPS Text Reconstruction
// =============================================================================

/// Joins the signed (degrees, fraction) integer pair with a literal decimal
/// point.
///
/// This is text reconstruction, not float math: `(-79, 941145)` becomes
/// `"-79.941145"` exactly as the device intends. Wire compatibility depends
/// on this behavior; do not round-trip through f64.
pub fn format_coordinate(degrees: i32, fraction: i32) -> String {
    format!("{degrees}.{fraction}")
}

/// Compass quadrant label for the one-byte quadrant code.
pub fn quadrant_label(code: u8) -> &'static str {
    match code {
        0 => "NE",
        1 => "NW",
        2 => "SE",
        3 => "SW",
        _ => "",
    }
}

fn quadrant_code(label: &str) -> u8 {
    match label {
        "NE" => 0,
        "NW" => 1,
        "SE" => 2,
        "SW" => 3,
        _ => 0xff,
    }
}

// =============================================================================
// Response Encoding
// =============================================================================
// Used by simulated devices (test fakes, bench rigs). The gateway itself
// only decodes responses.

/// Encodes an `I` response.
pub fn encode_config_response(config: &ConfigFrame) -> Vec<u8> {
    let mut frame = vec![0u8; RESPONSE_FRAME_LEN];
    frame[0] = b'I';
    frame[1] = config.protocol_version as u8;
    frame[2] = config.hardware_version as u8;
    frame[3] = config.firmware_version as u8;
    frame[4..6].copy_from_slice(&config.logging_interval.to_be_bytes());
    let id = config.id.as_bytes();
    let len = id.len().min(8);
    frame[6..6 + len].copy_from_slice(&id[..len]);
    finalize(&mut frame);
    frame
}

/// Encodes an `i` response.
pub fn encode_extended_id_response(suffix: &str) -> Vec<u8> {
    let mut frame = vec![0u8; RESPONSE_FRAME_LEN];
    frame[0] = b'i';
    let text = suffix.as_bytes();
    let len = text.len().min(14);
    frame[1..1 + len].copy_from_slice(&text[..len]);
    finalize(&mut frame);
    frame
}

/// Encodes an `S`/`G` response for a sample.
pub fn encode_sample_response(sample: &Sample, has_gps: bool) -> Vec<u8> {
    let len = if has_gps {
        GPS_RESPONSE_FRAME_LEN
    } else {
        RESPONSE_FRAME_LEN
    };
    let mut frame = vec![0u8; len];
    frame[0] = b'S';
    frame[1..5].copy_from_slice(&sample.sample_time.to_be_bytes());
    frame[5..7].copy_from_slice(&sample.raw_particle_count.to_be_bytes());
    frame[7..9].copy_from_slice(&sample.particle_count.to_be_bytes());
    frame[9..11].copy_from_slice(&sample.temperature_tenths_f.to_be_bytes());
    frame[11..13].copy_from_slice(&sample.humidity.to_be_bytes());

    if has_gps {
        if let Some(fix) = &sample.gps {
            frame[13] = fix.is_valid as u8;
            let (lat_deg, lat_frac) = parse_coordinate(&fix.latitude);
            let (lon_deg, lon_frac) = parse_coordinate(&fix.longitude);
            frame[14..18].copy_from_slice(&lat_deg.to_be_bytes());
            frame[18..22].copy_from_slice(&lat_frac.to_be_bytes());
            frame[22..26].copy_from_slice(&lon_deg.to_be_bytes());
            frame[26..30].copy_from_slice(&lon_frac.to_be_bytes());
            frame[30] = quadrant_code(&fix.quadrant);
        }
    }

    finalize(&mut frame);
    frame
}

/// Encodes the all-zero no-data sentinel response.
///
/// All bytes zero sums to zero, so the zero checksum byte is itself valid.
pub fn encode_empty_sample_response(has_gps: bool) -> Vec<u8> {
    let len = if has_gps {
        GPS_RESPONSE_FRAME_LEN
    } else {
        RESPONSE_FRAME_LEN
    };
    vec![0u8; len]
}

/// Encodes a `P` response.
pub fn encode_sample_count_response(count: u32) -> Vec<u8> {
    let mut frame = vec![0u8; RESPONSE_FRAME_LEN];
    frame[0] = b'P';
    frame[1..5].copy_from_slice(&count.to_be_bytes());
    finalize(&mut frame);
    frame
}

/// Encodes a bare acknowledgement response with the given prefix.
pub fn encode_ack_response(prefix: u8) -> Vec<u8> {
    let mut frame = vec![0u8; RESPONSE_FRAME_LEN];
    frame[0] = prefix;
    finalize(&mut frame);
    frame
}

fn parse_coordinate(text: &str) -> (i32, i32) {
    match text.split_once('.') {
        Some((deg, frac)) => (deg.parse().unwrap_or(0), frac.parse().unwrap_or(0)),
        None => (text.parse().unwrap_or(0), 0),
    }
}

// =============================================================================
// Tests
// =============================================================================
