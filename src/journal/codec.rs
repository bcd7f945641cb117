//! Pluggable entry encoding for segment files.
//!
//! A segment file is a back-to-back sequence of encoded entries with no
//! journal-level header, so every [`EntryCodec`] must be self-delimiting:
//! the decoder has to find where one entry ends and the next starts on its
//! own. It must also tell a clean end of stream apart from a record that was
//! cut short by a crash and from bytes that are simply wrong.
//!
//! Two implementations share the checksummed frame below:
//!
//! - [`JsonEntryCodec`]: `serde_json` payloads (always available)
//! - `BincodeEntryCodec`: compact bincode payloads (requires the `bincode`
//!   feature)
//!
//! # Frame Format (little-endian)
//!
//! ```text
//! [4 bytes: payload_length][4 bytes: CRC32(payload_length)][N bytes: payload][4 bytes: CRC32(payload)]
//! ```
//!
//! The length carries its own checksum. A garbled length in the middle of a
//! file would otherwise look like a record running past end of file, which
//! recovery treats as a torn tail and cuts away together with every record
//! behind it. With the header checked, a stream can only be reported as
//! truncated when it really ends inside a record.

use super::entry::JournalEntry;
use super::error::CodecError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::{self, Read};

/// Size of the frame header in bytes: the payload length and its CRC32.
pub const FRAME_HEADER_SIZE: usize = 8;

/// Size of the payload CRC32 trailer of a frame in bytes.
pub const FRAME_CRC_SIZE: usize = 4;

/// Total framing overhead per entry in bytes.
pub const FRAME_OVERHEAD: usize = FRAME_HEADER_SIZE + FRAME_CRC_SIZE;

/// Largest payload a frame may declare. Anything above is treated as
/// corruption rather than allocated.
pub const MAX_FRAME_PAYLOAD: usize = 64 * 1024 * 1024;

/// Serializes journal entries to bytes and reads them back during recovery.
///
/// # Decoding contract
///
/// [`decode`](EntryCodec::decode) returns:
///
/// - `Ok(Some(entry))` for a complete, valid record;
/// - `Ok(None)` when the stream is exhausted exactly at a record boundary;
/// - `Err(CodecError::Truncated { .. })` when the stream ends inside a record;
/// - any other error for bytes that cannot be trusted.
///
/// # Thread Safety
///
/// Codecs are shared between both segments of a journal via
/// `Arc<dyn EntryCodec<T, P>>` and must be `Send + Sync`.
pub trait EntryCodec<T, P>: Send + Sync + std::fmt::Debug {
    /// Encode one entry into a self-delimiting byte record.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Serialize`] if the entry cannot be serialized.
    fn encode(&self, entry: &JournalEntry<T, P>) -> Result<Vec<u8>, CodecError>;

    /// Decode the next entry from `reader`.
    ///
    /// # Errors
    ///
    /// See the decoding contract on the trait.
    fn decode(&self, reader: &mut dyn Read) -> Result<Option<JournalEntry<T, P>>, CodecError>;

    /// Short identifier of the payload format, e.g. `"json"`.
    #[must_use]
    fn format_name(&self) -> &'static str;
}

/// Wrap `payload` in a length-prefixed, checksummed frame.
///
/// # Errors
///
/// Returns [`CodecError::Serialize`] if the payload exceeds
/// [`MAX_FRAME_PAYLOAD`].
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, CodecError> {
    if payload.len() > MAX_FRAME_PAYLOAD {
        return Err(CodecError::Serialize {
            message: format!(
                "payload of {} bytes exceeds frame limit of {MAX_FRAME_PAYLOAD} bytes",
                payload.len()
            ),
        });
    }

    let mut buf = Vec::with_capacity(payload.len() + FRAME_OVERHEAD);
    // Bounded by MAX_FRAME_PAYLOAD above, so the cast is lossless.
    let len_bytes = (payload.len() as u32).to_le_bytes();
    buf.extend_from_slice(&len_bytes);
    buf.extend_from_slice(&crc32fast::hash(&len_bytes).to_le_bytes());
    buf.extend_from_slice(payload);
    buf.extend_from_slice(&crc32fast::hash(payload).to_le_bytes());
    Ok(buf)
}

/// Read one frame produced by [`encode_frame`] and return its payload.
///
/// Returns `Ok(None)` if the reader is already at end of stream.
///
/// # Errors
///
/// - [`CodecError::Truncated`] if the stream ends inside the frame.
/// - [`CodecError::Corrupt`] on a header or payload CRC mismatch, or an
///   oversized length.
/// - [`CodecError::Io`] if reading fails.
pub fn read_frame(reader: &mut dyn Read) -> Result<Option<Vec<u8>>, CodecError> {
    let mut header = [0u8; FRAME_HEADER_SIZE];
    let read = read_fully(reader, &mut header)?;
    if read == 0 {
        return Ok(None);
    }
    if read < FRAME_HEADER_SIZE {
        return Err(CodecError::Truncated {
            expected: FRAME_HEADER_SIZE,
            read,
        });
    }

    let len_bytes = [header[0], header[1], header[2], header[3]];
    let stored_header_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    let computed_header_crc = crc32fast::hash(&len_bytes);
    if stored_header_crc != computed_header_crc {
        return Err(CodecError::Corrupt {
            message: format!(
                "header checksum mismatch: expected {stored_header_crc:#010x}, got {computed_header_crc:#010x}"
            ),
        });
    }

    let payload_len = u32::from_le_bytes(len_bytes) as usize;
    if payload_len > MAX_FRAME_PAYLOAD {
        return Err(CodecError::Corrupt {
            message: format!("declared payload length {payload_len} exceeds frame limit"),
        });
    }

    let body_len = payload_len + FRAME_CRC_SIZE;
    let mut body = vec![0u8; body_len];
    let read = read_fully(reader, &mut body)?;
    if read < body_len {
        return Err(CodecError::Truncated {
            expected: body_len,
            read,
        });
    }

    let crc_bytes = body.split_off(payload_len);
    let stored_crc = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
    let computed_crc = crc32fast::hash(&body);
    if stored_crc != computed_crc {
        return Err(CodecError::Corrupt {
            message: format!(
                "checksum mismatch: expected {stored_crc:#010x}, got {computed_crc:#010x}"
            ),
        });
    }

    Ok(Some(body))
}

/// Fill `buf` from `reader`, stopping early only at end of stream.
fn read_fully(reader: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0usize;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

// ─── JSON ───────────────────────────────────────────────────────────────────

/// Entry codec using `serde_json` payloads inside a checksummed frame.
///
/// This is the default codec. Payloads stay human-readable when a segment
/// file is inspected with a hex dump.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEntryCodec;

impl JsonEntryCodec {
    /// Create a new JSON entry codec.
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl<T, P> EntryCodec<T, P> for JsonEntryCodec
where
    T: Serialize + DeserializeOwned,
    P: Serialize + DeserializeOwned,
{
    fn encode(&self, entry: &JournalEntry<T, P>) -> Result<Vec<u8>, CodecError> {
        let payload = serde_json::to_vec(entry).map_err(|e| CodecError::Serialize {
            message: e.to_string(),
        })?;
        encode_frame(&payload)
    }

    fn decode(&self, reader: &mut dyn Read) -> Result<Option<JournalEntry<T, P>>, CodecError> {
        let Some(payload) = read_frame(reader)? else {
            return Ok(None);
        };
        serde_json::from_slice(&payload)
            .map(Some)
            .map_err(|e| CodecError::Corrupt {
                message: e.to_string(),
            })
    }

    #[inline]
    fn format_name(&self) -> &'static str {
        "json"
    }
}

// ─── Bincode ────────────────────────────────────────────────────────────────

/// Entry codec using bincode payloads inside a checksummed frame.
///
/// Produces considerably smaller records than JSON. Requires the `bincode`
/// feature:
///
/// ```toml
/// [dependencies]
/// txjournal-rs = { version = "0.1", features = ["bincode"] }
/// ```
#[cfg(feature = "bincode")]
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeEntryCodec;

#[cfg(feature = "bincode")]
impl BincodeEntryCodec {
    /// Create a new bincode entry codec.
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "bincode")]
impl<T, P> EntryCodec<T, P> for BincodeEntryCodec
where
    T: Serialize + DeserializeOwned,
    P: Serialize + DeserializeOwned,
{
    fn encode(&self, entry: &JournalEntry<T, P>) -> Result<Vec<u8>, CodecError> {
        let payload = bincode::serde::encode_to_vec(entry, bincode::config::standard()).map_err(
            |e| CodecError::Serialize {
                message: e.to_string(),
            },
        )?;
        encode_frame(&payload)
    }

    fn decode(&self, reader: &mut dyn Read) -> Result<Option<JournalEntry<T, P>>, CodecError> {
        let Some(payload) = read_frame(reader)? else {
            return Ok(None);
        };
        let (entry, consumed) =
            bincode::serde::decode_from_slice(&payload, bincode::config::standard()).map_err(
                |e| CodecError::Corrupt {
                    message: e.to_string(),
                },
            )?;
        if consumed != payload.len() {
            return Err(CodecError::Corrupt {
                message: format!(
                    "{} trailing bytes after bincode payload",
                    payload.len() - consumed
                ),
            });
        }
        Ok(Some(entry))
    }

    #[inline]
    fn format_name(&self) -> &'static str {
        "bincode"
    }
}
