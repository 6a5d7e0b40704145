//! UTF-8 / UTF-16 LE text codec over guest linear memory.

use wasmtime::{Caller, Memory};

use crate::error::BridgeError;
use crate::memory::{self, GuestAllocator};

/// Text encoding selected by a guest-supplied indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Utf16,
}

impl Encoding {
    /// Map a wire indicator to an encoding. Only 8 and 16 are accepted.
    pub fn from_indicator(indicator: u32) -> Result<Self, BridgeError> {
        match indicator {
            8 => Ok(Encoding::Utf8),
            16 => Ok(Encoding::Utf16),
            _ => Err(BridgeError::UnsupportedEncoding { indicator }),
        }
    }
}

/// Decode a byte slice under the given encoding.
pub fn decode(bytes: &[u8], encoding: Encoding) -> Result<String, BridgeError> {
    match encoding {
        Encoding::Utf8 => decode_utf8(bytes),
        Encoding::Utf16 => decode_utf16le(bytes),
    }
}

/// Decode UTF-8 bytes.
pub fn decode_utf8(bytes: &[u8]) -> Result<String, BridgeError> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| BridgeError::framing(e.utf8_error().valid_up_to(), "invalid UTF-8 text"))
}

/// Decode UTF-16 little-endian bytes. The byte length must be even.
pub fn decode_utf16le(bytes: &[u8]) -> Result<String, BridgeError> {
    if bytes.len() % 2 != 0 {
        return Err(BridgeError::framing(
            bytes.len(),
            "UTF-16 text has odd byte length",
        ));
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|_| BridgeError::framing(0, "invalid UTF-16 text"))
}

/// Read and decode a text range from guest memory.
pub fn read_text(
    mem: &[u8],
    start: u32,
    len: u32,
    encoding: Encoding,
) -> Result<String, BridgeError> {
    decode(memory::slice(mem, start, len)?, encoding)
}

/// Encode `text` as UTF-8 into a fresh guest allocation; returns the
/// allocation id.
pub fn write_utf8<T>(
    allocator: &GuestAllocator,
    caller: &mut Caller<'_, T>,
    mem: Memory,
    text: &str,
) -> Result<u32, BridgeError> {
    allocator.write_bytes(caller, mem, text.as_bytes())
}
