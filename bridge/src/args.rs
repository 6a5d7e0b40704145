//! Argument-frame decoder.
//!
//! An arguments frame is `ArgStart (ArgBegin type [quant] payload ArgEnd)*
//! ArgStop`. Numeric payloads may be transmitted narrower than their declared
//! type (quantization); the decoder widens them back so callables always
//! observe the declared width, with sign-extension for signed types and
//! zero-extension for unsigned ones.
//!
//! Text payloads are `(start, len)` ranges into the batch text buffer; typed
//! array payloads are `(start, len)` byte ranges into linear memory, copied
//! out because guest memory may move under re-entry. External and internal
//! references decode to their raw 64-bit handle; resolving them against the
//! heaps (or nulling stale ones) happens at execution time.

use membrane_hostapi::Value;

use crate::error::BridgeError;
use crate::memory;
use crate::protocol::{Quant, Reader, TypeTag, ARG_BEGIN, ARG_END, ARG_START, ARG_STOP};
use crate::text::{self, Encoding};

/// Byte ranges an argument payload may reference.
pub struct ArgContext<'a> {
    /// The batch text buffer (for V1 frames, linear memory itself).
    pub text: &'a [u8],
    /// Guest linear memory (typed-array payload source).
    pub memory: &'a [u8],
}

/// Parse one arguments frame starting at the `ArgStart` marker.
pub fn parse_frame(
    reader: &mut Reader<'_>,
    ctx: &ArgContext<'_>,
) -> Result<Vec<Value>, BridgeError> {
    reader.expect_marker(ARG_START, "ArgStart")?;
    let mut args = Vec::new();
    loop {
        let offset = reader.position();
        match reader.read_u8()? {
            ARG_STOP => break,
            ARG_BEGIN => {
                args.push(decode_argument(reader, ctx)?);
                reader.expect_marker(ARG_END, "ArgEnd")?;
            }
            other => {
                return Err(BridgeError::framing(
                    offset,
                    format!("expected ArgBegin or ArgStop, found {:#04x}", other),
                ));
            }
        }
    }
    Ok(args)
}

/// Parse a standalone frame occupying an entire byte range (the V1
/// invocation path). Trailing bytes after `ArgStop` are rejected.
pub fn parse_frame_bytes(frame: &[u8], ctx: &ArgContext<'_>) -> Result<Vec<Value>, BridgeError> {
    if frame.is_empty() {
        return Ok(Vec::new());
    }
    let mut reader = Reader::new(frame);
    let args = parse_frame(&mut reader, ctx)?;
    if !reader.is_exhausted() {
        return Err(BridgeError::framing(
            reader.position(),
            "trailing bytes after ArgStop",
        ));
    }
    Ok(args)
}

fn decode_argument(reader: &mut Reader<'_>, ctx: &ArgContext<'_>) -> Result<Value, BridgeError> {
    let tag_offset = reader.position();
    let tag_byte = reader.read_u8()?;
    let tag = TypeTag::from_byte(tag_byte).ok_or_else(|| {
        BridgeError::framing(tag_offset, format!("unrecognized type tag {}", tag_byte))
    })?;

    let quant = if tag.has_quantization() {
        let quant_offset = reader.position();
        let quant_byte = reader.read_u8()?;
        let quant = Quant::from_byte(quant_byte).ok_or_else(|| {
            BridgeError::framing(
                quant_offset,
                format!("unrecognized quantization code {}", quant_byte),
            )
        })?;
        validate_quantization(tag, quant, quant_offset)?;
        quant
    } else {
        Quant::None
    };

    match tag {
        TypeTag::Null => Ok(Value::Null),
        TypeTag::Undefined => Ok(Value::Undefined),
        TypeTag::Bool => {
            let offset = reader.position();
            match reader.read_u8()? {
                0 => Ok(Value::Bool(false)),
                1 => Ok(Value::Bool(true)),
                other => Err(BridgeError::framing(
                    offset,
                    format!("invalid boolean payload {:#04x}", other),
                )),
            }
        }
        TypeTag::TextUtf8 | TypeTag::TextUtf16 => {
            let start = reader.read_u32()?;
            let len = reader.read_u32()?;
            let encoding = if tag == TypeTag::TextUtf8 {
                Encoding::Utf8
            } else {
                Encoding::Utf16
            };
            Ok(Value::Text(text::read_text(ctx.text, start, len, encoding)?))
        }
        TypeTag::Int8 => Ok(Value::Int8(read_signed(reader, 1)? as i8)),
        TypeTag::Int16 => {
            Ok(Value::Int16(read_signed(reader, payload_width(tag, quant))? as i16))
        }
        TypeTag::Int32 => {
            Ok(Value::Int32(read_signed(reader, payload_width(tag, quant))? as i32))
        }
        TypeTag::Int64 => Ok(Value::Int64(read_signed(reader, payload_width(tag, quant))?)),
        TypeTag::Uint8 => Ok(Value::Uint8(read_unsigned(reader, 1)? as u8)),
        TypeTag::Uint16 => {
            Ok(Value::Uint16(read_unsigned(reader, payload_width(tag, quant))? as u16))
        }
        TypeTag::Uint32 => {
            Ok(Value::Uint32(read_unsigned(reader, payload_width(tag, quant))? as u32))
        }
        TypeTag::Uint64 => Ok(Value::Uint64(read_unsigned(reader, payload_width(tag, quant))?)),
        TypeTag::Float32 => {
            let bytes = reader.read_bytes(4)?;
            Ok(Value::Float32(f32::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3],
            ])))
        }
        TypeTag::Float64 => {
            if quant == Quant::F64AsF32 {
                let bytes = reader.read_bytes(4)?;
                let narrow = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                Ok(Value::Float64(narrow as f64))
            } else {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(reader.read_bytes(8)?);
                Ok(Value::Float64(f64::from_le_bytes(buf)))
            }
        }
        TypeTag::ExternalReference => {
            Ok(Value::ExternRef(read_unsigned(reader, payload_width(tag, quant))?))
        }
        TypeTag::InternalReference => {
            Ok(Value::InternalRef(read_unsigned(reader, payload_width(tag, quant))?))
        }
        TypeTag::Int128 => {
            if quant == Quant::None {
                // Two 64-bit halves, most-significant half first.
                let high = reader.read_u64()?;
                let low = reader.read_u64()?;
                Ok(Value::Int128((((high as u128) << 64) | low as u128) as i128))
            } else {
                Ok(Value::Int128(
                    read_signed(reader, payload_width(tag, quant))? as i128,
                ))
            }
        }
        TypeTag::Uint128 => {
            if quant == Quant::None {
                let high = reader.read_u64()?;
                let low = reader.read_u64()?;
                Ok(Value::Uint128(((high as u128) << 64) | low as u128))
            } else {
                Ok(Value::Uint128(
                    read_unsigned(reader, payload_width(tag, quant))? as u128,
                ))
            }
        }
        TypeTag::Int8Array
        | TypeTag::Int16Array
        | TypeTag::Int32Array
        | TypeTag::Int64Array
        | TypeTag::Uint8Array
        | TypeTag::Uint16Array
        | TypeTag::Uint32Array
        | TypeTag::Uint64Array
        | TypeTag::Float32Array
        | TypeTag::Float64Array => decode_array(reader, ctx, tag),
    }
}

/// Reject quantization codes that do not apply to the declared type.
fn validate_quantization(tag: TypeTag, quant: Quant, offset: usize) -> Result<(), BridgeError> {
    let valid = match tag {
        TypeTag::Int8 | TypeTag::Uint8 | TypeTag::Float32 => quant == Quant::None,
        TypeTag::Int16 => matches!(quant, Quant::None | Quant::I16AsI8),
        TypeTag::Int32 => matches!(quant, Quant::None | Quant::I32AsI8 | Quant::I32AsI16),
        TypeTag::Int64 => matches!(
            quant,
            Quant::None | Quant::I64AsI8 | Quant::I64AsI16 | Quant::I64AsI32
        ),
        TypeTag::Uint16 => matches!(quant, Quant::None | Quant::U16AsU8),
        TypeTag::Uint32 => matches!(quant, Quant::None | Quant::U32AsU8 | Quant::U32AsU16),
        TypeTag::Uint64 => matches!(
            quant,
            Quant::None | Quant::U64AsU8 | Quant::U64AsU16 | Quant::U64AsU32
        ),
        TypeTag::Float64 => matches!(quant, Quant::None | Quant::F64AsF32),
        TypeTag::ExternalReference | TypeTag::InternalReference => matches!(
            quant,
            Quant::None | Quant::PtrAsU8 | Quant::PtrAsU16 | Quant::PtrAsU32 | Quant::PtrAsU64
        ),
        TypeTag::Int128 => matches!(
            quant,
            Quant::None
                | Quant::I128AsI8
                | Quant::I128AsI16
                | Quant::I128AsI32
                | Quant::I128AsI64
        ),
        TypeTag::Uint128 => matches!(
            quant,
            Quant::None
                | Quant::U128AsU8
                | Quant::U128AsU16
                | Quant::U128AsU32
                | Quant::U128AsU64
        ),
        // Tags without a quantization byte never reach here.
        _ => quant == Quant::None,
    };
    if valid {
        Ok(())
    } else {
        Err(BridgeError::framing(
            offset,
            format!("quantization {:?} not applicable to {:?}", quant, tag),
        ))
    }
}

/// Physical payload width in bytes for a validated `(tag, quant)` pair.
fn payload_width(tag: TypeTag, quant: Quant) -> usize {
    match quant {
        Quant::None => match tag {
            TypeTag::Int8 | TypeTag::Uint8 => 1,
            TypeTag::Int16 | TypeTag::Uint16 => 2,
            TypeTag::Int32 | TypeTag::Uint32 | TypeTag::Float32 => 4,
            TypeTag::Int64
            | TypeTag::Uint64
            | TypeTag::Float64
            | TypeTag::ExternalReference
            | TypeTag::InternalReference => 8,
            TypeTag::Int128 | TypeTag::Uint128 => 16,
            _ => 0,
        },
        Quant::I64AsI8
        | Quant::I32AsI8
        | Quant::I16AsI8
        | Quant::U64AsU8
        | Quant::U32AsU8
        | Quant::U16AsU8
        | Quant::I128AsI8
        | Quant::U128AsU8
        | Quant::PtrAsU8 => 1,
        Quant::I64AsI16
        | Quant::I32AsI16
        | Quant::U64AsU16
        | Quant::U32AsU16
        | Quant::I128AsI16
        | Quant::U128AsU16
        | Quant::PtrAsU16 => 2,
        Quant::I64AsI32
        | Quant::U64AsU32
        | Quant::F64AsF32
        | Quant::F128AsF32
        | Quant::I128AsI32
        | Quant::U128AsU32
        | Quant::PtrAsU32 => 4,
        Quant::I128AsI64 | Quant::U128AsU64 | Quant::F128AsF64 | Quant::PtrAsU64 => 8,
    }
}

fn read_signed(reader: &mut Reader<'_>, width: usize) -> Result<i64, BridgeError> {
    let bytes = reader.read_bytes(width)?;
    let mut buf = [0u8; 8];
    buf[..width].copy_from_slice(bytes);
    // Sign-extend from the transmitted width.
    if bytes[width - 1] & 0x80 != 0 {
        for b in buf.iter_mut().skip(width) {
            *b = 0xFF;
        }
    }
    Ok(i64::from_le_bytes(buf))
}

fn read_unsigned(reader: &mut Reader<'_>, width: usize) -> Result<u64, BridgeError> {
    let bytes = reader.read_bytes(width)?;
    let mut buf = [0u8; 8];
    buf[..width].copy_from_slice(bytes);
    Ok(u64::from_le_bytes(buf))
}

fn decode_array(
    reader: &mut Reader<'_>,
    ctx: &ArgContext<'_>,
    tag: TypeTag,
) -> Result<Value, BridgeError> {
    let start = reader.read_u32()?;
    let len = reader.read_u32()?;
    let offset = reader.position();
    let bytes = memory::slice(ctx.memory, start, len)?;

    let elem_size = match tag {
        TypeTag::Int8Array | TypeTag::Uint8Array => 1,
        TypeTag::Int16Array | TypeTag::Uint16Array => 2,
        TypeTag::Int32Array | TypeTag::Uint32Array | TypeTag::Float32Array => 4,
        _ => 8,
    };
    if bytes.len() % elem_size != 0 {
        return Err(BridgeError::framing(
            offset,
            format!(
                "typed array byte length {} is not a multiple of element size {}",
                bytes.len(),
                elem_size
            ),
        ));
    }

    Ok(match tag {
        TypeTag::Int8Array => Value::Int8Array(bytes.iter().map(|&b| b as i8).collect()),
        TypeTag::Uint8Array => Value::Uint8Array(bytes.to_vec()),
        TypeTag::Int16Array => Value::Int16Array(
            bytes
                .chunks_exact(2)
                .map(|c| i16::from_le_bytes([c[0], c[1]]))
                .collect(),
        ),
        TypeTag::Uint16Array => Value::Uint16Array(
            bytes
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect(),
        ),
        TypeTag::Int32Array => Value::Int32Array(
            bytes
                .chunks_exact(4)
                .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
        TypeTag::Uint32Array => Value::Uint32Array(
            bytes
                .chunks_exact(4)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
        TypeTag::Int64Array => Value::Int64Array(
            bytes
                .chunks_exact(8)
                .map(|c| {
                    let mut buf = [0u8; 8];
                    buf.copy_from_slice(c);
                    i64::from_le_bytes(buf)
                })
                .collect(),
        ),
        TypeTag::Uint64Array => Value::Uint64Array(
            bytes
                .chunks_exact(8)
                .map(|c| {
                    let mut buf = [0u8; 8];
                    buf.copy_from_slice(c);
                    u64::from_le_bytes(buf)
                })
                .collect(),
        ),
        TypeTag::Float32Array => Value::Float32Array(
            bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
        TypeTag::Float64Array => Value::Float64Array(
            bytes
                .chunks_exact(8)
                .map(|c| {
                    let mut buf = [0u8; 8];
                    buf.copy_from_slice(c);
                    f64::from_le_bytes(buf)
                })
                .collect(),
        ),
        _ => unreachable!("decode_array called with non-array tag"),
    })
}
