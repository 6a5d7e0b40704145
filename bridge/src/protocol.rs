//! Wire-format vocabulary and byte cursor for the instruction protocol.
//!
//! All multi-byte values are little-endian. Operations are framed
//! `Begin .. Stop`, argument frames `ArgStart (ArgBegin .. ArgEnd)* ArgStop`.
//! See PROTOCOL.md for the full layout tables.

use crate::error::BridgeError;

// ── Framing markers ──

/// Opens one operation in the operations stream.
pub const OP_BEGIN: u8 = 0x00;
/// Closes one operation in the operations stream.
pub const OP_STOP: u8 = 0xFF;
/// Opens an arguments frame.
pub const ARG_START: u8 = 0x01;
/// Opens one argument inside a frame.
pub const ARG_BEGIN: u8 = 0x02;
/// Closes one argument inside a frame.
pub const ARG_END: u8 = 0x03;
/// Closes an arguments frame.
pub const ARG_STOP: u8 = 0x04;

// ── Operation codes ──

/// Operation discriminant following the `Begin` marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    MakeFunction = 1,
    InvokeNoReturnFunction = 2,
    InvokeReturningFunction = 3,
    InvokeCallbackFunction = 4,
}

impl OpCode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(OpCode::MakeFunction),
            2 => Some(OpCode::InvokeNoReturnFunction),
            3 => Some(OpCode::InvokeReturningFunction),
            4 => Some(OpCode::InvokeCallbackFunction),
            _ => None,
        }
    }
}

// ── Argument type tags ──

/// Declared type of one argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TypeTag {
    Null = 0,
    Undefined = 1,
    Bool = 2,
    TextUtf8 = 3,
    TextUtf16 = 4,
    Int8 = 5,
    Int16 = 6,
    Int32 = 7,
    Int64 = 8,
    Uint8 = 9,
    Uint16 = 10,
    Uint32 = 11,
    Uint64 = 12,
    Float32 = 13,
    Float64 = 14,
    ExternalReference = 15,
    Int8Array = 16,
    Int16Array = 17,
    Int32Array = 18,
    Int64Array = 19,
    Uint8Array = 20,
    Uint16Array = 21,
    Uint32Array = 22,
    Uint64Array = 23,
    Float32Array = 24,
    Float64Array = 25,
    InternalReference = 26,
    Int128 = 27,
    Uint128 = 28,
}

impl TypeTag {
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => TypeTag::Null,
            1 => TypeTag::Undefined,
            2 => TypeTag::Bool,
            3 => TypeTag::TextUtf8,
            4 => TypeTag::TextUtf16,
            5 => TypeTag::Int8,
            6 => TypeTag::Int16,
            7 => TypeTag::Int32,
            8 => TypeTag::Int64,
            9 => TypeTag::Uint8,
            10 => TypeTag::Uint16,
            11 => TypeTag::Uint32,
            12 => TypeTag::Uint64,
            13 => TypeTag::Float32,
            14 => TypeTag::Float64,
            15 => TypeTag::ExternalReference,
            16 => TypeTag::Int8Array,
            17 => TypeTag::Int16Array,
            18 => TypeTag::Int32Array,
            19 => TypeTag::Int64Array,
            20 => TypeTag::Uint8Array,
            21 => TypeTag::Uint16Array,
            22 => TypeTag::Uint32Array,
            23 => TypeTag::Uint64Array,
            24 => TypeTag::Float32Array,
            25 => TypeTag::Float64Array,
            26 => TypeTag::InternalReference,
            27 => TypeTag::Int128,
            28 => TypeTag::Uint128,
            _ => return None,
        })
    }

    /// Whether the tag is followed by a quantization byte. Numeric and
    /// pointer-sized tags carry one; markers, text, and buffers do not.
    pub fn has_quantization(self) -> bool {
        matches!(
            self,
            TypeTag::Int8
                | TypeTag::Int16
                | TypeTag::Int32
                | TypeTag::Int64
                | TypeTag::Uint8
                | TypeTag::Uint16
                | TypeTag::Uint32
                | TypeTag::Uint64
                | TypeTag::Float32
                | TypeTag::Float64
                | TypeTag::ExternalReference
                | TypeTag::InternalReference
                | TypeTag::Int128
                | TypeTag::Uint128
        )
    }
}

// ── Quantization codes ──

/// Narrowing transmission encoding for a numeric argument. The declared type
/// stays authoritative; the code only changes the payload width on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Quant {
    None = 0,
    I64AsI8 = 1,
    I64AsI16 = 2,
    I64AsI32 = 3,
    I32AsI8 = 4,
    I32AsI16 = 5,
    I16AsI8 = 6,
    U64AsU8 = 7,
    U64AsU16 = 8,
    U64AsU32 = 9,
    U32AsU8 = 10,
    U32AsU16 = 11,
    U16AsU8 = 12,
    F64AsF32 = 13,
    F128AsF32 = 14,
    F128AsF64 = 15,
    I128AsI8 = 16,
    I128AsI16 = 17,
    I128AsI32 = 18,
    I128AsI64 = 19,
    U128AsU8 = 20,
    U128AsU16 = 21,
    U128AsU32 = 22,
    U128AsU64 = 23,
    PtrAsU8 = 24,
    PtrAsU16 = 25,
    PtrAsU32 = 26,
    PtrAsU64 = 27,
}

impl Quant {
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => Quant::None,
            1 => Quant::I64AsI8,
            2 => Quant::I64AsI16,
            3 => Quant::I64AsI32,
            4 => Quant::I32AsI8,
            5 => Quant::I32AsI16,
            6 => Quant::I16AsI8,
            7 => Quant::U64AsU8,
            8 => Quant::U64AsU16,
            9 => Quant::U64AsU32,
            10 => Quant::U32AsU8,
            11 => Quant::U32AsU16,
            12 => Quant::U16AsU8,
            13 => Quant::F64AsF32,
            14 => Quant::F128AsF32,
            15 => Quant::F128AsF64,
            16 => Quant::I128AsI8,
            17 => Quant::I128AsI16,
            18 => Quant::I128AsI32,
            19 => Quant::I128AsI64,
            20 => Quant::U128AsU8,
            21 => Quant::U128AsU16,
            22 => Quant::U128AsU32,
            23 => Quant::U128AsU64,
            24 => Quant::PtrAsU8,
            25 => Quant::PtrAsU16,
            26 => Quant::PtrAsU32,
            27 => Quant::PtrAsU64,
        _ => return None,
        })
    }
}

// ── Return-type descriptor ──

/// Declared return coercion for `InvokeReturningFunction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReturnHint {
    None = 0,
    Bool = 1,
    Integer = 2,
    BigInt = 3,
    Text = 4,
    Object = 5,
}

impl ReturnHint {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(ReturnHint::None),
            1 => Some(ReturnHint::Bool),
            2 => Some(ReturnHint::Integer),
            3 => Some(ReturnHint::BigInt),
            4 => Some(ReturnHint::Text),
            5 => Some(ReturnHint::Object),
            _ => None,
        }
    }
}

// ── Byte cursor ──

/// Cursor for reading the operations stream. Every read is bounds-checked
/// and truncation reports the failing offset.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current byte offset from the start of the stream.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Look at the next byte without consuming it.
    pub fn peek_u8(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], BridgeError> {
        if self.pos + n > self.data.len() {
            return Err(BridgeError::framing(
                self.pos,
                format!("unexpected end of stream (needed {} bytes)", n),
            ));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, BridgeError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, BridgeError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, BridgeError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_u64(&mut self) -> Result<u64, BridgeError> {
        let bytes = self.read_bytes(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }

    /// Consume one byte and require it to equal `expected`.
    pub fn expect_marker(&mut self, expected: u8, name: &str) -> Result<(), BridgeError> {
        let offset = self.pos;
        let byte = self.read_u8()?;
        if byte != expected {
            return Err(BridgeError::framing(
                offset,
                format!("expected {} marker {:#04x}, found {:#04x}", name, expected, byte),
            ));
        }
        Ok(())
    }
}
