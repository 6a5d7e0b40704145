//! Operations-stream decoder.
//!
//! A batch is a sequence of framed operations: `Begin | op code | payload |
//! Stop`, repeated until the stream ends. The whole stream is parsed into
//! structured operations before any of them executes, so a framing error
//! anywhere in the batch rejects it without mutating the heaps. Execution
//! errors can still occur later, after earlier operations have applied.
//!
//! The decoder is strict: missing framing, unknown codes, out-of-range
//! payload offsets, and trailing bytes are all fatal to the batch.

use membrane_hostapi::Value;

use crate::args::{self, ArgContext};
use crate::error::BridgeError;
use crate::protocol::{
    OpCode, Reader, ReturnHint, ARG_BEGIN, ARG_END, ARG_START, ARG_STOP, OP_BEGIN, OP_STOP,
};
use crate::text::{self, Encoding};

/// One decoded batch operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Bind the callable named by `body` to the pre-allocated function-heap
    /// handle `target`.
    MakeFunction { target: u64, body: String },
    /// Invoke `target`, discarding the result.
    InvokeNoReturn { target: u64, args: Vec<Value> },
    /// Invoke `target` and coerce the result per `ret`.
    InvokeReturning {
        target: u64,
        ret: ReturnHint,
        args: Vec<Value>,
    },
    /// Invoke `target` with the callback reference as its only argument.
    InvokeCallback { target: u64, callback: u64 },
}

/// Parse an operations stream against its text buffer and linear memory.
pub fn parse_batch(
    ops: &[u8],
    text_buffer: &[u8],
    memory: &[u8],
) -> Result<Vec<Operation>, BridgeError> {
    let ctx = ArgContext {
        text: text_buffer,
        memory,
    };
    let mut reader = Reader::new(ops);
    let mut operations = Vec::new();

    while !reader.is_exhausted() {
        reader.expect_marker(OP_BEGIN, "Begin")?;
        let code_offset = reader.position();
        let code_byte = reader.read_u8()?;
        let code = OpCode::from_byte(code_byte).ok_or_else(|| {
            BridgeError::framing(code_offset, format!("unrecognized op code {}", code_byte))
        })?;

        let operation = match code {
            OpCode::MakeFunction => parse_make_function(&mut reader, memory)?,
            OpCode::InvokeNoReturnFunction => {
                let target = reader.read_u64()?;
                let args = parse_optional_args(&mut reader, &ctx)?;
                Operation::InvokeNoReturn { target, args }
            }
            OpCode::InvokeReturningFunction => {
                let target = reader.read_u64()?;
                let ret_offset = reader.position();
                let ret_byte = reader.read_u8()?;
                let ret = ReturnHint::from_byte(ret_byte).ok_or_else(|| {
                    BridgeError::framing(
                        ret_offset,
                        format!("unrecognized return type descriptor {}", ret_byte),
                    )
                })?;
                let args = parse_optional_args(&mut reader, &ctx)?;
                Operation::InvokeReturning { target, ret, args }
            }
            OpCode::InvokeCallbackFunction => parse_invoke_callback(&mut reader)?,
        };

        reader.expect_marker(OP_STOP, "Stop")?;
        operations.push(operation);
    }

    Ok(operations)
}

/// MakeFunction payload: `mem_alloc_addr(4) | target(8) | start(4) | len(4)`.
/// The body lives in linear memory at `mem_alloc_addr + start` and is UTF-8.
fn parse_make_function(reader: &mut Reader<'_>, memory: &[u8]) -> Result<Operation, BridgeError> {
    let alloc_addr = reader.read_u32()?;
    let target = reader.read_u64()?;
    let start = reader.read_u32()?;
    let len = reader.read_u32()?;

    let addr = (alloc_addr as u64) + (start as u64);
    if addr > u32::MAX as u64 {
        return Err(BridgeError::MemoryBounds {
            start: alloc_addr,
            len,
            size: memory.len(),
        });
    }
    let body = text::read_text(memory, addr as u32, len, Encoding::Utf8)?;
    Ok(Operation::MakeFunction { target, body })
}

/// Callback payload is a fixed single-reference frame:
/// `ArgStart | ArgBegin | extern_ref(8) | ArgEnd | ArgStop`.
fn parse_invoke_callback(reader: &mut Reader<'_>) -> Result<Operation, BridgeError> {
    let target = reader.read_u64()?;
    reader.expect_marker(ARG_START, "ArgStart")?;
    reader.expect_marker(ARG_BEGIN, "ArgBegin")?;
    let callback = reader.read_u64()?;
    reader.expect_marker(ARG_END, "ArgEnd")?;
    reader.expect_marker(ARG_STOP, "ArgStop")?;
    Ok(Operation::InvokeCallback { target, callback })
}

/// Invocations may omit their arguments frame entirely.
fn parse_optional_args(
    reader: &mut Reader<'_>,
    ctx: &ArgContext<'_>,
) -> Result<Vec<Value>, BridgeError> {
    match reader.peek_u8() {
        Some(ARG_START) => args::parse_frame(reader, ctx),
        _ => Ok(Vec::new()),
    }
}
