//! Request frame encoder.
//!
//! Builds a complete, padded request as one contiguous buffer so the bus
//! phase is a single burst: start marker, command id with the reply flag
//! cleared, parameter count, each parameter as a length field plus its bytes,
//! end marker, then zero padding to a 4-byte boundary.

use bytes::{BufMut, BytesMut};

use crate::error::{NinaError, Result};

use super::wire_format::{pad_len, Command, LenMode, END_FRAME, REPLY_FLAG, START_FRAME};

/// Encode a request frame, padding included.
///
/// Fails with [`NinaError::ParamTooLong`] if any parameter does not fit the
/// chosen length-field width.
pub fn encode_request(cmd: Command, params: &[&[u8]], tx_len: LenMode) -> Result<BytesMut> {
    let body: usize = params.iter().map(|p| tx_len.width() + p.len()).sum();
    let unpadded = 3 + body + 1;
    let mut buf = BytesMut::with_capacity(unpadded + pad_len(unpadded));

    buf.put_u8(START_FRAME);
    buf.put_u8(cmd.id() & !REPLY_FLAG);
    buf.put_u8(params.len() as u8);

    for p in params {
        if p.len() > tx_len.max_len() {
            return Err(NinaError::ParamTooLong);
        }
        match tx_len {
            LenMode::U8 => buf.put_u8(p.len() as u8),
            LenMode::U16 => buf.put_u16(p.len() as u16),
        }
        buf.put_slice(p);
    }

    buf.put_u8(END_FRAME);
    buf.put_bytes(0, pad_len(buf.len()));
    Ok(buf)
}
