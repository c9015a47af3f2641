//! Reply frame parser.
//!
//! Parsing is pull-based: bytes are consumed one at a time from a
//! [`ReplySource`] so the parser can run directly against an open bus
//! transaction, where every byte is clocked out on demand. Scratch space is
//! bounded - parameters nobody asked for, and oversized ones, are drained in
//! fixed-size chunks instead of being buffered whole.
//!
//! Anomalies that the peer firmware is known to produce (a masked command id
//! that does not match the request, a reply without the reply flag) are
//! logged and recorded on the [`ReplySummary`], but the frame is still parsed
//! in full; callers decide whether a mismatch is fatal.

use crate::error::{NinaError, Result};

use super::wire_format::{command_id, Command, LenMode, END_FRAME, ERR_FRAME, REPLY_FLAG, START_FRAME};

/// Chunk size used to drain parameter bytes nobody asked for.
const DRAIN_CHUNK: usize = 32;

/// Bounded scratch for delivering parameters to a callback. Parameters larger
/// than this are drained without delivery.
const CALLBACK_SCRATCH: usize = 256;

/// Byte-at-a-time view of an open receive transaction.
pub trait ReplySource {
    /// Clock out a single byte.
    fn read_byte(&mut self) -> Result<u8>;

    /// Clock out exactly `buf.len()` bytes.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Millisecond clock, used to bound the marker scans.
    fn now_ms(&self) -> u64;
}

/// Destination for reply parameters.
pub enum ParamSink<'a> {
    /// Copy the first parameter into the buffer, up to its capacity; excess
    /// and all later parameters are drained.
    FirstInto(&'a mut [u8]),
    /// Deliver every parameter to the callback with its index. An error from
    /// the callback aborts the transaction.
    Each(&'a mut dyn FnMut(u8, &[u8]) -> Result<()>),
    /// Drain everything.
    Discard,
}

/// What the parser observed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplySummary {
    /// Number of parameters the peer declared.
    pub param_count: u8,
    /// Bytes copied into a [`ParamSink::FirstInto`] buffer.
    pub copied: usize,
    /// The masked command id differed from the expected command.
    pub cmd_mismatch: bool,
    /// The reply flag was not set on the command byte.
    pub missing_reply_flag: bool,
}

/// Parse one reply frame for `expected`.
///
/// Scans to the start marker, tolerating leading padding and noise within
/// `reply_wait_ms`; an error marker seen during the scan fails immediately
/// with [`NinaError::PeerError`]. Parameters go to `sink`, then bytes are
/// consumed through the end marker. The end-marker scan shares the same
/// window so no parse loop is unbounded.
pub fn read_reply<S: ReplySource>(
    src: &mut S,
    expected: Command,
    rx_len: LenMode,
    reply_wait_ms: u32,
    mut sink: ParamSink<'_>,
) -> Result<ReplySummary> {
    scan_for(src, START_FRAME, reply_wait_ms, true)?;

    let raw_cmd = src.read_byte()?;
    let param_count = src.read_byte()?;

    let mut summary = ReplySummary {
        param_count,
        ..Default::default()
    };
    if raw_cmd & REPLY_FLAG == 0 {
        summary.missing_reply_flag = true;
        tracing::warn!(cmd = raw_cmd, "reply without reply flag");
    }
    if command_id(raw_cmd) != expected.id() {
        summary.cmd_mismatch = true;
        tracing::warn!(
            got = command_id(raw_cmd),
            expected = expected.id(),
            "unexpected reply command id"
        );
    }

    for index in 0..param_count {
        let len = read_param_len(src, rx_len)?;
        match &mut sink {
            ParamSink::FirstInto(buf) if index == 0 => {
                let to_copy = len.min(buf.len());
                src.read_exact(&mut buf[..to_copy])?;
                summary.copied = to_copy;
                drain(src, len - to_copy)?;
            }
            ParamSink::Each(cb) => {
                if len <= CALLBACK_SCRATCH {
                    let mut scratch = [0u8; CALLBACK_SCRATCH];
                    src.read_exact(&mut scratch[..len])?;
                    cb(index, &scratch[..len])?;
                } else {
                    // Too large for the bounded scratch: drained, not delivered.
                    drain(src, len)?;
                }
            }
            _ => drain(src, len)?,
        }
    }

    scan_for(src, END_FRAME, reply_wait_ms, false)?;
    Ok(summary)
}

/// Consume bytes until `marker` appears or the window elapses.
fn scan_for<S: ReplySource>(
    src: &mut S,
    marker: u8,
    window_ms: u32,
    fail_on_err_marker: bool,
) -> Result<()> {
    let t0 = src.now_ms();
    loop {
        let b = src.read_byte()?;
        if b == marker {
            return Ok(());
        }
        if fail_on_err_marker && b == ERR_FRAME {
            return Err(NinaError::PeerError);
        }
        if src.now_ms().saturating_sub(t0) > u64::from(window_ms) {
            return Err(NinaError::ReplyTimeout);
        }
    }
}

fn read_param_len<S: ReplySource>(src: &mut S, rx_len: LenMode) -> Result<usize> {
    Ok(match rx_len {
        LenMode::U8 => usize::from(src.read_byte()?),
        LenMode::U16 => {
            let hi = src.read_byte()?;
            let lo = src.read_byte()?;
            usize::from(u16::from_be_bytes([hi, lo]))
        }
    })
}

fn drain<S: ReplySource>(src: &mut S, mut rem: usize) -> Result<()> {
    let mut dump = [0u8; DRAIN_CHUNK];
    while rem > 0 {
        let n = rem.min(DRAIN_CHUNK);
        src.read_exact(&mut dump[..n])?;
        rem -= n;
    }
    Ok(())
}
