//! Bus transport contract - the collaborator boundary.
//!
//! Everything hardware-specific lives behind [`BusTransport`]: the raw byte
//! lanes, the chip-select line, the out-of-band readiness GPIO, the
//! millisecond clock, and the reset line. The driver never touches a register
//! or a pin directly; it only sequences calls on this trait.
//!
//! Implementations are expected to be simple I/O wrappers with no protocol
//! logic of their own.

use thiserror::Error;

/// Error from a raw byte transfer.
///
/// Deliberately opaque: by the time a transfer fails at this level, the
/// transaction is unrecoverable and the driver's response is the same
/// regardless of the hardware cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("raw bus transfer failed")]
pub struct TransportError;

/// Byte-oriented bus with an auxiliary readiness signal.
///
/// The readiness signal is the peer's substitute for an interrupt line:
/// "ready" (idle) means the peer may be selected, and after selection the peer
/// acknowledges by flipping the signal to busy while it services the
/// transaction.
pub trait BusTransport {
    /// Transmit the whole buffer.
    fn write_bytes(&mut self, buf: &[u8]) -> Result<(), TransportError>;

    /// Receive exactly `buf.len()` bytes.
    ///
    /// Clocking out one byte at a time is acceptable; the driver never asks
    /// for more than it will consume.
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), TransportError>;

    /// Drive the selection line active.
    fn assert_select(&mut self);

    /// Release the selection line.
    ///
    /// Must block until the transport's own busy flag clears first, so that
    /// no bytes are left in flight when the line drops.
    fn deassert_select(&mut self);

    /// True when the readiness signal shows idle (peer not busy).
    fn signal_is_ready(&self) -> bool;

    /// Monotonic millisecond tick.
    fn now_ms(&self) -> u64;

    /// Block the calling thread for `ms` milliseconds.
    fn sleep_ms(&mut self, ms: u32);

    /// Pulse the reset line low then high and wait out the peer's boot time
    /// (on the order of 750 ms).
    fn hardware_reset(&mut self);
}
