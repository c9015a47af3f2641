//! Readiness-gated bus transactions.
//!
//! Every command phase - send or receive - runs inside a [`Transaction`]:
//! wait for the readiness signal to show idle, assert selection, wait for the
//! peer to acknowledge by flipping the signal busy, settle, move bytes,
//! release. Release runs on every path, error paths included, via `Drop`.

use crate::error::{NinaError, Result};
use crate::protocol::reply::ReplySource;
use crate::transport::BusTransport;

/// How long the peer gets to acknowledge selection by raising busy.
const SELECT_ACK_MS: u32 = 1000;

/// Settle delay between the selection acknowledge and the first byte.
const SETTLE_MS: u32 = 1;

/// An open, selected bus transaction.
#[derive(Debug)]
pub(crate) struct Transaction<'a, B: BusTransport> {
    bus: &'a mut B,
}

impl<'a, B: BusTransport> Transaction<'a, B> {
    /// Wait for readiness and select the peer.
    ///
    /// Fails with [`NinaError::BusTimeout`] without touching the select line
    /// if the peer never shows idle, and releases selection before failing if
    /// the peer never acknowledges it. No bytes move on either failure.
    pub(crate) fn open(bus: &'a mut B, ready_wait_ms: u32) -> Result<Self> {
        wait_ready(bus, ready_wait_ms)?;

        bus.assert_select();

        let t0 = bus.now_ms();
        while bus.signal_is_ready() {
            if bus.now_ms().saturating_sub(t0) > u64::from(SELECT_ACK_MS) {
                bus.deassert_select();
                tracing::warn!("peer did not acknowledge selection");
                return Err(NinaError::BusTimeout);
            }
        }

        bus.sleep_ms(SETTLE_MS);
        Ok(Self { bus })
    }

    pub(crate) fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.bus.write_bytes(buf)?;
        Ok(())
    }
}

impl<B: BusTransport> ReplySource for Transaction<'_, B> {
    fn read_byte(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.bus.read_bytes(&mut b)?;
        Ok(b[0])
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.bus.read_bytes(buf)?;
        Ok(())
    }

    fn now_ms(&self) -> u64 {
        self.bus.now_ms()
    }
}

impl<B: BusTransport> Drop for Transaction<'_, B> {
    fn drop(&mut self) {
        // The transport waits out its own busy flag before dropping the line,
        // so no bytes are left in flight.
        self.bus.deassert_select();
    }
}

/// Wait for the readiness signal to show idle, without selecting.
pub(crate) fn wait_ready<B: BusTransport>(bus: &B, timeout_ms: u32) -> Result<()> {
    let t0 = bus.now_ms();
    while !bus.signal_is_ready() {
        if bus.now_ms().saturating_sub(t0) > u64::from(timeout_ms) {
            return Err(NinaError::BusTimeout);
        }
    }
    Ok(())
}
