//! TCP socket layer: DNS resolution and the socket lifecycle.
//!
//! Handles are allocated by the peer and owned by the caller; the driver
//! neither pools nor reference-counts them. One logical stream per handle at
//! a time, closed explicitly when done.

use crate::error::{NinaError, Result};
use crate::protocol::wire_format::{Command, LenMode};
use crate::session::Session;
use crate::transport::BusTransport;
use crate::xfer::XferOptions;

/// Largest payload slice carried by one send-data command.
pub(crate) const WRITE_CHUNK: usize = 64;

/// Allocator sentinel for "no socket available".
const NO_SOCKET: u8 = 255;

/// Connection mode byte for plain TCP.
const MODE_TCP: u8 = 0;

/// Peer-assigned socket handle (0-254).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketHandle(pub(crate) u8);

impl SocketHandle {
    /// Raw handle value.
    pub fn id(self) -> u8 {
        self.0
    }
}

impl<B: BusTransport> Session<B> {
    /// Resolve `host` to an IPv4 address through the peer's resolver.
    ///
    /// Two commands: a request by name, then a fetch of the result. A refusal
    /// or a short address is [`NinaError::DnsFailed`].
    pub fn resolve(&mut self, host: &str) -> Result<[u8; 4]> {
        let opts = self.base_opts();
        self.cmd_ack_only(Command::ReqHostByName, &[host.as_bytes()], opts)
            .map_err(|e| match e {
                NinaError::PeerError => NinaError::DnsFailed,
                other => other,
            })?;

        let mut ip = [0u8; 4];
        let summary = self.cmd_simple(Command::GetHostByName, &[], &mut ip)?;
        if summary.copied < 4 {
            tracing::warn!(host, got = summary.copied, "short resolver reply");
            return Err(NinaError::DnsFailed);
        }
        tracing::debug!(host, ip = ?ip, "resolved");
        Ok(ip)
    }

    /// Allocate a socket handle.
    pub fn socket_alloc(&mut self) -> Result<SocketHandle> {
        let mut handle = [0u8; 1];
        let summary = self.cmd_simple(Command::GetSocket, &[], &mut handle)?;
        if summary.copied < 1 {
            return Err(NinaError::ShortReply);
        }
        if handle[0] == NO_SOCKET {
            return Err(NinaError::SocketExhausted);
        }
        Ok(SocketHandle(handle[0]))
    }

    /// Open a TCP connection to `ip:port` on `sock`.
    pub fn socket_open(&mut self, sock: SocketHandle, ip: [u8; 4], port: u16) -> Result<()> {
        let opts = self.base_opts();
        let port_be = port.to_be_bytes();
        self.cmd_ack_only(
            Command::StartClientTcp,
            &[&ip, &port_be, &[sock.0], &[MODE_TCP]],
            opts,
        )
    }

    /// Write `data` to an open socket; returns the bytes the peer accepted.
    ///
    /// The payload goes out in chunks of at most 64 bytes; the reply to each
    /// chunk echoes the count actually accepted. A short echo ends the loop
    /// and reports [`NinaError::PartialSend`] with the cumulative count - the
    /// caller decides whether to retry. The finalize command runs either way
    /// so the peer flushes what it took.
    pub fn socket_write(&mut self, sock: SocketHandle, data: &[u8]) -> Result<usize> {
        let mut sent_total = 0usize;
        let mut short = false;

        for chunk in data.chunks(WRITE_CHUNK) {
            let opts = XferOptions {
                tx_len: LenMode::U16,
                ..self.base_opts()
            };
            let mut echo = [0u8; 1];
            let summary = self.cmd_xfer(
                Command::SendDataTcp,
                &[&[sock.0], chunk],
                Some(&mut echo),
                opts,
            )?;
            if summary.copied < 1 {
                return Err(NinaError::ShortReply);
            }

            let accepted = usize::from(echo[0]);
            sent_total += accepted;
            if accepted < chunk.len() {
                tracing::warn!(
                    sock = sock.0,
                    accepted,
                    offered = chunk.len(),
                    "peer accepted a short chunk"
                );
                short = true;
                break;
            }
        }

        let finalize = self.base_opts();
        self.cmd_ack_only(Command::DataSentTcp, &[&[sock.0]], finalize)?;

        if short {
            return Err(NinaError::PartialSend { sent: sent_total });
        }
        Ok(sent_total)
    }

    /// Bytes buffered by the peer for reading (little-endian on the wire).
    pub fn socket_available(&mut self, sock: SocketHandle) -> Result<u16> {
        let mut count = [0u8; 2];
        let summary = self.cmd_simple(Command::AvailDataTcp, &[&[sock.0]], &mut count)?;
        if summary.copied < 2 {
            return Err(NinaError::ShortReply);
        }
        Ok(u16::from_le_bytes(count))
    }

    /// Read up to `buf.len()` bytes; returns the count actually delivered.
    ///
    /// This command uses 16-bit length framing in both directions.
    pub fn socket_read(&mut self, sock: SocketHandle, buf: &mut [u8]) -> Result<usize> {
        let want = buf.len().min(LenMode::U16.max_len()) as u16;
        let size_be = want.to_be_bytes();
        let opts = XferOptions {
            tx_len: LenMode::U16,
            rx_len: LenMode::U16,
            ..self.base_opts()
        };
        let summary = self.cmd_xfer(
            Command::GetDatabufTcp,
            &[&[sock.0], &size_be],
            Some(&mut buf[..usize::from(want)]),
            opts,
        )?;
        Ok(summary.copied)
    }

    /// Close a socket, best-effort.
    ///
    /// Close runs on cleanup and error paths, so failures are logged and
    /// swallowed rather than allowed to mask the original error.
    pub fn socket_close(&mut self, sock: SocketHandle) {
        let opts = self.base_opts();
        let result = self.cmd_xfer(Command::StopClientTcp, &[&[sock.0]], None, opts);
        if let Err(e) = result {
            tracing::debug!(sock = sock.0, error = %e, "close failed");
        }
    }
}
