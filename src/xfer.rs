//! Command transceiver: one blocking send-then-receive exchange per command.
//!
//! A transfer is two independent, readiness-gated bus transactions - the
//! request burst, then the reply parse - with no overlap between outstanding
//! commands. `cmd_xfer` copies at most the first reply parameter;
//! `cmd_xfer_iter` delivers every parameter to a callback; `cmd_simple` and
//! `cmd_ack_only` fix the common shapes.

use crate::bus::Transaction;
use crate::error::{NinaError, Result};
use crate::protocol::frame::encode_request;
use crate::protocol::reply::{read_reply, ParamSink, ReplySummary};
use crate::protocol::wire_format::{Command, LenMode};
use crate::session::Session;
use crate::transport::BusTransport;

/// Default readiness wait before each bus phase.
pub(crate) const DEFAULT_READY_WAIT_MS: u32 = 2_000;

/// Default window for the reply's start marker (and its end-marker drain).
pub(crate) const DEFAULT_REPLY_WAIT_MS: u32 = 1_000;

/// Per-call transfer options.
#[derive(Debug, Clone, Copy)]
pub(crate) struct XferOptions {
    /// Length-field width for request parameters.
    pub tx_len: LenMode,
    /// Length-field width expected in the reply.
    pub rx_len: LenMode,
    /// Readiness wait applied before each of the two bus phases.
    pub ready_wait_ms: u32,
    /// Window for the reply frame's markers.
    pub reply_wait_ms: u32,
}

impl Default for XferOptions {
    fn default() -> Self {
        Self {
            tx_len: LenMode::U8,
            rx_len: LenMode::U8,
            ready_wait_ms: DEFAULT_READY_WAIT_MS,
            reply_wait_ms: DEFAULT_REPLY_WAIT_MS,
        }
    }
}

impl<B: BusTransport> Session<B> {
    /// Send `cmd` with `params`, then receive its reply.
    ///
    /// If `reply` is given, the first reply parameter is copied into it up to
    /// capacity; everything else is drained. Blocking and exclusive: the bus
    /// and the peer's command queue belong to this call until it returns.
    pub(crate) fn cmd_xfer(
        &mut self,
        cmd: Command,
        params: &[&[u8]],
        reply: Option<&mut [u8]>,
        opts: XferOptions,
    ) -> Result<ReplySummary> {
        self.send_request(cmd, params, opts)?;

        let mut tx = Transaction::open(&mut self.bus, opts.ready_wait_ms)?;
        let sink = match reply {
            Some(buf) => ParamSink::FirstInto(buf),
            None => ParamSink::Discard,
        };
        read_reply(&mut tx, cmd, opts.rx_len, opts.reply_wait_ms, sink)
    }

    /// [`cmd_xfer`](Self::cmd_xfer), but every reply parameter goes to
    /// `on_param` with its index. Used for commands whose reply is a list.
    pub(crate) fn cmd_xfer_iter(
        &mut self,
        cmd: Command,
        params: &[&[u8]],
        opts: XferOptions,
        on_param: &mut dyn FnMut(u8, &[u8]) -> Result<()>,
    ) -> Result<ReplySummary> {
        self.send_request(cmd, params, opts)?;

        let mut tx = Transaction::open(&mut self.bus, opts.ready_wait_ms)?;
        read_reply(
            &mut tx,
            cmd,
            opts.rx_len,
            opts.reply_wait_ms,
            ParamSink::Each(on_param),
        )
    }

    /// Ordinary query with the session's default timeouts and 8-bit lengths.
    pub(crate) fn cmd_simple(
        &mut self,
        cmd: Command,
        params: &[&[u8]],
        reply: &mut [u8],
    ) -> Result<ReplySummary> {
        let opts = self.base_opts();
        self.cmd_xfer(cmd, params, Some(reply), opts)
    }

    /// Command whose reply must be a single parameter with first byte 1.
    ///
    /// A missing or empty parameter is a [`NinaError::ShortReply`]; any ack
    /// byte other than 1 is a refusal from the peer.
    pub(crate) fn cmd_ack_only(
        &mut self,
        cmd: Command,
        params: &[&[u8]],
        opts: XferOptions,
    ) -> Result<()> {
        let mut ack = [0u8; 1];
        let summary = self.cmd_xfer(cmd, params, Some(&mut ack), opts)?;
        if summary.param_count < 1 || summary.copied < 1 {
            return Err(NinaError::ShortReply);
        }
        if ack[0] != 1 {
            tracing::warn!(cmd = cmd.id(), ack = ack[0], "command not acknowledged");
            return Err(NinaError::PeerError);
        }
        Ok(())
    }

    fn send_request(&mut self, cmd: Command, params: &[&[u8]], opts: XferOptions) -> Result<()> {
        let frame = encode_request(cmd, params, opts.tx_len)?;
        let mut tx = Transaction::open(&mut self.bus, opts.ready_wait_ms)?;
        tx.write(&frame)
    }
}
