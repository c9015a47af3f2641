//! Session: the driver instance and the connection state machine.
//!
//! A [`Session`] owns the bus handle and the timing configuration, nothing
//! else - connection and socket state live in the co-processor and are
//! queried, never cached. Use [`SessionBuilder`] to tune timeouts, then
//! [`init`](Session::init) to reset the peer and read its identity.
//!
//! # Example
//!
//! ```ignore
//! use ninawire::Session;
//!
//! let mut session = Session::builder(transport)
//!     .connect_timeout_ms(20_000)
//!     .build();
//!
//! let info = session.init()?;
//! println!("firmware {} mac {:02X?}", info.firmware, info.mac);
//!
//! session.connect_psk("lab", "hunter2", None)?;
//! let ip = session.get_ip()?;
//! ```

use crate::bus;
use crate::error::{NinaError, Result};
use crate::protocol::wire_format::Command;
use crate::transport::BusTransport;
use crate::xfer::{XferOptions, DEFAULT_READY_WAIT_MS, DEFAULT_REPLY_WAIT_MS};

/// Enterprise recovery thresholds. Tuned against observed radio behavior;
/// policy, not protocol.
const NO_SSID_REASSERT_AFTER_MS: u64 = 2_000;
const NO_SSID_RESCAN_AFTER_MS: u64 = 4_000;
const RESCAN_SETTLE_MS: u32 = 1_200;
/// Consecutive failed status polls before the network name is asserted again.
const REASSERT_ERR_STREAK: u32 = 6;
const REASSERT_SETTLE_MS: u32 = 1_500;
/// Backoff between failed status polls: base + step per consecutive error,
/// with the step part capped.
const ERR_BACKOFF_BASE_MS: u32 = 200;
const ERR_BACKOFF_STEP_MS: u32 = 50;
const ERR_BACKOFF_CAP_MS: u32 = 500;

/// Timing configuration, all in milliseconds.
///
/// Per-phase waits pace the protocol; overall deadlines are policy. Every
/// field is caller-tunable through [`SessionBuilder`].
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    /// Readiness wait for ordinary commands.
    pub ready_wait_ms: u32,
    /// Reply window for ordinary commands.
    pub reply_wait_ms: u32,
    /// Readiness wait for scan commands (the peer sweeps channels first).
    pub scan_ready_wait_ms: u32,
    /// Reply window for scan commands.
    pub scan_reply_wait_ms: u32,
    /// Readiness wait for status polls during association.
    pub status_ready_wait_ms: u32,
    /// Overall scan deadline.
    pub scan_timeout_ms: u32,
    /// Delay between empty scan polls.
    pub scan_poll_delay_ms: u32,
    /// Default overall deadline for pre-shared-key association.
    pub connect_timeout_ms: u32,
    /// Delay between association status polls.
    pub status_poll_delay_ms: u32,
    /// Default overall deadline for enterprise association.
    pub enterprise_timeout_ms: u32,
    /// Delay between enterprise status polls.
    pub enterprise_poll_delay_ms: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            ready_wait_ms: DEFAULT_READY_WAIT_MS,
            reply_wait_ms: DEFAULT_REPLY_WAIT_MS,
            scan_ready_wait_ms: 8_000,
            scan_reply_wait_ms: 2_000,
            status_ready_wait_ms: 8_000,
            scan_timeout_ms: 15_000,
            scan_poll_delay_ms: 250,
            connect_timeout_ms: 15_000,
            status_poll_delay_ms: 200,
            enterprise_timeout_ms: 30_000,
            enterprise_poll_delay_ms: 250,
        }
    }
}

/// Link state reported by the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Idle,
    NoSsidAvailable,
    ScanCompleted,
    Connected,
    ConnectFailed,
    ConnectionLost,
    Disconnected,
    /// Unrecognized wire value, carried through losslessly.
    Other(u8),
}

impl ConnectionStatus {
    pub(crate) fn from_wire(raw: u8) -> Self {
        match raw {
            0 => Self::Idle,
            1 => Self::NoSsidAvailable,
            2 => Self::ScanCompleted,
            3 => Self::Connected,
            4 => Self::ConnectFailed,
            5 => Self::ConnectionLost,
            6 => Self::Disconnected,
            other => Self::Other(other),
        }
    }
}

/// Cipher reported per scan result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encryption {
    Tkip,
    Ccmp,
    Wep,
    Open,
    Auto,
    /// Unrecognized wire value.
    Unknown(u8),
}

impl Encryption {
    fn from_wire(raw: u8) -> Self {
        match raw {
            2 => Self::Tkip,
            4 => Self::Ccmp,
            5 => Self::Wep,
            7 => Self::Open,
            8 => Self::Auto,
            other => Self::Unknown(other),
        }
    }
}

/// One scan result, with the per-index metadata already fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    /// Network name (lossy UTF-8; SSIDs are raw bytes on the air).
    pub ssid: String,
    /// Signal strength in dBm.
    pub rssi_dbm: i8,
    /// 2.4 GHz channel number.
    pub channel: u8,
    /// Cipher in use.
    pub encryption: Encryption,
    /// Access point hardware address.
    pub bssid: [u8; 6],
}

/// Peer identity read during [`Session::init`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Firmware version string, e.g. `"1.7.4"`.
    pub firmware: String,
    /// Station MAC address.
    pub mac: [u8; 6],
}

/// Driver instance. Owns the bus; all operations are blocking and exclusive.
pub struct Session<B: BusTransport> {
    pub(crate) bus: B,
    pub(crate) timing: Timing,
}

/// Fluent configuration for a [`Session`].
pub struct SessionBuilder<B: BusTransport> {
    bus: B,
    timing: Timing,
}

impl<B: BusTransport> SessionBuilder<B> {
    /// Readiness wait for ordinary commands. Default: 2 s.
    pub fn ready_wait_ms(mut self, ms: u32) -> Self {
        self.timing.ready_wait_ms = ms;
        self
    }

    /// Reply window for ordinary commands. Default: 1 s.
    pub fn reply_wait_ms(mut self, ms: u32) -> Self {
        self.timing.reply_wait_ms = ms;
        self
    }

    /// Overall scan deadline. Default: 15 s.
    pub fn scan_timeout_ms(mut self, ms: u32) -> Self {
        self.timing.scan_timeout_ms = ms;
        self
    }

    /// Default overall PSK association deadline. Default: 15 s.
    pub fn connect_timeout_ms(mut self, ms: u32) -> Self {
        self.timing.connect_timeout_ms = ms;
        self
    }

    /// Default overall enterprise association deadline. Default: 30 s.
    pub fn enterprise_timeout_ms(mut self, ms: u32) -> Self {
        self.timing.enterprise_timeout_ms = ms;
        self
    }

    /// Replace the whole timing table.
    pub fn timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Finish configuration.
    pub fn build(self) -> Session<B> {
        Session {
            bus: self.bus,
            timing: self.timing,
        }
    }
}

impl<B: BusTransport> Session<B> {
    /// Create a session with default timing.
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            timing: Timing::default(),
        }
    }

    /// Start configuring a session.
    pub fn builder(bus: B) -> SessionBuilder<B> {
        SessionBuilder {
            bus,
            timing: Timing::default(),
        }
    }

    /// Tear down and return the bus handle.
    pub fn into_inner(self) -> B {
        self.bus
    }

    /// Reset the peer and read its identity.
    pub fn init(&mut self) -> Result<SessionInfo> {
        self.bus.hardware_reset();
        let firmware = self.firmware_version()?;
        let mac = self.mac_address()?;
        tracing::debug!(%firmware, ?mac, "co-processor up");
        Ok(SessionInfo { firmware, mac })
    }

    /// Firmware version string.
    pub fn firmware_version(&mut self) -> Result<String> {
        let mut buf = [0u8; 64];
        let summary = self.cmd_simple(Command::GetFwVersion, &[], &mut buf)?;
        if summary.copied == 0 {
            return Err(NinaError::ShortReply);
        }
        let end = buf[..summary.copied]
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(summary.copied);
        Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
    }

    /// Station MAC address.
    pub fn mac_address(&mut self) -> Result<[u8; 6]> {
        let mut mac = [0u8; 6];
        let summary = self.cmd_simple(Command::GetMacAddr, &[&[0xFF]], &mut mac)?;
        if summary.copied < 6 {
            return Err(NinaError::ShortReply);
        }
        Ok(mac)
    }

    /// Current link state.
    pub fn connection_status(&mut self) -> Result<ConnectionStatus> {
        self.connection_status_with(self.timing.ready_wait_ms)
    }

    fn connection_status_with(&mut self, ready_wait_ms: u32) -> Result<ConnectionStatus> {
        let opts = XferOptions {
            ready_wait_ms,
            ..self.base_opts()
        };
        let mut status = [0u8; 1];
        let summary = self.cmd_xfer(Command::GetConnStatus, &[], Some(&mut status), opts)?;
        if summary.copied < 1 {
            return Err(NinaError::ShortReply);
        }
        Ok(ConnectionStatus::from_wire(status[0]))
    }

    /// Local IPv4 address.
    pub fn get_ip(&mut self) -> Result<[u8; 4]> {
        let mut ip = [0u8; 4];
        let summary = self.cmd_simple(Command::GetIpAddr, &[&[0xFF]], &mut ip)?;
        if summary.copied < 4 {
            return Err(NinaError::ShortReply);
        }
        Ok(ip)
    }

    /// Wait for the peer's readiness signal to show idle, without selecting.
    pub fn wait_ready(&self, timeout_ms: u32) -> Result<()> {
        bus::wait_ready(&self.bus, timeout_ms)
    }

    /// Default per-call options derived from the session's timing table.
    pub(crate) fn base_opts(&self) -> XferOptions {
        XferOptions {
            ready_wait_ms: self.timing.ready_wait_ms,
            reply_wait_ms: self.timing.reply_wait_ms,
            ..XferOptions::default()
        }
    }

    fn scan_opts(&self) -> XferOptions {
        XferOptions {
            ready_wait_ms: self.timing.scan_ready_wait_ms,
            reply_wait_ms: self.timing.scan_reply_wait_ms,
            ..XferOptions::default()
        }
    }

    /// Sweep for visible networks.
    ///
    /// Kicks off a scan, then polls for the result list until something shows
    /// up or the scan deadline passes; a timeout during polling means the
    /// peer is still sweeping and is retried. Per-network metadata is fetched
    /// with one follow-up command per attribute. An empty sweep is a success
    /// with no results.
    pub fn scan(&mut self) -> Result<Vec<NetworkInfo>> {
        let opts = self.scan_opts();
        self.cmd_ack_only(Command::StartScanNetworks, &[], opts)?;

        let deadline = self.bus.now_ms() + u64::from(self.timing.scan_timeout_ms);
        let mut ssids: Vec<String> = Vec::new();

        loop {
            ssids.clear();
            let polled = self.cmd_xfer_iter(Command::ScanNetworks, &[], opts, &mut |_, bytes| {
                ssids.push(String::from_utf8_lossy(bytes).into_owned());
                Ok(())
            });

            match polled {
                // Still sweeping; not an error.
                Err(NinaError::BusTimeout) | Err(NinaError::ReplyTimeout) => {}
                Err(e) => return Err(e),
                Ok(_) if !ssids.is_empty() => break,
                Ok(_) => {}
            }

            if self.bus.now_ms() >= deadline {
                tracing::debug!("scan deadline passed with no results");
                break;
            }
            self.bus.sleep_ms(self.timing.scan_poll_delay_ms);
        }

        let mut networks = Vec::with_capacity(ssids.len());
        for (index, ssid) in ssids.into_iter().enumerate() {
            networks.push(self.network_details(index as u8, ssid)?);
        }
        tracing::debug!(count = networks.len(), "scan complete");
        Ok(networks)
    }

    fn network_details(&mut self, index: u8, ssid: String) -> Result<NetworkInfo> {
        let mut rssi = [0u8; 1];
        self.scan_attr(Command::GetIdxRssi, index, &mut rssi)?;
        let mut channel = [0u8; 1];
        self.scan_attr(Command::GetIdxChannel, index, &mut channel)?;
        let mut enc = [0u8; 1];
        self.scan_attr(Command::GetIdxEncType, index, &mut enc)?;
        let mut bssid = [0u8; 6];
        self.scan_attr(Command::GetIdxBssid, index, &mut bssid)?;

        Ok(NetworkInfo {
            ssid,
            rssi_dbm: rssi[0] as i8,
            channel: channel[0],
            encryption: Encryption::from_wire(enc[0]),
            bssid,
        })
    }

    fn scan_attr(&mut self, cmd: Command, index: u8, buf: &mut [u8]) -> Result<()> {
        let want = buf.len();
        let summary = self.cmd_simple(cmd, &[&[index]], buf)?;
        if summary.copied < want {
            return Err(NinaError::ShortReply);
        }
        Ok(())
    }

    /// Associate with a network using a pre-shared key.
    ///
    /// An empty passphrase selects an open network. Status is polled until
    /// `Connected`, `ConnectFailed`, or the deadline; timeouts during a poll
    /// are retried, an explicit peer error aborts.
    pub fn connect_psk(&mut self, ssid: &str, pass: &str, timeout_ms: Option<u32>) -> Result<()> {
        let opts = self.base_opts();
        if pass.is_empty() {
            self.cmd_ack_only(Command::SetNetwork, &[ssid.as_bytes()], opts)?;
        } else {
            self.cmd_ack_only(
                Command::SetPassphrase,
                &[ssid.as_bytes(), pass.as_bytes()],
                opts,
            )?;
        }

        let deadline = self.bus.now_ms()
            + u64::from(timeout_ms.unwrap_or(self.timing.connect_timeout_ms));

        loop {
            match self.connection_status() {
                Ok(ConnectionStatus::Connected) => {
                    tracing::debug!(ssid, "associated");
                    return Ok(());
                }
                Ok(ConnectionStatus::ConnectFailed) => {
                    tracing::warn!(ssid, "association refused");
                    return Err(NinaError::AssociationFailed);
                }
                Ok(status) => tracing::trace!(?status, "still associating"),
                Err(NinaError::PeerError) => return Err(NinaError::PeerError),
                Err(NinaError::BusTimeout) | Err(NinaError::ReplyTimeout) => {
                    tracing::debug!("status poll not ready, retrying");
                }
                Err(e) => return Err(e),
            }

            if self.bus.now_ms() >= deadline {
                tracing::warn!(ssid, "association deadline passed");
                return Err(NinaError::AssociationTimeout);
            }
            self.bus.sleep_ms(self.timing.status_poll_delay_ms);
        }
    }

    /// Associate with an 802.1X enterprise network.
    ///
    /// Sets the network name, then identity, username, password, and the
    /// enable command, each acknowledged. The status poll carries recovery
    /// heuristics: the network name is asserted again once if the peer still
    /// reports it unseen after 2 s, a scan is re-kicked once after 4 s, and
    /// after six consecutive failed polls the name is asserted one more time.
    /// Failed polls back off linearly.
    pub fn connect_enterprise(
        &mut self,
        ssid: &str,
        username: &str,
        password: &str,
        anon_identity: &str,
        timeout_ms: Option<u32>,
    ) -> Result<()> {
        let defaults = self.base_opts();
        self.cmd_ack_only(Command::SetNetwork, &[ssid.as_bytes()], defaults)?;
        self.cmd_ack_only(Command::SetEntIdentity, &[anon_identity.as_bytes()], defaults)?;
        self.cmd_ack_only(Command::SetEntUsername, &[username.as_bytes()], defaults)?;
        self.cmd_ack_only(Command::SetEntPassword, &[password.as_bytes()], defaults)?;
        self.cmd_ack_only(Command::SetEntEnable, &[], defaults)?;

        let t0 = self.bus.now_ms();
        let deadline = t0 + u64::from(timeout_ms.unwrap_or(self.timing.enterprise_timeout_ms));

        let mut resent_ssid = false;
        let mut kicked_scan = false;
        let mut err_streak: u32 = 0;

        loop {
            if self.bus.now_ms() >= deadline {
                tracing::warn!(ssid, "enterprise association deadline passed");
                return Err(NinaError::AssociationTimeout);
            }

            match self.connection_status_with(self.timing.status_ready_wait_ms) {
                Ok(status) => {
                    err_streak = 0;
                    match status {
                        ConnectionStatus::Connected => {
                            tracing::debug!(ssid, "enterprise associated");
                            return Ok(());
                        }
                        ConnectionStatus::ConnectFailed => {
                            tracing::warn!(ssid, "enterprise association refused");
                            return Err(NinaError::AssociationFailed);
                        }
                        ConnectionStatus::NoSsidAvailable => {
                            let elapsed = self.bus.now_ms().saturating_sub(t0);
                            if !resent_ssid && elapsed > NO_SSID_REASSERT_AFTER_MS {
                                self.reassert_ssid(ssid);
                                resent_ssid = true;
                            }
                            if !kicked_scan && elapsed > NO_SSID_RESCAN_AFTER_MS {
                                let opts = self.scan_opts();
                                let mut ack = [0u8; 1];
                                let kicked = self.cmd_xfer(
                                    Command::StartScanNetworks,
                                    &[],
                                    Some(&mut ack),
                                    opts,
                                );
                                tracing::debug!(ok = kicked.is_ok(), "re-kicked scan");
                                kicked_scan = true;
                                self.bus.sleep_ms(RESCAN_SETTLE_MS);
                            }
                        }
                        other => tracing::trace!(status = ?other, "still associating"),
                    }
                    self.bus.sleep_ms(self.timing.enterprise_poll_delay_ms);
                }
                Err(NinaError::PeerError) => return Err(NinaError::PeerError),
                Err(e) => {
                    err_streak += 1;
                    tracing::warn!(error = %e, streak = err_streak, "status poll failed");

                    // Give the peer a chance to settle, then back off harder
                    // the longer the streak runs.
                    let _ = self.wait_ready(self.timing.status_ready_wait_ms);
                    let step = (err_streak * ERR_BACKOFF_STEP_MS).min(ERR_BACKOFF_CAP_MS);
                    self.bus.sleep_ms(ERR_BACKOFF_BASE_MS + step);

                    if err_streak == REASSERT_ERR_STREAK {
                        self.reassert_ssid(ssid);
                        self.bus.sleep_ms(REASSERT_SETTLE_MS);
                    }
                }
            }
        }
    }

    fn reassert_ssid(&mut self, ssid: &str) {
        let opts = self.base_opts();
        let mut ack = [0u8; 1];
        let result = self.cmd_xfer(Command::SetNetwork, &[ssid.as_bytes()], Some(&mut ack), opts);
        tracing::debug!(ok = result.is_ok(), ack = ack[0], "reasserted network name");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_status_from_wire() {
        assert_eq!(ConnectionStatus::from_wire(0), ConnectionStatus::Idle);
        assert_eq!(
            ConnectionStatus::from_wire(1),
            ConnectionStatus::NoSsidAvailable
        );
        assert_eq!(
            ConnectionStatus::from_wire(2),
            ConnectionStatus::ScanCompleted
        );
        assert_eq!(ConnectionStatus::from_wire(3), ConnectionStatus::Connected);
        assert_eq!(
            ConnectionStatus::from_wire(4),
            ConnectionStatus::ConnectFailed
        );
        assert_eq!(
            ConnectionStatus::from_wire(5),
            ConnectionStatus::ConnectionLost
        );
        assert_eq!(
            ConnectionStatus::from_wire(6),
            ConnectionStatus::Disconnected
        );
        assert_eq!(
            ConnectionStatus::from_wire(0x2A),
            ConnectionStatus::Other(0x2A)
        );
    }

    #[test]
    fn test_encryption_from_wire() {
        assert_eq!(Encryption::from_wire(2), Encryption::Tkip);
        assert_eq!(Encryption::from_wire(4), Encryption::Ccmp);
        assert_eq!(Encryption::from_wire(5), Encryption::Wep);
        assert_eq!(Encryption::from_wire(7), Encryption::Open);
        assert_eq!(Encryption::from_wire(8), Encryption::Auto);
        assert_eq!(Encryption::from_wire(9), Encryption::Unknown(9));
    }

    #[test]
    fn test_timing_defaults() {
        let timing = Timing::default();
        assert_eq!(timing.ready_wait_ms, 2_000);
        assert_eq!(timing.scan_timeout_ms, 15_000);
        assert_eq!(timing.connect_timeout_ms, 15_000);
        assert_eq!(timing.enterprise_timeout_ms, 30_000);
        assert_eq!(timing.status_poll_delay_ms, 200);
    }
}
