//! Wire format constants and the command catalog.
//!
//! One frame on the bus:
//! ```text
//! ┌───────┬─────────┬─────────┬───────────────────────────┬───────┬─────────┐
//! │ START │ command │ nparams │ params...                 │ END   │ padding │
//! │ 0xE0  │ 1 byte  │ 1 byte  │ each: len (1|2 BE) + data │ 0xEE  │ 0-3 × 0 │
//! └───────┴─────────┴─────────┴───────────────────────────┴───────┴─────────┘
//! ```
//!
//! Total length from the start marker through the padding is a multiple of 4.
//! Replies reuse the same shape with bit 7 of the command byte set. In place
//! of a reply the peer may emit a bare error marker.

/// Start-of-frame marker.
pub const START_FRAME: u8 = 0xE0;

/// End-of-frame marker.
pub const END_FRAME: u8 = 0xEE;

/// Error marker, sent by the peer instead of a reply frame.
pub const ERR_FRAME: u8 = 0xEF;

/// Reply flag: set on the command byte of every well-formed reply.
pub const REPLY_FLAG: u8 = 0x80;

/// Frames are padded to this alignment on the wire.
pub const FRAME_ALIGN: usize = 4;

/// Zero-padding needed to bring `n` bytes up to a multiple of [`FRAME_ALIGN`].
#[inline]
pub fn pad_len(n: usize) -> usize {
    (FRAME_ALIGN - (n % FRAME_ALIGN)) % FRAME_ALIGN
}

/// Strip the reply flag from a raw command byte.
#[inline]
pub fn command_id(raw: u8) -> u8 {
    raw & !REPLY_FLAG
}

/// Width of the per-parameter length field.
///
/// Fixed per command and per direction - some commands use 16-bit lengths for
/// send and 8-bit for receive, or vice versa - so the width is configured per
/// call, never inferred from the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LenMode {
    /// Single length byte.
    #[default]
    U8,
    /// Two length bytes, big-endian.
    U16,
}

impl LenMode {
    /// Bytes the length field occupies.
    #[inline]
    pub fn width(self) -> usize {
        match self {
            LenMode::U8 => 1,
            LenMode::U16 => 2,
        }
    }

    /// Largest parameter length the field can carry.
    #[inline]
    pub fn max_len(self) -> usize {
        match self {
            LenMode::U8 => u8::MAX as usize,
            LenMode::U16 => u16::MAX as usize,
        }
    }
}

/// Operation codes understood by the co-processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// Select a network by name (open networks and enterprise setup).
    SetNetwork = 0x10,
    /// Select a network by name plus pre-shared key.
    SetPassphrase = 0x11,
    /// Current link state, one status byte.
    GetConnStatus = 0x20,
    /// Local IPv4 address (first reply parameter).
    GetIpAddr = 0x21,
    /// Station MAC address, six bytes.
    GetMacAddr = 0x22,
    /// Retrieve scan results, one parameter per network name.
    ScanNetworks = 0x27,
    /// Flush previously queued socket payload.
    DataSentTcp = 0x2A,
    /// Pending receive byte count for a socket.
    AvailDataTcp = 0x2B,
    /// Open a TCP connection on a socket handle.
    StartClientTcp = 0x2D,
    /// Close a socket.
    StopClientTcp = 0x2E,
    /// Signal strength for a scan result index.
    GetIdxRssi = 0x32,
    /// Encryption type for a scan result index.
    GetIdxEncType = 0x33,
    /// Start a hostname lookup.
    ReqHostByName = 0x34,
    /// Fetch the result of the last hostname lookup.
    GetHostByName = 0x35,
    /// Kick off a channel sweep.
    StartScanNetworks = 0x36,
    /// Firmware version string.
    GetFwVersion = 0x37,
    /// BSSID for a scan result index.
    GetIdxBssid = 0x3C,
    /// Channel for a scan result index.
    GetIdxChannel = 0x3D,
    /// Allocate a socket handle.
    GetSocket = 0x3F,
    /// Queue payload bytes on a socket.
    SendDataTcp = 0x44,
    /// Read buffered bytes from a socket.
    GetDatabufTcp = 0x45,
    /// Enterprise: anonymous identity.
    SetEntIdentity = 0x4A,
    /// Enterprise: username.
    SetEntUsername = 0x4B,
    /// Enterprise: password.
    SetEntPassword = 0x4C,
    /// Enterprise: arm 802.1X association.
    SetEntEnable = 0x4F,
}

impl Command {
    /// Raw operation code.
    #[inline]
    pub fn id(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_len_property() {
        for n in 0..64usize {
            let pad = pad_len(n);
            assert!(pad <= 3, "pad {pad} for {n}");
            assert_eq!((n + pad) % FRAME_ALIGN, 0, "n = {n}");
        }
    }

    #[test]
    fn test_pad_len_exact_values() {
        assert_eq!(pad_len(4), 0);
        assert_eq!(pad_len(5), 3);
        assert_eq!(pad_len(6), 2);
        assert_eq!(pad_len(7), 1);
    }

    #[test]
    fn test_command_id_masks_reply_flag() {
        assert_eq!(command_id(Command::GetFwVersion.id() | REPLY_FLAG), 0x37);
        assert_eq!(command_id(0xE0), 0x60);
        assert_eq!(command_id(0x20), 0x20);
    }

    #[test]
    fn test_command_ids_pinned() {
        // Wire values are fixed by the peer firmware.
        assert_eq!(Command::SetNetwork.id(), 0x10);
        assert_eq!(Command::SetPassphrase.id(), 0x11);
        assert_eq!(Command::GetConnStatus.id(), 0x20);
        assert_eq!(Command::ScanNetworks.id(), 0x27);
        assert_eq!(Command::StartScanNetworks.id(), 0x36);
        assert_eq!(Command::GetSocket.id(), 0x3F);
        assert_eq!(Command::SendDataTcp.id(), 0x44);
        assert_eq!(Command::GetDatabufTcp.id(), 0x45);
        assert_eq!(Command::SetEntEnable.id(), 0x4F);
    }

    #[test]
    fn test_len_mode_widths() {
        assert_eq!(LenMode::U8.width(), 1);
        assert_eq!(LenMode::U16.width(), 2);
        assert_eq!(LenMode::U8.max_len(), 255);
        assert_eq!(LenMode::U16.max_len(), 65_535);
    }

    #[test]
    fn test_markers_distinct() {
        assert_ne!(START_FRAME, END_FRAME);
        assert_ne!(START_FRAME, ERR_FRAME);
        assert_ne!(END_FRAME, ERR_FRAME);
    }
}
