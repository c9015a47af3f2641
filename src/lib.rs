//! # ninawire
//!
//! Blocking command/reply protocol driver for ESP32 AirLift/NINA-style Wi-Fi
//! co-processors, spoken over a shared byte-oriented bus with an auxiliary
//! readiness signal instead of interrupts.
//!
//! ## Architecture
//!
//! - **Transport** (consumed): raw byte lanes, select line, readiness GPIO,
//!   clock, reset - everything hardware lives behind [`BusTransport`]
//! - **Protocol**: framed commands - start marker, id, length-prefixed
//!   parameters, end marker, 4-byte padding
//! - **Bus**: readiness-gated select/transfer/release transactions
//! - **Session**: scan and association state machines (PSK and 802.1X
//!   enterprise with recovery retries), plus a minimal TCP client and an
//!   HTTP GET convenience
//!
//! Everything is synchronous and exclusive: one command in flight, one caller
//! per session, every wait bounded by a timeout.
//!
//! ## Example
//!
//! ```ignore
//! use ninawire::Session;
//!
//! let mut session = Session::new(transport);
//! let info = session.init()?;
//! println!("firmware {}", info.firmware);
//!
//! session.connect_psk("lab", "hunter2", None)?;
//! session.http_get("example.com", "/", |byte| print!("{}", byte as char))?;
//! ```

pub mod error;
pub mod protocol;
pub mod transport;

mod bus;
mod http;
mod session;
mod socket;
mod xfer;

pub use error::{NinaError, Result};
pub use session::{
    ConnectionStatus, Encryption, NetworkInfo, Session, SessionBuilder, SessionInfo, Timing,
};
pub use socket::SocketHandle;
pub use transport::{BusTransport, TransportError};
