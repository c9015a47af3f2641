//! HTTP GET convenience.
//!
//! Composes the resolver, socket lifecycle, and chunked transfer into a
//! single fetch-and-stream operation. No header parsing: the response is
//! treated as an opaque byte stream and the read loop ends on an idle gap
//! instead of a declared content length.

use crate::error::{NinaError, Result};
use crate::session::Session;
use crate::socket::SocketHandle;
use crate::transport::BusTransport;

/// Stop reading after this long with no new bytes.
const IDLE_GAP_MS: u64 = 1_000;

/// Delay between availability polls.
const POLL_DELAY_MS: u32 = 50;

/// Read buffer size per availability round.
const READ_CHUNK: usize = 256;

const HTTP_PORT: u16 = 80;

impl<B: BusTransport> Session<B> {
    /// Fetch `http://{host}{path}` and stream every response byte - status
    /// line, headers, and body - to `on_byte` as it arrives.
    ///
    /// The socket is closed on every exit path, success or error.
    pub fn http_get(
        &mut self,
        host: &str,
        path: &str,
        mut on_byte: impl FnMut(u8),
    ) -> Result<()> {
        let ip = self.resolve(host)?;
        let sock = self.socket_alloc()?;

        let result = self.fetch(sock, ip, host, path, &mut on_byte);
        self.socket_close(sock);
        result
    }

    fn fetch(
        &mut self,
        sock: SocketHandle,
        ip: [u8; 4],
        host: &str,
        path: &str,
        on_byte: &mut dyn FnMut(u8),
    ) -> Result<()> {
        self.socket_open(sock, ip, HTTP_PORT)?;

        let request = format!(
            "GET {path} HTTP/1.1\r\n\
             Host: {host}\r\n\
             Connection: close\r\n\
             User-Agent: ninawire/0.1\r\n\
             \r\n"
        );
        self.socket_write(sock, request.as_bytes())?;

        let mut buf = [0u8; READ_CHUNK];
        let mut last_data = self.bus.now_ms();

        loop {
            let avail = match self.socket_available(sock) {
                Ok(n) => n,
                Err(NinaError::PeerError) => return Err(NinaError::PeerError),
                Err(e) => {
                    // Transient poll failure; the idle gap bounds the retries.
                    tracing::debug!(error = %e, "availability poll failed");
                    0
                }
            };

            if avail == 0 {
                if self.bus.now_ms().saturating_sub(last_data) > IDLE_GAP_MS {
                    break;
                }
                self.bus.sleep_ms(POLL_DELAY_MS);
                continue;
            }
            last_data = self.bus.now_ms();

            let take = buf.len().min(usize::from(avail));
            let got = self.socket_read(sock, &mut buf[..take])?;
            for &b in &buf[..got] {
                on_byte(b);
            }
        }

        Ok(())
    }
}
