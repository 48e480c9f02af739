//! Captive-portal DNS responder.
//!
//! While provisioning, the device is the only thing on its access point
//! network.  Phones and laptops that join it probe a well-known URL to find
//! out whether they are online; answering *every* DNS query with the device's
//! own address sends that probe (and anything the user types) to the
//! provisioning page.
//!
//! # How the answer is built (for beginners)
//!
//! A DNS message is a 12-byte header followed by sections.  The reply
//! copies the query's header and question verbatim, flips the header flags
//! to "response", and appends one answer record:
//!
//! ```text
//! C0 0C        name: pointer to the question name at offset 12
//! 00 01        type A
//! 00 01        class IN
//! 00 00 00 3C  TTL 60 s
//! 00 04        4 bytes of data
//! a b c d      the access point address
//! ```
//!
//! # Read timeout
//!
//! The responder runs on a dedicated thread with a blocking UDP socket and a
//! 500 ms read timeout.  On each timeout the thread checks its `running`
//! flag; [`CaptiveDns::stop`] clears it and the thread exits within half a
//! second.

use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Time-to-live of every answer, in seconds.
pub const ANSWER_TTL_SECS: u32 = 60;

const HEADER_LEN: usize = 12;

/// Error type for the DNS responder.
#[derive(Debug, Error)]
pub enum DnsError {
    /// The UDP socket could not be bound.
    #[error("failed to bind DNS socket on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The responder thread could not be spawned.
    #[error("failed to spawn DNS thread: {0}")]
    Spawn(std::io::Error),
}

/// Handle to a running responder.  Dropping it stops the thread.
pub struct CaptiveDns {
    running: Arc<AtomicBool>,
    local_addr: SocketAddr,
}

impl CaptiveDns {
    /// The address the responder is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Asks the responder thread to exit.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::Relaxed) {
            debug!("Captive DNS stopping");
        }
    }
}

impl Drop for CaptiveDns {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Binds UDP `port` on all interfaces and answers every query with `answer`.
///
/// # Errors
///
/// Returns [`DnsError::BindFailed`] if the socket cannot be bound (port 53
/// needs privileges), or [`DnsError::Spawn`] if the thread cannot start.
pub fn start_captive_dns(port: u16, answer: Ipv4Addr) -> Result<CaptiveDns, DnsError> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let socket = UdpSocket::bind(addr).map_err(|source| DnsError::BindFailed { addr, source })?;
    if let Err(e) = socket.set_read_timeout(Some(Duration::from_millis(500))) {
        warn!("cannot set DNS read timeout: {e}");
    }
    let local_addr = socket.local_addr().unwrap_or(addr);

    let running = Arc::new(AtomicBool::new(true));
    let thread_running = Arc::clone(&running);
    std::thread::Builder::new()
        .name("captive-dns".to_string())
        .spawn(move || dns_loop(socket, answer, thread_running))
        .map_err(DnsError::Spawn)?;

    info!("captive DNS answering with {answer} on UDP {local_addr}");
    Ok(CaptiveDns {
        running,
        local_addr,
    })
}

/// The main receive loop executed on the DNS thread.
fn dns_loop(socket: UdpSocket, answer: Ipv4Addr, running: Arc<AtomicBool>) {
    let mut buf = [0u8; 512];

    while running.load(Ordering::Relaxed) {
        let (len, src) = match socket.recv_from(&mut buf) {
            Ok(pair) => pair,
            Err(e) if is_timeout_error(&e) => continue,
            Err(e) => {
                error!("DNS recv error: {e}");
                continue;
            }
        };

        match build_response(&buf[..len], answer) {
            Some(reply) => {
                if let Err(e) = socket.send_to(&reply, src) {
                    warn!("failed to send DNS answer to {src}: {e}");
                }
            }
            None => debug!("ignoring malformed DNS datagram from {src}"),
        }
    }

    info!("captive DNS stopped");
}

/// Builds the reply to `query`, answering its question with `answer`.
///
/// Returns `None` for datagrams that are not a standard query with exactly
/// one well-formed question.
pub fn build_response(query: &[u8], answer: Ipv4Addr) -> Option<Vec<u8>> {
    if query.len() < HEADER_LEN {
        return None;
    }
    let flags = u16::from_be_bytes([query[2], query[3]]);
    let is_response = flags & 0x8000 != 0;
    let opcode = (flags >> 11) & 0x0F;
    let qdcount = u16::from_be_bytes([query[4], query[5]]);
    if is_response || opcode != 0 || qdcount != 1 {
        return None;
    }

    let question_end = question_end(query)?;

    let mut reply = Vec::with_capacity(question_end + 16);
    reply.extend_from_slice(&query[..2]); // id
    // QR=1, opcode 0, AA=1, keep RD, RA=1, RCODE=0
    let rd = flags & 0x0100;
    reply.extend_from_slice(&(0x8400 | rd | 0x0080).to_be_bytes());
    reply.extend_from_slice(&1u16.to_be_bytes()); // qdcount
    reply.extend_from_slice(&1u16.to_be_bytes()); // ancount
    reply.extend_from_slice(&0u16.to_be_bytes()); // nscount
    reply.extend_from_slice(&0u16.to_be_bytes()); // arcount
    reply.extend_from_slice(&query[HEADER_LEN..question_end]);

    reply.extend_from_slice(&[0xC0, 0x0C]);
    reply.extend_from_slice(&1u16.to_be_bytes()); // type A
    reply.extend_from_slice(&1u16.to_be_bytes()); // class IN
    reply.extend_from_slice(&ANSWER_TTL_SECS.to_be_bytes());
    reply.extend_from_slice(&4u16.to_be_bytes());
    reply.extend_from_slice(&answer.octets());
    Some(reply)
}

/// Offset just past the question's QTYPE and QCLASS.
fn question_end(query: &[u8]) -> Option<usize> {
    let mut pos = HEADER_LEN;
    loop {
        let label_len = usize::from(*query.get(pos)?);
        if label_len == 0 {
            pos += 1;
            break;
        }
        // Compression pointers never appear in a question.
        if label_len & 0xC0 != 0 {
            return None;
        }
        pos += 1 + label_len;
    }
    let end = pos + 4;
    (end <= query.len()).then_some(end)
}

/// Returns `true` for OS timeout / would-block errors that should be retried.
fn is_timeout_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
