//! Non-delivering SMTP probe
//!
//! Opens a plaintext connection to a mail exchanger and walks
//! `HELO → MAIL FROM → RCPT TO`, then reads the server's verdict on the
//! recipient and quits. No `DATA` is ever sent.
//!
//! Replies are judged by substring: a state advances when its accumulated
//! response contains `250`, and the recipient counts as deliverable when the
//! `RCPT TO` reply contains `250` and not `550`. This is looser than parsing
//! reply codes and is kept that way on purpose.
//!
//! The TCP stream is owned by the probe future. Returning, failing, timing
//! out, or being dropped by an outer timeout all close it.

use crate::DiscoveryConfig;
use async_trait::async_trait;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

const READ_CHUNK: usize = 1024;
/// Largest reply accumulated for one state before giving up
const MAX_REPLY_BYTES: usize = 8 * 1024;

/// Handshake progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    /// Connected, waiting for the greeting
    Connecting,
    HeloSent,
    MailFromSent,
    RcptToSent,
    /// Recipient verdict received
    Done(bool),
}

/// Commands the probe writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpCommand {
    Helo(String),
    MailFrom(String),
    RcptTo(String),
    Quit,
}

impl SmtpCommand {
    /// Wire form, CRLF terminated
    pub fn line(&self) -> String {
        match self {
            Self::Helo(domain) => format!("HELO {}\r\n", domain),
            Self::MailFrom(sender) => format!("MAIL FROM: <{}>\r\n", sender),
            Self::RcptTo(recipient) => format!("RCPT TO: <{}>\r\n", recipient),
            Self::Quit => "QUIT\r\n".to_string(),
        }
    }
}

/// Addresses used during one probe
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Domain announced in `HELO` and used for the sender
    pub domain: String,
    /// Recipient under test
    pub candidate: String,
}

impl Envelope {
    /// Envelope for `candidate`, taking the domain from its `@domain` part
    pub fn for_candidate(candidate: &str) -> Self {
        let domain = candidate
            .rsplit_once('@')
            .map(|(_, domain)| domain)
            .unwrap_or(candidate);

        Self {
            domain: domain.to_string(),
            candidate: candidate.to_string(),
        }
    }

    fn sender(&self) -> String {
        format!("test@{}", self.domain)
    }
}

impl ProbeState {
    /// Next state and the command to send, given everything read in this state
    ///
    /// `None` means keep reading.
    pub fn advance(self, response: &str, envelope: &Envelope) -> Option<(Self, SmtpCommand)> {
        match self {
            Self::Connecting if !response.is_empty() => {
                Some((Self::HeloSent, SmtpCommand::Helo(envelope.domain.clone())))
            }
            Self::HeloSent if response.contains("250") => {
                Some((Self::MailFromSent, SmtpCommand::MailFrom(envelope.sender())))
            }
            Self::MailFromSent if response.contains("250") => {
                Some((Self::RcptToSent, SmtpCommand::RcptTo(envelope.candidate.clone())))
            }
            Self::RcptToSent if !response.is_empty() => {
                let deliverable = response.contains("250") && !response.contains("550");
                Some((Self::Done(deliverable), SmtpCommand::Quit))
            }
            _ => None,
        }
    }
}

/// Why a probe produced no verdict
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("connection to {host}:{port} failed: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("I/O error during SMTP exchange: {0}")]
    Io(#[from] io::Error),
    #[error("connection closed by server while in state {0:?}")]
    ClosedEarly(ProbeState),
    #[error("server reply too long while in state {0:?}")]
    ReplyTooLong(ProbeState),
    #[error("probe timed out after {0:?}")]
    TimedOut(Duration),
}

/// Drive the handshake over an already connected stream
///
/// Returns the recipient verdict. `QUIT` is attempted once the verdict is
/// known; failures writing it are ignored.
pub async fn run_handshake<S>(stream: &mut S, envelope: &Envelope) -> Result<bool, ProbeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut state = ProbeState::Connecting;
    let mut response = String::new();
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            return Err(ProbeError::ClosedEarly(state));
        }

        response.push_str(&String::from_utf8_lossy(&chunk[..read]));
        trace!(state = ?state, "S: {}", response.trim_end());

        let Some((next, command)) = state.advance(&response, envelope) else {
            if response.len() > MAX_REPLY_BYTES {
                return Err(ProbeError::ReplyTooLong(state));
            }
            continue;
        };

        let line = command.line();
        debug!(from = ?state, to = ?next, "C: {}", line.trim_end());
        state = next;
        response.clear();

        if let ProbeState::Done(deliverable) = state {
            let _ = stream.write_all(line.as_bytes()).await;
            let _ = stream.shutdown().await;
            return Ok(deliverable);
        }

        stream.write_all(line.as_bytes()).await?;
        stream.flush().await?;
    }
}

/// Mailbox deliverability check
#[async_trait]
pub trait MailboxProbe: Send + Sync {
    /// Whether `exchange_host` accepts `candidate` as a recipient
    ///
    /// Never errors: every failure and timeout reads as `false`.
    async fn probe(&self, candidate: &str, exchange_host: &str, timeout: Duration) -> bool;
}

/// Raw TCP SMTP probe
#[derive(Debug, Clone)]
pub struct SmtpProbe {
    port: u16,
}

impl SmtpProbe {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub fn from_config(config: &DiscoveryConfig) -> Self {
        Self::new(config.smtp_port)
    }

    /// Probe `candidate` at `exchange_host`, keeping the failure reason
    pub async fn check(
        &self,
        candidate: &str,
        exchange_host: &str,
        timeout: Duration,
    ) -> Result<bool, ProbeError> {
        let envelope = Envelope::for_candidate(candidate);

        let exchange = async {
            let mut stream = TcpStream::connect((exchange_host, self.port))
                .await
                .map_err(|source| ProbeError::Connect {
                    host: exchange_host.to_string(),
                    port: self.port,
                    source,
                })?;
            debug!("Connected to {}:{} for {}", exchange_host, self.port, candidate);

            run_handshake(&mut stream, &envelope).await
        };

        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| ProbeError::TimedOut(timeout))?
    }
}

impl Default for SmtpProbe {
    fn default() -> Self {
        Self::new(25)
    }
}

#[async_trait]
impl MailboxProbe for SmtpProbe {
    async fn probe(&self, candidate: &str, exchange_host: &str, timeout: Duration) -> bool {
        match self.check(candidate, exchange_host, timeout).await {
            Ok(deliverable) => {
                debug!("SMTP verdict for {} via {}: {}", candidate, exchange_host, deliverable);
                deliverable
            }
            Err(e) => {
                debug!("SMTP probe for {} via {} inconclusive: {}", candidate, exchange_host, e);
                false
            }
        }
    }
}
