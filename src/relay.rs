//! Relay connection lifecycle
//!
//! A dispatch run holds exactly one [`RelaySession`], obtained from a
//! [`RelayConnector`], and reuses it for every send. Opening performs the full
//! connect → TLS upgrade → authenticate sequence so that each stage can fail
//! with its own diagnostic; a transport fault mid-session marks the session
//! closed and every later send fails fast.

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Debug, Error)]
pub enum RelayError {
	#[error("Connection to relay failed: {0}")]
	Connect(String),

	#[error("TLS upgrade failed: {0}")]
	TlsUpgrade(String),

	#[error("Relay authentication failed: {0}")]
	Auth(String),

	#[error("Sending to {recipient} failed: {reason}")]
	Send { recipient: String, reason: String },

	#[error("Relay session is closed")]
	SessionClosed,
}

/// Transport security for the relay connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelaySecurity {
	/// Plaintext connection, no TLS. Local test relays only.
	None,
	/// Plaintext connection upgraded via STARTTLS. The submission-port default.
	#[default]
	StartTls,
	/// TLS from the first byte
	Tls,
}

/// Connection parameters for the mail relay
#[derive(Clone)]
pub struct RelayConfig {
	host: String,
	port: u16,
	username: Option<String>,
	password: Option<Zeroizing<String>>,
	security: RelaySecurity,
	timeout: Option<Duration>,
}

impl RelayConfig {
	/// Create a new relay configuration
	pub fn new(host: impl Into<String>, port: u16) -> Self {
		Self {
			host: host.into(),
			port,
			username: None,
			password: None,
			security: RelaySecurity::default(),
			timeout: None,
		}
	}

	pub fn with_credentials(mut self, username: String, password: String) -> Self {
		self.username = Some(username);
		self.password = Some(Zeroizing::new(password));
		self
	}

	pub fn with_security(mut self, security: RelaySecurity) -> Self {
		self.security = security;
		self
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);
		self
	}

	/// Get the relay host
	pub fn host(&self) -> &str {
		&self.host
	}

	/// Get the relay port
	pub fn port(&self) -> u16 {
		self.port
	}

	/// Get the security mode
	pub fn security(&self) -> RelaySecurity {
		self.security
	}
}

impl fmt::Debug for RelayConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RelayConfig")
			.field("host", &self.host)
			.field("port", &self.port)
			.field("username", &self.username)
			.field("password", &self.password.as_ref().map(|_| "***"))
			.field("security", &self.security)
			.field("timeout", &self.timeout)
			.finish()
	}
}

/// Opens authenticated relay sessions.
///
/// The dispatch engine is generic over this trait; tests substitute stub
/// connectors to observe lifecycle calls without a network.
#[async_trait]
pub trait RelayConnector: Send + Sync {
	/// Connect, upgrade to TLS, and authenticate.
	async fn open(&self) -> Result<Box<dyn RelaySession>, RelayError>;
}

/// One live, authenticated connection to the relay.
///
/// Valid from successful [`RelayConnector::open`] until [`close`] or an
/// unrecoverable transport fault, whichever comes first.
///
/// [`close`]: RelaySession::close
#[async_trait]
pub trait RelaySession: Send {
	/// Transmit one fully-built message.
	///
	/// A per-recipient rejection leaves the session usable. A transport-level
	/// fault closes the session; every send after that returns
	/// [`RelayError::SessionClosed`] without touching the wire.
	async fn send(&mut self, recipient: &str, message: Message) -> Result<(), RelayError>;

	/// Shut the session down. Safe to call after a fault.
	async fn close(&mut self);
}

/// Production relay connector over SMTP.
///
/// # Examples
///
/// ```rust,no_run
/// use massmail::{RelayConfig, RelaySecurity, SmtpRelay};
/// use std::time::Duration;
///
/// let relay = SmtpRelay::new(
///     RelayConfig::new("smtp.gmail.com", 587)
///         .with_credentials("sender@gmail.com".to_string(), "app-password".to_string())
///         .with_security(RelaySecurity::StartTls)
///         .with_timeout(Duration::from_secs(30)),
/// );
/// ```
pub struct SmtpRelay {
	config: RelayConfig,
}

impl SmtpRelay {
	pub fn new(config: RelayConfig) -> Self {
		Self { config }
	}

	/// Get the relay configuration
	pub fn config(&self) -> &RelayConfig {
		&self.config
	}
}

#[async_trait]
impl RelayConnector for SmtpRelay {
	async fn open(&self) -> Result<Box<dyn RelaySession>, RelayError> {
		let mut builder = match self.config.security {
			RelaySecurity::None => {
				AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.host)
			}
			RelaySecurity::StartTls => {
				AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
					.map_err(classify_open_error)?
			}
			RelaySecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.host)
				.map_err(classify_open_error)?,
		}
		.port(self.config.port);

		if let Some(timeout) = self.config.timeout {
			builder = builder.timeout(Some(timeout));
		}
		if let (Some(username), Some(password)) = (&self.config.username, &self.config.password) {
			builder = builder.credentials(Credentials::new(
				username.clone(),
				password.to_string(),
			));
		}

		let transport = builder.build();

		// Force the connect + TLS + AUTH sequence now, so open-time failures
		// are reported per stage instead of surfacing on the first send.
		let reachable = transport
			.test_connection()
			.await
			.map_err(classify_open_error)?;
		if !reachable {
			return Err(RelayError::Connect(format!(
				"{}:{} rejected the connection probe",
				self.config.host, self.config.port
			)));
		}

		tracing::debug!(host = %self.config.host, port = self.config.port, "Relay session opened");
		Ok(Box::new(SmtpSession {
			transport,
			closed: false,
		}))
	}
}

fn classify_open_error(error: lettre::transport::smtp::Error) -> RelayError {
	if error.is_tls() {
		RelayError::TlsUpgrade(error.to_string())
	} else if error.is_permanent() {
		// The relay answered and refused; at open time that is the
		// credential exchange.
		RelayError::Auth(error.to_string())
	} else {
		RelayError::Connect(error.to_string())
	}
}

struct SmtpSession {
	transport: AsyncSmtpTransport<Tokio1Executor>,
	closed: bool,
}

#[async_trait]
impl RelaySession for SmtpSession {
	async fn send(&mut self, recipient: &str, message: Message) -> Result<(), RelayError> {
		if self.closed {
			return Err(RelayError::SessionClosed);
		}

		match self.transport.send(message).await {
			Ok(_) => Ok(()),
			Err(error) => {
				// An SMTP rejection (4xx/5xx) is scoped to this recipient;
				// anything else means the transport itself is gone and
				// nothing further can succeed on this session.
				if !(error.is_transient() || error.is_permanent()) {
					self.closed = true;
				}
				Err(RelayError::Send {
					recipient: recipient.to_string(),
					reason: error.to_string(),
				})
			}
		}
	}

	async fn close(&mut self) {
		// The pooled connection is torn down when the transport drops; from
		// here on the session only refuses work.
		self.closed = true;
	}
}

/// A message captured by [`MemoryRelay`] instead of being transmitted.
#[derive(Debug, Clone)]
pub struct RecordedMessage {
	/// Destination address the send was addressed to
	pub recipient: String,
	/// The rendered message, exactly as it would have gone on the wire
	pub raw: Vec<u8>,
}

/// In-memory relay connector.
///
/// Records rendered messages without touching the network. Used by tests and
/// by dry runs.
///
/// # Examples
///
/// ```
/// use massmail::MemoryRelay;
///
/// let relay = MemoryRelay::new();
/// assert_eq!(relay.count(), 0);
/// ```
#[derive(Clone, Default)]
pub struct MemoryRelay {
	sent: Arc<RwLock<Vec<RecordedMessage>>>,
}

impl MemoryRelay {
	/// Create a new memory relay
	pub fn new() -> Self {
		Self {
			sent: Arc::new(RwLock::new(Vec::new())),
		}
	}

	/// Get all recorded messages
	pub fn sent_messages(&self) -> Vec<RecordedMessage> {
		self.sent.read().clone()
	}

	/// Count recorded messages
	pub fn count(&self) -> usize {
		self.sent.read().len()
	}

	/// Clear all recorded messages
	pub fn clear(&self) {
		self.sent.write().clear();
	}
}

#[async_trait]
impl RelayConnector for MemoryRelay {
	async fn open(&self) -> Result<Box<dyn RelaySession>, RelayError> {
		Ok(Box::new(MemorySession {
			sent: Arc::clone(&self.sent),
			closed: false,
		}))
	}
}

struct MemorySession {
	sent: Arc<RwLock<Vec<RecordedMessage>>>,
	closed: bool,
}

#[async_trait]
impl RelaySession for MemorySession {
	async fn send(&mut self, recipient: &str, message: Message) -> Result<(), RelayError> {
		if self.closed {
			return Err(RelayError::SessionClosed);
		}

		self.sent.write().push(RecordedMessage {
			recipient: recipient.to_string(),
			raw: message.formatted(),
		});
		Ok(())
	}

	async fn close(&mut self) {
		self.closed = true;
	}
}
