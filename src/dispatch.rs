//! The batch dispatch engine
//!
//! Orchestrates one fire-once run: validate the config, parse the recipient
//! list, open a single relay session, send to every recipient in order while
//! collecting per-recipient outcomes, close the session, report.

use crate::message::{Attachment, MessageError, MessageTemplate};
use crate::recipients::{self, SourceError};
use crate::relay::{RelayConnector, RelayError, RelaySession};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
	#[error("Missing required field: {0}")]
	Validation(&'static str),

	#[error("Failed to load recipient list: {0}")]
	Load(#[from] SourceError),

	#[error("Invalid message template: {0}")]
	Template(#[from] MessageError),

	#[error("Relay connection failed: {0}")]
	Connection(#[from] RelayError),
}

/// Everything one dispatch run needs, built once and never mutated.
///
/// Attachment bytes are loaded by the caller before the run starts; the
/// engine reuses them unchanged for every recipient.
///
/// # Examples
///
/// ```
/// use massmail::{Attachment, DispatchConfig};
///
/// let config = DispatchConfig::new("sender@example.com", "Launch", "We are live.")
///     .with_recipient_source("recipients.csv")
///     .with_attachment(Attachment::new("notes.txt", b"hello".to_vec()));
///
/// assert_eq!(config.subject(), "Launch");
/// ```
#[derive(Debug, Clone)]
pub struct DispatchConfig {
	sender: String,
	subject: String,
	body: String,
	recipient_source: Option<PathBuf>,
	attachments: Vec<Attachment>,
}

impl DispatchConfig {
	/// Create a new dispatch configuration
	pub fn new(
		sender: impl Into<String>,
		subject: impl Into<String>,
		body: impl Into<String>,
	) -> Self {
		Self {
			sender: sender.into(),
			subject: subject.into(),
			body: body.into(),
			recipient_source: None,
			attachments: Vec::new(),
		}
	}

	pub fn with_recipient_source(mut self, path: impl Into<PathBuf>) -> Self {
		self.recipient_source = Some(path.into());
		self
	}

	pub fn with_attachment(mut self, attachment: Attachment) -> Self {
		self.attachments.push(attachment);
		self
	}

	pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
		self.attachments = attachments;
		self
	}

	/// Get the sender address
	pub fn sender(&self) -> &str {
		&self.sender
	}

	/// Get the subject
	pub fn subject(&self) -> &str {
		&self.subject
	}

	/// Get the body
	pub fn body(&self) -> &str {
		&self.body
	}

	/// Get the recipient source path, if one was provided
	pub fn recipient_source(&self) -> Option<&Path> {
		self.recipient_source.as_deref()
	}

	/// Get the attachments
	pub fn attachments(&self) -> &[Attachment] {
		&self.attachments
	}
}

/// Per-recipient result of one send attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchOutcome {
	Sent,
	Failed { reason: String },
}

/// One recipient paired with what happened to its send
#[derive(Debug, Clone, Serialize)]
pub struct RecipientOutcome {
	pub recipient: String,
	#[serde(flatten)]
	pub outcome: DispatchOutcome,
}

/// Aggregate result of one dispatch run, in recipient order.
///
/// A report exists only when the run got past validation, recipient loading,
/// and session open; partial failure lives inside it rather than aborting.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
	pub outcomes: Vec<RecipientOutcome>,
}

impl DispatchReport {
	/// Total number of recipients the run attempted (or recorded as failed
	/// when the session died before their turn).
	pub fn attempted(&self) -> usize {
		self.outcomes.len()
	}

	/// Number of successful sends
	pub fn sent_count(&self) -> usize {
		self.outcomes
			.iter()
			.filter(|entry| entry.outcome == DispatchOutcome::Sent)
			.count()
	}

	/// The failures, in recipient order
	pub fn failures(&self) -> Vec<&RecipientOutcome> {
		self.outcomes
			.iter()
			.filter(|entry| entry.outcome != DispatchOutcome::Sent)
			.collect()
	}

	/// Whether every recipient was sent to successfully
	pub fn completed_clean(&self) -> bool {
		self.outcomes
			.iter()
			.all(|entry| entry.outcome == DispatchOutcome::Sent)
	}
}

/// Runs one batch dispatch over a relay connector.
///
/// # Examples
///
/// ```rust,no_run
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use massmail::{DispatchConfig, DispatchEngine, MemoryRelay};
///
/// let config = DispatchConfig::new("sender@example.com", "Hello", "Body")
///     .with_recipient_source("recipients.csv");
///
/// let report = DispatchEngine::new(MemoryRelay::new()).run(&config).await?;
/// println!("sent {} of {}", report.sent_count(), report.attempted());
/// # Ok(())
/// # }
/// ```
pub struct DispatchEngine<C: RelayConnector> {
	connector: C,
}

impl<C: RelayConnector> DispatchEngine<C> {
	pub fn new(connector: C) -> Self {
		Self { connector }
	}

	/// Execute one dispatch run.
	///
	/// Validation happens first and performs no I/O: subject, then body, then
	/// the recipient source path. Load and connection failures abort the run
	/// before any message is sent. Once the session is open, per-recipient
	/// failures accumulate in the report and the session is closed on every
	/// exit path.
	pub async fn run(&self, config: &DispatchConfig) -> crate::DispatchResult<DispatchReport> {
		if config.subject().trim().is_empty() {
			return Err(DispatchError::Validation("subject"));
		}
		if config.body().trim().is_empty() {
			return Err(DispatchError::Validation("body"));
		}
		let Some(source) = config.recipient_source() else {
			return Err(DispatchError::Validation("recipient list"));
		};

		let recipients = recipients::parse(source)?;
		tracing::info!(count = recipients.len(), source = %source.display(), "Loaded recipient list");

		let template = MessageTemplate::builder()
			.from(config.sender())
			.subject(config.subject())
			.body(config.body())
			.attachments(config.attachments().to_vec())
			.build()?;

		let mut session = self.connector.open().await?;
		tracing::info!("Relay session opened");

		// The send loop never errors out; that keeps the close below on
		// every exit path.
		let report = send_all(session.as_mut(), &template, &recipients).await;
		session.close().await;

		tracing::info!(
			attempted = report.attempted(),
			sent = report.sent_count(),
			failed = report.failures().len(),
			"Dispatch run finished"
		);
		Ok(report)
	}
}

async fn send_all(
	session: &mut dyn RelaySession,
	template: &MessageTemplate,
	recipients: &[String],
) -> DispatchReport {
	let mut outcomes = Vec::with_capacity(recipients.len());
	let mut session_dead = false;

	for recipient in recipients {
		if session_dead {
			// The session died earlier in the loop; record the recipient
			// instead of silently dropping it.
			outcomes.push(failed(recipient, RelayError::SessionClosed.to_string()));
			continue;
		}

		let message = match template.render(recipient) {
			Ok(message) => message,
			Err(error) => {
				tracing::warn!(recipient = %recipient, error = %error, "Message could not be built");
				outcomes.push(failed(recipient, error.to_string()));
				continue;
			}
		};

		match session.send(recipient, message).await {
			Ok(()) => outcomes.push(RecipientOutcome {
				recipient: recipient.clone(),
				outcome: DispatchOutcome::Sent,
			}),
			Err(RelayError::SessionClosed) => {
				session_dead = true;
				outcomes.push(failed(recipient, RelayError::SessionClosed.to_string()));
			}
			Err(error) => {
				tracing::warn!(recipient = %recipient, error = %error, "Send failed");
				outcomes.push(failed(recipient, error.to_string()));
			}
		}
	}

	DispatchReport { outcomes }
}

fn failed(recipient: &str, reason: String) -> RecipientOutcome {
	RecipientOutcome {
		recipient: recipient.to_string(),
		outcome: DispatchOutcome::Failed { reason },
	}
}
