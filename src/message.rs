//! Per-recipient message construction
//!
//! One [`MessageTemplate`] is built per run and rendered once per recipient.
//! Attachments are embedded as opaque `application/octet-stream` parts tagged
//! with their original file name; no content-type sniffing is performed.

use lettre::Message;
use lettre::message::header::{ContentType, ContentTypeErr};
use lettre::message::{Attachment as AttachmentPart, Mailbox, MultiPart, SinglePart};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessageError {
	#[error("Invalid sender address: {0}")]
	InvalidSender(String),

	#[error("Invalid recipient address: {0}")]
	InvalidRecipient(String),

	#[error("Invalid content type: {0}")]
	ContentType(#[from] ContentTypeErr),

	#[error("Message assembly failed: {0}")]
	Assembly(#[from] lettre::error::Error),
}

/// A file attachment reused unchanged across every recipient's message.
///
/// # Examples
///
/// ```
/// use massmail::Attachment;
///
/// let data = b"quarterly numbers".to_vec();
/// let attachment = Attachment::new("report.pdf", data);
/// assert_eq!(attachment.filename(), "report.pdf");
/// ```
#[derive(Debug, Clone)]
pub struct Attachment {
	/// Original filename
	filename: String,
	/// File content as bytes
	content: Vec<u8>,
}

impl Attachment {
	/// Create a new attachment from bytes
	pub fn new(filename: impl Into<String>, content: Vec<u8>) -> Self {
		Self {
			filename: filename.into(),
			content,
		}
	}

	/// Create a new attachment from a file path
	///
	/// The attachment is named after the path's final component.
	pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
		let path = path.as_ref();
		let content = std::fs::read(path)?;

		let filename = path
			.file_name()
			.map(|name| name.to_string_lossy().into_owned())
			.unwrap_or_else(|| "attachment".to_string());

		Ok(Self { filename, content })
	}

	/// Get the filename
	pub fn filename(&self) -> &str {
		&self.filename
	}

	/// Get the content
	pub fn content(&self) -> &[u8] {
		&self.content
	}
}

/// The shared shape of one dispatch run's outbound mail.
///
/// Holds everything identical across recipients; [`MessageTemplate::render`]
/// stamps a recipient address onto it to produce one outbound message.
///
/// # Examples
///
/// ```
/// use massmail::MessageTemplate;
///
/// let template = MessageTemplate::builder()
///     .from("sender@example.com")
///     .subject("Launch")
///     .body("We are live.")
///     .build()?;
///
/// let message = template.render("user@example.com")?;
/// # Ok::<(), massmail::MessageError>(())
/// ```
#[derive(Debug, Clone)]
pub struct MessageTemplate {
	from: Mailbox,
	subject: String,
	body: String,
	attachments: Vec<Attachment>,
}

impl MessageTemplate {
	/// Create a new builder for constructing a `MessageTemplate`.
	pub fn builder() -> MessageTemplateBuilder {
		MessageTemplateBuilder::default()
	}

	/// Get the sender mailbox.
	pub fn from(&self) -> &Mailbox {
		&self.from
	}

	/// Get the subject.
	pub fn subject(&self) -> &str {
		&self.subject
	}

	/// Get the body.
	pub fn body(&self) -> &str {
		&self.body
	}

	/// Get the attachments.
	pub fn attachments(&self) -> &[Attachment] {
		&self.attachments
	}

	/// Render the outbound message for a single recipient.
	///
	/// Rendering is pure: it touches no disk or network. With no attachments
	/// the message is a single plain-text part; otherwise it is
	/// multipart/mixed with the body first and one binary part per attachment.
	pub fn render(&self, recipient: &str) -> Result<Message, MessageError> {
		let to: Mailbox = recipient
			.parse()
			.map_err(|_| MessageError::InvalidRecipient(recipient.to_string()))?;

		let builder = Message::builder()
			.from(self.from.clone())
			.to(to)
			.subject(self.subject.clone());

		if self.attachments.is_empty() {
			let message = builder
				.header(ContentType::TEXT_PLAIN)
				.body(self.body.clone())?;
			return Ok(message);
		}

		let octet_stream = ContentType::parse("application/octet-stream")?;
		let mut multipart = MultiPart::mixed().singlepart(
			SinglePart::builder()
				.header(ContentType::TEXT_PLAIN)
				.body(self.body.clone()),
		);
		for attachment in &self.attachments {
			multipart = multipart.singlepart(
				AttachmentPart::new(attachment.filename().to_string())
					.body(attachment.content().to_vec(), octet_stream.clone()),
			);
		}

		Ok(builder.multipart(multipart)?)
	}
}

#[derive(Default)]
pub struct MessageTemplateBuilder {
	from: String,
	subject: String,
	body: String,
	attachments: Vec<Attachment>,
}

impl MessageTemplateBuilder {
	pub fn from(mut self, from: impl Into<String>) -> Self {
		self.from = from.into();
		self
	}

	pub fn subject(mut self, subject: impl Into<String>) -> Self {
		self.subject = subject.into();
		self
	}

	pub fn body(mut self, body: impl Into<String>) -> Self {
		self.body = body.into();
		self
	}

	pub fn attachment(mut self, attachment: Attachment) -> Self {
		self.attachments.push(attachment);
		self
	}

	pub fn attachments(mut self, attachments: Vec<Attachment>) -> Self {
		self.attachments = attachments;
		self
	}

	/// Build the template.
	///
	/// The sender address must parse as a mailbox. Subject and body emptiness
	/// is the dispatch engine's pre-flight concern, not enforced here.
	pub fn build(self) -> Result<MessageTemplate, MessageError> {
		let from: Mailbox = self
			.from
			.parse()
			.map_err(|_| MessageError::InvalidSender(self.from.clone()))?;

		Ok(MessageTemplate {
			from,
			subject: self.subject,
			body: self.body,
			attachments: self.attachments,
		})
	}
}
