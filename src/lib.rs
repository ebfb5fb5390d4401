//! # Massmail
//!
//! Batch email dispatch: send one message to every address in a tabular
//! recipient list over a single authenticated SMTP relay session.
//!
//! ## Features
//!
//! ### Recipient Lists
//! - **Spreadsheet Sources**: `.xlsx` workbooks, first column of the active sheet
//! - **Delimited Sources**: `.csv` files, first field of each line
//! - **Malformed-Row Tolerance**: blank and short rows are skipped, never fatal
//! - **Order Preserving**: recipients are dispatched in source order, duplicates kept
//!
//! ### Message Construction
//! - **MessageTemplate**: one template rendered per recipient with a fluent builder
//! - **Attachments**: opaque binary parts carrying the original file name
//! - **Plain Text Bodies**: single-part when there are no attachments,
//!   multipart/mixed otherwise
//!
//! ### Relay Sessions
//! - **One Session Per Run**: connect, upgrade to TLS, authenticate, send N, close
//! - **Typed Open Failures**: connection, TLS upgrade, and authentication errors
//!   are distinct so callers can present a specific diagnostic
//! - **Fail-Fast After Transport Faults**: a broken session rejects every later
//!   send instead of hanging the run
//! - **Memory Relay**: in-process relay that records messages, for tests and
//!   dry runs
//!
//! ### Dispatch Reporting
//! - **Per-Recipient Outcomes**: `Sent` or `Failed` with a reason, in list order
//! - **Partial Failure Is Data**: individual failures accumulate in the report
//!   instead of aborting the run
//! - **Abort-Level Errors**: validation, load, and connection failures end the
//!   run before any message is sent
//!
//! ## Examples
//!
//! ### Dispatching a Run
//!
//! ```rust,no_run
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use massmail::{DispatchConfig, DispatchEngine, RelayConfig, SmtpRelay};
//!
//! let config = DispatchConfig::new("sender@example.com", "Launch", "We are live.")
//!     .with_recipient_source("recipients.xlsx");
//!
//! let relay = SmtpRelay::new(
//!     RelayConfig::new("smtp.example.com", 587)
//!         .with_credentials("sender@example.com".to_string(), "app-password".to_string()),
//! );
//!
//! let report = DispatchEngine::new(relay).run(&config).await?;
//! println!("sent {} of {}", report.sent_count(), report.attempted());
//! # Ok(())
//! # }
//! ```
//!
//! ### Dry Run Against the Memory Relay
//!
//! ```rust,no_run
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use massmail::{DispatchConfig, DispatchEngine, MemoryRelay};
//!
//! let config = DispatchConfig::new("sender@example.com", "Hello", "Body")
//!     .with_recipient_source("recipients.csv");
//!
//! let relay = MemoryRelay::new();
//! let report = DispatchEngine::new(relay.clone()).run(&config).await?;
//!
//! assert_eq!(relay.count(), report.sent_count());
//! # Ok(())
//! # }
//! ```

pub mod dispatch;
pub mod message;
pub mod recipients;
pub mod relay;
pub mod settings;

pub use dispatch::{
	DispatchConfig, DispatchEngine, DispatchError, DispatchOutcome, DispatchReport,
	RecipientOutcome,
};
pub use message::{Attachment, MessageError, MessageTemplate, MessageTemplateBuilder};
pub use recipients::{SourceError, SourceFormat};
pub use relay::{
	MemoryRelay, RelayConfig, RelayConnector, RelayError, RelaySecurity, RelaySession, SmtpRelay,
};
pub use settings::{Settings, SettingsError};

/// Result of a dispatch run: a report on success, an abort-level error otherwise.
pub type DispatchResult<T> = std::result::Result<T, DispatchError>;
