//! Dispatch engine integration tests
//!
//! Drives full runs against scripted relay stubs to verify fail-fast
//! validation, abort-on-connect, partial-failure reporting, and unconditional
//! session release.

use async_trait::async_trait;
use lettre::Message;
use mailparse::MailHeaderMap;
use massmail::{
	DispatchConfig, DispatchEngine, DispatchError, DispatchOutcome, MemoryRelay, RelayConnector,
	RelayError, RelaySession,
};
use rstest::rstest;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::NamedTempFile;

/// Helper: write a CSV recipient file for a run
fn csv_file(addresses: &[&str]) -> NamedTempFile {
	let mut file = tempfile::Builder::new()
		.suffix(".csv")
		.tempfile()
		.expect("Failed to create temp file");
	writeln!(file, "email").expect("Failed to write header");
	for address in addresses {
		writeln!(file, "{address}").expect("Failed to write row");
	}
	file
}

/// Scripted relay stub.
///
/// Counts lifecycle calls and fails on demand: at open, for specific
/// recipients, or by killing the transport at the nth send.
#[derive(Clone, Default)]
struct ScriptedRelay {
	fail_open: bool,
	reject: Vec<String>,
	die_at_send: Option<usize>,
	opens: Arc<AtomicUsize>,
	closes: Arc<AtomicUsize>,
	sends: Arc<AtomicUsize>,
}

impl ScriptedRelay {
	fn new() -> Self {
		Self::default()
	}

	fn failing_open() -> Self {
		Self {
			fail_open: true,
			..Self::default()
		}
	}

	fn rejecting(addresses: &[&str]) -> Self {
		Self {
			reject: addresses.iter().map(|a| a.to_string()).collect(),
			..Self::default()
		}
	}

	fn dying_at_send(index: usize) -> Self {
		Self {
			die_at_send: Some(index),
			..Self::default()
		}
	}

	fn opens(&self) -> usize {
		self.opens.load(Ordering::SeqCst)
	}

	fn closes(&self) -> usize {
		self.closes.load(Ordering::SeqCst)
	}

	fn sends(&self) -> usize {
		self.sends.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl RelayConnector for ScriptedRelay {
	async fn open(&self) -> Result<Box<dyn RelaySession>, RelayError> {
		self.opens.fetch_add(1, Ordering::SeqCst);
		if self.fail_open {
			return Err(RelayError::Auth("535 authentication failed".to_string()));
		}
		Ok(Box::new(ScriptedSession {
			reject: self.reject.clone(),
			die_at_send: self.die_at_send,
			closes: Arc::clone(&self.closes),
			sends: Arc::clone(&self.sends),
			attempted: 0,
			closed: false,
		}))
	}
}

struct ScriptedSession {
	reject: Vec<String>,
	die_at_send: Option<usize>,
	closes: Arc<AtomicUsize>,
	sends: Arc<AtomicUsize>,
	attempted: usize,
	closed: bool,
}

#[async_trait]
impl RelaySession for ScriptedSession {
	async fn send(&mut self, recipient: &str, _message: Message) -> Result<(), RelayError> {
		if self.closed {
			return Err(RelayError::SessionClosed);
		}

		let index = self.attempted;
		self.attempted += 1;
		self.sends.fetch_add(1, Ordering::SeqCst);

		if self.die_at_send == Some(index) {
			self.closed = true;
			return Err(RelayError::Send {
				recipient: recipient.to_string(),
				reason: "connection reset by peer".to_string(),
			});
		}
		if self.reject.iter().any(|address| address == recipient) {
			return Err(RelayError::Send {
				recipient: recipient.to_string(),
				reason: "550 mailbox unavailable".to_string(),
			});
		}
		Ok(())
	}

	async fn close(&mut self) {
		self.closes.fetch_add(1, Ordering::SeqCst);
		self.closed = true;
	}
}

fn config_for(source: &NamedTempFile) -> DispatchConfig {
	DispatchConfig::new("sender@example.com", "Subject", "Body")
		.with_recipient_source(source.path())
}

/// Test: empty or whitespace-only subject fails validation before any I/O
#[rstest]
#[case("")]
#[case("   ")]
#[tokio::test]
async fn test_validation_rejects_blank_subject(#[case] subject: &str) {
	let source = csv_file(&["ada@example.com"]);
	let relay = ScriptedRelay::new();
	let config = DispatchConfig::new("sender@example.com", subject, "Body")
		.with_recipient_source(source.path());

	let result = DispatchEngine::new(relay.clone()).run(&config).await;

	assert!(matches!(result, Err(DispatchError::Validation("subject"))));
	assert_eq!(relay.opens(), 0);
}

/// Test: empty or whitespace-only body fails validation before any I/O
#[rstest]
#[case("")]
#[case("\n\t")]
#[tokio::test]
async fn test_validation_rejects_blank_body(#[case] body: &str) {
	let source = csv_file(&["ada@example.com"]);
	let relay = ScriptedRelay::new();
	let config = DispatchConfig::new("sender@example.com", "Subject", body)
		.with_recipient_source(source.path());

	let result = DispatchEngine::new(relay.clone()).run(&config).await;

	assert!(matches!(result, Err(DispatchError::Validation("body"))));
	assert_eq!(relay.opens(), 0);
}

/// Test: subject is checked before body
#[rstest]
#[tokio::test]
async fn test_validation_order_subject_first() {
	let relay = ScriptedRelay::new();
	let config = DispatchConfig::new("sender@example.com", " ", "");

	let result = DispatchEngine::new(relay.clone()).run(&config).await;

	assert!(matches!(result, Err(DispatchError::Validation("subject"))));
}

/// Test: a missing recipient source path fails validation, never opening
#[rstest]
#[tokio::test]
async fn test_validation_requires_recipient_source() {
	let relay = ScriptedRelay::new();
	let config = DispatchConfig::new("sender@example.com", "Subject", "Body");

	let result = DispatchEngine::new(relay.clone()).run(&config).await;

	assert!(matches!(
		result,
		Err(DispatchError::Validation("recipient list"))
	));
	assert_eq!(relay.opens(), 0);
}

/// Test: an unreadable recipient source aborts as a load error before opening
#[rstest]
#[tokio::test]
async fn test_load_error_aborts_before_open() {
	let relay = ScriptedRelay::new();
	let config = DispatchConfig::new("sender@example.com", "Subject", "Body")
		.with_recipient_source("/nonexistent/list.csv");

	let result = DispatchEngine::new(relay.clone()).run(&config).await;

	assert!(matches!(result, Err(DispatchError::Load(_))));
	assert_eq!(relay.opens(), 0);
}

/// Test: a failed open aborts the whole run with zero sends and no report
#[rstest]
#[tokio::test]
async fn test_connection_failure_aborts_run() {
	let source = csv_file(&["ada@example.com", "grace@example.com"]);
	let relay = ScriptedRelay::failing_open();

	let result = DispatchEngine::new(relay.clone())
		.run(&config_for(&source))
		.await;

	assert!(matches!(
		result,
		Err(DispatchError::Connection(RelayError::Auth(_)))
	));
	assert_eq!(relay.opens(), 1);
	assert_eq!(relay.sends(), 0);
	assert_eq!(relay.closes(), 0);
}

/// Test: one rejected recipient does not stop the run; the report carries
/// the failure and close happens exactly once
#[rstest]
#[tokio::test]
async fn test_partial_failure_continues() {
	let source = csv_file(&["one@example.com", "two@example.com", "three@example.com"]);
	let relay = ScriptedRelay::rejecting(&["two@example.com"]);

	let report = DispatchEngine::new(relay.clone())
		.run(&config_for(&source))
		.await
		.unwrap();

	assert_eq!(report.attempted(), 3);
	assert_eq!(report.sent_count(), 2);

	let failures = report.failures();
	assert_eq!(failures.len(), 1);
	assert_eq!(failures[0].recipient, "two@example.com");

	assert_eq!(relay.opens(), 1);
	assert_eq!(relay.closes(), 1);
}

/// Test: a transport fault mid-run fails the remaining recipients instead of
/// dropping them, and the run still completes with a report
#[rstest]
#[tokio::test]
async fn test_session_death_marks_remaining_failed() {
	let source = csv_file(&[
		"one@example.com",
		"two@example.com",
		"three@example.com",
		"four@example.com",
	]);
	// The transport dies while sending to the second recipient.
	let relay = ScriptedRelay::dying_at_send(1);

	let report = DispatchEngine::new(relay.clone())
		.run(&config_for(&source))
		.await
		.unwrap();

	assert_eq!(report.attempted(), 4);
	assert_eq!(report.sent_count(), 1);

	let failures = report.failures();
	assert_eq!(failures.len(), 3);
	assert_eq!(failures[0].recipient, "two@example.com");
	match &failures[0].outcome {
		DispatchOutcome::Failed { reason } => assert!(reason.contains("connection reset")),
		outcome => panic!("Expected failure, got {outcome:?}"),
	}
	for failure in &failures[1..] {
		match &failure.outcome {
			DispatchOutcome::Failed { reason } => {
				assert!(reason.contains("session is closed"), "reason: {reason}");
			}
			outcome => panic!("Expected failure, got {outcome:?}"),
		}
	}

	// Only the success and the faulting attempt reached the wire; the rest
	// failed fast against the closed session.
	assert_eq!(relay.sends(), 2);
	assert_eq!(relay.closes(), 1);
}

/// Test: an unparseable recipient address fails that recipient only
#[rstest]
#[tokio::test]
async fn test_bad_address_is_per_recipient_failure() {
	let source = csv_file(&["one@example.com", "not an address", "three@example.com"]);
	let relay = ScriptedRelay::new();

	let report = DispatchEngine::new(relay.clone())
		.run(&config_for(&source))
		.await
		.unwrap();

	assert_eq!(report.attempted(), 3);
	assert_eq!(report.sent_count(), 2);
	assert_eq!(report.failures()[0].recipient, "not an address");
	// The bad address never reached the relay.
	assert_eq!(relay.sends(), 2);
}

/// Test: duplicate recipients are each attempted, in order
#[rstest]
#[tokio::test]
async fn test_duplicates_each_attempted() {
	let source = csv_file(&["ada@example.com", "ada@example.com"]);
	let relay = ScriptedRelay::new();

	let report = DispatchEngine::new(relay.clone())
		.run(&config_for(&source))
		.await
		.unwrap();

	assert_eq!(report.attempted(), 2);
	assert_eq!(report.sent_count(), 2);
	assert_eq!(relay.sends(), 2);
}

/// Test: an empty recipient list completes cleanly with an empty report
#[rstest]
#[tokio::test]
async fn test_empty_list_completes_clean() {
	let source = csv_file(&[]);
	let relay = ScriptedRelay::new();

	let report = DispatchEngine::new(relay.clone())
		.run(&config_for(&source))
		.await
		.unwrap();

	assert_eq!(report.attempted(), 0);
	assert!(report.completed_clean());
	assert_eq!(relay.opens(), 1);
	assert_eq!(relay.closes(), 1);
}

/// Test: a full run against the memory relay records one rendered message
/// per recipient, in order
#[rstest]
#[tokio::test]
async fn test_memory_relay_end_to_end() {
	let source = csv_file(&["one@example.com", "two@example.com"]);
	let relay = MemoryRelay::new();

	let report = DispatchEngine::new(relay.clone())
		.run(&config_for(&source))
		.await
		.unwrap();

	assert_eq!(report.sent_count(), 2);
	assert!(report.completed_clean());

	let sent = relay.sent_messages();
	assert_eq!(sent.len(), 2);
	assert_eq!(sent[0].recipient, "one@example.com");
	assert_eq!(sent[1].recipient, "two@example.com");

	let first = mailparse::parse_mail(&sent[0].raw).unwrap();
	assert_eq!(
		first.headers.get_first_value("To").as_deref(),
		Some("one@example.com")
	);
}
