use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgGroup, Parser};
use tracing_subscriber::EnvFilter;

use massmail::{
	Attachment, DispatchConfig, DispatchEngine, DispatchReport, MemoryRelay, Settings, SmtpRelay,
};

#[derive(Parser, Debug)]
#[command(
	name = "massmail",
	about = "Send one message to every address in a spreadsheet or CSV recipient list",
	group(ArgGroup::new("content").required(true).args(["body", "body_file"]))
)]
struct Args {
	/// Subject line shared by every message.
	#[arg(long)]
	subject: String,

	/// Plain-text message body.
	#[arg(long)]
	body: Option<String>,

	/// Read the message body from a file instead.
	#[arg(long)]
	body_file: Option<PathBuf>,

	/// Recipient list: an .xlsx or .csv file whose first column holds addresses.
	#[arg(long)]
	recipients: PathBuf,

	/// Attach a file to every message. May be repeated.
	#[arg(long = "attach")]
	attachments: Vec<PathBuf>,

	/// Render and record messages without opening a relay connection.
	#[arg(long)]
	dry_run: bool,

	/// Print the dispatch report as JSON.
	#[arg(long)]
	json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
		)
		.init();

	let args = Args::parse();

	let body = match &args.body_file {
		Some(path) => match std::fs::read_to_string(path) {
			Ok(body) => body,
			Err(error) => {
				eprintln!("error: cannot read body file {}: {error}", path.display());
				return ExitCode::FAILURE;
			}
		},
		None => args.body.clone().unwrap_or_default(),
	};

	let mut attachments = Vec::with_capacity(args.attachments.len());
	for path in &args.attachments {
		match Attachment::from_path(path) {
			Ok(attachment) => attachments.push(attachment),
			Err(error) => {
				eprintln!("error: cannot read attachment {}: {error}", path.display());
				return ExitCode::FAILURE;
			}
		}
	}

	let settings = match Settings::from_env() {
		Ok(settings) => settings,
		Err(error) => {
			eprintln!("error: {error}");
			return ExitCode::FAILURE;
		}
	};

	let config = DispatchConfig::new(&settings.sender, &args.subject, body)
		.with_recipient_source(&args.recipients)
		.with_attachments(attachments);

	let result = if args.dry_run {
		DispatchEngine::new(MemoryRelay::new()).run(&config).await
	} else {
		DispatchEngine::new(SmtpRelay::new(settings.relay_config()))
			.run(&config)
			.await
	};

	let report = match result {
		Ok(report) => report,
		Err(error) => {
			eprintln!("error: {error}");
			return ExitCode::FAILURE;
		}
	};

	print_report(&report, args.json);
	if report.completed_clean() {
		ExitCode::SUCCESS
	} else {
		ExitCode::FAILURE
	}
}

fn print_report(report: &DispatchReport, json: bool) {
	if json {
		match serde_json::to_string_pretty(report) {
			Ok(rendered) => println!("{rendered}"),
			Err(error) => eprintln!("error: cannot render report: {error}"),
		}
		return;
	}

	println!(
		"sent {} of {} message(s)",
		report.sent_count(),
		report.attempted()
	);
	for failure in report.failures() {
		if let massmail::DispatchOutcome::Failed { reason } = &failure.outcome {
			println!("  failed {}: {reason}", failure.recipient);
		}
	}
}
