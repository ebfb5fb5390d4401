//! Process-wide configuration from the environment
//!
//! Relay coordinates and credentials come from `MASSMAIL_*` environment
//! variables, read once into an immutable [`Settings`] value. Nothing here is
//! global or mutable; callers pass the value where it is needed.

use crate::relay::{RelayConfig, RelaySecurity};
use std::env;
use thiserror::Error;
use zeroize::Zeroizing;

const SENDER_VAR: &str = "MASSMAIL_SENDER";
const PASSWORD_VAR: &str = "MASSMAIL_APP_PASSWORD";
const USERNAME_VAR: &str = "MASSMAIL_USERNAME";
const RELAY_HOST_VAR: &str = "MASSMAIL_RELAY_HOST";
const RELAY_PORT_VAR: &str = "MASSMAIL_RELAY_PORT";
const RELAY_SECURITY_VAR: &str = "MASSMAIL_RELAY_SECURITY";

const DEFAULT_RELAY_HOST: &str = "smtp.gmail.com";
const DEFAULT_RELAY_PORT: u16 = 587;

#[derive(Debug, Error)]
pub enum SettingsError {
	#[error("Missing environment variable: {0}")]
	Missing(&'static str),

	#[error("Invalid value for {var}: {value:?}")]
	Invalid { var: &'static str, value: String },
}

/// Relay coordinates and credentials for one process.
pub struct Settings {
	pub sender: String,
	pub username: String,
	pub password: Zeroizing<String>,
	pub relay_host: String,
	pub relay_port: u16,
	pub relay_security: RelaySecurity,
}

impl Settings {
	/// Load settings from `MASSMAIL_*` environment variables.
	///
	/// `MASSMAIL_SENDER` and `MASSMAIL_APP_PASSWORD` are required. The
	/// username defaults to the sender address, the relay endpoint to the
	/// Gmail submission port, and the security mode to STARTTLS.
	pub fn from_env() -> Result<Self, SettingsError> {
		Self::from_lookup(|var| env::var(var).ok())
	}

	/// Load settings through an arbitrary variable lookup.
	///
	/// This is the seam tests use; [`Settings::from_env`] is this over
	/// [`std::env::var`].
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
		let sender = lookup(SENDER_VAR).ok_or(SettingsError::Missing(SENDER_VAR))?;
		let password = lookup(PASSWORD_VAR).ok_or(SettingsError::Missing(PASSWORD_VAR))?;
		let username = lookup(USERNAME_VAR).unwrap_or_else(|| sender.clone());

		let relay_host =
			lookup(RELAY_HOST_VAR).unwrap_or_else(|| DEFAULT_RELAY_HOST.to_string());
		let relay_port = match lookup(RELAY_PORT_VAR) {
			Some(value) => value.parse().map_err(|_| SettingsError::Invalid {
				var: RELAY_PORT_VAR,
				value,
			})?,
			None => DEFAULT_RELAY_PORT,
		};
		let relay_security = match lookup(RELAY_SECURITY_VAR).as_deref() {
			None | Some("starttls") => RelaySecurity::StartTls,
			Some("tls") => RelaySecurity::Tls,
			Some("none") => RelaySecurity::None,
			Some(other) => {
				return Err(SettingsError::Invalid {
					var: RELAY_SECURITY_VAR,
					value: other.to_string(),
				});
			}
		};

		Ok(Self {
			sender,
			username,
			password: Zeroizing::new(password),
			relay_host,
			relay_port,
			relay_security,
		})
	}

	/// Relay configuration carrying these credentials.
	pub fn relay_config(&self) -> RelayConfig {
		RelayConfig::new(self.relay_host.clone(), self.relay_port)
			.with_credentials(self.username.clone(), self.password.to_string())
			.with_security(self.relay_security)
	}
}
