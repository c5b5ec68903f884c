
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Serialize, Deserialize};

use crate::errors::{DsoError, Result};
use crate::vicp::DEFAULT_PORT;

pub const DEFAULT_TIMEOUT_SEC:f64 = 1.0;
pub const DEFAULT_QUERY_RESPONSE_MAX_LENGTH:usize = 1_000_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
	#[serde(default)]
	pub host: String,

	#[serde(default = "default_port")]
	pub port: u16,

	#[serde(default = "default_timeout_sec")]
	pub connect_timeout_sec: f64,

	#[serde(default = "default_timeout_sec")]
	pub timeout_sec: f64,

	#[serde(default = "default_query_response_max_length")]
	pub query_response_max_length: usize,

	// Follow every write and query with *OPC? so commands run strictly one after another
	#[serde(default)]
	pub insert_wait_opc: bool,

	#[serde(default)]
	pub remote: bool,

	#[serde(default)]
	pub lockout: bool,
}

fn default_port() -> u16 { DEFAULT_PORT }
fn default_timeout_sec() -> f64 { DEFAULT_TIMEOUT_SEC }
fn default_query_response_max_length() -> usize { DEFAULT_QUERY_RESPONSE_MAX_LENGTH }

pub fn check_timeout(name:&str, seconds:f64) -> Result<Duration> {
	if !seconds.is_finite() || seconds < 0.0 {
		return Err(DsoError::Parameters(format!("{} can't be negative or non-finite, got {}", name, seconds)));
	}

	Duration::try_from_secs_f64(seconds)
		.map_err(|e| DsoError::Parameters(format!("{} of {} s is out of range: {}", name, seconds, e)))
}

impl ConnectionConfig {

	pub fn new(host:&str) -> Self {
		Self {
			host: host.to_owned(),
			port: DEFAULT_PORT,
			connect_timeout_sec: DEFAULT_TIMEOUT_SEC,
			timeout_sec: DEFAULT_TIMEOUT_SEC,
			query_response_max_length: DEFAULT_QUERY_RESPONSE_MAX_LENGTH,
			insert_wait_opc: false,
			remote: false,
			lockout: false,
		}
	}

	pub fn from_json(json:&str) -> Result<Self> {
		let config:ConnectionConfig = serde_json::from_str(json)?;
		config.validate()?;
		Ok(config)
	}

	// Not validated here so the caller can still fill in the host; connecting validates
	pub fn load(path:&Path) -> Result<Self> {
		let json:String = fs::read_to_string(path)?;
		Ok(serde_json::from_str(&json)?)
	}

	pub fn validate(&self) -> Result<()> {
		if self.host.trim().is_empty() { return Err(DsoError::Parameters("host can't be empty".to_owned())); }
		if self.port == 0 { return Err(DsoError::Parameters("port can't be zero".to_owned())); }
		if self.query_response_max_length == 0 {
			return Err(DsoError::Parameters("query_response_max_length must be at least one byte".to_owned()));
		}

		check_timeout("connect_timeout_sec", self.connect_timeout_sec)?;
		check_timeout("timeout_sec", self.timeout_sec)?;
		Ok(())
	}

	pub fn connect_timeout(&self) -> Result<Duration> { check_timeout("connect_timeout_sec", self.connect_timeout_sec) }
	pub fn timeout(&self) -> Result<Duration> { check_timeout("timeout_sec", self.timeout_sec) }

}
