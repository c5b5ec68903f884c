
use std::io::{self, ErrorKind};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DsoError {
	// Connecting failed, or an operation found no socket to work with
	#[error("DSOConnectionError, {0}")]
	Connection(String),

	// Communication with a connected instrument broke down, any response is meaningless
	#[error("DSOIOError, {0}")]
	Io(String),

	#[error("ParametersError, {0}")]
	Parameters(String),

	#[error("transport error: {0}")]
	Transport(#[source] io::Error),

	#[error("configuration error: {0}")]
	Config(#[from] serde_json::Error),
}

impl From<io::Error> for DsoError {
	fn from(e:io::Error) -> Self {
		match e.kind() {
			ErrorKind::NotConnected => DsoError::Connection(e.to_string()),
			_                       => DsoError::Transport(e),
		}
	}
}

pub type Result<T> = std::result::Result<T, DsoError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn missing_socket_is_a_connection_error() {
		let e:DsoError = io::Error::new(ErrorKind::NotConnected, "no socket").into();
		assert!(matches!(e, DsoError::Connection(_)));

		let e:DsoError = io::Error::new(ErrorKind::ConnectionReset, "reset").into();
		assert!(matches!(e, DsoError::Transport(_)));
	}

	#[test]
	fn messages_name_the_category() {
		assert_eq!(DsoError::Io("Write to device failed".to_owned()).to_string(), "DSOIOError, Write to device failed");
		assert!(DsoError::Connection("connection failed, 10.0.0.1".to_owned()).to_string().contains("connection failed"));
	}
}
