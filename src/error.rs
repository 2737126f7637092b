//! Errors raised by the remote FinSupp collaborator.

use thiserror::Error;

/// Failure of a single request against the FinSupp API.
///
/// The sync cache collapses every variant into the same fallback outcome;
/// the variants exist so command handlers can word their advisory messages.
#[derive(Debug, Error)]
pub enum RemoteError {
  /// The server answered with a non-success status
  #[error("request rejected with status {status}: {message}")]
  Rejected { status: u16, message: String },

  /// Connection, DNS, timeout or body decoding failure
  #[error("request failed: {0}")]
  Transport(#[from] reqwest::Error),

  /// The server answered successfully but the body made no sense
  #[error("malformed response: {0}")]
  Malformed(String),

  #[error("invalid endpoint: {0}")]
  InvalidUrl(#[from] url::ParseError),
}

impl RemoteError {
  /// HTTP status of a rejected request.
  #[allow(dead_code)]
  pub fn status(&self) -> Option<u16> {
    match self {
      Self::Rejected { status, .. } => Some(*status),
      _ => None,
    }
  }

  /// Short text suitable for showing to the user.
  pub fn advisory(&self) -> String {
    match self {
      Self::Rejected { message, .. } => message.clone(),
      Self::Transport(e) if e.is_timeout() => "Connection timed out".to_string(),
      Self::Transport(_) => "Connection error".to_string(),
      Self::Malformed(_) => "Unexpected response from server".to_string(),
      Self::InvalidUrl(e) => format!("Invalid API URL: {}", e),
    }
  }
}
