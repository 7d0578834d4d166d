pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Conflict: {message}")]
	Conflict { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("No active draft to update.")]
	NoActiveDraft,
}
impl From<rfq_storage::Error> for Error {
	fn from(err: rfq_storage::Error) -> Self {
		match err {
			rfq_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			rfq_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			rfq_storage::Error::NotFound(message) => Self::NotFound { message },
			rfq_storage::Error::Conflict(message) => Self::Conflict { message },
		}
	}
}

impl From<rfq_providers::Error> for Error {
	fn from(err: rfq_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
