pub mod chat;
pub mod classify;
pub mod embedding;

mod error;

pub use error::{Error, Result};

use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName};
use serde_json::{Map, Value};

pub fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: format!("Default header {key} must be a string."),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}

/// Inline image payload in the `data:` URL form accepted by OpenAI-compatible endpoints.
pub fn image_data_url(bytes: &[u8], format: &str) -> String {
	let mime = match format.to_ascii_lowercase().as_str() {
		"jpg" | "jpeg" => "image/jpeg",
		"gif" => "image/gif",
		"webp" => "image/webp",
		_ => "image/png",
	};

	format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}
