use reqwest::header::AUTHORIZATION;
use serde_json::{Map, Value};

use rfq_config::LlmProviderConfig;
use rfq_providers::chat::{self, ChatMessage};

fn unreachable_llm() -> LlmProviderConfig {
	LlmProviderConfig {
		provider_id: "test".to_string(),
		api_base: "http://127.0.0.1:1".to_string(),
		api_key: "test-key".to_string(),
		path: "/v1/chat/completions".to_string(),
		model: "m".to_string(),
		temperature: 0.0,
		timeout_ms: 500,
		default_headers: Map::new(),
	}
}

#[test]
fn builds_bearer_auth_header() {
	let headers =
		rfq_providers::auth_headers("secret", &Map::new()).expect("Failed to build headers.");
	let value = headers.get(AUTHORIZATION).expect("Missing authorization header.");

	assert_eq!(value, "Bearer secret");
}

#[test]
fn rejects_non_string_default_headers() {
	let mut defaults = Map::new();

	defaults.insert("x-retries".to_string(), Value::from(3));

	let err = rfq_providers::auth_headers("secret", &defaults)
		.expect_err("Expected a header validation error.");

	assert!(err.to_string().contains("x-retries"), "Unexpected error: {err}");
}

#[test]
fn encodes_images_as_data_urls() {
	assert_eq!(rfq_providers::image_data_url(b"abc", "JPEG"), "data:image/jpeg;base64,YWJj");
	assert!(rfq_providers::image_data_url(b"", "bmp").starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn unreachable_backend_is_an_error_not_a_rejection() {
	let result = chat::complete(&unreachable_llm(), &[ChatMessage::user("hi")], &[]).await;

	assert!(result.is_err(), "Expected a transport error, got {result:?}.");
}
