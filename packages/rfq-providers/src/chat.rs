use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	System,
	User,
	Assistant,
	Tool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
	pub role: Role,
	pub content: String,
	pub tool_calls: Vec<ToolCall>,
	pub tool_call_id: Option<String>,
}
impl ChatMessage {
	pub fn system(content: impl Into<String>) -> Self {
		Self::plain(Role::System, content)
	}

	pub fn user(content: impl Into<String>) -> Self {
		Self::plain(Role::User, content)
	}

	pub fn assistant(content: impl Into<String>) -> Self {
		Self::plain(Role::Assistant, content)
	}

	pub fn assistant_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
		Self { tool_calls, ..Self::plain(Role::Assistant, content) }
	}

	pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
		Self { tool_call_id: Some(tool_call_id.into()), ..Self::plain(Role::Tool, content) }
	}

	fn plain(role: Role, content: impl Into<String>) -> Self {
		Self { role, content: content.into(), tool_calls: Vec::new(), tool_call_id: None }
	}

	fn to_wire(&self) -> Value {
		let mut message = serde_json::json!({ "role": self.role, "content": self.content });

		if !self.tool_calls.is_empty() {
			message["tool_calls"] = self.tool_calls.iter().map(ToolCall::to_wire).collect();
		}
		if let Some(id) = &self.tool_call_id {
			message["tool_call_id"] = Value::String(id.clone());
		}

		message
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
	pub id: String,
	pub name: String,
	pub arguments: Map<String, Value>,
}
impl ToolCall {
	fn to_wire(&self) -> Value {
		serde_json::json!({
			"id": self.id,
			"type": "function",
			"function": {
				"name": self.name,
				"arguments": Value::Object(self.arguments.clone()).to_string(),
			},
		})
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
	pub name: String,
	pub description: String,
	/// JSON schema of the argument object.
	pub parameters: Value,
}
impl ToolSpec {
	fn to_wire(&self) -> Value {
		serde_json::json!({
			"type": "function",
			"function": {
				"name": self.name,
				"description": self.description,
				"parameters": self.parameters,
			},
		})
	}
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Completion {
	pub content: String,
	pub tool_calls: Vec<ToolCall>,
}

/// Either a structured completion or the raw payload of a request the backend refused. Some
/// backends put the intended tool call inside the refusal body, so it is kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatOutcome {
	Completion(Completion),
	Rejected { status: u16, body: String },
}

/// One chat completion. Client errors (4xx) come back as [`ChatOutcome::Rejected`]; transport
/// failures, timeouts, and server errors are `Err`.
pub async fn complete(
	cfg: &rfq_config::LlmProviderConfig,
	messages: &[ChatMessage],
	tools: &[ToolSpec],
) -> Result<ChatOutcome> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let mut body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": messages.iter().map(ChatMessage::to_wire).collect::<Vec<_>>(),
	});

	if !tools.is_empty() {
		body["tools"] = tools.iter().map(ToolSpec::to_wire).collect();
		body["tool_choice"] = Value::String("auto".to_string());
	}

	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let status = res.status();

	if status.is_client_error() {
		let body = res.text().await?;

		return Ok(ChatOutcome::Rejected { status: status.as_u16(), body });
	}

	let json: Value = res.error_for_status()?.json().await?;

	Ok(ChatOutcome::Completion(parse_completion(json)?))
}

fn parse_completion(json: Value) -> Result<Completion> {
	let message = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.ok_or_else(|| Error::InvalidResponse {
			message: "Chat response is missing choices[0].message.".to_string(),
		})?;
	let content = message.get("content").and_then(|c| c.as_str()).unwrap_or_default().to_string();
	let mut tool_calls = Vec::new();

	for (idx, raw) in message
		.get("tool_calls")
		.and_then(|v| v.as_array())
		.map(Vec::as_slice)
		.unwrap_or_default()
		.iter()
		.enumerate()
	{
		let Some(function) = raw.get("function") else {
			continue;
		};
		let Some(name) = function.get("name").and_then(|v| v.as_str()) else {
			continue;
		};
		let id = raw
			.get("id")
			.and_then(|v| v.as_str())
			.map(str::to_string)
			.unwrap_or_else(|| format!("call_{idx}"));
		let arguments = match function.get("arguments") {
			Some(Value::Object(map)) => map.clone(),
			Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
				Ok(Value::Object(map)) => map,
				_ => Map::new(),
			},
			_ => Map::new(),
		};

		tool_calls.push(ToolCall { id, name: name.to_string(), arguments });
	}

	Ok(Completion { content, tool_calls })
}
