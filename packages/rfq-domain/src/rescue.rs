//! Best-effort recovery of tool calls that a completion backend emitted as plain text.
//!
//! Recognized shapes, tried in order:
//!
//! - a JSON object such as `{"name": "search_documents", "arguments": {"query": "..."}}`, possibly
//!   wrapped in an error body whose string fields carry the intended call
//! - `name(args)`, where `args` is a JSON object, `key="value"` pairs, or one positional value
//!   that is quoted or ends the text
//! - `function=name{json}` and `<function=name>{json}`
//! - `name key="value" ...` filling the rest of the line
//!
//! The bracket must follow the name directly; `name (aside)` is prose, not a call.
//!
//! Only names from the supplied tool list are recognized. A positional value binds to the tool's
//! primary parameter. None of this is a contract; it is a compatibility shim.

use serde::Serialize;
use serde_json::{Map, Value};

const MAX_JSON_DEPTH: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct ToolSignature<'a> {
	pub name: &'a str,
	/// Required parameter, if the tool takes one.
	pub primary_param: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RescuedCall {
	pub name: String,
	pub arguments: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
	Empty,
	NoCallFound,
	Unbalanced { tool: String },
	MissingArgument { tool: String, param: String },
}
impl std::fmt::Display for ParseFailure {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Empty => write!(f, "Nothing to parse."),
			Self::NoCallFound => write!(f, "No known tool call found."),
			Self::Unbalanced { tool } => write!(f, "Unbalanced delimiters after {tool}."),
			Self::MissingArgument { tool, param } =>
				write!(f, "Call to {tool} is missing required argument {param}."),
		}
	}
}
impl std::error::Error for ParseFailure {}

/// First recoverable call in `text`.
pub fn parse_call(text: &str, tools: &[ToolSignature<'_>]) -> Result<RescuedCall, ParseFailure> {
	parse_calls(text, tools)?.into_iter().next().ok_or(ParseFailure::NoCallFound)
}

/// Every recoverable call in `text`, in order of appearance. Fails with the first problem seen when
/// nothing could be recovered.
pub fn parse_calls(
	text: &str,
	tools: &[ToolSignature<'_>],
) -> Result<Vec<RescuedCall>, ParseFailure> {
	let trimmed = text.trim();

	if trimmed.is_empty() {
		return Err(ParseFailure::Empty);
	}

	let mut outcome = Outcome::default();

	if let Some(value) = parse_json_from_text(trimmed) {
		calls_from_json(&value, tools, 0, &mut outcome);
	}
	if outcome.calls.is_empty() {
		scan_text(trimmed, tools, &mut outcome);
	}
	if outcome.calls.is_empty() {
		return Err(outcome.failure.unwrap_or(ParseFailure::NoCallFound));
	}

	Ok(outcome.calls)
}

#[derive(Default)]
struct Outcome {
	calls: Vec<RescuedCall>,
	failure: Option<ParseFailure>,
}
impl Outcome {
	fn record(&mut self, result: Result<RescuedCall, ParseFailure>) {
		match result {
			Ok(call) => self.calls.push(call),
			Err(failure) =>
				if self.failure.is_none() {
					self.failure = Some(failure);
				},
		}
	}
}

fn parse_json_from_text(text: &str) -> Option<Value> {
	if let Ok(value) = serde_json::from_str::<Value>(text)
		&& (value.is_object() || value.is_array())
	{
		return Some(value);
	}

	let start = text.find('{')?;
	let end = text.rfind('}')?;

	if end <= start {
		return None;
	}

	serde_json::from_str::<Value>(&text[start..=end]).ok().filter(Value::is_object)
}

fn calls_from_json(
	value: &Value,
	tools: &[ToolSignature<'_>],
	depth: usize,
	outcome: &mut Outcome,
) {
	if depth > MAX_JSON_DEPTH {
		return;
	}

	match value {
		Value::Array(items) =>
			for item in items {
				calls_from_json(item, tools, depth + 1, outcome);
			},
		Value::Object(object) => {
			if let Some(name) = object.get("name").and_then(Value::as_str)
				&& let Some(tool) = find_tool(tools, name)
			{
				let raw = object
					.get("arguments")
					.or_else(|| object.get("parameters"))
					.or_else(|| object.get("args"));
				let arguments = match raw {
					Some(Value::Object(map)) => map.clone(),
					Some(Value::String(raw)) =>
						parse_arguments(raw, tool, true).unwrap_or_default(),
					_ => Map::new(),
				};

				outcome.record(finish(tool, arguments));

				return;
			}

			for nested in object.values() {
				match nested {
					Value::String(raw) =>
						if depth < MAX_JSON_DEPTH {
							scan_text(raw, tools, outcome);
						},
					_ => calls_from_json(nested, tools, depth + 1, outcome),
				}
			}
		},
		Value::String(raw) => scan_text(raw, tools, outcome),
		_ => {},
	}
}

fn scan_text(text: &str, tools: &[ToolSignature<'_>], outcome: &mut Outcome) {
	let mut offset = 0;

	while let Some((start, tool)) = next_tool_mention(text, offset, tools) {
		let after_name = start + tool.name.len();
		let (result, consumed) = parse_after_name(&text[after_name..], tool);

		if let Some(result) = result {
			outcome.record(result);
		}

		offset = after_name + consumed;
	}
}

fn next_tool_mention<'t>(
	text: &str,
	offset: usize,
	tools: &[ToolSignature<'t>],
) -> Option<(usize, ToolSignature<'t>)> {
	let mut best: Option<(usize, ToolSignature<'t>)> = None;

	for tool in tools {
		let mut from = offset;

		while let Some(found) = text[from..].find(tool.name) {
			let start = from + found;
			let end = start + tool.name.len();

			if is_word_boundary(text, start, end) {
				if best.map(|(at, _)| start < at).unwrap_or(true) {
					best = Some((start, *tool));
				}

				break;
			}

			from = end;
		}
	}

	best
}

fn is_word_boundary(text: &str, start: usize, end: usize) -> bool {
	let before = text[..start].chars().next_back();
	let after = text[end..].chars().next();
	let is_ident = |c: char| c.is_alphanumeric() || c == '_';

	!before.map(is_ident).unwrap_or(false) && !after.map(is_ident).unwrap_or(false)
}

/// Returns the parse result for the call that starts right after a tool name, if any, and how
/// many bytes of `rest` it consumed. A bracket must touch the name, so prose such as
/// `list_all_documents (which ...)` is not a call.
fn parse_after_name(
	rest: &str,
	tool: ToolSignature<'_>,
) -> (Option<Result<RescuedCall, ParseFailure>>, usize) {
	let tagged = rest.starts_with('>');
	let body = if tagged { rest[1..].trim_start() } else { rest };
	let lead = rest.len() - body.len();

	if let Some(open @ ('(' | '{')) = body.chars().next() {
		let close = if open == '(' { ')' } else { '}' };
		let Some(len) = balanced_len(body, open, close) else {
			return (Some(Err(ParseFailure::Unbalanced { tool: tool.name.to_string() })), lead);
		};
		let inner = if open == '(' { &body[1..len - 1] } else { &body[..len] };
		// An unquoted positional value is only trusted when nothing follows the call.
		let positional = open == '(' && body[len..].trim().is_empty();

		return match parse_arguments(inner, tool, positional) {
			Some(arguments) => (Some(finish(tool, arguments)), lead + len),
			None => (None, 0),
		};
	}

	// `name key="value" ...` must fill the rest of its line.
	let line_start = body.trim_start_matches([' ', '\t']);

	if !tagged && line_start.len() == body.len() {
		return (None, 0);
	}

	let line = &line_start[..line_start.find('\n').unwrap_or(line_start.len())];

	match parse_key_values(line) {
		Some((arguments, used)) if line[used..].trim().is_empty() =>
			(Some(finish(tool, arguments)), rest.len() - line_start.len() + used),
		_ => (None, 0),
	}
}

fn balanced_len(text: &str, open: char, close: char) -> Option<usize> {
	let mut depth = 0usize;
	let mut quote: Option<char> = None;
	let mut escaped = false;

	for (idx, c) in text.char_indices() {
		if let Some(q) = quote {
			if escaped {
				escaped = false;
			} else if c == '\\' {
				escaped = true;
			} else if c == q {
				quote = None;
			}

			continue;
		}

		match c {
			'"' | '\'' => quote = Some(c),
			c if c == open => depth += 1,
			c if c == close => {
				depth = depth.checked_sub(1)?;

				if depth == 0 {
					return Some(idx + c.len_utf8());
				}
			},
			_ => {},
		}
	}

	None
}

/// Argument text as a JSON object, then as `key=value` pairs covering all of it, then as one
/// positional value. A bare positional value needs quotes unless `positional` allows it. `None`
/// means the text does not read as arguments.
fn parse_arguments(
	raw: &str,
	tool: ToolSignature<'_>,
	positional: bool,
) -> Option<Map<String, Value>> {
	let raw = raw.trim();

	if raw.is_empty() {
		return Some(Map::new());
	}
	if raw.starts_with('{')
		&& let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw)
	{
		return Some(map);
	}
	if let Some((map, used)) = parse_key_values(raw)
		&& raw[used..].trim_matches([' ', ',']).is_empty()
	{
		return Some(map);
	}

	let quoted = unquote(raw);

	if quoted.is_none() && !positional {
		return None;
	}

	let mut map = Map::new();

	if let Some(param) = tool.primary_param {
		map.insert(param.to_string(), Value::String(quoted.unwrap_or(raw).to_string()));
	}

	Some(map)
}

/// Greedy `key=value` / `key: value` pairs separated by commas or whitespace. Stops at the first
/// token that is not a pair and reports how many bytes were consumed.
fn parse_key_values(raw: &str) -> Option<(Map<String, Value>, usize)> {
	let mut map = Map::new();
	let mut pos = 0;
	let mut consumed = 0;
	let bytes = raw.as_bytes();

	loop {
		while pos < bytes.len() && (bytes[pos].is_ascii_whitespace() || bytes[pos] == b',') {
			pos += 1;
		}

		let key_start = pos;

		while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
			pos += 1;
		}

		if pos == key_start || bytes[key_start].is_ascii_digit() {
			break;
		}

		let key = &raw[key_start..pos];

		while pos < bytes.len() && bytes[pos] == b' ' {
			pos += 1;
		}

		if pos >= bytes.len() || !matches!(bytes[pos], b'=' | b':') {
			break;
		}

		pos += 1;

		while pos < bytes.len() && bytes[pos] == b' ' {
			pos += 1;
		}

		let (value, len) = read_value(&raw[pos..])?;

		pos += len;
		consumed = pos;

		map.insert(key.to_string(), value);
	}

	if map.is_empty() { None } else { Some((map, consumed)) }
}

fn read_value(raw: &str) -> Option<(Value, usize)> {
	let first = raw.chars().next()?;

	if first == '"' || first == '\'' {
		let mut out = String::new();
		let mut escaped = false;

		for (idx, c) in raw.char_indices().skip(1) {
			if escaped {
				out.push(c);

				escaped = false;
			} else if c == '\\' {
				escaped = true;
			} else if c == first {
				return Some((Value::String(out), idx + c.len_utf8()));
			} else {
				out.push(c);
			}
		}

		return None;
	}

	let len = raw.find(|c: char| c == ',' || c.is_whitespace()).unwrap_or(raw.len());
	let token = &raw[..len];

	if token.is_empty() {
		return None;
	}

	let value = match serde_json::from_str::<Value>(token) {
		Ok(value @ (Value::Number(_) | Value::Bool(_))) => value,
		_ => Value::String(token.to_string()),
	};

	Some((value, len))
}

fn unquote(raw: &str) -> Option<&str> {
	let first = raw.chars().next()?;

	if (first == '"' || first == '\'') && raw.len() >= 2 && raw.ends_with(first) {
		return Some(&raw[1..raw.len() - 1]);
	}

	None
}

fn find_tool<'t>(tools: &[ToolSignature<'t>], name: &str) -> Option<ToolSignature<'t>> {
	tools.iter().find(|tool| tool.name == name).copied()
}

fn finish(
	tool: ToolSignature<'_>,
	mut arguments: Map<String, Value>,
) -> Result<RescuedCall, ParseFailure> {
	if let Some(param) = tool.primary_param
		&& !arguments.contains_key(param)
	{
		// A lone argument under some other key is still the primary one.
		if arguments.len() == 1
			&& let Some((_, value)) = arguments.iter().next()
			&& value.is_string()
		{
			let value = value.clone();

			arguments.clear();
			arguments.insert(param.to_string(), value);
		} else {
			return Err(ParseFailure::MissingArgument {
				tool: tool.name.to_string(),
				param: param.to_string(),
			});
		}
	}

	Ok(RescuedCall { name: tool.name.to_string(), arguments })
}
