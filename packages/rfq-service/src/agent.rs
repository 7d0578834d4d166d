mod context;
mod tools;

pub use tools::ToolKind;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use rfq_domain::{
	evidence::Evidence,
	markers,
	rescue::{self, RescuedCall, ToolSignature},
};
use rfq_providers::chat::{ChatMessage, ChatOutcome, ToolCall, ToolSpec};

use crate::{RfqService, prompts};
use context::TurnContext;

const START_SESSION: &str = "start_session";

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
	#[serde(default)]
	pub history: Vec<HistoryMessage>,
	pub user_message: String,
	/// Reference document the user is viewing.
	#[serde(default)]
	pub selected_rfq: Option<String>,
	#[serde(default)]
	pub current_draft: Option<String>,
	#[serde(default)]
	pub mode: ChatMode,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
	#[default]
	Agent,
	Manual,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryMessage {
	pub role: HistoryRole,
	#[serde(default, alias = "text")]
	pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRole {
	User,
	#[serde(alias = "agent")]
	Assistant,
	#[serde(other)]
	Other,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatResponse {
	pub reply: String,
	pub related_documents: Vec<RelatedDocument>,
	pub updated_draft: Option<String>,
	pub impact_analysis: Option<String>,
}
impl ChatResponse {
	fn reply_only(reply: &str) -> Self {
		Self {
			reply: reply.to_string(),
			related_documents: Vec::new(),
			updated_draft: None,
			impact_analysis: None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelatedDocument {
	pub file: String,
	pub score: f32,
	pub preview: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub image_id: Option<i64>,
}

/// What one completion asked for.
enum Step {
	Final(String),
	Calls { content: String, calls: Vec<ToolCall>, rescued: bool },
	Failed,
}

impl RfqService {
	/// Runs one bounded agent turn. Always produces a non-empty reply.
	pub async fn chat(&self, req: ChatRequest) -> ChatResponse {
		if req.user_message.trim() == START_SESSION {
			return ChatResponse::reply_only(prompts::GREETING);
		}

		let mut ctx = TurnContext::new(req.current_draft.clone(), req.mode == ChatMode::Agent);
		let mut messages = self.build_messages(&req, &mut ctx).await;
		let offered = ctx.tools();
		let specs: Vec<ToolSpec> = offered.iter().map(|kind| kind.spec()).collect();
		let signatures: Vec<ToolSignature<'static>> =
			offered.iter().map(|kind| kind.signature()).collect();
		let max_iterations = self.cfg.agent.max_iterations as usize;
		let mut last_text = None;

		for iteration in 0..max_iterations {
			let last_iteration = iteration + 1 == max_iterations;
			let step = self.route(&messages, &specs, &signatures, iteration).await;

			match step {
				Step::Final(text) if !text.trim().is_empty() =>
					return self.finish(&text, ctx, last_iteration),
				Step::Final(_) | Step::Failed => {
					let text = self.fallback(&messages).await;

					return self.finish(&text, ctx, last_iteration);
				},
				Step::Calls { content, calls, rescued } => {
					tracing::debug!(iteration, calls = calls.len(), rescued, "Executing tool calls.");

					messages.push(ChatMessage::assistant_tool_calls(content.clone(), calls.clone()));

					for call in &calls {
						let output = self.run_tool(&call.name, &call.arguments, &mut ctx).await;

						ctx.record(output.evidence);
						messages.push(ChatMessage::tool(call.id.clone(), output.text));
					}

					if !rescued && !content.trim().is_empty() {
						last_text = Some(content);
					}
				},
			}
		}

		tracing::info!(max_iterations, "Agent turn reached the iteration cap.");

		let text = last_text.unwrap_or_else(|| prompts::EXHAUSTED_REPLY.to_string());

		self.finish(&text, ctx, true)
	}

	/// One completion, classified. Native calls win; otherwise the rescue parser runs over the
	/// reply text, the rejection body, or the error message.
	async fn route(
		&self,
		messages: &[ChatMessage],
		specs: &[ToolSpec],
		signatures: &[ToolSignature<'_>],
		iteration: usize,
	) -> Step {
		let outcome = self.providers.chat.complete(&self.cfg.providers.llm, messages, specs).await;

		match outcome {
			Ok(ChatOutcome::Completion(completion)) => {
				if !completion.tool_calls.is_empty() {
					return Step::Calls {
						content: completion.content,
						calls: completion.tool_calls,
						rescued: false,
					};
				}

				match rescue::parse_calls(&completion.content, signatures) {
					Ok(rescued) => {
						tracing::info!(iteration, calls = rescued.len(), "Rescued tool calls from reply text.");

						Step::Calls {
							content: completion.content,
							calls: synthesize_calls(rescued, iteration),
							rescued: true,
						}
					},
					Err(failure) => {
						tracing::debug!(%failure, "Reply carries no tool call.");

						Step::Final(completion.content)
					},
				}
			},
			Ok(ChatOutcome::Rejected { status, body }) => {
				tracing::warn!(status, "Chat request rejected; attempting tool-call rescue.");

				rescue_failure(&body, signatures, iteration)
			},
			Err(err) => {
				tracing::warn!(error = %err, "Chat request failed; attempting tool-call rescue.");

				rescue_failure(&err.to_string(), signatures, iteration)
			},
		}
	}

	/// One tool-less completion, then the static apology.
	async fn fallback(&self, messages: &[ChatMessage]) -> String {
		match self.complete_text(messages).await {
			Ok(text) if !text.trim().is_empty() => text,
			Ok(_) => prompts::APOLOGY.to_string(),
			Err(err) => {
				tracing::warn!(error = %err, "Tool-less fallback failed.");

				prompts::APOLOGY.to_string()
			},
		}
	}

	/// Scrubs unknown image markers and attaches evidence only when a draft changed or the loop
	/// ran to its last iteration.
	fn finish(&self, text: &str, ctx: TurnContext, last_iteration: bool) -> ChatResponse {
		let allowed = ctx.allowed_image_ids();
		let attach = ctx.has_update() || last_iteration;
		let mut reply = markers::scrub_image_markers(text, &allowed);

		if reply.trim().is_empty() {
			reply = prompts::APOLOGY.to_string();
		}

		let (evidence, pending) = ctx.into_parts();
		let related_documents =
			if attach { context::related_documents(evidence) } else { Vec::new() };
		let (updated_draft, impact_analysis) = match pending {
			Some(update) => (Some(update.updated_text), Some(update.impact_analysis)),
			None => (None, None),
		};

		ChatResponse { reply, related_documents, updated_draft, impact_analysis }
	}

	async fn build_messages(&self, req: &ChatRequest, ctx: &mut TurnContext) -> Vec<ChatMessage> {
		let limit = self.cfg.agent.history_limit as usize;
		let history = &req.history[req.history.len().saturating_sub(limit)..];
		let recovered = self.recover_images(history).await;
		let valid: BTreeSet<i64> = recovered.iter().filter_map(Evidence::image_id).collect();
		let mut messages = vec![ChatMessage::system(prompts::AGENT_SYSTEM)];

		if let Some(draft) = ctx.current_draft() {
			messages.push(prompts::draft_context(draft, ctx.edits_enabled()));
		}
		if !recovered.is_empty() {
			messages.push(ChatMessage::system(recovered_context(&recovered)));
		}

		for message in history {
			match message.role {
				HistoryRole::User => messages.push(ChatMessage::user(message.content.clone())),
				HistoryRole::Assistant => messages.push(ChatMessage::assistant(
					markers::scrub_image_markers(&message.content, &valid),
				)),
				HistoryRole::Other => {},
			}
		}

		if ctx.current_draft().is_none()
			&& let Some(filename) = req.selected_rfq.as_deref().filter(|name| !name.is_empty())
		{
			match self.store.summary_by_filename(filename).await {
				Ok(Some(summary)) =>
					messages.push(prompts::reference_context(filename, &summary.summary_text)),
				Ok(None) => {},
				Err(err) => {
					tracing::warn!(error = %err, filename, "Failed to load reference document.");
				},
			}
		}

		messages.push(ChatMessage::user(req.user_message.clone()));
		ctx.set_recovered(recovered);

		messages
	}

	/// Images referenced by earlier assistant turns that still exist. Deleted ids are dropped
	/// without notice.
	async fn recover_images(&self, history: &[HistoryMessage]) -> Vec<Evidence> {
		let mut ids = Vec::new();

		for message in history.iter().filter(|message| message.role == HistoryRole::Assistant) {
			for id in markers::image_ids_in(&message.content) {
				if !ids.contains(&id) {
					ids.push(id);
				}
			}
		}

		if ids.is_empty() {
			return Vec::new();
		}

		match self.store.images_by_ids(&ids).await {
			Ok(images) => {
				tracing::debug!(mentioned = ids.len(), valid = images.len(), "Recovered images.");

				images
					.into_iter()
					.map(|image| Evidence::Image {
						file: image.filename,
						image_id: image.image_id,
						description: image.description,
						relevance: 100.0,
					})
					.collect()
			},
			Err(err) => {
				tracing::warn!(error = %err, "Image recovery failed; forgetting earlier images.");

				Vec::new()
			},
		}
	}
}

fn rescue_failure(raw: &str, signatures: &[ToolSignature<'_>], iteration: usize) -> Step {
	match rescue::parse_calls(raw, signatures) {
		Ok(rescued) => {
			tracing::info!(iteration, calls = rescued.len(), "Rescued tool calls from failure payload.");

			Step::Calls {
				content: String::new(),
				calls: synthesize_calls(rescued, iteration),
				rescued: true,
			}
		},
		Err(failure) => {
			tracing::warn!(%failure, "No tool call recovered from failure payload.");

			Step::Failed
		},
	}
}

fn synthesize_calls(rescued: Vec<RescuedCall>, iteration: usize) -> Vec<ToolCall> {
	rescued
		.into_iter()
		.enumerate()
		.map(|(idx, call)| ToolCall {
			id: format!("rescued_{iteration}_{idx}"),
			name: call.name,
			arguments: call.arguments,
		})
		.collect()
}

fn recovered_context(recovered: &[Evidence]) -> String {
	let mut context = String::from(
		"Images shown earlier in this conversation that can still be referenced:\n",
	);

	for item in recovered {
		if let Evidence::Image { file, image_id, description, .. } = item {
			context.push_str(&format!(
				"- {} {description} (from {file})\n",
				markers::marker(*image_id)
			));
		}
	}

	context
}
