use serde_json::{Map, Value, json};

use rfq_domain::{evidence::Evidence, markers, rescue::ToolSignature};
use rfq_providers::chat::ToolSpec;

use crate::{Error, RfqService, agent::context::TurnContext, search};

/// Every tool the orchestrator can offer. Dispatch in [`RfqService::run_tool`] is an exhaustive
/// match over this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
	SearchDocuments,
	SearchImages,
	GetFullSummary,
	ListAllDocuments,
	UpdateRfqDraft,
}
impl ToolKind {
	pub const ALL: [Self; 5] = [
		Self::SearchDocuments,
		Self::SearchImages,
		Self::GetFullSummary,
		Self::ListAllDocuments,
		Self::UpdateRfqDraft,
	];

	pub fn name(self) -> &'static str {
		match self {
			Self::SearchDocuments => "search_documents",
			Self::SearchImages => "search_images",
			Self::GetFullSummary => "get_full_summary",
			Self::ListAllDocuments => "list_all_documents",
			Self::UpdateRfqDraft => "update_rfq_draft",
		}
	}

	pub fn from_name(name: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|kind| kind.name() == name)
	}

	pub fn primary_param(self) -> Option<&'static str> {
		match self {
			Self::SearchDocuments | Self::SearchImages => Some("query"),
			Self::GetFullSummary => Some("filename"),
			Self::ListAllDocuments => None,
			Self::UpdateRfqDraft => Some("instructions"),
		}
	}

	pub fn signature(self) -> ToolSignature<'static> {
		ToolSignature { name: self.name(), primary_param: self.primary_param() }
	}

	pub fn spec(self) -> ToolSpec {
		let (description, param_description) = match self {
			Self::SearchDocuments =>
				("Search for documents based on a query string", "The search query"),
			Self::SearchImages => (
				"Search for diagrams, drawings, and photos extracted from indexed documents",
				"What the images should show",
			),
			Self::GetFullSummary => (
				"Get the complete text/summary of a specific document",
				"The exact filename of the document",
			),
			Self::ListAllDocuments => ("List all available documents in the system", ""),
			Self::UpdateRfqDraft => (
				"Edit the open RFQ draft. Use search results and [[IMAGE_ID:n]] markers from tool \
				 output as evidence",
				"Precise editing instructions",
			),
		};
		let parameters = match self.primary_param() {
			Some(param) => json!({
				"type": "object",
				"properties": { param: { "type": "string", "description": param_description } },
				"required": [param],
			}),
			None => json!({ "type": "object", "properties": {}, "required": [] }),
		};

		ToolSpec { name: self.name().to_string(), description: description.to_string(), parameters }
	}
}

/// Text handed back to the model plus any evidence the call produced.
#[derive(Debug, Default)]
pub(crate) struct ToolOutput {
	pub(crate) text: String,
	pub(crate) evidence: Vec<Evidence>,
}
impl ToolOutput {
	fn text(text: impl Into<String>) -> Self {
		Self { text: text.into(), evidence: Vec::new() }
	}
}

impl RfqService {
	/// Runs one tool call against the turn's context. Tool failures are reported to the model as
	/// text, never raised.
	pub(crate) async fn run_tool(
		&self,
		name: &str,
		arguments: &Map<String, Value>,
		ctx: &mut TurnContext,
	) -> ToolOutput {
		let Some(kind) = ToolKind::from_name(name) else {
			return ToolOutput::text("Error: Tool not found");
		};

		if !ctx.offers(kind) {
			return ToolOutput::text(format!("Error: {} is not available right now.", kind.name()));
		}

		let argument = match kind.primary_param() {
			Some(param) => match string_argument(arguments, param) {
				Some(value) => value,
				None =>
					return ToolOutput::text(format!(
						"Error: Missing required argument \"{param}\" for {}.",
						kind.name()
					)),
			},
			None => "",
		};

		tracing::info!(tool = kind.name(), argument, "Running tool.");

		match kind {
			ToolKind::SearchDocuments => self.tool_search_documents(argument).await,
			ToolKind::SearchImages => self.tool_search_images(argument).await,
			ToolKind::GetFullSummary => self.tool_get_full_summary(argument).await,
			ToolKind::ListAllDocuments => self.tool_list_all_documents().await,
			ToolKind::UpdateRfqDraft => self.tool_update_rfq_draft(argument, ctx).await,
		}
	}

	async fn tool_search_documents(&self, query: &str) -> ToolOutput {
		let hits = search::dedup_by_file(
			self.search(query).await,
			self.cfg.retrieval.context_limit as usize,
		);

		if hits.is_empty() {
			return ToolOutput::text("No matching documents found.");
		}

		let preview_chars = self.cfg.retrieval.preview_chars as usize;
		let mut text = format!("Found {} relevant documents:\n\n", hits.len());

		for (idx, hit) in hits.iter().enumerate() {
			text.push_str(&format!(
				"{}. [{}] (Relevance: {}%)\n   Preview: {}...\n   Full Summary: {}\n\n",
				idx + 1,
				hit.file,
				hit.relevance(),
				rfq_domain::text::preview(&hit.summary, preview_chars),
				hit.summary
			));
		}

		ToolOutput { text, evidence: hits.iter().map(|hit| hit.to_evidence(preview_chars)).collect() }
	}

	async fn tool_search_images(&self, query: &str) -> ToolOutput {
		let hits = self.search_images(query, self.cfg.images.top_k as usize).await;

		if hits.is_empty() {
			return ToolOutput::text("No matching images found.");
		}

		let mut text = format!("Found {} relevant images:\n\n", hits.len());

		for (idx, hit) in hits.iter().enumerate() {
			text.push_str(&format!(
				"{}. {} {} (from {}, Relevance: {}%)\n",
				idx + 1,
				markers::marker(hit.image_id),
				hit.description,
				hit.file,
				hit.relevance
			));
		}

		text.push_str("\nReference an image only with its exact [[IMAGE_ID:n]] marker.");

		ToolOutput { text, evidence: hits.iter().map(|hit| hit.to_evidence()).collect() }
	}

	async fn tool_get_full_summary(&self, filename: &str) -> ToolOutput {
		match self.store.summary_by_filename(filename).await {
			Ok(Some(summary)) => ToolOutput::text(format!(
				"Complete summary for {filename}:\n{}",
				summary.summary_text
			)),
			Ok(None) => ToolOutput::text("Summary not found."),
			Err(err) => {
				tracing::warn!(error = %err, filename, "Summary lookup failed.");

				ToolOutput::text("Summary not found.")
			},
		}
	}

	async fn tool_list_all_documents(&self) -> ToolOutput {
		let mut documents = match self.store.list_documents().await {
			Ok(documents) => documents,
			Err(err) => {
				tracing::warn!(error = %err, "Document listing failed.");

				Vec::new()
			},
		};

		documents.retain(|doc| doc.summary_words.is_some());
		documents.sort_by(|a, b| a.filename.cmp(&b.filename));

		if documents.is_empty() {
			return ToolOutput::text("No documents indexed.");
		}

		let mut text = String::from("Indexed Documents:\n\n");

		for doc in documents {
			text.push_str(&format!(
				"- {} ({} summary words)\n",
				doc.filename,
				doc.summary_words.unwrap_or_default()
			));
		}

		ToolOutput::text(text)
	}

	async fn tool_update_rfq_draft(&self, instructions: &str, ctx: &mut TurnContext) -> ToolOutput {
		let evidence = ctx.draft_evidence();
		let result = self.update_draft(ctx.current_draft(), instructions, &evidence).await;

		match result {
			Ok(update) => {
				let text = format!(
					"Draft updated successfully. Impact analysis:\n{}",
					update.impact_analysis
				);

				ctx.apply_update(update);

				ToolOutput::text(text)
			},
			Err(Error::NoActiveDraft) => ToolOutput::text(
				"Error: No active draft to update. Ask the user to open or create an RFQ draft.",
			),
			Err(err) => {
				tracing::warn!(error = %err, "Draft update failed.");

				ToolOutput::text(format!("Error: Draft update failed: {err}"))
			},
		}
	}
}

fn string_argument<'a>(arguments: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
	arguments.get(key).and_then(Value::as_str).map(str::trim).filter(|value| !value.is_empty())
}
