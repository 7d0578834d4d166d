use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use rfq_domain::{
	evidence::{self, Evidence},
	markers, text,
};

use crate::{Error, Result, RfqService, prompts};

const IMPACT_UNAVAILABLE: &str = "Impact analysis is unavailable for this change.";

/// The pending draft update of one turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftUpdate {
	pub updated_text: String,
	pub impact_analysis: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateDraftRequest {
	pub requirement: String,
	#[serde(default)]
	pub filled_data: Map<String, Value>,
	#[serde(default)]
	pub reference_file: String,
}

impl RfqService {
	/// Edits the open draft using `evidence` as the only source of insertable images.
	pub async fn update_draft(
		&self,
		current_draft: Option<&str>,
		instructions: &str,
		evidence: &[Evidence],
	) -> Result<DraftUpdate> {
		let Some(current) = current_draft.filter(|draft| !draft.trim().is_empty()) else {
			return Err(Error::NoActiveDraft);
		};
		let evidence = evidence::dedup_evidence(evidence.iter().cloned());
		let allowed: BTreeSet<i64> = evidence.iter().filter_map(Evidence::image_id).collect();
		let context = render_evidence(&evidence);

		self.apply_edit(current, instructions, &context, &allowed).await
	}

	/// Instruction-driven edit without an agent. Markers already in the draft stay insertable.
	pub async fn edit_rfq(&self, current_text: &str, instruction: &str) -> Result<DraftUpdate> {
		if instruction.trim().is_empty() {
			return Err(Error::InvalidRequest {
				message: "instruction must be non-empty.".to_string(),
			});
		}

		let allowed = markers::image_ids_in(current_text).into_iter().collect();

		self.apply_edit(current_text, instruction, "", &allowed).await
	}

	pub async fn analyze_changes(&self, old_text: &str, new_text: &str) -> Result<String> {
		self.complete_text(&prompts::impact_messages(old_text, new_text)).await
	}

	/// Drafts a full RFQ from a requirement, offering the best matching images for insertion.
	pub async fn generate_draft(&self, req: &GenerateDraftRequest) -> Result<String> {
		if req.requirement.trim().is_empty() {
			return Err(Error::InvalidRequest {
				message: "requirement must be non-empty.".to_string(),
			});
		}

		let images = self.search_images(&req.requirement, self.cfg.images.top_k as usize).await;
		let mut image_context = String::new();

		if !images.is_empty() {
			image_context.push_str("\n\nAVAILABLE IMAGES (Use [[IMAGE_ID:n]] to insert):");

			for image in &images {
				image_context.push_str(&format!(
					"\n- Image ID: {}\n  Description: {}\n  Filename: {}",
					image.image_id, image.description, image.file
				));
			}

			image_context.push_str(
				"\n\nIMPORTANT: You MUST insert the above images into the RFQ where relevant using \
				 the [[IMAGE_ID:id]] syntax.",
			);
		}

		let raw = self
			.complete_text(&prompts::generate_messages(
				&req.requirement,
				&req.filled_data,
				&req.reference_file,
				&image_context,
			))
			.await?;
		let allowed: BTreeSet<i64> = images.iter().map(|image| image.image_id).collect();

		Ok(markers::guard_image_markers(&text::clean_draft_text(&raw), &allowed))
	}

	async fn apply_edit(
		&self,
		current: &str,
		instructions: &str,
		context: &str,
		allowed: &BTreeSet<i64>,
	) -> Result<DraftUpdate> {
		let raw = self.complete_text(&prompts::edit_messages(instructions, current, context)).await?;
		let updated_text = markers::guard_image_markers(&text::clean_draft_text(&raw), allowed);
		let impact_analysis =
			match self.complete_text(&prompts::impact_messages(current, &updated_text)).await {
				Ok(analysis) => analysis,
				Err(err) => {
					tracing::warn!(error = %err, "Impact analysis failed; keeping the edit.");

					IMPACT_UNAVAILABLE.to_string()
				},
			};

		tracing::info!(
			chars = updated_text.len(),
			images = markers::image_ids_in(&updated_text).len(),
			"Draft updated."
		);

		Ok(DraftUpdate { updated_text, impact_analysis })
	}
}

/// Evidence as the editor sees it: image markers with descriptions, then text excerpts.
pub(crate) fn render_evidence(evidence: &[Evidence]) -> String {
	evidence
		.iter()
		.map(|item| match item {
			Evidence::Image { file, image_id, description, .. } => format!(
				"ATTACHED IMAGE: {} {description} (from {file})",
				markers::marker(*image_id)
			),
			Evidence::Text { file, snippet, .. } => format!("SOURCE: {file}\n{snippet}"),
		})
		.collect::<Vec<_>>()
		.join("\n\n")
}
