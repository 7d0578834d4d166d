use std::collections::BTreeSet;

use rfq_domain::evidence::{Evidence, EvidenceSet};

use crate::{agent::tools::ToolKind, draft::DraftUpdate};

/// State of one chat turn. Created per request and threaded through every tool call, so
/// concurrent turns never share a draft or a pending update.
#[derive(Debug)]
pub(crate) struct TurnContext {
	draft: Option<String>,
	edits_enabled: bool,
	evidence: EvidenceSet,
	/// Images from earlier turns that still exist.
	recovered: Vec<Evidence>,
	pending: Option<DraftUpdate>,
}
impl TurnContext {
	pub(crate) fn new(draft: Option<String>, edits_enabled: bool) -> Self {
		Self {
			draft: draft.filter(|draft| !draft.trim().is_empty()),
			edits_enabled,
			evidence: EvidenceSet::new(),
			recovered: Vec::new(),
			pending: None,
		}
	}

	pub(crate) fn current_draft(&self) -> Option<&str> {
		self.draft.as_deref()
	}

	pub(crate) fn edits_enabled(&self) -> bool {
		self.edits_enabled
	}

	/// Tools offered to the model this turn. Editing needs an open draft and an editing mode.
	pub(crate) fn tools(&self) -> Vec<ToolKind> {
		ToolKind::ALL.into_iter().filter(|kind| self.offers(*kind)).collect()
	}

	pub(crate) fn offers(&self, kind: ToolKind) -> bool {
		match kind {
			ToolKind::UpdateRfqDraft => self.draft.is_some() && self.edits_enabled,
			ToolKind::SearchDocuments
			| ToolKind::SearchImages
			| ToolKind::GetFullSummary
			| ToolKind::ListAllDocuments => true,
		}
	}

	pub(crate) fn record(&mut self, evidence: Vec<Evidence>) {
		self.evidence.extend(evidence);
	}

	pub(crate) fn set_recovered(&mut self, recovered: Vec<Evidence>) {
		self.recovered = recovered;
	}

	/// Accumulated evidence followed by recovered images, as offered to the draft editor.
	pub(crate) fn draft_evidence(&self) -> Vec<Evidence> {
		self.evidence.iter().chain(&self.recovered).cloned().collect()
	}

	/// Image ids a reply may reference.
	pub(crate) fn allowed_image_ids(&self) -> BTreeSet<i64> {
		let mut ids = self.evidence.image_ids();

		ids.extend(self.recovered.iter().filter_map(Evidence::image_id));

		ids
	}

	/// Later edits in the same turn build on this one, and only the last one is reported.
	pub(crate) fn apply_update(&mut self, update: DraftUpdate) {
		self.draft = Some(update.updated_text.clone());
		self.pending = Some(update);
	}

	pub(crate) fn has_update(&self) -> bool {
		self.pending.is_some()
	}

	pub(crate) fn into_parts(self) -> (EvidenceSet, Option<DraftUpdate>) {
		(self.evidence, self.pending)
	}
}

/// Related documents shown beside a reply, one entry per evidence item in discovery order.
pub(crate) fn related_documents(evidence: EvidenceSet) -> Vec<super::RelatedDocument> {
	evidence
		.into_vec()
		.into_iter()
		.map(|item| match item {
			Evidence::Text { file, score, snippet, .. } =>
				super::RelatedDocument { file, score, preview: snippet, image_id: None },
			Evidence::Image { file, image_id, description, relevance } => super::RelatedDocument {
				file,
				score: relevance,
				preview: description,
				image_id: Some(image_id),
			},
		})
		.collect()
}
