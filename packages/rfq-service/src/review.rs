use serde::Serialize;

use crate::{Result, RfqService, prompts};

const DIRECT_PASS_PREFIXES: [&str; 9] =
	["hi", "hello", "hey", "help", "what", "how", "can you", "tell me", "show me"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequirementCheck {
	pub valid: bool,
	pub message: String,
}
impl RequirementCheck {
	fn new(valid: bool, message: &str) -> Self {
		Self { valid, message: message.to_string() }
	}
}

impl RfqService {
	/// Lists missing information in a draft. Never fails; failures become the review text.
	pub async fn gap_review(&self, draft: &str) -> String {
		if draft.trim().is_empty() {
			return "No draft available to review for gaps.".to_string();
		}

		match self.complete_text(&prompts::gap_messages(draft)).await {
			Ok(review) => review,
			Err(err) => {
				tracing::warn!(error = %err, "Gap review failed.");

				format!("Gap Review Failed: {err}")
			},
		}
	}

	pub async fn risk_review(&self, draft: &str) -> String {
		if draft.trim().is_empty() {
			return "No draft available to review for risks.".to_string();
		}

		match self.complete_text(&prompts::risk_messages(draft)).await {
			Ok(review) => review,
			Err(err) => {
				tracing::warn!(error = %err, "Risk review failed.");

				format!("Risk Review Failed: {err}")
			},
		}
	}

	/// Greetings and questions pass directly; anything else is judged for automotive relevance.
	pub async fn validate_requirement(&self, requirement: &str) -> Result<RequirementCheck> {
		let normalized = requirement.trim().to_lowercase();

		if DIRECT_PASS_PREFIXES.iter().any(|prefix| normalized.starts_with(prefix))
			|| normalized.contains('?')
		{
			return Ok(RequirementCheck::new(true, "Valid"));
		}

		let verdict = self.complete_text(&prompts::validator_messages(requirement)).await?;
		let verdict = verdict.to_lowercase();

		if verdict.contains("yes") {
			return Ok(RequirementCheck::new(true, "Valid Automobile Requirement"));
		}
		if verdict.contains("maybe") {
			return Ok(RequirementCheck::new(false, "Please provide more clarity"));
		}

		Ok(RequirementCheck::new(false, "Not related to automobile domain"))
	}
}
