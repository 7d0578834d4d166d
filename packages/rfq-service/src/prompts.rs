//! Fixed prompt text and message builders for every chat call the service makes.

use serde_json::{Map, Value};

use rfq_providers::chat::ChatMessage;

pub const GREETING: &str =
	"Hi! I'm your RFQ Assistant. I can help you draft, validate, and search your RFQs.";
pub const APOLOGY: &str = "I apologize, but I encountered an error. Please try again.";
pub const EXHAUSTED_REPLY: &str = "I found some information but need more specific guidance.";

pub const AGENT_SYSTEM: &str = "\
You are an intelligent RFQ Assistant. You help users find and understand documents and draft \
Requests for Quotation for automotive parts.

IMPORTANT:
1. **For greetings** (hi, etc.): Just answer warmly.
2. **For technical queries**: CALL THE `search_documents` TOOL IMMEDIATELY.
   - Do NOT ask clarifying questions if you can search first.
   - Search for the key technical terms.
3. When the user asks for diagrams, drawings, or pictures, call `search_images`.
4. Images are referenced only as [[IMAGE_ID:n]] using ids returned by a tool. Never invent ids.
5. Use the tools provided to find information.";

const DRAFT_CONTEXT_HEADER: &str = "\
The user has an RFQ draft open. To change it, call `update_rfq_draft` with precise instructions \
instead of writing the new draft in your reply.

CURRENT DRAFT:
";

const READ_ONLY_DRAFT_HEADER: &str = "\
The user has an RFQ draft open in manual mode. You may discuss it but cannot change it.

CURRENT DRAFT:
";

const EDIT_SYSTEM: &str = "\
You are an expert automotive RFQ editor. Apply the instruction to the draft and return ONLY the \
complete updated draft in Markdown. Keep every section the instruction does not touch. Insert an \
image only by copying an ATTACHED IMAGE marker exactly as given; never invent image markers.";

const IMPACT_SYSTEM: &str = "\
You are an RFQ change reviewer writing an Impact Analysis. Compare the previous and the updated \
draft. List what changed, then explain the commercial and technical impact of each change in a \
few short bullet points.";

const DRAFTER_SYSTEM: &str = "\
You are a strict automotive RFQ drafter. Write a complete, professional Request for Quotation in \
Markdown using only the requirement, the supplied details, and the reference document. Do not \
invent specifications that were not provided.";

const VALIDATOR_SYSTEM: &str = "\
IDENTITY: You decide whether a request belongs to the automobile domain (vehicles, parts, \
components, manufacturing, or automotive procurement). Answer with exactly one word: yes, maybe, \
or no.";

const SUMMARY_SYSTEM: &str = "\
You are a professional technical automotive specialist. Your task is to provide a HIGH-DETAIL, \
EXHAUSTIVE summary of the document. Focus on: every specific technical parameter, all mentioned \
ISO/SAE/IATF standards, detailed manufacturing and material requirements, complex constraints, \
and precise timeline and commercial terms. Maintain a dense, technical tone.";

pub const GAP_SYSTEM: &str = "You are a strict RFQ quality auditor.";
pub const RISK_SYSTEM: &str = "You analyze RFQs and find risks.";

pub fn draft_context(draft: &str, edits_enabled: bool) -> ChatMessage {
	let header = if edits_enabled { DRAFT_CONTEXT_HEADER } else { READ_ONLY_DRAFT_HEADER };

	ChatMessage::system(format!("{header}{draft}"))
}

pub fn reference_context(filename: &str, content: &str) -> ChatMessage {
	ChatMessage::system(format!("User is viewing reference document: {filename}\nContent:\n{content}"))
}

pub fn edit_messages(
	instruction: &str,
	current_text: &str,
	evidence_context: &str,
) -> Vec<ChatMessage> {
	let mut user = format!("INSTRUCTION:\n{instruction}\n\nCURRENT DRAFT:\n{current_text}");

	if !evidence_context.is_empty() {
		user.push_str("\n\nEVIDENCE:\n");
		user.push_str(evidence_context);
	}

	vec![ChatMessage::system(EDIT_SYSTEM), ChatMessage::user(user)]
}

pub fn impact_messages(old_text: &str, new_text: &str) -> Vec<ChatMessage> {
	vec![
		ChatMessage::system(IMPACT_SYSTEM),
		ChatMessage::user(format!("PREVIOUS DRAFT:\n{old_text}\n\nUPDATED DRAFT:\n{new_text}")),
	]
}

pub fn generate_messages(
	requirement: &str,
	filled_data: &Map<String, Value>,
	reference_file: &str,
	image_context: &str,
) -> Vec<ChatMessage> {
	let details = Value::Object(filled_data.clone());
	let user = format!(
		"USER REQUIREMENT:\n{requirement}{image_context}\n\nUSER PROVIDED DETAILS:\n{details}\n\n\
		 REFERENCE DOCUMENT:\n{reference_file}"
	);

	vec![ChatMessage::system(DRAFTER_SYSTEM), ChatMessage::user(user)]
}

pub fn validator_messages(requirement: &str) -> Vec<ChatMessage> {
	vec![ChatMessage::system(VALIDATOR_SYSTEM), ChatMessage::user(requirement)]
}

pub fn summary_messages(text: &str) -> Vec<ChatMessage> {
	vec![
		ChatMessage::system(SUMMARY_SYSTEM),
		ChatMessage::user(format!(
			"Provide an exhaustive technical summary of this RFQ document:\n\n{text}"
		)),
	]
}

pub fn gap_messages(draft: &str) -> Vec<ChatMessage> {
	vec![
		ChatMessage::system(GAP_SYSTEM),
		ChatMessage::user(format!(
			"Review this RFQ draft for missing information: absent specifications, quantities, \
			 tolerances, standards, delivery terms, or acceptance criteria. List each gap with a \
			 suggested fix.\n\nDRAFT:\n{draft}"
		)),
	]
}

pub fn risk_messages(draft: &str) -> Vec<ChatMessage> {
	vec![
		ChatMessage::system(RISK_SYSTEM),
		ChatMessage::user(format!(
			"Identify commercial, technical, quality, and schedule risks in this RFQ draft. Rate \
			 each risk as low, medium, or high and suggest a mitigation.\n\nDRAFT:\n{draft}"
		)),
	]
}
