const FILLER_PHRASES: [&str; 6] = [
	"How does this look",
	"Do you want more changes",
	"I've updated",
	"Here is the updated",
	"Here's the updated",
	"Let me know if you need any further changes",
];

/// Strips carriage returns and assistant filler that models tend to wrap around an edited draft.
pub fn clean_draft_text(raw: &str) -> String {
	let mut text = raw.replace('\r', "");

	for phrase in FILLER_PHRASES {
		text = text.replace(phrase, "");
	}

	text.trim().to_string()
}

/// First `max_chars` characters with line breaks flattened, for list previews.
pub fn preview(text: &str, max_chars: usize) -> String {
	text.chars().take(max_chars).map(|c| if c == '\n' || c == '\r' { ' ' } else { c }).collect()
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
	text.chars().take(max_chars).collect()
}

pub fn word_count(text: &str) -> usize {
	text.split_whitespace().count()
}
