//! Deterministic filename matching used to boost vector similarity.

/// Lowercased space-separated terms of `query`. Each space acts as a wildcard, so a filename
/// matches when the terms appear in it in order.
pub fn phrase_terms(query: &str) -> Vec<String> {
	query.to_lowercase().split(' ').filter(|part| !part.is_empty()).map(str::to_string).collect()
}

/// Case-insensitive in-order match of [`phrase_terms`] against `filename`. No terms, no match.
pub fn filename_matches_terms(filename: &str, terms: &[String]) -> bool {
	if terms.is_empty() {
		return false;
	}

	let filename = filename.to_lowercase();
	let mut offset = 0;

	for term in terms {
		match filename[offset..].find(term.as_str()) {
			Some(found) => offset += found + term.len(),
			None => return false,
		}
	}

	true
}

/// Lowercased query words of at least `min_chars` characters, punctuation trimmed, first
/// occurrence kept.
pub fn query_keywords(query: &str, min_chars: usize) -> Vec<String> {
	let mut keywords: Vec<String> = Vec::new();

	for word in query.split_whitespace() {
		let word = word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();

		if word.chars().count() >= min_chars && !keywords.contains(&word) {
			keywords.push(word);
		}
	}

	keywords
}

pub fn filename_matches_any_keyword(filename: &str, keywords: &[String]) -> bool {
	let filename = filename.to_lowercase();

	keywords.iter().any(|keyword| filename.contains(keyword.as_str()))
}

/// Multiplies a positive similarity by `boost` on a filename match. Non-positive scores are left
/// alone so a boost never pushes a match below an unmatched peer.
pub fn boosted(score: f32, matched: bool, boost: f32) -> f32 {
	if matched && score > 0.0 { score * boost } else { score }
}
