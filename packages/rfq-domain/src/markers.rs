//! In-band image references of the form `[[IMAGE_ID:<integer>]]`.

use std::{
	collections::{BTreeSet, HashSet},
	sync::LazyLock,
};

use regex::{Captures, Regex};

static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"\[\[IMAGE_ID:([^\[\]]*)\]\]").expect("Image marker pattern must compile.")
});

pub fn marker(image_id: i64) -> String {
	format!("[[IMAGE_ID:{image_id}]]")
}

/// Numeric image ids referenced by `text`, in first-occurrence order without repeats.
pub fn image_ids_in(text: &str) -> Vec<i64> {
	let mut seen = HashSet::new();

	MARKER_RE
		.captures_iter(text)
		.filter_map(|caps| parse_id(&caps[1]))
		.filter(|id| seen.insert(*id))
		.collect()
}

/// Keeps a marker only when its id is numeric, present in `allowed`, and not already kept earlier
/// in the text. With nothing allowed every marker is stripped.
pub fn guard_image_markers(text: &str, allowed: &BTreeSet<i64>) -> String {
	if allowed.is_empty() {
		return strip_all(text);
	}

	let mut kept = HashSet::new();

	MARKER_RE
		.replace_all(text, |caps: &Captures<'_>| match parse_id(&caps[1]) {
			Some(id) if allowed.contains(&id) && kept.insert(id) => caps[0].to_string(),
			_ => String::new(),
		})
		.into_owned()
}

/// Removes markers whose id is not in `allowed`. Repeats of an allowed id are left alone.
pub fn scrub_image_markers(text: &str, allowed: &BTreeSet<i64>) -> String {
	MARKER_RE
		.replace_all(text, |caps: &Captures<'_>| match parse_id(&caps[1]) {
			Some(id) if allowed.contains(&id) => caps[0].to_string(),
			_ => String::new(),
		})
		.into_owned()
}

fn strip_all(text: &str) -> String {
	MARKER_RE.replace_all(text, "").into_owned()
}

fn parse_id(raw: &str) -> Option<i64> {
	if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
		return None;
	}

	raw.parse().ok()
}
