use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

/// A retrieval hit carried through one orchestration turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evidence {
	Text { file: String, chunk_id: i64, score: f32, snippet: String },
	Image { file: String, image_id: i64, description: String, relevance: f32 },
}
impl Evidence {
	pub fn key(&self) -> EvidenceKey {
		match self {
			Self::Text { file, chunk_id, .. } =>
				EvidenceKey::Text { file: file.clone(), chunk_id: *chunk_id },
			Self::Image { image_id, .. } => EvidenceKey::Image(*image_id),
		}
	}

	pub fn file(&self) -> &str {
		match self {
			Self::Text { file, .. } | Self::Image { file, .. } => file,
		}
	}

	pub fn image_id(&self) -> Option<i64> {
		match self {
			Self::Image { image_id, .. } => Some(*image_id),
			Self::Text { .. } => None,
		}
	}
}

/// Image hits are keyed by image id alone, so the same image found through two documents counts
/// once.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EvidenceKey {
	Image(i64),
	Text { file: String, chunk_id: i64 },
}

/// Insertion-ordered evidence accumulator. The first occurrence of a key wins.
#[derive(Debug, Clone, Default)]
pub struct EvidenceSet {
	items: Vec<Evidence>,
	seen: HashSet<EvidenceKey>,
}
impl EvidenceSet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, evidence: Evidence) -> bool {
		if !self.seen.insert(evidence.key()) {
			return false;
		}

		self.items.push(evidence);

		true
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &Evidence> {
		self.items.iter()
	}

	pub fn image_ids(&self) -> BTreeSet<i64> {
		self.items.iter().filter_map(Evidence::image_id).collect()
	}

	pub fn into_vec(self) -> Vec<Evidence> {
		self.items
	}
}
impl Extend<Evidence> for EvidenceSet {
	fn extend<I: IntoIterator<Item = Evidence>>(&mut self, iter: I) {
		for evidence in iter {
			self.insert(evidence);
		}
	}
}
impl FromIterator<Evidence> for EvidenceSet {
	fn from_iter<I: IntoIterator<Item = Evidence>>(iter: I) -> Self {
		let mut set = Self::new();

		set.extend(iter);

		set
	}
}

pub fn dedup_evidence(items: impl IntoIterator<Item = Evidence>) -> Vec<Evidence> {
	items.into_iter().collect::<EvidenceSet>().into_vec()
}
