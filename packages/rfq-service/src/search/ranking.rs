use std::{cmp::Ordering, collections::HashMap};

use rfq_domain::lexical;
use rfq_storage::models::ImageScore;

use crate::search::SearchHit;

/// An image candidate after the keyword boost.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ImageCandidate {
	pub(crate) image_id: i64,
	pub(crate) document_id: i64,
	pub(crate) file: String,
	pub(crate) description: String,
	pub(crate) score: f32,
}

/// Percentage shown to users: `round(score * 100, 2)`, capped at 100. Ordering never uses it.
pub fn relevance_percent(score: f32) -> f32 {
	((score * 10_000.0).round() / 100.0).min(100.0)
}

/// Keeps the best hit per file, then orders by score and truncates to `limit`.
pub fn dedup_by_file(hits: Vec<SearchHit>, limit: usize) -> Vec<SearchHit> {
	let mut best: HashMap<String, SearchHit> = HashMap::new();

	for hit in hits {
		match best.get(&hit.file) {
			Some(existing) if existing.score >= hit.score => {},
			_ => {
				best.insert(hit.file.clone(), hit);
			},
		}
	}

	let mut deduped: Vec<SearchHit> = best.into_values().collect();

	deduped.sort_by(cmp_hits);
	deduped.truncate(limit);

	deduped
}

pub(crate) fn rank_images(
	rows: Vec<ImageScore>,
	keywords: &[String],
	boost: f32,
	pool: usize,
) -> Vec<ImageCandidate> {
	let mut candidates: Vec<ImageCandidate> = rows
		.into_iter()
		.map(|row| {
			let matched = lexical::filename_matches_any_keyword(&row.filename, keywords);

			ImageCandidate {
				image_id: row.image_id,
				document_id: row.document_id,
				score: lexical::boosted(row.similarity, matched, boost),
				file: row.filename,
				description: row.description,
			}
		})
		.collect();

	candidates.sort_by(|a, b| cmp_f32_desc(a.score, b.score).then(a.image_id.cmp(&b.image_id)));
	candidates.truncate(pool);

	candidates
}

fn cmp_hits(a: &SearchHit, b: &SearchHit) -> Ordering {
	cmp_f32_desc(a.score, b.score).then(a.summary_id.cmp(&b.summary_id))
}

fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn hit(summary_id: i64, file: &str, score: f32) -> SearchHit {
		SearchHit {
			document_id: summary_id,
			summary_id,
			file: file.to_string(),
			score,
			summary: String::new(),
		}
	}

	#[test]
	fn relevance_is_rounded_and_capped() {
		assert_eq!(relevance_percent(0.123_456), 12.35);
		assert_eq!(relevance_percent(0.9 * 1.2), 100.0);
		assert_eq!(relevance_percent(0.0), 0.0);
	}

	#[test]
	fn dedup_keeps_best_hit_per_file() {
		let deduped = dedup_by_file(
			vec![hit(1, "a.pdf", 0.3), hit(2, "b.pdf", 0.5), hit(3, "a.pdf", 0.7), hit(4, "c.pdf", 0.1)],
			2,
		);

		assert_eq!(deduped, vec![hit(3, "a.pdf", 0.7), hit(2, "b.pdf", 0.5)]);
	}

	#[test]
	fn image_keywords_boost_partial_filename_matches() {
		let rows = || {
			vec![
				ImageScore {
					image_id: 1,
					document_id: 1,
					filename: "Brake_Manual.pdf".to_string(),
					description: String::new(),
					similarity: 0.3,
				},
				ImageScore {
					image_id: 2,
					document_id: 2,
					filename: "pump.pdf".to_string(),
					description: String::new(),
					similarity: 0.35,
				},
			]
		};
		let ranked = rank_images(rows(), &lexical::query_keywords("brake diagram", 4), 1.3, 1);

		assert_eq!(ranked.len(), 1);
		assert_eq!(ranked[0].image_id, 1);

		let ranked = rank_images(rows(), &lexical::query_keywords("car pads", 4), 1.3, 30);

		assert_eq!(ranked[0].image_id, 2);
	}
}
