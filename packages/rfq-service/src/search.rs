mod ranking;

pub use ranking::{dedup_by_file, relevance_percent};

pub(crate) use ranking::{ImageCandidate, rank_images};

use serde::Serialize;

use rfq_domain::{evidence::Evidence, lexical, text};
use rfq_storage::models::{SummaryQuery, SummaryScore};

use crate::{Result, RfqService};

/// One ranked summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
	pub document_id: i64,
	pub summary_id: i64,
	pub file: String,
	/// Boosted similarity. Ordering uses this raw value; see [`SearchHit::relevance`] for display.
	pub score: f32,
	pub summary: String,
}
impl SearchHit {
	pub fn relevance(&self) -> f32 {
		relevance_percent(self.score)
	}

	pub fn to_evidence(&self, preview_chars: usize) -> Evidence {
		Evidence::Text {
			file: self.file.clone(),
			chunk_id: self.summary_id,
			score: self.relevance(),
			snippet: text::preview(&self.summary, preview_chars),
		}
	}
}
impl From<SummaryScore> for SearchHit {
	fn from(row: SummaryScore) -> Self {
		Self {
			document_id: row.document_id,
			summary_id: row.summary_id,
			file: row.filename,
			score: row.score,
			summary: row.summary_text,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
	pub file: String,
	pub score: f32,
}

impl RfqService {
	/// Hybrid summary search. Provider or storage failures yield an empty list.
	pub async fn search(&self, query: &str) -> Vec<SearchHit> {
		match self.try_search(query).await {
			Ok(hits) => hits,
			Err(err) => {
				tracing::warn!(error = %err, "Document search failed; returning no results.");

				Vec::new()
			},
		}
	}

	/// Search results deduplicated by file and capped at the context limit.
	pub async fn search_rfq(&self, query: &str) -> Vec<SearchResult> {
		let hits = self.search(query).await;

		dedup_by_file(hits, self.cfg.retrieval.context_limit as usize)
			.into_iter()
			.map(|hit| SearchResult { score: hit.relevance(), file: hit.file })
			.collect()
	}

	pub(crate) async fn try_search(&self, query: &str) -> Result<Vec<SearchHit>> {
		self.ranked_summaries(query, self.cfg.retrieval.top_k as usize).await
	}

	/// The `limit` best summaries for `query`. Boosting, ordering, and truncation happen in the
	/// store.
	pub(crate) async fn ranked_summaries(
		&self,
		query: &str,
		limit: usize,
	) -> Result<Vec<SearchHit>> {
		let vec = self.embed_one(&self.cfg.providers.embedding, query).await?;
		let terms = lexical::phrase_terms(query);
		let rows = self
			.store
			.rank_summaries(SummaryQuery {
				embedding: &vec,
				filename_terms: &terms,
				boost: self.cfg.retrieval.filename_boost,
				limit,
			})
			.await?;
		let hits: Vec<SearchHit> = rows.into_iter().map(SearchHit::from).collect();

		tracing::debug!(query, limit, hits = hits.len(), "Ranked summaries.");

		Ok(hits)
	}
}
