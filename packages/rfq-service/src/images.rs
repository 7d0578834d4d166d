use serde::Serialize;

use rfq_domain::{evidence::Evidence, lexical};
use rfq_storage::models::Image;

use crate::{
	Result, RfqService,
	search::{self, ImageCandidate},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageHit {
	pub image_id: i64,
	pub document_id: i64,
	pub file: String,
	pub description: String,
	/// Percentage; 100 for every image of a primary document.
	pub relevance: f32,
}
impl ImageHit {
	pub fn to_evidence(&self) -> Evidence {
		Evidence::Image {
			file: self.file.clone(),
			image_id: self.image_id,
			description: self.description.clone(),
			relevance: self.relevance,
		}
	}

	fn from_primary(image: Image) -> Self {
		Self {
			image_id: image.image_id,
			document_id: image.document_id,
			file: image.filename,
			description: image.description,
			relevance: 100.0,
		}
	}

	fn from_candidate(candidate: ImageCandidate) -> Self {
		Self {
			image_id: candidate.image_id,
			document_id: candidate.document_id,
			relevance: search::relevance_percent(candidate.score),
			file: candidate.file,
			description: candidate.description,
		}
	}
}

impl RfqService {
	/// Two-phase image discovery. Once a primary document is identified every one of its images
	/// is returned; otherwise only independently strong candidates survive. Failures yield an
	/// empty list.
	pub async fn search_images(&self, query: &str, top_k: usize) -> Vec<ImageHit> {
		match self.try_search_images(query, top_k).await {
			Ok(hits) => hits,
			Err(err) => {
				tracing::warn!(error = %err, "Image search failed; returning no results.");

				Vec::new()
			},
		}
	}

	async fn try_search_images(&self, query: &str, top_k: usize) -> Result<Vec<ImageHit>> {
		let cfg = &self.cfg.images;
		let vec = self.embed_one(&self.cfg.providers.image_embedding, query).await?;
		let rows = self.store.score_images(&vec).await?;
		let keywords = lexical::query_keywords(query, cfg.min_keyword_chars as usize);
		let candidates = search::rank_images(
			rows,
			&keywords,
			cfg.filename_boost,
			cfg.candidate_pool as usize,
		);
		let mut hits = Vec::new();

		if let Some(document_id) = self.primary_document(query, &candidates).await {
			let images = self.store.images_for_document(document_id).await?;

			tracing::debug!(document_id, images = images.len(), "Selected primary document.");

			hits = images.into_iter().map(ImageHit::from_primary).collect();
		}
		if hits.is_empty() {
			hits = candidates
				.into_iter()
				.filter(|candidate| candidate.score > cfg.fallback_threshold)
				.map(ImageHit::from_candidate)
				.collect();
		}

		hits.truncate(top_k);

		Ok(hits)
	}

	/// The top summary hit decides the primary document; the top image candidate is consulted only
	/// when no summary clears the threshold. Only the single best summary is fetched.
	async fn primary_document(&self, query: &str, candidates: &[ImageCandidate]) -> Option<i64> {
		let threshold = self.cfg.images.primary_threshold;

		match self.ranked_summaries(query, 1).await {
			Ok(hits) =>
				if let Some(top) = hits.first()
					&& top.score >= threshold
				{
					return Some(top.document_id);
				},
			Err(err) => {
				tracing::warn!(error = %err, "Summary ranking failed during image discovery.");
			},
		}

		candidates.first().filter(|top| top.score >= threshold).map(|top| top.document_id)
	}
}
