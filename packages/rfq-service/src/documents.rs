use serde::Serialize;

use rfq_domain::{markers, text};
use rfq_providers::image_data_url;
use rfq_storage::models::{
	DocumentContent, DocumentListing, ImagePayload, NewDocument, NewImage, Summary,
};

use crate::{Error, Result, RfqService, prompts, rfqs};

/// An image extracted from an uploaded document by the caller.
#[derive(Debug, Clone)]
pub struct IngestImage {
	pub data: Vec<u8>,
	pub format: String,
	pub page_number: Option<i32>,
	pub width: Option<i32>,
	pub height: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct IngestRequest {
	pub filename: String,
	pub category: String,
	/// Original file bytes, stored as-is.
	pub content: Vec<u8>,
	/// Text extracted from `content`.
	pub text: String,
	pub images: Vec<IngestImage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageStats {
	pub total: usize,
	pub automobile: usize,
	pub non_automobile: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexReport {
	pub document_id: i64,
	pub summary_words: usize,
	pub image_stats: ImageStats,
}

impl RfqService {
	/// Stores a document, keeps its on-topic images, and indexes a summary of its text.
	pub async fn index_document(&self, req: IngestRequest) -> Result<IndexReport> {
		if req.filename.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "filename must be non-empty.".to_string() });
		}
		if req.text.trim().is_empty() {
			return Err(Error::InvalidRequest {
				message: format!("{} has no text content.", req.filename),
			});
		}

		let category =
			if req.category.trim().is_empty() { "General".to_string() } else { req.category };
		let document_id = self
			.store
			.upsert_document(&NewDocument {
				filename: req.filename.clone(),
				category,
				content: req.content,
			})
			.await?;

		tracing::info!(document_id, filename = %req.filename, "Indexing document.");

		let image_context = self.referenced_image_context(&req.text).await;
		let image_stats = self.store_images(document_id, &req.images).await?;
		let summary = self.summarize(&format!("{}{image_context}", req.text)).await;
		let embedding = self.embed_one(&self.cfg.providers.embedding, &summary).await?;
		let summary_words = text::word_count(&summary);

		self.store
			.replace_summary(document_id, &summary, summary_words as i32, &embedding)
			.await?;

		tracing::info!(
			document_id,
			summary_words,
			kept_images = image_stats.automobile,
			"Indexed document."
		);

		Ok(IndexReport { document_id, summary_words, image_stats })
	}

	pub async fn list_documents(&self) -> Result<Vec<DocumentListing>> {
		Ok(self.store.list_documents().await?)
	}

	/// Deletes a document with its summary and images. Deleting an RFQ mirror deletes the RFQ.
	pub async fn delete_document(&self, document_id: i64) -> Result<()> {
		let Some(document) = self.store.get_document(document_id).await? else {
			return Err(Error::NotFound { message: format!("Document {document_id} not found.") });
		};

		if let Some(rfq_id) = rfqs::rfq_id_from_mirror(&document.filename) {
			let removed = self.store.delete_rfq(rfq_id).await?;

			tracing::info!(rfq_id, removed, "Deleted RFQ behind mirror document.");
		}

		self.store.delete_document(document_id).await?;

		Ok(())
	}

	/// Stored bytes of an uploaded file.
	pub async fn document_content(&self, document_id: i64) -> Result<DocumentContent> {
		self.store
			.document_content(document_id)
			.await?
			.ok_or_else(|| Error::NotFound {
				message: format!("Document {document_id} not found."),
			})
	}

	pub async fn document_content_by_filename(&self, filename: &str) -> Result<DocumentContent> {
		self.store
			.document_content_by_filename(filename)
			.await?
			.ok_or_else(|| Error::NotFound { message: format!("Document {filename} not found.") })
	}

	pub async fn image_payload(&self, image_id: i64) -> Result<ImagePayload> {
		self.store
			.image_payload(image_id)
			.await?
			.ok_or_else(|| Error::NotFound { message: format!("Image {image_id} not found.") })
	}

	pub async fn full_summary(&self, filename: &str) -> Result<Option<Summary>> {
		Ok(self.store.summary_by_filename(filename).await?)
	}

	/// Descriptions of images a generated draft references, so searches for those visuals find it.
	async fn referenced_image_context(&self, text: &str) -> String {
		let ids = markers::image_ids_in(text);

		if ids.is_empty() {
			return String::new();
		}

		let images = match self.store.images_by_ids(&ids).await {
			Ok(images) => images,
			Err(err) => {
				tracing::warn!(error = %err, "Failed to load referenced images.");

				return String::new();
			},
		};

		if images.is_empty() {
			return String::new();
		}

		let mut context = String::from("\n\n--- REFERENCED IMAGES CONTEXT ---\n");

		for image in images {
			context.push_str(&format!("[Image ID {}]: {}\n", image.image_id, image.description));
		}

		context
	}

	/// Replaces the document's images with the supplied ones that classify as a target label.
	async fn store_images(&self, document_id: i64, images: &[IngestImage]) -> Result<ImageStats> {
		let cfg = &self.cfg.ingestion;
		let labels: Vec<String> =
			cfg.target_labels.iter().chain(&cfg.negative_labels).cloned().collect();
		let mut stats = ImageStats { total: images.len(), ..Default::default() };

		self.store.delete_images_for_document(document_id).await?;

		for image in images {
			let data_url = image_data_url(&image.data, &image.format);
			let classification = match self
				.providers
				.classifier
				.classify(&self.cfg.providers.image_classifier, &data_url, &labels)
				.await
			{
				Ok(classification) => classification,
				Err(err) => {
					tracing::warn!(error = %err, document_id, "Image classification failed.");

					stats.non_automobile += 1;

					continue;
				},
			};
			let on_topic = cfg.target_labels.contains(&classification.label)
				&& classification.confidence > cfg.min_label_confidence;

			if !on_topic {
				tracing::debug!(
					label = %classification.label,
					confidence = classification.confidence,
					"Skipping off-topic image."
				);

				stats.non_automobile += 1;

				continue;
			}

			stats.automobile += 1;

			let embedding = match self.embed_image(&data_url).await {
				Ok(embedding) => embedding,
				Err(err) => {
					tracing::warn!(error = %err, document_id, "Image embedding failed; skipped.");

					continue;
				},
			};

			self.store
				.insert_image(document_id, &NewImage {
					description: classification.label,
					page_number: image.page_number,
					image_format: image.format.clone(),
					width: image.width,
					height: image.height,
					data: image.data.clone(),
					embedding,
				})
				.await?;
		}

		Ok(stats)
	}

	async fn embed_image(&self, data_url: &str) -> Result<Vec<f32>> {
		let cfg = &self.cfg.providers.image_embedding;
		let vectors = self.providers.embedding.embed_images(cfg, &[data_url.to_string()]).await?;

		match vectors.into_iter().next() {
			Some(vec) if vec.len() == cfg.dimensions as usize => Ok(vec),
			Some(_) => Err(Error::Provider {
				message: "Image embedding vector dimension mismatch.".to_string(),
			}),
			None => Err(Error::Provider {
				message: "Image embedding provider returned no vectors.".to_string(),
			}),
		}
	}

	/// Model summary of `text`, or its leading characters when the model is unavailable.
	async fn summarize(&self, text: &str) -> String {
		let fallback =
			|| text::truncate_chars(text, self.cfg.ingestion.summary_fallback_chars as usize);

		match self.complete_text(&prompts::summary_messages(text)).await {
			Ok(summary) if !summary.trim().is_empty() => summary,
			Ok(_) => fallback(),
			Err(err) => {
				tracing::warn!(error = %err, "Summarization failed; using leading text.");

				fallback()
			},
		}
	}
}
