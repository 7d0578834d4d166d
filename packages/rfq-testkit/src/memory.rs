use std::{
	collections::BTreeMap,
	sync::{Mutex, MutexGuard},
};

use time::OffsetDateTime;

use rfq_domain::lexical;
use rfq_storage::{
	BoxFuture, Error, Result, Store,
	models::{
		Document, DocumentContent, DocumentListing, GeneratedRfq, Image, ImagePayload, ImageScore,
		NewDocument, NewImage, Summary, SummaryQuery, SummaryScore,
	},
};

/// In-process [`Store`] with the same cascade and ordering rules as the Postgres schema.
#[derive(Default)]
pub struct MemoryStore {
	state: Mutex<State>,
}
impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts a document with an embedded summary and returns the document id. The summary text
	/// doubles as the file content.
	pub fn add_document(&self, filename: &str, summary: &str, embedding: Vec<f32>) -> i64 {
		let mut state = self.lock();
		let document_id = state.put_document(filename, "General", summary.as_bytes().to_vec());

		state.put_summary(document_id, summary, embedding);

		document_id
	}

	/// Inserts an embedded image for `document_id` and returns the image id.
	pub fn add_image(&self, document_id: i64, description: &str, embedding: Vec<f32>) -> i64 {
		let mut state = self.lock();
		let page = state.images.values().filter(|img| img.document_id == document_id).count();

		state.put_image(document_id, &NewImage {
			description: description.to_string(),
			page_number: Some(page as i32 + 1),
			image_format: "png".to_string(),
			width: None,
			height: None,
			data: vec![0x89, b'P', b'N', b'G'],
			embedding,
		})
	}

	pub fn image_count(&self) -> usize {
		self.lock().images.len()
	}

	fn lock(&self) -> MutexGuard<'_, State> {
		self.state.lock().unwrap_or_else(|err| err.into_inner())
	}
}

impl Store for MemoryStore {
	fn upsert_document<'a>(&'a self, doc: &'a NewDocument) -> BoxFuture<'a, Result<i64>> {
		let result = {
			let mut state = self.lock();
			let existing =
				state.documents.values().find(|d| d.filename == doc.filename).map(|d| d.id);

			match existing {
				Some(id) => {
					if let Some(row) = state.documents.get_mut(&id) {
						row.category = doc.category.clone();
						row.content = doc.content.clone();
						row.uploaded_at = OffsetDateTime::now_utc();
					}

					id
				},
				None => state.put_document(&doc.filename, &doc.category, doc.content.clone()),
			}
		};

		Box::pin(async move { Ok(result) })
	}

	fn get_document<'a>(&'a self, id: i64) -> BoxFuture<'a, Result<Option<Document>>> {
		let result = self.lock().documents.get(&id).map(DocumentRow::to_document);

		Box::pin(async move { Ok(result) })
	}

	fn document_content<'a>(&'a self, id: i64) -> BoxFuture<'a, Result<Option<DocumentContent>>> {
		let result = self.lock().documents.get(&id).map(DocumentRow::to_content);

		Box::pin(async move { Ok(result) })
	}

	fn document_content_by_filename<'a>(
		&'a self,
		filename: &'a str,
	) -> BoxFuture<'a, Result<Option<DocumentContent>>> {
		let result = self
			.lock()
			.documents
			.values()
			.find(|d| d.filename == filename)
			.map(DocumentRow::to_content);

		Box::pin(async move { Ok(result) })
	}

	fn list_documents<'a>(&'a self) -> BoxFuture<'a, Result<Vec<DocumentListing>>> {
		let state = self.lock();
		let mut listings: Vec<DocumentListing> = state
			.documents
			.values()
			.map(|doc| DocumentListing {
				id: doc.id,
				filename: doc.filename.clone(),
				category: doc.category.clone(),
				file_size: doc.content.len() as i64,
				uploaded_at: doc.uploaded_at,
				image_count: state.images.values().filter(|img| img.document_id == doc.id).count()
					as i64,
				summary_words: state
					.summaries
					.values()
					.find(|s| s.document_id == doc.id)
					.map(|s| s.word_count),
			})
			.collect();

		drop(state);
		listings.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at).then(b.id.cmp(&a.id)));

		Box::pin(async move { Ok(listings) })
	}

	fn delete_document<'a>(&'a self, id: i64) -> BoxFuture<'a, Result<bool>> {
		let removed = self.lock().remove_document(id);

		Box::pin(async move { Ok(removed) })
	}

	fn delete_documents_with_prefix<'a>(
		&'a self,
		prefix: &'a str,
	) -> BoxFuture<'a, Result<u64>> {
		let mut state = self.lock();
		let ids: Vec<i64> = state
			.documents
			.values()
			.filter(|d| d.filename.starts_with(prefix))
			.map(|d| d.id)
			.collect();

		for id in &ids {
			state.remove_document(*id);
		}

		drop(state);

		Box::pin(async move { Ok(ids.len() as u64) })
	}

	fn replace_summary<'a>(
		&'a self,
		document_id: i64,
		summary_text: &'a str,
		word_count: i32,
		embedding: &'a [f32],
	) -> BoxFuture<'a, Result<i64>> {
		let result = {
			let mut state = self.lock();

			if state.documents.contains_key(&document_id) {
				let summary_id = state.put_summary(document_id, summary_text, embedding.to_vec());

				if let Some(row) = state.summaries.get_mut(&summary_id) {
					row.word_count = word_count;
				}

				Ok(summary_id)
			} else {
				Err(Error::NotFound(format!("Document {document_id} does not exist.")))
			}
		};

		Box::pin(async move { result })
	}

	fn summary_by_filename<'a>(
		&'a self,
		filename: &'a str,
	) -> BoxFuture<'a, Result<Option<Summary>>> {
		let state = self.lock();
		let result = state.documents.values().find(|d| d.filename == filename).and_then(|doc| {
			state.summaries.values().find(|s| s.document_id == doc.id).map(|s| Summary {
				summary_id: s.id,
				document_id: doc.id,
				filename: doc.filename.clone(),
				summary_text: s.text.clone(),
				word_count: s.word_count,
			})
		});

		drop(state);

		Box::pin(async move { Ok(result) })
	}

	fn rank_summaries<'a>(
		&'a self,
		query: SummaryQuery<'a>,
	) -> BoxFuture<'a, Result<Vec<SummaryScore>>> {
		let state = self.lock();
		let mut scores: Vec<SummaryScore> = state
			.summaries
			.values()
			.filter_map(|s| {
				let doc = state.documents.get(&s.document_id)?;
				let similarity = cosine_similarity(&s.embedding, query.embedding);
				let matched = lexical::filename_matches_terms(&doc.filename, query.filename_terms);

				Some(SummaryScore {
					summary_id: s.id,
					document_id: doc.id,
					filename: doc.filename.clone(),
					summary_text: s.text.clone(),
					similarity,
					score: lexical::boosted(similarity, matched, query.boost),
				})
			})
			.collect();

		drop(state);
		scores.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.summary_id.cmp(&b.summary_id)));
		scores.truncate(query.limit);

		Box::pin(async move { Ok(scores) })
	}

	fn insert_image<'a>(
		&'a self,
		document_id: i64,
		image: &'a NewImage,
	) -> BoxFuture<'a, Result<i64>> {
		let result = {
			let mut state = self.lock();

			if state.documents.contains_key(&document_id) {
				Ok(state.put_image(document_id, image))
			} else {
				Err(Error::NotFound(format!("Document {document_id} does not exist.")))
			}
		};

		Box::pin(async move { result })
	}

	fn delete_images_for_document<'a>(&'a self, document_id: i64) -> BoxFuture<'a, Result<u64>> {
		let mut state = self.lock();
		let before = state.images.len();

		state.images.retain(|_, img| img.document_id != document_id);

		let removed = (before - state.images.len()) as u64;

		drop(state);

		Box::pin(async move { Ok(removed) })
	}

	fn score_images<'a>(&'a self, query: &'a [f32]) -> BoxFuture<'a, Result<Vec<ImageScore>>> {
		let state = self.lock();
		let scores = state
			.images
			.values()
			.filter_map(|img| {
				let doc = state.documents.get(&img.document_id)?;

				Some(ImageScore {
					image_id: img.id,
					document_id: doc.id,
					filename: doc.filename.clone(),
					description: img.description.clone(),
					similarity: cosine_similarity(&img.embedding, query),
				})
			})
			.collect();

		drop(state);

		Box::pin(async move { Ok(scores) })
	}

	fn images_for_document<'a>(&'a self, document_id: i64) -> BoxFuture<'a, Result<Vec<Image>>> {
		let state = self.lock();
		let mut images: Vec<Image> = state
			.images
			.values()
			.filter(|img| img.document_id == document_id)
			.filter_map(|img| state.image(img))
			.collect();

		drop(state);
		images.sort_by(|a, b| {
			let page = |img: &Image| img.page_number.unwrap_or(i32::MAX);

			page(a).cmp(&page(b)).then(a.image_id.cmp(&b.image_id))
		});

		Box::pin(async move { Ok(images) })
	}

	fn images_by_ids<'a>(&'a self, ids: &'a [i64]) -> BoxFuture<'a, Result<Vec<Image>>> {
		let state = self.lock();
		let images = ids
			.iter()
			.filter_map(|id| state.images.get(id))
			.filter_map(|img| state.image(img))
			.collect();

		drop(state);

		Box::pin(async move { Ok(images) })
	}

	fn image_payload<'a>(&'a self, image_id: i64) -> BoxFuture<'a, Result<Option<ImagePayload>>> {
		let result = self.lock().images.get(&image_id).map(|img| ImagePayload {
			image_id: img.id,
			image_format: img.format.clone(),
			image_data: img.data.clone(),
		});

		Box::pin(async move { Ok(result) })
	}

	fn insert_rfq<'a>(
		&'a self,
		title: &'a str,
		content: &'a str,
		status: &'a str,
	) -> BoxFuture<'a, Result<GeneratedRfq>> {
		let rfq = {
			let mut state = self.lock();
			let now = OffsetDateTime::now_utc();
			let rfq = GeneratedRfq {
				id: state.next_id(),
				title: title.to_string(),
				content: content.to_string(),
				status: status.to_string(),
				created_at: now,
				updated_at: now,
			};

			state.rfqs.insert(rfq.id, rfq.clone());

			rfq
		};

		Box::pin(async move { Ok(rfq) })
	}

	fn update_rfq<'a>(
		&'a self,
		id: i64,
		title: &'a str,
		content: &'a str,
		status: &'a str,
	) -> BoxFuture<'a, Result<Option<GeneratedRfq>>> {
		let result = self.lock().rfqs.get_mut(&id).map(|rfq| {
			rfq.title = title.to_string();
			rfq.content = content.to_string();
			rfq.status = status.to_string();
			rfq.updated_at = OffsetDateTime::now_utc();

			rfq.clone()
		});

		Box::pin(async move { Ok(result) })
	}

	fn update_rfq_status<'a>(&'a self, id: i64, status: &'a str) -> BoxFuture<'a, Result<bool>> {
		let updated = match self.lock().rfqs.get_mut(&id) {
			Some(rfq) => {
				rfq.status = status.to_string();
				rfq.updated_at = OffsetDateTime::now_utc();

				true
			},
			None => false,
		};

		Box::pin(async move { Ok(updated) })
	}

	fn get_rfq<'a>(&'a self, id: i64) -> BoxFuture<'a, Result<Option<GeneratedRfq>>> {
		let result = self.lock().rfqs.get(&id).cloned();

		Box::pin(async move { Ok(result) })
	}

	fn list_rfqs<'a>(&'a self) -> BoxFuture<'a, Result<Vec<GeneratedRfq>>> {
		let mut rfqs: Vec<GeneratedRfq> = self.lock().rfqs.values().cloned().collect();

		rfqs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

		Box::pin(async move { Ok(rfqs) })
	}

	fn delete_rfq<'a>(&'a self, id: i64) -> BoxFuture<'a, Result<bool>> {
		let removed = self.lock().rfqs.remove(&id).is_some();

		Box::pin(async move { Ok(removed) })
	}
}

/// Cosine similarity, `0.0` for empty, zero, or mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
	if a.is_empty() || a.len() != b.len() {
		return 0.0;
	}

	let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
	let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
	let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

	if norm_a == 0.0 || norm_b == 0.0 {
		return 0.0;
	}

	dot / (norm_a * norm_b)
}

#[derive(Default)]
struct State {
	next_id: i64,
	documents: BTreeMap<i64, DocumentRow>,
	summaries: BTreeMap<i64, SummaryRow>,
	images: BTreeMap<i64, ImageRow>,
	rfqs: BTreeMap<i64, GeneratedRfq>,
}
impl State {
	fn next_id(&mut self) -> i64 {
		self.next_id += 1;

		self.next_id
	}

	fn put_document(&mut self, filename: &str, category: &str, content: Vec<u8>) -> i64 {
		let id = self.next_id();

		self.documents.insert(id, DocumentRow {
			id,
			filename: filename.to_string(),
			category: category.to_string(),
			content,
			uploaded_at: OffsetDateTime::now_utc(),
		});

		id
	}

	fn put_summary(&mut self, document_id: i64, text: &str, embedding: Vec<f32>) -> i64 {
		let word_count = text.split_whitespace().count() as i32;
		let existing =
			self.summaries.values().find(|s| s.document_id == document_id).map(|s| s.id);
		let id = match existing {
			Some(id) => id,
			None => self.next_id(),
		};

		self.summaries.insert(id, SummaryRow {
			id,
			document_id,
			text: text.to_string(),
			word_count,
			embedding,
		});

		id
	}

	fn put_image(&mut self, document_id: i64, image: &NewImage) -> i64 {
		let id = self.next_id();

		self.images.insert(id, ImageRow {
			id,
			document_id,
			description: image.description.clone(),
			page_number: image.page_number,
			format: image.image_format.clone(),
			width: image.width,
			height: image.height,
			data: image.data.clone(),
			embedding: image.embedding.clone(),
		});

		id
	}

	fn remove_document(&mut self, id: i64) -> bool {
		if self.documents.remove(&id).is_none() {
			return false;
		}

		self.summaries.retain(|_, s| s.document_id != id);
		self.images.retain(|_, img| img.document_id != id);

		true
	}

	fn image(&self, img: &ImageRow) -> Option<Image> {
		let doc = self.documents.get(&img.document_id)?;

		Some(Image {
			image_id: img.id,
			document_id: doc.id,
			filename: doc.filename.clone(),
			description: img.description.clone(),
			page_number: img.page_number,
			image_format: img.format.clone(),
			width: img.width,
			height: img.height,
		})
	}
}

struct DocumentRow {
	id: i64,
	filename: String,
	category: String,
	content: Vec<u8>,
	uploaded_at: OffsetDateTime,
}
impl DocumentRow {
	fn to_document(&self) -> Document {
		Document {
			id: self.id,
			filename: self.filename.clone(),
			category: self.category.clone(),
			file_size: self.content.len() as i64,
			uploaded_at: self.uploaded_at,
		}
	}

	fn to_content(&self) -> DocumentContent {
		DocumentContent {
			id: self.id,
			filename: self.filename.clone(),
			file_content: self.content.clone(),
		}
	}
}

struct SummaryRow {
	id: i64,
	document_id: i64,
	text: String,
	word_count: i32,
	embedding: Vec<f32>,
}

struct ImageRow {
	id: i64,
	document_id: i64,
	description: String,
	page_number: Option<i32>,
	format: String,
	width: Option<i32>,
	height: Option<i32>,
	data: Vec<u8>,
	embedding: Vec<f32>,
}
