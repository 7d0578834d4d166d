use std::{future::Future, pin::Pin};

use crate::{
	Result,
	db::Db,
	models::{
		Document, DocumentContent, DocumentListing, GeneratedRfq, Image, ImagePayload, ImageScore,
		NewDocument, NewImage, Summary, SummaryQuery, SummaryScore,
	},
	queries, rfqs,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Persistence used by the service layer. Summaries are scored, boosted, ordered, and truncated in
/// the store; image candidates come back unordered for the caller to rank.
pub trait Store
where
	Self: Send + Sync,
{
	fn upsert_document<'a>(&'a self, doc: &'a NewDocument) -> BoxFuture<'a, Result<i64>>;

	fn get_document<'a>(&'a self, id: i64) -> BoxFuture<'a, Result<Option<Document>>>;

	fn document_content<'a>(&'a self, id: i64) -> BoxFuture<'a, Result<Option<DocumentContent>>>;

	fn document_content_by_filename<'a>(
		&'a self,
		filename: &'a str,
	) -> BoxFuture<'a, Result<Option<DocumentContent>>>;

	fn list_documents<'a>(&'a self) -> BoxFuture<'a, Result<Vec<DocumentListing>>>;

	/// Deletes a document and, through cascades, its summary, images, and embeddings.
	fn delete_document<'a>(&'a self, id: i64) -> BoxFuture<'a, Result<bool>>;

	fn delete_documents_with_prefix<'a>(
		&'a self,
		prefix: &'a str,
	) -> BoxFuture<'a, Result<u64>>;

	fn replace_summary<'a>(
		&'a self,
		document_id: i64,
		summary_text: &'a str,
		word_count: i32,
		embedding: &'a [f32],
	) -> BoxFuture<'a, Result<i64>>;

	fn summary_by_filename<'a>(
		&'a self,
		filename: &'a str,
	) -> BoxFuture<'a, Result<Option<Summary>>>;

	/// Top `query.limit` summaries by boosted similarity, ties broken by summary id.
	fn rank_summaries<'a>(
		&'a self,
		query: SummaryQuery<'a>,
	) -> BoxFuture<'a, Result<Vec<SummaryScore>>>;

	fn insert_image<'a>(
		&'a self,
		document_id: i64,
		image: &'a NewImage,
	) -> BoxFuture<'a, Result<i64>>;

	fn delete_images_for_document<'a>(&'a self, document_id: i64) -> BoxFuture<'a, Result<u64>>;

	/// Cosine similarity of every embedded image to `query`, in no particular order.
	fn score_images<'a>(&'a self, query: &'a [f32]) -> BoxFuture<'a, Result<Vec<ImageScore>>>;

	fn images_for_document<'a>(&'a self, document_id: i64) -> BoxFuture<'a, Result<Vec<Image>>>;

	fn images_by_ids<'a>(&'a self, ids: &'a [i64]) -> BoxFuture<'a, Result<Vec<Image>>>;

	fn image_payload<'a>(&'a self, image_id: i64) -> BoxFuture<'a, Result<Option<ImagePayload>>>;

	fn insert_rfq<'a>(
		&'a self,
		title: &'a str,
		content: &'a str,
		status: &'a str,
	) -> BoxFuture<'a, Result<GeneratedRfq>>;

	fn update_rfq<'a>(
		&'a self,
		id: i64,
		title: &'a str,
		content: &'a str,
		status: &'a str,
	) -> BoxFuture<'a, Result<Option<GeneratedRfq>>>;

	fn update_rfq_status<'a>(&'a self, id: i64, status: &'a str) -> BoxFuture<'a, Result<bool>>;

	fn get_rfq<'a>(&'a self, id: i64) -> BoxFuture<'a, Result<Option<GeneratedRfq>>>;

	fn list_rfqs<'a>(&'a self) -> BoxFuture<'a, Result<Vec<GeneratedRfq>>>;

	fn delete_rfq<'a>(&'a self, id: i64) -> BoxFuture<'a, Result<bool>>;
}

impl Store for Db {
	fn upsert_document<'a>(&'a self, doc: &'a NewDocument) -> BoxFuture<'a, Result<i64>> {
		Box::pin(queries::upsert_document(&self.pool, doc))
	}

	fn get_document<'a>(&'a self, id: i64) -> BoxFuture<'a, Result<Option<Document>>> {
		Box::pin(queries::get_document(&self.pool, id))
	}

	fn document_content<'a>(&'a self, id: i64) -> BoxFuture<'a, Result<Option<DocumentContent>>> {
		Box::pin(queries::document_content(&self.pool, id))
	}

	fn document_content_by_filename<'a>(
		&'a self,
		filename: &'a str,
	) -> BoxFuture<'a, Result<Option<DocumentContent>>> {
		Box::pin(queries::document_content_by_filename(&self.pool, filename))
	}

	fn list_documents<'a>(&'a self) -> BoxFuture<'a, Result<Vec<DocumentListing>>> {
		Box::pin(queries::list_documents(&self.pool))
	}

	fn delete_document<'a>(&'a self, id: i64) -> BoxFuture<'a, Result<bool>> {
		Box::pin(queries::delete_document(&self.pool, id))
	}

	fn delete_documents_with_prefix<'a>(
		&'a self,
		prefix: &'a str,
	) -> BoxFuture<'a, Result<u64>> {
		Box::pin(queries::delete_documents_with_prefix(&self.pool, prefix))
	}

	fn replace_summary<'a>(
		&'a self,
		document_id: i64,
		summary_text: &'a str,
		word_count: i32,
		embedding: &'a [f32],
	) -> BoxFuture<'a, Result<i64>> {
		Box::pin(queries::replace_summary(
			&self.pool,
			document_id,
			summary_text,
			word_count,
			embedding,
		))
	}

	fn summary_by_filename<'a>(
		&'a self,
		filename: &'a str,
	) -> BoxFuture<'a, Result<Option<Summary>>> {
		Box::pin(queries::summary_by_filename(&self.pool, filename))
	}

	fn rank_summaries<'a>(
		&'a self,
		query: SummaryQuery<'a>,
	) -> BoxFuture<'a, Result<Vec<SummaryScore>>> {
		Box::pin(queries::rank_summaries(&self.pool, query))
	}

	fn insert_image<'a>(
		&'a self,
		document_id: i64,
		image: &'a NewImage,
	) -> BoxFuture<'a, Result<i64>> {
		Box::pin(queries::insert_image(&self.pool, document_id, image))
	}

	fn delete_images_for_document<'a>(&'a self, document_id: i64) -> BoxFuture<'a, Result<u64>> {
		Box::pin(queries::delete_images_for_document(&self.pool, document_id))
	}

	fn score_images<'a>(&'a self, query: &'a [f32]) -> BoxFuture<'a, Result<Vec<ImageScore>>> {
		Box::pin(queries::score_images(&self.pool, query))
	}

	fn images_for_document<'a>(&'a self, document_id: i64) -> BoxFuture<'a, Result<Vec<Image>>> {
		Box::pin(queries::images_for_document(&self.pool, document_id))
	}

	fn images_by_ids<'a>(&'a self, ids: &'a [i64]) -> BoxFuture<'a, Result<Vec<Image>>> {
		Box::pin(queries::images_by_ids(&self.pool, ids))
	}

	fn image_payload<'a>(&'a self, image_id: i64) -> BoxFuture<'a, Result<Option<ImagePayload>>> {
		Box::pin(queries::image_payload(&self.pool, image_id))
	}

	fn insert_rfq<'a>(
		&'a self,
		title: &'a str,
		content: &'a str,
		status: &'a str,
	) -> BoxFuture<'a, Result<GeneratedRfq>> {
		Box::pin(rfqs::insert_rfq(&self.pool, title, content, status))
	}

	fn update_rfq<'a>(
		&'a self,
		id: i64,
		title: &'a str,
		content: &'a str,
		status: &'a str,
	) -> BoxFuture<'a, Result<Option<GeneratedRfq>>> {
		Box::pin(rfqs::update_rfq(&self.pool, id, title, content, status))
	}

	fn update_rfq_status<'a>(&'a self, id: i64, status: &'a str) -> BoxFuture<'a, Result<bool>> {
		Box::pin(rfqs::update_rfq_status(&self.pool, id, status))
	}

	fn get_rfq<'a>(&'a self, id: i64) -> BoxFuture<'a, Result<Option<GeneratedRfq>>> {
		Box::pin(rfqs::get_rfq(&self.pool, id))
	}

	fn list_rfqs<'a>(&'a self) -> BoxFuture<'a, Result<Vec<GeneratedRfq>>> {
		Box::pin(rfqs::list_rfqs(&self.pool))
	}

	fn delete_rfq<'a>(&'a self, id: i64) -> BoxFuture<'a, Result<bool>> {
		Box::pin(rfqs::delete_rfq(&self.pool, id))
	}
}
