use serde::Serialize;
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Document {
	pub id: i64,
	pub filename: String,
	pub category: String,
	pub file_size: i64,
	#[serde(with = "time::serde::rfc3339")]
	pub uploaded_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DocumentListing {
	pub id: i64,
	pub filename: String,
	pub category: String,
	pub file_size: i64,
	#[serde(with = "time::serde::rfc3339")]
	pub uploaded_at: OffsetDateTime,
	pub image_count: i64,
	/// Word count of the stored summary, `None` until the document is summarized.
	pub summary_words: Option<i32>,
}

/// Stored bytes of an uploaded file.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DocumentContent {
	pub id: i64,
	pub filename: String,
	pub file_content: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct NewDocument {
	pub filename: String,
	pub category: String,
	pub content: Vec<u8>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Summary {
	pub summary_id: i64,
	pub document_id: i64,
	pub filename: String,
	pub summary_text: String,
	pub word_count: i32,
}

/// Summary ranking request. A summary's similarity is multiplied by `boost` when it is positive
/// and its lowercased filename contains every term of `filename_terms` in order.
#[derive(Debug, Clone, Copy)]
pub struct SummaryQuery<'a> {
	pub embedding: &'a [f32],
	pub filename_terms: &'a [String],
	pub boost: f32,
	pub limit: usize,
}

/// One ranked summary.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SummaryScore {
	pub summary_id: i64,
	pub document_id: i64,
	pub filename: String,
	pub summary_text: String,
	/// Cosine similarity to the query vector.
	pub similarity: f32,
	/// `similarity` after the filename boost; the ranking key.
	pub score: f32,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Image {
	pub image_id: i64,
	pub document_id: i64,
	pub filename: String,
	pub description: String,
	pub page_number: Option<i32>,
	pub image_format: String,
	pub width: Option<i32>,
	pub height: Option<i32>,
}

/// Cosine similarity of one image to a query vector.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ImageScore {
	pub image_id: i64,
	pub document_id: i64,
	pub filename: String,
	pub description: String,
	pub similarity: f32,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ImagePayload {
	pub image_id: i64,
	pub image_format: String,
	pub image_data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct NewImage {
	pub description: String,
	pub page_number: Option<i32>,
	pub image_format: String,
	pub width: Option<i32>,
	pub height: Option<i32>,
	pub data: Vec<u8>,
	pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GeneratedRfq {
	pub id: i64,
	pub title: String,
	pub content: String,
	pub status: String,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	#[serde(with = "time::serde::rfc3339")]
	pub updated_at: OffsetDateTime,
}
