use sqlx::PgPool;

use crate::{
	Result,
	models::{
		Document, DocumentContent, DocumentListing, Image, ImagePayload, ImageScore, NewDocument,
		NewImage, Summary, SummaryQuery, SummaryScore,
	},
	vector_to_pg,
};

pub async fn upsert_document(pool: &PgPool, doc: &NewDocument) -> Result<i64> {
	let id: i64 = sqlx::query_scalar(
		"\
INSERT INTO documents (filename, category, file_size, file_content)
VALUES ($1, $2, $3, $4)
ON CONFLICT (filename) DO UPDATE
SET
	category = EXCLUDED.category,
	file_size = EXCLUDED.file_size,
	file_content = EXCLUDED.file_content,
	uploaded_at = now()
RETURNING id",
	)
	.bind(doc.filename.as_str())
	.bind(doc.category.as_str())
	.bind(doc.content.len() as i64)
	.bind(doc.content.as_slice())
	.fetch_one(pool)
	.await?;

	Ok(id)
}

pub async fn get_document(pool: &PgPool, id: i64) -> Result<Option<Document>> {
	let row = sqlx::query_as::<_, Document>(
		"SELECT id, filename, category, file_size, uploaded_at FROM documents WHERE id = $1",
	)
	.bind(id)
	.fetch_optional(pool)
	.await?;

	Ok(row)
}

pub async fn document_content(pool: &PgPool, id: i64) -> Result<Option<DocumentContent>> {
	let row = sqlx::query_as::<_, DocumentContent>(
		"SELECT id, filename, file_content FROM documents WHERE id = $1",
	)
	.bind(id)
	.fetch_optional(pool)
	.await?;

	Ok(row)
}

pub async fn document_content_by_filename(
	pool: &PgPool,
	filename: &str,
) -> Result<Option<DocumentContent>> {
	let row = sqlx::query_as::<_, DocumentContent>(
		"SELECT id, filename, file_content FROM documents WHERE filename = $1",
	)
	.bind(filename)
	.fetch_optional(pool)
	.await?;

	Ok(row)
}

pub async fn list_documents(pool: &PgPool) -> Result<Vec<DocumentListing>> {
	let rows = sqlx::query_as::<_, DocumentListing>(
		"\
SELECT
	d.id,
	d.filename,
	d.category,
	d.file_size,
	d.uploaded_at,
	(SELECT count(*) FROM document_images di WHERE di.document_id = d.id) AS image_count,
	ds.word_count AS summary_words
FROM documents d
LEFT JOIN document_summaries ds ON ds.document_id = d.id
ORDER BY d.uploaded_at DESC, d.id DESC",
	)
	.fetch_all(pool)
	.await?;

	Ok(rows)
}

pub async fn delete_document(pool: &PgPool, id: i64) -> Result<bool> {
	let result = sqlx::query("DELETE FROM documents WHERE id = $1").bind(id).execute(pool).await?;

	Ok(result.rows_affected() > 0)
}

pub async fn delete_documents_with_prefix(pool: &PgPool, prefix: &str) -> Result<u64> {
	let pattern = format!("{}%", escape_like(prefix));
	let result = sqlx::query("DELETE FROM documents WHERE filename LIKE $1 ESCAPE '\\'")
		.bind(pattern)
		.execute(pool)
		.await?;

	Ok(result.rows_affected())
}

/// Upserts the summary of a document and its embedding in one transaction.
pub async fn replace_summary(
	pool: &PgPool,
	document_id: i64,
	summary_text: &str,
	word_count: i32,
	embedding: &[f32],
) -> Result<i64> {
	let mut tx = pool.begin().await?;
	let summary_id: i64 = sqlx::query_scalar(
		"\
INSERT INTO document_summaries (document_id, summary_text, word_count)
VALUES ($1, $2, $3)
ON CONFLICT (document_id) DO UPDATE
SET
	summary_text = EXCLUDED.summary_text,
	word_count = EXCLUDED.word_count,
	created_at = now()
RETURNING id",
	)
	.bind(document_id)
	.bind(summary_text)
	.bind(word_count)
	.fetch_one(&mut *tx)
	.await?;

	sqlx::query(
		"\
INSERT INTO summary_embeddings (summary_id, embedding)
VALUES ($1, $2::text::vector)
ON CONFLICT (summary_id) DO UPDATE
SET
	embedding = EXCLUDED.embedding,
	created_at = now()",
	)
	.bind(summary_id)
	.bind(vector_to_pg(embedding))
	.execute(&mut *tx)
	.await?;

	tx.commit().await?;

	Ok(summary_id)
}

pub async fn summary_by_filename(pool: &PgPool, filename: &str) -> Result<Option<Summary>> {
	let row = sqlx::query_as::<_, Summary>(
		"\
SELECT ds.id AS summary_id, d.id AS document_id, d.filename, ds.summary_text, ds.word_count
FROM document_summaries ds
JOIN documents d ON ds.document_id = d.id
WHERE d.filename = $1",
	)
	.bind(filename)
	.fetch_optional(pool)
	.await?;

	Ok(row)
}

/// Top `query.limit` summaries by boosted similarity, ties broken by summary id.
pub async fn rank_summaries(pool: &PgPool, query: SummaryQuery<'_>) -> Result<Vec<SummaryScore>> {
	let rows = sqlx::query_as::<_, SummaryScore>(
		"\
WITH scored AS (
	SELECT
		ds.id AS summary_id,
		d.id AS document_id,
		d.filename,
		ds.summary_text,
		(1 - (se.embedding <=> $1::text::vector))::real AS similarity
	FROM summary_embeddings se
	JOIN document_summaries ds ON se.summary_id = ds.id
	JOIN documents d ON ds.document_id = d.id
)
SELECT
	summary_id,
	document_id,
	filename,
	summary_text,
	similarity,
	(
		CASE
			WHEN $2::text IS NOT NULL AND similarity > 0 AND lower(filename) LIKE $2 ESCAPE '\\'
				THEN similarity * $3::real
			ELSE similarity
		END
	)::real AS score
FROM scored
ORDER BY score DESC, summary_id ASC
LIMIT $4",
	)
	.bind(vector_to_pg(query.embedding))
	.bind(phrase_pattern(query.filename_terms))
	.bind(query.boost)
	.bind(query.limit as i64)
	.fetch_all(pool)
	.await?;

	Ok(rows)
}

pub async fn insert_image(pool: &PgPool, document_id: i64, image: &NewImage) -> Result<i64> {
	let mut tx = pool.begin().await?;
	let image_id: i64 = sqlx::query_scalar(
		"\
INSERT INTO document_images (
	document_id,
	image_data,
	description,
	page_number,
	image_format,
	width,
	height
)
VALUES ($1, $2, $3, $4, $5, $6, $7)
RETURNING id",
	)
	.bind(document_id)
	.bind(image.data.as_slice())
	.bind(image.description.as_str())
	.bind(image.page_number)
	.bind(image.image_format.as_str())
	.bind(image.width)
	.bind(image.height)
	.fetch_one(&mut *tx)
	.await?;

	sqlx::query("INSERT INTO image_embeddings (image_id, embedding) VALUES ($1, $2::text::vector)")
		.bind(image_id)
		.bind(vector_to_pg(&image.embedding))
		.execute(&mut *tx)
		.await?;

	tx.commit().await?;

	Ok(image_id)
}

pub async fn delete_images_for_document(pool: &PgPool, document_id: i64) -> Result<u64> {
	let result = sqlx::query("DELETE FROM document_images WHERE document_id = $1")
		.bind(document_id)
		.execute(pool)
		.await?;

	Ok(result.rows_affected())
}

pub async fn score_images(pool: &PgPool, query: &[f32]) -> Result<Vec<ImageScore>> {
	let rows = sqlx::query_as::<_, ImageScore>(
		"\
SELECT
	di.id AS image_id,
	di.document_id,
	d.filename,
	di.description,
	(1 - (ie.embedding <=> $1::text::vector))::real AS similarity
FROM image_embeddings ie
JOIN document_images di ON ie.image_id = di.id
JOIN documents d ON di.document_id = d.id",
	)
	.bind(vector_to_pg(query))
	.fetch_all(pool)
	.await?;

	Ok(rows)
}

pub async fn images_for_document(pool: &PgPool, document_id: i64) -> Result<Vec<Image>> {
	let rows = sqlx::query_as::<_, Image>(
		"\
SELECT
	di.id AS image_id,
	di.document_id,
	d.filename,
	di.description,
	di.page_number,
	di.image_format,
	di.width,
	di.height
FROM document_images di
JOIN documents d ON di.document_id = d.id
WHERE di.document_id = $1
ORDER BY di.page_number NULLS LAST, di.id",
	)
	.bind(document_id)
	.fetch_all(pool)
	.await?;

	Ok(rows)
}

pub async fn images_by_ids(pool: &PgPool, ids: &[i64]) -> Result<Vec<Image>> {
	if ids.is_empty() {
		return Ok(Vec::new());
	}

	let rows = sqlx::query_as::<_, Image>(
		"\
SELECT
	di.id AS image_id,
	di.document_id,
	d.filename,
	di.description,
	di.page_number,
	di.image_format,
	di.width,
	di.height
FROM document_images di
JOIN documents d ON di.document_id = d.id
WHERE di.id = ANY($1)
ORDER BY di.id",
	)
	.bind(ids)
	.fetch_all(pool)
	.await?;

	Ok(rows)
}

pub async fn image_payload(pool: &PgPool, image_id: i64) -> Result<Option<ImagePayload>> {
	let row = sqlx::query_as::<_, ImagePayload>(
		"SELECT id AS image_id, image_format, image_data FROM document_images WHERE id = $1",
	)
	.bind(image_id)
	.fetch_optional(pool)
	.await?;

	Ok(row)
}

/// `LIKE` pattern matching the terms in order, `None` when there are none.
fn phrase_pattern(terms: &[String]) -> Option<String> {
	if terms.is_empty() {
		return None;
	}

	let mut pattern = String::from("%");

	for term in terms {
		pattern.push_str(&escape_like(term));
		pattern.push('%');
	}

	Some(pattern)
}

fn escape_like(raw: &str) -> String {
	let mut out = String::with_capacity(raw.len());

	for c in raw.chars() {
		if matches!(c, '%' | '_' | '\\') {
			out.push('\\');
		}

		out.push(c);
	}

	out
}
