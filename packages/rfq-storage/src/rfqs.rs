use sqlx::PgPool;

use crate::{Result, models::GeneratedRfq};

const RFQ_COLUMNS: &str = "id, title, content, status, created_at, updated_at";

pub async fn insert_rfq(
	pool: &PgPool,
	title: &str,
	content: &str,
	status: &str,
) -> Result<GeneratedRfq> {
	let sql = format!(
		"\
INSERT INTO generated_rfqs (title, content, status)
VALUES ($1, $2, $3)
RETURNING {RFQ_COLUMNS}"
	);
	let row = sqlx::query_as::<_, GeneratedRfq>(&sql)
		.bind(title)
		.bind(content)
		.bind(status)
		.fetch_one(pool)
		.await?;

	Ok(row)
}

pub async fn update_rfq(
	pool: &PgPool,
	id: i64,
	title: &str,
	content: &str,
	status: &str,
) -> Result<Option<GeneratedRfq>> {
	let sql = format!(
		"\
UPDATE generated_rfqs
SET
	title = $2,
	content = $3,
	status = $4,
	updated_at = now()
WHERE id = $1
RETURNING {RFQ_COLUMNS}"
	);
	let row = sqlx::query_as::<_, GeneratedRfq>(&sql)
		.bind(id)
		.bind(title)
		.bind(content)
		.bind(status)
		.fetch_optional(pool)
		.await?;

	Ok(row)
}

pub async fn update_rfq_status(pool: &PgPool, id: i64, status: &str) -> Result<bool> {
	let result =
		sqlx::query("UPDATE generated_rfqs SET status = $2, updated_at = now() WHERE id = $1")
			.bind(id)
			.bind(status)
			.execute(pool)
			.await?;

	Ok(result.rows_affected() > 0)
}

pub async fn get_rfq(pool: &PgPool, id: i64) -> Result<Option<GeneratedRfq>> {
	let sql = format!("SELECT {RFQ_COLUMNS} FROM generated_rfqs WHERE id = $1");
	let row = sqlx::query_as::<_, GeneratedRfq>(&sql).bind(id).fetch_optional(pool).await?;

	Ok(row)
}

pub async fn list_rfqs(pool: &PgPool) -> Result<Vec<GeneratedRfq>> {
	let sql =
		format!("SELECT {RFQ_COLUMNS} FROM generated_rfqs ORDER BY created_at DESC, id DESC");
	let rows = sqlx::query_as::<_, GeneratedRfq>(&sql).fetch_all(pool).await?;

	Ok(rows)
}

pub async fn delete_rfq(pool: &PgPool, id: i64) -> Result<bool> {
	let result =
		sqlx::query("DELETE FROM generated_rfqs WHERE id = $1").bind(id).execute(pool).await?;

	Ok(result.rows_affected() > 0)
}
