use serde::{Deserialize, Serialize};

use rfq_storage::models::GeneratedRfq;

use crate::{Error, IngestRequest, Result, RfqService};

const MIRROR_PREFIX: &str = "Generated_RFQ_";
const MIRROR_CATEGORY: &str = "Generated RFQ";

#[derive(Debug, Clone, Deserialize)]
pub struct SaveRfqRequest {
	#[serde(default)]
	pub id: Option<i64>,
	#[serde(default = "default_title")]
	pub title: String,
	pub content: String,
	#[serde(default = "default_status")]
	pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
	Created,
	Updated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveRfqResponse {
	pub status: SaveStatus,
	pub id: i64,
	pub title: String,
}

/// Filename of the searchable document mirroring an RFQ.
pub fn mirror_filename(rfq_id: i64, title: &str) -> String {
	format!("{}{title}.md", mirror_prefix(rfq_id))
}

/// RFQ id encoded in a mirror filename.
pub fn rfq_id_from_mirror(filename: &str) -> Option<i64> {
	let rest = filename.strip_prefix(MIRROR_PREFIX)?;
	let (id, _) = rest.split_once('_')?;

	id.parse().ok()
}

fn mirror_prefix(rfq_id: i64) -> String {
	format!("{MIRROR_PREFIX}{rfq_id}_")
}

fn default_title() -> String {
	"Untitled RFQ".to_string()
}

fn default_status() -> String {
	"draft".to_string()
}

impl RfqService {
	/// Updates the RFQ when `id` names an existing row, otherwise inserts it. Either way its mirror
	/// document is rebuilt.
	pub async fn save_rfq(&self, req: SaveRfqRequest) -> Result<SaveRfqResponse> {
		let title = req.title.trim();

		if title.is_empty() {
			return Err(Error::InvalidRequest { message: "title must be non-empty.".to_string() });
		}
		if req.status.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "status must be non-empty.".to_string() });
		}

		let updated = match req.id {
			Some(id) => self.store.update_rfq(id, title, &req.content, &req.status).await?,
			None => None,
		};
		let (status, rfq) = match updated {
			Some(rfq) => (SaveStatus::Updated, rfq),
			None =>
				(SaveStatus::Created, self.store.insert_rfq(title, &req.content, &req.status).await?),
		};

		self.sync_mirror(&rfq).await;

		Ok(SaveRfqResponse { status, id: rfq.id, title: rfq.title })
	}

	pub async fn update_rfq_status(&self, id: i64, status: &str) -> Result<()> {
		if status.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "status must be non-empty.".to_string() });
		}
		if !self.store.update_rfq_status(id, status).await? {
			return Err(Error::NotFound { message: format!("RFQ {id} not found.") });
		}

		Ok(())
	}

	pub async fn get_rfq(&self, id: i64) -> Result<GeneratedRfq> {
		self.store
			.get_rfq(id)
			.await?
			.ok_or_else(|| Error::NotFound { message: format!("RFQ {id} not found.") })
	}

	/// Newest first.
	pub async fn list_rfqs(&self) -> Result<Vec<GeneratedRfq>> {
		Ok(self.store.list_rfqs().await?)
	}

	/// Removes the mirror document first, then the RFQ.
	pub async fn delete_rfq(&self, id: i64) -> Result<()> {
		let mirrors = self.store.delete_documents_with_prefix(&mirror_prefix(id)).await?;

		tracing::debug!(rfq_id = id, mirrors, "Removed RFQ mirrors.");

		if !self.store.delete_rfq(id).await? {
			return Err(Error::NotFound { message: format!("RFQ {id} not found.") });
		}

		Ok(())
	}

	/// Mirror indexing is best effort; the RFQ row is already saved.
	async fn sync_mirror(&self, rfq: &GeneratedRfq) {
		if let Err(err) = self.store.delete_documents_with_prefix(&mirror_prefix(rfq.id)).await {
			tracing::warn!(error = %err, rfq_id = rfq.id, "Failed to remove stale RFQ mirrors.");
		}

		let req = IngestRequest {
			filename: mirror_filename(rfq.id, &rfq.title),
			category: MIRROR_CATEGORY.to_string(),
			content: rfq.content.clone().into_bytes(),
			text: rfq.content.clone(),
			images: Vec::new(),
		};

		if let Err(err) = self.index_document(req).await {
			tracing::warn!(error = %err, rfq_id = rfq.id, "Failed to index RFQ mirror.");
		}
	}
}
