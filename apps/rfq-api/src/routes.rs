use axum::{
	Json, Router,
	extract::{Path, State},
	http::{StatusCode, header},
	response::{IntoResponse, Response},
	routing::{delete, get, patch, post},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use rfq_service::{
	ChatRequest, ChatResponse, DraftUpdate, Error as ServiceError, GenerateDraftRequest, ImageHit,
	IndexReport, IngestImage, IngestRequest, RequirementCheck, SaveRfqRequest, SaveRfqResponse,
	SearchResult,
};
use rfq_storage::models::{DocumentContent, DocumentListing, GeneratedRfq};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/chat", post(chat))
		.route("/validate_requirement", post(validate_requirement))
		.route("/search_rfq", post(search_rfq))
		.route("/search_images", post(search_images))
		.route("/generate_final_rfq", post(generate_final_rfq))
		.route("/edit_rfq", post(edit_rfq))
		.route("/analyze_changes", post(analyze_changes))
		.route("/review/gaps", post(gap_review))
		.route("/review/risks", post(risk_review))
		.route("/documents", get(list_documents))
		.route("/documents/{document_id}", delete(delete_document))
		.route("/documents/{document_id}/view", get(view_document))
		.route("/documents/{document_id}/download", get(download_document))
		.route("/documents/view/by-name/{filename}", get(view_document_by_name))
		.route("/rfq_pdf/{filename}", get(rfq_pdf))
		.route("/upload", post(upload))
		.route("/rfq_text/{filename}", get(rfq_text))
		.route("/images/{image_id}", get(image))
		.route("/rfqs", get(list_rfqs))
		.route("/rfqs/save", post(save_rfq))
		.route("/rfqs/{rfq_id}", get(get_rfq).delete(delete_rfq))
		.route("/rfqs/{rfq_id}/status", patch(update_rfq_status))
		.with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
	pub query: String,
	#[serde(default)]
	pub top_k: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse<T> {
	pub results: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct RequirementRequest {
	pub requirement: String,
}

#[derive(Debug, Deserialize)]
pub struct EditRequest {
	pub current_text: String,
	pub instruction: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRequest {
	pub old_text: String,
	pub new_text: String,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
	#[serde(default)]
	pub draft: String,
}

#[derive(Debug, Serialize)]
pub struct TextResponse {
	pub text: String,
}

/// A document upload with text already extracted by the client. Binary fields are base64.
#[derive(Debug, Deserialize)]
pub struct UploadRequest {
	pub filename: String,
	#[serde(default)]
	pub category: String,
	pub text: String,
	#[serde(default)]
	pub content_base64: Option<String>,
	#[serde(default)]
	pub images: Vec<UploadImage>,
}

#[derive(Debug, Deserialize)]
pub struct UploadImage {
	pub data_base64: String,
	#[serde(default = "default_image_format")]
	pub format: String,
	#[serde(default)]
	pub page_number: Option<i32>,
	#[serde(default)]
	pub width: Option<i32>,
	#[serde(default)]
	pub height: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
	pub status: String,
}

fn default_image_format() -> String {
	"png".to_string()
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn chat(
	State(state): State<AppState>,
	Json(payload): Json<ChatRequest>,
) -> Json<ChatResponse> {
	Json(state.service.chat(payload).await)
}

async fn validate_requirement(
	State(state): State<AppState>,
	Json(payload): Json<RequirementRequest>,
) -> Result<Json<RequirementCheck>, ApiError> {
	let response = state.service.validate_requirement(&payload.requirement).await?;

	Ok(Json(response))
}

async fn search_rfq(
	State(state): State<AppState>,
	Json(payload): Json<QueryRequest>,
) -> Json<SearchResponse<SearchResult>> {
	Json(SearchResponse { results: state.service.search_rfq(&payload.query).await })
}

async fn search_images(
	State(state): State<AppState>,
	Json(payload): Json<QueryRequest>,
) -> Json<SearchResponse<ImageHit>> {
	let top_k = payload.top_k.unwrap_or(state.service.cfg.images.top_k as usize);

	Json(SearchResponse { results: state.service.search_images(&payload.query, top_k).await })
}

async fn generate_final_rfq(
	State(state): State<AppState>,
	Json(payload): Json<GenerateDraftRequest>,
) -> Result<Json<TextResponse>, ApiError> {
	let text = state.service.generate_draft(&payload).await?;

	Ok(Json(TextResponse { text }))
}

async fn edit_rfq(
	State(state): State<AppState>,
	Json(payload): Json<EditRequest>,
) -> Result<Json<DraftUpdate>, ApiError> {
	let response = state.service.edit_rfq(&payload.current_text, &payload.instruction).await?;

	Ok(Json(response))
}

async fn analyze_changes(
	State(state): State<AppState>,
	Json(payload): Json<ChangeRequest>,
) -> Result<Json<TextResponse>, ApiError> {
	let text = state.service.analyze_changes(&payload.old_text, &payload.new_text).await?;

	Ok(Json(TextResponse { text }))
}

async fn gap_review(
	State(state): State<AppState>,
	Json(payload): Json<ReviewRequest>,
) -> Json<TextResponse> {
	Json(TextResponse { text: state.service.gap_review(&payload.draft).await })
}

async fn risk_review(
	State(state): State<AppState>,
	Json(payload): Json<ReviewRequest>,
) -> Json<TextResponse> {
	Json(TextResponse { text: state.service.risk_review(&payload.draft).await })
}

async fn list_documents(
	State(state): State<AppState>,
) -> Result<Json<Vec<DocumentListing>>, ApiError> {
	Ok(Json(state.service.list_documents().await?))
}

async fn delete_document(
	State(state): State<AppState>,
	Path(document_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
	state.service.delete_document(document_id).await?;

	Ok(Json(json!({ "status": "deleted", "id": document_id })))
}

async fn view_document(
	State(state): State<AppState>,
	Path(document_id): Path<i64>,
) -> Result<Response, ApiError> {
	let document = state.service.document_content(document_id).await?;

	Ok(inline_file(document))
}

async fn view_document_by_name(
	State(state): State<AppState>,
	Path(filename): Path<String>,
) -> Result<Response, ApiError> {
	let document = state.service.document_content_by_filename(&filename).await?;

	Ok(inline_file(document))
}

async fn download_document(
	State(state): State<AppState>,
	Path(document_id): Path<i64>,
) -> Result<Response, ApiError> {
	let document = state.service.document_content(document_id).await?;
	let media_type = match extension(&document.filename).as_str() {
		"pdf" => "application/pdf",
		_ => "application/octet-stream",
	};
	let disposition = format!("attachment; filename=\"{}\"", header_safe(&document.filename));

	let headers = [
		(header::CONTENT_TYPE, media_type.to_string()),
		(header::CONTENT_DISPOSITION, disposition),
	];

	Ok((headers, document.file_content).into_response())
}

/// Raw bytes served as PDF regardless of extension.
async fn rfq_pdf(
	State(state): State<AppState>,
	Path(filename): Path<String>,
) -> Result<Response, ApiError> {
	let document = state.service.document_content_by_filename(&filename).await?;

	Ok(([(header::CONTENT_TYPE, "application/pdf")], document.file_content).into_response())
}

async fn upload(
	State(state): State<AppState>,
	Json(payload): Json<UploadRequest>,
) -> Result<Json<IndexReport>, ApiError> {
	let content = match &payload.content_base64 {
		Some(encoded) => decode_field("content_base64", encoded)?,
		None => payload.text.clone().into_bytes(),
	};
	let images = payload
		.images
		.into_iter()
		.enumerate()
		.map(|(idx, image)| {
			Ok(IngestImage {
				data: decode_field(&format!("images[{idx}].data_base64"), &image.data_base64)?,
				format: image.format,
				page_number: image.page_number,
				width: image.width,
				height: image.height,
			})
		})
		.collect::<Result<Vec<_>, ApiError>>()?;
	let report = state
		.service
		.index_document(IngestRequest {
			filename: payload.filename,
			category: payload.category,
			content,
			text: payload.text,
			images,
		})
		.await?;

	Ok(Json(report))
}

async fn rfq_text(
	State(state): State<AppState>,
	Path(filename): Path<String>,
) -> Result<Json<Value>, ApiError> {
	let Some(summary) = state.service.full_summary(&filename).await? else {
		return Err(ApiError::new(
			StatusCode::NOT_FOUND,
			"NOT_FOUND",
			format!("No summary for {filename}."),
		));
	};

	Ok(Json(json!({
		"filename": summary.filename,
		"text": summary.summary_text,
		"word_count": summary.word_count,
	})))
}

async fn image(
	State(state): State<AppState>,
	Path(image_id): Path<i64>,
) -> Result<Response, ApiError> {
	let payload = state.service.image_payload(image_id).await?;
	let content_type = format!("image/{}", payload.image_format.to_lowercase());

	Ok(([(header::CONTENT_TYPE, content_type)], payload.image_data).into_response())
}

async fn list_rfqs(State(state): State<AppState>) -> Result<Json<Vec<GeneratedRfq>>, ApiError> {
	Ok(Json(state.service.list_rfqs().await?))
}

async fn save_rfq(
	State(state): State<AppState>,
	Json(payload): Json<SaveRfqRequest>,
) -> Result<Json<SaveRfqResponse>, ApiError> {
	Ok(Json(state.service.save_rfq(payload).await?))
}

async fn get_rfq(
	State(state): State<AppState>,
	Path(rfq_id): Path<i64>,
) -> Result<Json<GeneratedRfq>, ApiError> {
	Ok(Json(state.service.get_rfq(rfq_id).await?))
}

async fn delete_rfq(
	State(state): State<AppState>,
	Path(rfq_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
	state.service.delete_rfq(rfq_id).await?;

	Ok(Json(json!({ "status": "deleted", "id": rfq_id })))
}

async fn update_rfq_status(
	State(state): State<AppState>,
	Path(rfq_id): Path<i64>,
	Json(payload): Json<StatusRequest>,
) -> Result<Json<Value>, ApiError> {
	state.service.update_rfq_status(rfq_id, &payload.status).await?;

	Ok(Json(json!({ "status": "updated", "id": rfq_id, "new_status": payload.status })))
}

fn inline_file(document: DocumentContent) -> Response {
	let media_type = match extension(&document.filename).as_str() {
		"docx" | "doc" =>
			"application/vnd.openxmlformats-officedocument.wordprocessingml.document",
		"xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
		"md" | "txt" => "text/markdown; charset=utf-8",
		_ => "application/pdf",
	};

	(
		[(header::CONTENT_TYPE, media_type), (header::CONTENT_DISPOSITION, "inline")],
		document.file_content,
	)
		.into_response()
}

fn extension(filename: &str) -> String {
	filename.rsplit('.').next().unwrap_or_default().to_lowercase()
}

/// Filename usable inside a quoted header parameter.
fn header_safe(filename: &str) -> String {
	filename
		.chars()
		.map(|c| match c {
			'"' | '\\' => '_',
			' ' => c,
			c if c.is_ascii_graphic() => c,
			_ => '_',
		})
		.collect()
}

fn decode_field(field: &str, encoded: &str) -> Result<Vec<u8>, ApiError> {
	STANDARD.decode(encoded.trim()).map_err(|err| {
		ApiError::new(
			StatusCode::BAD_REQUEST,
			"INVALID_REQUEST",
			format!("{field} is not valid base64: {err}."),
		)
	})
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		let message = err.to_string();

		match err {
			ServiceError::InvalidRequest { .. } =>
				Self::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message),
			ServiceError::NotFound { .. } => Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message),
			ServiceError::Conflict { .. } => Self::new(StatusCode::CONFLICT, "CONFLICT", message),
			ServiceError::NoActiveDraft =>
				Self::new(StatusCode::CONFLICT, "NO_ACTIVE_DRAFT", message),
			ServiceError::Provider { .. } => {
				tracing::warn!(error = %message, "Provider failure surfaced to client.");

				Self::new(StatusCode::BAD_GATEWAY, "PROVIDER_ERROR", message)
			},
			ServiceError::Storage { .. } => {
				tracing::warn!(error = %message, "Storage failure surfaced to client.");

				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", message)
			},
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}
