use std::{
	collections::VecDeque,
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
};

use serde_json::{Map, Value, json};

use rfq_config::{
	Config, EmbeddingProviderConfig, LlmProviderConfig, Postgres, ProviderConfig, Providers,
	Service, Storage,
};
use rfq_domain::markers;
use rfq_providers::{
	chat::{ChatMessage, ChatOutcome, Completion, Role, ToolCall, ToolSpec},
	classify::Classification,
};
use rfq_service::{
	BoxFuture, ChatRequest, ChatProvider, ClassifierProvider, EmbeddingProvider, Error,
	HistoryMessage, IngestImage, IngestRequest, Result, RfqService, SaveRfqRequest, SaveStatus,
	agent::{ChatMode, HistoryRole},
	prompts,
};
use rfq_testkit::MemoryStore;

const DIM: u32 = 3;

fn embedding_config(model: &str) -> EmbeddingProviderConfig {
	EmbeddingProviderConfig {
		provider_id: "test".to_string(),
		api_base: "http://127.0.0.1:1".to_string(),
		api_key: "test-key".to_string(),
		path: "/v1/embeddings".to_string(),
		model: model.to_string(),
		dimensions: DIM,
		timeout_ms: 1_000,
		default_headers: Map::new(),
	}
}

fn test_config() -> Config {
	Config {
		service: Service { http_bind: "127.0.0.1:0".to_string(), log_level: "info".to_string() },
		storage: Storage {
			postgres: Postgres { dsn: "postgres://unused".to_string(), pool_max_conns: 1 },
		},
		providers: Providers {
			embedding: embedding_config("text"),
			image_embedding: embedding_config("image"),
			image_classifier: ProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "test-key".to_string(),
				path: "/v1/classify".to_string(),
				model: "image".to_string(),
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			llm: LlmProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "test-key".to_string(),
				path: "/v1/chat/completions".to_string(),
				model: "chat".to_string(),
				temperature: 0.1,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
		},
		retrieval: Default::default(),
		images: Default::default(),
		agent: Default::default(),
		ingestion: Default::default(),
	}
}

/// Maps a text to the vector of the first keyword it contains.
struct KeywordEmbedding;
impl KeywordEmbedding {
	fn vector_for(text: &str) -> Vec<f32> {
		let text = text.to_lowercase();

		if text.contains("brake") {
			vec![1.0, 0.0, 0.0]
		} else if text.contains("pump") {
			vec![0.0, 1.0, 0.0]
		} else {
			vec![0.0, 0.0, 1.0]
		}
	}
}
impl EmbeddingProvider for KeywordEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		let vectors = texts.iter().map(|text| Self::vector_for(text)).collect();

		Box::pin(async move { Ok(vectors) })
	}

	fn embed_images<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		data_urls: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		let vectors = vec![vec![1.0, 0.0, 0.0]; data_urls.len()];

		Box::pin(async move { Ok(vectors) })
	}
}

/// Hands out queued labels, then a fixed on-topic label.
struct QueuedClassifier {
	labels: Mutex<VecDeque<(String, f32)>>,
}
impl ClassifierProvider for QueuedClassifier {
	fn classify<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		_image_data_url: &'a str,
		_labels: &'a [String],
	) -> BoxFuture<'a, Result<Classification>> {
		let (label, confidence) = self
			.labels
			.lock()
			.unwrap()
			.pop_front()
			.unwrap_or_else(|| ("a car brake system".to_string(), 0.9));

		Box::pin(async move { Ok(Classification { label, confidence }) })
	}
}

enum Reply {
	Text(String),
	Calls(Vec<(&'static str, Value)>),
	Rejected(String),
	Fail(String),
}
impl Reply {
	fn text(text: impl Into<String>) -> Self {
		Self::Text(text.into())
	}
}

/// Replays scripted replies in order, then answers every further request with `fallback`.
struct ScriptedChat {
	script: Mutex<VecDeque<Reply>>,
	fallback: Reply,
	calls: AtomicUsize,
	seen: Mutex<Vec<Vec<ChatMessage>>>,
}
impl ScriptedChat {
	fn count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	fn requests(&self) -> Vec<Vec<ChatMessage>> {
		self.seen.lock().unwrap().clone()
	}

	fn outcome(reply: &Reply, idx: usize) -> Result<ChatOutcome> {
		match reply {
			Reply::Text(text) => Ok(ChatOutcome::Completion(Completion {
				content: text.clone(),
				tool_calls: Vec::new(),
			})),
			Reply::Calls(calls) => Ok(ChatOutcome::Completion(Completion {
				content: String::new(),
				tool_calls: calls
					.iter()
					.enumerate()
					.map(|(n, (name, arguments))| ToolCall {
						id: format!("call_{idx}_{n}"),
						name: name.to_string(),
						arguments: arguments.as_object().cloned().unwrap_or_default(),
					})
					.collect(),
			})),
			Reply::Rejected(body) =>
				Ok(ChatOutcome::Rejected { status: 400, body: body.clone() }),
			Reply::Fail(message) => Err(Error::Provider { message: message.clone() }),
		}
	}
}
impl ChatProvider for ScriptedChat {
	fn complete<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		messages: &'a [ChatMessage],
		_tools: &'a [ToolSpec],
	) -> BoxFuture<'a, Result<ChatOutcome>> {
		let idx = self.calls.fetch_add(1, Ordering::SeqCst);

		self.seen.lock().unwrap().push(messages.to_vec());

		let outcome = match self.script.lock().unwrap().pop_front() {
			Some(reply) => Self::outcome(&reply, idx),
			None => Self::outcome(&self.fallback, idx),
		};

		Box::pin(async move { outcome })
	}
}

struct Harness {
	service: RfqService,
	store: Arc<MemoryStore>,
	chat: Arc<ScriptedChat>,
}

fn harness_with(script: Vec<Reply>, fallback: Reply) -> Harness {
	let store = Arc::new(MemoryStore::new());
	let chat = Arc::new(ScriptedChat {
		script: Mutex::new(script.into()),
		fallback,
		calls: AtomicUsize::new(0),
		seen: Mutex::new(Vec::new()),
	});
	let providers = rfq_service::Providers::new(
		Arc::new(KeywordEmbedding),
		Arc::new(QueuedClassifier { labels: Mutex::new(VecDeque::new()) }),
		chat.clone(),
	);
	let service = RfqService::with_providers(test_config(), store.clone(), providers);

	Harness { service, store, chat }
}

fn harness(script: Vec<Reply>) -> Harness {
	harness_with(script, Reply::text("Generated summary of the document."))
}

/// Unit vector at `cos` to the "brake" query vector.
fn at_similarity(cos: f32) -> Vec<f32> {
	vec![cos, (1.0 - cos * cos).sqrt(), 0.0]
}

fn chat_request(message: &str) -> ChatRequest {
	ChatRequest {
		history: Vec::new(),
		user_message: message.to_string(),
		selected_rfq: None,
		current_draft: None,
		mode: ChatMode::Agent,
	}
}

#[tokio::test]
async fn search_is_deterministic_and_prefers_filename_matches() {
	let h = harness(Vec::new());

	h.store.add_document("specs.pdf", "Caliper and rotor data.", at_similarity(0.5));
	h.store.add_document("brake.pdf", "Caliper and rotor data.", at_similarity(0.5));
	h.store.add_document("pump.pdf", "Flow rates.", vec![0.0, 1.0, 0.0]);

	let first = h.service.search("brake").await;
	let second = h.service.search("brake").await;

	assert_eq!(first, second);
	assert_eq!(first[0].file, "brake.pdf");
	assert_eq!(first[1].file, "specs.pdf");
	assert!(first[0].score > first[1].score);
}

#[tokio::test]
async fn search_rfq_reports_one_capped_entry_per_file() {
	let h = harness(Vec::new());

	h.store.add_document("brake.pdf", "Brake pads.", vec![1.0, 0.0, 0.0]);
	h.store.add_document("pump.pdf", "Flow rates.", vec![0.0, 1.0, 0.0]);

	let results = h.service.search_rfq("brake").await;

	assert_eq!(results.len(), 2);
	assert_eq!(results[0].file, "brake.pdf");
	assert_eq!(results[0].score, 100.0);
}

#[tokio::test]
async fn primary_document_returns_all_of_its_images() {
	let h = harness(Vec::new());
	let doc = h.store.add_document("brake_manual.pdf", "Caliper service.", at_similarity(0.6));

	for n in 0..5 {
		h.store.add_image(doc, &format!("figure {n}"), vec![0.0, 0.0, 1.0]);
	}

	let hits = h.service.search_images("brake diagrams", 10).await;

	assert_eq!(hits.len(), 5);
	assert!(hits.iter().all(|hit| hit.document_id == doc && hit.relevance == 100.0));
}

#[tokio::test]
async fn brake_manual_images_win_over_stronger_images_elsewhere() {
	let h = harness(Vec::new());
	let manual = h.store.add_document("brake_manual.pdf", "Caliper service.", at_similarity(0.6));
	let other = h.store.add_document("gearbox.pdf", "Gear ratios.", vec![0.0, 0.0, 1.0]);

	for n in 0..3 {
		h.store.add_image(manual, &format!("caliper view {n}"), vec![0.0, 1.0, 0.0]);
	}

	h.store.add_image(other, "gear train", at_similarity(0.9));

	let hits = h.service.search_images("brake diagrams", 10).await;

	assert_eq!(hits.len(), 3);
	assert!(hits.iter().all(|hit| hit.file == "brake_manual.pdf" && hit.relevance == 100.0));
}

#[tokio::test]
async fn fallback_keeps_only_strong_candidates() {
	let h = harness(Vec::new());

	// Primary by summary, but without images of its own.
	h.store.add_document("brake_spec.pdf", "Caliper torque.", at_similarity(0.6));

	let other = h.store.add_document("gearbox.pdf", "Gear ratios.", vec![0.0, 0.0, 1.0]);
	let strong = h.store.add_image(other, "gear train", at_similarity(0.9));

	h.store.add_image(other, "gear housing", at_similarity(0.3));

	let hits = h.service.search_images("brake diagrams", 10).await;

	assert_eq!(hits.len(), 1);
	assert_eq!(hits[0].image_id, strong);
	assert!(hits[0].relevance > 45.0);
}

#[tokio::test]
async fn start_session_greets_without_calling_the_model() {
	let h = harness(Vec::new());
	let response = h.service.chat(chat_request("start_session")).await;

	assert_eq!(response.reply, prompts::GREETING);
	assert_eq!(h.chat.count(), 0);
}

#[tokio::test]
async fn tool_loop_stops_at_the_iteration_cap() {
	let h = harness_with(Vec::new(), Reply::Calls(vec![("list_all_documents", json!({}))]));
	let response = h.service.chat(chat_request("What do we have?")).await;

	assert_eq!(h.chat.count(), 3);
	assert!(!response.reply.trim().is_empty());
	assert_eq!(response.reply, prompts::EXHAUSTED_REPLY);
}

#[tokio::test]
async fn tool_call_written_as_text_is_rescued() {
	let h = harness(vec![
		Reply::text("search_documents(query=\"brake pads\")"),
		Reply::text("Brake pads are covered in brake_manual.pdf."),
	]);

	h.store.add_document("brake_manual.pdf", "Brake pad wear limits.", vec![1.0, 0.0, 0.0]);

	let response = h.service.chat(chat_request("Find brake pad specs")).await;

	assert_eq!(response.reply, "Brake pads are covered in brake_manual.pdf.");
	assert_eq!(h.chat.count(), 2);

	let second = &h.chat.requests()[1];
	let tool_message = second.iter().find(|message| message.role == Role::Tool).unwrap();

	assert_eq!(tool_message.tool_call_id.as_deref(), Some("rescued_0_0"));
	assert!(tool_message.content.contains("brake_manual.pdf"));
}

#[tokio::test]
async fn tool_names_in_a_final_answer_are_not_rescued() {
	let reply = "I checked list_all_documents (which covers every file) and nothing matches brakes.";
	let h = harness(vec![Reply::text(reply), Reply::text("second answer")]);
	let response = h.service.chat(chat_request("Anything on brakes?")).await;

	assert_eq!(response.reply, reply);
	assert_eq!(h.chat.count(), 1);
}

#[tokio::test]
async fn repeated_discovery_is_counted_once() {
	let h = harness_with(
		Vec::new(),
		Reply::Calls(vec![("search_documents", json!({ "query": "brake" }))]),
	);

	h.store.add_document("brake_manual.pdf", "Caliper service.", vec![1.0, 0.0, 0.0]);

	let response = h.service.chat(chat_request("Find brake documents")).await;

	assert_eq!(h.chat.count(), 3);
	assert_eq!(response.related_documents.len(), 1);
	assert_eq!(response.related_documents[0].file, "brake_manual.pdf");
}

#[tokio::test]
async fn rejected_request_body_is_rescued() {
	let h = harness(vec![
		Reply::Rejected(
			r#"{"error":{"message":"Failed to call a function.","failed_generation":"<function=get_full_summary>{\"filename\": \"brake_manual.pdf\"}</function>"}}"#
				.to_string(),
		),
		Reply::text("The manual covers caliper service."),
	]);

	h.store.add_document("brake_manual.pdf", "Caliper service intervals.", vec![1.0, 0.0, 0.0]);

	let response = h.service.chat(chat_request("Summarize the brake manual")).await;

	assert_eq!(response.reply, "The manual covers caliper service.");

	let second = &h.chat.requests()[1];
	let tool_message = second.iter().find(|message| message.role == Role::Tool).unwrap();

	assert!(tool_message.content.starts_with("Complete summary for brake_manual.pdf"));
}

#[tokio::test]
async fn unrecoverable_failure_falls_back_to_a_plain_answer_then_apology() {
	let h = harness(vec![
		Reply::Fail("connection reset".to_string()),
		Reply::Fail("connection reset".to_string()),
	]);
	let response = h.service.chat(chat_request("Hello there")).await;

	assert_eq!(response.reply, prompts::APOLOGY);
	assert_eq!(h.chat.count(), 2);
}

#[tokio::test]
async fn deleted_images_are_not_recovered_from_history() {
	let h = harness(vec![Reply::text("See the caliper drawing again.")]);
	let doc = h.store.add_document("brake_manual.pdf", "Caliper service.", at_similarity(0.6));
	let kept_doc = h.store.add_document("pump.pdf", "Flow rates.", vec![0.0, 1.0, 0.0]);
	let deleted = h.store.add_image(doc, "caliper drawing", vec![1.0, 0.0, 0.0]);
	let kept = h.store.add_image(kept_doc, "pump housing", vec![0.0, 1.0, 0.0]);

	h.service.delete_document(doc).await.unwrap();

	let mut req = chat_request("Show it again");

	req.history = vec![
		HistoryMessage { role: HistoryRole::User, content: "Show me the caliper".to_string() },
		HistoryMessage {
			role: HistoryRole::Assistant,
			content: format!("Here: {} and {}", markers::marker(deleted), markers::marker(kept)),
		},
	];

	let response = h.service.chat(req).await;
	let first = &h.chat.requests()[0];
	let deleted_marker = markers::marker(deleted);

	assert!(first.iter().all(|message| !message.content.contains(&deleted_marker)));
	assert!(first.iter().any(|message| message.content.contains(&markers::marker(kept))));
	assert!(!response.reply.contains(&deleted_marker));
}

#[tokio::test]
async fn editing_without_a_draft_is_reported_to_the_model() {
	let h = harness(vec![
		Reply::Calls(vec![("update_rfq_draft", json!({ "instructions": "add a caliper" }))]),
		Reply::text("There is no draft open yet."),
	]);
	let response = h.service.chat(chat_request("Add a caliper to my draft")).await;

	assert_eq!(response.reply, "There is no draft open yet.");
	assert!(response.updated_draft.is_none());

	let second = &h.chat.requests()[1];
	let tool_message = second.iter().find(|message| message.role == Role::Tool).unwrap();

	assert_eq!(tool_message.content, "Error: update_rfq_draft is not available right now.");
	assert!(matches!(
		h.service.update_draft(None, "add a caliper", &[]).await,
		Err(Error::NoActiveDraft)
	));
}

#[tokio::test]
async fn draft_updates_only_keep_images_found_this_turn() {
	let h = harness(vec![
		Reply::Calls(vec![("search_images", json!({ "query": "brake diagrams" }))]),
		Reply::Calls(vec![("update_rfq_draft", json!({ "instructions": "insert the caliper" }))]),
	]);
	let doc = h.store.add_document("brake_manual.pdf", "Caliper service.", at_similarity(0.6));
	let caliper = h.store.add_image(doc, "caliper drawing", vec![1.0, 0.0, 0.0]);

	// Editor and impact replies, then the final answer.
	{
		let mut script = h.chat.script.lock().unwrap();
		script.push_back(Reply::Text(format!(
			"# RFQ\nCaliper: {}\nRotor: [[IMAGE_ID:999]]",
			markers::marker(caliper)
		)));
		script.push_back(Reply::text("Added the caliper drawing."));
		script.push_back(Reply::text("Inserted the drawing [[IMAGE_ID:999]]."));
	}

	let mut req = chat_request("Insert the caliper drawing");

	req.current_draft = Some("# RFQ\nCaliper: TBD".to_string());

	let response = h.service.chat(req).await;
	let updated = response.updated_draft.unwrap();

	assert!(updated.contains(&markers::marker(caliper)));
	assert!(!updated.contains("999"));
	assert_eq!(response.impact_analysis.as_deref(), Some("Added the caliper drawing."));
	assert_eq!(response.reply, "Inserted the drawing .");
	assert!(response.related_documents.iter().any(|doc| doc.image_id == Some(caliper)));
}

#[tokio::test]
async fn indexing_keeps_on_topic_images_only() {
	let h = harness(Vec::new());
	let classifier = QueuedClassifier {
		labels: Mutex::new(VecDeque::from([
			("a car brake system".to_string(), 0.8),
			("a person".to_string(), 0.9),
		])),
	};
	let providers = rfq_service::Providers::new(
		Arc::new(KeywordEmbedding),
		Arc::new(classifier),
		h.chat.clone(),
	);
	let service = RfqService::with_providers(test_config(), h.store.clone(), providers);
	let image = |page| IngestImage {
		data: vec![0x89, b'P', b'N', b'G'],
		format: "png".to_string(),
		page_number: Some(page),
		width: Some(64),
		height: Some(64),
	};
	let report = service
		.index_document(IngestRequest {
			filename: "brake_manual.pdf".to_string(),
			category: String::new(),
			content: b"%PDF".to_vec(),
			text: "Caliper service intervals.".to_string(),
			images: vec![image(1), image(2)],
		})
		.await
		.unwrap();

	assert_eq!(report.image_stats.total, 2);
	assert_eq!(report.image_stats.automobile, 1);
	assert_eq!(report.image_stats.non_automobile, 1);
	assert_eq!(h.store.image_count(), 1);

	let summary = service.full_summary("brake_manual.pdf").await.unwrap().unwrap();

	assert_eq!(summary.summary_text, "Generated summary of the document.");
	assert!(matches!(
		service
			.index_document(IngestRequest {
				filename: "empty.pdf".to_string(),
				category: String::new(),
				content: Vec::new(),
				text: "  ".to_string(),
				images: Vec::new(),
			})
			.await,
		Err(Error::InvalidRequest { .. })
	));
}

#[tokio::test]
async fn saved_rfqs_are_mirrored_and_cleaned_up() {
	let h = harness(Vec::new());
	let created = h
		.service
		.save_rfq(SaveRfqRequest {
			id: None,
			title: "Brake caliper".to_string(),
			content: "Supply 500 brake calipers.".to_string(),
			status: "draft".to_string(),
		})
		.await
		.unwrap();

	assert_eq!(created.status, SaveStatus::Created);

	let mirrors = |docs: Vec<rfq_storage::models::DocumentListing>| -> Vec<String> {
		docs.into_iter()
			.map(|doc| doc.filename)
			.filter(|name| name.starts_with("Generated_RFQ_"))
			.collect()
	};

	assert_eq!(mirrors(h.service.list_documents().await.unwrap()), vec![format!(
		"Generated_RFQ_{}_Brake caliper.md",
		created.id
	)]);

	let updated = h
		.service
		.save_rfq(SaveRfqRequest {
			id: Some(created.id),
			title: "Brake caliper v2".to_string(),
			content: "Supply 800 brake calipers.".to_string(),
			status: "final".to_string(),
		})
		.await
		.unwrap();

	assert_eq!(updated.status, SaveStatus::Updated);
	assert_eq!(updated.id, created.id);
	assert_eq!(mirrors(h.service.list_documents().await.unwrap()), vec![format!(
		"Generated_RFQ_{}_Brake caliper v2.md",
		created.id
	)]);

	h.service.delete_rfq(created.id).await.unwrap();

	assert!(mirrors(h.service.list_documents().await.unwrap()).is_empty());
	assert!(matches!(h.service.get_rfq(created.id).await, Err(Error::NotFound { .. })));
}

#[tokio::test]
async fn deleting_a_mirror_document_deletes_its_rfq() {
	let h = harness(Vec::new());
	let saved = h
		.service
		.save_rfq(SaveRfqRequest {
			id: None,
			title: "Rotor".to_string(),
			content: "Supply 200 brake rotors.".to_string(),
			status: "draft".to_string(),
		})
		.await
		.unwrap();
	let mirror = h
		.service
		.list_documents()
		.await
		.unwrap()
		.into_iter()
		.find(|doc| doc.filename == format!("Generated_RFQ_{}_Rotor.md", saved.id))
		.expect("Missing mirror document.");

	h.service.delete_document(mirror.id).await.unwrap();

	assert!(matches!(h.service.get_rfq(saved.id).await, Err(Error::NotFound { .. })));
	assert!(h.service.list_rfqs().await.unwrap().is_empty());
	assert!(h.service.list_documents().await.unwrap().is_empty());
}

#[tokio::test]
async fn requirement_validation_short_circuits_questions() {
	let h = harness_with(Vec::new(), Reply::text("maybe"));
	let question = h.service.validate_requirement("Which brake pads fit?").await.unwrap();

	assert!(question.valid);
	assert_eq!(h.chat.count(), 0);

	let vague = h.service.validate_requirement("Need some parts").await.unwrap();

	assert!(!vague.valid);
	assert_eq!(vague.message, "Please provide more clarity");
}

#[tokio::test]
async fn reviews_degrade_to_text() {
	let h = harness(vec![Reply::Fail("timeout".to_string())]);

	assert_eq!(h.service.gap_review("  ").await, "No draft available to review for gaps.");
	assert!(h.service.risk_review("# RFQ").await.starts_with("Risk Review Failed:"));
}
