use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub retrieval: Retrieval,
	#[serde(default)]
	pub images: Images,
	#[serde(default)]
	pub agent: Agent,
	#[serde(default)]
	pub ingestion: Ingestion,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	/// Text encoder used for summaries and queries.
	pub embedding: EmbeddingProviderConfig,
	/// Joint image/text encoder. Its vector space is separate from `embedding`.
	pub image_embedding: EmbeddingProviderConfig,
	/// Zero-shot image classifier used to filter extracted images at ingestion.
	pub image_classifier: ProviderConfig,
	pub llm: LlmProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	pub top_k: u32,
	/// Cap applied after per-file deduplication, before results reach the model.
	pub context_limit: u32,
	pub filename_boost: f32,
	pub preview_chars: u32,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self { top_k: 5, context_limit: 5, filename_boost: 1.2, preview_chars: 200 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Images {
	pub top_k: u32,
	pub candidate_pool: u32,
	/// Minimum boosted score for a document to be treated as the primary document.
	pub primary_threshold: f32,
	/// Minimum boosted score for an image to survive the cross-corpus fallback.
	pub fallback_threshold: f32,
	pub filename_boost: f32,
	pub min_keyword_chars: u32,
}
impl Default for Images {
	fn default() -> Self {
		Self {
			top_k: 3,
			candidate_pool: 30,
			primary_threshold: 0.15,
			fallback_threshold: 0.45,
			filename_boost: 1.3,
			min_keyword_chars: 4,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Agent {
	pub max_iterations: u32,
	pub history_limit: u32,
}
impl Default for Agent {
	fn default() -> Self {
		Self { max_iterations: 3, history_limit: 12 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Ingestion {
	pub target_labels: Vec<String>,
	pub negative_labels: Vec<String>,
	pub min_label_confidence: f32,
	pub summary_fallback_chars: u32,
}
impl Default for Ingestion {
	fn default() -> Self {
		Self {
			target_labels: [
				"a technical diagram of a car part",
				"an automobile engine",
				"a vehicle component",
				"a car brake system",
				"an automotive assembly",
				"a car interior",
				"a vehicle chassis",
			]
			.into_iter()
			.map(String::from)
			.collect(),
			negative_labels: [
				"a person",
				"a landscape",
				"nature",
				"food",
				"text only",
				"a building",
				"an animal",
				"furniture",
			]
			.into_iter()
			.map(String::from)
			.collect(),
			min_label_confidence: 0.15,
			summary_fallback_chars: 1_000,
		}
	}
}
