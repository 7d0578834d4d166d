pub mod agent;
pub mod documents;
pub mod draft;
pub mod images;
pub mod prompts;
pub mod review;
pub mod rfqs;
pub mod search;

mod error;

use std::{future::Future, pin::Pin, sync::Arc};

pub use agent::{ChatRequest, ChatResponse, HistoryMessage, RelatedDocument};
pub use documents::{IndexReport, IngestImage, IngestRequest, ImageStats};
pub use draft::{DraftUpdate, GenerateDraftRequest};
pub use error::{Error, Result};
pub use images::ImageHit;
pub use review::RequirementCheck;
pub use rfqs::{SaveRfqRequest, SaveRfqResponse, SaveStatus};
pub use search::{SearchHit, SearchResult};

use rfq_config::{Config, EmbeddingProviderConfig, LlmProviderConfig, ProviderConfig};
use rfq_providers::{
	chat::{self, ChatMessage, ChatOutcome, ToolSpec},
	classify::{self, Classification},
	embedding,
};
use rfq_storage::Store;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;

	fn embed_images<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		data_urls: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

pub trait ClassifierProvider
where
	Self: Send + Sync,
{
	fn classify<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		image_data_url: &'a str,
		labels: &'a [String],
	) -> BoxFuture<'a, Result<Classification>>;
}

pub trait ChatProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [ChatMessage],
		tools: &'a [ToolSpec],
	) -> BoxFuture<'a, Result<ChatOutcome>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub classifier: Arc<dyn ClassifierProvider>,
	pub chat: Arc<dyn ChatProvider>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		classifier: Arc<dyn ClassifierProvider>,
		chat: Arc<dyn ChatProvider>,
	) -> Self {
		Self { embedding, classifier, chat }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), classifier: provider.clone(), chat: provider }
	}
}

pub struct RfqService {
	pub cfg: Config,
	pub store: Arc<dyn Store>,
	pub providers: Providers,
}
impl RfqService {
	pub fn new(cfg: Config, store: Arc<dyn Store>) -> Self {
		Self { cfg, store, providers: Providers::default() }
	}

	pub fn with_providers(cfg: Config, store: Arc<dyn Store>, providers: Providers) -> Self {
		Self { cfg, store, providers }
	}

	/// Encodes one text and checks the vector against the configured dimension.
	pub(crate) async fn embed_one(
		&self,
		cfg: &EmbeddingProviderConfig,
		text: &str,
	) -> Result<Vec<f32>> {
		let vectors = self.providers.embedding.embed(cfg, &[text.to_string()]).await?;
		let Some(vec) = vectors.into_iter().next() else {
			return Err(Error::Provider {
				message: "Embedding provider returned no vectors.".to_string(),
			});
		};

		if vec.len() != cfg.dimensions as usize {
			return Err(Error::Provider {
				message: "Embedding vector dimension mismatch.".to_string(),
			});
		}

		Ok(vec)
	}

	/// Tool-less completion reduced to its text. A rejected request is a provider error here.
	pub(crate) async fn complete_text(&self, messages: &[ChatMessage]) -> Result<String> {
		match self.providers.chat.complete(&self.cfg.providers.llm, messages, &[]).await? {
			ChatOutcome::Completion(completion) => Ok(completion.content),
			ChatOutcome::Rejected { status, body } => Err(Error::Provider {
				message: format!("Chat request was rejected with status {status}: {body}"),
			}),
		}
	}
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(embedding::embed(cfg, texts).await?) })
	}

	fn embed_images<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		data_urls: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(embedding::embed_images(cfg, data_urls).await?) })
	}
}

impl ClassifierProvider for DefaultProviders {
	fn classify<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		image_data_url: &'a str,
		labels: &'a [String],
	) -> BoxFuture<'a, Result<Classification>> {
		Box::pin(async move { Ok(classify::classify(cfg, image_data_url, labels).await?) })
	}
}

impl ChatProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [ChatMessage],
		tools: &'a [ToolSpec],
	) -> BoxFuture<'a, Result<ChatOutcome>> {
		Box::pin(async move { Ok(chat::complete(cfg, messages, tools).await?) })
	}
}
