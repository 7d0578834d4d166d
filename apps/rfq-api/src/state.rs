use std::sync::Arc;

use rfq_service::RfqService;
use rfq_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<RfqService>,
}
impl AppState {
	pub async fn new(config: rfq_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema(
			config.providers.embedding.dimensions,
			config.providers.image_embedding.dimensions,
		)
		.await?;

		Ok(Self::from_service(RfqService::new(config, Arc::new(db))))
	}

	pub fn from_service(service: RfqService) -> Self {
		Self { service: Arc::new(service) }
	}
}
