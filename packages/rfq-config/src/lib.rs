mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Agent, Config, EmbeddingProviderConfig, Images, Ingestion, LlmProviderConfig, Postgres,
	ProviderConfig, Providers, Retrieval, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}

	for (label, dimensions) in [
		("providers.embedding", cfg.providers.embedding.dimensions),
		("providers.image_embedding", cfg.providers.image_embedding.dimensions),
	] {
		if dimensions == 0 {
			return Err(Error::Validation {
				message: format!("{label}.dimensions must be greater than zero."),
			});
		}
	}
	for (label, key, timeout_ms) in [
		("embedding", &cfg.providers.embedding.api_key, cfg.providers.embedding.timeout_ms),
		(
			"image_embedding",
			&cfg.providers.image_embedding.api_key,
			cfg.providers.image_embedding.timeout_ms,
		),
		(
			"image_classifier",
			&cfg.providers.image_classifier.api_key,
			cfg.providers.image_classifier.timeout_ms,
		),
		("llm", &cfg.providers.llm.api_key, cfg.providers.llm.timeout_ms),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
		if timeout_ms == 0 {
			return Err(Error::Validation {
				message: format!("providers.{label}.timeout_ms must be greater than zero."),
			});
		}
	}

	if !cfg.providers.llm.temperature.is_finite() || cfg.providers.llm.temperature < 0.0 {
		return Err(Error::Validation {
			message: "providers.llm.temperature must be a finite number, zero or greater."
				.to_string(),
		});
	}

	for (label, value) in [
		("retrieval.top_k", cfg.retrieval.top_k),
		("retrieval.context_limit", cfg.retrieval.context_limit),
		("images.top_k", cfg.images.top_k),
		("images.candidate_pool", cfg.images.candidate_pool),
		("agent.max_iterations", cfg.agent.max_iterations),
	] {
		if value == 0 {
			return Err(Error::Validation { message: format!("{label} must be greater than zero.") });
		}
	}

	if cfg.images.candidate_pool < cfg.images.top_k {
		return Err(Error::Validation {
			message: "images.candidate_pool must be at least images.top_k.".to_string(),
		});
	}

	for (label, boost) in [
		("retrieval.filename_boost", cfg.retrieval.filename_boost),
		("images.filename_boost", cfg.images.filename_boost),
	] {
		if !boost.is_finite() {
			return Err(Error::Validation { message: format!("{label} must be a finite number.") });
		}
		if boost < 1.0 {
			return Err(Error::Validation { message: format!("{label} must be 1.0 or greater.") });
		}
	}
	for (label, threshold) in [
		("images.primary_threshold", cfg.images.primary_threshold),
		("images.fallback_threshold", cfg.images.fallback_threshold),
		("ingestion.min_label_confidence", cfg.ingestion.min_label_confidence),
	] {
		if !threshold.is_finite() {
			return Err(Error::Validation { message: format!("{label} must be a finite number.") });
		}
		if !(0.0..=1.0).contains(&threshold) {
			return Err(Error::Validation {
				message: format!("{label} must be in the range 0.0-1.0."),
			});
		}
	}

	if cfg.ingestion.target_labels.is_empty() {
		return Err(Error::Validation {
			message: "ingestion.target_labels must be non-empty.".to_string(),
		});
	}
	if cfg.ingestion.summary_fallback_chars == 0 {
		return Err(Error::Validation {
			message: "ingestion.summary_fallback_chars must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	for labels in [&mut cfg.ingestion.target_labels, &mut cfg.ingestion.negative_labels] {
		labels.iter_mut().for_each(|label| *label = label.trim().to_string());
		labels.retain(|label| !label.is_empty());
	}

	cfg.providers.embedding.api_base =
		cfg.providers.embedding.api_base.trim_end_matches('/').to_string();
	cfg.providers.image_embedding.api_base =
		cfg.providers.image_embedding.api_base.trim_end_matches('/').to_string();
	cfg.providers.image_classifier.api_base =
		cfg.providers.image_classifier.api_base.trim_end_matches('/').to_string();
	cfg.providers.llm.api_base = cfg.providers.llm.api_base.trim_end_matches('/').to_string();
}
