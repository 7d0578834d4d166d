use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
	pub label: String,
	pub confidence: f32,
}

/// Zero-shot classification of one image against `labels`. Returns the best label.
pub async fn classify(
	cfg: &rfq_config::ProviderConfig,
	image_data_url: &str,
	labels: &[String],
) -> Result<Classification> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({ "model": cfg.model, "image": image_data_url, "labels": labels });
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;
	let scores = parse_classify_response(json, labels)?;

	best_label(labels, &scores).ok_or_else(|| Error::InvalidResponse {
		message: "Classifier returned no scores.".to_string(),
	})
}

pub fn best_label(labels: &[String], scores: &[f32]) -> Option<Classification> {
	labels
		.iter()
		.zip(scores)
		.filter(|(_, score)| score.is_finite())
		.fold(None, |best: Option<(&String, f32)>, (label, score)| match best {
			Some((_, top)) if top >= *score => best,
			_ => Some((label, *score)),
		})
		.map(|(label, confidence)| Classification { label: label.clone(), confidence })
}

fn parse_classify_response(json: Value, labels: &[String]) -> Result<Vec<f32>> {
	if let Some(scores) = json.get("scores").and_then(|v| v.as_array()) {
		return Ok(labels
			.iter()
			.enumerate()
			.map(|(idx, _)| scores.get(idx).and_then(|v| v.as_f64()).unwrap_or(0.0) as f32)
			.collect());
	}

	let results =
		json.get("results").or_else(|| json.get("data")).and_then(|v| v.as_array()).ok_or_else(
			|| Error::InvalidResponse {
				message: "Classifier response is missing scores.".to_string(),
			},
		)?;
	let mut scores = vec![0.0f32; labels.len()];

	for item in results {
		let index = match item.get("index").and_then(|v| v.as_u64()) {
			Some(index) => Some(index as usize),
			None => item
				.get("label")
				.and_then(|v| v.as_str())
				.and_then(|label| labels.iter().position(|candidate| candidate == label)),
		};
		let score = item
			.get("score")
			.or_else(|| item.get("confidence"))
			.and_then(|v| v.as_f64())
			.ok_or_else(|| Error::InvalidResponse {
				message: "Classifier result missing score.".to_string(),
			})? as f32;

		if let Some(index) = index
			&& index < scores.len()
		{
			scores[index] = score;
		}
	}

	Ok(scores)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn labels() -> Vec<String> {
		vec!["a car brake system".to_string(), "a person".to_string()]
	}

	#[test]
	fn aligns_results_by_label_or_index() {
		let json = serde_json::json!({
			"results": [
				{ "label": "a person", "score": 0.1 },
				{ "index": 0, "score": 0.8 }
			]
		});
		let scores = parse_classify_response(json, &labels()).expect("parse failed");

		assert_eq!(scores, vec![0.8, 0.1]);
	}

	#[test]
	fn picks_highest_scoring_label() {
		let best = best_label(&labels(), &[0.2, 0.7]).expect("Expected a label.");

		assert_eq!(best, Classification { label: "a person".to_string(), confidence: 0.7 });
	}
}
