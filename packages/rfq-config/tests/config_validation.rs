use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use rfq_config::Config;

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_toml() -> String {
	SAMPLE_CONFIG_TEMPLATE_TOML.to_string()
}

fn sample_toml_with(section: &str, key: &str, value: Value) -> String {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let mut table = root.as_table_mut().expect("Template config must be a table.");

	for part in section.split('.') {
		table = table
			.entry(part.to_string())
			.or_insert_with(|| Value::Table(Default::default()))
			.as_table_mut()
			.expect("Template section must be a table.");
	}

	table.insert(key.to_string(), value);

	toml::to_string(&root).expect("Failed to render template config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("rfq_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn base_config() -> Config {
	toml::from_str(&sample_toml()).expect("Failed to parse test config.")
}

fn load_err(payload: String) -> String {
	let path = write_temp_config(payload);
	let result = rfq_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	result.expect_err("Expected config validation error.").to_string()
}

#[test]
fn omitted_sections_fall_back_to_tuned_defaults() {
	let cfg = base_config();

	assert_eq!(cfg.retrieval.top_k, 5);
	assert_eq!(cfg.retrieval.context_limit, 5);
	assert_eq!(cfg.retrieval.filename_boost, 1.2);
	assert_eq!(cfg.images.candidate_pool, 30);
	assert_eq!(cfg.images.primary_threshold, 0.15);
	assert_eq!(cfg.images.fallback_threshold, 0.45);
	assert_eq!(cfg.images.filename_boost, 1.3);
	assert_eq!(cfg.agent.max_iterations, 3);
	assert_eq!(cfg.ingestion.summary_fallback_chars, 1_000);
}

#[test]
fn load_trims_labels_and_api_bases() {
	let path = write_temp_config(sample_toml());
	let result = rfq_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let cfg = result.expect("Expected sample config to load.");

	assert_eq!(
		cfg.ingestion.target_labels,
		vec!["a vehicle component".to_string(), "a car brake system".to_string()]
	);
	assert_eq!(cfg.providers.embedding.api_base, "http://127.0.0.1:1");
}

#[test]
fn pool_size_must_be_positive() {
	let message =
		load_err(sample_toml_with("storage.postgres", "pool_max_conns", Value::Integer(0)));

	assert!(
		message.contains("storage.postgres.pool_max_conns must be greater than zero."),
		"Unexpected error message: {message}"
	);
}

#[test]
fn blank_api_keys_are_rejected() {
	let message =
		load_err(sample_toml_with("providers.llm", "api_key", Value::String("  ".to_string())));

	assert!(
		message.contains("Provider llm api_key must be non-empty."),
		"Unexpected error message: {message}"
	);
}

#[test]
fn embedding_dimensions_must_be_positive() {
	let mut cfg = base_config();

	cfg.providers.image_embedding.dimensions = 0;

	let err = rfq_config::validate(&cfg).expect_err("Expected dimension validation error.");

	assert!(
		err.to_string().contains("providers.image_embedding.dimensions must be greater than zero."),
		"Unexpected error: {err}"
	);
}

#[test]
fn boosts_cannot_penalize_matches() {
	let mut cfg = base_config();

	cfg.retrieval.filename_boost = 0.9;

	let err = rfq_config::validate(&cfg).expect_err("Expected boost validation error.");

	assert!(
		err.to_string().contains("retrieval.filename_boost must be 1.0 or greater."),
		"Unexpected error: {err}"
	);

	cfg = base_config();
	cfg.images.filename_boost = f32::NAN;

	let err = rfq_config::validate(&cfg).expect_err("Expected boost validation error.");

	assert!(
		err.to_string().contains("images.filename_boost must be a finite number."),
		"Unexpected error: {err}"
	);
}

#[test]
fn thresholds_must_be_in_unit_range() {
	let message =
		load_err(sample_toml_with("images", "fallback_threshold", Value::Float(1.5)));

	assert!(
		message.contains("images.fallback_threshold must be in the range 0.0-1.0."),
		"Unexpected error message: {message}"
	);
}

#[test]
fn candidate_pool_must_cover_top_k() {
	let mut cfg = base_config();

	cfg.images.top_k = 10;
	cfg.images.candidate_pool = 5;

	let err = rfq_config::validate(&cfg).expect_err("Expected candidate pool validation error.");

	assert!(
		err.to_string().contains("images.candidate_pool must be at least images.top_k."),
		"Unexpected error: {err}"
	);
}

#[test]
fn iteration_cap_must_be_positive() {
	let mut cfg = base_config();

	cfg.agent.max_iterations = 0;

	let err = rfq_config::validate(&cfg).expect_err("Expected iteration cap validation error.");

	assert!(
		err.to_string().contains("agent.max_iterations must be greater than zero."),
		"Unexpected error: {err}"
	);
}

#[test]
fn target_labels_cannot_be_blank() {
	let message = load_err(sample_toml_with(
		"ingestion",
		"target_labels",
		Value::Array(vec![Value::String(" ".to_string())]),
	));

	assert!(
		message.contains("ingestion.target_labels must be non-empty."),
		"Unexpected error message: {message}"
	);
}

#[test]
fn rfq_example_toml_is_valid() {
	let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));

	path.push("../../rfq.example.toml");

	rfq_config::load(&path).expect("Expected rfq.example.toml to be a valid config.");
}
