use std::collections::BTreeSet;

use serde_json::{Value, json};

use rfq_domain::{
	evidence::{Evidence, EvidenceKey, EvidenceSet, dedup_evidence},
	lexical, markers,
	rescue::{self, ParseFailure, ToolSignature},
	text,
};

const TOOLS: [ToolSignature<'static>; 5] = [
	ToolSignature { name: "search_documents", primary_param: Some("query") },
	ToolSignature { name: "search_images", primary_param: Some("query") },
	ToolSignature { name: "get_full_summary", primary_param: Some("filename") },
	ToolSignature { name: "list_all_documents", primary_param: None },
	ToolSignature { name: "update_rfq_draft", primary_param: Some("instructions") },
];

fn allowed(ids: &[i64]) -> BTreeSet<i64> {
	ids.iter().copied().collect()
}

fn image(id: i64, file: &str) -> Evidence {
	Evidence::Image {
		file: file.to_string(),
		image_id: id,
		description: format!("image {id}"),
		relevance: 100.0,
	}
}

fn text_hit(file: &str, chunk_id: i64, score: f32) -> Evidence {
	Evidence::Text { file: file.to_string(), chunk_id, score, snippet: String::new() }
}

#[test]
fn guard_keeps_first_allowed_numeric_marker_only() {
	let draft = "A [[IMAGE_ID:7]] B [[IMAGE_ID:7]] C [[IMAGE_ID:8]] D [[IMAGE_ID:x]] E [[IMAGE_ID:9]]";
	let guarded = markers::guard_image_markers(draft, &allowed(&[7, 9]));

	assert_eq!(guarded, "A [[IMAGE_ID:7]] B  C  D  E [[IMAGE_ID:9]]");
}

#[test]
fn guard_strips_everything_without_image_evidence() {
	let guarded = markers::guard_image_markers("x [[IMAGE_ID:1]] y [[IMAGE_ID:]]", &allowed(&[]));

	assert_eq!(guarded, "x  y ");
}

#[test]
fn guard_is_idempotent() {
	let ids = allowed(&[1, 2, 3]);
	let drafts = [
		"[[IMAGE_ID:1]][[IMAGE_ID:1]][[IMAGE_ID:4]] tail [[IMAGE_ID:2]]",
		"no markers at all",
		"[[IMAGE_ID:03]] and [[IMAGE_ID:3]] and [[IMAGE_ID:-1]]",
	];

	for draft in drafts {
		let once = markers::guard_image_markers(draft, &ids);
		let twice = markers::guard_image_markers(&once, &ids);

		assert_eq!(once, twice, "Guard changed already-guarded text for {draft:?}.");
	}
}

#[test]
fn scrub_keeps_repeats_of_valid_ids() {
	let scrubbed = markers::scrub_image_markers(
		"See [[IMAGE_ID:42]] and [[IMAGE_ID:5]] then [[IMAGE_ID:5]].",
		&allowed(&[5]),
	);

	assert_eq!(scrubbed, "See  and [[IMAGE_ID:5]] then [[IMAGE_ID:5]].");
}

#[test]
fn image_ids_are_listed_once_in_order() {
	let ids = markers::image_ids_in("[[IMAGE_ID:9]] [[IMAGE_ID:2]] [[IMAGE_ID:9]] [[IMAGE_ID:a]]");

	assert_eq!(ids, vec![9, 2]);
	assert_eq!(markers::marker(12), "[[IMAGE_ID:12]]");
}

#[test]
fn evidence_dedup_prefers_first_occurrence() {
	let items = vec![
		text_hit("a.pdf", 1, 80.0),
		image(5, "a.pdf"),
		text_hit("a.pdf", 1, 95.0),
		image(5, "b.pdf"),
		text_hit("a.pdf", 2, 10.0),
	];
	let deduped = dedup_evidence(items);

	assert_eq!(deduped.len(), 3);
	assert_eq!(deduped[0], text_hit("a.pdf", 1, 80.0));
	assert_eq!(deduped[1].file(), "a.pdf");
	assert_eq!(deduped[2].key(), EvidenceKey::Text { file: "a.pdf".to_string(), chunk_id: 2 });
}

#[test]
fn evidence_set_reports_image_ids() {
	let mut set = EvidenceSet::new();

	assert!(set.insert(image(3, "a.pdf")));
	assert!(!set.insert(image(3, "a.pdf")));
	assert!(set.insert(text_hit("a.pdf", 1, 1.0)));

	set.extend([image(1, "c.pdf"), image(3, "c.pdf")]);

	assert_eq!(set.len(), 3);
	assert_eq!(set.image_ids(), allowed(&[1, 3]));
}

#[test]
fn phrase_match_treats_spaces_as_wildcards() {
	let matches = |filename: &str, query: &str| {
		lexical::filename_matches_terms(filename, &lexical::phrase_terms(query))
	};

	assert_eq!(lexical::phrase_terms("Brake  Manual"), vec!["brake", "manual"]);
	assert!(matches("Brake_Manual_v2.pdf", "brake manual"));
	assert!(matches("brake_manual.pdf", "BRAKE"));
	assert!(!matches("manual_brake.pdf", "brake manual"));
	assert!(!matches("brake_manual.pdf", "   "));
}

#[test]
fn keyword_match_skips_short_words() {
	let keywords = lexical::query_keywords("the brake diagrams, car", 4);

	assert_eq!(keywords, vec!["brake".to_string(), "diagrams".to_string()]);
	assert!(lexical::filename_matches_any_keyword("BRAKE_manual.pdf", &keywords));
	assert!(!lexical::filename_matches_any_keyword("car_the.pdf", &keywords));
	assert_eq!(lexical::boosted(0.5, true, 1.3), 0.5 * 1.3);
	assert_eq!(lexical::boosted(0.5, false, 1.3), 0.5);
}

#[test]
fn rescues_call_expression_with_key_value_arguments() {
	let call = rescue::parse_call(r#"search_documents(query="brake pads")"#, &TOOLS)
		.expect("Expected a rescued call.");

	assert_eq!(call.name, "search_documents");
	assert_eq!(Value::Object(call.arguments), json!({ "query": "brake pads" }));
}

#[test]
fn rescues_function_tag_forms() {
	for raw in [
		r#"<function=search_images>{"query": "caliper"}</function>"#,
		r#"function=search_images{"query":"caliper"}"#,
		r#"Sure! search_images query="caliper""#,
		r#"search_images("caliper")"#,
	] {
		let call = rescue::parse_call(raw, &TOOLS).expect("Expected a rescued call.");

		assert_eq!(call.name, "search_images", "Failed on {raw:?}.");
		assert_eq!(Value::Object(call.arguments), json!({ "query": "caliper" }), "Failed on {raw:?}.");
	}
}

#[test]
fn rescues_call_embedded_in_error_body() {
	let body = json!({
		"error": {
			"message": "Failed to call a function. Please adjust your prompt.",
			"code": "tool_use_failed",
			"failed_generation": "<function=get_full_summary>{\"filename\": \"brake_manual.pdf\"}</function>"
		}
	})
	.to_string();
	let call = rescue::parse_call(&body, &TOOLS).expect("Expected a rescued call.");

	assert_eq!(call.name, "get_full_summary");
	assert_eq!(Value::Object(call.arguments), json!({ "filename": "brake_manual.pdf" }));
}

#[test]
fn rescues_json_call_objects_and_multiple_calls() {
	let calls = rescue::parse_calls(
		r#"[{"name": "list_all_documents", "arguments": {}}, {"name": "search_documents", "arguments": "{\"query\": \"rotor\"}"}]"#,
		&TOOLS,
	)
	.expect("Expected rescued calls.");

	assert_eq!(calls.len(), 2);
	assert_eq!(calls[0].name, "list_all_documents");
	assert_eq!(calls[1].arguments.get("query"), Some(&json!("rotor")));

	let calls = rescue::parse_calls(
		"list_all_documents() then search_documents(query='pads')",
		&TOOLS,
	)
	.expect("Expected rescued calls.");

	assert_eq!(calls.iter().map(|call| call.name.as_str()).collect::<Vec<_>>(), vec![
		"list_all_documents",
		"search_documents"
	]);
}

#[test]
fn plain_prose_is_not_a_call() {
	assert_eq!(
		rescue::parse_call("I could use search_documents to help you.", &TOOLS),
		Err(ParseFailure::NoCallFound)
	);
	assert_eq!(rescue::parse_call("   ", &TOOLS), Err(ParseFailure::Empty));
	assert_eq!(
		rescue::parse_call("unknown_tool(query=\"x\")", &TOOLS),
		Err(ParseFailure::NoCallFound)
	);
}

#[test]
fn parenthetical_asides_are_not_calls() {
	for raw in [
		"I checked list_all_documents (which covers every file) and found nothing.",
		"You can refine it with search_documents (see the list above).",
		"Try search_documents(see the list above) next time.",
	] {
		let parsed = rescue::parse_call(raw, &TOOLS);

		assert_eq!(parsed, Err(ParseFailure::NoCallFound), "Failed on {raw:?}.");
	}

	let call = rescue::parse_call("search_documents(brake rotor torque)", &TOOLS)
		.expect("Expected a rescued call.");

	assert_eq!(Value::Object(call.arguments), json!({ "query": "brake rotor torque" }));
}

#[test]
fn malformed_calls_report_typed_failures() {
	assert_eq!(
		rescue::parse_call(r#"search_documents(query="brake"#, &TOOLS),
		Err(ParseFailure::Unbalanced { tool: "search_documents".to_string() })
	);
	assert_eq!(
		rescue::parse_call(r#"get_full_summary({"a": 1, "b": 2})"#, &TOOLS),
		Err(ParseFailure::MissingArgument {
			tool: "get_full_summary".to_string(),
			param: "filename".to_string(),
		})
	);
}

#[test]
fn draft_cleanup_drops_filler() {
	let cleaned = text::clean_draft_text("Here is the updated\r\nRFQ body\r\nHow does this look");

	assert_eq!(cleaned, "RFQ body");
	assert_eq!(text::preview("a\nb", 10), "a b");
	assert_eq!(text::truncate_chars("abcdef", 3), "abc");
	assert_eq!(text::word_count(" one  two\nthree "), 3);
}
