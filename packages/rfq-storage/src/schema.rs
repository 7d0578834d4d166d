pub fn render_schema(text_dim: u32, image_dim: u32) -> String {
	let init = include_str!("../../../sql/init.sql");
	let expanded = expand_includes(init);

	expanded
		.replace("<TEXT_VECTOR_DIM>", &text_dim.to_string())
		.replace("<IMAGE_VECTOR_DIM>", &image_dim.to_string())
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"00_extensions.sql" => out.push_str(include_str!("../../../sql/00_extensions.sql")),
				"tables/001_documents.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_documents.sql")),
				"tables/002_document_summaries.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_document_summaries.sql")),
				"tables/003_summary_embeddings.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_summary_embeddings.sql")),
				"tables/004_document_images.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_document_images.sql")),
				"tables/005_image_embeddings.sql" =>
					out.push_str(include_str!("../../../sql/tables/005_image_embeddings.sql")),
				"tables/006_generated_rfqs.sql" =>
					out.push_str(include_str!("../../../sql/tables/006_generated_rfqs.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}
