use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = rfq_api::Args::parse();

	rfq_api::run(args).await
}
