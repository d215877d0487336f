//! Classifies every file in a directory and prints the best document type.
//!
//! Run with:
//! ```bash
//! WAIVES_CLIENT_ID=... WAIVES_CLIENT_SECRET=... \
//! RUST_LOG=waivepipe=debug \
//! cargo run --example classify_directory -- ./inbox mortgages
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use waivepipe::client::{ApiClient, ClientConfig};
use waivepipe::error::{Error, Result};
use waivepipe::pipeline::orchestrator::Pipeline;
use waivepipe::source::fs::DirectorySource;

fn env(name: &'static str) -> Result<String> {
    std::env::var(name).map_err(|_| Error::pipeline("missing WAIVES_CLIENT_ID or WAIVES_CLIENT_SECRET"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let dir = args.next().unwrap_or_else(|| "inbox".to_string());
    let classifier = args.next().unwrap_or_else(|| "mortgages".to_string());

    let mut config = ClientConfig::new(env("WAIVES_CLIENT_ID")?, env("WAIVES_CLIENT_SECRET")?);
    if let Ok(url) = std::env::var("WAIVES_API_URL") {
        config = config.api_url(url);
    }

    let failed = Arc::new(AtomicUsize::new(0));
    let failed_c = failed.clone();

    println!("Classifying files in {dir} with `{classifier}`…\n");

    let handle = Pipeline::new(ApiClient::new(config))
        .max_concurrency(10)
        .with_documents_from(DirectorySource::new(&dir))
        .classify_with(classifier)
        .inspect(|doc| match doc.classification() {
            Some(c) => println!(
                "  {} => {} (confident: {}, relative confidence {:.2})",
                doc.document().source_id(),
                c.document_type,
                c.is_confident,
                c.relative_confidence
            ),
            None => println!("  {} => unclassified", doc.document().source_id()),
        })
        .on_document_error(move |err| {
            failed_c.fetch_add(1, Ordering::Relaxed);
            eprintln!("  [error] {err}");
        })
        .on_pipeline_completed(|| println!("\nAll documents processed and removed remotely."))
        .start();

    handle.join().await?;

    println!("Failures: {}", failed.load(Ordering::Relaxed));
    Ok(())
}
