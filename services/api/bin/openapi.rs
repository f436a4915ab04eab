//! Writes the OpenAPI document for the coaching API to `openapi.json`.

use anyhow::Context;
use coachsim_api::router::ApiDoc;
use utoipa::OpenApi;

/// Generates the OpenAPI document and writes it to a file.
fn generate_doc(api_doc: utoipa::openapi::OpenApi, path: &str) -> anyhow::Result<()> {
    let doc_json = api_doc
        .to_pretty_json()
        .context("Failed to serialize OpenAPI document")?;
    std::fs::write(path, doc_json).with_context(|| format!("Failed to write {}", path))?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    generate_doc(ApiDoc::openapi(), "openapi.json")
}
