mod common;

use serde_json::{json, Value};
use std::path::Path;

use common::{MockEmbedder, MockIndex};
use policypilot::ingest::{
    self, chunk_company, chunker::validate_company, validate_chunks, ChunkType, IngestError,
};

fn insurer() -> Value {
    json!({
        "company_id": "britam",
        "company_name": "Britam",
        "company_type": "composite",
        "license_info": { "regulator": "IRA", "license_reference": "IRA/001" },
        "headquarters": "Britam Tower, Upper Hill, Nairobi",
        "branches": [
            { "branch_name": "Mombasa", "address": "Nkrumah Road", "phone": ["+254 41 222"] },
            { "branch_name": "Kisumu", "address": "Oginga Odinga St", "phone": ["+254 57 202"] }
        ],
        "digital_presence": { "website": "https://britam.com" },
        "reputation": { "customer_rating": 4.1, "claims_settlement_ratio": "92%" },
        "products": [
            {
                "product_id": "britam_family_funeral",
                "product_name": "Family Funeral",
                "category": "funeral",
                "target_market": "families",
                "eligibility": { "age_min": 18, "age_max": 65 },
                "geographic_coverage": "Kenya",
                "premium": {
                    "currency": "KES",
                    "payment_frequency": "monthly",
                    "sample_examples": ["KES 1,500 for a family of six"]
                },
                "coverage": { "benefits": ["Cash within 48 hours"], "duration": "annual" },
                "exclusions": ["Suicide within 12 months"],
                "claims_process": {
                    "required_documents": ["Burial permit", "ID copy"],
                    "average_turnaround_days": 2,
                    "digital_claims_supported": true
                },
                "renewal_terms": { "auto_renewal": true, "grace_period_days": 30 },
                "distribution_channels": ["agents", "bancassurance"],
                "provider_network": { "hospitals": ["Aga Khan", "Nairobi Hospital"] }
            }
        ],
        "last_compiled": "2025-06-01"
    })
}

#[test]
fn chunk_company_splits_company_branches_and_product_sections() {
    let chunks = chunk_company(&insurer()).unwrap();

    let count = |t: ChunkType| chunks.iter().filter(|c| c.chunk_type == t).count();
    assert_eq!(count(ChunkType::CompanyMetadata), 1);
    assert_eq!(count(ChunkType::Branch), 2);
    assert_eq!(count(ChunkType::Premium), 1);
    assert_eq!(count(ChunkType::ProviderNetwork), 1);
    assert_eq!(count(ChunkType::CustomerReviews), 0);
    assert_eq!(chunks.len(), 11);

    assert!(chunks.iter().all(|c| c.company_id == "britam"));
    let ids: std::collections::HashSet<_> = chunks.iter().map(|c| &c.chunk_id).collect();
    assert_eq!(ids.len(), chunks.len());

    let company = &chunks[0];
    assert!(company.text.starts_with("Britam is a composite insurance company licensed by IRA"));
    assert!(company.product_id.is_none());

    let branch = &chunks[1];
    assert_eq!(branch.raw_data["branch_id"], "britam_branch_001");
    assert_eq!(
        branch.text,
        "Branch Mombasa (ID: britam_branch_001) of britam is located at Nkrumah Road. Contact phones: +254 41 222."
    );

    let premium = chunks.iter().find(|c| c.chunk_type == ChunkType::Premium).unwrap();
    assert_eq!(premium.product_id.as_deref(), Some("britam_family_funeral"));
    assert!(premium.text.contains("Currency: KES, Payment frequency: monthly"));
    assert!(premium.text.contains("KES 1,500 for a family of six"));
    assert!(premium.raw_data.get("product_name").is_none());

    let claims = chunks.iter().find(|c| c.chunk_type == ChunkType::ClaimsProcess).unwrap();
    assert!(claims.text.contains("Burial permit, ID copy"));
    assert!(claims.text.contains("Average turnaround: 2 days"));

    assert!(validate_chunks(&chunks, &insurer()).is_empty());
}

#[test]
fn missing_company_key_is_rejected() {
    let mut doc = insurer();
    doc.as_object_mut().unwrap().remove("headquarters");

    let err = validate_company(&doc).unwrap_err();
    assert!(matches!(err, IngestError::MissingKey(ref k) if k == "headquarters"));
    assert!(chunk_company(&doc).is_err());

    let mut doc = insurer();
    doc["products"] = json!({ "not": "a list" });
    assert!(matches!(chunk_company(&doc), Err(IngestError::InvalidShape(_))));

    assert!(matches!(chunk_company(&json!([1, 2])), Err(IngestError::InvalidShape(_))));
}

#[test]
fn validate_chunks_reports_missing_sections() {
    let chunks: Vec<_> = chunk_company(&insurer())
        .unwrap()
        .into_iter()
        .filter(|c| c.chunk_type != ChunkType::Exclusions && c.chunk_type != ChunkType::Branch)
        .collect();

    let problems = validate_chunks(&chunks, &insurer());
    assert_eq!(problems.len(), 2);
    assert!(problems[0].starts_with("Branch count mismatch"));
    assert_eq!(problems[1], "Missing exclusions chunk for product britam_family_funeral");
}

#[test]
fn preprocess_writes_chunks_next_to_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("Britam.json");
    std::fs::write(&input, serde_json::to_string(&insurer()).unwrap()).unwrap();

    let output = ingest::preprocessed_path(&input);
    assert_eq!(output, dir.path().join("britam_preprocessed.json"));

    let chunks = ingest::preprocess_file(&input, &output).unwrap();
    let reloaded = ingest::load_chunks(&output).unwrap();
    assert_eq!(reloaded.len(), chunks.len());
    assert_eq!(reloaded[3].chunk_id, chunks[3].chunk_id);
}

fn write(dir: &Path, name: &str, body: &str) {
    std::fs::write(dir.join(name), body).unwrap();
}

#[test]
fn combine_merges_preprocessed_files_in_name_order() {
    let dir = tempfile::tempdir().unwrap();

    let mut jubilee = insurer();
    jubilee["company_id"] = json!("jubilee");
    let britam_chunks = chunk_company(&insurer()).unwrap();
    let jubilee_chunks = chunk_company(&jubilee).unwrap();

    ingest::save_chunks(&jubilee_chunks, &dir.path().join("jubilee_preprocessed.json")).unwrap();
    ingest::save_chunks(&britam_chunks, &dir.path().join("britam_preprocessed.json")).unwrap();
    write(dir.path(), "broken_preprocessed.json", "{\"not\": \"a list\"}");
    write(dir.path(), "notes.json", "[]");

    let output = dir.path().join(ingest::COMBINED_FILE);
    let combined = ingest::combine(dir.path(), &output).unwrap();
    assert_eq!(combined.len(), britam_chunks.len() + jubilee_chunks.len());
    assert_eq!(combined[0].company_id, "britam");
    assert_eq!(combined.last().unwrap().company_id, "jubilee");
}

#[test]
fn combine_rerun_skips_its_own_output() {
    let dir = tempfile::tempdir().unwrap();
    let chunks = chunk_company(&insurer()).unwrap();
    ingest::save_chunks(&chunks, &dir.path().join("britam_preprocessed.json")).unwrap();

    let output = dir.path().join(ingest::COMBINED_FILE);
    let first = ingest::combine(dir.path(), &output).unwrap();
    ingest::save_chunks(&first, &output).unwrap();

    let second = ingest::combine(dir.path(), &output).unwrap();
    assert_eq!(second.len(), chunks.len());

    // a differently spelled path to the same file is still recognised
    let relative = dir.path().join(".").join(ingest::COMBINED_FILE);
    assert_eq!(ingest::combine(dir.path(), &relative).unwrap().len(), chunks.len());
}

#[tokio::test]
async fn upload_embeds_and_upserts_in_batches() {
    let chunks: Vec<_> = chunk_company(&insurer()).unwrap().into_iter().take(5).collect();
    let embedder = MockEmbedder::default();
    let index = MockIndex::default();

    let written = ingest::upload(&chunks, &embedder, &index, 2).await.unwrap();
    assert_eq!(written, 5);
    assert_eq!(embedder.calls.lock().unwrap().len(), 5);

    let upserts = index.upserts.lock().unwrap();
    let sizes: Vec<_> = upserts.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![2, 2, 1]);

    let first = &upserts[0][0];
    assert_eq!(first.id, chunks[0].chunk_id);
    assert_eq!(first.metadata.company_id.as_deref(), Some("britam"));
    assert_eq!(first.metadata.chunk_type.as_deref(), Some("company_metadata"));
    assert_eq!(first.metadata.text.as_deref(), Some(chunks[0].text.as_str()));
}

#[tokio::test]
async fn upload_stops_on_embedding_failure() {
    let chunks = chunk_company(&insurer()).unwrap();
    let index = MockIndex::default();

    let err = ingest::upload(&chunks, &MockEmbedder::failing(), &index, 100)
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Retrieval(_)));
    assert!(index.upserts.lock().unwrap().is_empty());
}
