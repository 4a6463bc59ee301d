use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::ingest::IngestError;

const MISSING: &str = "N/A";

const REQUIRED_COMPANY_KEYS: [&str; 10] = [
    "company_id",
    "company_name",
    "company_type",
    "license_info",
    "headquarters",
    "branches",
    "digital_presence",
    "reputation",
    "products",
    "last_compiled",
];

const EXPECTED_PRODUCT_KEYS: [&str; 12] = [
    "product_id",
    "product_name",
    "category",
    "target_market",
    "eligibility",
    "geographic_coverage",
    "premium",
    "coverage",
    "exclusions",
    "claims_process",
    "renewal_terms",
    "distribution_channels",
];

// Lists under these keys are entities, not values to join.
const ENTITY_LISTS: [&str; 2] = ["branches", "products"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    CompanyMetadata,
    Branch,
    ProductMetadata,
    Premium,
    Coverage,
    Exclusions,
    AddOns,
    ClaimsProcess,
    RenewalTerms,
    ProviderNetwork,
    CustomerReviews,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::CompanyMetadata => "company_metadata",
            ChunkType::Branch => "branch",
            ChunkType::ProductMetadata => "product_metadata",
            ChunkType::Premium => "premium",
            ChunkType::Coverage => "coverage",
            ChunkType::Exclusions => "exclusions",
            ChunkType::AddOns => "add_ons",
            ChunkType::ClaimsProcess => "claims_process",
            ChunkType::RenewalTerms => "renewal_terms",
            ChunkType::ProviderNetwork => "provider_network",
            ChunkType::CustomerReviews => "customer_reviews",
        }
    }
}

/// One embeddable unit of insurer data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub company_id: String,
    pub product_id: Option<String>,
    pub chunk_type: ChunkType,
    pub raw_data: Map<String, Value>,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedCompany {
    pub company: Map<String, Value>,
    pub branches: Vec<Map<String, Value>>,
    pub products: Vec<Map<String, Value>>,
}

pub fn validate_company(doc: &Value) -> Result<(), IngestError> {
    let obj = doc
        .as_object()
        .ok_or_else(|| IngestError::InvalidShape("company document must be an object".into()))?;

    for key in REQUIRED_COMPANY_KEYS {
        if !obj.contains_key(key) {
            return Err(IngestError::MissingKey(key.to_string()));
        }
    }
    for key in ENTITY_LISTS {
        if !obj[key].is_array() {
            return Err(IngestError::InvalidShape(format!("{} must be a list", key)));
        }
    }

    for product in obj["products"].as_array().into_iter().flatten() {
        let product_id = product
            .get("product_id")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        for key in EXPECTED_PRODUCT_KEYS {
            if product.get(key).is_none() {
                warn!("Product {} missing key: {}", product_id, key);
            }
        }
    }

    Ok(())
}

/// Flattens nested objects into `parent_child` keys. Value lists are joined
/// with ", "; entity lists are kept as they are.
pub fn flatten(obj: &Map<String, Value>, parent: &str, sep: &str) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in obj {
        let new_key = if parent.is_empty() {
            key.clone()
        } else {
            format!("{}{}{}", parent, sep, key)
        };

        match value {
            Value::Object(inner) => out.extend(flatten(inner, &new_key, sep)),
            Value::Array(items) if !ENTITY_LISTS.contains(&key.as_str()) => {
                let joined = items.iter().map(render).collect::<Vec<_>>().join(", ");
                out.insert(new_key, Value::String(joined));
            }
            other => {
                out.insert(new_key, other.clone());
            }
        }
    }
    out
}

pub fn normalize(doc: &Value) -> Result<NormalizedCompany, IngestError> {
    validate_company(doc)?;
    let obj = doc.as_object().ok_or_else(|| IngestError::InvalidShape("not an object".into()))?;
    let company_id = obj["company_id"].clone();
    let company_key = render(&company_id);

    let metadata: Map<String, Value> = obj
        .iter()
        .filter(|(k, _)| !ENTITY_LISTS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let mut normalized = NormalizedCompany {
        company: flatten(&metadata, "", "_"),
        ..Default::default()
    };

    for (i, branch) in obj["branches"].as_array().into_iter().flatten().enumerate() {
        let mut data = branch.as_object().map(|b| flatten(b, "", "_")).unwrap_or_default();
        data.insert("company_id".into(), company_id.clone());
        data.insert(
            "branch_id".into(),
            Value::String(format!("{}_branch_{:03}", company_key, i + 1)),
        );
        normalized.branches.push(data);
    }

    for product in obj["products"].as_array().into_iter().flatten() {
        let mut data = product.as_object().map(|p| flatten(p, "", "_")).unwrap_or_default();
        data.insert("company_id".into(), company_id.clone());
        normalized.products.push(data);
    }

    info!(
        "Normalized data: {} branches, {} products",
        normalized.branches.len(),
        normalized.products.len()
    );
    Ok(normalized)
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => MISSING.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(render).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

fn field(data: &Map<String, Value>, key: &str) -> String {
    data.get(key).map(render).unwrap_or_else(|| MISSING.to_string())
}

fn pick(source: &Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    keys.iter()
        .map(|k| {
            let v = source.get(*k).cloned().unwrap_or_else(|| Value::String(MISSING.into()));
            (k.to_string(), v)
        })
        .collect()
}

/// Renders a chunk's fields into the sentence that gets embedded.
pub fn chunk_text(data: &Map<String, Value>, chunk_type: ChunkType) -> String {
    let f = |key: &str| field(data, key);
    let product = || format!("{} (ID: {})", f("product_name"), f("product_id"));

    let text = match chunk_type {
        ChunkType::CompanyMetadata => format!(
            "{} is a {} insurance company licensed by {} under reference {}. \
             Headquarters: {}. Website: {}. Customer rating: {}, Claims settlement ratio: {}.",
            f("company_name"),
            f("company_type"),
            f("license_info_regulator"),
            f("license_info_license_reference"),
            f("headquarters"),
            f("digital_presence_website"),
            f("reputation_customer_rating"),
            f("reputation_claims_settlement_ratio"),
        ),
        ChunkType::Branch => format!(
            "Branch {} (ID: {}) of {} is located at {}. Contact phones: {}.",
            f("branch_name"),
            f("branch_id"),
            f("company_id"),
            f("address"),
            f("phone"),
        ),
        ChunkType::ProductMetadata => format!(
            "{} is a {} insurance product by {} for {}. Eligibility: min age {}, max age {}. \
             Geographic coverage: {}.",
            product(),
            f("category"),
            f("company_id"),
            f("target_market"),
            f("eligibility_age_min"),
            f("eligibility_age_max"),
            f("geographic_coverage"),
        ),
        ChunkType::Premium => format!(
            "Premium for {}: Currency: {}, Payment frequency: {}. Sample rates: {}. Notes: {}.",
            product(),
            f("premium_currency"),
            f("premium_payment_frequency"),
            f("premium_sample_examples"),
            f("premium_rate_table_notes"),
        ),
        ChunkType::Coverage => format!(
            "Coverage for {}: Benefits: {}. Duration: {}.",
            product(),
            f("coverage_benefits"),
            f("coverage_duration"),
        ),
        ChunkType::Exclusions => format!("Exclusions for {}: {}.", product(), f("exclusions")),
        ChunkType::AddOns => format!("Add-ons for {}: {}.", product(), f("add_ons")),
        ChunkType::ClaimsProcess => format!(
            "Claims process for {}: Required documents: {}. Average turnaround: {} days. \
             Digital claims supported: {}.",
            product(),
            f("claims_process_required_documents"),
            f("claims_process_average_turnaround_days"),
            f("claims_process_digital_claims_supported"),
        ),
        ChunkType::RenewalTerms => format!(
            "Renewal terms for {}: Auto-renewal: {}, Grace period: {} days.",
            product(),
            f("renewal_terms_auto_renewal"),
            f("renewal_terms_grace_period_days"),
        ),
        ChunkType::ProviderNetwork => format!(
            "Provider network for {}: Hospitals: {}. Notes: {}.",
            product(),
            f("provider_network_hospitals"),
            f("provider_network_note"),
        ),
        ChunkType::CustomerReviews => {
            format!("Customer reviews for {}: {}.", product(), f("customer_reviews"))
        }
    };

    text.trim().to_string()
}

fn make_chunk(
    company_id: &str,
    product_id: Option<&str>,
    chunk_type: ChunkType,
    raw_data: Map<String, Value>,
    text_fields: &Map<String, Value>,
) -> Chunk {
    Chunk {
        chunk_id: Uuid::new_v4().to_string(),
        company_id: company_id.to_string(),
        product_id: product_id.map(str::to_string),
        chunk_type,
        text: chunk_text(text_fields, chunk_type),
        raw_data,
    }
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty() && s != MISSING,
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        Some(_) => true,
    }
}

// raw_data keeps the selected fields; the text also needs the product name.
fn product_section(
    product: &Map<String, Value>,
    keys: &[&str],
    company_id: &str,
    product_id: &str,
    product_name: &Value,
) -> (Map<String, Value>, Map<String, Value>) {
    let mut raw = pick(product, keys);
    raw.insert("company_id".into(), Value::String(company_id.to_string()));
    raw.insert("product_id".into(), Value::String(product_id.to_string()));
    let mut text_fields = raw.clone();
    text_fields.insert("product_name".into(), product_name.clone());
    (raw, text_fields)
}

/// Splits an insurer document into company, branch and per-product chunks.
pub fn chunk_company(doc: &Value) -> Result<Vec<Chunk>, IngestError> {
    let normalized = normalize(doc)?;
    let company_id = field(&normalized.company, "company_id");
    let mut chunks = Vec::new();

    chunks.push(make_chunk(
        &company_id,
        None,
        ChunkType::CompanyMetadata,
        normalized.company.clone(),
        &normalized.company,
    ));

    for branch in &normalized.branches {
        chunks.push(make_chunk(&company_id, None, ChunkType::Branch, branch.clone(), branch));
    }

    for product in &normalized.products {
        let product_id = field(product, "product_id");
        let product_name = product.get("product_name").cloned().unwrap_or(Value::Null);
        let pid = Some(product_id.as_str());
        let section = |keys: &[&str]| {
            product_section(product, keys, &company_id, &product_id, &product_name)
        };

        let (raw, text) = section(&[
            "product_name",
            "category",
            "target_market",
            "eligibility_age_min",
            "eligibility_age_max",
            "eligibility_notes",
            "geographic_coverage",
            "last_updated",
            "distribution_channels",
            "sources",
        ]);
        chunks.push(make_chunk(&company_id, pid, ChunkType::ProductMetadata, raw, &text));

        let (raw, text) = section(&[
            "premium_currency",
            "premium_payment_frequency",
            "premium_rate_table",
            "premium_rate_table_notes",
            "premium_sample_examples",
        ]);
        chunks.push(make_chunk(&company_id, pid, ChunkType::Premium, raw, &text));

        let mut coverage_keys = vec!["coverage_benefits", "coverage_duration"];
        if product.contains_key("coverage_sum_assured_min_without_medical") {
            coverage_keys.extend([
                "coverage_sum_assured_min_without_medical",
                "coverage_sum_assured_max_without_medical",
                "coverage_sum_assured_min_with_medical",
                "coverage_sum_assured_max_with_medical",
            ]);
        }
        let (raw, text) = section(coverage_keys.as_slice());
        chunks.push(make_chunk(&company_id, pid, ChunkType::Coverage, raw, &text));

        let (raw, text) = section(&["exclusions"]);
        chunks.push(make_chunk(&company_id, pid, ChunkType::Exclusions, raw, &text));

        let (raw, text) = section(&["add_ons"]);
        chunks.push(make_chunk(&company_id, pid, ChunkType::AddOns, raw, &text));

        let (raw, text) = section(&[
            "claims_process_required_documents",
            "claims_process_average_turnaround_days",
            "claims_process_digital_claims_supported",
            "claims_process_notes",
        ]);
        chunks.push(make_chunk(&company_id, pid, ChunkType::ClaimsProcess, raw, &text));

        let (raw, text) = section(&["renewal_terms_auto_renewal", "renewal_terms_grace_period_days"]);
        chunks.push(make_chunk(&company_id, pid, ChunkType::RenewalTerms, raw, &text));

        if is_present(product.get("provider_network_hospitals")) {
            let (raw, text) = section(&["provider_network_hospitals", "provider_network_note"]);
            chunks.push(make_chunk(&company_id, pid, ChunkType::ProviderNetwork, raw, &text));
        }

        if is_present(product.get("customer_reviews")) {
            let (raw, text) = section(&["customer_reviews"]);
            chunks.push(make_chunk(&company_id, pid, ChunkType::CustomerReviews, raw, &text));
        }
    }

    info!("Created {} chunks for {}", chunks.len(), company_id);
    Ok(chunks)
}

/// Cross-checks chunk counts against the source document. Only warns.
pub fn validate_chunks(chunks: &[Chunk], doc: &Value) -> Vec<String> {
    let mut problems = Vec::new();
    let branches = doc["branches"].as_array().map(Vec::len).unwrap_or(0);
    let products = doc["products"].as_array().cloned().unwrap_or_default();

    let branch_chunks = chunks.iter().filter(|c| c.chunk_type == ChunkType::Branch).count();
    if branch_chunks != branches {
        problems.push(format!(
            "Branch count mismatch: expected {}, got {}",
            branches, branch_chunks
        ));
    }

    let product_chunks = chunks.iter().filter(|c| c.product_id.is_some()).count();
    if product_chunks < products.len() {
        problems.push(format!(
            "Product chunk count too low: expected at least {}, got {}",
            products.len(),
            product_chunks
        ));
    }

    if let Some(sample) = products.first() {
        let product_id = render(&sample["product_id"]);
        let mut expected = vec![
            ChunkType::ProductMetadata,
            ChunkType::Premium,
            ChunkType::Coverage,
            ChunkType::Exclusions,
            ChunkType::AddOns,
            ChunkType::ClaimsProcess,
            ChunkType::RenewalTerms,
        ];
        if is_present(sample.get("provider_network").and_then(|p| p.get("hospitals"))) {
            expected.push(ChunkType::ProviderNetwork);
        }
        if is_present(sample.get("customer_reviews")) {
            expected.push(ChunkType::CustomerReviews);
        }

        for chunk_type in expected {
            let found = chunks.iter().any(|c| {
                c.chunk_type == chunk_type && c.product_id.as_deref() == Some(product_id.as_str())
            });
            if !found {
                problems.push(format!(
                    "Missing {} chunk for product {}",
                    chunk_type.as_str(),
                    product_id
                ));
            }
        }
    }

    for problem in &problems {
        warn!("{}", problem);
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flatten_joins_value_lists_but_not_entities() {
        let input = json!({
            "license_info": {"regulator": "IRA", "license_reference": "L-1"},
            "tags": ["motor", "health"],
            "branches": [{"branch_name": "Nairobi"}],
        });
        let flat = flatten(input.as_object().unwrap(), "", "_");

        assert_eq!(flat["license_info_regulator"], json!("IRA"));
        assert_eq!(flat["tags"], json!("motor, health"));
        assert!(flat["branches"].is_array());
    }

    #[test]
    fn chunk_text_falls_back_to_placeholder() {
        let mut data = Map::new();
        data.insert("product_name".into(), json!("Family Funeral"));
        data.insert("product_id".into(), json!("BR-FF"));
        data.insert("exclusions".into(), json!("Suicide within 12 months"));

        assert_eq!(
            chunk_text(&data, ChunkType::Exclusions),
            "Exclusions for Family Funeral (ID: BR-FF): Suicide within 12 months."
        );
        assert_eq!(
            chunk_text(&data, ChunkType::AddOns),
            "Add-ons for Family Funeral (ID: BR-FF): N/A."
        );
    }
}
