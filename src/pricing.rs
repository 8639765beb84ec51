use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::OnceCell;

use crate::view::fmt::{ceprintln, DIM, RESET};

const PRICING_URL: &str = "https://models.dev/api.json";
const FETCH_TIMEOUT_SECS: u64 = 3;

/// Cost-per-million-token rates for one model. A missing cache rate means the
/// corresponding token class is not billed separately, not that it is free.
#[derive(Deserialize, Debug, Clone, Copy, Default)]
pub struct PriceEntry {
    #[serde(default)]
    pub input: f64,
    #[serde(default)]
    pub output: f64,
    #[serde(default)]
    pub cache_read: Option<f64>,
    #[serde(default)]
    pub cache_write: Option<f64>,
}

// models.dev document: provider-id → { name, models: { model-id → { name, cost } } }

#[derive(Deserialize)]
struct ProviderDoc {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    models: BTreeMap<String, ModelDoc>,
}

#[derive(Deserialize)]
struct ModelDoc {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    cost: Option<PriceEntry>,
}

#[derive(Default)]
pub struct PriceTable {
    entries: HashMap<String, PriceEntry>,
    model_names: HashMap<String, String>,
    provider_names: HashMap<String, String>,
}

impl PriceTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Providers are folded in sorted order and the first definition of a
    /// model id wins, so lookups stay deterministic run-to-run even when
    /// several providers list the same model.
    pub fn from_document(doc: &str) -> Result<Self> {
        let providers: BTreeMap<String, ProviderDoc> =
            serde_json::from_str(doc).context("invalid pricing document")?;

        let mut table = PriceTable::default();
        for (provider_id, provider) in providers {
            if let Some(name) = provider.name {
                table.provider_names.insert(provider_id, name);
            }
            for (model_id, model) in provider.models {
                if let Some(cost) = model.cost {
                    table.entries.entry(model_id.clone()).or_insert(cost);
                }
                if let Some(name) = model.name {
                    table.model_names.entry(model_id).or_insert(name);
                }
            }
        }
        Ok(table)
    }

    /// Absence means "cost unknown for this model", never zero.
    pub fn entry(&self, model_id: &str) -> Option<&PriceEntry> {
        self.entries.get(model_id)
    }

    pub fn model_display_name(&self, model_id: &str) -> String {
        self.model_names
            .get(model_id)
            .cloned()
            .unwrap_or_else(|| prettify(model_id))
    }

    pub fn provider_display_name(&self, provider_id: &str) -> String {
        self.provider_names
            .get(provider_id)
            .cloned()
            .unwrap_or_else(|| prettify(provider_id))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fallback display name for ids the pricing document doesn't know:
/// "claude-sonnet-4" → "Claude Sonnet 4".
fn prettify(id: &str) -> String {
    id.split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// One fetch per process, memoized. Construct with a stub table in tests to
/// keep the engine off the network.
pub struct PricingResolver {
    table: OnceCell<PriceTable>,
}

impl PricingResolver {
    pub fn new() -> Self {
        Self {
            table: OnceCell::new(),
        }
    }

    pub fn with_table(table: PriceTable) -> Self {
        Self {
            table: OnceCell::new_with(Some(table)),
        }
    }

    pub async fn table(&self) -> &PriceTable {
        self.table.get_or_init(fetch_table).await
    }
}

impl Default for PricingResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Single attempt, bounded timeout. Any failure degrades to an empty table —
/// estimated cost reads zero for the run instead of blocking it.
async fn fetch_table() -> PriceTable {
    match try_fetch().await {
        Ok(table) => table,
        Err(e) => {
            ceprintln!("  {DIM}pricing unavailable ({e}); estimated costs will read $0{RESET}");
            PriceTable::empty()
        }
    }
}

async fn try_fetch() -> Result<PriceTable> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(FETCH_TIMEOUT_SECS))
        .build()
        .context("failed to build pricing http client")?;

    let resp = client
        .get(PRICING_URL)
        .header("User-Agent", concat!("recap/", env!("CARGO_PKG_VERSION")))
        .send()
        .await
        .context("failed to reach models.dev")?;

    let status = resp.status();
    if !status.is_success() {
        return Err(anyhow::anyhow!("pricing endpoint returned {status}"));
    }

    let body = resp.text().await.context("failed to read pricing document")?;
    PriceTable::from_document(&body)
}
