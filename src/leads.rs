use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::info;

/// One captured wizard submission plus the envelope the service stamps onto
/// it. Everything the form posted besides `flow` is kept verbatim in
/// `fields`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    pub flow: String,
    pub received_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum LeadStoreError {
    #[error("missing required field: {0}")]
    MissingField(String),
    #[error("lead not found")]
    NotFound,
    #[error("lead file io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("lead file is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

/// JSON-array file of leads. Every mutation rewrites the whole file; the
/// mutex serializes access so concurrent requests cannot tear it.
pub struct LeadStore {
    path: PathBuf,
    lock: Mutex<()>,
}

/// Envelope keys a patch is never allowed to overwrite.
const PROTECTED_KEYS: [&str; 5] = ["id", "flow", "receivedAt", "updatedAt", "updatedBy"];

impl LeadStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Create the file (and its parent directory) with an empty array when it
    /// does not exist yet.
    pub async fn init(&self) -> Result<(), LeadStoreError> {
        let _guard = self.lock.lock().await;
        if fs::try_exists(&self.path).await? {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.path, "[]").await?;
        Ok(())
    }

    /// Validate and append one submission. `flow` and the flow-specific phone
    /// field are required; everything else is stored as-is.
    pub async fn submit(&self, mut fields: Map<String, Value>) -> Result<Lead, LeadStoreError> {
        let flow = match fields.remove("flow") {
            Some(Value::String(flow)) if !flow.is_empty() => flow,
            _ => return Err(LeadStoreError::MissingField("flow".to_string())),
        };

        let phone_field = format!("{flow}_phone");
        let has_phone = fields
            .get(&phone_field)
            .and_then(Value::as_str)
            .is_some_and(|phone| !phone.trim().is_empty());
        if !has_phone {
            return Err(LeadStoreError::MissingField(phone_field));
        }

        let lead = Lead {
            id: generate_lead_id(),
            flow,
            received_at: Utc::now(),
            updated_at: None,
            updated_by: None,
            fields,
        };

        let _guard = self.lock.lock().await;
        let mut leads = self.read_all().await?;
        leads.push(lead.clone());
        self.write_all(&leads).await?;

        info!(
            lead_id = %lead.id,
            flow = %lead.flow,
            total = leads.len(),
            "lead saved"
        );
        Ok(lead)
    }

    pub async fn list(&self) -> Result<Vec<Lead>, LeadStoreError> {
        let _guard = self.lock.lock().await;
        self.read_all().await
    }

    pub async fn list_by_flow(&self, flow: &str) -> Result<Vec<Lead>, LeadStoreError> {
        let _guard = self.lock.lock().await;
        let leads = self.read_all().await?;
        Ok(leads.into_iter().filter(|lead| lead.flow == flow).collect())
    }

    /// Merge a flat patch into the lead's form fields and stamp the update.
    /// Envelope keys in the patch are ignored.
    pub async fn update(
        &self,
        id: &str,
        patch: Map<String, Value>,
        updated_by: &str,
    ) -> Result<Lead, LeadStoreError> {
        let _guard = self.lock.lock().await;
        let mut leads = self.read_all().await?;
        let lead = leads
            .iter_mut()
            .find(|lead| lead.id == id)
            .ok_or(LeadStoreError::NotFound)?;

        for (key, value) in patch {
            if PROTECTED_KEYS.contains(&key.as_str()) {
                continue;
            }
            lead.fields.insert(key, value);
        }
        lead.updated_at = Some(Utc::now());
        lead.updated_by = Some(updated_by.to_string());

        let updated = lead.clone();
        self.write_all(&leads).await?;
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> Result<(), LeadStoreError> {
        let _guard = self.lock.lock().await;
        let mut leads = self.read_all().await?;
        let before = leads.len();
        leads.retain(|lead| lead.id != id);
        if leads.len() == before {
            return Err(LeadStoreError::NotFound);
        }
        self.write_all(&leads).await?;
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<Lead>, LeadStoreError> {
        let data = fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&data)?)
    }

    async fn write_all(&self, leads: &[Lead]) -> Result<(), LeadStoreError> {
        let data = serde_json::to_string_pretty(leads)?;
        fs::write(&self.path, data).await?;
        Ok(())
    }
}

static LEAD_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Millisecond timestamp plus a mixed counter suffix; unique within one
/// process even for submissions in the same millisecond.
fn generate_lead_id() -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    let counter = LEAD_COUNTER.fetch_add(1, Ordering::Relaxed);
    let suffix = splitmix64(millis ^ (counter << 40)) as u32;
    format!("{millis:x}{suffix:08x}")
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}
