use serde::{Deserialize, Deserializer};

/// OpenCode writes token counts as JSON numbers that are sometimes floats
/// (provider SDKs round-trip them through doubles). Accept either.
fn lenient_u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    f64::deserialize(d).map(|v| if v.is_finite() && v > 0.0 { v as u64 } else { 0 })
}

#[derive(Deserialize, Debug, Clone)]
pub struct SessionRecord {
    pub id: String,
    #[serde(rename = "projectID")]
    pub project_id: String,
    #[serde(default)]
    pub directory: Option<String>,
    pub time: SessionTime,
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub struct SessionTime {
    pub created: i64,
    #[serde(default)]
    pub updated: Option<i64>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct MessageRecord {
    pub id: String,
    #[serde(rename = "sessionID")]
    pub session_id: String,
    pub role: Role,
    pub time: MessageTime,
    #[serde(default, rename = "modelID")]
    model_id: Option<String>,
    #[serde(default, rename = "providerID")]
    provider_id: Option<String>,
    // Newer message files nest the attribution under `model`; older ones
    // keep it at the top level. Both occur in the same storage tree.
    #[serde(default)]
    model: Option<ModelRef>,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub tokens: Option<TokenUsage>,
}

impl MessageRecord {
    pub fn model_id(&self) -> Option<&str> {
        self.model
            .as_ref()
            .and_then(|m| m.model_id.as_deref())
            .or(self.model_id.as_deref())
    }

    pub fn provider_id(&self) -> Option<&str> {
        self.model
            .as_ref()
            .and_then(|m| m.provider_id.as_deref())
            .or(self.provider_id.as_deref())
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct ModelRef {
    #[serde(default, rename = "modelID")]
    pub model_id: Option<String>,
    #[serde(default, rename = "providerID")]
    pub provider_id: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub struct MessageTime {
    pub created: i64,
    #[serde(default)]
    pub completed: Option<i64>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Deserialize, Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub input: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub output: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub reasoning: u64,
    #[serde(default)]
    pub cache: CacheTokens,
}

#[derive(Deserialize, Debug, Clone, Copy, Default)]
pub struct CacheTokens {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub read: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub write: u64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ProjectRecord {
    pub id: String,
    #[serde(default)]
    pub worktree: Option<String>,
    #[serde(default)]
    pub vcs: Option<String>,
    #[serde(default)]
    pub time: Option<ProjectTime>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub struct ProjectTime {
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub initialized: Option<i64>,
}
