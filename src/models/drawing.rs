//! Excalidraw whiteboard drawings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Drawing {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    /// Excalidraw scene elements (JSON array)
    pub elements: serde_json::Value,
    pub app_state: serde_json::Value,
    /// Embedded binary files keyed by file id
    pub files: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// List row without the scene payload
#[derive(Debug, Clone, Serialize)]
pub struct DrawingSummary {
    pub id: i64,
    pub name: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveDrawingInput {
    pub name: String,
    #[serde(default = "empty_array")]
    pub elements: serde_json::Value,
    #[serde(default = "empty_object")]
    pub app_state: serde_json::Value,
    #[serde(default = "empty_object")]
    pub files: serde_json::Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDrawingInput {
    pub name: Option<String>,
    pub elements: Option<serde_json::Value>,
    pub app_state: Option<serde_json::Value>,
    pub files: Option<serde_json::Value>,
}

fn empty_array() -> serde_json::Value {
    serde_json::Value::Array(Vec::new())
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}
