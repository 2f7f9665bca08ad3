//! Vocabulary collections and items

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Hangul syllables, jamo and compatibility jamo
static HANGUL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{Hangul}").expect("valid Hangul pattern"));

/// Whether the text contains at least one Korean character
pub fn contains_hangul(text: &str) -> bool {
    HANGUL.is_match(text)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyCollection {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    /// Emoji or icon name
    pub icon: Option<String>,
    pub is_public: bool,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Collection with its items, for the detail view
#[derive(Debug, Clone, Serialize)]
pub struct CollectionDetail {
    #[serde(flatten)]
    pub collection: VocabularyCollection,
    pub items: Vec<VocabularyItem>,
    /// Whether the caller may edit the collection
    pub editable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionSummary {
    #[serde(flatten)]
    pub collection: VocabularyCollection,
    pub item_count: i64,
    pub checked_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyItem {
    pub id: i64,
    pub collection_id: i64,
    pub korean: String,
    /// Indonesian meaning
    pub meaning: String,
    pub romanization: Option<String>,
    pub example_sentence: Option<String>,
    pub example_translation: Option<String>,
    pub audio_url: Option<String>,
    pub item_type: VocabularyItemType,
    /// Marked as learned by the owner
    pub is_checked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum VocabularyItemType {
    #[default]
    Word,
    Sentence,
}

impl fmt::Display for VocabularyItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VocabularyItemType::Word => write!(f, "WORD"),
            VocabularyItemType::Sentence => write!(f, "SENTENCE"),
        }
    }
}

impl FromStr for VocabularyItemType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "WORD" => Ok(VocabularyItemType::Word),
            "SENTENCE" => Ok(VocabularyItemType::Sentence),
            _ => Err(anyhow::anyhow!("Invalid vocabulary item type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCollectionInput {
    pub title: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCollectionInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateItemInput {
    pub korean: String,
    pub meaning: String,
    pub romanization: Option<String>,
    pub example_sentence: Option<String>,
    pub example_translation: Option<String>,
    pub audio_url: Option<String>,
    #[serde(default)]
    pub item_type: VocabularyItemType,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateItemInput {
    pub korean: Option<String>,
    pub meaning: Option<String>,
    pub romanization: Option<String>,
    pub example_sentence: Option<String>,
    pub example_translation: Option<String>,
    pub audio_url: Option<String>,
    pub item_type: Option<VocabularyItemType>,
}
