use crate::blocks::{Block, BlockId};
use chrono::{DateTime, Utc};
use im::Vector;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontStyle {
    #[default]
    Default,
    Serif,
    Mono,
}

/// Presentation preferences. Keys this crate does not know about are kept
/// in `extra` and written back untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default)]
    pub font_style: FontStyle,
    #[serde(default)]
    pub full_width: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub title: String,
    pub blocks: Vector<Block>,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub banner: Option<String>,
    #[serde(default)]
    pub background_color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            blocks: Vector::new(),
            preferences: Preferences::default(),
            banner: None,
            background_color: None,
            icon: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_blocks(mut self, blocks: impl IntoIterator<Item = Block>) -> Self {
        self.blocks = blocks.into_iter().collect();
        self
    }

    pub fn is_locked(&self) -> bool {
        self.preferences.locked
    }

    /// Value equality over everything that gets persisted, ignoring timestamps.
    pub fn same_content(&self, other: &Document) -> bool {
        self.id == other.id
            && self.title == other.title
            && self.blocks == other.blocks
            && self.preferences == other.preferences
            && self.banner == other.banner
            && self.background_color == other.background_color
            && self.icon == other.icon
    }

    pub fn position_of(&self, id: &BlockId) -> Option<usize> {
        self.blocks.iter().position(|block| &block.id == id)
    }
}
