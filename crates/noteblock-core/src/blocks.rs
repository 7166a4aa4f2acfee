use crate::table::TableContent;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable identifier of a block within one document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BlockId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for BlockId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockType {
    Heading,
    #[default]
    Paragraph,
    Checklist,
    Table,
    Image,
    ImageUpload,
    Date,
    Time,
    Divider,
}

impl BlockType {
    pub const ALL: [BlockType; 9] = [
        BlockType::Heading,
        BlockType::Paragraph,
        BlockType::Checklist,
        BlockType::Table,
        BlockType::Image,
        BlockType::ImageUpload,
        BlockType::Date,
        BlockType::Time,
        BlockType::Divider,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Heading => "heading",
            BlockType::Paragraph => "paragraph",
            BlockType::Checklist => "checklist",
            BlockType::Table => "table",
            BlockType::Image => "image",
            BlockType::ImageUpload => "imageUpload",
            BlockType::Date => "date",
            BlockType::Time => "time",
            BlockType::Divider => "divider",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.as_str().eq_ignore_ascii_case(value))
    }

    pub fn is_text(&self) -> bool {
        matches!(self, BlockType::Heading | BlockType::Paragraph)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: String,
    pub text: String,
    pub checked: bool,
}

impl ChecklistItem {
    pub fn empty() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: String::new(),
            checked: false,
        }
    }

    fn with_fresh_id(&self) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            ..self.clone()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageContent {
    pub url: String,
    #[serde(default)]
    pub caption: String,
}

pub const MIN_HEADING_LEVEL: u8 = 1;
pub const MAX_HEADING_LEVEL: u8 = 3;

/// Type-specific payload of a block. The variant is the block's type tag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "camelCase")]
pub enum BlockContent {
    Heading { level: u8, text: String },
    Paragraph { text: String },
    Checklist { items: Vec<ChecklistItem> },
    Table(TableContent),
    Image(ImageContent),
    ImageUpload,
    Date { date: String },
    Time { time: String },
    Divider,
}

impl BlockContent {
    /// Default content shape for a freshly created or converted block.
    pub fn default_for(block_type: BlockType) -> Self {
        match block_type {
            BlockType::Heading => BlockContent::Heading {
                level: MIN_HEADING_LEVEL,
                text: String::new(),
            },
            BlockType::Paragraph => BlockContent::Paragraph {
                text: String::new(),
            },
            BlockType::Checklist => BlockContent::Checklist {
                items: vec![ChecklistItem::empty()],
            },
            BlockType::Table => BlockContent::Table(TableContent::default()),
            BlockType::Image => BlockContent::Image(ImageContent::default()),
            BlockType::ImageUpload => BlockContent::ImageUpload,
            BlockType::Date => BlockContent::Date {
                date: Local::now().format("%Y-%m-%d").to_string(),
            },
            BlockType::Time => BlockContent::Time {
                time: Local::now().format("%H:%M").to_string(),
            },
            BlockType::Divider => BlockContent::Divider,
        }
    }

    pub fn block_type(&self) -> BlockType {
        match self {
            BlockContent::Heading { .. } => BlockType::Heading,
            BlockContent::Paragraph { .. } => BlockType::Paragraph,
            BlockContent::Checklist { .. } => BlockType::Checklist,
            BlockContent::Table(_) => BlockType::Table,
            BlockContent::Image(_) => BlockType::Image,
            BlockContent::ImageUpload => BlockType::ImageUpload,
            BlockContent::Date { .. } => BlockType::Date,
            BlockContent::Time { .. } => BlockType::Time,
            BlockContent::Divider => BlockType::Divider,
        }
    }

    /// Inline markup of heading and paragraph blocks.
    pub fn text(&self) -> Option<&str> {
        match self {
            BlockContent::Heading { text, .. } | BlockContent::Paragraph { text } => Some(text),
            _ => None,
        }
    }

    /// Shallow merge: every field present in `patch` that belongs to this
    /// variant replaces the current value. The type tag never changes.
    pub fn merged(&self, patch: &ContentPatch) -> BlockContent {
        let mut next = self.clone();
        match &mut next {
            BlockContent::Heading { level, text } => {
                if let Some(value) = patch.level {
                    *level = value.clamp(MIN_HEADING_LEVEL, MAX_HEADING_LEVEL);
                }
                if let Some(value) = &patch.text {
                    *text = value.clone();
                }
            }
            BlockContent::Paragraph { text } => {
                if let Some(value) = &patch.text {
                    *text = value.clone();
                }
            }
            BlockContent::Checklist { items } => {
                if let Some(value) = &patch.items {
                    *items = value.clone();
                }
            }
            BlockContent::Table(table) => {
                if let Some(cells) = &patch.cells {
                    if let Some(updated) = table.with_cells(cells.clone()) {
                        *table = updated;
                    }
                }
                if let Some(header_row) = patch.header_row {
                    table.header_row = header_row;
                }
            }
            BlockContent::Image(image) => {
                if let Some(url) = &patch.url {
                    image.url = url.clone();
                }
                if let Some(caption) = &patch.caption {
                    image.caption = caption.clone();
                }
            }
            BlockContent::Date { date } => {
                if let Some(value) = &patch.date {
                    *date = value.clone();
                }
            }
            BlockContent::Time { time } => {
                if let Some(value) = &patch.time {
                    *time = value.clone();
                }
            }
            BlockContent::ImageUpload | BlockContent::Divider => {}
        }
        next
    }

    fn with_fresh_item_ids(&self) -> BlockContent {
        match self {
            BlockContent::Checklist { items } => BlockContent::Checklist {
                items: items.iter().map(ChecklistItem::with_fresh_id).collect(),
            },
            other => other.clone(),
        }
    }
}

impl Default for BlockContent {
    fn default() -> Self {
        BlockContent::default_for(BlockType::Paragraph)
    }
}

/// Partial content used by `BlockStore::update`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ChecklistItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cells: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_row: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

impl ContentPatch {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn level(level: u8) -> Self {
        Self {
            level: Some(level),
            ..Self::default()
        }
    }

    pub fn items(items: Vec<ChecklistItem>) -> Self {
        Self {
            items: Some(items),
            ..Self::default()
        }
    }

    pub fn image(url: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            caption: Some(caption.into()),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    #[serde(flatten)]
    pub content: BlockContent,
}

impl Block {
    pub fn new(block_type: BlockType) -> Self {
        Self {
            id: BlockId::generate(),
            content: BlockContent::default_for(block_type),
        }
    }

    pub fn with_content(content: BlockContent) -> Self {
        Self {
            id: BlockId::generate(),
            content,
        }
    }

    pub fn block_type(&self) -> BlockType {
        self.content.block_type()
    }

    /// Copy with fresh identifiers for the block and any nested items.
    pub fn duplicate(&self) -> Self {
        Self {
            id: BlockId::generate(),
            content: self.content.with_fresh_item_ids(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_checklist_has_one_empty_item() {
        let content = BlockContent::default_for(BlockType::Checklist);
        let BlockContent::Checklist { items } = content else {
            panic!("expected checklist");
        };
        assert_eq!(items.len(), 1);
        assert!(items[0].text.is_empty());
        assert!(!items[0].checked);
    }

    #[test]
    fn default_table_is_two_by_two_with_header() {
        let BlockContent::Table(table) = BlockContent::default_for(BlockType::Table) else {
            panic!("expected table");
        };
        assert_eq!((table.rows, table.cols), (2, 2));
        assert!(table.header_row);
        assert_eq!(table.cells, vec![String::new(); 4]);
    }

    #[test]
    fn default_shapes_match_their_tag() {
        for ty in BlockType::ALL {
            assert_eq!(BlockContent::default_for(ty).block_type(), ty);
        }
    }

    #[test]
    fn merge_ignores_fields_of_other_variants() {
        let content = BlockContent::Paragraph {
            text: "hello".into(),
        };
        let patch = ContentPatch {
            caption: Some("ignored".into()),
            ..ContentPatch::default()
        };
        assert_eq!(content.merged(&patch), content);
    }

    #[test]
    fn merge_clamps_heading_level() {
        let content = BlockContent::Heading {
            level: 1,
            text: "Title".into(),
        };
        let merged = content.merged(&ContentPatch::level(9));
        assert_eq!(
            merged,
            BlockContent::Heading {
                level: 3,
                text: "Title".into()
            }
        );
    }

    #[test]
    fn merge_rejects_table_cells_of_wrong_length() {
        let content = BlockContent::Table(TableContent::default());
        let patch = ContentPatch {
            cells: Some(vec!["only one".into()]),
            ..ContentPatch::default()
        };
        assert_eq!(content.merged(&patch), content);
    }

    #[test]
    fn duplicate_refreshes_item_ids() {
        let block = Block::new(BlockType::Checklist);
        let copy = block.duplicate();
        assert_ne!(block.id, copy.id);
        let (BlockContent::Checklist { items: a }, BlockContent::Checklist { items: b }) =
            (&block.content, &copy.content)
        else {
            panic!("expected checklists");
        };
        assert_ne!(a[0].id, b[0].id);
    }

    #[test]
    fn block_serializes_with_flat_type_tag() {
        let block = Block {
            id: BlockId::from("b1"),
            content: BlockContent::Paragraph {
                text: "Hi".into(),
            },
        };
        let json = serde_json::to_value(&block).expect("serialize");
        assert_eq!(json["id"], "b1");
        assert_eq!(json["type"], "paragraph");
        assert_eq!(json["content"]["text"], "Hi");

        let back: Block = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, block);
    }

    #[test]
    fn parse_accepts_camel_case_tags() {
        assert_eq!(BlockType::parse("imageUpload"), Some(BlockType::ImageUpload));
        assert_eq!(BlockType::parse("CHECKLIST"), Some(BlockType::Checklist));
        assert_eq!(BlockType::parse("video"), None);
    }
}
