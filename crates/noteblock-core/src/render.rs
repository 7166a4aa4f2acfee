//! Maps blocks to presentational views and routes interactions on those
//! views back into [`BlockStore`] calls. Holds no state of its own.

use crate::blocks::{Block, BlockContent, BlockId, ContentPatch};
use crate::document::FontStyle;
use crate::drag::DragReorder;
use crate::editor::BlockStore;
use chrono::{NaiveDate, NaiveTime};
use tracing::debug;

pub const PARAGRAPH_PLACEHOLDER: &str = "Type '/' for commands";
pub const IMAGE_UPLOAD_PROMPT: &str = "Click or drop an image to upload";

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChecklistItemView {
    pub id: String,
    pub text: String,
    pub checked: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockView {
    Heading {
        level: u8,
        markup: String,
    },
    Paragraph {
        markup: String,
        placeholder: Option<&'static str>,
    },
    Checklist {
        items: Vec<ChecklistItemView>,
    },
    Table {
        header_row: bool,
        rows: Vec<Vec<String>>,
    },
    Image {
        url: String,
        caption: String,
    },
    ImageUpload {
        prompt: &'static str,
    },
    Date {
        value: String,
        label: String,
    },
    Time {
        value: String,
        label: String,
    },
    Divider,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderedBlock {
    pub id: BlockId,
    pub view: BlockView,
    pub editable: bool,
    pub draggable: bool,
    pub opacity: f32,
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DocumentView {
    pub title: String,
    pub icon: Option<String>,
    pub banner: Option<String>,
    pub background_color: Option<String>,
    pub font_style: FontStyle,
    pub full_width: bool,
    pub locked: bool,
    pub blocks: Vec<RenderedBlock>,
}

pub fn block_view(block: &Block) -> BlockView {
    match &block.content {
        BlockContent::Heading { level, text } => BlockView::Heading {
            level: *level,
            markup: text.clone(),
        },
        BlockContent::Paragraph { text } => BlockView::Paragraph {
            markup: text.clone(),
            placeholder: text.is_empty().then_some(PARAGRAPH_PLACEHOLDER),
        },
        BlockContent::Checklist { items } => BlockView::Checklist {
            items: items
                .iter()
                .map(|item| ChecklistItemView {
                    id: item.id.clone(),
                    text: item.text.clone(),
                    checked: item.checked,
                })
                .collect(),
        },
        BlockContent::Table(table) => BlockView::Table {
            header_row: table.header_row,
            rows: (0..table.rows)
                .filter_map(|row| table.row(row).map(<[String]>::to_vec))
                .collect(),
        },
        BlockContent::Image(image) => BlockView::Image {
            url: image.url.clone(),
            caption: image.caption.clone(),
        },
        BlockContent::ImageUpload => BlockView::ImageUpload {
            prompt: IMAGE_UPLOAD_PROMPT,
        },
        BlockContent::Date { date } => BlockView::Date {
            value: date.clone(),
            label: date_label(date),
        },
        BlockContent::Time { time } => BlockView::Time {
            value: time.clone(),
            label: time_label(time),
        },
        BlockContent::Divider => BlockView::Divider,
    }
}

pub fn render_block(store: &BlockStore, drag: &DragReorder, block: &Block) -> RenderedBlock {
    let unlocked = !store.is_locked();
    RenderedBlock {
        id: block.id.clone(),
        view: block_view(block),
        editable: unlocked,
        draggable: unlocked,
        opacity: drag.opacity(&block.id),
        active: store.active() == Some(&block.id),
    }
}

pub fn render_document(store: &BlockStore, drag: &DragReorder) -> DocumentView {
    let doc = store.document();
    DocumentView {
        title: doc.title.clone(),
        icon: doc.icon.clone(),
        banner: doc.banner.clone(),
        background_color: doc.background_color.clone(),
        font_style: doc.preferences.font_style,
        full_width: doc.preferences.full_width,
        locked: doc.is_locked(),
        blocks: doc
            .blocks
            .iter()
            .map(|block| render_block(store, drag, block))
            .collect(),
    }
}

/// Interactions a rendered block can report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockInput {
    Text(String),
    HeadingLevel(u8),
    AddItem { after: Option<String> },
    RemoveItem(String),
    ToggleItem(String),
    ItemText { item_id: String, text: String },
    Cell { row: usize, col: usize, text: String },
    AddRow,
    AddColumn,
    /// Empty row before the given index.
    InsertRow(usize),
    /// Empty column before the given index.
    InsertColumn(usize),
    DeleteRow(usize),
    DeleteColumn(usize),
    ToggleHeaderRow,
    Caption(String),
    Date(String),
    Time(String),
}

/// Applies `input` to block `id`. Returns true when the document changed.
/// Inputs that do not fit the block's type are ignored.
pub fn dispatch_input(store: &mut BlockStore, id: &BlockId, input: BlockInput) -> bool {
    match input {
        BlockInput::Text(text) => store.update(id, &ContentPatch::text(text)),
        BlockInput::HeadingLevel(level) => store.update(id, &ContentPatch::level(level)),
        BlockInput::AddItem { after } => store.add_checklist_item(id, after.as_deref()).is_some(),
        BlockInput::RemoveItem(item_id) => store.remove_checklist_item(id, &item_id),
        BlockInput::ToggleItem(item_id) => store.toggle_checklist_item(id, &item_id),
        BlockInput::ItemText { item_id, text } => {
            store.set_checklist_item_text(id, &item_id, &text)
        }
        BlockInput::Cell { row, col, text } => store.set_cell(id, row, col, &text),
        BlockInput::AddRow => store.add_row(id),
        BlockInput::AddColumn => store.add_column(id),
        BlockInput::InsertRow(row) => store.insert_row(id, row),
        BlockInput::InsertColumn(col) => store.insert_column(id, col),
        BlockInput::DeleteRow(row) => store.delete_row(id, row),
        BlockInput::DeleteColumn(col) => store.delete_column(id, col),
        BlockInput::ToggleHeaderRow => store.toggle_header_row(id),
        BlockInput::Caption(caption) => store.update(
            id,
            &ContentPatch {
                caption: Some(caption),
                ..ContentPatch::default()
            },
        ),
        BlockInput::Date(date) => {
            if NaiveDate::parse_from_str(&date, DATE_FORMAT).is_err() {
                debug!(block = %id, %date, "ignoring invalid date");
                return false;
            }
            store.update(
                id,
                &ContentPatch {
                    date: Some(date),
                    ..ContentPatch::default()
                },
            )
        }
        BlockInput::Time(time) => {
            if NaiveTime::parse_from_str(&time, TIME_FORMAT).is_err() {
                debug!(block = %id, %time, "ignoring invalid time");
                return false;
            }
            store.update(
                id,
                &ContentPatch {
                    time: Some(time),
                    ..ContentPatch::default()
                },
            )
        }
    }
}

fn date_label(value: &str) -> String {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map(|date| date.format("%B %-d, %Y").to_string())
        .unwrap_or_else(|_| value.to_string())
}

fn time_label(value: &str) -> String {
    NaiveTime::parse_from_str(value, TIME_FORMAT)
        .map(|time| time.format("%-I:%M %p").to_string())
        .unwrap_or_else(|_| value.to_string())
}
