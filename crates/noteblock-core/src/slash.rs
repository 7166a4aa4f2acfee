//! Slash command palette: detection of the trigger inside inline text,
//! command filtering, keyboard navigation and the convert-or-split commit.

use crate::blocks::{BlockId, BlockType, ContentPatch};
use crate::config::DEFAULT_SLASH_TRIGGER;
use crate::editor::BlockStore;
use crate::markup;
use tracing::debug;

pub const NO_MATCH_PLACEHOLDER: &str = "No matching blocks";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlashCommand {
    pub id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub block_type: BlockType,
    pub heading_level: Option<u8>,
}

impl SlashCommand {
    const fn block(
        id: &'static str,
        label: &'static str,
        description: &'static str,
        block_type: BlockType,
    ) -> Self {
        Self {
            id,
            label,
            description,
            block_type,
            heading_level: None,
        }
    }

    const fn heading(id: &'static str, label: &'static str, description: &'static str, level: u8) -> Self {
        Self {
            id,
            label,
            description,
            block_type: BlockType::Heading,
            heading_level: Some(level),
        }
    }
}

pub const SLASH_COMMANDS: &[SlashCommand] = &[
    SlashCommand::heading("h1", "Heading 1", "Big section heading", 1),
    SlashCommand::heading("h2", "Heading 2", "Medium section heading", 2),
    SlashCommand::heading("h3", "Heading 3", "Small section heading", 3),
    SlashCommand::block("text", "Text", "Plain paragraph", BlockType::Paragraph),
    SlashCommand::block("checklist", "Checklist", "Track tasks with checkboxes", BlockType::Checklist),
    SlashCommand::block("table", "Table", "Grid of rows and columns", BlockType::Table),
    SlashCommand::block("image", "Image", "Upload a photo or picture", BlockType::ImageUpload),
    SlashCommand::block("date", "Date", "Insert today's date", BlockType::Date),
    SlashCommand::block("time", "Time", "Insert the current time", BlockType::Time),
    SlashCommand::block("divider", "Divider", "Visual separator", BlockType::Divider),
];

pub fn command_by_id(id: &str) -> Option<&'static SlashCommand> {
    SLASH_COMMANDS.iter().find(|command| command.id == id)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashQuery {
    pub trigger_index: usize,
    pub query: String,
}

/// Locates an open trigger before `caret`: the nearest trigger character
/// with no whitespace between it and the caret. Triggers inside markup tags
/// are ignored.
pub fn find_trigger(text: &str, caret: usize, trigger: char) -> Option<SlashQuery> {
    let caret = markup::clamp_to_boundary(text, caret);
    if caret == 0 {
        return None;
    }
    let before = &text[..caret];
    let trigger_index = before.rfind(trigger)?;
    let query = &before[trigger_index + trigger.len_utf8()..];
    if query
        .chars()
        .any(|ch| ch.is_whitespace() || ch == '<' || ch == '>')
    {
        return None;
    }
    let prefix = &before[..trigger_index];
    if let Some(open) = prefix.rfind('<') {
        if prefix.rfind('>').map_or(true, |close| close < open) {
            return None;
        }
    }
    Some(SlashQuery {
        trigger_index,
        query: query.to_string(),
    })
}

/// Case-insensitive substring match on label and description; an empty
/// query keeps every command in table order.
pub fn filter_commands<'a>(query: &str, commands: &'a [SlashCommand]) -> Vec<&'a SlashCommand> {
    let needle = query.trim().to_lowercase();
    commands
        .iter()
        .filter(|command| {
            needle.is_empty()
                || command.label.to_lowercase().contains(&needle)
                || command.description.to_lowercase().contains(&needle)
        })
        .collect()
}

pub fn cycle_index(current: usize, len: usize, forward: bool) -> usize {
    if len == 0 {
        return 0;
    }
    if forward {
        (current + 1) % len
    } else if current == 0 {
        len - 1
    } else {
        current - 1
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PalettePosition {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OpenPalette {
    pub anchor: BlockId,
    pub trigger_index: usize,
    pub caret: usize,
    pub query: String,
    pub position: PalettePosition,
    pub highlighted: usize,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum SlashMenu {
    #[default]
    Closed,
    Open(OpenPalette),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaletteKey {
    Up,
    Down,
    Enter,
    Escape,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaletteAction {
    Ignored,
    Moved,
    Closed,
    Commit(&'static SlashCommand),
}

#[derive(Clone, Debug, PartialEq)]
pub struct PaletteEntry {
    pub id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub highlighted: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PaletteView {
    pub position: PalettePosition,
    pub query: String,
    pub entries: Vec<PaletteEntry>,
    pub placeholder: Option<&'static str>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlashOutcome {
    /// The anchor was empty and now has the chosen type.
    Converted { block: BlockId },
    /// The anchor kept its trimmed text; a new block follows it.
    Inserted { anchor: BlockId, block: BlockId },
}

impl SlashOutcome {
    pub fn focused(&self) -> &BlockId {
        match self {
            SlashOutcome::Converted { block } | SlashOutcome::Inserted { block, .. } => block,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SlashResolver {
    trigger: char,
    menu: SlashMenu,
}

impl Default for SlashResolver {
    fn default() -> Self {
        Self::new(DEFAULT_SLASH_TRIGGER)
    }
}

impl SlashResolver {
    pub fn new(trigger: char) -> Self {
        Self {
            trigger,
            menu: SlashMenu::Closed,
        }
    }

    pub fn trigger(&self) -> char {
        self.trigger
    }

    pub fn menu(&self) -> &SlashMenu {
        &self.menu
    }

    pub fn is_open(&self) -> bool {
        matches!(self.menu, SlashMenu::Open(_))
    }

    pub fn anchor(&self) -> Option<&BlockId> {
        match &self.menu {
            SlashMenu::Open(open) => Some(&open.anchor),
            SlashMenu::Closed => None,
        }
    }

    pub fn close(&mut self) {
        if self.is_open() {
            debug!("slash palette closed");
        }
        self.menu = SlashMenu::Closed;
    }

    /// Re-evaluates the palette after the anchor's text or caret changed.
    /// Returns whether the palette is open afterwards.
    pub fn on_input(
        &mut self,
        anchor: &BlockId,
        text: &str,
        caret: usize,
        position: PalettePosition,
    ) -> bool {
        let Some(found) = find_trigger(text, caret, self.trigger) else {
            self.close();
            return false;
        };
        let caret = markup::clamp_to_boundary(text, caret);
        let highlighted = match &self.menu {
            SlashMenu::Open(open)
                if open.anchor == *anchor
                    && open.trigger_index == found.trigger_index
                    && open.query == found.query =>
            {
                open.highlighted
            }
            _ => 0,
        };
        if !self.is_open() {
            debug!(block = %anchor, "slash palette opened");
        }
        self.menu = SlashMenu::Open(OpenPalette {
            anchor: anchor.clone(),
            trigger_index: found.trigger_index,
            caret,
            query: found.query,
            position,
            highlighted,
        });
        true
    }

    pub fn filtered(&self) -> Vec<&'static SlashCommand> {
        match &self.menu {
            SlashMenu::Open(open) => filter_commands(&open.query, SLASH_COMMANDS),
            SlashMenu::Closed => Vec::new(),
        }
    }

    pub fn highlighted(&self) -> Option<&'static SlashCommand> {
        let SlashMenu::Open(open) = &self.menu else {
            return None;
        };
        self.filtered().get(open.highlighted).copied()
    }

    pub fn palette(&self) -> Option<PaletteView> {
        let SlashMenu::Open(open) = &self.menu else {
            return None;
        };
        let entries: Vec<PaletteEntry> = self
            .filtered()
            .into_iter()
            .enumerate()
            .map(|(ix, command)| PaletteEntry {
                id: command.id,
                label: command.label,
                description: command.description,
                highlighted: ix == open.highlighted,
            })
            .collect();
        let placeholder = entries.is_empty().then_some(NO_MATCH_PLACEHOLDER);
        Some(PaletteView {
            position: open.position,
            query: open.query.clone(),
            entries,
            placeholder,
        })
    }

    pub fn handle_key(&mut self, key: PaletteKey) -> PaletteAction {
        let len = self.filtered().len();
        let SlashMenu::Open(open) = &mut self.menu else {
            return PaletteAction::Ignored;
        };
        match key {
            PaletteKey::Up | PaletteKey::Down => {
                if len == 0 {
                    return PaletteAction::Ignored;
                }
                open.highlighted = cycle_index(open.highlighted, len, key == PaletteKey::Down);
                PaletteAction::Moved
            }
            PaletteKey::Enter => match self.highlighted() {
                Some(command) => PaletteAction::Commit(command),
                None => PaletteAction::Ignored,
            },
            PaletteKey::Escape => {
                self.close();
                PaletteAction::Closed
            }
        }
    }

    /// Closes the palette when its anchor block no longer exists.
    pub fn sync_with(&mut self, store: &BlockStore) {
        if let Some(anchor) = self.anchor() {
            if store.block(anchor).is_none() {
                debug!(block = %anchor, "slash anchor removed");
                self.close();
            }
        }
    }

    /// Applies `command` to the anchor block and closes the palette.
    ///
    /// The trigger and the search text are stripped first. If nothing
    /// visible precedes the trigger the anchor converts in place and keeps
    /// focus; text after the caret carries over when the new type holds
    /// text. Otherwise the anchor keeps the stripped text and a new block of
    /// the chosen type is inserted after it and focused.
    pub fn commit(
        &mut self,
        store: &mut BlockStore,
        command: &SlashCommand,
    ) -> Option<SlashOutcome> {
        let SlashMenu::Open(open) = std::mem::take(&mut self.menu) else {
            return None;
        };
        if store.is_locked() {
            return None;
        }
        let text = store.block(&open.anchor)?.content.text()?.to_string();
        let caret = markup::clamp_to_boundary(&text, open.caret);
        let found = find_trigger(&text, caret, self.trigger)?;
        let before = &text[..found.trigger_index];
        let after = &text[caret..];

        let outcome = if markup::is_blank(before) {
            store.convert_type(&open.anchor, command.block_type);
            if !markup::is_blank(after) {
                store.update(&open.anchor, &ContentPatch::text(after));
            }
            SlashOutcome::Converted {
                block: open.anchor.clone(),
            }
        } else {
            store.update(&open.anchor, &ContentPatch::text(format!("{before}{after}")));
            let block = store.insert_after(&open.anchor, command.block_type)?;
            SlashOutcome::Inserted {
                anchor: open.anchor.clone(),
                block,
            }
        };

        if let Some(level) = command.heading_level {
            store.update(outcome.focused(), &ContentPatch::level(level));
        }
        store.set_active(Some(outcome.focused()));
        debug!(command = command.id, focused = %outcome.focused(), "slash command applied");
        Some(outcome)
    }
}
