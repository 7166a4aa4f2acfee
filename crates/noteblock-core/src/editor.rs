use crate::blocks::{Block, BlockContent, BlockId, BlockType, ChecklistItem, ContentPatch};
use crate::document::{Document, FontStyle};
use crate::table::TableContent;
use chrono::Utc;
use im::Vector;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Owns one document's ordered block sequence and applies every structural
/// edit to it.
///
/// Each mutation builds the next block sequence from a cheap structural copy
/// of the current one and swaps it in whole, so a caller holding a
/// [`Document`] snapshot never observes a half-applied edit. While the
/// document is locked every mutation except unlocking is a silent no-op.
#[derive(Clone, Debug)]
pub struct BlockStore {
    doc: Document,
    active: Option<BlockId>,
    revision: u64,
}

impl BlockStore {
    pub fn new(mut doc: Document) -> Self {
        doc.blocks = dedupe_ids(doc.blocks);
        Self {
            doc,
            active: None,
            revision: 0,
        }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Owned copy of the current state; shares block storage with the store.
    pub fn snapshot(&self) -> Document {
        self.doc.clone()
    }

    pub fn blocks(&self) -> &Vector<Block> {
        &self.doc.blocks
    }

    pub fn block(&self, id: &BlockId) -> Option<&Block> {
        self.doc.blocks.iter().find(|block| &block.id == id)
    }

    pub fn block_ids(&self) -> Vec<BlockId> {
        self.doc.blocks.iter().map(|block| block.id.clone()).collect()
    }

    pub fn position_of(&self, id: &BlockId) -> Option<usize> {
        self.doc.position_of(id)
    }

    pub fn len(&self) -> usize {
        self.doc.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc.blocks.is_empty()
    }

    pub fn is_locked(&self) -> bool {
        self.doc.is_locked()
    }

    /// Bumped once per applied change; unchanged by no-ops.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn active(&self) -> Option<&BlockId> {
        self.active.as_ref()
    }

    pub fn active_block(&self) -> Option<&Block> {
        self.active.as_ref().and_then(|id| self.block(id))
    }

    /// Focus a block, or clear focus with `None`. Unknown ids clear focus.
    pub fn set_active(&mut self, id: Option<&BlockId>) {
        self.active = id.filter(|id| self.block(id).is_some()).cloned();
    }

    pub fn set_locked(&mut self, locked: bool) -> bool {
        if self.doc.preferences.locked == locked {
            return false;
        }
        self.doc.preferences.locked = locked;
        self.touch();
        debug!(locked, "document lock changed");
        true
    }

    pub fn toggle_lock(&mut self) -> bool {
        let locked = !self.is_locked();
        self.set_locked(locked)
    }

    /// Appends a default block of `block_type` at the end of the document.
    pub fn add_block(&mut self, block_type: BlockType) -> Option<BlockId> {
        if self.refuse_locked("add_block") {
            return None;
        }
        let block = Block::new(block_type);
        let id = block.id.clone();
        let mut blocks = self.doc.blocks.clone();
        blocks.push_back(block);
        self.commit(blocks);
        Some(id)
    }

    pub fn insert_after(&mut self, anchor: &BlockId, block_type: BlockType) -> Option<BlockId> {
        self.insert_relative(anchor, Block::new(block_type), 1, "insert_after")
    }

    pub fn insert_before(&mut self, anchor: &BlockId, block_type: BlockType) -> Option<BlockId> {
        self.insert_relative(anchor, Block::new(block_type), 0, "insert_before")
    }

    /// Inserts a block with prepared content right after `anchor`.
    pub fn insert_content_after(
        &mut self,
        anchor: &BlockId,
        content: BlockContent,
    ) -> Option<BlockId> {
        self.insert_relative(anchor, Block::with_content(content), 1, "insert_content_after")
    }

    pub fn delete(&mut self, id: &BlockId) -> bool {
        if self.refuse_locked("delete") {
            return false;
        }
        let Some(ix) = self.position_of(id) else {
            return false;
        };
        let mut blocks = self.doc.blocks.clone();
        blocks.remove(ix);
        self.commit(blocks);
        if self.active.as_ref() == Some(id) {
            self.active = None;
        }
        debug!(block = %id, "block deleted");
        true
    }

    pub fn duplicate(&mut self, id: &BlockId) -> Option<BlockId> {
        if self.refuse_locked("duplicate") {
            return None;
        }
        let ix = self.position_of(id)?;
        let copy = self.doc.blocks[ix].duplicate();
        let copy_id = copy.id.clone();
        let mut blocks = self.doc.blocks.clone();
        blocks.insert(ix + 1, copy);
        self.commit(blocks);
        Some(copy_id)
    }

    pub fn move_up(&mut self, id: &BlockId) -> bool {
        if self.refuse_locked("move_up") {
            return false;
        }
        match self.position_of(id) {
            Some(ix) if ix > 0 => self.swap(ix - 1, ix),
            _ => false,
        }
    }

    pub fn move_down(&mut self, id: &BlockId) -> bool {
        if self.refuse_locked("move_down") {
            return false;
        }
        match self.position_of(id) {
            Some(ix) if ix + 1 < self.len() => self.swap(ix, ix + 1),
            _ => false,
        }
    }

    /// Removes `id` and reinserts it at the position `target` occupied.
    pub fn reorder(&mut self, id: &BlockId, target: &BlockId) -> bool {
        if self.refuse_locked("reorder") || id == target {
            return false;
        }
        let (Some(from), Some(to)) = (self.position_of(id), self.position_of(target)) else {
            return false;
        };
        let mut blocks = self.doc.blocks.clone();
        let block = blocks.remove(from);
        blocks.insert(to, block);
        self.commit(blocks);
        debug!(block = %id, from, to, "block reordered");
        true
    }

    /// Shallow-merges `patch` into the block's content; the type tag is kept.
    pub fn update(&mut self, id: &BlockId, patch: &ContentPatch) -> bool {
        self.replace_content(id, "update", |content| Some(content.merged(patch)))
    }

    /// Switches the block to `block_type` with that type's default content.
    pub fn convert_type(&mut self, id: &BlockId, block_type: BlockType) -> bool {
        if self.refuse_locked("convert_type") {
            return false;
        }
        let Some(ix) = self.position_of(id) else {
            return false;
        };
        let mut blocks = self.doc.blocks.clone();
        blocks[ix].content = BlockContent::default_for(block_type);
        self.commit(blocks);
        debug!(block = %id, to = block_type.as_str(), "block converted");
        true
    }

    pub fn add_row(&mut self, id: &BlockId) -> bool {
        self.edit_table(id, "add_row", |table| table.with_row_inserted(table.rows))
    }

    pub fn add_column(&mut self, id: &BlockId) -> bool {
        self.edit_table(id, "add_column", |table| table.with_column_inserted(table.cols))
    }

    pub fn insert_row(&mut self, id: &BlockId, at: usize) -> bool {
        self.edit_table(id, "insert_row", |table| table.with_row_inserted(at))
    }

    pub fn insert_column(&mut self, id: &BlockId, at: usize) -> bool {
        self.edit_table(id, "insert_column", |table| table.with_column_inserted(at))
    }

    /// Rejected (state unchanged) when the table has a single row.
    pub fn delete_row(&mut self, id: &BlockId, row: usize) -> bool {
        self.edit_table(id, "delete_row", |table| table.without_row(row))
    }

    /// Rejected (state unchanged) when the table has a single column.
    pub fn delete_column(&mut self, id: &BlockId, col: usize) -> bool {
        self.edit_table(id, "delete_column", |table| table.without_column(col))
    }

    pub fn set_cell(&mut self, id: &BlockId, row: usize, col: usize, text: &str) -> bool {
        self.edit_table(id, "set_cell", |table| table.with_cell(row, col, text))
    }

    pub fn toggle_header_row(&mut self, id: &BlockId) -> bool {
        self.edit_table(id, "toggle_header_row", |table| {
            Some(TableContent {
                header_row: !table.header_row,
                ..table.clone()
            })
        })
    }

    /// Adds an empty item after `after` (or at the end); returns its id.
    pub fn add_checklist_item(&mut self, id: &BlockId, after: Option<&str>) -> Option<String> {
        let item = ChecklistItem::empty();
        let item_id = item.id.clone();
        let changed = self.edit_checklist(id, "add_checklist_item", |items| {
            let at = after
                .and_then(|after| items.iter().position(|it| it.id == after))
                .map(|ix| ix + 1)
                .unwrap_or(items.len());
            let mut next = items.to_vec();
            next.insert(at, item);
            Some(next)
        });
        changed.then_some(item_id)
    }

    /// Removes an item; the only remaining item is cleared instead.
    pub fn remove_checklist_item(&mut self, id: &BlockId, item_id: &str) -> bool {
        self.edit_checklist(id, "remove_checklist_item", |items| {
            let ix = items.iter().position(|it| it.id == item_id)?;
            let mut next = items.to_vec();
            if next.len() == 1 {
                next[0].text.clear();
                next[0].checked = false;
            } else {
                next.remove(ix);
            }
            Some(next)
        })
    }

    pub fn toggle_checklist_item(&mut self, id: &BlockId, item_id: &str) -> bool {
        self.edit_checklist(id, "toggle_checklist_item", |items| {
            let ix = items.iter().position(|it| it.id == item_id)?;
            let mut next = items.to_vec();
            next[ix].checked = !next[ix].checked;
            Some(next)
        })
    }

    pub fn set_checklist_item_text(&mut self, id: &BlockId, item_id: &str, text: &str) -> bool {
        self.edit_checklist(id, "set_checklist_item_text", |items| {
            let ix = items.iter().position(|it| it.id == item_id)?;
            let mut next = items.to_vec();
            next[ix].text = text.to_string();
            Some(next)
        })
    }

    pub fn set_title(&mut self, title: &str) -> bool {
        self.edit_document("set_title", |doc| {
            if doc.title == title {
                return false;
            }
            doc.title = title.to_string();
            true
        })
    }

    pub fn set_banner(&mut self, banner: Option<&str>) -> bool {
        self.edit_document("set_banner", |doc| {
            let next = banner.map(str::to_string);
            if doc.banner == next {
                return false;
            }
            doc.banner = next;
            true
        })
    }

    pub fn set_background_color(&mut self, color: Option<&str>) -> bool {
        self.edit_document("set_background_color", |doc| {
            let next = color.map(str::to_string);
            if doc.background_color == next {
                return false;
            }
            doc.background_color = next;
            true
        })
    }

    pub fn set_icon(&mut self, icon: Option<&str>) -> bool {
        self.edit_document("set_icon", |doc| {
            let next = icon.map(str::to_string);
            if doc.icon == next {
                return false;
            }
            doc.icon = next;
            true
        })
    }

    pub fn set_font_style(&mut self, font_style: FontStyle) -> bool {
        self.edit_document("set_font_style", |doc| {
            if doc.preferences.font_style == font_style {
                return false;
            }
            doc.preferences.font_style = font_style;
            true
        })
    }

    pub fn set_full_width(&mut self, full_width: bool) -> bool {
        self.edit_document("set_full_width", |doc| {
            if doc.preferences.full_width == full_width {
                return false;
            }
            doc.preferences.full_width = full_width;
            true
        })
    }

    fn insert_relative(
        &mut self,
        anchor: &BlockId,
        block: Block,
        offset: usize,
        op: &str,
    ) -> Option<BlockId> {
        if self.refuse_locked(op) {
            return None;
        }
        let ix = self.position_of(anchor)?;
        let id = block.id.clone();
        let mut blocks = self.doc.blocks.clone();
        blocks.insert(ix + offset, block);
        self.commit(blocks);
        debug!(op, anchor = %anchor, block = %id, "block inserted");
        Some(id)
    }

    fn swap(&mut self, a: usize, b: usize) -> bool {
        let mut blocks = self.doc.blocks.clone();
        blocks.swap(a, b);
        self.commit(blocks);
        true
    }

    fn replace_content(
        &mut self,
        id: &BlockId,
        op: &str,
        f: impl FnOnce(&BlockContent) -> Option<BlockContent>,
    ) -> bool {
        if self.refuse_locked(op) {
            return false;
        }
        let Some(ix) = self.position_of(id) else {
            return false;
        };
        let Some(next) = f(&self.doc.blocks[ix].content) else {
            return false;
        };
        if next == self.doc.blocks[ix].content {
            return false;
        }
        let mut blocks = self.doc.blocks.clone();
        blocks[ix].content = next;
        self.commit(blocks);
        true
    }

    fn edit_table(
        &mut self,
        id: &BlockId,
        op: &str,
        f: impl FnOnce(&TableContent) -> Option<TableContent>,
    ) -> bool {
        self.replace_content(id, op, |content| match content {
            BlockContent::Table(table) => f(table).map(BlockContent::Table),
            _ => None,
        })
    }

    fn edit_checklist(
        &mut self,
        id: &BlockId,
        op: &str,
        f: impl FnOnce(&[ChecklistItem]) -> Option<Vec<ChecklistItem>>,
    ) -> bool {
        self.replace_content(id, op, |content| match content {
            BlockContent::Checklist { items } => {
                f(items).map(|items| BlockContent::Checklist { items })
            }
            _ => None,
        })
    }

    fn edit_document(&mut self, op: &str, f: impl FnOnce(&mut Document) -> bool) -> bool {
        if self.refuse_locked(op) {
            return false;
        }
        let mut next = self.doc.clone();
        if !f(&mut next) {
            return false;
        }
        self.doc = next;
        self.touch();
        true
    }

    fn commit(&mut self, blocks: Vector<Block>) {
        self.doc.blocks = blocks;
        self.touch();
    }

    fn touch(&mut self) {
        self.doc.updated_at = Utc::now();
        self.revision += 1;
    }

    fn refuse_locked(&self, op: &str) -> bool {
        if self.is_locked() {
            warn!(op, "document is locked; ignoring edit");
            return true;
        }
        false
    }
}

fn dedupe_ids(blocks: Vector<Block>) -> Vector<Block> {
    let mut seen = HashSet::new();
    blocks
        .into_iter()
        .map(|mut block| {
            if !seen.insert(block.id.clone()) {
                let fresh = BlockId::generate();
                warn!(duplicate = %block.id, replacement = %fresh, "duplicate block id on load");
                block.id = fresh;
                seen.insert(block.id.clone());
            }
            block
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::BlockStore;
    use crate::blocks::{Block, BlockContent, BlockId, BlockType, ContentPatch};
    use crate::document::Document;
    use crate::table::TableContent;
    use std::collections::HashSet;

    fn paragraph(id: &str, text: &str) -> Block {
        Block {
            id: BlockId::from(id),
            content: BlockContent::Paragraph { text: text.into() },
        }
    }

    fn store(ids: &[&str]) -> BlockStore {
        let doc = Document::new("doc", "Job 42").with_blocks(ids.iter().map(|id| paragraph(id, id)));
        BlockStore::new(doc)
    }

    fn order(store: &BlockStore) -> Vec<String> {
        store
            .blocks()
            .iter()
            .map(|block| block.id.as_str().to_string())
            .collect()
    }

    fn table_of(store: &BlockStore, id: &BlockId) -> TableContent {
        match &store.block(id).expect("block").content {
            BlockContent::Table(table) => table.clone(),
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn insert_after_places_default_paragraph() {
        let mut store = store(&["a", "b"]);
        let id = store
            .insert_after(&BlockId::from("a"), BlockType::Paragraph)
            .expect("insert");
        assert_eq!(store.position_of(&id), Some(1));
        assert_eq!(
            store.block(&id).expect("block").content,
            BlockContent::Paragraph { text: String::new() }
        );
    }

    #[test]
    fn insert_before_places_block_ahead_of_anchor() {
        let mut store = store(&["a", "b"]);
        let id = store
            .insert_before(&BlockId::from("a"), BlockType::Divider)
            .expect("insert");
        assert_eq!(store.position_of(&id), Some(0));
    }

    #[test]
    fn insert_with_unknown_anchor_is_noop() {
        let mut store = store(&["a"]);
        assert!(store
            .insert_after(&BlockId::from("missing"), BlockType::Paragraph)
            .is_none());
        assert_eq!(store.len(), 1);
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn delete_active_block_clears_focus() {
        let mut store = store(&["a", "b"]);
        let a = BlockId::from("a");
        store.set_active(Some(&a));
        assert!(store.delete(&a));
        assert_eq!(order(&store), vec!["b"]);
        assert!(store.active().is_none());
    }

    #[test]
    fn delete_unknown_is_noop() {
        let mut store = store(&["a"]);
        assert!(!store.delete(&BlockId::from("zzz")));
        assert_eq!(order(&store), vec!["a"]);
    }

    #[test]
    fn duplicate_inserts_copy_after_source() {
        let mut store = store(&["a", "b"]);
        let copy = store.duplicate(&BlockId::from("a")).expect("duplicate");
        assert_eq!(store.position_of(&copy), Some(1));
        assert_ne!(copy, BlockId::from("a"));
        assert_eq!(
            store.block(&copy).expect("copy").content,
            BlockContent::Paragraph { text: "a".into() }
        );
    }

    #[test]
    fn move_up_and_down_swap_neighbors() {
        let mut store = store(&["a", "b", "c"]);
        assert!(store.move_up(&BlockId::from("c")));
        assert_eq!(order(&store), vec!["a", "c", "b"]);
        assert!(store.move_down(&BlockId::from("a")));
        assert_eq!(order(&store), vec!["c", "a", "b"]);
    }

    #[test]
    fn moves_at_boundaries_are_noops() {
        let mut store = store(&["a", "b"]);
        assert!(!store.move_up(&BlockId::from("a")));
        assert!(!store.move_down(&BlockId::from("b")));
        assert_eq!(order(&store), vec!["a", "b"]);
    }

    #[test]
    fn reorder_drops_block_at_target_position() {
        let mut store = store(&["a", "b", "c"]);
        assert!(store.reorder(&BlockId::from("c"), &BlockId::from("a")));
        assert_eq!(order(&store), vec!["c", "a", "b"]);

        assert!(store.reorder(&BlockId::from("c"), &BlockId::from("b")));
        assert_eq!(order(&store), vec!["a", "b", "c"]);
    }

    #[test]
    fn reorder_rejects_equal_or_missing_ids() {
        let mut store = store(&["a", "b"]);
        assert!(!store.reorder(&BlockId::from("a"), &BlockId::from("a")));
        assert!(!store.reorder(&BlockId::from("a"), &BlockId::from("x")));
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn update_merges_without_changing_type() {
        let mut store = store(&["a"]);
        let a = BlockId::from("a");
        assert!(store.update(&a, &ContentPatch::text("Replace filter")));
        assert_eq!(
            store.block(&a).expect("a").content,
            BlockContent::Paragraph {
                text: "Replace filter".into()
            }
        );
        assert!(!store.update(&a, &ContentPatch::text("Replace filter")));
    }

    #[test]
    fn convert_type_resets_content() {
        let mut store = store(&["a"]);
        let a = BlockId::from("a");
        assert!(store.convert_type(&a, BlockType::Table));
        assert_eq!(
            store.block(&a).expect("a").content,
            BlockContent::Table(TableContent::default())
        );
        assert!(store.convert_type(&a, BlockType::Paragraph));
        assert_eq!(
            store.block(&a).expect("a").content,
            BlockContent::Paragraph { text: String::new() }
        );
    }

    #[test]
    fn table_operations_preserve_cell_invariant() {
        let mut store = store(&["t"]);
        let t = BlockId::from("t");
        store.convert_type(&t, BlockType::Table);
        assert!(store.set_cell(&t, 1, 1, "pump"));
        assert!(store.add_row(&t));
        assert!(store.add_column(&t));
        let table = table_of(&store, &t);
        assert_eq!((table.rows, table.cols), (3, 3));
        assert_eq!(table.cell(1, 1), Some("pump"));
        assert!(table.is_consistent());

        assert!(store.delete_row(&t, 0));
        assert!(store.delete_column(&t, 0));
        let table = table_of(&store, &t);
        assert_eq!(table.cell(0, 0), Some("pump"));
        assert!(table.is_consistent());
    }

    #[test]
    fn deleting_last_row_or_column_is_rejected() {
        let mut store = store(&["t"]);
        let t = BlockId::from("t");
        store.convert_type(&t, BlockType::Table);
        assert!(store.delete_row(&t, 0));
        let before = store.snapshot();
        assert!(!store.delete_row(&t, 0));
        assert!(before.same_content(store.document()));

        assert!(store.delete_column(&t, 0));
        let before = store.snapshot();
        assert!(!store.delete_column(&t, 0));
        assert!(before.same_content(store.document()));

        let table = table_of(&store, &t);
        assert_eq!((table.rows, table.cols), (1, 1));
    }

    #[test]
    fn table_ops_on_non_table_are_noops() {
        let mut store = store(&["a"]);
        assert!(!store.add_row(&BlockId::from("a")));
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn checklist_item_lifecycle() {
        let mut store = store(&["c"]);
        let c = BlockId::from("c");
        store.convert_type(&c, BlockType::Checklist);
        let first = match &store.block(&c).expect("c").content {
            BlockContent::Checklist { items } => items[0].id.clone(),
            other => panic!("unexpected {other:?}"),
        };
        let second = store
            .add_checklist_item(&c, Some(&first))
            .expect("add item");
        assert!(store.set_checklist_item_text(&c, &second, "Check valve"));
        assert!(store.toggle_checklist_item(&c, &second));
        assert!(store.remove_checklist_item(&c, &first));
        match &store.block(&c).expect("c").content {
            BlockContent::Checklist { items } => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].text, "Check valve");
                assert!(items[0].checked);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(store.remove_checklist_item(&c, &second));
        match &store.block(&c).expect("c").content {
            BlockContent::Checklist { items } => {
                assert_eq!(items.len(), 1);
                assert!(items[0].text.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn locked_store_ignores_mutations() {
        let mut store = store(&["a", "b"]);
        store.set_locked(true);
        let before = store.snapshot();
        let a = BlockId::from("a");
        assert!(!store.delete(&a));
        assert!(!store.move_up(&BlockId::from("b")));
        assert!(store.duplicate(&a).is_none());
        assert!(!store.reorder(&BlockId::from("b"), &a));
        assert!(!store.set_title("changed"));
        assert!(before.same_content(store.document()));
        assert!(store.set_locked(false));
        assert!(store.delete(&a));
    }

    #[test]
    fn snapshots_are_unaffected_by_later_edits() {
        let mut store = store(&["a"]);
        let snapshot = store.snapshot();
        store.add_block(BlockType::Divider);
        assert_eq!(snapshot.blocks.len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn duplicate_ids_are_reassigned_on_load() {
        let doc = Document::new("doc", "t").with_blocks([paragraph("a", "1"), paragraph("a", "2")]);
        let store = BlockStore::new(doc);
        let ids: HashSet<_> = store.block_ids().into_iter().collect();
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn identifiers_stay_unique_across_operation_log() {
        let mut store = store(&["a"]);
        let mut expected: HashSet<BlockId> = [BlockId::from("a")].into_iter().collect();
        for step in 0..40usize {
            let ids = store.block_ids();
            let pick = ids[step % ids.len()].clone();
            match step % 6 {
                0 => {
                    let id = store.insert_after(&pick, BlockType::Paragraph).expect("insert");
                    assert!(expected.insert(id));
                }
                1 => {
                    let id = store.insert_before(&pick, BlockType::Heading).expect("insert");
                    assert!(expected.insert(id));
                }
                2 if ids.len() > 2 => {
                    assert!(store.delete(&pick));
                    expected.remove(&pick);
                }
                3 => {
                    store.move_up(&pick);
                }
                4 => {
                    store.move_down(&pick);
                }
                _ => {
                    let target = ids[(step * 7) % ids.len()].clone();
                    store.reorder(&pick, &target);
                }
            }
            let present: Vec<BlockId> = store.block_ids();
            let unique: HashSet<BlockId> = present.iter().cloned().collect();
            assert_eq!(present.len(), unique.len());
            assert_eq!(unique, expected);
        }
    }
}
