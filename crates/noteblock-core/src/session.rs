//! One open editing surface over a single document.
//!
//! The session is the only writer of its [`BlockStore`]. Every entry point
//! (text input, block widgets, shortcuts, slash commands, drag, uploads)
//! goes through [`EditorSession::edit`] or the same bookkeeping, which
//! re-arms autosave when the revision moved and drops palette or drag state
//! that no longer points at a live block.

use crate::autosave::{AutosaveCoordinator, SaveState};
use crate::backend::{AssetUploader, DocumentBackend};
use crate::blocks::{BlockContent, BlockId, BlockType, ContentPatch, ImageContent};
use crate::config::EditorConfig;
use crate::document::Document;
use crate::drag::DragReorder;
use crate::editor::BlockStore;
use crate::error::EditorResult;
use crate::keymap::{Keymap, Shortcut};
use crate::notifications::{NotificationItem, Notifications};
use crate::render::{dispatch_input, render_document, BlockInput, DocumentView};
use crate::slash::{
    command_by_id, PaletteAction, PaletteKey, PalettePosition, PaletteView, SlashCommand,
    SlashOutcome, SlashResolver,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub type CloseCallback = Box<dyn FnOnce(&Document) + Send>;
pub type CustomizeCallback = Box<dyn FnMut(&Document) + Send>;

#[derive(Clone)]
pub struct Collaborators {
    pub backend: Arc<dyn DocumentBackend>,
    pub uploader: Arc<dyn AssetUploader>,
}

pub struct EditorSession {
    store: BlockStore,
    autosave: AutosaveCoordinator,
    slash: SlashResolver,
    drag: DragReorder,
    keymap: Keymap,
    uploader: Arc<dyn AssetUploader>,
    notifications: Notifications,
    on_close: CloseCallback,
    on_customize: Option<CustomizeCallback>,
}

impl EditorSession {
    /// Mounts an editing surface over an already loaded document.
    pub fn mount(
        document: Document,
        collaborators: Collaborators,
        config: &EditorConfig,
        on_close: impl FnOnce(&Document) + Send + 'static,
    ) -> Self {
        let notifications = Notifications::new(config.max_notifications);
        let autosave = AutosaveCoordinator::new(
            collaborators.backend,
            config.quiet_period(),
            notifications.clone(),
        );
        autosave.mark_persisted(document.clone());
        let store = BlockStore::new(document.clone());
        if !store.document().same_content(&document) {
            autosave.schedule(store.snapshot());
        }
        info!(document = %document.id, blocks = store.len(), "editor mounted");

        Self {
            store,
            autosave,
            slash: SlashResolver::new(config.slash_trigger),
            drag: DragReorder::new(),
            keymap: Keymap::default(),
            uploader: collaborators.uploader,
            notifications,
            on_close: Box::new(on_close),
            on_customize: None,
        }
    }

    /// Fetches `id` from the backend and mounts it.
    pub async fn open(
        id: &str,
        collaborators: Collaborators,
        config: &EditorConfig,
        on_close: impl FnOnce(&Document) + Send + 'static,
    ) -> EditorResult<Self> {
        let document = collaborators.backend.fetch(id).await?;
        Ok(Self::mount(document, collaborators, config, on_close))
    }

    pub fn with_customize(mut self, on_customize: impl FnMut(&Document) + Send + 'static) -> Self {
        self.on_customize = Some(Box::new(on_customize));
        self
    }

    pub fn with_keymap(mut self, keymap: Keymap) -> Self {
        self.keymap = keymap;
        self
    }

    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    pub fn document(&self) -> &Document {
        self.store.document()
    }

    pub fn notifications(&self) -> &Notifications {
        &self.notifications
    }

    pub fn save_state(&self) -> SaveState {
        self.autosave.save_state()
    }

    pub fn is_saving(&self) -> bool {
        self.autosave.is_saving()
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.autosave.last_saved_at()
    }

    pub fn slash(&self) -> &SlashResolver {
        &self.slash
    }

    pub fn palette(&self) -> Option<PaletteView> {
        self.slash.palette()
    }

    pub fn render(&self) -> DocumentView {
        render_document(&self.store, &self.drag)
    }

    /// Runs `f` against the store and schedules autosave if it changed.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut BlockStore) -> R) -> R {
        let before = self.store.revision();
        let result = f(&mut self.store);
        self.after_edit(before);
        result
    }

    pub fn focus(&mut self, id: Option<&BlockId>) {
        if self.slash.anchor() != id {
            self.slash.close();
        }
        self.store.set_active(id);
    }

    pub fn set_title(&mut self, title: &str) -> bool {
        self.edit(|store| store.set_title(title))
    }

    /// Inline text edit of a heading or paragraph. Also drives the slash
    /// palette; returns whether it is open afterwards.
    pub fn on_text_input(
        &mut self,
        id: &BlockId,
        text: &str,
        caret: usize,
        position: PalettePosition,
    ) -> bool {
        self.edit(|store| dispatch_input(store, id, BlockInput::Text(text.to_string())));
        let is_text = self
            .store
            .block(id)
            .is_some_and(|block| block.block_type().is_text());
        if self.store.is_locked() || !is_text {
            self.slash.close();
            return false;
        }
        self.store.set_active(Some(id));
        self.slash.on_input(id, text, caret, position)
    }

    pub fn on_block_input(&mut self, id: &BlockId, input: BlockInput) -> bool {
        self.edit(|store| dispatch_input(store, id, input))
    }

    pub fn handle_chord(&mut self, chord: &str) -> bool {
        match self.keymap.resolve(chord) {
            Some(shortcut) => self.handle_shortcut(shortcut),
            None => false,
        }
    }

    /// Block shortcuts need an active block and an unlocked document; the
    /// lock toggle needs neither.
    pub fn handle_shortcut(&mut self, shortcut: Shortcut) -> bool {
        if shortcut.is_global() {
            return self.edit(|store| store.toggle_lock());
        }
        let Some(active) = self.store.active().cloned() else {
            debug!(?shortcut, "shortcut ignored without an active block");
            return false;
        };
        if self.store.is_locked() {
            return false;
        }
        self.edit(|store| {
            let focus = |store: &mut BlockStore, id: Option<BlockId>| match id {
                Some(id) => {
                    store.set_active(Some(&id));
                    true
                }
                None => false,
            };
            match shortcut {
                Shortcut::NewBlockBelow => {
                    let id = store.insert_after(&active, BlockType::Paragraph);
                    focus(store, id)
                }
                Shortcut::NewBlockAbove => {
                    let id = store.insert_before(&active, BlockType::Paragraph);
                    focus(store, id)
                }
                Shortcut::Duplicate => {
                    let id = store.duplicate(&active);
                    focus(store, id)
                }
                Shortcut::Delete => store.delete(&active),
                Shortcut::MoveUp => store.move_up(&active),
                Shortcut::MoveDown => store.move_down(&active),
                Shortcut::ToggleLock => store.toggle_lock(),
            }
        })
    }

    /// Feeds a navigation key to the open palette; Enter commits.
    pub fn on_palette_key(&mut self, key: PaletteKey) -> Option<SlashOutcome> {
        match self.slash.handle_key(key) {
            PaletteAction::Commit(command) => self.commit_slash(command),
            _ => None,
        }
    }

    /// Commits the palette command with `id`, whether or not it is in the
    /// filtered list.
    pub fn select_slash_command(&mut self, id: &str) -> Option<SlashOutcome> {
        let command = command_by_id(id)?;
        self.commit_slash(command)
    }

    fn commit_slash(&mut self, command: &SlashCommand) -> Option<SlashOutcome> {
        let before = self.store.revision();
        let outcome = self.slash.commit(&mut self.store, command);
        self.after_edit(before);
        outcome
    }

    pub fn begin_drag(&mut self, id: &BlockId) -> bool {
        self.slash.close();
        self.drag.start(&self.store, id)
    }

    pub fn end_drag(&mut self, drop_target: Option<&BlockId>) -> bool {
        let before = self.store.revision();
        let moved = self.drag.end(&mut self.store, drop_target);
        self.after_edit(before);
        moved
    }

    pub fn cancel_drag(&mut self) {
        self.drag.cancel();
    }

    /// Hidden pages flush pending changes right away.
    pub async fn on_visibility_change(&self, hidden: bool) {
        if hidden {
            debug!("page hidden; flushing autosave");
            self.autosave.flush().await;
        }
    }

    pub async fn flush(&self) {
        self.autosave.flush().await;
    }

    /// Uploads an image for `anchor`. An `imageUpload` placeholder turns into
    /// the image; any other anchor gets the image inserted after it. The new
    /// state is saved immediately. On failure the document is left as is and
    /// a notification is raised.
    pub async fn upload_image(
        &mut self,
        anchor: &BlockId,
        filename: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Option<BlockId> {
        if self.store.is_locked() || self.store.block(anchor).is_none() {
            return None;
        }
        let url = self.upload(filename, mime_type, bytes).await?;

        let replaces_placeholder = self
            .store
            .block(anchor)
            .is_some_and(|block| block.block_type() == BlockType::ImageUpload);
        let placed = self.edit(|store| {
            let id = if replaces_placeholder {
                store.convert_type(anchor, BlockType::Image);
                store.update(anchor, &ContentPatch::image(url, ""));
                Some(anchor.clone())
            } else {
                store.insert_content_after(
                    anchor,
                    BlockContent::Image(ImageContent {
                        url,
                        caption: String::new(),
                    }),
                )
            };
            if let Some(id) = &id {
                store.set_active(Some(id));
            }
            id
        });
        self.autosave.flush().await;
        placed
    }

    pub async fn upload_banner(&mut self, filename: &str, mime_type: &str, bytes: &[u8]) -> bool {
        if self.store.is_locked() {
            return false;
        }
        let Some(url) = self.upload(filename, mime_type, bytes).await else {
            return false;
        };
        let changed = self.edit(|store| store.set_banner(Some(&url)));
        self.autosave.flush().await;
        changed
    }

    async fn upload(&self, filename: &str, mime_type: &str, bytes: &[u8]) -> Option<String> {
        match self.uploader.upload_image(filename, mime_type, bytes).await {
            Ok(url) => Some(url),
            Err(err) => {
                warn!(%filename, error = %err, "image upload failed");
                self.notifications
                    .push(NotificationItem::upload_failed(err.to_string()));
                None
            }
        }
    }

    /// Hands the current document to the customize callback, if any.
    pub fn customize(&mut self) -> bool {
        match self.on_customize.as_mut() {
            Some(on_customize) => {
                on_customize(self.store.document());
                true
            }
            None => false,
        }
    }

    /// Flushes pending changes, then reports the final document to the
    /// close callback.
    pub async fn close(mut self) -> Document {
        self.slash.close();
        self.drag.cancel();
        self.autosave.flush().await;
        let document = self.store.snapshot();
        info!(document = %document.id, state = ?self.autosave.save_state(), "editor closed");
        (self.on_close)(&document);
        document
    }

    fn after_edit(&mut self, before: u64) {
        self.slash.sync_with(&self.store);
        if self.store.is_locked() {
            self.slash.close();
            self.drag.cancel();
        }
        if let Some(dragging) = self.drag.dragging() {
            if self.store.block(dragging).is_none() {
                self.drag.cancel();
            }
        }
        if self.store.revision() != before {
            self.autosave.schedule(self.store.snapshot());
        }
    }
}
