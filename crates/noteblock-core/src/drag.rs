use crate::blocks::BlockId;
use crate::editor::BlockStore;
use tracing::debug;

pub const DRAGGING_OPACITY: f32 = 0.5;

/// Pointer-drag state over a flat list of block ids.
///
/// Only the dragged id is tracked; the drop target arrives with the end of
/// the gesture and is handed to [`BlockStore::reorder`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DragReorder {
    dragging: Option<BlockId>,
}

impl DragReorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refused while the document is locked or for ids not in the document.
    pub fn start(&mut self, store: &BlockStore, id: &BlockId) -> bool {
        if store.is_locked() || store.block(id).is_none() {
            return false;
        }
        debug!(block = %id, "drag started");
        self.dragging = Some(id.clone());
        true
    }

    /// Finishes the gesture. Returns true when the sequence changed.
    pub fn end(&mut self, store: &mut BlockStore, drop_target: Option<&BlockId>) -> bool {
        let Some(source) = self.dragging.take() else {
            return false;
        };
        match drop_target {
            Some(target) if *target != source => store.reorder(&source, target),
            _ => {
                debug!(block = %source, "drag ended without a move");
                false
            }
        }
    }

    pub fn cancel(&mut self) {
        self.dragging = None;
    }

    pub fn dragging(&self) -> Option<&BlockId> {
        self.dragging.as_ref()
    }

    pub fn is_dragging(&self, id: &BlockId) -> bool {
        self.dragging.as_ref() == Some(id)
    }

    pub fn opacity(&self, id: &BlockId) -> f32 {
        if self.is_dragging(id) {
            DRAGGING_OPACITY
        } else {
            1.0
        }
    }

    /// Every block is a drop target; none while locked.
    pub fn drop_targets(&self, store: &BlockStore) -> Vec<BlockId> {
        if store.is_locked() {
            return Vec::new();
        }
        store.block_ids()
    }
}
