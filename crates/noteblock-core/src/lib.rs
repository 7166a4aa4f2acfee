//! Block-based note editing core: an ordered block model with copy-on-write
//! snapshots, debounced persistence, drag reordering, a slash command
//! palette and the render/dispatch layer a UI shell binds to.

pub mod app;
pub mod assets;
pub mod autosave;
pub mod backend;
pub mod blocks;
pub mod config;
pub mod db;
pub mod document;
pub mod drag;
pub mod editor;
pub mod error;
pub mod keymap;
pub mod markup;
pub mod notifications;
pub mod render;
pub mod session;
pub mod slash;
pub mod table;

pub use blocks::{Block, BlockContent, BlockId, BlockType};
pub use document::Document;
pub use editor::BlockStore;
pub use error::{EditorError, EditorResult};
pub use session::{Collaborators, EditorSession};
