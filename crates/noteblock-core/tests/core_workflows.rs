use noteblock_core::app::open_storage;
use noteblock_core::autosave::SaveState;
use noteblock_core::blocks::{Block, BlockContent, BlockId, BlockType};
use noteblock_core::config::EditorConfig;
use noteblock_core::error::{BackendError, EditorError};
use noteblock_core::keymap::Shortcut;
use noteblock_core::notifications::NotificationKind;
use noteblock_core::render::{BlockInput, BlockView};
use noteblock_core::slash::{PaletteKey, PalettePosition, SlashOutcome};
use noteblock_core::{Collaborators, Document, EditorSession};
use std::time::Duration;
use tempfile::{tempdir, TempDir};

struct Fixture {
    _dir: TempDir,
    config: EditorConfig,
    collaborators: Collaborators,
    db: std::sync::Arc<noteblock_core::db::Database>,
}

fn fixture() -> Fixture {
    let dir = tempdir().expect("tempdir");
    let config = EditorConfig {
        database_path: Some(dir.path().join("notes.db")),
        asset_dir: Some(dir.path().join("files")),
        ..EditorConfig::default()
    };
    let storage = open_storage(&config).expect("storage");
    let collaborators = Collaborators {
        backend: storage.db.clone(),
        uploader: storage.assets.clone(),
    };
    Fixture {
        _dir: dir,
        config,
        collaborators,
        db: storage.db,
    }
}

fn seed(fixture: &Fixture, blocks: Vec<Block>) -> Document {
    let doc = Document::new("wo-311", "Water heater").with_blocks(blocks);
    fixture.db.upsert_document(&doc).expect("seed");
    doc
}

fn paragraph(id: &str, text: &str) -> Block {
    Block {
        id: BlockId::from(id),
        content: BlockContent::Paragraph { text: text.into() },
    }
}

async fn open(fixture: &Fixture) -> EditorSession {
    EditorSession::open("wo-311", fixture.collaborators.clone(), &fixture.config, |_| {})
        .await
        .expect("open session")
}

fn reload(fixture: &Fixture) -> Document {
    fixture
        .db
        .get_document("wo-311")
        .expect("get")
        .expect("exists")
}

#[tokio::test]
async fn open_missing_document_is_an_error() {
    let fixture = fixture();
    let result =
        EditorSession::open("nope", fixture.collaborators.clone(), &fixture.config, |_| {}).await;
    assert!(matches!(
        result,
        Err(EditorError::Backend(BackendError::NotFound(_)))
    ));
}

#[tokio::test]
async fn checklist_note_round_trips_through_sqlite() {
    let fixture = fixture();
    seed(&fixture, vec![paragraph("intro", "")]);
    let mut session = open(&fixture).await;
    let intro = BlockId::from("intro");

    assert!(session.on_text_input(&intro, "Parts needed/", 13, PalettePosition::default()));
    let outcome = session.select_slash_command("checklist").expect("slash commit");
    let checklist = outcome.focused().clone();
    assert!(matches!(outcome, SlashOutcome::Inserted { .. }));

    let item = match &session.store().block(&checklist).expect("checklist").content {
        BlockContent::Checklist { items } => items[0].id.clone(),
        other => panic!("unexpected {other:?}"),
    };
    session.on_block_input(
        &checklist,
        BlockInput::ItemText {
            item_id: item.clone(),
            text: "Anode rod".into(),
        },
    );
    session.on_block_input(&checklist, BlockInput::ToggleItem(item));
    session.close().await;

    let saved = reload(&fixture);
    assert_eq!(saved.blocks.len(), 2);
    assert_eq!(saved.blocks[0].content.text(), Some("Parts needed"));
    match &saved.blocks[1].content {
        BlockContent::Checklist { items } => {
            assert_eq!(items[0].text, "Anode rod");
            assert!(items[0].checked);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn empty_block_converts_in_place_via_palette_keys() {
    let fixture = fixture();
    seed(&fixture, vec![paragraph("a", "")]);
    let mut session = open(&fixture).await;
    let a = BlockId::from("a");

    session.on_text_input(&a, "/tab", 4, PalettePosition { x: 4.0, y: 40.0 });
    let view = session.palette().expect("palette");
    assert_eq!(view.entries[0].id, "table");
    let outcome = session.on_palette_key(PaletteKey::Enter).expect("commit");
    assert_eq!(outcome, SlashOutcome::Converted { block: a.clone() });
    assert_eq!(session.store().active(), Some(&a));

    session.on_block_input(
        &a,
        BlockInput::Cell {
            row: 0,
            col: 1,
            text: "Reading".into(),
        },
    );
    session.on_block_input(&a, BlockInput::AddRow);
    let rendered = session.render();
    match &rendered.blocks[0].view {
        BlockView::Table { rows, header_row } => {
            assert!(*header_row);
            assert_eq!(rows.len(), 3);
            assert_eq!(rows[0][1], "Reading");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn drag_and_shortcuts_reorder_and_persist() {
    let fixture = fixture();
    seed(
        &fixture,
        vec![paragraph("a", "A"), paragraph("b", "B"), paragraph("c", "C")],
    );
    let mut session = open(&fixture).await;

    assert!(session.begin_drag(&BlockId::from("c")));
    assert!(session.end_drag(Some(&BlockId::from("a"))));

    session.focus(Some(&BlockId::from("b")));
    assert!(session.handle_shortcut(Shortcut::Duplicate));
    session.on_visibility_change(true).await;

    let saved = reload(&fixture);
    let texts: Vec<_> = saved
        .blocks
        .iter()
        .map(|block| block.content.text().unwrap_or_default().to_string())
        .collect();
    assert_eq!(texts, vec!["C", "A", "B", "B"]);
    assert_eq!(session.save_state(), SaveState::Saved);
}

#[tokio::test]
async fn image_upload_stores_asset_and_saves() {
    let fixture = fixture();
    seed(
        &fixture,
        vec![Block {
            id: BlockId::from("photo"),
            content: BlockContent::ImageUpload,
        }],
    );
    let mut session = open(&fixture).await;

    let id = session
        .upload_image(&BlockId::from("photo"), "tank.png", "image/png", b"\x89PNG")
        .await
        .expect("uploaded");

    let saved = reload(&fixture);
    assert_eq!(saved.blocks[0].id, id);
    let BlockContent::Image(image) = &saved.blocks[0].content else {
        panic!("expected image block");
    };
    assert!(image.url.starts_with("asset://"));
}

#[tokio::test]
async fn rejected_upload_keeps_placeholder_and_notifies() {
    let fixture = fixture();
    seed(
        &fixture,
        vec![Block {
            id: BlockId::from("photo"),
            content: BlockContent::ImageUpload,
        }],
    );
    let mut session = open(&fixture).await;

    let placed = session
        .upload_image(&BlockId::from("photo"), "notes.pdf", "application/pdf", b"%PDF")
        .await;
    assert!(placed.is_none());
    assert_eq!(
        session.store().block(&BlockId::from("photo")).expect("photo").block_type(),
        BlockType::ImageUpload
    );
    let items = session.notifications().items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].kind, NotificationKind::UploadFailed);
}

#[tokio::test]
async fn locked_document_survives_reopen_read_only() {
    let fixture = fixture();
    seed(&fixture, vec![paragraph("a", "keep")]);
    let mut session = open(&fixture).await;
    assert!(session.handle_chord("cmd+shift+l"));
    session.close().await;

    let mut session = open(&fixture).await;
    assert!(session.document().is_locked());
    session.focus(Some(&BlockId::from("a")));
    assert!(!session.handle_shortcut(Shortcut::Delete));
    assert!(!session.on_block_input(&BlockId::from("a"), BlockInput::Text("lost".into())));
    assert!(session.render().blocks.iter().all(|block| !block.editable));
    session.close().await;
    assert_eq!(reload(&fixture).blocks[0].content.text(), Some("keep"));
}

#[tokio::test(start_paused = true)]
async fn debounced_title_edits_write_once() {
    let fixture = fixture();
    seed(&fixture, vec![]);
    let mut session = open(&fixture).await;

    session.set_title("Water heater - leak");
    tokio::time::sleep(Duration::from_millis(200)).await;
    session.set_title("Water heater - leak fixed");
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(reload(&fixture).title, "Water heater");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(reload(&fixture).title, "Water heater - leak fixed");
}
