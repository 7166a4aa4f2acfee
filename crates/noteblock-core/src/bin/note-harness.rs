use anyhow::{anyhow, bail, Context, Result};
use noteblock_core::app::open_storage;
use noteblock_core::blocks::{Block, BlockId, BlockType};
use noteblock_core::config::ConfigStore;
use noteblock_core::render::BlockInput;
use noteblock_core::slash::PalettePosition;
use noteblock_core::{Collaborators, Document, EditorSession};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: note-harness [--config <path>] [--db <path>] [--doc <id>] [--title <title>] [--cmd <command>]...

Commands address blocks by their current position (0-based):
  title <text>              set the document title
  add <type>                append a block (heading, paragraph, checklist, table, ...)
  text <ix> <text>          replace the text of a heading or paragraph
  slash <ix> <text> <id>    type <text> into block <ix>, then pick palette command <id>
  convert <ix> <type>       convert a block to another type
  move <ix> <target-ix>     drag block <ix> onto block <target-ix>
  delete <ix>               delete a block
  cell <ix> <row> <col> <text>  set a table cell
  image <ix> <file>         upload an image file for block <ix>
  lock | unlock             toggle the document lock";

#[derive(Debug)]
struct HarnessArgs {
    config_path: Option<PathBuf>,
    db_path: Option<PathBuf>,
    doc_id: String,
    title: String,
    commands: Vec<HarnessCommand>,
}

#[derive(Debug, PartialEq)]
enum HarnessCommand {
    Title(String),
    Add(BlockType),
    Text(usize, String),
    Slash(usize, String, String),
    Convert(usize, BlockType),
    Move(usize, usize),
    Delete(usize),
    Cell(usize, usize, usize, String),
    Image(usize, PathBuf),
    Lock(bool),
}

fn parse_index(value: Option<&str>, what: &str) -> Result<usize, String> {
    let value = value.ok_or_else(|| format!("Missing {what}"))?;
    value
        .parse()
        .map_err(|_| format!("Invalid {what}: {value}"))
}

fn parse_type(value: Option<&str>) -> Result<BlockType, String> {
    let value = value.ok_or_else(|| "Missing block type".to_string())?;
    BlockType::parse(value).ok_or_else(|| format!("Unknown block type: {value}"))
}

fn parse_command(raw: &str) -> Result<HarnessCommand, String> {
    let raw = raw.trim();
    let (op, rest) = raw.split_once(' ').unwrap_or((raw, ""));
    let rest = rest.trim();
    let mut words = rest.split_whitespace();
    let command = match op {
        "title" => HarnessCommand::Title(rest.to_string()),
        "add" => HarnessCommand::Add(parse_type(words.next())?),
        "text" => {
            let (ix, text) = rest.split_once(' ').unwrap_or((rest, ""));
            HarnessCommand::Text(parse_index(Some(ix), "block index")?, text.to_string())
        }
        "slash" => {
            let ix = parse_index(words.next(), "block index")?;
            let text = words.next().ok_or_else(|| "Missing slash text".to_string())?;
            let id = words.next().ok_or_else(|| "Missing command id".to_string())?;
            HarnessCommand::Slash(ix, text.to_string(), id.to_string())
        }
        "convert" => HarnessCommand::Convert(
            parse_index(words.next(), "block index")?,
            parse_type(words.next())?,
        ),
        "move" => HarnessCommand::Move(
            parse_index(words.next(), "block index")?,
            parse_index(words.next(), "target index")?,
        ),
        "delete" => HarnessCommand::Delete(parse_index(words.next(), "block index")?),
        "cell" => {
            let ix = parse_index(words.next(), "block index")?;
            let row = parse_index(words.next(), "row")?;
            let col = parse_index(words.next(), "column")?;
            HarnessCommand::Cell(ix, row, col, words.collect::<Vec<_>>().join(" "))
        }
        "image" => {
            let ix = parse_index(words.next(), "block index")?;
            let path = words.next().ok_or_else(|| "Missing image path".to_string())?;
            HarnessCommand::Image(ix, PathBuf::from(path))
        }
        "lock" => HarnessCommand::Lock(true),
        "unlock" => HarnessCommand::Lock(false),
        _ => return Err(format!("Unknown command: {raw}")),
    };
    Ok(command)
}

fn parse_args(args: &[String]) -> Result<HarnessArgs, String> {
    let mut config_path: Option<PathBuf> = None;
    let mut db_path: Option<PathBuf> = None;
    let mut doc_id: Option<String> = None;
    let mut title: Option<String> = None;
    let mut commands = Vec::new();

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let value = iter.next().ok_or_else(|| "Missing --config value".to_string())?;
                config_path = Some(PathBuf::from(value));
            }
            "--db" => {
                let value = iter.next().ok_or_else(|| "Missing --db value".to_string())?;
                db_path = Some(PathBuf::from(value));
            }
            "--doc" => {
                let value = iter.next().ok_or_else(|| "Missing --doc value".to_string())?;
                doc_id = Some(value.to_string());
            }
            "--title" => {
                let value = iter.next().ok_or_else(|| "Missing --title value".to_string())?;
                title = Some(value.to_string());
            }
            "--cmd" => {
                let value = iter.next().ok_or_else(|| "Missing --cmd value".to_string())?;
                commands.push(parse_command(value)?);
            }
            "--help" | "-h" => {
                return Err(String::new());
            }
            _ => return Err(format!("Unknown argument: {arg}")),
        }
    }

    Ok(HarnessArgs {
        config_path,
        db_path,
        doc_id: doc_id.unwrap_or_else(|| "scratch".to_string()),
        title: title.unwrap_or_else(|| "Untitled".to_string()),
        commands,
    })
}

fn block_at(session: &EditorSession, ix: usize) -> Result<BlockId> {
    session
        .store()
        .blocks()
        .get(ix)
        .map(|block| block.id.clone())
        .ok_or_else(|| anyhow!("no block at position {ix}"))
}

fn mime_for(path: &std::path::Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

async fn apply(session: &mut EditorSession, command: &HarnessCommand) -> Result<()> {
    match command {
        HarnessCommand::Title(title) => {
            session.set_title(title);
        }
        HarnessCommand::Add(block_type) => {
            session
                .edit(|store| store.add_block(*block_type))
                .ok_or_else(|| anyhow!("document is locked"))?;
        }
        HarnessCommand::Text(ix, text) => {
            let id = block_at(session, *ix)?;
            session.on_block_input(&id, BlockInput::Text(text.clone()));
        }
        HarnessCommand::Slash(ix, text, command_id) => {
            let id = block_at(session, *ix)?;
            if !session.on_text_input(&id, text, text.len(), PalettePosition::default()) {
                bail!("no slash trigger in {text:?}");
            }
            session
                .select_slash_command(command_id)
                .ok_or_else(|| anyhow!("slash command {command_id} was not applied"))?;
        }
        HarnessCommand::Convert(ix, block_type) => {
            let id = block_at(session, *ix)?;
            session.edit(|store| store.convert_type(&id, *block_type));
        }
        HarnessCommand::Move(ix, target_ix) => {
            let id = block_at(session, *ix)?;
            let target = block_at(session, *target_ix)?;
            if session.begin_drag(&id) {
                session.end_drag(Some(&target));
            }
        }
        HarnessCommand::Delete(ix) => {
            let id = block_at(session, *ix)?;
            session.edit(|store| store.delete(&id));
        }
        HarnessCommand::Cell(ix, row, col, text) => {
            let id = block_at(session, *ix)?;
            session.on_block_input(
                &id,
                BlockInput::Cell {
                    row: *row,
                    col: *col,
                    text: text.clone(),
                },
            );
        }
        HarnessCommand::Image(ix, path) => {
            let id = block_at(session, *ix)?;
            let bytes = std::fs::read(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            session
                .upload_image(&id, &filename, mime_for(path), &bytes)
                .await
                .ok_or_else(|| anyhow!("upload of {} failed", path.display()))?;
        }
        HarnessCommand::Lock(locked) => {
            session.edit(|store| store.set_locked(*locked));
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = std::env::args().collect::<Vec<_>>();
    let parsed = match parse_args(&args) {
        Ok(value) => value,
        Err(message) => {
            if !message.is_empty() {
                eprintln!("{message}");
            }
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    };

    let config_store = match &parsed.config_path {
        Some(path) => ConfigStore::new(path.clone()),
        None => ConfigStore::default_store()?,
    };
    let mut config = config_store.load()?;
    if let Some(db_path) = parsed.db_path.clone() {
        config.database_path = Some(db_path);
    }

    let storage = open_storage(&config)?;
    let document = match storage.db.get_document(&parsed.doc_id)? {
        Some(document) => document,
        None => {
            let document = Document::new(parsed.doc_id.clone(), parsed.title.clone())
                .with_blocks([Block::new(BlockType::Paragraph)]);
            storage.db.upsert_document(&document)?;
            info!(document = %document.id, "created document");
            document
        }
    };

    let collaborators = Collaborators {
        backend: storage.db.clone(),
        uploader: storage.assets.clone(),
    };
    let mut session = EditorSession::mount(document, collaborators, &config, |doc| {
        info!(document = %doc.id, blocks = doc.blocks.len(), "session closed");
    });

    for command in &parsed.commands {
        apply(&mut session, command)
            .await
            .with_context(|| format!("command {command:?} failed"))?;
    }

    let document = session.close().await;
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}
