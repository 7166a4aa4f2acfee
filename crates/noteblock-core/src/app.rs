use crate::assets::AssetStore;
use crate::config::{ConfigStore, EditorConfig};
use crate::db::Database;
use crate::error::EditorResult;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub const DATABASE_FILE: &str = "noteblock.db";
const BACKUP_PREFIX: &str = "noteblock-";
const BACKUPS_KEPT: usize = 3;

/// Storage opened from an [`EditorConfig`]: the document database and the
/// asset store sharing it.
pub struct Storage {
    pub db: Arc<Database>,
    pub assets: Arc<AssetStore>,
    pub db_path: PathBuf,
}

/// Opens (creating when needed) the database and asset directory named by
/// `config`, falling back to the platform data directory.
pub fn open_storage(config: &EditorConfig) -> EditorResult<Storage> {
    let db_path = match &config.database_path {
        Some(path) => path.clone(),
        None => ConfigStore::default_data_dir()?.join(DATABASE_FILE),
    };
    let asset_root = match &config.asset_dir {
        Some(dir) => dir.clone(),
        None => db_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db = Arc::new(open_database(&db_path)?);
    let assets = Arc::new(AssetStore::new(Arc::clone(&db), &asset_root));
    info!(db = %db_path.display(), assets = %asset_root.display(), "storage opened");
    Ok(Storage {
        db,
        assets,
        db_path,
    })
}

pub fn open_database(db_path: &Path) -> EditorResult<Database> {
    let db = Database::open(db_path)?;
    backup_before_migration(db_path, &db)?;
    db.run_migrations()?;
    Ok(db)
}

pub fn backup_before_migration(db_path: &Path, db: &Database) -> EditorResult<Option<PathBuf>> {
    backup_before_migration_at(db_path, db, Utc::now())
}

/// Copies an existing database aside before a schema upgrade touches it.
/// Fresh databases are not backed up.
pub fn backup_before_migration_at(
    db_path: &Path,
    db: &Database,
    now: DateTime<Utc>,
) -> EditorResult<Option<PathBuf>> {
    let current_version = db.current_schema_version()?;
    let latest_version = Database::latest_migration_version();
    if current_version == 0 || current_version >= latest_version {
        return Ok(None);
    }

    let backup_dir = db_path
        .parent()
        .map(|dir| dir.join("backups"))
        .unwrap_or_else(|| PathBuf::from("backups"));
    std::fs::create_dir_all(&backup_dir)?;
    let stamp = now.format("%Y%m%d%H%M%S").to_string();
    let backup_path = backup_dir.join(format!("{BACKUP_PREFIX}{stamp}.db"));
    std::fs::copy(db_path, &backup_path)?;
    rotate_backups(&backup_dir, BACKUPS_KEPT)?;
    info!(backup = %backup_path.display(), from = current_version, to = latest_version, "database backed up before migration");
    Ok(Some(backup_path))
}

pub fn rotate_backups(backup_dir: &Path, keep: usize) -> EditorResult<()> {
    let mut backups: Vec<PathBuf> = std::fs::read_dir(backup_dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let path = entry.path();
            let name = path.file_name()?.to_string_lossy();
            if name.starts_with(BACKUP_PREFIX) && name.ends_with(".db") {
                Some(path)
            } else {
                None
            }
        })
        .collect();

    backups.sort_by(|a, b| {
        let a_name = a.file_name().map(|name| name.to_string_lossy());
        let b_name = b.file_name().map(|name| name.to_string_lossy());
        a_name.cmp(&b_name)
    });

    if backups.len() <= keep {
        return Ok(());
    }

    for path in backups.iter().take(backups.len() - keep) {
        std::fs::remove_file(path)?;
    }

    Ok(())
}
