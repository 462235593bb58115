use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use storage::{Catalog, SqliteRepository, Storage};
use tracing::info;

/// Open the catalog and outcome store.
///
/// With `--db`, SQLite holds both; a `--catalog` given alongside is imported
/// first. With only `--catalog`, everything stays in memory and outcomes are
/// lost on exit.
pub async fn open(db_url: Option<&str>, catalog: Option<&Path>) -> Result<Storage> {
    match (db_url, catalog) {
        (Some(raw), catalog) => {
            let db_url = normalize_sqlite_url(raw);
            prepare_sqlite_file(&db_url)?;
            let repo = SqliteRepository::connect(&db_url)
                .await
                .with_context(|| format!("opening {db_url}"))?;
            repo.migrate().await?;

            if let Some(path) = catalog {
                let imported = repo.import_catalog(&load(path)?).await?;
                info!(
                    modules = imported.modules,
                    lessons = imported.lessons,
                    questions = imported.questions,
                    "catalog imported"
                );
            }
            Ok(Storage::from_sqlite(repo.with_fallback_questions(true)))
        }
        (None, Some(path)) => {
            let repo = load(path)?
                .into_repository()?
                .with_fallback_questions(true)
                .with_shuffle(true);
            Ok(Storage::from_in_memory(repo))
        }
        (None, None) => bail!("pass --catalog <file.json> or --db <sqlite_url>"),
    }
}

fn load(path: &Path) -> Result<Catalog> {
    Catalog::load(path).with_context(|| format!("loading catalog {}", path.display()))
}

fn normalize_sqlite_url(raw: &str) -> String {
    let raw = raw.trim();
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw.to_owned();
    }

    let path = Path::new(raw.strip_prefix("sqlite:").unwrap_or(raw));
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<()> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let Some(path) = db_url.strip_prefix("sqlite://") else {
        bail!("invalid --db value: {db_url}");
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        bail!("invalid --db value: {db_url}");
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}
