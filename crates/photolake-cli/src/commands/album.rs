//! Album commands - create, sync, remove and inspect albums
//!
//! Every subcommand provisions the workspace state first (local file,
//! then the lake, then a fresh workspace), mutates it through the engine
//! and persists it before publishing gallery output.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use photolake_core::domain::{Album, State};
use photolake_sync::scanner::directory_photos;
use photolake_sync::{compute_sync_plan, RunReport, SyncPlan};
use tracing::info;

use crate::context::AppContext;
use crate::gallery::album_url;
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Album subcommands
#[derive(Debug, Subcommand)]
pub enum AlbumCommand {
    /// List all albums
    List,
    /// Create a new, empty album
    Create {
        /// Album name
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Make an album mirror the photos of a folder
    Sync {
        /// Album name or id
        album: String,
        /// Folder holding the photos (not searched recursively)
        folder: PathBuf,
        /// Rename the album
        #[arg(long)]
        title: Option<String>,
        /// Replace the album description
        #[arg(long)]
        description: Option<String>,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Remove an album and every photo no other album uses
    Remove {
        /// Album name or id
        album: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show the photos of an album
    Expand {
        /// Album name or id
        album: String,
    },
    /// Download the originals of an album into a new directory
    Download {
        /// Album name or id
        album: String,
        /// Destination directory; must not exist yet
        destination: PathBuf,
    },
}

impl AlbumCommand {
    pub async fn execute(&self, format: OutputFormat, app: &AppContext) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));
        let formatter = formatter.as_ref();
        match self {
            AlbumCommand::List => execute_list(app, formatter).await,
            AlbumCommand::Create { name, description } => {
                execute_create(app, formatter, name, description.as_deref()).await
            }
            AlbumCommand::Sync {
                album,
                folder,
                title,
                description,
                yes,
            } => {
                execute_sync(
                    app,
                    formatter,
                    album,
                    folder,
                    title.clone(),
                    description.clone(),
                    *yes,
                )
                .await
            }
            AlbumCommand::Remove { album, yes } => {
                execute_remove(app, formatter, album, *yes).await
            }
            AlbumCommand::Expand { album } => execute_expand(app, formatter, album).await,
            AlbumCommand::Download { album, destination } => {
                execute_download(app, formatter, album, destination).await
            }
        }
    }
}

fn find_album(state: &State, key: &str) -> Result<Album> {
    match state.get_album(key) {
        Some(album) => Ok(album.clone()),
        None => bail!("Album '{}' does not exist", key),
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Prints every failed job, then escalates if the run was not clean
fn report_failures(formatter: &dyn OutputFormatter, report: &RunReport) -> Result<()> {
    for failure in &report.failures {
        formatter.error(&failure.to_string());
    }
    if report.skipped > 0 {
        formatter.warn(&format!(
            "{} job{} skipped after cancellation",
            report.skipped,
            plural(report.skipped)
        ));
    }
    report.ensure_success().map_err(Into::into)
}

fn report_json(report: &RunReport) -> serde_json::Value {
    serde_json::json!({
        "completed": report.completed,
        "failed": report.failures.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "skipped": report.skipped,
        "panicked": report.panicked,
    })
}

// ============================================================================
// list / create / expand
// ============================================================================

async fn execute_list(app: &AppContext, formatter: &dyn OutputFormatter) -> Result<()> {
    let state = app.provision().await?;
    let base = app.storage.lake_base_url();

    let albums: Vec<serde_json::Value> = state
        .albums
        .iter()
        .map(|album| {
            serde_json::json!({
                "id": album.id.to_string(),
                "name": album.name,
                "photos": album.photos.len(),
                "url": album_url(&base, album),
            })
        })
        .collect();
    formatter.print_json(&serde_json::json!({ "albums": albums }));

    if state.albums.is_empty() {
        formatter.info("There are no albums to list.");
        return Ok(());
    }
    formatter.success("All albums:");
    for (i, album) in state.albums.iter().enumerate() {
        formatter.info(&format!(
            "{}. {}  {}  [{} photo{}]  {}",
            i + 1,
            album.id,
            album.name,
            album.photos.len(),
            plural(album.photos.len()),
            album_url(&base, album)
        ));
    }
    Ok(())
}

async fn execute_create(
    app: &AppContext,
    formatter: &dyn OutputFormatter,
    name: &str,
    description: Option<&str>,
) -> Result<()> {
    let state = app.provision().await?;
    if state.get_album(name).is_some() {
        bail!("Album '{}' already exists", name);
    }

    let mut album = Album::new(name);
    if let Some(description) = description {
        album = album.with_description(description);
    }
    let state = state.add_album(album.clone());
    app.save(&state).await?;
    app.renderer
        .render(&state, &album)
        .await
        .context("Failed to publish gallery")?;

    info!(album = %album.id, "Album created");
    formatter.print_json(&serde_json::json!({
        "id": album.id.to_string(),
        "name": album.name,
    }));
    formatter.success(&format!("{} has been created", album.name));
    Ok(())
}

async fn execute_expand(
    app: &AppContext,
    formatter: &dyn OutputFormatter,
    key: &str,
) -> Result<()> {
    let state = app.provision().await?;
    let album = find_album(&state, key)?;

    let photos: Vec<serde_json::Value> = state
        .album_photos(&album)
        .map(|photo| {
            serde_json::json!({
                "name": photo.name,
                "hash": photo.hash.to_string(),
                "url": photo.url,
            })
        })
        .collect();
    formatter.print_json(&serde_json::json!({
        "id": album.id.to_string(),
        "name": album.name,
        "photos": photos,
    }));

    let count = album.photos.len();
    formatter.success(&format!("{} ({count} photo{})", album.name, plural(count)));
    for photo in state.album_photos(&album) {
        formatter.info(&format!(
            "{}  {}  {}",
            photo.name,
            photo.hash,
            photo.url.as_deref().unwrap_or("-")
        ));
    }
    for (_, hash) in state
        .dangling_references()
        .into_iter()
        .filter(|(id, _)| *id == album.id)
    {
        formatter.warn(&format!("{} is listed but has no photo record", hash));
    }
    Ok(())
}

// ============================================================================
// sync
// ============================================================================

/// Prints the photos a sync would add and remove
fn print_plan(formatter: &dyn OutputFormatter, state: &State, plan: &SyncPlan) {
    let added: Vec<String> = plan
        .uploads()
        .chain(plan.attachments.iter())
        .map(|photo| format!("+ {} [{}]", photo.hash, photo.name))
        .collect();
    let removed: Vec<String> = plan
        .deletions()
        .map(|photo| format!("- {} [{}]", photo.hash, photo.name))
        .chain(plan.detachments.iter().map(|hash| {
            let name = state.get_photo(hash).map_or("-", |photo| photo.name.as_str());
            format!("- {} [{}]", hash, name)
        }))
        .collect();

    formatter.print_json(&serde_json::json!({
        "add": added,
        "remove": removed,
    }));

    if added.is_empty() {
        formatter.info("Nothing to add.");
    }
    for line in &added {
        formatter.info(line);
    }
    if removed.is_empty() {
        formatter.info("Nothing to remove.");
    }
    for line in &removed {
        formatter.info(line);
    }
}

async fn execute_sync(
    app: &AppContext,
    formatter: &dyn OutputFormatter,
    key: &str,
    folder: &Path,
    title: Option<String>,
    description: Option<String>,
    yes: bool,
) -> Result<()> {
    let state = app.provision().await?;
    let album_id = find_album(&state, key)?.id;

    let state = if title.is_some() || description.is_some() {
        state.update_album_details(&album_id, title, description)
    } else {
        state
    };
    let album = find_album(&state, &album_id.to_string())?;

    let files = directory_photos(folder)
        .await
        .with_context(|| format!("Failed to scan {}", folder.display()))?;
    let plan = compute_sync_plan(&files, &state, &album)
        .await
        .context("Failed to plan sync")?;

    print_plan(formatter, &state, &plan);
    if !yes && !formatter.confirm(&format!("Sync {} ({})?", album.name, plan))? {
        formatter.warn("Sync cancelled, nothing was changed");
        return Ok(());
    }

    let (state, report) = app.executor.run_sync(state, &album_id, plan).await?;
    app.save(&state).await?;
    if let Some(album) = state.album(&album_id) {
        app.renderer
            .render(&state, album)
            .await
            .context("Failed to publish gallery")?;
    }

    formatter.print_json(&report_json(&report));
    report_failures(formatter, &report)?;
    formatter.success(&format!("{} has been synced", album.name));
    Ok(())
}

// ============================================================================
// remove / download
// ============================================================================

async fn execute_remove(
    app: &AppContext,
    formatter: &dyn OutputFormatter,
    key: &str,
    yes: bool,
) -> Result<()> {
    let state = app.provision().await?;
    let album = find_album(&state, key)?;

    let question = format!(
        "Remove {} and its {} photo{}?",
        album.name,
        album.photos.len(),
        plural(album.photos.len())
    );
    if !yes && !formatter.confirm(&question)? {
        formatter.warn("Removal cancelled, nothing was changed");
        return Ok(());
    }

    let removal = app.executor.remove_album(state, &album.id).await?;
    app.save(&removal.state).await?;
    if removal.album_removed() {
        app.renderer
            .remove_album(&removal.state, &album)
            .await
            .context("Failed to unpublish gallery")?;
    } else if let Some(kept) = removal.state.album(&album.id) {
        app.renderer
            .render(&removal.state, kept)
            .await
            .context("Failed to publish gallery")?;
    }

    formatter.print_json(&report_json(&removal.report));
    report_failures(formatter, &removal.report)?;
    removal.check()?;
    formatter.success(&format!("{} has been removed", album.name));
    Ok(())
}

async fn execute_download(
    app: &AppContext,
    formatter: &dyn OutputFormatter,
    key: &str,
    destination: &Path,
) -> Result<()> {
    let state = app.provision().await?;
    let album = find_album(&state, key)?;

    let report = app
        .executor
        .download_album(&state, &album.id, destination)
        .await?;

    formatter.print_json(&report_json(&report));
    report_failures(formatter, &report)?;
    formatter.success(&format!(
        "Downloaded {} photo{} to {}",
        report.completed,
        plural(report.completed),
        destination.display()
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_album_by_name_or_id() {
        let album = Album::new("Trip");
        let id = album.id;
        let state = State::new("photolake").add_album(album);

        assert_eq!(find_album(&state, "Trip").unwrap().id, id);
        assert_eq!(find_album(&state, &id.to_string()).unwrap().id, id);
        let err = find_album(&state, "Nope").unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn report_json_lists_failures() {
        let report = RunReport {
            completed: 2,
            skipped: 1,
            ..RunReport::default()
        };
        let json = report_json(&report);
        assert_eq!(json["completed"], 2);
        assert_eq!(json["skipped"], 1);
        assert_eq!(json["failed"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn plural_suffix() {
        assert_eq!(plural(1), "");
        assert_eq!(plural(0), "s");
        assert_eq!(plural(3), "s");
    }
}
