//! Watch mode: re-index documents as they are created or modified.

use super::IngestError;
use super::service::IngestService;
use notify::event::{CreateKind, ModifyKind};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::future::Future;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Whether a file-system event should trigger re-indexing of its paths.
pub fn should_reindex(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(CreateKind::Any | CreateKind::File)
            | EventKind::Modify(ModifyKind::Any | ModifyKind::Data(_) | ModifyKind::Name(_))
    )
}

/// Watch the document root until Ctrl-C, indexing every created or modified document.
pub async fn watch(service: &IngestService) -> Result<(), IngestError> {
    let root = service.settings().root.clone();
    let (tx, rx) = mpsc::unbounded_channel::<PathBuf>();

    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| match res {
            Ok(event) if should_reindex(&event.kind) => {
                for path in event.paths {
                    let _ = tx.send(path);
                }
            }
            Ok(_) => {}
            Err(error) => tracing::warn!(error = %error, "File watcher error"),
        },
        Config::default(),
    )?;
    watcher.watch(&root, RecursiveMode::Recursive)?;
    tracing::info!(root = %root.display(), "Watch mode on");

    process_events(service, rx, tokio::signal::ctrl_c()).await;
    drop(watcher);
    Ok(())
}

/// Index paths from `rx` until the channel closes or `stop` resolves.
///
/// `stop` is polled while a file is being indexed too, so a slow extraction never delays
/// shutdown.
async fn process_events<S>(
    service: &IngestService,
    mut rx: mpsc::UnboundedReceiver<PathBuf>,
    stop: S,
) where
    S: Future,
{
    tokio::pin!(stop);
    loop {
        let path = tokio::select! {
            received = rx.recv() => match received {
                Some(path) => path,
                None => break,
            },
            _ = &mut stop => break,
        };
        tokio::select! {
            result = service.index_path(&path) => {
                if let Some(Err(error)) = result {
                    tracing::debug!(path = %path.display(), error = %error, "Watched file not indexed");
                }
            }
            _ = &mut stop => break,
        }
    }
    tracing::info!("Stopping watch mode");
}
