// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Filesystem watcher for a mounted secret directory.
//!
//! A Kubernetes secret update swaps the mounted content through a burst of events:
//! CREATE, CHMOD, RENAME, CREATE, REMOVE. The first CREATE only backs up the old
//! credential. The one that matters is the entry whose path contains the `..data`
//! marker, so only create events on a path containing the marker trigger a refresh.
//! Other mount mechanisms may need a different filter.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::BuildError;

pub type RefreshFn = Arc<dyn Fn(&Event) + Send + Sync>;

/// Watches one directory and calls a refresh callback on qualifying events.
///
/// The callback runs on the blocking thread pool, one call at a time.
///
/// The background task ends once the watcher is closed or dropped.
pub struct CredentialWatcher {
    dir: PathBuf,
    watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl CredentialWatcher {
    /// Starts watching `dir`. Must be called from within a Tokio runtime.
    pub fn spawn(dir: &Path, marker: &str, on_event: RefreshFn) -> Result<Self, BuildError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| BuildError::NoRuntime)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // the receiver only goes away once the watcher itself is dropped
            let _ = tx.send(res);
        })?;

        info!("starting watch credential, path: {}", dir.display());
        let task = runtime.spawn(watch_loop(rx, marker.to_string(), on_event));
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            watcher,
            task,
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stops watching and waits for the background task to finish.
    pub async fn close(self) {
        let Self { watcher, task, .. } = self;
        drop(watcher);
        if let Err(e) = task.await {
            debug!("credential watcher task ended abnormally: {e}");
        }
    }
}

impl std::fmt::Debug for CredentialWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialWatcher")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

async fn watch_loop(
    mut rx: UnboundedReceiver<notify::Result<Event>>,
    marker: String,
    on_event: RefreshFn,
) {
    while let Some(res) = rx.recv().await {
        match res {
            Ok(event) => {
                debug!("credential file event: {event:?}");
                if is_rotation_event(&event, &marker) {
                    // the refresh reads from disk, keep it off the async workers
                    let on_event = Arc::clone(&on_event);
                    let refresh = tokio::task::spawn_blocking(move || on_event(&event));
                    if let Err(e) = refresh.await {
                        error!("credential refresh task failed: {e}");
                    }
                }
            }
            Err(e) => error!("file watcher error: {e}"),
        }
    }
    debug!("credential watcher stopped");
}

/// Whether `event` announces a new entry whose path contains `marker`.
///
/// A rename into the directory counts as a create; `notify` reports it as a name change.
#[must_use]
pub fn is_rotation_event(event: &Event, marker: &str) -> bool {
    let created: &[PathBuf] = match event.kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            &event.paths
        }
        // paths are [from, to]
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.get(1..).unwrap_or_default()
        }
        _ => return false,
    };
    created
        .iter()
        .any(|path| path.to_string_lossy().contains(marker))
}
