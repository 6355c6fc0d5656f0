//! Filesystem watching behind a narrow seam.
//!
//! The supervisor only needs create/remove events for one directory, so
//! the watcher surface is a single registration call feeding a channel.
//! Tests substitute [`FakeWatcher`] and inject synthetic events.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::Sender;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tracing::warn;

/// A create or remove observed under the watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountEvent {
    Created(PathBuf),
    Removed(PathBuf),
}

/// Starts delivering [`MountEvent`]s for `dir` into `events`. Dropping
/// the watcher stops delivery and eventually closes the channel.
pub trait MountWatcher: Send + 'static {
    fn watch(&mut self, dir: &Path, events: Sender<MountEvent>) -> io::Result<()>;
}

/// Production watcher over the platform's file notification facility.
#[derive(Default)]
pub struct NotifyWatcher {
    inner: Option<RecommendedWatcher>,
}

impl NotifyWatcher {
    pub fn new() -> NotifyWatcher {
        NotifyWatcher { inner: None }
    }
}

impl MountWatcher for NotifyWatcher {
    fn watch(&mut self, dir: &Path, events: Sender<MountEvent>) -> io::Result<()> {
        let mut watcher =
            notify::recommended_watcher(move |result: Result<notify::Event, notify::Error>| {
                let event = match result {
                    Ok(event) => event,
                    Err(err) => {
                        warn!(%err, "filesystem watch error");
                        return;
                    }
                };
                for path in event.paths {
                    let mapped = match event.kind {
                        notify::EventKind::Create(_) => MountEvent::Created(path),
                        notify::EventKind::Remove(_) => MountEvent::Removed(path),
                        _ => continue,
                    };
                    // The receiver going away just means the supervisor
                    // is shutting down.
                    if events.send(mapped).is_err() {
                        return;
                    }
                }
            })
            .map_err(io::Error::other)?;
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(io::Error::other)?;
        self.inner = Some(watcher);
        Ok(())
    }
}

/// Test watcher: hands the event sender back to the test, which injects
/// events itself.
#[derive(Clone, Default)]
pub struct FakeWatcher {
    sender: Arc<Mutex<Option<Sender<MountEvent>>>>,
}

impl FakeWatcher {
    pub fn new() -> FakeWatcher {
        FakeWatcher::default()
    }

    /// The sender registered by the supervisor, once watching started.
    pub fn sender(&self) -> Option<Sender<MountEvent>> {
        self.sender.lock().clone()
    }
}

impl MountWatcher for FakeWatcher {
    fn watch(&mut self, _dir: &Path, events: Sender<MountEvent>) -> io::Result<()> {
        *self.sender.lock() = Some(events);
        Ok(())
    }
}
