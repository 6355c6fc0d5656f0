//! The namespace mount/unmount state machine.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::mount;
use crate::watch::{MountEvent, MountWatcher};

/// How a [`NsSupervisor`] acts on namespace lifecycle transitions.
///
/// `operation` runs with the calling thread inside the namespace;
/// `operation_success` and `teardown` run outside it. All three are
/// invoked under the supervisor's mutex and must not block for long.
pub trait NsOperator: Send + 'static {
    /// Per-namespace setup, e.g. creating a listener socket. An error
    /// leaves the supervisor watching; it retries on the next
    /// filesystem event.
    fn operation(&mut self) -> io::Result<()>;

    /// Runs after `operation` succeeded.
    fn operation_success(&mut self);

    /// Undoes `operation`. Runs when the mount disappears, and when the
    /// supervisor closes while mounted.
    fn teardown(&mut self);
}

/// Hook used to run the operation inside the namespace. Production code
/// uses [`crate::enter::run_in_namespace`]; tests substitute a
/// passthrough.
pub type EnterFn = fn(&Path, &mut dyn FnMut() -> io::Result<()>) -> io::Result<()>;

#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    /// Name of the network namespace, i.e. the mount file name.
    pub ns_name: String,
    /// Mount table to consult; `/proc/mounts` in production.
    pub mounts_path: PathBuf,
    /// Directory the namespace mounts under. `None` discovers it from
    /// the mount table.
    pub netns_dir: Option<PathBuf>,
}

impl SupervisorOptions {
    pub fn new(ns_name: impl Into<String>) -> SupervisorOptions {
        SupervisorOptions {
            ns_name: ns_name.into(),
            mounts_path: PathBuf::from(mount::MOUNTS_PATH),
            netns_dir: None,
        }
    }
}

struct Shared {
    operator: Box<dyn NsOperator>,
    mounted: bool,
}

/// Watches one named network namespace and drives an [`NsOperator`]
/// through its mount/unmount lifecycle. Closing (or dropping) the
/// supervisor stops the watcher and tears down a mounted namespace's
/// state exactly once.
pub struct NsSupervisor {
    shared: Arc<Mutex<Shared>>,
    closed: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
    _watcher: Option<Box<dyn MountWatcher>>,
}

impl NsSupervisor {
    /// Watches `ns_name` under the netns directory found in the OS mount
    /// table, entering the namespace around each operation.
    #[cfg(target_os = "linux")]
    pub fn new(ns_name: impl Into<String>, operator: impl NsOperator) -> io::Result<NsSupervisor> {
        NsSupervisor::with_watcher(
            SupervisorOptions::new(ns_name),
            operator,
            crate::watch::NotifyWatcher::new(),
            crate::enter::run_in_namespace,
        )
    }

    /// Platforms without network namespaces degenerate: the operation
    /// runs once, immediately, in the caller's namespace, and teardown
    /// runs at close. No watcher is created.
    #[cfg(not(target_os = "linux"))]
    pub fn new(ns_name: impl Into<String>, mut operator: impl NsOperator) -> io::Result<NsSupervisor> {
        let ns_name = ns_name.into();
        operator.operation()?;
        operator.operation_success();
        debug!(ns = %ns_name, "no namespace support; operating in the current namespace");
        Ok(NsSupervisor {
            shared: Arc::new(Mutex::new(Shared {
                operator: Box::new(operator),
                mounted: true,
            })),
            closed: Arc::new(AtomicBool::new(false)),
            thread: None,
            _watcher: None,
        })
    }

    /// Fully injected constructor: watcher, mount table location, and
    /// namespace entry hook are all supplied by the caller.
    pub fn with_watcher(
        options: SupervisorOptions,
        operator: impl NsOperator,
        mut watcher: impl MountWatcher,
        enter: EnterFn,
    ) -> io::Result<NsSupervisor> {
        let dir = match &options.netns_dir {
            Some(dir) => dir.clone(),
            None => {
                let entries = mount::read_mounts(&options.mounts_path)?;
                mount::netns_dir(&entries).ok_or_else(|| {
                    io::Error::other("no network namespace directory in the mount table")
                })?
            }
        };

        let (events_tx, events_rx) = mpsc::channel();
        watcher.watch(&dir, events_tx)?;

        let shared = Arc::new(Mutex::new(Shared {
            operator: Box::new(operator),
            mounted: false,
        }));
        let closed = Arc::new(AtomicBool::new(false));

        // The namespace may already be mounted; poll once before any
        // event arrives.
        sync_state(&shared, &options.mounts_path, &dir, &options.ns_name, enter);

        let thread = thread::Builder::new()
            .name(format!("netns-{}", options.ns_name))
            .spawn({
                let shared = shared.clone();
                let closed = closed.clone();
                let mounts_path = options.mounts_path.clone();
                let ns_name = options.ns_name.clone();
                move || event_loop(events_rx, shared, closed, mounts_path, dir, ns_name, enter)
            })?;

        Ok(NsSupervisor {
            shared,
            closed,
            thread: Some(thread),
            _watcher: Some(Box::new(watcher)),
        })
    }

    /// `true` while the namespace is mounted and the operation has
    /// succeeded.
    pub fn is_mounted(&self) -> bool {
        self.shared.lock().mounted
    }

    /// Stops the watcher and, if mounted, runs the teardown.
    pub fn close(self) {
        // Drop does the work; `close` exists to make shutdown explicit
        // at call sites.
    }
}

impl Drop for NsSupervisor {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        let mut shared = self.shared.lock();
        if shared.mounted {
            shared.operator.teardown();
            shared.mounted = false;
        }
    }
}

fn event_loop(
    events: mpsc::Receiver<MountEvent>,
    shared: Arc<Mutex<Shared>>,
    closed: Arc<AtomicBool>,
    mounts_path: PathBuf,
    dir: PathBuf,
    ns_name: String,
    enter: EnterFn,
) {
    let target = dir.join(&ns_name);
    loop {
        if closed.load(Ordering::SeqCst) {
            break;
        }
        match events.recv_timeout(Duration::from_millis(100)) {
            Ok(MountEvent::Created(path)) | Ok(MountEvent::Removed(path)) => {
                if path == target {
                    sync_state(&shared, &mounts_path, &dir, &ns_name, enter);
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                debug!(ns = %ns_name, "watcher channel closed");
                break;
            }
        }
    }
    let mut shared = shared.lock();
    if shared.mounted {
        shared.operator.teardown();
        shared.mounted = false;
    }
}

/// Reconciles operator state with the mount table: runs the operation
/// (inside the namespace) on mount, the teardown on unmount.
fn sync_state(
    shared: &Mutex<Shared>,
    mounts_path: &Path,
    dir: &Path,
    ns_name: &str,
    enter: EnterFn,
) {
    let present = match mount::read_mounts(mounts_path) {
        Ok(entries) => mount::has_ns_mount(&entries, dir, ns_name),
        Err(err) => {
            warn!(ns = %ns_name, %err, "cannot read the mount table");
            return;
        }
    };

    let mut shared = shared.lock();
    if present && !shared.mounted {
        let ns_path = dir.join(ns_name);
        let result = {
            let operator = &mut shared.operator;
            enter(&ns_path, &mut || operator.operation())
        };
        match result {
            Ok(()) => {
                shared.operator.operation_success();
                shared.mounted = true;
                info!(ns = %ns_name, "namespace mounted");
            }
            Err(err) => {
                // Still watching; the next event retries.
                warn!(ns = %ns_name, %err, "namespace operation failed");
            }
        }
    } else if !present && shared.mounted {
        shared.operator.teardown();
        shared.mounted = false;
        info!(ns = %ns_name, "namespace unmounted");
    }
}
