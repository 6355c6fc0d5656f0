//! Entering a named network namespace.
//!
//! The calling thread switches into the target namespace, runs the
//! operation, and switches back. Callers run this on a thread they own
//! outright (the supervisor uses its own event thread): a Rust thread is
//! an OS thread, so nothing else can be scheduled onto it while it sits
//! in the foreign namespace.

use std::io;
use std::path::Path;

/// Runs `op` with the current thread inside the network namespace
/// mounted at `ns_path`.
///
/// Failing to switch back afterwards panics: the thread would otherwise
/// keep running in the wrong namespace, and every subsequent socket it
/// opened would land there.
pub fn run_in_namespace(
    ns_path: &Path,
    op: &mut dyn FnMut() -> io::Result<()>,
) -> io::Result<()> {
    platform::run_in_namespace_impl(ns_path, op)
}

#[cfg(target_os = "linux")]
mod platform {
    use std::fs::File;
    use std::io;
    use std::os::fd::AsRawFd;
    use std::path::Path;

    /// The calling thread's own namespace handle; per-thread so the
    /// restore is exact even if another thread switched concurrently.
    const SELF_NS_PATH: &str = "/proc/thread-self/ns/net";

    fn setns(ns: &File) -> io::Result<()> {
        let rc = unsafe { libc::setns(ns.as_raw_fd(), libc::CLONE_NEWNET) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    pub fn run_in_namespace_impl(
        ns_path: &Path,
        op: &mut dyn FnMut() -> io::Result<()>,
    ) -> io::Result<()> {
        let original = File::open(SELF_NS_PATH)?;
        let target = File::open(ns_path)?;
        setns(&target)?;
        let result = op();
        if let Err(err) = setns(&original) {
            panic!("invariant violated: failed to restore network namespace: {err}");
        }
        result
    }
}

#[cfg(not(target_os = "linux"))]
mod platform {
    use std::io;
    use std::path::Path;

    pub fn run_in_namespace_impl(
        _ns_path: &Path,
        _op: &mut dyn FnMut() -> io::Result<()>,
    ) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "network namespaces are not supported on this platform",
        ))
    }
}
