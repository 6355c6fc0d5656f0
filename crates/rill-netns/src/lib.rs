//! Network-namespace-aware listeners.
//!
//! A named network namespace appears and disappears as a mount under the
//! system's netns directory. The [`NsSupervisor`] watches that mount,
//! enters the namespace to run an operator callback when it appears, and
//! tears the result down when it goes away, so sockets never leak across
//! namespace recreation. [`SteadyListener`] builds on it to present a
//! listener whose `accept` survives the namespace being torn down and
//! recreated underneath it.

pub mod enter;
pub mod listener;
pub mod mount;
pub mod supervisor;
pub mod tos;
pub mod watch;

pub use listener::SteadyListener;
pub use supervisor::{NsOperator, NsSupervisor, SupervisorOptions};
pub use watch::{FakeWatcher, MountEvent, MountWatcher, NotifyWatcher};
