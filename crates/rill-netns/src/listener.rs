//! A listener that outlives its namespace.

use std::io;
use std::net::{SocketAddr, TcpListener as StdTcpListener, TcpStream as StdTcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::supervisor::{EnterFn, NsOperator, NsSupervisor, SupervisorOptions};
use crate::watch::MountWatcher;

/// Creates the listener socket. Runs inside the namespace each time the
/// namespace (re)appears.
pub type ListenerFactory = Box<dyn FnMut() -> io::Result<StdTcpListener> + Send>;

const CONN_BACKLOG: usize = 16;
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(20);

struct AcceptPump {
    stop: Arc<AtomicBool>,
    thread: thread::JoinHandle<()>,
}

/// Supervisor operator that owns the in-namespace listener socket and an
/// accept pump feeding the connection channel.
struct ListenerOperator {
    factory: ListenerFactory,
    conns: mpsc::Sender<(StdTcpStream, SocketAddr)>,
    pump: Option<AcceptPump>,
}

impl NsOperator for ListenerOperator {
    fn operation(&mut self) -> io::Result<()> {
        let listener = (self.factory)()?;
        // Nonblocking so the pump can observe its stop flag between
        // accepts.
        listener.set_nonblocking(true)?;
        let stop = Arc::new(AtomicBool::new(false));
        let thread = thread::Builder::new().name("ns-accept".into()).spawn({
            let stop = stop.clone();
            let conns = self.conns.clone();
            move || accept_loop(listener, stop, conns)
        })?;
        self.pump = Some(AcceptPump { stop, thread });
        Ok(())
    }

    fn operation_success(&mut self) {
        debug!("namespace listener up");
    }

    fn teardown(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.stop.store(true, Ordering::SeqCst);
            let _ = pump.thread.join();
        }
    }
}

fn accept_loop(
    listener: StdTcpListener,
    stop: Arc<AtomicBool>,
    conns: mpsc::Sender<(StdTcpStream, SocketAddr)>,
) {
    while !stop.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, addr)) => {
                // Hand the caller a conventional blocking socket no
                // matter what the accept socket inherited.
                let _ = stream.set_nonblocking(false);
                if conns.blocking_send((stream, addr)).is_err() {
                    return;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(err) => {
                warn!(%err, "accept failed");
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
        }
    }
    // The listener drops here, releasing the in-namespace socket.
}

/// From the caller's side, a listener that is always valid:
/// [`SteadyListener::accept`] waits across namespace teardown and
/// recreation, and only fails once the listener is closed.
pub struct SteadyListener {
    supervisor: Option<NsSupervisor>,
    conns: mpsc::Receiver<(StdTcpStream, SocketAddr)>,
}

impl SteadyListener {
    /// Binds inside namespace `ns_name`, recreating the socket with
    /// `factory` every time the namespace reappears.
    pub fn bind(
        ns_name: impl Into<String>,
        factory: impl FnMut() -> io::Result<StdTcpListener> + Send + 'static,
    ) -> io::Result<SteadyListener> {
        let (conns_tx, conns_rx) = mpsc::channel(CONN_BACKLOG);
        let operator = ListenerOperator {
            factory: Box::new(factory),
            conns: conns_tx,
            pump: None,
        };
        let supervisor = NsSupervisor::new(ns_name, operator)?;
        Ok(SteadyListener {
            supervisor: Some(supervisor),
            conns: conns_rx,
        })
    }

    /// Injection seam: caller-supplied watcher, mount table, and
    /// namespace entry hook.
    pub fn bind_with(
        options: SupervisorOptions,
        factory: impl FnMut() -> io::Result<StdTcpListener> + Send + 'static,
        watcher: impl MountWatcher,
        enter: EnterFn,
    ) -> io::Result<SteadyListener> {
        let (conns_tx, conns_rx) = mpsc::channel(CONN_BACKLOG);
        let operator = ListenerOperator {
            factory: Box::new(factory),
            conns: conns_tx,
            pump: None,
        };
        let supervisor = NsSupervisor::with_watcher(options, operator, watcher, enter)?;
        Ok(SteadyListener {
            supervisor: Some(supervisor),
            conns: conns_rx,
        })
    }

    /// The next inbound connection. Blocks while the namespace is down;
    /// fails only after [`SteadyListener::close`].
    pub async fn accept(&mut self) -> io::Result<(StdTcpStream, SocketAddr)> {
        self.conns
            .recv()
            .await
            .ok_or_else(|| io::Error::other("listener closed"))
    }

    /// `true` while the namespace is mounted and the socket exists.
    pub fn is_up(&self) -> bool {
        self.supervisor.as_ref().is_some_and(NsSupervisor::is_mounted)
    }

    /// Tears down the socket and stops watching. Subsequent `accept`
    /// calls drain any already-accepted connections, then fail.
    pub fn close(&mut self) {
        if let Some(supervisor) = self.supervisor.take() {
            supervisor.close();
        }
    }
}

impl Drop for SteadyListener {
    fn drop(&mut self) {
        self.close();
    }
}
