//! Replay activation boundary (§5 "Replay activation").
//!
//! The orchestrator is not started by `main` — this crate has no `main`,
//! it is linked into an arbitrary target-server process. It starts exactly
//! once, lazily, at the first of three observable events. The actual event
//! *interception* (hooking `listen`/`epoll_wait`/`accept` in the host
//! process) is out of scope here; these three entry points model the
//! boundary contract an interception layer calls into.

use std::net::SocketAddr;
use std::os::unix::io::RawFd;
use std::sync::Once;

use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use socket2::SockAddr;

use crate::config::{init_logging, ReplayConfig};
use crate::fatal;
use crate::orchestrator;

static ACTIVATE: Once = Once::new();

/// A successful `listen` on a stream socket.
pub fn on_listen(listener_fd: RawFd) {
    activate_once(listener_fd);
}

/// An `epoll_wait` on a set registered with a socket bound in `on_listen`.
pub fn on_epoll_registered(listener_fd: RawFd) {
    activate_once(listener_fd);
}

/// The first `accept`/`accept4` on the listener socket.
pub fn on_accept(listener_fd: RawFd) {
    activate_once(listener_fd);
}

fn activate_once(listener_fd: RawFd) {
    ACTIVATE.call_once(|| {
        let config = ReplayConfig::from_env();
        init_logging(&config);
        suppress_sigpipe();

        let target_addr = match listener_local_addr(listener_fd) {
            Ok(addr) => addr,
            Err(e) => fatal::fatal_os_error("getsockname", config.exit_immediate, e),
        };

        tracing::info!(%target_addr, "replay orchestrator activated");
        orchestrator::run(target_addr, config);
    });
}

fn suppress_sigpipe() {
    let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
    // Safety: SIG_IGN is a well-known handler constant; installing it
    // process-wide has no aliasing or lifetime concerns.
    let result = unsafe { signal::sigaction(Signal::SIGPIPE, &ignore) };
    if let Err(errno) = result {
        tracing::warn!(%errno, "failed to install SIGPIPE ignore, relying on MSG_NOSIGNAL only");
    }
}

fn listener_local_addr(fd: RawFd) -> std::io::Result<SocketAddr> {
    let sockaddr = unsafe {
        // Safety: `storage`/`len` are valid out-parameters supplied by
        // socket2's helper; `fd` is the listener fd the caller asserts is
        // open and bound.
        SockAddr::try_init(|storage, len| {
            if libc::getsockname(fd, storage as *mut _, len) == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        })
    }
    .map(|(_, addr)| addr)?;

    sockaddr
        .as_socket()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "unsupported address family"))
}
