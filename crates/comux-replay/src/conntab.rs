//! Connection table (C4) — the single serialization point workers use to
//! open or reuse the TCP connection backing one logical `conn_id`.
//!
//! Deliberately a plain `Mutex<HashMap<..>>`, not the `DashMap` the teacher
//! reaches for everywhere else (`summit_services::trust::TrustRegistry`,
//! `summit_services::session::SessionTable`): the ordering guarantees
//! workers rely on depend on *one* mutex serializing every connection
//! decision, not a shard-per-bucket lock.

use std::collections::HashMap;
use std::net::{SocketAddr, TcpStream};
use std::sync::Mutex;

use crate::fatal;

/// Suggested minimum capacity per §4.3; the table itself is unbounded, the
/// manifest format's own `MAX_NUM_CONNS` is what actually caps usage.
pub const MIN_CAPACITY: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnStatus {
    Dead,
    Alive,
    ClosedRemote,
}

struct Entry {
    status: ConnStatus,
    socket: Option<TcpStream>,
}

impl Default for Entry {
    fn default() -> Self {
        Self {
            status: ConnStatus::Dead,
            socket: None,
        }
    }
}

/// Result of `get_or_connect`.
pub enum GetOrConnect {
    /// A socket handle the caller owns and may send/recv on independently
    /// of the table (a `try_clone` of the tracked connection).
    Socket(TcpStream),
    /// The connection is known closed by the remote end; abandon this chunk.
    Skip,
}

pub struct ConnTable {
    target_addr: SocketAddr,
    entries: Mutex<HashMap<u32, Entry>>,
    exit_immediate: bool,
}

impl ConnTable {
    pub fn new(target_addr: SocketAddr, exit_immediate: bool) -> Self {
        Self {
            target_addr,
            entries: Mutex::new(HashMap::with_capacity(MIN_CAPACITY)),
            exit_immediate,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u32, Entry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(_) => fatal::fatal_message("connection table mutex poisoned", self.exit_immediate),
        }
    }

    /// Atomic w.r.t. the table's mutex: resolve `id` to a usable socket,
    /// connecting lazily on first use.
    pub fn get_or_connect(&self, id: u32) -> std::io::Result<GetOrConnect> {
        let mut entries = self.lock();
        let entry = entries.entry(id).or_default();

        match entry.status {
            ConnStatus::ClosedRemote => Ok(GetOrConnect::Skip),
            ConnStatus::Alive => {
                let socket = entry
                    .socket
                    .as_ref()
                    .expect("ALIVE entry always carries a socket");
                Ok(GetOrConnect::Socket(socket.try_clone()?))
            }
            ConnStatus::Dead => {
                let stream = TcpStream::connect(self.target_addr)?;
                let handle = stream.try_clone()?;
                entry.socket = Some(stream);
                entry.status = ConnStatus::Alive;
                Ok(GetOrConnect::Socket(handle))
            }
        }
    }

    /// Called by a worker that observed `EPIPE`, `ECONNRESET`, or a
    /// zero-byte read: ALIVE → CLOSED_REMOTE, and the tracked socket is
    /// dropped (closing the table's half of the duplicated fd).
    pub fn mark_closed_remote(&self, id: u32) {
        let mut entries = self.lock();
        if let Some(entry) = entries.get_mut(&id) {
            entry.status = ConnStatus::ClosedRemote;
            entry.socket = None;
        }
    }
}
