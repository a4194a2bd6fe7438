//! Worker contract (§4.4 step "Worker contract"): one thread, one chunk.

use std::fs::File;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::os::unix::io::AsRawFd;
use std::sync::{Arc, Mutex};

use comux_core::codec::{read_chunk_payload, ChunkHeaderMeta};
use comux_core::wire::{AWAIT_RESPONSE, NO_SHUTDOWN};

use crate::conntab::{ConnTable, GetOrConnect};
use crate::config::ReplayConfig;
use crate::fatal::{self, is_remote_close};

const DEFAULT_BUFFSIZE: usize = 2048;
const MAX_BUFFSIZE: usize = 1 << 19;

fn clamp_buffsize(configured: usize) -> usize {
    let v = if configured == 0 { DEFAULT_BUFFSIZE } else { configured };
    v.min(MAX_BUFFSIZE)
}

/// Send the whole slice, retrying on EINTR, using `MSG_NOSIGNAL` so a
/// broken pipe returns `EPIPE` instead of killing the process with
/// `SIGPIPE`.
fn send_all_no_sigpipe(socket: &TcpStream, buf: &[u8]) -> std::io::Result<()> {
    let fd = socket.as_raw_fd();
    let mut sent = 0usize;
    while sent < buf.len() {
        // Safety: fd is a valid, open socket owned by `socket` for the
        // duration of this call; the pointer/len pair describes `buf`.
        let ret = unsafe {
            libc::send(
                fd,
                buf[sent..].as_ptr() as *const libc::c_void,
                buf.len() - sent,
                libc::MSG_NOSIGNAL,
            )
        };
        if ret < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        sent += ret as usize;
    }
    Ok(())
}

pub fn run_worker(
    meta: ChunkHeaderMeta,
    is_final: bool,
    conntab: Arc<ConnTable>,
    source: Arc<Mutex<File>>,
    config: Arc<ReplayConfig>,
) {
    let socket = match conntab.get_or_connect(meta.conn_id) {
        Ok(GetOrConnect::Socket(s)) => s,
        Ok(GetOrConnect::Skip) => return,
        Err(e) => fatal::fatal_os_error("connect", config.exit_immediate, e),
    };

    let payload = {
        let mut src = match source.lock() {
            Ok(g) => g,
            Err(_) => fatal::fatal_message("byte source mutex poisoned", config.exit_immediate),
        };
        match read_chunk_payload(&mut *src, &meta) {
            Ok(p) => p,
            Err(e) => fatal::fatal_os_error("seek/read payload", config.exit_immediate, e),
        }
    };

    let send_buffsize = clamp_buffsize(config.send_buffsize);
    for slice in payload.chunks(send_buffsize.max(1)) {
        match send_all_no_sigpipe(&socket, slice) {
            Ok(()) => {}
            Err(e) if is_remote_close(&e) => {
                conntab.mark_closed_remote(meta.conn_id);
                return;
            }
            Err(e) => fatal::fatal_os_error("send", config.exit_immediate, e),
        }
    }

    if is_final && (meta.flags & NO_SHUTDOWN) == 0 {
        let _ = socket.shutdown(Shutdown::Write);
    }

    if (meta.flags & AWAIT_RESPONSE) != 0 {
        await_response(&socket, &conntab, meta.conn_id, &config);
    }
}

fn await_response(mut socket: &TcpStream, conntab: &ConnTable, conn_id: u32, config: &ReplayConfig) {
    let recv_buffsize = clamp_buffsize(config.recv_buffsize);
    let mut buf = vec![0u8; recv_buffsize.max(1)];
    let mut received_any = false;
    let stdout = std::io::stdout();

    loop {
        match socket.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                received_any = true;
                let mut lock = stdout.lock();
                let _ = lock.write_all(&buf[..n]);
            }
            Err(e) if is_remote_close(&e) => {
                conntab.mark_closed_remote(conn_id);
                break;
            }
            Err(e) => fatal::fatal_os_error("recv", config.exit_immediate, e),
        }
    }

    if received_any {
        let mut lock = stdout.lock();
        let _ = lock.write_all(b"\n");
    }
}
