//! Replay orchestrator (C5) — the controller thread's algorithm from §4.4.

use std::collections::HashMap;
use std::fs::File;
use std::net::SocketAddr;
use std::os::unix::io::FromRawFd;
use std::sync::{Arc, Mutex};

use comux_core::codec::{decode_headers, ChunkHeaderMeta};
use comux_core::validate::{validate_chunk, validate_header};
use comux_core::{Chunk, Header};

use crate::config::ReplayConfig;
use crate::conntab::ConnTable;
use crate::fatal;
use crate::worker::run_worker;

/// Run the orchestrator to completion and terminate the host process. This
/// is the ONLY termination path described by §4.4 — it never returns.
pub fn run(target_addr: SocketAddr, config: ReplayConfig) -> ! {
    // Safety: fd 0 is the process's standard input, the documented byte
    // source for the hosted deployment; nothing else in this process reads
    // it for the remainder of its lifetime.
    let mut source = unsafe { File::from_raw_fd(0) };

    let (header, metas) = match decode_headers(&mut source) {
        Ok(v) => v,
        Err(e) => fatal::fatal_message(&format!("manifest parse error: {e}"), config.exit_immediate),
    };

    validate_or_die(&header, &metas, config.exit_immediate);

    let order = schedule_order(&metas);
    let last_queue_pos_for_conn = last_positions(&order, &metas);

    let conntab = Arc::new(ConnTable::new(target_addr, config.exit_immediate));
    let source = Arc::new(Mutex::new(source));
    let config = Arc::new(config);

    let mut deferred = Vec::new();
    for (queue_pos, &chunk_index) in order.iter().enumerate() {
        let meta = metas[chunk_index];
        let is_final = last_queue_pos_for_conn.get(&meta.conn_id) == Some(&queue_pos);

        let conntab = conntab.clone();
        let source = source.clone();
        let config = config.clone();

        let no_wait = config_no_wait(&config);

        let handle = std::thread::spawn(move || {
            run_worker(meta, is_final, conntab, source, config);
        });

        if no_wait {
            deferred.push(handle);
        } else {
            let _ = handle.join();
        }
    }

    for handle in deferred {
        let _ = handle.join();
    }

    fatal::terminate(0, config.exit_immediate)
}

fn config_no_wait(config: &ReplayConfig) -> bool {
    config.no_wait
}

fn validate_or_die(header: &Header, metas: &[ChunkHeaderMeta], exit_immediate: bool) {
    if let Err(reason) = validate_header(header) {
        fatal::fatal_message(&format!("manifest header invalid: {reason}"), exit_immediate);
    }

    for (index, meta) in metas.iter().enumerate() {
        let stand_in = Chunk {
            conn_id: meta.conn_id,
            len: meta.len,
            sched: meta.sched,
            flags: meta.flags,
            payload: Vec::new(),
            offset: meta.offset,
        };
        if let Err(reason) = validate_chunk(header, &stand_in) {
            fatal::fatal_message(&format!("chunk {index} invalid: {reason}"), exit_immediate);
        }
    }

    let mut referenced = vec![false; header.num_conns as usize];
    for meta in metas {
        if let Some(slot) = referenced.get_mut(meta.conn_id as usize) {
            *slot = true;
        }
    }
    if let Some(conn_id) = referenced.iter().position(|&seen| !seen) {
        fatal::fatal_message(
            &format!("connection id {conn_id} is never referenced by any chunk"),
            exit_immediate,
        );
    }
}

/// Stable sort by ascending `sched`; ties keep their original array order.
fn schedule_order(metas: &[ChunkHeaderMeta]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..metas.len()).collect();
    order.sort_by_key(|&i| metas[i].sched);
    order
}

/// For each `conn_id`, the queue position of its last chunk — that worker
/// is the one that issues the half-close.
fn last_positions(order: &[usize], metas: &[ChunkHeaderMeta]) -> HashMap<u32, usize> {
    let mut last = HashMap::new();
    for (queue_pos, &chunk_index) in order.iter().enumerate() {
        last.insert(metas[chunk_index].conn_id, queue_pos);
    }
    last
}
