//! Sc2/Sc3-style scenarios: real TCP sockets, the real `ConnTable`, and
//! the real `run_worker` function, driven with the same scheduling logic
//! the orchestrator uses (reproduced here rather than imported, since
//! `schedule_order`/`last_positions` are private to `comux_replay`).

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

use comux_core::codec::{self, decode_headers, ChunkHeaderMeta};
use comux_core::wire::AWAIT_RESPONSE;
use comux_core::{Chunk, Header, Manifest};
use comux_replay::config::ReplayConfig;
use comux_replay::conntab::ConnTable;
use comux_replay::worker::run_worker;

fn chunk(conn_id: u32, sched: u32, flags: u32, payload: &[u8]) -> Chunk {
    Chunk {
        conn_id,
        len: payload.len() as u64,
        sched,
        flags,
        payload: payload.to_vec(),
        offset: 0,
    }
}

fn write_manifest_to_tempfile(m: &Manifest) -> std::fs::File {
    let bytes = codec::encode(m);
    let path = std::env::temp_dir().join(format!(
        "comux-integration-{}-{}",
        std::process::id(),
        bytes.len()
    ));
    std::fs::write(&path, &bytes).unwrap();
    let file = std::fs::File::open(&path).unwrap();
    let _ = std::fs::remove_file(&path);
    file
}

fn schedule_order(metas: &[ChunkHeaderMeta]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..metas.len()).collect();
    order.sort_by_key(|&i| metas[i].sched);
    order
}

fn last_positions(order: &[usize], metas: &[ChunkHeaderMeta]) -> HashMap<u32, usize> {
    let mut last = HashMap::new();
    for (queue_pos, &chunk_index) in order.iter().enumerate() {
        last.insert(metas[chunk_index].conn_id, queue_pos);
    }
    last
}

/// Accept `num_conns` connections and read each to EOF, returning the
/// bytes received per accept-order index.
fn accept_and_drain(listener: TcpListener, num_conns: usize) -> thread::JoinHandle<Vec<Vec<u8>>> {
    thread::spawn(move || {
        let mut results = Vec::new();
        for _ in 0..num_conns {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = Vec::new();
            stream.read_to_end(&mut buf).unwrap();
            results.push(buf);
        }
        results
    })
}

/// Sc2: chunks `(conn=0,sched=8,"D")`, `(conn=1,sched=2,"B")`,
/// `(conn=1,sched=4,"C")`, `(conn=0,sched=1,"A")` must be transmitted in
/// schedule order A, B, C, D, landing as "A"+"D" on connection 0 and
/// "B"+"C" on connection 1.
#[test]
fn sc2_chunks_replay_in_schedule_order_across_two_connections() {
    let manifest = Manifest {
        header: Header {
            version: 0,
            num_conns: 2,
            num_chunks: 4,
        },
        chunks: vec![
            chunk(0, 8, 0, b"D"),
            chunk(1, 2, 0, b"B"),
            chunk(1, 4, 0, b"C"),
            chunk(0, 1, 0, b"A"),
        ],
    };

    let mut source = write_manifest_to_tempfile(&manifest);
    let (header, metas) = decode_headers(&mut source).unwrap();
    assert_eq!(header.num_conns, 2);

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let target_addr = listener.local_addr().unwrap();
    let acceptor = accept_and_drain(listener, 2);

    let conntab = Arc::new(ConnTable::new(target_addr, false));
    let source = Arc::new(Mutex::new(source));
    let config = Arc::new(ReplayConfig::default());

    let order = schedule_order(&metas);
    let last = last_positions(&order, &metas);

    let transmission_order = Arc::new(Mutex::new(Vec::new()));

    for (queue_pos, &chunk_index) in order.iter().enumerate() {
        let meta = metas[chunk_index];
        let is_final = last.get(&meta.conn_id) == Some(&queue_pos);
        transmission_order.lock().unwrap().push(meta.conn_id);

        let conntab = conntab.clone();
        let source = source.clone();
        let config = config.clone();
        // Sequential mode: join immediately, matching the orchestrator's
        // default (non-NO_WAIT) behavior.
        let handle = thread::spawn(move || run_worker(meta, is_final, conntab, source, config));
        handle.join().unwrap();
    }

    drop(conntab);
    let received = acceptor.join().unwrap();
    // Connection 0 accepts first (its sched=1 "A" chunk goes out before
    // connection 1's sched=2 "B"), so accept order pins received[0] to
    // connection 0 and received[1] to connection 1.
    assert_eq!(received[0], b"AD");
    assert_eq!(received[1], b"BC");
}

/// Sc3-style: a chunk with `AWAIT_RESPONSE` set must not hang — the worker
/// reads until the peer closes its write side.
#[test]
fn await_response_returns_once_peer_half_closes() {
    let manifest = Manifest {
        header: Header {
            version: 0,
            num_conns: 1,
            num_chunks: 1,
        },
        chunks: vec![chunk(0, 0, AWAIT_RESPONSE, b"ping")],
    };

    let mut source = write_manifest_to_tempfile(&manifest);
    let (_header, metas) = decode_headers(&mut source).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let target_addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = [0u8; 4];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
        stream.write_all(b"pong").unwrap();
        stream.shutdown(std::net::Shutdown::Write).unwrap();
    });

    let conntab = Arc::new(ConnTable::new(target_addr, false));
    let source = Arc::new(Mutex::new(source));
    let config = Arc::new(ReplayConfig::default());

    run_worker(metas[0], true, conntab, source, config);
    server.join().unwrap();
}

/// `NO_WAIT` mode: workers are spawned without joining until the whole
/// queue has been dispatched. All bytes must still arrive even though
/// completion order is unspecified.
#[test]
fn no_wait_mode_still_delivers_every_chunk() {
    let manifest = Manifest {
        header: Header {
            version: 0,
            num_conns: 1,
            num_chunks: 3,
        },
        chunks: vec![chunk(0, 0, 0, b"x"), chunk(0, 1, 0, b"y"), chunk(0, 2, 0, b"z")],
    };

    let mut source = write_manifest_to_tempfile(&manifest);
    let (_header, metas) = decode_headers(&mut source).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let target_addr = listener.local_addr().unwrap();
    let acceptor = accept_and_drain(listener, 1);

    let conntab = Arc::new(ConnTable::new(target_addr, false));
    let source = Arc::new(Mutex::new(source));
    let config = Arc::new(ReplayConfig {
        no_wait: true,
        ..ReplayConfig::default()
    });

    let order = schedule_order(&metas);
    let last = last_positions(&order, &metas);

    let mut handles = Vec::new();
    for (queue_pos, &chunk_index) in order.iter().enumerate() {
        let meta = metas[chunk_index];
        let is_final = last.get(&meta.conn_id) == Some(&queue_pos);
        let conntab = conntab.clone();
        let source = source.clone();
        let config = config.clone();
        handles.push(thread::spawn(move || {
            run_worker(meta, is_final, conntab, source, config)
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    drop(conntab);
    let received = acceptor.join().unwrap();
    let mut bytes: Vec<u8> = received.into_iter().flatten().collect();
    bytes.sort();
    let mut expected = b"xyz".to_vec();
    expected.sort();
    assert_eq!(bytes, expected);
}
