//! Cross-crate pipeline: a manifest built with `comux-core`, mutated by
//! `comux-mutate`, and fed back through `comux-core`'s own decoder and
//! validator — the path a real fuzzer host exercises on every iteration.

use comux_core::codec;
use comux_core::validate::validate_manifest;
use comux_core::{Chunk, Header, Manifest};
use comux_mutate::driver::Driver;
use comux_mutate::MutateConfig;

fn sample_manifest() -> Manifest {
    Manifest {
        header: Header {
            version: 0,
            num_conns: 2,
            num_chunks: 3,
        },
        chunks: vec![
            Chunk {
                conn_id: 0,
                len: 5,
                sched: 0,
                flags: 0,
                payload: b"hello".to_vec(),
                offset: 0,
            },
            Chunk {
                conn_id: 1,
                len: 5,
                sched: 1,
                flags: 0,
                payload: b"world".to_vec(),
                offset: 0,
            },
            Chunk {
                conn_id: 0,
                len: 3,
                sched: 2,
                flags: 0,
                payload: b"bye".to_vec(),
                offset: 0,
            },
        ],
    }
}

#[test]
fn fuzzed_output_always_decodes_and_validates() {
    let manifest = sample_manifest();
    let encoded = codec::encode(&manifest);

    let mut driver = Driver::new(1234, MutateConfig::default());
    for seed in 0..50 {
        let mut d = Driver::new(seed, MutateConfig::default());
        if let Some(mutated_bytes) = d.fuzz(&encoded) {
            let decoded = codec::decode(&mut std::io::Cursor::new(mutated_bytes))
                .expect("mutator output must remain decodable");
            validate_manifest(&decoded).expect("mutator output must remain valid");
        }
    }
    // A direct call on the shared driver too, to exercise its persistent
    // RNG state across several iterations in one process.
    for _ in 0..10 {
        let _ = driver.fuzz(&encoded);
    }
}

#[test]
fn trim_run_never_produces_an_invalid_manifest() {
    let manifest = Manifest {
        header: Header {
            version: 0,
            num_conns: 1,
            num_chunks: 1,
        },
        chunks: vec![Chunk {
            conn_id: 0,
            len: 400,
            sched: 0,
            flags: 0,
            payload: vec![9u8; 400],
            offset: 0,
        }],
    };
    let encoded = codec::encode(&manifest);

    let mut driver = Driver::new(7, MutateConfig::default());
    driver.init_trim(&encoded).expect("nonempty payload is trimmable");

    let mut steps = 0;
    while let Some(candidate) = driver.trim().map(|b| b.to_vec()) {
        let decoded = codec::decode(&mut std::io::Cursor::new(&candidate))
            .expect("trim candidates must remain decodable");
        validate_manifest(&decoded).expect("trim candidates must remain valid");
        driver.post_trim(true);
        steps += 1;
        if steps > 1000 {
            break;
        }
    }
    assert!(steps > 0);
}

#[test]
fn queue_filter_round_trips_a_file_written_by_the_codec() {
    let manifest = sample_manifest();
    let encoded = codec::encode(&manifest);
    let driver = Driver::new(3, MutateConfig::default());
    assert!(driver.queue_filter(&encoded));
}
