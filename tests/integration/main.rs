//! comux integration test harness.
//!
//! Exercises the parts of the system that need real sockets or a real
//! multi-crate pipeline rather than a single module's inline tests:
//! the replay orchestrator's worker threads against a live `TcpListener`,
//! and the mutator's strategy selection feeding back into the codec and
//! validator across crate boundaries.

mod orchestrator_replay;
mod mutate_pipeline;
