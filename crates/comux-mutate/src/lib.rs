//! comux-mutate — structure-aware mutation strategies, a trimmer, a
//! dictionary, and the stateful driver behind them. `ffi` exposes this as
//! an AFL++ custom mutator; everything else is plain safe Rust.

pub mod config;
pub mod dict;
pub mod driver;
pub mod ffi;
pub mod strategy;
pub mod trim;

pub use config::MutateConfig;
pub use dict::Dictionary;
pub use driver::Driver;
pub use strategy::Strategy;
