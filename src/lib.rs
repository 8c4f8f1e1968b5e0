//! hartpool
//!
//! The fork/join contract of a multicore RISC-V test firmware, as an
//! explicit service: a core registry tracking every execution unit
//! (Idle / Running / Halted) and its live fork records, a thread-backed
//! machine that runs forked continuations in true parallel, the custom
//! instruction encodings the firmware drives the contract with, and
//! the uart/console reporting channel the conformance suites print
//! through. Trap dispatch stays behind a seam; its internals belong to
//! whoever hooks it.

pub mod config;
pub mod console;
pub mod insn;
pub mod machine;
pub mod registry;
pub mod trap;
pub mod uart;

pub use config::Config;
pub use machine::{Core, Machine};
pub use registry::{
    CoreId, CoreRegistry, CoreState, ExitError, ExitKind, ForkError, JoinError, MAX_CORES,
};
