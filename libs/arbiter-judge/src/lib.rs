//! Judging engine: turns a Java, Python or C++ solution method into a
//! runnable function and checks it against a problem's test cases.
//!
//! Pipeline: extractor -> normalizer -> substrate (via the sandbox), with the
//! binder feeding arguments and the comparator scoring results. The harness
//! ties the stages together.

pub mod binder;
pub mod comparator;
pub mod config;
pub mod extractor;
pub mod harness;
pub mod normalizer;
pub mod sandbox;
pub mod scan;
pub mod substrate;

mod harness_tests;

pub use config::JudgeConfig;
pub use harness::{Judge, JudgePhase, Prepared};
