//! Runtime support linked into an instrumented module (C7, spec.md
//! §4.7): the binary hit-file codec, a named inter-process exclusion
//! primitive, and the in-memory `Tracker` that accumulates hits and
//! flushes them on unload.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod hitfile;
pub mod mutex;
pub mod tracker;

pub use error::RuntimeError;
pub use tracker::Tracker;

#[cfg(test)]
#[static_init::dynamic]
static INIT_LOGGER: () = {
    let _ = tracing_subscriber::fmt().with_test_writer().without_time().try_init();
};
