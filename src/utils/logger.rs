//! Logging setup for tests and embedders that want collector pass output.
//!
//! The crate itself only emits through the `log` facade; wiring a backend is
//! the embedder's job. Tests use env_logger.

#[cfg(test)]
pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}
