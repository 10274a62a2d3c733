#![allow(clippy::vec_box)]
pub mod runtime;
pub mod track;
pub mod utils;

#[cfg(feature = "mimalloc")]
use mimalloc::MiMalloc;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;
