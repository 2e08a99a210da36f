#![deny(
    clippy::expect_used,
    clippy::panic,
    clippy::print_stdout,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used
)]

pub mod camara;
pub mod config;
pub mod enrich;
pub mod export;
pub mod fetch;
pub mod pagination;
pub mod pipeline;
