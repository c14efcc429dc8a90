//! CLI subcommand implementations.

pub mod ingest;
pub mod replay;
pub mod results;
pub mod splits;
pub mod util;
