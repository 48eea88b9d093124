//! CLI commands implementation

pub mod clear;
pub mod import;
pub mod init;
pub mod query;
pub mod status;
pub mod update;

pub use clear::*;
pub use import::*;
pub use init::*;
pub use query::*;
pub use status::*;
pub use update::*;
