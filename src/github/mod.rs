//! GitHub-backed collaborators: statement retrieval from a repository and
//! issue-based ticket publishing.

pub mod client;
pub mod types;

pub use client::*;
pub use types::*;
