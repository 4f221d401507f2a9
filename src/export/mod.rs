//! Output side: per-message text documents and the merged corpus file.

pub mod merge;
pub mod text;
