//! `mailtext` — turn a folder of `.eml` messages into plain text.
//!
//! Each message becomes a text document holding its From/To/Subject/Date
//! headers and every `text/plain` part of its body. The documents are then
//! merged into one file, each framed by `--- START: <name> ---` and
//! `--- END: <name> ---` markers.

pub mod batch;
pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;
