//! Core data model types: text documents, headers, and batch reports.

pub mod document;
pub mod report;
