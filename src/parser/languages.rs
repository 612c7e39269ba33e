//! Language-specific extractors

pub mod typescript;
