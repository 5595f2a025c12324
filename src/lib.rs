//! Quill application library.
//!
//! Blog modules (posts, categories, tags, uploads and the draft generator)
//! plus the wiring that registers them next to the core modules.

pub mod modules;
pub mod utils;

pub use modules::register_all;
