#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Configuration for the grid staging and submission services.
//!
//! Layout: `model.rs` (typed config values), `defaults.rs` (default tool
//! locations and limits), `loader.rs` (YAML file + environment overlay),
//! `validate.rs` (parsing/validation helpers), `error.rs` (`ConfigError`).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ENV_CONFIG_FILE, load, load_with};
pub use model::{DigestAlgorithm, GridConfig, GridConfigDocument};
