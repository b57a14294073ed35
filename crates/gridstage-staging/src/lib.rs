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
#![allow(clippy::module_name_repetitions)]

//! Content-addressed staging into the grid project's download tree.
//!
//! Layout: `oracle.rs` (placement oracle seam + subprocess implementation),
//! `resolver.rs` (`PathResolver`), `digest.rs` (content fingerprints),
//! `stager.rs` (`ContentStager`), `error.rs` (`StagingError`).

pub mod digest;
pub mod error;
pub mod oracle;
pub mod resolver;
pub mod stager;

pub use digest::{Blake3Digest, ContentDigest, Sha256Digest, Sha512Digest, digest_for};
pub use error::{OracleError, StagingError, StagingResult};
pub use oracle::{CommandPlacementOracle, PlacementOracle, parse_oracle_output};
pub use resolver::{PathResolver, relative_to_marker};
pub use stager::{ContentStager, StageOutcome, StagedFile, filename_for};
