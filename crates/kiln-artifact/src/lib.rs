//! Generates the four artifact kinds a completed target can produce: an
//! output tarball, an output hash, an input hash, an execution log
//! tarball, and a manifest tying them all together.
//!
//! Grounded on `heph`'s `engine/cache_artifacts.go` (`outTarArtifact`,
//! `hashOutputArtifact`, `hashInputArtifact`, `logArtifact`,
//! `manifestArtifact`, each a `Gen(ctx, gctx) error` implementation) and on
//! `cuenv-core`'s `sync::SyncProvider` trait shape for "one capability,
//! several tagged variants" -- generalized here to a tagged `enum Artifact`
//! per this crate's own polymorphic-artifacts design note.

mod artifact;
mod context;
mod error;
mod git_facts;
mod tarball;

pub use artifact::{Artifact, GenOutcome, ManifestData, ManifestInputs, StagedFile};
pub use context::GenContext;
pub use error::{Error, Result};
pub use git_facts::{git_commit, git_ref};
pub use tarball::{expand_tar, write_deterministic_tar};
