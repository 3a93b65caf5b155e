//! Target and package data model for kiln.
//!
//! This crate defines the immutable, serializable declaration of a build
//! unit (`TargetSpec`), its resolved form after linking (`Target`), and the
//! package namespace that owns a set of specs (`Package`). It owns no graph
//! structure or hashing logic — those live in `kiln-dag` and `kiln-hash`
//! respectively, which depend on the types defined here.

mod error;
mod package;
mod target;

pub use error::{Error, Result};
pub use package::Package;
pub use target::{
    CachePolicy, Deps, Executor, Recipe, SourceLocation, Target, TargetSpec, ToolRef,
};
