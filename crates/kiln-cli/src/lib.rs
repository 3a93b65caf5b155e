//! `kiln`: a content-addressed, hermetic build engine CLI.
//!
//! This crate wires the leaf crates (`kiln-spec`, `kiln-dag`, `kiln-hash`,
//! `kiln-cache`, `kiln-worker`, `kiln-scheduler`, `kiln-sandbox`,
//! `kiln-artifact`, `kiln-events`) into the `kiln` binary: parse build
//! files, link a target graph, run the generation-pass fixed point, then
//! either answer a `query` or execute a `run`, the way `cuenv`'s `cli.rs`
//! wires its own crates behind one `Cli` entry point.

pub mod caching_runner;
pub mod cli;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod gen;
pub mod graphviz;
pub mod loader;
pub mod output;
pub mod search;
pub mod selector;
