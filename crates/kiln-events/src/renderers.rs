//! Output renderers that consume events from an `EventBus` subscription.

mod cli;
mod json;

pub use cli::{CliRenderer, CliRendererConfig};
pub use json::JsonRenderer;
