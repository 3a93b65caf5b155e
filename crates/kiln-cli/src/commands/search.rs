//! `search` dispatch: link the graph, then run the free-text/fuzzy search
//! over every linked target.

use crate::engine::Engine;
use crate::error::{OkEnvelope, Result};
use crate::output::OutputFormat;
use crate::search::{self, Hit};
use kiln_spec::TargetSpec;

/// Search every linked target for `query`, printing up to `limit` hits.
///
/// # Errors
/// Returns an error if linking the target graph fails.
pub async fn dispatch(query: &str, limit: usize, specs: Vec<TargetSpec>, engine: &Engine, workers: usize, format: OutputFormat) -> Result<()> {
    let dag = engine.link(specs, workers).await?;
    let all_specs: Vec<TargetSpec> = dag.iter().cloned().collect();
    let result = search::search(&all_specs, query, limit, None);

    if format == OutputFormat::Json {
        let envelope = OkEnvelope::new(serde_json::json!({
            "hits": result.hits.iter().map(hit_json).collect::<Vec<_>>(),
            "more": result.more,
        }));
        println!("{}", serde_json::to_string_pretty(&envelope).unwrap_or_default());
    } else {
        for hit in &result.hits {
            println!("{} ({})", hit.fqn, hit.matched_field);
        }
        if result.more > 0 {
            println!("+{} more...", result.more);
        }
    }
    Ok(())
}

fn hit_json(hit: &Hit) -> serde_json::Value {
    serde_json::json!({ "fqn": hit.fqn, "matched_field": hit.matched_field })
}
