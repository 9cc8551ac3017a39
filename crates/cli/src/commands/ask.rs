//! `imali ask` — Run one query through the full pipeline.

use imali_agent::{PredictResponse, QueryRequest};
use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    query: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config =
        super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let pipeline = super::build_pipeline(&config)?;

    let result = pipeline.handle(&QueryRequest::new(query)).await?;
    println!("{}", render(&result, json)?);

    Ok(())
}

/// `--json` prints the `/predict` body; otherwise the answer, then labels.
fn render(result: &PredictResponse, json: bool) -> Result<String, serde_json::Error> {
    if json {
        return serde_json::to_string_pretty(result);
    }

    let mut out = format!("{}\n\nStrategies used:", result.response);
    for label in &result.strategies_used {
        out.push_str(&format!("\n   {label}"));
    }
    Ok(out)
}
