//! `imali retrieve` — Show the playbook lines a query would put in the prompt.

use imali_agent::retrieve;
use std::path::Path;

pub fn run(config_path: Option<&Path>, query: &str) -> Result<(), Box<dyn std::error::Error>> {
    for line in context_lines(config_path, query)? {
        println!("{line}");
    }
    Ok(())
}

fn context_lines(
    config_path: Option<&Path>,
    query: &str,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let config =
        super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let knowledge_base = super::load_playbook(&config)?;

    Ok(retrieve(query, &knowledge_base)
        .iter()
        .map(ToString::to_string)
        .collect())
}
