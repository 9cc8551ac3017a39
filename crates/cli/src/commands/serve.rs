//! `imali serve` — Start the HTTP prediction server.

use std::path::Path;
use std::sync::Arc;

pub async fn run(
    config_path: Option<&Path>,
    port_override: Option<u16>,
    host_override: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config =
        super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }
    if let Some(host) = host_override {
        config.gateway.host = host;
    }

    let pipeline = super::build_pipeline(&config)?;

    println!("Imali-Bot Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!(
        "   Model:     {} ({})",
        config.model.model_id, config.model.provider
    );
    println!(
        "   Playbook:  {} strategies from {}",
        pipeline.knowledge_base().len(),
        pipeline.knowledge_base().source()
    );

    imali_gateway::start(&config.gateway, Arc::new(pipeline)).await?;

    Ok(())
}
