//! `imali doctor` — Diagnose config, playbook and generation backend.

use imali_config::AppConfig;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("Imali Doctor — System Diagnostics");
    println!("=================================\n");

    let mut issues = 0;

    // Check config
    let default_path = AppConfig::config_dir().join("config.toml");
    let path = config_path.unwrap_or(default_path.as_path());
    if !path.exists() {
        println!("  ⚠️  No config file at {} — using defaults", path.display());
    }

    let config = match super::load_config(config_path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  Fix the config first. A template:\n");
            println!("{}", AppConfig::default_toml());
            return Ok(());
        }
    };

    // Check playbook
    match super::load_playbook(&config) {
        Ok(kb) if kb.is_empty() => {
            println!("  ⚠️  Playbook loaded from {} but has no strategies", kb.source());
            issues += 1;
        }
        Ok(kb) => {
            println!("  ✅ Playbook: {} strategies from {}", kb.len(), kb.source());
        }
        Err(e) => {
            println!("  ❌ Playbook: {e}");
            issues += 1;
        }
    }

    // Check generation backend
    match imali_providers::build_from_config(&config) {
        Ok(provider) => match provider.health_check().await {
            Ok(true) => println!(
                "  ✅ Backend '{}' reachable (model {})",
                provider.name(),
                provider.model()
            ),
            Ok(false) => {
                println!("  ⚠️  Backend '{}' responded but reported unhealthy", provider.name());
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Backend '{}' unreachable: {e}", provider.name());
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ Backend: {e}");
            issues += 1;
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
