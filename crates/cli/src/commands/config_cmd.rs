//! `stepwise config`: Configuration management commands.

use stepwise_config::AppConfig;

pub fn default() {
    println!("{}", AppConfig::default_toml());
}

pub fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub fn path() {
    println!("{}", config_path().display());
}

pub fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating {}", config_path().display());

    match AppConfig::load() {
        Ok(config) => {
            println!("   ok  config parsed and validated");
            if !config.has_api_key() {
                println!(
                    "   warn  no API key set (STEPWISE_API_KEY, OPENROUTER_API_KEY or OPENAI_API_KEY)"
                );
            }
            println!();
            println!("   Provider:    {}", config.default_provider);
            println!("   Model:       {}", config.default_model);
            println!("   Streaming:   {}", config.stream);
            println!(
                "   Attempts:    {}",
                config.orchestrator.max_replan_attempts
            );
            println!(
                "   Threshold:   {}",
                config.orchestrator.satisfaction_threshold
            );
            Ok(())
        }
        Err(e) => {
            println!("   error  {e}");
            Err(e.into())
        }
    }
}

fn config_path() -> std::path::PathBuf {
    AppConfig::config_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_valid() {
        let path = config_path();
        assert!(path.to_str().unwrap().ends_with("config.toml"));
        assert!(path.to_str().unwrap().contains(".stepwise"));
    }

    #[test]
    fn default_toml_round_trips() {
        let parsed: AppConfig = toml::from_str(&AppConfig::default_toml()).unwrap();
        assert_eq!(parsed.orchestrator.max_replan_attempts, 3);
        parsed.validate().unwrap();
    }
}
