//! `stepwise run`: drive one goal through the plan-execute-reflect loop.

use std::sync::Arc;
use stepwise_agent::{
    LlmResultSynthesizer, LlmStepExecutor, Orchestrator, ProviderTextGenerator, RunOutcome,
    TextGenerator,
};
use stepwise_config::AppConfig;
use stepwise_core::context::SharedContext;
use stepwise_telemetry::TelemetryEngine;
use tracing::info;

pub struct RunArgs {
    pub goal: String,
    pub max_attempts: Option<u32>,
    pub threshold: Option<f64>,
    pub model: Option<String>,
    pub trace_json: bool,
}

pub async fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Local providers run without a key
    if !config.has_api_key() && !is_local(&config.default_provider) {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    OPENROUTER_API_KEY=sk-or-v1-...   (recommended)");
        eprintln!("    OPENAI_API_KEY=sk-...             (for OpenAI direct)");
        eprintln!("    STEPWISE_API_KEY=sk-...           (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let router = stepwise_providers::build_from_config(&config);
    let provider = router.default().ok_or("No default provider configured")?;
    let model = args
        .model
        .clone()
        .or_else(|| {
            config
                .providers
                .get(&config.default_provider)
                .and_then(|p| p.default_model.clone())
        })
        .unwrap_or_else(|| config.default_model.clone());

    let generator: Arc<dyn TextGenerator> = Arc::new(
        ProviderTextGenerator::new(provider, &model)
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens)
            .with_streaming(config.stream),
    );

    let mut orchestrator = Orchestrator::new(
        generator.clone(),
        Arc::new(LlmStepExecutor::new(generator.clone())),
        Arc::new(LlmResultSynthesizer::new(generator)),
    );
    orchestrator.apply_config(&config.orchestrator)?;
    if let Some(attempts) = args.max_attempts {
        orchestrator.set_max_replan_attempts(attempts)?;
    }
    if let Some(threshold) = args.threshold {
        orchestrator.set_satisfaction_threshold(threshold)?;
    }

    let telemetry =
        (config.telemetry.enabled || args.trace_json).then(|| Arc::new(TelemetryEngine::new()));
    if let Some(engine) = &telemetry {
        orchestrator = orchestrator.with_telemetry(engine.clone());
    }

    info!(
        provider = %config.default_provider,
        model = %model,
        attempts = orchestrator.max_replan_attempts(),
        threshold = orchestrator.satisfaction_threshold(),
        "starting run"
    );

    let mut context = SharedContext::new(uuid::Uuid::new_v4().to_string());
    let report = orchestrator.run_detailed(&args.goal, &mut context).await?;

    println!("{}", report.output);

    let verdict = match report.outcome {
        RunOutcome::Completed => "accepted",
        RunOutcome::Exhausted => "attempts exhausted",
    };
    let last_score = report
        .reflections
        .last()
        .map(|r| format!("{:.2}", r.score))
        .unwrap_or_else(|| "n/a".into());
    eprintln!();
    eprintln!(
        "  {verdict} after {} pass(es), {} replan(s), last score {last_score}",
        report.attempts, report.replans
    );

    if args.trace_json {
        if let (Some(engine), Some(trace_id)) = (&telemetry, &report.trace_id) {
            println!("{}", engine.export_json(trace_id)?);
        }
    }

    Ok(())
}

fn is_local(provider: &str) -> bool {
    matches!(provider, "ollama" | "vllm" | "llamacpp" | "llama.cpp")
}
