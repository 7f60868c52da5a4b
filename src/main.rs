use clap::Parser;
use comfy_courier::core::worker::spawn_generation;
use comfy_courier::domain::ports::{ConfigProvider, GenerationServer};
use comfy_courier::utils::error::ErrorSeverity;
use comfy_courier::utils::{logger, validation::Validate};
use comfy_courier::{CliConfig, ComfyClient, GeneratePipeline, LocalStorage, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    logger::init_cli_logger(cli.verbose);

    tracing::info!("Starting comfy-courier");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let settings = match Settings::resolve(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("❌ Failed to load configuration: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    if let Err(e) = settings.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let client = ComfyClient::new(settings.server_url())
        .with_timing(settings.poll_interval(), settings.history_timeout())
        .with_request_timeout(settings.request_timeout());

    if cli.ping {
        if client.ping().await {
            println!("✅ Generation server is up at {}", settings.server_url());
            return Ok(());
        }
        eprintln!("❌ Generation server unreachable at {}", settings.server_url());
        std::process::exit(2);
    }

    if cli.list_loras {
        for name in client.list_loras().await? {
            println!("{}", name);
        }
        return Ok(());
    }

    if cli.list_checkpoints {
        for name in client.list_checkpoints().await? {
            println!("{}", name);
        }
        return Ok(());
    }

    // Workflow paths resolve against the working directory; only generated
    // images land under the configured output root.
    let workflows = LocalStorage::new(".".to_string());
    let outputs = LocalStorage::new(settings.output_path.clone());
    let pipeline = GeneratePipeline::new(
        workflows,
        outputs,
        settings.clone(),
        client,
        settings.character.clone(),
        settings.append.clone(),
        settings.params.clone(),
    );

    // The whole network cycle runs on a background task; this thread only
    // consumes progress events, same as a UI would.
    let handle = spawn_generation(pipeline);

    match handle.wait().await {
        Ok(output_path) => {
            tracing::info!("✅ Generation completed successfully!");
            println!("✅ Generation completed successfully!");
            println!("📁 Image saved to: {}", output_path);
        }
        Err(e) => {
            tracing::error!(
                "❌ Generation failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}
