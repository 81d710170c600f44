use anyhow::Context;
use clap::Parser;
use mpms_crawler::utils::{logger, validation::Validate};
use mpms_crawler::{
    ChromiumLauncher, CliConfig, CrawlEngine, CrawlError, CrawlRequest, ErrorCategory, TomlConfig,
};
use std::process::ExitCode;

fn exit_with(category: ErrorCategory) -> ExitCode {
    ExitCode::from(category.exit_code() as u8)
}

fn category_of(error: &anyhow::Error) -> ErrorCategory {
    error
        .downcast_ref::<CrawlError>()
        .map(CrawlError::category)
        .unwrap_or(ErrorCategory::SystemError)
}

/// Everything that must hold before a browser is started.
fn prepare(config: &CliConfig) -> anyhow::Result<(CrawlRequest, TomlConfig)> {
    config.validate()?;
    let overlay = config.load_overlay()?;
    let request = CrawlRequest::from_config(config)?;

    std::fs::create_dir_all(&request.output_directory)
        .map_err(|e| CrawlError::system(&request.output_directory, e))
        .context("creating the output folder")?;

    Ok((request, overlay))
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match CliConfig::try_parse() {
        Ok(config) => config,
        // --help and --version
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            return exit_with(ErrorCategory::InvalidInput);
        }
    };

    if config.json_logs {
        logger::init_json_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting mpms-crawler for {}", config.period());
    tracing::debug!("CLI config: {:?}", config);

    let (request, overlay) = match prepare(&config) {
        Ok(prepared) => prepared,
        Err(e) => {
            let category = category_of(&e);
            tracing::error!("❌ {:#}", e);
            eprintln!("❌ {}: {:#}", category, e);
            return exit_with(category);
        }
    };

    if config.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let launcher = ChromiumLauncher::new(config.browser_options(&overlay));
    let mut engine = CrawlEngine::new_with_monitoring(launcher, config.monitor);
    if let Some(base_url) = &overlay.portal.base_url {
        engine = engine.with_base_url(base_url.clone());
    }

    match engine.run(&request).await {
        Ok(paths) => {
            tracing::info!("✅ Collected {} file(s)", paths.len());
            let listing: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
            println!("{}", listing.join("\n"));
            ExitCode::SUCCESS
        }
        Err(failure) => {
            let category = failure.category();
            tracing::error!("❌ {} (category: {})", failure, category);
            tracing::error!("💡 Recovery suggestion: {}", failure.error.recovery_suggestion());
            for path in &failure.completed {
                tracing::warn!("Already saved before the failure: {}", path.display());
            }

            eprintln!("❌ {}: {}", category, failure);
            exit_with(category)
        }
    }
}
