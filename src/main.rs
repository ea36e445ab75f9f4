use std::sync::Arc;

use clap::Parser;

use unisearch::config::env_file;
use unisearch::utils::{fs::write_text_atomic, logger, validation::Validate};
use unisearch::{
    aggregate, dispatch, format_report, CliConfig, CommandInvoker, PlatformRegistry,
};

#[tokio::main]
async fn main() {
    let config = CliConfig::parse();

    logger::init_cli_logger(config.verbose);
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        eprintln!("error: {}", e);
        std::process::exit(2);
    }

    let registry = PlatformRegistry::with_defaults();

    if config.list_platforms {
        print!("{}", registry.render_platform_list());
        return;
    }

    let keyword = match config.keyword.as_deref().map(str::trim) {
        Some(keyword) if !keyword.is_empty() => keyword.to_string(),
        _ => {
            eprintln!("error: a search keyword is required");
            eprintln!("use --help for usage");
            std::process::exit(2);
        }
    };

    env_file::load_env_file(&config.env_file);

    let platforms = match registry.select(&config.platforms, config.group.as_deref()) {
        Ok(platforms) => platforms,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("use --list-platforms to see what is available");
            std::process::exit(1);
        }
    };

    let request = config.to_request(keyword, platforms);
    tracing::info!(
        keyword = %request.keyword,
        platforms = request.platforms.len(),
        max_workers = request.max_workers,
        timeout_secs = request.overall_timeout.as_secs(),
        "dispatching search"
    );

    let invoker = Arc::new(CommandInvoker::new());
    let outcomes = dispatch(&registry, invoker, &request).await;
    let report = aggregate(&request, outcomes);

    tracing::info!(
        successful = report.summary.successful,
        failed = report.summary.failed,
        total_items = report.summary.total_items,
        "search complete"
    );

    let rendered = match format_report(&report, config.output_mode()) {
        Ok(rendered) => rendered,
        Err(e) => {
            eprintln!("error: failed to render report: {}", e);
            std::process::exit(1);
        }
    };

    match &config.output {
        Some(path) => {
            if let Err(e) = write_text_atomic(path, &rendered) {
                eprintln!("error: cannot write {}: {}", path.display(), e);
                std::process::exit(1);
            }
            eprintln!("results saved to {}", path.display());
        }
        None => println!("{}", rendered),
    }

    // Backend failures are reported in the payload; the process exits 0 for
    // any completed dispatch.
}
