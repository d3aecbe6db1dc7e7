use clap::Parser;
use poolvr_server::app::build_renderer;
use poolvr_server::cli::CliArgs;
use poolvr_server::config::ServerConfig;
use poolvr_server::dist::{build_dist, MANIFEST};
use poolvr_server::logging::init_logging;
use poolvr_server::routes::{router, AppState};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    let mut config = ServerConfig::default();
    config.apply_cli_overrides(&args);

    init_logging(args.verbose, config.debug, config.variant);

    // Validate configuration before starting
    if let Err(e) = config.validate() {
        eprintln!("Invalid server configuration: {}", e);
        std::process::exit(1);
    }

    if args.dist {
        let renderer = match build_renderer(&config) {
            Ok(renderer) => renderer,
            Err(e) => {
                eprintln!("Failed to load templates: {}", e);
                std::process::exit(1);
            }
        };
        match build_dist(&config.site_root, &config.dist_dir, MANIFEST, &renderer) {
            Ok(report) => println!(
                "Wrote {} ({} files copied)",
                report.page.display(),
                report.files_copied
            ),
            Err(e) => {
                eprintln!("Failed to build distributable: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    let app_state = match AppState::from_config(&config) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Failed to start: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!(
        "starting poolvr {} ({} variant, debug={})",
        app_state.renderer.version(),
        config.variant,
        config.debug
    );
    if let Some(port) = config.port() {
        tracing::info!("go to http://127.0.0.1:{}", port);
    }

    let app = router(app_state, &config.site_root);

    let listener = match tokio::net::TcpListener::bind(&config.listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Failed to bind {}: {}", config.listen_addr, e);
            std::process::exit(1);
        }
    };
    println!("poolvr server listening on {}", config.listen_addr);
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
