//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;
use poolvr_shared::config::Variant;

use crate::config::ServerConfig;

/// poolvr web server.
///
/// CLI values override the built-in `ServerConfig` defaults.
#[derive(Parser, Debug, Default)]
#[command(name = "poolvr-server", about = "Serves the poolvr VR pool hall")]
pub struct CliArgs {
    /// Release (non-debug) mode: compact scene JSON, minified scripts.
    #[arg(long)]
    pub release: bool,

    /// Enable verbose logging to stdout.
    #[arg(short, long)]
    pub verbose: bool,

    /// Build the distributable bundle instead of serving.
    #[arg(long)]
    pub dist: bool,

    /// Deployment variant (classic, pyserver).
    #[arg(long)]
    pub variant: Option<Variant>,

    /// Listen address, e.g. 0.0.0.0:5000.
    #[arg(long)]
    pub listen: Option<String>,

    /// Site root holding static assets.
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Directory holding the HTML templates.
    #[arg(long)]
    pub templates: Option<PathBuf>,

    /// Directory that `/write` stores into.
    #[arg(long)]
    pub write_dir: Option<PathBuf>,

    /// Output directory for `--dist`.
    #[arg(long)]
    pub dist_dir: Option<PathBuf>,

    /// Repository URL used for revision links.
    #[arg(long)]
    pub repo_url: Option<String>,
}

impl ServerConfig {
    /// Apply CLI overrides to a config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if args.release {
            self.debug = false;
        }
        if let Some(variant) = args.variant {
            self.variant = variant;
        }
        if let Some(ref listen) = args.listen {
            self.listen_addr = listen.clone();
        }
        if let Some(ref root) = args.root {
            self.site_root = root.clone();
        }
        if let Some(ref templates) = args.templates {
            self.template_dir = templates.clone();
        }
        if let Some(ref write_dir) = args.write_dir {
            self.write_dir = write_dir.clone();
        }
        if let Some(ref dist_dir) = args.dist_dir {
            self.dist_dir = dist_dir.clone();
        }
        if let Some(ref url) = args.repo_url {
            self.repo_url = url.clone();
        }
    }
}
