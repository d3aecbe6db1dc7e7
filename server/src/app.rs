//! Start-up wiring: everything read once before the first request.

use std::path::Path;
use std::sync::Arc;

use poolvr_shared::config::Variant;

use crate::config::ServerConfig;
use crate::persist::{PersistError, WriteDir};
use crate::render::{PageRenderer, PLAY_TEMPLATE};
use crate::revisions::Revisions;
use crate::routes::AppState;
use crate::scene::PoolHall;
use crate::template::{TemplateError, TemplateSet};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Version shown in the page: fixed per variant, or the site's `package.json`.
pub fn site_version(variant: Variant, site_root: &Path) -> String {
    if let Some(version) = variant.fixed_version() {
        return version.to_string();
    }
    match read_package_version(site_root) {
        Some(version) => version,
        None => {
            tracing::warn!(
                "no version in {}/package.json, using {}",
                site_root.display(),
                env!("CARGO_PKG_VERSION")
            );
            env!("CARGO_PKG_VERSION").to_string()
        }
    }
}

fn read_package_version(site_root: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(site_root.join("package.json")).ok()?;
    let package: serde_json::Value = serde_json::from_str(&contents).ok()?;
    package.get("version")?.as_str().map(str::to_string)
}

/// Load templates and revision history and build the page renderer.
pub fn build_renderer(config: &ServerConfig) -> Result<PageRenderer, TemplateError> {
    let templates = TemplateSet::load(&config.template_dir, &[PLAY_TEMPLATE])?;
    tracing::debug!(
        "loaded {} templates from {}",
        templates.len(),
        config.template_dir.display()
    );

    let version_content = if config.variant.shows_revision_links() {
        Revisions::lookup_or_empty(&config.site_root).links_html(&config.repo_url)
    } else {
        None
    };

    Ok(PageRenderer::new(
        config.variant,
        templates,
        Arc::new(PoolHall),
        config.debug,
        site_version(config.variant, &config.site_root),
        version_content,
    ))
}

impl AppState {
    /// Everything the request handlers need. Fails if the write directory is missing.
    pub fn from_config(config: &ServerConfig) -> Result<Self, StartupError> {
        let write_dir = WriteDir::open(&config.write_dir)?;
        let renderer = build_renderer(config)?;
        Ok(Self {
            renderer: Arc::new(renderer),
            write_dir: Arc::new(write_dir),
        })
    }
}
