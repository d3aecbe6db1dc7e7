use std::net::SocketAddr;
use std::path::PathBuf;

use poolvr_shared::config::Variant;

/// Repository that revision links in the page point at.
pub const DEFAULT_REPO_URL: &str = "https://github.com/jzitelli/poolvr";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid listen address {addr:?}: {source}")]
    ListenAddr {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("{what} must not be empty")]
    EmptyPath { what: &'static str },
    #[error("repo_url must be an http(s) URL, got {0:?}")]
    RepoUrl(String),
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Site root: static assets are served from here and the dist manifest is read from here.
    pub site_root: PathBuf,
    pub template_dir: PathBuf,
    /// Only location where `/write` may store files.
    pub write_dir: PathBuf,
    pub dist_dir: PathBuf,
    /// Pretty scene JSON and unminified scripts.
    pub debug: bool,
    pub variant: Variant,
    pub repo_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:5000".to_string(),
            site_root: PathBuf::from("."),
            template_dir: PathBuf::from("templates"),
            write_dir: PathBuf::from("saves"),
            dist_dir: PathBuf::from("dist"),
            debug: true,
            variant: Variant::default(),
            repo_url: DEFAULT_REPO_URL.to_string(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_addr
            .parse::<SocketAddr>()
            .map_err(|source| ConfigError::ListenAddr {
                addr: self.listen_addr.clone(),
                source,
            })?;
        for (what, path) in [
            ("site_root", &self.site_root),
            ("template_dir", &self.template_dir),
            ("write_dir", &self.write_dir),
            ("dist_dir", &self.dist_dir),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::EmptyPath { what });
            }
        }
        if !(self.repo_url.starts_with("http://") || self.repo_url.starts_with("https://")) {
            return Err(ConfigError::RepoUrl(self.repo_url.clone()));
        }
        Ok(())
    }

    /// Port part of the listen address, for the start-up banner.
    pub fn port(&self) -> Option<u16> {
        self.listen_addr
            .parse::<SocketAddr>()
            .ok()
            .map(|addr| addr.port())
    }
}
