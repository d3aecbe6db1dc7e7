//! Git revision lookup, done once at start-up.

use std::path::Path;
use std::process::Command;

use crate::template::escape_html;

const MAX_REVISIONS: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum RevisionError {
    #[error("could not run git: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("git rev-list failed: {0}")]
    Failed(String),
}

/// Most recent commits of the checkout, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Revisions {
    revs: Vec<String>,
}

impl Revisions {
    pub fn new(revs: Vec<String>) -> Self {
        Self { revs }
    }

    /// Run `git rev-list` in `repo_dir`.
    pub fn lookup(repo_dir: &Path) -> Result<Self, RevisionError> {
        let output = Command::new("git")
            .arg("rev-list")
            .arg(format!("--max-count={MAX_REVISIONS}"))
            .arg("HEAD")
            .current_dir(repo_dir)
            .output()?;
        if !output.status.success() {
            return Err(RevisionError::Failed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(Self::parse(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Look up revisions, logging and falling back to none on failure.
    pub fn lookup_or_empty(repo_dir: &Path) -> Self {
        match Self::lookup(repo_dir) {
            Ok(revisions) => revisions,
            Err(err) => {
                tracing::warn!("could not obtain git info: {}", err);
                Self::default()
            }
        }
    }

    fn parse(stdout: &str) -> Self {
        Self {
            revs: stdout
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .take(MAX_REVISIONS)
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.revs.first().map(String::as_str)
    }

    pub fn previous(&self) -> Option<&str> {
        self.revs.get(1).map(String::as_str)
    }

    /// Table linking the current and previous commits. Needs two revisions.
    pub fn links_html(&self, repo_url: &str) -> Option<String> {
        let (current, previous) = (self.current()?, self.previous()?);
        let base = escape_html(repo_url.trim_end_matches('/'));
        Some(format!(
            r#"
<table>
<tr>
<td>
<a href="{base}/commit/{current}">current commit ({})</a>
</td>
</tr>
<tr>
<td>
<a href="{base}/commit/{previous}">previous commit ({})</a>
</td>
</tr>
</table>
"#,
            short_label(current),
            short_label(previous),
            current = escape_html(current),
            previous = escape_html(previous),
        ))
    }
}

fn short_label(rev: &str) -> String {
    let short: String = rev.chars().take(6).collect();
    format!("{}...", escape_html(&short))
}
