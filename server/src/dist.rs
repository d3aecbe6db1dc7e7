//! Distributable bundle: a static copy of the site that any file server can host.

use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::render::{PageRenderer, RenderError, PLAY_TEMPLATE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

/// One manifest path, relative to the site root and mirrored under the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestEntry {
    pub path: &'static str,
    pub kind: EntryKind,
}

const fn dir(path: &'static str) -> ManifestEntry {
    ManifestEntry {
        path,
        kind: EntryKind::Dir,
    }
}

const fn file(path: &'static str) -> ManifestEntry {
    ManifestEntry {
        path,
        kind: EntryKind::File,
    }
}

/// Application assets followed by the third-party browser libraries.
pub const MANIFEST: &[ManifestEntry] = &[
    dir("build"),
    file("poolvr.css"),
    file("favicon.ico"),
    dir("fonts"),
    dir("images"),
    dir("sounds"),
    dir("node_modules/cannon/build"),
    file("node_modules/leapjs/leap-0.6.4.min.js"),
    file("node_modules/three/build/three.js"),
    file("node_modules/three/build/three.min.js"),
    file("node_modules/three/examples/js/controls/VRControls.js"),
    file("node_modules/three/examples/js/effects/VREffect.js"),
    file("node_modules/three/examples/js/objects/ShadowMesh.js"),
    file("node_modules/three/examples/js/loaders/OBJLoader.js"),
    dir("node_modules/three/examples/models"),
    dir("node_modules/three/examples/textures"),
    dir("node_modules/three.py/js"),
    file("node_modules/stats.js/build/stats.min.js"),
    file("node_modules/webvr-polyfill/build/webvr-polyfill.js"),
];

#[derive(Debug, thiserror::Error)]
pub enum DistError {
    #[error("missing source {path} ({kind:?} expected)")]
    MissingSource { path: PathBuf, kind: EntryKind },
    #[error("failed to clear {path}: {source}")]
    Clear {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to render page: {0}")]
    Render(#[from] RenderError),
    #[error("failed to write page {path}: {source}")]
    WritePage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistReport {
    pub files_copied: usize,
    pub page: PathBuf,
}

/// Build the bundle from `site_root` into `output_dir`.
///
/// Every manifest source is checked first; a missing one aborts before the
/// output directory is touched. The old output is then removed, the manifest
/// copied and the default play page rendered into `poolvr.html`.
pub fn build_dist(
    site_root: &Path,
    output_dir: &Path,
    manifest: &[ManifestEntry],
    renderer: &PageRenderer,
) -> Result<DistReport, DistError> {
    tracing::info!(
        "building distributable version, output directory: {}",
        output_dir.display()
    );

    for entry in manifest {
        let source = site_root.join(entry.path);
        let present = match entry.kind {
            EntryKind::File => source.is_file(),
            EntryKind::Dir => source.is_dir(),
        };
        if !present {
            return Err(DistError::MissingSource {
                path: source,
                kind: entry.kind,
            });
        }
    }

    let page = renderer.render_default()?;

    match std::fs::remove_dir_all(output_dir) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(DistError::Clear {
                path: output_dir.to_path_buf(),
                source,
            })
        }
    }

    let mut files_copied = 0;
    for entry in manifest {
        let from = site_root.join(entry.path);
        let to = output_dir.join(entry.path);
        files_copied += match entry.kind {
            EntryKind::File => copy_file(&from, &to)?,
            EntryKind::Dir => copy_dir(&from, &to)?,
        };
        tracing::debug!("copied {}", entry.path);
    }

    let page_path = output_dir.join(PLAY_TEMPLATE);
    std::fs::write(&page_path, page).map_err(|source| DistError::WritePage {
        path: page_path.clone(),
        source,
    })?;

    tracing::info!("copied {} files, wrote {}", files_copied, page_path.display());
    Ok(DistReport {
        files_copied,
        page: page_path,
    })
}

fn copy_err(from: &Path, to: &Path) -> impl FnOnce(io::Error) -> DistError {
    let (from, to) = (from.to_path_buf(), to.to_path_buf());
    move |source| DistError::Copy { from, to, source }
}

fn copy_file(from: &Path, to: &Path) -> Result<usize, DistError> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent).map_err(copy_err(from, to))?;
    }
    std::fs::copy(from, to).map_err(copy_err(from, to))?;
    Ok(1)
}

/// Mirror the tree under `from` into `to`, following symlinks.
/// A symlink loop is reported as a copy error.
fn copy_dir(from: &Path, to: &Path) -> Result<usize, DistError> {
    let mut copied = 0;
    for entry in WalkDir::new(from).follow_links(true) {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(from).to_path_buf();
            DistError::Copy {
                from: path,
                to: to.to_path_buf(),
                source: err.into(),
            }
        })?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|err| copy_err(entry.path(), to)(io::Error::other(err)))?;
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(copy_err(entry.path(), &target))?;
        } else {
            copied += copy_file(entry.path(), &target)?;
        }
    }
    Ok(copied)
}
