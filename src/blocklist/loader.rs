//! File-based blocklist loader.

use std::io::BufReader;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::info;

use super::{Blocklist, ParseError, parser_for_format};
use crate::config::{BlocklistFormat, BlocklistSource};

/// Error type for blocklist file loading operations.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("file not found: {0:?}")]
    NotFound(PathBuf),

    #[error("permission denied: {0:?}")]
    PermissionDenied(PathBuf),

    #[error("I/O error reading {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("task join error")]
    Join(#[from] tokio::task::JoinError),
}

/// Loads blocklists from local files.
pub struct FileLoader;

impl FileLoader {
    /// Load the raw entries of one blocklist file.
    ///
    /// The file is read asynchronously and parsed in a blocking task, so
    /// large lists do not stall the runtime.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] if the file cannot be opened or read, or if
    /// its content cannot be parsed.
    pub async fn load(path: &Path, format: BlocklistFormat) -> Result<Vec<String>, LoadError> {
        let path_buf = path.to_path_buf();

        let mut file = File::open(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LoadError::NotFound(path_buf.clone()),
            std::io::ErrorKind::PermissionDenied => LoadError::PermissionDenied(path_buf.clone()),
            _ => LoadError::Io {
                path: path_buf.clone(),
                source: e,
            },
        })?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .await
            .map_err(|e| LoadError::Io {
                path: path_buf.clone(),
                source: e,
            })?;

        tokio::task::spawn_blocking(move || {
            let parser = parser_for_format(format);
            parser.parse(&mut BufReader::new(content.as_bytes()))
        })
        .await?
        .map_err(|source| LoadError::Parse {
            path: path_buf,
            source,
        })
    }

    /// Build the session blocklist from inline entries plus every source file.
    ///
    /// # Errors
    ///
    /// Fails on the first source that cannot be loaded.
    pub async fn build(
        inline: &[String],
        sources: &[BlocklistSource],
    ) -> Result<Blocklist, LoadError> {
        let mut entries = inline.to_vec();
        for source in sources {
            let loaded = Self::load(&source.path, source.format).await?;
            info!(
                path = %source.path.display(),
                format = ?source.format,
                entries = loaded.len(),
                "blocklist source loaded"
            );
            entries.extend(loaded);
        }

        let blocklist = Blocklist::new(entries);
        info!(entries = blocklist.len(), "blocklist ready");
        Ok(blocklist)
    }
}
