use image::{ImageFormat, RgbImage};
use rand::{distr::Alphanumeric, Rng};
use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;

const PROCESSED_PREFIX: &str = "processed_";
const SUFFIX_LEN: usize = 7;
const MAX_SAVE_ATTEMPTS: usize = 100;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Could not find a free name for {0}")]
    NameExhausted(String),
    #[error("Cannot encode {0}: unknown image extension")]
    UnknownFormat(String),
    #[error("Failed to encode {name}: {source}")]
    Encode {
        name: String,
        #[source]
        source: image::ImageError,
    },
}

/// Flat directory holding uploads and their `processed_` counterparts.
#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| StorageError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Stores an upload without ever replacing an existing file and returns
    /// the name actually used.
    pub fn save(&self, client_name: &str, data: &[u8]) -> Result<String, StorageError> {
        let name = valid_name(client_name);
        let mut candidate = name.clone();

        for _ in 0..MAX_SAVE_ATTEMPTS {
            let path = self.path(&candidate);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(data)
                        .map_err(|source| StorageError::Io { path, source })?;
                    tracing::debug!("Stored upload as {}", candidate);
                    return Ok(candidate);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    candidate = with_random_suffix(&name, &mut rand::rng());
                }
                Err(source) => return Err(StorageError::Io { path, source }),
            }
        }

        Err(StorageError::NameExhausted(name))
    }

    /// Writes the derived image next to the original, replacing any
    /// previous one. Format follows the stored extension.
    pub fn save_processed(&self, stored_name: &str, image: &RgbImage) -> Result<String, StorageError> {
        let processed = processed_name(stored_name);
        let path = self.path(&processed);
        let format = ImageFormat::from_path(&path)
            .map_err(|_| StorageError::UnknownFormat(processed.clone()))?;

        image
            .save_with_format(&path, format)
            .map_err(|source| StorageError::Encode {
                name: processed.clone(),
                source,
            })?;

        Ok(processed)
    }
}

pub fn processed_name(stored_name: &str) -> String {
    format!("{}{}", PROCESSED_PREFIX, stored_name)
}

/// Keeps the basename only, turns spaces into underscores and drops
/// anything that is not alphanumeric, `-`, `_` or `.`.
pub fn valid_name(client_name: &str) -> String {
    let basename = client_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    let cleaned: String = basename
        .chars()
        .map(|c| if c == ' ' { '_' } else { c })
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        return "upload".to_string();
    }
    cleaned
}

fn with_random_suffix<R: Rng>(name: &str, rng: &mut R) -> String {
    let suffix: String = rng
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect();

    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}_{}.{}", stem, suffix, ext),
        _ => format!("{}_{}", name, suffix),
    }
}
