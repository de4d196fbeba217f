//! Discovery and caching of the set id universe.

use crate::error::{CoreError, CoreResult};
use crate::progress::ProgressReporter;
use crate::reader::PairStreamReader;
use crate::types::SetId;
use setdex_storage::WORD_SIZE;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io::{Read, Seek};
use std::path::PathBuf;
use tracing::info;

/// On-disk encoding of a set id cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheFormat {
    /// Raw little-endian `u32` array.
    #[default]
    Binary,
    /// One decimal set id per line.
    Text,
}

/// Location and format of a set id cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetIdCache {
    /// Path of the cache file.
    pub path: PathBuf,
    /// Encoding of the cache file.
    pub format: CacheFormat,
}

impl SetIdCache {
    /// Creates a cache descriptor.
    pub fn new(path: impl Into<PathBuf>, format: CacheFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    /// Reads the cached set ids.
    ///
    /// Duplicates are removed, keeping the first occurrence.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CacheCorrupted`] if a binary cache is not a whole
    /// number of words or a text line is not a `u32`.
    pub fn load(&self) -> CoreResult<SetIdUniverse> {
        let bytes = fs::read(&self.path)?;
        let ids = match self.format {
            CacheFormat::Binary => decode_binary(&bytes)?,
            CacheFormat::Text => decode_text(&bytes)?,
        };
        Ok(SetIdUniverse::from_ids(ids))
    }

    /// Writes `universe` to the cache file, replacing any previous contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn store(&self, universe: &SetIdUniverse) -> CoreResult<()> {
        let bytes = match self.format {
            CacheFormat::Binary => universe.ids.iter().flat_map(|id| id.to_le_bytes()).collect(),
            CacheFormat::Text => {
                let mut text = String::with_capacity(universe.len() * 8);
                for id in &universe.ids {
                    text.push_str(&id.to_string());
                    text.push('\n');
                }
                text.into_bytes()
            }
        };
        fs::write(&self.path, bytes)?;
        Ok(())
    }
}

fn decode_binary(bytes: &[u8]) -> CoreResult<Vec<SetId>> {
    if bytes.len() % WORD_SIZE != 0 {
        return Err(CoreError::cache_corrupted(format!(
            "{} bytes is not a multiple of {WORD_SIZE}",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(WORD_SIZE)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn decode_text(bytes: &[u8]) -> CoreResult<Vec<SetId>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| CoreError::cache_corrupted(format!("not UTF-8: {e}")))?;
    let mut ids = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let id = line.parse::<SetId>().map_err(|e| {
            CoreError::cache_corrupted(format!("line {}: {line:?}: {e}", line_no + 1))
        })?;
        ids.push(id);
    }
    Ok(ids)
}

/// The distinct set ids present in an input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetIdUniverse {
    ids: Vec<SetId>,
}

impl SetIdUniverse {
    /// Builds a universe from `ids`, dropping repeats but keeping order.
    pub fn from_ids(ids: impl IntoIterator<Item = SetId>) -> Self {
        let mut seen = HashSet::new();
        let ids = ids.into_iter().filter(|id| seen.insert(*id)).collect();
        Self { ids }
    }

    /// The set ids in segmentation order.
    #[must_use]
    pub fn ids(&self) -> &[SetId] {
        &self.ids
    }

    /// Number of distinct set ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns `true` if no set ids were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Largest set id, if any.
    #[must_use]
    pub fn max(&self) -> Option<SetId> {
        self.ids.iter().copied().max()
    }

    /// Number of segments of `segment_size` ids.
    #[must_use]
    pub fn segment_count(&self, segment_size: usize) -> usize {
        self.ids.len().div_ceil(segment_size.max(1))
    }

    /// Splits the universe into consecutive segments of at most `segment_size` ids.
    pub fn segments(&self, segment_size: usize) -> impl Iterator<Item = &[SetId]> {
        self.ids.chunks(segment_size.max(1))
    }
}

/// Produces the [`SetIdUniverse`] for an input, from a cache when one exists.
#[derive(Debug, Clone, Default)]
pub struct SetIdUniverseBuilder {
    cache: Option<SetIdCache>,
}

impl SetIdUniverseBuilder {
    /// Creates a builder that always scans the input.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `cache` to skip the scan when it exists, or to persist the result
    /// when it does not.
    #[must_use]
    pub fn with_cache(mut self, cache: Option<SetIdCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Scans every pair of the input and collects the distinct set ids.
    ///
    /// The result is sorted ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the input fails.
    pub fn enumerate<R: Read + Seek>(
        &self,
        reader: &mut PairStreamReader<R>,
        progress: &mut ProgressReporter,
    ) -> CoreResult<SetIdUniverse> {
        let mut ids = BTreeSet::new();
        reader.scan(progress, |pair| {
            ids.insert(pair.set_id);
        })?;
        Ok(SetIdUniverse {
            ids: ids.into_iter().collect(),
        })
    }

    /// Loads the cached universe, or enumerates it and writes the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache is corrupted, the input cannot be read,
    /// or the cache cannot be written.
    pub fn load_or_enumerate<R: Read + Seek>(
        &self,
        reader: &mut PairStreamReader<R>,
        progress: &mut ProgressReporter,
    ) -> CoreResult<SetIdUniverse> {
        let universe = match &self.cache {
            Some(cache) if cache.path.exists() => {
                info!(path = ?cache.path, "loading set ids from cache");
                cache.load()?
            }
            Some(cache) => {
                info!("enumerating set ids from input, this may take a while");
                let universe = self.enumerate(reader, progress)?;
                cache.store(&universe)?;
                info!(path = ?cache.path, "set ids cached");
                universe
            }
            None => {
                info!("enumerating set ids from input");
                self.enumerate(reader, progress)?
            }
        };
        info!("{} unique set ids", universe.len());
        Ok(universe)
    }
}
