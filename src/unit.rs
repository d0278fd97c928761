//! Translation units and their persisted intermediate form.
//!
//! A unit is one parsed source tree together with its closed symbol table.
//! The pair serializes to JSON so dependent builds can skip re-discovery of
//! unchanged files; staleness checking is by modification time.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::debug;

use crate::base::SourceSet;
use crate::error::{Error, Result};
use crate::symbols::{discover, SymbolTable};
use crate::tree::Element;

/// One compiled source file: its tree, closed symbols, and import list.
#[derive(Debug, Serialize, Deserialize)]
pub struct TranslationUnit {
    /// Source path under which the unit was registered.
    pub path: SmolStr,
    pub tree: Element,
    pub symbols: SymbolTable,
    /// Paths named by `use` declarations, in written order.
    pub uses: Vec<SmolStr>,
}

impl TranslationUnit {
    /// Discover, resolve and close a parsed tree into a unit.
    ///
    /// `sources` supplies the [`crate::base::SourceId`] that stamps every
    /// location produced while converting this tree.
    pub fn build(path: &str, tree: Element, sources: &SourceSet) -> Result<Self> {
        let source = Some(sources.register(path));
        let mut symbols = SymbolTable::new();
        let uses = discover(&mut symbols, &tree, source)?;
        symbols.resolve_all(None)?;
        symbols.close()?;
        debug!(path, symbols = symbols.len(), "unit built");
        Ok(Self {
            path: SmolStr::new(path),
            tree,
            symbols,
            uses,
        })
    }

    /// Rebuild a unit from an already-closed table, as read back from cache.
    pub fn from_parts(path: &str, tree: Element, symbols: SymbolTable, uses: Vec<SmolStr>) -> Self {
        Self {
            path: SmolStr::new(path),
            tree,
            symbols,
            uses,
        }
    }

    pub fn store(&self, cache: &Path) -> Result<()> {
        let json = serde_json::to_string(self).map_err(|err| Error::Persist {
            path: cache.display().to_string(),
            message: err.to_string(),
        })?;
        fs::write(cache, json).map_err(|source| Error::Io {
            path: cache.display().to_string(),
            source,
        })
    }

    pub fn load(cache: &Path) -> Result<Self> {
        let json = fs::read_to_string(cache).map_err(|source| Error::Io {
            path: cache.display().to_string(),
            source,
        })?;
        let unit: TranslationUnit = serde_json::from_str(&json).map_err(|err| Error::Persist {
            path: cache.display().to_string(),
            message: err.to_string(),
        })?;
        if !unit.symbols.is_closed() {
            return Err(Error::Persist {
                path: cache.display().to_string(),
                message: "cached symbol table is not closed".to_string(),
            });
        }
        Ok(unit)
    }

    /// Whether `cache` is missing or older than `source`.
    pub fn is_stale(source: &Path, cache: &Path) -> Result<bool> {
        let Ok(cache_meta) = fs::metadata(cache) else {
            return Ok(true);
        };
        let source_meta = fs::metadata(source).map_err(|err| Error::Io {
            path: source.display().to_string(),
            source: err,
        })?;
        let source_time = modified(&source_meta, source)?;
        let cache_time = modified(&cache_meta, cache)?;
        Ok(source_time > cache_time)
    }

    /// Load the cached unit when fresh, otherwise parse and rebuild it.
    pub fn load_or_build<F>(
        source: &Path,
        cache: &Path,
        sources: &SourceSet,
        parse: F,
    ) -> Result<Self>
    where
        F: FnOnce() -> Result<Element>,
    {
        if !Self::is_stale(source, cache)? {
            match Self::load(cache) {
                Ok(unit) => {
                    debug!(path = %source.display(), "unit loaded from cache");
                    return Ok(unit);
                }
                Err(err) => {
                    debug!(path = %cache.display(), %err, "cache unusable, rebuilding");
                }
            }
        }
        let tree = parse()?;
        let unit = Self::build(&source.display().to_string(), tree, sources)?;
        unit.store(cache)?;
        Ok(unit)
    }
}

fn modified(meta: &fs::Metadata, path: &Path) -> Result<SystemTime> {
    meta.modified().map_err(|source| Error::Io {
        path: path.display().to_string(),
        source,
    })
}
