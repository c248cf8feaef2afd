//! Write-once file cache addressed by digest
//!
//! Entries live at `<dir>/<prefix>.<digest>.<extension>`. An entry is written
//! at most once and never modified afterwards; an existing file is trusted
//! as-is on lookup.

use crate::cache::digest::{digest_hex, is_digest};
use crate::error::{ScriptrunError, ScriptrunResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Prefix for in-flight temporary files inside the cache directory
const TEMP_PREFIX: &str = ".scriptrun-";

/// Format bytes as human-readable size (e.g., "1.5 MB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// A materialized cache file
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    pub path: PathBuf,
    pub prefix: String,
    pub digest: String,
    pub extension: String,
    /// File size in bytes
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

impl CacheEntry {
    /// Parse `<prefix>.<digest>.<extension>`; `None` for anything else.
    ///
    /// Neither the prefix nor the extension may contain a dot, matching what
    /// `materialize` accepts.
    fn parse_name(name: &str) -> Option<(String, String, String)> {
        let mut parts = name.split('.');
        let (Some(prefix), Some(digest), Some(extension), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return None;
        };

        if prefix.is_empty() || extension.is_empty() || !is_digest(digest) {
            return None;
        }
        Some((prefix.to_string(), digest.to_string(), extension.to_string()))
    }

    /// Files an interpreter derived from an entry, named `<entry name>.<suffix>`
    fn is_derived_name(name: &str) -> bool {
        name.match_indices('.')
            .nth(2)
            .is_some_and(|(end, _)| Self::parse_name(&name[..end]).is_some())
    }
}

/// Content-addressable cache rooted at one directory
#[derive(Debug, Clone)]
pub struct ContentCache {
    dir: PathBuf,
}

impl ContentCache {
    /// Open the cache, creating its directory if missing
    pub fn open(dir: impl Into<PathBuf>) -> ScriptrunResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| ScriptrunError::CacheDirCreate {
            path: dir.clone(),
            source: e,
        })?;
        debug!("Cache directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path an entry would have; does not touch the filesystem
    pub fn entry_path(&self, digest: &str, prefix: &str, extension: &str) -> PathBuf {
        self.dir.join(format!("{}.{}.{}", prefix, digest, extension))
    }

    /// Existing entry for the given identity, if any
    pub fn lookup(&self, digest: &str, prefix: &str, extension: &str) -> Option<PathBuf> {
        let path = self.entry_path(digest, prefix, extension);
        path.is_file().then_some(path)
    }

    /// Ensure a file holding `bytes` exists, keyed by the digest of `bytes`
    pub fn materialize(
        &self,
        bytes: &[u8],
        prefix: &str,
        extension: &str,
    ) -> ScriptrunResult<PathBuf> {
        self.store(&digest_hex(bytes), bytes, prefix, extension)
    }

    /// Ensure a file holding `bytes` exists, keyed by the digest of `key`.
    ///
    /// If an entry for `key` already exists it wins, even when `bytes` differ.
    pub fn materialize_keyed(
        &self,
        key: &[u8],
        bytes: &[u8],
        prefix: &str,
        extension: &str,
    ) -> ScriptrunResult<PathBuf> {
        self.store(&digest_hex(key), bytes, prefix, extension)
    }

    fn store(
        &self,
        digest: &str,
        bytes: &[u8],
        prefix: &str,
        extension: &str,
    ) -> ScriptrunResult<PathBuf> {
        let path = self.entry_path(digest, prefix, extension);
        validate_component(&path, prefix, "prefix")?;
        validate_component(&path, extension, "extension")?;

        if path.exists() {
            debug!("Cache hit: {}", path.display());
            return Ok(path);
        }

        let write_err = |source: io::Error| ScriptrunError::CacheWrite {
            path: path.clone(),
            source,
        };

        // Readers only ever see complete files: write aside, then publish.
        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(".tmp")
            .tempfile_in(&self.dir)
            .map_err(write_err)?;
        tmp.write_all(bytes).map_err(write_err)?;
        tmp.flush().map_err(write_err)?;

        match tmp.persist_noclobber(&path) {
            Ok(_) => {
                info!("Cached {} ({})", path.display(), format_bytes(bytes.len() as u64));
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                // A concurrent writer published the same identity first.
                debug!("Cache entry appeared concurrently: {}", path.display());
            }
            Err(e) => return Err(write_err(e.error)),
        }
        Ok(path)
    }

    /// All well-formed entries, sorted by file name
    pub fn entries(&self) -> ScriptrunResult<Vec<CacheEntry>> {
        let read_dir = fs::read_dir(&self.dir).map_err(|e| {
            ScriptrunError::io(format!("reading cache directory {}", self.dir.display()), e)
        })?;

        let mut entries = Vec::new();
        for dirent in read_dir {
            let dirent = dirent
                .map_err(|e| ScriptrunError::io("reading cache directory entry", e))?;
            let name = dirent.file_name();
            let Some((prefix, digest, extension)) =
                name.to_str().and_then(CacheEntry::parse_name)
            else {
                continue;
            };

            let metadata = dirent.metadata().map_err(|e| {
                ScriptrunError::io(format!("reading metadata of {}", dirent.path().display()), e)
            })?;
            if !metadata.is_file() {
                continue;
            }

            entries.push(CacheEntry {
                path: dirent.path(),
                prefix,
                digest,
                extension,
                size: metadata.len(),
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    /// Re-hash content-addressed entries and return those whose content no
    /// longer matches their digest.
    ///
    /// Entries whose prefix is in `keyed_prefixes` are skipped, since their
    /// digest is over an external key rather than the file content.
    pub fn verify(&self, keyed_prefixes: &[&str]) -> ScriptrunResult<Vec<CacheEntry>> {
        let mut corrupt = Vec::new();
        for entry in self.entries()? {
            if keyed_prefixes.contains(&entry.prefix.as_str()) {
                continue;
            }
            let content = fs::read(&entry.path).map_err(|e| {
                ScriptrunError::io(format!("reading cache entry {}", entry.path.display()), e)
            })?;
            if digest_hex(&content) != entry.digest {
                debug!("Digest mismatch: {}", entry.path.display());
                corrupt.push(entry);
            }
        }
        Ok(corrupt)
    }

    /// Remove every entry, files derived from entries (such as compiled
    /// programs) and leftover temporary files, returning the entry count.
    ///
    /// Never called implicitly; the cache otherwise only grows.
    pub fn clear(&self) -> ScriptrunResult<usize> {
        let entries = self.entries()?;
        for entry in &entries {
            fs::remove_file(&entry.path).map_err(|e| {
                ScriptrunError::io(format!("removing {}", entry.path.display()), e)
            })?;
        }

        if let Ok(read_dir) = fs::read_dir(&self.dir) {
            for dirent in read_dir.flatten() {
                let leftover = dirent
                    .file_name()
                    .to_str()
                    .is_some_and(|n| n.starts_with(TEMP_PREFIX) || CacheEntry::is_derived_name(n));
                if leftover && dirent.path().is_file() {
                    let _ = fs::remove_file(dirent.path());
                }
            }
        }

        info!("Removed {} cache entries", entries.len());
        Ok(entries.len())
    }
}

/// Reject name parts that would escape the directory or break parsing
fn validate_component(path: &Path, value: &str, what: &str) -> ScriptrunResult<()> {
    let bad = value.is_empty()
        || value.contains('.')
        || value.contains('/')
        || value.contains('\\');
    if bad {
        return Err(ScriptrunError::CacheWrite {
            path: path.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid cache {} '{}'", what, value),
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cache() -> (TempDir, ContentCache) {
        let dir = TempDir::new().unwrap();
        let cache = ContentCache::open(dir.path().join("cache")).unwrap();
        (dir, cache)
    }

    #[test]
    fn open_creates_directory() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("a").join("b");
        let cache = ContentCache::open(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(cache.dir(), root);
    }

    #[test]
    fn materialize_path_shape() {
        let (_dir, cache) = cache();
        let path = cache.materialize(b"hello", "scriptlet", "kts").unwrap();

        let name = path.file_name().unwrap().to_str().unwrap();
        assert_eq!(name, format!("scriptlet.{}.kts", digest_hex(b"hello")));
        assert_eq!(fs::read(&path).unwrap(), b"hello");
    }

    #[test]
    fn materialize_deterministic() {
        let (_dir, cache) = cache();
        let a = cache.materialize(b"same bytes", "p", "kts").unwrap();
        let b = cache.materialize(b"same bytes", "p", "kts").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn digest_independent_of_prefix_and_extension() {
        let (_dir, cache) = cache();
        let a = cache.materialize(b"body", "one", "kts").unwrap();
        let b = cache.materialize(b"body", "two", "kt").unwrap();

        let digest_of = |p: &Path| {
            CacheEntry::parse_name(p.file_name().unwrap().to_str().unwrap())
                .unwrap()
                .1
        };
        assert_ne!(a, b);
        assert_eq!(digest_of(&a), digest_of(&b));
    }

    #[test]
    fn existing_entry_is_not_rewritten() {
        let (_dir, cache) = cache();
        let path = cache.materialize(b"original", "p", "kts").unwrap();

        // A second call must not touch the file, so a hand edit survives.
        fs::write(&path, b"edited").unwrap();
        let again = cache.materialize(b"original", "p", "kts").unwrap();

        assert_eq!(again, path);
        assert_eq!(fs::read(&path).unwrap(), b"edited");
    }

    #[test]
    fn keyed_entry_keeps_first_content() {
        let (_dir, cache) = cache();
        let first = cache
            .materialize_keyed(b"https://x/a", b"v1", "url", "kts")
            .unwrap();
        let second = cache
            .materialize_keyed(b"https://x/a", b"v2", "url", "kts")
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(fs::read_to_string(&first).unwrap(), "v1");
    }

    #[test]
    fn lookup_finds_only_existing() {
        let (_dir, cache) = cache();
        let digest = digest_hex(b"x");
        assert!(cache.lookup(&digest, "p", "kts").is_none());
        let path = cache.materialize(b"x", "p", "kts").unwrap();
        assert_eq!(cache.lookup(&digest, "p", "kts"), Some(path));
    }

    #[test]
    fn concurrent_materialize_is_idempotent() {
        let (_dir, cache) = cache();
        let payload = vec![b'z'; 256 * 1024];

        let paths: Vec<PathBuf> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| cache.materialize(&payload, "race", "bin").unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(paths.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(fs::read(&paths[0]).unwrap(), payload);
        // No temp files left behind.
        assert_eq!(fs::read_dir(cache.dir()).unwrap().count(), 1);
    }

    #[test]
    fn rejects_bad_components() {
        let (_dir, cache) = cache();
        assert!(cache.materialize(b"x", "../up", "kts").is_err());
        assert!(cache.materialize(b"x", "p", "tar.gz").is_err());
        assert!(cache.materialize(b"x", "", "kts").is_err());
    }

    #[test]
    fn entries_lists_only_well_formed_files() {
        let (_dir, cache) = cache();
        cache.materialize(b"a", "scriptlet", "kts").unwrap();
        cache.materialize(b"b", "url", "kt").unwrap();
        fs::write(cache.dir().join("notes.txt"), "ignore me").unwrap();
        fs::write(cache.dir().join(".scriptrun-abc.tmp"), "partial").unwrap();

        let entries = cache.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].prefix, "scriptlet");
        assert_eq!(entries[0].size, 1);
        assert_eq!(entries[1].extension, "kt");
        assert!(entries[0].modified.is_some());
    }

    #[test]
    fn verify_reports_tampered_entries() {
        let (_dir, cache) = cache();
        let good = cache.materialize(b"good", "scriptlet", "kts").unwrap();
        let bad = cache.materialize(b"bad", "scriptlet", "kts").unwrap();
        let keyed = cache
            .materialize_keyed(b"https://x", b"body", "url", "kts")
            .unwrap();
        fs::write(&bad, b"tampered").unwrap();

        let corrupt = cache.verify(&["url"]).unwrap();
        assert_eq!(corrupt.len(), 1);
        assert_eq!(corrupt[0].path, bad);
        assert!(good.exists() && keyed.exists());
    }

    #[test]
    fn clear_removes_entries_and_temp_files() {
        let (_dir, cache) = cache();
        cache.materialize(b"a", "scriptlet", "kts").unwrap();
        cache.materialize(b"b", "scriptlet", "kts").unwrap();
        let program = cache.materialize(b"fun main() {}", "url", "kt").unwrap();
        fs::write(cache.dir().join(".scriptrun-left.tmp"), "x").unwrap();
        fs::write(format!("{}.jar", program.display()), "compiled").unwrap();
        fs::write(cache.dir().join("notes.txt"), "not ours").unwrap();

        assert_eq!(cache.clear().unwrap(), 3);
        let left: Vec<_> = fs::read_dir(cache.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(left, ["notes.txt"]);
    }

    #[test]
    fn parse_name_rules() {
        let d = digest_hex("x");
        assert!(CacheEntry::parse_name(&format!("scriptlet.{}.kts", d)).is_some());
        assert!(CacheEntry::parse_name("scriptlet.nothex.kts").is_none());
        assert!(CacheEntry::parse_name(&format!(".hidden.{}.kts", d)).is_none());
        assert!(CacheEntry::parse_name(&format!("scriptlet.{}.kts.jar", d)).is_none());
    }

    #[test]
    fn listed_names_are_exactly_the_writable_ones() {
        let (_dir, cache) = cache();
        let d = digest_hex("x");

        // A dotted prefix can never be written, so it is not listed either.
        assert!(cache.materialize(b"x", "my.prefix", "kts").is_err());
        assert!(CacheEntry::parse_name(&format!("my.prefix.{}.kts", d)).is_none());
        fs::write(cache.dir().join(format!("my.prefix.{}.kts", d)), "x").unwrap();
        assert!(cache.entries().unwrap().is_empty());

        let written = cache.materialize(b"x", "my_prefix", "kts").unwrap();
        let name = written.file_name().unwrap().to_str().unwrap();
        assert!(CacheEntry::parse_name(name).is_some());
    }

    #[test]
    fn derived_names() {
        let d = digest_hex("x");
        assert!(CacheEntry::is_derived_name(&format!("url.{}.kt.jar", d)));
        assert!(!CacheEntry::is_derived_name(&format!("url.{}.kt", d)));
        assert!(!CacheEntry::is_derived_name("a.b.c.d"));
    }

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
