//! Persistent index caches.
//!
//! A cache covers one directory and lives in a `.recollect` subdirectory of
//! it. Its manifest lists the documents the cache owns plus references to
//! child caches further down the tree; resolving a cache loads the children
//! first and then the documents of this level. The cache tree mirrors a
//! subset of the directory tree, and no document is owned by two caches.
//!
//! Caches are trusted until deleted: nothing compares them against the files
//! they were built from. [`clear`] is the way to invalidate them.
//!
//! Storage sits behind [`CacheStore`] so the index builder runs the same
//! against [`FsCacheStore`] and the in-memory [`MemoryCacheStore`].

use std::{
    collections::{HashMap, HashSet},
    path::{Component, Path, PathBuf},
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    bundle,
    document::{Document, load_document},
    embedding::{Embedding, Modality},
    error::{Error, Result},
};

/// Name of the directory holding a cache, inside the directory it covers.
pub const CACHE_DIR_NAME: &str = ".recollect";

/// Manifest file name inside a cache directory.
pub const MANIFEST_FILE: &str = "index.json";

/// One cache level: the documents it owns and its child caches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    pub documents: Vec<Document>,
    /// Directories owning child caches; each a proper descendant of the
    /// directory this manifest covers.
    pub children: Vec<PathBuf>,
}

/// Key-value storage of manifests, keyed by the directory they cover.
pub trait CacheStore: Send + Sync {
    /// Whether a manifest exists for `dir`, without reading it.
    fn contains(&self, dir: &Path) -> bool;

    /// Read the manifest for `dir`.
    ///
    /// `Ok(None)` means no cache; [`Error::CacheReadCorrupt`] means one
    /// exists but cannot be read back.
    fn get(&self, dir: &Path) -> Result<Option<Manifest>>;

    /// Write (or replace) the manifest for `dir`.
    fn put(&self, dir: &Path, manifest: &Manifest) -> Result<()>;
}

fn corrupt(dir: &Path, reason: impl Into<String>) -> Error {
    Error::CacheReadCorrupt {
        dir: dir.to_path_buf(),
        reason: reason.into(),
    }
}

fn is_proper_descendant(dir: &Path, child: &Path) -> bool {
    child != dir
        && child.starts_with(dir)
        && !child.components().any(|c| c == Component::ParentDir)
}

/// Persist `manifest` as the cache for `dir`.
///
/// Fails without writing if a child reference is not a proper descendant of
/// `dir`.
pub fn save(
    store: &dyn CacheStore,
    dir: &Path,
    manifest: &Manifest,
) -> Result<()> {
    if let Some(bad) = manifest
        .children
        .iter()
        .find(|child| !is_proper_descendant(dir, child))
    {
        return Err(Error::Config(format!(
            "child cache {} is not below {}",
            bad.display(),
            dir.display()
        )));
    }

    store.put(dir, manifest)?;
    info!(
        dir = %dir.display(),
        documents = manifest.documents.len(),
        children = manifest.children.len(),
        "wrote cache manifest"
    );
    Ok(())
}

/// Resolve the cache tree rooted at `dir` into its documents.
///
/// Child caches come first, in manifest order, then the documents of `dir`
/// itself. Any failure anywhere in the tree (unreadable manifest or bundle,
/// missing child, overlapping ownership) makes the whole cache unusable and
/// yields an empty list, which callers treat as a miss.
pub fn load(store: &dyn CacheStore, dir: &Path) -> Vec<Document> {
    let mut seen = HashSet::new();
    match resolve(store, dir, &mut seen) {
        Ok(documents) => {
            debug!(
                dir = %dir.display(),
                documents = documents.len(),
                "loaded cache"
            );
            documents
        }
        Err(e) => {
            warn!(error = %e, "ignoring unusable cache");
            Vec::new()
        }
    }
}

fn resolve(
    store: &dyn CacheStore,
    dir: &Path,
    seen: &mut HashSet<PathBuf>,
) -> Result<Vec<Document>> {
    let manifest = store
        .get(dir)?
        .ok_or_else(|| corrupt(dir, "manifest is missing"))?;

    let mut documents = Vec::new();
    for child in &manifest.children {
        if !is_proper_descendant(dir, child) {
            return Err(corrupt(
                dir,
                format!("child {} is not below this cache", child.display()),
            ));
        }
        documents.extend(resolve(store, child, seen)?);
    }

    for document in manifest.documents {
        if !document.path.starts_with(dir) {
            return Err(corrupt(
                dir,
                format!("{} lies outside this cache", document.path.display()),
            ));
        }
        if !seen.insert(document.path.clone()) {
            return Err(corrupt(
                dir,
                format!("{} is owned twice", document.path.display()),
            ));
        }
        documents.push(document);
    }

    Ok(documents)
}

/// Remove every cache directory under `root`, including its own.
///
/// Returns how many caches were removed. Hidden directories are not
/// searched, matching where caches can be created.
pub fn clear(root: &Path) -> Result<usize> {
    let mut removed = 0;
    clear_dir(root, &mut removed)?;
    Ok(removed)
}

fn clear_dir(dir: &Path, removed: &mut usize) -> Result<()> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(
                dir = %dir.display(),
                error = %e,
                "skipping unreadable directory"
            );
            return Ok(());
        }
    };

    for entry in entries.filter_map(|e| e.ok()) {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_dir() {
            continue;
        }

        let name = entry.file_name();
        let path = entry.path();
        if name == CACHE_DIR_NAME {
            std::fs::remove_dir_all(&path)?;
            info!(dir = %path.display(), "removed cache");
            *removed += 1;
        } else if !name.to_string_lossy().starts_with('.') {
            clear_dir(&path, removed)?;
        }
    }

    Ok(())
}

/// On-disk manifest record. Paths are relative to the covered directory.
#[derive(Debug, Serialize, Deserialize)]
struct ManifestRecord {
    documents: Vec<DocumentRecord>,
    #[serde(default)]
    children: Vec<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DocumentRecord {
    path: PathBuf,
    text_embeddings_file: Option<String>,
    image_embeddings_file: Option<String>,
}

/// Stores caches in `.recollect` directories next to the documents.
///
/// Layout of `<dir>/.recollect/`:
/// - `index.json`: the manifest record
/// - `doc_<n>_text.emb`, `doc_<n>_image.emb`: one embedding bundle per
///   document and non-empty modality
///
/// The manifest is written last, through a rename, so an interrupted write
/// leaves no manifest rather than a partial one.
#[derive(Debug, Clone, Default)]
pub struct FsCacheStore;

impl FsCacheStore {
    pub fn new() -> Self {
        Self
    }

    /// The cache directory for `dir`.
    pub fn cache_dir(dir: &Path) -> PathBuf {
        dir.join(CACHE_DIR_NAME)
    }

    fn relative(dir: &Path, path: &Path) -> PathBuf {
        path.strip_prefix(dir).unwrap_or(path).to_path_buf()
    }

    fn read_bundle(
        dir: &Path,
        cache_dir: &Path,
        file: Option<&str>,
    ) -> Result<Vec<Embedding>> {
        let Some(file) = file else {
            return Ok(Vec::new());
        };
        if Path::new(file).file_name().and_then(|n| n.to_str()) != Some(file) {
            return Err(corrupt(dir, format!("bad bundle name {file:?}")));
        }
        bundle::read(&cache_dir.join(file))
            .map_err(|e| corrupt(dir, e.to_string()))
    }
}

impl CacheStore for FsCacheStore {
    fn contains(&self, dir: &Path) -> bool {
        Self::cache_dir(dir).join(MANIFEST_FILE).is_file()
    }

    fn get(&self, dir: &Path) -> Result<Option<Manifest>> {
        let cache_dir = Self::cache_dir(dir);
        let raw = match std::fs::read(cache_dir.join(MANIFEST_FILE)) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(None);
            }
            Err(e) => return Err(corrupt(dir, e.to_string())),
        };

        let record: ManifestRecord = serde_json::from_slice(&raw)
            .map_err(|e| corrupt(dir, format!("unreadable manifest: {e}")))?;

        let escapes = |p: &Path| {
            p.is_absolute() || p.components().any(|c| c == Component::ParentDir)
        };

        let mut documents = Vec::with_capacity(record.documents.len());
        for entry in record.documents {
            if escapes(&entry.path) {
                return Err(corrupt(
                    dir,
                    format!("document path {} escapes", entry.path.display()),
                ));
            }
            let text = Self::read_bundle(
                dir,
                &cache_dir,
                entry.text_embeddings_file.as_deref(),
            )?;
            let image = Self::read_bundle(
                dir,
                &cache_dir,
                entry.image_embeddings_file.as_deref(),
            )?;
            documents.push(load_document(dir.join(&entry.path), text, image));
        }

        let mut children = Vec::with_capacity(record.children.len());
        for child in record.children {
            if escapes(&child) {
                return Err(corrupt(
                    dir,
                    format!("child path {} escapes", child.display()),
                ));
            }
            children.push(dir.join(child));
        }

        Ok(Some(Manifest {
            documents,
            children,
        }))
    }

    fn put(&self, dir: &Path, manifest: &Manifest) -> Result<()> {
        let cache_dir = Self::cache_dir(dir);
        let write_err = |source| Error::CacheWrite {
            dir: cache_dir.clone(),
            source,
        };

        if cache_dir.exists() {
            std::fs::remove_dir_all(&cache_dir).map_err(write_err)?;
        }
        std::fs::create_dir_all(&cache_dir).map_err(write_err)?;

        let mut record = ManifestRecord {
            documents: Vec::with_capacity(manifest.documents.len()),
            children: manifest
                .children
                .iter()
                .map(|child| Self::relative(dir, child))
                .collect(),
        };

        for (i, document) in manifest.documents.iter().enumerate() {
            let bundle_file = |modality: Modality| -> Result<Option<String>> {
                let vectors = document.embeddings(modality);
                if vectors.is_empty() {
                    return Ok(None);
                }
                let name = format!("doc_{i}_{modality}.emb");
                let path = cache_dir.join(&name);
                let bytes = bundle::encode(&path, vectors)?;
                std::fs::write(&path, bytes).map_err(write_err)?;
                Ok(Some(name))
            };

            record.documents.push(DocumentRecord {
                path: Self::relative(dir, &document.path),
                text_embeddings_file: bundle_file(Modality::Text)?,
                image_embeddings_file: bundle_file(Modality::Image)?,
            });
        }

        let json = serde_json::to_vec_pretty(&record)?;
        let tmp = cache_dir.join(format!("{MANIFEST_FILE}.tmp"));
        std::fs::write(&tmp, json).map_err(write_err)?;
        std::fs::rename(&tmp, cache_dir.join(MANIFEST_FILE))
            .map_err(write_err)?;

        Ok(())
    }
}

/// Keeps manifests in memory. Useful for tests and for hosts that do not
/// want anything written next to the documents.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    /// `None` marks a manifest that exists but cannot be read back.
    entries: Mutex<HashMap<PathBuf, Option<Manifest>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directories that own a manifest, sorted.
    pub fn dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> =
            self.entries.lock().keys().cloned().collect();
        dirs.sort();
        dirs
    }

    /// Make the manifest at `dir` unreadable, as a damaged file would be.
    pub fn mark_corrupt(&self, dir: &Path) {
        self.entries.lock().insert(dir.to_path_buf(), None);
    }

    pub fn remove(&self, dir: &Path) -> bool {
        self.entries.lock().remove(dir).is_some()
    }
}

impl CacheStore for MemoryCacheStore {
    fn contains(&self, dir: &Path) -> bool {
        self.entries.lock().contains_key(dir)
    }

    fn get(&self, dir: &Path) -> Result<Option<Manifest>> {
        match self.entries.lock().get(dir) {
            None => Ok(None),
            Some(None) => Err(corrupt(dir, "marked corrupt")),
            Some(Some(manifest)) => Ok(Some(manifest.clone())),
        }
    }

    fn put(&self, dir: &Path, manifest: &Manifest) -> Result<()> {
        self.entries
            .lock()
            .insert(dir.to_path_buf(), Some(manifest.clone()));
        Ok(())
    }
}
