//! Cache-aware index building.
//!
//! [`IndexBuilder::build`] returns every document under a root. It reuses
//! caches where they exist and computes embeddings for everything else.
//! While recursing it may materialize a cache in any directory whose count
//! of freshly computed documents exceeds the subcache threshold, which
//! bounds how many embeddings a single manifest holds.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::{debug, info, warn};

use crate::{
    cache::{self, CacheStore, Manifest},
    config::IndexConfig,
    document::{Document, compute_document},
    embedding::Encoders,
    error::{Error, Result},
    extractor::ChunkExtractor,
    walker,
};

/// Documents found under one directory, split by provenance.
#[derive(Debug, Default)]
struct Subtree {
    /// Documents owned by a cache in `children`.
    cached: Vec<Document>,
    /// Documents computed during this build and not yet cached.
    uncached: Vec<Document>,
    /// Directories owning caches that cover `cached`.
    children: Vec<PathBuf>,
}

impl Subtree {
    fn merge(&mut self, other: Subtree) {
        self.cached.extend(other.cached);
        self.uncached.extend(other.uncached);
        self.children.extend(other.children);
    }
}

/// Builds the document set for a directory tree.
#[derive(Clone)]
pub struct IndexBuilder {
    extractor: Arc<dyn ChunkExtractor>,
    encoders: Encoders,
    store: Arc<dyn CacheStore>,
}

impl std::fmt::Debug for IndexBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexBuilder").finish_non_exhaustive()
    }
}

impl IndexBuilder {
    pub fn new(
        extractor: Arc<dyn ChunkExtractor>,
        encoders: Encoders,
        store: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            extractor,
            encoders,
            store,
        }
    }

    /// Build the document set for `root`.
    ///
    /// `root` is canonicalized first, so document paths are absolute. With
    /// caching enabled, a usable cache at `root` is returned as-is;
    /// otherwise the tree is walked and, at the end, a cache is written at
    /// `root` for whatever no subcache already covers.
    ///
    /// Only an invalid `root` is an error. Problems with individual files,
    /// directories, embeddings or caches are logged and leave the affected
    /// documents out (or uncached) instead.
    pub fn build(
        &self,
        root: &Path,
        config: &IndexConfig,
    ) -> Result<Vec<Document>> {
        let root = root.canonicalize().map_err(|e| {
            Error::Config(format!("cannot resolve {}: {e}", root.display()))
        })?;
        if !root.is_dir() {
            return Err(Error::Config(format!(
                "not a directory: {}",
                root.display()
            )));
        }

        if config.use_cache && self.store.contains(&root) {
            let documents = cache::load(self.store.as_ref(), &root);
            if !documents.is_empty() {
                info!(
                    root = %root.display(),
                    documents = documents.len(),
                    "using cached index"
                );
                return Ok(documents);
            }
            warn!(root = %root.display(), "cache unusable, rebuilding");
        }

        let mut tree = self.index_dir(&root, config);

        let subsumed = tree.children.len() == 1 && tree.children[0] == root;
        if config.use_cache && !subsumed {
            let manifest = Manifest {
                documents: std::mem::take(&mut tree.uncached),
                children: std::mem::take(&mut tree.children),
            };
            if let Err(e) = cache::save(self.store.as_ref(), &root, &manifest)
            {
                warn!(error = %e, "index not persisted");
            }
            tree.uncached = manifest.documents;
        }

        let mut documents = tree.cached;
        documents.append(&mut tree.uncached);
        info!(
            root = %root.display(),
            documents = documents.len(),
            "built index"
        );
        Ok(documents)
    }

    /// Index one directory: subdirectories first, then its own files.
    fn index_dir(&self, dir: &Path, config: &IndexConfig) -> Subtree {
        let mut tree = Subtree::default();

        let level = match walker::read_level(dir, &config.allowed_extensions) {
            Ok(level) => level,
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory");
                return tree;
            }
        };

        for sub in &level.dirs {
            if config.use_cache && self.store.contains(sub) {
                let documents = cache::load(self.store.as_ref(), sub);
                if !documents.is_empty() {
                    debug!(dir = %sub.display(), "reusing subcache");
                    tree.cached.extend(documents);
                    tree.children.push(sub.clone());
                    continue;
                }
                warn!(dir = %sub.display(), "subcache unusable, rebuilding");
            }
            tree.merge(self.index_dir(sub, config));
        }

        for file in &level.files {
            let extractor = self.extractor.as_ref();
            match compute_document(file, extractor, &self.encoders) {
                Ok(document) => tree.uncached.push(document),
                Err(e) => warn!(error = %e, "skipping document"),
            }
        }

        if config.use_cache
            && let Some(threshold) = config.subcache_threshold
            && tree.uncached.len() > threshold
        {
            self.materialize(dir, &mut tree);
        }

        tree
    }

    /// Write a cache at `dir` covering `tree`, after which everything in
    /// `tree` counts as cached under that one cache.
    fn materialize(&self, dir: &Path, tree: &mut Subtree) {
        let manifest = Manifest {
            documents: std::mem::take(&mut tree.uncached),
            children: std::mem::take(&mut tree.children),
        };

        match cache::save(self.store.as_ref(), dir, &manifest) {
            Ok(()) => {
                debug!(
                    dir = %dir.display(),
                    documents = manifest.documents.len(),
                    "materialized subcache"
                );
                tree.cached.extend(manifest.documents);
                tree.children = vec![dir.to_path_buf()];
            }
            Err(e) => {
                warn!(error = %e, "subcache not persisted");
                tree.uncached = manifest.documents;
                tree.children = manifest.children;
            }
        }
    }
}
