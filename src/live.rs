//! A document set that can be rebuilt while it is being searched.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::{Mutex, RwLock};
use tracing::info;

use crate::{
    config::{IndexConfig, SearchParams},
    document::Document,
    error::{Error, Result},
    index::IndexBuilder,
    search::SearchEngine,
};

/// Holds the current document set of one root.
///
/// Readers clone an `Arc` snapshot and search it without holding any lock.
/// A finished build replaces the snapshot in one swap, so readers see either
/// the old set or the new one. Only one build runs at a time; a second
/// request while one is running fails with [`Error::BuildInProgress`].
#[derive(Debug)]
pub struct LiveIndex {
    builder: IndexBuilder,
    root: PathBuf,
    config: IndexConfig,
    snapshot: RwLock<Arc<Vec<Document>>>,
    build_lock: Mutex<()>,
}

impl LiveIndex {
    /// Start with an empty document set. Call [`LiveIndex::rebuild`] or
    /// [`LiveIndex::spawn_rebuild`] to populate it.
    pub fn new(
        builder: IndexBuilder,
        root: &Path,
        config: IndexConfig,
    ) -> Self {
        Self {
            builder,
            root: root.to_path_buf(),
            config,
            snapshot: RwLock::new(Arc::new(Vec::new())),
            build_lock: Mutex::new(()),
        }
    }

    /// The current document set.
    pub fn snapshot(&self) -> Arc<Vec<Document>> {
        self.snapshot.read().clone()
    }

    pub fn is_building(&self) -> bool {
        self.build_lock.is_locked()
    }

    /// Build the index and publish it. Returns the new document count.
    ///
    /// On failure the previous snapshot stays in place.
    pub fn rebuild(&self) -> Result<usize> {
        let Some(_guard) = self.build_lock.try_lock() else {
            return Err(Error::BuildInProgress(self.root.clone()));
        };

        let documents = self.builder.build(&self.root, &self.config)?;
        let count = documents.len();
        *self.snapshot.write() = Arc::new(documents);

        info!(
            root = %self.root.display(),
            documents = count,
            "published index"
        );
        Ok(count)
    }

    /// Run [`LiveIndex::rebuild`] on tokio's blocking pool.
    pub fn spawn_rebuild(
        self: &Arc<Self>,
    ) -> tokio::task::JoinHandle<Result<usize>> {
        let this = Arc::clone(self);
        tokio::task::spawn_blocking(move || this.rebuild())
    }

    /// Search the current snapshot, returning owned documents so the result
    /// outlives any later swap.
    pub fn search(
        &self,
        engine: &SearchEngine,
        query: &str,
        params: &SearchParams,
    ) -> Vec<Document> {
        let snapshot = self.snapshot();
        engine
            .search(query, &snapshot, params)
            .into_iter()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Barrier,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::{
        cache::MemoryCacheStore,
        embedding::{Encoders, HashingEncoder},
        extractor::{Extraction, TextExtractor},
    };

    fn hashing() -> Encoders {
        let encoder = Arc::new(HashingEncoder::new(256));
        Encoders::new(encoder.clone(), encoder)
    }

    fn text_builder() -> IndexBuilder {
        IndexBuilder::new(
            Arc::new(TextExtractor::default()),
            hashing(),
            Arc::new(MemoryCacheStore::new()),
        )
    }

    fn txt_config() -> IndexConfig {
        IndexConfig::default().with_extensions(["txt"])
    }

    #[test]
    fn starts_empty_and_publishes_builds() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("bridge.txt"), "A bridge.").unwrap();
        std::fs::write(tmp.path().join("dog.txt"), "A dog barks.").unwrap();

        let live = LiveIndex::new(text_builder(), tmp.path(), txt_config());
        assert!(live.snapshot().is_empty());

        assert_eq!(live.rebuild().unwrap(), 2);
        assert_eq!(live.snapshot().len(), 2);

        let engine = SearchEngine::new(hashing());
        let hits = live.search(&engine, "dog barks", &SearchParams::default());
        assert!(hits[0].path.ends_with("dog.txt"));
    }

    #[test]
    fn old_snapshot_survives_a_swap() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "First.").unwrap();

        let config = txt_config().with_cache(false);
        let live = LiveIndex::new(text_builder(), tmp.path(), config);
        live.rebuild().unwrap();
        let before = live.snapshot();

        std::fs::write(tmp.path().join("b.txt"), "Second.").unwrap();
        live.rebuild().unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(live.snapshot().len(), 2);
    }

    #[test]
    fn failed_build_keeps_previous_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("docs");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(root.join("a.txt"), "Kept.").unwrap();

        let live = LiveIndex::new(text_builder(), &root, txt_config());
        live.rebuild().unwrap();

        std::fs::remove_dir_all(&root).unwrap();
        assert!(live.rebuild().is_err());
        assert_eq!(live.snapshot().len(), 1);
    }

    #[test]
    fn concurrent_rebuild_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "Slow.").unwrap();

        // Blocks the first extraction until the second rebuild was tried.
        let entered = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));
        let calls = Arc::new(AtomicUsize::new(0));
        let extractor = {
            let (entered, release, calls) =
                (entered.clone(), release.clone(), calls.clone());
            move |_: &Path| -> Result<Extraction> {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    entered.wait();
                    release.wait();
                }
                Ok(Extraction {
                    text_chunks: vec!["slow".to_string()],
                    sub_images: vec![],
                })
            }
        };
        let builder = IndexBuilder::new(
            Arc::new(extractor),
            hashing(),
            Arc::new(MemoryCacheStore::new()),
        );
        let live = Arc::new(LiveIndex::new(builder, tmp.path(), txt_config()));

        let background = {
            let live = live.clone();
            std::thread::spawn(move || live.rebuild())
        };
        entered.wait();

        assert!(live.is_building());
        assert!(matches!(live.rebuild(), Err(Error::BuildInProgress(_))));

        release.wait();
        assert_eq!(background.join().unwrap().unwrap(), 1);
        assert!(!live.is_building());
    }
}
