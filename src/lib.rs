//! recollect - semantic search over directory trees of scanned documents.
//!
//! Every document is reduced to a set of embeddings: one per text chunk and
//! one per sub-image. An index build caches them in `.recollect`
//! directories inside the indexed tree, possibly split into nested caches,
//! so later builds skip the embedding work. A search ranks documents by
//! their best cosine similarity to the query in either modality.
//!
//! Text extraction and the embedding models are pluggable: see
//! [`extractor::ChunkExtractor`], [`embedding::TextEncoder`] and
//! [`embedding::ImageEncoder`].
//!
//! # Quick start
//!
//! ```no_run
//! use std::{path::Path, sync::Arc};
//!
//! use recollect::{
//!     Encoders, IndexBuilder, IndexConfig, SearchEngine, SearchParams,
//!     cache::FsCacheStore, embedding::HashingEncoder,
//!     extractor::TextExtractor,
//! };
//!
//! let encoder = Arc::new(HashingEncoder::default());
//! let encoders = Encoders::new(encoder.clone(), encoder);
//!
//! let builder = IndexBuilder::new(
//!     Arc::new(TextExtractor::default()),
//!     encoders.clone(),
//!     Arc::new(FsCacheStore::new()),
//! );
//! let config = IndexConfig::default().with_subcache_threshold(Some(500));
//! let documents = builder.build(Path::new("./scans"), &config).unwrap();
//!
//! let engine = SearchEngine::new(encoders);
//! for hit in engine.rank("a rocket", &documents, &SearchParams::default()) {
//!     println!("[{:.3}] {}", hit.score, hit.document);
//! }
//! ```

pub mod bundle;
pub mod cache;
pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod index;
pub mod live;
pub mod search;
pub mod walker;

pub use cache::{CacheStore, FsCacheStore, Manifest, MemoryCacheStore};
pub use config::{IndexConfig, SearchParams, Settings};
pub use document::{Document, compute_document, load_document};
pub use embedding::{
    Embedding, Encoders, ImageEncoder, Modality, SubImage, TextEncoder,
};
pub use error::{Error, Result};
pub use extractor::{ChunkExtractor, Extraction};
pub use index::IndexBuilder;
pub use live::LiveIndex;
pub use search::{RankedDocument, SearchEngine, cosine_similarity};
