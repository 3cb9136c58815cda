#![allow(dead_code)]

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use recollect::{
    ChunkExtractor, Embedding, Encoders, Error, Extraction, ImageEncoder,
    IndexBuilder, Modality, Result, SubImage, TextEncoder,
    cache::CacheStore, extractor::ExtensionRouter,
    extractor::TextExtractor,
};

/// Concept axes of the fake embedding space. A text lands on every axis one
/// of its words belongs to.
const CONCEPTS: &[&[&str]] = &[
    &[
        "animal", "animals", "dog", "dogs", "horse", "horses", "barks",
        "gallops",
    ],
    &["person", "programmer", "code", "writes", "software"],
    &["bridge", "construction", "building", "steel"],
    &["rocket", "launch", "space"],
];

pub const DIMENSION: usize = CONCEPTS.len();

fn concept_vector(text: &str) -> Embedding {
    let mut vector = vec![0.0f32; DIMENSION];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
    {
        for (axis, words) in CONCEPTS.iter().enumerate() {
            if words.contains(&word.as_str()) {
                vector[axis] += 1.0;
            }
        }
    }
    vector
}

/// Deterministic text encoder over [`CONCEPTS`].
#[derive(Debug, Default)]
pub struct ConceptEncoder;

impl TextEncoder for ConceptEncoder {
    fn encode_text(&self, text: &str) -> Result<Embedding> {
        Ok(concept_vector(text))
    }
}

/// Image-side encoder: text queries map to the same axes, and an image's
/// pixels are read as the ASCII words it "depicts".
#[derive(Debug, Default)]
pub struct PictureEncoder;

impl TextEncoder for PictureEncoder {
    fn encode_text(&self, text: &str) -> Result<Embedding> {
        Ok(concept_vector(text))
    }
}

impl ImageEncoder for PictureEncoder {
    fn encode_image(&self, image: &SubImage) -> Result<Embedding> {
        let depicted = std::str::from_utf8(&image.pixels).map_err(|e| {
            Error::EmbeddingFailure {
                modality: Modality::Image,
                message: e.to_string(),
            }
        })?;
        Ok(concept_vector(depicted))
    }
}

pub fn encoders() -> Encoders {
    Encoders::new(Arc::new(ConceptEncoder), Arc::new(PictureEncoder))
}

/// Reads a `.png` fixture as one sub-image whose pixels are the file bytes.
pub fn picture_extractor(path: &Path) -> Result<Extraction> {
    let bytes = std::fs::read(path)?;
    Ok(Extraction {
        text_chunks: Vec::new(),
        sub_images: vec![SubImage {
            width: 1,
            height: 1,
            pixels: bytes,
        }],
    })
}

pub fn extractor() -> Arc<dyn ChunkExtractor> {
    Arc::new(
        ExtensionRouter::new()
            .route(["txt"], TextExtractor::default())
            .route(["png"], picture_extractor),
    )
}

pub fn builder(store: Arc<dyn CacheStore>) -> IndexBuilder {
    IndexBuilder::new(extractor(), encoders(), store)
}

/// Write `files` (relative path, contents) under a fresh temporary
/// directory. Returns the guard and the canonical root.
pub fn tree(files: &[(&str, &str)]) -> (tempfile::TempDir, PathBuf) {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    for (rel, contents) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }
    (tmp, root)
}

/// The corpus used by the ranking scenarios.
pub fn corpus() -> (tempfile::TempDir, PathBuf) {
    tree(&[
        ("dog.txt", "The dog barks at the mailman."),
        ("horse.txt", "A horse gallops across the field."),
        ("programmer.txt", "The programmer writes software all day."),
        ("notes/bridge.txt", "Construction of the steel bridge began."),
        ("notes/blank.txt", ""),
        ("scans/rocket.png", "rocket launch"),
        ("scans/deep/more/beams.txt", "Steel beams for building."),
    ])
}

pub fn file_names(paths: impl IntoIterator<Item = PathBuf>) -> Vec<String> {
    paths
        .into_iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect()
}
