use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    embedding::{Embedding, Encoders, Modality},
    error::Result,
    extractor::ChunkExtractor,
};

/// An indexed document and its embeddings.
///
/// Text embeddings correspond in order to the extracted text chunks, image
/// embeddings to the extracted sub-images. Documents are never mutated once
/// created.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Absolute path of the source file; the document's identity.
    pub path: PathBuf,
    pub text_embeddings: Vec<Embedding>,
    pub image_embeddings: Vec<Embedding>,
}

impl Document {
    /// Whether the document has nothing to score against.
    pub fn is_empty(&self) -> bool {
        self.text_embeddings.is_empty() && self.image_embeddings.is_empty()
    }

    pub fn embeddings(&self, modality: Modality) -> &[Embedding] {
        match modality {
            Modality::Text => &self.text_embeddings,
            Modality::Image => &self.image_embeddings,
        }
    }
}

impl std::fmt::Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Build a document from embeddings that were computed earlier.
pub fn load_document(
    path: PathBuf,
    text_embeddings: Vec<Embedding>,
    image_embeddings: Vec<Embedding>,
) -> Document {
    Document {
        path,
        text_embeddings,
        image_embeddings,
    }
}

/// Extract a document and embed every chunk and sub-image.
///
/// An extractor failure (typically [`crate::Error::UnsupportedFormat`]) is
/// returned to the caller. A failed encoder call only drops that one vector;
/// the document keeps whatever embeddings succeeded.
pub fn compute_document(
    path: &Path,
    extractor: &dyn ChunkExtractor,
    encoders: &Encoders,
) -> Result<Document> {
    let extraction = extractor.extract(path)?;

    let text_embeddings =
        embed_all(path, Modality::Text, &extraction.text_chunks, |chunk| {
            encoders.text.encode_text(chunk)
        });
    let image_embeddings =
        embed_all(path, Modality::Image, &extraction.sub_images, |image| {
            encoders.image.encode_image(image)
        });

    debug!(
        path = %path.display(),
        text = text_embeddings.len(),
        image = image_embeddings.len(),
        "computed document embeddings"
    );

    Ok(load_document(
        path.to_path_buf(),
        text_embeddings,
        image_embeddings,
    ))
}

fn embed_all<T>(
    path: &Path,
    modality: Modality,
    inputs: &[T],
    encode: impl Fn(&T) -> Result<Embedding>,
) -> Vec<Embedding> {
    inputs
        .iter()
        .enumerate()
        .filter_map(|(i, input)| match encode(input) {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    %modality,
                    index = i,
                    error = %e,
                    "dropping embedding"
                );
                None
            }
        })
        .collect()
}
