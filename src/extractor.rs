//! Text and sub-image extraction.
//!
//! Extraction backends (OCR, PDF text, image-region detection) live outside
//! the core and plug in through [`ChunkExtractor`]. The crate ships a
//! plain-text extractor and a router that dispatches on file extension.

use std::{collections::HashMap, fmt, path::Path, sync::Arc};

use crate::{
    chunking::{DEFAULT_MAX_CHUNK_CHARS, chunk_document},
    embedding::SubImage,
    error::{Error, Result},
    walker::normalize_extension,
};

/// Everything extracted from one document, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub text_chunks: Vec<String>,
    /// Only produced for image-bearing documents.
    pub sub_images: Vec<SubImage>,
}

/// Produces chunks and sub-images for a document path.
///
/// Implementations return [`Error::UnsupportedFormat`] for files they cannot
/// handle.
pub trait ChunkExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Extraction>;
}

impl<F> ChunkExtractor for F
where
    F: Fn(&Path) -> Result<Extraction> + Send + Sync,
{
    fn extract(&self, path: &Path) -> Result<Extraction> {
        self(path)
    }
}

/// Lowercased extension of `path`, if it has one.
fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// Extracts sentence chunks from plain-text files.
#[derive(Debug, Clone)]
pub struct TextExtractor {
    extensions: Vec<String>,
    max_chunk_chars: usize,
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self {
            extensions: vec!["txt".to_string(), "md".to_string()],
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
        }
    }
}

impl TextExtractor {
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| normalize_extension(e.as_ref()))
            .collect();
        self
    }

    pub fn with_max_chunk_chars(mut self, max_chunk_chars: usize) -> Self {
        self.max_chunk_chars = max_chunk_chars.max(1);
        self
    }

    fn supports(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| self.extensions.contains(&ext))
    }
}

impl ChunkExtractor for TextExtractor {
    fn extract(&self, path: &Path) -> Result<Extraction> {
        if !self.supports(path) {
            return Err(Error::UnsupportedFormat(path.to_path_buf()));
        }

        let bytes = std::fs::read(path)?;
        let text = String::from_utf8_lossy(&bytes);

        Ok(Extraction {
            text_chunks: chunk_document(&text, self.max_chunk_chars),
            sub_images: Vec::new(),
        })
    }
}

/// Dispatches extraction to a backend registered for the file's extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use recollect::extractor::{ChunkExtractor, ExtensionRouter, TextExtractor};
///
/// let router =
///     ExtensionRouter::new().route(["txt"], TextExtractor::default());
/// let err = router.extract(Path::new("scan.tiff")).unwrap_err();
/// assert!(matches!(err, recollect::Error::UnsupportedFormat(_)));
/// ```
#[derive(Default, Clone)]
pub struct ExtensionRouter {
    routes: HashMap<String, Arc<dyn ChunkExtractor>>,
}

impl ExtensionRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `extractor` for each of `extensions`, replacing any earlier
    /// registration.
    pub fn route<I, S, E>(mut self, extensions: I, extractor: E) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        E: ChunkExtractor + 'static,
    {
        let extractor: Arc<dyn ChunkExtractor> = Arc::new(extractor);
        for ext in extensions {
            self.routes
                .insert(normalize_extension(ext.as_ref()), extractor.clone());
        }
        self
    }

    pub fn extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> =
            self.routes.keys().map(String::as_str).collect();
        exts.sort_unstable();
        exts
    }
}

impl ChunkExtractor for ExtensionRouter {
    fn extract(&self, path: &Path) -> Result<Extraction> {
        extension_of(path)
            .and_then(|ext| self.routes.get(&ext))
            .ok_or_else(|| Error::UnsupportedFormat(path.to_path_buf()))?
            .extract(path)
    }
}

impl fmt::Debug for ExtensionRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionRouter")
            .field("extensions", &self.extensions())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn text_extractor_splits_sentences() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("dog.txt");
        std::fs::write(&path, "The dog barks. It is loyal.\n").unwrap();

        let extraction = TextExtractor::default().extract(&path).unwrap();
        assert_eq!(
            extraction.text_chunks,
            vec!["The dog barks", "It is loyal"]
        );
        assert!(extraction.sub_images.is_empty());
    }

    #[test]
    fn text_extractor_matches_extension_case_insensitively() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("NOTES.TXT");
        std::fs::write(&path, "Hello").unwrap();

        let extraction = TextExtractor::default().extract(&path).unwrap();
        assert_eq!(extraction.text_chunks, vec!["Hello"]);
    }

    #[test]
    fn text_extractor_rejects_other_formats() {
        let err = TextExtractor::default()
            .extract(Path::new("/tmp/scan.png"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedFormat(p) if p.ends_with("scan.png")
        ));
    }

    #[test]
    fn text_extractor_tolerates_invalid_utf8() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.txt");
        std::fs::write(&path, b"ok \xff\xfe text").unwrap();

        let extraction = TextExtractor::default().extract(&path).unwrap();
        assert_eq!(extraction.text_chunks.len(), 1);
    }

    #[test]
    fn router_dispatches_by_extension() {
        let image = |_: &Path| -> Result<Extraction> {
            Ok(Extraction {
                text_chunks: vec![],
                sub_images: vec![SubImage {
                    width: 1,
                    height: 1,
                    pixels: vec![1, 2, 3],
                }],
            })
        };
        let router = ExtensionRouter::new()
            .route(["txt"], TextExtractor::default())
            .route([".PNG", "jpg"], image);

        assert_eq!(router.extensions(), vec!["jpg", "png", "txt"]);

        let extraction = router.extract(&PathBuf::from("a/photo.png")).unwrap();
        assert_eq!(extraction.sub_images.len(), 1);

        assert!(matches!(
            router.extract(Path::new("noext")),
            Err(Error::UnsupportedFormat(_))
        ));
    }
}
