//! Embedding capabilities.
//!
//! The engine never loads a model itself. The host constructs one
//! [`TextEncoder`] and one [`ImageEncoder`] up front, bundles them into
//! [`Encoders`], and hands clones of that bundle to the index builder and the
//! search engine. Tests substitute deterministic fakes the same way.

use std::{fmt, sync::Arc};

use crate::error::{Error, Result};

/// A fixed-dimension embedding vector.
pub type Embedding = Vec<f32>;

/// Embedding space an [`Embedding`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modality {
    Text,
    Image,
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modality::Text => f.write_str("text"),
            Modality::Image => f.write_str("image"),
        }
    }
}

/// A region cut out of a scanned page, as produced by an extractor.
///
/// The core does not interpret pixels; they are passed through to the image
/// encoder unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubImage {
    pub width: u32,
    pub height: u32,
    /// Row-major RGB8 pixel data.
    pub pixels: Vec<u8>,
}

/// Maps text into a fixed-dimension vector space.
pub trait TextEncoder: Send + Sync {
    fn encode_text(&self, text: &str) -> Result<Embedding>;
}

/// Maps images into a vector space shared with text queries.
///
/// The [`TextEncoder`] supertrait embeds a search query into the same space
/// as the images, so a text query can be compared against image regions.
pub trait ImageEncoder: TextEncoder {
    fn encode_image(&self, image: &SubImage) -> Result<Embedding>;
}

/// One encoder per modality.
#[derive(Clone)]
pub struct Encoders {
    pub text: Arc<dyn TextEncoder>,
    pub image: Arc<dyn ImageEncoder>,
}

impl Encoders {
    pub fn new(
        text: Arc<dyn TextEncoder>,
        image: Arc<dyn ImageEncoder>,
    ) -> Self {
        Self { text, image }
    }
}

impl fmt::Debug for Encoders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Encoders").finish_non_exhaustive()
    }
}

/// Default dimension of [`HashingEncoder`] vectors.
pub const DEFAULT_HASHING_DIMENSION: usize = 384;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Model-free text encoder based on feature hashing.
///
/// Each lowercase alphanumeric token is hashed (FNV-1a, stable across
/// platforms and releases) into one signed bucket; the resulting vector is
/// L2-normalized. Two texts are similar when they share vocabulary. Text
/// without any token encodes to the zero vector.
///
/// The [`ImageEncoder`] impl only handles text queries; pixel input reports
/// [`Error::EmbeddingFailure`], which degrades image documents to their text
/// chunks.
///
/// # Examples
///
/// ```
/// use recollect::embedding::{HashingEncoder, TextEncoder};
///
/// let encoder = HashingEncoder::new(64);
/// let a = encoder.encode_text("Dogs bark").unwrap();
/// let b = encoder.encode_text("dogs BARK!").unwrap();
/// assert_eq!(a.len(), 64);
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone)]
pub struct HashingEncoder {
    dimension: usize,
}

impl Default for HashingEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_HASHING_DIMENSION)
    }
}

impl HashingEncoder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn hash_token(token: &str) -> u64 {
        token.bytes().fold(FNV_OFFSET, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
        })
    }
}

impl TextEncoder for HashingEncoder {
    fn encode_text(&self, text: &str) -> Result<Embedding> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = Self::hash_token(&token.to_lowercase());
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }

        Ok(vector)
    }
}

impl ImageEncoder for HashingEncoder {
    fn encode_image(&self, _image: &SubImage) -> Result<Embedding> {
        Err(Error::EmbeddingFailure {
            modality: Modality::Image,
            message: "hashing encoder cannot embed pixels".to_string(),
        })
    }
}
