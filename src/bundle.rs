//! Embedding bundle files.
//!
//! A bundle holds every vector of one document in one modality.
//!
//! Binary format:
//! - 4 bytes: vector count N (u32 LE)
//! - 4 bytes: dimension D (u32 LE)
//! - N * D * 4 bytes: f32 values in native byte order, row-major

use std::path::Path;

use crate::{
    embedding::Embedding,
    error::{Error, Result},
};

/// Header size: 4 bytes vector count + 4 bytes dimension.
const HEADER_SIZE: usize = 8;

fn invalid(path: &Path, reason: impl Into<String>) -> Error {
    Error::InvalidBundle {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Encode equal-length vectors into bundle bytes.
pub fn encode(path: &Path, vectors: &[Embedding]) -> Result<Vec<u8>> {
    let dimension = vectors.first().map_or(0, Vec::len);
    if dimension == 0 && !vectors.is_empty() {
        return Err(invalid(path, "vectors have dimension 0"));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
        return Err(invalid(
            path,
            format!(
                "vectors must share one dimension ({dimension} vs {})",
                bad.len()
            ),
        ));
    }

    let count = u32::try_from(vectors.len())
        .map_err(|_| invalid(path, "too many vectors"))?;
    let dim = u32::try_from(dimension)
        .map_err(|_| invalid(path, "dimension too large"))?;

    let mut bytes =
        Vec::with_capacity(HEADER_SIZE + vectors.len() * dimension * 4);
    bytes.extend_from_slice(&count.to_le_bytes());
    bytes.extend_from_slice(&dim.to_le_bytes());
    for vector in vectors {
        bytes.extend_from_slice(bytemuck::cast_slice(vector.as_slice()));
    }

    Ok(bytes)
}

/// Decode bundle bytes, validating the header against the payload length.
pub fn decode(path: &Path, bytes: &[u8]) -> Result<Vec<Embedding>> {
    if bytes.len() < HEADER_SIZE {
        return Err(invalid(path, "truncated header"));
    }

    let (header, payload) = bytes.split_at(HEADER_SIZE);
    let (count_bytes, dim_bytes) = header.split_at(4);
    let count = u32::from_le_bytes(
        count_bytes.try_into().map_err(|_| invalid(path, "bad header"))?,
    ) as usize;
    let dimension = u32::from_le_bytes(
        dim_bytes.try_into().map_err(|_| invalid(path, "bad header"))?,
    ) as usize;

    // Zero-width vectors would let the count alone drive the allocation.
    if dimension == 0 && count > 0 {
        return Err(invalid(path, "vectors have dimension 0"));
    }

    let expected = count
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| invalid(path, "header overflows"))?;
    if payload.len() != expected {
        return Err(invalid(
            path,
            format!(
                "expected {expected} payload bytes, found {}",
                payload.len()
            ),
        ));
    }
    if count == 0 {
        return Ok(Vec::new());
    }

    // The payload slice is not necessarily f32-aligned.
    let values: Vec<f32> = bytemuck::pod_collect_to_vec(payload);
    Ok(values.chunks_exact(dimension).map(<[f32]>::to_vec).collect())
}

/// Read a bundle file back into its vectors.
pub fn read(path: &Path) -> Result<Vec<Embedding>> {
    let bytes = std::fs::read(path)?;
    decode(path, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(count: u32, dimension: u32) -> Vec<u8> {
        let mut bytes = count.to_le_bytes().to_vec();
        bytes.extend_from_slice(&dimension.to_le_bytes());
        bytes
    }

    #[test]
    fn encode_and_read() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("doc_0_text.emb");

        let vectors =
            vec![vec![0.1, -2.5, 3.0], vec![f32::MIN_POSITIVE, 0.0, 1e9]];
        std::fs::write(&path, encode(&path, &vectors).unwrap()).unwrap();

        assert_eq!(read(&path).unwrap(), vectors);
        assert_eq!(
            std::fs::metadata(&path).unwrap().len() as usize,
            HEADER_SIZE + 6 * 4
        );
    }

    #[test]
    fn empty_bundle() {
        let bytes = encode(Path::new("x"), &[]).unwrap();
        assert_eq!(bytes, header(0, 0));
        assert!(decode(Path::new("x"), &bytes).unwrap().is_empty());
    }

    #[test]
    fn rejects_ragged_vectors() {
        let err =
            encode(Path::new("x"), &[vec![1.0, 2.0], vec![1.0]]).unwrap_err();
        assert!(matches!(err, Error::InvalidBundle { .. }));
    }

    #[test]
    fn rejects_zero_width_vectors() {
        let err = encode(Path::new("x"), &[vec![], vec![]]).unwrap_err();
        assert!(matches!(err, Error::InvalidBundle { .. }));
    }

    #[test]
    fn rejects_huge_count_of_zero_width_vectors() {
        assert!(matches!(
            decode(Path::new("x"), &header(u32::MAX, 0)),
            Err(Error::InvalidBundle { .. })
        ));
        assert!(matches!(
            decode(Path::new("x"), &header(1, 0)),
            Err(Error::InvalidBundle { .. })
        ));
    }

    #[test]
    fn rejects_truncated_payload() {
        let mut bytes = encode(Path::new("x"), &[vec![1.0, 2.0]]).unwrap();
        bytes.pop();
        assert!(matches!(
            decode(Path::new("x"), &bytes),
            Err(Error::InvalidBundle { .. })
        ));
        assert!(decode(Path::new("x"), &bytes[..3]).is_err());
    }

    #[test]
    fn decodes_unaligned_payload() {
        let bytes = encode(Path::new("x"), &[vec![1.5, 2.5]]).unwrap();
        let mut shifted = vec![0u8];
        shifted.extend_from_slice(&bytes);

        assert_eq!(
            decode(Path::new("x"), &shifted[1..]).unwrap(),
            vec![vec![1.5, 2.5]]
        );
    }

    #[test]
    fn read_missing_file_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            read(&tmp.path().join("gone.emb")),
            Err(Error::Io(_))
        ));
    }
}
