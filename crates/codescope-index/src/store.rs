//! Exact inner-product vector store and its on-disk codec.
//!
//! Vectors are kept row-major in one contiguous buffer; row `i` pairs with
//! chunk `i` of the owning index. Search scores every row, so results are
//! exact rather than approximate.

use std::cmp::Ordering;

use tokio_util::sync::CancellationToken;

use crate::embedding::dot;
use crate::error::{IndexError, Result};

const FORMAT_VERSION: u32 = 2;
/// Rows scored between cancellation checks.
const CANCEL_CHECK_ROWS: usize = 1024;

/// One scored row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredRow {
    pub row: usize,
    pub score: f32,
}

/// Descending score, ascending row on ties.
fn rank_order(a: &ScoredRow, b: &ScoredRow) -> Ordering {
    b.score.total_cmp(&a.score).then(a.row.cmp(&b.row))
}

/// Flat store scored by inner product. Callers normalize vectors so that
/// the inner product equals cosine similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIpStore {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIpStore {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_capacity(dimension: usize, rows: usize) -> Self {
        Self {
            dimension,
            data: Vec::with_capacity(dimension * rows),
        }
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append a row and return its position.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::DimensionMismatch`] if the vector has the wrong length.
    pub fn push(&mut self, vector: &[f32]) -> Result<usize> {
        self.check_dimension(vector.len())?;
        let row = self.len();
        self.data.extend_from_slice(vector);
        Ok(row)
    }

    #[must_use]
    pub fn vector(&self, row: usize) -> Option<&[f32]> {
        let start = row.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dimension.max(1))
    }

    fn check_dimension(&self, actual: usize) -> Result<()> {
        if actual == self.dimension {
            Ok(())
        } else {
            Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual,
            })
        }
    }

    /// The `k` best rows by inner product with `query`.
    ///
    /// Returns at most `len()` rows; `k == 0` yields an empty vector.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::DimensionMismatch`] if `query` has the wrong length.
    pub fn top_k(&self, query: &[f32], k: usize) -> Result<Vec<ScoredRow>> {
        self.top_k_where(query, k, |_| true)
    }

    /// [`FlatIpStore::top_k`] over the rows accepted by `keep`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::DimensionMismatch`] if `query` has the wrong length.
    pub fn top_k_where(
        &self,
        query: &[f32],
        k: usize,
        keep: impl Fn(usize) -> bool,
    ) -> Result<Vec<ScoredRow>> {
        self.scan(query, k, keep, None)
    }

    /// Like [`FlatIpStore::top_k_where`], checking `cancel` while scanning.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Cancelled`] if the token fires mid-scan and
    /// [`IndexError::DimensionMismatch`] if `query` has the wrong length.
    pub fn top_k_cancellable(
        &self,
        query: &[f32],
        k: usize,
        keep: impl Fn(usize) -> bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<ScoredRow>> {
        self.scan(query, k, keep, Some(cancel))
    }

    fn scan(
        &self,
        query: &[f32],
        k: usize,
        keep: impl Fn(usize) -> bool,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<ScoredRow>> {
        self.check_dimension(query.len())?;
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored = Vec::with_capacity(self.len());
        for (row, vector) in self.rows().enumerate() {
            if row % CANCEL_CHECK_ROWS == 0 && cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(IndexError::Cancelled);
            }
            if keep(row) {
                scored.push(ScoredRow {
                    row,
                    score: dot(query, vector),
                });
            }
        }

        if k < scored.len() {
            scored.select_nth_unstable_by(k, rank_order);
            scored.truncate(k);
        }
        scored.sort_unstable_by(rank_order);
        Ok(scored)
    }

    /// Serialize with bincode as a versioned [`VectorFile`].
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Serialization`] if encoding fails.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let file = VectorFile {
            version: FORMAT_VERSION,
            dimension: self.dimension,
            data: self.data.clone(),
        };
        bincode::encode_to_vec(&file, bincode::config::standard())
            .map_err(|e| IndexError::Serialization(format!("encode vectors: {e}")))
    }

    /// Inverse of [`FlatIpStore::encode`].
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Serialization`] on undecodable bytes, trailing
    /// data, an unknown version or a payload that is not whole rows.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (file, read): (VectorFile, usize) =
            bincode::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| IndexError::Serialization(format!("decode vectors: {e}")))?;
        if read != bytes.len() {
            return Err(IndexError::Serialization(format!(
                "{} trailing bytes after vector data",
                bytes.len() - read
            )));
        }
        if file.version != FORMAT_VERSION {
            return Err(IndexError::Serialization(format!(
                "unsupported vector store version {}",
                file.version
            )));
        }
        if file.dimension == 0 || file.data.len() % file.dimension != 0 {
            return Err(IndexError::Serialization(format!(
                "{} values do not form rows of dimension {}",
                file.data.len(),
                file.dimension
            )));
        }
        Ok(Self {
            dimension: file.dimension,
            data: file.data,
        })
    }
}

/// On-disk layout of a [`FlatIpStore`].
#[derive(Debug, bincode::Encode, bincode::Decode)]
struct VectorFile {
    version: u32,
    dimension: usize,
    data: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(rows: &[[f32; 3]]) -> FlatIpStore {
        let mut s = FlatIpStore::new(3);
        for r in rows {
            s.push(r).unwrap();
        }
        s
    }

    #[test]
    fn push_assigns_positions() {
        let mut s = FlatIpStore::new(2);
        assert_eq!(s.push(&[1.0, 0.0]).unwrap(), 0);
        assert_eq!(s.push(&[0.0, 1.0]).unwrap(), 1);
        assert_eq!(s.len(), 2);
        assert_eq!(s.vector(1), Some(&[0.0, 1.0][..]));
        assert_eq!(s.vector(2), None);
    }

    #[test]
    fn push_rejects_wrong_dimension() {
        let mut s = FlatIpStore::new(3);
        let err = s.push(&[1.0]).unwrap_err();
        assert!(matches!(
            err,
            IndexError::DimensionMismatch {
                expected: 3,
                actual: 1
            }
        ));
    }

    #[test]
    fn top_k_orders_by_score() {
        let s = store(&[[0.1, 0.0, 0.0], [0.9, 0.0, 0.0], [0.5, 0.0, 0.0]]);
        let hits = s.top_k(&[1.0, 0.0, 0.0], 2).unwrap();
        let rows: Vec<_> = hits.iter().map(|h| h.row).collect();
        assert_eq!(rows, [1, 2]);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let s = store(&[[0.5, 0.0, 0.0], [0.7, 0.0, 0.0], [0.5, 0.0, 0.0], [0.5, 0.0, 0.0]]);
        let hits = s.top_k(&[1.0, 0.0, 0.0], 3).unwrap();
        let rows: Vec<_> = hits.iter().map(|h| h.row).collect();
        assert_eq!(rows, [1, 0, 2]);
    }

    #[test]
    fn k_larger_than_store_returns_all() {
        let s = store(&[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        assert_eq!(s.top_k(&[1.0, 0.0, 0.0], 10).unwrap().len(), 2);
    }

    #[test]
    fn k_zero_and_empty_store_return_nothing() {
        let s = store(&[[1.0, 0.0, 0.0]]);
        assert!(s.top_k(&[1.0, 0.0, 0.0], 0).unwrap().is_empty());
        assert!(FlatIpStore::new(3).top_k(&[1.0, 0.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn query_dimension_checked() {
        let s = store(&[[1.0, 0.0, 0.0]]);
        assert!(matches!(
            s.top_k(&[1.0], 1),
            Err(IndexError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn filter_restricts_rows() {
        let s = store(&[[1.0, 0.0, 0.0], [0.9, 0.0, 0.0], [0.8, 0.0, 0.0]]);
        let hits = s.top_k_where(&[1.0, 0.0, 0.0], 5, |row| row != 0).unwrap();
        let rows: Vec<_> = hits.iter().map(|h| h.row).collect();
        assert_eq!(rows, [1, 2]);
    }

    #[test]
    fn cancelled_scan_errors() {
        let s = store(&[[1.0, 0.0, 0.0]]);
        let token = CancellationToken::new();
        token.cancel();
        let err = s
            .top_k_cancellable(&[1.0, 0.0, 0.0], 1, |_| true, &token)
            .unwrap_err();
        assert!(matches!(err, IndexError::Cancelled));
    }

    #[test]
    fn encode_decode_preserves_rows() {
        let s = store(&[[0.25, -0.5, 1.0], [3.0, 0.0, -1.5]]);
        let decoded = FlatIpStore::decode(&s.encode().unwrap()).unwrap();
        assert_eq!(decoded, s);
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = FlatIpStore::decode(b"\xff\xff\xff").unwrap_err();
        assert!(matches!(err, IndexError::Serialization(_)));
    }

    #[test]
    fn decode_rejects_truncated_payload() {
        let mut bytes = store(&[[1.0, 2.0, 3.0]]).encode().unwrap();
        bytes.pop();
        let err = FlatIpStore::decode(&bytes).unwrap_err();
        assert!(matches!(err, IndexError::Serialization(_)));
    }

    #[test]
    fn decode_rejects_trailing_bytes() {
        let mut bytes = store(&[[1.0, 2.0, 3.0]]).encode().unwrap();
        bytes.push(0);
        let err = FlatIpStore::decode(&bytes).unwrap_err();
        assert!(matches!(err, IndexError::Serialization(msg) if msg.contains("trailing")));
    }

    #[test]
    fn decode_rejects_unknown_version() {
        let file = VectorFile {
            version: 9,
            dimension: 3,
            data: vec![0.0; 3],
        };
        let bytes = bincode::encode_to_vec(&file, bincode::config::standard()).unwrap();
        let err = FlatIpStore::decode(&bytes).unwrap_err();
        assert!(matches!(err, IndexError::Serialization(msg) if msg.contains("version 9")));
    }

    #[test]
    fn decode_rejects_partial_rows() {
        let file = VectorFile {
            version: FORMAT_VERSION,
            dimension: 3,
            data: vec![1.0; 4],
        };
        let bytes = bincode::encode_to_vec(&file, bincode::config::standard()).unwrap();
        let err = FlatIpStore::decode(&bytes).unwrap_err();
        assert!(matches!(err, IndexError::Serialization(msg) if msg.contains("dimension 3")));
    }
}
