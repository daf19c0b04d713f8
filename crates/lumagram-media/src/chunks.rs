//! Chunk codec for image payloads above the backend document ceiling.
//!
//! The hosted document database caps documents at roughly one megabyte, so an
//! encoded picture that does not fit inline is split into ordered character
//! segments stored as child documents and reassembled on read.  Splitting is
//! infallible; assembly validates the set before trusting it.

use thiserror::Error;

use crate::data_uri;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkAssemblyError {
    #[error("Expected {expected} chunks, found {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Chunk index {index} appears more than once")]
    DuplicateIndex { index: usize },

    #[error("Chunk index {index} is out of range for {expected} chunks")]
    IndexOutOfRange { index: usize, expected: usize },

    #[error("Chunk {index} carries no data")]
    EmptyChunk { index: usize },

    #[error("Assembled payload is not an image data URI")]
    NotAnImageDataUri,
}

/// One ordered segment of an encoded image payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPayload {
    /// Zero-based position of this segment.
    pub index: usize,
    /// Character segment of the encoded payload.
    pub data: String,
}

/// Splits an encoded payload into segments of at most `budget_chars`
/// characters, indexed in order.  Payloads are base64 data URIs, so
/// characters and bytes coincide; a multi-byte character is still never
/// split down the middle.  A zero budget is treated as a budget of one.
pub fn split_into_chunks(encoded: &str, budget_chars: usize) -> Vec<ChunkPayload> {
    let budget = budget_chars.max(1);
    let mut chunks = Vec::with_capacity(encoded.len() / budget + 1);
    let mut rest = encoded;

    while !rest.is_empty() {
        let mut cut = budget.min(rest.len());
        while cut > 0 && !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        if cut == 0 {
            // A single character wider than the budget: take it whole.
            cut = rest
                .char_indices()
                .nth(1)
                .map(|(at, _)| at)
                .unwrap_or(rest.len());
        }

        let (head, tail) = rest.split_at(cut);
        chunks.push(ChunkPayload {
            index: chunks.len(),
            data: head.to_owned(),
        });
        rest = tail;
    }

    chunks
}

/// Reassembles a chunked payload, in any input order.
///
/// The set must hold exactly `expected_count` segments with dense unique
/// indices in `[0, expected_count)`, none of them empty, and the
/// concatenation must be an image data URI.
pub fn assemble_chunks(
    chunks: &[ChunkPayload],
    expected_count: usize,
) -> Result<String, ChunkAssemblyError> {
    if chunks.len() != expected_count {
        return Err(ChunkAssemblyError::CountMismatch {
            expected: expected_count,
            actual: chunks.len(),
        });
    }

    let mut slots: Vec<Option<&str>> = vec![None; expected_count];
    for chunk in chunks {
        if chunk.data.is_empty() {
            return Err(ChunkAssemblyError::EmptyChunk { index: chunk.index });
        }
        let slot = slots
            .get_mut(chunk.index)
            .ok_or(ChunkAssemblyError::IndexOutOfRange {
                index: chunk.index,
                expected: expected_count,
            })?;
        if slot.is_some() {
            return Err(ChunkAssemblyError::DuplicateIndex { index: chunk.index });
        }
        *slot = Some(&chunk.data);
    }

    // Count matched, indices unique and in range: every slot is filled.
    let mut assembled = String::with_capacity(chunks.iter().map(|c| c.data.len()).sum());
    for slot in slots.into_iter().flatten() {
        assembled.push_str(slot);
    }

    if !data_uri::is_image_data_uri(&assembled) {
        return Err(ChunkAssemblyError::NotAnImageDataUri);
    }
    Ok(assembled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_of_len(total: usize) -> String {
        let mut payload = String::from("data:image/jpeg;base64,");
        payload.push_str(&"A".repeat(total - payload.len()));
        payload
    }

    #[test]
    fn test_split_assemble_round_trip() {
        let payload = payload_of_len(10_000);
        let chunks = split_into_chunks(&payload, 1_234);
        assert_eq!(assemble_chunks(&chunks, chunks.len()).unwrap(), payload);
    }

    #[test]
    fn test_budget_layout_is_greedy() {
        let payload = payload_of_len(2_400_000);
        let chunks = split_into_chunks(&payload, 1_000_000);

        let lens: Vec<usize> = chunks.iter().map(|c| c.data.len()).collect();
        assert_eq!(lens, vec![1_000_000, 1_000_000, 400_000]);
        let indices: Vec<usize> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_assembly_accepts_any_input_order() {
        let payload = payload_of_len(5_000);
        let mut chunks = split_into_chunks(&payload, 999);
        chunks.reverse();
        assert_eq!(assemble_chunks(&chunks, chunks.len()).unwrap(), payload);
    }

    #[test]
    fn test_missing_chunk_fails() {
        let payload = payload_of_len(4_000);
        let mut chunks = split_into_chunks(&payload, 1_000);
        assert_eq!(chunks.len(), 4);
        chunks.remove(2);

        assert_eq!(
            assemble_chunks(&chunks, 4),
            Err(ChunkAssemblyError::CountMismatch {
                expected: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn test_duplicate_index_fails() {
        let payload = payload_of_len(4_000);
        let mut chunks = split_into_chunks(&payload, 1_000);
        chunks[2] = chunks[1].clone();

        assert_eq!(
            assemble_chunks(&chunks, 4),
            Err(ChunkAssemblyError::DuplicateIndex { index: 1 })
        );
    }

    #[test]
    fn test_out_of_range_index_fails() {
        let chunks = vec![
            ChunkPayload {
                index: 0,
                data: "data:image/".to_owned(),
            },
            ChunkPayload {
                index: 3,
                data: "png".to_owned(),
            },
        ];

        assert_eq!(
            assemble_chunks(&chunks, 2),
            Err(ChunkAssemblyError::IndexOutOfRange {
                index: 3,
                expected: 2
            })
        );
    }

    #[test]
    fn test_empty_chunk_fails() {
        let chunks = vec![
            ChunkPayload {
                index: 0,
                data: "data:image/".to_owned(),
            },
            ChunkPayload {
                index: 1,
                data: String::new(),
            },
        ];

        assert_eq!(
            assemble_chunks(&chunks, 2),
            Err(ChunkAssemblyError::EmptyChunk { index: 1 })
        );
    }

    #[test]
    fn test_non_image_payload_fails() {
        let chunks = split_into_chunks("just some text, no picture here", 8);
        assert_eq!(
            assemble_chunks(&chunks, chunks.len()),
            Err(ChunkAssemblyError::NotAnImageDataUri)
        );
    }

    #[test]
    fn test_zero_budget_clamps_to_one() {
        let chunks = split_into_chunks("abc", 0);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.data.len() == 1));
    }

    #[test]
    fn test_split_never_cuts_a_character() {
        let text = "日本語のテキスト";
        let chunks = split_into_chunks(text, 4);
        // Each of these characters is three bytes, so a four-byte budget
        // steps back to the boundary and yields one character per chunk.
        assert!(chunks.iter().all(|c| c.data.chars().count() == 1));
        let joined: String = chunks.iter().map(|c| c.data.as_str()).collect();
        assert_eq!(joined, text);
    }

    #[test]
    fn test_empty_payload_splits_to_nothing() {
        assert!(split_into_chunks("", 100).is_empty());
    }

    #[test]
    fn test_zero_expected_with_no_chunks_is_not_an_image() {
        assert_eq!(
            assemble_chunks(&[], 0),
            Err(ChunkAssemblyError::NotAnImageDataUri)
        );
    }
}
