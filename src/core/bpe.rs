//! Byte pair merging for `bpe` models.
//!
//! The token's bytes start out as single-byte parts. The adjacent pair whose
//! concatenation has the lowest rank in the vocabulary is merged, and the
//! process repeats until no adjacent pair is in the vocabulary. Parts that are
//! still unknown afterwards are left for the caller to map to the unknown id.

use super::vocab::Vocab;

const NO_RANK: u32 = u32::MAX;

/// Split `piece` into its byte pair parts under `ranks`.
pub fn byte_pair_split<'a>(piece: &'a [u8], ranks: &Vocab) -> Vec<&'a [u8]> {
    if piece.len() <= 1 {
        return if piece.is_empty() { Vec::new() } else { vec![piece] };
    }

    let boundaries = byte_pair_merge(piece, ranks);
    boundaries
        .windows(2)
        .map(|w| &piece[w[0].0..w[1].0])
        .collect()
}

/// Returns part boundaries as `(start, rank of merging this part with the next)`.
/// The last entry is the end of the piece.
fn byte_pair_merge(piece: &[u8], ranks: &Vocab) -> Vec<(usize, u32)> {
    let mut parts: Vec<(usize, u32)> = Vec::with_capacity(piece.len() + 1);

    let mut min_rank = (NO_RANK, usize::MAX);
    for i in 0..piece.len() - 1 {
        let rank = ranks.get(&piece[i..i + 2]).copied().unwrap_or(NO_RANK);
        if rank < min_rank.0 {
            min_rank = (rank, i);
        }
        parts.push((i, rank));
    }
    parts.push((piece.len() - 1, NO_RANK));
    parts.push((piece.len(), NO_RANK));

    // Rank of the part that merging parts[i] and parts[i + 1] would create,
    // joined with parts[i + 2].
    let rank_after_merge = |parts: &[(usize, u32)], i: usize| -> u32 {
        if i + 3 < parts.len() {
            ranks
                .get(&piece[parts[i].0..parts[i + 3].0])
                .copied()
                .unwrap_or(NO_RANK)
        } else {
            NO_RANK
        }
    };

    while min_rank.0 != NO_RANK {
        let i = min_rank.1;
        if i > 0 {
            parts[i - 1].1 = rank_after_merge(&parts, i - 1);
        }
        parts[i].1 = rank_after_merge(&parts, i);
        parts.remove(i + 1);

        min_rank = (NO_RANK, usize::MAX);
        for (j, &(_, rank)) in parts[..parts.len() - 1].iter().enumerate() {
            if rank < min_rank.0 {
                min_rank = (rank, j);
            }
        }
    }

    parts
}
