//! Row/column chunk iteration, parallel when the `parallel` feature is on.
//!
//! The sequential and parallel paths visit the same chunks with the same
//! closure, so results are identical either way.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Runs `f(chunk_index, chunk)` over `chunk_len`-sized chunks of `data`.
///
/// Does nothing when `chunk_len` is 0.
pub(crate) fn for_each_chunk<T, F>(data: &mut [T], chunk_len: usize, f: F)
where
    T: Send,
    F: Fn(usize, &mut [T]) + Sync + Send,
{
    if chunk_len == 0 {
        return;
    }

    #[cfg(feature = "parallel")]
    data.par_chunks_mut(chunk_len)
        .enumerate()
        .for_each(|(i, chunk)| f(i, chunk));

    #[cfg(not(feature = "parallel"))]
    data.chunks_mut(chunk_len)
        .enumerate()
        .for_each(|(i, chunk)| f(i, chunk));
}

/// Maps `f` over `0..len` into a vector.
pub(crate) fn map_indices<T, F>(len: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        (0..len).into_par_iter().map(f).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        (0..len).map(f).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_see_their_index() {
        let mut data = vec![0usize; 12];
        for_each_chunk(&mut data, 4, |row, chunk| {
            for v in chunk.iter_mut() {
                *v = row;
            }
        });
        assert_eq!(data, vec![0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2]);
    }

    #[test]
    fn test_zero_chunk_is_noop() {
        let mut data = vec![1u8; 3];
        for_each_chunk(&mut data, 0, |_, c| c.fill(0));
        assert_eq!(data, vec![1, 1, 1]);
    }

    #[test]
    fn test_map_indices_order() {
        assert_eq!(map_indices(4, |i| i * i), vec![0, 1, 4, 9]);
    }
}
