/// Splits `operations` into consecutive groups of at most `ceiling` items.
///
/// Empty input yields no groups; input no longer than the ceiling yields one.
/// A ceiling of zero is treated as one.
pub fn chunk_operations<T>(operations: Vec<T>, ceiling: usize) -> Vec<Vec<T>> {
    let ceiling = ceiling.max(1);
    let mut chunks = Vec::with_capacity(operations.len().div_ceil(ceiling));
    let mut current = Vec::with_capacity(ceiling.min(operations.len()));

    for operation in operations {
        current.push(operation);
        if current.len() == ceiling {
            chunks.push(std::mem::replace(&mut current, Vec::with_capacity(ceiling)));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_gives_no_chunks() {
        assert!(chunk_operations(Vec::<u32>::new(), 100).is_empty());
    }

    #[test]
    fn short_input_gives_one_chunk() {
        assert_eq!(chunk_operations(vec![1, 2, 3], 100), vec![vec![1, 2, 3]]);
        assert_eq!(chunk_operations(vec![1, 2, 3], 3), vec![vec![1, 2, 3]]);
    }

    #[test]
    fn chunk_count_is_ceiling_of_ratio() {
        for (n, c) in [(250usize, 100usize), (200, 100), (1, 1), (99, 10), (101, 100)] {
            let input: Vec<usize> = (0..n).collect();
            let chunks = chunk_operations(input.clone(), c);

            assert_eq!(chunks.len(), n.div_ceil(c), "n={} c={}", n, c);
            assert!(chunks.iter().all(|chunk| !chunk.is_empty() && chunk.len() <= c));
            assert_eq!(chunks.concat(), input);
        }
    }

    #[test]
    fn zero_ceiling_degrades_to_singletons() {
        assert_eq!(chunk_operations(vec!['a', 'b'], 0), vec![vec!['a'], vec!['b']]);
    }
}
