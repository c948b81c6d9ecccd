//! Bounded edit distance for fuzzy term matching.

/// Whether `a` can be turned into `b` with at most `max_edits` single
/// character insertions, deletions or substitutions.
///
/// Gives up as soon as every cell of a row exceeds the bound.
pub fn within_distance(a: &str, b: &str, max_edits: usize) -> bool {
    if a == b {
        return true;
    }
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    if a_len.abs_diff(b_len) > max_edits || max_edits == 0 {
        return false;
    }

    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0usize; b_chars.len() + 1];

    for (i, a_char) in a.chars().enumerate() {
        curr[0] = i + 1;
        let mut row_min = curr[0];
        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = usize::from(a_char != *b_char);
            let value = (curr[j] + 1).min(prev[j + 1] + 1).min(prev[j] + cost);
            curr[j + 1] = value;
            row_min = row_min.min(value);
        }
        if row_min > max_edits {
            return false;
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()] <= max_edits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_distance() {
        assert!(within_distance("hello", "hello", 0));
        assert!(within_distance("hello", "hallo", 1));
        assert!(within_distance("hello", "hell", 1));
        assert!(!within_distance("hello", "help", 1));
        assert!(within_distance("hello", "help", 2));
        assert!(!within_distance("tag", "lol", 2));
    }
}
