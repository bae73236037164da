//! Sample Scoring
//!
//! Generated samples are scored by their Levenshtein edit distance to the
//! whole training corpus: the minimum number of single-character insertions,
//! deletions and substitutions turning one into the other. Lower is better,
//! and a model that memorized a short corpus perfectly scores 0.
//!
//! ```text
//! edit_distance("kitten", "sitting") = 3
//!   kitten → sitten   (substitute k→s)
//!   sitten → sittin   (substitute e→i)
//!   sittin → sitting  (insert g)
//! ```
//!
//! Distances are over Unicode scalar values, not bytes.

/// Levenshtein distance between `a` and `b`
///
/// Classic dynamic programming, keeping only the previous row: O(|a|·|b|)
/// time, O(|b|) memory.
///
/// # Example
///
/// ```rust
/// use char_rnn::score::edit_distance;
///
/// assert_eq!(edit_distance("the cat", "the hat"), 1);
/// assert_eq!(edit_distance("", "meow"), 4);
/// ```
pub fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            let deletion = prev[j + 1] + 1;
            let insertion = curr[j] + 1;
            curr[j + 1] = substitution.min(deletion).min(insertion);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}
