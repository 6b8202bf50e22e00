#![forbid(unsafe_code)]

/// Case-insensitive identifier match: exact, or `attempt` is a strict prefix
/// of `reference` at least `min_length` long.
pub fn close_enough(reference: &str, attempt: &str, min_length: usize) -> bool {
    if reference.eq_ignore_ascii_case(attempt) {
        return true;
    }
    attempt.len() < reference.len()
        && attempt.len() >= min_length
        && reference
            .get(..attempt.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(attempt))
}
