//! Text canonicalization shared by indexing and query matching.

use unicode_normalization::UnicodeNormalization;

/// Upper bound on fold passes; real text settles after one or two.
const MAX_FOLD_PASSES: usize = 4;

/// Canonicalize text for indexing and matching.
///
/// Lowercases, applies NFKC so full-width and other compatibility forms
/// collapse, drops everything but letters, digits and whitespace, then
/// collapses whitespace runs to single spaces. `normalize(normalize(s)) ==
/// normalize(s)` for all `s`.
pub fn normalize(text: &str) -> String {
    let mut folded = fold(text);

    // Stripping a symbol can bring a base letter next to a combining mark
    // that only composes under the next NFKC pass, so fold to a fixed point.
    for _ in 0..MAX_FOLD_PASSES {
        let again = fold(&folded);
        if again == folded {
            break;
        }
        folded = again;
    }

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn fold(text: &str) -> String {
    // Lowercase again after NFKC: some compatibility characters expand to capitals.
    text.to_lowercase()
        .nfkc()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect()
}
