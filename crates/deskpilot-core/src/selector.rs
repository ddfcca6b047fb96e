//! Alternative selectors for element clicks
//!
//! When a selector stops matching, nearby spellings often still do:
//!   #submit            -> .submit
//!   .submit            -> #submit
//!   submit             -> [data-testid*='submit']
//!                         [aria-label*='submit']
//!                         [title*='submit']

/// Candidate selectors for `target`, in the order they should be tried.
/// The original selector and duplicates are never returned.
pub fn alternatives(target: &str) -> Vec<String> {
    let target = target.trim();
    if target.is_empty() {
        return Vec::new();
    }

    let escaped = target.replace('\\', "\\\\").replace('\'', "\\'");
    let candidates = [
        target.replace('#', "."),
        target.replace('.', "#"),
        format!("[data-testid*='{}']", escaped),
        format!("[aria-label*='{}']", escaped),
        format!("[title*='{}']", escaped),
    ];

    let mut out: Vec<String> = Vec::with_capacity(candidates.len());
    for c in candidates {
        if c != target && !out.contains(&c) {
            out.push(c);
        }
    }
    out
}
