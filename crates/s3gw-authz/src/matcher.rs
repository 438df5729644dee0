//! Resource pattern matching.
//!
//! Patterns are globs over the normalized `/container[/key]` location:
//!
//! - `*` matches any sequence of characters, including `/`
//! - `?` matches exactly one character
//!
//! A recursive pattern behaves as if `*` were appended to it, so `/bucket`
//! recursive covers `/bucket` and everything below it.

use crate::model::{Policy, ResourcePattern};

/// Resource pattern matcher.
pub struct PolicyMatcher;

impl PolicyMatcher {
    /// Check whether any value of `pattern` matches `location`.
    ///
    /// The exclude flag is not consulted.
    pub fn matches(pattern: &ResourcePattern, location: &str) -> bool {
        pattern
            .values
            .iter()
            .any(|value| Self::matches_value(value, pattern.is_recursive, location))
    }

    /// Check a single pattern string.
    pub fn matches_value(value: &str, recursive: bool, location: &str) -> bool {
        if recursive {
            let mut expanded = String::with_capacity(value.len() + 1);
            expanded.push_str(value);
            expanded.push('*');
            glob(&expanded, location)
        } else {
            glob(value, location)
        }
    }

    /// Check whether any resource dimension of `policy` matches `location`.
    pub fn policy_matches(policy: &Policy, location: &str) -> bool {
        policy
            .resources
            .values()
            .any(|pattern| Self::matches(pattern, location))
    }
}

/// Glob comparison with single-star backtracking.
fn glob(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    // Position of the last `*` seen and the text index it was tried at.
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                star = Some((p, t));
                p += 1;
            }
            Some('?') => {
                p += 1;
                t += 1;
            }
            Some(&c) if c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some((sp, st)) => {
                    p = sp + 1;
                    t = st + 1;
                    star = Some((sp, st + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}
