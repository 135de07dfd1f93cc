//! Version string comparison for Debian package versions.
//!
//! This module provides functions to compare version strings following the
//! Debian version format `[epoch:]upstream-version[-debian-revision]`,
//! supporting relation requirement checking and upgrade/downgrade analysis.

use std::cmp::Ordering;

/// What: Split a version string into epoch, upstream version and revision.
///
/// Inputs:
/// - `version`: Full version string (e.g., `"1:2.30.2-7"`).
///
/// Output:
/// - Returns `(epoch, upstream, revision)` string slices.
///
/// Details:
/// - The epoch is everything before the first `:` when it is all digits;
///   a missing epoch is returned as `""` (treated as zero).
/// - The revision is everything after the last `-`; a missing revision is
///   returned as `""`.
fn split_version(version: &str) -> (&str, &str, &str) {
    let (epoch, rest) = match version.split_once(':') {
        Some((epoch, rest)) if !epoch.is_empty() && epoch.bytes().all(|b| b.is_ascii_digit()) => {
            (epoch, rest)
        }
        _ => ("", version),
    };
    let (upstream, revision) = match rest.rsplit_once('-') {
        Some((upstream, revision)) => (upstream, revision),
        None => (rest, ""),
    };
    (epoch, upstream, revision)
}

/// What: Map a character to its Debian comparison weight.
///
/// Inputs:
/// - `c`: Character from a non-digit fragment, or `None` for end of input.
///
/// Output:
/// - Returns a weight where `~` sorts before end of string, end of string
///   before letters, and letters before all other characters.
fn char_weight(c: Option<char>) -> i32 {
    match c {
        Some('~') => -1,
        None => 0,
        Some(c) if c.is_ascii_alphabetic() => c as i32,
        Some(c) => c as i32 + 256,
    }
}

/// What: Compare two version fragments (upstream or revision part).
///
/// Inputs:
/// - `a`: Left-hand fragment.
/// - `b`: Right-hand fragment.
///
/// Output:
/// - Returns the ordering of `a` relative to `b`.
///
/// Details:
/// - Alternates between non-digit and digit runs, as `dpkg` does.
/// - Non-digit runs are compared character-wise with `char_weight()`.
/// - Digit runs are compared numerically (leading zeroes ignored).
fn compare_fragment(a: &str, b: &str) -> Ordering {
    let mut a = a.chars().peekable();
    let mut b = b.chars().peekable();

    loop {
        // Non-digit run, compared by character weight
        loop {
            let a_digit = a.peek().is_none_or(|c| c.is_ascii_digit());
            let b_digit = b.peek().is_none_or(|c| c.is_ascii_digit());
            if a_digit && b_digit {
                break;
            }
            let a_c = if a_digit { None } else { a.next() };
            let b_c = if b_digit { None } else { b.next() };
            match char_weight(a_c).cmp(&char_weight(b_c)) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }

        if a.peek().is_none() && b.peek().is_none() {
            return Ordering::Equal;
        }

        // Digit run, compared numerically
        let mut a_num = String::new();
        while let Some(c) = a.peek().copied().filter(char::is_ascii_digit) {
            a_num.push(c);
            a.next();
        }
        let mut b_num = String::new();
        while let Some(c) = b.peek().copied().filter(char::is_ascii_digit) {
            b_num.push(c);
            b.next();
        }
        let a_trimmed = a_num.trim_start_matches('0');
        let b_trimmed = b_num.trim_start_matches('0');
        match a_trimmed
            .len()
            .cmp(&b_trimmed.len())
            .then_with(|| a_trimmed.cmp(b_trimmed))
        {
            Ordering::Equal => {}
            ord => return ord,
        }
    }
}

/// What: Compare two Debian version strings.
///
/// Inputs:
/// - `a`: Left-hand version string.
/// - `b`: Right-hand version string.
///
/// Output:
/// - Returns `Ordering::Less` if `a < b`.
/// - Returns `Ordering::Equal` if `a == b`.
/// - Returns `Ordering::Greater` if `a > b`.
///
/// Details:
/// - Compares epoch numerically first, then the upstream version, then the
///   Debian revision.
/// - `~` sorts before everything, including the empty string, so
///   `1.0~rc1 < 1.0`.
/// - This algorithm matches the `dpkg --compare-versions` behavior.
///
/// # Example
///
/// ```
/// use deb_toolkit::types::compare_version_strings;
/// use std::cmp::Ordering;
///
/// assert_eq!(compare_version_strings("1.2.3", "1.2.4"), Ordering::Less);
/// assert_eq!(compare_version_strings("1:0.9", "2.0"), Ordering::Greater);
/// assert_eq!(compare_version_strings("1.0~rc1", "1.0"), Ordering::Less);
/// assert_eq!(compare_version_strings("2.30.2-7", "2.30.2-7+deb11u1"), Ordering::Less);
/// ```
#[must_use]
pub fn compare_version_strings(a: &str, b: &str) -> Ordering {
    let (a_epoch, a_upstream, a_revision) = split_version(a);
    let (b_epoch, b_upstream, b_revision) = split_version(b);

    let a_epoch: u64 = a_epoch.parse().unwrap_or(0);
    let b_epoch: u64 = b_epoch.parse().unwrap_or(0);
    a_epoch
        .cmp(&b_epoch)
        .then_with(|| compare_fragment(a_upstream, b_upstream))
        .then_with(|| compare_fragment(a_revision, b_revision))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_version() {
        assert_eq!(split_version("1:2.30.2-7"), ("1", "2.30.2", "7"));
        assert_eq!(split_version("2.30.2-7"), ("", "2.30.2", "7"));
        assert_eq!(split_version("2.30.2"), ("", "2.30.2", ""));
        // Only an all-digit prefix counts as an epoch
        assert_eq!(split_version("a:b"), ("", "a:b", ""));
        // Revision is split on the last dash
        assert_eq!(split_version("1.2-rc1-3"), ("", "1.2-rc1", "3"));
    }

    #[test]
    fn test_compare_basic() {
        assert_eq!(compare_version_strings("1.0.0", "1.0.1"), Ordering::Less);
        assert_eq!(compare_version_strings("1.0.1", "1.0.0"), Ordering::Greater);
        assert_eq!(compare_version_strings("1.0.0", "1.0.0"), Ordering::Equal);
        assert_eq!(compare_version_strings("2.0.0", "1.9.9"), Ordering::Greater);
        assert_eq!(compare_version_strings("1.10", "1.9"), Ordering::Greater);
    }

    #[test]
    fn test_compare_epoch() {
        assert_eq!(compare_version_strings("1:0.1", "0.9"), Ordering::Greater);
        assert_eq!(compare_version_strings("2:1.0", "1:9.9"), Ordering::Greater);
        assert_eq!(compare_version_strings("0:1.0", "1.0"), Ordering::Equal);
    }

    #[test]
    fn test_compare_tilde() {
        assert_eq!(compare_version_strings("1.0~rc1", "1.0"), Ordering::Less);
        assert_eq!(compare_version_strings("1.0~rc1", "1.0~rc2"), Ordering::Less);
        assert_eq!(
            compare_version_strings("1.0~beta1~svn1245", "1.0~beta1"),
            Ordering::Less
        );
        assert_eq!(compare_version_strings("1.0", "1.0~rc1"), Ordering::Greater);
    }

    #[test]
    fn test_compare_revision() {
        assert_eq!(compare_version_strings("1.2-1", "1.2-2"), Ordering::Less);
        assert_eq!(compare_version_strings("1.2-10", "1.2-2"), Ordering::Greater);
        assert_eq!(compare_version_strings("1.2-1", "1.2"), Ordering::Greater);
        assert_eq!(
            compare_version_strings("2.30.2-7", "2.30.2-7+deb11u1"),
            Ordering::Less
        );
    }

    #[test]
    fn test_compare_letters_and_digits() {
        // Letters sort before non-letters among non-digits
        assert_eq!(compare_version_strings("1.0a", "1.0+"), Ordering::Less);
        // End of string sorts before letters
        assert_eq!(compare_version_strings("1.0", "1.0a"), Ordering::Less);
        // Digit runs compare numerically regardless of leading zeroes
        assert_eq!(compare_version_strings("1.002", "1.2"), Ordering::Equal);
        assert_eq!(compare_version_strings("1.09", "1.10"), Ordering::Less);
    }
}
