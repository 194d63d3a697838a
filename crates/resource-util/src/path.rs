//! Canonical path normalization. A resource path is canonicalized by making it
//! absolute (a leading `/` is inserted if missing) and collapsing runs of `/`
//! into one. The result is bounded to [`MAX_PATH_LEN`] bytes, matching the
//! original engine's fixed-size path buffer.

use crate::error::{UtilError, UtilResult};

/// Maximum length, in bytes, of a canonicalized path.
pub const MAX_PATH_LEN: usize = 1024;

/// Normalize `path` into its canonical form.
///
/// - A missing leading `/` is inserted.
/// - Runs of `/` collapse to a single `/`.
/// - A trailing `/` is kept only for the root path itself.
///
/// Canonicalization is idempotent: `canonicalize(canonicalize(p)?) ==
/// canonicalize(p)?` for every `p` that does not already exceed
/// [`MAX_PATH_LEN`].
pub fn canonicalize(path: &str) -> UtilResult<String> {
    if path.is_empty() {
        return Err(UtilError::EmptyPath);
    }

    let mut out = String::with_capacity(path.len() + 1);
    out.push('/');

    let mut prev_was_sep = true; // swallow a leading '/' from `path` itself
    for ch in path.chars() {
        if ch == '/' {
            if !prev_was_sep {
                out.push('/');
            }
            prev_was_sep = true;
        } else {
            out.push(ch);
            prev_was_sep = false;
        }
    }

    // Drop a trailing separator unless the whole path collapsed to "/".
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }

    if out.len() > MAX_PATH_LEN {
        return Err(UtilError::PathTooLong {
            max: MAX_PATH_LEN,
            len: out.len(),
        });
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn inserts_missing_leading_slash() {
        assert_eq!(canonicalize("foo/bar.txt").unwrap(), "/foo/bar.txt");
    }

    #[test]
    fn collapses_duplicate_separators() {
        assert_eq!(
            canonicalize("//archive_data//file1.adc").unwrap(),
            "/archive_data/file1.adc"
        );
    }

    #[test]
    fn drops_trailing_separator() {
        assert_eq!(canonicalize("/foo/bar/").unwrap(), "/foo/bar");
    }

    #[test]
    fn root_survives() {
        assert_eq!(canonicalize("/").unwrap(), "/");
        assert_eq!(canonicalize("///").unwrap(), "/");
    }

    #[test]
    fn rejects_too_long() {
        let long = "a".repeat(MAX_PATH_LEN + 10);
        assert!(matches!(
            canonicalize(&long),
            Err(UtilError::PathTooLong { .. })
        ));
    }

    #[test]
    fn rejects_empty() {
        assert!(matches!(canonicalize(""), Err(UtilError::EmptyPath)));
    }

    proptest! {
        #[test]
        fn idempotent(path in "[a-zA-Z0-9/_.]{1,200}") {
            if let Ok(once) = canonicalize(&path) {
                let twice = canonicalize(&once).unwrap();
                prop_assert_eq!(once, twice);
            }
        }
    }
}
