use std::fmt;

use percent_encoding::percent_decode_str;
use serde::Deserialize;
use strum::{AsRefStr, Display};

/// The encoded form a cached result was produced in.
///
/// Each variant gets its own segment in the storage key so an
/// auto-converted WebP result never shadows the default result
/// of the same request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, AsRefStr, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Variant {
    Default,
    AutoWebp,
}

impl Variant {
    #[inline]
    pub fn from_flag(auto_webp: bool) -> Self {
        if auto_webp {
            Self::AutoWebp
        } else {
            Self::Default
        }
    }
}

/// The prefix all result keys live under.
///
/// Trailing separators are removed once when the root is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub struct RootPath(String);

impl RootPath {
    pub fn new(root: impl AsRef<str>) -> Self {
        Self(root.as_ref().trim_end_matches('/').to_string())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RootPath {
    fn from(root: String) -> Self {
        Self::new(root)
    }
}

impl fmt::Display for RootPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives the storage key for a given request identity.
///
/// The identity is percent-decoded (invalid escapes are kept as-is and
/// invalid UTF-8 is replaced) and a single leading `/` is dropped before
/// it is joined onto `{root}/{variant}/`.
pub fn normalize_path(identity: &str, variant: Variant, root: &RootPath) -> String {
    let decoded = percent_decode_str(identity).decode_utf8_lossy();
    let fs_path = decoded.strip_prefix('/').unwrap_or(&decoded);

    format!("{}/{}/{}", root, variant.as_ref(), fs_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_trailing_slashes_removed() {
        assert_eq!(RootPath::new("results/").as_str(), "results");
        assert_eq!(RootPath::new("results///").as_str(), "results");
        assert_eq!(RootPath::new("").as_str(), "");
    }

    #[test]
    fn test_variant_segments() {
        assert_eq!(Variant::Default.as_ref(), "default");
        assert_eq!(Variant::AutoWebp.as_ref(), "auto_webp");
        assert_eq!(Variant::from_flag(true), Variant::AutoWebp);
        assert_eq!(Variant::from_flag(false), Variant::Default);
    }

    #[test]
    fn test_basic_normalization() {
        let root = RootPath::new("rs");
        let key = normalize_path("/unsafe/300x200/image.jpg", Variant::Default, &root);
        assert_eq!(key, "rs/default/unsafe/300x200/image.jpg");

        let key = normalize_path("/unsafe/300x200/image.jpg", Variant::AutoWebp, &root);
        assert_eq!(key, "rs/auto_webp/unsafe/300x200/image.jpg");
    }

    #[test]
    fn test_percent_decoding() {
        let root = RootPath::new("rs/");
        let key = normalize_path("/smart/my%20image%2Ejpg", Variant::Default, &root);
        assert_eq!(key, "rs/default/smart/my image.jpg");
    }

    #[test]
    fn test_only_one_leading_separator_removed() {
        let root = RootPath::new("rs");
        let key = normalize_path("//double.png", Variant::Default, &root);
        assert_eq!(key, "rs/default//double.png");

        // The separator is stripped after decoding.
        let key = normalize_path("%2Fencoded.png", Variant::Default, &root);
        assert_eq!(key, "rs/default/encoded.png");
    }

    #[test]
    fn test_invalid_escapes_pass_through() {
        let root = RootPath::new("rs");
        let key = normalize_path("/bad%zzescape%", Variant::Default, &root);
        assert_eq!(key, "rs/default/bad%zzescape%");

        // Invalid UTF-8 once decoded.
        let key = normalize_path("/%ff%fe", Variant::Default, &root);
        assert_eq!(key, "rs/default/\u{FFFD}\u{FFFD}");
    }

    #[test]
    fn test_empty_identity() {
        let root = RootPath::new("rs");
        assert_eq!(normalize_path("", Variant::Default, &root), "rs/default/");
        assert_eq!(normalize_path("/", Variant::AutoWebp, &root), "rs/auto_webp/");
    }

    #[test]
    fn test_deterministic_and_variant_separated() {
        let root = RootPath::new("prefix");
        let identities = ["/a.png", "b", "/c%20d?x=1", "/%%%", "unicode/ü.jpg"];

        for identity in identities {
            let first = normalize_path(identity, Variant::Default, &root);
            let second = normalize_path(identity, Variant::Default, &root);
            assert_eq!(first, second);

            let webp = normalize_path(identity, Variant::AutoWebp, &root);
            assert_ne!(first, webp);
        }
    }
}
