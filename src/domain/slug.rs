//! Slug derivation for documents written without one.
//!
//! ASCII slugification (`slug` crate) is combined with Chinese transliteration
//! (`pinyin` crate) so a title like “关于我们” becomes `guan-yu-wo-men`.

use pinyin::ToPinyin;
use slug::slugify;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("slug `{slug}` is not a single lowercase path segment")]
    Malformed { slug: String },
}

/// Derive a slug from human-readable text.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let transliterated = transliterate_to_ascii(input);
    let candidate = slugify(&transliterated);

    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(candidate)
}

/// Check that an editor-supplied slug is usable as one URI segment.
pub fn validate_slug(slug: &str) -> Result<(), SlugError> {
    if slug.is_empty() {
        return Err(SlugError::EmptyInput);
    }
    if slugify(slug) != slug {
        return Err(SlugError::Malformed {
            slug: slug.to_string(),
        });
    }
    Ok(())
}

/// Replace every CJK character with its toneless pinyin syllable, spaced so
/// that `slugify` turns syllables into separate words.
fn transliterate_to_ascii(input: &str) -> String {
    input.chars().fold(String::with_capacity(input.len()), |mut out, ch| {
        match ch.to_pinyin().map(|syllable| syllable.plain()) {
            Some(syllable) => {
                if !out.is_empty() && !out.ends_with(' ') {
                    out.push(' ');
                }
                out.push_str(syllable);
                out.push(' ');
            }
            None => out.push(ch),
        }
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_slug_from_title() {
        assert_eq!(derive_slug("Our Services").unwrap(), "our-services");
    }

    #[test]
    fn derive_slug_transliterates_chinese() {
        let slug = derive_slug("Rust 基础教程").expect("slug");
        assert_eq!(slug, "rust-ji-chu-jiao-cheng");
    }

    #[test]
    fn derive_slug_rejects_blank() {
        assert_eq!(derive_slug("   "), Err(SlugError::EmptyInput));
    }

    #[test]
    fn validate_slug_accepts_segments_only() {
        assert!(validate_slug("pricing-2024").is_ok());
        assert!(matches!(
            validate_slug("about/team"),
            Err(SlugError::Malformed { .. })
        ));
        assert!(matches!(
            validate_slug("About"),
            Err(SlugError::Malformed { .. })
        ));
        assert_eq!(validate_slug(""), Err(SlugError::EmptyInput));
    }
}
