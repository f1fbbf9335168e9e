use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Base name of the main image in every slide's output directory.
pub const VIEWER_SLIDE_NAME: &str = "slide";

static PUNCT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r##"[\t !"#$%&'()*\-/<=>?@\[\\\]^_`{|},.]+"##).expect("valid punctuation regex")
});

/// ASCII-only slug: lowercase words split on punctuation, accents folded
/// away, joined with `_`.
pub fn slugify(text: &str) -> String {
    PUNCT_RE
        .split(&text.to_lowercase())
        .map(|word| word.nfkd().filter(char::is_ascii).collect::<String>())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Output base name of an image: [`VIEWER_SLIDE_NAME`] for the slide
/// itself, the slug of the associated image's name otherwise.
pub fn image_base_name(associated: Option<&str>) -> String {
    match associated {
        None => VIEWER_SLIDE_NAME.to_string(),
        Some(name) => slugify(name),
    }
}

/// DZI file name of an image.
pub fn dzi_for(associated: Option<&str>) -> String {
    format!("{}.dzi", image_base_name(associated))
}
