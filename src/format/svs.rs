//! Aperio SVS metadata.
//!
//! SVS files are tiled TIFFs whose first ImageDescription carries vendor
//! metadata:
//!
//! ```text
//! Aperio Image Library v10.0.50
//! 16000x17597 [0,100 15374x17497] (256x256) JPEG/RGB Q=30|AppMag = 20|MPP = 0.4990
//! ```
//!
//! The first `|`-separated field is a free-form header; the rest are
//! `key = value` pairs, exported as `aperio.<key>` properties.
//!
//! Besides the pyramid, an SVS file holds up to three associated images:
//! the thumbnail (always the second IFD, stripped) and the label and macro
//! images, named by the second line of their own ImageDescription.

use std::collections::BTreeMap;

/// Property prefix for Aperio key/value pairs
pub const APERIO_PREFIX: &str = "aperio.";

/// Parsed Aperio ImageDescription.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SvsMetadata {
    /// `aperio.*` properties
    pub properties: BTreeMap<String, String>,
}

impl SvsMetadata {
    pub fn parse(description: &str) -> Self {
        let mut metadata = SvsMetadata::default();

        for field in description.split('|').skip(1) {
            let Some((key, value)) = field.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            if key.is_empty() {
                continue;
            }
            metadata
                .properties
                .insert(format!("{APERIO_PREFIX}{key}"), value.to_string());
        }

        metadata
    }
}

/// Name of the associated image stored in a non-pyramid IFD, if any.
///
/// `ifd_index` is the IFD's position in the chain.
pub fn associated_image_name(
    ifd_index: usize,
    is_tiled: bool,
    description: Option<&str>,
) -> Option<&'static str> {
    if ifd_index == 1 && !is_tiled {
        return Some("thumbnail");
    }
    let second_line = description?.lines().nth(1)?.trim_start();
    if second_line.starts_with("label") {
        Some("label")
    } else if second_line.starts_with("macro") {
        Some("macro")
    } else {
        None
    }
}
