use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::TreeError;
use crate::tiler::{TileSettings, FORMAT};

/// Name of the stamp file in a generated tree.
pub const STAMP_NAME: &str = ".stamp";

/// Identifies the renderer that produced a tile tree.
///
/// Rendering output changes whenever the decoder, resampler or tile
/// parameters change. A partial tree may only be resumed by the renderer
/// that started it; anything else must regenerate from scratch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStamp {
    renderer: String,
    stamp: String,
}

impl SyncStamp {
    pub fn new(settings: TileSettings, quality: u8) -> Self {
        let renderer = format!(
            "{} {} (tile {}, overlap {}, {} quality {})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            settings.tile_size,
            settings.overlap,
            FORMAT,
            quality,
        );
        Self::from_renderer(renderer)
    }

    fn from_renderer(renderer: String) -> Self {
        let digest = hex::encode(Sha256::digest(renderer.as_bytes()));
        Self {
            stamp: digest[..8].to_string(),
            renderer,
        }
    }

    /// Human-readable renderer description.
    pub fn renderer(&self) -> &str {
        &self.renderer
    }

    /// Eight hex characters.
    pub fn as_str(&self) -> &str {
        &self.stamp
    }

    /// Fail if `out_root` holds a stamp from another renderer, otherwise
    /// record this one.
    pub fn claim(&self, out_root: &Path) -> Result<(), TreeError> {
        let path = out_root.join(STAMP_NAME);
        let io_err = |source| TreeError::Io {
            path: path.clone(),
            source,
        };

        match std::fs::read_to_string(&path) {
            Ok(found) => {
                let found = found.trim();
                if found != self.stamp {
                    return Err(TreeError::StampMismatch {
                        path: out_root.to_path_buf(),
                        found: found.to_string(),
                        expected: self.stamp.clone(),
                    });
                }
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                std::fs::create_dir_all(out_root).map_err(|source| TreeError::Io {
                    path: out_root.to_path_buf(),
                    source,
                })?;
                std::fs::write(&path, format!("{}\n", self.stamp)).map_err(io_err)
            }
            Err(e) => Err(io_err(e)),
        }
    }
}
