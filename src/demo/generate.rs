use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;
use url::Url;

use super::stamp::SyncStamp;
use super::{group_display_name, METADATA_NAME, SLIDE_METADATA_NAME};
use crate::error::TreeError;
use crate::io::LocalFileReader;
use crate::json::escape_non_ascii;
use crate::slide::Slide;
use crate::tiler::{
    extract_zip, is_zip, join_rel, scratch_dir, sorted_entries, tile_slide, TilePool, TileSettings,
    TiledImage,
};

/// Top-level metadata written to `info.js`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SlideInfo {
    pub renderer: String,
    pub stamp: String,
    pub groups: Vec<GroupInfo>,
}

/// Slides from one top-level input directory.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GroupInfo {
    pub name: String,
    pub slides: Vec<SlideEntry>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SlideEntry {
    pub name: String,
    pub slide: ImageEntry,
    pub associated: Vec<ImageEntry>,
    pub properties_url: String,
    pub download_url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImageEntry {
    /// Associated image name; `null` for the slide itself
    pub name: Option<String>,
    pub dzi: String,
    pub url: String,
}

/// Where published files will live.
#[derive(Debug, Clone)]
pub struct PublishUrls {
    /// Base URL of the tile bucket
    pub base_url: Url,

    /// Base URL of the original slide downloads
    pub download_base_url: Url,
}

impl PublishUrls {
    fn tile_url(&self, relpath: &str) -> Result<String, TreeError> {
        join_url(&self.base_url, relpath)
    }

    fn download_url(&self, relpath: &str) -> Result<String, TreeError> {
        join_url(&self.download_base_url, relpath)
    }
}

fn join_url(base: &Url, relpath: &str) -> Result<String, TreeError> {
    base.join(relpath)
        .map(String::from)
        .map_err(|e| TreeError::InvalidUrl(format!("{base} + {relpath}: {e}")))
}

/// Serialize `value` as `{callback}(<json>);` with one-space indentation.
pub(crate) fn jsonp<T: Serialize>(callback: &str, value: &T) -> Result<String, TreeError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut ser)
        .map_err(|e| TreeError::Json(e.to_string()))?;
    let json = String::from_utf8(buf).map_err(|e| TreeError::Json(e.to_string()))?;
    Ok(format!("{callback}({});\n", escape_non_ascii(&json)))
}

fn write_file(path: &Path, contents: &str) -> Result<(), TreeError> {
    std::fs::write(path, contents).map_err(|source| TreeError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Shared state of one generation run.
struct Generation<'a> {
    pool: &'a TilePool,
    settings: TileSettings,
    urls: &'a PublishUrls,
    tempdir: &'a Path,
    out_root: &'a Path,
}

impl Generation<'_> {
    fn image_entry(&self, image: &TiledImage) -> Result<ImageEntry, TreeError> {
        Ok(ImageEntry {
            name: image.associated.clone(),
            dzi: image.dzi.clone(),
            url: self.urls.tile_url(&format!("{}.dzi", image.relpath))?,
        })
    }

    /// Tile one slide and write its `properties.js`.
    async fn tile_slide(
        &self,
        in_relpath: &str,
        in_path: &Path,
        out_name: &str,
        out_relpath: &str,
    ) -> Result<SlideEntry, TreeError> {
        let tiled = tile_slide(self.pool, self.settings, in_path, self.out_root, out_relpath).await?;

        let mut images = tiled.images.iter();
        let main = images
            .next()
            .ok_or_else(|| TreeError::Json(format!("{out_relpath}: no images tiled")))?;
        let entry = SlideEntry {
            name: out_name.to_string(),
            slide: self.image_entry(main)?,
            associated: images
                .map(|image| self.image_entry(image))
                .collect::<Result<_, _>>()?,
            properties_url: self
                .urls
                .tile_url(&join_rel(out_relpath, SLIDE_METADATA_NAME))?,
            download_url: self.urls.download_url(in_relpath)?,
        };

        let properties: &BTreeMap<String, String> = &tiled.properties;
        write_file(
            &self.out_root.join(out_relpath).join(SLIDE_METADATA_NAME),
            &jsonp("set_slide_properties", properties)?,
        )?;
        Ok(entry)
    }

    /// Tile every slide directly inside one group directory.
    ///
    /// A zip archive counts as one slide: its first readable top-level
    /// member is tiled, and its download link points at the archive.
    async fn walk_slides(
        &self,
        in_root: &Path,
        in_relpath: &str,
        out_relpath: &str,
    ) -> Result<Vec<SlideEntry>, TreeError> {
        let mut slides = Vec::new();
        for in_path in sorted_entries(&in_root.join(in_relpath))? {
            let in_name = file_name(&in_path);
            let in_cur_relpath = join_rel(in_relpath, &in_name);
            let out_name = Path::new(&in_name)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| in_name.clone());
            let out_cur_relpath = join_rel(out_relpath, &out_name.to_lowercase());

            if in_path.is_file() && Slide::<LocalFileReader>::can_open(&in_path).await {
                slides.push(
                    self.tile_slide(&in_cur_relpath, &in_path, &out_name, &out_cur_relpath)
                        .await?,
                );
            } else if is_zip(&in_path) {
                info!("Extracting {out_cur_relpath}...");
                let temp_path = extract_zip(&in_path, self.tempdir).await?;
                if let Some(member) = first_slide(&temp_path).await? {
                    slides.push(
                        self.tile_slide(&in_cur_relpath, &member, &out_name, &out_cur_relpath)
                            .await?,
                    );
                }
            }
        }
        Ok(slides)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

async fn first_slide(dir: &Path) -> Result<Option<PathBuf>, TreeError> {
    for path in sorted_entries(dir)? {
        if path.is_file() && Slide::<LocalFileReader>::can_open(&path).await {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

/// Tile a two-level tree of slides (`{group}/{slide}`) for the demo site.
///
/// Writes tiles, per-slide `properties.js` and finally `info.js`. A tree
/// that already has `info.js` is complete and is never regenerated in
/// place; a partial tree may be resumed only by the same renderer.
pub async fn generate(
    in_root: &Path,
    out_root: &Path,
    pool: &TilePool,
    settings: TileSettings,
    stamp: &SyncStamp,
    urls: &PublishUrls,
) -> Result<SlideInfo, TreeError> {
    if out_root.join(METADATA_NAME).exists() {
        return Err(TreeError::CompleteTree(out_root.to_path_buf()));
    }
    stamp.claim(out_root)?;
    info!(renderer = stamp.renderer(), stamp = stamp.as_str(), "Generating tiles");

    let tempdir = scratch_dir()?;
    let generation = Generation {
        pool,
        settings,
        urls,
        tempdir: tempdir.path(),
        out_root,
    };

    let mut data = SlideInfo {
        renderer: stamp.renderer().to_string(),
        stamp: stamp.as_str().to_string(),
        groups: Vec::new(),
    };
    for in_path in sorted_entries(in_root)? {
        if !in_path.is_dir() {
            continue;
        }
        let in_name = file_name(&in_path);
        let slides = generation
            .walk_slides(in_root, &in_name, &in_name.to_lowercase())
            .await?;
        if !slides.is_empty() {
            data.groups.push(GroupInfo {
                name: group_display_name(&in_name).to_string(),
                slides,
            });
        }
    }

    write_file(&out_root.join(METADATA_NAME), &jsonp("set_slide_info", &data)?)?;
    Ok(data)
}
