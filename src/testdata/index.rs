use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use super::html::{Extra, IndexPage};
use super::{sha256_file, SlideRecord};
use crate::error::IndexError;
use crate::json::escape_non_ascii;

/// Files a directory may hold besides its slides.
const IGNORE_FILENAMES: [&str; 2] = ["index.html", "index.yaml"];

const MANDATORY_FIELDS: [&str; 3] = ["description", "license", "sha256"];
const OPTIONAL_FIELDS: [&str; 1] = ["credit"];

/// Title of the root listing.
pub const REPO_TITLE: &str = "openslide-testdata";

/// `index.yaml` as written by hand.
#[derive(Debug, Deserialize)]
struct DirIndex {
    format: String,
    slides: BTreeMap<String, BTreeMap<String, serde_yaml::Value>>,
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> IndexError + '_ {
    move |source| IndexError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Fail with `{prefix}: a, b, c` when `items` is not empty.
fn ensure_empty<'a>(
    items: impl IntoIterator<Item = &'a str>,
    prefix: impl FnOnce() -> String,
) -> Result<(), IndexError> {
    let items: BTreeSet<&str> = items.into_iter().collect();
    if items.is_empty() {
        return Ok(());
    }
    let list = items.into_iter().collect::<Vec<_>>().join(", ");
    Err(IndexError::Validation(format!("{}: {list}", prefix())))
}

fn scalar_to_string(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

fn file_size(path: &Path) -> Result<u64, IndexError> {
    Ok(std::fs::metadata(path).map_err(io_err(path))?.len())
}

/// Validate one slide directory against its `index.yaml` and write its
/// `index.html`.
///
/// The directory must hold exactly the slides the index names, each with
/// every mandatory field and no unknown ones. Returns the directory's
/// format and its slides with `format` and `size` filled in.
pub fn process_dir(
    dir: &Path,
    check_hashes: bool,
) -> Result<(String, BTreeMap<String, SlideRecord>), IndexError> {
    let mut filenames = BTreeSet::new();
    for entry in std::fs::read_dir(dir).map_err(io_err(dir))? {
        let name = entry.map_err(io_err(dir))?.file_name();
        let name = name.to_string_lossy().into_owned();
        if !IGNORE_FILENAMES.contains(&name.as_str()) {
            filenames.insert(name);
        }
    }

    let yaml_path = dir.join("index.yaml");
    let yaml = std::fs::read(&yaml_path).map_err(io_err(&yaml_path))?;
    let index: DirIndex = serde_yaml::from_slice(&yaml).map_err(|e| IndexError::Yaml {
        path: yaml_path.clone(),
        message: e.to_string(),
    })?;

    let slide_names: BTreeSet<String> = index.slides.keys().cloned().collect();
    ensure_empty(
        filenames.difference(&slide_names).map(String::as_str),
        || format!("Missing files in index for {}", dir.display()),
    )?;
    ensure_empty(
        slide_names.difference(&filenames).map(String::as_str),
        || format!("Missing files in directory {}", dir.display()),
    )?;

    let mut slides = BTreeMap::new();
    for (filename, fields) in &index.slides {
        let path = dir.join(filename);
        ensure_empty(
            fields
                .keys()
                .map(String::as_str)
                .filter(|f| !MANDATORY_FIELDS.contains(f) && !OPTIONAL_FIELDS.contains(f)),
            || format!("{}: Unknown fields", path.display()),
        )?;
        ensure_empty(
            MANDATORY_FIELDS
                .iter()
                .copied()
                .filter(|f| !fields.contains_key(*f)),
            || format!("{}: Missing mandatory fields", path.display()),
        )?;

        let field = |name: &str| fields.get(name).map(scalar_to_string);
        let record = SlideRecord {
            credit: field("credit"),
            description: field("description").unwrap_or_default(),
            format: index.format.clone(),
            license: field("license").unwrap_or_default(),
            sha256: field("sha256").unwrap_or_default(),
            size: file_size(&path)?,
        };

        if check_hashes {
            let digest = sha256_file(&path).map_err(io_err(&path))?;
            if digest != record.sha256 {
                return Err(IndexError::Validation(format!(
                    "{}: Hash mismatch",
                    path.display()
                )));
            }
        }
        slides.insert(filename.clone(), record);
    }

    let html = IndexPage {
        title: &index.format,
        has_parent: true,
        files: Some(&slides),
        extras: vec![Extra {
            name: "index.yaml".to_string(),
            description: "Slide metadata".to_string(),
            size: yaml.len() as u64,
        }],
        ..Default::default()
    }
    .render();
    let html_path = dir.join("index.html");
    std::fs::write(&html_path, html).map_err(io_err(&html_path))?;

    debug!(dir = %dir.display(), slides = slides.len(), "Indexed directory");
    Ok((index.format, slides))
}

/// Validate every slide directory and write `index.json` plus the root
/// `index.html`.
///
/// `index.json` maps `{dir}/{file}` to each slide's metadata. Returns that
/// map.
pub fn process_repo(
    base: &Path,
    check_hashes: bool,
) -> Result<BTreeMap<String, SlideRecord>, IndexError> {
    let mut directories = Vec::new();
    for entry in std::fs::read_dir(base).map_err(io_err(base))? {
        let path = entry.map_err(io_err(base))?.path();
        if path.is_dir() {
            directories.push(path);
        }
    }
    directories.sort();

    let mut dir_formats = BTreeMap::new();
    let mut slides = BTreeMap::new();
    for dir in &directories {
        let (format, dir_slides) = process_dir(dir, check_hashes)?;
        let dirname = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        for (filename, record) in dir_slides {
            slides.insert(format!("{dirname}/{filename}"), record);
        }
        dir_formats.insert(dirname, format);
    }

    let json_path = base.join("index.json");
    let json = serde_json::to_string_pretty(&slides)
        .map(|json| escape_non_ascii(&json))
        .map_err(|e| IndexError::Json(e.to_string()))?;
    std::fs::write(&json_path, &json).map_err(io_err(&json_path))?;

    let html = IndexPage {
        title: REPO_TITLE,
        dirs: Some(&dir_formats),
        extras: vec![Extra {
            name: "index.json".to_string(),
            description: "Consolidated metadata for all slides".to_string(),
            size: json.len() as u64,
        }],
        ..Default::default()
    }
    .render();
    let html_path = base.join("index.html");
    std::fs::write(&html_path, html).map_err(io_err(&html_path))?;

    info!(
        directories = directories.len(),
        slides = slides.len(),
        "Wrote {}",
        json_path.display()
    );
    Ok(slides)
}
