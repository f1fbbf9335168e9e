//! HTML directory listings for the test-data corpus.

use std::collections::BTreeMap;
use std::fmt::Write;

use super::SlideRecord;

const STYLE: &str = r#"<link rel="stylesheet" href="https://maxcdn.bootstrapcdn.com/font-awesome/4.3.0/css/font-awesome.min.css">
<style type="text/css">
table {
  margin-left: 20px;
  border-collapse: collapse;
}
tr:nth-child(2n + 3) {
  background: #f4f4f4;
}
th {
  padding-left: 10px;
  padding-right: 10px;
}
td {
  padding-top: 0.5em;
  padding-bottom: 0.5em;
  padding-right: 20px;
}
td.filename {
  white-space: nowrap;
}
td.size {
  white-space: nowrap;
  text-align: right;
}
.filetype {
  text-align: center;
  width: 1em;
  margin-right: 5px;
}
</style>"#;

const CC0_LINK: &str = r#"<a href="https://creativecommons.org/publicdomain/zero/1.0/">CC0</a>"#;

/// Escape HTML special characters.
pub fn html_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&#34;"),
            '\'' => result.push_str("&#39;"),
            _ => result.push(c),
        }
    }
    result
}

/// Human-readable size: two decimals with trailing zeros dropped, in the
/// largest binary unit that fits.
pub fn file_size_units(value: u64) -> String {
    for (shift, unit) in [(40, "TB"), (30, "GB"), (20, "MB"), (10, "KB")] {
        if value >= 1u64 << shift {
            let in_units = value as f64 / (1u64 << shift) as f64;
            let formatted = format!("{in_units:.2}");
            let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
            return format!("{trimmed} {unit}");
        }
    }
    format!("{value} bytes")
}

/// License cell contents. Already HTML.
fn license_html(license: &str) -> String {
    match license {
        "" => String::new(),
        "distributable" => "Free to use and distribute, with or without modification".to_string(),
        "CC0-1.0" => CC0_LINK.to_string(),
        "CC0-1.0-with-OpenSeadragon" => format!(
            "<a href=\"https://openseadragon.github.io/license/\">3-clause BSD</a>\n          \
             for bundled OpenSeadragon,\n          {CC0_LINK}\n          otherwise"
        ),
        _ => "Unknown".to_string(),
    }
}

/// A listing row. Text fields are raw and escaped here.
#[derive(Debug, Default)]
struct Row<'a> {
    icon: &'a str,
    href: &'a str,
    name: &'a str,
    size: String,
    description: &'a str,
    license: &'a str,
    credit: &'a str,
}

impl Row<'_> {
    fn write_to(&self, html: &mut String) {
        let _ = write!(
            html,
            "  <tr>\n    <td class=\"filename\">\n      \
             <i class=\"filetype fa {}\"></i>\n      \
             <a href=\"{}\">{}</a>\n    </td>\n    \
             <td class=\"size\">{}</td>\n    \
             <td class=\"description\">{}</td>\n    \
             <td class=\"license\">\n          {}\n    </td>\n    \
             <td class=\"credit\">{}</td>\n  </tr>\n",
            self.icon,
            html_escape(self.href),
            html_escape(self.name),
            html_escape(&self.size),
            html_escape(self.description),
            license_html(self.license),
            html_escape(self.credit),
        );
    }
}

/// A non-slide file listed at the end of an index (the metadata itself).
#[derive(Debug, Clone)]
pub struct Extra {
    pub name: String,
    pub description: String,
    pub size: u64,
}

/// Contents of one `index.html`.
#[derive(Debug, Default)]
pub struct IndexPage<'a> {
    pub title: &'a str,
    pub has_parent: bool,

    /// Subdirectory name to format
    pub dirs: Option<&'a BTreeMap<String, String>>,

    /// File name to metadata
    pub files: Option<&'a BTreeMap<String, SlideRecord>>,

    pub extras: Vec<Extra>,
}

impl IndexPage<'_> {
    pub fn render(&self) -> String {
        let title = html_escape(self.title);
        let mut html = format!(
            "<!doctype html>\n{STYLE}\n<title>{title}</title>\n<h1>{title}</h1>\n<table>\n  <tr>\n    \
             <th>Name</th>\n    <th>Size</th>\n    <th>Description</th>\n    \
             <th>License</th>\n    <th>Credit</th>\n  </tr>\n"
        );

        if self.has_parent {
            Row {
                icon: "fa-level-up",
                href: "..",
                name: "[Parent Directory]",
                ..Default::default()
            }
            .write_to(&mut html);
        }

        for (name, format) in self.dirs.into_iter().flatten() {
            let href = format!("{name}/");
            Row {
                icon: "fa-folder",
                href: &href,
                name,
                description: format,
                ..Default::default()
            }
            .write_to(&mut html);
        }

        for (name, info) in self.files.into_iter().flatten() {
            let icon = if name.ends_with(".zip") {
                "fa-file-archive-o"
            } else {
                "fa-file-image-o"
            };
            Row {
                icon,
                href: name,
                name,
                size: file_size_units(info.size),
                description: &info.description,
                license: &info.license,
                credit: info.credit.as_deref().unwrap_or_default(),
            }
            .write_to(&mut html);
        }

        for extra in &self.extras {
            Row {
                icon: "fa-file-code-o",
                href: &extra.name,
                name: &extra.name,
                size: file_size_units(extra.size),
                description: &extra.description,
                ..Default::default()
            }
            .write_to(&mut html);
        }

        html.push_str("</table>\n");
        html
    }
}
