//! YAML front matter reader/writer.
//!
//! A [`Document`] splits an article into its `---` delimited YAML header and
//! its body. The header is held as an order-preserving mapping so unknown
//! fields survive a rewrite, and the original header text is kept so a
//! document that was never modified renders back to exactly its input.
//! The body is never touched. A leading byte order mark is kept aside and
//! written back on render.

use crate::content::write_atomic;
use crate::{Error, Result};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

const DELIMITER: &str = "---";
const BOM: char = '\u{feff}';

/// Front matter key holding the article's ordered image list
pub const IMAGES_KEY: &str = "images";

/// A parsed article
#[derive(Debug, Clone)]
pub struct Document {
    path: PathBuf,
    bom: bool,
    /// Everything before the body, verbatim (empty when the file had no header)
    front: String,
    data: Mapping,
    body: String,
    newline: &'static str,
    modified: bool,
}

impl Document {
    /// Split `raw` into front matter and body. `path` is only used in errors.
    pub fn parse(raw: &str, path: &Path) -> Result<Self> {
        let (bom, raw) = match raw.strip_prefix(BOM) {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let newline = if raw.contains("\r\n") { "\r\n" } else { "\n" };

        let Some((front, header, body)) = split(raw).map_err(|message| Error::front_matter(path, message))? else {
            return Ok(Self {
                path: path.to_path_buf(),
                bom,
                front: String::new(),
                data: Mapping::new(),
                body: raw.to_string(),
                newline,
                modified: false,
            });
        };

        let data = if header.trim().is_empty() {
            Mapping::new()
        } else {
            match serde_yaml::from_str::<Value>(header).map_err(|e| Error::front_matter(path, e.to_string()))? {
                Value::Mapping(m) => m,
                Value::Null => Mapping::new(),
                _ => return Err(Error::front_matter(path, "front matter is not a key/value mapping")),
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            bom,
            front: front.to_string(),
            data,
            body: body.to_string(),
            newline,
            modified: false,
        })
    }

    /// Read and parse the article at `path`
    pub fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::parse(&raw, path)
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn data(&self) -> &Mapping {
        &self.data
    }

    /// String entries of the `images` list, in order
    pub fn images(&self) -> Vec<String> {
        match self.data.get(IMAGES_KEY) {
            Some(Value::Sequence(seq)) => seq.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
            Some(Value::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    /// Make sure `image` is listed under `images`, inserting it first if not.
    ///
    /// Returns whether the document changed. Membership is exact string
    /// equality against every entry, so repeated calls never duplicate it.
    pub fn add_image(&mut self, image: &str) -> Result<bool> {
        let entry = Value::String(image.to_string());

        let changed = match self.data.get_mut(IMAGES_KEY) {
            None | Some(Value::Null) => {
                self.data.insert(Value::String(IMAGES_KEY.to_string()), Value::Sequence(vec![entry]));
                true
            }
            Some(Value::Sequence(seq)) => {
                if seq.iter().any(|v| v.as_str() == Some(image)) {
                    false
                } else {
                    seq.insert(0, entry);
                    true
                }
            }
            Some(existing @ Value::String(_)) => {
                if existing.as_str() == Some(image) {
                    false
                } else {
                    let previous = std::mem::replace(existing, Value::Null);
                    *existing = Value::Sequence(vec![entry, previous]);
                    true
                }
            }
            Some(_) => {
                return Err(Error::front_matter(&self.path, format!("`{}` must be a list of paths", IMAGES_KEY)));
            }
        };

        self.modified |= changed;
        Ok(changed)
    }

    /// Render the document back to text
    pub fn render(&self) -> Result<String> {
        let bom = if self.bom { "\u{feff}" } else { "" };
        if !self.modified {
            return Ok(format!("{}{}{}", bom, self.front, self.body));
        }

        let yaml = serde_yaml::to_string(&self.data).map_err(|e| Error::front_matter(&self.path, e.to_string()))?;
        let yaml = if self.newline == "\n" { yaml } else { yaml.replace('\n', self.newline) };

        Ok(format!(
            "{bom}{delim}{nl}{yaml}{delim}{nl}{body}",
            bom = bom,
            delim = DELIMITER,
            nl = self.newline,
            yaml = yaml,
            body = self.body
        ))
    }
}

/// Split `raw` into (front, header, body) where `front` is the whole header
/// block including both delimiter lines.
///
/// `Ok(None)` means the text has no header. An opening delimiter without a
/// closing one is an error rather than body text, otherwise a rewrite would
/// stack a second header on top of the real one.
fn split(raw: &str) -> std::result::Result<Option<(&str, &str, &str)>, &'static str> {
    let first_len = line_len(raw);
    if raw[..first_len].trim_end_matches(['\r', '\n']) != DELIMITER {
        return Ok(None);
    }

    let mut offset = first_len;
    while offset < raw.len() {
        let len = line_len(&raw[offset..]);
        let line = &raw[offset..offset + len];
        if line.trim_end_matches(['\r', '\n']) == DELIMITER {
            let body_start = offset + len;
            return Ok(Some((&raw[..body_start], &raw[first_len..offset], &raw[body_start..])));
        }
        offset += len;
    }

    Err("front matter opened with `---` is never closed")
}

/// Length of the first line of `s`, including its line terminator
fn line_len(s: &str) -> usize {
    s.find('\n').map(|i| i + 1).unwrap_or(s.len())
}

/// Insert `image` into the `images` list of the article at `path`.
///
/// The file is rewritten atomically and only when its front matter changed.
/// Returns whether it was rewritten.
pub fn update_article_images(path: &Path, image: &str) -> Result<bool> {
    let mut doc = Document::read(path)?;
    if !doc.add_image(image)? {
        return Ok(false);
    }
    write_atomic(path, doc.render()?.as_bytes())?;
    Ok(true)
}
