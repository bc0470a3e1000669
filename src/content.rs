//! Article discovery and card locations on disk

use crate::{CardConfig, Error, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

/// An article file found in the content directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    /// File stem, used as URL path and card directory name
    pub slug: String,
    /// Path of the article source file
    pub path: PathBuf,
}

/// List the articles in `dir`, sorted by file name.
///
/// Only regular files directly inside `dir` whose extension is one of
/// `extensions` are articles. A missing or unreadable directory is an error;
/// an empty one yields no articles.
pub fn discover_articles(dir: &Path, extensions: &[String]) -> Result<Vec<Article>> {
    let mut articles = Vec::new();

    for entry in walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "directory walk failed"));
            Error::io(dir, source)
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let recognized = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| extensions.iter().any(|e| e == ext))
            .unwrap_or(false);
        if !recognized {
            log::debug!("Ignoring non-article file {:?}", path);
            continue;
        }

        match path.file_stem().and_then(|stem| stem.to_str()) {
            Some(slug) if !slug.is_empty() => articles.push(Article {
                slug: slug.to_string(),
                path: path.to_path_buf(),
            }),
            _ => log::warn!("Skipping article with unusable file name {:?}", path),
        }
    }

    Ok(articles)
}

/// Where a slug's card lives on disk and on the site
#[derive(Debug, Clone)]
pub struct CardPaths {
    output_root: PathBuf,
    cards_dir: String,
    file_name: String,
}

impl CardPaths {
    pub fn new(config: &CardConfig) -> Self {
        let cards_dir = config.cards_dir.trim_matches('/').to_string();
        Self {
            output_root: config.public_dir.join(&cards_dir),
            cards_dir,
            file_name: format!("{}.{}", config.card_basename, config.format.extension()),
        }
    }

    /// `<public_dir>/<cards_dir>`
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// `<output_root>/<slug>/<card file>`
    pub fn card_path(&self, slug: &str) -> PathBuf {
        self.output_root.join(slug).join(&self.file_name)
    }

    /// Site-absolute path referenced from the article's front matter
    pub fn public_path(&self, slug: &str) -> String {
        format!("/{}/{}/{}", self.cards_dir, slug, self.file_name)
    }

    /// Whether the card for `slug` has already been generated.
    ///
    /// Advisory only: nothing stops another writer from creating or replacing
    /// the file right after this returns.
    pub fn card_exists(&self, slug: &str) -> bool {
        self.card_path(slug).is_file()
    }
}

/// Replace the contents of `path` with `bytes` without ever exposing a
/// partially written file. Missing parent directories are created.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| Error::io(parent, e))?;
    tmp.write_all(bytes).map_err(|e| Error::io(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| Error::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| Error::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exts() -> Vec<String> {
        vec!["md".to_string(), "mdx".to_string()]
    }

    #[test]
    fn discovers_recognized_files_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["zeta.mdx", "alpha.md", "notes.txt", "beta.md"] {
            std::fs::write(dir.path().join(name), "---\ntitle: x\n---\n").unwrap();
        }
        std::fs::create_dir(dir.path().join("drafts.md")).unwrap();

        let slugs: Vec<String> = discover_articles(dir.path(), &exts())
            .unwrap()
            .into_iter()
            .map(|a| a.slug)
            .collect();
        assert_eq!(slugs, vec!["alpha", "beta", "zeta"]);
    }

    #[test]
    fn empty_directory_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_articles(dir.path(), &exts()).unwrap().is_empty());
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_articles(&dir.path().join("nope"), &exts()).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn card_paths_follow_slug() {
        let config = CardConfig {
            public_dir: PathBuf::from("site"),
            cards_dir: "/static/cards/".to_string(),
            ..Default::default()
        };
        let paths = CardPaths::new(&config);
        assert_eq!(paths.output_root(), Path::new("site/static/cards"));
        assert_eq!(paths.card_path("post"), PathBuf::from("site/static/cards/post/twitter-card.png"));
        assert_eq!(paths.public_path("post"), "/static/cards/post/twitter-card.png");
    }

    #[test]
    fn card_exists_tracks_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = CardConfig {
            public_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let paths = CardPaths::new(&config);
        assert!(!paths.card_exists("a"));
        write_atomic(&paths.card_path("a"), b"png").unwrap();
        assert!(paths.card_exists("a"));
    }

    #[test]
    fn write_atomic_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/dir/file.bin");
        write_atomic(&target, b"first").unwrap();
        write_atomic(&target, b"second").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"second");
        assert_eq!(std::fs::read_dir(target.parent().unwrap()).unwrap().count(), 1);
    }
}
