use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

const DOCUMENT_EXTENSIONS: [&str; 2] = ["md", "mdx"];

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    pub slug: String,
    pub title: Option<String>,
    pub body: String,
    pub tags: Vec<String>,
    pub authors: Vec<String>,
    pub sealed: bool,
}

impl Document {
    pub fn new(slug: impl Into<String>, title: Option<&str>, body: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            title: title.map(str::to_owned),
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn label(&self) -> &str {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .unwrap_or(&self.slug)
    }
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid front matter in {path}")]
    FrontMatter {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("front matter in {path} is never closed")]
    UnclosedFrontMatter { path: PathBuf },
    #[error("file name of {path} is not valid UTF-8, no slug can be derived")]
    InvalidSlug { path: PathBuf },
}

#[derive(Debug, Default, Deserialize)]
struct FrontMatter {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
    #[serde(default)]
    sealed: bool,
}

pub struct LoadedCorpus {
    pub documents: Vec<Document>,
    pub unreadable: usize,
}

pub trait Corpus {
    fn load(&self) -> Result<LoadedCorpus>;
}

pub struct DirectoryCorpus {
    root: PathBuf,
}

impl DirectoryCorpus {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn document_paths(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("failed to list corpus directory {}", self.root.display()))?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| {
                format!("failed to read entry in {}", self.root.display())
            })?;
            let path = entry.path();
            let is_document = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| DOCUMENT_EXTENSIONS.contains(&ext));
            if is_document && path.is_file() {
                paths.push(path);
            }
        }

        // Stable order keeps extraction output identical across runs and filesystems.
        paths.sort();
        Ok(paths)
    }
}

impl Corpus for DirectoryCorpus {
    fn load(&self) -> Result<LoadedCorpus> {
        let paths = self.document_paths()?;
        let mut documents = Vec::with_capacity(paths.len());
        let mut slugs = HashSet::new();
        let mut unreadable = 0usize;

        for path in paths {
            let document = match read_document(&path) {
                Ok(document) => document,
                Err(error) => {
                    warn!(path = %path.display(), error = %error, "skipping unreadable document");
                    unreadable += 1;
                    continue;
                }
            };
            if !slugs.insert(document.slug.clone()) {
                warn!(
                    path = %path.display(),
                    slug = %document.slug,
                    "another file already provides this slug, skipping"
                );
                continue;
            }
            documents.push(document);
        }

        debug!(count = documents.len(), unreadable, root = %self.root.display(), "corpus loaded");
        Ok(LoadedCorpus {
            documents,
            unreadable,
        })
    }
}

pub fn read_document(path: &Path) -> Result<Document, DocumentError> {
    let slug = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| DocumentError::InvalidSlug {
            path: path.to_path_buf(),
        })?
        .to_string();
    let raw = fs::read_to_string(path).map_err(|source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document(slug, &raw, path)
}

pub fn parse_document(slug: String, raw: &str, path: &Path) -> Result<Document, DocumentError> {
    let (front_matter, body) = split_front_matter(raw, path)?;
    let meta = match front_matter {
        Some(yaml) if !yaml.trim().is_empty() => {
            serde_yaml::from_str::<FrontMatter>(yaml).map_err(|source| {
                DocumentError::FrontMatter {
                    path: path.to_path_buf(),
                    source,
                }
            })?
        }
        _ => FrontMatter::default(),
    };

    let mut authors = meta.authors;
    if let Some(author) = meta.author
        && !authors.contains(&author)
    {
        authors.insert(0, author);
    }
    authors.retain(|author| !author.trim().is_empty());

    let mut tags = meta.tags;
    tags.retain(|tag| !tag.trim().is_empty());

    Ok(Document {
        slug,
        title: meta.title,
        body: body.to_string(),
        tags,
        authors,
        sealed: meta.sealed,
    })
}

fn split_front_matter<'a>(
    raw: &'a str,
    path: &Path,
) -> Result<(Option<&'a str>, &'a str), DocumentError> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let Some(rest) = raw
        .strip_prefix("---\n")
        .or_else(|| raw.strip_prefix("---\r\n"))
    else {
        return Ok((None, raw));
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Ok((Some(yaml), body));
        }
        offset += line.len();
    }

    Err(DocumentError::UnclosedFrontMatter {
        path: path.to_path_buf(),
    })
}
