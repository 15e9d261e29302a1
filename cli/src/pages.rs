//! Markdown page discovery and text extraction
//!
//! Stands in for the site build: finds every Markdown source under the docs
//! directory and reduces it to the plain text that gets embedded.

use anyhow::{bail, Context, Result};
use regex::Regex;
use std::path::{Component, Path, PathBuf};

use docsearch_index::Page;

/// Strips Markdown and HTML markup down to searchable text
pub struct MarkdownExtractor {
    fence: Regex,
    image: Regex,
    link: Regex,
    html_tag: Regex,
    heading: Regex,
    block_marker: Regex,
    emphasis: Regex,
    table_pipe: Regex,
    loose_punctuation: Regex,
    whitespace: Regex,
}

impl MarkdownExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            fence: Regex::new(r"(?m)^\s*(```|~~~).*$")?,
            image: Regex::new(r"!\[([^\]]*)\]\([^)]*\)")?,
            link: Regex::new(r"\[([^\]]*)\]\([^)]*\)")?,
            html_tag: Regex::new(r"<[^>]*>")?,
            heading: Regex::new(r"(?m)^\s{0,3}#{1,6}\s+")?,
            block_marker: Regex::new(r"(?m)^\s*(?:[-+*]|\d+[.)]|>+)\s+")?,
            emphasis: Regex::new(r"[*`]+|~~")?,
            table_pipe: Regex::new(r"\|")?,
            loose_punctuation: Regex::new(r"\s+([.,;:!?)]+)(\s|$)")?,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    /// Plain text of a Markdown document, front matter removed
    pub fn extract(&self, markdown: &str) -> String {
        let body = strip_front_matter(markdown);

        let text = self.fence.replace_all(body, " ");
        let text = self.image.replace_all(&text, "$1");
        let text = self.link.replace_all(&text, "$1");
        let text = self.html_tag.replace_all(&text, " ");
        let text = self.heading.replace_all(&text, "");
        let text = self.block_marker.replace_all(&text, "");
        let text = self.emphasis.replace_all(&text, "");
        let text = self.table_pipe.replace_all(&text, " ");
        let text = self.loose_punctuation.replace_all(&text, "$1$2");
        let text = self.whitespace.replace_all(&text, " ");

        text.trim().to_string()
    }
}

/// Drop a leading YAML front matter block (`---` ... `---` or `...`)
///
/// An unterminated block is treated as ordinary content.
fn strip_front_matter(text: &str) -> &str {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let Some(rest) = text.strip_prefix("---") else {
        return text;
    };
    let Some(rest) = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
    else {
        return text;
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        offset += line.len();
        let line = line.trim_end();
        if line == "---" || line == "..." {
            return &rest[offset..];
        }
    }
    text
}

/// Every `*.md` file below `docs_dir`, sorted
pub fn discover_markdown(docs_dir: &Path) -> Result<Vec<PathBuf>> {
    if !docs_dir.is_dir() {
        bail!("docs directory not found: {}", docs_dir.display());
    }
    let root = without_cur_dir(docs_dir);
    let root = root
        .to_str()
        .with_context(|| format!("docs directory is not valid UTF-8: {}", docs_dir.display()))?;

    let pattern = if root.is_empty() {
        "**/*.md".to_string()
    } else {
        let escaped = glob::Pattern::escape(root);
        format!("{}/**/*.md", escaped.trim_end_matches('/'))
    };

    let mut files = Vec::new();
    for entry in glob::glob(&pattern).context("invalid docs glob pattern")? {
        let path = entry.context("failed to read docs directory")?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Site-relative page path for a source file
///
/// By default this is the source path relative to `docs_dir` with `/`
/// separators (`guide/install.md`). With `directory_urls` it is the
/// directory-style URL a static site generator serves (`guide/install/`,
/// `index.md` -> ``).
pub fn page_path(docs_dir: &Path, file: &Path, directory_urls: bool) -> Result<String> {
    let file = without_cur_dir(file);
    let relative = file.strip_prefix(without_cur_dir(docs_dir)).with_context(|| {
        format!(
            "{} is not inside {}",
            file.display(),
            docs_dir.display()
        )
    })?;

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(
                part.to_str()
                    .with_context(|| format!("page path is not valid UTF-8: {}", file.display()))?,
            ),
            _ => bail!("unexpected component in page path: {}", file.display()),
        }
    }
    let path = parts.join("/");

    if directory_urls {
        Ok(directory_url(&path))
    } else {
        Ok(path)
    }
}

/// `./docs` and `docs`, or `.` and ``, name the same directory; glob drops
/// the leading `./` from its matches
fn without_cur_dir(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn directory_url(path: &str) -> String {
    let stem = path.strip_suffix(".md").unwrap_or(path);
    match stem.rsplit_once('/') {
        Some((dir, "index" | "README")) => format!("{}/", dir),
        None if stem == "index" || stem == "README" => String::new(),
        _ => format!("{}/", stem),
    }
}

/// Discover, read, and extract every page under `docs_dir`
pub fn load_pages(
    docs_dir: &Path,
    directory_urls: bool,
    extractor: &MarkdownExtractor,
) -> Result<Vec<Page>> {
    let mut pages = Vec::new();
    for file in discover_markdown(docs_dir)? {
        let markdown = std::fs::read_to_string(&file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        let path = page_path(docs_dir, &file, directory_urls)?;
        let text = extractor.extract(&markdown);

        tracing::debug!("Extracted {} ({} chars)", path, text.len());
        pages.push(Page::new(path, text));
    }
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn extractor() -> MarkdownExtractor {
        MarkdownExtractor::new().unwrap()
    }

    #[test]
    fn test_strip_front_matter() {
        let doc = "---\ntitle: Install\ntags: [setup]\n---\n# Install\nBody";
        assert_eq!(strip_front_matter(doc), "# Install\nBody");
    }

    #[test]
    fn test_strip_front_matter_with_dots_terminator() {
        assert_eq!(strip_front_matter("---\r\na: 1\r\n...\r\nBody"), "Body");
    }

    #[test]
    fn test_unterminated_front_matter_is_content() {
        let doc = "---\nnot closed";
        assert_eq!(strip_front_matter(doc), doc);
    }

    #[test]
    fn test_horizontal_rule_is_not_front_matter() {
        let doc = "---- \nBody";
        assert_eq!(strip_front_matter(doc), doc);
    }

    #[test]
    fn test_extract_removes_markup() {
        let doc = r#"---
title: Search
---
# Semantic *search*

Pages are ranked by **meaning**, see [the guide](guide.md).

- first item
1. numbered <span class="x">item</span>

> quoted `code`

```rust
let answer = 42;
```
![diagram](img.png)
"#;
        assert_eq!(
            extractor().extract(doc),
            "Semantic search Pages are ranked by meaning, see the guide. first item numbered item quoted code let answer = 42; diagram"
        );
    }

    #[test]
    fn test_extract_keeps_identifiers() {
        assert_eq!(
            extractor().extract("Set `embedding_file` to a_b.json"),
            "Set embedding_file to a_b.json"
        );
    }

    #[test]
    fn test_extract_empty_document() {
        assert_eq!(extractor().extract("---\ntitle: Empty\n---\n\n"), "");
    }

    #[test]
    fn test_page_path_source_style() {
        let docs = Path::new("docs");
        assert_eq!(
            page_path(docs, &docs.join("guide").join("install.md"), false).unwrap(),
            "guide/install.md"
        );
    }

    #[test]
    fn test_page_path_directory_urls() {
        let docs = Path::new("docs");
        let cases = [
            ("index.md", ""),
            ("README.md", ""),
            ("about.md", "about/"),
            ("guide/index.md", "guide/"),
            ("guide/install.md", "guide/install/"),
        ];
        for (file, expected) in cases {
            let file = file.split('/').fold(docs.to_path_buf(), |p, part| p.join(part));
            assert_eq!(page_path(docs, &file, true).unwrap(), expected);
        }
    }

    #[test]
    fn test_page_path_with_cur_dir_prefix() {
        assert_eq!(
            page_path(Path::new("./docs"), Path::new("docs/guide/a.md"), false).unwrap(),
            "guide/a.md"
        );
        assert_eq!(
            page_path(Path::new("."), Path::new("guide/a.md"), false).unwrap(),
            "guide/a.md"
        );
        assert_eq!(
            page_path(Path::new("."), Path::new("./index.md"), true).unwrap(),
            ""
        );
    }

    #[test]
    fn test_extract_keeps_paths_and_tables() {
        assert_eq!(
            extractor().extract("Run ./setup.sh first.\n\n| flag | effect |\n|---|---|\n| `-k` | results |"),
            "Run ./setup.sh first. flag effect --- --- -k results"
        );
    }

    #[test]
    fn test_page_path_outside_docs_dir() {
        assert!(page_path(Path::new("docs"), Path::new("other/x.md"), false).is_err());
    }

    #[test]
    fn test_discover_markdown_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("guide")).unwrap();
        fs::write(dir.path().join("index.md"), "# Home").unwrap();
        fs::write(dir.path().join("guide").join("b.md"), "B").unwrap();
        fs::write(dir.path().join("guide").join("a.md"), "A").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let files = discover_markdown(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|f| page_path(dir.path(), f, false).unwrap())
            .collect();
        assert_eq!(names, vec!["guide/a.md", "guide/b.md", "index.md"]);
    }

    #[test]
    fn test_load_pages_relative_docs_dir() {
        let dir = tempfile::tempdir_in(".").unwrap();
        let name = dir.path().file_name().unwrap();
        let docs = Path::new(".").join(name).join("docs");
        assert!(docs.starts_with("."));
        fs::create_dir_all(docs.join("guide")).unwrap();
        fs::write(docs.join("guide").join("a.md"), "# A").unwrap();

        let pages = load_pages(&docs, false, &extractor()).unwrap();
        assert_eq!(pages, vec![Page::new("guide/a.md", "A")]);

        let pages = load_pages(&docs, true, &extractor()).unwrap();
        assert_eq!(pages, vec![Page::new("guide/a/", "A")]);
    }

    #[test]
    fn test_discover_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_markdown(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_load_pages() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("install.md"),
            "---\ntitle: Install\n---\n# Install\n\nRun `cargo install docsearch-cli`.",
        )
        .unwrap();

        let pages = load_pages(dir.path(), false, &extractor()).unwrap();
        assert_eq!(
            pages,
            vec![Page::new("install.md", "Install Run cargo install docsearch-cli.")]
        );
    }
}
