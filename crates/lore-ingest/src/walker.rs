use std::path::Path;

use lore_core::{Document, LoreError, SourceConfig};
use tracing::{debug, warn};

use crate::frontmatter;

/// Maximum file size to process (1 MB).
const MAX_FILE_SIZE: u64 = 1_048_576;

/// Number of bytes to check for binary detection.
const BINARY_CHECK_SIZE: usize = 8192;

/// Returns `true` if `path` has one of the configured document extensions.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use lore_core::SourceConfig;
/// use lore_ingest::walker::is_document;
///
/// let config = SourceConfig::default();
/// assert!(is_document(Path::new("docs/Guide.MDX"), &config));
/// assert!(!is_document(Path::new("src/main.rs"), &config));
/// ```
pub fn is_document(path: &Path, config: &SourceConfig) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    config
        .extensions
        .iter()
        .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
}

/// Turn raw file content into a [`Document`], stripping frontmatter.
///
/// A malformed frontmatter block is logged and the file is kept whole, so one
/// bad header never drops a document from the corpus.
///
/// # Examples
///
/// ```
/// use lore_ingest::walker::parse_document;
///
/// let doc = parse_document("guide.md", "---\ntitle: Guide\n---\n# Start\n");
/// assert_eq!(doc.title.as_deref(), Some("Guide"));
/// assert_eq!(doc.text, "# Start\n");
/// ```
pub fn parse_document(identifier: &str, content: &str) -> Document {
    match frontmatter::split_frontmatter(content) {
        Ok((Some(meta), body)) => Document {
            identifier: identifier.to_string(),
            text: body.to_string(),
            title: frontmatter::title(&meta),
        },
        Ok((None, body)) => Document::new(identifier, body),
        Err(e) => {
            warn!(identifier, error = %e, "ignoring malformed frontmatter");
            Document::new(identifier, content)
        }
    }
}

/// Walk a documentation tree, respecting `.gitignore`, returning text documents.
///
/// Skips binary files, files larger than 1 MB, and files whose extension is
/// not listed in `config.extensions`. Identifiers are `/`-separated paths
/// relative to `root`, and the result is sorted by identifier.
///
/// # Errors
///
/// Returns [`LoreError::FileNotFound`] if `root` does not exist.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use lore_core::SourceConfig;
/// use lore_ingest::walker::walk_docs;
///
/// let docs = walk_docs(Path::new("docs"), &SourceConfig::default()).unwrap();
/// for d in &docs {
///     println!("{} ({} bytes)", d.identifier, d.text.len());
/// }
/// ```
pub fn walk_docs(root: &Path, config: &SourceConfig) -> Result<Vec<Document>, LoreError> {
    if !root.exists() {
        return Err(LoreError::FileNotFound(root.to_path_buf()));
    }

    let walker = ignore::WalkBuilder::new(root).build();
    let mut docs = Vec::new();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!(error = %e, "skipping unreadable entry");
                continue;
            }
        };

        let Some(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_file() {
            continue;
        }

        let path = entry.path();
        if !is_document(path, config) {
            continue;
        }

        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(_) => continue,
        };
        if metadata.len() > MAX_FILE_SIZE {
            debug!(path = %path.display(), size = metadata.len(), "skipping oversized file");
            continue;
        }

        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable file");
                continue;
            }
        };

        // Null bytes in the first 8KB mean binary content
        let check_len = bytes.len().min(BINARY_CHECK_SIZE);
        if bytes[..check_len].contains(&0) {
            debug!(path = %path.display(), "skipping binary file");
            continue;
        }

        let content = match String::from_utf8(bytes) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %path.display(), "invalid UTF-8; dropping undecodable bytes");
                decode_lossy(e.as_bytes())
            }
        };

        let relative = path.strip_prefix(root).unwrap_or(path);
        let identifier = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        docs.push(parse_document(&identifier, &content));
    }

    docs.sort_by(|a, b| a.identifier.cmp(&b.identifier));
    debug!(root = %root.display(), documents = docs.len(), "walked documentation tree");
    Ok(docs)
}

/// Decode `bytes` as UTF-8, dropping invalid sequences.
fn decode_lossy(bytes: &[u8]) -> String {
    bytes
        .utf8_chunks()
        .map(|chunk| chunk.valid())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn make_temp_docs() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        fs::create_dir_all(root.join("docs/guide")).unwrap();
        fs::write(root.join("README.md"), "# Project\n\nIntro").unwrap();
        fs::write(
            root.join("docs/guide/install.md"),
            "---\ntitle: Installation\n---\n## Install\n\npip install it",
        )
        .unwrap();
        fs::write(root.join("docs/agents.mdx"), "# Agents\n\n<Note>hi</Note>").unwrap();
        fs::write(root.join("src.rs"), "fn main() {}").unwrap();
        fs::write(root.join("notes.txt"), "plain").unwrap();

        dir
    }

    #[test]
    fn walk_finds_markdown_files_sorted() {
        let dir = make_temp_docs();
        let docs = walk_docs(dir.path(), &SourceConfig::default()).unwrap();

        let ids: Vec<&str> = docs.iter().map(|d| d.identifier.as_str()).collect();
        assert_eq!(ids, vec!["README.md", "docs/agents.mdx", "docs/guide/install.md"]);
    }

    #[test]
    fn walk_strips_frontmatter_and_keeps_title() {
        let dir = make_temp_docs();
        let docs = walk_docs(dir.path(), &SourceConfig::default()).unwrap();

        let install = docs
            .iter()
            .find(|d| d.identifier == "docs/guide/install.md")
            .unwrap();
        assert_eq!(install.title.as_deref(), Some("Installation"));
        assert!(install.text.starts_with("## Install"));
    }

    #[test]
    fn walk_honours_configured_extensions() {
        let dir = make_temp_docs();
        let config = SourceConfig {
            extensions: vec!["txt".into()],
        };
        let docs = walk_docs(dir.path(), &config).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].identifier, "notes.txt");
    }

    #[test]
    fn walk_respects_gitignore() {
        let dir = make_temp_docs();
        let root = dir.path();

        // The ignore crate needs a .git dir to recognize .gitignore files
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::create_dir_all(root.join("build")).unwrap();
        fs::write(root.join("build/generated.md"), "# Generated").unwrap();
        fs::write(root.join(".gitignore"), "build/\n").unwrap();

        let docs = walk_docs(root, &SourceConfig::default()).unwrap();
        assert!(docs.iter().all(|d| !d.identifier.starts_with("build")));
    }

    #[test]
    fn walk_skips_binary_and_large_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        let mut binary = b"# Binary ".to_vec();
        binary.push(0);
        fs::write(root.join("binary.md"), &binary).unwrap();
        fs::write(root.join("huge.md"), "x".repeat(1_048_577)).unwrap();
        fs::write(root.join("ok.md"), "# Ok").unwrap();

        let docs = walk_docs(root, &SourceConfig::default()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].identifier, "ok.md");
    }

    #[test]
    fn invalid_utf8_is_decoded_without_the_bad_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = b"# Caf".to_vec();
        bytes.push(0xE9); // latin-1 e-acute
        bytes.extend_from_slice(b"\nMenu");
        fs::write(dir.path().join("latin1.md"), &bytes).unwrap();

        let docs = walk_docs(dir.path(), &SourceConfig::default()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "# Caf\nMenu");
    }

    #[test]
    fn malformed_frontmatter_keeps_whole_file() {
        let doc = parse_document("bad.md", "---\n: : :\n  - [\n---\nbody");
        assert!(doc.title.is_none());
        assert!(doc.text.starts_with("---"));
    }

    #[test]
    fn missing_root_is_an_error() {
        let err = walk_docs(Path::new("/no/such/docs/root"), &SourceConfig::default()).unwrap_err();
        assert!(matches!(err, LoreError::FileNotFound(_)));
    }
}
