//! YAML frontmatter extraction for markdown documents.

use lore_core::LoreError;
use serde_yaml::{Mapping, Value};

/// Split a leading `---`-delimited YAML block from the document body.
///
/// Returns `(None, content)` when the text has no frontmatter or the block is
/// never closed. An empty block yields an empty mapping.
///
/// # Errors
///
/// Returns [`LoreError::Parse`] if the block is not valid YAML or is not a mapping.
///
/// # Examples
///
/// ```
/// use lore_ingest::frontmatter::split_frontmatter;
///
/// let (meta, body) = split_frontmatter("---\ntitle: Agents\n---\n# Agents\n").unwrap();
/// assert_eq!(meta.unwrap()["title"].as_str(), Some("Agents"));
/// assert_eq!(body, "# Agents\n");
/// ```
pub fn split_frontmatter(content: &str) -> Result<(Option<Mapping>, &str), LoreError> {
    let text = content.strip_prefix('\u{feff}').unwrap_or(content);
    let Some(rest) = text.strip_prefix("---") else {
        return Ok((None, content));
    };
    let Some(rest) = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
    else {
        return Ok((None, content));
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed == "---" || trimmed == "..." {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Ok((Some(parse_mapping(yaml)?), body));
        }
        offset += line.len();
    }

    Ok((None, content))
}

/// Read the `title` key, if it is a non-empty string.
///
/// # Examples
///
/// ```
/// use lore_ingest::frontmatter::{split_frontmatter, title};
///
/// let (meta, _) = split_frontmatter("---\ntitle: \"  Tools \"\n---\nbody").unwrap();
/// assert_eq!(title(&meta.unwrap()).as_deref(), Some("Tools"));
/// ```
pub fn title(meta: &Mapping) -> Option<String> {
    meta.get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn parse_mapping(yaml: &str) -> Result<Mapping, LoreError> {
    if yaml.trim().is_empty() {
        return Ok(Mapping::new());
    }
    let value: Value = serde_yaml::from_str(yaml)
        .map_err(|e| LoreError::Parse(format!("invalid frontmatter: {e}")))?;
    match value {
        Value::Mapping(m) => Ok(m),
        Value::Null => Ok(Mapping::new()),
        _ => Err(LoreError::Parse(
            "frontmatter must be a key/value mapping".into(),
        )),
    }
}
