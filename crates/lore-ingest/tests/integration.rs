//! Integration test: walk → strip frontmatter → chunk on a small docs tree.

use std::fs;

use lore_core::{ChunkPosition, ChunkStrategy, SourceConfig};

fn docs_tree() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("guides")).unwrap();

    fs::write(
        root.join("guides/agents.md"),
        "---\ntitle: Agents\n---\nAgents run tools.\n\n## Tools\nA tool is a function.\n\n### Schema\nJSON.\n\n## Memory\nState between turns.\n",
    )
    .unwrap();
    fs::write(root.join("index.mdx"), "# Welcome\n\nStart here.\n").unwrap();
    fs::write(root.join("skip.txt"), "# Not docs").unwrap();
    dir
}

#[test]
fn walk_and_chunk_by_sections() {
    let dir = docs_tree();
    let docs = lore_ingest::walk_docs(dir.path(), &SourceConfig::default()).unwrap();
    assert_eq!(docs.len(), 2);

    let chunks = lore_ingest::chunk_corpus(&docs, &ChunkStrategy::HeaderSection { level: 2 }).unwrap();

    // guides/agents.md sorts before index.mdx
    let summary: Vec<(usize, &str, String)> = chunks
        .iter()
        .map(|c| (c.id, c.source.as_str(), c.position.to_string()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (0, "guides/agents.md", "preamble".to_string()),
            (1, "guides/agents.md", "Tools".to_string()),
            (2, "guides/agents.md", "Memory".to_string()),
            (3, "index.mdx", "Welcome".to_string()),
        ]
    );

    assert!(chunks[1].text.contains("### Schema"));
    assert!(chunks.iter().all(|c| !c.text.trim().is_empty()));
    assert!(chunks[..3]
        .iter()
        .all(|c| c.title.as_deref() == Some("Agents")));
    assert!(chunks[3].title.is_none());
}

#[test]
fn walk_and_chunk_by_windows() {
    let dir = docs_tree();
    let docs = lore_ingest::walk_docs(dir.path(), &SourceConfig::default()).unwrap();

    let chunks =
        lore_ingest::chunk_corpus(&docs, &ChunkStrategy::SlidingWindow { size: 4, step: 2 })
            .unwrap();
    assert!(!chunks.is_empty());

    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.id, i);
        assert!(chunk.text.split_whitespace().count() <= 4);
        assert!(matches!(chunk.position, ChunkPosition::Window { .. }));
    }

    // Frontmatter never leaks into chunk text
    assert!(chunks.iter().all(|c| !c.text.contains("title:")));
}
