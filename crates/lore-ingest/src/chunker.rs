//! Document chunking: sliding word windows and markdown header sections.
//!
//! [`chunk_document`] validates the strategy up front and hands back a
//! cloneable iterator that slices chunks out of the document on demand, so a
//! caller can walk the same document twice without re-validating. Header
//! sections are located with `pulldown-cmark`.

use lore_core::{Chunk, ChunkId, ChunkPosition, ChunkStrategy, Document, LoreError};
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use tracing::info;

/// A chunk before it has been given an id by the index-build step.
///
/// Borrows its text from the source [`Document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDraft<'a> {
    /// Identifier of the source document.
    pub source: &'a str,
    /// Title of the source document, if any.
    pub title: Option<&'a str>,
    /// Non-empty slice of the document text.
    pub text: &'a str,
    /// Where the slice sits in the document.
    pub position: ChunkPosition,
}

impl ChunkDraft<'_> {
    /// Freeze the draft into an owned [`Chunk`].
    pub fn into_chunk(self, id: ChunkId) -> Chunk {
        Chunk {
            id,
            source: self.source.to_string(),
            title: self.title.map(str::to_string),
            text: self.text.to_string(),
            position: self.position,
        }
    }
}

/// Lazy chunk sequence for one document.
#[derive(Debug, Clone)]
pub enum Chunks<'a> {
    /// Fixed-size word windows.
    Window(SlidingWindow<'a>),
    /// Markdown header sections.
    Sections(HeaderSections<'a>),
}

impl<'a> Iterator for Chunks<'a> {
    type Item = ChunkDraft<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Chunks::Window(w) => w.next(),
            Chunks::Sections(s) => s.next(),
        }
    }
}

/// Split one document according to `strategy`.
///
/// # Errors
///
/// Returns [`LoreError::Config`] if the strategy parameters are invalid. The
/// check happens before any chunk is produced.
///
/// # Examples
///
/// ```
/// use lore_core::{ChunkStrategy, Document};
/// use lore_ingest::chunker::chunk_document;
///
/// let doc = Document::new("a.md", "one two three four five");
/// let strategy = ChunkStrategy::SlidingWindow { size: 2, step: 2 };
/// let texts: Vec<&str> = chunk_document(&doc, &strategy)
///     .unwrap()
///     .map(|c| c.text)
///     .collect();
/// assert_eq!(texts, vec!["one two", "three four", "five"]);
/// ```
pub fn chunk_document<'a>(
    document: &'a Document,
    strategy: &ChunkStrategy,
) -> Result<Chunks<'a>, LoreError> {
    strategy.validate()?;
    Ok(match *strategy {
        ChunkStrategy::SlidingWindow { size, step } => {
            Chunks::Window(SlidingWindow::new(document, size, step))
        }
        ChunkStrategy::HeaderSection { level } => {
            Chunks::Sections(HeaderSections::new(document, level))
        }
    })
}

/// Chunk a whole corpus, assigning ids in document order then chunk order.
///
/// # Errors
///
/// Returns [`LoreError::Config`] if the strategy parameters are invalid.
///
/// # Examples
///
/// ```
/// use lore_core::{ChunkStrategy, Document};
/// use lore_ingest::chunker::chunk_corpus;
///
/// let docs = vec![
///     Document::new("a.md", "# A\nfoo bar"),
///     Document::new("b.md", "# B\nbaz qux"),
/// ];
/// let chunks = chunk_corpus(&docs, &ChunkStrategy::SlidingWindow { size: 2, step: 2 }).unwrap();
/// assert_eq!(chunks.len(), 4);
/// assert_eq!(chunks[3].id, 3);
/// assert_eq!(chunks[3].text, "baz qux");
/// ```
pub fn chunk_corpus(
    documents: &[Document],
    strategy: &ChunkStrategy,
) -> Result<Vec<Chunk>, LoreError> {
    strategy.validate()?;
    let mut chunks = Vec::new();
    for document in documents {
        for draft in chunk_document(document, strategy)? {
            let id = chunks.len();
            chunks.push(draft.into_chunk(id));
        }
    }
    info!(
        documents = documents.len(),
        chunks = chunks.len(),
        %strategy,
        "chunked corpus"
    );
    Ok(chunks)
}

/// Byte spans `[start, end)` of each whitespace-separated word in `text`.
fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, ch) in text.char_indices() {
        match (ch.is_whitespace(), start) {
            (true, Some(s)) => {
                spans.push((s, i));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}

/// Windows of `size` words advancing by `step`, ending after the first window
/// that reaches the last word.
#[derive(Debug, Clone)]
pub struct SlidingWindow<'a> {
    document: &'a Document,
    spans: Vec<(usize, usize)>,
    size: usize,
    step: usize,
    index: usize,
    done: bool,
}

impl<'a> SlidingWindow<'a> {
    fn new(document: &'a Document, size: usize, step: usize) -> Self {
        let spans = word_spans(&document.text);
        let done = spans.is_empty();
        Self {
            document,
            spans,
            size,
            step,
            index: 0,
            done,
        }
    }
}

impl<'a> Iterator for SlidingWindow<'a> {
    type Item = ChunkDraft<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let n = self.spans.len();
        let start = self.index * self.step;
        if start >= n {
            self.done = true;
            return None;
        }
        let end = (start + self.size).min(n);
        let text = &self.document.text[self.spans[start].0..self.spans[end - 1].1];

        let draft = ChunkDraft {
            source: &self.document.identifier,
            title: self.document.title.as_deref(),
            text,
            position: ChunkPosition::Window {
                index: self.index,
                start_word: start,
                end_word: end,
            },
        };
        self.index += 1;
        self.done = end >= n;
        Some(draft)
    }
}

/// Sections opened by markdown headings at depth `<= level`.
///
/// Heading boundaries come from one CommonMark parse when the iterator is
/// created, so ATX and setext headings are both recognised and anything inside
/// code blocks, HTML blocks, lists or block quotes is left alone. Deeper
/// headings stay inside the enclosing chunk but still feed the heading path.
#[derive(Debug, Clone)]
pub struct HeaderSections<'a> {
    document: &'a Document,
    boundaries: std::vec::IntoIter<(usize, ChunkPosition)>,
    open_start: usize,
    open_position: Option<ChunkPosition>,
}

impl<'a> HeaderSections<'a> {
    fn new(document: &'a Document, level: u8) -> Self {
        Self {
            document,
            boundaries: section_boundaries(&document.text, level).into_iter(),
            open_start: 0,
            open_position: Some(ChunkPosition::Preamble),
        }
    }

    fn draft(&self, start: usize, end: usize, position: ChunkPosition) -> Option<ChunkDraft<'a>> {
        let text = self.document.text[start..end].trim();
        if text.is_empty() {
            return None;
        }
        Some(ChunkDraft {
            source: &self.document.identifier,
            title: self.document.title.as_deref(),
            text,
            position,
        })
    }
}

impl<'a> Iterator for HeaderSections<'a> {
    type Item = ChunkDraft<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let position = self.open_position.take()?;
            let start = self.open_start;
            let end = match self.boundaries.next() {
                Some((next_start, next_position)) => {
                    self.open_start = next_start;
                    self.open_position = Some(next_position);
                    next_start
                }
                None => self.document.text.len(),
            };
            if let Some(draft) = self.draft(start, end, position) {
                return Some(draft);
            }
        }
    }
}

/// Byte offsets and positions of the top-level headings that open a section.
fn section_boundaries(text: &str, level: u8) -> Vec<(usize, ChunkPosition)> {
    let mut boundaries = Vec::new();
    let mut stack: Vec<(u8, String)> = Vec::new();
    let mut nesting = 0usize;
    // (start offset, depth, title so far) of the heading being read
    let mut open: Option<(usize, u8, String)> = None;

    for (event, range) in Parser::new(text).into_offset_iter() {
        match event {
            Event::Start(Tag::Heading { level: depth, .. }) if nesting == 0 => {
                open = Some((range.start, depth as u8, String::new()));
                nesting += 1;
            }
            Event::End(TagEnd::Heading(_)) if nesting == 1 => {
                nesting -= 1;
                let Some((start, depth, title)) = open.take() else {
                    continue;
                };
                while stack.last().is_some_and(|(d, _)| *d >= depth) {
                    stack.pop();
                }
                stack.push((depth, title.trim().to_string()));
                if depth <= level {
                    let heading_path = stack.iter().map(|(_, t)| t.clone()).collect();
                    boundaries.push((
                        start,
                        ChunkPosition::Section {
                            heading_path,
                            level: depth,
                        },
                    ));
                }
            }
            Event::Start(_) => nesting += 1,
            Event::End(_) => nesting = nesting.saturating_sub(1),
            Event::Text(part) | Event::Code(part) => {
                if let Some((_, _, title)) = open.as_mut() {
                    title.push_str(&part);
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if let Some((_, _, title)) = open.as_mut() {
                    title.push(' ');
                }
            }
            _ => {}
        }
    }
    boundaries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn windows(text: &str, size: usize, step: usize) -> Vec<String> {
        let doc = Document::new("doc.md", text);
        chunk_document(&doc, &ChunkStrategy::SlidingWindow { size, step })
            .unwrap()
            .map(|c| c.text.to_string())
            .collect()
    }

    fn sections(text: &str, level: u8) -> Vec<(String, ChunkPosition)> {
        let doc = Document::new("doc.md", text);
        chunk_document(&doc, &ChunkStrategy::HeaderSection { level })
            .unwrap()
            .map(|c| (c.text.to_string(), c.position))
            .collect()
    }

    fn section(path: &[&str], level: u8) -> ChunkPosition {
        ChunkPosition::Section {
            heading_path: path.iter().map(|s| s.to_string()).collect(),
            level,
        }
    }

    #[test]
    fn word_spans_skip_runs_of_whitespace() {
        let text = "  alpha \n\tbeta  gamma";
        let words: Vec<&str> = word_spans(text).iter().map(|&(s, e)| &text[s..e]).collect();
        assert_eq!(words, vec!["alpha", "beta", "gamma"]);
        assert!(word_spans(" \n ").is_empty());
    }

    #[test]
    fn sliding_window_non_overlapping() {
        assert_eq!(windows("a b c d e", 2, 2), vec!["a b", "c d", "e"]);
    }

    #[test]
    fn sliding_window_stops_after_reaching_end() {
        assert_eq!(windows("a b c d e", 3, 1), vec!["a b c", "b c d", "c d e"]);
        assert_eq!(windows("a b c d", 2, 2), vec!["a b", "c d"]);
        assert_eq!(windows("a b", 10, 5), vec!["a b"]);
    }

    #[test]
    fn sliding_window_preserves_source_slice() {
        assert_eq!(windows("one\ntwo   three\nfour", 3, 3), vec!["one\ntwo   three", "four"]);
    }

    #[test]
    fn sliding_window_covers_every_word() {
        let text: String = (0..37).map(|i| format!("w{i} ")).collect();
        let doc = Document::new("doc.md", text);
        for (size, step) in [(1, 1), (4, 1), (5, 3), (7, 7), (10, 4), (50, 25)] {
            let strategy = ChunkStrategy::SlidingWindow { size, step };
            let mut covered = vec![false; 37];
            for draft in chunk_document(&doc, &strategy).unwrap() {
                let ChunkPosition::Window {
                    start_word,
                    end_word,
                    ..
                } = draft.position
                else {
                    panic!("expected window position");
                };
                assert!(end_word - start_word <= size);
                assert_eq!(draft.text.split_whitespace().count(), end_word - start_word);
                covered[start_word..end_word].iter_mut().for_each(|c| *c = true);
            }
            assert!(covered.iter().all(|c| *c), "gap with size={size} step={step}");
        }
    }

    #[test]
    fn step_larger_than_size_is_rejected() {
        let doc = Document::new("doc.md", "a b c d");
        let err = chunk_document(&doc, &ChunkStrategy::SlidingWindow { size: 2, step: 3 })
            .unwrap_err();
        assert!(matches!(err, LoreError::Config(_)));

        let err = chunk_corpus(&[doc], &ChunkStrategy::SlidingWindow { size: 0, step: 0 })
            .unwrap_err();
        assert!(matches!(err, LoreError::Config(_)));
    }

    #[test]
    fn empty_document_produces_nothing() {
        assert!(windows("", 3, 1).is_empty());
        assert!(windows("   \n ", 3, 1).is_empty());
        assert!(sections("", 2).is_empty());
        assert!(sections("\n\n", 2).is_empty());
    }

    #[test]
    fn chunks_iterator_is_restartable() {
        let doc = Document::new("doc.md", "# A\nx\n## B\ny");
        let chunks = chunk_document(&doc, &ChunkStrategy::default()).unwrap();
        let first: Vec<_> = chunks.clone().collect();
        let second: Vec<_> = chunks.collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn header_split_at_level_two() {
        let text = "# Guide\nintro\n## Install\nsteps\n### Linux\napt\n## Usage\nrun it\n";
        let got = sections(text, 2);
        assert_eq!(
            got,
            vec![
                ("# Guide\nintro".to_string(), section(&["Guide"], 1)),
                (
                    "## Install\nsteps\n### Linux\napt".to_string(),
                    section(&["Guide", "Install"], 2)
                ),
                ("## Usage\nrun it".to_string(), section(&["Guide", "Usage"], 2)),
            ]
        );
    }

    #[test]
    fn header_split_at_level_three_splits_deeper() {
        let text = "## Install\nsteps\n### Linux\napt\n";
        let got = sections(text, 3);
        assert_eq!(got.len(), 2);
        assert_eq!(got[1].1, section(&["Install", "Linux"], 3));
    }

    #[test]
    fn deeper_header_updates_path_for_later_sections() {
        let text = "# A\n### Deep\nx\n## B\ny\n";
        let got = sections(text, 2);
        assert_eq!(got[0].0, "# A\n### Deep\nx");
        assert_eq!(got[1].1, section(&["A", "B"], 2));
    }

    #[test]
    fn preamble_becomes_its_own_chunk() {
        let got = sections("Some intro.\n\n## First\nbody", 2);
        assert_eq!(got[0], ("Some intro.".to_string(), ChunkPosition::Preamble));
        assert_eq!(got[1].1, section(&["First"], 2));
    }

    #[test]
    fn document_without_headers_is_one_preamble_chunk() {
        let got = sections("just text\nmore text", 2);
        assert_eq!(got, vec![("just text\nmore text".to_string(), ChunkPosition::Preamble)]);
    }

    #[test]
    fn headers_inside_code_fences_are_ignored() {
        let text = "## Example\n```bash\n# not a header\n```\n~~~~\n## also not\n~~~~\n## Next\nbody";
        let got = sections(text, 2);
        assert_eq!(got.len(), 2);
        assert!(got[0].0.contains("# not a header"));
        assert!(got[0].0.contains("## also not"));
        assert_eq!(got[1].1, section(&["Next"], 2));
    }

    #[test]
    fn setext_headings_split_sections() {
        let got = sections("Guide\n=====\nintro\n\nInstall\n-------\nsteps", 2);
        assert_eq!(
            got,
            vec![
                ("Guide\n=====\nintro".to_string(), section(&["Guide"], 1)),
                (
                    "Install\n-------\nsteps".to_string(),
                    section(&["Guide", "Install"], 2)
                ),
            ]
        );
    }

    #[test]
    fn heading_titles_drop_markup() {
        let got = sections("## Using `lore search` with *filters* ##\nbody", 2);
        assert_eq!(got[0].1, section(&["Using lore search with filters"], 2));

        let got = sections("# C#\nbody", 2);
        assert_eq!(got[0].1, section(&["C#"], 1));
    }

    #[test]
    fn non_headings_do_not_split() {
        let text = "## Real\nbody\n\n    # indented code\n\n#hashtag\n\n> ## quoted\n\n- ## in a list\n";
        let got = sections(text, 2);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].1, section(&["Real"], 2));
        assert!(got[0].0.ends_with("- ## in a list"));
    }

    #[test]
    fn drafts_carry_title_and_source() {
        let doc = Document::new("docs/a.md", "# A\nfoo").with_title("Alpha");
        let chunk = chunk_document(&doc, &ChunkStrategy::default())
            .unwrap()
            .next()
            .unwrap()
            .into_chunk(7);
        assert_eq!(chunk.id, 7);
        assert_eq!(chunk.source, "docs/a.md");
        assert_eq!(chunk.title.as_deref(), Some("Alpha"));
        assert_eq!(chunk.citation(), "docs/a.md (A)");
    }
}
