//! TF-IDF keyword index over chunk text and source identifiers.
//!
//! Each field stores L2-normalized TF-IDF vectors as postings lists, so a
//! query only touches chunks that share at least one term with it. The score
//! for a chunk is the boosted sum of per-field cosine similarities.

use std::collections::{BTreeMap, HashMap};

use lore_core::{Chunk, KeywordConfig};
use unicode_segmentation::UnicodeSegmentation;

use crate::Scored;

/// Lowercased terms of `text`, split on Unicode word boundaries (UAX #29).
///
/// Drops single-character tokens and common English stop words. Connector
/// punctuation does not break a word, so identifiers like `snake_case` stay
/// whole.
///
/// # Examples
///
/// ```
/// use lore_search::keyword::tokenize;
///
/// assert_eq!(tokenize("How do I install the CLI?"), vec!["install", "cli"]);
/// assert_eq!(tokenize("snake_case stays whole"), vec!["snake_case", "stays", "whole"]);
/// assert_eq!(tokenize("Größe über alles"), vec!["größe", "über", "alles"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words()
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_lowercase)
        .filter(|t| !is_stop_word(t))
        .collect()
}

/// Terms of a document identifier: path separators, `_`, `-` and the
/// markdown extension all count as breaks.
///
/// # Examples
///
/// ```
/// use lore_search::keyword::source_terms;
///
/// assert_eq!(source_terms("guides/getting_started.md"), vec!["guides", "getting", "started"]);
/// ```
pub fn source_terms(identifier: &str) -> Vec<String> {
    tokenize(&source_words(identifier))
}

/// The identifier as plain words, extension dropped.
pub(crate) fn source_words(identifier: &str) -> String {
    let stem = identifier
        .strip_suffix(".mdx")
        .or_else(|| identifier.strip_suffix(".md"))
        .unwrap_or(identifier);
    stem.replace(['/', '\\', '_', '-', '.'], " ")
}

fn is_stop_word(term: &str) -> bool {
    matches!(
        term,
        "an" | "and"
            | "are"
            | "as"
            | "at"
            | "be"
            | "but"
            | "by"
            | "do"
            | "does"
            | "for"
            | "from"
            | "has"
            | "have"
            | "how"
            | "if"
            | "in"
            | "into"
            | "is"
            | "it"
            | "its"
            | "me"
            | "my"
            | "no"
            | "not"
            | "of"
            | "on"
            | "or"
            | "so"
            | "such"
            | "that"
            | "the"
            | "their"
            | "then"
            | "there"
            | "these"
            | "they"
            | "this"
            | "to"
            | "was"
            | "we"
            | "what"
            | "when"
            | "where"
            | "which"
            | "who"
            | "why"
            | "will"
            | "with"
            | "you"
            | "your"
    )
}

/// Postings and IDF weights for one field.
#[derive(Debug, Default)]
struct FieldIndex {
    idf: HashMap<String, f64>,
    postings: HashMap<String, Vec<(usize, f64)>>,
}

impl FieldIndex {
    fn build(docs: &[Vec<String>]) -> Self {
        let n = docs.len() as f64;
        let counts: Vec<BTreeMap<&str, usize>> =
            docs.iter().map(|terms| term_counts(terms)).collect();

        let mut df: HashMap<&str, usize> = HashMap::new();
        for tf in &counts {
            for term in tf.keys() {
                *df.entry(*term).or_default() += 1;
            }
        }

        // Smoothed IDF
        let idf: HashMap<String, f64> = df
            .iter()
            .map(|(term, &d)| {
                let weight = ((1.0 + n) / (1.0 + d as f64)).ln() + 1.0;
                (term.to_string(), weight)
            })
            .collect();

        let mut postings: HashMap<String, Vec<(usize, f64)>> = HashMap::new();
        for (doc, tf) in counts.iter().enumerate() {
            let weights: Vec<(&str, f64)> = tf
                .iter()
                .map(|(term, &count)| (*term, count as f64 * idf[*term]))
                .collect();
            let norm = weights.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
            if norm == 0.0 {
                continue;
            }
            for (term, w) in weights {
                postings
                    .entry(term.to_string())
                    .or_default()
                    .push((doc, w / norm));
            }
        }

        Self { idf, postings }
    }

    /// Add `boost * cosine(query, doc)` into `scores` for every matching doc.
    fn accumulate(&self, query: &[String], boost: f64, scores: &mut [Option<f64>]) {
        let weights: Vec<(&str, f64)> = term_counts(query)
            .into_iter()
            .filter_map(|(term, count)| self.idf.get(term).map(|idf| (term, count as f64 * idf)))
            .collect();
        let norm = weights.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm == 0.0 {
            return;
        }

        for (term, qw) in weights {
            let Some(list) = self.postings.get(term) else {
                continue;
            };
            for &(doc, dw) in list {
                *scores[doc].get_or_insert(0.0) += boost * (qw / norm) * dw;
            }
        }
    }
}

/// Sorted so float sums run in the same order on every build.
fn term_counts(terms: &[String]) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for term in terms {
        *counts.entry(term.as_str()).or_default() += 1;
    }
    counts
}

/// Frozen TF-IDF index over a chunk set.
///
/// Results refer to chunks by their position in the slice passed to
/// [`KeywordIndex::build`].
///
/// # Examples
///
/// ```
/// use lore_core::{Chunk, ChunkPosition, KeywordConfig};
/// use lore_search::keyword::KeywordIndex;
///
/// let chunk = |id: usize, text: &str| Chunk {
///     id,
///     source: format!("doc{id}.md"),
///     title: None,
///     text: text.into(),
///     position: ChunkPosition::Preamble,
/// };
/// let chunks = vec![chunk(0, "install with pip"), chunk(1, "configure logging")];
/// let index = KeywordIndex::build(&chunks, &KeywordConfig::default());
///
/// let hits = index.search("pip install", 5);
/// assert_eq!(hits.len(), 1);
/// assert_eq!(hits[0].index, 0);
/// ```
#[derive(Debug)]
pub struct KeywordIndex {
    text: FieldIndex,
    source: FieldIndex,
    text_boost: f64,
    source_boost: f64,
    len: usize,
}

impl KeywordIndex {
    /// Tokenize and weight every chunk, then freeze.
    pub fn build(chunks: &[Chunk], config: &KeywordConfig) -> Self {
        let text_terms: Vec<Vec<String>> = chunks.iter().map(|c| tokenize(&c.text)).collect();
        let source_fields: Vec<Vec<String>> =
            chunks.iter().map(|c| source_terms(&c.source)).collect();

        Self {
            text: FieldIndex::build(&text_terms),
            source: FieldIndex::build(&source_fields),
            text_boost: config.text_boost,
            source_boost: config.source_boost,
            len: chunks.len(),
        }
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no chunks were indexed.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Best `top_k` chunks for `query`, highest score first.
    ///
    /// Chunks sharing no term with the query are never returned; equal scores
    /// keep insertion order.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<Scored> {
        let terms = tokenize(query);
        if terms.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let mut scores = vec![None; self.len];
        self.text.accumulate(&terms, self.text_boost, &mut scores);
        self.source.accumulate(&terms, self.source_boost, &mut scores);

        let mut hits: Vec<Scored> = scores
            .into_iter()
            .enumerate()
            .filter_map(|(index, score)| score.map(|score| Scored { index, score }))
            .collect();

        // Stable sort: ties stay in insertion order
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        hits
    }
}
