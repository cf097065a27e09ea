//! Relevance selection of projects for a chat query.
//!
//! # Scoring
//!
//! 1. Tokenize the query into a lowercase keyword set (split on anything
//!    that is not alphanumeric, drop [`STOPWORDS`]).
//! 2. Tokenize each field of a record the same way.
//! 3. `score = Σ weight(field) × |keywords ∩ tokens(field)|` over
//!    [`FIELD_WEIGHTS`].
//! 4. Drop zero scores. Sort by score (desc), year (desc, missing last),
//!    id (asc).
//! 5. Truncate to `max_items`.
//!
//! Scoring is pure: no I/O, no mutation, same inputs always give the same
//! order. [`run_select`] prints the ranking for `sdgp select`.

use anyhow::Result;
use serde_json::json;
use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::models::{join_or, ProjectRecord};
use crate::store::ProjectStore;

/// Scored field groups of a [`ProjectRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Domains,
    Tech,
    ProjectTypes,
    Subtitle,
    ProblemStatement,
    Solution,
    Features,
    Team,
}

/// Title 3, tags 2, free text 1.
pub const FIELD_WEIGHTS: &[(Field, u32)] = &[
    (Field::Title, 3),
    (Field::Domains, 2),
    (Field::Tech, 2),
    (Field::ProjectTypes, 2),
    (Field::Subtitle, 1),
    (Field::ProblemStatement, 1),
    (Field::Solution, 1),
    (Field::Features, 1),
    (Field::Team, 1),
];

/// Words too common in questions to say anything about relevance.
pub const STOPWORDS: &[&str] = &[
    "a", "about", "all", "an", "and", "any", "are", "can", "do", "does", "for", "from", "give",
    "how", "i", "in", "is", "it", "list", "me", "of", "on", "or", "please", "show", "tell",
    "that", "the", "their", "there", "these", "this", "to", "what", "which", "with", "you",
];

/// A record with its relevance score.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored<'a> {
    pub record: &'a ProjectRecord,
    pub score: u32,
}

/// Top `max_items` records relevant to `query`, most relevant first.
pub fn select<'a>(query: &str, store: &'a ProjectStore, max_items: usize) -> Vec<&'a ProjectRecord> {
    select_scored(query, store, max_items)
        .into_iter()
        .map(|s| s.record)
        .collect()
}

/// Like [`select`], keeping the scores.
pub fn select_scored<'a>(query: &str, store: &'a ProjectStore, max_items: usize) -> Vec<Scored<'a>> {
    if max_items == 0 {
        return Vec::new();
    }
    let keywords = tokenize_query(query);
    if keywords.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<Scored<'a>> = store
        .iter()
        .map(|record| Scored {
            record,
            score: score_record(&keywords, record),
        })
        .filter(|s| s.score > 0)
        .collect();

    scored.sort_by(compare);
    scored.truncate(max_items);
    scored
}

/// Score desc, year desc (missing last), id asc.
fn compare(a: &Scored<'_>, b: &Scored<'_>) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| match (a.record.year, b.record.year) {
            (Some(ya), Some(yb)) => yb.cmp(&ya),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.record.id.cmp(&b.record.id))
}

pub fn score_record(keywords: &BTreeSet<String>, record: &ProjectRecord) -> u32 {
    FIELD_WEIGHTS
        .iter()
        .map(|(field, weight)| {
            let tokens = field_tokens(record, *field);
            let overlap = keywords.iter().filter(|k| tokens.contains(*k)).count() as u32;
            weight * overlap
        })
        .sum()
}

fn field_tokens(record: &ProjectRecord, field: Field) -> BTreeSet<String> {
    match field {
        Field::Title => tokenize(&record.title),
        Field::Subtitle => tokenize(&record.subtitle),
        Field::ProblemStatement => tokenize(&record.problem_statement),
        Field::Solution => tokenize(&record.solution),
        Field::Features => tokenize(&record.features),
        Field::Domains => tokenize_all(record.domains.iter()),
        Field::Tech => tokenize_all(record.tech.iter()),
        Field::ProjectTypes => tokenize_all(record.project_types.iter()),
        Field::Team => tokenize_all(record.team.iter()),
    }
}

fn tokenize_all<'a>(values: impl Iterator<Item = &'a String>) -> BTreeSet<String> {
    values.flat_map(|v| tokenize(v)).collect()
}

/// Lowercase alphanumeric tokens of `text`.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Query keywords: [`tokenize`] minus [`STOPWORDS`].
pub fn tokenize_query(query: &str) -> BTreeSet<String> {
    tokenize(query)
        .into_iter()
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}

/// CLI entry point: print the ranking for `query`, as text or JSON.
pub fn run_select(store: &ProjectStore, query: &str, limit: usize, as_json: bool) -> Result<()> {
    let results = select_scored(query, store, limit);

    if as_json {
        let rows: Vec<serde_json::Value> = results
            .iter()
            .map(|s| {
                json!({
                    "id": s.record.id,
                    "title": s.record.title,
                    "score": s.score,
                    "year": s.record.year,
                    "url": s.record.url(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No projects match \"{}\".", query.trim());
        return Ok(());
    }
    for (i, s) in results.iter().enumerate() {
        println!(
            "{}. [{}] {} (score: {})",
            i + 1,
            s.record.id,
            s.record.title,
            s.score
        );
        println!(
            "    year: {} | domains: {} | tech: {}",
            s.record.year_display(),
            join_or(&s.record.domains, "-"),
            join_or(&s.record.tech, "-")
        );
    }
    Ok(())
}
