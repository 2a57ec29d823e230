//! Query model and a small classic-syntax parser.
//!
//! Queries are plain data: evaluation lives in [`crate::search`], which lets a
//! query be built once and scored under any [`crate::Similarity`].

use std::fmt;

use crate::error::{FeatureError, Result};
use crate::index::{Field, ProductId};

/// Characters with meaning in the classic query syntax.
const SPECIAL_CHARS: &[char] = &[
    '\\', '+', '-', '!', '(', ')', ':', '^', '[', ']', '"', '{', '}', '~', '*', '?', '|', '&', '/',
];

/// Tokens the query reduction always drops.
const DROPPED_TOKENS: &[&str] = &["and", "or"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occur {
    /// Must match and contributes to the score.
    Must,
    /// Optional when a required clause exists; otherwise at least one must match.
    Should,
    /// Must match, contributes nothing to the score.
    Filter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BooleanClause {
    pub query: Query,
    pub occur: Occur,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BooleanQuery {
    clauses: Vec<BooleanClause>,
}

impl BooleanQuery {
    pub fn new() -> Self { Self::default() }

    pub fn add_clause(&mut self, query: Query, occur: Occur) {
        self.clauses.push(BooleanClause { query, occur });
    }

    pub fn add_must(&mut self, query: Query) { self.add_clause(query, Occur::Must) }

    pub fn add_should(&mut self, query: Query) { self.add_clause(query, Occur::Should) }

    pub fn add_filter(&mut self, query: Query) { self.add_clause(query, Occur::Filter) }

    pub fn clauses(&self) -> &[BooleanClause] { &self.clauses }

    pub fn is_empty(&self) -> bool { self.clauses.is_empty() }

    /// OR-combine the given queries.
    pub fn any_of<I: IntoIterator<Item = Query>>(queries: I) -> Self {
        let mut bq = Self::new();
        for q in queries {
            bq.add_should(q);
        }
        bq
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Term { field: Field, term: String },
    /// Terms in order; `slop` is the total positional edit distance allowed.
    Phrase { field: Field, terms: Vec<String>, slop: u32 },
    /// Keyword match on the product id. Scores zero.
    ProductId(ProductId),
    Boolean(BooleanQuery),
}

impl Query {
    /// A query matching nothing.
    pub fn empty() -> Self { Query::Boolean(BooleanQuery::new()) }

    /// True for the boolean with no clauses.
    pub fn is_empty(&self) -> bool {
        matches!(self, Query::Boolean(bq) if bq.is_empty())
    }

    pub fn term(field: Field, term: impl Into<String>) -> Self {
        Query::Term { field, term: term.into() }
    }

    pub fn phrase(field: Field, terms: Vec<String>, slop: u32) -> Self {
        Query::Phrase { field, terms, slop }
    }

    /// Restrict `query` to a single product while keeping its score.
    pub fn filtered_to(product_id: ProductId, query: Query) -> Self {
        let mut bq = BooleanQuery::new();
        bq.add_filter(Query::ProductId(product_id));
        bq.add_should(query);
        Query::Boolean(bq)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Term { field, term } => write!(f, "{field}:{term}"),
            Query::Phrase { field, terms, slop } => {
                write!(f, "{field}:\"{}\"", terms.join(" "))?;
                if *slop > 0 {
                    write!(f, "~{slop}")?;
                }
                Ok(())
            }
            Query::ProductId(id) => write!(f, "id:{id}"),
            Query::Boolean(bq) => {
                f.write_str("(")?;
                for (i, clause) in bq.clauses().iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    match clause.occur {
                        Occur::Must => f.write_str("+")?,
                        Occur::Filter => f.write_str("#")?,
                        Occur::Should => {}
                    }
                    write!(f, "{}", clause.query)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Backslash-escape every classic query-syntax character so the text parses literally.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if SPECIAL_CHARS.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Lowercase, split on whitespace, escape, and drop the `and`/`or` tokens.
pub fn query_tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(escape)
        .filter(|t| !DROPPED_TOKENS.contains(&t.as_str()))
        .collect()
}

/// Parse classic query text against one field.
///
/// Bare words are analyzed into terms (several terms from one word are OR-combined),
/// `"quoted text"` becomes an exact phrase, and `\` escapes the next character.
/// Clauses are OR-combined.
pub fn parse<F>(text: &str, field: Field, analyze: F) -> Result<Query>
where
    F: Fn(&str) -> Vec<String>,
{
    let mut clauses = Vec::new();
    for chunk in lex(text)? {
        match chunk {
            Chunk::Word(word) => {
                let mut terms = analyze(&word);
                match terms.len() {
                    0 => {}
                    1 => clauses.push(Query::term(field, terms.remove(0))),
                    _ => clauses.push(Query::Boolean(BooleanQuery::any_of(
                        terms.into_iter().map(|t| Query::term(field, t)),
                    ))),
                }
            }
            Chunk::Quoted(phrase) => {
                let mut terms = analyze(&phrase);
                match terms.len() {
                    0 => {}
                    1 => clauses.push(Query::term(field, terms.remove(0))),
                    _ => clauses.push(Query::phrase(field, terms, 0)),
                }
            }
        }
    }
    Ok(match clauses.len() {
        0 => Query::empty(),
        1 => clauses.remove(0),
        _ => Query::Boolean(BooleanQuery::any_of(clauses)),
    })
}

#[derive(Debug, PartialEq)]
enum Chunk {
    Word(String),
    Quoted(String),
}

fn lex(text: &str) -> Result<Vec<Chunk>> {
    let mut chunks = Vec::new();
    let mut word = String::new();
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => word.push(escaped),
                None => return Err(FeatureError::QuerySyntax(format!("dangling escape in `{text}`"))),
            },
            '"' => {
                if !word.is_empty() {
                    chunks.push(Chunk::Word(std::mem::take(&mut word)));
                }
                let mut phrase = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(escaped) => phrase.push(escaped),
                            None => return Err(FeatureError::QuerySyntax(format!("dangling escape in `{text}`"))),
                        },
                        Some(other) => phrase.push(other),
                        None => return Err(FeatureError::QuerySyntax(format!("unterminated quote in `{text}`"))),
                    }
                }
                chunks.push(Chunk::Quoted(phrase));
            }
            c if c.is_whitespace() => {
                if !word.is_empty() {
                    chunks.push(Chunk::Word(std::mem::take(&mut word)));
                }
            }
            other => word.push(other),
        }
    }
    if !word.is_empty() {
        chunks.push(Chunk::Word(word));
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::analyze;

    #[test]
    fn escape_then_parse_is_literal() {
        let raw = "1/2 in. x 3-ft \"pipe\"";
        let q = parse(&escape(raw), Field::Title, analyze).unwrap();
        let bq = match q {
            Query::Boolean(bq) => bq,
            other => panic!("expected boolean, got {other:?}"),
        };
        assert!(bq.clauses().iter().all(|c| c.occur == Occur::Should));
        assert!(bq.clauses().iter().all(|c| !matches!(c.query, Query::Phrase { .. })));
    }

    #[test]
    fn quoted_text_becomes_phrase() {
        let q = parse("\"door hinge\"", Field::Title, analyze).unwrap();
        let expected = vec!["door".to_string(), analyze("hinge").remove(0)];
        assert_eq!(q, Query::phrase(Field::Title, expected, 0));
    }

    #[test]
    fn syntax_errors_are_reported() {
        assert!(matches!(parse("\"open", Field::Title, analyze), Err(FeatureError::QuerySyntax(_))));
        assert!(matches!(parse("trailing\\", Field::Title, analyze), Err(FeatureError::QuerySyntax(_))));
    }

    #[test]
    fn stopword_only_text_parses_to_empty() {
        assert_eq!(parse("the and", Field::Title, analyze).unwrap(), Query::empty());
    }

    #[test]
    fn query_tokens_drop_connectives() {
        assert_eq!(query_tokens("Door AND hinge or  latch"), vec!["door", "hinge", "latch"]);
        assert_eq!(query_tokens("3/4"), vec!["3\\/4"]);
        assert!(query_tokens("  ").is_empty());
    }

    #[test]
    fn displays_classic_syntax() {
        let q = Query::filtered_to(7, Query::phrase(Field::Title, vec!["a".into(), "b".into()], 8));
        assert_eq!(q.to_string(), "(#id:7 title:\"a b\"~8)");
    }
}
