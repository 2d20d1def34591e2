//! Tag filter expressions
//!
//! `@smoke and not (@slow or @flaky)`. Tags are compared without the
//! leading `@`; an empty filter matches every scenario.

use std::collections::BTreeSet;

use crate::common::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagFilter {
    Any,
    Tag(String),
    Not(Box<TagFilter>),
    And(Box<TagFilter>, Box<TagFilter>),
    Or(Box<TagFilter>, Box<TagFilter>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Tag(String),
    And,
    Or,
    Not,
    Open,
    Close,
}

impl TagFilter {
    pub fn parse(filter: &str) -> Result<Self> {
        let filter = filter.trim();
        if filter.is_empty() {
            return Ok(Self::Any);
        }
        let tokens = tokenize(filter)?;
        let mut pos = 0;
        let parsed = parse_or(&tokens, &mut pos, filter)?;
        if pos != tokens.len() {
            return Err(Error::invalid_tag_filter(filter, "unexpected trailing input"));
        }
        Ok(parsed)
    }

    pub fn matches(&self, tags: &BTreeSet<String>) -> bool {
        match self {
            Self::Any => true,
            Self::Tag(tag) => tags.contains(tag),
            Self::Not(inner) => !inner.matches(tags),
            Self::And(a, b) => a.matches(tags) && b.matches(tags),
            Self::Or(a, b) => a.matches(tags) || b.matches(tags),
        }
    }
}

/// Strip the optional `@` a tag is written with
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().trim_start_matches('@').to_string()
}

fn tokenize(filter: &str) -> Result<Vec<Token>> {
    let spaced = filter.replace('(', " ( ").replace(')', " ) ");
    spaced
        .split_whitespace()
        .map(|word| match word {
            "(" => Ok(Token::Open),
            ")" => Ok(Token::Close),
            "and" => Ok(Token::And),
            "or" => Ok(Token::Or),
            "not" => Ok(Token::Not),
            tag if tag.len() > 1 && tag.starts_with('@') => Ok(Token::Tag(normalize_tag(tag))),
            other => Err(Error::invalid_tag_filter(
                filter,
                &format!("expected a tag like '@name', found '{}'", other),
            )),
        })
        .collect()
}

fn parse_or(tokens: &[Token], pos: &mut usize, filter: &str) -> Result<TagFilter> {
    let mut left = parse_and(tokens, pos, filter)?;
    while tokens.get(*pos) == Some(&Token::Or) {
        *pos += 1;
        let right = parse_and(tokens, pos, filter)?;
        left = TagFilter::Or(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn parse_and(tokens: &[Token], pos: &mut usize, filter: &str) -> Result<TagFilter> {
    let mut left = parse_not(tokens, pos, filter)?;
    while tokens.get(*pos) == Some(&Token::And) {
        *pos += 1;
        let right = parse_not(tokens, pos, filter)?;
        left = TagFilter::And(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn parse_not(tokens: &[Token], pos: &mut usize, filter: &str) -> Result<TagFilter> {
    match tokens.get(*pos) {
        Some(Token::Not) => {
            *pos += 1;
            Ok(TagFilter::Not(Box::new(parse_not(tokens, pos, filter)?)))
        }
        Some(Token::Open) => {
            *pos += 1;
            let inner = parse_or(tokens, pos, filter)?;
            if tokens.get(*pos) != Some(&Token::Close) {
                return Err(Error::invalid_tag_filter(filter, "missing ')'"));
            }
            *pos += 1;
            Ok(inner)
        }
        Some(Token::Tag(tag)) => {
            *pos += 1;
            Ok(TagFilter::Tag(tag.clone()))
        }
        Some(_) => Err(Error::invalid_tag_filter(filter, "expected a tag")),
        None => Err(Error::invalid_tag_filter(filter, "unexpected end of filter")),
    }
}
