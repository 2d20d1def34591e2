//! Step metadata encoding
//!
//! A step line carries two things: the visible text that is matched against
//! the catalogs, and metadata (nesting depth, tags, bookmarks, flags). The
//! encoded form keeps both in one string separated by [`META_DELIMITER`]:
//!
//! ```text
//! print "large order" \u{1F} >> @smoke #large !ALWAYS_RUN
//! ```
//!
//! Authors never type the delimiter. Feature files use the authored form
//! (`>> print "large order" [[@smoke #large !ALWAYS_RUN]]`) which
//! [`lex_authored`] turns into the encoded form.

use std::collections::BTreeSet;

use crate::common::{Error, Result};

use super::node::ExecutionFlag;

/// Private delimiter between visible text and metadata
pub const META_DELIMITER: char = '\u{1F}';

/// One marker character per nesting level
pub const NESTING_MARKER: char = '>';

/// Token that makes a node copy its flags onto the children it adopts
const PROPAGATE_TOKEN: &str = "PROPAGATE";

/// Decoded step metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepMeta {
    /// Depth relative to the step list the line belongs to
    pub nesting: usize,
    pub tags: BTreeSet<String>,
    pub bookmarks: BTreeSet<String>,
    pub flags: BTreeSet<ExecutionFlag>,
    pub propagate_flags: bool,
}

impl StepMeta {
    /// Whether there is nothing worth encoding
    pub fn is_empty(&self) -> bool {
        self.nesting == 0
            && self.tags.is_empty()
            && self.bookmarks.is_empty()
            && self.flags.is_empty()
            && !self.propagate_flags
    }

    fn apply_token(&mut self, token: &str, line: &str) -> Result<()> {
        if token.chars().all(|c| c == NESTING_MARKER) {
            self.nesting += token.chars().count();
        } else if let Some(tag) = token.strip_prefix('@') {
            self.tags.insert(non_empty(tag, token, line)?.to_string());
        } else if let Some(bookmark) = token.strip_prefix('#') {
            self.bookmarks.insert(non_empty(bookmark, token, line)?.to_string());
        } else if let Some(flag) = token.strip_prefix('!') {
            if flag == PROPAGATE_TOKEN {
                self.propagate_flags = true;
            } else {
                let flag = flag
                    .parse::<ExecutionFlag>()
                    .map_err(|reason| Error::invalid_metadata(line, &reason))?;
                self.flags.insert(flag);
            }
        } else {
            return Err(Error::invalid_metadata(
                line,
                &format!("unrecognized token '{}'", token),
            ));
        }
        Ok(())
    }

    fn tokens(&self) -> Vec<String> {
        let mut tokens = Vec::new();
        if self.nesting > 0 {
            tokens.push(NESTING_MARKER.to_string().repeat(self.nesting));
        }
        tokens.extend(self.tags.iter().map(|t| format!("@{}", t)));
        tokens.extend(self.bookmarks.iter().map(|b| format!("#{}", b)));
        tokens.extend(self.flags.iter().map(|f| format!("!{}", f)));
        if self.propagate_flags {
            tokens.push(format!("!{}", PROPAGATE_TOKEN));
        }
        tokens
    }
}

fn non_empty<'a>(value: &'a str, token: &str, line: &str) -> Result<&'a str> {
    if value.is_empty() {
        Err(Error::invalid_metadata(line, &format!("empty token '{}'", token)))
    } else {
        Ok(value)
    }
}

/// Split an encoded step into its visible text and metadata
pub fn decode(raw: &str) -> Result<(String, StepMeta)> {
    let mut meta = StepMeta::default();
    let Some((text, suffix)) = raw.split_once(META_DELIMITER) else {
        return Ok((raw.trim().to_string(), meta));
    };
    for token in suffix.split_whitespace() {
        meta.apply_token(token, raw)?;
    }
    Ok((text.trim().to_string(), meta))
}

/// Join visible text and metadata into the encoded form
pub fn encode(text: &str, meta: &StepMeta) -> String {
    if meta.is_empty() {
        return text.to_string();
    }
    format!("{}{}{}", text, META_DELIMITER, meta.tokens().join(" "))
}

/// Turn an authored feature-file line into the encoded form
///
/// Leading `>` characters give the nesting level; a trailing `[[ ... ]]`
/// block holds `@tag`, `#bookmark` and `!FLAG` tokens.
pub fn lex_authored(line: &str) -> Result<String> {
    let trimmed = line.trim();
    let body = trimmed.trim_start_matches(NESTING_MARKER);
    let mut meta = StepMeta {
        nesting: trimmed.len() - body.len(),
        ..StepMeta::default()
    };

    let mut text = body.trim();
    if let Some(without_close) = text.strip_suffix("]]") {
        let open = without_close
            .rfind("[[")
            .ok_or_else(|| Error::invalid_metadata(line, "unbalanced ']]'"))?;
        for token in without_close[open + 2..].split_whitespace() {
            meta.apply_token(token, line)?;
        }
        text = without_close[..open].trim_end();
    }

    if text.is_empty() {
        return Err(Error::invalid_metadata(line, "step has no text"));
    }
    if text.contains(META_DELIMITER) {
        return Err(Error::invalid_metadata(line, "step contains a reserved character"));
    }
    Ok(encode(text, &meta))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_has_no_metadata() {
        let (text, meta) = decode("print \"hi\"").unwrap();
        assert_eq!(text, "print \"hi\"");
        assert!(meta.is_empty());
        assert_eq!(lex_authored("  print \"hi\"  ").unwrap(), "print \"hi\"");
    }

    #[test]
    fn test_nesting_is_marker_count() {
        let raw = lex_authored(">> IF: ${x} == 1").unwrap();
        assert_eq!(raw, format!("IF: ${{x}} == 1{}>>", META_DELIMITER));
        let (text, meta) = decode(&raw).unwrap();
        assert_eq!(text, "IF: ${x} == 1");
        assert_eq!(meta.nesting, 2);
    }

    #[test]
    fn test_markers_counted_across_tokens() {
        let raw = format!("step{}> @a >", META_DELIMITER);
        let (_, meta) = decode(&raw).unwrap();
        assert_eq!(meta.nesting, 2);
        assert!(meta.tags.contains("a"));
    }

    #[test]
    fn test_lex_metadata_block() {
        let raw = lex_authored("> print \"done\" [[@cleanup #end !ALWAYS_RUN !PROPAGATE]]").unwrap();
        let (text, meta) = decode(&raw).unwrap();
        assert_eq!(text, "print \"done\"");
        assert_eq!(meta.nesting, 1);
        assert!(meta.tags.contains("cleanup"));
        assert!(meta.bookmarks.contains("end"));
        assert!(meta.flags.contains(&ExecutionFlag::AlwaysRun));
        assert!(meta.propagate_flags);
    }

    #[test]
    fn test_unknown_flag_rejected() {
        let err = lex_authored("step [[!SOMETIMES]]").unwrap_err();
        assert!(matches!(err, Error::InvalidMetadata { .. }));
    }

    #[test]
    fn test_unknown_token_rejected() {
        let err = lex_authored("step [[cleanup]]").unwrap_err();
        assert!(matches!(err, Error::InvalidMetadata { .. }));
    }

    #[test]
    fn test_empty_step_rejected() {
        assert!(lex_authored(">> [[@a]]").is_err());
        assert!(lex_authored("   ").is_err());
    }

    #[test]
    fn test_encode_decode_agree() {
        let raw = lex_authored(">>> ELSE: [[@x !IGNORE_FAILURES]]").unwrap();
        let (text, meta) = decode(&raw).unwrap();
        assert_eq!(encode(&text, &meta), raw);
    }
}
