//! Directive expression evaluation
//!
//! The evaluator receives the whole directive (`IF: <cond> THEN: <step>`,
//! `IF: <cond>` or `THEN: <step>`) and answers with `"true"`, `"false"` or
//! the text of a step to run in the directive's place.

use std::cmp::Ordering;

use crate::common::{Error, Result};
use crate::tree::{ContextId, ContextStore};

/// Evaluates directive text against a data context
pub trait ExpressionEvaluator: Send + Sync {
    fn eval(&self, expression: &str, contexts: &ContextStore, scope: ContextId) -> Result<String>;
}

/// Built-in evaluator for the directive grammar
///
/// Conditions support `||`/`or`, `&&`/`and`, `!`/`not`, parentheses, the
/// comparisons `== != < <= > >=` and `contains`, and the literals `true` and
/// `false`. Comparisons are numeric when both sides are numbers.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectiveEvaluator;

const THEN_KEYWORD: &str = "THEN:";

impl ExpressionEvaluator for DirectiveEvaluator {
    fn eval(&self, expression: &str, contexts: &ContextStore, scope: ContextId) -> Result<String> {
        let resolved = contexts.resolve_placeholders(scope, expression.trim());

        if let Some(step) = resolved.strip_prefix(THEN_KEYWORD) {
            return then_step(step, expression);
        }

        let body = resolved
            .strip_prefix("IF:")
            .ok_or_else(|| Error::UndefinedDirective(expression.to_string()))?;
        let (condition, then) = match body.find(THEN_KEYWORD) {
            Some(at) => (&body[..at], Some(&body[at + THEN_KEYWORD.len()..])),
            None => (body, None),
        };

        if !evaluate_condition(condition.trim())? {
            return Ok("false".to_string());
        }
        match then {
            Some(step) => then_step(step, expression),
            None => Ok("true".to_string()),
        }
    }
}

fn then_step(step: &str, expression: &str) -> Result<String> {
    let step = step.trim();
    if step.is_empty() {
        return Err(Error::UndefinedDirective(expression.to_string()));
    }
    Ok(step.to_string())
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    And,
    Or,
    Not,
    Compare(Comparison),
    Value(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
}

/// Evaluate a bare condition such as `${count} > 2 && ${mode} == fast`
pub fn evaluate_condition(condition: &str) -> Result<bool> {
    if condition.is_empty() {
        return Err(Error::invalid_expression(condition, "empty condition"));
    }
    let tokens = tokenize(condition)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        source: condition,
    };
    let value = parser.or_expr()?;
    if parser.pos != tokens.len() {
        return Err(Error::invalid_expression(condition, "unexpected trailing input"));
    }
    Ok(value)
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while let Some(&c) = chars.get(i) {
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            '&' if next == Some('&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '=' if next == Some('=') => {
                tokens.push(Token::Compare(Comparison::Eq));
                i += 2;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Compare(Comparison::Ne));
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '<' | '>' => {
                let (op, width) = match (c, next) {
                    ('<', Some('=')) => (Comparison::Le, 2),
                    ('>', Some('=')) => (Comparison::Ge, 2),
                    ('<', _) => (Comparison::Lt, 1),
                    _ => (Comparison::Gt, 1),
                };
                tokens.push(Token::Compare(op));
                i += width;
            }
            '"' | '\'' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&q| q == c)
                    .ok_or_else(|| Error::invalid_expression(input, "unterminated quote"))?;
                tokens.push(Token::Value(chars[i + 1..i + 1 + end].iter().collect()));
                i += end + 2;
            }
            _ => {
                let start = i;
                while let Some(&w) = chars.get(i) {
                    if w.is_whitespace() || "()=!<>&|\"'".contains(w) {
                        break;
                    }
                    i += 1;
                }
                if start == i {
                    return Err(Error::invalid_expression(
                        input,
                        &format!("unexpected character '{}'", c),
                    ));
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "contains" => Token::Compare(Comparison::Contains),
                    _ => Token::Value(word),
                });
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    source: &'a str,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn error(&self, reason: &str) -> Error {
        Error::invalid_expression(self.source, reason)
    }

    fn or_expr(&mut self) -> Result<bool> {
        let mut value = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let rhs = self.and_expr()?;
            value = value || rhs;
        }
        Ok(value)
    }

    fn and_expr(&mut self) -> Result<bool> {
        let mut value = self.unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.unary()?;
            value = value && rhs;
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<bool> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(!self.unary()?);
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<bool> {
        match self.peek().cloned() {
            Some(Token::Open) => {
                self.pos += 1;
                let value = self.or_expr()?;
                if self.peek() != Some(&Token::Close) {
                    return Err(self.error("missing ')'"));
                }
                self.pos += 1;
                Ok(value)
            }
            Some(Token::Value(lhs)) => {
                self.pos += 1;
                if let Some(Token::Compare(op)) = self.peek().cloned() {
                    self.pos += 1;
                    let rhs = match self.peek().cloned() {
                        Some(Token::Value(rhs)) => rhs,
                        _ => return Err(self.error("comparison is missing its right-hand side")),
                    };
                    self.pos += 1;
                    return Ok(compare(&lhs, op, &rhs));
                }
                match lhs.as_str() {
                    "true" => Ok(true),
                    "false" => Ok(false),
                    other => Err(self.error(&format!("'{}' is not a boolean or comparison", other))),
                }
            }
            Some(_) => Err(self.error("expected a value")),
            None => Err(self.error("unexpected end of condition")),
        }
    }
}

fn compare(lhs: &str, op: Comparison, rhs: &str) -> bool {
    if op == Comparison::Contains {
        return lhs.contains(rhs);
    }
    let ordering = match (lhs.parse::<f64>(), rhs.parse::<f64>()) {
        (Ok(a), Ok(b)) => a.partial_cmp(&b),
        _ => Some(lhs.cmp(rhs)),
    };
    let Some(ordering) = ordering else {
        return op == Comparison::Ne;
    };
    match op {
        Comparison::Eq => ordering == Ordering::Equal,
        Comparison::Ne => ordering != Ordering::Equal,
        Comparison::Lt => ordering == Ordering::Less,
        Comparison::Le => ordering != Ordering::Greater,
        Comparison::Gt => ordering == Ordering::Greater,
        Comparison::Ge => ordering != Ordering::Less,
        Comparison::Contains => lhs.contains(rhs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expression: &str) -> Result<String> {
        let mut store = ContextStore::new();
        let scope = store.root();
        store.set(scope, "count", "3");
        store.set(scope, "mode", "fast");
        store.set(scope, "greeting", "hello world");
        DirectiveEvaluator.eval(expression, &store, scope)
    }

    #[test]
    fn test_literals() {
        assert_eq!(eval("IF: true").unwrap(), "true");
        assert_eq!(eval("IF: false").unwrap(), "false");
    }

    #[test]
    fn test_comparisons_use_context() {
        assert_eq!(eval("IF: ${count} == 3").unwrap(), "true");
        assert_eq!(eval("IF: ${count} > 10").unwrap(), "false");
        assert_eq!(eval("IF: ${count} >= 3.0").unwrap(), "true");
        assert_eq!(eval("IF: ${mode} != slow").unwrap(), "true");
        assert_eq!(eval("IF: '${greeting}' contains world").unwrap(), "true");
    }

    #[test]
    fn test_numeric_vs_lexical() {
        assert_eq!(eval("IF: 10 > 9").unwrap(), "true");
        assert_eq!(eval("IF: b > a").unwrap(), "true");
        assert_eq!(eval("IF: 1.0 == 1").unwrap(), "true");
    }

    #[test]
    fn test_boolean_operators() {
        assert_eq!(eval("IF: ${count} == 3 && ${mode} == fast").unwrap(), "true");
        assert_eq!(eval("IF: ${count} == 4 || ${mode} == fast").unwrap(), "true");
        assert_eq!(eval("IF: !(${count} == 3)").unwrap(), "false");
        assert_eq!(eval("IF: not false and (false or true)").unwrap(), "true");
    }

    #[test]
    fn test_then_returns_replacement() {
        assert_eq!(
            eval("IF: ${count} == 3 THEN: print \"three\"").unwrap(),
            "print \"three\""
        );
        assert_eq!(eval("IF: ${count} == 4 THEN: print \"four\"").unwrap(), "false");
        assert_eq!(eval("IF: true THEN: set \"a\" to \"b\"").unwrap(), "set \"a\" to \"b\"");
        assert_eq!(eval("THEN: print \"always\"").unwrap(), "print \"always\"");
    }

    #[test]
    fn test_same_input_same_answer() {
        let first = eval("IF: ${count} < 5").unwrap();
        let second = eval("IF: ${count} < 5").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(eval("IF:"), Err(Error::InvalidExpression { .. })));
        assert!(matches!(eval("IF: maybe"), Err(Error::InvalidExpression { .. })));
        assert!(matches!(eval("IF: 1 =="), Err(Error::InvalidExpression { .. })));
        assert!(matches!(eval("IF: (true"), Err(Error::InvalidExpression { .. })));
        assert!(matches!(eval("IF: 'open"), Err(Error::InvalidExpression { .. })));
        assert!(matches!(eval("IF: true THEN:"), Err(Error::UndefinedDirective(_))));
        assert!(matches!(eval("print \"x\""), Err(Error::UndefinedDirective(_))));
    }
}
