//! The slice of DynamoDB expression syntax the in-memory store evaluates.
//!
//! A condition is one or more terms joined by `AND`. Each term is
//! `attribute_exists(path)`, `attribute_not_exists(path)`, or a comparison
//! (`=`, `<>`, `<`, `<=`, `>`, `>=`) between paths and `:value` placeholders.
//! Paths are top-level attribute names, written out or as `#name`
//! placeholders. A projection is a comma-separated list of paths. Anything
//! outside this grammar is a validation error.

use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;
use std::vec::IntoIter;

use serde_json::Value;

use crate::backend::BackendError;
use crate::contract::{AttributeNames, Item};

pub(crate) const CONDITION_EXPRESSION: &str = "ConditionExpression";
pub(crate) const FILTER_EXPRESSION: &str = "FilterExpression";
pub(crate) const PROJECTION_EXPRESSION: &str = "ProjectionExpression";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparator {
    /// `None` means the operands are missing or not comparable.
    fn holds(self, ordering: Option<Ordering>) -> bool {
        match (self, ordering) {
            (Self::Ne, None) => true,
            (_, None) => false,
            (Self::Eq, Some(ordering)) => ordering.is_eq(),
            (Self::Ne, Some(ordering)) => ordering.is_ne(),
            (Self::Lt, Some(ordering)) => ordering.is_lt(),
            (Self::Le, Some(ordering)) => ordering.is_le(),
            (Self::Gt, Some(ordering)) => ordering.is_gt(),
            (Self::Ge, Some(ordering)) => ordering.is_ge(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Name(String),
    Placeholder(String),
    Comparator(Comparator),
    OpenParen,
    CloseParen,
    Comma,
}

/// Resolves `#name` and `:value` placeholders for one request.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Scope<'a> {
    names: Option<&'a AttributeNames>,
    values: Option<&'a Item>,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(names: Option<&'a AttributeNames>, values: Option<&'a Item>) -> Self {
        Self { names, values }
    }

    fn name(&self, placeholder: &str) -> Result<String, BackendError> {
        self.names
            .and_then(|names| names.get(placeholder))
            .cloned()
            .ok_or_else(|| {
                BackendError::validation(format!(
                    "An expression attribute name used in the document path is not defined; attribute name: {placeholder}"
                ))
            })
    }

    fn value(&self, placeholder: &str) -> Result<Value, BackendError> {
        self.values
            .and_then(|values| values.get(placeholder))
            .cloned()
            .ok_or_else(|| {
                BackendError::validation(format!(
                    "An expression attribute value used in expression is not defined; attribute value: {placeholder}"
                ))
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Path(String),
    Value(Value),
}

impl Operand {
    fn resolve<'v>(&'v self, item: &'v Item) -> Option<&'v Value> {
        match self {
            Self::Path(path) => item.get(path),
            Self::Value(value) => Some(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Term {
    Exists(String),
    NotExists(String),
    Compare(Operand, Comparator, Operand),
}

impl Term {
    fn matches(&self, item: &Item) -> bool {
        match self {
            Self::Exists(path) => item.contains_key(path),
            Self::NotExists(path) => !item.contains_key(path),
            Self::Compare(left, comparator, right) => {
                comparator.holds(compare(left.resolve(item), right.resolve(item)))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Condition {
    terms: Vec<Term>,
}

impl Condition {
    pub(crate) fn parse(
        expression: &str,
        field: &'static str,
        scope: Scope<'_>,
    ) -> Result<Self, BackendError> {
        let mut parser = Parser::new(expression, field, scope)?;
        let mut terms = vec![parser.term()?];
        while let Some(token) = parser.advance() {
            match token {
                Token::Word(word) if word.eq_ignore_ascii_case("AND") => terms.push(parser.term()?),
                other => return Err(parser.unexpected(Some(&other))),
            }
        }
        Ok(Self { terms })
    }

    pub(crate) fn matches(&self, item: &Item) -> bool {
        self.terms.iter().all(|term| term.matches(item))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Projection {
    attributes: Vec<String>,
}

impl Projection {
    pub(crate) fn parse(expression: &str, scope: Scope<'_>) -> Result<Self, BackendError> {
        let mut parser = Parser::new(expression, PROJECTION_EXPRESSION, scope)?;
        let mut attributes = vec![parser.path()?];
        while let Some(token) = parser.advance() {
            if token != Token::Comma {
                return Err(parser.unexpected(Some(&token)));
            }
            attributes.push(parser.path()?);
        }
        Ok(Self { attributes })
    }

    pub(crate) fn apply(&self, item: &Item) -> Item {
        item.iter()
            .filter(|(name, _)| self.attributes.contains(*name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

struct Parser<'a> {
    tokens: Peekable<IntoIter<Token>>,
    field: &'static str,
    scope: Scope<'a>,
}

impl<'a> Parser<'a> {
    fn new(expression: &str, field: &'static str, scope: Scope<'a>) -> Result<Self, BackendError> {
        let tokens = tokenize(expression, field)?;
        if tokens.is_empty() {
            return Err(invalid(field, "The expression can not be empty"));
        }
        Ok(Self {
            tokens: tokens.into_iter().peekable(),
            field,
            scope,
        })
    }

    fn advance(&mut self) -> Option<Token> {
        self.tokens.next()
    }

    fn term(&mut self) -> Result<Term, BackendError> {
        if let Some(Token::Word(function)) = self.tokens.peek() {
            let exists = match function.as_str() {
                "attribute_exists" => Some(true),
                "attribute_not_exists" => Some(false),
                _ => None,
            };
            if let Some(exists) = exists {
                self.advance();
                self.expect(Token::OpenParen)?;
                let path = self.path()?;
                self.expect(Token::CloseParen)?;
                return Ok(if exists {
                    Term::Exists(path)
                } else {
                    Term::NotExists(path)
                });
            }
        }

        let left = self.operand()?;
        let comparator = match self.advance() {
            Some(Token::Comparator(comparator)) => comparator,
            other => return Err(self.unexpected(other.as_ref())),
        };
        let right = self.operand()?;
        Ok(Term::Compare(left, comparator, right))
    }

    fn operand(&mut self) -> Result<Operand, BackendError> {
        if let Some(Token::Placeholder(placeholder)) = self.tokens.peek() {
            let value = self.scope.value(placeholder)?;
            self.advance();
            return Ok(Operand::Value(value));
        }
        self.path().map(Operand::Path)
    }

    fn path(&mut self) -> Result<String, BackendError> {
        match self.advance() {
            Some(Token::Word(name)) => Ok(name),
            Some(Token::Name(placeholder)) => self.scope.name(&placeholder),
            other => Err(self.unexpected(other.as_ref())),
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), BackendError> {
        match self.advance() {
            Some(token) if token == expected => Ok(()),
            other => Err(self.unexpected(other.as_ref())),
        }
    }

    fn unexpected(&self, token: Option<&Token>) -> BackendError {
        match token {
            Some(token) => invalid(self.field, format!("Syntax error; token: {}", describe(token))),
            None => invalid(self.field, "Syntax error; unexpected end of expression"),
        }
    }
}

fn tokenize(expression: &str, field: &'static str) -> Result<Vec<Token>, BackendError> {
    let mut tokens = Vec::new();
    let mut chars = expression.chars().peekable();

    while let Some(c) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '(' => Token::OpenParen,
            ')' => Token::CloseParen,
            ',' => Token::Comma,
            '=' => Token::Comparator(Comparator::Eq),
            '<' if chars.next_if_eq(&'>').is_some() => Token::Comparator(Comparator::Ne),
            '<' if chars.next_if_eq(&'=').is_some() => Token::Comparator(Comparator::Le),
            '<' => Token::Comparator(Comparator::Lt),
            '>' if chars.next_if_eq(&'=').is_some() => Token::Comparator(Comparator::Ge),
            '>' => Token::Comparator(Comparator::Gt),
            '#' | ':' => {
                let word = take_word(&mut chars);
                if word.is_empty() {
                    return Err(invalid(field, format!("Syntax error; token: \"{c}\"")));
                }
                if c == '#' {
                    Token::Name(format!("#{word}"))
                } else {
                    Token::Placeholder(format!(":{word}"))
                }
            }
            c if is_word_char(c) => {
                let mut word = c.to_string();
                word.push_str(&take_word(&mut chars));
                Token::Word(word)
            }
            other => return Err(invalid(field, format!("Invalid character: \"{other}\""))),
        };
        tokens.push(token);
    }
    Ok(tokens)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn take_word(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut word = String::new();
    while let Some(c) = chars.next_if(|c| is_word_char(*c)) {
        word.push(c);
    }
    word
}

fn describe(token: &Token) -> String {
    match token {
        Token::Word(text) | Token::Name(text) | Token::Placeholder(text) => format!("\"{text}\""),
        Token::Comparator(comparator) => format!("{comparator:?}"),
        Token::OpenParen => "\"(\"".to_string(),
        Token::CloseParen => "\")\"".to_string(),
        Token::Comma => "\",\"".to_string(),
    }
}

fn compare(left: Option<&Value>, right: Option<&Value>) -> Option<Ordering> {
    let (left, right) = (left?, right?);
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => left.as_f64()?.partial_cmp(&right.as_f64()?),
        (Value::String(left), Value::String(right)) => Some(left.cmp(right)),
        _ if left == right => Some(Ordering::Equal),
        _ => None,
    }
}

fn invalid(field: &str, message: impl std::fmt::Display) -> BackendError {
    BackendError::validation(format!("Invalid {field}: {message}"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn item(value: Value) -> Item {
        value.as_object().cloned().expect("item should be an object")
    }

    fn names(pairs: &[(&str, &str)]) -> AttributeNames {
        pairs
            .iter()
            .map(|(placeholder, name)| (placeholder.to_string(), name.to_string()))
            .collect()
    }

    #[test]
    fn existence_checks_follow_name_placeholders() {
        let names = names(&[("#n", "name")]);
        let scope = Scope::new(Some(&names), None);
        let absent = Condition::parse("attribute_not_exists(#n)", CONDITION_EXPRESSION, scope)
            .expect("condition should parse");
        let present = Condition::parse("attribute_exists(name)", CONDITION_EXPRESSION, scope)
            .expect("condition should parse");

        let henry = item(json!({"name": "henry"}));
        assert!(!absent.matches(&henry));
        assert!(present.matches(&henry));
        assert!(absent.matches(&Item::new()));
    }

    #[test]
    fn comparisons_are_joined_with_and() {
        let values = item(json!({":status": "sleeping", ":lives": 5}));
        let condition = Condition::parse(
            "status = :status AND lives >= :lives",
            FILTER_EXPRESSION,
            Scope::new(None, Some(&values)),
        )
        .expect("condition should parse");

        assert!(condition.matches(&item(json!({"status": "sleeping", "lives": 9}))));
        assert!(!condition.matches(&item(json!({"status": "sleeping", "lives": 3}))));
        assert!(!condition.matches(&item(json!({"status": "hungry", "lives": 9}))));
        assert!(!condition.matches(&item(json!({"lives": 9}))));
    }

    #[test]
    fn not_equal_holds_for_missing_attributes() {
        let values = item(json!({":status": "hungry"}));
        let condition = Condition::parse(
            "status <> :status",
            FILTER_EXPRESSION,
            Scope::new(None, Some(&values)),
        )
        .expect("condition should parse");

        assert!(condition.matches(&item(json!({"name": "tom"}))));
        assert!(!condition.matches(&item(json!({"status": "hungry"}))));
    }

    #[test]
    fn undefined_placeholders_are_validation_errors() {
        let error = Condition::parse("status = :status", FILTER_EXPRESSION, Scope::new(None, None))
            .expect_err("undefined value should fail");
        assert!(error.to_string().contains("attribute value: :status"));

        let error = Projection::parse("#n", Scope::new(None, None))
            .expect_err("undefined name should fail");
        assert!(error.to_string().contains("attribute name: #n"));
    }

    #[test]
    fn unsupported_syntax_is_rejected() {
        let scope = Scope::new(None, None);
        for expression in ["", "a = b OR c = d", "begins_with(name, :p)", "a.b = c", "a ="] {
            let error = Condition::parse(expression, CONDITION_EXPRESSION, scope)
                .expect_err("unsupported syntax should fail");
            assert!(matches!(error, BackendError::Validation { .. }), "{expression}");
        }
    }

    #[test]
    fn projection_keeps_listed_attributes() {
        let names = names(&[("#s", "status")]);
        let projection = Projection::parse("name, #s", Scope::new(Some(&names), None))
            .expect("projection should parse");

        let henry = item(json!({"name": "henry", "status": "hungry", "lives": 9}));
        assert_eq!(
            projection.apply(&henry),
            item(json!({"name": "henry", "status": "hungry"}))
        );
    }
}
