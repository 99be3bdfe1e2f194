//! CSS selector subset used to query snapshot trees
//!
//! Supported: type and universal selectors, `#id`, `.class`, attribute selectors
//! (`[a]`, `[a=v]`, `[a^=v]`, `[a$=v]`, `[a*=v]`, `[a~=v]`), descendant and child
//! combinators, and comma-separated lists. Live pages use the browser's own engine.

use crate::dom::element::ElementNode;
use crate::error::{AutomationError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Equals,
    Prefix,
    Suffix,
    Contains,
    Word,
}

#[derive(Debug, Clone, PartialEq)]
struct AttrSelector {
    name: String,
    test: Option<(AttrOp, String)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct CompoundSelector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrSelector>,
}

/// `parts[i].0` links `parts[i - 1]` to `parts[i]`; the first combinator is unused
#[derive(Debug, Clone, PartialEq)]
struct ComplexSelector {
    parts: Vec<(Combinator, CompoundSelector)>,
}

/// A parsed, comma-separated selector list
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorList {
    source: String,
    selectors: Vec<ComplexSelector>,
}

impl SelectorList {
    pub fn parse(input: &str) -> Result<Self> {
        let selectors = Parser::new(input).parse_list()?;
        Ok(Self {
            source: input.to_string(),
            selectors,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `node` matches, given its ancestors ordered from the root down
    pub fn matches(&self, node: &ElementNode, ancestors: &[&ElementNode]) -> bool {
        self.selectors.iter().any(|s| s.matches(node, ancestors))
    }
}

impl ComplexSelector {
    fn matches(&self, node: &ElementNode, ancestors: &[&ElementNode]) -> bool {
        let Some(((combinator, subject), rest)) = self.parts.split_last() else {
            return false;
        };
        subject.matches(node) && match_upwards(rest, *combinator, ancestors)
    }
}

fn match_upwards(parts: &[(Combinator, CompoundSelector)], link: Combinator, ancestors: &[&ElementNode]) -> bool {
    let Some(((next_link, compound), rest)) = parts.split_last() else {
        return true;
    };

    match link {
        Combinator::Child => match ancestors.split_last() {
            Some((parent, above)) => compound.matches(parent) && match_upwards(rest, *next_link, above),
            None => false,
        },
        Combinator::Descendant => (0..ancestors.len())
            .rev()
            .any(|i| compound.matches(ancestors[i]) && match_upwards(rest, *next_link, &ancestors[..i])),
    }
}

impl CompoundSelector {
    fn matches(&self, node: &ElementNode) -> bool {
        if let Some(tag) = &self.tag {
            if !node.is_tag(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if node.id() != Some(id) {
                return false;
            }
        }
        if !self.classes.iter().all(|c| node.has_class(c)) {
            return false;
        }
        self.attrs.iter().all(|attr| {
            let Some(actual) = node.get_attribute(&attr.name) else {
                return false;
            };
            match &attr.test {
                None => true,
                Some((AttrOp::Equals, v)) => actual == v,
                Some((AttrOp::Prefix, v)) => !v.is_empty() && actual.starts_with(v.as_str()),
                Some((AttrOp::Suffix, v)) => !v.is_empty() && actual.ends_with(v.as_str()),
                Some((AttrOp::Contains, v)) => !v.is_empty() && actual.contains(v.as_str()),
                Some((AttrOp::Word, v)) => actual.split_whitespace().any(|w| w == v),
            }
        })
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> AutomationError {
        AutomationError::InvalidSelector {
            selector: self.source.to_string(),
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        self.pos += 1;
        c
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.error(format!("expected '{}' but found '{}'", expected, c))),
            None => Err(self.error(format!("expected '{}' at end of input", expected))),
        }
    }

    /// Returns true if any whitespace was consumed
    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn parse_list(&mut self) -> Result<Vec<ComplexSelector>> {
        let mut list = Vec::new();
        loop {
            self.skip_ws();
            list.push(self.parse_complex()?);
            self.skip_ws();
            match self.bump() {
                None => break,
                Some(',') => continue,
                Some(c) => return Err(self.error(format!("unexpected '{}'", c))),
            }
        }
        Ok(list)
    }

    fn parse_complex(&mut self) -> Result<ComplexSelector> {
        let mut parts = Vec::new();
        let mut link = Combinator::Descendant;
        loop {
            parts.push((link, self.parse_compound()?));
            let had_ws = self.skip_ws();
            match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.bump();
                    self.skip_ws();
                    link = Combinator::Child;
                }
                Some(_) if had_ws => link = Combinator::Descendant,
                Some(c) => return Err(self.error(format!("unexpected '{}'", c))),
            }
        }
        Ok(ComplexSelector { parts })
    }

    fn parse_compound(&mut self) -> Result<CompoundSelector> {
        let mut compound = CompoundSelector::default();
        let mut consumed = false;

        if self.peek() == Some('*') {
            self.bump();
            consumed = true;
        } else if self.peek().is_some_and(is_ident_char) {
            compound.tag = Some(self.parse_ident()?.to_ascii_lowercase());
            consumed = true;
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.bump();
                    compound.id = Some(self.parse_ident()?);
                }
                Some('.') => {
                    self.bump();
                    compound.classes.push(self.parse_ident()?);
                }
                Some('[') => {
                    self.bump();
                    compound.attrs.push(self.parse_attr()?);
                }
                _ => break,
            }
            consumed = true;
        }

        if !consumed {
            return Err(match self.peek() {
                Some(c) => self.error(format!("expected a selector but found '{}'", c)),
                None => self.error("empty selector"),
            });
        }
        Ok(compound)
    }

    fn parse_ident(&mut self) -> Result<String> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected an identifier"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_attr(&mut self) -> Result<AttrSelector> {
        self.skip_ws();
        let name = self.parse_ident()?;
        self.skip_ws();

        if self.peek() == Some(']') {
            self.bump();
            return Ok(AttrSelector { name, test: None });
        }

        let op = match self.bump() {
            Some('=') => AttrOp::Equals,
            Some(c @ ('^' | '$' | '*' | '~')) => {
                self.expect('=')?;
                match c {
                    '^' => AttrOp::Prefix,
                    '$' => AttrOp::Suffix,
                    '*' => AttrOp::Contains,
                    _ => AttrOp::Word,
                }
            }
            Some(c) => return Err(self.error(format!("unsupported attribute operator '{}'", c))),
            None => return Err(self.error("unterminated attribute selector")),
        };

        self.skip_ws();
        let value = match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.bump();
                self.parse_quoted(q)?
            }
            _ => self.parse_ident()?,
        };
        self.skip_ws();
        self.expect(']')?;

        Ok(AttrSelector {
            name,
            test: Some((op, value)),
        })
    }

    fn parse_quoted(&mut self, quote: char) -> Result<String> {
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some(c) => value.push(c),
                    None => return Err(self.error("dangling escape in string")),
                },
                Some(c) if c == quote => return Ok(value),
                Some(c) => value.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}
