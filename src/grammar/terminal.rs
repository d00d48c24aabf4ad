//! Precompiled terminal matchers
//!
//! Every string, class and any-character descriptor in a grammar is turned
//! into a [`Terminal`] once, at compile time. Identical terminals are
//! interned so each distinct pattern is stored and described once.

use super::char_class::{describe_class, CharClass, ClassRange};
use hashbrown::HashMap;

/// How a terminal tests the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalMatcher {
    /// Exact text
    Literal(Box<str>),
    /// One character from a class
    Class(CharClass),
    /// Any one character
    Any,
}

/// A compiled terminal with its diagnostic description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Terminal {
    /// Matching strategy
    pub matcher: TerminalMatcher,
    /// Text shown in "expected" lists
    pub description: String,
}

impl Terminal {
    /// Terminal matching `text` exactly
    pub fn literal(text: &str) -> Self {
        Self {
            matcher: TerminalMatcher::Literal(text.into()),
            description: format!("{:?}", text),
        }
    }

    /// Terminal matching one character of the class
    pub fn class(ranges: &[ClassRange], negated: bool) -> Result<Self, ClassRange> {
        Ok(Self {
            matcher: TerminalMatcher::Class(CharClass::new(ranges, negated)?),
            description: describe_class(ranges, negated),
        })
    }

    /// Terminal matching any one character
    pub fn any() -> Self {
        Self {
            matcher: TerminalMatcher::Any,
            description: "any character".to_string(),
        }
    }

    /// Test a single character against a class or any-char terminal
    ///
    /// Literals never match through this path.
    #[inline]
    pub fn accepts_char(&self, c: char) -> bool {
        match &self.matcher {
            TerminalMatcher::Class(class) => class.matches(c),
            TerminalMatcher::Any => true,
            TerminalMatcher::Literal(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TerminalKey {
    Literal(String),
    Class(Vec<ClassRange>, bool),
    Any,
}

/// Interning table of terminals, indexed by the ids stored on grammar nodes
#[derive(Debug, Default)]
pub struct TerminalTable {
    terminals: Vec<Terminal>,
    index: HashMap<TerminalKey, usize, ahash::RandomState>,
}

impl TerminalTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a literal
    pub fn literal(&mut self, text: &str) -> usize {
        let key = TerminalKey::Literal(text.to_string());
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        self.insert(key, Terminal::literal(text))
    }

    /// Intern a class; an inverted range is returned as the error
    pub fn class(&mut self, ranges: &[ClassRange], negated: bool) -> Result<usize, ClassRange> {
        let key = TerminalKey::Class(ranges.to_vec(), negated);
        if let Some(&id) = self.index.get(&key) {
            return Ok(id);
        }
        let terminal = Terminal::class(ranges, negated)?;
        Ok(self.insert(key, terminal))
    }

    /// Intern the any-character terminal
    pub fn any(&mut self) -> usize {
        if let Some(&id) = self.index.get(&TerminalKey::Any) {
            return id;
        }
        self.insert(TerminalKey::Any, Terminal::any())
    }

    fn insert(&mut self, key: TerminalKey, terminal: Terminal) -> usize {
        let id = self.terminals.len();
        self.terminals.push(terminal);
        self.index.insert(key, id);
        id
    }

    /// Number of distinct terminals
    pub fn len(&self) -> usize {
        self.terminals.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.terminals.is_empty()
    }

    /// Look up a terminal by id
    pub fn get(&self, id: usize) -> Option<&Terminal> {
        self.terminals.get(id)
    }

    /// Finish interning and keep only the terminals
    pub fn into_vec(self) -> Vec<Terminal> {
        self.terminals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning() {
        let mut table = TerminalTable::new();
        let a = table.literal("+");
        let b = table.literal("-");
        let c = table.literal("+");
        let any = table.any();
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(table.any(), any);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_descriptions() {
        let mut table = TerminalTable::new();
        let lit = table.literal("if");
        let class = table.class(&[ClassRange::new('0', '9')], false).unwrap();
        let any = table.any();
        assert_eq!(table.get(lit).unwrap().description, "\"if\"");
        assert_eq!(table.get(class).unwrap().description, "[0-9]");
        assert_eq!(table.get(any).unwrap().description, "any character");
    }

    #[test]
    fn test_accepts_char() {
        let digit = Terminal::class(&[ClassRange::new('0', '9')], false).unwrap();
        assert!(digit.accepts_char('3'));
        assert!(!digit.accepts_char('x'));
        assert!(Terminal::any().accepts_char('世'));
    }

    #[test]
    fn test_inverted_class() {
        let mut table = TerminalTable::new();
        assert_eq!(
            table.class(&[ClassRange::new('9', '0')], false),
            Err(ClassRange::new('9', '0'))
        );
        assert!(table.is_empty());
    }
}
