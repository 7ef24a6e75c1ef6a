//! A small CSS-like selector engine over node trees.
//!
//! Supported syntax:
//!
//! - type selectors (`group`, `idf:group`) and the universal selector `*`
//! - attribute presence `[id]` and equality `[type="body"]`, chainable
//! - the descendant (whitespace) and child (`>`) combinators
//! - comma separated groups
//!
//! A type selector without a prefix matches elements by local name, so
//! `group` finds both `<group>` and `<idf:group>`.

use std::fmt;

use super::content::local_name;
use super::node::XmlNodeRef;
use super::DOCUMENT_TAG;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    Present(String),
    Equals(String, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

/// One element test: an optional tag plus attribute predicates.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    predicates: Vec<Predicate>,
}

impl Compound {
    fn matches(&self, node: &XmlNodeRef) -> bool {
        let borrowed = node.borrow();
        let Some(element) = borrowed.element() else {
            return false;
        };
        if element.qname() == DOCUMENT_TAG {
            return false;
        }
        if let Some(tag) = &self.tag {
            let name_matches = if tag.contains(':') {
                element.qname() == tag
            } else {
                element.qname() == tag || element.local_name() == local_name(tag)
            };
            if !name_matches {
                return false;
            }
        }
        self.predicates.iter().all(|p| match p {
            Predicate::Present(name) => element.attribute(name).is_some(),
            Predicate::Equals(name, value) => element.attribute(name) == Some(value.as_str()),
        })
    }
}

/// A parsed selector, reusable across queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    /// Each group is a chain of compounds; the combinator of step `i` joins
    /// it to step `i - 1` and is ignored for the first step.
    groups: Vec<Vec<(Combinator, Compound)>>,
    source: String,
}

impl Selector {
    /// Parses a selector string.
    pub fn parse(source: &str) -> Result<Self> {
        let mut groups = Vec::new();
        for group in split_groups(source) {
            groups.push(parse_group(group, source)?);
        }
        if groups.is_empty() {
            return Err(Error::Selector(format!("empty selector '{}'", source)));
        }
        Ok(Selector {
            groups,
            source: source.to_string(),
        })
    }

    /// Returns true if `node` matches, looking at ancestors no higher than `scope`.
    pub fn matches(&self, node: &XmlNodeRef, scope: &XmlNodeRef) -> bool {
        self.groups
            .iter()
            .any(|steps| matches_steps(steps, steps.len() - 1, node, scope))
    }

    /// Returns the first descendant of `scope` in document order that matches.
    pub fn find(&self, scope: &XmlNodeRef) -> Option<XmlNodeRef> {
        let mut found = None;
        walk(scope, &mut |node| {
            if self.matches(node, scope) {
                found = Some(node.clone());
                false
            } else {
                true
            }
        });
        found
    }

    /// Returns every descendant of `scope` that matches, in document order.
    pub fn find_all(&self, scope: &XmlNodeRef) -> Vec<XmlNodeRef> {
        let mut found = Vec::new();
        walk(scope, &mut |node| {
            if self.matches(node, scope) {
                found.push(node.clone());
            }
            true
        });
        found
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// Visits descendants in pre-order until the visitor returns false.
fn walk(scope: &XmlNodeRef, visit: &mut dyn FnMut(&XmlNodeRef) -> bool) -> bool {
    let children: Vec<XmlNodeRef> = scope.borrow().children().to_vec();
    for child in &children {
        if !child.borrow().content().is_element() {
            continue;
        }
        if !visit(child) || !walk(child, visit) {
            return false;
        }
    }
    true
}

fn matches_steps(
    steps: &[(Combinator, Compound)],
    index: usize,
    node: &XmlNodeRef,
    scope: &XmlNodeRef,
) -> bool {
    let (combinator, compound) = &steps[index];
    if !compound.matches(node) {
        return false;
    }
    if index == 0 {
        return true;
    }

    let mut current = parent_within(node, scope);
    while let Some(ancestor) = current {
        if matches_steps(steps, index - 1, &ancestor, scope) {
            return true;
        }
        if *combinator == Combinator::Child {
            return false;
        }
        current = parent_within(&ancestor, scope);
    }
    false
}

/// Parent of `node`, unless `node` is already the scope.
fn parent_within(node: &XmlNodeRef, scope: &XmlNodeRef) -> Option<XmlNodeRef> {
    if std::rc::Rc::ptr_eq(node, scope) {
        return None;
    }
    node.borrow().parent().upgrade()
}

/// Splits on commas that are not inside brackets or quotes.
fn split_groups(source: &str) -> Vec<&str> {
    let mut groups = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in source.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                groups.push(source[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    groups.push(source[start..].trim());
    groups.into_iter().filter(|g| !g.is_empty()).collect()
}

fn parse_group(group: &str, source: &str) -> Result<Vec<(Combinator, Compound)>> {
    let invalid = |what: &str| Error::Selector(format!("{} in selector '{}'", what, source));
    let chars: Vec<char> = group.chars().collect();
    let mut steps = Vec::new();
    let mut pos = 0;
    let mut pending = Combinator::Descendant;

    while pos < chars.len() {
        // Combinators and whitespace between compounds.
        let mut child_marks = 0;
        while pos < chars.len() && (chars[pos].is_whitespace() || chars[pos] == '>') {
            if chars[pos] == '>' {
                child_marks += 1;
                pending = Combinator::Child;
            }
            pos += 1;
        }
        if child_marks > 1 || (child_marks == 1 && steps.is_empty()) {
            return Err(invalid("misplaced '>'"));
        }
        if pos >= chars.len() {
            break;
        }

        let mut compound = Compound {
            tag: None,
            predicates: Vec::new(),
        };

        let start = pos;
        while pos < chars.len() && is_name_char(chars[pos]) {
            pos += 1;
        }
        if pos > start {
            let tag: String = chars[start..pos].iter().collect();
            if tag != "*" {
                compound.tag = Some(tag);
            }
        }

        while pos < chars.len() && chars[pos] == '[' {
            pos += 1;
            let name_start = pos;
            while pos < chars.len() && is_name_char(chars[pos]) && chars[pos] != '*' {
                pos += 1;
            }
            let name: String = chars[name_start..pos].iter().collect();
            if name.is_empty() {
                return Err(invalid("missing attribute name"));
            }
            match chars.get(pos) {
                Some(']') => {
                    pos += 1;
                    compound.predicates.push(Predicate::Present(name));
                }
                Some('=') => {
                    pos += 1;
                    let value = match chars.get(pos) {
                        Some(&q) if q == '"' || q == '\'' => {
                            pos += 1;
                            let value_start = pos;
                            while pos < chars.len() && chars[pos] != q {
                                pos += 1;
                            }
                            if pos >= chars.len() {
                                return Err(invalid("unterminated string"));
                            }
                            let value: String = chars[value_start..pos].iter().collect();
                            pos += 1;
                            value
                        }
                        _ => {
                            let value_start = pos;
                            while pos < chars.len() && chars[pos] != ']' {
                                pos += 1;
                            }
                            chars[value_start..pos].iter().collect()
                        }
                    };
                    if chars.get(pos) != Some(&']') {
                        return Err(invalid("expected ']'"));
                    }
                    pos += 1;
                    compound.predicates.push(Predicate::Equals(name, value));
                }
                _ => return Err(invalid("malformed attribute predicate")),
            }
        }

        if pos == start {
            return Err(invalid(&format!("unexpected character '{}'", chars[pos])));
        }
        if pos < chars.len() && !(chars[pos].is_whitespace() || chars[pos] == '>') {
            return Err(invalid(&format!("unexpected character '{}'", chars[pos])));
        }

        steps.push((pending, compound));
        pending = Combinator::Descendant;
    }

    if steps.is_empty() {
        return Err(invalid("empty group"));
    }
    if pending == Combinator::Child {
        return Err(invalid("dangling '>'"));
    }
    Ok(steps)
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | ':' | '.' | '*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parser::parse_str;

    const DOC: &str = r#"<newsItem>
  <contentMeta>
    <metadata>
      <object id="t1" type="x-im/teaser"/>
      <object id="o2" type="x-im/image"/>
    </metadata>
  </contentMeta>
  <idf:idf xmlns:idf="urn:idf">
    <group type="header"><element type="headline">H</element></group>
    <group type="body">
      <element type="body">P1</element>
      <object type="x-im/teaser"/>
    </group>
  </idf:idf>
</newsItem>"#;

    fn ids(nodes: &[XmlNodeRef]) -> Vec<String> {
        nodes
            .iter()
            .map(|n| {
                let b = n.borrow();
                let e = b.element().unwrap();
                e.attribute("id")
                    .or(e.attribute("type"))
                    .unwrap_or(e.qname())
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn test_child_and_descendant_combinators() {
        let doc = parse_str(DOC).unwrap();

        let sel = Selector::parse(r#"contentMeta > metadata > object[type="x-im/teaser"]"#).unwrap();
        assert_eq!(ids(&sel.find_all(&doc)), vec!["t1"]);

        let sel = Selector::parse(r#"newsItem object[type="x-im/teaser"]"#).unwrap();
        assert_eq!(ids(&sel.find_all(&doc)).len(), 2);

        let sel = Selector::parse("newsItem > object").unwrap();
        assert!(sel.find(&doc).is_none());
    }

    #[test]
    fn test_local_name_matching() {
        let doc = parse_str(DOC).unwrap();
        let sel = Selector::parse(r#"idf > group[type="body"]"#).unwrap();
        assert_eq!(ids(&sel.find_all(&doc)), vec!["body"]);

        let sel = Selector::parse("idf:idf").unwrap();
        assert!(sel.find(&doc).is_some());
    }

    #[test]
    fn test_presence_chain_and_groups() {
        let doc = parse_str(DOC).unwrap();

        let sel = Selector::parse("object[id][type='x-im/image']").unwrap();
        assert_eq!(ids(&sel.find_all(&doc)), vec!["o2"]);

        let sel = Selector::parse(r#"group[type="header"], metadata"#).unwrap();
        assert_eq!(ids(&sel.find_all(&doc)), vec!["metadata", "header"]);
    }

    #[test]
    fn test_find_is_scoped() {
        let doc = parse_str(DOC).unwrap();
        let body = Selector::parse(r#"group[type="body"]"#)
            .unwrap()
            .find(&doc)
            .unwrap();

        let sel = Selector::parse("idf element").unwrap();
        assert!(sel.find(&body).is_none());
        let sel = Selector::parse("group > element").unwrap();
        assert!(sel.find(&body).is_some());
        let sel = Selector::parse("* > element").unwrap();
        assert!(sel.find(&body).is_some());
        let sel = Selector::parse("element").unwrap();
        assert_eq!(ids(&sel.find_all(&body)), vec!["body"]);
    }

    #[test]
    fn test_invalid_selectors() {
        assert!(Selector::parse("").is_err());
        assert!(Selector::parse("a >").is_err());
        assert!(Selector::parse("a[type=\"x]").is_err());
        assert!(Selector::parse("a[]").is_err());
        assert!(Selector::parse("a{b}").is_err());
        assert!(Selector::parse("a > > b").is_err());
        assert!(Selector::parse("> a").is_err());
    }
}
