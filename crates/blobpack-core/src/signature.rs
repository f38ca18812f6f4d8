//! Signature-based structural validation.
//!
//! A signature is a compact pattern describing the children of a container:
//!
//! | char    | matches                                   |
//! |---------|-------------------------------------------|
//! | `s`     | string                                    |
//! | `i`     | integer of any width (booleans included)  |
//! | `f`     | float of either width                     |
//! | `t`     | table                                     |
//! | `a`     | array                                     |
//! | `v`     | anything                                  |
//! | `{...}` | table whose children match the inner part |
//! | `[...]` | array whose children match the inner part |
//!
//! ## Matching rules
//!
//! - The top-level pattern must match the children one to one: the child
//!   count must equal the pattern length.
//! - A bracketed pattern is applied cyclically and must tile its
//!   container's children exactly, so `[i]` matches any non-empty array of
//!   integers and `{si}` any table of string keys to integer values, while
//!   `{si}` rejects a table with a dangling key.
//! - A container without children never matches, at any depth.
//! - Brackets nest at most [`MAX_DEPTH`] levels; matching only descends as
//!   far as the pattern does, so it is bounded by the same limit.

use crate::error::{Error, Result};
use crate::field::{Field, FieldType, MAX_DEPTH};
use tracing::trace;

/// One element of a parsed signature
#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    String,
    Int,
    Float,
    Table,
    Array,
    Any,
    TableOf(Vec<Node>),
    ArrayOf(Vec<Node>),
}

impl Node {
    fn matches(&self, field: &Field<'_>) -> bool {
        let field_type = field.field_type();
        match self {
            Node::String => field_type == FieldType::String,
            Node::Int => field_type.is_integer() || field_type == FieldType::Bool,
            Node::Float => field_type.is_float(),
            Node::Table => field_type == FieldType::Table,
            Node::Array => field_type == FieldType::Array,
            Node::Any => true,
            Node::TableOf(inner) => field_type == FieldType::Table && tiles(inner, field),
            Node::ArrayOf(inner) => field_type == FieldType::Array && tiles(inner, field),
        }
    }
}

/// Children of `field` matched cyclically against `pattern`, ending on a
/// pattern boundary
fn tiles(pattern: &[Node], field: &Field<'_>) -> bool {
    if pattern.is_empty() {
        return false;
    }
    let mut count = 0;
    for (index, child) in field.children().enumerate() {
        if !pattern[index % pattern.len()].matches(&child) {
            return false;
        }
        count = index + 1;
    }
    count > 0 && count % pattern.len() == 0
}

/// A parsed signature, reusable across many fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    nodes: Vec<Node>,
}

impl Signature {
    /// Parses a signature string
    pub fn parse(signature: &str) -> Result<Self> {
        let bytes = signature.as_bytes();
        let (nodes, consumed) = parse_sequence(signature, bytes, 0, None, 0)?;
        debug_assert_eq!(consumed, bytes.len());
        Ok(Self { nodes })
    }

    /// Number of children the signature expects at the top level
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True for the empty signature, which matches nothing
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Checks the children of `field` against the signature
    pub fn matches(&self, field: Field<'_>) -> bool {
        let mut count = 0;
        for (index, child) in field.children().enumerate() {
            match self.nodes.get(index) {
                Some(node) if node.matches(&child) => count = index + 1,
                _ => return false,
            }
        }
        count > 0 && count == self.nodes.len()
    }
}

impl std::str::FromStr for Signature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Parses nodes from `start` until `close` (or the end of input when
/// `close` is `None`). Returns the nodes and the index just past the
/// closing bracket. `depth` counts the enclosing brackets.
fn parse_sequence(
    source: &str,
    bytes: &[u8],
    start: usize,
    close: Option<u8>,
    depth: usize,
) -> Result<(Vec<Node>, usize)> {
    let mut nodes = Vec::new();
    let mut pos = start;

    while pos < bytes.len() {
        let c = bytes[pos];
        if Some(c) == close {
            return Ok((nodes, pos + 1));
        }
        let node = match c {
            b's' => Node::String,
            b'i' => Node::Int,
            b'f' => Node::Float,
            b't' => Node::Table,
            b'a' => Node::Array,
            b'v' => Node::Any,
            b'{' | b'[' => {
                if depth >= MAX_DEPTH {
                    return Err(Error::invalid_signature(
                        source,
                        pos,
                        format!("brackets nested deeper than {} levels", MAX_DEPTH),
                    ));
                }
                let closing = if c == b'{' { b'}' } else { b']' };
                let (inner, next) =
                    parse_sequence(source, bytes, pos + 1, Some(closing), depth + 1)?;
                pos = next;
                nodes.push(if c == b'{' {
                    Node::TableOf(inner)
                } else {
                    Node::ArrayOf(inner)
                });
                continue;
            }
            b'}' | b']' => {
                return Err(Error::invalid_signature(
                    source,
                    pos,
                    format!("unexpected '{}'", c as char),
                ))
            }
            other => {
                return Err(Error::invalid_signature(
                    source,
                    pos,
                    format!("unknown type character '{}'", other.escape_ascii()),
                ))
            }
        };
        nodes.push(node);
        pos += 1;
    }

    match close {
        None => Ok((nodes, pos)),
        Some(c) => Err(Error::invalid_signature(
            source,
            start.saturating_sub(1),
            format!("missing closing '{}'", c as char),
        )),
    }
}

/// Validates the children of `field` against `signature`. Malformed
/// signatures never validate.
pub fn validate(field: Field<'_>, signature: &str) -> bool {
    match Signature::parse(signature) {
        Ok(sig) => {
            let ok = sig.matches(field);
            if !ok {
                trace!("Field {:?} does not match signature '{}'", field, signature);
            }
            ok
        }
        Err(e) => {
            trace!("Rejecting signature: {}", e);
            false
        }
    }
}

/// Validates `field`, then stores its direct children in `out` in order
/// (as many as fit). `out` is cleared first, so it is all `None` on failure.
pub fn parse<'a>(field: Field<'a>, signature: &str, out: &mut [Option<Field<'a>>]) -> bool {
    out.fill(None);
    if !validate(field, signature) {
        return false;
    }
    for (slot, child) in out.iter_mut().zip(field.children()) {
        *slot = Some(child);
    }
    true
}

/// Expected entry for [`parse_values`]
#[derive(Debug, Clone)]
pub struct Policy<'a> {
    /// Key to look up in a table; ignored for arrays
    pub name: &'a str,
    /// Required type, `None` for any
    pub kind: Option<FieldType>,
    /// Bound value after parsing
    pub value: Option<Field<'a>>,
}

impl<'a> Policy<'a> {
    /// Creates a policy requiring `kind`
    pub fn new(name: &'a str, kind: FieldType) -> Self {
        Self {
            name,
            kind: Some(kind),
            value: None,
        }
    }

    /// Creates a policy accepting any type
    pub fn any(name: &'a str) -> Self {
        Self {
            name,
            kind: None,
            value: None,
        }
    }

    fn accepts(&self, field: &Field<'_>) -> bool {
        self.kind.map_or(true, |kind| field.field_type() == kind)
    }
}

/// Binds the entries of `field` to `policies`.
///
/// For a table, every key equal to a policy name binds its value when the
/// type matches; unknown keys are skipped. For an array, children bind to
/// policies by position. Returns `false` if any bound entry has the wrong
/// type (its slot is left empty), or if the container holds more matched
/// entries (tables) or children (arrays) than there are policies.
pub fn parse_values<'a>(field: Field<'a>, policies: &mut [Policy<'a>]) -> bool {
    for policy in policies.iter_mut() {
        policy.value = None;
    }

    let mut valid = true;
    match field.field_type() {
        FieldType::Table => {
            let mut processed = 0;
            for (key, value) in field.pairs() {
                if processed == policies.len() {
                    return false;
                }
                let name = key.get_string();
                if let Some(policy) = policies.iter_mut().find(|p| p.name == name) {
                    if policy.accepts(&value) {
                        policy.value = Some(value);
                    } else {
                        trace!("Policy '{}' rejects {} value", name, value.field_type());
                        valid = false;
                    }
                    processed += 1;
                }
            }
        }
        FieldType::Array => {
            for (index, child) in field.children().enumerate() {
                let Some(policy) = policies.get_mut(index) else {
                    return false;
                };
                if policy.accepts(&child) {
                    policy.value = Some(child);
                } else {
                    valid = false;
                }
            }
        }
        _ => {}
    }
    valid
}
