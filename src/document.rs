//! Simplified indentation-based structured text (a small YAML-like subset).
//!
//! Used for inline signature metadata and override blocks. Supported lines:
//!
//! - `key:` opens a nested block owned by `key`
//! - `key: value` sets a scalar
//! - `- value` appends a list item
//! - `flag` (no colon) declares a bare key
//!
//! Anything after `#` is a comment. Scalars are normalised by
//! [`normalize_value`].

use crate::error::ParseError;
use std::fmt;

/// A normalised scalar. Also used as a mapping key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scalar {
    Str(String),
    Bool(bool),
    Int(i64),
    Bytes(Vec<u8>),
}

impl Scalar {
    /// Truthiness as the signature format understands it.
    ///
    /// Empty strings, `"0"`, `false`, `0` and empty byte strings are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Scalar::Str(s) => !s.is_empty() && s != "0",
            Scalar::Bool(b) => *b,
            Scalar::Int(n) => *n != 0,
            Scalar::Bytes(b) => !b.is_empty() && b.as_slice() != b"0",
        }
    }

    /// Borrow the string form, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Str(s) => write!(f, "{}", s),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(n) => write!(f, "{}", n),
            Scalar::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Str(s.to_string())
    }
}

/// Insertion-ordered mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    entries: Vec<(Scalar, Value)>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &Scalar) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &Scalar) -> bool {
        self.get(key).is_some()
    }

    /// Insert or replace, keeping the original position of an existing key.
    pub fn insert(&mut self, key: Scalar, value: Value) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Scalar, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A parsed document node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Scalar(Scalar),
    List(Vec<Value>),
    Map(Mapping),
}

impl Value {
    /// An empty mapping, the usual starting point for a document.
    pub fn empty_map() -> Self {
        Value::Map(Mapping::new())
    }

    /// Look up a string key in a mapping node.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(&Scalar::from(key)),
            _ => None,
        }
    }

    /// Follow a path of string keys.
    pub fn pointer(&self, path: &[&str]) -> Option<&Value> {
        path.iter().try_fold(self, |node, key| node.get(key))
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Scalar(s) => s.is_truthy(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
        }
    }

    fn is_container(&self) -> bool {
        matches!(self, Value::List(_) | Value::Map(_))
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Scalar(s)
    }
}

/// Normalise a raw scalar.
///
/// Quoted strings lose their quotes, `true`/`y` and `false`/`n` become
/// booleans, even-length `0x` hex strings become bytes, canonical integers
/// of two or more characters become integers. A false-equivalent result is
/// always `Bool(false)`.
pub fn normalize_value(raw: &str) -> Scalar {
    let lower = raw.to_ascii_lowercase();
    let quoted = (raw.starts_with('"') && raw.ends_with('"'))
        || (raw.starts_with('\'') && raw.ends_with('\''));

    let scalar = if quoted {
        Scalar::Str(raw.get(1..raw.len().saturating_sub(1)).unwrap_or_default().to_string())
    } else if lower == "true" || lower == "y" {
        Scalar::Bool(true)
    } else if lower == "false" || lower == "n" {
        Scalar::Bool(false)
    } else if let Some(bytes) = decode_hex(raw) {
        Scalar::Bytes(bytes)
    } else if let Some(n) = canonical_int(raw) {
        Scalar::Int(n)
    } else {
        Scalar::Str(raw.to_string())
    };

    if scalar.is_truthy() {
        scalar
    } else {
        Scalar::Bool(false)
    }
}

fn decode_hex(raw: &str) -> Option<Vec<u8>> {
    let digits = raw.strip_prefix("0x")?;
    if digits.is_empty() || raw.len() % 2 != 0 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    hex::decode(digits).ok()
}

fn canonical_int(raw: &str) -> Option<i64> {
    if raw.len() < 2 {
        return None;
    }
    let n: i64 = raw.parse().ok()?;
    (n.to_string() == raw).then_some(n)
}

/// Parse text into a fresh document.
pub fn parse(text: &str) -> Result<Value, ParseError> {
    parse_block(text, Value::empty_map(), Mode::Build, 0)
}

/// Parse text on top of an existing document.
///
/// Existing keys are overwritten, list items are appended. The target is
/// only replaced when the whole text parses.
pub fn parse_into(text: &str, target: &mut Value) -> Result<(), ParseError> {
    let merged = parse_block(text, target.clone(), Mode::Build, 0)?;
    *target = merged;
    Ok(())
}

/// Check that text only touches keys already present in `schema`.
pub fn validate(text: &str, schema: &Value) -> bool {
    parse_block(text, schema.clone(), Mode::Validate, 0).is_ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Build,
    Validate,
}

/// Container under construction for one block.
enum Node {
    Empty,
    List(Vec<Value>),
    Map(Mapping),
}

impl Node {
    fn from_base(base: Value, mode: Mode) -> Result<Self, ParseError> {
        match base {
            Value::Map(map) => Ok(Node::Map(map)),
            Value::List(items) => Ok(Node::List(items)),
            Value::Scalar(s) if mode == Mode::Validate => Err(ParseError::SchemaMismatch {
                key: s.to_string(),
            }),
            Value::Scalar(_) => Ok(Node::Empty),
        }
    }

    fn contains(&self, key: &Scalar) -> bool {
        matches!(self, Node::Map(map) if map.contains_key(key))
    }

    fn map_mut(&mut self, line: &str) -> Result<&mut Mapping, ParseError> {
        match self {
            Node::Empty => *self = Node::Map(Mapping::new()),
            Node::List(items) if items.is_empty() => *self = Node::Map(Mapping::new()),
            Node::List(_) => {
                return Err(ParseError::MixedBlock {
                    line: line.to_string(),
                })
            }
            Node::Map(_) => {}
        }
        match self {
            Node::Map(map) => Ok(map),
            _ => unreachable!("node was just made a map"),
        }
    }

    fn list_mut(&mut self, line: &str) -> Result<&mut Vec<Value>, ParseError> {
        match self {
            Node::Empty => *self = Node::List(Vec::new()),
            Node::Map(map) if map.is_empty() => *self = Node::List(Vec::new()),
            Node::Map(_) => {
                return Err(ParseError::MixedBlock {
                    line: line.to_string(),
                })
            }
            Node::List(_) => {}
        }
        match self {
            Node::List(items) => Ok(items),
            _ => unreachable!("node was just made a list"),
        }
    }

    /// Declare a key, creating a `false` placeholder when building.
    fn open_key(&mut self, key: &Scalar, mode: Mode, line: &str) -> Result<(), ParseError> {
        if self.contains(key) {
            return Ok(());
        }
        if mode == Mode::Validate {
            return Err(ParseError::SchemaMismatch {
                key: key.to_string(),
            });
        }
        self.map_mut(line)?
            .insert(key.clone(), Value::Scalar(Scalar::Bool(false)));
        Ok(())
    }

    /// Parse a buffered sub-block into the value owned by `key`.
    fn descend(
        &mut self,
        key: &Scalar,
        block: &str,
        mode: Mode,
        depth: usize,
    ) -> Result<(), ParseError> {
        let existing = match self {
            Node::Map(map) => map.get(key).cloned(),
            _ => None,
        };
        let existing = match existing {
            Some(value) => value,
            None if mode == Mode::Validate => {
                return Err(ParseError::SchemaMismatch {
                    key: key.to_string(),
                })
            }
            None => Value::Scalar(Scalar::Bool(false)),
        };
        if mode == Mode::Validate && !existing.is_container() {
            return Err(ParseError::SchemaMismatch {
                key: key.to_string(),
            });
        }

        let child = parse_block(block, existing, mode, depth)?;
        if mode == Mode::Build {
            self.map_mut(block)?.insert(key.clone(), child);
        }
        Ok(())
    }

    fn finish(self) -> Value {
        match self {
            Node::Empty => Value::empty_map(),
            Node::List(items) => Value::List(items),
            Node::Map(map) => Value::Map(map),
        }
    }
}

fn strip_comment(line: &str) -> &str {
    let line = match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    };
    line.trim_end()
}

fn indentation(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

fn parse_block(input: &str, base: Value, mode: Mode, depth: usize) -> Result<Value, ParseError> {
    let mut node = Node::from_base(base, mode)?;
    let mut key: Option<Scalar> = None;
    let mut pending = String::new();
    let mut block_depth = 0;

    let input = input.replace('\r', "");
    for raw in input.split('\n') {
        let line = strip_comment(raw);
        if line.is_empty() {
            continue;
        }

        let indent = indentation(line);
        if indent > depth {
            if pending.is_empty() {
                block_depth = indent;
            }
            pending.push_str(line);
            pending.push('\n');
            continue;
        }
        if indent < depth {
            return Err(ParseError::Dedent {
                line: line.to_string(),
            });
        }
        if !pending.is_empty() {
            let owner = key.as_ref().ok_or(ParseError::OrphanBlock)?;
            node.descend(owner, &pending, mode, block_depth)?;
            pending.clear();
        }

        let body = &line[indent..];
        if let Some(name) = body.strip_suffix(':') {
            let k = normalize_value(name);
            node.open_key(&k, mode, line)?;
            key = Some(k);
        } else if let Some(item) = body.strip_prefix("- ") {
            let value = normalize_value(item);
            let items = node.list_mut(line)?;
            if mode == Mode::Build && !item.is_empty() {
                items.push(Value::Scalar(value));
            }
        } else if let Some(pos) = body.find(": ") {
            let k = normalize_value(&body[..pos]);
            if !k.is_truthy() {
                return Err(ParseError::FalsyKey {
                    key: body[..pos].to_string(),
                });
            }
            if mode == Mode::Validate && !node.contains(&k) {
                return Err(ParseError::SchemaMismatch { key: k.to_string() });
            }
            let raw_value = &body[pos + 2..];
            if mode == Mode::Build && !raw_value.is_empty() {
                node.map_mut(line)?
                    .insert(k.clone(), Value::Scalar(normalize_value(raw_value)));
            }
            key = Some(k);
        } else if !body.contains(':') && body.len() > 1 {
            let k = normalize_value(body);
            node.open_key(&k, mode, line)?;
            key = Some(k);
        }
    }

    if !pending.is_empty() {
        let owner = key.as_ref().ok_or(ParseError::OrphanBlock)?;
        node.descend(owner, &pending, mode, block_depth)?;
    }

    Ok(node.finish())
}

/// Render a document back to text that [`parse`] reads as an equal value.
///
/// Fails for shapes the format cannot express: empty containers, nested
/// containers inside lists, and scalars that would not survive a reparse.
pub fn render(value: &Value) -> Result<String, ParseError> {
    let mut out = String::new();
    render_node(&mut out, value, 0)?;
    Ok(out)
}

fn render_node(out: &mut String, value: &Value, indent: usize) -> Result<(), ParseError> {
    let pad = " ".repeat(indent);
    match value {
        Value::Scalar(s) => {
            return Err(ParseError::Unrenderable(format!(
                "bare scalar at top level: {}",
                s
            )))
        }
        Value::List(items) => {
            for item in items {
                let scalar = item.as_scalar().ok_or_else(|| {
                    ParseError::Unrenderable("container inside a list".to_string())
                })?;
                out.push_str(&format!("{}- {}\n", pad, render_scalar(scalar)?));
            }
        }
        Value::Map(map) => {
            for (k, v) in map.iter() {
                let key = render_key(k)?;
                match v {
                    Value::Scalar(s) => {
                        out.push_str(&format!("{}{}: {}\n", pad, key, render_scalar(s)?))
                    }
                    Value::List(items) if items.is_empty() => {
                        return Err(ParseError::Unrenderable(format!("empty list at {}", k)))
                    }
                    Value::Map(m) if m.is_empty() => {
                        return Err(ParseError::Unrenderable(format!("empty map at {}", k)))
                    }
                    nested => {
                        out.push_str(&format!("{}{}:\n", pad, key));
                        render_node(out, nested, indent + 2)?;
                    }
                }
            }
        }
    }
    Ok(())
}

fn render_key(key: &Scalar) -> Result<String, ParseError> {
    if !key.is_truthy() {
        return Err(ParseError::FalsyKey {
            key: key.to_string(),
        });
    }
    let text = render_scalar(key)?;
    if text.contains(": ") {
        return Err(ParseError::Unrenderable(format!("key contains ': ': {}", key)));
    }
    Ok(text)
}

fn render_scalar(scalar: &Scalar) -> Result<String, ParseError> {
    let text = scalar.to_string();
    if text.contains(['#', '\n', '\r']) {
        return Err(ParseError::Unrenderable(text));
    }
    if normalize_value(&text) == *scalar && !text.starts_with("- ") {
        return Ok(text);
    }
    match scalar {
        Scalar::Str(s) if normalize_value(&format!("\"{}\"", s)) == *scalar => {
            Ok(format!("\"{}\"", s))
        }
        _ => Err(ParseError::Unrenderable(text)),
    }
}
