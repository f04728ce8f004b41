//! Content document types.
//!
//! A [`Document`] is the ordered body of a page: a sequence of
//! [`BlockInstance`]s, each tagged with the kind that gives its value
//! meaning. Struct and list values nest further instances, so a document is
//! a tree. Order is significant everywhere except struct fields, which are
//! keyed by name.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Number, Value};

/// Kind tag given to struct fields the schema does not declare.
///
/// Such fields are kept verbatim as [`BlockValue::Opaque`] so that content
/// written under a newer schema survives a round-trip through older code.
pub const UNDECLARED_KIND: &str = "";

/// A leaf value carried by scalar and choice blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Primitive {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

impl Primitive {
    /// Create a string primitive.
    pub fn text(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Create an integer primitive.
    pub fn integer(value: i64) -> Self {
        Self::Number(Number::from(value))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view; floats with a fractional part are not integers.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// `null` or a string with nothing but whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// JSON type name, used in violation messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
        }
    }

    /// Convert a JSON value; arrays and objects are not primitives.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Null),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => Some(Self::Number(n.clone())),
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::String(s) => Value::String(s.clone()),
        }
    }
}

impl From<&str> for Primitive {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Primitive {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for Primitive {
    fn from(value: i64) -> Self {
        Self::integer(value)
    }
}

impl From<bool> for Primitive {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// The value half of a block instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockValue {
    /// Scalar and choice kinds.
    Primitive(Primitive),
    /// Struct kinds: field name to nested instance.
    Struct(BTreeMap<String, BlockInstance>),
    /// List kinds: homogeneous nested instances, in order.
    List(Vec<BlockInstance>),
    /// Raw payload of a kind the registry does not know.
    Opaque(Value),
}

impl BlockValue {
    /// Short name of the value's shape, used in violation messages.
    pub fn shape_name(&self) -> &'static str {
        match self {
            Self::Primitive(_) => "primitive",
            Self::Struct(_) => "struct",
            Self::List(_) => "list",
            Self::Opaque(_) => "opaque",
        }
    }
}

/// One typed content unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInstance {
    /// Registered kind tag (or the tag of an inline kind declared by the
    /// enclosing field).
    pub kind: String,
    pub value: BlockValue,
}

impl BlockInstance {
    pub fn new(kind: impl Into<String>, value: BlockValue) -> Self {
        Self {
            kind: kind.into(),
            value,
        }
    }

    /// Create a scalar or choice instance.
    pub fn primitive(kind: impl Into<String>, value: impl Into<Primitive>) -> Self {
        Self::new(kind, BlockValue::Primitive(value.into()))
    }

    /// Create a struct instance from `(field, instance)` pairs.
    pub fn structure<K: Into<String>>(
        kind: impl Into<String>,
        fields: impl IntoIterator<Item = (K, BlockInstance)>,
    ) -> Self {
        let fields = fields.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self::new(kind, BlockValue::Struct(fields))
    }

    /// Create a list instance.
    pub fn list(kind: impl Into<String>, items: Vec<BlockInstance>) -> Self {
        Self::new(kind, BlockValue::List(items))
    }

    /// Wrap a raw payload whose kind is not in the registry.
    pub fn opaque(kind: impl Into<String>, raw: Value) -> Self {
        Self::new(kind, BlockValue::Opaque(raw))
    }

    /// Wrap a struct field value the schema does not declare.
    pub fn undeclared(raw: Value) -> Self {
        Self::opaque(UNDECLARED_KIND, raw)
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self.value, BlockValue::Opaque(_))
    }

    /// Raw field payload made by [`BlockInstance::undeclared`].
    pub fn is_undeclared(&self) -> bool {
        self.kind == UNDECLARED_KIND && self.is_opaque()
    }

    /// Look up a struct field.
    pub fn field(&self, name: &str) -> Option<&BlockInstance> {
        match &self.value {
            BlockValue::Struct(fields) => fields.get(name),
            _ => None,
        }
    }

    /// The primitive value, for scalar and choice instances.
    pub fn as_primitive(&self) -> Option<&Primitive> {
        match &self.value {
            BlockValue::Primitive(p) => Some(p),
            _ => None,
        }
    }

    /// The items, for list instances.
    pub fn items(&self) -> Option<&[BlockInstance]> {
        match &self.value {
            BlockValue::List(items) => Some(items),
            _ => None,
        }
    }
}

/// The ordered, recursively nested body content of a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    blocks: Vec<BlockInstance>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_blocks(blocks: Vec<BlockInstance>) -> Self {
        Self { blocks }
    }

    /// Append a block at the end of the document.
    pub fn push(&mut self, block: BlockInstance) {
        self.blocks.push(block);
    }

    /// Builder form of [`Document::push`].
    pub fn with(mut self, block: BlockInstance) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn blocks(&self) -> &[BlockInstance] {
        &self.blocks
    }

    pub fn into_blocks(self) -> Vec<BlockInstance> {
        self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BlockInstance> {
        self.blocks.iter()
    }
}

impl FromIterator<BlockInstance> for Document {
    fn from_iter<I: IntoIterator<Item = BlockInstance>>(iter: I) -> Self {
        Self {
            blocks: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = &'a BlockInstance;
    type IntoIter = std::slice::Iter<'a, BlockInstance>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}

/// One step of a [`BlockPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    /// Position in the document or in a list.
    Index(usize),
    /// Struct field name.
    Field(String),
}

/// Position trail from the document root to a block instance.
///
/// Displays as `$[1].cards[0].title`; the empty trail is `$`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BlockPath(Vec<PathStep>);

impl BlockPath {
    /// The document root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Extend with a list or document index.
    pub fn index(&self, index: usize) -> Self {
        let mut steps = self.0.clone();
        steps.push(PathStep::Index(index));
        Self(steps)
    }

    /// Extend with a struct field name.
    pub fn field(&self, name: impl Into<String>) -> Self {
        let mut steps = self.0.clone();
        steps.push(PathStep::Field(name.into()));
        Self(steps)
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for BlockPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for step in &self.0 {
            match step {
                PathStep::Index(i) => write!(f, "[{i}]")?,
                PathStep::Field(name) => write!(f, ".{name}")?,
            }
        }
        Ok(())
    }
}
