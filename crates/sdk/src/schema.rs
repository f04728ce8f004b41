//! Block schema vocabulary.
//!
//! Schemas are plain data: a [`KindDescriptor`] names a kind and gives it a
//! [`Shape`] (scalar, struct, list or choice). Struct fields and list items
//! refer to other kinds either by registered tag or by an inline descriptor,
//! so larger schemas are assembled from smaller ones instead of inherited.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Primitive type of a scalar kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveType {
    Text,
    RichText,
    Integer,
    Boolean,
    Url,
    Email,
    /// Opaque identifier of an asset held by the asset store.
    MediaRef,
}

impl PrimitiveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::RichText => "rich_text",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Url => "url",
            Self::Email => "email",
            Self::MediaRef => "media_ref",
        }
    }
}

/// The four block categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Scalar,
    Struct,
    List,
    Choice,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::Struct => "struct",
            Self::List => "list",
            Self::Choice => "choice",
        }
    }
}

/// An allowed token of a choice kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub token: String,
    pub label: String,
}

/// Category-specific shape of a kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum Shape {
    Scalar {
        primitive: PrimitiveType,
        /// Maximum length in characters (text and rich text).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_value: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_value: Option<i64>,
        /// Regular expression the whole text must match.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
    },
    Struct {
        fields: Vec<FieldDescriptor>,
    },
    List {
        child: KindRef,
        #[serde(default)]
        min_count: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_count: Option<usize>,
    },
    Choice {
        options: Vec<ChoiceOption>,
    },
}

impl Shape {
    pub fn category(&self) -> Category {
        match self {
            Self::Scalar { .. } => Category::Scalar,
            Self::Struct { .. } => Category::Struct,
            Self::List { .. } => Category::List,
            Self::Choice { .. } => Category::Choice,
        }
    }
}

/// A registry entry: kind tag, shape and optional default value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindDescriptor {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(flatten)]
    pub shape: Shape,
    /// Default value in wire form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl KindDescriptor {
    fn with_shape(kind: impl Into<String>, shape: Shape) -> Self {
        Self {
            kind: kind.into(),
            label: None,
            shape,
            default: None,
        }
    }

    /// Declare a scalar kind.
    pub fn scalar(kind: impl Into<String>, primitive: PrimitiveType) -> Self {
        Self::with_shape(
            kind,
            Shape::Scalar {
                primitive,
                max_length: None,
                min_value: None,
                max_value: None,
                pattern: None,
            },
        )
    }

    /// Declare a struct kind with no fields yet.
    pub fn structure(kind: impl Into<String>) -> Self {
        Self::with_shape(kind, Shape::Struct { fields: Vec::new() })
    }

    /// Declare an unbounded list kind.
    pub fn list(kind: impl Into<String>, child: impl Into<KindRef>) -> Self {
        Self::with_shape(
            kind,
            Shape::List {
                child: child.into(),
                min_count: 0,
                max_count: None,
            },
        )
    }

    /// Declare a choice kind from `(token, label)` pairs.
    pub fn choice(kind: impl Into<String>, options: &[(&str, &str)]) -> Self {
        let options = options
            .iter()
            .map(|(token, label)| ChoiceOption {
                token: (*token).to_string(),
                label: (*label).to_string(),
            })
            .collect();
        Self::with_shape(kind, Shape::Choice { options })
    }

    pub fn category(&self) -> Category {
        self.shape.category()
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Limit a text or rich text scalar to `max` characters.
    pub fn max_length(mut self, max: usize) -> Self {
        if let Shape::Scalar { max_length, .. } = &mut self.shape {
            *max_length = Some(max);
        }
        self
    }

    /// Require a text scalar to match a regular expression in full.
    pub fn pattern(mut self, regex: impl Into<String>) -> Self {
        if let Shape::Scalar { pattern, .. } = &mut self.shape {
            *pattern = Some(regex.into());
        }
        self
    }

    /// Bound an integer scalar (inclusive).
    pub fn range(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        if let Shape::Scalar {
            min_value,
            max_value,
            ..
        } = &mut self.shape
        {
            *min_value = min;
            *max_value = max;
        }
        self
    }

    /// Add a field to a struct kind.
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        if let Shape::Struct { fields } = &mut self.shape {
            fields.push(field);
        }
        self
    }

    /// Add every field of a reusable group to a struct kind.
    pub fn group(mut self, group: &FieldGroup) -> Self {
        if let Shape::Struct { fields } = &mut self.shape {
            fields.extend(group.fields.iter().cloned());
        }
        self
    }

    /// Set the cardinality bounds of a list kind.
    pub fn count(mut self, min: usize, max: Option<usize>) -> Self {
        if let Shape::List {
            min_count,
            max_count,
            ..
        } = &mut self.shape
        {
            *min_count = min;
            *max_count = max;
        }
        self
    }

    /// Struct fields, empty for other categories.
    pub fn fields(&self) -> &[FieldDescriptor] {
        match &self.shape {
            Shape::Struct { fields } => fields,
            _ => &[],
        }
    }

    /// Tokens of a choice kind, empty for other categories.
    pub fn tokens(&self) -> Vec<&str> {
        match &self.shape {
            Shape::Choice { options } => options.iter().map(|o| o.token.as_str()).collect(),
            _ => Vec::new(),
        }
    }
}

/// Reference from a field or list to the kind of its values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KindRef {
    /// A kind registered under this tag.
    Named(String),
    /// A kind declared in place, visible only through this reference.
    Inline(Box<KindDescriptor>),
}

impl KindRef {
    /// Tag of the referenced kind.
    pub fn tag(&self) -> &str {
        match self {
            Self::Named(tag) => tag,
            Self::Inline(descriptor) => &descriptor.kind,
        }
    }
}

impl From<&str> for KindRef {
    fn from(tag: &str) -> Self {
        Self::Named(tag.to_string())
    }
}

impl From<String> for KindRef {
    fn from(tag: String) -> Self {
        Self::Named(tag)
    }
}

impl From<KindDescriptor> for KindRef {
    fn from(descriptor: KindDescriptor) -> Self {
        Self::Inline(Box::new(descriptor))
    }
}

/// A named field of a struct kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: KindRef,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    /// Field-level default in wire form; overrides the kind's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

fn default_required() -> bool {
    true
}

impl FieldDescriptor {
    /// A required field.
    pub fn new(name: impl Into<String>, kind: impl Into<KindRef>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            required: true,
            label: None,
            help_text: None,
            default: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.help_text = Some(text.into());
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// A named, reusable list of fields that struct kinds pull in with
/// [`KindDescriptor::group`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldGroup {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
}

impl FieldGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }
}

/// Schema of a page type: which top-level kinds its body may hold and how
/// many blocks it may have.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageTypeSchema {
    pub type_tag: String,
    pub label: String,
    pub allowed_kinds: Vec<String>,
    #[serde(default)]
    pub min_blocks: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_blocks: Option<usize>,
}

impl PageTypeSchema {
    pub fn new(type_tag: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            label: label.into(),
            allowed_kinds: Vec::new(),
            min_blocks: 0,
            max_blocks: None,
        }
    }

    /// Allow a top-level kind.
    pub fn allow(mut self, kind: impl Into<String>) -> Self {
        self.allowed_kinds.push(kind.into());
        self
    }

    /// Allow every kind in `kinds`.
    pub fn allow_all(mut self, kinds: &[&str]) -> Self {
        self.allowed_kinds
            .extend(kinds.iter().map(|k| (*k).to_string()));
        self
    }

    pub fn blocks(mut self, min: usize, max: Option<usize>) -> Self {
        self.min_blocks = min;
        self.max_blocks = max;
        self
    }

    pub fn allows(&self, kind: &str) -> bool {
        self.allowed_kinds.iter().any(|k| k == kind)
    }

    /// The page body as a list kind whose child is a choice over the
    /// allowed kind tags. A block's `kind` is its choice token.
    pub fn as_descriptor(&self) -> KindDescriptor {
        let options: Vec<(&str, &str)> = self
            .allowed_kinds
            .iter()
            .map(|k| (k.as_str(), k.as_str()))
            .collect();
        let body = KindDescriptor::choice(format!("{}_block", self.type_tag), &options);
        KindDescriptor::list(self.type_tag.clone(), body)
            .label(self.label.clone())
            .count(self.min_blocks, self.max_blocks)
    }
}
