//! Document validation.
//!
//! One recursive walk covers every category. The walk never stops at the
//! first problem: it collects every violation, in document order, into a
//! [`ValidationReport`].

use std::fmt;
use std::str::FromStr;

use ramo_sdk::schema::{Category, KindDescriptor, KindRef, PageTypeSchema, PrimitiveType, Shape};
use ramo_sdk::types::{BlockInstance, BlockPath, BlockValue, Document, Primitive};
use thiserror::Error;

use super::BlockRegistry;
use super::scalars::{is_clean_markup, is_valid_email, is_valid_url};

/// How unknown kinds and undeclared struct fields are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidationMode {
    /// Unknown kinds and undeclared fields are violations.
    #[default]
    Strict,
    /// Unknown kinds and raw undeclared fields pass through untouched.
    /// Typed blocks under an undeclared field name are still violations.
    Lenient,
}

impl ValidationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Lenient => "lenient",
        }
    }
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown validation mode '{0}'")]
pub struct ParseModeError(String);

impl FromStr for ValidationMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => Err(ParseModeError(other.to_string())),
        }
    }
}

/// Why a block failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationReason {
    UnknownKind {
        kind: String,
    },
    /// Block carries a different tag than the field or list declares.
    KindMismatch {
        expected: String,
        found: String,
    },
    /// Value has the wrong category for its kind.
    ShapeMismatch {
        expected: Category,
        found: &'static str,
    },
    MissingField {
        field: String,
    },
    UndeclaredField {
        field: String,
    },
    TooFew {
        min: usize,
        found: usize,
    },
    TooMany {
        max: usize,
        found: usize,
    },
    InvalidChoice {
        token: String,
        allowed: Vec<String>,
    },
    TypeMismatch {
        expected: PrimitiveType,
        found: &'static str,
    },
    InvalidUrl {
        value: String,
    },
    InvalidEmail {
        value: String,
    },
    TooLong {
        max: usize,
        length: usize,
    },
    PatternMismatch {
        pattern: String,
    },
    OutOfRange {
        value: i64,
        min: Option<i64>,
        max: Option<i64>,
    },
    /// Rich text contains markup removed by sanitization.
    UnsafeMarkup,
    /// Kind is registered but not allowed on this page type.
    KindNotAllowed {
        kind: String,
        page_type: String,
    },
}

impl fmt::Display for ViolationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownKind { kind } => write!(f, "unknown block kind '{kind}'"),
            Self::KindMismatch { expected, found } => {
                write!(f, "expected a '{expected}' block, found '{found}'")
            }
            Self::ShapeMismatch { expected, found } => {
                write!(f, "expected a {} value, found {found}", expected.as_str())
            }
            Self::MissingField { field } => write!(f, "required field '{field}' is missing"),
            Self::UndeclaredField { field } => write!(f, "field '{field}' is not declared"),
            Self::TooFew { min, found } => {
                write!(f, "at least {min} item(s) required, found {found}")
            }
            Self::TooMany { max, found } => {
                write!(f, "at most {max} item(s) allowed, found {found}")
            }
            Self::InvalidChoice { token, allowed } => {
                write!(f, "'{token}' is not one of: {}", allowed.join(", "))
            }
            Self::TypeMismatch { expected, found } => {
                write!(f, "expected {}, found {found}", expected.as_str())
            }
            Self::InvalidUrl { value } => write!(f, "'{value}' is not a valid URL"),
            Self::InvalidEmail { value } => write!(f, "'{value}' is not a valid email address"),
            Self::TooLong { max, length } => {
                write!(f, "must be at most {max} characters, found {length}")
            }
            Self::PatternMismatch { pattern } => write!(f, "does not match '{pattern}'"),
            Self::OutOfRange { value, min, max } => match (min, max) {
                (Some(min), Some(max)) => write!(f, "{value} is outside {min}..={max}"),
                (Some(min), None) => write!(f, "{value} is below the minimum {min}"),
                (None, Some(max)) => write!(f, "{value} is above the maximum {max}"),
                (None, None) => write!(f, "{value} is out of range"),
            },
            Self::UnsafeMarkup => f.write_str("contains disallowed markup"),
            Self::KindNotAllowed { kind, page_type } => {
                write!(f, "'{kind}' blocks are not allowed on '{page_type}' pages")
            }
        }
    }
}

/// A single rule violation and where it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: BlockPath,
    pub reason: ViolationReason,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

/// Every violation found in a document, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Violation> {
        self.violations.iter()
    }

    fn push(&mut self, path: &BlockPath, reason: ViolationReason) {
        self.violations.push(Violation {
            path: path.clone(),
            reason,
        });
    }

    fn into_result(self) -> Result<(), ValidationReport> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ValidationReport {
    type Item = &'a Violation;
    type IntoIter = std::slice::Iter<'a, Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.violations.iter()
    }
}

/// Validate a document against the registry.
pub fn validate(
    document: &Document,
    registry: &BlockRegistry,
    mode: ValidationMode,
) -> Result<(), ValidationReport> {
    let mut walk = Walk::new(registry, mode);
    walk.document(document, None);
    walk.report.into_result()
}

/// Validate a document against the registry and a page type's block rules.
pub fn validate_for_page_type(
    document: &Document,
    registry: &BlockRegistry,
    page_type: &PageTypeSchema,
    mode: ValidationMode,
) -> Result<(), ValidationReport> {
    let mut walk = Walk::new(registry, mode);
    walk.document(document, Some(page_type));
    walk.report.into_result()
}

struct Walk<'r> {
    registry: &'r BlockRegistry,
    mode: ValidationMode,
    report: ValidationReport,
}

impl<'r> Walk<'r> {
    fn new(registry: &'r BlockRegistry, mode: ValidationMode) -> Self {
        Self {
            registry,
            mode,
            report: ValidationReport::default(),
        }
    }

    fn document(&mut self, document: &Document, page_type: Option<&PageTypeSchema>) {
        let root = BlockPath::root();
        if let Some(page_type) = page_type {
            self.count(&root, document.len(), page_type.min_blocks, page_type.max_blocks);
        }

        for (i, block) in document.iter().enumerate() {
            let path = root.index(i);
            match self.registry.get(&block.kind) {
                Some(descriptor) => {
                    if let Some(page_type) = page_type
                        && !page_type.allows(&block.kind)
                    {
                        self.report.push(
                            &path,
                            ViolationReason::KindNotAllowed {
                                kind: block.kind.clone(),
                                page_type: page_type.type_tag.clone(),
                            },
                        );
                    }
                    self.value(&path, block, &descriptor);
                }
                None => self.unknown(&path, &block.kind),
            }
        }
    }

    fn unknown(&mut self, path: &BlockPath, kind: &str) {
        if self.mode == ValidationMode::Strict {
            self.report.push(
                path,
                ViolationReason::UnknownKind {
                    kind: kind.to_string(),
                },
            );
        }
    }

    fn count(&mut self, path: &BlockPath, found: usize, min: usize, max: Option<usize>) {
        if found < min {
            self.report
                .push(path, ViolationReason::TooFew { min, found });
        }
        if let Some(max) = max
            && found > max
        {
            self.report
                .push(path, ViolationReason::TooMany { max, found });
        }
    }

    /// A block in a position whose kind is declared by a field or list.
    fn nested(&mut self, path: &BlockPath, block: &BlockInstance, kind_ref: &KindRef) {
        let Some(descriptor) = self.registry.resolve(kind_ref) else {
            self.unknown(path, kind_ref.tag());
            return;
        };
        if block.kind != descriptor.kind {
            self.report.push(
                path,
                ViolationReason::KindMismatch {
                    expected: descriptor.kind.clone(),
                    found: block.kind.clone(),
                },
            );
            return;
        }
        self.value(path, block, &descriptor);
    }

    fn value(&mut self, path: &BlockPath, block: &BlockInstance, descriptor: &KindDescriptor) {
        match (&descriptor.shape, &block.value) {
            (Shape::Scalar { .. }, BlockValue::Primitive(value)) => {
                self.scalar(path, value, &descriptor.shape);
            }
            (Shape::Choice { .. }, BlockValue::Primitive(value)) => {
                self.choice(path, value, descriptor);
            }
            (Shape::Struct { .. }, BlockValue::Struct(fields)) => {
                for field in descriptor.fields() {
                    let field_path = path.field(&field.name);
                    match fields.get(&field.name) {
                        Some(child) if !is_blank(child) => {
                            self.nested(&field_path, child, &field.kind);
                        }
                        _ if field.required => self.report.push(
                            path,
                            ViolationReason::MissingField {
                                field: field.name.clone(),
                            },
                        ),
                        _ => {}
                    }
                }
                // Lenient mode only keeps undeclared fields the encoder can
                // write back verbatim.
                for (name, child) in fields {
                    if descriptor.fields().iter().any(|f| &f.name == name) {
                        continue;
                    }
                    if self.mode == ValidationMode::Strict || !child.is_undeclared() {
                        self.report.push(
                            &path.field(name),
                            ViolationReason::UndeclaredField {
                                field: name.clone(),
                            },
                        );
                    }
                }
            }
            (
                Shape::List {
                    child,
                    min_count,
                    max_count,
                },
                BlockValue::List(items),
            ) => {
                self.count(path, items.len(), *min_count, *max_count);
                for (i, item) in items.iter().enumerate() {
                    self.nested(&path.index(i), item, child);
                }
            }
            (shape, value) => self.report.push(
                path,
                ViolationReason::ShapeMismatch {
                    expected: shape.category(),
                    found: value.shape_name(),
                },
            ),
        }
    }

    fn choice(&mut self, path: &BlockPath, value: &Primitive, descriptor: &KindDescriptor) {
        let tokens = descriptor.tokens();
        let valid = value.as_str().is_some_and(|token| tokens.contains(&token));
        if !valid {
            let token = match value.as_str() {
                Some(s) => s.to_string(),
                None => value.to_json().to_string(),
            };
            self.report.push(
                path,
                ViolationReason::InvalidChoice {
                    token,
                    allowed: tokens.iter().map(|t| (*t).to_string()).collect(),
                },
            );
        }
    }

    fn scalar(&mut self, path: &BlockPath, value: &Primitive, shape: &Shape) {
        let Shape::Scalar {
            primitive,
            max_length,
            min_value,
            max_value,
            pattern,
        } = shape
        else {
            return;
        };
        let (primitive, max_length, min_value, max_value) =
            (*primitive, *max_length, *min_value, *max_value);
        let mismatch = ViolationReason::TypeMismatch {
            expected: primitive,
            found: value.type_name(),
        };
        let reason = match primitive {
            PrimitiveType::Integer => match value.as_i64() {
                Some(n)
                    if min_value.is_some_and(|min| n < min)
                        || max_value.is_some_and(|max| n > max) =>
                {
                    Some(ViolationReason::OutOfRange {
                        value: n,
                        min: min_value,
                        max: max_value,
                    })
                }
                Some(_) => None,
                None => Some(mismatch),
            },
            PrimitiveType::Boolean => value.as_bool().is_none().then_some(mismatch),
            PrimitiveType::Text | PrimitiveType::RichText => match value.as_str() {
                Some(s) => {
                    let length = s.chars().count();
                    match max_length {
                        Some(max) if length > max => {
                            Some(ViolationReason::TooLong { max, length })
                        }
                        _ if primitive == PrimitiveType::RichText && !is_clean_markup(s) => {
                            Some(ViolationReason::UnsafeMarkup)
                        }
                        _ => pattern
                            .as_deref()
                            .filter(|p| {
                                !self
                                    .registry
                                    .compiled_pattern(p)
                                    .is_some_and(|re| re.is_match(s))
                            })
                            .map(|p| ViolationReason::PatternMismatch {
                                pattern: p.to_string(),
                            }),
                    }
                }
                None => Some(mismatch),
            },
            PrimitiveType::Url => match value.as_str() {
                Some(s) if is_valid_url(s) => None,
                Some(s) => Some(ViolationReason::InvalidUrl {
                    value: s.to_string(),
                }),
                None => Some(mismatch),
            },
            PrimitiveType::Email => match value.as_str() {
                Some(s) if is_valid_email(s) => None,
                Some(s) => Some(ViolationReason::InvalidEmail {
                    value: s.to_string(),
                }),
                None => Some(mismatch),
            },
            PrimitiveType::MediaRef => match value.as_str() {
                Some(s) if !s.trim().is_empty() => None,
                _ => Some(mismatch),
            },
        };
        if let Some(reason) = reason {
            self.report.push(path, reason);
        }
    }
}

/// A field value that counts as not filled in.
fn is_blank(block: &BlockInstance) -> bool {
    block.as_primitive().is_some_and(Primitive::is_blank)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use ramo_sdk::schema::FieldDescriptor;

    fn registry() -> BlockRegistry {
        let registry = BlockRegistry::new();
        registry
            .register_all([
                KindDescriptor::scalar("text", PrimitiveType::Text).max_length(10),
                KindDescriptor::scalar("rich_text", PrimitiveType::RichText),
                KindDescriptor::scalar("count", PrimitiveType::Integer).range(Some(1), Some(12)),
                KindDescriptor::scalar("url", PrimitiveType::Url),
                KindDescriptor::scalar("email", PrimitiveType::Email),
                KindDescriptor::choice("alignment", &[("left", "Left"), ("center", "Center")]),
                KindDescriptor::structure("card")
                    .field(FieldDescriptor::new("title", "text"))
                    .field(FieldDescriptor::new("link", "url").optional()),
                KindDescriptor::list("cards", "card").count(1, Some(3)),
            ])
            .unwrap();
        registry
    }

    fn card(title: &str) -> BlockInstance {
        BlockInstance::structure("card", [("title", BlockInstance::primitive("text", title))])
    }

    fn reasons(result: Result<(), ValidationReport>) -> Vec<ViolationReason> {
        result
            .unwrap_err()
            .iter()
            .map(|v| v.reason.clone())
            .collect()
    }

    #[test]
    fn mode_parses() {
        assert_eq!("strict".parse::<ValidationMode>().unwrap(), ValidationMode::Strict);
        assert_eq!(" Lenient ".parse::<ValidationMode>().unwrap(), ValidationMode::Lenient);
        assert!("loose".parse::<ValidationMode>().is_err());
    }

    #[test]
    fn valid_document_passes() {
        let doc = Document::new()
            .with(BlockInstance::primitive("text", "Hello"))
            .with(BlockInstance::list("cards", vec![card("One")]));
        assert!(validate(&doc, &registry(), ValidationMode::Strict).is_ok());
    }

    #[test]
    fn collects_every_violation_in_order() {
        let doc = Document::new()
            .with(BlockInstance::primitive("text", "far too long for this"))
            .with(BlockInstance::primitive("alignment", "right"))
            .with(BlockInstance::primitive("count", 40_i64));
        let report = validate(&doc, &registry(), ValidationMode::Strict).unwrap_err();
        assert_eq!(report.len(), 3);
        let paths: Vec<String> = report.iter().map(|v| v.path.to_string()).collect();
        assert_eq!(paths, ["$[0]", "$[1]", "$[2]"]);
        assert!(matches!(
            report.violations()[0].reason,
            ViolationReason::TooLong { max: 10, length: 21 }
        ));
    }

    #[test]
    fn missing_and_blank_required_fields() {
        let missing = BlockInstance::structure("card", Vec::<(String, BlockInstance)>::new());
        let blank = card("   ");
        let doc = Document::from_blocks(vec![missing, blank]);
        let report = validate(&doc, &registry(), ValidationMode::Strict).unwrap_err();
        assert_eq!(report.len(), 2);
        assert_eq!(report.violations()[1].path.to_string(), "$[1]");
        assert_eq!(
            report.violations()[1].reason,
            ViolationReason::MissingField {
                field: "title".into()
            }
        );
    }

    #[test]
    fn optional_fields_are_checked_when_present() {
        let doc = Document::new().with(BlockInstance::structure(
            "card",
            [
                ("title", BlockInstance::primitive("text", "Hi")),
                ("link", BlockInstance::primitive("url", "not a url")),
            ],
        ));
        let report = validate(&doc, &registry(), ValidationMode::Strict).unwrap_err();
        assert_eq!(report.violations()[0].path.to_string(), "$[0].link");
    }

    #[test]
    fn list_cardinality() {
        let registry = registry();
        for (n, ok) in [(0, false), (1, true), (3, true), (4, false)] {
            let items = (0..n).map(|i| card(&format!("c{i}"))).collect();
            let doc = Document::new().with(BlockInstance::list("cards", items));
            assert_eq!(
                validate(&doc, &registry, ValidationMode::Strict).is_ok(),
                ok,
                "{n} cards"
            );
        }
    }

    #[test]
    fn nested_kind_mismatch() {
        let doc = Document::new().with(BlockInstance::list(
            "cards",
            vec![BlockInstance::primitive("text", "not a card")],
        ));
        let reasons = reasons(validate(&doc, &registry(), ValidationMode::Strict));
        assert_eq!(
            reasons,
            [ViolationReason::KindMismatch {
                expected: "card".into(),
                found: "text".into()
            }]
        );
    }

    #[test]
    fn unknown_kinds_and_undeclared_fields_depend_on_mode() {
        let registry = registry();
        let doc = Document::new()
            .with(BlockInstance::opaque(
                "future_block",
                serde_json::json!({"x": 1}),
            ))
            .with(BlockInstance::structure(
                "card",
                [
                    ("title", BlockInstance::primitive("text", "Hi")),
                    ("subtitle", BlockInstance::undeclared("extra".into())),
                ],
            ));

        let reasons = reasons(validate(&doc, &registry, ValidationMode::Strict));
        assert_eq!(
            reasons,
            [
                ViolationReason::UnknownKind {
                    kind: "future_block".into()
                },
                ViolationReason::UndeclaredField {
                    field: "subtitle".into()
                },
            ]
        );
        assert!(validate(&doc, &registry, ValidationMode::Lenient).is_ok());
    }

    #[test]
    fn lenient_mode_rejects_typed_undeclared_fields() {
        let doc = Document::new().with(BlockInstance::structure(
            "card",
            [
                ("title", BlockInstance::primitive("text", "Hi")),
                ("subtitle", BlockInstance::primitive("text", "new")),
            ],
        ));
        let reasons = reasons(validate(&doc, &registry(), ValidationMode::Lenient));
        assert_eq!(
            reasons,
            [ViolationReason::UndeclaredField {
                field: "subtitle".into()
            }]
        );
    }

    #[test]
    fn scalar_types() {
        let registry = registry();
        let bad = Document::new()
            .with(BlockInstance::primitive("count", "three"))
            .with(BlockInstance::primitive("email", "nobody"))
            .with(BlockInstance::primitive("rich_text", "<p onclick=\"x()\">hi</p>"))
            .with(BlockInstance::primitive("alignment", true));
        let reasons = reasons(validate(&bad, &registry, ValidationMode::Lenient));
        assert!(matches!(reasons[0], ViolationReason::TypeMismatch { .. }));
        assert!(matches!(reasons[1], ViolationReason::InvalidEmail { .. }));
        assert_eq!(reasons[2], ViolationReason::UnsafeMarkup);
        assert!(matches!(reasons[3], ViolationReason::InvalidChoice { ref token, .. } if token == "true"));
    }

    #[test]
    fn text_pattern_must_match_whole_value() {
        let registry = registry();
        registry
            .register(KindDescriptor::scalar("hex", PrimitiveType::Text).pattern("#[0-9a-f]{6}"))
            .unwrap();
        let ok = Document::new().with(BlockInstance::primitive("hex", "#a0b1c2"));
        assert!(validate(&ok, &registry, ValidationMode::Strict).is_ok());

        let bad = Document::new().with(BlockInstance::primitive("hex", "color: #a0b1c2;"));
        assert_eq!(
            reasons(validate(&bad, &registry, ValidationMode::Strict)),
            [ViolationReason::PatternMismatch {
                pattern: "#[0-9a-f]{6}".into()
            }]
        );
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let doc = Document::new().with(BlockInstance::primitive("cards", "oops"));
        let reasons = reasons(validate(&doc, &registry(), ValidationMode::Lenient));
        assert_eq!(
            reasons,
            [ViolationReason::ShapeMismatch {
                expected: Category::List,
                found: "primitive"
            }]
        );
    }

    #[test]
    fn page_type_rules() {
        let registry = registry();
        let page_type = PageTypeSchema::new("landing", "Landing")
            .allow("cards")
            .blocks(1, Some(2));

        let empty = Document::new();
        let reasons_empty = reasons(validate_for_page_type(
            &empty,
            &registry,
            &page_type,
            ValidationMode::Strict,
        ));
        assert_eq!(reasons_empty, [ViolationReason::TooFew { min: 1, found: 0 }]);

        let doc = Document::new().with(BlockInstance::primitive("text", "Hi"));
        let report =
            validate_for_page_type(&doc, &registry, &page_type, ValidationMode::Lenient)
                .unwrap_err();
        assert_eq!(
            report.violations()[0].reason,
            ViolationReason::KindNotAllowed {
                kind: "text".into(),
                page_type: "landing".into()
            }
        );
    }

    #[test]
    fn report_display_lists_paths() {
        let doc = Document::new().with(BlockInstance::list("cards", vec![card("")]));
        let report = validate(&doc, &registry(), ValidationMode::Strict).unwrap_err();
        assert_eq!(
            report.to_string(),
            "$[0][0]: required field 'title' is missing"
        );
    }
}
