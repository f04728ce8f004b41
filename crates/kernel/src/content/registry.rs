//! Block kind registry.
//!
//! A registry is an explicit value, not process-wide state: each schema
//! (or test) builds its own, and a registry can be layered over a shared
//! base so that page-type specific kinds extend a common library without
//! touching it.

use std::collections::HashSet;
use std::ops::Deref;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use ramo_sdk::schema::{KindDescriptor, KindRef, PageTypeSchema, Shape};
use ramo_sdk::types::{BlockInstance, BlockPath, BlockValue, Primitive};
use regex::Regex;
use tracing::debug;

use super::ValidationMode;
use super::codec;
use crate::error::{CoreError, CoreResult};

/// Deepest schema nesting followed when instantiating defaults.
const MAX_INSTANTIATE_DEPTH: usize = 32;

/// Registry of block kinds and page type schemas.
///
/// Cloning is cheap and clones share state, like the kernel's other
/// registries.
#[derive(Clone, Default)]
pub struct BlockRegistry {
    inner: Arc<BlockRegistryInner>,
}

#[derive(Default)]
struct BlockRegistryInner {
    base: Option<BlockRegistry>,
    kinds: DashMap<String, Arc<KindDescriptor>>,
    page_types: DashMap<String, Arc<PageTypeSchema>>,
    /// Compiled scalar patterns, keyed by source.
    patterns: DashMap<String, Regex>,
}

/// A kind resolved from a [`KindRef`]: either borrowed from the inline
/// declaration or shared from the registry.
pub enum ResolvedKind<'a> {
    Inline(&'a KindDescriptor),
    Registered(Arc<KindDescriptor>),
}

impl Deref for ResolvedKind<'_> {
    type Target = KindDescriptor;

    fn deref(&self) -> &KindDescriptor {
        match self {
            Self::Inline(d) => d,
            Self::Registered(d) => d,
        }
    }
}

impl BlockRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry that reads through to `base`.
    ///
    /// Registrations land in the new layer only; `base` is never modified
    /// through it.
    pub fn layered(base: &BlockRegistry) -> Self {
        Self {
            inner: Arc::new(BlockRegistryInner {
                base: Some(base.clone()),
                ..Default::default()
            }),
        }
    }

    /// Register a kind.
    ///
    /// Fails with `DuplicateKind` if the tag is taken in this layer or any
    /// base, and with `Schema` if the descriptor is unusable.
    pub fn register(&self, descriptor: KindDescriptor) -> CoreResult<()> {
        check_descriptor(&descriptor)?;

        let kind = descriptor.kind.clone();
        if self
            .inner
            .base
            .as_ref()
            .is_some_and(|base| base.contains(&kind))
        {
            return Err(CoreError::DuplicateKind { kind });
        }

        match self.inner.kinds.entry(kind.clone()) {
            Entry::Occupied(_) => Err(CoreError::DuplicateKind { kind }),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(descriptor));
                debug!(kind = %kind, "block kind registered");
                Ok(())
            }
        }
    }

    /// Register several kinds, stopping at the first failure.
    pub fn register_all(
        &self,
        descriptors: impl IntoIterator<Item = KindDescriptor>,
    ) -> CoreResult<()> {
        for descriptor in descriptors {
            self.register(descriptor)?;
        }
        Ok(())
    }

    /// Look up a kind, failing with `UnknownKind`.
    pub fn lookup(&self, kind: &str) -> CoreResult<Arc<KindDescriptor>> {
        self.get(kind).ok_or_else(|| CoreError::unknown_kind(kind))
    }

    /// Look up a kind.
    pub fn get(&self, kind: &str) -> Option<Arc<KindDescriptor>> {
        if let Some(found) = self.inner.kinds.get(kind) {
            return Some(Arc::clone(found.value()));
        }
        self.inner.base.as_ref().and_then(|base| base.get(kind))
    }

    /// Check whether a kind is registered here or in a base layer.
    pub fn contains(&self, kind: &str) -> bool {
        self.inner.kinds.contains_key(kind)
            || self
                .inner
                .base
                .as_ref()
                .is_some_and(|base| base.contains(kind))
    }

    /// Resolve a field or list reference to its descriptor.
    pub fn resolve<'a>(&self, kind_ref: &'a KindRef) -> Option<ResolvedKind<'a>> {
        match kind_ref {
            KindRef::Inline(descriptor) => Some(ResolvedKind::Inline(descriptor)),
            KindRef::Named(tag) => self.get(tag).map(ResolvedKind::Registered),
        }
    }

    /// Number of kinds visible through this registry.
    pub fn len(&self) -> usize {
        self.kind_tags().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.kinds.is_empty()
            && self
                .inner
                .base
                .as_ref()
                .is_none_or(|base| base.is_empty())
    }

    /// All visible kind tags, sorted.
    pub fn kind_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .inner
            .base
            .as_ref()
            .map(|base| base.kind_tags())
            .unwrap_or_default();
        tags.extend(self.inner.kinds.iter().map(|r| r.key().clone()));
        tags.sort();
        tags.dedup();
        tags
    }

    /// Compiled full-match form of a scalar pattern.
    pub(crate) fn compiled_pattern(&self, pattern: &str) -> Option<Regex> {
        if let Some(found) = self.inner.patterns.get(pattern) {
            return Some(found.value().clone());
        }
        let regex = compile_pattern(pattern).ok()?;
        self.inner
            .patterns
            .insert(pattern.to_string(), regex.clone());
        Some(regex)
    }

    /// Register a page type schema.
    pub fn register_page_type(&self, schema: PageTypeSchema) -> CoreResult<()> {
        let tag = schema.type_tag.clone();
        if tag.is_empty() {
            return Err(CoreError::schema(tag, "page type tag must not be empty"));
        }
        if schema.max_blocks.is_some_and(|max| max < schema.min_blocks) {
            return Err(CoreError::schema(tag, "max_blocks is below min_blocks"));
        }
        if self.page_type(&tag).is_some() {
            return Err(CoreError::schema(tag, "page type is already registered"));
        }

        match self.inner.page_types.entry(tag.clone()) {
            Entry::Occupied(_) => Err(CoreError::schema(tag, "page type is already registered")),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(schema));
                debug!(page_type = %tag, "page type registered");
                Ok(())
            }
        }
    }

    /// Look up a page type schema.
    pub fn page_type(&self, type_tag: &str) -> Option<Arc<PageTypeSchema>> {
        if let Some(found) = self.inner.page_types.get(type_tag) {
            return Some(Arc::clone(found.value()));
        }
        self.inner
            .base
            .as_ref()
            .and_then(|base| base.page_type(type_tag))
    }

    /// Whether any page type is declared. When none is, page type tags are
    /// free-form labels.
    pub fn has_page_types(&self) -> bool {
        !self.inner.page_types.is_empty()
            || self
                .inner
                .base
                .as_ref()
                .is_some_and(|base| base.has_page_types())
    }

    /// Named references (field kinds, list children, page type kinds) that
    /// point at unregistered tags, sorted.
    ///
    /// References are resolved lazily, so a schema may be registered in any
    /// order; call this once setup is done.
    pub fn dangling_references(&self) -> Vec<String> {
        let mut missing = HashSet::new();
        for tag in self.kind_tags() {
            if let Some(descriptor) = self.get(&tag) {
                self.collect_dangling(&descriptor, &mut missing);
            }
        }
        for schema in self.page_types() {
            for kind in &schema.allowed_kinds {
                if !self.contains(kind) {
                    missing.insert(kind.clone());
                }
            }
        }
        let mut missing: Vec<String> = missing.into_iter().collect();
        missing.sort();
        missing
    }

    fn page_types(&self) -> Vec<Arc<PageTypeSchema>> {
        let mut all = self
            .inner
            .base
            .as_ref()
            .map(|base| base.page_types())
            .unwrap_or_default();
        all.extend(self.inner.page_types.iter().map(|r| Arc::clone(r.value())));
        all
    }

    fn collect_dangling(&self, descriptor: &KindDescriptor, missing: &mut HashSet<String>) {
        let mut visit = |kind_ref: &KindRef| match kind_ref {
            KindRef::Named(tag) if !self.contains(tag) => {
                missing.insert(tag.clone());
            }
            KindRef::Named(_) => {}
            KindRef::Inline(inline) => self.collect_dangling(inline, missing),
        };
        match &descriptor.shape {
            Shape::Struct { fields } => fields.iter().for_each(|f| visit(&f.kind)),
            Shape::List { child, .. } => visit(child),
            Shape::Scalar { .. } | Shape::Choice { .. } => {}
        }
    }

    /// Build a new instance of `kind` populated from declared defaults.
    ///
    /// Struct fields with a default (on the field or on its kind) are
    /// filled in, nested structs are instantiated, and lists get their
    /// minimum number of items. Scalars without a default are left out of
    /// structs and become `null` at the top level.
    pub fn instantiate(&self, kind: &str) -> CoreResult<BlockInstance> {
        let descriptor = self.lookup(kind)?;
        self.instantiate_descriptor(&descriptor, &BlockPath::root(), 0)
    }

    fn instantiate_descriptor(
        &self,
        descriptor: &KindDescriptor,
        path: &BlockPath,
        depth: usize,
    ) -> CoreResult<BlockInstance> {
        if depth > MAX_INSTANTIATE_DEPTH {
            return Err(CoreError::schema(
                &descriptor.kind,
                "schema nests too deeply to instantiate",
            ));
        }
        if let Some(default) = &descriptor.default {
            let value = codec::decode_value(default, descriptor, self, ValidationMode::Strict, path)?;
            return Ok(BlockInstance::new(&descriptor.kind, value));
        }

        let value = match &descriptor.shape {
            Shape::Scalar { .. } | Shape::Choice { .. } => BlockValue::Primitive(Primitive::Null),
            Shape::Struct { fields } => {
                let mut values = std::collections::BTreeMap::new();
                for field in fields {
                    let field_path = path.field(&field.name);
                    let resolved = self
                        .resolve(&field.kind)
                        .ok_or_else(|| CoreError::unknown_kind(field.kind.tag()))?;
                    let instance = if let Some(default) = &field.default {
                        let value = codec::decode_value(
                            default,
                            &resolved,
                            self,
                            ValidationMode::Strict,
                            &field_path,
                        )?;
                        Some(BlockInstance::new(&resolved.kind, value))
                    } else if resolved.default.is_some()
                        || matches!(resolved.shape, Shape::Struct { .. } | Shape::List { .. })
                    {
                        Some(self.instantiate_descriptor(&resolved, &field_path, depth + 1)?)
                    } else {
                        None
                    };
                    if let Some(instance) = instance {
                        values.insert(field.name.clone(), instance);
                    }
                }
                BlockValue::Struct(values)
            }
            Shape::List {
                child, min_count, ..
            } => {
                let resolved = self
                    .resolve(child)
                    .ok_or_else(|| CoreError::unknown_kind(child.tag()))?;
                let items = (0..*min_count)
                    .map(|i| self.instantiate_descriptor(&resolved, &path.index(i), depth + 1))
                    .collect::<CoreResult<Vec<_>>>()?;
                BlockValue::List(items)
            }
        };
        Ok(BlockInstance::new(&descriptor.kind, value))
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{pattern})$"))
}

/// Reject descriptors that could never validate anything.
fn check_descriptor(descriptor: &KindDescriptor) -> CoreResult<()> {
    let kind = &descriptor.kind;
    if kind.trim().is_empty() {
        return Err(CoreError::schema(kind, "kind tag must not be empty"));
    }

    match &descriptor.shape {
        Shape::Scalar {
            min_value,
            max_value,
            pattern,
            ..
        } => {
            if let (Some(min), Some(max)) = (min_value, max_value)
                && min > max
            {
                return Err(CoreError::schema(kind, "min_value is above max_value"));
            }
            if let Some(pattern) = pattern
                && let Err(e) = compile_pattern(pattern)
            {
                return Err(CoreError::schema(kind, format!("invalid pattern: {e}")));
            }
        }
        Shape::Struct { fields } => {
            let mut seen = HashSet::new();
            for field in fields {
                if field.name.is_empty() {
                    return Err(CoreError::schema(kind, "field name must not be empty"));
                }
                if !seen.insert(field.name.as_str()) {
                    return Err(CoreError::schema(
                        kind,
                        format!("field '{}' is declared twice", field.name),
                    ));
                }
                if let KindRef::Inline(inline) = &field.kind {
                    check_descriptor(inline)?;
                }
            }
        }
        Shape::List {
            child,
            min_count,
            max_count,
        } => {
            if max_count.is_some_and(|max| max < *min_count) {
                return Err(CoreError::schema(kind, "max_count is below min_count"));
            }
            if let KindRef::Inline(inline) = child {
                check_descriptor(inline)?;
            }
        }
        Shape::Choice { options } => {
            if options.is_empty() {
                return Err(CoreError::schema(kind, "choice declares no tokens"));
            }
            let mut seen = HashSet::new();
            if let Some(dup) = options.iter().find(|o| !seen.insert(o.token.as_str())) {
                return Err(CoreError::schema(
                    kind,
                    format!("token '{}' is declared twice", dup.token),
                ));
            }
        }
    }
    Ok(())
}
