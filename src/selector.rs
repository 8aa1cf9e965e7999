//! Selection specs and their resolution against a resource.
//!
//! A selection is an ordered list of items: the wildcard `*` (every non-optional
//! field), bare field names, and at most one trailing mapping from field name to a
//! nested selection for resource-typed fields.
//!
//! ```
//! use rescast::Selection;
//! use serde_json::json;
//!
//! let spec = Selection::from_json(&json!(["id", { "items": ["sku"] }])).unwrap();
//! assert_eq!(spec, Selection::fields(["id"]).nest("items", Selection::fields(["sku"])));
//! ```

use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};

use serde_json::Value;

use crate::error::SelectError;
use crate::field::Field;
use crate::resource::Resource;
use crate::types::json_type_name;

/// Marker for "every non-optional field".
pub const WILDCARD: &str = "*";

/// One item of a selection spec.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SelectItem {
    Wildcard,
    Name(String),
    /// Field name to nested selection. Only valid as the last item.
    Nested(Vec<(String, Selection)>),
}

/// Ordered selection spec.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selection {
    items: Vec<SelectItem>,
}

impl Default for Selection {
    fn default() -> Self {
        Self::wildcard()
    }
}

impl Selection {
    pub fn new(items: Vec<SelectItem>) -> Self {
        Self { items }
    }

    pub fn wildcard() -> Self {
        Self::new(vec![SelectItem::Wildcard])
    }

    /// Selection of bare field names.
    pub fn fields<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            names
                .into_iter()
                .map(|name| SelectItem::Name(name.into()))
                .collect(),
        )
    }

    /// Append a bare field name, ahead of any trailing mapping.
    pub fn with(mut self, name: impl Into<String>) -> Self {
        let item = SelectItem::Name(name.into());
        match self.items.last() {
            Some(SelectItem::Nested(_)) => {
                let at = self.items.len() - 1;
                self.items.insert(at, item);
            }
            _ => self.items.push(item),
        }
        self
    }

    /// Add a nested selection for `name` to the trailing mapping.
    pub fn nest(mut self, name: impl Into<String>, nested: Selection) -> Self {
        let name = name.into();
        if let Some(SelectItem::Nested(entries)) = self.items.last_mut() {
            entries.retain(|(key, _)| *key != name);
            entries.push((name, nested));
        } else {
            self.items.push(SelectItem::Nested(vec![(name, nested)]));
        }
        self
    }

    pub fn items(&self) -> &[SelectItem] {
        &self.items
    }

    /// True when the spec is exactly `["*"]`.
    pub fn is_wildcard(&self) -> bool {
        matches!(self.items.as_slice(), [SelectItem::Wildcard])
    }

    /// Parse a JSON spec such as `["*", {"items": ["sku"]}]`.
    ///
    /// A bare string is accepted as a one-item list.
    pub fn from_json(value: &Value) -> Result<Self, SelectError> {
        let items = match value {
            Value::Array(items) => items.as_slice(),
            Value::String(_) | Value::Object(_) => std::slice::from_ref(value),
            other => {
                return Err(SelectError::InvalidSpec {
                    message: format!("expected array, got {}", json_type_name(other)),
                })
            }
        };

        let mut parsed = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            match item {
                Value::String(s) if s == WILDCARD => parsed.push(SelectItem::Wildcard),
                Value::String(s) => parsed.push(SelectItem::Name(s.clone())),
                Value::Object(map) => {
                    if index + 1 != items.len() {
                        return Err(SelectError::MisplacedMapping { index });
                    }
                    let entries = map
                        .iter()
                        .map(|(key, nested)| Ok((key.clone(), Selection::from_json(nested)?)))
                        .collect::<Result<Vec<_>, SelectError>>()?;
                    parsed.push(SelectItem::Nested(entries));
                }
                other => {
                    return Err(SelectError::InvalidSpec {
                        message: format!(
                            "selection item {} must be a string or object, got {}",
                            index,
                            json_type_name(other)
                        ),
                    })
                }
            }
        }
        Ok(Self::new(parsed))
    }

    /// Resolve the spec against `resource`.
    ///
    /// Every named field must exist. Nested selections are validated eagerly
    /// against the referenced resource.
    ///
    /// # Errors
    ///
    /// Returns `SelectError::UnknownField` for names absent from the resource,
    /// `SelectError::MisplacedMapping` when a mapping is not the last item, and
    /// `SelectError::NotNestable` for nested selections on non-resource fields.
    pub fn resolve(&self, resource: &Resource) -> Result<ResolvedSelection, SelectError> {
        let mut names = BTreeSet::new();
        let mut nested = HashMap::new();

        for (index, item) in self.items.iter().enumerate() {
            match item {
                SelectItem::Wildcard => {
                    names.extend(
                        resource
                            .fields()
                            .filter(|field| !field.is_optional())
                            .map(|field| field.name().to_string()),
                    );
                }
                SelectItem::Name(name) => {
                    lookup(resource, name)?;
                    names.insert(name.clone());
                }
                SelectItem::Nested(entries) => {
                    if index + 1 != self.items.len() {
                        return Err(SelectError::MisplacedMapping { index });
                    }
                    for (name, spec) in entries {
                        let field = lookup(resource, name)?;
                        let link = field.ty().link().ok_or_else(|| SelectError::NotNestable {
                            resource: resource.name().to_string(),
                            field: name.clone(),
                        })?;
                        let target =
                            link.get()
                                .ok_or_else(|| SelectError::UnresolvedReference {
                                    name: link.name().to_string(),
                                })?;
                        spec.resolve(target)?;
                        names.insert(name.clone());
                        nested.insert(name.clone(), spec.clone());
                    }
                }
            }
        }

        Ok(ResolvedSelection { names, nested })
    }
}

fn lookup<'r>(resource: &'r Resource, name: &str) -> Result<&'r Field, SelectError> {
    resource
        .field(name)
        .ok_or_else(|| SelectError::UnknownField {
            resource: resource.name().to_string(),
            field: name.to_string(),
        })
}

/// A selection resolved against one resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSelection {
    names: BTreeSet<String>,
    nested: HashMap<String, Selection>,
}

impl ResolvedSelection {
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Selected field names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Nested selection for `name`; the wildcard when none was given.
    pub fn nested_for(&self, name: &str) -> Cow<'_, Selection> {
        match self.nested.get(name) {
            Some(spec) => Cow::Borrowed(spec),
            None => Cow::Owned(Selection::wildcard()),
        }
    }

    /// True when `name` carries an explicit nested selection.
    pub fn has_nested(&self, name: &str) -> bool {
        self.nested.contains_key(name)
    }
}
