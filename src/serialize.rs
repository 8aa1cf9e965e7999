//! Serialization of domain objects through resources.

use chrono::DateTime;
use serde_json::{Map, Value};
use tracing::trace;

use crate::data::{format_datetime, scalar_json, Context, Data, Record};
use crate::error::SerializeError;
use crate::resource::Resource;
use crate::selector::{ResolvedSelection, Selection};
use crate::types::{ResourceLink, TypeTag};

/// Reads one attribute from an object, if this lookup applies.
type Resolver = for<'a> fn(&'a Resource, &'a dyn Record, &str, &Context) -> Option<Data<'a>>;

/// Attribute lookups, tried in order.
const RESOLVERS: [Resolver; 3] = [resource_accessor, direct_accessor, predicate_accessor];

fn resource_accessor<'a>(
    resource: &'a Resource,
    object: &'a dyn Record,
    name: &str,
    context: &Context,
) -> Option<Data<'a>> {
    resource
        .accessor(name)
        .and_then(|accessor| accessor.read(object, context))
}

fn direct_accessor<'a>(
    _resource: &'a Resource,
    object: &'a dyn Record,
    name: &str,
    _context: &Context,
) -> Option<Data<'a>> {
    object.get(name)
}

fn predicate_accessor<'a>(
    _resource: &'a Resource,
    object: &'a dyn Record,
    name: &str,
    _context: &Context,
) -> Option<Data<'a>> {
    object.predicate(name).map(Data::Bool)
}

impl Resource {
    /// Serialize an object, or a list of objects, with every non-optional field.
    ///
    /// # Errors
    ///
    /// Returns `SerializeError::MissingAccessor` when an object exposes no value
    /// for a selected field.
    pub fn serialize(&self, data: Data<'_>, context: &Context) -> Result<Value, SerializeError> {
        self.serialize_with(data, context, &Selection::wildcard())
    }

    /// Serialize with an explicit selection.
    ///
    /// # Errors
    ///
    /// Returns `SerializeError::Select` if the selection does not resolve, and
    /// `SerializeError::MissingAccessor` when an object lacks a selected field.
    pub fn serialize_with(
        &self,
        data: Data<'_>,
        context: &Context,
        selection: &Selection,
    ) -> Result<Value, SerializeError> {
        let resolved = selection.resolve(self)?;
        self.serialize_resolved(data, context, &resolved)
    }

    /// Serialize a single object.
    pub fn serialize_record(
        &self,
        object: &dyn Record,
        context: &Context,
    ) -> Result<Value, SerializeError> {
        self.serialize(Data::Record(object), context)
    }

    /// Serialize a slice of objects into an array.
    pub fn serialize_records<R: Record>(
        &self,
        objects: &[R],
        context: &Context,
    ) -> Result<Value, SerializeError> {
        self.serialize(Data::records(objects), context)
    }

    pub(crate) fn serialize_resolved(
        &self,
        data: Data<'_>,
        context: &Context,
        resolved: &ResolvedSelection,
    ) -> Result<Value, SerializeError> {
        match data {
            Data::Record(object) => self.serialize_one(object, context, resolved),
            Data::List(items) => items
                .into_iter()
                .map(|item| self.serialize_resolved(item, context, resolved))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Data::Json(value) => self.serialize_resolved(Data::from_json(&value), context, resolved),
            other => Err(SerializeError::Mismatch {
                expected: format!("record for `{}`", self.name()),
                found: other.kind(),
            }),
        }
    }

    fn serialize_one(
        &self,
        object: &dyn Record,
        context: &Context,
        resolved: &ResolvedSelection,
    ) -> Result<Value, SerializeError> {
        trace!(resource = self.name(), "serializing object");
        let mut map = Map::new();

        for field in self.fields() {
            if !resolved.contains(field.name()) {
                continue;
            }
            let data = RESOLVERS
                .iter()
                .find_map(|resolve| resolve(self, object, field.name(), context))
                .ok_or_else(|| SerializeError::MissingAccessor {
                    resource: self.name().to_string(),
                    field: field.name().to_string(),
                    object: format!("{:?}", object),
                })?;

            let caster = Caster::new(field.ty(), context, &resolved.nested_for(field.name()))?;
            map.insert(field.name().to_string(), caster.cast(field.ty(), data)?);
        }

        Ok(Value::Object(map))
    }
}

/// Casts raw data for one field, carrying the nested resource target if any.
pub(crate) struct Caster<'c> {
    context: &'c Context,
    target: Option<(Resource, ResolvedSelection)>,
}

impl<'c> Caster<'c> {
    /// Resolve the nested selection once against the field's resource, if it has one.
    pub(crate) fn new(
        ty: &TypeTag,
        context: &'c Context,
        nested: &Selection,
    ) -> Result<Self, SerializeError> {
        let target = match ty.link() {
            Some(link) => {
                let resource = resolve_link(link)?;
                let resolved = nested.resolve(&resource)?;
                Some((resource, resolved))
            }
            None => None,
        };
        Ok(Self { context, target })
    }

    pub(crate) fn cast(&self, ty: &TypeTag, data: Data<'_>) -> Result<Value, SerializeError> {
        match (ty, data) {
            (_, Data::Null) => Ok(Value::Null),
            (_, Data::Json(value)) => self.cast(ty, Data::from_json(&value)),
            (TypeTag::ArrayOf(item), Data::List(items)) => items
                .into_iter()
                .map(|data| self.cast(item, data))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            (TypeTag::ArrayOf(_), other) => Err(SerializeError::Mismatch {
                expected: "list".to_string(),
                found: other.kind(),
            }),
            (TypeTag::ResourceRef(link), Data::Record(object)) => match &self.target {
                Some((resource, resolved)) => {
                    resource.serialize_one(object, self.context, resolved)
                }
                None => Err(SerializeError::UnresolvedReference {
                    name: link.name().to_string(),
                }),
            },
            (TypeTag::ResourceRef(link), other) => Err(SerializeError::Mismatch {
                expected: format!("record for `{}`", link.name()),
                found: other.kind(),
            }),
            (TypeTag::DateTime, Data::Text(text)) => Ok(Value::String(
                match DateTime::parse_from_rfc3339(&text) {
                    Ok(dt) => format_datetime(&dt),
                    Err(_) => text.into_owned(),
                },
            )),
            (_, other) => {
                let found = other.kind();
                scalar_json(other).ok_or_else(|| SerializeError::Mismatch {
                    expected: "scalar".to_string(),
                    found,
                })
            }
        }
    }
}

fn resolve_link(link: &ResourceLink) -> Result<Resource, SerializeError> {
    link.get()
        .cloned()
        .ok_or_else(|| SerializeError::UnresolvedReference {
            name: link.name().to_string(),
        })
}
