//! JSON Schema emission for fields and resources.
//!
//! | Type | Fragment |
//! |------|----------|
//! | `Integer` | `{"type": "integer"}` |
//! | `Number` | `{"type": "number"}` |
//! | `Text` | `{"type": "string"}` |
//! | `Date` | `{"type": "string", "format": "date"}` |
//! | `DateTime` | `{"type": "string", "format": "date-time"}` |
//! | `Boolean` | `{"type": "boolean"}` |
//! | `Enum` | scalar fragment of the first value plus `enum` |
//! | `ArrayOf(T)` | `{"type": "array", "items": T}` |
//! | `ResourceRef(R)` | `$ref` when `use_ref`, otherwise the object schema of `R` |
//!
//! Nullable fields get `"type": [T, "null"]`, or `"nullable": true` in OpenAPI mode.
//! A resource met again while it is being expanded is emitted as a `$ref`.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use crate::error::SchemaError;
use crate::field::Field;
use crate::resource::Resource;
use crate::types::TypeTag;

/// Draft used for standalone JSON Schema documents.
pub const JSON_SCHEMA_DRAFT: &str = "https://json-schema.org/draft/2020-12/schema";

const DEFS_PREFIX: &str = "#/$defs/";
const COMPONENTS_PREFIX: &str = "#/components/schemas/";

/// Options for schema emission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchemaOptions {
    /// Emit OpenAPI 3.0 flavored schemas (`nullable: true` instead of type unions).
    pub openapi: bool,
    /// Emit nested resources as `$ref` fragments instead of inlining them.
    pub use_ref: bool,
}

impl SchemaOptions {
    /// Plain JSON Schema, nested resources inlined.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set OpenAPI mode.
    pub fn openapi(mut self, openapi: bool) -> Self {
        self.openapi = openapi;
        self
    }

    /// Set reference mode for nested resources.
    pub fn use_ref(mut self, use_ref: bool) -> Self {
        self.use_ref = use_ref;
        self
    }
}

/// Resources emitted by reference, keyed by a unique name.
#[derive(Default)]
struct References {
    keys: IndexMap<String, Resource>,
    by_id: HashMap<usize, String>,
}

impl References {
    fn key_for(&mut self, resource: &Resource) -> String {
        if let Some(key) = self.by_id.get(&resource.id()) {
            return key.clone();
        }
        let mut key = resource.name().to_string();
        let mut n = 2;
        while self.keys.contains_key(&key) {
            key = format!("{}{}", resource.name(), n);
            n += 1;
        }
        self.keys.insert(key.clone(), resource.clone());
        self.by_id.insert(resource.id(), key.clone());
        key
    }
}

/// Schema emitter. Tracks the resources being expanded and those referenced.
pub(crate) struct Emitter {
    options: SchemaOptions,
    ref_prefix: &'static str,
    expanding: Vec<usize>,
    references: References,
}

impl Emitter {
    pub(crate) fn new(options: SchemaOptions) -> Self {
        let ref_prefix = if options.openapi {
            COMPONENTS_PREFIX
        } else {
            DEFS_PREFIX
        };
        Self {
            options,
            ref_prefix,
            expanding: Vec::new(),
            references: References::default(),
        }
    }

    fn with_ref_prefix(mut self, prefix: &'static str) -> Self {
        self.ref_prefix = prefix;
        self
    }

    pub(crate) fn field(&mut self, field: &Field) -> Result<Value, SchemaError> {
        let schema = self.type_tag(field.ty())?;
        if field.is_nullable() {
            Ok(self.nullable(schema))
        } else {
            Ok(Value::Object(schema))
        }
    }

    fn type_tag(&mut self, ty: &TypeTag) -> Result<Map<String, Value>, SchemaError> {
        let schema = match ty {
            TypeTag::Integer => json!({ "type": "integer" }),
            TypeTag::Number => json!({ "type": "number" }),
            TypeTag::Text => json!({ "type": "string" }),
            TypeTag::Date => json!({ "type": "string", "format": "date" }),
            TypeTag::DateTime => json!({ "type": "string", "format": "date-time" }),
            TypeTag::Boolean => json!({ "type": "boolean" }),
            TypeTag::Enum(values) => json!({
                "type": values.json_type(),
                "enum": values.values().iter().map(|v| v.to_json()).collect::<Vec<_>>(),
            }),
            TypeTag::ArrayOf(item) => {
                let items = self.type_tag(item)?;
                json!({ "type": "array", "items": items })
            }
            TypeTag::ResourceRef(link) => {
                let target = link
                    .get()
                    .ok_or_else(|| SchemaError::UnresolvedReference {
                        name: link.name().to_string(),
                    })?
                    .clone();
                if self.options.use_ref || self.expanding.contains(&target.id()) {
                    self.reference(&target)
                } else {
                    self.resource(&target)?
                }
            }
        };
        Ok(into_map(schema))
    }

    fn nullable(&self, mut schema: Map<String, Value>) -> Value {
        if let Some(Value::Array(values)) = schema.get_mut("enum") {
            if !values.contains(&Value::Null) {
                values.push(Value::Null);
            }
        }

        if schema.contains_key("$ref") {
            return if self.options.openapi {
                json!({ "allOf": [schema], "nullable": true })
            } else {
                json!({ "anyOf": [schema, { "type": "null" }] })
            };
        }

        if self.options.openapi {
            schema.insert("nullable".to_string(), Value::Bool(true));
        } else if let Some(ty) = schema.get_mut("type") {
            *ty = json!([ty.take(), "null"]);
        }
        Value::Object(schema)
    }

    /// Object schema for `resource`.
    pub(crate) fn resource(&mut self, resource: &Resource) -> Result<Value, SchemaError> {
        self.expanding.push(resource.id());
        let properties = resource
            .fields()
            .map(|field| Ok((field.name().to_string(), self.field(field)?)))
            .collect::<Result<Map<String, Value>, SchemaError>>();
        self.expanding.pop();

        Ok(json!({
            "title": resource.name(),
            "type": "object",
            "properties": properties?,
            "additionalProperties": false,
            "required": resource.required_names(),
        }))
    }

    /// Schema for a top-level use of `resource`, such as a request body.
    pub(crate) fn root(&mut self, resource: &Resource) -> Result<Value, SchemaError> {
        if self.options.use_ref {
            Ok(self.reference(resource))
        } else {
            self.resource(resource)
        }
    }

    fn reference(&mut self, resource: &Resource) -> Value {
        let key = self.references.key_for(resource);
        json!({ "$ref": format!("{}{}", self.ref_prefix, key) })
    }

    /// Object schemas for every referenced resource, including those referenced
    /// while emitting the definitions themselves.
    pub(crate) fn definitions(&mut self) -> Result<Map<String, Value>, SchemaError> {
        let mut definitions = Map::new();
        let mut index = 0;
        while let Some((key, resource)) = self
            .references
            .keys
            .get_index(index)
            .map(|(key, resource)| (key.clone(), resource.clone()))
        {
            definitions.insert(key, self.resource(&resource)?);
            index += 1;
        }
        Ok(definitions)
    }
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

impl Resource {
    /// JSON Schema object fragment for this resource.
    ///
    /// ```
    /// use rescast::{Resource, SchemaOptions, TypeTag};
    /// use serde_json::json;
    ///
    /// let tag = Resource::builder("Tag")
    ///     .add("label", TypeTag::Text)
    ///     .build()
    ///     .unwrap();
    ///
    /// let schema = tag.to_schema(&SchemaOptions::new()).unwrap();
    /// assert_eq!(schema, json!({
    ///     "title": "Tag",
    ///     "type": "object",
    ///     "properties": { "label": { "type": "string" } },
    ///     "additionalProperties": false,
    ///     "required": ["label"],
    /// }));
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::UnresolvedReference` if a field refers to a forward
    /// link that was never defined.
    pub fn to_schema(&self, options: &SchemaOptions) -> Result<Value, SchemaError> {
        Emitter::new(*options).resource(self)
    }

    /// Standalone JSON Schema document: the object schema plus `$defs` for every
    /// resource emitted by reference.
    pub fn to_json_schema_document(&self, options: &SchemaOptions) -> Result<Value, SchemaError> {
        let mut emitter = Emitter::new(*options).with_ref_prefix(DEFS_PREFIX);
        let root = emitter.resource(self)?;
        let definitions = emitter.definitions()?;

        let mut document = Map::new();
        document.insert("$schema".to_string(), json!(JSON_SCHEMA_DRAFT));
        document.extend(into_map(root));
        if !definitions.is_empty() {
            document.insert("$defs".to_string(), Value::Object(definitions));
        }
        Ok(Value::Object(document))
    }
}
