//! Operation descriptors and OpenAPI 3.0 document assembly.
//!
//! ```
//! use rescast::{Operation, Parameter, ResponseBody, Resource, Schema, Selection, TypeTag};
//!
//! let product = Resource::builder("Product")
//!     .add("id", TypeTag::Integer)
//!     .add("name", TypeTag::Text)
//!     .build()
//!     .unwrap();
//! let draft = product.partial(&Selection::fields(["name"])).unwrap();
//!
//! let schema = Schema::new()
//!     .operation(
//!         Operation::get("/products")
//!             .param(Parameter::new("page", TypeTag::Integer).optional().default_value(1))
//!             .returns(ResponseBody::many(&product)),
//!     )
//!     .operation(Operation::post("/products").body(&draft).returns(&product));
//!
//! let doc = schema.to_openapi().unwrap();
//! assert_eq!(doc["openapi"], "3.0.0");
//! assert_eq!(doc["paths"]["/products"]["get"]["parameters"][0]["in"], "query");
//! ```

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, trace};

use crate::error::SchemaError;
use crate::field::Field;
use crate::json_schema::{Emitter, SchemaOptions};
use crate::resource::Resource;
use crate::types::{Method, TypeTag};

/// OpenAPI version emitted by [`Schema::to_openapi`].
pub const OPENAPI_VERSION: &str = "3.0.0";

/// Status key used by [`Operation::returns`].
pub const DEFAULT_STATUS: &str = "2XX";

const JSON_CONTENT: &str = "application/json";

/// Document `info` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Info {
    pub title: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Default for Info {
    fn default() -> Self {
        Self {
            title: "api".to_string(),
            version: "1.0.0".to_string(),
            description: None,
        }
    }
}

impl Info {
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            version: version.into(),
            description: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A query or path parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    field: Field,
    required: bool,
    default: Option<Value>,
}

impl Parameter {
    /// Required parameter of type `ty`. A trailing `?` on the name makes it
    /// optional, as it does for fields.
    pub fn new(name: impl AsRef<str>, ty: TypeTag) -> Self {
        let field = Field::new(name, ty);
        Self {
            name: field.name().to_string(),
            required: !field.is_optional(),
            field,
            default: None,
        }
    }

    pub fn optional(self) -> Self {
        self.required(false)
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Default value, emitted inside the parameter's schema.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    fn to_openapi(&self, emitter: &mut Emitter) -> Result<Value, SchemaError> {
        let mut schema = emitter.field(&self.field)?;
        if let (Some(default), Value::Object(map)) = (&self.default, &mut schema) {
            map.insert("default".to_string(), default.clone());
        }
        Ok(json!({
            "name": self.name,
            "in": "query",
            "required": self.required,
            "schema": schema,
        }))
    }
}

/// Response payload: one resource or an array of it.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    One(Resource),
    Many(Resource),
}

impl ResponseBody {
    pub fn one(resource: &Resource) -> Self {
        ResponseBody::One(resource.clone())
    }

    pub fn many(resource: &Resource) -> Self {
        ResponseBody::Many(resource.clone())
    }

    pub fn resource(&self) -> &Resource {
        match self {
            ResponseBody::One(resource) | ResponseBody::Many(resource) => resource,
        }
    }

    fn to_schema(&self, emitter: &mut Emitter) -> Result<Value, SchemaError> {
        match self {
            ResponseBody::One(resource) => emitter.root(resource),
            ResponseBody::Many(resource) => {
                Ok(json!({ "type": "array", "items": emitter.root(resource)? }))
            }
        }
    }
}

impl From<&Resource> for ResponseBody {
    fn from(resource: &Resource) -> Self {
        ResponseBody::One(resource.clone())
    }
}

impl From<Resource> for ResponseBody {
    fn from(resource: Resource) -> Self {
        ResponseBody::One(resource)
    }
}

/// One declared API action.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    path: String,
    method: Method,
    action: Option<String>,
    parameters: Vec<Parameter>,
    body: Option<Resource>,
    responses: IndexMap<String, Option<ResponseBody>>,
}

impl Operation {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            action: None,
            parameters: Vec::new(),
            body: None,
            responses: IndexMap::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Name of the handler action, emitted as `operationId`.
    pub fn action(mut self, name: impl Into<String>) -> Self {
        self.action = Some(name.into());
        self
    }

    pub fn param(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn body(mut self, resource: &Resource) -> Self {
        self.body = Some(resource.clone());
        self
    }

    pub fn response(mut self, status: impl fmt::Display, body: impl Into<ResponseBody>) -> Self {
        self.responses.insert(status.to_string(), Some(body.into()));
        self
    }

    /// Declare a status with no payload. It is left out of the document.
    pub fn no_content(mut self, status: impl fmt::Display) -> Self {
        self.responses.insert(status.to_string(), None);
        self
    }

    /// Shorthand for a `2XX` response.
    pub fn returns(self, body: impl Into<ResponseBody>) -> Self {
        self.response(DEFAULT_STATUS, body)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn action_name(&self) -> Option<&str> {
        self.action.as_deref()
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn request_body(&self) -> Option<&Resource> {
        self.body.as_ref()
    }

    pub fn responses(&self) -> impl Iterator<Item = (&str, Option<&ResponseBody>)> {
        self.responses
            .iter()
            .map(|(status, body)| (status.as_str(), body.as_ref()))
    }

    /// Names of `{placeholder}` segments in the path template, in order.
    pub fn path_placeholders(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut rest = self.path.as_str();
        while let Some(start) = rest.find('{') {
            let after = &rest[start + 1..];
            match after.find('}') {
                Some(end) => {
                    names.push(&after[..end]);
                    rest = &after[end + 1..];
                }
                None => break,
            }
        }
        names
    }
}

/// Everything emitted for one (path, method) pair.
#[derive(Default)]
struct PathOperation {
    operation_id: Option<String>,
    parameters: Vec<Value>,
    seen: Vec<(String, &'static str)>,
    request_body: Option<Value>,
    responses: Map<String, Value>,
}

impl PathOperation {
    fn push_parameter(&mut self, name: &str, location: &'static str, parameter: Value) {
        if self.seen.iter().any(|(n, l)| n == name && *l == location) {
            return;
        }
        self.seen.push((name.to_string(), location));
        self.parameters.push(parameter);
    }

    fn into_json(self) -> Value {
        let mut map = Map::new();
        if let Some(id) = self.operation_id {
            map.insert("operationId".to_string(), Value::String(id));
        }
        map.insert("parameters".to_string(), Value::Array(self.parameters));
        if let Some(body) = self.request_body {
            map.insert("requestBody".to_string(), body);
        }
        map.insert("responses".to_string(), Value::Object(self.responses));
        Value::Object(map)
    }
}

/// The list of operations making up an API surface.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    info: Info,
    use_refs: bool,
    operations: Vec<Operation>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_info(mut self, info: Info) -> Self {
        self.info = info;
        self
    }

    /// Emit every nested resource as a `components/schemas` reference.
    pub fn use_refs(mut self, use_refs: bool) -> Self {
        self.use_refs = use_refs;
        self
    }

    pub fn info(&self) -> &Info {
        &self.info
    }

    pub fn add_operation(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    pub fn operation(mut self, operation: Operation) -> Self {
        self.add_operation(operation);
        self
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// The first operation declared for a handler action.
    pub fn operation_for(&self, action: &str) -> Option<&Operation> {
        self.operations
            .iter()
            .find(|op| op.action_name() == Some(action))
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Assemble the OpenAPI 3.0 document.
    ///
    /// Operations sharing a path and method are merged: parameters are
    /// concatenated without duplicates, later bodies and responses win.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::UnresolvedReference` if any resource in the
    /// document refers to a forward link that was never defined.
    pub fn to_openapi(&self) -> Result<Value, SchemaError> {
        let options = SchemaOptions::new().openapi(true).use_ref(self.use_refs);
        let mut emitter = Emitter::new(options);
        let mut paths: IndexMap<&str, IndexMap<Method, PathOperation>> = IndexMap::new();

        for operation in &self.operations {
            trace!(method = %operation.method(), path = operation.path(), "adding operation");
            let entry = paths
                .entry(operation.path())
                .or_default()
                .entry(operation.method())
                .or_default();

            if let Some(action) = operation.action_name() {
                entry.operation_id = Some(action.to_string());
            }

            for parameter in operation.parameters() {
                let rendered = parameter.to_openapi(&mut emitter)?;
                entry.push_parameter(parameter.name(), "query", rendered);
            }
            for name in operation.path_placeholders() {
                entry.push_parameter(
                    name,
                    "path",
                    json!({
                        "name": name,
                        "in": "path",
                        "required": true,
                        "schema": { "type": "string" },
                    }),
                );
            }

            if let Some(body) = operation.request_body() {
                entry.request_body = Some(json!({
                    "content": { JSON_CONTENT: { "schema": emitter.root(body)? } },
                    "required": true,
                }));
            }

            for (status, body) in operation.responses() {
                let Some(body) = body else { continue };
                entry.responses.insert(
                    status.to_string(),
                    json!({
                        "description": "",
                        "content": { JSON_CONTENT: { "schema": body.to_schema(&mut emitter)? } },
                    }),
                );
            }
        }

        let paths: Map<String, Value> = paths
            .into_iter()
            .map(|(path, methods)| {
                let item = methods
                    .into_iter()
                    .map(|(method, op)| (method.as_str().to_string(), op.into_json()))
                    .collect::<Map<String, Value>>();
                (path.to_string(), Value::Object(item))
            })
            .collect();

        let mut document = Map::new();
        document.insert("openapi".to_string(), json!(OPENAPI_VERSION));
        document.insert("info".to_string(), json!(self.info));
        document.insert("paths".to_string(), Value::Object(paths));

        let components = emitter.definitions()?;
        debug!(
            operations = self.operations.len(),
            components = components.len(),
            "assembled OpenAPI document"
        );
        if !components.is_empty() {
            document.insert(
                "components".to_string(),
                json!({ "schemas": Value::Object(components) }),
            );
        }
        Ok(Value::Object(document))
    }
}
