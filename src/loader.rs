//! Declaration documents: resources and operations described in JSON.
//!
//! ```json
//! {
//!   "info": { "title": "shop", "version": "1.0.0" },
//!   "resources": {
//!     "Product": {
//!       "fields": {
//!         "id": "integer",
//!         "name": "string",
//!         "tags": ["string"],
//!         "status": { "enum": ["draft", "published"] },
//!         "description": { "type": "string", "nullable": true },
//!         "image_url?": "string"
//!       }
//!     }
//!   },
//!   "operations": [
//!     { "path": "/products", "method": "get", "responses": { "200": ["Product"] } },
//!     {
//!       "path": "/products",
//!       "method": "post",
//!       "body": { "resource": "Product", "partial": ["name"] },
//!       "responses": { "200": "Product" }
//!     }
//!   ]
//! }
//! ```
//!
//! Documents are read from files, strings, and HTTP URLs.

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::LoadError;
use crate::field::Field;
use crate::openapi::{Info, Operation, Parameter, ResponseBody, Schema};
use crate::resource::{Resource, ResourceBuilder};
use crate::selector::Selection;
use crate::types::{EnumValues, Method, ResourceLink, TypeTag};

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Load a JSON value from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidJson` if the file isn't valid JSON.
pub fn load_json(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    load_json_str(&content)
}

/// Load a JSON value from a string.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` if the string isn't valid JSON.
pub fn load_json_str(content: &str) -> Result<Value, LoadError> {
    serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })
}

/// Load a JSON value from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails or the response
/// isn't valid JSON.
#[cfg(feature = "remote")]
pub fn load_json_url(url: &str) -> Result<Value, LoadError> {
    let network = |source| LoadError::NetworkError {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network)?;

    client
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.json())
        .map_err(network)
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load a JSON value from a file path or URL.
///
/// URL loading requires the `remote` feature.
pub fn load_json_auto(source: &str) -> Result<Value, LoadError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_json_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(LoadError::FileNotFound {
                path: std::path::PathBuf::from(source),
            })
        }
    } else {
        load_json(Path::new(source))
    }
}

/// Resources and operations built from a declaration document.
#[derive(Debug, Clone)]
pub struct Declarations {
    resources: IndexMap<String, Resource>,
    schema: Schema,
}

impl Declarations {
    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.get(name)
    }

    /// Resources in document order.
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn into_schema(self) -> Schema {
        self.schema
    }
}

/// Load declarations from a file path.
///
/// # Errors
///
/// Returns IO errors for unreadable files, `LoadError::InvalidJson` for
/// malformed JSON and declaration errors for invalid documents.
pub fn load_declarations(path: &Path) -> Result<Declarations, LoadError> {
    parse_declarations(&load_json(path)?)
}

/// Load declarations from a JSON string.
pub fn load_declarations_str(content: &str) -> Result<Declarations, LoadError> {
    parse_declarations(&load_json_str(content)?)
}

/// Load declarations from an HTTP/HTTPS URL.
#[cfg(feature = "remote")]
pub fn load_declarations_url(url: &str) -> Result<Declarations, LoadError> {
    parse_declarations(&load_json_url(url)?)
}

/// Load declarations from a file path or URL.
pub fn load_declarations_auto(source: &str) -> Result<Declarations, LoadError> {
    parse_declarations(&load_json_auto(source)?)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Document {
    #[serde(default)]
    info: Info,
    #[serde(default)]
    use_refs: bool,
    #[serde(default)]
    resources: IndexMap<String, ResourceDoc>,
    #[serde(default)]
    operations: Vec<OperationDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ResourceDoc {
    fields: IndexMap<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct OperationDoc {
    path: String,
    method: Method,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    parameters: Vec<ParameterDoc>,
    #[serde(default)]
    body: Option<ResourceUse>,
    #[serde(default)]
    responses: IndexMap<String, Option<ResponseDoc>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ParameterDoc {
    name: String,
    #[serde(rename = "type")]
    ty: Value,
    #[serde(default = "default_required")]
    required: bool,
    #[serde(default)]
    default: Option<Value>,
}

fn default_required() -> bool {
    true
}

/// A resource named by a body or response, optionally narrowed.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResourceUse {
    Name(String),
    Derived(DerivedUse),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DerivedUse {
    resource: String,
    #[serde(default)]
    partial: Option<Value>,
    #[serde(default)]
    select: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResponseDoc {
    Many([ResourceUse; 1]),
    One(ResourceUse),
}

/// Build declarations from an already parsed document.
///
/// Resources may refer to each other in any order, including cycles.
///
/// # Errors
///
/// Returns `LoadError::UnsupportedType` for unknown type names,
/// `LoadError::UnknownResource` for operations naming undeclared resources, and
/// `LoadError::InvalidDocument` when the document has the wrong shape.
pub fn parse_declarations(value: &Value) -> Result<Declarations, LoadError> {
    let document = Document::deserialize(value).map_err(|e| LoadError::InvalidDocument {
        message: e.to_string(),
    })?;

    let links: IndexMap<String, ResourceLink> = document
        .resources
        .keys()
        .map(|name| (name.clone(), ResourceLink::forward(name.as_str())))
        .collect();

    let mut resources = IndexMap::with_capacity(document.resources.len());
    for (name, doc) in &document.resources {
        let mut builder = ResourceBuilder::new(name.as_str());
        for (field_name, spec) in &doc.fields {
            let path = format!("resources.{}.fields.{}", name, field_name);
            builder.add_field(parse_field(field_name, spec, &path, &links)?)?;
        }
        let resource = builder.build()?;
        if let Some(link) = links.get(name) {
            link.define(&resource)?;
        }
        resources.insert(name.clone(), resource);
    }

    let mut schema = Schema::new()
        .with_info(document.info)
        .use_refs(document.use_refs);
    for (index, doc) in document.operations.iter().enumerate() {
        let path = format!("operations[{}]", index);
        schema.add_operation(parse_operation(doc, &path, &resources, &links)?);
    }

    debug!(
        resources = resources.len(),
        operations = schema.len(),
        "loaded declarations"
    );
    Ok(Declarations { resources, schema })
}

fn parse_field(
    name: &str,
    spec: &Value,
    path: &str,
    links: &IndexMap<String, ResourceLink>,
) -> Result<Field, LoadError> {
    match spec {
        Value::Object(map) if map.contains_key("type") => {
            let mut field = Field::new(name, parse_type(&map["type"], path, links)?);
            for (key, flag) in map {
                let flag_value = || {
                    flag.as_bool().ok_or_else(|| LoadError::InvalidDocument {
                        message: format!("{}.{} must be a boolean", path, key),
                    })
                };
                field = match key.as_str() {
                    "type" => field,
                    "nullable" => field.with_nullable(flag_value()?),
                    "optional" => field.with_optional(flag_value()?),
                    other => {
                        return Err(LoadError::InvalidDocument {
                            message: format!("unknown key `{}` at {}", other, path),
                        })
                    }
                };
            }
            Ok(field)
        }
        other => Ok(Field::new(name, parse_type(other, path, links)?)),
    }
}

fn parse_type(
    spec: &Value,
    path: &str,
    links: &IndexMap<String, ResourceLink>,
) -> Result<TypeTag, LoadError> {
    let unsupported = || LoadError::UnsupportedType {
        path: path.to_string(),
        type_name: spec.to_string(),
    };

    match spec {
        Value::String(name) => match name.as_str() {
            "integer" => Ok(TypeTag::Integer),
            "number" => Ok(TypeTag::Number),
            "string" | "text" => Ok(TypeTag::Text),
            "boolean" => Ok(TypeTag::Boolean),
            "date" => Ok(TypeTag::Date),
            "date-time" | "datetime" => Ok(TypeTag::DateTime),
            other => links
                .get(other)
                .map(|link| TypeTag::ResourceRef(link.clone()))
                .ok_or_else(|| LoadError::UnsupportedType {
                    path: path.to_string(),
                    type_name: other.to_string(),
                }),
        },
        Value::Array(items) if items.len() == 1 => Ok(TypeTag::array_of(parse_type(
            &items[0],
            &format!("{}[0]", path),
            links,
        )?)),
        Value::Object(map) if map.len() == 1 => match map.get("enum") {
            Some(Value::Array(values)) => Ok(TypeTag::Enum(EnumValues::from_json(values)?)),
            _ => Err(unsupported()),
        },
        _ => Err(unsupported()),
    }
}

fn parse_operation(
    doc: &OperationDoc,
    path: &str,
    resources: &IndexMap<String, Resource>,
    links: &IndexMap<String, ResourceLink>,
) -> Result<Operation, LoadError> {
    let mut operation = Operation::new(doc.method, doc.path.as_str());
    if let Some(action) = &doc.action {
        operation = operation.action(action.as_str());
    }

    for (index, param) in doc.parameters.iter().enumerate() {
        let param_path = format!("{}.parameters[{}]", path, index);
        let ty = parse_type(&param.ty, &param_path, links)?;
        let mut parameter = Parameter::new(param.name.as_str(), ty);
        if !param.required {
            parameter = parameter.optional();
        }
        if let Some(default) = &param.default {
            parameter = parameter.default_value(default.clone());
        }
        operation = operation.param(parameter);
    }

    if let Some(body) = &doc.body {
        let resource = resolve_use(body, &format!("{}.body", path), resources)?;
        operation = operation.body(&resource);
    }

    for (status, response) in &doc.responses {
        let response_path = format!("{}.responses.{}", path, status);
        operation = match response {
            None => operation.no_content(status),
            Some(ResponseDoc::One(usage)) => {
                operation.response(status, resolve_use(usage, &response_path, resources)?)
            }
            Some(ResponseDoc::Many([usage])) => operation.response(
                status,
                ResponseBody::Many(resolve_use(usage, &response_path, resources)?),
            ),
        };
    }

    Ok(operation)
}

fn resolve_use(
    usage: &ResourceUse,
    path: &str,
    resources: &IndexMap<String, Resource>,
) -> Result<Resource, LoadError> {
    let lookup = |name: &str| {
        resources
            .get(name)
            .cloned()
            .ok_or_else(|| LoadError::UnknownResource {
                path: path.to_string(),
                name: name.to_string(),
            })
    };

    match usage {
        ResourceUse::Name(name) => lookup(name),
        ResourceUse::Derived(DerivedUse {
            resource,
            partial,
            select,
        }) => {
            let base = lookup(resource)?;
            match (partial, select) {
                (None, None) => Ok(base),
                (Some(spec), None) => Ok(base.partial(&Selection::from_json(spec)?)?),
                (None, Some(spec)) => Ok(base.select(&Selection::from_json(spec)?)?),
                (Some(_), Some(_)) => Err(LoadError::InvalidDocument {
                    message: format!("{}: `partial` and `select` cannot be combined", path),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn shop() -> Value {
        json!({
            "info": { "title": "shop", "version": "0.1.0" },
            "resources": {
                "Product": {
                    "fields": {
                        "id": "integer",
                        "name": "string",
                        "tags": ["string"],
                        "status": { "enum": ["draft", "published"] },
                        "description": { "type": "string", "nullable": true },
                        "image_url?": "string",
                        "category": "Category"
                    }
                },
                "Category": {
                    "fields": {
                        "name": "string",
                        "parent": { "type": "Category", "nullable": true }
                    }
                }
            },
            "operations": [
                {
                    "path": "/products",
                    "method": "get",
                    "action": "index",
                    "parameters": [{ "name": "page", "type": "integer", "required": false, "default": 1 }],
                    "responses": { "200": ["Product"] }
                },
                {
                    "path": "/products",
                    "method": "post",
                    "body": { "resource": "Product", "partial": ["name"] },
                    "responses": { "200": "Product", "422": null }
                }
            ]
        })
    }

    #[test]
    fn parse_shop_document() {
        let decl = parse_declarations(&shop()).unwrap();
        let product = decl.resource("Product").unwrap();
        assert_eq!(
            product.required_names(),
            vec!["id", "name", "tags", "status", "description", "category"]
        );
        assert!(product.field("image_url").unwrap().is_optional());
        assert!(product.field("description").unwrap().is_nullable());
        assert_eq!(
            product.field("tags").unwrap().ty(),
            &TypeTag::array_of(TypeTag::Text)
        );

        let category = decl.resource("Category").unwrap();
        let parent = category.field("parent").unwrap();
        assert!(parent.ty().link().unwrap().get().unwrap().ptr_eq(category));

        assert_eq!(decl.schema().len(), 2);
        assert_eq!(decl.schema().info().title, "shop");
        assert_eq!(decl.schema().operation_for("index").unwrap().path(), "/products");
    }

    #[test]
    fn body_partial_is_derived() {
        let decl = parse_declarations(&shop()).unwrap();
        let post = &decl.schema().operations()[1];
        assert_eq!(post.request_body().unwrap().required_names(), vec!["name"]);
        assert_eq!(post.responses().count(), 2);
    }

    #[test]
    fn unknown_type_name() {
        let doc = json!({ "resources": { "A": { "fields": { "x": "uuid" } } } });
        let err = parse_declarations(&doc).unwrap_err();
        match err {
            LoadError::UnsupportedType { path, type_name } => {
                assert_eq!(path, "resources.A.fields.x");
                assert_eq!(type_name, "uuid");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_response_resource() {
        let doc = json!({
            "operations": [{ "path": "/x", "method": "get", "responses": { "200": "Missing" } }]
        });
        assert!(matches!(
            parse_declarations(&doc),
            Err(LoadError::UnknownResource { name, .. }) if name == "Missing"
        ));
    }

    #[test]
    fn bad_partial_spec() {
        let doc = json!({
            "resources": { "A": { "fields": { "x": "integer" } } },
            "operations": [{
                "path": "/a", "method": "post",
                "body": { "resource": "A", "partial": ["y"] }
            }]
        });
        assert!(matches!(parse_declarations(&doc), Err(LoadError::Select(_))));
    }

    #[test]
    fn misspelled_body_key_rejected() {
        let doc = json!({
            "resources": { "A": { "fields": { "x": "integer" } } },
            "operations": [{
                "path": "/a", "method": "post",
                "body": { "resource": "A", "partail": ["x"] }
            }]
        });
        assert!(matches!(
            parse_declarations(&doc),
            Err(LoadError::InvalidDocument { .. })
        ));
    }

    #[test]
    fn optional_parameter_suffix() {
        let doc = json!({
            "resources": { "A": { "fields": { "x": "integer" } } },
            "operations": [{
                "path": "/a", "method": "get",
                "parameters": [{ "name": "q?", "type": "string" }]
            }]
        });
        let decl = parse_declarations(&doc).unwrap();
        let parameter = &decl.schema().operations()[0].parameters()[0];
        assert_eq!(parameter.name(), "q");
        assert!(!parameter.is_required());
    }

    #[test]
    fn duplicate_field_after_suffix() {
        let doc = json!({ "resources": { "A": { "fields": { "x": "integer", "x?": "string" } } } });
        assert!(matches!(parse_declarations(&doc), Err(LoadError::Declare(_))));
    }

    #[test]
    fn mixed_enum_rejected() {
        let doc = json!({ "resources": { "A": { "fields": { "x": { "enum": ["a", 1] } } } } });
        assert!(matches!(parse_declarations(&doc), Err(LoadError::Declare(_))));
    }

    #[test]
    fn unknown_top_level_key() {
        let doc = json!({ "resource": {} });
        assert!(matches!(
            parse_declarations(&doc),
            Err(LoadError::InvalidDocument { .. })
        ));
    }

    #[test]
    fn load_json_valid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"id": 1}}"#).unwrap();

        let value = load_json(file.path()).unwrap();
        assert_eq!(value["id"], 1);
    }

    #[test]
    fn load_json_file_not_found() {
        let result = load_json(Path::new("/nonexistent/path.json"));
        assert!(matches!(result, Err(LoadError::FileNotFound { .. })));
    }

    #[test]
    fn load_json_invalid() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid json").unwrap();

        let result = load_json(file.path());
        assert!(matches!(result, Err(LoadError::InvalidJson { .. })));
    }

    #[test]
    fn load_declarations_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", shop()).unwrap();

        let decl = load_declarations_auto(file.path().to_str().unwrap()).unwrap();
        assert_eq!(decl.resources().count(), 2);
    }

    #[test]
    fn is_url_detection() {
        assert!(is_url("https://example.com/api.json"));
        assert!(is_url("http://example.com/api.json"));
        assert!(!is_url("/path/to/api.json"));
        assert!(!is_url("api.json"));
    }

    #[cfg(feature = "remote")]
    mod remote {
        use super::*;

        #[test]
        fn load_declarations_url_valid() {
            let mut server = mockito::Server::new();
            let mock = server
                .mock("GET", "/api.json")
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(shop().to_string())
                .create();

            let decl = load_declarations_url(&format!("{}/api.json", server.url())).unwrap();
            assert!(decl.resource("Category").is_some());
            mock.assert();
        }

        #[test]
        fn load_json_url_404() {
            let mut server = mockito::Server::new();
            let _mock = server.mock("GET", "/missing.json").with_status(404).create();

            let result = load_json_url(&format!("{}/missing.json", server.url()));
            assert!(matches!(result, Err(LoadError::NetworkError { .. })));
        }
    }
}
