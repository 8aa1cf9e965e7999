//! Core type tags for resource fields.

use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DeclareError;
use crate::resource::Resource;

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Scalar allowed as an enum value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scalar {
    Integer(i64),
    Text(String),
}

impl Scalar {
    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Integer(n) => Value::from(*n),
            Scalar::Text(s) => Value::String(s.clone()),
        }
    }

    fn json_type(&self) -> &'static str {
        match self {
            Scalar::Integer(_) => "integer",
            Scalar::Text(_) => "string",
        }
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Scalar::Integer(n)
    }
}

impl From<i32> for Scalar {
    fn from(n: i32) -> Self {
        Scalar::Integer(n.into())
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

/// Ordered enum values. Never empty, and either all integers or all text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValues(Vec<Scalar>);

impl EnumValues {
    /// Build enum values, rejecting empty or mixed lists.
    pub fn new<I, S>(values: I) -> Result<Self, DeclareError>
    where
        I: IntoIterator<Item = S>,
        S: Into<Scalar>,
    {
        let values: Vec<Scalar> = values.into_iter().map(Into::into).collect();
        let Some(first) = values.first() else {
            return Err(DeclareError::InvalidEnum {
                message: "enum has no values".to_string(),
            });
        };
        let json_type = first.json_type();
        if let Some(other) = values.iter().find(|v| v.json_type() != json_type) {
            return Err(DeclareError::InvalidEnum {
                message: format!(
                    "mixed enum values: {} after {}",
                    other.json_type(),
                    json_type
                ),
            });
        }
        Ok(Self(values))
    }

    /// Build enum values from raw JSON. Only integers and strings are accepted.
    pub fn from_json(values: &[Value]) -> Result<Self, DeclareError> {
        let scalars = values
            .iter()
            .map(|value| match value {
                Value::String(s) => Ok(Scalar::Text(s.clone())),
                Value::Number(n) => n.as_i64().map(Scalar::Integer).ok_or_else(|| {
                    DeclareError::InvalidEnum {
                        message: format!("non-integer enum value {}", n),
                    }
                }),
                other => Err(DeclareError::InvalidEnum {
                    message: format!("unsupported enum value of type {}", json_type_name(other)),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(scalars)
    }

    pub fn values(&self) -> &[Scalar] {
        &self.0
    }

    /// JSON type inferred from the first value.
    pub fn json_type(&self) -> &'static str {
        self.0.first().map(Scalar::json_type).unwrap_or("string")
    }
}

/// Type descriptor of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeTag {
    Integer,
    Number,
    Text,
    Boolean,
    Date,
    DateTime,
    Enum(EnumValues),
    ArrayOf(Box<TypeTag>),
    ResourceRef(ResourceLink),
}

impl TypeTag {
    pub fn array_of(item: TypeTag) -> Self {
        TypeTag::ArrayOf(Box::new(item))
    }

    /// Reference to an already declared resource.
    pub fn resource(resource: &Resource) -> Self {
        TypeTag::ResourceRef(ResourceLink::from(resource))
    }

    pub fn enumeration<I, S>(values: I) -> Result<Self, DeclareError>
    where
        I: IntoIterator<Item = S>,
        S: Into<Scalar>,
    {
        EnumValues::new(values).map(TypeTag::Enum)
    }

    /// The resource link this type refers to, looking through arrays.
    pub fn link(&self) -> Option<&ResourceLink> {
        match self {
            TypeTag::ResourceRef(link) => Some(link),
            TypeTag::ArrayOf(item) => item.link(),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, TypeTag::ArrayOf(_))
    }

    /// Replace the innermost resource reference, keeping array nesting.
    pub(crate) fn with_link(&self, link: ResourceLink) -> TypeTag {
        match self {
            TypeTag::ResourceRef(_) => TypeTag::ResourceRef(link),
            TypeTag::ArrayOf(item) => TypeTag::ArrayOf(Box::new(item.with_link(link))),
            other => other.clone(),
        }
    }
}

struct LinkSlot {
    name: String,
    target: OnceLock<Resource>,
}

/// Named handle to a resource, possibly declared before the resource exists.
///
/// Forward links make cyclic graphs expressible: declare `ResourceLink::forward("Node")`,
/// use it in field types, then `define` it once the resource is built. A defined link
/// keeps its resource alive, so cyclic graphs live for the rest of the process.
#[derive(Clone)]
pub struct ResourceLink(Arc<LinkSlot>);

impl ResourceLink {
    pub fn forward(name: impl Into<String>) -> Self {
        Self(Arc::new(LinkSlot {
            name: name.into(),
            target: OnceLock::new(),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Complete a forward link. A link can be defined only once, and only by
    /// a resource carrying the same name.
    pub fn define(&self, resource: &Resource) -> Result<(), DeclareError> {
        if resource.name() != self.name() {
            return Err(DeclareError::NameMismatch {
                link: self.name().to_string(),
                resource: resource.name().to_string(),
            });
        }
        self.0
            .target
            .set(resource.clone())
            .map_err(|_| DeclareError::AlreadyDefined {
                name: self.name().to_string(),
            })
    }

    pub fn get(&self) -> Option<&Resource> {
        self.0.target.get()
    }

    pub fn is_defined(&self) -> bool {
        self.get().is_some()
    }
}

impl From<&Resource> for ResourceLink {
    fn from(resource: &Resource) -> Self {
        let target = OnceLock::new();
        let _ = target.set(resource.clone());
        Self(Arc::new(LinkSlot {
            name: resource.name().to_string(),
            target,
        }))
    }
}

impl PartialEq for ResourceLink {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        match (self.get(), other.get()) {
            (Some(a), Some(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

// Print only the name; links may form cycles.
impl fmt::Debug for ResourceLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceLink")
            .field("name", &self.name())
            .field("defined", &self.is_defined())
            .finish()
    }
}

/// HTTP method of a declared operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    #[serde(alias = "GET")]
    Get,
    #[serde(alias = "POST")]
    Post,
    #[serde(alias = "PATCH")]
    Patch,
    #[serde(alias = "DELETE")]
    Delete,
}

impl Method {
    /// Key used for this method in an OpenAPI path item.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Post => "post",
            Method::Patch => "patch",
            Method::Delete => "delete",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}
