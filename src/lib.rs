//! Rescast
//!
//! Declare a typed resource view over domain objects once, then derive from it both
//! a JSON serialization of matching objects and the JSON Schema / OpenAPI fragment
//! describing that serialization.
//!
//! # Example
//!
//! ```
//! use rescast::{Context, Data, Field, Resource, SchemaOptions, Selection, TypeTag};
//! use serde_json::json;
//!
//! let product = Resource::builder("Product")
//!     .add("id", TypeTag::Integer)
//!     .add("name", TypeTag::Text)
//!     .field(Field::new("description", TypeTag::Text).nullable())
//!     .add("image_url?", TypeTag::Text)
//!     .build()
//!     .unwrap();
//!
//! let row = json!({ "id": 1, "name": "tea", "description": null, "image_url": "t.png" });
//!
//! // Optional fields are left out unless selected.
//! let value = product.serialize(Data::from_json(&row), &Context::new()).unwrap();
//! assert_eq!(value, json!({ "id": 1, "name": "tea", "description": null }));
//!
//! let value = product
//!     .serialize_with(Data::from_json(&row), &Context::new(), &Selection::fields(["id", "image_url"]))
//!     .unwrap();
//! assert_eq!(value, json!({ "id": 1, "image_url": "t.png" }));
//!
//! // The schema is computed from the same declaration.
//! let schema = product.to_schema(&SchemaOptions::new()).unwrap();
//! assert_eq!(schema["required"], json!(["id", "name", "description"]));
//! assert_eq!(schema["properties"]["description"]["type"], json!(["string", "null"]));
//! ```
//!
//! # Type Mapping
//!
//! | Type | Schema | Serialized as |
//! |------|--------|---------------|
//! | `Integer` | `integer` | number |
//! | `Number` | `number` | number |
//! | `Text` | `string` | string |
//! | `Boolean` | `boolean` | bool |
//! | `Date` | `string` / `date` | `YYYY-MM-DD` |
//! | `DateTime` | `string` / `date-time` | ISO-8601 with milliseconds |
//! | `Enum` | type of the values + `enum` | the value |
//! | `ArrayOf(T)` | `array` of `T` | array, element-wise |
//! | `ResourceRef(R)` | object schema of `R` or `$ref` | object serialized through `R` |
//!
//! # Selections
//!
//! A selection is a list of field names, the wildcard `"*"` (every non-optional
//! field), and at most one trailing mapping from a resource-typed field to its own
//! nested selection:
//! ```json
//! ["*", "image_url", { "category": ["name"] }]
//! ```

mod data;
mod error;
mod field;
mod json_schema;
mod loader;
mod openapi;
mod resource;
mod selector;
mod serialize;
mod types;

pub use data::{Accessor, Context, Data, Record};
pub use error::{DeclareError, LoadError, SchemaError, SelectError, SerializeError};
pub use field::{is_identifier, Field};
pub use json_schema::{SchemaOptions, JSON_SCHEMA_DRAFT};
pub use loader::{
    is_url, load_declarations, load_declarations_auto, load_declarations_str, load_json,
    load_json_auto, load_json_str, parse_declarations, Declarations,
};
#[cfg(feature = "remote")]
pub use loader::{load_declarations_url, load_json_url};
pub use openapi::{Info, Operation, Parameter, ResponseBody, Schema, DEFAULT_STATUS, OPENAPI_VERSION};
pub use resource::{Derivation, Resource, ResourceBuilder};
pub use selector::{ResolvedSelection, SelectItem, Selection, WILDCARD};
pub use types::{json_type_name, EnumValues, Method, ResourceLink, Scalar, TypeTag};
