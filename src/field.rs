//! Named, typed resource attributes.

use serde_json::Value;

use crate::data::{Context, Data};
use crate::error::{SchemaError, SerializeError};
use crate::json_schema::{Emitter, SchemaOptions};
use crate::selector::Selection;
use crate::serialize::Caster;
use crate::types::TypeTag;

/// Suffix marking a declared field name as optional (`"image_url?"`).
const OPTIONAL_SUFFIX: char = '?';

/// One attribute of a resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    ty: TypeTag,
    nullable: bool,
    optional: bool,
}

impl Field {
    /// Declare a field. A trailing `?` on the name marks it optional and is
    /// stripped from the stored name.
    pub fn new(name: impl AsRef<str>, ty: TypeTag) -> Self {
        let name = name.as_ref();
        let (name, optional) = match name.strip_suffix(OPTIONAL_SUFFIX) {
            Some(stripped) => (stripped, true),
            None => (name, false),
        };
        Self {
            name: name.to_string(),
            ty,
            nullable: false,
            optional,
        }
    }

    pub fn nullable(self) -> Self {
        self.with_nullable(true)
    }

    pub fn optional(self) -> Self {
        self.with_optional(true)
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Marks the field optional. The `?` suffix and this flag are OR'd.
    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional |= optional;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &TypeTag {
        &self.ty
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// True when the field refers to a resource, directly or through arrays.
    pub fn is_reference(&self) -> bool {
        self.ty.link().is_some()
    }

    /// Copy of this field that survived an explicit selection.
    pub(crate) fn selected(&self) -> Self {
        Self {
            optional: false,
            ..self.clone()
        }
    }

    pub(crate) fn with_type(mut self, ty: TypeTag) -> Self {
        self.ty = ty;
        self
    }

    /// Cast a runtime value into its JSON form.
    ///
    /// Date-times render as ISO-8601 with milliseconds, resource references
    /// serialize through their resource with every non-optional field, and
    /// arrays are cast element-wise.
    pub fn cast_value(&self, data: Data<'_>, context: &Context) -> Result<Value, SerializeError> {
        Caster::new(&self.ty, context, &Selection::wildcard())?.cast(&self.ty, data)
    }

    /// JSON Schema fragment for this field.
    pub fn to_schema(&self, options: &SchemaOptions) -> Result<Value, SchemaError> {
        Emitter::new(*options).field(self)
    }
}

/// Returns true for `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn suffix_marks_optional() {
        let field = Field::new("image_url?", TypeTag::Text);
        assert_eq!(field.name(), "image_url");
        assert!(field.is_optional());
    }

    #[test]
    fn suffix_and_flag_are_ored() {
        let both = Field::new("image_url?", TypeTag::Text).with_optional(false);
        assert!(both.is_optional());

        let flag = Field::new("image_url", TypeTag::Text).optional();
        assert!(flag.is_optional());

        let neither = Field::new("image_url", TypeTag::Text);
        assert!(!neither.is_optional());
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("created_at"));
        assert!(is_identifier("_id"));
        assert!(!is_identifier("1st"));
        assert!(!is_identifier("image-url"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn cast_datetime() {
        let field = Field::new("created_at", TypeTag::DateTime);
        let dt = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 58).unwrap();
        let value = field.cast_value(Data::from(dt), &Context::new()).unwrap();
        assert_eq!(value, json!("2023-12-31T23:59:58.000Z"));
    }

    #[test]
    fn cast_array_elementwise() {
        let field = Field::new("tags", TypeTag::array_of(TypeTag::Text));
        let value = field
            .cast_value(Data::from(vec!["food", "sushi"]), &Context::new())
            .unwrap();
        assert_eq!(value, json!(["food", "sushi"]));
    }

    #[test]
    fn cast_passes_scalars_through() {
        let field = Field::new("price", TypeTag::Number);
        let value = field.cast_value(Data::from(12.3), &Context::new()).unwrap();
        assert_eq!(value, json!(12.3));

        let value = field.cast_value(Data::Null, &Context::new()).unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn selected_copy_is_required() {
        let field = Field::new("image_url?", TypeTag::Text);
        let copy = field.selected();
        assert!(!copy.is_optional());
        assert!(field.is_optional());
    }
}
