//! Resource definitions and their derivations.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use indexmap::IndexMap;
use tracing::debug;

use crate::data::{Accessor, ComputedFn, Context, Data, Record};
use crate::error::{DeclareError, SelectError};
use crate::field::{is_identifier, Field};
use crate::selector::Selection;
use crate::types::{ResourceLink, TypeTag};

/// How a derived resource treats nested selections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Derivation {
    /// Restrict the field set only; nested resources keep their full shape.
    Shallow,
    /// Also replace nested resource types by their own derivation.
    Recursive,
}

struct Inner {
    name: String,
    fields: IndexMap<String, Field>,
    accessors: IndexMap<String, Arc<dyn Accessor>>,
    derived: Mutex<HashMap<(Derivation, Selection), Resource>>,
}

/// An immutable, named, ordered set of fields.
///
/// Cloning is cheap and clones share identity.
#[derive(Clone)]
pub struct Resource {
    inner: Arc<Inner>,
}

impl Resource {
    pub fn builder(name: impl Into<String>) -> ResourceBuilder {
        ResourceBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.inner.fields.values()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.inner.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.inner.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.fields.is_empty()
    }

    /// Names of non-optional fields, in declaration order.
    pub fn required_names(&self) -> Vec<&str> {
        self.fields()
            .filter(|field| !field.is_optional())
            .map(Field::name)
            .collect()
    }

    pub(crate) fn accessor(&self, name: &str) -> Option<&dyn Accessor> {
        self.inner.accessors.get(name).map(|a| a.as_ref())
    }

    /// True when both handles point at the same definition.
    pub fn ptr_eq(&self, other: &Resource) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    /// Derive a resource restricted to `spec`, applying nested selections to
    /// the referenced resources as well.
    pub fn select(&self, spec: &Selection) -> Result<Resource, SelectError> {
        self.derive(spec, Derivation::Recursive)
    }

    /// Derive a resource restricted to `spec`. Nested resources keep their
    /// full shape.
    pub fn partial(&self, spec: &Selection) -> Result<Resource, SelectError> {
        self.derive(spec, Derivation::Shallow)
    }

    /// Derive a new, independent resource.
    ///
    /// Selected fields are copied with `optional` cleared. Results are memoized
    /// per (derivation, selection); the source is never modified.
    ///
    /// The memo is never evicted and lives as long as this resource. Deriving from
    /// selections supplied at runtime (request parameters, for instance) grows it
    /// without bound, and a cached view that refers back to its source keeps both
    /// alive. Derive views once at start-up and reuse them.
    ///
    /// # Errors
    ///
    /// Returns `SelectError` if the selection does not resolve against this resource.
    pub fn derive(&self, spec: &Selection, derivation: Derivation) -> Result<Resource, SelectError> {
        let key = (derivation, spec.clone());
        if let Some(cached) = self.cache().get(&key) {
            debug!(resource = self.name(), ?derivation, "derived resource served from cache");
            return Ok(cached.clone());
        }

        // Computed outside the lock: nested derivations may come back to this resource.
        let derived = self.derive_uncached(spec, derivation)?;
        debug!(
            resource = self.name(),
            ?derivation,
            fields = derived.len(),
            "derived resource"
        );
        Ok(self.cache().entry(key).or_insert(derived).clone())
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, HashMap<(Derivation, Selection), Resource>> {
        self.inner
            .derived
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn derive_uncached(
        &self,
        spec: &Selection,
        derivation: Derivation,
    ) -> Result<Resource, SelectError> {
        let resolved = spec.resolve(self)?;
        let mut fields = IndexMap::new();

        for field in self.fields() {
            if !resolved.contains(field.name()) {
                continue;
            }
            let mut copy = field.selected();
            if derivation == Derivation::Recursive && resolved.has_nested(field.name()) {
                if let Some(link) = field.ty().link() {
                    let target = link.get().ok_or_else(|| SelectError::UnresolvedReference {
                        name: link.name().to_string(),
                    })?;
                    let nested = target.select(&resolved.nested_for(field.name()))?;
                    copy = copy.with_type(field.ty().with_link(ResourceLink::from(&nested)));
                }
            }
            fields.insert(copy.name().to_string(), copy);
        }

        let accessors = self
            .inner
            .accessors
            .iter()
            .filter(|(name, _)| fields.contains_key(name.as_str()))
            .map(|(name, accessor)| (name.clone(), Arc::clone(accessor)))
            .collect();

        Ok(Resource::from_parts(self.name().to_string(), fields, accessors))
    }

    fn from_parts(
        name: String,
        fields: IndexMap<String, Field>,
        accessors: IndexMap<String, Arc<dyn Accessor>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                fields,
                accessors,
                derived: Mutex::new(HashMap::new()),
            }),
        }
    }
}

// Fields print their type tags, and links print only their name.
impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name())
            .field("fields", &self.fields().collect::<Vec<_>>())
            .finish()
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

/// Builder for a [`Resource`]. Fields may only be added before `build`.
///
/// ```
/// use rescast::{Field, Resource, TypeTag};
///
/// let product = Resource::builder("Product")
///     .field(Field::new("id", TypeTag::Integer))
///     .field(Field::new("description", TypeTag::Text).nullable())
///     .field(Field::new("image_url?", TypeTag::Text))
///     .build()
///     .unwrap();
///
/// assert_eq!(product.required_names(), vec!["id", "description"]);
/// ```
pub struct ResourceBuilder {
    name: String,
    fields: IndexMap<String, Field>,
    accessors: IndexMap<String, Arc<dyn Accessor>>,
    error: Option<DeclareError>,
}

impl ResourceBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
            accessors: IndexMap::new(),
            error: None,
        }
    }

    /// Append a field.
    ///
    /// # Errors
    ///
    /// Returns `DeclareError::InvalidName` or `DeclareError::DuplicateField`.
    pub fn add_field(&mut self, field: Field) -> Result<(), DeclareError> {
        if !is_identifier(field.name()) {
            return Err(DeclareError::InvalidName {
                name: field.name().to_string(),
            });
        }
        if self.fields.contains_key(field.name()) {
            return Err(DeclareError::DuplicateField {
                resource: self.name.clone(),
                field: field.name().to_string(),
            });
        }
        self.fields.insert(field.name().to_string(), field);
        Ok(())
    }

    /// Register a resource-level accessor, consulted before the object's own.
    pub fn add_accessor(
        &mut self,
        name: impl Into<String>,
        accessor: impl Accessor + 'static,
    ) -> Result<(), DeclareError> {
        let name = name.into();
        if !self.fields.contains_key(&name) {
            return Err(DeclareError::AccessorWithoutField {
                resource: self.name.clone(),
                field: name,
            });
        }
        self.accessors.insert(name, Arc::new(accessor));
        Ok(())
    }

    /// Append a field. Errors are reported by `build`.
    pub fn field(mut self, field: Field) -> Self {
        let result = self.add_field(field);
        self.keep_first_error(result)
    }

    /// Append a field of type `ty`.
    pub fn add(self, name: impl AsRef<str>, ty: TypeTag) -> Self {
        self.field(Field::new(name, ty))
    }

    /// Computed field value, derived from the object and the context.
    pub fn computed<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&dyn Record, &Context) -> Data<'static> + Send + Sync + 'static,
    {
        let result = self.add_accessor(name, ComputedFn(f));
        self.keep_first_error(result)
    }

    /// Resource-level accessor. Errors are reported by `build`.
    pub fn accessor(mut self, name: impl Into<String>, accessor: impl Accessor + 'static) -> Self {
        let result = self.add_accessor(name, accessor);
        self.keep_first_error(result)
    }

    fn keep_first_error(mut self, result: Result<(), DeclareError>) -> Self {
        if let Err(err) = result {
            self.error.get_or_insert(err);
        }
        self
    }

    /// Finish the declaration.
    ///
    /// # Errors
    ///
    /// Returns the first error recorded while adding fields, or
    /// `DeclareError::InvalidName` if the resource name is not an identifier.
    pub fn build(self) -> Result<Resource, DeclareError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if !is_identifier(&self.name) {
            return Err(DeclareError::InvalidName { name: self.name });
        }
        Ok(Resource::from_parts(self.name, self.fields, self.accessors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_item() -> Resource {
        Resource::builder("LineItem")
            .add("sku", TypeTag::Text)
            .add("qty", TypeTag::Integer)
            .add("note?", TypeTag::Text)
            .build()
            .unwrap()
    }

    fn order() -> Resource {
        Resource::builder("Order")
            .add("id", TypeTag::Integer)
            .add("items", TypeTag::array_of(TypeTag::resource(&line_item())))
            .add("coupon?", TypeTag::Text)
            .build()
            .unwrap()
    }

    fn field_names(resource: &Resource) -> Vec<&str> {
        resource.fields().map(Field::name).collect()
    }

    #[test]
    fn duplicate_field_rejected() {
        let result = Resource::builder("Product")
            .add("id", TypeTag::Integer)
            .add("id?", TypeTag::Text)
            .build();
        assert!(matches!(
            result,
            Err(DeclareError::DuplicateField { field, .. }) if field == "id"
        ));
    }

    #[test]
    fn invalid_names_rejected() {
        let result = Resource::builder("Product").add("image-url", TypeTag::Text).build();
        assert!(matches!(result, Err(DeclareError::InvalidName { .. })));

        let result = Resource::builder("my product").build();
        assert!(matches!(result, Err(DeclareError::InvalidName { .. })));
    }

    #[test]
    fn first_error_wins() {
        let result = Resource::builder("Product")
            .add("id", TypeTag::Integer)
            .add("id", TypeTag::Integer)
            .add("2nd", TypeTag::Integer)
            .build();
        assert!(matches!(result, Err(DeclareError::DuplicateField { .. })));
    }

    #[test]
    fn accessor_requires_field() {
        let result = Resource::builder("Product")
            .add("id", TypeTag::Integer)
            .computed("label", |_: &dyn Record, _: &Context| Data::from("x"))
            .build();
        assert!(matches!(
            result,
            Err(DeclareError::AccessorWithoutField { field, .. }) if field == "label"
        ));
    }

    #[test]
    fn partial_restricts_and_clears_optional() {
        let order = order();
        let derived = order.partial(&Selection::fields(["id", "coupon"])).unwrap();
        assert_eq!(field_names(&derived), vec!["id", "coupon"]);
        assert!(derived.fields().all(|f| !f.is_optional()));
        assert_eq!(derived.name(), "Order");
    }

    #[test]
    fn derivation_keeps_source_order() {
        let derived = order().partial(&Selection::fields(["items", "id"])).unwrap();
        assert_eq!(field_names(&derived), vec!["id", "items"]);
    }

    #[test]
    fn derivation_does_not_mutate_source() {
        let order = order();
        let before = format!("{:?}", order);
        let _ = order.select(&Selection::fields(["id"])).unwrap();
        let _ = order.partial(&Selection::wildcard().with("coupon")).unwrap();
        assert_eq!(format!("{:?}", order), before);
        assert!(order.field("coupon").unwrap().is_optional());
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn select_replaces_nested_resource() {
        let spec = Selection::fields(["id"]).nest("items", Selection::fields(["sku"]));
        let derived = order().select(&spec).unwrap();
        let items = derived.field("items").unwrap();
        assert!(items.ty().is_array());
        let nested = items.ty().link().and_then(ResourceLink::get).unwrap();
        assert_eq!(field_names(nested), vec!["sku"]);
    }

    #[test]
    fn partial_keeps_nested_resource() {
        let spec = Selection::fields(["id"]).nest("items", Selection::fields(["sku"]));
        let derived = order().partial(&spec).unwrap();
        let nested = derived
            .field("items")
            .and_then(|f| f.ty().link())
            .and_then(ResourceLink::get)
            .unwrap();
        assert_eq!(field_names(nested), vec!["sku", "qty", "note"]);
    }

    #[test]
    fn derived_resources_support_further_derivation() {
        let derived = order().partial(&Selection::fields(["id", "items"])).unwrap();
        let again = derived.partial(&Selection::fields(["id"])).unwrap();
        assert_eq!(field_names(&again), vec!["id"]);
    }

    #[test]
    fn derivations_are_memoized() {
        let order = order();
        let spec = Selection::fields(["id"]);
        let a = order.partial(&spec).unwrap();
        let b = order.partial(&spec).unwrap();
        assert!(a.ptr_eq(&b));

        let c = order.select(&spec).unwrap();
        assert!(!a.ptr_eq(&c));
    }

    #[test]
    fn unknown_field_in_derivation() {
        let result = order().partial(&Selection::fields(["total"]));
        assert!(matches!(result, Err(SelectError::UnknownField { .. })));
    }
}
