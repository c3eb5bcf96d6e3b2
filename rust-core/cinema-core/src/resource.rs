//! # Generic Resource Handler
//!
//! One CRUD surface parameterized by an entity schema and a record store.
//! Every catalog resource is an instance of [`Resource`]; the four differ only
//! in their record type and, for movies, the reference lookups they carry.
//!
//! Validation runs in two steps: the schema checks shape, then reference
//! fields that passed are resolved against the lookups registered with
//! [`Resource::with_reference`]. Violations from both steps are reported
//! together and nothing is written when any exist.
//!
//! Stored reference ids whose target has since been deleted are dropped
//! whenever a record is read, and so never written back.

use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::schema::{Fields, Mode, Schema};
use crate::store::{RecordStore, ReferenceLookup};
use crate::validation::{FieldError, ValidationErrors};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// CRUD operations over one record store
pub struct Resource<S: RecordStore> {
    store: Arc<S>,
    references: BTreeMap<&'static str, Arc<dyn ReferenceLookup>>,
}

impl<S: RecordStore> Clone for Resource<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            references: self.references.clone(),
        }
    }
}

impl<S: RecordStore> Resource<S> {
    /// Create a resource over `store` with no reference fields resolved
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            references: BTreeMap::new(),
        }
    }

    /// Resolve reference field `field` against `lookup` on every write
    ///
    /// # Panics
    ///
    /// Panics if the schema has no reference field named `field`; this is a
    /// wiring mistake, caught at startup.
    #[must_use]
    pub fn with_reference(mut self, field: &'static str, lookup: Arc<dyn ReferenceLookup>) -> Self {
        assert!(
            Self::schema().field(field).is_some_and(|f| f.is_reference()),
            "{} has no reference field {field}",
            Self::schema().resource
        );
        self.references.insert(field, lookup);
        self
    }

    /// Field rules for this resource
    #[must_use]
    pub fn schema() -> &'static Schema {
        S::Record::schema()
    }

    /// Resource name, also the URL segment
    #[must_use]
    pub fn name() -> &'static str {
        Self::schema().resource
    }

    /// All records
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn list(&self) -> Result<Vec<S::Record>> {
        let records = self.store.find_all().await?;
        self.without_dangling(records).await
    }

    /// Validate `body` and persist a new record
    ///
    /// # Errors
    ///
    /// `Error::Validation` if the body is invalid; store failures otherwise.
    pub async fn create(&self, body: &Value) -> Result<S::Record> {
        let fields = self.validate(body, Mode::Full).await?;
        let record = self.store.insert(fields).await?;
        debug!(resource = Self::name(), id = record.id(), "Record created");
        Ok(record)
    }

    /// The record with `id`
    ///
    /// # Errors
    ///
    /// `Error::NotFound` if absent; store failures otherwise.
    pub async fn retrieve(&self, id: i64) -> Result<S::Record> {
        let not_found = move || Error::NotFound {
            resource: Self::name(),
            id,
        };
        let record = self.store.find_by_id(id).await?.ok_or_else(not_found)?;
        self.without_dangling(vec![record])
            .await?
            .into_iter()
            .next()
            .ok_or_else(not_found)
    }

    /// Overwrite the record with `id` from a complete body
    ///
    /// Optional fields left out of `body` keep their stored values.
    ///
    /// # Errors
    ///
    /// `Error::NotFound` if absent, `Error::Validation` if the body is invalid.
    pub async fn replace(&self, id: i64, body: &Value) -> Result<S::Record> {
        self.apply(id, body, Mode::Full).await
    }

    /// Apply the fields supplied in `body` to the record with `id`
    ///
    /// # Errors
    ///
    /// `Error::NotFound` if absent, `Error::Validation` if a supplied field is invalid.
    pub async fn merge(&self, id: i64, body: &Value) -> Result<S::Record> {
        self.apply(id, body, Mode::Partial).await
    }

    /// Remove the record with `id`
    ///
    /// # Errors
    ///
    /// `Error::NotFound` if absent; store failures otherwise.
    pub async fn delete(&self, id: i64) -> Result<()> {
        if self.store.delete(id).await? {
            debug!(resource = Self::name(), id, "Record deleted");
            Ok(())
        } else {
            Err(Error::NotFound {
                resource: Self::name(),
                id,
            })
        }
    }

    async fn apply(&self, id: i64, body: &Value, mode: Mode) -> Result<S::Record> {
        let current = self.retrieve(id).await?;
        let changes = self.validate(body, mode).await?;
        let updated = current.merged(changes)?;

        if self.store.update(&updated).await? {
            debug!(resource = Self::name(), id, ?mode, "Record updated");
            Ok(updated)
        } else {
            Err(Error::NotFound {
                resource: Self::name(),
                id,
            })
        }
    }

    /// `records` with reference ids that no longer resolve removed
    async fn without_dangling(&self, records: Vec<S::Record>) -> Result<Vec<S::Record>> {
        if self.references.is_empty() || records.is_empty() {
            return Ok(records);
        }
        let mut all_fields = records
            .iter()
            .map(Entity::to_fields)
            .collect::<Result<Vec<_>>>()?;

        let mut pruned = false;
        for (field, lookup) in &self.references {
            let ids: BTreeSet<i64> = all_fields
                .iter()
                .flat_map(|fields| reference_ids(fields, field))
                .collect();
            let ids: Vec<i64> = ids.into_iter().collect();
            let dangling: BTreeSet<i64> = lookup.unresolved(&ids).await?.into_iter().collect();
            if dangling.is_empty() {
                continue;
            }
            debug!(
                resource = Self::name(),
                field = *field,
                ?dangling,
                "Dropping deleted references"
            );
            pruned = true;
            for fields in &mut all_fields {
                let kept: Vec<i64> = reference_ids(fields, field)
                    .into_iter()
                    .filter(|id| !dangling.contains(id))
                    .collect();
                fields.insert((*field).to_string(), Value::from(kept));
            }
        }

        if !pruned {
            return Ok(records);
        }
        records
            .iter()
            .zip(all_fields)
            .map(|(record, fields)| <S::Record as Entity>::from_fields(record.id(), fields))
            .collect()
    }

    async fn validate(&self, body: &Value, mode: Mode) -> Result<Fields> {
        let (fields, mut errors) = match Self::schema().validate(body, mode) {
            Ok(fields) => (fields, ValidationErrors::new()),
            Err(errors) => {
                // Reference checks still run for fields that passed the shape check.
                let partial = body
                    .as_object()
                    .map(|object| Self::shape_valid_references(object, &errors))
                    .unwrap_or_default();
                (partial, errors)
            }
        };

        errors.extend(self.unresolved_references(&fields).await?);

        if errors.is_empty() {
            Ok(fields)
        } else {
            debug!(resource = Self::name(), errors = errors.len(), "Validation failed");
            Err(Error::Validation(errors))
        }
    }

    /// Cleaned values of reference fields that produced no shape errors
    fn shape_valid_references(
        object: &serde_json::Map<String, Value>,
        errors: &ValidationErrors,
    ) -> Fields {
        Self::schema()
            .references()
            .filter(|field| !errors.has_field(field.name))
            .filter_map(|field| {
                let cleaned = field.clean(object.get(field.name)?).ok()?;
                Some((field.name.to_string(), cleaned))
            })
            .collect()
    }

    async fn unresolved_references(&self, fields: &Fields) -> Result<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for (field, lookup) in &self.references {
            if !fields.contains_key(*field) {
                continue;
            }
            let ids = reference_ids(fields, field);
            for missing in lookup.unresolved(&ids).await? {
                errors.add(FieldError::does_not_exist(*field, missing));
            }
        }
        Ok(errors)
    }
}

fn reference_ids(fields: &Fields, field: &str) -> Vec<i64> {
    fields
        .get(field)
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default()
}
