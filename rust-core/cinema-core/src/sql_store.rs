//! # SQL Record Store
//!
//! [`RecordStore`] adapter over [`DatabasePool`]. Table layout is derived from
//! each entity's [`Schema`]: column fields live in the entity table, reference
//! fields live in a `<table>_<field>` join table with `owner_id`/`target_id`
//! columns that cascade on delete.
//!
//! Every write runs in one transaction, so a rejected join row leaves neither
//! the entity row nor half of its references behind.

use crate::database::{Backend, DatabasePool, DbTransaction, DbValue};
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::schema::{Field, FieldKind, Fields, Schema};
use crate::store::RecordStore;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use tracing::debug;

/// Wrap an identifier in double quotes
fn quoted(ident: &str) -> String {
    format!("\"{ident}\"")
}

fn join_table(schema: &Schema, field: &Field) -> String {
    quoted(&format!("{}_{}", schema.table, field.name))
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Create every table the given schemas need, if missing
///
/// Schemas must be ordered so that referenced tables come first.
///
/// # Errors
///
/// Returns `Error::Database` if a statement fails.
pub async fn migrate(pool: &DatabasePool, schemas: &[&Schema]) -> Result<()> {
    let (id_column, int_type) = match pool.backend() {
        Backend::Sqlite => ("INTEGER PRIMARY KEY AUTOINCREMENT", "INTEGER"),
        Backend::Postgres => ("BIGSERIAL PRIMARY KEY", "BIGINT"),
    };

    for schema in schemas {
        let mut columns = vec![format!("\"id\" {id_column}")];
        for field in schema.columns() {
            let sql_type = match field.kind {
                FieldKind::PositiveInt => int_type,
                _ => "TEXT",
            };
            let null = if field.nullable { "" } else { " NOT NULL" };
            columns.push(format!("{} {sql_type}{null}", quoted(field.name)));
        }
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quoted(schema.table),
            columns.join(", ")
        );
        pool.execute(&ddl, &[]).await?;
        debug!(table = schema.table, "Table ready");

        for field in schema.references() {
            let FieldKind::References { table: target } = field.kind else {
                continue;
            };
            let ddl = format!(
                "CREATE TABLE IF NOT EXISTS {join} (\
                 \"owner_id\" {int_type} NOT NULL REFERENCES {owner}(\"id\") ON DELETE CASCADE, \
                 \"target_id\" {int_type} NOT NULL REFERENCES {target}(\"id\") ON DELETE CASCADE, \
                 PRIMARY KEY (\"owner_id\", \"target_id\"))",
                join = join_table(schema, field),
                owner = quoted(schema.table),
                target = quoted(target),
            );
            pool.execute(&ddl, &[]).await?;
            debug!(table = schema.table, field = field.name, "Join table ready");
        }
    }

    Ok(())
}

/// Record store persisting one entity type through SQLx
pub struct SqlStore<E> {
    pool: DatabasePool,
    _record: PhantomData<fn() -> E>,
}

impl<E: Entity> SqlStore<E> {
    /// Create a store over an already migrated pool
    #[must_use]
    pub const fn new(pool: DatabasePool) -> Self {
        Self {
            pool,
            _record: PhantomData,
        }
    }

    fn schema() -> &'static Schema {
        E::schema()
    }

    fn select_sql() -> String {
        let schema = Self::schema();
        let mut columns = vec![quoted("id")];
        columns.extend(schema.columns().map(|f| quoted(f.name)));
        format!("SELECT {} FROM {}", columns.join(", "), quoted(schema.table))
    }

    fn column_params(fields: &Fields) -> Vec<DbValue> {
        Self::schema()
            .columns()
            .map(|f| fields.get(f.name).map_or(DbValue::Null, DbValue::from))
            .collect()
    }

    fn reference_ids(fields: &Fields, field: &Field) -> Vec<i64> {
        fields
            .get(field.name)
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default()
    }

    /// Reference ids per owner for one join table, optionally for a single owner
    async fn load_references(
        &self,
        field: &Field,
        owner: Option<i64>,
    ) -> Result<BTreeMap<i64, Vec<i64>>> {
        let mut sql = format!(
            "SELECT \"owner_id\", \"target_id\" FROM {}",
            join_table(Self::schema(), field)
        );
        let mut params = Vec::new();
        if let Some(id) = owner {
            sql.push_str(" WHERE \"owner_id\" = ?");
            params.push(DbValue::Int(id));
        }
        sql.push_str(" ORDER BY \"owner_id\", \"target_id\"");

        let mut grouped: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
        for row in self.pool.fetch_all(&sql, &params).await? {
            let owner_id = row_int(&row, "owner_id")?;
            let target_id = row_int(&row, "target_id")?;
            grouped.entry(owner_id).or_default().push(target_id);
        }
        Ok(grouped)
    }

    async fn write_references(tx: &mut DbTransaction, id: i64, fields: &Fields) -> Result<()> {
        let schema = Self::schema();
        for field in schema.references() {
            let table = join_table(schema, field);
            tx.execute(
                &format!("DELETE FROM {table} WHERE \"owner_id\" = ?"),
                &[DbValue::Int(id)],
            )
            .await?;
            let insert = format!("INSERT INTO {table} (\"owner_id\", \"target_id\") VALUES (?, ?)");
            for target in Self::reference_ids(fields, field) {
                tx.execute(&insert, &[DbValue::Int(id), DbValue::Int(target)])
                    .await?;
            }
        }
        Ok(())
    }

    fn build_record(
        row: &HashMap<String, DbValue>,
        references: &[(&Field, BTreeMap<i64, Vec<i64>>)],
    ) -> Result<E> {
        let id = row_int(row, "id")?;
        let mut fields = Fields::new();
        for field in Self::schema().columns() {
            let value = row
                .get(field.name)
                .map_or(Ok(Value::Null), serde_json::to_value)?;
            fields.insert(field.name.to_string(), value);
        }
        for (field, grouped) in references {
            let ids = grouped.get(&id).cloned().unwrap_or_default();
            fields.insert(field.name.to_string(), Value::from(ids));
        }
        E::from_fields(id, fields)
    }
}

fn row_int(row: &HashMap<String, DbValue>, column: &str) -> Result<i64> {
    row.get(column)
        .and_then(DbValue::as_int)
        .ok_or_else(|| Error::Database {
            message: format!("column {column} missing or not an integer"),
        })
}

#[async_trait]
impl<E: Entity> RecordStore for SqlStore<E> {
    type Record = E;

    async fn find_all(&self) -> Result<Vec<E>> {
        let sql = format!("{} ORDER BY \"id\"", Self::select_sql());
        let rows = self.pool.fetch_all(&sql, &[]).await?;

        let mut references = Vec::new();
        for field in Self::schema().references() {
            references.push((field, self.load_references(field, None).await?));
        }

        rows.iter()
            .map(|row| Self::build_record(row, &references))
            .collect()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<E>> {
        let sql = format!("{} WHERE \"id\" = ?", Self::select_sql());
        let Some(row) = self.pool.fetch_optional(&sql, &[DbValue::Int(id)]).await? else {
            return Ok(None);
        };

        let mut references = Vec::new();
        for field in Self::schema().references() {
            references.push((field, self.load_references(field, Some(id)).await?));
        }

        Self::build_record(&row, &references).map(Some)
    }

    async fn insert(&self, fields: Fields) -> Result<E> {
        let schema = Self::schema();
        let names: Vec<String> = schema.columns().map(|f| quoted(f.name)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING \"id\"",
            quoted(schema.table),
            names.join(", "),
            placeholders(names.len())
        );
        let mut tx = self.pool.begin().await?;
        let row = tx
            .fetch_optional(&sql, &Self::column_params(&fields))
            .await?
            .ok_or_else(|| Error::Database {
                message: format!("insert into {} returned no id", schema.table),
            })?;
        let id = row_int(&row, "id")?;

        Self::write_references(&mut tx, id, &fields).await?;
        tx.commit().await?;
        E::from_fields(id, fields)
    }

    async fn update(&self, record: &E) -> Result<bool> {
        let schema = Self::schema();
        let fields = record.to_fields()?;
        let assignments: Vec<String> = schema
            .columns()
            .map(|f| format!("{} = ?", quoted(f.name)))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE \"id\" = ?",
            quoted(schema.table),
            assignments.join(", ")
        );
        let mut params = Self::column_params(&fields);
        params.push(DbValue::Int(record.id()));

        let mut tx = self.pool.begin().await?;
        if tx.execute(&sql, &params).await? == 0 {
            return Ok(false);
        }
        Self::write_references(&mut tx, record.id(), &fields).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let schema = Self::schema();
        let mut tx = self.pool.begin().await?;
        for field in schema.references() {
            tx.execute(
                &format!(
                    "DELETE FROM {} WHERE \"owner_id\" = ?",
                    join_table(schema, field)
                ),
                &[DbValue::Int(id)],
            )
            .await?;
        }
        let sql = format!("DELETE FROM {} WHERE \"id\" = ?", quoted(schema.table));
        let deleted = tx.execute(&sql, &[DbValue::Int(id)]).await? > 0;
        tx.commit().await?;
        Ok(deleted)
    }

    async fn missing_ids(&self, ids: &[i64]) -> Result<Vec<i64>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT \"id\" FROM {} WHERE \"id\" IN ({})",
            quoted(Self::schema().table),
            placeholders(ids.len())
        );
        let params: Vec<DbValue> = ids.iter().copied().map(DbValue::from).collect();
        let found = self
            .pool
            .fetch_all(&sql, &params)
            .await?
            .iter()
            .map(|row| row_int(row, "id"))
            .collect::<Result<std::collections::HashSet<i64>>>()?;

        Ok(ids.iter().copied().filter(|id| !found.contains(id)).collect())
    }
}
