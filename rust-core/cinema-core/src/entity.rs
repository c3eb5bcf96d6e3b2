//! # Catalog Entities
//!
//! Plain records for the four catalog resources and the [`Entity`] trait that
//! ties each record type to its [`Schema`].

use crate::error::{Error, Result};
use crate::schema::{Field, Fields, Schema};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// A persisted catalog record
///
/// Records are built from cleaned [`Fields`] through serde, so the struct
/// field names must match the schema field names.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Field rules for this record type
    fn schema() -> &'static Schema;

    /// Store-assigned identifier
    fn id(&self) -> i64;

    /// Build a record from an id and a complete set of cleaned fields
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the fields do not deserialize into the record.
    fn from_fields(id: i64, mut fields: Fields) -> Result<Self> {
        fields.insert("id".to_string(), Value::from(id));
        Ok(serde_json::from_value(Value::Object(fields))?)
    }

    /// The record's fields, without `id`
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the record does not serialize to an object.
    fn to_fields(&self) -> Result<Fields> {
        let Value::Object(mut fields) = serde_json::to_value(self)? else {
            return Err(Error::Json(<serde_json::Error as serde::ser::Error>::custom(
                "record did not serialize to an object",
            )));
        };
        fields.remove("id");
        Ok(fields)
    }

    /// Copy of this record with `changes` applied over its current fields
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the merged fields do not form a valid record.
    fn merged(&self, changes: Fields) -> Result<Self> {
        let mut fields = self.to_fields()?;
        fields.extend(changes);
        Self::from_fields(self.id(), fields)
    }
}

/// Movie genre
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    /// Identifier
    pub id: i64,
    /// Display name
    pub name: String,
}

/// Screen actor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Identifier
    pub id: i64,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
}

/// Auditorium with a rectangular seat layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CinemaHall {
    /// Identifier
    pub id: i64,
    /// Hall name
    pub name: String,
    /// Number of seat rows
    pub rows: i64,
    /// Seats in each row
    pub seats_in_row: i64,
}

/// Film with actor and genre references
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movie {
    /// Identifier
    pub id: i64,
    /// Title
    pub title: String,
    /// Synopsis
    #[serde(default)]
    pub description: Option<String>,
    /// Running time in minutes
    pub duration: i64,
    /// Ids of [`Actor`] records
    pub actors: BTreeSet<i64>,
    /// Ids of [`Genre`] records
    pub genres: BTreeSet<i64>,
}

/// Genre field rules
pub static GENRE_SCHEMA: Schema = Schema {
    resource: "genres",
    table: "genres",
    fields: &[Field::text("name", 255)],
};

/// Actor field rules
pub static ACTOR_SCHEMA: Schema = Schema {
    resource: "actors",
    table: "actors",
    fields: &[Field::text("first_name", 255), Field::text("last_name", 255)],
};

/// Cinema hall field rules
pub static CINEMA_HALL_SCHEMA: Schema = Schema {
    resource: "cinema_halls",
    table: "cinema_halls",
    fields: &[
        Field::text("name", 255),
        Field::positive_int("rows"),
        Field::positive_int("seats_in_row"),
    ],
};

/// Movie field rules
pub static MOVIE_SCHEMA: Schema = Schema {
    resource: "movies",
    table: "movies",
    fields: &[
        Field::text("title", 255),
        Field::optional_text("description"),
        Field::positive_int("duration"),
        Field::references("actors", "actors"),
        Field::references("genres", "genres"),
    ],
};

/// Every catalog schema, in dependency order
pub static ALL_SCHEMAS: [&Schema; 4] = [
    &GENRE_SCHEMA,
    &ACTOR_SCHEMA,
    &CINEMA_HALL_SCHEMA,
    &MOVIE_SCHEMA,
];

impl Entity for Genre {
    fn schema() -> &'static Schema {
        &GENRE_SCHEMA
    }

    fn id(&self) -> i64 {
        self.id
    }
}

impl Entity for Actor {
    fn schema() -> &'static Schema {
        &ACTOR_SCHEMA
    }

    fn id(&self) -> i64 {
        self.id
    }
}

impl Entity for CinemaHall {
    fn schema() -> &'static Schema {
        &CINEMA_HALL_SCHEMA
    }

    fn id(&self) -> i64 {
        self.id
    }
}

impl Entity for Movie {
    fn schema() -> &'static Schema {
        &MOVIE_SCHEMA
    }

    fn id(&self) -> i64 {
        self.id
    }
}
