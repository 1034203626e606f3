//! Classes, definitions and schema shared by the SQLite integration tests.
#![allow(dead_code)]

use persistent::prelude::*;
use persistent::RelationKind;
use persistent_sqlite::SqliteDatabase;

pub const SCHEMA: &str = "
CREATE TABLE person (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL
);
CREATE TABLE address (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    person_id INTEGER,
    city TEXT NOT NULL
);
CREATE TABLE tag (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    label TEXT NOT NULL UNIQUE
);
CREATE TABLE person_tag (
    person_id INTEGER NOT NULL,
    tag_id INTEGER NOT NULL,
    PRIMARY KEY (person_id, tag_id)
);
CREATE TABLE passport (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    person_id INTEGER,
    number TEXT NOT NULL
);
CREATE TABLE country (
    code TEXT PRIMARY KEY,
    name TEXT NOT NULL
);
";

#[derive(Debug, Default, Clone, PartialEq, PersistentObject)]
pub struct Person {
    pub id: Option<i64>,
    pub name: String,
}

impl Person {
    pub fn named(name: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, PersistentObject)]
pub struct Address {
    pub id: Option<i64>,
    #[persistent(rename = "personId")]
    pub person_id: Option<i64>,
    pub city: String,
}

impl Address {
    pub fn in_city(city: &str) -> Self {
        Self {
            city: city.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, PersistentObject)]
pub struct Tag {
    pub id: Option<i64>,
    pub label: String,
}

#[derive(Debug, Default, Clone, PartialEq, PersistentObject)]
pub struct Passport {
    pub id: Option<i64>,
    pub person_id: Option<i64>,
    pub number: String,
}

#[derive(Debug, Default, Clone, PartialEq, PersistentObject)]
#[persistent(class = "Country")]
pub struct Nation {
    pub code: Option<String>,
    pub name: String,
    #[persistent(skip)]
    pub visited: bool,
}

pub fn person_definition() -> ObjectDefinition {
    ObjectDefinition::new("Person", "person", IdProperty::new("id", "id"))
        .property("name", "name", PropertyType::String)
        .relation(
            RelationDefinition::one_to_many("Person", "Address")
                .column("id", "person_id")
                .cascade(true),
        )
        .relation(
            RelationDefinition::many_to_many(
                "Person",
                "Tag",
                JoinTable::new("person_tag", "person_id", "tag_id"),
            )
            .column("id", "id"),
        )
}

pub fn address_definition() -> ObjectDefinition {
    ObjectDefinition::new("Address", "address", IdProperty::new("id", "id"))
        .property("personId", "person_id", PropertyType::Int)
        .property("city", "city", PropertyType::String)
        .relation(RelationDefinition::many_to_one("Address", "Person").column("person_id", "id"))
}

pub fn tag_definition() -> ObjectDefinition {
    ObjectDefinition::new("Tag", "tag", IdProperty::new("id", "id"))
        .property("label", "label", PropertyType::String)
        .relation(
            RelationDefinition::many_to_many(
                "Tag",
                "Person",
                JoinTable::new("person_tag", "tag_id", "person_id"),
            )
            .column("id", "id")
            .reverse(true),
        )
}

pub fn passport_definition() -> ObjectDefinition {
    ObjectDefinition::new("Passport", "passport", IdProperty::new("id", "id"))
        .property("person_id", "person_id", PropertyType::Int)
        .property("number", "number", PropertyType::String)
}

pub fn country_definition() -> ObjectDefinition {
    ObjectDefinition::new(
        "Country",
        "country",
        IdProperty::new("code", "code")
            .property_type(PropertyType::String)
            .generator(IdGenerator::Manual),
    )
    .property("name", "name", PropertyType::String)
}

pub fn definitions() -> StaticManager {
    StaticManager::new()
        .with(person_definition())
        .and_then(|m| m.with(address_definition()))
        .and_then(|m| m.with(tag_definition()))
        .and_then(|m| m.with(passport_definition()))
        .and_then(|m| m.with(country_definition()))
        .unwrap()
}

/// Person and Passport cascading into each other through one-to-one relations.
pub fn cyclic_definitions() -> StaticManager {
    let person = ObjectDefinition::new("Person", "person", IdProperty::new("id", "id"))
        .property("name", "name", PropertyType::String)
        .relation(
            RelationDefinition::new("Person", "Passport", RelationKind::OneToOne)
                .column("id", "person_id")
                .cascade(true),
        );
    let passport = passport_definition().relation(
        RelationDefinition::one_to_one("Passport", "Person")
            .column("person_id", "id")
            .cascade(true),
    );
    StaticManager::new()
        .with(person)
        .and_then(|m| m.with(passport))
        .unwrap()
}

pub fn database() -> SqliteDatabase {
    let db = SqliteDatabase::open_memory().unwrap();
    db.execute_batch(SCHEMA).unwrap();
    db
}

pub fn session() -> Session<SqliteDatabase> {
    Session::new(database(), definitions())
}

/// Row count of `table`, read through the session.
pub fn count_rows(session: &Session<SqliteDatabase>, table: &str) -> i64 {
    let query = persistent::RawQuery::new(format!("SELECT COUNT(*) FROM {table}"));
    let mut statement = session.perform_query(&query).unwrap();
    let row = persistent::Statement::fetch(&mut statement).unwrap().unwrap();
    row.get(0).and_then(Value::as_i64).unwrap()
}
