//! Recording in-memory database and sample classes for unit tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::sync::Arc;

use persistent_core::object::property_from_value;
use persistent_core::{
    Database, Dialect, DriverError, IdProperty, JoinTable, ObjectDefinition, PersistentObject,
    PropertyType, RelationDefinition, Result, Row, State, StaticManager, Statement, Value,
};

#[derive(Debug, Clone)]
enum Failure {
    Code(i32),
    Error(String),
}

/// Logs every statement and transaction command; SELECTs are answered from
/// queued row sets.
#[derive(Debug, Default)]
pub(crate) struct FakeDatabase {
    log: RefCell<Vec<String>>,
    failures: RefCell<Vec<(String, Failure)>>,
    rows: RefCell<VecDeque<(String, Arc<Vec<String>>, Vec<Vec<Value>>)>>,
    last_insert_id: Cell<i64>,
    rows_affected: Cell<u64>,
}

impl FakeDatabase {
    pub(crate) fn log(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    /// Statements containing `pattern` execute but report `code`.
    pub(crate) fn fail_with_code(&self, pattern: &str, code: i32) {
        self.failures
            .borrow_mut()
            .push((pattern.to_string(), Failure::Code(code)));
    }

    /// Statements (or transaction commands) containing `pattern` fail outright.
    pub(crate) fn fail_with_error(&self, pattern: &str, message: &str) {
        self.failures
            .borrow_mut()
            .push((pattern.to_string(), Failure::Error(message.to_string())));
    }

    /// The next SELECT containing `pattern` returns `rows`.
    pub(crate) fn push_rows(&self, pattern: &str, columns: &[&str], rows: Vec<Vec<Value>>) {
        let columns = Arc::new(columns.iter().map(|c| (*c).to_string()).collect());
        self.rows
            .borrow_mut()
            .push_back((pattern.to_string(), columns, rows));
    }

    pub(crate) fn set_last_insert_id(&self, id: i64) {
        self.last_insert_id.set(id);
    }

    pub(crate) fn set_rows_affected(&self, rows: u64) {
        self.rows_affected.set(rows);
    }

    fn failure_for(&self, text: &str) -> Option<Failure> {
        self.failures
            .borrow()
            .iter()
            .find(|(pattern, _)| text.contains(pattern.as_str()))
            .map(|(_, failure)| failure.clone())
    }

    fn command(&self, command: &str) -> std::result::Result<(), DriverError> {
        self.log.borrow_mut().push(command.to_string());
        match self.failure_for(command) {
            Some(Failure::Error(message)) => Err(DriverError::new(1, message)),
            _ => Ok(()),
        }
    }
}

#[derive(Debug)]
pub(crate) struct FakeStatement {
    failure: Option<Failure>,
    code: i32,
    rows: VecDeque<Row>,
    rows_affected: u64,
}

impl Statement for FakeStatement {
    fn execute(&mut self) -> std::result::Result<(), DriverError> {
        match &self.failure {
            Some(Failure::Error(message)) => Err(DriverError::new(1, message.clone())),
            Some(Failure::Code(code)) => {
                self.code = *code;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn error_code(&self) -> i32 {
        self.code
    }

    fn fetch(&mut self) -> std::result::Result<Option<Row>, DriverError> {
        Ok(self.rows.pop_front())
    }

    fn rows_affected(&self) -> u64 {
        self.rows_affected
    }
}

impl Database for FakeDatabase {
    type Statement<'conn> = FakeStatement;

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn begin_transaction(&self) -> std::result::Result<(), DriverError> {
        self.command("BEGIN")
    }

    fn commit(&self) -> std::result::Result<(), DriverError> {
        self.command("COMMIT")
    }

    fn rollback(&self) -> std::result::Result<(), DriverError> {
        self.command("ROLLBACK")
    }

    fn prepare(&self, sql: &str, _params: &[Value]) -> std::result::Result<FakeStatement, DriverError> {
        self.log.borrow_mut().push(sql.to_string());
        let mut rows = VecDeque::new();
        if sql.starts_with("SELECT") {
            let mut queued = self.rows.borrow_mut();
            if let Some(index) = queued.iter().position(|(pattern, _, _)| sql.contains(pattern.as_str())) {
                if let Some((_, columns, values)) = queued.remove(index) {
                    rows.extend(values.into_iter().map(|v| Row::new(Arc::clone(&columns), v)));
                }
            }
        }
        Ok(FakeStatement {
            failure: self.failure_for(sql),
            code: 0,
            rows,
            rows_affected: self.rows_affected.get(),
        })
    }

    fn last_insert_id(&self, _sequence: Option<&str>) -> std::result::Result<Value, DriverError> {
        let id = self.last_insert_id.get().max(1);
        self.last_insert_id.set(id + 1);
        Ok(Value::BigInt(id))
    }
}

// ============================================================================
// Sample classes
// ============================================================================

/// Person (1) -> Address (n), cascading; Person (n) <-> Tag (n) through
/// `person_tag`, owned by Person.
pub(crate) fn definitions() -> StaticManager {
    let person = ObjectDefinition::new("Person", "person", IdProperty::new("id", "id"))
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
        );
    let address = ObjectDefinition::new("Address", "address", IdProperty::new("id", "id"))
        .property("person_id", "person_id", PropertyType::Int)
        .property("city", "city", PropertyType::String)
        .relation(RelationDefinition::many_to_one("Address", "Person").column("person_id", "id"));
    let tag = ObjectDefinition::new("Tag", "tag", IdProperty::new("id", "id"))
        .property("label", "label", PropertyType::String)
        .relation(
            RelationDefinition::many_to_many(
                "Tag",
                "Person",
                JoinTable::new("person_tag", "tag_id", "person_id"),
            )
            .column("id", "id")
            .reverse(true),
        );

    let mut manager = StaticManager::new();
    for definition in [person, address, tag] {
        if let Err(err) = manager.register(definition) {
            panic!("sample definition rejected: {err}");
        }
    }
    manager
}

#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct Person {
    pub(crate) id: Option<i64>,
    pub(crate) name: String,
    /// Not mapped; only present in the state when set.
    pub(crate) nickname: Option<String>,
}

impl PersistentObject for Person {
    const CLASS: &'static str = "Person";

    fn state(&self) -> State {
        let mut state = State::from([
            ("id".to_string(), Value::from(self.id)),
            ("name".to_string(), Value::from(self.name.clone())),
        ]);
        if let Some(nickname) = &self.nickname {
            state.insert("nickname".to_string(), Value::from(nickname.clone()));
        }
        state
    }

    fn set_state(&mut self, state: &State) -> Result<()> {
        if let Some(v) = state.get("id") {
            self.id = property_from_value(Self::CLASS, "id", v)?;
        }
        if let Some(v) = state.get("name") {
            self.name = property_from_value(Self::CLASS, "name", v)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct Address {
    pub(crate) id: Option<i64>,
    pub(crate) person_id: Option<i64>,
    pub(crate) city: String,
}

impl PersistentObject for Address {
    const CLASS: &'static str = "Address";

    fn state(&self) -> State {
        State::from([
            ("id".to_string(), Value::from(self.id)),
            ("person_id".to_string(), Value::from(self.person_id)),
            ("city".to_string(), Value::from(self.city.clone())),
        ])
    }

    fn set_state(&mut self, state: &State) -> Result<()> {
        if let Some(v) = state.get("id") {
            self.id = property_from_value(Self::CLASS, "id", v)?;
        }
        if let Some(v) = state.get("person_id") {
            self.person_id = property_from_value(Self::CLASS, "person_id", v)?;
        }
        if let Some(v) = state.get("city") {
            self.city = property_from_value(Self::CLASS, "city", v)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct Tag {
    pub(crate) id: Option<i64>,
    pub(crate) label: String,
}

impl PersistentObject for Tag {
    const CLASS: &'static str = "Tag";

    fn state(&self) -> State {
        State::from([
            ("id".to_string(), Value::from(self.id)),
            ("label".to_string(), Value::from(self.label.clone())),
        ])
    }

    fn set_state(&mut self, state: &State) -> Result<()> {
        if let Some(v) = state.get("id") {
            self.id = property_from_value(Self::CLASS, "id", v)?;
        }
        if let Some(v) = state.get("label") {
            self.label = property_from_value(Self::CLASS, "label", v)?;
        }
        Ok(())
    }
}
