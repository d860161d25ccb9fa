#![allow(dead_code)]

use sieve_core::{EnumType, ObjectType, Reflect, Type, Typed, Value};
use std::sync::{Arc, OnceLock};
use tracing::Level;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Active = 1,
    Retired = 2,
}

pub fn status_type() -> Arc<EnumType> {
    static STATUS: OnceLock<Arc<EnumType>> = OnceLock::new();
    STATUS.get_or_init(|| Arc::new(EnumType::new("MyApp.Status", [("Active", 1), ("Retired", 2)]))).clone()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub name: String,
    pub age: i32,
    pub status: Status,
    pub tags: Vec<String>,
    pub score: Option<f64>,
}

impl Person {
    pub fn new(name: &str, age: i32) -> Self {
        Self { name: name.to_string(), age, status: Status::Active, tags: Vec::new(), score: None }
    }

    pub fn retired(mut self) -> Self {
        self.status = Status::Retired;
        self
    }

    pub fn tagged(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn scored(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }
}

impl Reflect for Person {
    fn type_info(&self) -> Type { Self::static_type() }

    fn field(&self, name: &str) -> Option<Value> {
        Some(match name {
            "Name" => self.name.as_str().into(),
            "Age" => self.age.into(),
            "Status" => Value::Enum { ty: status_type(), value: self.status as i64 },
            "Tags" => self.tags.clone().into(),
            "Score" => self.score.into(),
            _ => return None,
        })
    }

    fn to_value(&self) -> Value { Value::Object(Arc::new(self.clone())) }
}

impl Typed for Person {
    fn static_type() -> Type {
        static TYPE: OnceLock<Type> = OnceLock::new();
        TYPE.get_or_init(|| {
            ObjectType::builder("Person")
                .field("Name", Type::String)
                .field("Age", Type::I32)
                .field("Status", Type::Enum(status_type()))
                .field("Tags", Type::list(Type::String))
                .field("Score", Type::nullable(Type::F64))
                .into_type()
        })
        .clone()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub value: i32,
    pub label: String,
}

impl Item {
    pub fn new(value: i32, label: &str) -> Self { Self { value, label: label.to_string() } }
}

impl Reflect for Item {
    fn type_info(&self) -> Type { Self::static_type() }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "Value" => Some(self.value.into()),
            "Label" => Some(self.label.as_str().into()),
            _ => None,
        }
    }

    fn to_value(&self) -> Value { Value::Object(Arc::new(self.clone())) }
}

impl Typed for Item {
    fn static_type() -> Type { ObjectType::builder("Item").field("Value", Type::I32).field("Label", Type::String).into_type() }
}

pub fn items(values: &[i32]) -> Vec<Item> { values.iter().map(|v| Item::new(*v, &format!("#{v}"))).collect() }

/// Holds a list and a nested object, for indexed and nested paths
#[derive(Debug, Clone)]
pub struct Holder {
    pub values: Vec<String>,
    pub obj: Item,
}

impl Reflect for Holder {
    fn type_info(&self) -> Type { Self::static_type() }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "Values" => Some(self.values.clone().into()),
            "Obj" => Some(Value::Object(Arc::new(self.obj.clone()))),
            _ => None,
        }
    }

    fn to_value(&self) -> Value { Value::Object(Arc::new(self.clone())) }
}

impl Typed for Holder {
    fn static_type() -> Type {
        ObjectType::builder("Holder").field("Values", Type::list(Type::String)).field("Obj", Item::static_type()).into_type()
    }
}

// Initialize tracing for tests
#[ctor::ctor]
fn init_tracing() { tracing_subscriber::fmt().with_max_level(Level::INFO).with_test_writer().init(); }
