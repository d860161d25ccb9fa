pub mod cache;
pub mod compiler;
pub mod config;
pub mod engine;
pub mod error;
pub mod eval;
pub mod locator;
pub mod members;
pub mod path;
pub mod query;
pub mod reflect;
pub mod types;
pub mod value;

pub use cache::CompileCache;
pub use compiler::CompiledLambda;
pub use config::EngineConfig;
pub use engine::{Predicate, QueryEngine, QueryEngineBuilder};
pub use error::{ParseError, PropertyResolutionError, QueryError, RangeError, TypeConversionError};
pub use locator::{TypeLocator, TypeMap};
pub use path::{Accessor, Getter, PropertyPath};
pub use reflect::{FromValue, Record, Reflect, Typed};
pub use types::{EnumType, ObjectType, Type};
pub use value::Value;

pub use sieveql;
pub use sieveql::{parse_expression, serialize};
