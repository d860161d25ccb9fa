use crate::types::Type;
use std::collections::HashMap;

/// Resolves a textual type name (as written in a cast such as `(MyApp.Status)1`) to a type.
///
/// This is the only way the binder learns about caller-defined enums; nothing is registered globally.
pub trait TypeLocator: Send + Sync {
    fn locate(&self, name: &str) -> Option<Type>;
}

impl<F> TypeLocator for F
where F: Fn(&str) -> Option<Type> + Send + Sync
{
    fn locate(&self, name: &str) -> Option<Type> { self(name) }
}

/// A fixed set of named types. Enums are also reachable by their unqualified name.
#[derive(Debug, Clone, Default)]
pub struct TypeMap(HashMap<String, Type>);

impl TypeMap {
    pub fn new() -> Self { Self::default() }

    pub fn with(mut self, ty: Type) -> Self {
        self.insert(ty);
        self
    }

    pub fn insert(&mut self, ty: Type) {
        let name = match &ty {
            Type::Enum(e) => {
                self.0.entry(e.short_name().to_string()).or_insert_with(|| ty.clone());
                e.name.clone()
            }
            other => other.to_string(),
        };
        self.0.insert(name, ty);
    }
}

impl TypeLocator for TypeMap {
    fn locate(&self, name: &str) -> Option<Type> { self.0.get(name).cloned() }
}
