use crate::compiler::CompiledLambda;
use crate::error::QueryError;
use crate::path::Accessor;
use crate::types::Type;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, trace};

type Key = (String, Type);

/// Compiled lambdas and resolved accessors, keyed by source text and source type.
///
/// Entries depend on the parameter name and type locator of whoever compiled them, so a cache should
/// only be shared between engines configured alike.
#[derive(Debug, Default)]
pub struct CompileCache {
    lambdas: DashMap<Key, Arc<CompiledLambda>>,
    accessors: DashMap<Key, Arc<Accessor>>,
}

impl CompileCache {
    pub fn new() -> Self { Self::default() }

    /// Return the cached lambda for `text` over `ty`, compiling it on a miss. Failures are not cached.
    pub fn lambda<F>(&self, text: &str, ty: &Type, compile: F) -> Result<Arc<CompiledLambda>, QueryError>
    where F: FnOnce() -> Result<CompiledLambda, QueryError> {
        let key = (text.to_string(), ty.clone());
        if let Some(hit) = self.lambdas.get(&key) {
            trace!("lambda cache hit: {} over {}", text, ty);
            return Ok(hit.clone());
        }
        debug!("lambda cache miss: {} over {}", text, ty);
        // compile without holding a shard lock; a concurrent compile of the same key keeps the first insert
        let compiled = Arc::new(compile()?);
        Ok(self.lambdas.entry(key).or_insert(compiled).clone())
    }

    pub fn accessor<F>(&self, path: &str, ty: &Type, resolve: F) -> Result<Arc<Accessor>, QueryError>
    where F: FnOnce() -> Result<Accessor, QueryError> {
        let key = (path.to_string(), ty.clone());
        if let Some(hit) = self.accessors.get(&key) {
            trace!("accessor cache hit: {} over {}", path, ty);
            return Ok(hit.clone());
        }
        debug!("accessor cache miss: {} over {}", path, ty);
        let resolved = Arc::new(resolve()?);
        Ok(self.accessors.entry(key).or_insert(resolved).clone())
    }

    pub fn len(&self) -> usize { self.lambdas.len() + self.accessors.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn clear(&self) {
        self.lambdas.clear();
        self.accessors.clear();
    }
}
