use crate::compiler::CompiledLambda;
use crate::error::QueryError;
use crate::path::Accessor;
use crate::reflect::Reflect;
use crate::value::Value;
use std::sync::Arc;

/// A compiled key or value selector: either a resolved property path or a compiled lambda
#[derive(Debug, Clone)]
pub enum Projection {
    Path(Arc<Accessor>),
    Lambda(Arc<CompiledLambda>),
}

impl Projection {
    pub fn apply(&self, item: &dyn Reflect) -> Result<Value, QueryError> {
        match self {
            Projection::Path(accessor) => accessor.get(item),
            Projection::Lambda(lambda) => lambda.evaluate(item),
        }
    }
}

/// Projects each item to an untyped value. The first error is yielded and ends the stream.
pub struct Selected<I> {
    inner: I,
    projection: Projection,
    failed: bool,
}

impl<I> Selected<I> {
    pub fn new(inner: I, projection: Projection) -> Self { Self { inner, projection, failed: false } }
}

impl<I> Iterator for Selected<I>
where
    I: Iterator,
    I::Item: Reflect,
{
    type Item = Result<Value, QueryError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.inner.next()?;
        let result = self.projection.apply(&item);
        self.failed = result.is_err();
        Some(result)
    }
}
