//! The entry point: compiles expression text, property paths and filter descriptors against a source
//! type, and wraps sequences in the lazy query stages.
//!
//! Every method that takes text or descriptors fails before any element is touched when the text does
//! not parse, a property does not resolve, or a filter value does not convert. Failures while
//! evaluating individual elements are yielded by the returned stream instead.

use crate::cache::CompileCache;
use crate::compiler::CompiledLambda;
use crate::config::EngineConfig;
use crate::error::{ParseError, QueryError};
use crate::locator::TypeLocator;
use crate::path::{Accessor, Getter, PropertyPath};
use crate::query::{
    parse_order_spec, FilterBuilder, FilterCaseSensitivity, FilterDescriptor, FilteredStream, LogicalFilterOperator, Projection,
    Selected, SortDescriptor, SortKey, SortedStream,
};
use crate::reflect::{FromValue, Reflect, Typed};
use crate::types::Type;
use sieveql::ast::Expr;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::trace;

/// A compiled boolean expression over `T`
pub struct Predicate<T> {
    lambda: Arc<CompiledLambda>,
    _marker: PhantomData<fn(&T) -> bool>,
}

impl<T: Reflect> Predicate<T> {
    fn new(lambda: Arc<CompiledLambda>) -> Self { Self { lambda, _marker: PhantomData } }

    /// Whether `item` matches. A null result does not match.
    pub fn test(&self, item: &T) -> Result<bool, QueryError> { self.lambda.test(item) }

    pub fn lambda(&self) -> &Arc<CompiledLambda> { &self.lambda }

    /// The canonical text of this predicate
    pub fn serialize(&self) -> String { sieveql::serialize(self.lambda.expr()) }
}

impl<T> Clone for Predicate<T> {
    fn clone(&self) -> Self { Self { lambda: self.lambda.clone(), _marker: PhantomData } }
}

impl<T> fmt::Debug for Predicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.debug_tuple("Predicate").field(&self.lambda).finish() }
}

impl<T> fmt::Display for Predicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Display::fmt(&self.lambda, f) }
}

#[derive(Default)]
pub struct QueryEngineBuilder {
    config: EngineConfig,
    locator: Option<Arc<dyn TypeLocator>>,
    cache: Option<Arc<CompileCache>>,
}

impl QueryEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn locator(self, locator: impl TypeLocator + 'static) -> Self { self.shared_locator(Arc::new(locator)) }

    pub fn shared_locator(mut self, locator: Arc<dyn TypeLocator>) -> Self {
        self.locator = Some(locator);
        self
    }

    /// Share compiled expressions with other engines built with the same configuration and locator
    pub fn cache(mut self, cache: Arc<CompileCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> QueryEngine {
        let cache = match self.config.cache_compiled {
            true => Some(self.cache.unwrap_or_default()),
            false => None,
        };
        QueryEngine { config: self.config, locator: self.locator, cache }
    }
}

#[derive(Clone)]
pub struct QueryEngine {
    config: EngineConfig,
    locator: Option<Arc<dyn TypeLocator>>,
    cache: Option<Arc<CompileCache>>,
}

impl Default for QueryEngine {
    fn default() -> Self { Self::builder().build() }
}

impl fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryEngine")
            .field("config", &self.config)
            .field("locator", &self.locator.is_some())
            .field("cache", &self.cache.as_ref().map(|c| c.len()))
            .finish()
    }
}

impl QueryEngine {
    pub fn new() -> Self { Self::default() }

    pub fn builder() -> QueryEngineBuilder { QueryEngineBuilder::default() }

    pub fn config(&self) -> &EngineConfig { &self.config }

    pub fn cache(&self) -> Option<&Arc<CompileCache>> { self.cache.as_ref() }

    fn locator(&self) -> Option<&dyn TypeLocator> { self.locator.as_deref() }

    fn cached_lambda<F>(&self, key: &str, ty: &Type, compile: F) -> Result<Arc<CompiledLambda>, QueryError>
    where F: FnOnce() -> Result<CompiledLambda, QueryError> {
        match &self.cache {
            Some(cache) => cache.lambda(key, ty, compile),
            None => Ok(Arc::new(compile()?)),
        }
    }

    /// Compile expression text over `ty`. The text may be a lambda (`p => p.Age`) or a bare body that
    /// uses the configured implicit parameter (`Age`).
    pub fn compile(&self, text: &str, ty: &Type) -> Result<Arc<CompiledLambda>, QueryError> {
        self.cached_lambda(text, ty, || {
            let expr = sieveql::parse_expression(text)?;
            Ok(CompiledLambda::compile(&expr, ty, &self.config.parameter_name, self.locator())?)
        })
    }

    /// Compile boolean expression text over a runtime type
    pub fn parse_as(&self, text: &str, ty: &Type) -> Result<Arc<CompiledLambda>, QueryError> {
        let lambda = self.compile(text, ty)?;
        let result = lambda.result_type();
        if !result.is_bool() && !matches!(result, Type::Any) {
            return Err(ParseError::new(format!("Expression of type '{}' is not a predicate", result)).into());
        }
        Ok(lambda)
    }

    pub fn parse<T: Typed>(&self, text: &str) -> Result<Predicate<T>, QueryError> {
        Ok(Predicate::new(self.parse_as(text, &T::static_type())?))
    }

    /// Resolve a property path such as `"Obj.Values[2]"` over a runtime type
    pub fn getter_as(&self, path: &str, ty: &Type) -> Result<Arc<Accessor>, QueryError> {
        let resolve = || -> Result<Accessor, QueryError> { Ok(PropertyPath::parse(path)?.resolve(ty)?) };
        match &self.cache {
            Some(cache) => cache.accessor(path, ty, resolve),
            None => Ok(Arc::new(resolve()?)),
        }
    }

    pub fn getter<S: Typed, R: FromValue>(&self, path: &str) -> Result<Getter<S, R>, QueryError> {
        Ok(Getter::new(self.getter_as(path, &S::static_type())?))
    }

    /// A key or value selector: property paths resolve directly, anything else compiles as an expression
    fn projection(&self, text: &str, ty: &Type) -> Result<Projection, QueryError> {
        match PropertyPath::parse(text) {
            Ok(_) => Ok(Projection::Path(self.getter_as(text, ty)?)),
            Err(_) => Ok(Projection::Lambda(self.compile(text, ty)?)),
        }
    }

    /// Sort by a spec such as `"LastName, Age desc"` or `"it => it.Name.Length desc"`. Later keys only
    /// break ties of earlier ones, and items with equal keys keep their input order.
    pub fn order_by_as<I>(&self, source: I, spec: &str, ty: &Type) -> Result<SortedStream<I::IntoIter>, QueryError>
    where
        I: IntoIterator,
        I::Item: Reflect,
    {
        let keys = parse_order_spec(spec)?
            .into_iter()
            .map(|term| Ok(SortKey { projection: self.projection(&term.text, ty)?, order: term.order }))
            .collect::<Result<Vec<_>, QueryError>>()?;
        trace!("order plan over {}: {:?}", ty, keys);
        Ok(SortedStream::new(source.into_iter(), keys))
    }

    pub fn order_by<T, I>(&self, source: I, spec: &str) -> Result<SortedStream<I::IntoIter>, QueryError>
    where
        T: Typed,
        I: IntoIterator<Item = T>,
    {
        self.order_by_as(source, spec, &T::static_type())
    }

    pub fn order_by_descriptors<T, I>(&self, source: I, sorts: &[SortDescriptor]) -> Result<SortedStream<I::IntoIter>, QueryError>
    where
        T: Typed,
        I: IntoIterator<Item = T>,
    {
        self.order_by(source, &SortDescriptor::to_spec(sorts))
    }

    fn sensitivity(&self, requested: FilterCaseSensitivity) -> FilterCaseSensitivity {
        match requested {
            FilterCaseSensitivity::Default => self.config.case_sensitivity,
            explicit => explicit,
        }
    }

    /// The `it => ...` expression a set of descriptors translates to, or `None` for an empty set.
    /// `FilterCaseSensitivity::Default` falls back to the configured sensitivity.
    pub fn filter_expression(
        &self,
        ty: &Type,
        filters: &[FilterDescriptor],
        combinator: LogicalFilterOperator,
        case_sensitivity: FilterCaseSensitivity,
    ) -> Result<Option<Expr>, QueryError> {
        FilterBuilder::new(ty, &self.config.parameter_name, self.sensitivity(case_sensitivity)).build(filters, combinator)
    }

    pub fn filter_as<I>(
        &self,
        source: I,
        filters: &[FilterDescriptor],
        combinator: LogicalFilterOperator,
        case_sensitivity: FilterCaseSensitivity,
        ty: &Type,
    ) -> Result<FilteredStream<I::IntoIter>, QueryError>
    where
        I: IntoIterator,
        I::Item: Reflect,
    {
        // compiled from the canonical text so a cache entry is the same whichever path filled it
        let predicate = match self.filter_expression(ty, filters, combinator, case_sensitivity)? {
            Some(expr) => Some(self.parse_as(&sieveql::serialize(&expr), ty)?),
            None => None,
        };
        Ok(FilteredStream::new(source.into_iter(), predicate))
    }

    pub fn filter<T, I>(
        &self,
        source: I,
        filters: &[FilterDescriptor],
        combinator: LogicalFilterOperator,
        case_sensitivity: FilterCaseSensitivity,
    ) -> Result<FilteredStream<I::IntoIter>, QueryError>
    where
        T: Typed,
        I: IntoIterator<Item = T>,
    {
        self.filter_as(source, filters, combinator, case_sensitivity, &T::static_type())
    }

    /// Filter by boolean expression text
    pub fn filter_text_as<I>(&self, source: I, text: &str, ty: &Type) -> Result<FilteredStream<I::IntoIter>, QueryError>
    where
        I: IntoIterator,
        I::Item: Reflect,
    {
        Ok(FilteredStream::new(source.into_iter(), Some(self.parse_as(text, ty)?)))
    }

    pub fn filter_text<T, I>(&self, source: I, text: &str) -> Result<FilteredStream<I::IntoIter>, QueryError>
    where
        T: Typed,
        I: IntoIterator<Item = T>,
    {
        self.filter_text_as(source, text, &T::static_type())
    }

    /// Project each item through a property path or expression to an untyped value
    pub fn select_as<I>(&self, source: I, selector: &str, ty: &Type) -> Result<Selected<I::IntoIter>, QueryError>
    where
        I: IntoIterator,
        I::Item: Reflect,
    {
        Ok(Selected::new(source.into_iter(), self.projection(selector, ty)?))
    }

    pub fn select<T, I>(&self, source: I, selector: &str) -> Result<Selected<I::IntoIter>, QueryError>
    where
        T: Typed,
        I: IntoIterator<Item = T>,
    {
        self.select_as(source, selector, &T::static_type())
    }

    /// True for list types (and nullable lists), false for strings and scalars
    pub fn is_enumerable(ty: &Type) -> bool { ty.is_enumerable() }
}
