//! Ordering by textual specs such as `"Value desc"`, `"LastName, FirstName desc"` or `"it => it.Name.Length"`.

use super::descriptor::SortOrder;
use super::select::Projection;
use crate::error::{ParseError, QueryError};
use crate::reflect::Reflect;
use crate::value::Value;
use std::cmp::Ordering;

/// One comma-separated term of an order-by spec, with its direction suffix removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTerm {
    pub text: String,
    pub order: SortOrder,
}

/// Split an order-by spec on top-level commas. Commas inside parentheses, brackets, braces or string
/// literals belong to the term.
pub fn parse_order_spec(spec: &str) -> Result<Vec<OrderTerm>, ParseError> {
    let mut terms = Vec::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in spec.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            ',' if depth == 0 => {
                terms.push(term(&spec[start..i], start)?);
                start = i + 1;
            }
            _ => {}
        }
        if depth < 0 {
            return Err(ParseError::at("Unbalanced closing bracket in order-by", i));
        }
    }
    if in_string || depth != 0 {
        return Err(ParseError::at("Unterminated order-by term", start));
    }
    if !spec.trim().is_empty() {
        terms.push(term(&spec[start..], start)?);
    }
    Ok(terms)
}

fn term(text: &str, position: usize) -> Result<OrderTerm, ParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseError::at("Empty order-by term", position));
    }
    let (head, suffix) = match text.rsplit_once(char::is_whitespace) {
        Some((head, suffix)) => (head.trim_end(), suffix),
        None => (text, ""),
    };
    let order = match suffix.to_ascii_lowercase().as_str() {
        "asc" | "ascending" => Some(SortOrder::Ascending),
        "desc" | "descending" => Some(SortOrder::Descending),
        _ => None,
    };
    Ok(match order {
        Some(order) => OrderTerm { text: head.to_string(), order },
        None => OrderTerm { text: text.to_string(), order: SortOrder::Ascending },
    })
}

#[derive(Debug, Clone)]
pub struct SortKey {
    pub projection: Projection,
    pub order: SortOrder,
}

fn compare_keys(a: &[Value], b: &[Value], keys: &[SortKey]) -> Ordering {
    for ((x, y), key) in a.iter().zip(b).zip(keys) {
        let ordering = match key.order {
            SortOrder::Ascending => x.sort_cmp(y),
            SortOrder::Descending => y.sort_cmp(x),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Collects and stably sorts its input on the first pull, then yields in order.
pub struct SortedStream<I>
where I: Iterator
{
    inner: Option<I>,
    keys: Vec<SortKey>,
    sorted: Option<std::vec::IntoIter<Result<I::Item, QueryError>>>,
}

impl<I> SortedStream<I>
where I: Iterator
{
    pub fn new(inner: I, keys: Vec<SortKey>) -> Self { Self { inner: Some(inner), keys, sorted: None } }
}

impl<I> SortedStream<I>
where
    I: Iterator,
    I::Item: Reflect,
{
    fn collect_and_sort(inner: I, keys: &[SortKey]) -> Vec<Result<I::Item, QueryError>> {
        let mut keyed = Vec::new();
        for item in inner {
            let mut values = Vec::with_capacity(keys.len());
            for key in keys {
                match key.projection.apply(&item) {
                    Ok(value) => values.push(value),
                    Err(e) => return vec![Err(e)],
                }
            }
            keyed.push((values, item));
        }
        // stable, so equal keys keep their input order
        keyed.sort_by(|(a, _), (b, _)| compare_keys(a, b, keys));
        keyed.into_iter().map(|(_, item)| Ok(item)).collect()
    }
}

impl<I> Iterator for SortedStream<I>
where
    I: Iterator,
    I::Item: Reflect,
{
    type Item = Result<I::Item, QueryError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.sorted.is_none() {
            if let Some(inner) = self.inner.take() {
                self.sorted = Some(Self::collect_and_sort(inner, &self.keys).into_iter());
            }
        }
        self.sorted.as_mut()?.next()
    }
}
