mod common;

use anyhow::Result;
use common::*;
use sieve_core::query::{FilterCaseSensitivity, FilterDescriptor, FilterOperator, LogicalFilterOperator};
use sieve_core::{CompileCache, QueryEngine, Type, TypeMap, Typed};
use std::sync::Arc;

fn population() -> Vec<Person> {
    let names = ["Ann", "Ben", "Cleo", "Dan", "Eve", "Finn", "Gus", "Hal", "Ida", "Jo"];
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let i = i as i32;
            let mut person = Person::new(name, 15 + i * 6);
            if i % 3 == 0 {
                person = person.retired();
            }
            if i % 2 == 0 {
                person = person.scored(10.0 * i as f64);
            }
            person.tagged(if i % 4 == 0 { &["x", "y"][..] } else { &["y"][..] })
        })
        .collect()
}

fn matching(engine: &QueryEngine, filters: &[FilterDescriptor], combinator: LogicalFilterOperator) -> Result<Vec<String>> {
    let stream = engine.filter(population(), filters, combinator, FilterCaseSensitivity::Default)?;
    Ok(stream.map(|r| r.map(|p| p.name)).collect::<Result<_, _>>()?)
}

#[test]
fn and_is_a_subset_of_or() -> Result<()> {
    let engine = QueryEngine::new();
    let cases = vec![
        vec![FilterDescriptor::new("Age", FilterOperator::GreaterThan, 30), FilterDescriptor::new("Name", FilterOperator::Contains, "n")],
        vec![FilterDescriptor::new("Status", FilterOperator::Equals, "Retired"), FilterDescriptor::unary("Score", FilterOperator::IsNull)],
        vec![
            FilterDescriptor::new("Tags", FilterOperator::Contains, "x"),
            FilterDescriptor::new("Age", FilterOperator::LessThanOrEquals, 40),
            FilterDescriptor::new("Score", FilterOperator::GreaterThanOrEquals, 20.5),
        ],
        vec![FilterDescriptor::new("Name", FilterOperator::NotIn, vec!["Ann", "Jo"])],
    ];
    for filters in cases {
        let all = matching(&engine, &filters, LogicalFilterOperator::And)?;
        let any = matching(&engine, &filters, LogicalFilterOperator::Or)?;
        assert!(all.iter().all(|name| any.contains(name)), "{all:?} is not within {any:?}");
    }
    Ok(())
}

#[test]
fn equal_keys_keep_input_order() -> Result<()> {
    let engine = QueryEngine::new();
    let data = vec![Item::new(2, "a"), Item::new(1, "b"), Item::new(2, "c"), Item::new(1, "d"), Item::new(2, "e")];
    let labels = |spec: &str| -> Result<Vec<String>> {
        Ok(engine.order_by(data.clone(), spec)?.map(|r| r.map(|i| i.label)).collect::<Result<_, _>>()?)
    };
    assert_eq!(labels("Value")?, vec!["b", "d", "a", "c", "e"]);
    assert_eq!(labels("Value desc")?, vec!["a", "c", "e", "b", "d"]);
    assert_eq!(labels("Value, Label desc")?, vec!["d", "b", "e", "c", "a"]);
    Ok(())
}

#[test]
fn getter_matches_manual_traversal() -> Result<()> {
    let engine = QueryEngine::new();
    let holders = [
        Holder { values: vec!["x".into(), "y".into(), "z".into()], obj: Item::new(3, "three") },
        Holder { values: vec!["only".into(), "two".into(), "three".into()], obj: Item::new(-9, "") },
    ];
    let value = engine.getter::<Holder, i32>("Obj.Value")?;
    let label_length = engine.getter::<Holder, i32>("Obj.Label.Length")?;
    let third = engine.getter::<Holder, String>("Values[2]")?;
    let count = engine.getter::<Holder, i32>("Values.Count")?;
    for holder in &holders {
        assert_eq!(value.get(holder)?, holder.obj.value);
        assert_eq!(label_length.get(holder)? as usize, holder.obj.label.len());
        assert_eq!(third.get(holder)?, holder.values[2]);
        assert_eq!(count.get(holder)? as usize, holder.values.len());
    }
    Ok(())
}

#[test]
fn canonical_text_is_stable() -> Result<()> {
    let engine = QueryEngine::builder().locator(TypeMap::new().with(Type::Enum(status_type()))).build();
    let ty = Person::static_type();
    let inputs = [
        r#"Age > 18 && Name.Contains("a")"#,
        r#"p => p.Tags.Any(t => t.StartsWith("x")) || p.Score == null"#,
        r#"Status == "Retired""#,
        "Status != MyApp.Status.Active",
        r#"(new [] { "Alice", "Bob" }).Contains(Name)"#,
        "(long)5 + Age > 6",
        "(Score ?? 0.0) > 1.5",
        "Age >= 18 ? Name.Length > 3 : Tags.Count == 0",
    ];
    for input in inputs {
        let first = engine.parse_as(input, &ty)?.to_string();
        let second = engine.parse_as(&first, &ty)?.to_string();
        assert_eq!(first, second, "canonical form of {input:?} changed on reparse");
    }

    let filters = [
        FilterDescriptor::new("Status", FilterOperator::In, vec!["Active"]),
        FilterDescriptor::unary("Tags", FilterOperator::IsNotEmpty),
    ];
    let expr = engine.filter_expression(&ty, &filters, LogicalFilterOperator::And, FilterCaseSensitivity::Default)?;
    let text = sieve_core::serialize(&expr.expect("non-empty filter"));
    assert_eq!(engine.parse_as(&text, &ty)?.to_string(), text);
    Ok(())
}

#[test]
fn shared_cache_across_threads() -> Result<()> {
    let cache = Arc::new(CompileCache::new());
    let engine = QueryEngine::builder().cache(cache.clone()).build();
    let ty = Person::static_type();

    let compiled = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4).map(|_| scope.spawn(|| engine.clone().parse_as("Age > 40", &ty))).collect();
        handles.into_iter().map(|h| h.join().expect("compile thread panicked")).collect::<Result<Vec<_>, _>>()
    })?;
    assert!(compiled.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    assert_eq!(cache.len(), 1);

    let other = QueryEngine::builder().cache(cache.clone()).build();
    assert!(Arc::ptr_eq(&other.parse_as("Age > 40", &ty)?, &compiled[0]));
    Ok(())
}
