mod common;

use anyhow::Result;
use common::*;
use sieve_core::query::{aggregate, FilterCaseSensitivity, FilterDescriptor, FilterOperator, LogicalFilterOperator, SortDescriptor};
use sieve_core::{ObjectType, QueryEngine, QueryError, RangeError, Record, Type, TypeMap, Typed, Value};

fn values<I: Iterator<Item = Result<Item, QueryError>>>(stream: I) -> Result<Vec<i32>> {
    Ok(stream.map(|r| r.map(|i| i.value)).collect::<Result<_, _>>()?)
}

fn names<I: Iterator<Item = Result<Person, QueryError>>>(stream: I) -> Result<Vec<String>> {
    Ok(stream.map(|r| r.map(|p| p.name)).collect::<Result<_, _>>()?)
}

fn people() -> Vec<Person> {
    vec![
        Person::new("Alice", 34).tagged(&["admin", "ops"]).scored(81.5),
        Person::new("Bob", 17).tagged(&["intern"]),
        Person::new("Carol", 52).retired().scored(40.0),
        Person::new("Dave", 41).tagged(&["ops"]).scored(65.0),
    ]
}

fn status_engine() -> QueryEngine { QueryEngine::builder().locator(TypeMap::new().with(Type::Enum(status_type()))).build() }

#[test]
fn parse_lambda_predicate() -> Result<()> {
    let engine = QueryEngine::new();
    let predicate = engine.parse::<Person>(r#"p => p.Name == "foo""#)?;
    assert!(predicate.test(&Person::new("foo", 30))?);
    assert!(!predicate.test(&Person::new("bar", 30))?);
    Ok(())
}

#[test]
fn serialize_compiled_predicate() -> Result<()> {
    let engine = QueryEngine::new();
    assert_eq!(engine.parse::<Person>("e => e.Age > 18")?.serialize(), "e => (e.Age > 18)");
    assert_eq!(engine.parse::<Person>("Age > 18")?.to_string(), "it => (it.Age > 18)");
    Ok(())
}

#[test]
fn where_by_descriptor() -> Result<()> {
    let engine = QueryEngine::new();
    let filters = [FilterDescriptor::new("Value", FilterOperator::GreaterThan, 200)];
    let matched = engine.filter(items(&[100, 150, 200, 250, 300]), &filters, LogicalFilterOperator::And, FilterCaseSensitivity::Default)?;
    assert_eq!(values(matched)?, vec![250, 300]);

    // no descriptors passes everything through
    let all = engine.filter(items(&[1, 2]), &[], LogicalFilterOperator::And, FilterCaseSensitivity::Default)?;
    assert_eq!(values(all)?, vec![1, 2]);
    Ok(())
}

#[test]
fn order_by_descending() -> Result<()> {
    let engine = QueryEngine::new();
    let sorted = engine.order_by(items(&[100, 200, 150, 300, 250]), "Value desc")?;
    assert_eq!(values(sorted)?, vec![300, 250, 200, 150, 100]);

    let sorted = engine.order_by_descriptors(items(&[3, 1, 2]), &[SortDescriptor::ascending("Value")])?;
    assert_eq!(values(sorted)?, vec![1, 2, 3]);
    Ok(())
}

#[test]
fn getter_indexed_path() -> Result<()> {
    let engine = QueryEngine::new();
    let holder = Holder { values: vec!["1".into(), "2".into(), "3".into()], obj: Item::new(7, "seven") };
    assert_eq!(engine.getter::<Holder, String>("Values[1]")?.get(&holder)?, "2");
    assert_eq!(engine.getter::<Holder, i32>("Obj.Value")?.get(&holder)?, 7);

    // resolution succeeds, the bounds check happens per instance
    let out_of_range = engine.getter::<Holder, String>("Values[5]")?;
    assert_eq!(out_of_range.get(&holder), Err(QueryError::Range(RangeError::IndexOutOfRange { index: 5, len: 3 })));

    assert!(matches!(engine.getter::<Holder, String>("Obj.Missing"), Err(QueryError::Property(_))));
    Ok(())
}

#[test]
fn runtime_typed_getter() -> Result<()> {
    let engine = QueryEngine::new();
    let ty = ObjectType::builder("Row").field("Values", Type::list(Type::I32)).build();
    let row = Record::from_json(&ty, &serde_json::json!({ "Values": [4, 5, 6] }))?;
    let accessor = engine.getter_as("values[2]", &Type::Object(ty))?;
    assert_eq!(accessor.path(), "values[2]");
    assert_eq!(accessor.get(&row)?, Value::I32(6));
    Ok(())
}

#[test]
fn enumerable_types() {
    assert!(!QueryEngine::is_enumerable(&Type::String));
    assert!(QueryEngine::is_enumerable(&Type::list(Type::I32)));
    assert!(!QueryEngine::is_enumerable(&Person::static_type()));
}

#[test]
fn enum_literals_through_locator() -> Result<()> {
    let engine = status_engine();
    let retired = engine.parse::<Person>("Status == MyApp.Status.Retired")?;
    assert_eq!(retired.serialize(), "it => (it.Status == 2)");
    assert_eq!(names(engine.filter_text(people(), "Status == (MyApp.Status)2")?)?, vec!["Carol"]);

    let closure_engine = QueryEngine::builder()
        .locator(|name: &str| (name == "Ns.State").then(|| Type::Enum(status_type())))
        .build();
    assert_eq!(closure_engine.parse::<Person>("Status != (Ns.State)1")?.serialize(), "it => (it.Status != 1)");

    // without a locator the type name means nothing
    assert!(matches!(QueryEngine::new().parse::<Person>("Status == (MyApp.Status)1"), Err(QueryError::Parse(_))));
    Ok(())
}

#[test]
fn nullable_members_do_not_match() -> Result<()> {
    let engine = QueryEngine::new();
    assert_eq!(names(engine.filter_text(people(), "Score > 50")?)?, vec!["Alice", "Dave"]);
    assert_eq!(names(engine.filter_text(people(), "Score == null")?)?, vec!["Bob"]);
    assert_eq!(names(engine.filter_text(people(), "(Score ?? 100.0) > 80")?)?, vec!["Alice", "Bob"]);
    Ok(())
}

#[test]
fn sequence_methods() -> Result<()> {
    let engine = QueryEngine::new();
    assert_eq!(names(engine.filter_text(people(), r#"p => p.Tags.Any(t => t.StartsWith("o"))"#)?)?, vec!["Alice", "Dave"]);
    assert_eq!(names(engine.filter_text(people(), r#"(new [] { "Bob", "Carol" }).Contains(Name)"#)?)?, vec!["Bob", "Carol"]);
    assert_eq!(names(engine.filter_text(people(), r#"Tags.Except(new [] { "ops" }).Any()"#)?)?, vec!["Alice", "Bob"]);
    assert_eq!(names(engine.filter_text(people(), "!Tags.Any()")?)?, vec!["Carol"]);
    Ok(())
}

#[test]
fn collection_descriptors() -> Result<()> {
    let engine = QueryEngine::new();
    let run = |filters: &[FilterDescriptor]| -> Result<Vec<String>> {
        names(engine.filter(people(), filters, LogicalFilterOperator::And, FilterCaseSensitivity::Default)?)
    };

    assert_eq!(run(&[FilterDescriptor::new("Name", FilterOperator::In, vec!["Alice", "Dave"])])?, vec!["Alice", "Dave"]);
    assert_eq!(run(&[FilterDescriptor::new("Tags", FilterOperator::Contains, "ops")])?, vec!["Alice", "Dave"]);
    assert_eq!(run(&[FilterDescriptor::new("Tags", FilterOperator::Contains, vec!["intern", "admin"])])?, vec!["Alice", "Bob"]);
    assert_eq!(run(&[FilterDescriptor::unary("Tags", FilterOperator::IsEmpty)])?, vec!["Carol"]);
    assert_eq!(run(&[FilterDescriptor::new("Status", FilterOperator::Equals, "Retired")])?, vec!["Carol"]);
    assert_eq!(
        run(&[FilterDescriptor::new("Age", FilterOperator::GreaterThanOrEquals, 30).with_second(
            LogicalFilterOperator::And,
            FilterOperator::LessThan,
            50
        )])?,
        vec!["Alice", "Dave"]
    );
    Ok(())
}

#[test]
fn descriptor_expression_is_serializable() -> Result<()> {
    let engine = QueryEngine::new();
    let filters = [
        FilterDescriptor::new("Name", FilterOperator::Contains, "Al"),
        FilterDescriptor::new("Tags", FilterOperator::In, vec!["ops"]),
    ];
    let expr = engine.filter_expression(&Person::static_type(), &filters, LogicalFilterOperator::Or, FilterCaseSensitivity::Default)?;
    let text = sieve_core::serialize(&expr.expect("non-empty filter"));
    assert_eq!(text, r#"it => (it.Name.Contains("Al") || (new [] { "ops" }).Intersect(it.Tags).Any())"#);
    Ok(())
}

#[test]
fn filter_failures_are_immediate() {
    let engine = QueryEngine::new();
    let filter = |descriptor: FilterDescriptor| {
        engine.filter(people(), &[descriptor], LogicalFilterOperator::And, FilterCaseSensitivity::Default).map(|_| ())
    };
    assert!(matches!(filter(FilterDescriptor::new("Nickname", FilterOperator::Equals, "x")), Err(QueryError::Property(_))));
    assert!(matches!(filter(FilterDescriptor::new("Age", FilterOperator::Equals, "old")), Err(QueryError::Conversion(_))));
    assert!(matches!(filter(FilterDescriptor::new("Tags", FilterOperator::StartsWith, "a")), Err(QueryError::Conversion(_))));
    assert!(matches!(filter(FilterDescriptor::unary("Age", FilterOperator::GreaterThan)), Err(QueryError::Conversion(_))));
}

#[test]
fn evaluation_errors_stop_collection() -> Result<()> {
    let engine = QueryEngine::new();
    let mut stream = engine.filter_text(items(&[100, 200, 300]), "10 / (Value - 200) == 0")?;
    assert_eq!(stream.next().map(|r| r.map(|i| i.value)), Some(Ok(100)));
    assert_eq!(stream.next().map(|r| r.map(|i| i.value)), Some(Err(QueryError::Range(RangeError::DivideByZero))));
    assert!(stream.next().is_none());

    let collected: Result<Vec<Item>, QueryError> = engine.filter_text(items(&[100, 200, 300]), "10 / (Value - 200) == 0")?.collect();
    assert!(collected.is_err());
    Ok(())
}

#[test]
fn select_and_aggregate() -> Result<()> {
    let engine = QueryEngine::new();
    let data = || items(&[4, 1, 4, 3]);

    assert_eq!(aggregate::sum(engine.select(data(), "Value")?)?, Value::I32(12));
    assert_eq!(aggregate::average(engine.select(data(), "Value")?)?, Value::F64(3.0));
    assert_eq!(aggregate::min(engine.select(data(), "Value")?)?, Value::I32(1));
    assert_eq!(aggregate::max(engine.select(data(), "it => it.Value * 2")?)?, Value::I32(8));
    assert_eq!(aggregate::distinct(engine.select(data(), "Value")?)?, vec![Value::I32(4), Value::I32(1), Value::I32(3)]);
    assert_eq!(aggregate::cast(engine.select(data(), "Value")?, &Type::String)?[0], Value::String("4".into()));
    assert_eq!(aggregate::count(engine.select(data(), "Label")?)?, 4);
    assert_eq!(aggregate::average(engine.select(Vec::<Item>::new(), "Value")?)?, Value::Null);
    assert_eq!(aggregate::sum(engine.select(Vec::<Item>::new(), "Value")?)?, Value::I32(0));

    let first = aggregate::first_or_default(engine.order_by(data(), "Value desc, Label")?)?;
    assert_eq!(first.map(|i| i.value), Some(4));
    let last = aggregate::last_or_default(engine.order_by(data(), "Value")?)?;
    assert_eq!(last.map(|i| i.value), Some(4));
    assert!(aggregate::first_or_default(engine.order_by(Vec::<Item>::new(), "Value")?)?.is_none());

    let scores = aggregate::to_list(engine.select(people(), "Score")?)?;
    assert_eq!(scores, vec![Value::F64(81.5), Value::Null, Value::F64(40.0), Value::F64(65.0)]);
    assert_eq!(aggregate::min(scores.into_iter().map(Ok))?, Value::F64(40.0));
    Ok(())
}

#[test]
fn case_insensitive_where() -> Result<()> {
    let engine = QueryEngine::new();
    let filters = [FilterDescriptor::new("Name", FilterOperator::EndsWith, "E")];
    let sensitive = engine.filter(people(), &filters, LogicalFilterOperator::And, FilterCaseSensitivity::Default)?;
    assert!(names(sensitive)?.is_empty());
    let insensitive = engine.filter(people(), &filters, LogicalFilterOperator::And, FilterCaseSensitivity::CaseInsensitive)?;
    assert_eq!(names(insensitive)?, vec!["Alice", "Dave"]);
    Ok(())
}

#[test]
fn json_records() -> Result<()> {
    let engine = QueryEngine::new();
    let ty = ObjectType::builder("Order").field("Customer", Type::String).field("Total", Type::F64).build();
    let orders = [("acme", 10.5), ("Initech", 99.0), ("acme", 75.25)]
        .iter()
        .map(|(customer, total)| Record::from_json(&ty, &serde_json::json!({ "Customer": customer, "Total": total })))
        .collect::<Result<Vec<_>, _>>()?;

    let big = engine.filter_as(
        orders.clone(),
        &[FilterDescriptor::new("Total", FilterOperator::GreaterThan, 50)],
        LogicalFilterOperator::And,
        FilterCaseSensitivity::Default,
        &Type::Object(ty.clone()),
    )?;
    let totals: Vec<Value> = big.map(|r| r.map(|o| o.get("Total").cloned().unwrap_or(Value::Null))).collect::<Result<_, _>>()?;
    assert_eq!(totals, vec![Value::F64(99.0), Value::F64(75.25)]);

    let customers = aggregate::distinct(engine.select_as(orders, "Customer", &Type::Object(ty))?)?;
    assert_eq!(customers, vec![Value::String("acme".into()), Value::String("Initech".into())]);
    Ok(())
}

#[test]
fn case_insensitive_collection_filters() -> Result<()> {
    let engine = QueryEngine::new();
    let crew = || vec![Person::new("Alice", 30).tagged(&["Ops"]), Person::new("Bob", 40).tagged(&["dev"])];
    let run = |descriptor: FilterDescriptor| -> Result<Vec<String>> {
        names(engine.filter(crew(), &[descriptor], LogicalFilterOperator::And, FilterCaseSensitivity::CaseInsensitive)?)
    };

    assert_eq!(run(FilterDescriptor::new("Tags", FilterOperator::In, vec!["ops"]))?, vec!["Alice"]);
    assert_eq!(run(FilterDescriptor::new("Tags", FilterOperator::NotIn, vec!["ops"]))?, vec!["Bob"]);
    assert_eq!(run(FilterDescriptor::new("Tags", FilterOperator::Contains, "OPS"))?, vec!["Alice"]);
    assert_eq!(run(FilterDescriptor::new("Tags", FilterOperator::Contains, vec!["DEV", "qa"]))?, vec!["Bob"]);
    assert_eq!(run(FilterDescriptor::new("Tags", FilterOperator::DoesNotContain, "ops"))?, vec!["Bob"]);
    assert_eq!(run(FilterDescriptor::new("Name", FilterOperator::Equals, "alice"))?, vec!["Alice"]);

    // the default setting still compares exactly
    let ops = [FilterDescriptor::new("Tags", FilterOperator::In, vec!["ops"])];
    let exact = engine.filter(crew(), &ops, LogicalFilterOperator::And, FilterCaseSensitivity::Default)?;
    assert!(names(exact)?.is_empty());
    Ok(())
}

#[test]
fn descriptor_and_text_agree_through_the_cache() -> Result<()> {
    let ty = ObjectType::builder("Reading").field("Score", Type::F32).build();
    let rows = || -> Result<Vec<Record>> {
        Ok(vec![Record::new(ty.clone()).with("Score", 85.3f32)?, Record::new(ty.clone()).with("Score", 12.5f32)?])
    };
    let filters = [FilterDescriptor::new("Score", FilterOperator::Equals, 85.3f32)];
    let row_type = Type::Object(ty.clone());

    let text = sieve_core::serialize(
        &QueryEngine::new()
            .filter_expression(&row_type, &filters, LogicalFilterOperator::And, FilterCaseSensitivity::Default)?
            .expect("non-empty filter"),
    );
    assert_eq!(text, "it => (it.Score == 85.3)");

    let count = |engine: &QueryEngine| -> Result<usize> {
        let stream = engine.filter_as(rows()?, &filters, LogicalFilterOperator::And, FilterCaseSensitivity::Default, &row_type)?;
        Ok(stream.collect::<Result<Vec<_>, _>>()?.len())
    };

    let text_first = QueryEngine::new();
    assert!(text_first.parse_as(&text, &row_type)?.test(&rows()?[0])?);
    assert_eq!(count(&text_first)?, 1);

    let descriptor_first = QueryEngine::new();
    assert_eq!(count(&descriptor_first)?, 1);
    assert!(descriptor_first.parse_as(&text, &row_type)?.test(&rows()?[0])?);
    assert_eq!(descriptor_first.cache().map(|c| c.len()), Some(1));
    Ok(())
}

#[test]
fn null_strings_are_neither_empty_nor_not_empty() -> Result<()> {
    let engine = QueryEngine::new();
    let ty = ObjectType::builder("Contact").field("Nick", Type::String).build();
    let contacts = [serde_json::json!({ "Nick": null }), serde_json::json!({ "Nick": "" }), serde_json::json!({ "Nick": "x" })]
        .iter()
        .map(|json| Record::from_json(&ty, json))
        .collect::<Result<Vec<_>, _>>()?;
    let nicks = |operator: FilterOperator| -> Result<Vec<Value>> {
        let stream = engine.filter_as(
            contacts.clone(),
            &[FilterDescriptor::unary("Nick", operator)],
            LogicalFilterOperator::And,
            FilterCaseSensitivity::Default,
            &Type::Object(ty.clone()),
        )?;
        Ok(stream.map(|r| r.map(|c| c.get("Nick").cloned().unwrap_or(Value::Null))).collect::<Result<_, _>>()?)
    };

    assert_eq!(nicks(FilterOperator::IsEmpty)?, vec![Value::from("")]);
    assert_eq!(nicks(FilterOperator::IsNotEmpty)?, vec![Value::from("x")]);
    assert_eq!(nicks(FilterOperator::IsNull)?, vec![Value::Null]);
    Ok(())
}

#[test]
fn extreme_descriptor_values() -> Result<()> {
    let engine = QueryEngine::new();
    let ty = ObjectType::builder("Ledger").field("Balance", Type::I64).field("Rate", Type::F64).build();
    let rows = vec![
        Record::new(ty.clone()).with("Balance", i64::MIN)?.with("Rate", 1.0)?,
        Record::new(ty.clone()).with("Balance", 0i64)?.with("Rate", 2.0)?,
    ];
    let row_type = Type::Object(ty.clone());

    let smallest = engine.filter_as(
        rows.clone(),
        &[FilterDescriptor::new("Balance", FilterOperator::Equals, i64::MIN)],
        LogicalFilterOperator::And,
        FilterCaseSensitivity::Default,
        &row_type,
    )?;
    assert_eq!(smallest.collect::<Result<Vec<_>, _>>()?.len(), 1);

    let nan = engine.filter_as(
        rows,
        &[FilterDescriptor::new("Rate", FilterOperator::GreaterThan, f64::NAN)],
        LogicalFilterOperator::And,
        FilterCaseSensitivity::Default,
        &row_type,
    );
    assert!(matches!(nan, Err(QueryError::Conversion(_))));
    Ok(())
}
