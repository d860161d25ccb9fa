//! Declarative filter and sort descriptions, as supplied by a grid or any other caller that builds
//! queries from user input rather than expression text.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOperator {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEquals,
    GreaterThan,
    GreaterThanOrEquals,
    Contains,
    DoesNotContain,
    StartsWith,
    EndsWith,
    IsNull,
    IsNotNull,
    IsEmpty,
    IsNotEmpty,
    /// The member value is one of the supplied values
    In,
    NotIn,
}

impl FilterOperator {
    /// Operators that are complete without a filter value
    pub fn is_unary(&self) -> bool { matches!(self, Self::IsNull | Self::IsNotNull | Self::IsEmpty | Self::IsNotEmpty) }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Debug::fmt(self, f) }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalFilterOperator {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterCaseSensitivity {
    #[default]
    Default,
    CaseInsensitive,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// One filter condition on a property, with an optional second condition combined through
/// `logical_filter_operator`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterDescriptor {
    pub property: String,
    #[serde(default)]
    pub filter_value: Option<Value>,
    pub filter_operator: FilterOperator,
    #[serde(default)]
    pub second_filter_value: Option<Value>,
    #[serde(default)]
    pub second_filter_operator: Option<FilterOperator>,
    #[serde(default)]
    pub logical_filter_operator: LogicalFilterOperator,
}

impl FilterDescriptor {
    pub fn new(property: impl Into<String>, filter_operator: FilterOperator, filter_value: impl Into<Value>) -> Self {
        let filter_value = match filter_value.into() {
            Value::Null => None,
            value => Some(value),
        };
        Self {
            property: property.into(),
            filter_value,
            filter_operator,
            second_filter_value: None,
            second_filter_operator: None,
            logical_filter_operator: LogicalFilterOperator::And,
        }
    }

    /// A condition that needs no value, such as `IsNull`
    pub fn unary(property: impl Into<String>, filter_operator: FilterOperator) -> Self { Self::new(property, filter_operator, Value::Null) }

    pub fn with_second(mut self, logical: LogicalFilterOperator, operator: FilterOperator, value: impl Into<Value>) -> Self {
        self.logical_filter_operator = logical;
        self.second_filter_operator = Some(operator);
        self.second_filter_value = match value.into() {
            Value::Null => None,
            value => Some(value),
        };
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortDescriptor {
    pub property: String,
    #[serde(default)]
    pub order: SortOrder,
}

impl SortDescriptor {
    pub fn ascending(property: impl Into<String>) -> Self { Self { property: property.into(), order: SortOrder::Ascending } }

    pub fn descending(property: impl Into<String>) -> Self { Self { property: property.into(), order: SortOrder::Descending } }

    /// The textual order-by form, `Property desc`
    pub fn to_spec(descriptors: &[SortDescriptor]) -> String {
        descriptors
            .iter()
            .map(|d| match d.order {
                SortOrder::Ascending => d.property.clone(),
                SortOrder::Descending => format!("{} desc", d.property),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
