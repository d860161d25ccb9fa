pub mod aggregate;
pub mod descriptor;
pub mod filter;
pub mod select;
pub mod sort;

pub use descriptor::{FilterCaseSensitivity, FilterDescriptor, FilterOperator, LogicalFilterOperator, SortDescriptor, SortOrder};
pub use filter::{FilterBuilder, FilteredStream};
pub use select::{Projection, Selected};
pub use sort::{parse_order_spec, OrderTerm, SortKey, SortedStream};
