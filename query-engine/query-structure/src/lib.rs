//! The query intermediate representation: what to query (model, action, arguments, selection),
//! the filter grammar used in `where` arguments, and the schema registry the compiler resolves
//! model, column and relation names against.

mod arguments;
mod computed;
mod error;
mod order_by;
mod query;
mod selection;

pub mod filter;
pub mod schema;

pub use arguments::*;
pub use computed::*;
pub use error::*;
pub use filter::{ComparisonMap, Filter, FilterValue, LogicalOperator, RelationQuantifier, ScalarOperator};
pub use order_by::*;
pub use query::*;
pub use selection::*;
pub use schema::*;

pub use query_value::{ArgType, QueryValue};

pub mod prelude {
    pub use crate::filter::*;
    pub use crate::{
        Action, AggregationSpec, ComputedField, ComputedOp, ConnectTarget, CorrelationValue, DataRecord, DataValue,
        FieldInfo, ModelSchema, NullsOrder, OrderBy, Query, QueryArguments, RelationInfo, RelationKind,
        RelationWrite, SchemaRegistry, Selection, SortOrder, TypeIdentifier, WriteData, data_record,
    };
    pub use query_value::QueryValue;
}
