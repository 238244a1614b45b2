pub mod columns;
pub mod conditions;
pub mod joins;
pub mod raw;
pub mod values;

pub use self::columns::{ProjItem, Projection, TypeHint};
pub use self::conditions::{
    Criteria, Entry, GroupBy, Having, Limit, LogicalOp, MatchClause, MatchMode, Operator,
    OrderItem, Sort,
};
pub use self::joins::{Join, JoinKind, JoinRelation, JoinSpec};
pub use self::raw::{raw, RawFragment};
pub use self::values::{Record, Value};
