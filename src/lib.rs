pub mod ast;
pub mod engine;
pub mod error;
pub mod parser;
pub mod shaper;
pub mod transpiler;

pub use engine::{Db, Pool, PoolConfig, PoolRegistry, Transaction};
pub use error::{QuarryError, Result};
pub use transpiler::Dialect;

pub mod prelude {
    pub use crate::ast::columns::Projection;
    pub use crate::ast::conditions::{Criteria, MatchMode, Sort};
    pub use crate::ast::joins::{JoinRelation, JoinSpec};
    pub use crate::ast::raw::{raw, RawFragment};
    pub use crate::ast::values::{Record, Value};
    pub use crate::engine::{Db, Pool, PoolConfig, PoolRegistry, Transaction};
    pub use crate::error::{QuarryError, Result};
    pub use crate::transpiler::dml::Replacement;
    pub use crate::transpiler::Dialect;
}
