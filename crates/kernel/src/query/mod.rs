//! Criteria queries: paginated, filtered, sorted listing of catalog tables.
//!
//! Requests are compiled against the column registry ([`compile`]), then
//! executed either as SQL ([`query_builder`]) or in process ([`eval`]).

pub mod compile;
pub mod eval;
pub mod query_builder;
pub mod service;
pub mod types;

pub use compile::{CompiledQuery, CompiledRequest, Condition, Predicate, compile};
pub use query_builder::{CriteriaQueryBuilder, Window, returning_projection};
pub use service::CriteriaService;
pub use types::{
    FilterExpr, Operator, PageWindow, PaginatedResult, Pagination, PaginationRequest,
    SearchCriterion, SortCriterion, SortOrder,
};
