//! Bulk-operation engine.
//!
//! Everything that touches more than one record at a time lives here:
//! draining paged listings, exclusion filtering, sequential mutation with a
//! failure policy, export encoding, tree transfers and query building.

pub mod encoder;
pub mod error;
pub mod exclusion;
pub mod mutation;
pub mod paginate;
pub mod query;
pub mod resolver;
pub mod tree;

pub use encoder::{Columns, ExportFormat, ExportRow, TAB_DELIMITER};
pub use error::{BulkError, BulkResult};
pub use exclusion::{ExclusionList, Keyed};
pub use mutation::{BatchFailure, BatchPolicy, BatchReport, apply_to_all};
pub use paginate::{BULK_PAGE_SIZE, Page, PageSource, enumerate_all};
pub use query::{
    Direction, FieldFilter, FilterClause, FilterOp, OrderBy, Query, QueryTarget, build_query,
    parse_filters,
};
pub use resolver::{Identifier, resolve};
pub use tree::{TransferSummary, export_tree, import_tree};
