//! Statement construction and classification.
//!
//! - `identifier`: identifier validation and quoting
//! - `statement`: statements, bound parameters and the builder
//! - `allow_list`: enumerated keyword choices
//! - `classifier`: keyword-level read-only classification

pub mod allow_list;
pub mod classifier;
pub mod identifier;
pub mod statement;

pub use classifier::DEFAULT_ROW_LIMIT;
pub use identifier::Identifier;
pub use statement::{Protocol, SqlParam, Statement, StatementBuilder, TrustedFragment};
