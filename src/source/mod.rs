//! Sources describe which emails belong to a user's transactions and how to
//! extract the amount and payee from them.

mod create;
mod db;
mod domain;
mod list;

pub use create::{create_source_endpoint, create_source_form_endpoint};
pub use db::{create_source, create_source_table, get_source, get_sources_for_team};
pub use domain::{
    CategoryPreset, NewSource, Source, SourceFields, SourceId, SourceType, TransactionType,
    UnknownVariant,
};
pub use list::get_sources_page;

pub(crate) use domain::text_column;
