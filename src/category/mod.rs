//! Team-scoped categories for classifying ledger entries.

mod create;
mod db;
mod domain;
mod list;

pub use create::create_category_endpoint;
pub use db::{create_category, create_category_table, get_categories_for_team};
pub use domain::{Category, CategoryId, CategoryName};
pub use list::get_categories_page;
