//! The ledger: one entry per transaction email, filled in by the ingestion
//! job and corrected by hand from the ledger page.

mod db;
mod domain;
mod edit;
mod page;

pub use db::{
    create_ledger_table, get_existing_email_ids, get_ledger_entry, get_team_ledger,
    update_ledger_entry_manually, upsert_ledger_entry,
};
pub use domain::{LedgerEdit, LedgerEntry, LedgerId, LedgerRow, LedgerStatus, NewLedgerEntry};
pub use edit::edit_ledger_entry_endpoint;
pub use page::get_ledger_page;

#[cfg(test)]
pub(crate) use db::test_utils;
