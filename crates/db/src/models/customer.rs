//! Customer rows.

use frontdesk_core::customer::Customer;
use frontdesk_core::types::{Cents, DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `customers` table.
#[derive(Debug, Clone, FromRow)]
pub struct CustomerRow {
    pub id: DbId,
    pub name: String,
    pub membership_number: Option<String>,
    pub membership_valid_until: Option<Timestamp>,
    pub primary_language: Option<String>,
    pub notes: Option<String>,
    pub past_due_balance_cents: i64,
    pub id_scan_hash: Option<String>,
    pub banned_until: Option<Timestamp>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: row.id,
            name: row.name,
            membership_number: row.membership_number,
            membership_valid_until: row.membership_valid_until,
            primary_language: row.primary_language,
            notes: row.notes,
            past_due_balance: Cents(row.past_due_balance_cents),
            id_scan_hash: row.id_scan_hash,
            banned_until: row.banned_until,
        }
    }
}
