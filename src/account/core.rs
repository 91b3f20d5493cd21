use rusqlite::{
    Connection, OptionalExtension, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};

use crate::{Error, Timestamp, family::FamilyId};

/// Database identifier for an account.
pub type AccountId = i64;

/// The kind of account, which only affects how clients present it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountType {
    /// Physical cash.
    Cash,
    /// An everyday bank account.
    Checking,
    /// A savings account.
    Savings,
    /// A credit card.
    CreditCard,
    /// An investment or brokerage account.
    Investment,
    /// A loan or mortgage.
    Loan,
}

impl AccountType {
    fn as_str(&self) -> &'static str {
        match self {
            AccountType::Cash => "Cash",
            AccountType::Checking => "Checking",
            AccountType::Savings => "Savings",
            AccountType::CreditCard => "CreditCard",
            AccountType::Investment => "Investment",
            AccountType::Loan => "Loan",
        }
    }
}

impl ToSql for AccountType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for AccountType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "Cash" => Ok(AccountType::Cash),
            "Checking" => Ok(AccountType::Checking),
            "Savings" => Ok(AccountType::Savings),
            "CreditCard" => Ok(AccountType::CreditCard),
            "Investment" => Ok(AccountType::Investment),
            "Loan" => Ok(AccountType::Loan),
            other => Err(FromSqlError::Other(
                format!("invalid account type {other:?}").into(),
            )),
        }
    }
}

/// A family's account with its running balance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    /// The id for the account.
    pub id: AccountId,
    /// The family the account belongs to.
    pub family_id: FamilyId,
    /// The name of the account, unique among the family's live accounts.
    pub name: String,
    /// The kind of account.
    pub account_type: AccountType,
    /// The running balance.
    pub balance: f64,
    /// The display color, e.g. "#10B981".
    pub color: String,
    /// When the account was created.
    pub created_at: Timestamp,
    /// When the account row was last modified.
    pub updated_at: Timestamp,
    /// When the account was soft-deleted, if ever.
    pub deleted_at: Option<Timestamp>,
}

/// Create the account table in the database.
pub fn create_account_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS account (
            id INTEGER PRIMARY KEY,
            family_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            account_type TEXT NOT NULL,
            balance REAL NOT NULL,
            color TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT,
            FOREIGN KEY(family_id) REFERENCES family(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_account_family_id ON account(family_id)",
        (),
    )?;

    Ok(())
}

pub(crate) fn map_row_to_account(row: &Row) -> Result<Account, rusqlite::Error> {
    Ok(Account {
        id: row.get(0)?,
        family_id: row.get(1)?,
        name: row.get(2)?,
        account_type: row.get(3)?,
        balance: row.get(4)?,
        color: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        deleted_at: row.get(8)?,
    })
}

const ACCOUNT_COLUMNS: &str =
    "id, family_id, name, account_type, balance, color, created_at, updated_at, deleted_at";

/// Create a new account in the database.
pub(super) fn insert_account(
    family_id: FamilyId,
    name: &str,
    account_type: AccountType,
    balance: f64,
    color: &str,
    now: Timestamp,
    connection: &Connection,
) -> Result<Account, Error> {
    connection.execute(
        "INSERT INTO account (family_id, name, account_type, balance, color, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        (family_id, name, account_type, balance, color, now, now),
    )?;

    Ok(Account {
        id: connection.last_insert_rowid(),
        family_id,
        name: name.to_owned(),
        account_type,
        balance,
        color: color.to_owned(),
        created_at: now,
        updated_at: now,
        deleted_at: None,
    })
}

/// Retrieve the live account with `account_id` belonging to `family_id`.
///
/// # Errors
/// Returns [Error::NotFound] if the account does not exist, is deleted, or
/// belongs to another family.
pub fn get_account(
    account_id: AccountId,
    family_id: FamilyId,
    connection: &Connection,
) -> Result<Account, Error> {
    connection
        .prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account
             WHERE id = :id AND family_id = :family_id AND deleted_at IS NULL"
        ))?
        .query_row(
            &[(":id", &account_id), (":family_id", &family_id)],
            map_row_to_account,
        )
        .map_err(|error| error.into())
}

/// Retrieve the soft-deleted account with `account_id` belonging to
/// `family_id`.
///
/// # Errors
/// Returns [Error::NotFound] if no such deleted account exists.
pub(super) fn get_deleted_account(
    account_id: AccountId,
    family_id: FamilyId,
    connection: &Connection,
) -> Result<Account, Error> {
    connection
        .prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account
             WHERE id = :id AND family_id = :family_id AND deleted_at IS NOT NULL"
        ))?
        .query_row(
            &[(":id", &account_id), (":family_id", &family_id)],
            map_row_to_account,
        )
        .map_err(|error| error.into())
}

/// Check whether a live account of `family_id` already uses `name`
/// (case-insensitively), excluding `exclude_id` when given.
pub(super) fn account_name_exists(
    family_id: FamilyId,
    name: &str,
    exclude_id: Option<AccountId>,
    connection: &Connection,
) -> Result<bool, Error> {
    let conflict: Option<AccountId> = connection
        .query_row(
            "SELECT id FROM account
             WHERE family_id = ?1 AND LOWER(name) = LOWER(?2) AND deleted_at IS NULL
               AND id != ?3
             LIMIT 1",
            (family_id, name, exclude_id.unwrap_or(0)),
            |row| row.get(0),
        )
        .optional()?;

    Ok(conflict.is_some())
}

/// List the live accounts of `family_id` ordered by name.
pub(super) fn list_accounts(
    family_id: FamilyId,
    connection: &Connection,
) -> Result<Vec<Account>, Error> {
    connection
        .prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account
             WHERE family_id = :family_id AND deleted_at IS NULL
             ORDER BY name ASC"
        ))?
        .query_map(&[(":family_id", &family_id)], map_row_to_account)?
        .map(|maybe_account| maybe_account.map_err(|error| error.into()))
        .collect()
}

/// Update the name, type and color of an account.
pub(super) fn update_account(
    account_id: AccountId,
    name: &str,
    account_type: AccountType,
    color: &str,
    now: Timestamp,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "UPDATE account SET name = ?1, account_type = ?2, color = ?3, updated_at = ?4
         WHERE id = ?5",
        (name, account_type, color, now, account_id),
    )?;

    Ok(())
}

/// Soft-delete an account.
pub(super) fn soft_delete_account(
    account_id: AccountId,
    now: Timestamp,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "UPDATE account SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2",
        (now, account_id),
    )?;

    Ok(())
}

/// Clear the soft-deletion marker on an account.
pub(super) fn restore_account(
    account_id: AccountId,
    now: Timestamp,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "UPDATE account SET deleted_at = NULL, updated_at = ?1 WHERE id = ?2",
        (now, account_id),
    )?;

    Ok(())
}

/// Add `delta` to the account's running balance.
///
/// Callers are responsible for picking the sign via
/// [crate::transaction::TransactionType::signed_amount].
pub fn adjust_balance(
    account_id: AccountId,
    delta: f64,
    now: Timestamp,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "UPDATE account SET balance = balance + ?1, updated_at = ?2 WHERE id = ?3",
        (delta, now, account_id),
    )?;

    Ok(())
}

/// Overwrite the account's running balance, e.g. after recalculating it
/// from the transaction history.
pub(super) fn set_balance(
    account_id: AccountId,
    balance: f64,
    now: Timestamp,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "UPDATE account SET balance = ?1, updated_at = ?2 WHERE id = ?3",
        (balance, now, account_id),
    )?;

    Ok(())
}
