use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};

use crate::{
    Error, Timestamp,
    account::AccountId,
    category::CategoryId,
    family::FamilyId,
    tag::{Tag, TagId, TagName},
    user::UserId,
};

/// Database identifier for a transaction.
pub type TransactionId = i64;

/// What kind of money movement a transaction records.
///
/// The variant decides the sign with which the amount hits the account
/// balance, see [TransactionType::signed_amount].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    /// Money coming in, e.g. salary.
    Income,
    /// Money going out, e.g. groceries.
    Expense,
    /// Buying into an investment.
    InvestmentBuy,
    /// Selling out of an investment.
    InvestmentSell,
    /// Paying off a loan.
    LoanPayment,
    /// Receiving a loan repayment.
    LoanRepayment,
}

impl TransactionType {
    fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "Income",
            TransactionType::Expense => "Expense",
            TransactionType::InvestmentBuy => "InvestmentBuy",
            TransactionType::InvestmentSell => "InvestmentSell",
            TransactionType::LoanPayment => "LoanPayment",
            TransactionType::LoanRepayment => "LoanRepayment",
        }
    }

    /// The amount with the sign it applies to an account balance: income,
    /// investment sales and loan repayments credit the account, everything
    /// else debits it.
    ///
    /// This single mapping is used by transaction create/update/delete, the
    /// recurrence engine and balance recalculation.
    pub fn signed_amount(&self, amount: f64) -> f64 {
        match self {
            TransactionType::Income
            | TransactionType::InvestmentSell
            | TransactionType::LoanRepayment => amount,
            TransactionType::Expense
            | TransactionType::InvestmentBuy
            | TransactionType::LoanPayment => -amount,
        }
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "Income" => Ok(TransactionType::Income),
            "Expense" => Ok(TransactionType::Expense),
            "InvestmentBuy" => Ok(TransactionType::InvestmentBuy),
            "InvestmentSell" => Ok(TransactionType::InvestmentSell),
            "LoanPayment" => Ok(TransactionType::LoanPayment),
            "LoanRepayment" => Ok(TransactionType::LoanRepayment),
            other => Err(FromSqlError::Other(
                format!("invalid transaction type {other:?}").into(),
            )),
        }
    }
}

/// A ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    /// The id for the transaction.
    pub id: TransactionId,
    /// The account the transaction moves money in or out of.
    pub account_id: AccountId,
    /// The user who recorded the transaction.
    pub user_id: UserId,
    /// The category assigned to the transaction, if any.
    pub category_id: Option<CategoryId>,
    /// When the transaction happened.
    pub date: Timestamp,
    /// A short description of the transaction.
    pub name: String,
    /// The unsigned amount of money moved.
    pub amount: f64,
    /// The kind of money movement.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// When the transaction was recorded.
    pub created_at: Timestamp,
    /// When the transaction row was last modified.
    pub updated_at: Timestamp,
    /// When the transaction was soft-deleted, if ever.
    pub deleted_at: Option<Timestamp>,
}

/// The fields needed to create a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    /// The account the transaction moves money in or out of.
    pub account_id: AccountId,
    /// The user recording the transaction.
    pub user_id: UserId,
    /// The category to assign, if any.
    pub category_id: Option<CategoryId>,
    /// When the transaction happened.
    pub date: Timestamp,
    /// A short description of the transaction.
    pub name: String,
    /// The unsigned amount of money moved.
    pub amount: f64,
    /// The kind of money movement.
    pub transaction_type: TransactionType,
}

/// Create the transaction table in the database.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
            id INTEGER PRIMARY KEY,
            account_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            category_id INTEGER,
            date TEXT NOT NULL,
            name TEXT NOT NULL,
            amount REAL NOT NULL,
            type TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT,
            FOREIGN KEY(account_id) REFERENCES account(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE SET NULL
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_account_id ON \"transaction\"(account_id)",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_category_id ON \"transaction\"(category_id)",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_date ON \"transaction\"(date)",
        (),
    )?;

    Ok(())
}

/// Create the transaction-tag junction table in the database.
pub fn create_transaction_tag_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS transaction_tag (
            transaction_id INTEGER NOT NULL,
            tag_id INTEGER NOT NULL,
            FOREIGN KEY(transaction_id) REFERENCES \"transaction\"(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(tag_id) REFERENCES tag(id) ON UPDATE CASCADE ON DELETE CASCADE,
            UNIQUE(transaction_id, tag_id)
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_tag_tag_id ON transaction_tag(tag_id)",
        (),
    )?;

    Ok(())
}

pub(crate) fn map_row_to_transaction(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        account_id: row.get(1)?,
        user_id: row.get(2)?,
        category_id: row.get(3)?,
        date: row.get(4)?,
        name: row.get(5)?,
        amount: row.get(6)?,
        transaction_type: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
        deleted_at: row.get(10)?,
    })
}

pub(crate) const TRANSACTION_COLUMNS: &str = "t.id, t.account_id, t.user_id, t.category_id, \
     t.date, t.name, t.amount, t.type, t.created_at, t.updated_at, t.deleted_at";

/// Create a new transaction in the database.
///
/// Only inserts the row; adjusting the account balance is the caller's
/// responsibility so that multi-step operations can batch their writes in
/// one SQL transaction.
pub fn insert_transaction(
    new_transaction: &NewTransaction,
    now: Timestamp,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection.execute(
        "INSERT INTO \"transaction\" (account_id, user_id, category_id, date, name, amount, type, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        (
            new_transaction.account_id,
            new_transaction.user_id,
            new_transaction.category_id,
            new_transaction.date,
            &new_transaction.name,
            new_transaction.amount,
            new_transaction.transaction_type,
            now,
            now,
        ),
    )?;

    Ok(Transaction {
        id: connection.last_insert_rowid(),
        account_id: new_transaction.account_id,
        user_id: new_transaction.user_id,
        category_id: new_transaction.category_id,
        date: new_transaction.date,
        name: new_transaction.name.clone(),
        amount: new_transaction.amount,
        transaction_type: new_transaction.transaction_type,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    })
}

/// Retrieve the live transaction with `transaction_id`, scoped to
/// `family_id` through the owning account.
///
/// # Errors
/// Returns [Error::NotFound] if the transaction does not exist, is deleted,
/// or its account is deleted or belongs to another family.
pub fn get_transaction(
    transaction_id: TransactionId,
    family_id: FamilyId,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" t
             INNER JOIN account a ON t.account_id = a.id
             WHERE t.id = :id AND t.deleted_at IS NULL
               AND a.family_id = :family_id AND a.deleted_at IS NULL"
        ))?
        .query_row(
            &[(":id", &transaction_id), (":family_id", &family_id)],
            map_row_to_transaction,
        )
        .map_err(|error| error.into())
}

/// Replace the tag set attached to a transaction.
pub fn set_transaction_tags(
    transaction_id: TransactionId,
    tag_ids: &[TagId],
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "DELETE FROM transaction_tag WHERE transaction_id = ?1",
        [transaction_id],
    )?;

    let mut statement = connection
        .prepare("INSERT OR IGNORE INTO transaction_tag (transaction_id, tag_id) VALUES (?1, ?2)")?;

    for tag_id in tag_ids {
        statement.execute((transaction_id, tag_id))?;
    }

    Ok(())
}

/// Get the tags attached to a transaction, ordered by name.
pub(crate) fn get_transaction_tags(
    transaction_id: TransactionId,
    connection: &Connection,
) -> Result<Vec<Tag>, Error> {
    connection
        .prepare(
            "SELECT g.id, g.family_id, g.name, g.color, g.created_at, g.updated_at, g.deleted_at
             FROM tag g
             INNER JOIN transaction_tag tt ON tt.tag_id = g.id
             WHERE tt.transaction_id = :transaction_id
             ORDER BY g.name ASC",
        )?
        .query_map(&[(":transaction_id", &transaction_id)], |row| {
            let name: String = row.get(2)?;

            Ok(Tag {
                id: row.get(0)?,
                family_id: row.get(1)?,
                name: TagName::new_unchecked(&name),
                color: row.get(3)?,
                created_at: row.get(4)?,
                updated_at: row.get(5)?,
                deleted_at: row.get(6)?,
            })
        })?
        .map(|maybe_tag| maybe_tag.map_err(|error| error.into()))
        .collect()
}

/// Overwrite the editable fields of a transaction.
pub(super) fn update_transaction(
    transaction_id: TransactionId,
    new_transaction: &NewTransaction,
    now: Timestamp,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "UPDATE \"transaction\"
         SET account_id = ?1, category_id = ?2, date = ?3, name = ?4, amount = ?5, type = ?6,
             updated_at = ?7
         WHERE id = ?8",
        (
            new_transaction.account_id,
            new_transaction.category_id,
            new_transaction.date,
            &new_transaction.name,
            new_transaction.amount,
            new_transaction.transaction_type,
            now,
            transaction_id,
        ),
    )?;

    Ok(())
}

/// Soft-delete a transaction.
pub(super) fn soft_delete_transaction(
    transaction_id: TransactionId,
    now: Timestamp,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "UPDATE \"transaction\" SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2",
        (now, transaction_id),
    )?;

    Ok(())
}
