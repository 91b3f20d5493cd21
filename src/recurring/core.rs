use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::Time;

use crate::{
    Error, Timestamp,
    account::AccountId,
    category::CategoryId,
    family::FamilyId,
    tag::TagId,
    transaction::TransactionType,
    user::UserId,
};

/// Database identifier for a recurring transaction rule.
pub type RecurringTransactionId = i64;

/// How often a recurring rule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    /// Every day.
    Daily,
    /// Every seven days.
    Weekly,
    /// Every calendar month.
    Monthly,
    /// Every calendar year.
    Yearly,
}

impl Frequency {
    fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "Daily",
            Frequency::Weekly => "Weekly",
            Frequency::Monthly => "Monthly",
            Frequency::Yearly => "Yearly",
        }
    }
}

impl ToSql for Frequency {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Frequency {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "Daily" => Ok(Frequency::Daily),
            "Weekly" => Ok(Frequency::Weekly),
            "Monthly" => Ok(Frequency::Monthly),
            "Yearly" => Ok(Frequency::Yearly),
            other => Err(FromSqlError::Other(
                format!("invalid frequency {other:?}").into(),
            )),
        }
    }
}

/// A recurring transaction rule.
///
/// Exactly one end condition is active: unbounded (`end_date` and
/// `max_occurrences` both absent), end-date-bounded, or count-bounded.
/// The day-of-week/day-of-month anchors and the time of day are validated
/// at creation time but do not steer the generation walk, which advances
/// from `start_date`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecurringTransaction {
    /// The id for the rule.
    pub id: RecurringTransactionId,
    /// The account the generated transactions belong to.
    pub account_id: AccountId,
    /// The user who created the rule.
    pub user_id: UserId,
    /// The category assigned to generated transactions, if any.
    pub category_id: Option<CategoryId>,
    /// A short description, reused as the generated transaction name.
    pub description: String,
    /// The unsigned amount of each occurrence.
    pub amount: f64,
    /// The kind of money movement.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// How often the rule fires.
    pub frequency: Frequency,
    /// Day-of-month anchor for monthly/yearly rules (1-31).
    pub day_of_month: Option<u8>,
    /// Day-of-week anchor for weekly rules (0-6, Sunday first).
    pub day_of_week: Option<u8>,
    /// The time of day occurrences nominally fire, "HH:MM".
    pub time_of_day: String,
    /// The first occurrence.
    pub start_date: Timestamp,
    /// The last timestamp occurrences may carry, when end-date-bounded.
    pub end_date: Option<Timestamp>,
    /// The occurrence cap, when count-bounded.
    pub max_occurrences: Option<i64>,
    /// How many occurrences have been materialized so far.
    pub occurrences_count: i64,
    /// When the rule was created.
    pub created_at: Timestamp,
    /// When the rule row was last modified.
    pub updated_at: Timestamp,
    /// When the rule was soft-deleted, if ever.
    pub deleted_at: Option<Timestamp>,
}

/// The validated fields needed to create or replace a rule.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecurringTransaction {
    /// The account the generated transactions belong to.
    pub account_id: AccountId,
    /// The user creating the rule.
    pub user_id: UserId,
    /// The category assigned to generated transactions, if any.
    pub category_id: Option<CategoryId>,
    /// A short description, reused as the generated transaction name.
    pub description: String,
    /// The unsigned amount of each occurrence.
    pub amount: f64,
    /// The kind of money movement.
    pub transaction_type: TransactionType,
    /// How often the rule fires.
    pub frequency: Frequency,
    /// Day-of-month anchor for monthly/yearly rules.
    pub day_of_month: Option<u8>,
    /// Day-of-week anchor for weekly rules.
    pub day_of_week: Option<u8>,
    /// The time of day occurrences nominally fire.
    pub time_of_day: String,
    /// The first occurrence.
    pub start_date: Timestamp,
    /// The last timestamp occurrences may carry, when end-date-bounded.
    pub end_date: Option<Timestamp>,
    /// The occurrence cap, when count-bounded.
    pub max_occurrences: Option<i64>,
}

impl NewRecurringTransaction {
    /// Check the invariants that do not need database access: a positive
    /// amount, a parseable time of day, the frequency-specific anchor, and
    /// at most one end condition.
    pub fn validate(&self) -> Result<(), Error> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(Error::InvalidInput(
                "amount must be a positive number".to_owned(),
            ));
        }

        if self.description.trim().is_empty() {
            return Err(Error::InvalidInput("description is required".to_owned()));
        }

        let time_format = time::macros::format_description!("[hour]:[minute]");
        if Time::parse(&self.time_of_day, time_format).is_err() {
            return Err(Error::InvalidInput(format!(
                "\"{}\" is not a valid time of day, expected HH:MM",
                self.time_of_day
            )));
        }

        match self.frequency {
            Frequency::Weekly => match self.day_of_week {
                Some(0..=6) => {}
                _ => {
                    return Err(Error::InvalidInput(
                        "day of week is required for weekly frequency (0-6)".to_owned(),
                    ));
                }
            },
            Frequency::Monthly | Frequency::Yearly => match self.day_of_month {
                Some(1..=31) => {}
                _ => {
                    return Err(Error::InvalidInput(
                        "day of month is required for monthly and yearly frequency (1-31)"
                            .to_owned(),
                    ));
                }
            },
            Frequency::Daily => {}
        }

        if self.end_date.is_some() && self.max_occurrences.is_some() {
            return Err(Error::InvalidInput(
                "a rule cannot have both an end date and a maximum number of occurrences"
                    .to_owned(),
            ));
        }

        if let Some(max_occurrences) = self.max_occurrences
            && max_occurrences <= 0
        {
            return Err(Error::InvalidInput(
                "max occurrences must be a positive number".to_owned(),
            ));
        }

        if let Some(end_date) = self.end_date
            && end_date < self.start_date
        {
            return Err(Error::InvalidInput(
                "end date cannot be before the start date".to_owned(),
            ));
        }

        Ok(())
    }
}

/// Create the recurring transaction table in the database.
pub fn create_recurring_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS recurring_transaction (
            id INTEGER PRIMARY KEY,
            account_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            category_id INTEGER,
            description TEXT NOT NULL,
            amount REAL NOT NULL,
            type TEXT NOT NULL,
            frequency TEXT NOT NULL,
            day_of_month INTEGER,
            day_of_week INTEGER,
            time_of_day TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT,
            max_occurrences INTEGER,
            occurrences_count INTEGER NOT NULL DEFAULT 0,
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
        "CREATE INDEX IF NOT EXISTS idx_recurring_transaction_account_id
         ON recurring_transaction(account_id)",
        (),
    )?;

    Ok(())
}

/// Create the recurring-transaction-tag junction table in the database.
pub fn create_recurring_transaction_tag_table(
    connection: &Connection,
) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS recurring_transaction_tag (
            recurring_transaction_id INTEGER NOT NULL,
            tag_id INTEGER NOT NULL,
            FOREIGN KEY(recurring_transaction_id) REFERENCES recurring_transaction(id)
                ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(tag_id) REFERENCES tag(id) ON UPDATE CASCADE ON DELETE CASCADE,
            UNIQUE(recurring_transaction_id, tag_id)
        )",
        (),
    )?;

    Ok(())
}

pub(super) fn map_row_to_recurring_transaction(
    row: &Row,
) -> Result<RecurringTransaction, rusqlite::Error> {
    Ok(RecurringTransaction {
        id: row.get(0)?,
        account_id: row.get(1)?,
        user_id: row.get(2)?,
        category_id: row.get(3)?,
        description: row.get(4)?,
        amount: row.get(5)?,
        transaction_type: row.get(6)?,
        frequency: row.get(7)?,
        day_of_month: row.get(8)?,
        day_of_week: row.get(9)?,
        time_of_day: row.get(10)?,
        start_date: row.get(11)?,
        end_date: row.get(12)?,
        max_occurrences: row.get(13)?,
        occurrences_count: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
        deleted_at: row.get(17)?,
    })
}

pub(super) const RECURRING_COLUMNS: &str = "r.id, r.account_id, r.user_id, r.category_id, \
     r.description, r.amount, r.type, r.frequency, r.day_of_month, r.day_of_week, \
     r.time_of_day, r.start_date, r.end_date, r.max_occurrences, r.occurrences_count, \
     r.created_at, r.updated_at, r.deleted_at";

/// Create a new recurring rule in the database.
///
/// The caller is expected to have run [NewRecurringTransaction::validate].
pub(super) fn insert_recurring_transaction(
    new_rule: &NewRecurringTransaction,
    now: Timestamp,
    connection: &Connection,
) -> Result<RecurringTransaction, Error> {
    connection.execute(
        "INSERT INTO recurring_transaction
         (account_id, user_id, category_id, description, amount, type, frequency, day_of_month,
          day_of_week, time_of_day, start_date, end_date, max_occurrences, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)",
        (
            new_rule.account_id,
            new_rule.user_id,
            new_rule.category_id,
            &new_rule.description,
            new_rule.amount,
            new_rule.transaction_type,
            new_rule.frequency,
            new_rule.day_of_month,
            new_rule.day_of_week,
            &new_rule.time_of_day,
            new_rule.start_date,
            new_rule.end_date,
            new_rule.max_occurrences,
            now,
        ),
    )?;

    Ok(RecurringTransaction {
        id: connection.last_insert_rowid(),
        account_id: new_rule.account_id,
        user_id: new_rule.user_id,
        category_id: new_rule.category_id,
        description: new_rule.description.clone(),
        amount: new_rule.amount,
        transaction_type: new_rule.transaction_type,
        frequency: new_rule.frequency,
        day_of_month: new_rule.day_of_month,
        day_of_week: new_rule.day_of_week,
        time_of_day: new_rule.time_of_day.clone(),
        start_date: new_rule.start_date,
        end_date: new_rule.end_date,
        max_occurrences: new_rule.max_occurrences,
        occurrences_count: 0,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    })
}

/// Retrieve the live rule with `rule_id`, scoped to `family_id` through
/// the owning account.
///
/// # Errors
/// Returns [Error::NotFound] if the rule does not exist, is deleted, or
/// its account is deleted or belongs to another family.
pub(super) fn get_recurring_transaction(
    rule_id: RecurringTransactionId,
    family_id: FamilyId,
    connection: &Connection,
) -> Result<RecurringTransaction, Error> {
    connection
        .prepare(&format!(
            "SELECT {RECURRING_COLUMNS} FROM recurring_transaction r
             INNER JOIN account a ON r.account_id = a.id
             WHERE r.id = :id AND r.deleted_at IS NULL
               AND a.family_id = :family_id AND a.deleted_at IS NULL"
        ))?
        .query_row(
            &[(":id", &rule_id), (":family_id", &family_id)],
            map_row_to_recurring_transaction,
        )
        .map_err(|error| error.into())
}

/// List the family's live rules ordered by description.
pub(super) fn list_recurring_transactions(
    family_id: FamilyId,
    connection: &Connection,
) -> Result<Vec<RecurringTransaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {RECURRING_COLUMNS} FROM recurring_transaction r
             INNER JOIN account a ON r.account_id = a.id
             WHERE r.deleted_at IS NULL
               AND a.family_id = :family_id AND a.deleted_at IS NULL
             ORDER BY r.description ASC"
        ))?
        .query_map(&[(":family_id", &family_id)], map_row_to_recurring_transaction)?
        .map(|maybe_rule| maybe_rule.map_err(|error| error.into()))
        .collect()
}

/// Overwrite the editable fields of a rule.
pub(super) fn update_recurring_transaction(
    rule_id: RecurringTransactionId,
    new_rule: &NewRecurringTransaction,
    now: Timestamp,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "UPDATE recurring_transaction
         SET account_id = ?1, category_id = ?2, description = ?3, amount = ?4, type = ?5,
             frequency = ?6, day_of_month = ?7, day_of_week = ?8, time_of_day = ?9,
             start_date = ?10, end_date = ?11, max_occurrences = ?12, updated_at = ?13
         WHERE id = ?14",
        (
            new_rule.account_id,
            new_rule.category_id,
            &new_rule.description,
            new_rule.amount,
            new_rule.transaction_type,
            new_rule.frequency,
            new_rule.day_of_month,
            new_rule.day_of_week,
            &new_rule.time_of_day,
            new_rule.start_date,
            new_rule.end_date,
            new_rule.max_occurrences,
            now,
            rule_id,
        ),
    )?;

    Ok(())
}

/// Soft-delete a rule. The engine skips deleted rules.
pub(super) fn soft_delete_recurring_transaction(
    rule_id: RecurringTransactionId,
    now: Timestamp,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "UPDATE recurring_transaction SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2",
        (now, rule_id),
    )?;

    Ok(())
}

/// Count one more materialized occurrence against the rule.
pub(super) fn increment_occurrences(
    rule_id: RecurringTransactionId,
    now: Timestamp,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "UPDATE recurring_transaction
         SET occurrences_count = occurrences_count + 1, updated_at = ?1
         WHERE id = ?2",
        (now, rule_id),
    )?;

    Ok(())
}

/// Replace the tag set attached to a rule.
pub(super) fn set_rule_tags(
    rule_id: RecurringTransactionId,
    tag_ids: &[TagId],
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "DELETE FROM recurring_transaction_tag WHERE recurring_transaction_id = ?1",
        [rule_id],
    )?;

    let mut statement = connection.prepare(
        "INSERT OR IGNORE INTO recurring_transaction_tag (recurring_transaction_id, tag_id)
         VALUES (?1, ?2)",
    )?;

    for tag_id in tag_ids {
        statement.execute((rule_id, tag_id))?;
    }

    Ok(())
}

/// Get the ids of the tags attached to a rule.
pub(super) fn get_rule_tag_ids(
    rule_id: RecurringTransactionId,
    connection: &Connection,
) -> Result<Vec<TagId>, Error> {
    connection
        .prepare(
            "SELECT tag_id FROM recurring_transaction_tag
             WHERE recurring_transaction_id = :rule_id
             ORDER BY tag_id ASC",
        )?
        .query_map(&[(":rule_id", &rule_id)], |row| row.get(0))?
        .map(|maybe_id| maybe_id.map_err(|error| error.into()))
        .collect()
}

#[cfg(test)]
mod validation_tests {
    use crate::{Error, Timestamp, transaction::TransactionType};

    use super::{Frequency, NewRecurringTransaction};

    fn base_rule() -> NewRecurringTransaction {
        NewRecurringTransaction {
            account_id: 1,
            user_id: 1,
            category_id: None,
            description: "rent".to_owned(),
            amount: 100.0,
            transaction_type: TransactionType::Expense,
            frequency: Frequency::Daily,
            day_of_month: None,
            day_of_week: None,
            time_of_day: "09:00".to_owned(),
            start_date: Timestamp::parse("2024-01-01 09:00:00").unwrap(),
            end_date: None,
            max_occurrences: None,
        }
    }

    #[test]
    fn valid_daily_rule_passes() {
        assert!(base_rule().validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_amount() {
        let mut rule = base_rule();
        rule.amount = 0.0;

        assert!(matches!(rule.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn weekly_requires_day_of_week() {
        let mut rule = base_rule();
        rule.frequency = Frequency::Weekly;

        assert!(rule.validate().is_err());

        rule.day_of_week = Some(7);
        assert!(rule.validate().is_err());

        rule.day_of_week = Some(6);
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn monthly_requires_day_of_month() {
        let mut rule = base_rule();
        rule.frequency = Frequency::Monthly;

        assert!(rule.validate().is_err());

        rule.day_of_month = Some(0);
        assert!(rule.validate().is_err());

        rule.day_of_month = Some(31);
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn rejects_both_end_conditions_at_once() {
        let mut rule = base_rule();
        rule.end_date = Some(Timestamp::parse("2024-06-01 09:00:00").unwrap());
        rule.max_occurrences = Some(3);

        assert!(rule.validate().is_err());
    }

    #[test]
    fn rejects_end_date_before_start() {
        let mut rule = base_rule();
        rule.end_date = Some(Timestamp::parse("2023-12-31 09:00:00").unwrap());

        assert!(rule.validate().is_err());
    }

    #[test]
    fn rejects_zero_max_occurrences() {
        let mut rule = base_rule();
        rule.max_occurrences = Some(0);

        assert!(rule.validate().is_err());
    }

    #[test]
    fn rejects_malformed_time_of_day() {
        let mut rule = base_rule();
        rule.time_of_day = "9 o'clock".to_owned();

        assert!(rule.validate().is_err());
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use rusqlite::Connection;

    use crate::{
        Timestamp, account::AccountId, transaction::TransactionType, user::test_utils::test_now,
    };

    use super::{
        Frequency, NewRecurringTransaction, RecurringTransaction, insert_recurring_transaction,
    };

    pub(crate) fn test_rule(account_id: AccountId, start_date: &str) -> NewRecurringTransaction {
        NewRecurringTransaction {
            account_id,
            user_id: 1,
            category_id: None,
            description: "pocket money".to_owned(),
            amount: 10.0,
            transaction_type: TransactionType::Income,
            frequency: Frequency::Daily,
            day_of_month: None,
            day_of_week: None,
            time_of_day: "09:00".to_owned(),
            start_date: Timestamp::parse(start_date).unwrap(),
            end_date: None,
            max_occurrences: None,
        }
    }

    pub(crate) fn insert_test_rule(
        new_rule: &NewRecurringTransaction,
        connection: &Connection,
    ) -> RecurringTransaction {
        insert_recurring_transaction(new_rule, test_now(), connection)
            .expect("Could not insert test rule")
    }
}

#[cfg(test)]
mod recurring_core_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        account::test_utils::insert_test_account,
        db::initialize,
        tag::test_utils::insert_test_tag,
        user::test_utils::{insert_test_family, insert_test_user, test_now},
    };

    use super::{
        get_recurring_transaction, get_rule_tag_ids, increment_occurrences,
        list_recurring_transactions, set_rule_tags, soft_delete_recurring_transaction,
        test_utils::{insert_test_rule, test_rule},
    };

    fn init_db() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).expect("Could not initialize database");
        insert_test_user("tester@example.com", &connection);
        connection
    }

    #[test]
    fn insert_and_get_rule_round_trips() {
        let connection = init_db();
        let family_id = insert_test_family(&connection);
        let account = insert_test_account(family_id, "Checking", &connection);

        let inserted = insert_test_rule(&test_rule(account.id, "2024-01-01 09:00:00"), &connection);

        let got = get_recurring_transaction(inserted.id, family_id, &connection).unwrap();

        assert_eq!(inserted, got);
    }

    #[test]
    fn rule_is_scoped_through_its_account() {
        let connection = init_db();
        let family_id = insert_test_family(&connection);
        let other_family_id = insert_test_family(&connection);
        let account = insert_test_account(family_id, "Checking", &connection);
        let rule = insert_test_rule(&test_rule(account.id, "2024-01-01 09:00:00"), &connection);

        assert_eq!(
            get_recurring_transaction(rule.id, other_family_id, &connection),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn soft_deleted_rule_is_hidden() {
        let connection = init_db();
        let family_id = insert_test_family(&connection);
        let account = insert_test_account(family_id, "Checking", &connection);
        let rule = insert_test_rule(&test_rule(account.id, "2024-01-01 09:00:00"), &connection);

        soft_delete_recurring_transaction(rule.id, test_now(), &connection).unwrap();

        assert_eq!(
            get_recurring_transaction(rule.id, family_id, &connection),
            Err(Error::NotFound)
        );
        assert!(
            list_recurring_transactions(family_id, &connection)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn increment_occurrences_counts_up() {
        let connection = init_db();
        let family_id = insert_test_family(&connection);
        let account = insert_test_account(family_id, "Checking", &connection);
        let rule = insert_test_rule(&test_rule(account.id, "2024-01-01 09:00:00"), &connection);

        increment_occurrences(rule.id, test_now(), &connection).unwrap();
        increment_occurrences(rule.id, test_now(), &connection).unwrap();

        let got = get_recurring_transaction(rule.id, family_id, &connection).unwrap();
        assert_eq!(got.occurrences_count, 2);
    }

    #[test]
    fn rule_tags_replace_and_read_back() {
        let connection = init_db();
        let family_id = insert_test_family(&connection);
        let account = insert_test_account(family_id, "Checking", &connection);
        let rule = insert_test_rule(&test_rule(account.id, "2024-01-01 09:00:00"), &connection);
        let first = insert_test_tag(family_id, "first", &connection);
        let second = insert_test_tag(family_id, "second", &connection);

        set_rule_tags(rule.id, &[first.id, second.id], &connection).unwrap();
        set_rule_tags(rule.id, &[second.id], &connection).unwrap();

        assert_eq!(get_rule_tag_ids(rule.id, &connection), Ok(vec![second.id]));
    }
}
