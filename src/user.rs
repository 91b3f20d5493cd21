//! The user domain model and its database operations.

use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};

use crate::{Error, Timestamp, family::FamilyId, password::PasswordHash};

/// Database identifier for a user.
pub type UserId = i64;

/// A user's role within their family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    /// Can manage family membership and delete the family.
    Admin,
    /// A regular family member.
    Member,
}

impl UserRole {
    fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "Admin",
            UserRole::Member => "Member",
        }
    }
}

impl ToSql for UserRole {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for UserRole {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "Admin" => Ok(UserRole::Admin),
            "Member" => Ok(UserRole::Member),
            other => Err(FromSqlError::Other(
                format!("invalid user role {other:?}").into(),
            )),
        }
    }
}

/// A registered user.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// The id for the user.
    pub id: UserId,
    /// The family the user belongs to, if any.
    pub family_id: Option<FamilyId>,
    /// The user's display name.
    pub username: String,
    /// The user's unique email address.
    pub email: String,
    /// The bcrypt hash of the user's password.
    pub password_hash: PasswordHash,
    /// The user's role within their family.
    pub role: UserRole,
    /// When the user last logged in.
    pub last_login: Option<Timestamp>,
    /// When the user registered.
    pub created_at: Timestamp,
    /// When the user row was last modified.
    pub updated_at: Timestamp,
    /// When the user was soft-deleted, if ever.
    pub deleted_at: Option<Timestamp>,
}

/// A family member as reported by the family read endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FamilyMember {
    /// The id for the user.
    pub id: UserId,
    /// The user's display name.
    pub username: String,
    /// The user's email address.
    pub email: String,
    /// The user's role within the family.
    pub role: UserRole,
    /// When the user last logged in.
    pub last_login: Option<Timestamp>,
}

/// Create the user table in the database.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
            id INTEGER PRIMARY KEY,
            family_id INTEGER,
            username TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL,
            last_login TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT,
            FOREIGN KEY(family_id) REFERENCES family(id)
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_user_family_id ON user(family_id)",
        (),
    )?;

    Ok(())
}

pub(crate) fn map_row_to_user(row: &Row) -> Result<User, rusqlite::Error> {
    let password_hash: String = row.get(4)?;

    Ok(User {
        id: row.get(0)?,
        family_id: row.get(1)?,
        username: row.get(2)?,
        email: row.get(3)?,
        password_hash: PasswordHash::new_unchecked(password_hash),
        role: row.get(5)?,
        last_login: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        deleted_at: row.get(9)?,
    })
}

const USER_COLUMNS: &str = "id, family_id, username, email, password_hash, role, last_login, \
     created_at, updated_at, deleted_at";

/// Create a new user in the database.
///
/// # Errors
/// Returns [Error::DuplicateEmail] if a user with `email` already exists,
/// or another error if the insert fails.
pub fn insert_user(
    username: &str,
    email: &str,
    password_hash: &PasswordHash,
    role: UserRole,
    now: Timestamp,
    connection: &Connection,
) -> Result<User, Error> {
    connection.execute(
        "INSERT INTO user (username, email, password_hash, role, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (username, email, password_hash.as_ref(), role, now, now),
    )?;

    let id = connection.last_insert_rowid();

    Ok(User {
        id,
        family_id: None,
        username: username.to_owned(),
        email: email.to_owned(),
        password_hash: password_hash.clone(),
        role,
        last_login: None,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    })
}

/// Retrieve the live user with `email`.
///
/// # Errors
/// Returns [Error::NotFound] if no live user has `email`.
pub fn get_user_by_email(email: &str, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(&format!(
            "SELECT {USER_COLUMNS} FROM user WHERE email = :email AND deleted_at IS NULL"
        ))?
        .query_row(&[(":email", &email)], map_row_to_user)
        .map_err(|error| error.into())
}

/// Retrieve the live user with `user_id`.
///
/// # Errors
/// Returns [Error::NotFound] if no live user has `user_id`.
pub fn get_user_by_id(user_id: UserId, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(&format!(
            "SELECT {USER_COLUMNS} FROM user WHERE id = :id AND deleted_at IS NULL"
        ))?
        .query_row(&[(":id", &user_id)], map_row_to_user)
        .map_err(|error| error.into())
}

/// Stamp the user's last log-in time.
pub fn update_last_login(
    user_id: UserId,
    now: Timestamp,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "UPDATE user SET last_login = ?1 WHERE id = ?2",
        (now, user_id),
    )?;

    Ok(())
}

/// Replace the user's password hash.
pub fn update_password(
    user_id: UserId,
    password_hash: &PasswordHash,
    now: Timestamp,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "UPDATE user SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
        (password_hash.as_ref(), now, user_id),
    )?;

    Ok(())
}

/// Attach the user to `family_id` with `role`, or detach them when
/// `family_id` is `None`.
pub fn set_family(
    user_id: UserId,
    family_id: Option<FamilyId>,
    role: UserRole,
    now: Timestamp,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "UPDATE user SET family_id = ?1, role = ?2, updated_at = ?3 WHERE id = ?4",
        (family_id, role, now, user_id),
    )?;

    Ok(())
}

/// Count the live members of `family_id`.
pub fn count_family_members(family_id: FamilyId, connection: &Connection) -> Result<i64, Error> {
    let count = connection.query_row(
        "SELECT COUNT(*) FROM user WHERE family_id = ?1 AND deleted_at IS NULL",
        [family_id],
        |row| row.get(0),
    )?;

    Ok(count)
}

/// Count the live admins of `family_id`.
pub fn count_family_admins(family_id: FamilyId, connection: &Connection) -> Result<i64, Error> {
    let count = connection.query_row(
        "SELECT COUNT(*) FROM user WHERE family_id = ?1 AND role = 'Admin' AND deleted_at IS NULL",
        [family_id],
        |row| row.get(0),
    )?;

    Ok(count)
}

/// List the live members of `family_id` ordered by username.
pub fn list_family_members(
    family_id: FamilyId,
    connection: &Connection,
) -> Result<Vec<FamilyMember>, Error> {
    connection
        .prepare(
            "SELECT id, username, email, role, last_login FROM user
             WHERE family_id = :family_id AND deleted_at IS NULL
             ORDER BY username ASC",
        )?
        .query_map(&[(":family_id", &family_id)], |row| {
            Ok(FamilyMember {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                role: row.get(3)?,
                last_login: row.get(4)?,
            })
        })?
        .map(|maybe_member| maybe_member.map_err(|error| error.into()))
        .collect()
}


#[cfg(test)]
mod user_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        family::create_family_table,
        password::PasswordHash,
        user::test_utils::{insert_test_user, test_now},
    };

    use super::{
        UserRole, count_family_admins, count_family_members, create_user_table, get_user_by_email,
        get_user_by_id, insert_user, set_family, update_last_login, update_password,
    };

    fn init_db() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        create_family_table(&connection).expect("Could not create family table");
        create_user_table(&connection).expect("Could not create user table");
        connection
    }

    #[test]
    fn insert_and_get_user_round_trips() {
        let connection = init_db();

        let inserted = insert_test_user("foo@bar.baz", &connection);

        let by_id = get_user_by_id(inserted.id, &connection).unwrap();
        let by_email = get_user_by_email("foo@bar.baz", &connection).unwrap();

        assert_eq!(inserted, by_id);
        assert_eq!(inserted, by_email);
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let connection = init_db();
        insert_test_user("foo@bar.baz", &connection);

        let hash = PasswordHash::new_unchecked("$2b$04$other".to_owned());
        let result = insert_user(
            "other",
            "foo@bar.baz",
            &hash,
            UserRole::Member,
            test_now(),
            &connection,
        );

        assert_eq!(result, Err(Error::DuplicateEmail));
    }

    #[test]
    fn unknown_user_is_not_found() {
        let connection = init_db();

        assert_eq!(get_user_by_id(42, &connection), Err(Error::NotFound));
        assert_eq!(
            get_user_by_email("nobody@example.com", &connection),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn update_last_login_stamps_user() {
        let connection = init_db();
        let user = insert_test_user("foo@bar.baz", &connection);

        update_last_login(user.id, test_now(), &connection).unwrap();

        let got = get_user_by_id(user.id, &connection).unwrap();
        assert_eq!(got.last_login, Some(test_now()));
    }

    #[test]
    fn update_password_replaces_hash() {
        let connection = init_db();
        let user = insert_test_user("foo@bar.baz", &connection);
        let new_hash = PasswordHash::new_unchecked("$2b$04$replacement".to_owned());

        update_password(user.id, &new_hash, test_now(), &connection).unwrap();

        let got = get_user_by_id(user.id, &connection).unwrap();
        assert_eq!(got.password_hash, new_hash);
    }

    #[test]
    fn set_family_attaches_and_detaches() {
        let connection = init_db();
        connection
            .execute(
                "INSERT INTO family (name, created_at, updated_at) VALUES ('Test', ?1, ?1)",
                [test_now()],
            )
            .unwrap();
        let family_id = connection.last_insert_rowid();
        let user = insert_test_user("foo@bar.baz", &connection);

        set_family(user.id, Some(family_id), UserRole::Admin, test_now(), &connection).unwrap();

        assert_eq!(count_family_members(family_id, &connection), Ok(1));
        assert_eq!(count_family_admins(family_id, &connection), Ok(1));

        set_family(user.id, None, UserRole::Member, test_now(), &connection).unwrap();

        assert_eq!(count_family_members(family_id, &connection), Ok(0));
    }
}
