use anyhow::Result;
use deals_types::models::Role;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use super::OptionalExt;
use crate::models::{UserRow, enum_at, opt_ts_at, ts_at, uuid_at};
use crate::{Database, now};

pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub role: Role,
}

/// Fields left as `None` keep their stored value.
#[derive(Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub password_hash: Option<String>,
}

const USER_COLUMNS: &str = "id, email, username, password_hash, full_name, role, is_active, is_verified, created_at, updated_at";

impl Database {
    // -- Users --

    /// Fails with a unique violation (see [`crate::is_unique_violation`])
    /// when the email or username is taken.
    pub fn create_user(&self, user: &NewUser) -> Result<UserRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, username, password_hash, full_name, role, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    user.id.to_string(),
                    user.email,
                    user.username,
                    user.password_hash,
                    user.full_name,
                    user.role.as_str(),
                    now(),
                ],
            )?;
            query_user(conn, "id", &user.id.to_string())?
                .ok_or_else(|| anyhow::anyhow!("user {} vanished after insert", user.id))
        })
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", &id.to_string()))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn update_user(&self, id: Uuid, changes: &UserChanges) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE users SET
                    email = COALESCE(?1, email),
                    username = COALESCE(?2, username),
                    full_name = COALESCE(?3, full_name),
                    password_hash = COALESCE(?4, password_hash),
                    updated_at = ?5
                 WHERE id = ?6",
                rusqlite::params![
                    changes.email,
                    changes.username,
                    changes.full_name,
                    changes.password_hash,
                    now(),
                    id.to_string(),
                ],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            query_user(conn, "id", &id.to_string())
        })
    }

    pub fn set_user_role(&self, id: Uuid, role: Role) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE users SET role = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![role.as_str(), now(), id.to_string()],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            query_user(conn, "id", &id.to_string())
        })
    }

    /// Removes the account with everything it owns. Fails with a foreign key
    /// violation when the account has moderation decisions on record.
    pub fn delete_user(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM users WHERE id = ?1", [id.to_string()])?;
            Ok(deleted > 0)
        })
    }
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: uuid_at(row, 0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        password_hash: row.get(3)?,
        full_name: row.get(4)?,
        role: enum_at(row, 5)?,
        is_active: row.get(6)?,
        is_verified: row.get(7)?,
        created_at: ts_at(row, 8)?,
        updated_at: opt_ts_at(row, 9)?,
    })
}

/// `column` is one of the crate's own column names, never user input.
fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare_cached(&format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"))?;
    stmt.query_row([value], map_user).optional()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::is_unique_violation;
    use crate::queries::test_support::{db, user};

    #[test]
    fn duplicate_email_is_a_unique_violation() {
        let db = db();
        user(&db, "alice", Role::User);

        let err = db
            .create_user(&NewUser {
                id: Uuid::new_v4(),
                email: "ALICE@example.com".into(),
                username: "alice2".into(),
                password_hash: "x".into(),
                full_name: None,
                role: Role::User,
            })
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn email_lookup_ignores_case() {
        let db = db();
        let id = user(&db, "bob", Role::Moderator);

        let row = db.get_user_by_email("Bob@Example.com").unwrap().unwrap();
        assert_eq!(row.id, id);
        assert_eq!(row.role, Role::Moderator);
        assert!(row.is_active);
    }

    #[test]
    fn partial_update_keeps_other_fields() {
        let db = db();
        let id = user(&db, "carol", Role::User);

        let row = db
            .update_user(
                id,
                &UserChanges {
                    full_name: Some("Carol C".into()),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(row.full_name.as_deref(), Some("Carol C"));
        assert_eq!(row.username, "carol");
        assert!(row.updated_at.is_some());

        assert!(db.update_user(Uuid::new_v4(), &UserChanges::default()).unwrap().is_none());
    }

    #[test]
    fn role_change_and_delete() {
        let db = db();
        let id = user(&db, "dave", Role::User);

        let row = db.set_user_role(id, Role::Admin).unwrap().unwrap();
        assert_eq!(row.role, Role::Admin);

        assert!(db.delete_user(id).unwrap());
        assert!(!db.delete_user(id).unwrap());
        assert!(db.get_user_by_id(id).unwrap().is_none());
    }
}
