//! Employee Directory
//! Mission: Resolve actors for authentication through a narrow contract
//!
//! The auth core only needs to look an employee up by email or id and read
//! their role set. Everything else about employee records lives outside this
//! service.

use crate::auth::models::{Actor, RoleName};
use crate::auth::password::hash_password;
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::{info, warn};

/// Employee directory with SQLite backend
pub struct ActorStore {
    db_path: String,
}

impl ActorStore {
    /// Create a directory handle and initialize the schema, seeding the
    /// default accounts on first boot.
    pub fn new(db_path: &str) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_string(),
        };
        store.init_db()?;
        Ok(store)
    }

    fn init_db(&self) -> Result<()> {
        let conn = Connection::open(&self.db_path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS employees (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                roles TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        self.seed_defaults(&conn)?;

        Ok(())
    }

    /// Seed one account per role so a fresh deployment is usable.
    fn seed_defaults(&self, conn: &Connection) -> Result<()> {
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM employees", [], |row| row.get(0))
            .context("Failed to count employees")?;

        if count > 0 {
            return Ok(());
        }

        let defaults: [(&str, &str, RoleName); 4] = [
            ("admin@company.com", "Admin@123", RoleName::Admin),
            ("manager@company.com", "Manager@123", RoleName::Manager),
            ("hr@company.com", "Hr@123", RoleName::Hr),
            ("employee@company.com", "Employee@123", RoleName::Employee),
        ];

        for (email, password, role) in defaults {
            let password_hash = hash_password(password)?;
            conn.execute(
                "INSERT INTO employees (email, password_hash, active, roles, created_at)
                 VALUES (?1, ?2, 1, ?3, ?4)",
                params![
                    email,
                    password_hash,
                    role.as_str(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .context("Failed to insert default employee")?;
        }

        info!("Default accounts seeded (admin/manager/hr/employee @company.com)");
        warn!("Default credentials are active - change them before exposing this service");

        Ok(())
    }

    fn row_to_actor(row: &rusqlite::Row<'_>) -> rusqlite::Result<Actor> {
        let roles_str: String = row.get(4)?;
        let roles = roles_str
            .split(',')
            .filter_map(RoleName::from_str)
            .collect();
        Ok(Actor {
            id: row.get(0)?,
            email: row.get(1)?,
            password_hash: row.get(2)?,
            active: row.get::<_, i64>(3)? != 0,
            roles,
        })
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<Actor>> {
        let conn = Connection::open(&self.db_path)?;

        let mut stmt = conn.prepare(
            "SELECT id, email, password_hash, active, roles
             FROM employees WHERE email = ?1",
        )?;

        match stmt.query_row(params![email], Self::row_to_actor) {
            Ok(actor) => Ok(Some(actor)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<Actor>> {
        let conn = Connection::open(&self.db_path)?;

        let mut stmt = conn.prepare(
            "SELECT id, email, password_hash, active, roles
             FROM employees WHERE id = ?1",
        )?;

        match stmt.query_row(params![id], Self::row_to_actor) {
            Ok(actor) => Ok(Some(actor)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Cheap existence check used by the refresh-token store.
    pub fn exists(&self, id: i64) -> Result<bool> {
        let conn = Connection::open(&self.db_path)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM employees WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}
