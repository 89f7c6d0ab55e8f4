/// Scoped access to the GEOWAT PostgreSQL database.
///
/// Connection settings are passed in explicitly; nothing here reads globals.
/// `with_session` opens a connection, hands it to a closure and closes it
/// again whether the closure succeeded or not.

use chrono::{DateTime, Utc};
use postgres::{Client, NoTls};
use serde::Serialize;

use crate::config::DatabaseConfig;
use crate::logging::{self, Stage};

/// Tables the pipeline reads from.
pub const YEARLY_TABLE: &str = "_gwh_yearly_tb";
pub const LOOKUP_TABLE: &str = "_lookup_tb";

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Postgres(#[from] postgres::Error),
    #[error("invalid SQL identifier '{0}'")]
    InvalidIdentifier(String),
    #[error("missing table {schema}.{table}")]
    MissingTable { schema: String, table: String },
}

/// Accepts plain lowercase-safe identifiers: a letter or underscore followed
/// by letters, digits or underscores, at most 63 bytes.
pub fn validate_identifier(name: &str) -> Result<(), DbError> {
    let mut chars = name.chars();
    let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid_start && valid_rest && name.len() <= 63 {
        Ok(())
    } else {
        Err(DbError::InvalidIdentifier(name.to_string()))
    }
}

/// An open connection plus the validated schema it queries.
pub struct Session {
    client: Client,
    schema: String,
}

impl Session {
    pub fn open(config: &DatabaseConfig) -> Result<Self, DbError> {
        validate_identifier(&config.schema)?;

        let client = match config.url.as_deref() {
            Some(url) => Client::connect(url, NoTls)?,
            None => {
                let mut pg = postgres::Config::new();
                pg.host(&config.host)
                    .port(config.port)
                    .dbname(&config.dbname)
                    .user(&config.user);
                if let Some(password) = config.password.as_deref() {
                    pg.password(password);
                }
                pg.connect(NoTls)?
            }
        };

        logging::debug(
            Stage::Database,
            None,
            &format!("connected, schema '{}'", config.schema),
        );

        Ok(Self {
            client,
            schema: config.schema.clone(),
        })
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// `schema.table`, safe to splice into SQL.
    pub fn qualified(&self, table: &str) -> String {
        format!("{}.{}", self.schema, table)
    }

    pub fn client(&mut self) -> &mut Client {
        &mut self.client
    }

    pub fn close(self) -> Result<(), DbError> {
        self.client.close()?;
        Ok(())
    }
}

/// Runs `f` inside a session and always releases the connection.
///
/// An error from `f` wins over an error from closing.
pub fn with_session<T, F>(config: &DatabaseConfig, f: F) -> Result<T, DbError>
where
    F: FnOnce(&mut Session) -> Result<T, DbError>,
{
    let mut session = Session::open(config).inspect_err(|e| logging::log_db_failure("connect", e))?;
    let result = f(&mut session);

    match session.close() {
        Ok(()) => logging::debug(Stage::Database, None, "connection closed"),
        Err(e) if result.is_ok() => return Err(e),
        Err(e) => logging::log_db_failure("close", &e),
    }

    result
}

// ---------------------------------------------------------------------------
// Table verification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct TableStatus {
    pub table: String,
    pub exists: bool,
    /// Row count, when the table exists.
    pub rows: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStatus {
    pub server_time: DateTime<Utc>,
    pub schema: String,
    pub tables: Vec<TableStatus>,
}

impl DatabaseStatus {
    pub fn all_present(&self) -> bool {
        self.tables.iter().all(|t| t.exists)
    }
}

/// Checks that the yearly and lookup tables exist and counts their rows.
pub fn verify_tables(session: &mut Session) -> Result<DatabaseStatus, DbError> {
    let server_time: DateTime<Utc> = session.client().query_one("SELECT now()", &[])?.try_get(0)?;

    let mut tables = Vec::new();
    for table in [YEARLY_TABLE, LOOKUP_TABLE] {
        let schema = session.schema().to_string();
        let exists: bool = session
            .client()
            .query_one(
                "SELECT EXISTS (
                     SELECT 1 FROM information_schema.tables
                     WHERE table_schema = $1 AND table_name = $2
                 )",
                &[&schema, &table],
            )?
            .try_get(0)?;

        let rows = if exists {
            let sql = format!("SELECT COUNT(*) FROM {}", session.qualified(table));
            Some(session.client().query_one(sql.as_str(), &[])?.try_get::<_, i64>(0)?)
        } else {
            logging::warn(
                Stage::Database,
                None,
                &format!("table {}.{} not found", schema, table),
            );
            None
        };

        tables.push(TableStatus {
            table: table.to_string(),
            exists,
            rows,
        });
    }

    Ok(DatabaseStatus {
        server_time,
        schema: session.schema().to_string(),
        tables,
    })
}

/// Like `verify_tables`, but a missing table is an error.
pub fn require_tables(session: &mut Session) -> Result<DatabaseStatus, DbError> {
    let status = verify_tables(session)?;
    if let Some(missing) = status.tables.iter().find(|t| !t.exists) {
        return Err(DbError::MissingTable {
            schema: status.schema.clone(),
            table: missing.table.clone(),
        });
    }
    Ok(status)
}
