pub mod hr;

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    migrate::MigrateError,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Row, SqlitePool,
};
use thiserror::Error;

use paro_core::ResultRow;

pub use hr::{HrDirectory, HrDirectoryError};

/// Top-level database handle that owns the SQLite connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes a new SQLite connection pool, creating the file when missing.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(StorageError::Connect)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(StorageError::Connect)?;

        apply_pragmas(&pool).await?;

        Ok(Self { pool })
    }

    /// Opens a private in-memory database backed by a single long-lived connection.
    pub async fn connect_in_memory() -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(StorageError::Connect)?;

        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Returns a handle for the `empleados_paro` table.
    pub fn employees(&self) -> EmployeeRepository {
        EmployeeRepository {
            pool: self.pool.clone(),
        }
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn apply_pragmas(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::query("PRAGMA journal_mode = WAL;")
        .fetch_one(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA synchronous = NORMAL;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA busy_timeout = 5000;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    Ok(())
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to apply pragma: {0}")]
    Pragma(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository for computed employee distances.
#[derive(Clone)]
pub struct EmployeeRepository {
    pool: SqlitePool,
}

impl EmployeeRepository {
    /// Inserts the row or overwrites every non-key column of the existing one.
    ///
    /// The statement is a single `INSERT … ON CONFLICT DO UPDATE`, so the
    /// existence check and the write cannot interleave with another writer.
    pub async fn upsert(
        &self,
        row: &ResultRow,
        updated_at: DateTime<Utc>,
    ) -> Result<UpsertKind, UpsertError> {
        if row.direccion.trim().is_empty() {
            return Err(UpsertError::MissingAddress);
        }

        let result = sqlx::query(
            "INSERT INTO empleados_paro \
             (legajo, apellido_nombre, barrio, partido, direccion, localidad, sitio, distancia_ave, distancia_sm, revision, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?) \
             ON CONFLICT(legajo) DO UPDATE SET \
                 apellido_nombre = excluded.apellido_nombre, \
                 barrio = excluded.barrio, \
                 partido = excluded.partido, \
                 direccion = excluded.direccion, \
                 localidad = excluded.localidad, \
                 sitio = excluded.sitio, \
                 distancia_ave = excluded.distancia_ave, \
                 distancia_sm = excluded.distancia_sm, \
                 revision = empleados_paro.revision + 1, \
                 updated_at = excluded.updated_at \
             RETURNING revision",
        )
        .bind(row.legajo)
        .bind(&row.apellido_nombre)
        .bind(&row.barrio)
        .bind(&row.partido)
        .bind(&row.direccion)
        .bind(&row.localidad)
        .bind(&row.sitio)
        .bind(row.distancia_ave.map(i64::from))
        .bind(row.distancia_sm.map(i64::from))
        .bind(to_rfc3339(updated_at))
        .fetch_one(&self.pool)
        .await?;

        let revision: i64 = result.try_get("revision")?;
        Ok(if revision > 1 {
            UpsertKind::Updated
        } else {
            UpsertKind::Inserted
        })
    }

    /// Upserts every row in order, isolating failures per row.
    pub async fn upsert_all(
        &self,
        rows: &[ResultRow],
        updated_at: DateTime<Utc>,
    ) -> Vec<UpsertOutcome> {
        let mut outcomes = Vec::with_capacity(rows.len());
        for row in rows {
            let result = self.upsert(row, updated_at).await;
            outcomes.push(UpsertOutcome {
                legajo: row.legajo,
                result,
            });
        }
        outcomes
    }

    /// Lists every stored row ordered by legajo.
    pub async fn list_all(&self) -> Result<Vec<ResultRow>, StorageError> {
        let rows = sqlx::query_as::<_, EmployeeRow>(
            "SELECT legajo, apellido_nombre, barrio, partido, direccion, localidad, sitio, distancia_ave, distancia_sm \
             FROM empleados_paro ORDER BY legajo",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(EmployeeRow::into_domain).collect())
    }

    /// Fetches a single row by legajo.
    pub async fn fetch(&self, legajo: i64) -> Result<Option<ResultRow>, StorageError> {
        let row = sqlx::query_as::<_, EmployeeRow>(
            "SELECT legajo, apellido_nombre, barrio, partido, direccion, localidad, sitio, distancia_ave, distancia_sm \
             FROM empleados_paro WHERE legajo = ?",
        )
        .bind(legajo)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(EmployeeRow::into_domain))
    }

    /// Counts rows stored for a legajo (0 or 1 while the key holds).
    pub async fn count_by_legajo(&self, legajo: i64) -> Result<i64, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM empleados_paro WHERE legajo = ?")
            .bind(legajo)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("count"))
    }
}

/// Whether an upsert created or replaced the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertKind {
    Inserted,
    Updated,
}

impl UpsertKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Updated => "updated",
        }
    }
}

/// Per-row result of [`EmployeeRepository::upsert_all`].
#[derive(Debug)]
pub struct UpsertOutcome {
    pub legajo: i64,
    pub result: Result<UpsertKind, UpsertError>,
}

/// Errors that can occur while upserting a single row.
#[derive(Debug, Error)]
pub enum UpsertError {
    #[error("row has an empty address")]
    MissingAddress,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, sqlx::FromRow)]
struct EmployeeRow {
    legajo: i64,
    apellido_nombre: String,
    barrio: Option<String>,
    partido: Option<String>,
    direccion: String,
    localidad: Option<String>,
    sitio: Option<String>,
    distancia_ave: Option<i64>,
    distancia_sm: Option<i64>,
}

impl EmployeeRow {
    fn into_domain(self) -> ResultRow {
        ResultRow {
            legajo: self.legajo,
            apellido_nombre: self.apellido_nombre,
            barrio: self.barrio,
            partido: self.partido,
            direccion: self.direccion,
            localidad: self.localidad,
            sitio: self.sitio,
            distancia_ave: self.distancia_ave.and_then(|value| u32::try_from(value).ok()),
            distancia_sm: self.distancia_sm.and_then(|value| u32::try_from(value).ok()),
        }
    }
}

fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}
