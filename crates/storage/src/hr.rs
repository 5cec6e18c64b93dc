use std::str::FromStr;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use thiserror::Error;

use paro_core::{AddressLayout, EmployeeRecord};

/// Read-only access to the HR employee directory (`Employees_RRHH`).
#[derive(Clone)]
pub struct HrDirectory {
    pool: SqlitePool,
}

impl HrDirectory {
    /// Opens the directory database in read-only mode.
    pub async fn connect(database_url: &str) -> Result<Self, HrDirectoryError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(HrDirectoryError::Connect)?
            .read_only(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(HrDirectoryError::Connect)?;
        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Loads every active employee in directory order.
    pub async fn fetch_active(&self) -> Result<Vec<EmployeeRecord>, HrDirectoryError> {
        // Column names (including the `ApelllidoNombre` spelling) follow the HR schema.
        let rows = sqlx::query_as::<_, DirectoryRow>(
            r#"
SELECT CAST(Legajo AS INTEGER)  AS legajo,
       COALESCE(CAST(ApelllidoNombre AS TEXT), '') AS apellido_nombre,
       CAST(Calle AS TEXT)      AS calle,
       CAST(Numero AS TEXT)     AS numero,
       CAST(Barrio AS TEXT)     AS barrio,
       CAST(Partido AS TEXT)    AS partido,
       CAST(Provincia AS TEXT)  AS provincia,
       CAST(Sucursal AS TEXT)   AS sucursal
  FROM Employees_RRHH
 WHERE Activo = 1
   AND Legajo IS NOT NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(HrDirectoryError::Query)?;

        Ok(rows.into_iter().map(DirectoryRow::into_record).collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DirectoryRow {
    legajo: i64,
    apellido_nombre: String,
    calle: Option<String>,
    numero: Option<String>,
    barrio: Option<String>,
    partido: Option<String>,
    provincia: Option<String>,
    sucursal: Option<String>,
}

impl DirectoryRow {
    fn into_record(self) -> EmployeeRecord {
        EmployeeRecord {
            legajo: self.legajo,
            apellido_nombre: self.apellido_nombre,
            barrio: self.barrio,
            partido: self.partido,
            localidad: None,
            provincia: self.provincia,
            sitio: self.sucursal,
            calle: self.calle,
            numero: self.numero,
            layout: AddressLayout::HrDirectory,
        }
    }
}

/// Errors raised while reading the HR directory.
#[derive(Debug, Error)]
pub enum HrDirectoryError {
    #[error("failed to connect to hr directory: {0}")]
    Connect(sqlx::Error),
    #[error("failed to query hr directory: {0}")]
    Query(sqlx::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded_directory() -> HrDirectory {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .expect("connect");
        sqlx::query(
            "CREATE TABLE Employees_RRHH (\
                 Legajo INTEGER, ApelllidoNombre TEXT, Activo INTEGER, Calle TEXT, \
                 Numero INTEGER, Barrio TEXT, Partido TEXT, Provincia TEXT, Sucursal TEXT)",
        )
        .execute(&pool)
        .await
        .expect("create table");
        sqlx::query(
            "INSERT INTO Employees_RRHH VALUES \
             (42, 'Perez, Ana', 1, 'Calle 9', 100, 'Centro', 'Capital', 'Cordoba', 'AVE'), \
             (43, 'Gomez, Luis', 0, 'Calle 1', 5, 'Norte', 'Capital', 'Cordoba', 'SM'), \
             (44, 'Diaz, Eva', 1, 'Calle 2', NULL, NULL, 'Colon', 'Cordoba', NULL)",
        )
        .execute(&pool)
        .await
        .expect("seed");
        HrDirectory::from_pool(pool)
    }

    #[tokio::test]
    async fn fetch_active_skips_inactive_employees() {
        let directory = seeded_directory().await;
        let records = directory.fetch_active().await.expect("fetch");

        let legajos: Vec<i64> = records.iter().map(|record| record.legajo).collect();
        assert_eq!(legajos, vec![42, 44]);
    }

    #[tokio::test]
    async fn records_use_directory_layout() {
        let directory = seeded_directory().await;
        let records = directory.fetch_active().await.expect("fetch");

        let first = &records[0];
        assert_eq!(first.numero.as_deref(), Some("100"));
        assert_eq!(first.sitio.as_deref(), Some("AVE"));
        assert_eq!(
            first.normalized_address().as_str(),
            "Calle 9 100, Centro, Capital, Argentina"
        );
        assert_eq!(
            records[1].normalized_address().as_str(),
            "Calle 2 , , Colon, Argentina"
        );
    }

    #[tokio::test]
    async fn missing_table_is_a_query_error() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("connect");
        let err = HrDirectory::from_pool(pool)
            .fetch_active()
            .await
            .expect_err("table missing");
        assert!(matches!(err, HrDirectoryError::Query(_)));
    }
}
