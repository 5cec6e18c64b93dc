use std::{path::PathBuf, sync::Arc};

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex};
use tracing::error;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Employee fields attached to a journal entry. Absent fields render as `N/A`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EntryContext<'a> {
    pub legajo: Option<i64>,
    pub nombre: Option<&'a str>,
    pub direccion: Option<&'a str>,
}

/// Append-only text log of per-employee failures.
#[derive(Clone)]
pub struct ErrorJournal {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
    clock: Clock,
}

impl ErrorJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_clock(path, Arc::new(Utc::now))
    }

    pub fn with_clock(path: impl Into<PathBuf>, clock: Clock) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
            clock,
        }
    }

    #[cfg(test)]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Appends one entry. Write failures are reported through `tracing` only.
    pub async fn record(&self, message: &str, context: EntryContext<'_>) {
        let entry = format_entry((self.clock)(), message, context);
        let _guard = self.lock.lock().await;
        if let Err(err) = self.append(entry.as_bytes()).await {
            error!(
                stage = "pipeline",
                path = %self.path.display(),
                error = %err,
                "failed to write error log entry"
            );
        }
    }

    async fn append(&self, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(bytes).await?;
        file.flush().await
    }
}

pub fn format_entry(at: DateTime<Utc>, message: &str, context: EntryContext<'_>) -> String {
    let legajo = context
        .legajo
        .map(|legajo| legajo.to_string())
        .unwrap_or_else(|| "N/A".to_string());
    format!(
        "{} - {}\nLegajo: {}\nNombre: {}\nDirección: {}\n\n",
        at.to_rfc3339_opts(SecondsFormat::Millis, true),
        message,
        legajo,
        context.nombre.unwrap_or("N/A"),
        context.direccion.unwrap_or("N/A"),
    )
}
