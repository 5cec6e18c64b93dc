use std::{sync::Arc, time::Duration};

use chrono::Utc;
use metrics::{counter, histogram};
use paro_core::{
    should_flag, BatchReport, EmployeeRecord, ReferencePoints, ResolvedLocation, ResultRow,
    ReviewEntry, Site,
};
use paro_maps::MapsError;
use paro_storage::{Database, EmployeeRepository, UpsertKind};
use paro_util::AppConfig;
use thiserror::Error;
use tokio::{sync::Mutex, time::Instant};
use tracing::{error, info, warn};

use crate::{
    backend::MapsBackend,
    journal::{Clock, EntryContext, ErrorJournal},
    pacer::Pacer,
    review_sheet::ReviewSheet,
    source::{EmployeeSource, SourceError},
};

/// Batch run: load employees, resolve addresses, measure walking distances,
/// flag ambiguous addresses and upsert the results.
#[derive(Clone)]
pub struct Pipeline {
    source: EmployeeSource,
    maps: MapsBackend,
    reference_points: ReferencePoints,
    store: EmployeeRepository,
    review: ReviewSheet,
    journal: ErrorJournal,
    pace: Duration,
    clock: Clock,
    running: Arc<Mutex<()>>,
}

impl Pipeline {
    /// Wires every collaborator from the loaded configuration.
    pub async fn from_config(
        config: &AppConfig,
        database: &Database,
    ) -> Result<Self, PipelineError> {
        let source = EmployeeSource::from_config(config).await?;
        let maps = MapsBackend::from_config(config)?;
        Ok(Self {
            source,
            maps,
            reference_points: config.reference_points,
            store: database.employees(),
            review: ReviewSheet::new(config.review_path.clone()),
            journal: ErrorJournal::new(config.error_log_path.clone()),
            pace: config.pace,
            clock: Arc::new(Utc::now),
            running: Arc::new(Mutex::new(())),
        })
    }

    /// Overrides the clock used for review dates, journal entries and `updated_at`.
    #[cfg(test)]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.journal = ErrorJournal::with_clock(self.journal.path().to_path_buf(), clock.clone());
        self.clock = clock;
        self
    }

    #[cfg(test)]
    pub(crate) fn hold_for_test(&self) -> Option<tokio::sync::MutexGuard<'_, ()>> {
        self.running.try_lock().ok()
    }

    #[cfg(test)]
    pub(crate) fn review_sheet(&self) -> &ReviewSheet {
        &self.review
    }

    /// Runs one full batch. A second call while one is in flight is rejected.
    pub async fn run(&self) -> Result<BatchReport, PipelineError> {
        let Ok(_running) = self.running.try_lock() else {
            counter!("batch_runs_total", "result" => "conflict").increment(1);
            return Err(PipelineError::AlreadyRunning);
        };

        let started = Instant::now();
        info!(stage = "pipeline", source = self.source.label(), "batch started");
        let result = self.run_batch().await;
        let elapsed = started.elapsed();
        histogram!("batch_duration_seconds").record(elapsed.as_secs_f64());

        match &result {
            Ok(report) => {
                counter!("batch_runs_total", "result" => "ok").increment(1);
                info!(
                    stage = "pipeline",
                    total = report.total,
                    resolved = report.resolved,
                    skipped = report.skipped,
                    flagged = report.flagged,
                    inserted = report.inserted,
                    updated = report.updated,
                    failed = report.failed,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "batch completed"
                );
            }
            Err(err) => {
                counter!("batch_runs_total", "result" => "error").increment(1);
                error!(stage = "pipeline", error = %err, "batch failed");
            }
        }
        result
    }

    async fn run_batch(&self) -> Result<BatchReport, PipelineError> {
        let dataset = self.source.load().await?;
        let mut report = BatchReport {
            total: dataset.records.len() + dataset.rejected.len(),
            skipped: dataset.rejected.len(),
            ..BatchReport::default()
        };

        for rejected in &dataset.rejected {
            warn!(
                stage = "pipeline",
                row = rejected.row,
                reason = %rejected.reason,
                "row rejected"
            );
            self.journal
                .record(
                    &format!("Fila {} descartada: {}", rejected.row, rejected.reason),
                    EntryContext {
                        nombre: rejected.nombre.as_deref(),
                        ..EntryContext::default()
                    },
                )
                .await;
        }

        if dataset.records.is_empty() {
            warn!(stage = "pipeline", "no employees to process");
            return Ok(report);
        }

        let mut pacer = Pacer::new(self.pace);
        let mut rows = Vec::with_capacity(dataset.records.len());
        for record in dataset.records {
            pacer.ready().await;

            let Some(location) = self.resolve(&record).await else {
                report.skipped += 1;
                continue;
            };
            report.resolved += 1;

            let distancia_ave = self.distance(&record, &location, Site::Ave).await;
            let distancia_sm = self.distance(&record, &location, Site::Sm).await;
            let row = record.into_result_row(location.address, distancia_ave, distancia_sm);

            if should_flag(&row.direccion) && self.flag(&row).await {
                report.flagged += 1;
            }
            rows.push(row);
        }

        if rows.is_empty() {
            return Ok(report);
        }

        let outcomes = self.store.upsert_all(&rows, (self.clock)()).await;
        for (row, outcome) in rows.iter().zip(outcomes) {
            match outcome.result {
                Ok(kind) => {
                    counter!("upsert_rows_total", "result" => kind.as_str()).increment(1);
                    match kind {
                        UpsertKind::Inserted => report.inserted += 1,
                        UpsertKind::Updated => report.updated += 1,
                    }
                }
                Err(err) => {
                    counter!("upsert_rows_total", "result" => "failed").increment(1);
                    report.failed += 1;
                    error!(stage = "storage", legajo = row.legajo, error = %err, "upsert failed");
                    self.journal
                        .record(
                            &format!("Error al guardar el empleado: {err}"),
                            row_context(row),
                        )
                        .await;
                }
            }
        }

        Ok(report)
    }

    async fn resolve(&self, record: &EmployeeRecord) -> Option<ResolvedLocation> {
        let address = record.normalized_address();
        match self.maps.geocode(address.as_str()).await {
            Ok(Some(coordinate)) => Some(ResolvedLocation { coordinate, address }),
            Ok(None) => {
                warn!(
                    stage = "maps",
                    legajo = record.legajo,
                    address = %address,
                    "no geocoding results"
                );
                self.journal
                    .record(
                        "No se encontraron coordenadas para la dirección",
                        record_context(record, address.as_str()),
                    )
                    .await;
                None
            }
            Err(err) => {
                warn!(
                    stage = "maps",
                    legajo = record.legajo,
                    address = %address,
                    error = %err,
                    "geocoding failed"
                );
                self.journal
                    .record(
                        &format!("Error al geocodificar: {err}"),
                        record_context(record, address.as_str()),
                    )
                    .await;
                None
            }
        }
    }

    async fn distance(
        &self,
        record: &EmployeeRecord,
        location: &ResolvedLocation,
        site: Site,
    ) -> Option<u32> {
        let destination = self.reference_points.get(site);
        match self.maps.walking_distance(location.coordinate, destination).await {
            Ok(meters) => Some(meters),
            Err(err) => {
                warn!(
                    stage = "maps",
                    legajo = record.legajo,
                    site = site.as_str(),
                    error = %err,
                    "walking distance unavailable"
                );
                let message = match &err {
                    MapsError::NoRoute(status) => {
                        format!("Sin ruta peatonal hasta {site}: {status}")
                    }
                    other => format!("Error al calcular la distancia hasta {site}: {other}"),
                };
                self.journal
                    .record(&message, record_context(record, location.address.as_str()))
                    .await;
                None
            }
        }
    }

    /// Appends the row to the review sheet; `false` when the sheet could not be written.
    async fn flag(&self, row: &ResultRow) -> bool {
        let entry = ReviewEntry::for_row(row, (self.clock)().date_naive());
        match self.review.append(entry).await {
            Ok(entries) => {
                counter!("review_flagged_total").increment(1);
                info!(
                    stage = "pipeline",
                    legajo = row.legajo,
                    entries,
                    "address flagged for review"
                );
                true
            }
            Err(err) => {
                error!(
                    stage = "pipeline",
                    legajo = row.legajo,
                    error = %err,
                    "failed to update review sheet"
                );
                false
            }
        }
    }
}

fn record_context<'a>(record: &'a EmployeeRecord, direccion: &'a str) -> EntryContext<'a> {
    EntryContext {
        legajo: Some(record.legajo),
        nombre: Some(&record.apellido_nombre),
        direccion: Some(direccion),
    }
}

fn row_context(row: &ResultRow) -> EntryContext<'_> {
    EntryContext {
        legajo: Some(row.legajo),
        nombre: Some(&row.apellido_nombre),
        direccion: Some(&row.direccion),
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("a batch is already running")]
    AlreadyRunning,
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("failed to build maps client: {0}")]
    Maps(#[from] MapsError),
}
