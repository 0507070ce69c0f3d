//! Migration pipeline orchestration.

use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tracing::{debug, error, info, warn};

use crate::attachments::AttachmentTransfer;
use crate::config::{MigrationConfig, MigrationOptions};
use crate::connectors::{create_destination, create_source, DestinationConnector, SourceConnector};
use crate::convert::{DescriptionConverter, PlainTextConverter};
use crate::error::Result;
use crate::mapper::FieldMapper;
use crate::migrator::{IdMap, RecordMigrator};
use crate::pagination::Paginator;
use crate::report::{FailureKind, MigrationReport};
use crate::schema::DestinationSchema;

/// Migration statistics.
#[derive(Debug, Default, Clone)]
pub struct MigrationStats {
    /// Source page requests (including the final empty one).
    pub pages: u64,
    /// Top-level records extracted.
    pub extracted: u64,
    /// Destination records created, children included.
    pub created: u64,
    /// Records whose fetch or creation failed.
    pub failed: u64,
    /// Attachments transferred.
    pub attachments: u64,
    /// Comment rollups posted.
    pub comments: u64,
    /// Duration in seconds.
    pub duration_secs: f64,
}

impl MigrationStats {
    /// Calculate throughput (records created per second).
    #[must_use]
    pub fn throughput(&self) -> f64 {
        if self.duration_secs > 0.0 {
            self.created as f64 / self.duration_secs
        } else {
            0.0
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Counters.
    pub stats: MigrationStats,
    /// Failures for manual remediation.
    pub report: MigrationReport,
    /// Source id → destination id.
    pub id_map: IdMap,
}

/// Migration pipeline.
pub struct Pipeline {
    options: MigrationOptions,
    source: Box<dyn SourceConnector>,
    destination: Box<dyn DestinationConnector>,
    mapper: FieldMapper,
    converter: Box<dyn DescriptionConverter>,
    show_progress: bool,
}

impl Pipeline {
    /// Create a new migration pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if a connector cannot be created.
    pub fn new(config: MigrationConfig) -> Result<Self> {
        let timeout = config.options.request_timeout();
        let source = create_source(&config.source, timeout)?;
        let destination = create_destination(&config.destination, config.options.dry_run, timeout)?;
        Ok(Self::with_connectors(
            source,
            destination,
            FieldMapper::new(config.fields),
            config.options,
        ))
    }

    /// Create a pipeline over already built connectors.
    pub fn with_connectors(
        source: Box<dyn SourceConnector>,
        destination: Box<dyn DestinationConnector>,
        mapper: FieldMapper,
        options: MigrationOptions,
    ) -> Self {
        Self {
            options,
            source,
            destination,
            mapper,
            converter: Box::new(PlainTextConverter),
            show_progress: true,
        }
    }

    /// Replace the description converter.
    #[must_use]
    pub fn with_converter(mut self, converter: Box<dyn DescriptionConverter>) -> Self {
        self.converter = converter;
        self
    }

    /// Disable the progress bar.
    #[must_use]
    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Run the migration pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination schema cannot be loaded or a
    /// source page cannot be fetched. Per-record failures are collected in
    /// the returned report instead.
    pub async fn run(&self) -> Result<RunSummary> {
        let start = std::time::Instant::now();
        let mut stats = MigrationStats::default();

        info!(
            "Starting migration pipeline: {} -> {}",
            self.source.source_type(),
            self.destination.destination_type()
        );
        if self.options.dry_run {
            info!("Dry run mode - not writing to destination");
        }

        let schema = DestinationSchema::load(self.destination.as_ref()).await?;
        info!("Destination schema: {} fields", schema.len());

        let throttle = self.options.throttle();
        let mut migrator = RecordMigrator::new(
            self.source.as_ref(),
            self.destination.as_ref(),
            &schema,
            &self.mapper,
        )
        .with_throttle(throttle)
        .with_transfer(AttachmentTransfer::new(
            self.options.staging_dir.clone(),
            throttle,
        ))
        .with_converter(self.converter.as_ref())
        .with_status_mapping(self.options.status_mapping.clone());

        let mut paginator = Paginator::new(self.options.start_offset, self.options.page_size)
            .with_throttle(throttle);
        let mut progress: Option<ProgressBar> = None;

        loop {
            let page = match paginator.next_page(self.source.as_ref()).await {
                Ok(Some(page)) => page,
                Ok(None) => break,
                Err(e) => {
                    error!(
                        "Page fetch failed: {}. Resume with start_offset = {}",
                        e,
                        paginator.offset()
                    );
                    if let Some(bar) = &progress {
                        bar.abandon();
                    }
                    if let Err(save_err) = self.save_id_map(migrator.id_map()).await {
                        error!("Could not save id map: {}", save_err);
                    }
                    return Err(e);
                }
            };

            let bar = progress.get_or_insert_with(|| {
                let remaining = page
                    .total
                    .map(|t| t.saturating_sub(self.options.start_offset as u64));
                self.create_progress_bar(remaining)
            });

            for record in &page.records {
                stats.extracted += 1;
                bar.set_message(record.key.clone());
                match migrator.migrate(record, None).await {
                    Ok(outcome) => debug!(
                        "{} -> {} ({} records, {} child failures)",
                        outcome.source_key,
                        outcome.destination_id,
                        outcome.records_created(),
                        outcome.failed_children.len()
                    ),
                    Err(e) => debug!("{} skipped: {}", record.key, e),
                }
                bar.inc(1);
            }
        }

        if let Some(bar) = &progress {
            bar.finish_with_message("Migration complete");
        }

        let (report, id_map) = migrator.into_parts();
        self.save_id_map(&id_map).await?;

        stats.pages = paginator.fetches() as u64;
        stats.created = report.records_created as u64;
        stats.failed = report.records_failed as u64;
        stats.attachments = report.attachments_transferred as u64;
        stats.comments = report.comments_posted as u64;
        stats.duration_secs = start.elapsed().as_secs_f64();

        log_summary(&stats, &report);

        Ok(RunSummary {
            stats,
            report,
            id_map,
        })
    }

    async fn save_id_map(&self, id_map: &IdMap) -> Result<()> {
        match &self.options.id_map_path {
            Some(path) => write_id_map(path, id_map).await,
            None => Ok(()),
        }
    }

    fn create_progress_bar(&self, total: Option<u64>) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        create_progress_bar(total.unwrap_or(0))
    }
}

/// Writes the identifier mapping as pretty JSON.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub async fn write_id_map(path: &Path, id_map: &IdMap) -> Result<()> {
    let json = serde_json::to_string_pretty(id_map)?;
    tokio::fs::write(path, json).await?;
    info!("Wrote {} id mappings to {}", id_map.len(), path.display());
    Ok(())
}

/// Reads an identifier mapping written by [`write_id_map`].
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub async fn read_id_map(path: &Path) -> Result<IdMap> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
}

fn log_summary(stats: &MigrationStats, report: &MigrationReport) {
    info!(
        "Migration complete: {} extracted, {} created, {} failed, {} attachments, {} comments in {:.2}s ({:.2} records/sec)",
        stats.extracted,
        stats.created,
        stats.failed,
        stats.attachments,
        stats.comments,
        stats.duration_secs,
        stats.throughput()
    );

    if report.is_clean() {
        return;
    }
    for kind in [
        FailureKind::SchemaFieldNotFound,
        FailureKind::SchemaOptionNotFound,
        FailureKind::Transport,
        FailureKind::ContentParse,
    ] {
        let count = report.count(kind);
        if count > 0 {
            warn!("{:?}: {} failures", kind, count);
        }
    }
}

fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = if total > 0 {
        ProgressBar::new(total)
    } else {
        ProgressBar::new_spinner()
    };

    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    pb
}
