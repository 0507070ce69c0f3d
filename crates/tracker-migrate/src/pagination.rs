//! Offset pagination over the source query.
//!
//! An empty page is the only termination condition. Reported totals may drift
//! while the source data set changes, so they are used for progress display
//! only. Each page is taken as authoritative at fetch time; records that move
//! between pages mid-run are not detected.

use tracing::info;

use crate::connectors::SourceConnector;
use crate::error::Result;
use crate::model::SourcePage;
use crate::throttle::Throttle;

/// Walks the source result set one fixed-size page at a time.
#[derive(Debug, Clone)]
pub struct Paginator {
    offset: usize,
    page_size: usize,
    fetches: usize,
    exhausted: bool,
    throttle: Throttle,
}

impl Paginator {
    /// Starts at `start_offset` (use the last logged offset to resume).
    pub fn new(start_offset: usize, page_size: usize) -> Self {
        Self {
            offset: start_offset,
            page_size: page_size.max(1),
            fetches: 0,
            exhausted: false,
            throttle: Throttle::disabled(),
        }
    }

    /// Pauses before every page request after the first.
    pub fn with_throttle(mut self, throttle: Throttle) -> Self {
        self.throttle = throttle;
        self
    }

    /// Offset of the next page to fetch.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of page requests issued so far.
    pub fn fetches(&self) -> usize {
        self.fetches
    }

    /// Fetches the next page, or `None` once the source returns an empty one.
    ///
    /// # Errors
    ///
    /// Fetch failures are returned as-is; there is no fallback for a missing
    /// page.
    pub async fn next_page(&mut self, source: &dyn SourceConnector) -> Result<Option<SourcePage>> {
        if self.exhausted {
            return Ok(None);
        }

        if self.fetches > 0 {
            self.throttle.pause("fetch page").await;
        }
        let page = source.fetch_page(self.offset, self.page_size).await?;
        self.fetches += 1;

        if page.records.is_empty() {
            info!("Empty page at offset {}, source exhausted", self.offset);
            self.exhausted = true;
            return Ok(None);
        }

        info!(
            "Offset = {}. Fetched {} records starting with {} (reported total: {})",
            self.offset,
            page.records.len(),
            page.records[0].key,
            page.total.map_or("unknown".to_string(), |t| t.to_string())
        );
        self.offset += self.page_size;
        Ok(Some(page))
    }
}
