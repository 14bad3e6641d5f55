//! Error reporting: toast notices behind dedupe and a token bucket, plus a
//! hidden diagnostics sheet that keeps one row per reported error.

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use formpane_common::CellValue;
use formpane_spec::{DiagnosticsConfig, NotificationPolicy};
use rustc_hash::FxHashMap;

use crate::error::{FormpaneError, HostError};
use crate::host::{Notice, PanelSurface, RangeTarget, WorkbookHost};
use crate::throttle::{TokenBucket, millis};

/// Header row of the diagnostics sheet.
pub const DIAGNOSTICS_HEADER: [&str; 4] = ["Timestamp", "Context", "Message", "Stack"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    Shown,
    /// Same message shown inside the dedupe window.
    Deduplicated,
    RateLimited,
}

#[derive(Debug, Clone)]
pub struct ErrorReporter {
    bucket: TokenBucket,
    dedupe_window: TimeDelta,
    recent: FxHashMap<String, DateTime<Utc>>,
}

impl ErrorReporter {
    pub fn new(policy: &NotificationPolicy) -> Self {
        Self {
            bucket: TokenBucket::new(policy.capacity, policy.refill_per_sec),
            dedupe_window: millis(policy.dedupe_window_ms),
            recent: FxHashMap::default(),
        }
    }

    /// Log `err` and, unless deduplicated or rate limited, show a notice.
    pub fn report<P: PanelSurface + ?Sized>(
        &mut self,
        panel: &mut P,
        context: &str,
        err: &FormpaneError,
        now: DateTime<Utc>,
    ) -> ReportOutcome {
        let chain = err.chain();
        tracing::warn!(context, error = %err, sources = ?&chain[1..], "panel operation failed");

        let message = err.to_string();
        let window = self.dedupe_window;
        self.recent.retain(|_, seen| now - *seen < window);
        if self.recent.contains_key(&message) {
            tracing::debug!(context, %message, "duplicate error notice suppressed");
            return ReportOutcome::Deduplicated;
        }
        if !self.bucket.try_acquire(now) {
            tracing::debug!(context, %message, "error notice rate limited");
            return ReportOutcome::RateLimited;
        }
        self.recent.insert(message.clone(), now);
        panel.notify(Notice::error(message));
        ReportOutcome::Shown
    }
}

/// Appends reported errors to a hidden worksheet.
#[derive(Debug, Clone)]
pub struct DiagnosticsLog {
    enabled: bool,
    sheet: String,
    bucket: TokenBucket,
    prepared: bool,
}

impl DiagnosticsLog {
    pub fn new(config: &DiagnosticsConfig) -> Self {
        Self {
            enabled: config.enabled,
            sheet: config.sheet.trim().to_string(),
            bucket: TokenBucket::new(config.capacity, config.refill_per_sec),
            prepared: false,
        }
    }

    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Best effort: returns whether a row was written. Failures are logged
    /// and swallowed.
    pub fn record<H: WorkbookHost + ?Sized>(
        &mut self,
        host: &mut H,
        context: &str,
        err: &FormpaneError,
        now: DateTime<Utc>,
    ) -> bool {
        if !self.enabled {
            return false;
        }
        if !self.bucket.try_acquire(now) {
            tracing::debug!(context, "diagnostics row rate limited");
            return false;
        }
        match self.append(host, context, err, now) {
            Ok(()) => true,
            Err(write_err) => {
                self.prepared = false;
                tracing::warn!(
                    sheet = %self.sheet,
                    error = %write_err,
                    "failed to write diagnostics row"
                );
                false
            }
        }
    }

    fn append<H: WorkbookHost + ?Sized>(
        &mut self,
        host: &mut H,
        context: &str,
        err: &FormpaneError,
        now: DateTime<Utc>,
    ) -> Result<(), HostError> {
        if !self.prepared {
            self.prepare(host)?;
        }
        let used = host.load_used_range(&self.sheet);
        flush(host)?;
        let next_row = host.take(used)?.len().max(1) + 1;

        let chain = err.chain();
        let row = vec![
            CellValue::Text(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
            CellValue::Text(context.to_string()),
            CellValue::Text(chain[0].clone()),
            CellValue::Text(chain[1..].join("\n")),
        ];
        host.write_values(
            &RangeTarget::cells(&self.sheet, format!("A{next_row}:D{next_row}")),
            vec![row],
        );
        flush(host)
    }

    /// Create the hidden sheet when missing, and write the header row
    /// whenever the sheet is still empty.
    fn prepare<H: WorkbookHost + ?Sized>(&mut self, host: &mut H) -> Result<(), HostError> {
        let names = host.load_sheet_names();
        flush(host)?;
        let exists = host
            .take(names)?
            .iter()
            .any(|name| name.eq_ignore_ascii_case(&self.sheet));
        let empty = if exists {
            let used = host.load_used_range(&self.sheet);
            flush(host)?;
            host.take(used)?.is_empty()
        } else {
            host.add_sheet(&self.sheet);
            host.set_sheet_visibility(&self.sheet, false);
            true
        };
        if empty {
            host.write_values(
                &RangeTarget::cells(&self.sheet, "A1:D1"),
                vec![DIAGNOSTICS_HEADER.iter().map(|h| CellValue::from(*h)).collect()],
            );
            flush(host)?;
        }
        self.prepared = true;
        Ok(())
    }
}

/// Sync, discarding the echoes of our own diagnostics writes.
fn flush<H: WorkbookHost + ?Sized>(host: &mut H) -> Result<(), HostError> {
    let echoes = host.sync()?;
    if !echoes.is_empty() {
        tracing::debug!(count = echoes.len(), "ignoring diagnostics echoes");
    }
    Ok(())
}
