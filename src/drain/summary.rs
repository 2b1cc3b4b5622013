use std::fmt;

use tracing::info;

/// Per-run tally of what happened to each staged key and field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainSummary {
    /// Keys present in the snapshot taken at the start of the run.
    pub keys_listed: usize,
    /// Keys removed from staging.
    pub keys_deleted: usize,
    /// Keys whose payload could not be parsed (dead-lettered, then deleted).
    pub keys_malformed: usize,
    /// Keys that vanished between listing and fetching.
    pub keys_missing: usize,
    /// Keys that could not be fetched or deleted.
    pub keys_failed: usize,
    /// Stations whose alert rules could not be loaded.
    pub rule_lookups_failed: usize,
    /// Fields that produced a measurement.
    pub fields_resolved: usize,
    /// Fields with no sensor bound to them.
    pub fields_skipped: usize,
    /// Fields dropped because of a bad value or a storage error.
    pub fields_failed: usize,
    pub occurrences: usize,
    pub occurrences_failed: usize,
    /// The run stopped early because shutdown was requested.
    pub cancelled: bool,
}

impl DrainSummary {
    pub fn log(&self) {
        info!(
            keys_listed = self.keys_listed,
            keys_deleted = self.keys_deleted,
            keys_malformed = self.keys_malformed,
            keys_missing = self.keys_missing,
            keys_failed = self.keys_failed,
            rule_lookups_failed = self.rule_lookups_failed,
            fields_resolved = self.fields_resolved,
            fields_skipped = self.fields_skipped,
            fields_failed = self.fields_failed,
            occurrences = self.occurrences,
            occurrences_failed = self.occurrences_failed,
            cancelled = self.cancelled,
            "Drain run finished: {}",
            self
        );
    }
}

impl fmt::Display for DrainSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} keys drained, {} measurements, {} skipped, {} failed fields, {} occurrences",
            self.keys_deleted,
            self.keys_listed,
            self.fields_resolved,
            self.fields_skipped,
            self.fields_failed,
            self.occurrences,
        )?;
        if self.cancelled {
            f.write_str(" (cancelled)")?;
        }
        Ok(())
    }
}
