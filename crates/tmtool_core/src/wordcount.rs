use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::config::TmConfig;
use crate::store::{SaveOutcome, StatusStore};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WordCountReport {
    pub wordcount_saved: bool,
    pub end_date_set: bool,
}

impl WordCountReport {
    pub fn changed(&self) -> bool {
        self.wordcount_saved || self.end_date_set
    }
}

/// Store a freshly computed word count on a record that has none yet, and
/// optionally close the translation. Both steps are opt-in through
/// `[translation]` settings and never overwrite an existing value.
pub fn record_word_count(
    store: &StatusStore,
    config: &TmConfig,
    page_id: i64,
    language: &str,
    count: u32,
    now: DateTime<Utc>,
) -> Result<WordCountReport> {
    config.catalog().check_language(language)?;
    let mut record = store.load(page_id, language)?;
    if !record.exists() {
        bail!("page {page_id} does not exist or is not an article");
    }

    let mut report = WordCountReport::default();
    if config.translation.auto_save_word_count && record.wordcount().is_none() {
        record.set_wordcount(Some(count));
        report.wordcount_saved = true;
    }
    if config.translation.auto_set_end_date_on_word_count && record.end_date().is_none() {
        record.set_end_date(Some(now));
        report.end_date_set = true;
    }

    if report.changed() {
        match store.save(&mut record)? {
            SaveOutcome::Saved => {}
            SaveOutcome::DuplicateSuggestion(existing) => bail!(
                "suggested translation is already claimed by page {}",
                existing.page_id()
            ),
            SaveOutcome::LanguageTaken(taken) => {
                bail!("page {page_id} already has a status for `{taken}`")
            }
        }
        info!(
            page_id,
            language,
            wordcount_saved = report.wordcount_saved,
            end_date_set = report.end_date_set,
            "word count recorded"
        );
    }
    Ok(report)
}
