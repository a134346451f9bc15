use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::catalog::{Catalog, StatusCode};
use crate::reconcile::SuggestionChange;
use crate::title::{TitleProblem, TitleRules};

/// Field-level rejection. Raised before anything is persisted or sent remotely.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid suggested title `{title}`: {problem:?}")]
    InvalidTitle { title: String, problem: TitleProblem },
    #[error("invalid target language `{0}`")]
    InvalidLanguage(String),
    #[error("invalid status code `{0}`")]
    InvalidStatus(String),
    #[error("status is derived from an existing translation and cannot be set to `{0}`")]
    StatusDerived(StatusCode),
    #[error("invalid word count `{0}`")]
    InvalidWordcount(String),
    #[error("invalid date `{0}`, expected YYYY-MM-DD")]
    InvalidDate(String),
}

impl ValidationError {
    /// Stable reason code surfaced to callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidTitle { .. } => "invalid-title",
            Self::InvalidLanguage(_) => "invalid-language",
            Self::InvalidStatus(_) => "invalid-status",
            Self::StatusDerived(_) => "status-derived",
            Self::InvalidWordcount(_) => "invalid-wordcount",
            Self::InvalidDate(_) => "invalid-date",
        }
    }
}

/// Translation status of one source page for one target language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRecord {
    page_id: i64,
    page_name: Option<String>,
    exists: bool,
    language: String,
    stored_language: Option<String>,
    status: Option<StatusCode>,
    suggested_translation: Option<String>,
    #[serde(skip)]
    previous_suggested_translation: Option<String>,
    actual_translation: Option<String>,
    project: Option<String>,
    translator: Option<String>,
    comments: Option<String>,
    article_type: Option<String>,
    wordcount: Option<u32>,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    is_saved: bool,
}

/// What the store knows about a page and its prior status row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredStatus {
    pub page_name: Option<String>,
    pub exists: bool,
    pub actual_translation: Option<String>,
    pub article_type: Option<String>,
    pub row: Option<StatusRow>,
}

/// One persisted `tm_status` row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusRow {
    pub language: String,
    pub suggested_name: Option<String>,
    pub project: Option<String>,
    pub status: Option<StatusCode>,
    pub translator: Option<String>,
    pub comments: Option<String>,
    pub wordcount: Option<u32>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl StatusRecord {
    /// An empty, unsaved record for a page that has not been resolved.
    pub fn new(page_id: i64, language: &str) -> Self {
        Self {
            page_id,
            page_name: None,
            exists: false,
            language: language.to_string(),
            stored_language: None,
            status: None,
            suggested_translation: None,
            previous_suggested_translation: None,
            actual_translation: None,
            project: None,
            translator: None,
            comments: None,
            article_type: None,
            wordcount: None,
            start_date: None,
            end_date: None,
            is_saved: false,
        }
    }

    pub(crate) fn hydrate(page_id: i64, language: &str, stored: StoredStatus) -> Self {
        let mut record = Self::new(page_id, language);
        record.page_name = stored.page_name;
        record.exists = stored.exists && page_id > 0;
        record.actual_translation = stored.actual_translation;
        record.article_type = stored.article_type;
        if let Some(row) = stored.row {
            record.stored_language = Some(row.language);
            record.suggested_translation = row.suggested_name.clone();
            record.previous_suggested_translation = row.suggested_name;
            record.project = row.project;
            record.status = row.status;
            record.translator = row.translator;
            record.comments = row.comments;
            record.wordcount = row.wordcount;
            record.start_date = row.start_date;
            record.end_date = row.end_date;
            record.is_saved = true;
        }
        record
    }

    pub(crate) fn mark_saved(&mut self) {
        self.is_saved = true;
        self.stored_language = Some(self.language.clone());
    }

    pub(crate) fn stored_language(&self) -> Option<&str> {
        self.stored_language.as_deref()
    }

    /// The stored status value, without the translated override.
    pub(crate) fn stored_status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn is_saved(&self) -> bool {
        self.is_saved
    }

    pub fn page_id(&self) -> i64 {
        self.page_id
    }

    pub fn page_name(&self) -> Option<&str> {
        self.page_name.as_deref()
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn set_language(&mut self, code: &str, catalog: &Catalog) -> Result<(), ValidationError> {
        let code = code.trim();
        catalog.check_language(code)?;
        self.language = code.to_string();
        Ok(())
    }

    /// An existing interlanguage link always wins over the stored status.
    pub fn status(&self) -> StatusCode {
        if self.actual_translation.is_some() {
            StatusCode::Translated
        } else {
            self.status.unwrap_or(StatusCode::Untranslated)
        }
    }

    pub fn set_status(&mut self, code: &str, catalog: &Catalog) -> Result<(), ValidationError> {
        let status = catalog.parse_status(code)?;
        if self.actual_translation.is_some() && status != StatusCode::Translated {
            return Err(ValidationError::StatusDerived(status));
        }
        self.status = Some(status);
        Ok(())
    }

    pub fn suggested_translation(&self) -> Option<&str> {
        self.suggested_translation.as_deref()
    }

    pub fn previous_suggested_translation(&self) -> Option<&str> {
        self.previous_suggested_translation.as_deref()
    }

    /// Blank input clears the suggestion. A rejected title leaves the record untouched.
    pub fn set_suggested_translation(
        &mut self,
        title: Option<&str>,
        rules: &TitleRules,
    ) -> Result<(), ValidationError> {
        let next = match title.map(str::trim).filter(|value| !value.is_empty()) {
            Some(raw) => Some(rules.parse(raw).map_err(|problem| {
                ValidationError::InvalidTitle {
                    title: raw.to_string(),
                    problem,
                }
            })?),
            None => None,
        };
        self.previous_suggested_translation = self.suggested_translation.take();
        self.suggested_translation = next;
        Ok(())
    }

    pub fn actual_translation(&self) -> Option<&str> {
        self.actual_translation.as_deref()
    }

    pub fn article_type(&self) -> Option<&str> {
        self.article_type.as_deref()
    }

    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    pub fn set_project(&mut self, project: Option<&str>) {
        self.project = clean_text(project);
    }

    pub fn translator(&self) -> Option<&str> {
        self.translator.as_deref()
    }

    pub fn set_translator(&mut self, translator: Option<&str>) {
        self.translator = clean_text(translator);
    }

    pub fn comments(&self) -> Option<&str> {
        self.comments.as_deref()
    }

    pub fn set_comments(&mut self, comments: Option<&str>) {
        self.comments = clean_text(comments);
    }

    pub fn wordcount(&self) -> Option<u32> {
        self.wordcount
    }

    pub fn set_wordcount(&mut self, wordcount: Option<u32>) {
        self.wordcount = wordcount;
    }

    pub fn set_wordcount_from_field(&mut self, field: &str) -> Result<(), ValidationError> {
        let field = field.trim();
        if field.is_empty() {
            self.wordcount = None;
            return Ok(());
        }
        let value = field
            .parse::<u32>()
            .map_err(|_| ValidationError::InvalidWordcount(field.to_string()))?;
        self.wordcount = Some(value);
        Ok(())
    }

    pub fn start_date(&self) -> Option<DateTime<Utc>> {
        self.start_date
    }

    pub fn set_start_date(&mut self, start_date: Option<DateTime<Utc>>) {
        self.start_date = start_date;
    }

    pub fn set_start_date_from_field(&mut self, field: &str) -> Result<(), ValidationError> {
        self.start_date = timestamp_from_field(field, DayBoundary::Start)?;
        Ok(())
    }

    pub fn end_date(&self) -> Option<DateTime<Utc>> {
        self.end_date
    }

    pub fn set_end_date(&mut self, end_date: Option<DateTime<Utc>>) {
        self.end_date = end_date;
    }

    pub fn set_end_date_from_field(&mut self, field: &str) -> Result<(), ValidationError> {
        self.end_date = timestamp_from_field(field, DayBoundary::End)?;
        Ok(())
    }

    /// The delta the redirect reconciler works from. `None` until the page
    /// has resolved to a title a redirect could point at.
    pub fn suggestion_change(&self) -> Option<SuggestionChange> {
        let origin_title = self.page_name.clone().filter(|name| !name.is_empty())?;
        Some(SuggestionChange {
            previous: self.previous_suggested_translation.clone(),
            new: self.suggested_translation.clone(),
            origin_title,
            actual_translation: self.actual_translation.clone(),
        })
    }

    /// Re-point the record at another target language. `target` is the state
    /// loaded for that language; its interlanguage link replaces ours.
    pub(crate) fn move_to_language(
        &mut self,
        target: &StatusRecord,
        catalog: &Catalog,
    ) -> Result<(), ValidationError> {
        catalog.check_language(target.language())?;
        self.language = target.language.clone();
        self.actual_translation = target.actual_translation.clone();
        Ok(())
    }

    /// Replace the reconciliation baseline with what the current target wiki
    /// is known to hold. Used after a language move, where the old value
    /// belongs to another wiki.
    pub(crate) fn rebase_suggestion(&mut self, remote: Option<&str>) {
        self.previous_suggested_translation = remote.map(ToString::to_string);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayBoundary {
    Start,
    End,
}

/// Turn a `YYYY-MM-DD` form value into the first or last second of that UTC day.
pub fn timestamp_from_field(
    field: &str,
    boundary: DayBoundary,
) -> Result<Option<DateTime<Utc>>, ValidationError> {
    let field = field.trim();
    if field.is_empty() {
        return Ok(None);
    }
    let date = NaiveDate::parse_from_str(field, "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate(field.to_string()))?;
    let time = match boundary {
        DayBoundary::Start => NaiveTime::MIN,
        DayBoundary::End => NaiveTime::from_hms_opt(23, 59, 59)
            .ok_or_else(|| ValidationError::InvalidDate(field.to_string()))?,
    };
    Ok(Some(date.and_time(time).and_utc()))
}

fn clean_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}
