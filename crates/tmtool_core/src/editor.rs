use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::StatusCode;
use crate::config::TmConfig;
use crate::gateway::{GatewayConfig, RemoteWikiGateway};
use crate::reconcile::{
    ReconcileOutcome, ReconcileReport, RedirectReconciler, Severity, local_outcome,
};
use crate::record::{StatusRecord, ValidationError};
use crate::store::{SaveOutcome, StatusStore};

/// Raw field values as submitted. `None` leaves a field as loaded; an empty
/// string clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusEdit {
    pub comments: Option<String>,
    pub status: Option<String>,
    pub translator: Option<String>,
    pub project: Option<String>,
    pub language: Option<String>,
    pub suggested_name: Option<String>,
    pub wordcount: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditMessage {
    pub severity: Severity,
    pub code: String,
    pub text: String,
}

impl EditMessage {
    fn new(severity: Severity, code: &str, text: impl Into<String>) -> Self {
        Self {
            severity,
            code: code.to_string(),
            text: text.into(),
        }
    }

    fn rejected(error: &ValidationError) -> Self {
        Self::new(Severity::Error, error.code(), error.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditReport {
    pub saved: bool,
    pub outcome: Option<ReconcileReport>,
    pub messages: Vec<EditMessage>,
    #[serde(skip)]
    pub record: Option<StatusRecord>,
}

impl EditReport {
    fn rejected(message: EditMessage) -> Self {
        Self {
            saved: false,
            outcome: None,
            messages: vec![message],
            record: None,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.messages
            .iter()
            .any(|message| message.severity == Severity::Error)
    }
}

/// Validate, save and reconcile one status edit.
///
/// Field problems, missing pages, duplicate suggestions and a language change
/// onto an existing row come back as report messages with nothing written. Storage failures and incomplete gateway
/// settings are errors. `connect` only runs when the target wiki must be asked.
pub fn submit_edit<G, F>(
    store: &StatusStore,
    config: &TmConfig,
    page_id: i64,
    language: &str,
    edit: &StatusEdit,
    connect: F,
) -> Result<EditReport>
where
    G: RemoteWikiGateway,
    F: FnOnce(GatewayConfig) -> Result<G>,
{
    let catalog = config.catalog();
    if let Err(error) = catalog.check_language(language) {
        return Ok(EditReport::rejected(EditMessage::rejected(&error)));
    }

    let mut record = store.load(page_id, language)?;
    if !record.exists() {
        return Ok(EditReport::rejected(missing_page(page_id)));
    }

    // A language change re-targets another wiki: take that language's link
    // and forget the redirect that lives on the old one.
    let mut moved_from = None;
    if let Some(target_language) = edit
        .language
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty() && *value != language)
    {
        if let Err(error) = catalog.check_language(target_language) {
            return Ok(EditReport::rejected(EditMessage::rejected(&error)));
        }
        let target = store.load(page_id, target_language)?;
        if target.is_saved() {
            return Ok(EditReport::rejected(language_taken(page_id, target_language)));
        }
        if let Err(error) = record.move_to_language(&target, &catalog) {
            return Ok(EditReport::rejected(EditMessage::rejected(&error)));
        }
        moved_from = Some(target);
    }

    if let Err(error) = apply_edit(&mut record, config, edit) {
        warn!(page_id, code = error.code(), "status edit rejected");
        return Ok(EditReport::rejected(EditMessage::rejected(&error)));
    }
    if let Some(target) = &moved_from {
        record.rebase_suggestion(target.suggested_translation());
        info!(page_id, from = language, to = record.language(), "status moved to another language");
    }

    let Some(change) = record.suggestion_change() else {
        return Ok(EditReport::rejected(missing_page(page_id)));
    };
    let gateway_config = match local_outcome(&change) {
        Some(_) => None,
        None => Some(config.gateway_config(record.language())?),
    };

    match store.save(&mut record)? {
        SaveOutcome::Saved => {}
        SaveOutcome::DuplicateSuggestion(existing) => {
            let claimed_by = existing
                .page_name()
                .map(ToString::to_string)
                .unwrap_or_else(|| existing.page_id().to_string());
            return Ok(EditReport::rejected(EditMessage::new(
                Severity::Error,
                "duplicate-suggestion",
                format!(
                    "`{}` is already the suggested translation of {claimed_by}",
                    change.new.as_deref().unwrap_or_default()
                ),
            )));
        }
        SaveOutcome::LanguageTaken(taken) => {
            return Ok(EditReport::rejected(language_taken(page_id, &taken)));
        }
    }
    info!(page_id, language = record.language(), "status saved");

    let mut messages = vec![EditMessage::new(
        Severity::Success,
        "saved",
        "translation status saved",
    )];

    let report = match gateway_config {
        None => ReconcileReport::new(local_outcome(&change).unwrap_or(ReconcileOutcome::NoChange)),
        Some(gateway_config) => match connect(gateway_config) {
            Ok(mut gateway) => RedirectReconciler::new(&mut gateway).reconcile(&change),
            Err(error) => ReconcileReport::failed(ReconcileOutcome::FailedConnect, &error),
        },
    };

    let severity = report.outcome.severity();
    if severity != Severity::Silent {
        let text = match &report.detail {
            Some(detail) => format!("{}: {detail}", report.outcome.message()),
            None => report.outcome.message().to_string(),
        };
        messages.push(EditMessage::new(severity, report.outcome.code(), text));
    }

    Ok(EditReport {
        saved: true,
        outcome: Some(report),
        messages,
        record: Some(record),
    })
}

fn missing_page(page_id: i64) -> EditMessage {
    EditMessage::new(
        Severity::Error,
        "missing-page",
        format!("page {page_id} does not exist or is not an article"),
    )
}

fn language_taken(page_id: i64, language: &str) -> EditMessage {
    EditMessage::new(
        Severity::Error,
        "language-taken",
        format!("page {page_id} already has a status for `{language}`"),
    )
}

/// Form order: comments, status, translator, project, suggestion, wordcount,
/// dates. A language change is applied by the caller beforehand.
fn apply_edit(
    record: &mut StatusRecord,
    config: &TmConfig,
    edit: &StatusEdit,
) -> Result<(), ValidationError> {
    let catalog = config.catalog();

    if edit.comments.is_some() {
        record.set_comments(edit.comments.as_deref());
    }
    if let Some(status) = edit.status.as_deref().filter(|value| !value.trim().is_empty()) {
        // The form echoes the derived status back for translated pages.
        let echoes_derived = record.actual_translation().is_some()
            && catalog.parse_status(status)? == StatusCode::Translated;
        if !echoes_derived {
            record.set_status(status, &catalog)?;
        }
    }
    if edit.translator.is_some() {
        record.set_translator(edit.translator.as_deref());
    }
    if edit.project.is_some() {
        record.set_project(edit.project.as_deref());
    }
    if edit.suggested_name.is_some() {
        record.set_suggested_translation(edit.suggested_name.as_deref(), &config.title_rules())?;
    }
    if let Some(wordcount) = &edit.wordcount {
        record.set_wordcount_from_field(wordcount)?;
    }
    if let Some(start_date) = &edit.start_date {
        record.set_start_date_from_field(start_date)?;
    }
    if let Some(end_date) = &edit.end_date {
        record.set_end_date_from_field(end_date)?;
    }
    Ok(())
}
