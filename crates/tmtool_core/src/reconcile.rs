use serde::Serialize;
use tracing::{info, warn};

use crate::gateway::{PageStatus, RemoteWikiGateway};

/// Old and new suggested title for one record, plus what the wiki already links.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuggestionChange {
    pub previous: Option<String>,
    pub new: Option<String>,
    /// Source-language title the redirect points back to.
    pub origin_title: String,
    pub actual_translation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReconcileOutcome {
    Created,
    Moved,
    NoChange,
    Removed,
    AlreadyTranslated,
    FailedExists,
    FailedCreate,
    FailedMove,
    FailedQuery,
    FailedConnect,
    ArticleExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Silent,
    Success,
    Warning,
    Error,
}

impl ReconcileOutcome {
    pub fn code(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Moved => "moved",
            Self::NoChange => "no-change",
            Self::Removed => "removed",
            Self::AlreadyTranslated => "already-translated",
            Self::FailedExists => "failed-exists",
            Self::FailedCreate => "failed-create",
            Self::FailedMove => "failed-move",
            Self::FailedQuery => "failed-query",
            Self::FailedConnect => "failed-connect",
            Self::ArticleExists => "article-exists",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            Self::NoChange => Severity::Silent,
            Self::Created | Self::Moved => Severity::Success,
            Self::Removed | Self::AlreadyTranslated => Severity::Warning,
            Self::FailedExists
            | Self::FailedCreate
            | Self::FailedMove
            | Self::FailedQuery
            | Self::FailedConnect
            | Self::ArticleExists => Severity::Error,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Created => "a redirect was created on the target wiki",
            Self::Moved => "the existing redirect was moved to the new title",
            Self::NoChange => "the suggested translation did not change",
            Self::Removed => {
                "the suggestion was removed; any old redirect on the target wiki was left in place"
            }
            Self::AlreadyTranslated => "the page is already translated; no redirect was created",
            Self::FailedExists => "an article with the suggested title already exists",
            Self::FailedCreate => "creating the redirect failed",
            Self::FailedMove => "moving the existing redirect failed",
            Self::FailedQuery => "the target wiki could not be queried",
            Self::FailedConnect => "could not connect to the target wiki",
            Self::ArticleExists => {
                "the previous suggestion is a real article on the target wiki; nothing was changed"
            }
        }
    }
}

/// Outcome plus whatever the remote side said when it went wrong.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub outcome: ReconcileOutcome,
    pub detail: Option<String>,
}

impl ReconcileReport {
    pub fn new(outcome: ReconcileOutcome) -> Self {
        Self {
            outcome,
            detail: None,
        }
    }

    pub fn failed(outcome: ReconcileOutcome, error: &anyhow::Error) -> Self {
        warn!(outcome = outcome.code(), error = %format!("{error:#}"), "redirect reconciliation failed");
        Self {
            outcome,
            detail: Some(format!("{error:#}")),
        }
    }
}

/// The first three rows of the decision table, which never touch the remote wiki.
pub fn local_outcome(change: &SuggestionChange) -> Option<ReconcileOutcome> {
    if change.new == change.previous {
        return Some(ReconcileOutcome::NoChange);
    }
    if change.actual_translation.is_some() {
        return Some(ReconcileOutcome::AlreadyTranslated);
    }
    if change.new.is_none() {
        return Some(ReconcileOutcome::Removed);
    }
    None
}

/// Keeps the target wiki's placeholder redirect aligned with the suggestion.
/// Never deletes, never overwrites an article, and moves an existing redirect
/// rather than creating a second one.
pub struct RedirectReconciler<'a, G: RemoteWikiGateway> {
    gateway: &'a mut G,
}

impl<'a, G: RemoteWikiGateway> RedirectReconciler<'a, G> {
    pub fn new(gateway: &'a mut G) -> Self {
        Self { gateway }
    }

    pub fn reconcile(&mut self, change: &SuggestionChange) -> ReconcileReport {
        let report = self.decide_and_apply(change);
        info!(
            outcome = report.outcome.code(),
            previous = change.previous.as_deref().unwrap_or(""),
            new = change.new.as_deref().unwrap_or(""),
            "redirect reconciliation finished"
        );
        report
    }

    fn decide_and_apply(&mut self, change: &SuggestionChange) -> ReconcileReport {
        if let Some(outcome) = local_outcome(change) {
            return ReconcileReport::new(outcome);
        }
        let Some(new_title) = change.new.as_deref() else {
            return ReconcileReport::new(ReconcileOutcome::Removed);
        };

        // A stray redirect at the new title may be rewritten; an article may not.
        let replace_redirect = match self.gateway.page_status(new_title) {
            Ok(PageStatus::Exists) => return ReconcileReport::new(ReconcileOutcome::FailedExists),
            Ok(PageStatus::Missing) => false,
            Ok(PageStatus::Redirect) => true,
            Err(error) => return ReconcileReport::failed(ReconcileOutcome::FailedQuery, &error),
        };

        let Some(old_title) = change.previous.as_deref() else {
            return self.create(new_title, &change.origin_title, replace_redirect);
        };

        match self.gateway.page_status(old_title) {
            Ok(PageStatus::Redirect) => match self.gateway.move_page(old_title, new_title) {
                Ok(true) => ReconcileReport::new(ReconcileOutcome::Moved),
                Ok(false) => ReconcileReport::new(ReconcileOutcome::FailedMove),
                Err(error) => ReconcileReport::failed(ReconcileOutcome::FailedMove, &error),
            },
            Ok(PageStatus::Missing) => {
                self.create(new_title, &change.origin_title, replace_redirect)
            }
            Ok(PageStatus::Exists) => ReconcileReport::new(ReconcileOutcome::ArticleExists),
            Err(error) => ReconcileReport::failed(ReconcileOutcome::FailedQuery, &error),
        }
    }

    fn create(&mut self, title: &str, origin_title: &str, replace_redirect: bool) -> ReconcileReport {
        match self
            .gateway
            .create_redirect(title, origin_title, replace_redirect)
        {
            Ok(true) => ReconcileReport::new(ReconcileOutcome::Created),
            Ok(false) => ReconcileReport::new(ReconcileOutcome::FailedCreate),
            Err(error) => ReconcileReport::failed(ReconcileOutcome::FailedCreate, &error),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::BTreeMap;

    use anyhow::{Result, bail};

    use super::*;

    /// Records every call; unknown titles are reported missing.
    #[derive(Default)]
    pub(crate) struct MockGateway {
        pub statuses: BTreeMap<String, PageStatus>,
        pub status_queries: Vec<String>,
        pub created: Vec<(String, String)>,
        /// Titles whose existing redirect was rewritten by a create.
        pub replaced: Vec<String>,
        pub moved: Vec<(String, String)>,
        pub fail_queries: bool,
        pub fail_writes: bool,
    }

    impl MockGateway {
        pub(crate) fn with(statuses: &[(&str, PageStatus)]) -> Self {
            Self {
                statuses: statuses
                    .iter()
                    .map(|(title, status)| (title.to_string(), *status))
                    .collect(),
                ..Self::default()
            }
        }

        pub(crate) fn remote_calls(&self) -> usize {
            self.status_queries.len() + self.writes()
        }

        pub(crate) fn writes(&self) -> usize {
            self.created.len() + self.moved.len()
        }
    }

    impl RemoteWikiGateway for MockGateway {
        fn page_status(&mut self, title: &str) -> Result<PageStatus> {
            self.status_queries.push(title.to_string());
            if self.fail_queries {
                bail!("connection refused");
            }
            Ok(self
                .statuses
                .get(title)
                .copied()
                .unwrap_or(PageStatus::Missing))
        }

        fn create_redirect(
            &mut self,
            title: &str,
            origin_title: &str,
            replace_redirect: bool,
        ) -> Result<bool> {
            if self.fail_writes {
                bail!("MediaWiki API error [protectedtitle]: no");
            }
            match self.statuses.get(title) {
                None | Some(PageStatus::Missing) => {}
                Some(PageStatus::Redirect) if replace_redirect => {
                    self.replaced.push(title.to_string());
                }
                Some(_) => bail!(
                    "MediaWiki API error [articleexists]: The article you tried to create has been created already."
                ),
            }
            self.created
                .push((title.to_string(), origin_title.to_string()));
            self.statuses.insert(title.to_string(), PageStatus::Redirect);
            Ok(true)
        }

        fn move_page(&mut self, from: &str, to: &str) -> Result<bool> {
            if self.fail_writes {
                bail!("MediaWiki API error [cantmove]: no");
            }
            self.moved.push((from.to_string(), to.to_string()));
            self.statuses.remove(from);
            self.statuses.insert(to.to_string(), PageStatus::Redirect);
            Ok(true)
        }
    }

    fn change(previous: Option<&str>, new: Option<&str>, actual: Option<&str>) -> SuggestionChange {
        SuggestionChange {
            previous: previous.map(ToString::to_string),
            new: new.map(ToString::to_string),
            origin_title: "Origin".to_string(),
            actual_translation: actual.map(ToString::to_string),
        }
    }

    fn run(gateway: &mut MockGateway, change: &SuggestionChange) -> ReconcileOutcome {
        RedirectReconciler::new(gateway).reconcile(change).outcome
    }

    #[test]
    fn first_suggestion_creates_redirect() {
        let mut gateway = MockGateway::default();
        let outcome = run(&mut gateway, &change(None, Some("Foo"), None));
        assert_eq!(outcome, ReconcileOutcome::Created);
        assert_eq!(gateway.created, vec![("Foo".to_string(), "Origin".to_string())]);
        assert!(gateway.moved.is_empty());
    }

    #[test]
    fn stray_redirect_at_new_title_is_rewritten() {
        let mut gateway = MockGateway::with(&[("Foo", PageStatus::Redirect)]);
        let outcome = run(&mut gateway, &change(None, Some("Foo"), None));
        assert_eq!(outcome, ReconcileOutcome::Created);
        assert_eq!(gateway.replaced, vec!["Foo".to_string()]);
        assert_eq!(gateway.created, vec![("Foo".to_string(), "Origin".to_string())]);

        let mut gateway = MockGateway::with(&[("Bar", PageStatus::Redirect)]);
        let outcome = run(&mut gateway, &change(Some("Foo"), Some("Bar"), None));
        assert_eq!(outcome, ReconcileOutcome::Created);
        assert_eq!(gateway.replaced, vec!["Bar".to_string()]);
        assert!(gateway.moved.is_empty());
    }

    #[test]
    fn create_only_write_onto_an_existing_page_fails() {
        let mut gateway = MockGateway::with(&[("Foo", PageStatus::Redirect)]);
        let error = gateway
            .create_redirect("Foo", "Origin", false)
            .expect_err("create-only must refuse");
        assert!(error.to_string().contains("articleexists"));
        assert!(gateway.created.is_empty());
    }

    #[test]
    fn renamed_suggestion_moves_existing_redirect() {
        let mut gateway = MockGateway::with(&[("Foo", PageStatus::Redirect)]);
        let outcome = run(&mut gateway, &change(Some("Foo"), Some("Bar"), None));
        assert_eq!(outcome, ReconcileOutcome::Moved);
        assert_eq!(gateway.moved, vec![("Foo".to_string(), "Bar".to_string())]);
        assert!(gateway.created.is_empty());
        assert_eq!(gateway.status_queries, vec!["Bar".to_string(), "Foo".to_string()]);
    }

    #[test]
    fn existing_article_at_new_title_is_never_overwritten() {
        let mut gateway = MockGateway::with(&[("Bar", PageStatus::Exists)]);
        let outcome = run(&mut gateway, &change(Some("Foo"), Some("Bar"), None));
        assert_eq!(outcome, ReconcileOutcome::FailedExists);
        assert_eq!(gateway.writes(), 0);
    }

    #[test]
    fn unchanged_suggestion_makes_no_remote_calls() {
        let mut gateway = MockGateway::default();
        let outcome = run(&mut gateway, &change(Some("Foo"), Some("Foo"), None));
        assert_eq!(outcome, ReconcileOutcome::NoChange);
        assert_eq!(gateway.remote_calls(), 0);

        let outcome = run(&mut gateway, &change(None, None, Some("X")));
        assert_eq!(outcome, ReconcileOutcome::NoChange);
        assert_eq!(gateway.remote_calls(), 0);
    }

    #[test]
    fn cleared_suggestion_is_removed_without_remote_calls() {
        let mut gateway = MockGateway::with(&[("Foo", PageStatus::Redirect)]);
        let outcome = run(&mut gateway, &change(Some("Foo"), None, None));
        assert_eq!(outcome, ReconcileOutcome::Removed);
        assert_eq!(gateway.remote_calls(), 0);
    }

    #[test]
    fn translated_page_never_touches_redirects() {
        for previous in [None, Some("Foo")] {
            let mut gateway = MockGateway::default();
            let outcome = run(&mut gateway, &change(previous, Some("Bar"), Some("X")));
            assert_eq!(outcome, ReconcileOutcome::AlreadyTranslated);
            assert_eq!(gateway.remote_calls(), 0);
        }
    }

    #[test]
    fn missing_old_redirect_falls_back_to_create() {
        let mut gateway = MockGateway::default();
        let outcome = run(&mut gateway, &change(Some("Foo"), Some("Bar"), None));
        assert_eq!(outcome, ReconcileOutcome::Created);
        assert_eq!(gateway.created.len(), 1);
        assert!(gateway.moved.is_empty());
    }

    #[test]
    fn old_suggestion_that_became_an_article_is_left_alone() {
        let mut gateway = MockGateway::with(&[("Foo", PageStatus::Exists)]);
        let outcome = run(&mut gateway, &change(Some("Foo"), Some("Bar"), None));
        assert_eq!(outcome, ReconcileOutcome::ArticleExists);
        assert_eq!(gateway.writes(), 0);
    }

    #[test]
    fn remote_failures_become_outcomes() {
        let mut gateway = MockGateway {
            fail_queries: true,
            ..MockGateway::default()
        };
        let report = RedirectReconciler::new(&mut gateway).reconcile(&change(None, Some("Foo"), None));
        assert_eq!(report.outcome, ReconcileOutcome::FailedQuery);
        assert!(report.detail.as_deref().is_some_and(|detail| detail.contains("refused")));

        let mut gateway = MockGateway {
            fail_writes: true,
            ..MockGateway::default()
        };
        assert_eq!(
            run(&mut gateway, &change(None, Some("Foo"), None)),
            ReconcileOutcome::FailedCreate
        );

        let mut gateway = MockGateway {
            fail_writes: true,
            ..MockGateway::with(&[("Foo", PageStatus::Redirect)])
        };
        assert_eq!(
            run(&mut gateway, &change(Some("Foo"), Some("Bar"), None)),
            ReconcileOutcome::FailedMove
        );
    }

    #[test]
    fn outcome_codes_and_severities() {
        assert_eq!(ReconcileOutcome::NoChange.code(), "no-change");
        assert_eq!(ReconcileOutcome::AlreadyTranslated.code(), "already-translated");
        assert_eq!(ReconcileOutcome::Created.severity(), Severity::Success);
        assert_eq!(ReconcileOutcome::Removed.severity(), Severity::Warning);
        assert_eq!(ReconcileOutcome::ArticleExists.severity(), Severity::Error);
        assert_eq!(ReconcileOutcome::NoChange.severity(), Severity::Silent);
    }
}
