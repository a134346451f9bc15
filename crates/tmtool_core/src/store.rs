use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use serde::Serialize;
use tracing::{debug, warn};

use crate::catalog::StatusCode;
use crate::migrate::{MigrateReport, run_migrations};
use crate::record::{StatusRecord, StatusRow, StoredStatus};

/// MediaWiki `TS_MW` layout used for the date columns.
const MW_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
const ARTICLE_TYPE_PROP: &str = "ArticleType";
const SQLITE_CONSTRAINT_UNIQUE: i32 = 2067;
const SQLITE_CONSTRAINT_PRIMARYKEY: i32 = 1555;

/// Result of a save that did not hit a storage failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// Another page already claims this suggested title for the language.
    DuplicateSuggestion(Box<StatusRecord>),
    /// The page already has a row for the language the record was moved to.
    LanguageTaken(String),
}

/// Which value `suggestions_by_ids` reports per page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuggestionMode {
    #[default]
    TranslationsOverSuggestions,
    SuggestionsOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuggestionKey {
    #[default]
    PageId,
    Title,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct StoreStats {
    pub status_rows: usize,
    pub with_suggestion: usize,
    pub by_language: BTreeMap<String, usize>,
    pub by_status: BTreeMap<String, usize>,
}

#[derive(Debug, Clone)]
struct PageRow {
    namespace: i64,
    title: String,
    actual_translation: Option<String>,
    article_type: Option<String>,
}

#[derive(Debug, Clone)]
struct SuggestionRow {
    page_id: i64,
    namespace: i64,
    title: String,
    actual_translation: Option<String>,
    suggested_name: Option<String>,
}

/// Persistence for translation status rows, joined with the wiki's page tables.
pub struct StatusStore {
    connection: Connection,
    migrations: MigrateReport,
}

impl StatusStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database parent directory {}", parent.display())
            })?;
        }
        let connection = Connection::open(db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        connection
            .busy_timeout(Duration::from_secs(5))
            .context("failed to set sqlite busy timeout")?;
        connection
            .pragma_update(None, "journal_mode", "WAL")
            .context("failed to enable WAL journal mode")?;
        Self::from_connection(connection)
    }

    pub fn open_in_memory() -> Result<Self> {
        let connection =
            Connection::open_in_memory().context("failed to open in-memory database")?;
        Self::from_connection(connection)
    }

    fn from_connection(connection: Connection) -> Result<Self> {
        let migrations = run_migrations(&connection)?;
        Ok(Self {
            connection,
            migrations,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Migrations applied while opening this store.
    pub fn migration_report(&self) -> &MigrateReport {
        &self.migrations
    }

    /// Page existence, prior status row and interlanguage link for `language`.
    /// Without a prior row the record is unsaved and carries defaults.
    pub fn load(&self, page_id: i64, language: &str) -> Result<StatusRecord> {
        let page = self.page_row(page_id, language)?;
        let row = self.status_row(page_id, language)?;
        let stored = match page {
            Some(page) => StoredStatus {
                page_name: Some(prefixed_title(page.namespace, &page.title)),
                exists: page.namespace == 0,
                actual_translation: page.actual_translation,
                article_type: page.article_type,
                row,
            },
            None => StoredStatus {
                row,
                ..StoredStatus::default()
            },
        };
        Ok(StatusRecord::hydrate(page_id, language, stored))
    }

    pub fn find_by_suggestion(&self, title: &str, language: &str) -> Result<Option<StatusRecord>> {
        let page_id: Option<i64> = self
            .connection
            .query_row(
                "SELECT page_id FROM tm_status WHERE suggested_name = ?1 AND language = ?2",
                params![title, language],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("failed to look up suggestion {title}"))?;
        page_id.map(|id| self.load(id, language)).transpose()
    }

    /// Insert or update `record`. A suggestion already claimed by another page
    /// comes back as `DuplicateSuggestion` and nothing is written.
    pub fn save(&self, record: &mut StatusRecord) -> Result<SaveOutcome> {
        match self.write_row(record) {
            Ok(()) => {
                record.mark_saved();
                debug!(page_id = record.page_id(), language = record.language(), "saved status row");
                Ok(SaveOutcome::Saved)
            }
            Err(rusqlite::Error::SqliteFailure(error, message))
                if error.code == ErrorCode::ConstraintViolation
                    && matches!(
                        error.extended_code,
                        SQLITE_CONSTRAINT_UNIQUE | SQLITE_CONSTRAINT_PRIMARYKEY
                    ) =>
            {
                if let Some(title) = record.suggested_translation()
                    && let Some(existing) = self.find_by_suggestion(title, record.language())?
                    && existing.page_id() != record.page_id()
                {
                    warn!(
                        page_id = record.page_id(),
                        claimed_by = existing.page_id(),
                        title,
                        "suggested translation already claimed"
                    );
                    return Ok(SaveOutcome::DuplicateSuggestion(Box::new(existing)));
                }
                if record.stored_language() != Some(record.language())
                    && self.status_row(record.page_id(), record.language())?.is_some()
                {
                    warn!(
                        page_id = record.page_id(),
                        language = record.language(),
                        "status row already exists for target language"
                    );
                    return Ok(SaveOutcome::LanguageTaken(record.language().to_string()));
                }
                Err(rusqlite::Error::SqliteFailure(error, message)).with_context(|| {
                    format!("failed to save status row for page {}", record.page_id())
                })
            }
            Err(error) => Err(error).with_context(|| {
                format!("failed to save status row for page {}", record.page_id())
            }),
        }
    }

    fn write_row(&self, record: &StatusRecord) -> rusqlite::Result<()> {
        let status = record.stored_status().map(StatusCode::as_str);
        let wordcount = record.wordcount().map(i64::from);
        let start_date = record.start_date().map(format_mw_timestamp);
        let end_date = record.end_date().map(format_mw_timestamp);

        if record.is_saved() {
            let key_language = record.stored_language().unwrap_or(record.language());
            let updated = self.connection.execute(
                "UPDATE tm_status SET
                    language = ?2, suggested_name = ?3, project = ?4, status = ?5,
                    translator = ?6, comments = ?7, wordcount = ?8, start_date = ?9,
                    end_date = ?10
                 WHERE page_id = ?1 AND language = ?11",
                params![
                    record.page_id(),
                    record.language(),
                    record.suggested_translation(),
                    record.project(),
                    status,
                    record.translator(),
                    record.comments(),
                    wordcount,
                    start_date,
                    end_date,
                    key_language,
                ],
            )?;
            if updated > 0 {
                return Ok(());
            }
        }

        self.connection.execute(
            "INSERT INTO tm_status (
                page_id, language, suggested_name, project, status, translator,
                comments, wordcount, start_date, end_date
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.page_id(),
                record.language(),
                record.suggested_translation(),
                record.project(),
                status,
                record.translator(),
                record.comments(),
                wordcount,
                start_date,
                end_date,
            ],
        )?;
        Ok(())
    }

    fn page_row(&self, page_id: i64, language: &str) -> Result<Option<PageRow>> {
        self.connection
            .query_row(
                "SELECT p.page_namespace, p.page_title, ll.ll_title, pp.pp_value
                 FROM page p
                 LEFT JOIN langlinks ll ON ll.ll_from = p.page_id AND ll.ll_lang = ?2
                 LEFT JOIN page_props pp ON pp.pp_page = p.page_id AND pp.pp_propname = ?3
                 WHERE p.page_id = ?1 AND p.page_is_redirect = 0",
                params![page_id, language, ARTICLE_TYPE_PROP],
                |row| {
                    Ok(PageRow {
                        namespace: row.get(0)?,
                        title: row.get(1)?,
                        actual_translation: row.get(2)?,
                        article_type: row.get(3)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("failed to load page {page_id}"))
    }

    fn status_row(&self, page_id: i64, language: &str) -> Result<Option<StatusRow>> {
        let raw = self
            .connection
            .query_row(
                "SELECT language, suggested_name, project, status, translator, comments,
                        wordcount, start_date, end_date
                 FROM tm_status WHERE page_id = ?1 AND language = ?2",
                params![page_id, language],
                |row| {
                    Ok((
                        StatusRow {
                            language: row.get(0)?,
                            suggested_name: row.get(1)?,
                            project: row.get(2)?,
                            status: None,
                            translator: row.get(4)?,
                            comments: row.get(5)?,
                            wordcount: None,
                            start_date: None,
                            end_date: None,
                        },
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<i64>>(6)?,
                        row.get::<_, Option<String>>(7)?,
                        row.get::<_, Option<String>>(8)?,
                    ))
                },
            )
            .optional()
            .with_context(|| format!("failed to load status row for page {page_id}"))?;

        Ok(raw.map(|(mut row, status, wordcount, start_date, end_date)| {
            row.status = status.as_deref().and_then(|code| match code.parse() {
                Ok(code) => Some(code),
                Err(_) => {
                    warn!(page_id, code, "ignoring unknown stored status code");
                    None
                }
            });
            row.wordcount = wordcount.and_then(|value| u32::try_from(value).ok());
            row.start_date = start_date.as_deref().and_then(parse_mw_timestamp);
            row.end_date = end_date.as_deref().and_then(parse_mw_timestamp);
            row
        }))
    }

    /// Map each page to its actual translation or suggestion for `language`,
    /// skipping pages that have neither.
    pub fn suggestions_by_ids(
        &self,
        language: &str,
        key: SuggestionKey,
        page_ids: Option<&[i64]>,
        mode: SuggestionMode,
    ) -> Result<BTreeMap<String, String>> {
        let wanted: Option<BTreeSet<i64>> = page_ids.map(|ids| ids.iter().copied().collect());
        let mut statement = self
            .connection
            .prepare(
                "SELECT p.page_id, p.page_namespace, p.page_title, ll.ll_title, s.suggested_name
                 FROM page p
                 LEFT JOIN tm_status s ON s.page_id = p.page_id AND s.language = ?1
                 LEFT JOIN langlinks ll ON ll.ll_from = p.page_id AND ll.ll_lang = ?1
                 WHERE p.page_is_redirect = 0
                 ORDER BY p.page_id",
            )
            .context("failed to prepare suggestions query")?;
        let rows = statement
            .query_map([language], |row| {
                Ok(SuggestionRow {
                    page_id: row.get(0)?,
                    namespace: row.get(1)?,
                    title: row.get(2)?,
                    actual_translation: row.get(3)?,
                    suggested_name: row.get(4)?,
                })
            })
            .context("failed to run suggestions query")?;

        let mut out = BTreeMap::new();
        for row in rows {
            let row = row.context("failed to decode suggestions row")?;
            if let Some(wanted) = &wanted
                && !wanted.contains(&row.page_id)
            {
                continue;
            }
            let translation = match mode {
                SuggestionMode::TranslationsOverSuggestions => {
                    row.actual_translation.or(row.suggested_name)
                }
                SuggestionMode::SuggestionsOnly => row.suggested_name,
            };
            let Some(translation) = translation.filter(|value| !value.is_empty()) else {
                continue;
            };
            let key = match key {
                SuggestionKey::PageId => row.page_id.to_string(),
                SuggestionKey::Title => prefixed_title(row.namespace, &row.title),
            };
            out.insert(key, translation);
        }
        Ok(out)
    }

    pub fn all_projects(&self) -> Result<Vec<String>> {
        self.distinct_values("project")
    }

    pub fn all_translators(&self) -> Result<Vec<String>> {
        self.distinct_values("translator")
    }

    fn distinct_values(&self, column: &'static str) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT DISTINCT {column} FROM tm_status
             WHERE {column} IS NOT NULL AND {column} <> '' ORDER BY {column}"
        );
        let mut statement = self
            .connection
            .prepare(&sql)
            .with_context(|| format!("failed to prepare distinct {column} query"))?;
        let rows = statement
            .query_map([], |row| row.get::<_, String>(0))
            .with_context(|| format!("failed to run distinct {column} query"))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.with_context(|| format!("failed to decode {column} row"))?);
        }
        Ok(out)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let mut stats = StoreStats::default();
        let mut statement = self
            .connection
            .prepare("SELECT language, status, suggested_name IS NOT NULL FROM tm_status")
            .context("failed to prepare status stats query")?;
        let rows = statement
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, bool>(2)?,
                ))
            })
            .context("failed to run status stats query")?;
        for row in rows {
            let (language, status, has_suggestion) =
                row.context("failed to decode status stats row")?;
            stats.status_rows += 1;
            if has_suggestion {
                stats.with_suggestion += 1;
            }
            *stats.by_language.entry(language).or_insert(0) += 1;
            let status = status.unwrap_or_else(|| "<unset>".to_string());
            *stats.by_status.entry(status).or_insert(0) += 1;
        }
        Ok(stats)
    }
}

pub fn format_mw_timestamp(value: DateTime<Utc>) -> String {
    value.format(MW_TIMESTAMP_FORMAT).to_string()
}

pub fn parse_mw_timestamp(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), MW_TIMESTAMP_FORMAT)
        .ok()
        .map(|value| value.and_utc())
}

fn prefixed_title(namespace: i64, title: &str) -> String {
    let title = title.replace('_', " ");
    match namespace_name(namespace) {
        Some("") => title,
        Some(name) => format!("{name}:{title}"),
        None => format!("{namespace}:{title}"),
    }
}

fn namespace_name(namespace: i64) -> Option<&'static str> {
    match namespace {
        0 => Some(""),
        1 => Some("Talk"),
        2 => Some("User"),
        3 => Some("User talk"),
        4 => Some("Project"),
        6 => Some("File"),
        8 => Some("MediaWiki"),
        10 => Some("Template"),
        12 => Some("Help"),
        14 => Some("Category"),
        828 => Some("Module"),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::catalog::Catalog;
    use crate::title::TitleRules;

    pub(crate) fn insert_page(store: &StatusStore, page_id: i64, namespace: i64, title: &str) {
        store
            .connection()
            .execute(
                "INSERT INTO page (page_id, page_namespace, page_title, page_is_redirect)
                 VALUES (?1, ?2, ?3, 0)",
                params![page_id, namespace, title],
            )
            .expect("insert page");
    }

    pub(crate) fn insert_langlink(store: &StatusStore, page_id: i64, language: &str, title: &str) {
        store
            .connection()
            .execute(
                "INSERT INTO langlinks (ll_from, ll_lang, ll_title) VALUES (?1, ?2, ?3)",
                params![page_id, language, title],
            )
            .expect("insert langlink");
    }

    fn rules() -> TitleRules {
        TitleRules::new(["he", "ar"])
    }

    #[test]
    fn load_unsaved_record_for_existing_page() {
        let store = StatusStore::open_in_memory().expect("store");
        insert_page(&store, 10, 0, "Origin_page");
        let record = store.load(10, "ar").expect("load");
        assert!(record.exists());
        assert!(!record.is_saved());
        assert_eq!(record.page_name(), Some("Origin page"));
        assert_eq!(record.status(), StatusCode::Untranslated);
    }

    #[test]
    fn load_missing_or_redirect_page_does_not_exist() {
        let store = StatusStore::open_in_memory().expect("store");
        store
            .connection()
            .execute(
                "INSERT INTO page (page_id, page_namespace, page_title, page_is_redirect)
                 VALUES (5, 0, 'Redirected', 1)",
                [],
            )
            .expect("insert redirect");
        insert_page(&store, 6, 10, "Infobox");
        assert!(!store.load(5, "ar").expect("load").exists());
        assert!(!store.load(6, "ar").expect("load").exists());
        assert!(!store.load(99, "ar").expect("load").exists());
    }

    #[test]
    fn save_then_load_round_trips_fields() {
        let store = StatusStore::open_in_memory().expect("store");
        let catalog = Catalog::new(["ar"]);
        insert_page(&store, 10, 0, "Origin");

        let mut record = store.load(10, "ar").expect("load");
        record
            .set_suggested_translation(Some("Foo"), &rules())
            .expect("title");
        record.set_status("progress", &catalog).expect("status");
        record.set_project(Some("Health"));
        record.set_translator(Some("Dana"));
        record.set_comments(Some("first pass"));
        record.set_wordcount(Some(1500));
        record.set_start_date_from_field("2024-01-02").expect("start");
        record.set_end_date_from_field("2024-02-03").expect("end");
        assert_eq!(store.save(&mut record).expect("save"), SaveOutcome::Saved);
        assert!(record.is_saved());

        let loaded = store.load(10, "ar").expect("reload");
        assert!(loaded.is_saved());
        assert_eq!(loaded.suggested_translation(), Some("Foo"));
        assert_eq!(loaded.project(), Some("Health"));
        assert_eq!(loaded.translator(), Some("Dana"));
        assert_eq!(loaded.comments(), Some("first pass"));
        assert_eq!(loaded.wordcount(), Some(1500));
        assert_eq!(loaded.status(), StatusCode::Progress);
        assert_eq!(
            loaded.start_date(),
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
        );
        assert_eq!(
            loaded.end_date(),
            Some(Utc.with_ymd_and_hms(2024, 2, 3, 23, 59, 59).unwrap())
        );
    }

    #[test]
    fn save_updates_existing_row() {
        let store = StatusStore::open_in_memory().expect("store");
        insert_page(&store, 10, 0, "Origin");
        let mut record = store.load(10, "ar").expect("load");
        record.set_project(Some("A"));
        store.save(&mut record).expect("insert");

        let mut record = store.load(10, "ar").expect("load");
        record.set_project(Some("B"));
        record.set_wordcount(None);
        assert_eq!(store.save(&mut record).expect("update"), SaveOutcome::Saved);

        assert_eq!(store.load(10, "ar").expect("load").project(), Some("B"));
        assert_eq!(store.stats().expect("stats").status_rows, 1);
    }

    #[test]
    fn loaded_translation_reports_translated_without_rewriting_storage() {
        let store = StatusStore::open_in_memory().expect("store");
        let catalog = Catalog::new(["ar"]);
        insert_page(&store, 10, 0, "Origin");
        let mut record = store.load(10, "ar").expect("load");
        record.set_status("review", &catalog).expect("status");
        store.save(&mut record).expect("save");

        insert_langlink(&store, 10, "ar", "Existing");
        let mut loaded = store.load(10, "ar").expect("reload");
        assert_eq!(loaded.actual_translation(), Some("Existing"));
        assert_eq!(loaded.status(), StatusCode::Translated);

        store.save(&mut loaded).expect("save again");
        let stored: Option<String> = store
            .connection()
            .query_row(
                "SELECT status FROM tm_status WHERE page_id = 10 AND language = 'ar'",
                [],
                |row| row.get(0),
            )
            .expect("status column");
        assert_eq!(stored.as_deref(), Some("review"));
    }

    #[test]
    fn duplicate_suggestion_returns_existing_record() {
        let store = StatusStore::open_in_memory().expect("store");
        insert_page(&store, 10, 0, "First");
        insert_page(&store, 11, 0, "Second");

        let mut first = store.load(10, "ar").expect("load");
        first.set_suggested_translation(Some("Foo"), &rules()).expect("title");
        store.save(&mut first).expect("save first");

        let mut second = store.load(11, "ar").expect("load");
        second.set_suggested_translation(Some("Foo"), &rules()).expect("title");
        let outcome = store.save(&mut second).expect("save second");
        match outcome {
            SaveOutcome::DuplicateSuggestion(existing) => {
                assert_eq!(existing.page_id(), 10);
                assert_eq!(existing.page_name(), Some("First"));
            }
            other => panic!("expected duplicate suggestion, got {other:?}"),
        }
        assert!(!second.is_saved());
        assert_eq!(
            store.load(10, "ar").expect("load").suggested_translation(),
            Some("Foo")
        );
        assert!(!store.load(11, "ar").expect("load").is_saved());
    }

    #[test]
    fn same_suggestion_in_other_language_is_allowed() {
        let store = StatusStore::open_in_memory().expect("store");
        insert_page(&store, 10, 0, "First");
        insert_page(&store, 11, 0, "Second");
        let mut first = store.load(10, "ar").expect("load");
        first.set_suggested_translation(Some("Foo"), &rules()).expect("title");
        store.save(&mut first).expect("save");
        let mut second = store.load(11, "en").expect("load");
        second.set_suggested_translation(Some("Foo"), &rules()).expect("title");
        assert_eq!(store.save(&mut second).expect("save"), SaveOutcome::Saved);
    }

    #[test]
    fn moving_onto_an_existing_language_row_is_reported() {
        let store = StatusStore::open_in_memory().expect("store");
        let catalog = Catalog::new(["ar", "en"]);
        insert_page(&store, 10, 0, "Origin");
        for (language, project) in [("ar", "Arabic"), ("en", "English")] {
            let mut record = store.load(10, language).expect("load");
            record.set_project(Some(project));
            store.save(&mut record).expect("seed");
        }

        let mut record = store.load(10, "ar").expect("load");
        record.set_language("en", &catalog).expect("language");
        record.set_project(Some("Moved"));
        let outcome = store.save(&mut record).expect("conflict is not a storage error");
        assert_eq!(outcome, SaveOutcome::LanguageTaken("en".to_string()));

        assert_eq!(store.load(10, "ar").expect("load").project(), Some("Arabic"));
        assert_eq!(store.load(10, "en").expect("load").project(), Some("English"));
    }

    #[test]
    fn moving_to_a_free_language_moves_the_row() {
        let store = StatusStore::open_in_memory().expect("store");
        let catalog = Catalog::new(["ar", "en"]);
        insert_page(&store, 10, 0, "Origin");
        let mut record = store.load(10, "ar").expect("load");
        record.set_project(Some("Health"));
        store.save(&mut record).expect("seed");

        let mut record = store.load(10, "ar").expect("load");
        record.set_language("en", &catalog).expect("language");
        assert_eq!(store.save(&mut record).expect("save"), SaveOutcome::Saved);

        assert!(!store.load(10, "ar").expect("load").is_saved());
        assert_eq!(store.load(10, "en").expect("load").project(), Some("Health"));
        assert_eq!(store.stats().expect("stats").status_rows, 1);
    }

    #[test]
    fn find_by_suggestion_filters_by_language() {
        let store = StatusStore::open_in_memory().expect("store");
        insert_page(&store, 10, 0, "First");
        let mut record = store.load(10, "ar").expect("load");
        record.set_suggested_translation(Some("Foo"), &rules()).expect("title");
        store.save(&mut record).expect("save");

        let found = store.find_by_suggestion("Foo", "ar").expect("find");
        assert_eq!(found.map(|record| record.page_id()), Some(10));
        assert!(store.find_by_suggestion("Foo", "en").expect("find").is_none());
    }

    #[test]
    fn suggestions_prefer_actual_translations_unless_asked_not_to() {
        let store = StatusStore::open_in_memory().expect("store");
        insert_page(&store, 1, 0, "Alpha");
        insert_page(&store, 2, 0, "Beta_page");
        insert_page(&store, 3, 14, "Gamma");
        insert_langlink(&store, 1, "ar", "Alpha-ar");
        for (page_id, title) in [(1, "Alpha suggestion"), (2, "Beta suggestion")] {
            let mut record = store.load(page_id, "ar").expect("load");
            record.set_suggested_translation(Some(title), &rules()).expect("title");
            store.save(&mut record).expect("save");
        }

        let preferred = store
            .suggestions_by_ids("ar", SuggestionKey::PageId, None, SuggestionMode::default())
            .expect("suggestions");
        assert_eq!(preferred.get("1").map(String::as_str), Some("Alpha-ar"));
        assert_eq!(preferred.get("2").map(String::as_str), Some("Beta suggestion"));
        assert!(!preferred.contains_key("3"));

        let only = store
            .suggestions_by_ids(
                "ar",
                SuggestionKey::Title,
                Some(&[1]),
                SuggestionMode::SuggestionsOnly,
            )
            .expect("suggestions");
        assert_eq!(only.len(), 1);
        assert_eq!(only.get("Alpha").map(String::as_str), Some("Alpha suggestion"));
    }

    #[test]
    fn distinct_projects_and_translators_skip_blanks() {
        let store = StatusStore::open_in_memory().expect("store");
        for (page_id, project, translator) in
            [(1, Some("Health"), Some("Dana")), (2, Some("Art"), None), (3, Some("Health"), Some("Eli"))]
        {
            insert_page(&store, page_id, 0, &format!("Page {page_id}"));
            let mut record = store.load(page_id, "ar").expect("load");
            record.set_project(project);
            record.set_translator(translator);
            store.save(&mut record).expect("save");
        }
        assert_eq!(store.all_projects().expect("projects"), vec!["Art", "Health"]);
        assert_eq!(store.all_translators().expect("translators"), vec!["Dana", "Eli"]);
    }

    #[test]
    fn mw_timestamps_round_trip() {
        let value = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(format_mw_timestamp(value), "20231231235959");
        assert_eq!(parse_mw_timestamp("20231231235959"), Some(value));
        assert_eq!(parse_mw_timestamp("2023-12-31"), None);
    }

    #[test]
    fn open_creates_database_on_disk() {
        let temp = tempfile::tempdir().expect("tempdir");
        let db_path = temp.path().join("data").join("tmtool.db");
        let store = StatusStore::open(&db_path).expect("open");
        insert_page(&store, 1, 0, "Alpha");
        drop(store);
        let reopened = StatusStore::open(&db_path).expect("reopen");
        assert!(reopened.load(1, "ar").expect("load").exists());
    }
}
