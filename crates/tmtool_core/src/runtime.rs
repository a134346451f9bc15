use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::default_config_toml;

pub const STATE_DIR_NAME: &str = ".tmtool";
pub const DB_FILENAME: &str = "tmtool.db";
pub const CONFIG_FILENAME: &str = "config.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Flag,
    Env,
    Heuristic,
    Default,
}

impl ValueSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::Env => "env",
            Self::Heuristic => "heuristic",
            Self::Default => "default",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    pub project_root: Option<PathBuf>,
    pub db: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ResolutionContext {
    pub cwd: PathBuf,
}

impl ResolutionContext {
    pub fn from_process() -> Result<Self> {
        let cwd = env::current_dir().context("failed to read current directory")?;
        Ok(Self { cwd })
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub project_root: PathBuf,
    pub state_dir: PathBuf,
    pub db_path: PathBuf,
    pub config_path: PathBuf,
    pub root_source: ValueSource,
    pub db_source: ValueSource,
    pub config_source: ValueSource,
}

impl ResolvedPaths {
    pub fn diagnostics(&self) -> String {
        format!(
            "project_root={} ({})\nstate_dir={}\ndb_path={} ({})\nconfig_path={} ({})",
            normalize_for_display(&self.project_root),
            self.root_source.as_str(),
            normalize_for_display(&self.state_dir),
            normalize_for_display(&self.db_path),
            self.db_source.as_str(),
            normalize_for_display(&self.config_path),
            self.config_source.as_str(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct InitReport {
    pub created_dirs: Vec<PathBuf>,
    pub wrote_config: bool,
}

/// Flag > env (`TM_PROJECT_ROOT`, `TM_DB`, `TM_CONFIG`) > default.
pub fn resolve_paths(
    context: &ResolutionContext,
    overrides: &PathOverrides,
) -> Result<ResolvedPaths> {
    resolve_paths_with_lookup(context, overrides, |key| env::var(key).ok())
}

fn resolve_paths_with_lookup<F>(
    context: &ResolutionContext,
    overrides: &PathOverrides,
    lookup_env: F,
) -> Result<ResolvedPaths>
where
    F: Fn(&str) -> Option<String>,
{
    let (project_root, root_source) = if let Some(path) = overrides.project_root.as_deref() {
        (absolutize(path, &context.cwd), ValueSource::Flag)
    } else if let Some(value) = lookup_env("TM_PROJECT_ROOT") {
        (
            absolutize(Path::new(value.trim()), &context.cwd),
            ValueSource::Env,
        )
    } else {
        (detect_project_root(&context.cwd), ValueSource::Heuristic)
    };
    let state_dir = project_root.join(STATE_DIR_NAME);

    let (db_path, db_source) = resolve_file(
        overrides.db.as_deref(),
        lookup_env("TM_DB"),
        &project_root,
        state_dir.join("data").join(DB_FILENAME),
    );
    let (config_path, config_source) = resolve_file(
        overrides.config.as_deref(),
        lookup_env("TM_CONFIG"),
        &project_root,
        state_dir.join(CONFIG_FILENAME),
    );

    Ok(ResolvedPaths {
        project_root,
        state_dir,
        db_path,
        config_path,
        root_source,
        db_source,
        config_source,
    })
}

fn resolve_file(
    flag: Option<&Path>,
    env_value: Option<String>,
    project_root: &Path,
    default: PathBuf,
) -> (PathBuf, ValueSource) {
    if let Some(path) = flag {
        (absolutize(path, project_root), ValueSource::Flag)
    } else if let Some(value) = env_value.filter(|value| !value.trim().is_empty()) {
        (
            absolutize(Path::new(value.trim()), project_root),
            ValueSource::Env,
        )
    } else {
        (default, ValueSource::Default)
    }
}

/// Create `.tmtool/` and its data directory, then write a starter config.
pub fn init_layout(paths: &ResolvedPaths, force: bool) -> Result<InitReport> {
    let mut created_dirs = Vec::new();
    let mut required_dirs = vec![paths.state_dir.clone()];
    if let Some(db_parent) = paths.db_path.parent() {
        required_dirs.push(db_parent.to_path_buf());
    }

    for dir in &required_dirs {
        if !dir.exists() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            created_dirs.push(dir.clone());
        }
    }

    let wrote_config = write_text_file(&paths.config_path, &default_config_toml(), force)?;
    Ok(InitReport {
        created_dirs,
        wrote_config,
    })
}

/// Nearest ancestor of `cwd` that already holds a `.tmtool/` directory.
fn detect_project_root(cwd: &Path) -> PathBuf {
    let mut seen = HashSet::new();
    for candidate in cwd.ancestors() {
        if !seen.insert(normalize_for_display(candidate)) {
            continue;
        }
        if candidate.join(STATE_DIR_NAME).is_dir() {
            return candidate.to_path_buf();
        }
    }
    cwd.to_path_buf()
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn write_text_file(path: &Path, content: &str, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }

    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create parent directory {}", parent.display()))?;
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(true)
}

pub fn normalize_for_display(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tempfile::tempdir;

    use super::*;

    fn lookup(values: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = values
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn resolve_paths_prefers_flag_over_env() {
        let temp = tempdir().expect("tempdir");
        let context = ResolutionContext {
            cwd: temp.path().to_path_buf(),
        };
        let overrides = PathOverrides {
            project_root: Some(temp.path().join("flag-root")),
            db: Some(PathBuf::from("custom.db")),
            config: None,
        };
        let paths = resolve_paths_with_lookup(
            &context,
            &overrides,
            lookup(&[
                ("TM_PROJECT_ROOT", "/env-root"),
                ("TM_DB", "/env.db"),
                ("TM_CONFIG", "settings.toml"),
            ]),
        )
        .expect("resolve");

        assert_eq!(paths.project_root, temp.path().join("flag-root"));
        assert_eq!(paths.root_source, ValueSource::Flag);
        assert_eq!(paths.db_path, temp.path().join("flag-root").join("custom.db"));
        assert_eq!(paths.db_source, ValueSource::Flag);
        assert_eq!(
            paths.config_path,
            temp.path().join("flag-root").join("settings.toml")
        );
        assert_eq!(paths.config_source, ValueSource::Env);
    }

    #[test]
    fn resolve_paths_walks_up_to_existing_state_dir() {
        let temp = tempdir().expect("tempdir");
        fs::create_dir_all(temp.path().join(STATE_DIR_NAME)).expect("state dir");
        let nested = temp.path().join("a").join("b");
        fs::create_dir_all(&nested).expect("nested");

        let context = ResolutionContext { cwd: nested };
        let paths = resolve_paths_with_lookup(&context, &PathOverrides::default(), lookup(&[]))
            .expect("resolve");
        assert_eq!(paths.project_root, temp.path());
        assert_eq!(paths.root_source, ValueSource::Heuristic);
        assert_eq!(
            paths.db_path,
            temp.path().join(STATE_DIR_NAME).join("data").join(DB_FILENAME)
        );
        assert_eq!(paths.config_source, ValueSource::Default);
    }

    #[test]
    fn init_layout_creates_dirs_and_keeps_existing_config() {
        let temp = tempdir().expect("tempdir");
        let context = ResolutionContext {
            cwd: temp.path().to_path_buf(),
        };
        let overrides = PathOverrides {
            project_root: Some(temp.path().to_path_buf()),
            ..PathOverrides::default()
        };
        let paths = resolve_paths_with_lookup(&context, &overrides, lookup(&[])).expect("resolve");

        let report = init_layout(&paths, false).expect("init");
        assert!(report.wrote_config);
        assert!(paths.state_dir.is_dir());
        assert!(paths.db_path.parent().is_some_and(Path::is_dir));

        fs::write(&paths.config_path, "[translation]\n").expect("edit config");
        let again = init_layout(&paths, false).expect("init again");
        assert!(!again.wrote_config);
        assert!(again.created_dirs.is_empty());
        assert_eq!(
            fs::read_to_string(&paths.config_path).expect("read"),
            "[translation]\n"
        );
    }
}
