//! Resolved settings shared across crates.
//!
//! Raw deserialization structs (loose `Vec<String>` name lists, plain
//! seconds) stay private to this module. Validation happens at the serde
//! boundary via `#[serde(try_from)]`, so holding a settings value is proof
//! that it is usable.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SettingsError {
    #[error("linter package name must not be empty")]
    EmptyPackage,
    #[error("lookup helper must not be empty")]
    EmptyHelper,
    #[error("at least one config file name or a manifest section is required")]
    NoConfigCandidates,
    #[error("candidate file names must not be empty")]
    EmptyCandidateName,
}

/// One file name probed by the config resolver.
///
/// A manifest candidate only matches when the file carries `section_key`
/// at its top level; otherwise the resolver keeps ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    name: String,
    section_key: Option<String>,
}

impl CandidateFile {
    #[must_use]
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            section_key: None,
        }
    }

    #[must_use]
    pub fn manifest(name: impl Into<String>, section_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            section_key: Some(section_key.into()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn section_key(&self) -> Option<&str> {
        self.section_key.as_deref()
    }

    #[must_use]
    pub fn is_manifest(&self) -> bool {
        self.section_key.is_some()
    }
}

const DEFAULT_CONFIG_FILES: [&str; 4] = [
    ".eslintrc.js",
    ".eslintrc.yaml",
    ".eslintrc.yml",
    ".eslintrc.json",
];
const DEFAULT_MANIFEST: &str = "package.json";
const DEFAULT_CONFIG_SECTION: &str = "eslintConfig";
const DEFAULT_IGNORE_FILE: &str = ".eslintignore";
const DEFAULT_LANGUAGES: [&str; 5] = [
    "javascript",
    "javascriptreact",
    "typescript",
    "typescriptreact",
    "vue",
];

/// Exit code ceiling for "issues found"; anything above is a tool failure.
pub const DEFAULT_MAX_ISSUE_EXIT_CODE: i32 = 1;
/// Lookup helper exit code meaning "package not installed".
pub const DEFAULT_NOT_FOUND_EXIT_CODE: i32 = 1;
pub const DEFAULT_THROTTLE: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
#[serde(default)]
struct RawLinterSettings {
    package: String,
    source: String,
    languages: Vec<String>,
    config_files: Vec<String>,
    manifest: Option<String>,
    config_section: Option<String>,
    ignore_files: Vec<String>,
    ignore_section: Option<String>,
    cache_dir: Option<PathBuf>,
    max_issue_exit_code: i32,
}

impl Default for RawLinterSettings {
    fn default() -> Self {
        Self {
            package: "eslint".to_string(),
            source: "eslint".to_string(),
            languages: DEFAULT_LANGUAGES.iter().map(ToString::to_string).collect(),
            config_files: DEFAULT_CONFIG_FILES
                .iter()
                .map(ToString::to_string)
                .collect(),
            manifest: Some(DEFAULT_MANIFEST.to_string()),
            config_section: Some(DEFAULT_CONFIG_SECTION.to_string()),
            ignore_files: vec![DEFAULT_IGNORE_FILE.to_string()],
            ignore_section: None,
            cache_dir: None,
            max_issue_exit_code: DEFAULT_MAX_ISSUE_EXIT_CODE,
        }
    }
}

/// Validated `[linter]` settings.
///
/// Invariant: `package` is non-empty and `config_candidates` is non-empty,
/// with the manifest candidate (if any) last.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawLinterSettings")]
pub struct LinterSettings {
    package: String,
    source: String,
    languages: Vec<String>,
    config_candidates: Vec<CandidateFile>,
    ignore_candidates: Vec<CandidateFile>,
    cache_dir: Option<PathBuf>,
    max_issue_exit_code: i32,
}

fn candidate_list(
    names: Vec<String>,
    manifest: Option<&String>,
    section: Option<String>,
) -> Result<Vec<CandidateFile>, SettingsError> {
    if names.iter().any(|n| n.trim().is_empty()) {
        return Err(SettingsError::EmptyCandidateName);
    }
    let mut candidates: Vec<CandidateFile> = names.into_iter().map(CandidateFile::plain).collect();
    if let (Some(manifest), Some(section)) = (manifest, section) {
        if manifest.trim().is_empty() {
            return Err(SettingsError::EmptyCandidateName);
        }
        candidates.push(CandidateFile::manifest(manifest.clone(), section));
    }
    Ok(candidates)
}

impl TryFrom<RawLinterSettings> for LinterSettings {
    type Error = SettingsError;

    fn try_from(raw: RawLinterSettings) -> Result<Self, Self::Error> {
        if raw.package.trim().is_empty() {
            return Err(SettingsError::EmptyPackage);
        }
        let config_candidates =
            candidate_list(raw.config_files, raw.manifest.as_ref(), raw.config_section)?;
        if config_candidates.is_empty() {
            return Err(SettingsError::NoConfigCandidates);
        }
        let ignore_candidates =
            candidate_list(raw.ignore_files, raw.manifest.as_ref(), raw.ignore_section)?;
        let source = if raw.source.trim().is_empty() {
            raw.package.clone()
        } else {
            raw.source
        };
        Ok(Self {
            package: raw.package,
            source,
            languages: raw.languages,
            config_candidates,
            ignore_candidates,
            cache_dir: raw.cache_dir,
            max_issue_exit_code: raw.max_issue_exit_code,
        })
    }
}

impl Default for LinterSettings {
    fn default() -> Self {
        let mut config_candidates: Vec<CandidateFile> = DEFAULT_CONFIG_FILES
            .iter()
            .map(|n| CandidateFile::plain(*n))
            .collect();
        config_candidates.push(CandidateFile::manifest(
            DEFAULT_MANIFEST,
            DEFAULT_CONFIG_SECTION,
        ));
        Self {
            package: "eslint".to_string(),
            source: "eslint".to_string(),
            languages: DEFAULT_LANGUAGES.iter().map(ToString::to_string).collect(),
            config_candidates,
            ignore_candidates: vec![CandidateFile::plain(DEFAULT_IGNORE_FILE)],
            cache_dir: None,
            max_issue_exit_code: DEFAULT_MAX_ISSUE_EXIT_CODE,
        }
    }
}

impl LinterSettings {
    /// Package name handed to the lookup helper.
    #[must_use]
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Value stamped into `Diagnostic::source`.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether documents with this syntax tag are linted (case-insensitive).
    #[must_use]
    pub fn handles_syntax(&self, syntax: &str) -> bool {
        self.languages.iter().any(|l| l.eq_ignore_ascii_case(syntax))
    }

    #[must_use]
    pub fn config_candidates(&self) -> &[CandidateFile] {
        &self.config_candidates
    }

    #[must_use]
    pub fn ignore_candidates(&self) -> &[CandidateFile] {
        &self.ignore_candidates
    }

    #[must_use]
    pub fn cache_dir(&self) -> Option<&PathBuf> {
        self.cache_dir.as_ref()
    }

    #[must_use]
    pub fn max_issue_exit_code(&self) -> i32 {
        self.max_issue_exit_code
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct RawLookupSettings {
    helper: String,
    not_found_exit_code: i32,
    use_shell: bool,
    throttle_secs: u64,
}

impl Default for RawLookupSettings {
    fn default() -> Self {
        Self {
            helper: "npm-which".to_string(),
            not_found_exit_code: DEFAULT_NOT_FOUND_EXIT_CODE,
            use_shell: false,
            throttle_secs: DEFAULT_THROTTLE.as_secs(),
        }
    }
}

/// Validated `[lookup]` settings for the package lookup helper.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawLookupSettings")]
pub struct LookupSettings {
    helper: PathBuf,
    not_found_exit_code: i32,
    use_shell: bool,
    throttle: Duration,
}

impl TryFrom<RawLookupSettings> for LookupSettings {
    type Error = SettingsError;

    fn try_from(raw: RawLookupSettings) -> Result<Self, Self::Error> {
        if raw.helper.trim().is_empty() {
            return Err(SettingsError::EmptyHelper);
        }
        Ok(Self {
            helper: PathBuf::from(raw.helper),
            not_found_exit_code: raw.not_found_exit_code,
            use_shell: raw.use_shell,
            throttle: Duration::from_secs(raw.throttle_secs),
        })
    }
}

impl Default for LookupSettings {
    fn default() -> Self {
        Self {
            helper: PathBuf::from("npm-which"),
            not_found_exit_code: DEFAULT_NOT_FOUND_EXIT_CODE,
            use_shell: false,
            throttle: DEFAULT_THROTTLE,
        }
    }
}

impl LookupSettings {
    #[must_use]
    pub fn new(helper: impl Into<PathBuf>) -> Self {
        Self {
            helper: helper.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn helper(&self) -> &PathBuf {
        &self.helper
    }

    #[must_use]
    pub fn not_found_exit_code(&self) -> i32 {
        self.not_found_exit_code
    }

    #[must_use]
    pub fn use_shell(&self) -> bool {
        self.use_shell
    }

    /// Minimum interval between resolution attempts for one directory.
    #[must_use]
    pub fn throttle(&self) -> Duration {
        self.throttle
    }
}

/// `[resolver]` settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    /// Boundary directory for config discovery. Defaults to the home directory.
    pub home: Option<PathBuf>,
}

/// Complete settings for one lint session.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LintSettings {
    pub linter: LinterSettings,
    pub lookup: LookupSettings,
    pub resolver: ResolverSettings,
}
