//! Configuration management for subst.
//!
//! Parses `subst.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! `[variables]` values and `lookup.file_roots` entries support environment
//! variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//! - `$${name}` - kept as `${name}` and resolved when templates are rendered

mod expand;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use subst_core::{
    DEFAULT_ESCAPE, DEFAULT_MAX_DEPTH, DEFAULT_PREFIX, DEFAULT_SEPARATOR, DEFAULT_SUFFIX, Lookup,
    MAX_DEPTH_LIMIT, Substitutor,
};
use subst_lookup::{ChainLookup, EnvLookup, FileLookup, InterpolatorLookup, MapLookup};

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override fail on undefined flag.
    pub fail_on_undefined: Option<bool>,
    /// Override maximum nesting depth.
    pub max_depth: Option<usize>,
    /// Override environment lookup enabled flag.
    pub env: Option<bool>,
    /// Extra variables, replacing config values with the same name.
    pub variables: Vec<(String, String)>,
}

/// Configuration filename to search for.
pub const CONFIG_FILENAME: &str = "subst.toml";

/// Lookup name for `[variables]` entries.
const VAR_LOOKUP: &str = "var";
/// Lookup name for environment variables.
const ENV_LOOKUP: &str = "env";
/// Lookup name for fenced file contents.
const FILE_LOOKUP: &str = "file";

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Placeholder syntax.
    pub syntax: SyntaxConfig,
    /// Engine behavior.
    pub engine: EngineConfig,
    /// Value sources (paths are relative strings from TOML).
    lookup: LookupConfigRaw,
    /// Static variables.
    pub variables: BTreeMap<String, String>,

    /// Resolved lookup configuration (set after loading).
    #[serde(skip)]
    pub lookup_resolved: LookupConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Placeholder syntax configuration.
///
/// An empty `escape` disables escaping, an empty `default_separator`
/// disables defaults.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyntaxConfig {
    /// Placeholder opening delimiter.
    pub prefix: String,
    /// Placeholder closing delimiter.
    pub suffix: String,
    /// Escape placed before the prefix to keep it literal.
    pub escape: String,
    /// Separator between key and default value.
    pub default_separator: String,
}

impl Default for SyntaxConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_owned(),
            suffix: DEFAULT_SUFFIX.to_owned(),
            escape: DEFAULT_ESCAPE.to_string(),
            default_separator: DEFAULT_SEPARATOR.to_owned(),
        }
    }
}

/// Engine configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct EngineConfig {
    /// Maximum nesting depth.
    pub max_depth: usize,
    /// Substitute placeholders inside keys.
    pub substitute_in_keys: bool,
    /// Substitute placeholders inside resolved values.
    pub substitute_in_values: bool,
    /// Keep the escape in front of escaped placeholders.
    pub preserve_escapes: bool,
    /// Fail on unresolved keys instead of passing them through.
    pub fail_on_undefined: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            substitute_in_keys: true,
            substitute_in_values: true,
            preserve_escapes: false,
            fail_on_undefined: false,
        }
    }
}

/// Raw lookup configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct LookupConfigRaw {
    env: Option<bool>,
    file_roots: Option<Vec<String>>,
}

/// Resolved lookup configuration with absolute paths.
#[derive(Debug)]
pub struct LookupConfig {
    /// Whether environment variables are visible to templates.
    pub env: bool,
    /// Directories `file:` keys may read from. Empty disables file lookups.
    pub file_roots: Vec<PathBuf>,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            env: true,
            file_roots: Vec::new(),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`variables.token`").
        field: String,
        /// Error message (e.g., "Cannot resolve variable '`TOKEN`'").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `subst.toml` in current directory and parents,
    /// falling back to defaults when none is found.
    ///
    /// CLI settings are applied after loading, allowing CLI arguments to take
    /// precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the resulting configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            tracing::debug!("No {CONFIG_FILENAME} found, using defaults");
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(fail_on_undefined) = settings.fail_on_undefined {
            self.engine.fail_on_undefined = fail_on_undefined;
        }
        if let Some(max_depth) = settings.max_depth {
            self.engine.max_depth = max_depth;
        }
        if let Some(env) = settings.env {
            self.lookup_resolved.env = env;
        }
        for (name, value) in &settings.variables {
            self.variables.insert(name.clone(), value.clone());
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        tracing::debug!(
            path = %path.display(),
            variables = config.variables.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.syntax.prefix, "syntax.prefix")?;
        require_non_empty(&self.syntax.suffix, "syntax.suffix")?;

        if self.engine.max_depth == 0 {
            return Err(ConfigError::Validation(
                "engine.max_depth must be greater than 0".to_owned(),
            ));
        }
        if self.engine.max_depth > MAX_DEPTH_LIMIT {
            return Err(ConfigError::Validation(format!(
                "engine.max_depth cannot exceed {MAX_DEPTH_LIMIT}"
            )));
        }

        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        for (name, value) in &mut self.variables {
            *value = expand::expand_env(value, &format!("variables.{name}"))?;
        }

        if let Some(ref mut roots) = self.lookup.file_roots {
            for (i, root) in roots.iter_mut().enumerate() {
                *root = expand::expand_env(root, &format!("lookup.file_roots[{i}]"))?;
            }
        }

        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let file_roots = self
            .lookup
            .file_roots
            .iter()
            .flatten()
            .map(|root| config_dir.join(shellexpand::tilde(root).as_ref()))
            .collect();

        self.lookup_resolved = LookupConfig {
            env: self.lookup.env.unwrap_or(true),
            file_roots,
        };
    }

    /// Build a substitutor from this configuration.
    ///
    /// Keys resolve through these sources:
    ///
    /// - `var:NAME` - `[variables]` only
    /// - `env:NAME` - environment only, when `lookup.env` is enabled
    /// - `file:PATH` - file contents, when `lookup.file_roots` is set
    /// - anything else - `[variables]`, then the environment when enabled
    #[must_use]
    pub fn build_substitutor(&self) -> Substitutor {
        let variables: Arc<dyn Lookup> = Arc::new(self.variables.iter().collect::<MapLookup>());
        let mut router = InterpolatorLookup::new().with(VAR_LOOKUP, Arc::clone(&variables));
        let mut fallback = ChainLookup::new().then(variables);

        if self.lookup_resolved.env {
            let env: Arc<dyn Lookup> = Arc::new(EnvLookup);
            router.register(ENV_LOOKUP, Arc::clone(&env));
            fallback = fallback.then(env);
        }
        if !self.lookup_resolved.file_roots.is_empty() {
            let files = FileLookup::fenced(self.lookup_resolved.file_roots.iter().cloned());
            router.register(FILE_LOOKUP, Arc::new(files));
        }

        let router = router.with_default(Arc::new(fallback));
        Substitutor::new(Arc::new(router))
            .with_prefix(self.syntax.prefix.as_str())
            .with_suffix(self.syntax.suffix.as_str())
            .with_escape(self.syntax.escape.as_str())
            .with_default_separator(self.syntax.default_separator.as_str())
            .with_max_depth(self.engine.max_depth)
            .with_substitute_in_keys(self.engine.substitute_in_keys)
            .with_substitute_in_values(self.engine.substitute_in_values)
            .with_preserve_escapes(self.engine.preserve_escapes)
            .with_fail_on_undefined(self.engine.fail_on_undefined)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.syntax.prefix, "${");
        assert_eq!(config.syntax.suffix, "}");
        assert_eq!(config.syntax.escape, "$");
        assert_eq!(config.syntax.default_separator, ":-");
        assert_eq!(config.engine.max_depth, 32);
        assert!(config.engine.substitute_in_keys);
        assert!(config.engine.substitute_in_values);
        assert!(!config.engine.preserve_escapes);
        assert!(!config.engine.fail_on_undefined);
        assert!(config.lookup_resolved.env);
        assert!(config.lookup_resolved.file_roots.is_empty());
        assert!(config.variables.is_empty());
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.syntax.prefix, "${");
        assert_eq!(config.engine.max_depth, 32);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[syntax]
prefix = "{{"
suffix = "}}"
escape = "\\"
default_separator = "|"

[engine]
max_depth = 8
substitute_in_keys = false
substitute_in_values = false
preserve_escapes = true
fail_on_undefined = true

[lookup]
env = false
file_roots = ["partials"]

[variables]
name = "world"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));

        assert_eq!(config.syntax.prefix, "{{");
        assert_eq!(config.syntax.suffix, "}}");
        assert_eq!(config.syntax.escape, "\\");
        assert_eq!(config.syntax.default_separator, "|");
        assert_eq!(config.engine.max_depth, 8);
        assert!(!config.engine.substitute_in_keys);
        assert!(!config.engine.substitute_in_values);
        assert!(config.engine.preserve_escapes);
        assert!(config.engine.fail_on_undefined);
        assert!(!config.lookup_resolved.env);
        assert_eq!(
            config.lookup_resolved.file_roots,
            vec![PathBuf::from("/project/partials")]
        );
        assert_eq!(config.variables.get("name").map(String::as_str), Some("world"));
    }

    #[test]
    fn test_resolve_paths_absolute_root_kept() {
        let toml = r#"
[lookup]
file_roots = ["/srv/templates", "local"]
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));

        assert_eq!(
            config.lookup_resolved.file_roots,
            vec![
                PathBuf::from("/srv/templates"),
                PathBuf::from("/project/local")
            ]
        );
    }

    #[test]
    fn test_apply_cli_settings() {
        let mut config = Config::default();
        config.variables.insert("name".to_owned(), "file".to_owned());
        let overrides = CliSettings {
            fail_on_undefined: Some(true),
            max_depth: Some(4),
            env: Some(false),
            variables: vec![
                ("name".to_owned(), "cli".to_owned()),
                ("extra".to_owned(), "1".to_owned()),
            ],
        };

        config.apply_cli_settings(&overrides);

        assert!(config.engine.fail_on_undefined);
        assert_eq!(config.engine.max_depth, 4);
        assert!(!config.lookup_resolved.env);
        assert_eq!(config.variables.get("name").map(String::as_str), Some("cli"));
        assert_eq!(config.variables.get("extra").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_apply_cli_settings_empty() {
        let mut config = Config::default();
        config.apply_cli_settings(&CliSettings::default());

        assert!(!config.engine.fail_on_undefined);
        assert_eq!(config.engine.max_depth, 32);
        assert!(config.lookup_resolved.env);
    }

    #[test]
    fn test_expand_env_vars_variables() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("SUBST_CFG_TEST_USER", "alice");
        }

        let toml = r#"
[variables]
user = "${SUBST_CFG_TEST_USER}"
greeting = "Hello $${user}"
region = "${SUBST_CFG_TEST_REGION_UNSET:-eu}"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.expand_env_vars().unwrap();

        assert_eq!(config.variables["user"], "alice");
        assert_eq!(config.variables["greeting"], "Hello ${user}");
        assert_eq!(config.variables["region"], "eu");

        unsafe {
            std::env::remove_var("SUBST_CFG_TEST_USER");
        }
    }

    #[test]
    fn test_expand_env_vars_missing_required_var() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("SUBST_CFG_TEST_MISSING");
        }

        let toml = r#"
[lookup]
file_roots = ["${SUBST_CFG_TEST_MISSING}/templates"]
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        let err = config.expand_env_vars().unwrap_err();

        assert!(matches!(err, ConfigError::EnvVar { .. }));
        assert!(err.to_string().contains("SUBST_CFG_TEST_MISSING"));
        assert!(err.to_string().contains("lookup.file_roots[0]"));
    }

    // Validation tests

    /// Assert that validation fails with expected substrings in the error message.
    fn assert_validation_error(config: &Config, expected_substrings: &[&str]) {
        let result = config.validate();
        assert!(result.is_err(), "Expected validation to fail");
        let err = result.unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation(_)),
            "Expected ConfigError::Validation, got {err:?}"
        );
        let msg = err.to_string();
        for s in expected_substrings {
            assert!(
                msg.contains(s),
                "Expected error to contain '{s}', got: {msg}"
            );
        }
    }

    #[test]
    fn test_validate_default_config_passes() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_empty_prefix() {
        let mut config = Config::default();
        config.syntax.prefix = String::new();
        assert_validation_error(&config, &["syntax.prefix", "cannot be empty"]);
    }

    #[test]
    fn test_validate_empty_suffix() {
        let mut config = Config::default();
        config.syntax.suffix = String::new();
        assert_validation_error(&config, &["syntax.suffix", "cannot be empty"]);
    }

    #[test]
    fn test_validate_max_depth_zero() {
        let mut config = Config::default();
        config.engine.max_depth = 0;
        assert_validation_error(&config, &["engine.max_depth", "greater than 0"]);
    }

    #[test]
    fn test_validate_max_depth_too_high() {
        let mut config = Config::default();
        config.engine.max_depth = MAX_DEPTH_LIMIT + 1;
        assert_validation_error(&config, &["engine.max_depth", "cannot exceed 128"]);

        config.engine.max_depth = MAX_DEPTH_LIMIT;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_rejects_huge_cli_max_depth() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "").unwrap();
        let overrides = CliSettings {
            max_depth: Some(10_000),
            ..Default::default()
        };

        let err = Config::load(Some(&path), Some(&overrides)).unwrap_err();
        assert!(err.to_string().contains("engine.max_depth"));
    }

    #[test]
    fn test_validate_empty_escape_and_separator_allowed() {
        let mut config = Config::default();
        config.syntax.escape = String::new();
        config.syntax.default_separator = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let err = Config::load(Some(&path), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(
            &path,
            r#"
[lookup]
file_roots = ["partials"]

[variables]
name = "world"
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path), None).unwrap();
        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
        assert_eq!(
            config.lookup_resolved.file_roots,
            vec![dir.path().join("partials")]
        );
    }

    #[test]
    fn test_load_rejects_invalid_cli_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "").unwrap();
        let overrides = CliSettings {
            max_depth: Some(0),
            ..Default::default()
        };

        let err = Config::load(Some(&path), Some(&overrides)).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_load_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[engine]\nmax_depth = \"deep\"\n").unwrap();

        let err = Config::load(Some(&path), None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_build_substitutor_routes_sources() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("footer.txt"), "-- ${name}").unwrap();

        let mut config = Config::default();
        config.variables.insert("name".to_owned(), "world".to_owned());
        config.lookup_resolved.env = false;
        config.lookup_resolved.file_roots = vec![dir.path().to_path_buf()];

        let subst = config.build_substitutor();
        assert_eq!(
            subst.replace("Hello ${name}, ${var:name}!").unwrap(),
            "Hello world, world!"
        );
        assert_eq!(subst.replace("${file:footer.txt}").unwrap(), "-- world");
        assert_eq!(subst.replace("${env:HOME}").unwrap(), "${env:HOME}");
    }

    #[test]
    fn test_build_substitutor_env_fallback() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("SUBST_CFG_TEST_BUILD", "from-env");
        }

        let mut config = Config::default();
        config
            .variables
            .insert("SUBST_CFG_TEST_BUILD".to_owned(), "from-vars".to_owned());
        let subst = config.build_substitutor();

        assert_eq!(
            subst.replace("${SUBST_CFG_TEST_BUILD}").unwrap(),
            "from-vars"
        );
        assert_eq!(
            subst.replace("${env:SUBST_CFG_TEST_BUILD}").unwrap(),
            "from-env"
        );

        unsafe {
            std::env::remove_var("SUBST_CFG_TEST_BUILD");
        }
    }

    #[test]
    fn test_build_substitutor_custom_syntax() {
        let mut config = Config::default();
        config.syntax.prefix = "{{".to_owned();
        config.syntax.suffix = "}}".to_owned();
        config.syntax.escape = String::new();
        config.engine.fail_on_undefined = true;
        config.lookup_resolved.env = false;
        config.variables.insert("x".to_owned(), "1".to_owned());

        let subst = config.build_substitutor();
        assert_eq!(subst.replace("${x} {{x}} $${x}").unwrap(), "${x} 1 $${x}");
        assert!(subst.replace("{{missing}}").is_err());
    }
}
