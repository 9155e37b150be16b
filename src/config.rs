use crate::allowlist::Allowlist;
use crate::errors::Result;
use crate::patterns::PatternSet;
use serde::Deserialize;
use std::env;
use std::fs::File;
use std::path::{Path, PathBuf};

/// File name looked up when no config path is given explicitly.
pub const DEFAULT_CONFIG_FILE: &str = ".demoji.yaml";

/// Settings loaded from a YAML configuration file.
///
/// Every field is optional; command-line flags take precedence over values
/// found here.
///
/// ```yaml
/// replacement: ""
/// backup: true
/// respect_allowlist: true
/// allowlist: ["✅", "❌"]
/// emoticons: ["^_^"]
/// custom: [":shipit:"]
/// extensions: [md, rs]
/// exclude: [node_modules, target]
/// workers: 8
/// max_file_size: 10485760
/// ```
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EmojiConfig {
    /// Text substituted for removed emoji.
    pub replacement: Option<String>,
    /// Whether `clean` writes backups.
    pub backup: Option<bool>,
    /// Whether allowlisted emoji are kept by `clean` and ignored by `scan`.
    pub respect_allowlist: Option<bool>,
    /// Emoji that are never reported or removed.
    pub allowlist: Vec<String>,
    /// Extra emoticon literals, matched with a word-boundary guard.
    pub emoticons: Vec<String>,
    /// Extra custom literals, matched verbatim.
    pub custom: Vec<String>,
    /// File extensions to include when walking directories.
    pub extensions: Vec<String>,
    /// Path components to exclude when walking directories.
    pub exclude: Vec<String>,
    /// Worker count, `0` for one per CPU.
    pub workers: Option<usize>,
    /// Size limit in bytes for processed files.
    pub max_file_size: Option<u64>,
}

impl EmojiConfig {
    /// Default patterns extended with the configured literals.
    pub fn pattern_set(&self) -> PatternSet {
        PatternSet::default().with_extra(&self.emoticons, &self.custom)
    }

    /// The configured allowlist, if any entries were given.
    pub fn allowlist(&self) -> Option<Allowlist> {
        if self.allowlist.is_empty() {
            None
        } else {
            Some(Allowlist::build(self.allowlist.as_slice()))
        }
    }
}

/// A utility for locating and loading configuration files.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Finds the configuration file by searching in a prioritized list of locations.
    ///
    /// The search order is:
    /// 1. The absolute path provided in `config_path`, if it exists.
    /// 2. A path relative to the current directory.
    /// 3. A path relative to the `working_dir`.
    /// 4. Inside the `~/.demoji` directory.
    /// 5. Inside the platform config directory (`~/.config/demoji` on Linux).
    /// 6. Next to the executable.
    pub fn find_config(config_path: &Path, working_dir: &Path) -> Result<PathBuf> {
        let candidates = Self::candidates(config_path, working_dir);
        if let Some(found) = candidates.iter().find(|p| p.is_file()) {
            return Ok(found.clone());
        }

        let tried: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
        Err(format!(
            "Config file '{}' not found. Searched in:\n  - {}",
            config_path.display(),
            tried.join("\n  - ")
        )
        .into())
    }

    fn candidates(config_path: &Path, working_dir: &Path) -> Vec<PathBuf> {
        if config_path.is_absolute() {
            return vec![config_path.to_path_buf()];
        }

        let mut candidates = vec![config_path.to_path_buf(), working_dir.join(config_path)];

        if let Some(home) = env::var_os("HOME") {
            candidates.push(PathBuf::from(home).join(".demoji").join(config_path));
        }
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("demoji").join(config_path));
        }
        if let Some(exe_dir) = env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
            candidates.push(exe_dir.join(config_path));
        }
        candidates
    }

    /// Loads an `EmojiConfig` from a YAML file.
    pub fn load(path: &Path) -> Result<EmojiConfig> {
        let file = File::open(path)?;
        Ok(serde_yaml::from_reader(file)?)
    }

    /// Resolves the effective configuration.
    ///
    /// An explicit path must exist. Without one, `.demoji.yaml` is looked up
    /// and defaults are used if it is nowhere to be found.
    pub fn resolve(explicit: Option<&Path>, working_dir: &Path) -> Result<(EmojiConfig, Option<PathBuf>)> {
        match explicit {
            Some(path) => {
                let found = Self::find_config(path, working_dir)?;
                Ok((Self::load(&found)?, Some(found)))
            }
            None => match Self::find_config(Path::new(DEFAULT_CONFIG_FILE), working_dir) {
                Ok(found) => Ok((Self::load(&found)?, Some(found))),
                Err(_) => Ok((EmojiConfig::default(), None)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_partial_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cfg.yaml");
        fs::write(&path, "replacement: '[emoji]'\nallowlist: ['✅']\ncustom: [':shipit:']\n").unwrap();

        let cfg = ConfigLoader::load(&path).unwrap();
        assert_eq!(cfg.replacement.as_deref(), Some("[emoji]"));
        assert_eq!(cfg.backup, None);
        assert!(cfg.exclude.is_empty());
        assert!(cfg.allowlist().unwrap().is_allowed("✅"));
        assert!(cfg.pattern_set().custom_literals.iter().any(|c| c == ":shipit:"));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cfg.yaml");
        fs::write(&path, "replacment: x\n").unwrap();

        assert!(matches!(ConfigLoader::load(&path), Err(crate::errors::Error::Yaml(_))));
    }

    #[test]
    fn test_find_in_working_dir() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("custom-name.yaml"), "workers: 3\n").unwrap();

        let found = ConfigLoader::find_config(Path::new("custom-name.yaml"), temp_dir.path()).unwrap();
        assert_eq!(found, temp_dir.path().join("custom-name.yaml"));

        let (cfg, source) = ConfigLoader::resolve(Some(Path::new("custom-name.yaml")), temp_dir.path()).unwrap();
        assert_eq!(cfg.workers, Some(3));
        assert_eq!(source, Some(found));
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = ConfigLoader::find_config(Path::new("nope-demoji.yaml"), temp_dir.path()).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_empty_config_is_default() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.yaml");
        fs::write(&path, "{}\n").unwrap();
        assert_eq!(ConfigLoader::load(&path).unwrap(), EmojiConfig::default());
    }
}
