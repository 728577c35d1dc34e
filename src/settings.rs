use colour::yellow_ln;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const SOURCE_FILE_EXTENSION: &str = "sba";
pub const BYTE_FILE_EXTENSION: &str = "sbf";
pub const CONFIG_FILE_NAME: &str = "sbasm.toml";

pub const ENTRY_POINT_NAME: &str = "entrypoint";

// Rough guess at how many tokens a unit of source produces, used to pre-size
// the token vec. Measured on a handful of small hand-written units, so it is
// a heuristic and nothing more.
pub const SRC_TO_TOKEN_RATIO: usize = 4;

// Project-level configuration, read from an sbasm.toml sitting next to the
// input file when one exists. Everything in it is optional; command line
// flags are appended after (and so win over) the config values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub import_dirs: Vec<PathBuf>,
    pub output: Option<PathBuf>,
}

impl Config {
    pub fn load_next_to(input: &Path) -> Config {
        let dir = input.parent().unwrap_or_else(|| Path::new("."));
        let path = dir.join(CONFIG_FILE_NAME);

        let Ok(text) = fs::read_to_string(&path) else {
            return Config::default();
        };

        match toml::from_str::<Config>(&text) {
            Ok(mut config) => {
                // Relative directories in the config are relative to the
                // config file, not to wherever the assembler was launched.
                for import_dir in &mut config.import_dirs {
                    if import_dir.is_relative() {
                        *import_dir = dir.join(&*import_dir);
                    }
                }
                config
            }
            Err(e) => {
                yellow_ln!("Warning: Ignoring invalid '{}': {}", path.display(), e);
                Config::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_gives_defaults() {
        let config = Config::load_next_to(Path::new("no/such/place/main.sba"));
        assert!(config.import_dirs.is_empty());
        assert!(config.output.is_none());
    }

    #[test]
    fn relative_import_dirs_are_anchored_to_the_config() {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "import_dirs = [\"lib\", \"/abs/lib\"]\n",
        )
        .expect("write config");

        let config = Config::load_next_to(&dir.path().join("main.sba"));
        assert_eq!(config.import_dirs[0], dir.path().join("lib"));
        assert_eq!(config.import_dirs[1], PathBuf::from("/abs/lib"));
    }
}
