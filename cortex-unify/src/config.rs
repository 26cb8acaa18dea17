use anyhow::{Context, Result};
use dedup::DedupKeys;
use report_xlsx::ExportOptions;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "cortex-unify.yaml";

#[derive(Debug, Default, Deserialize, Clone, PartialEq)]
pub struct Config {
    pub dedup_keys: Option<Vec<String>>,
    pub out_dir: Option<PathBuf>,
    pub sample_for_width: Option<usize>,
    pub float_format: Option<String>,
    pub int_format: Option<String>,
    pub datetime_format: Option<String>,
    pub csv: Option<bool>,
}

/// Load `path`, or `./cortex-unify.yaml` when no path is given and that file exists.
/// A file that was asked for but cannot be read or parsed is an error.
pub fn load_config(path: Option<&Path>) -> Result<Option<Config>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new(DEFAULT_CONFIG_FILE);
            if p.exists() { p.to_path_buf() } else { return Ok(None); }
        }
    };
    let s = fs::read_to_string(&path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let cfg = serde_yaml::from_str(&s)
        .with_context(|| format!("parsing config {}", path.display()))?;
    Ok(Some(cfg))
}

/// Values given on the command line for `process`.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub dedup_keys: Vec<String>,
    pub out_dir: Option<PathBuf>,
    pub sample_for_width: Option<usize>,
    pub csv: bool,
}

/// Effective settings for one run: command line, then config file, then defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub dedup_keys: DedupKeys,
    pub out_dir: PathBuf,
    pub csv: bool,
    pub export: ExportOptions,
}

impl Settings {
    pub fn resolve(cfg: Option<&Config>, cli: Overrides) -> Self {
        let file = cfg.cloned().unwrap_or_default();
        let defaults = ExportOptions::default();

        let dedup_keys = if !cli.dedup_keys.is_empty() {
            DedupKeys::new(&cli.dedup_keys)
        } else if let Some(keys) = &file.dedup_keys {
            DedupKeys::new(keys)
        } else {
            DedupKeys::default()
        };

        Settings {
            dedup_keys,
            out_dir: cli.out_dir.or(file.out_dir).unwrap_or_else(|| PathBuf::from(".")),
            csv: cli.csv || file.csv.unwrap_or(false),
            export: ExportOptions {
                sample_for_width: cli
                    .sample_for_width
                    .or(file.sample_for_width)
                    .unwrap_or(defaults.sample_for_width),
                float_format: file.float_format.unwrap_or(defaults.float_format),
                int_format: file.int_format.unwrap_or(defaults.int_format),
                datetime_format: file.datetime_format.unwrap_or(defaults.datetime_format),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
dedup_keys: [endpoint_name, operating_system]
out_dir: reports
sample_for_width: 200
float_format: "0.0"
csv: true
"#;

    #[test]
    fn parses_yaml() {
        let cfg: Config = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(cfg.dedup_keys.as_deref(), Some(&["endpoint_name".to_string(), "operating_system".to_string()][..]));
        assert_eq!(cfg.out_dir, Some(PathBuf::from("reports")));
        assert_eq!(cfg.int_format, None);
    }

    #[test]
    fn defaults_without_config() {
        let s = Settings::resolve(None, Overrides::default());
        assert_eq!(s.dedup_keys, DedupKeys::default());
        assert_eq!(s.out_dir, PathBuf::from("."));
        assert!(!s.csv);
        assert_eq!(s.export, ExportOptions::default());
    }

    #[test]
    fn command_line_beats_file() {
        let cfg: Config = serde_yaml::from_str(SAMPLE).unwrap();
        let from_file = Settings::resolve(Some(&cfg), Overrides::default());
        assert_eq!(from_file.dedup_keys, DedupKeys::new(["endpoint_name", "operating_system"]));
        assert_eq!(from_file.export.sample_for_width, 200);
        assert_eq!(from_file.export.float_format, "0.0");
        assert_eq!(from_file.export.int_format, "#,##0");
        assert!(from_file.csv);

        let cli = Overrides {
            dedup_keys: vec!["endpoint_alias".into()],
            out_dir: Some(PathBuf::from("/tmp/out")),
            sample_for_width: Some(5),
            csv: false,
        };
        let s = Settings::resolve(Some(&cfg), cli);
        assert_eq!(s.dedup_keys, DedupKeys::new(["endpoint_alias"]));
        assert_eq!(s.out_dir, PathBuf::from("/tmp/out"));
        assert_eq!(s.export.sample_for_width, 5);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let missing = std::env::temp_dir().join("cortex-unify-missing-config.yaml");
        assert!(load_config(Some(&missing)).is_err());
    }

    #[test]
    fn explicit_file_loads() {
        let path = std::env::temp_dir().join(format!("cortex-unify-config-{}.yaml", std::process::id()));
        fs::write(&path, SAMPLE).unwrap();
        let cfg = load_config(Some(&path)).unwrap().unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(cfg.csv, Some(true));
    }
}
