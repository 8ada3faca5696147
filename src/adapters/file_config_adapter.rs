//! INI run file adapter.

use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut config = Ini::new();
        config.load(path).map_err(std::io::Error::other)?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config
            .get(section, key)
            .filter(|value| !value.trim().is_empty())
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn section_entries(&self, section: &str) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .config
            .get_map_ref()
            .get(&section.to_lowercase())
            .map(|keys| {
                keys.iter()
                    .filter_map(|(key, value)| Some((key.clone(), value.clone()?)))
                    .collect()
            })
            .unwrap_or_default();
        entries.sort();
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const RUN_FILE: &str = r#"
[run]
pair = USD_BTC
strategy = heikin_ashi
market = bittrex
since = 2017-12-01T00:00:00Z
till = 2017-12-10T00:00:00Z

[strategy]
candle_size = 1-day

[market]
transaction_fee = 0.001
base_currency_balance = 500

[sqlite]
pool_size = 2
"#;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_run_file() {
        let adapter = FileConfigAdapter::from_string(RUN_FILE).unwrap();
        assert_eq!(adapter.get_string("run", "pair"), Some("USD_BTC".to_string()));
        assert_eq!(
            adapter.get_string("run", "since"),
            Some("2017-12-01T00:00:00Z".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_or_blank_key() {
        let adapter = FileConfigAdapter::from_string("[run]\npair =\n").unwrap();
        assert_eq!(adapter.get_string("run", "pair"), None);
        assert_eq!(adapter.get_string("run", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_int_returns_value_or_default() {
        let adapter = FileConfigAdapter::from_string(RUN_FILE).unwrap();
        assert_eq!(adapter.get_int("sqlite", "pool_size", 4), 2);
        assert_eq!(adapter.get_int("sqlite", "missing", 4), 4);
        assert_eq!(adapter.get_int("run", "pair", 4), 4);
    }

    #[test]
    fn section_entries_are_sorted() {
        let adapter = FileConfigAdapter::from_string(RUN_FILE).unwrap();
        assert_eq!(
            adapter.section_entries("market"),
            vec![
                ("base_currency_balance".to_string(), "500".to_string()),
                ("transaction_fee".to_string(), "0.001".to_string()),
            ]
        );
        assert!(adapter.section_entries("missing").is_empty());
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config(RUN_FILE);
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("strategy", "candle_size"),
            Some("1-day".to_string())
        );
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/run.ini");
        assert!(result.is_err());
    }
}
