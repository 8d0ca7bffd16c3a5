use std::fs;

use lex_connector::config::{self, ConnectorConfig};

use super::die;

pub fn config_export() {
    print!("{}", config::default_toml());
}

pub fn config_validate(file: &str) {
    let content = die!(fs::read_to_string(file), "Error reading {file}: {}");
    let c = die!(config::parse_config_toml(&content), "Error: {}");
    println!(
        "OK: store.mmap={}, engine.verify_on_load={}, engine.prefetch_rows={}, oracle.strict={}",
        c.store.mmap,
        c.engine.verify_on_load,
        c.engine.prefetch_rows.len(),
        c.oracle.strict
    );
}

/// Load the config at `path`, or the defaults when none is given.
pub fn load_config(path: Option<&str>) -> ConnectorConfig {
    match path {
        Some(path) => {
            let content = die!(fs::read_to_string(path), "Error reading {path}: {}");
            die!(config::parse_config_toml(&content), "Error in {path}: {}")
        }
        None => ConnectorConfig::default(),
    }
}
