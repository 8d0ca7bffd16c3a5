fn main() {
    // Validate the embedded default config at compile time.
    validate_toml(
        "src/default_config.toml",
        include_str!("src/default_config.toml"),
    );
}

fn validate_toml(path: &str, content: &str) {
    if toml::from_str::<toml::Table>(content).is_err() {
        panic!("{path} contains invalid TOML");
    }
}
