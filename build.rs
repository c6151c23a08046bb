use std::fs;

fn main() {
    // Validate bundled TOML at compile time
    for path in ["src/default_config.toml", "src/symbols.toml"] {
        println!("cargo:rerun-if-changed={}", path);

        let content =
            fs::read_to_string(path).unwrap_or_else(|e| panic!("Failed to read {}: {}", path, e));

        if let Err(e) = content.parse::<toml::Table>() {
            panic!("Invalid {}: {}", path, e);
        }
    }
}
