use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

/// Loads `translations/<lang>.json` files, later languages overriding
/// earlier ones. Missing or invalid files are skipped.
pub struct Translations {
    dir: PathBuf,
}

impl Translations {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn load(&self, languages: &[&str]) -> Map<String, Value> {
        let mut merged = Map::new();
        for language in languages {
            let path = self.dir.join(format!("{}.json", language));
            let data = match tokio::fs::read(&path).await {
                Ok(data) => data,
                Err(e) => {
                    debug!(language, "No translation file: {}", e);
                    continue;
                }
            };
            match serde_json::from_slice::<Map<String, Value>>(&data) {
                Ok(strings) => merged.extend(strings),
                Err(e) => debug!(language, "Invalid translation file: {}", e),
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_later_languages_override() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("en.json"),
            r#"{"TITLE": "Menu", "SHUTDOWN": "Shutdown"}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("de.json"), r#"{"TITLE": "Menü"}"#).unwrap();
        std::fs::write(dir.path().join("fr.json"), "not json").unwrap();

        let translations = Translations::new(dir.path());
        let strings = translations.load(&["en", "de", "fr", "xx"]).await;
        assert_eq!(strings["TITLE"], json!("Menü"));
        assert_eq!(strings["SHUTDOWN"], json!("Shutdown"));
    }
}
