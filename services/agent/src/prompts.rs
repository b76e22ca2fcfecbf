//! Prompt Templates
//!
//! Prompts live as Markdown files in a directory and are keyed by file stem
//! (`instructions.md` becomes `"instructions"`).

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

/// Used when the prompts directory has no `greeting.md`.
pub const DEFAULT_GREETING: &str = "Hello {{session.user_name}}! I'm {{session.agent_name}}, your study buddy for today. Let's learn about cells together!";

/// Loads every `.md` file in `prompts_path`.
pub fn load_prompts(prompts_path: &Path) -> Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    let entries = std::fs::read_dir(prompts_path)
        .with_context(|| format!("Failed to read prompts directory {}", prompts_path.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read prompt {}", path.display()))?;
            prompts.insert(prompt_key, content);
        }
    }
    Ok(prompts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loads_markdown_files_by_stem() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("instructions.md"), "Be kind.").unwrap();
        std::fs::write(dir.path().join("greeting.md"), "Hi!").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let prompts = load_prompts(dir.path()).unwrap();

        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts["instructions"], "Be kind.");
        assert_eq!(prompts["greeting"], "Hi!");
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_prompts(&dir.path().join("nope")).unwrap_err();
        assert!(err.to_string().contains("Failed to read prompts directory"));
    }
}
