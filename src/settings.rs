use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a writing assistant. Produce clear, well-paragraphed text that is easy to copy out by hand.";

#[derive(Debug, Clone)]
pub struct Settings {
    pub font_path: Option<String>,
    pub output_dir: Option<String>,
    pub ink_color: String,
    pub paper_color: String,
    pub seed: Option<u64>,
    pub ollama_host: String,
    pub connect_timeout_secs: u64,
    pub ai_model: Option<String>,
    pub system_prompt: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            font_path: None,
            output_dir: None,
            ink_color: "#000000".to_string(),
            paper_color: "#ffffff".to_string(),
            seed: None,
            ollama_host: DEFAULT_OLLAMA_HOST.to_string(),
            connect_timeout_secs: 10,
            ai_model: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    render: Option<RenderSettings>,
    ollama: Option<OllamaSettings>,
    ai: Option<AiSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct RenderSettings {
    font_path: Option<String>,
    output_dir: Option<String>,
    ink_color: Option<String>,
    paper_color: Option<String>,
    seed: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct OllamaSettings {
    host: Option<String>,
    connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AiSettings {
    model: Option<String>,
    system_prompt: Option<String>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = paths::settings_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings
                .merge_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        }
    }

    if let Ok(host) = std::env::var("OLLAMA_HOST") {
        if !host.trim().is_empty() {
            settings.ollama_host = normalize_host(&host);
        }
    }

    Ok(settings)
}

impl Settings {
    pub fn merge_str(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed);
        Ok(())
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(render) = incoming.render {
            if let Some(path) = render.font_path {
                if !path.trim().is_empty() {
                    self.font_path = Some(path);
                }
            }
            if let Some(dir) = render.output_dir {
                if !dir.trim().is_empty() {
                    self.output_dir = Some(dir);
                }
            }
            if let Some(color) = render.ink_color {
                if !color.trim().is_empty() {
                    self.ink_color = color;
                }
            }
            if let Some(color) = render.paper_color {
                if !color.trim().is_empty() {
                    self.paper_color = color;
                }
            }
            if render.seed.is_some() {
                self.seed = render.seed;
            }
        }
        if let Some(ollama) = incoming.ollama {
            if let Some(host) = ollama.host {
                if !host.trim().is_empty() {
                    self.ollama_host = normalize_host(&host);
                }
            }
            if let Some(secs) = ollama.connect_timeout_secs {
                if secs > 0 {
                    self.connect_timeout_secs = secs;
                }
            }
        }
        if let Some(ai) = incoming.ai {
            if let Some(model) = ai.model {
                if !model.trim().is_empty() {
                    self.ai_model = Some(model);
                }
            }
            if let Some(prompt) = ai.system_prompt {
                self.system_prompt = prompt;
            }
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .as_deref()
            .and_then(paths::expand_path)
            .unwrap_or_else(paths::default_output_dir)
    }

    pub fn font_path(&self) -> Option<PathBuf> {
        self.font_path.as_deref().and_then(paths::expand_path)
    }
}

fn normalize_host(value: &str) -> String {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = paths::settings_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::with_temp_home;

    #[test]
    fn later_documents_override_earlier_ones() {
        let mut settings = Settings::default();
        settings
            .merge_str("[render]\nink_color = \"#102030\"\nseed = 7\n")
            .unwrap();
        settings
            .merge_str("[render]\nink_color = \"\"\n[ollama]\nhost = \"127.0.0.1:9999/\"\n")
            .unwrap();
        assert_eq!(settings.ink_color, "#102030");
        assert_eq!(settings.seed, Some(7));
        assert_eq!(settings.ollama_host, "http://127.0.0.1:9999");
    }

    #[test]
    fn malformed_toml_is_rejected() {
        let mut settings = Settings::default();
        assert!(settings.merge_str("[render\nseed = ").is_err());
    }

    #[test]
    fn first_load_writes_home_settings() {
        with_temp_home(|home| {
            let settings = load_settings(None).unwrap();
            assert!(home.join(".handscript/settings.toml").exists());
            assert_eq!(settings.paper_color, "#ffffff");
            assert_eq!(settings.output_dir(), home.join(".handscript/output"));
        });
    }

    #[test]
    fn missing_extra_file_is_an_error() {
        with_temp_home(|home| {
            let err = load_settings(Some(&home.join("nope.toml"))).unwrap_err();
            assert!(err.to_string().contains("settings file not found"));
        });
    }
}
