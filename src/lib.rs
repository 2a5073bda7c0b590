use futures_util::StreamExt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use time::{OffsetDateTime, format_description};
use tracing::{debug, info};

pub mod error;
#[cfg(feature = "gui")]
pub mod gui;
pub mod logging;
pub mod ollama;
mod paths;
pub mod prompts;
pub mod render;
pub mod session;
pub mod settings;
pub mod styles;
#[cfg(test)]
mod test_util;

pub use error::{Error, ErrorKind, Result};
pub use ollama::{ModelBackend, OllamaClient};
pub use render::{RenderRequest, RenderSettings, RenderedImage};
pub use settings::Settings;
pub use styles::StylePreset;

#[derive(Debug, Clone)]
pub struct Config {
    pub text: Option<String>,
    pub file: Option<PathBuf>,
    pub prompt: Option<String>,
    pub interactive: bool,
    pub output: Option<PathBuf>,
    pub font: Option<PathBuf>,
    pub style: String,
    pub model: Option<String>,
    pub settings_path: Option<String>,
    pub seed: Option<u64>,
    pub show_styles: bool,
    pub show_models: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            text: None,
            file: None,
            prompt: None,
            interactive: false,
            output: None,
            font: None,
            style: StylePreset::Default.as_str().to_string(),
            model: None,
            settings_path: None,
            seed: None,
            show_styles: false,
            show_models: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextSource {
    Text(String),
    File(PathBuf),
    Prompt(String),
    Interactive,
    Stdin,
}

impl Config {
    pub fn text_source(&self) -> Result<TextSource> {
        let mut given = Vec::new();
        if self.text.is_some() {
            given.push("--text");
        }
        if self.file.is_some() {
            given.push("--file");
        }
        if self.prompt.is_some() {
            given.push("--prompt");
        }
        if self.interactive {
            given.push("--interactive");
        }
        if given.len() > 1 {
            return Err(Error::AmbiguousInput(format!(
                "{} cannot be combined",
                given.join(", ")
            )));
        }

        if let Some(text) = &self.text {
            return Ok(TextSource::Text(text.clone()));
        }
        if let Some(path) = &self.file {
            return Ok(TextSource::File(path.clone()));
        }
        if let Some(prompt) = &self.prompt {
            return Ok(TextSource::Prompt(prompt.clone()));
        }
        if self.interactive {
            return Ok(TextSource::Interactive);
        }
        Ok(TextSource::Stdin)
    }

    pub fn style(&self) -> Result<StylePreset> {
        self.style.parse()
    }

    fn settings_path(&self) -> Option<&Path> {
        self.settings_path.as_deref().map(Path::new)
    }
}

pub async fn run(config: Config, input: Option<String>) -> Result<String> {
    let style = config.style()?;
    let settings = settings::load_settings(config.settings_path()).map_err(Error::Settings)?;

    if config.show_styles {
        return Ok(format_styles());
    }
    if config.show_models {
        let client = OllamaClient::from_settings(&settings);
        let models = client.list_models().await?;
        return Ok(models.join("\n"));
    }

    let text = match config.text_source()? {
        TextSource::Text(text) => text,
        TextSource::File(path) => {
            fs::read_to_string(&path).map_err(|source| Error::ReadInput { path, source })?
        }
        TextSource::Prompt(prompt) => {
            generate_text(&settings, config.model.as_deref(), &prompt).await?
        }
        TextSource::Interactive | TextSource::Stdin => input.unwrap_or_default(),
    };

    let output = match config.output {
        Some(path) => path,
        None => {
            let dir = settings.output_dir();
            fs::create_dir_all(&dir).map_err(|source| Error::Write {
                path: dir.clone(),
                source,
            })?;
            dir.join(default_output_name(OffsetDateTime::now_local().ok()))
        }
    };

    let request = RenderRequest::new(text, style, output)
        .with_font(config.font)
        .with_seed(config.seed);
    let rendered = render::render(&request, &RenderSettings::from(&settings))?;
    let (width, height) = rendered.dimensions();
    info!(
        "rendered {}x{} page to {}",
        width,
        height,
        rendered.path.display()
    );
    if rendered.overflow_chars > 0 {
        eprintln!(
            "warning: {} characters did not fit on the page",
            rendered.overflow_chars
        );
    }
    Ok(rendered.path.display().to_string())
}

async fn generate_text(settings: &Settings, model: Option<&str>, prompt: &str) -> Result<String> {
    let client = OllamaClient::from_settings(settings);
    let model = match model.or(settings.ai_model.as_deref()) {
        Some(model) => model.to_string(),
        None => client
            .list_models()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NoModel(format!("none installed on {}", client.host())))?,
    };
    debug!("generating text with {}", model);

    let mut stream = client.stream_chat(&model, prompt).await?;
    let mut text = String::new();
    let mut stderr = std::io::stderr();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let _ = write!(stderr, "{}", chunk);
        let _ = stderr.flush();
        text.push_str(&chunk);
    }
    let _ = writeln!(stderr);
    Ok(text)
}

fn format_styles() -> String {
    StylePreset::ALL
        .iter()
        .map(|preset| format!("{}\t{}", preset.as_str(), preset.description()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn default_output_name(now: Option<OffsetDateTime>) -> String {
    let now = now.unwrap_or_else(OffsetDateTime::now_utc);
    let stamp = format_description::parse("[year][month][day]_[hour][minute][second]")
        .ok()
        .and_then(|format| now.format(&format).ok())
        .unwrap_or_else(|| now.unix_timestamp().to_string());
    format!("handwritten_{}.png", stamp)
}
