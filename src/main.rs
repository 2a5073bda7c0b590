use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgGroup, Parser};
use handscript::{Config, Error, StylePreset, TextSource};

#[derive(Parser, Debug)]
#[command(
    name = "handscript",
    version,
    about = "Render text as an A5 landscape handwriting page"
)]
#[command(group(
    ArgGroup::new("source")
        .args(["text", "file", "interactive", "prompt"])
        .multiple(false)
))]
struct Cli {
    /// Text to render
    #[arg(short = 't', long = "text")]
    text: Option<String>,

    /// Read the text from a UTF-8 file
    #[arg(short = 'f', long = "file")]
    file: Option<PathBuf>,

    /// Output image (png, jpg, bmp, gif, tiff, webp). Defaults to
    /// <output_dir>/handwritten_<timestamp>.png
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Font file (ttf/otf/ttc)
    #[arg(short = 'F', long = "font")]
    font: Option<PathBuf>,

    /// Style preset (default, compact, neat, casual)
    #[arg(short = 's', long = "style", default_value = "default")]
    style: String,

    /// Type the text line by line, then pick a style
    #[arg(short = 'i', long = "interactive")]
    interactive: bool,

    /// Generate the text with the local model from this prompt
    #[arg(short = 'p', long = "prompt")]
    prompt: Option<String>,

    /// Model for --prompt (defaults to [ai] model, then the first installed)
    #[arg(short = 'm', long = "model")]
    model: Option<String>,

    /// Show style presets and exit
    #[arg(long = "show-styles")]
    show_styles: bool,

    /// Show models installed on the local model server and exit
    #[arg(long = "show-models")]
    show_models: bool,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Seed for the handwriting jitter, for reproducible pages
    #[arg(long = "seed")]
    seed: Option<u64>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> Config {
        Config {
            text: self.text,
            file: self.file,
            prompt: self.prompt,
            interactive: self.interactive,
            output: self.output,
            font: self.font,
            style: self.style,
            model: self.model,
            settings_path: self.read_settings,
            seed: self.seed,
            show_styles: self.show_styles,
            show_models: self.show_models,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = handscript::logging::init(cli.verbose) {
        eprintln!("warning: failed to initialise logging: {:#}", err);
    }
    match run(cli.into_config()).await {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::from(err.exit_code())
        }
    }
}

async fn run(mut config: Config) -> handscript::Result<String> {
    config.style()?;
    let listing = config.show_styles || config.show_models;
    let input = if listing {
        None
    } else {
        match config.text_source()? {
            TextSource::Interactive => Some(run_interactive(&mut config)?),
            TextSource::Stdin if io::stdin().is_terminal() => {
                config.interactive = true;
                Some(run_interactive(&mut config)?)
            }
            TextSource::Stdin => Some(read_stdin()?),
            _ => None,
        }
    };
    handscript::run(config, input).await
}

fn read_stdin() -> handscript::Result<String> {
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .map_err(stdin_error)?;
    Ok(buffer)
}

fn run_interactive(config: &mut Config) -> handscript::Result<String> {
    println!("Enter the text to render. Finish with an empty line.");
    let stdin = io::stdin();
    let mut stdin_lock = stdin.lock();
    let mut lines = Vec::new();
    let mut line = String::new();
    loop {
        line.clear();
        if stdin_lock.read_line(&mut line).map_err(stdin_error)? == 0 {
            break;
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        lines.push(trimmed.to_string());
    }

    println!("Styles:");
    for preset in StylePreset::ALL {
        println!("  {:<8} {}", preset.as_str(), preset.description());
    }
    print!("Style [{}]: ", config.style()?);
    io::stdout().flush().map_err(stdin_error)?;
    line.clear();
    stdin_lock.read_line(&mut line).map_err(stdin_error)?;
    let answer = line.trim();
    if !answer.is_empty() {
        let preset: StylePreset = answer.parse()?;
        config.style = preset.as_str().to_string();
    }

    Ok(lines.join("\n"))
}

fn stdin_error(source: io::Error) -> Error {
    Error::ReadInput {
        path: PathBuf::from("<stdin>"),
        source,
    }
}
