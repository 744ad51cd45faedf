use anyhow::Result;
use clap::Parser;
use std::path::Path;

#[derive(Parser, Debug)]
#[command(
    name = "ocr-speech-translator",
    version,
    about = "Extract text from an image, detect its language, translate it and read it aloud"
)]
struct Cli {
    /// Image to read (png, jpg, webp, gif, bmp, tiff)
    #[arg(long = "image")]
    image: Option<String>,

    /// Source language code; skips automatic detection
    #[arg(short = 'L', long = "source-lang")]
    source_lang: Option<String>,

    /// Translate the extracted text
    #[arg(long = "translate")]
    translate: bool,

    /// Translation target language (default: settings [pipeline] default_translation_target)
    #[arg(short = 'l', long = "lang")]
    lang: Option<String>,

    /// Directory to write original_audio / translated_audio files into
    #[arg(short = 'o', long = "out-dir")]
    out_dir: Option<String>,

    /// Print the full result as JSON
    #[arg(long = "json")]
    json: bool,

    /// Show supported OCR/speech languages and translation targets, then exit
    #[arg(long = "show-languages")]
    show_languages: bool,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,

    /// Serve the HTTP API on this address (e.g. 127.0.0.1:8787)
    #[arg(long = "server")]
    server: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    ocr_speech_translator::logging::init(cli.verbose, cli.server.is_some())?;

    if let Some(addr) = cli.server {
        let extra = cli.read_settings.as_deref().map(Path::new);
        let settings = ocr_speech_translator::settings::load_settings(extra)?;
        return ocr_speech_translator::run_server(settings, addr).await;
    }

    let output = ocr_speech_translator::run(ocr_speech_translator::Config {
        image: cli.image,
        source_lang: cli.source_lang,
        translate: cli.translate,
        lang: cli.lang,
        out_dir: cli.out_dir,
        json: cli.json,
        show_languages: cli.show_languages,
        settings_path: cli.read_settings,
    })
    .await?;

    println!("{}", output);
    Ok(())
}
