use anyhow::{Context, Result, anyhow};
use std::env;
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::{debug, info};

use super::{SpeechAudio, SpeechSynthesizer, SynthesisFuture};
use crate::data::{MP3_MIME, WAV_MIME};

/// Neither `say` nor `espeak` is installed.
#[derive(Debug, Error)]
#[error("no TTS engine found (install macOS 'say' or Linux 'espeak')")]
pub struct NoSpeechEngine;

/// Offline speech through the platform TTS command. Output is converted to
/// MP3 when `ffmpeg` is available, otherwise WAV is returned.
#[derive(Debug, Clone, Default)]
pub struct SystemTts;

impl SystemTts {
    pub fn new() -> Self {
        Self
    }
}

impl SpeechSynthesizer for SystemTts {
    fn synthesize<'a>(&'a self, text: &'a str, language: &'a str) -> SynthesisFuture<'a> {
        let text = text.to_string();
        let language = language.to_string();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || synthesize_blocking(&text, &language))
                .await
                .with_context(|| "speech task failed")?
        })
    }
}

fn synthesize_blocking(text: &str, language: &str) -> Result<SpeechAudio> {
    let dir = tempfile::tempdir().with_context(|| "failed to create temp dir for speech")?;
    let wav_path = dir.path().join("speech.wav");
    speak_to_wav(text, language, &wav_path)?;

    if command_exists("ffmpeg") {
        let mp3_path = dir.path().join("speech.mp3");
        run_ffmpeg(&[
            "-y",
            "-i",
            wav_path.to_string_lossy().as_ref(),
            mp3_path.to_string_lossy().as_ref(),
        ])
        .with_context(|| "failed to encode speech as mp3")?;
        let bytes = fs::read(&mp3_path).with_context(|| "failed to read synthesized mp3")?;
        return Ok(SpeechAudio {
            bytes,
            mime: MP3_MIME.to_string(),
        });
    }

    debug!("speech: ffmpeg not found, returning wav");
    let bytes = fs::read(&wav_path).with_context(|| "failed to read synthesized wav")?;
    Ok(SpeechAudio {
        bytes,
        mime: WAV_MIME.to_string(),
    })
}

fn speak_to_wav(text: &str, language: &str, out_wav: &Path) -> Result<()> {
    let text = text.replace('\n', " ");
    let has_say = command_exists("say");
    if has_say {
        match say_voice(language)? {
            Some(voice) => return run_say(&text, &voice, out_wav),
            None => debug!("speech: say has no voice for '{}', trying espeak", language),
        }
    }

    let Some(espeak) = ["espeak-ng", "espeak"]
        .into_iter()
        .find(|cmd| command_exists(cmd))
    else {
        if has_say {
            return Err(anyhow!("say has no installed voice for language '{}'", language));
        }
        return Err(NoSpeechEngine.into());
    };
    let voice = map_lang_for_espeak(language)
        .ok_or_else(|| anyhow!("{} has no voice for language '{}'", espeak, language))?;
    info!("speech: using {} with voice {}", espeak, voice);
    let status = Command::new(espeak)
        .arg("-v")
        .arg(voice)
        .arg("-w")
        .arg(out_wav)
        .arg(&text)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .with_context(|| format!("failed to run {}", espeak))?;
    if !status.success() {
        return Err(anyhow!("{} failed to synthesize audio", espeak));
    }
    Ok(())
}

fn run_say(text: &str, voice: &str, out_wav: &Path) -> Result<()> {
    info!("speech: using say with voice {}", voice);
    let status = Command::new("say")
        .arg("-v")
        .arg(voice)
        .arg("--data-format=LEI16@22050")
        .arg("-o")
        .arg(out_wav)
        .arg(text)
        .env("OS_ACTIVITY_MODE", "disable")
        .env("OS_ACTIVITY_DT_MODE", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .with_context(|| "failed to run say")?;
    if !status.success() {
        return Err(anyhow!("say failed to synthesize audio"));
    }
    Ok(())
}

fn say_voice(language: &str) -> Result<Option<String>> {
    let output = Command::new("say")
        .args(["-v", "?"])
        .stdin(Stdio::null())
        .output()
        .with_context(|| "failed to list say voices")?;
    if !output.status.success() {
        return Err(anyhow!("say failed to list voices"));
    }
    Ok(pick_say_voice(&String::from_utf8_lossy(&output.stdout), language))
}

/// Picks the first voice whose locale matches `language` from a `say -v ?`
/// listing (`<name>  <locale>  # <sample>`).
fn pick_say_voice(listing: &str, language: &str) -> Option<String> {
    let wanted = language.trim().to_lowercase();
    let wanted = wanted.split(['-', '_']).next().unwrap_or_default();
    if wanted.is_empty() {
        return None;
    }
    listing.lines().find_map(|line| {
        let head = line.split_once('#').map_or(line, |(head, _)| head).trim_end();
        let (name, locale) = head.rsplit_once(char::is_whitespace)?;
        let locale_lang = locale.split(['_', '-']).next()?;
        let name = name.trim();
        (!name.is_empty() && locale_lang.eq_ignore_ascii_case(wanted)).then(|| name.to_string())
    })
}

fn run_ffmpeg(args: &[&str]) -> Result<()> {
    let output = Command::new("ffmpeg")
        .args(args)
        .output()
        .with_context(|| "failed to run ffmpeg")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("ffmpeg failed: {}", stderr.trim()));
    }
    Ok(())
}

fn command_exists(cmd: &str) -> bool {
    let Some(path_var) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&path_var).any(|dir| is_executable(&dir.join(cmd)))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file()
}

fn map_lang_for_espeak(lang: &str) -> Option<&'static str> {
    match lang.trim().to_lowercase().as_str() {
        "en" | "eng" => Some("en"),
        "hi" | "hin" => Some("hi"),
        "ta" | "tam" => Some("ta"),
        "ml" | "mal" => Some("ml"),
        "bn" | "ben" => Some("bn"),
        "kn" | "kan" => Some("kn"),
        "te" | "tel" => Some("te"),
        "pa" | "pan" => Some("pa"),
        "mr" | "mar" => Some("mr"),
        "ur" | "urd" => Some("ur"),
        "fr" | "fra" => Some("fr"),
        "de" | "deu" => Some("de"),
        "es" | "spa" => Some("es"),
        "it" | "ita" => Some("it"),
        "pt" | "por" => Some("pt"),
        "ru" | "rus" => Some("ru"),
        "ar" | "ara" => Some("ar"),
        "ja" | "jpn" => Some("ja"),
        "ko" | "kor" => Some("ko"),
        "zh" | "zho" => Some("cmn"),
        _ => None,
    }
}
