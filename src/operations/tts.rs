//! Text-to-speech, one synthesizer call per text part.
//!
//! The synthesis loop reports through its own log records under
//! [`LOG_TARGET`]; the job scrapes them with a log adapter.

use super::OpEnv;
use crate::adapters::LogPatternAdapter;
use crate::engine::Engine;
use crate::job::JobContext;
use crate::markers::MarkerSet;
use crate::util::{has_extension, output_path};
use anyhow::{Context, Result, anyhow, bail};
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const LOG_TARGET: &str = "pdfp_progress::tts_engine";

pub fn run(env: &OpEnv, input: &Path, ctx: &JobContext) -> Result<PathBuf> {
    let text = load_text(env.engine.as_ref(), input)?;
    let markers = MarkerSet::compile(&env.cfg.tts.markers)?;
    let output = output_path(
        &env.cfg.output,
        input,
        &env.cfg.output.tts_suffix,
        &env.cfg.tts.extension,
    )?;

    ctx.reporter().relabel("TTS");
    let adapter = LogPatternAdapter::new(ctx.reporter(), markers, 0);
    let attachment = env.router.attach(LOG_TARGET, adapter);

    info!("Converting {} to speech", input.display());
    let parts = split_text(&text, env.cfg.tts.max_part_chars);
    synthesize(env.engine.as_ref(), &parts, &output, ctx)?;

    let state = attachment.state();
    drop(attachment);
    debug!(
        "tts parts {}/{} for {}",
        state.current_unit(),
        state.total_units(),
        input.display()
    );
    info!("Conversion complete. Output: {}", output.display());
    Ok(output)
}

fn load_text(engine: &dyn Engine, input: &Path) -> Result<String> {
    if has_extension(input, &["pdf"]) {
        engine.extract_text(input)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))
    }
}

/// Writes the audio for every part to `output`, in order.
///
/// A `.wav` output gets one RIFF header with every part's samples under it.
/// Any other extension is written as the parts' bytes back to back, which
/// only suits formats that concatenate (MP3, raw PCM).
pub fn synthesize(
    engine: &dyn Engine,
    parts: &[String],
    output: &Path,
    ctx: &JobContext,
) -> Result<()> {
    if parts.is_empty() {
        bail!("no text to speak");
    }
    debug!(target: LOG_TARGET, "text_parts: {}", parts.len());

    let mut out = AudioOut::create(output)?;
    for (i, part) in parts.iter().enumerate() {
        ctx.checkpoint()?;
        let audio = engine
            .synthesize(part)
            .with_context(|| format!("synthesizing part {i}"))?;
        out.append(&audio)
            .with_context(|| format!("writing part {i} to {}", output.display()))?;
        debug!(target: LOG_TARGET, "part-{} created", i);
    }
    out.finish()
}

enum AudioOut {
    Raw(BufWriter<File>),
    Wav {
        out: BufWriter<File>,
        fmt: Option<Vec<u8>>,
        data_len: u64,
    },
}

impl AudioOut {
    fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        let out = BufWriter::new(file);
        Ok(if has_extension(path, &["wav"]) {
            AudioOut::Wav {
                out,
                fmt: None,
                data_len: 0,
            }
        } else {
            AudioOut::Raw(out)
        })
    }

    fn append(&mut self, audio: &[u8]) -> Result<()> {
        match self {
            AudioOut::Raw(out) => out.write_all(audio)?,
            AudioOut::Wav { out, fmt, data_len } => {
                let (part_fmt, samples) = parse_wav(audio)?;
                if let Some(first) = fmt.as_deref() {
                    if first != part_fmt {
                        bail!("synthesizer changed audio format between parts");
                    }
                } else {
                    write_wav_header(out, part_fmt, 0)?;
                    *fmt = Some(part_fmt.to_vec());
                }
                out.write_all(samples)?;
                *data_len += samples.len() as u64;
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<()> {
        match self {
            AudioOut::Raw(mut out) => out.flush()?,
            AudioOut::Wav {
                mut out,
                fmt,
                data_len,
            } => {
                let Some(fmt) = fmt else {
                    out.flush()?;
                    return Ok(());
                };
                if data_len % 2 == 1 {
                    out.write_all(&[0])?;
                }
                out.seek(SeekFrom::Start(0))?;
                write_wav_header(&mut out, &fmt, data_len)?;
                out.flush()?;
            }
        }
        Ok(())
    }
}

/// Returns the `fmt ` chunk body and the sample data of a RIFF/WAVE stream.
///
/// A data length running past the end (as streaming encoders write it) is
/// cut to the bytes present.
pub fn parse_wav(bytes: &[u8]) -> Result<(&[u8], &[u8])> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        bail!("synthesizer output is not a RIFF/WAVE stream");
    }
    let mut pos = 12;
    let mut fmt = None;
    while pos + 8 <= bytes.len() {
        let id = &bytes[pos..pos + 4];
        let len = u32::from_le_bytes(bytes[pos + 4..pos + 8].try_into()?) as usize;
        let body = pos + 8;
        let end = body.saturating_add(len).min(bytes.len());
        match id {
            b"fmt " => fmt = Some(&bytes[body..end]),
            b"data" => {
                let fmt = fmt.ok_or_else(|| anyhow!("WAV data chunk before fmt chunk"))?;
                return Ok((fmt, &bytes[body..end]));
            }
            _ => {}
        }
        pos = end + (len & 1);
    }
    bail!("WAV stream has no data chunk")
}

fn write_wav_header(out: &mut impl Write, fmt: &[u8], data_len: u64) -> Result<()> {
    let fmt_pad = fmt.len() % 2;
    let riff_len = 4 + 8 + fmt.len() + fmt_pad + 8 + data_len as usize + (data_len as usize % 2);
    let riff_len = u32::try_from(riff_len).map_err(|_| anyhow!("WAV output exceeds 4 GiB"))?;
    let fmt_len = u32::try_from(fmt.len())?;
    out.write_all(b"RIFF")?;
    out.write_all(&riff_len.to_le_bytes())?;
    out.write_all(b"WAVE")?;
    out.write_all(b"fmt ")?;
    out.write_all(&fmt_len.to_le_bytes())?;
    out.write_all(fmt)?;
    if fmt_pad == 1 {
        out.write_all(&[0])?;
    }
    out.write_all(b"data")?;
    out.write_all(&(data_len as u32).to_le_bytes())?;
    Ok(())
}

/// Splits `text` on whitespace into parts of at most `max_chars` characters.
///
/// Words longer than `max_chars` are cut.
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let max = max_chars.max(1);
    let mut parts = Vec::new();
    let mut cur = String::new();
    let mut cur_len = 0usize;

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > max {
            if cur_len > 0 {
                parts.push(std::mem::take(&mut cur));
                cur_len = 0;
            }
            let rest = word.split_off(max);
            parts.push(word.into_iter().collect());
            word = rest;
        }
        if word.is_empty() {
            continue;
        }
        let extra = if cur_len == 0 { word.len() } else { word.len() + 1 };
        if cur_len + extra > max {
            parts.push(std::mem::take(&mut cur));
            cur_len = 0;
        }
        if cur_len > 0 {
            cur.push(' ');
            cur_len += 1;
        }
        cur.extend(word.iter());
        cur_len += word.len();
    }
    if cur_len > 0 {
        parts.push(cur);
    }
    parts
}
