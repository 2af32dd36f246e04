use anyhow::{Result, anyhow};
use pdfp_progress::{
    adapters::{LogPatternAdapter, LogRouter},
    config::Config,
    engine::{Engine, Tool, ToolDiag},
    event::{self, ChannelSink, EventRx, ProgressEvent, ProgressSink, Reporter},
    job::{CancelToken, Cancelled, JobContext},
    key::{OperationKind, make_key},
    markers::MarkerSet,
    operations::{self, OpEnv, tts},
    probe::probe_pdf,
};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;

struct FakeEngine {
    pages: u64,
    ocr_script: String,
}

impl Engine for FakeEngine {
    fn doctor(&self) -> Vec<ToolDiag> {
        Vec::new()
    }

    fn command(&self, tool: Tool) -> Command {
        let mut cmd = Command::new("sh");
        match tool {
            Tool::Ocrmypdf => cmd.arg("-c").arg(&self.ocr_script),
            _ => cmd.arg("-c").arg("exit 0"),
        };
        cmd
    }

    fn page_count(&self, _input: &Path) -> Result<u64> {
        Ok(self.pages)
    }

    fn extract_text(&self, _input: &Path) -> Result<String> {
        Ok("one two three".into())
    }

    fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        if text.contains("poison") {
            return Err(anyhow!("cannot say that"));
        }
        Ok(format!("<{text}>").into_bytes())
    }
}

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("pdfp-progress-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir.join(name)
}

fn context(kind: &str, target: &str) -> (JobContext, EventRx) {
    let (tx, rx) = event::channel();
    let sink: Arc<dyn ProgressSink> = Arc::new(ChannelSink::new(tx));
    let reporter = Arc::new(Reporter::new(make_key(kind, target), sink));
    (JobContext::new(reporter, CancelToken::new()), rx)
}

fn percents(rx: &EventRx) -> Vec<f64> {
    rx.try_iter()
        .filter_map(|e| match e {
            ProgressEvent::Progress { percent, .. } => Some(percent),
            _ => None,
        })
        .collect()
}

#[test]
fn unsupported_inputs_are_rejected() {
    assert!(operations::validate_input(OperationKind::Ocr, Path::new("/x/notes.txt")).is_err());
    assert!(operations::validate_input(OperationKind::Tts, Path::new("/x/missing.txt")).is_err());

    let txt = scratch("present.txt");
    std::fs::write(&txt, "hello").unwrap();
    assert!(operations::validate_input(OperationKind::Tts, &txt).is_ok());
    assert!(operations::validate_input(OperationKind::Crop, &txt).is_err());
}

#[test]
fn probe_rejects_empty_documents() {
    let cfg = Config::default();
    let pdf = scratch("probe.pdf");
    std::fs::write(&pdf, b"%PDF-1.4").unwrap();

    let engine = FakeEngine {
        pages: 7,
        ocr_script: String::new(),
    };
    assert_eq!(probe_pdf(&cfg, &engine, &pdf).unwrap().page_count, 7);

    let empty = FakeEngine {
        pages: 0,
        ocr_script: String::new(),
    };
    assert!(probe_pdf(&cfg, &empty, &pdf).is_err());
}

#[test]
fn tts_parts_drive_progress_through_logs() {
    let router = LogRouter::new();
    let subscriber = tracing_subscriber::registry().with(router.clone());
    let engine = FakeEngine {
        pages: 1,
        ocr_script: String::new(),
    };
    let (ctx, rx) = context("TTS", "/t/story.txt");
    let out = scratch("story_tts.raw");
    let parts: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();

    tracing::subscriber::with_default(subscriber, || {
        let markers = MarkerSet::compile(&Config::default().tts.markers).unwrap();
        let _attachment = router.attach(
            tts::LOG_TARGET,
            LogPatternAdapter::new(ctx.reporter(), markers, 0),
        );
        tts::synthesize(&engine, &parts, &out, &ctx).unwrap();
    });

    assert_eq!(percents(&rx), vec![0.0, 25.0, 50.0, 75.0, 100.0]);
    assert_eq!(std::fs::read(&out).unwrap(), b"<a><b><c><d>");
}

struct WavEngine;

const WAV_FMT: [u8; 16] = [1, 0, 1, 0, 0x40, 0x1f, 0, 0, 0x80, 0x3e, 0, 0, 2, 0, 16, 0];

impl Engine for WavEngine {
    fn doctor(&self) -> Vec<ToolDiag> {
        Vec::new()
    }

    fn command(&self, _tool: Tool) -> Command {
        Command::new("true")
    }

    fn page_count(&self, _input: &Path) -> Result<u64> {
        Ok(1)
    }

    fn extract_text(&self, _input: &Path) -> Result<String> {
        Ok(String::new())
    }

    fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let samples = text.as_bytes();
        let mut v = b"RIFF".to_vec();
        v.extend_from_slice(&(36 + samples.len() as u32).to_le_bytes());
        v.extend_from_slice(b"WAVEfmt ");
        v.extend_from_slice(&16u32.to_le_bytes());
        v.extend_from_slice(&WAV_FMT);
        v.extend_from_slice(b"data");
        // Streaming encoders leave the length unset.
        v.extend_from_slice(&u32::MAX.to_le_bytes());
        v.extend_from_slice(samples);
        Ok(v)
    }
}

#[test]
fn wav_parts_share_one_header() {
    let (ctx, _rx) = context("TTS", "/t/voice.txt");
    let out = scratch("voice_tts.wav");
    let parts: Vec<String> = ["ab", "cde", "f"].iter().map(|s| s.to_string()).collect();
    tts::synthesize(&WavEngine, &parts, &out, &ctx).unwrap();

    let bytes = std::fs::read(&out).unwrap();
    assert_eq!(bytes.windows(4).filter(|w| w == &b"RIFF").count(), 1);
    let (fmt, data) = tts::parse_wav(&bytes).unwrap();
    assert_eq!(fmt, &WAV_FMT);
    assert_eq!(data, b"abcdef");
    let riff_len = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize;
    assert_eq!(riff_len, bytes.len() - 8);
}

#[test]
fn wav_output_rejects_non_wav_parts() {
    let engine = FakeEngine {
        pages: 1,
        ocr_script: String::new(),
    };
    let (ctx, _rx) = context("TTS", "/t/raw.txt");
    let parts = vec!["hello".to_string()];
    let err = tts::synthesize(&engine, &parts, &scratch("raw_parts.wav"), &ctx).unwrap_err();
    assert!(format!("{err:#}").contains("RIFF"));
}

#[test]
fn tts_stops_between_parts_when_cancelled() {
    let engine = FakeEngine {
        pages: 1,
        ocr_script: String::new(),
    };
    let (ctx, _rx) = context("TTS", "/t/cancel.txt");
    ctx.cancel_token().cancel();
    let parts = vec!["hello".to_string()];
    let err = tts::synthesize(&engine, &parts, &scratch("cancel.raw"), &ctx).unwrap_err();
    assert!(err.downcast_ref::<Cancelled>().is_some());
}

#[test]
fn tts_surfaces_synthesizer_errors() {
    let engine = FakeEngine {
        pages: 1,
        ocr_script: String::new(),
    };
    let (ctx, _rx) = context("TTS", "/t/poison.txt");
    let parts = vec!["fine".to_string(), "poison".to_string()];
    let err = tts::synthesize(&engine, &parts, &scratch("poison.raw"), &ctx).unwrap_err();
    assert!(format!("{err:#}").contains("cannot say that"));
}

#[cfg(unix)]
#[test]
fn ocr_tracks_grafting_lines_from_stderr() {
    let input = scratch("scan.pdf");
    std::fs::write(&input, b"%PDF-1.4").unwrap();
    let engine = FakeEngine {
        pages: 4,
        ocr_script: "for i in 1 2 3 4; do printf '%s Grafting\\n' \"$i\" >&2; done; \
                     printf 'Postprocessing...\\n' >&2"
            .into(),
    };
    let env = OpEnv {
        cfg: Arc::new(Config::default()),
        engine: Arc::new(engine),
        router: LogRouter::new(),
    };
    let (ctx, rx) = context("OCR", &input.display().to_string());

    let output = operations::ocr::run(&env, &input, &ctx).unwrap();
    assert_eq!(output.file_name().unwrap(), "scan_ocr.pdf");

    let events: Vec<_> = rx.try_iter().collect();
    let percents: Vec<f64> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Progress { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect();
    assert_eq!(percents, vec![25.0, 50.0, 75.0, 100.0, 0.0]);
    assert!(events.iter().any(|e| matches!(
        e,
        ProgressEvent::Relabel { label, .. } if label == "OCR Postprocessing"
    )));
}

#[cfg(unix)]
#[test]
fn ocr_fails_on_nonzero_exit() {
    let input = scratch("bad.pdf");
    std::fs::write(&input, b"%PDF-1.4").unwrap();
    let env = OpEnv {
        cfg: Arc::new(Config::default()),
        engine: Arc::new(FakeEngine {
            pages: 2,
            ocr_script: "printf 'Grafting\\n' >&2; exit 2".into(),
        }),
        router: LogRouter::new(),
    };
    let (ctx, _rx) = context("OCR", &input.display().to_string());
    let err = operations::ocr::run(&env, &input, &ctx).unwrap_err();
    assert!(err.to_string().contains("ocrmypdf failed"));
}

#[cfg(unix)]
#[test]
fn crop_bar_completes_when_briss_exits() {
    let input = scratch("pages.pdf");
    std::fs::write(&input, b"%PDF-1.4").unwrap();
    let env = OpEnv {
        cfg: Arc::new(Config::default()),
        engine: Arc::new(FakeEngine {
            pages: 6,
            ocr_script: String::new(),
        }),
        router: LogRouter::new(),
    };
    let (ctx, rx) = context("CROP", &input.display().to_string());

    let output = operations::crop::run(&env, &input, &ctx).unwrap();
    assert_eq!(output.unwrap().file_name().unwrap(), "pages_crop.pdf");

    let events: Vec<_> = rx.try_iter().collect();
    assert!(matches!(
        &events[0],
        ProgressEvent::Relabel { label, .. } if label == "Cropping"
    ));
    let percents: Vec<f64> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Progress { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect();
    assert_eq!(percents, vec![0.0, 100.0]);
    assert!(matches!(events.last(), Some(ProgressEvent::Done { .. })));
}
