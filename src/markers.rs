use crate::config::MarkerConfig;
use anyhow::{Context, Result, anyhow};
use regex::Regex;

/// What a recognized marker means for the job's counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerHit {
    Unit,
    Phase(String),
    Total(u64),
}

#[derive(Debug, Clone)]
struct Marker {
    anywhere: Regex,
    line_end: Regex,
    kind: MarkerKind,
}

#[derive(Debug, Clone)]
enum MarkerKind {
    Unit,
    Phase(String),
    Total,
}

/// Compiled marker patterns for one operation.
///
/// Totals are checked first, then phases, then units, so a message that
/// happens to satisfy several patterns resolves the same way every time.
#[derive(Debug, Clone, Default)]
pub struct MarkerSet {
    markers: Vec<Marker>,
}

impl MarkerSet {
    pub fn compile(cfg: &MarkerConfig) -> Result<Self> {
        let mut markers = Vec::new();
        for p in &cfg.total {
            let m = Marker::new(p, MarkerKind::Total)?;
            if m.anywhere.captures_len() < 2 {
                return Err(anyhow!("total marker needs a capture group: {p}"));
            }
            markers.push(m);
        }
        for ph in &cfg.phases {
            markers.push(Marker::new(&ph.pattern, MarkerKind::Phase(ph.label.clone()))?);
        }
        for p in &cfg.unit {
            markers.push(Marker::new(p, MarkerKind::Unit)?);
        }
        Ok(Self { markers })
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Finds a marker anywhere in a complete log message.
    pub fn match_message(&self, msg: &str) -> Option<MarkerHit> {
        self.markers
            .iter()
            .find_map(|m| m.hit(&m.anywhere, msg))
            .map(|(_, hit)| hit)
    }

    /// Finds a marker that ends the given line (trailing blanks allowed).
    pub fn match_line_end(&self, line: &str) -> Option<MarkerHit> {
        self.match_line_end_at(line).map(|(_, hit)| hit)
    }

    /// Like [`Self::match_line_end`], also returning where the marker starts.
    pub fn match_line_end_at(&self, line: &str) -> Option<(usize, MarkerHit)> {
        self.markers.iter().find_map(|m| m.hit(&m.line_end, line))
    }
}

impl Marker {
    fn new(pattern: &str, kind: MarkerKind) -> Result<Self> {
        let anywhere =
            Regex::new(pattern).with_context(|| format!("compiling marker: {pattern}"))?;
        let line_end = Regex::new(&format!("(?:{pattern})[ \\t]*$"))
            .with_context(|| format!("compiling marker: {pattern}"))?;
        Ok(Self {
            anywhere,
            line_end,
            kind,
        })
    }

    fn hit(&self, re: &Regex, text: &str) -> Option<(usize, MarkerHit)> {
        match &self.kind {
            MarkerKind::Unit => re.find(text).map(|m| (m.start(), MarkerHit::Unit)),
            MarkerKind::Phase(label) => re
                .find(text)
                .map(|m| (m.start(), MarkerHit::Phase(label.clone()))),
            MarkerKind::Total => {
                let caps = re.captures(text)?;
                let start = caps.get(0)?.start();
                let n = caps.get(1)?.as_str().parse::<u64>().ok()?;
                Some((start, MarkerHit::Total(n)))
            }
        }
    }
}
