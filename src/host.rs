use crate::registry::{ProgressEntry, Registry};

const ELLIPSIS: char = '…';
const MIN_BAR: usize = 10;

/// Text panel that stacks registry entries top-down and scrolls.
///
/// Two rows per entry: the (elided) label, then the bar.
#[derive(Debug, Clone)]
pub struct TextSurface {
    width: usize,
    height: usize,
    scroll: usize,
}

impl TextSurface {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height: height.max(1),
            scroll: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn resize(&mut self, width: usize, height: usize, registry: &mut Registry) {
        self.width = width;
        self.height = height.max(1);
        registry.on_resize(width);
    }

    pub fn scroll_by(&mut self, delta: isize, registry: &Registry) {
        let max = max_scroll(registry.len() * 2, self.height);
        self.scroll = self.scroll.saturating_add_signed(delta).min(max);
    }

    pub fn render(&self, registry: &Registry) -> Vec<String> {
        if !registry.is_visible() {
            return Vec::new();
        }
        let rows: Vec<String> = registry
            .entries()
            .flat_map(|e| [elide(e.label(), e.max_label_width()), self.bar(e)])
            .collect();
        let start = self.scroll.min(max_scroll(rows.len(), self.height));
        rows.into_iter().skip(start).take(self.height).collect()
    }

    fn bar(&self, entry: &ProgressEntry) -> String {
        // "[" + cells + "] " + "100%"
        let cells = self.width.saturating_sub(7).max(MIN_BAR);
        let pct = entry.percent().clamp(0.0, 100.0);
        let filled = ((pct / 100.0) * cells as f64).round() as usize;
        format!(
            "[{}{}] {:>3.0}%",
            "#".repeat(filled),
            "-".repeat(cells - filled),
            pct
        )
    }
}

fn max_scroll(rows: usize, height: usize) -> usize {
    rows.saturating_sub(height)
}

/// Shortens `s` to at most `width` characters, marking the cut with `…`.
pub fn elide(s: &str, width: usize) -> String {
    let len = s.chars().count();
    if len <= width {
        return s.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out: String = s.chars().take(width - 1).collect();
    out.push(ELLIPSIS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elide_keeps_short_labels() {
        assert_eq!(elide("OCR a.pdf:", 20), "OCR a.pdf:");
        assert_eq!(elide("OCR a_very_long_name.pdf:", 8), "OCR a_v…");
        assert_eq!(elide("abc", 0), "");
    }
}
