use unicode_width::UnicodeWidthChar;

/// Measures the natural rendered height of composer content.
pub trait TextMetrics {
    fn content_height(&self, text: &str) -> f32;
}

impl<F> TextMetrics for F
where
    F: Fn(&str) -> f32,
{
    fn content_height(&self, text: &str) -> f32 {
        self(text)
    }
}

pub const DEFAULT_LINE_HEIGHT: f32 = 24.0;
pub const DEFAULT_VERTICAL_PADDING: f32 = 24.0;
pub const DEFAULT_COLUMNS: usize = 60;

/// Fixed-pitch layout model: word-wrapped lines at a column width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineMetrics {
    pub line_height: f32,
    pub vertical_padding: f32,
    pub columns: usize,
}

impl Default for LineMetrics {
    fn default() -> Self {
        Self {
            line_height: DEFAULT_LINE_HEIGHT,
            vertical_padding: DEFAULT_VERTICAL_PADDING,
            columns: DEFAULT_COLUMNS,
        }
    }
}

impl TextMetrics for LineMetrics {
    fn content_height(&self, text: &str) -> f32 {
        visual_line_count(text, self.columns) as f32 * self.line_height + self.vertical_padding
    }
}

/// Counts wrapped lines the way a textarea lays them out: explicit newlines
/// always break, long lines wrap at the last space or mid-word when none fits.
/// Empty text still occupies one line.
pub fn visual_line_count(text: &str, columns: usize) -> usize {
    if columns == 0 {
        return text.split('\n').count();
    }

    text.split('\n')
        .map(|line| wrapped_rows(line, columns))
        .sum()
}

fn wrapped_rows(line: &str, columns: usize) -> usize {
    let chars = line.chars().collect::<Vec<_>>();
    let mut rows = 1;
    let mut col = 0;
    let mut last_space_idx = None::<usize>;

    for (index, &ch) in chars.iter().enumerate() {
        let width = UnicodeWidthChar::width(ch).unwrap_or(0);

        if col > 0 && col + width > columns {
            rows += 1;
            col = match last_space_idx.take() {
                // Carry the partial word after the last space onto the new row.
                Some(space_idx) => chars[space_idx..index]
                    .iter()
                    .map(|c| UnicodeWidthChar::width(*c).unwrap_or(0))
                    .sum(),
                None => 0,
            };
        }

        if ch == ' ' {
            last_space_idx = Some(index + 1);
        }
        col += width;
    }

    rows
}
