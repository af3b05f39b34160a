use crate::extract::table::Table;
use once_cell::sync::Lazy;
use regex::Regex;

/// Runs of two or more blanks inside one text run separate cells of a
/// space-padded row.
static CELL_GAP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\t|\s{2,}").expect("cell gap regex should parse"));

/// Rows whose baselines differ by less than this many points share a line.
const ROW_TOLERANCE: f32 = 2.0;

/// Average glyph width as a fraction of the font size.
const GLYPH_WIDTH: f32 = 0.5;

/// A string drawn at one position on the page, in page space.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub text: String,
}

/// One cell candidate with its estimated horizontal extent.
#[derive(Debug, Clone, PartialEq)]
struct Piece {
    x0: f32,
    x1: f32,
    y: f32,
    text: String,
}

impl Piece {
    fn overlap(&self, other: &Piece) -> f32 {
        self.x1.min(other.x1) - self.x0.max(other.x0)
    }

    fn center(&self) -> f32 {
        (self.x0 + self.x1) / 2.0
    }
}

/// Break a run at its wide gaps, placing each piece by its character offset.
fn pieces(run: &TextRun) -> Vec<Piece> {
    let glyph = run.size.abs().max(1.0) * GLYPH_WIDTH;
    let mut out = Vec::new();
    let mut start = 0;
    let mut push = |from: usize, to: usize| {
        let raw = &run.text[from..to];
        let text = raw.trim();
        if text.is_empty() {
            return;
        }
        let lead = raw.len() - raw.trim_start().len();
        let offset = run.text[..from + lead].chars().count() as f32;
        let x0 = run.x + offset * glyph;
        out.push(Piece {
            x0,
            x1: x0 + text.chars().count() as f32 * glyph,
            y: run.y,
            text: text.to_string(),
        });
    };
    for gap in CELL_GAP.find_iter(&run.text) {
        push(start, gap.start());
        start = gap.end();
    }
    push(start, run.text.len());
    out
}

/// Group pieces into lines, top of the page first, each line left to right.
fn lines(mut all: Vec<Piece>) -> Vec<Vec<Piece>> {
    all.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x0.total_cmp(&b.x0)));

    let mut out: Vec<Vec<Piece>> = Vec::new();
    for piece in all {
        let same_line = out
            .last()
            .is_some_and(|line| (line[0].y - piece.y).abs() < ROW_TOLERANCE);
        match out.last_mut() {
            Some(line) if same_line => line.push(piece),
            _ => out.push(vec![piece]),
        }
    }
    for line in &mut out {
        line.sort_by(|a, b| a.x0.total_cmp(&b.x0));
    }
    out
}

/// Index of the column `piece` belongs to: the one it overlaps most, or the
/// nearest by center when it overlaps none.
fn column_of(piece: &Piece, columns: &[Piece]) -> usize {
    let best = columns
        .iter()
        .enumerate()
        .map(|(i, c)| (i, piece.overlap(c)))
        .filter(|(_, o)| *o > 0.0)
        .max_by(|a, b| a.1.total_cmp(&b.1));
    match best {
        Some((i, _)) => i,
        None => columns
            .iter()
            .enumerate()
            .min_by(|a, b| {
                (a.1.center() - piece.center())
                    .abs()
                    .total_cmp(&(b.1.center() - piece.center()).abs())
            })
            .map_or(0, |(i, _)| i),
    }
}

/// Build the page table from positioned text.
///
/// Lines with at least two cells are table lines. The first line with the
/// most cells fixes the columns; every table line is laid onto those columns,
/// so a missing value stays an empty string in its own column.
pub fn table_from_runs(runs: &[TextRun]) -> Option<Table> {
    let table_lines: Vec<Vec<Piece>> = lines(runs.iter().flat_map(pieces).collect())
        .into_iter()
        .filter(|line| line.len() >= 2)
        .collect();

    let widest = table_lines.iter().map(Vec::len).max()?;
    let columns = table_lines.iter().find(|l| l.len() == widest)?.clone();

    let rows = table_lines
        .into_iter()
        .map(|line| {
            let mut cells = vec![String::new(); columns.len()];
            for piece in line {
                let cell = &mut cells[column_of(&piece, &columns)];
                if !cell.is_empty() {
                    cell.push(' ');
                }
                cell.push_str(&piece.text);
            }
            cells
        })
        .collect();

    Some(Table::new(rows))
}
