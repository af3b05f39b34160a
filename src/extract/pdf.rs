use crate::extract::layout::{table_from_runs, TextRun};
use crate::extract::table::Table;
use anyhow::{Context, Result};
use lopdf::content::Content;
use lopdf::{Document, Object};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// TJ adjustments below this (thousandths of an em) read as a word gap.
const TJ_SPACE: f32 = -200.0;

/// A source of per-page tables. `None` marks a page without a table.
pub trait PageTables {
    fn page_tables(&self) -> Result<Vec<Option<Table>>>;
}

/// Tables read from the positioned text of a PDF file.
pub struct PdfTables {
    path: PathBuf,
    doc: Document,
}

impl PdfTables {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let doc = Document::load(&path)
            .with_context(|| format!("Failed to open PDF: {}", path.display()))?;
        Ok(Self { path, doc })
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }
}

impl PageTables for PdfTables {
    fn page_tables(&self) -> Result<Vec<Option<Table>>> {
        let mut out = Vec::new();
        for (page_num, page_id) in self.doc.get_pages() {
            let content = self
                .doc
                .get_and_decode_page_content(page_id)
                .with_context(|| {
                    format!(
                        "Failed to decode page {} of {}",
                        page_num,
                        self.path.display()
                    )
                })?;
            let runs = text_runs(&content);
            let table = table_from_runs(&runs);
            trace!(
                page = page_num,
                runs = runs.len(),
                rows = table.as_ref().map_or(0, |t| t.rows.len()),
                "page scanned"
            );
            out.push(table);
        }
        debug!(path = %self.path.display(), pages = out.len(), "read PDF tables");
        Ok(out)
    }
}

/// Affine transform `[a b c d e f]` as used by `cm` and `Tm`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f32; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn from_operands(ops: &[f32]) -> Option<Self> {
        let m: [f32; 6] = ops.get(..6)?.try_into().ok()?;
        Some(Matrix(m))
    }

    fn translate(tx: f32, ty: f32) -> Self {
        Matrix([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    /// `self` applied first, then `next`.
    fn then(self, next: Matrix) -> Matrix {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = next.0;
        Matrix([
            a1 * a2 + b1 * c2,
            a1 * b2 + b1 * d2,
            c1 * a2 + d1 * c2,
            c1 * b2 + d1 * d2,
            e1 * a2 + f1 * c2 + e2,
            e1 * b2 + f1 * d2 + f2,
        ])
    }

    fn origin(&self) -> (f32, f32) {
        (self.0[4], self.0[5])
    }

    fn vertical_scale(&self) -> f32 {
        self.0[2].hypot(self.0[3])
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn numbers(operands: &[Object]) -> Vec<f32> {
    operands.iter().filter_map(number).collect()
}

/// UTF-16BE when the string carries a byte order mark, single bytes otherwise.
fn decode_string(bytes: &[u8]) -> String {
    match bytes.strip_prefix(&[0xFE, 0xFF]) {
        Some(utf16) => {
            let units = utf16
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
            char::decode_utf16(units)
                .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect()
        }
        None => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Text and graphics state needed to place shown strings on the page.
struct TextState {
    ctm: Matrix,
    saved: Vec<Matrix>,
    tm: Matrix,
    tlm: Matrix,
    leading: f32,
    font_size: f32,
    /// Set by positioning operators; a show without one continues the last run.
    moved: bool,
    runs: Vec<TextRun>,
}

impl TextState {
    fn new() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            saved: Vec::new(),
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            leading: 0.0,
            font_size: 1.0,
            moved: true,
            runs: Vec::new(),
        }
    }

    fn set_line(&mut self, m: Matrix) {
        self.tlm = m;
        self.tm = m;
        self.moved = true;
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.set_line(Matrix::translate(tx, ty).then(self.tlm));
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.leading);
    }

    fn show(&mut self, text: String) {
        if !self.moved {
            if let Some(last) = self.runs.last_mut() {
                last.text.push_str(&text);
                return;
            }
        }
        let placed = self.tm.then(self.ctm);
        let (x, y) = placed.origin();
        self.runs.push(TextRun {
            x,
            y,
            size: self.font_size * placed.vertical_scale(),
            text,
        });
        self.moved = false;
    }
}

fn shown_text(obj: &Object) -> String {
    match obj {
        Object::String(bytes, _) => decode_string(bytes),
        Object::Array(items) => {
            let mut text = String::new();
            for item in items {
                match item {
                    Object::String(bytes, _) => text.push_str(&decode_string(bytes)),
                    other => {
                        if number(other).is_some_and(|n| n < TJ_SPACE) {
                            text.push(' ');
                        }
                    }
                }
            }
            text
        }
        _ => String::new(),
    }
}

/// Every string shown on the page with its page-space origin and font size.
pub fn text_runs(content: &Content) -> Vec<TextRun> {
    let mut st = TextState::new();
    for op in &content.operations {
        let args = numbers(&op.operands);
        match op.operator.as_str() {
            "q" => st.saved.push(st.ctm),
            "Q" => st.ctm = st.saved.pop().unwrap_or(Matrix::IDENTITY),
            "cm" => {
                if let Some(m) = Matrix::from_operands(&args) {
                    st.ctm = m.then(st.ctm);
                }
            }
            "BT" => st.set_line(Matrix::IDENTITY),
            "Tf" => {
                if let Some(size) = args.first() {
                    st.font_size = *size;
                }
            }
            "TL" => {
                if let Some(l) = args.first() {
                    st.leading = *l;
                }
            }
            "Td" | "TD" => {
                if let [tx, ty] = args[..] {
                    if op.operator == "TD" {
                        st.leading = -ty;
                    }
                    st.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = Matrix::from_operands(&args) {
                    st.set_line(m);
                }
            }
            "T*" => st.next_line(),
            "Tj" | "TJ" => {
                if let Some(obj) = op.operands.first() {
                    st.show(shown_text(obj));
                }
            }
            "'" => {
                st.next_line();
                if let Some(obj) = op.operands.first() {
                    st.show(shown_text(obj));
                }
            }
            "\"" => {
                st.next_line();
                if let Some(obj) = op.operands.get(2) {
                    st.show(shown_text(obj));
                }
            }
            _ => {}
        }
    }
    st.runs
}
