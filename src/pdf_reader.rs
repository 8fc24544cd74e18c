#![cfg(not(tarpaulin_include))]

use std::collections::HashMap;

use log::debug;
use pdf::content::{Op, TextDrawAdjusted};
use pdf::file::FileOptions;
use pdf::font::ToUnicodeMap;
use pdf::object::{Resolve, Resources};
use pdf::primitive::{Name, PdfString};

use crate::error::{GradeError, GradeResult};
use crate::pdf_lines::TextFragment;

/// TJ adjustments more negative than this (thousandths of an em) read as a
/// word gap.
const WORD_GAP: f32 = -200.0;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Affine {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
}

impl Affine {
    const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Affine {
            a: a as f64,
            b: b as f64,
            c: c as f64,
            d: d as f64,
            e: e as f64,
            f: f as f64,
        }
    }

    /// `self` applied first, then `other`.
    fn then(self, other: Affine) -> Affine {
        Affine {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    fn translated(self, tx: f64, ty: f64) -> Affine {
        Affine {
            e: tx * self.a + ty * self.c + self.e,
            f: tx * self.b + ty * self.d + self.f,
            ..self
        }
    }
}

/// Text drawing state between BT and ET.
struct TextCursor {
    matrix: Affine,
    line: Affine,
    leading: f64,
}

impl TextCursor {
    fn new() -> Self {
        TextCursor {
            matrix: Affine::IDENTITY,
            line: Affine::IDENTITY,
            leading: 0.0,
        }
    }

    fn move_line(&mut self, tx: f64, ty: f64) {
        self.line = self.line.translated(tx, ty);
        self.matrix = self.line;
    }
}

/// Reads every page of a PDF into positioned text fragments.
///
/// Positions are the text origin in page space; glyph advances are not
/// tracked, so fragments drawn back to back share a position and keep their
/// drawing order.
pub fn read_pages(bytes: &[u8]) -> GradeResult<Vec<Vec<TextFragment>>> {
    let file = FileOptions::cached()
        .load(bytes.to_vec())
        .map_err(|err| GradeError::Pdf(err.to_string()))?;
    let resolver = file.resolver();

    let mut pages = Vec::new();
    for index in 0..file.num_pages() {
        let page = file
            .get_page(index)
            .map_err(|err| GradeError::Pdf(err.to_string()))?;
        let Some(content) = &page.contents else {
            pages.push(Vec::new());
            continue;
        };
        let resources = page
            .resources()
            .map_err(|err| GradeError::Pdf(err.to_string()))?;
        let ops = content
            .operations(&resolver)
            .map_err(|err| GradeError::Pdf(err.to_string()))?;
        let fragments = ops_to_fragments(&ops, &resolver, resources);
        debug!("page {}: {} text fragments", index + 1, fragments.len());
        pages.push(fragments);
    }
    Ok(pages)
}

fn ops_to_fragments(ops: &[Op], resolver: &impl Resolve, resources: &Resources) -> Vec<TextFragment> {
    let mut tounicode_cache: HashMap<Name, Option<ToUnicodeMap>> = HashMap::new();
    let mut current_font: Option<Name> = None;
    let mut ctm = Affine::IDENTITY;
    let mut ctm_stack: Vec<Affine> = Vec::new();
    let mut cursor = TextCursor::new();
    let mut fragments = Vec::new();

    let mut emit = |text: String, cursor: &TextCursor, ctm: Affine| {
        let text = sanitize_extracted_text(&text);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }
        let origin = cursor.matrix.then(ctm);
        if !origin.e.is_finite() || !origin.f.is_finite() {
            debug!("dropping {:?} drawn at a non-finite position", trimmed);
            return;
        }
        fragments.push(TextFragment::new(origin.e, origin.f, trimmed));
    };

    for op in ops {
        match op {
            Op::Save => ctm_stack.push(ctm),
            Op::Restore => {
                if let Some(saved) = ctm_stack.pop() {
                    ctm = saved;
                }
            }
            Op::Transform { matrix } => {
                let m = Affine::new(matrix.a, matrix.b, matrix.c, matrix.d, matrix.e, matrix.f);
                ctm = m.then(ctm);
            }
            Op::BeginText => cursor = TextCursor::new(),
            Op::SetTextMatrix { matrix } => {
                cursor.line = Affine::new(matrix.a, matrix.b, matrix.c, matrix.d, matrix.e, matrix.f);
                cursor.matrix = cursor.line;
            }
            Op::MoveTextPosition { translation } => {
                cursor.move_line(translation.x as f64, translation.y as f64);
            }
            Op::Leading { leading } => cursor.leading = *leading as f64,
            Op::TextNewline => {
                let leading = cursor.leading;
                cursor.move_line(0.0, -leading);
            }
            Op::TextFont { name, .. } => current_font = Some(name.clone()),
            Op::TextDraw { text } => {
                let s = decode_pdf_string(
                    text,
                    current_font.as_ref(),
                    resolver,
                    resources,
                    &mut tounicode_cache,
                );
                emit(s, &cursor, ctm);
            }
            Op::TextDrawAdjusted { array } => {
                let mut joined = String::new();
                for item in array {
                    match item {
                        TextDrawAdjusted::Text(text) => {
                            joined.push_str(&decode_pdf_string(
                                text,
                                current_font.as_ref(),
                                resolver,
                                resources,
                                &mut tounicode_cache,
                            ));
                        }
                        TextDrawAdjusted::Spacing(gap) => {
                            if *gap < WORD_GAP {
                                joined.push(' ');
                            }
                        }
                    }
                }
                emit(joined, &cursor, ctm);
            }
            _ => {}
        }
    }

    fragments
}

fn decode_pdf_string(
    text: &PdfString,
    font_name: Option<&Name>,
    resolver: &impl Resolve,
    resources: &Resources,
    tounicode_cache: &mut HashMap<Name, Option<ToUnicodeMap>>,
) -> String {
    let Some(font_name) = font_name else {
        return text.to_string_lossy();
    };

    let map = tounicode_for_font(font_name, resolver, resources, tounicode_cache);
    let Some(map) = map else {
        return text.to_string_lossy();
    };

    decode_with_tounicode(text.as_bytes(), map).unwrap_or_else(|| text.to_string_lossy())
}

fn tounicode_for_font<'a>(
    font_name: &Name,
    resolver: &impl Resolve,
    resources: &Resources,
    cache: &'a mut HashMap<Name, Option<ToUnicodeMap>>,
) -> Option<&'a ToUnicodeMap> {
    if !cache.contains_key(font_name) {
        let map = resources
            .fonts
            .get(font_name)
            .and_then(|lazy| lazy.load(resolver).ok())
            .and_then(|font| font.to_unicode(resolver))
            .and_then(|res| res.ok());
        cache.insert(font_name.clone(), map);
    }
    cache.get(font_name).and_then(|opt| opt.as_ref())
}

/// Tries one- and two-byte codes and keeps whichever maps more of the string.
fn decode_with_tounicode(bytes: &[u8], map: &ToUnicodeMap) -> Option<String> {
    let mut best = decode_bytes(bytes, 1, |code| map.get(code));
    if bytes.len() % 2 == 0 {
        let wide = decode_bytes(bytes, 2, |code| map.get(code));
        if wide.matched > best.matched
            || (wide.matched == best.matched && wide.text.len() > best.text.len())
        {
            best = wide;
        }
    }

    if best.total == 0 || best.matched * 20 < best.total {
        return None;
    }
    Some(best.text)
}

struct Decoded {
    text: String,
    matched: usize,
    total: usize,
}

fn decode_bytes<'m>(bytes: &[u8], width: usize, lookup: impl Fn(u16) -> Option<&'m str>) -> Decoded {
    let mut decoded = Decoded {
        text: String::new(),
        matched: 0,
        total: 0,
    };
    let codes: Vec<u16> = match width {
        1 => bytes.iter().map(|&b| b as u16).collect(),
        _ => bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect(),
    };
    for code in codes {
        decoded.total += 1;
        match lookup(code) {
            Some(s) => {
                decoded.text.push_str(s);
                decoded.matched += 1;
            }
            None => decoded.text.push('\u{FFFD}'),
        }
    }
    decoded
}

fn sanitize_extracted_text(s: &str) -> String {
    s.chars()
        .filter(|&ch| ch != '\u{FFFD}')
        .filter(|&ch| !ch.is_control() || ch == '\t' || ch == '\n')
        .filter(|&ch| !(0xE000..=0xF8FF).contains(&(ch as u32)))
        .collect()
}
