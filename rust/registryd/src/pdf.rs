use anyhow::Context;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::report::{text_width_mm, Align, LayoutOp, ReportDocument, Rgb, PAGE_HEIGHT, PAGE_WIDTH};

const MM_TO_PT: f32 = 72.0 / 25.4;
const LINE_WIDTH_MM: f32 = 0.5;
/// Control-point offset for approximating a quarter circle with a cubic.
const KAPPA: f32 = 0.552_284_8;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub path: PathBuf,
    pub pages: usize,
    pub bytes: u64,
    pub sha256: String,
}

pub fn render(report: &ReportDocument) -> anyhow::Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular,
            "F2" => bold,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(report.pages.len());
    for page in &report.pages {
        let mut ops = Vec::new();
        for op in &page.ops {
            push_op(&mut ops, op);
        }
        let content = Content { operations: ops };
        let encoded = content.encode().context("failed to encode page content")?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_count,
        "Resources" => resources_id,
        "MediaBox" => vec![
            0.into(),
            0.into(),
            (PAGE_WIDTH * MM_TO_PT).into(),
            (PAGE_HEIGHT * MM_TO_PT).into(),
        ],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::String(win_ansi(&report.title), StringFormat::Literal),
        "Producer" => Object::string_literal(concat!("registryd ", env!("CARGO_PKG_VERSION"))),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out).context("failed to serialize PDF")?;
    Ok(out)
}

/// Renders and writes the report. The file appears only once fully written.
pub fn write_report(report: &ReportDocument, out_path: &Path) -> anyhow::Result<ExportSummary> {
    let bytes = render(report)?;

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    let mut tmp = out_path.as_os_str().to_owned();
    tmp.push(".part");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, &bytes)
        .with_context(|| format!("failed to write {}", tmp.to_string_lossy()))?;
    if let Err(e) = std::fs::rename(&tmp, out_path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e).with_context(|| {
            format!(
                "failed to move report into place at {}",
                out_path.to_string_lossy()
            )
        });
    }

    let sha256 = format!("{:x}", Sha256::digest(&bytes));
    Ok(ExportSummary {
        path: out_path.to_path_buf(),
        pages: report.pages.len(),
        bytes: bytes.len() as u64,
        sha256,
    })
}

fn pt(mm: f32) -> Object {
    (mm * MM_TO_PT).into()
}

/// Layout y runs down from the top edge; PDF y runs up from the bottom.
fn flip_y(y_mm: f32) -> f32 {
    PAGE_HEIGHT - y_mm
}

fn color_operands(c: Rgb) -> Vec<Object> {
    [c.0, c.1, c.2]
        .into_iter()
        .map(|v| (v as f32 / 255.0).into())
        .collect()
}

fn push_op(ops: &mut Vec<Operation>, op: &LayoutOp) {
    match op {
        LayoutOp::Text {
            x,
            y,
            size,
            color,
            bold,
            align,
            text,
        } => {
            let x = match align {
                Align::Left => *x,
                Align::Center => x - text_width_mm(text, *size) / 2.0,
            };
            let font = if *bold { "F2" } else { "F1" };
            ops.push(Operation::new("BT", vec![]));
            ops.push(Operation::new("Tf", vec![font.into(), (*size).into()]));
            ops.push(Operation::new("rg", color_operands(*color)));
            ops.push(Operation::new("Td", vec![pt(x), pt(flip_y(*y))]));
            ops.push(Operation::new(
                "Tj",
                vec![Object::String(win_ansi(text), StringFormat::Literal)],
            ));
            ops.push(Operation::new("ET", vec![]));
        }
        LayoutOp::FillRect { x, y, w, h, fill } => {
            ops.push(Operation::new("rg", color_operands(*fill)));
            ops.push(Operation::new(
                "re",
                vec![pt(*x), pt(flip_y(y + h)), pt(*w), pt(*h)],
            ));
            ops.push(Operation::new("f", vec![]));
        }
        LayoutOp::RoundedRect {
            x,
            y,
            w,
            h,
            radius,
            stroke,
            fill,
        } => {
            ops.push(Operation::new("w", vec![pt(LINE_WIDTH_MM)]));
            ops.push(Operation::new("RG", color_operands(*stroke)));
            if let Some(fill) = fill {
                ops.push(Operation::new("rg", color_operands(*fill)));
            }
            rounded_rect_path(ops, *x, *y, *w, *h, *radius);
            let paint = if fill.is_some() { "B" } else { "S" };
            ops.push(Operation::new(paint, vec![]));
        }
    }
}

fn rounded_rect_path(ops: &mut Vec<Operation>, x: f32, y: f32, w: f32, h: f32, r: f32) {
    let r = r.min(w / 2.0).min(h / 2.0);
    let k = r * KAPPA;
    let (left, right) = (x, x + w);
    let (top, bottom) = (flip_y(y), flip_y(y + h));

    let mv = |ops: &mut Vec<Operation>, op: &str, pts: &[f32]| {
        ops.push(Operation::new(op, pts.iter().map(|v| pt(*v)).collect()));
    };

    mv(ops, "m", &[left + r, top]);
    mv(ops, "l", &[right - r, top]);
    mv(ops, "c", &[right - r + k, top, right, top - r + k, right, top - r]);
    mv(ops, "l", &[right, bottom + r]);
    mv(ops, "c", &[right, bottom + r - k, right - r + k, bottom, right - r, bottom]);
    mv(ops, "l", &[left + r, bottom]);
    mv(ops, "c", &[left + r - k, bottom, left, bottom + r - k, left, bottom + r]);
    mv(ops, "l", &[left, top - r]);
    mv(ops, "c", &[left, top - r + k, left + r - k, top, left + r, top]);
    ops.push(Operation::new("h", vec![]));
}

/// Standard-font text is WinAnsi; Latin-1 maps straight through, the rest
/// becomes `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}
