//! Report Compositor.
//!
//! Lays a filtered record list out as pages of drawing operations: title and
//! filter summary, the summary table, then a boxed detail section placed in
//! fixed batches per page, and finally a footer on every page. Geometry is in
//! millimetres on an A4 page with the origin at the top-left corner; turning
//! it into PDF bytes is `pdf`'s job.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::filter::{FilterCriteria, FilterField, Filterable, MatchPolicy};
use crate::model::{School, Student};

pub const PAGE_WIDTH: f32 = 210.0;
pub const PAGE_HEIGHT: f32 = 297.0;
pub const DETAILS_PER_PAGE: usize = 3;

const MARGIN_LEFT: f32 = 14.0;
const TABLE_TOP: f32 = 30.0;
const TABLE_BOTTOM: f32 = 275.0;
const ROW_HEIGHT: f32 = 8.0;
const DETAIL_TOP: f32 = 30.0;
const DETAIL_STEP: f32 = 70.0;
const DETAIL_BOX_HEIGHT: f32 = 60.0;
const FOOTER_FROM_BOTTOM: f32 = 10.0;
const DETAIL_TEXT_SIZE: f32 = 10.0;
/// Room for the guardian column, from its left edge to the box's right edge.
const GUARDIAN_WIDTH_MM: f32 = 50.0;
/// Average Helvetica glyph width as a fraction of the font size.
const AVG_GLYPH_EM: f32 = 0.5;
const PT_TO_MM: f32 = 0.352_778;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

pub const ACCENT: Rgb = Rgb(0, 102, 204);
pub const MUTED: Rgb = Rgb(100, 100, 100);
pub const INK: Rgb = Rgb(0, 0, 0);
pub const WHITE: Rgb = Rgb(255, 255, 255);
const HEADER_FILL: Rgb = Rgb(51, 122, 183);
const STRIPE_FILL: Rgb = Rgb(240, 240, 240);
const PHOTO_STROKE: Rgb = Rgb(200, 200, 200);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Align {
    Left,
    Center,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum LayoutOp {
    Text {
        x: f32,
        y: f32,
        size: f32,
        color: Rgb,
        bold: bool,
        align: Align,
        text: String,
    },
    RoundedRect {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        radius: f32,
        stroke: Rgb,
        fill: Option<Rgb>,
    },
    FillRect {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        fill: Rgb,
    },
}

impl LayoutOp {
    fn text(x: f32, y: f32, size: f32, color: Rgb, text: impl Into<String>) -> Self {
        LayoutOp::Text {
            x,
            y,
            size,
            color,
            bold: false,
            align: Align::Left,
            text: text.into(),
        }
    }

    fn bold_text(x: f32, y: f32, size: f32, color: Rgb, text: impl Into<String>) -> Self {
        LayoutOp::Text {
            x,
            y,
            size,
            color,
            bold: true,
            align: Align::Left,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Page {
    pub ops: Vec<LayoutOp>,
}

impl Page {
    fn push(&mut self, op: LayoutOp) {
        self.ops.push(op);
    }

    #[cfg(test)]
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            LayoutOp::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDocument {
    pub kind: ReportKind,
    pub title: String,
    pub file_name: &'static str,
    pub record_count: usize,
    pub table_pages: usize,
    pub detail_pages: usize,
    pub pages: Vec<Page>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReportError {
    /// Nothing to export; the message is meant for the user.
    #[error("{message}")]
    Empty { kind: ReportKind, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Locale {
    #[default]
    Es,
    En,
}

impl Locale {
    pub fn parse(raw: &str) -> Option<Locale> {
        let lower = raw.trim().to_ascii_lowercase();
        match lower.split(['-', '_']).next() {
            Some("es") => Some(Locale::Es),
            Some("en") => Some(Locale::En),
            _ => None,
        }
    }

    pub fn labels(self) -> &'static Labels {
        match self {
            Locale::Es => &ES,
            Locale::En => &EN,
        }
    }

    pub fn format_date(self, date: NaiveDate) -> String {
        match self {
            Locale::Es => date.format("%-d/%-m/%Y").to_string(),
            Locale::En => date.format("%-m/%-d/%Y").to_string(),
        }
    }

    pub fn page_footer(self, page: usize, total: usize) -> String {
        match self {
            Locale::Es => format!("Página {page} de {total}"),
            Locale::En => format!("Page {page} of {total}"),
        }
    }
}

pub struct Labels {
    pub schools_title: &'static str,
    pub students_title: &'static str,
    pub schools_details: &'static str,
    pub students_details: &'static str,
    pub schools_empty: &'static str,
    pub students_empty: &'static str,
    pub filters_applied: &'static str,
    pub no_filters: &'static str,
    pub generated_on: &'static str,
    pub name: &'static str,
    pub full_name: &'static str,
    pub address: &'static str,
    pub email: &'static str,
    pub phone: &'static str,
    pub school: &'static str,
    pub guardians: &'static str,
    pub photo: &'static str,
    pub school_photo: &'static str,
    pub yes: &'static str,
    pub no: &'static str,
    pub not_available: &'static str,
    pub no_guardians: &'static str,
}

impl Labels {
    fn field(&self, field: FilterField) -> &'static str {
        match field {
            FilterField::Name => self.name,
            FilterField::Address => self.address,
            FilterField::Email => self.email,
        }
    }
}

static ES: Labels = Labels {
    schools_title: "Reporte de Escuelas",
    students_title: "Reporte de Estudiantes",
    schools_details: "Detalles de las Escuelas",
    students_details: "Detalles de los Estudiantes",
    schools_empty: "No hay escuelas que cumplan con los filtros seleccionados",
    students_empty: "No hay estudiantes que cumplan con los filtros seleccionados",
    filters_applied: "Filtros aplicados",
    no_filters: "Ninguno",
    generated_on: "Fecha de generación",
    name: "Nombre",
    full_name: "Nombre Completo",
    address: "Dirección",
    email: "Email",
    phone: "Teléfono",
    school: "Escuela",
    guardians: "Encargados",
    photo: "Foto",
    school_photo: "Foto de la escuela",
    yes: "Sí",
    no: "No",
    not_available: "N/A",
    no_guardians: "Sin encargados",
};

static EN: Labels = Labels {
    schools_title: "Schools Report",
    students_title: "Students Report",
    schools_details: "School Details",
    students_details: "Student Details",
    schools_empty: "No schools match the selected filters",
    students_empty: "No students match the selected filters",
    filters_applied: "Applied filters",
    no_filters: "None",
    generated_on: "Generated on",
    name: "Name",
    full_name: "Full Name",
    address: "Address",
    email: "Email",
    phone: "Phone",
    school: "School",
    guardians: "Guardians",
    photo: "Photo",
    school_photo: "School photo",
    yes: "Yes",
    no: "No",
    not_available: "N/A",
    no_guardians: "no guardians",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReportKind {
    Schools,
    Students,
}

impl ReportKind {
    pub fn parse(raw: &str) -> Option<ReportKind> {
        match raw.trim() {
            "schools" | "school" => Some(ReportKind::Schools),
            "students" | "student" => Some(ReportKind::Students),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReportKind::Schools => "schools",
            ReportKind::Students => "students",
        }
    }

    /// Schools are picked from dropdowns, students typed as free text.
    pub fn policy(self) -> MatchPolicy {
        match self {
            ReportKind::Schools => MatchPolicy::Exact,
            ReportKind::Students => MatchPolicy::Substring,
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            ReportKind::Schools => "reporte_escuelas.pdf",
            ReportKind::Students => "reporte_estudiantes.pdf",
        }
    }

    fn title(self, l: &Labels) -> &'static str {
        match self {
            ReportKind::Schools => l.schools_title,
            ReportKind::Students => l.students_title,
        }
    }

    fn details_title(self, l: &Labels) -> &'static str {
        match self {
            ReportKind::Schools => l.schools_details,
            ReportKind::Students => l.students_details,
        }
    }

    pub fn empty_message(self, locale: Locale) -> &'static str {
        let l = locale.labels();
        match self {
            ReportKind::Schools => l.schools_empty,
            ReportKind::Students => l.students_empty,
        }
    }
}

/// One column of the summary table.
pub struct Column {
    pub header: &'static str,
    pub width: f32,
}

/// A positioned line inside a record's detail box. `dx` is measured from the
/// left margin, `dy` from the box's header baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailCell {
    pub dx: f32,
    pub dy: f32,
    pub text: String,
}

pub trait ReportRecord: Filterable {
    const KIND: ReportKind;

    fn columns(labels: &Labels) -> Vec<Column>;
    fn summary_row(&self, labels: &Labels) -> Vec<String>;
    fn detail_header(&self) -> String;
    fn detail_cells(&self, labels: &Labels) -> Vec<DetailCell>;

    /// Caption for a photo placeholder drawn inside the detail box.
    fn photo_caption(&self, _labels: &Labels) -> Option<&'static str> {
        None
    }
}

fn or_na<'a>(v: Option<&'a str>, labels: &'a Labels) -> &'a str {
    match v {
        Some(s) if !s.is_empty() => s,
        _ => labels.not_available,
    }
}

impl ReportRecord for School {
    const KIND: ReportKind = ReportKind::Schools;

    fn columns(l: &Labels) -> Vec<Column> {
        vec![
            Column { header: "ID", width: 15.0 },
            Column { header: l.name, width: 50.0 },
            Column { header: l.address, width: 55.0 },
            Column { header: l.email, width: 47.0 },
            Column { header: l.photo, width: 15.0 },
        ]
    }

    fn summary_row(&self, l: &Labels) -> Vec<String> {
        let has_photo = self.photo.as_deref().is_some_and(|p| !p.trim().is_empty());
        vec![
            self.id.clone(),
            self.name.clone().unwrap_or_default(),
            self.address.clone().unwrap_or_default(),
            self.email.clone().unwrap_or_default(),
            (if has_photo { l.yes } else { l.no }).to_string(),
        ]
    }

    fn detail_header(&self) -> String {
        format!("{} (ID: {})", self.name.as_deref().unwrap_or_default(), self.id)
    }

    fn detail_cells(&self, l: &Labels) -> Vec<DetailCell> {
        vec![
            DetailCell {
                dx: 0.0,
                dy: 10.0,
                text: format!("{}: {}", l.address, or_na(self.address.as_deref(), l)),
            },
            DetailCell {
                dx: 0.0,
                dy: 20.0,
                text: format!("{}: {}", l.email, or_na(self.email.as_deref(), l)),
            },
        ]
    }

    fn photo_caption(&self, l: &Labels) -> Option<&'static str> {
        self.photo
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(|_| l.school_photo)
    }
}

impl ReportRecord for Student {
    const KIND: ReportKind = ReportKind::Students;

    fn columns(l: &Labels) -> Vec<Column> {
        vec![
            Column { header: "ID", width: 15.0 },
            Column { header: l.full_name, width: 50.0 },
            Column { header: l.email, width: 52.0 },
            Column { header: l.guardians, width: 65.0 },
        ]
    }

    fn summary_row(&self, l: &Labels) -> Vec<String> {
        vec![
            self.id.clone(),
            self.full_name.clone().unwrap_or_default(),
            self.email.clone().unwrap_or_default(),
            self.guardians_text()
                .unwrap_or_else(|| l.no_guardians.to_string()),
        ]
    }

    fn detail_header(&self) -> String {
        format!(
            "{} (ID: {})",
            self.full_name.as_deref().unwrap_or_default(),
            self.id
        )
    }

    fn detail_cells(&self, l: &Labels) -> Vec<DetailCell> {
        let mut cells = vec![
            DetailCell {
                dx: 0.0,
                dy: 10.0,
                text: format!("{}: {}", l.address, or_na(self.address.as_deref(), l)),
            },
            DetailCell {
                dx: 0.0,
                dy: 20.0,
                text: format!("{}: {}", l.email, or_na(self.email.as_deref(), l)),
            },
            DetailCell {
                dx: 66.0,
                dy: 10.0,
                text: format!("{}: {}", l.phone, or_na(self.phone.as_deref(), l)),
            },
            DetailCell {
                dx: 66.0,
                dy: 20.0,
                text: format!("{}: {}", l.school, or_na(self.school_name.as_deref(), l)),
            },
            DetailCell {
                dx: 136.0,
                dy: 10.0,
                text: format!("{}:", l.guardians),
            },
        ];
        let guardians = self
            .guardians_text()
            .unwrap_or_else(|| l.no_guardians.to_string());
        for (i, line) in wrap_text(&guardians, guardian_wrap_chars()).into_iter().enumerate() {
            cells.push(DetailCell {
                dx: 136.0,
                dy: 20.0 + 5.0 * i as f32,
                text: line,
            });
        }
        cells
    }
}

/// Page-break cursor for the detail section: records go onto pages in fixed
/// batches, independent of how much room each record takes.
#[derive(Debug, Clone, Copy)]
pub struct BatchPager {
    batch: usize,
    placed: usize,
}

impl BatchPager {
    pub fn new(batch: usize) -> Self {
        Self {
            batch: batch.max(1),
            placed: 0,
        }
    }

    /// Call before placing each record; true means start a new page first.
    pub fn break_before_next(&mut self) -> bool {
        let brk = self.placed > 0 && self.placed % self.batch == 0;
        self.placed += 1;
        brk
    }
}

/// Indices of the records preceded by a page break.
#[cfg(test)]
pub fn detail_page_breaks(records: usize, batch: usize) -> Vec<usize> {
    let mut pager = BatchPager::new(batch);
    (0..records).filter(|_| pager.break_before_next()).collect()
}

/// Builds the document for `records`, which must already be filtered by
/// `criteria`. An empty list is refused without producing anything.
pub fn compose<R: ReportRecord>(
    records: &[&R],
    criteria: &FilterCriteria,
    locale: Locale,
    generated_on: NaiveDate,
) -> Result<ReportDocument, ReportError> {
    let kind = R::KIND;
    if records.is_empty() {
        return Err(ReportError::Empty {
            kind,
            message: kind.empty_message(locale).to_string(),
        });
    }
    let l = locale.labels();

    let mut pages: Vec<Page> = Vec::new();
    let mut page = Page::default();

    // Title and filter summary.
    page.push(LayoutOp::Text {
        x: PAGE_WIDTH / 2.0,
        y: 15.0,
        size: 18.0,
        color: ACCENT,
        bold: true,
        align: Align::Center,
        text: kind.title(l).to_string(),
    });
    page.push(LayoutOp::text(
        MARGIN_LEFT,
        22.0,
        10.0,
        MUTED,
        filter_summary(criteria, locale),
    ));
    page.push(LayoutOp::text(
        PAGE_WIDTH - 60.0,
        22.0,
        10.0,
        MUTED,
        format!("{}: {}", l.generated_on, locale.format_date(generated_on)),
    ));

    // Summary table, header repeated on every table page.
    let columns = R::columns(l);
    let rows_per_page = (((TABLE_BOTTOM - TABLE_TOP) / ROW_HEIGHT) as usize).saturating_sub(1).max(1);
    let mut table_pages = 1;
    let mut y = table_header(&mut page, &columns);
    for (i, rec) in records.iter().enumerate() {
        if i > 0 && i % rows_per_page == 0 {
            pages.push(std::mem::take(&mut page));
            table_pages += 1;
            y = table_header(&mut page, &columns);
        }
        if i % 2 == 1 {
            page.push(LayoutOp::FillRect {
                x: MARGIN_LEFT,
                y,
                w: table_width(&columns),
                h: ROW_HEIGHT,
                fill: STRIPE_FILL,
            });
        }
        let mut x = MARGIN_LEFT;
        for (col, cell) in columns.iter().zip(rec.summary_row(l)) {
            page.push(LayoutOp::text(
                x + 1.5,
                y + ROW_HEIGHT - 2.5,
                9.0,
                INK,
                clip_to_width(&cell, col.width - 3.0, 9.0),
            ));
            x += col.width;
        }
        y += ROW_HEIGHT;
    }
    pages.push(std::mem::take(&mut page));

    // Detail section always starts on a fresh page.
    page.push(LayoutOp::bold_text(
        MARGIN_LEFT,
        15.0,
        14.0,
        ACCENT,
        kind.details_title(l),
    ));
    let mut detail_pages = 1;
    let mut pager = BatchPager::new(DETAILS_PER_PAGE);
    let mut y = DETAIL_TOP;
    for rec in records {
        if pager.break_before_next() {
            pages.push(std::mem::take(&mut page));
            detail_pages += 1;
            y = DETAIL_TOP;
        }
        detail_box(&mut page, *rec, l, y);
        y += DETAIL_STEP;
    }
    pages.push(page);

    // Footers go on last, once the page count is known.
    let total = pages.len();
    for (i, p) in pages.iter_mut().enumerate() {
        p.push(LayoutOp::text(
            MARGIN_LEFT,
            PAGE_HEIGHT - FOOTER_FROM_BOTTOM,
            10.0,
            MUTED,
            locale.page_footer(i + 1, total),
        ));
    }

    tracing::debug!(
        kind = kind.as_str(),
        records = records.len(),
        table_pages,
        detail_pages,
        "report composed"
    );

    Ok(ReportDocument {
        kind,
        title: kind.title(l).to_string(),
        file_name: kind.file_name(),
        record_count: records.len(),
        table_pages,
        detail_pages,
        pages,
    })
}

/// `"<prefix>: Field: value, Field: value"`, or the "none" label.
pub fn filter_summary(criteria: &FilterCriteria, locale: Locale) -> String {
    let l = locale.labels();
    let parts: Vec<String> = criteria
        .active()
        .map(|(f, v)| format!("{}: {}", l.field(f), v))
        .collect();
    let body = if parts.is_empty() {
        l.no_filters.to_string()
    } else {
        parts.join(", ")
    };
    format!("{}: {}", l.filters_applied, body)
}

fn table_width(columns: &[Column]) -> f32 {
    columns.iter().map(|c| c.width).sum()
}

/// Draws the header row at the top of a table page; returns the y of the
/// first body row.
fn table_header(page: &mut Page, columns: &[Column]) -> f32 {
    page.push(LayoutOp::FillRect {
        x: MARGIN_LEFT,
        y: TABLE_TOP,
        w: table_width(columns),
        h: ROW_HEIGHT,
        fill: HEADER_FILL,
    });
    let mut x = MARGIN_LEFT;
    for col in columns {
        page.push(LayoutOp::bold_text(
            x + 1.5,
            TABLE_TOP + ROW_HEIGHT - 2.5,
            11.0,
            WHITE,
            col.header,
        ));
        x += col.width;
    }
    TABLE_TOP + ROW_HEIGHT
}

fn detail_box<R: ReportRecord>(page: &mut Page, rec: &R, l: &Labels, y: f32) {
    page.push(LayoutOp::RoundedRect {
        x: 10.0,
        y: y - 15.0,
        w: PAGE_WIDTH - 20.0,
        h: DETAIL_BOX_HEIGHT,
        radius: 3.0,
        stroke: ACCENT,
        fill: None,
    });
    page.push(LayoutOp::bold_text(MARGIN_LEFT, y, 12.0, ACCENT, rec.detail_header()));
    for cell in rec.detail_cells(l) {
        page.push(LayoutOp::text(
            MARGIN_LEFT + cell.dx,
            y + cell.dy,
            DETAIL_TEXT_SIZE,
            INK,
            cell.text,
        ));
    }
    if let Some(caption) = rec.photo_caption(l) {
        let px = PAGE_WIDTH - 70.0;
        let py = y - 10.0;
        page.push(LayoutOp::RoundedRect {
            x: px,
            y: py,
            w: 50.0,
            h: 50.0,
            radius: 3.0,
            stroke: PHOTO_STROKE,
            fill: Some(STRIPE_FILL),
        });
        page.push(LayoutOp::Text {
            x: px + 25.0,
            y: py + 25.0,
            size: 8.0,
            color: MUTED,
            bold: false,
            align: Align::Center,
            text: caption.to_string(),
        });
    }
}

/// Approximate rendered width in millimetres for Helvetica at `size` points.
pub fn text_width_mm(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * AVG_GLYPH_EM * PT_TO_MM
}

/// Characters of detail text that fit the guardian column.
fn guardian_wrap_chars() -> usize {
    (GUARDIAN_WIDTH_MM / text_width_mm("m", DETAIL_TEXT_SIZE)) as usize
}

fn clip_to_width(text: &str, width_mm: f32, size: f32) -> String {
    if text_width_mm(text, size) <= width_mm {
        return text.to_string();
    }
    let max_chars = (width_mm / (size * AVG_GLYPH_EM * PT_TO_MM)) as usize;
    let keep = max_chars.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Greedy word wrap at `budget` characters; words longer than the budget
/// are split.
pub fn wrap_text(text: &str, budget: usize) -> Vec<String> {
    let budget = budget.max(1);
    if text.chars().count() <= budget {
        return vec![text.to_string()];
    }
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        loop {
            let line_len = line.chars().count();
            let needed = if line.is_empty() { word.len() } else { line_len + 1 + word.len() };
            if needed <= budget {
                if !line.is_empty() {
                    line.push(' ');
                }
                line.extend(word.iter());
                break;
            }
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
                continue;
            }
            let rest = word.split_off(budget);
            lines.push(word.iter().collect());
            word = rest;
            if word.is_empty() {
                break;
            }
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}
