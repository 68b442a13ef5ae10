//! Denylist workbooks.
//!
//! A denylist is an XLSX workbook whose first sheet lists book names and
//! whose second sheet lists author names, each under a header cell reading
//! `name`. Sheets are taken by position; any further sheets are ignored.

use crate::db::Database;
use crate::error::{AppError, Result};
use roxmltree::Document;
use std::io::{Cursor, Read};
use zip::ZipArchive;

/// Header of the column holding names in both sheets.
pub const NAME_COLUMN: &str = "name";

/// Names and authors to deny, taken verbatim from a workbook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Denylist {
    /// Book names from the first sheet.
    pub names: Vec<String>,
    /// Author names from the second sheet.
    pub authors: Vec<String>,
}

impl Denylist {
    /// Parse a denylist from raw XLSX bytes.
    pub fn from_workbook(bytes: &[u8]) -> Result<Self> {
        let workbook = Workbook::from_bytes(bytes)?;
        Self::from_sheets(&workbook)
    }

    /// Extract the two name columns from an already-parsed workbook.
    pub fn from_sheets(workbook: &Workbook) -> Result<Self> {
        let sheets = workbook.sheets();
        if sheets.len() < 2 {
            return Err(AppError::InvalidFormat(
                "file must contain at least two sheets: one for book names and one for author names"
                    .into(),
            ));
        }

        let column = |sheet: &Sheet| {
            sheet.column(NAME_COLUMN).ok_or_else(|| {
                AppError::InvalidFormat(format!(
                    "sheet '{}' has no '{}' column",
                    sheet.name, NAME_COLUMN
                ))
            })
        };

        Ok(Self {
            names: column(&sheets[0])?,
            authors: column(&sheets[1])?,
        })
    }

    /// Whether there is nothing to deny.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.authors.is_empty()
    }

    /// Mark matching books as denied. Returns the number of matched books.
    pub fn apply(&self, db: &Database) -> Result<usize> {
        let count = db.mark_denied(&self.names, &self.authors)?;
        tracing::info!(
            names = self.names.len(),
            authors = self.authors.len(),
            denied = count,
            "Applied denylist"
        );
        Ok(count)
    }
}

/// A worksheet: its name and the non-empty cells of each row.
#[derive(Debug, Clone)]
pub struct Sheet {
    /// Sheet name as shown in the workbook.
    pub name: String,
    /// Rows in document order, each as `(column index, value)` pairs.
    rows: Vec<Vec<(usize, String)>>,
}

impl Sheet {
    /// Values below the header cell equal to `header`, skipping empty cells.
    ///
    /// The first non-empty row is the header row. Returns `None` if no
    /// header cell matches.
    pub fn column(&self, header: &str) -> Option<Vec<String>> {
        let mut rows = self.rows.iter().skip_while(|row| row.is_empty());
        let header_row = rows.next()?;
        let (col, _) = header_row.iter().find(|(_, value)| value == header)?;

        Some(
            rows.filter_map(|row| {
                row.iter()
                    .find(|(c, _)| c == col)
                    .map(|(_, value)| value.clone())
            })
            .collect(),
        )
    }
}

/// The sheets of an XLSX workbook, in workbook order.
#[derive(Debug, Clone)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    /// Read a workbook from XLSX bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::parse(bytes).map_err(|e| match e {
            AppError::InvalidFormat(_) => e,
            other => AppError::InvalidFormat(format!("not a valid XLSX workbook: {}", other)),
        })
    }

    /// Sheets in workbook order.
    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    fn parse(bytes: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;

        let workbook_xml = read_part(&mut archive, "xl/workbook.xml")?;
        let rels_xml = read_part(&mut archive, "xl/_rels/workbook.xml.rels")?;
        // Workbooks holding only numbers or inline strings have no shared table.
        let shared = if archive.index_for_name("xl/sharedStrings.xml").is_some() {
            parse_shared_strings(&read_part(&mut archive, "xl/sharedStrings.xml")?)?
        } else {
            Vec::new()
        };

        let rels = parse_relationships(&rels_xml)?;
        let mut sheets = Vec::new();

        let doc = Document::parse(&workbook_xml)?;
        for node in doc.descendants().filter(|n| n.has_tag_name("sheet")) {
            let name = node.attribute("name").unwrap_or_default().to_string();
            let rel_id = node
                .attributes()
                .find(|a| a.name() == "id" && a.namespace().is_some())
                .map(|a| a.value())
                .ok_or_else(|| {
                    AppError::InvalidFormat(format!("sheet '{}' has no relationship id", name))
                })?;

            let target = rels
                .iter()
                .find(|(id, _)| id == rel_id)
                .map(|(_, target)| target.as_str())
                .ok_or_else(|| {
                    AppError::InvalidFormat(format!("sheet '{}' has no worksheet part", name))
                })?;

            let sheet_xml = read_part(&mut archive, &part_path(target))?;
            sheets.push(Sheet {
                name,
                rows: parse_rows(&sheet_xml, &shared)?,
            });
        }

        Ok(Self { sheets })
    }
}

fn read_part(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<String> {
    let mut part = archive.by_name(name)?;
    let mut content = String::new();
    part.read_to_string(&mut content)?;
    Ok(content)
}

/// Resolve a relationship target relative to `xl/`.
fn part_path(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

fn parse_relationships(xml: &str) -> Result<Vec<(String, String)>> {
    let doc = Document::parse(xml)?;
    Ok(doc
        .descendants()
        .filter(|n| n.has_tag_name("Relationship"))
        .filter_map(|n| Some((n.attribute("Id")?.to_string(), n.attribute("Target")?.to_string())))
        .collect())
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>> {
    let doc = Document::parse(xml)?;
    Ok(doc
        .descendants()
        .filter(|n| n.tag_name().name() == "si")
        .map(text_of)
        .collect())
}

/// Concatenated `<t>` runs under `node`, skipping phonetic hints.
fn text_of(node: roxmltree::Node<'_, '_>) -> String {
    node.descendants()
        .filter(|n| n.tag_name().name() == "t")
        .filter(|n| !n.ancestors().any(|a| a.tag_name().name() == "rPh"))
        .filter_map(|n| n.text())
        .collect()
}

fn parse_rows(xml: &str, shared: &[String]) -> Result<Vec<Vec<(usize, String)>>> {
    let doc = Document::parse(xml)?;
    let mut rows = Vec::new();

    for row in doc.descendants().filter(|n| n.tag_name().name() == "row") {
        let mut cells = Vec::new();
        let mut next_col = 0;

        for cell in row.children().filter(|n| n.tag_name().name() == "c") {
            let col = cell
                .attribute("r")
                .and_then(column_index)
                .unwrap_or(next_col);
            next_col = col + 1;

            if let Some(value) = cell_value(cell, shared)?
                && !value.is_empty()
            {
                cells.push((col, value));
            }
        }

        rows.push(cells);
    }

    Ok(rows)
}

fn cell_value(cell: roxmltree::Node<'_, '_>, shared: &[String]) -> Result<Option<String>> {
    let raw = cell
        .children()
        .find(|n| n.tag_name().name() == "v")
        .and_then(|v| v.text());

    let value = match cell.attribute("t") {
        Some("s") => {
            let Some(raw) = raw else { return Ok(None) };
            let index: usize = raw.trim().parse().map_err(|_| {
                AppError::InvalidFormat(format!("bad shared string index: {}", raw))
            })?;
            let text = shared.get(index).ok_or_else(|| {
                AppError::InvalidFormat(format!("shared string {} out of range", index))
            })?;
            Some(text.clone())
        }
        Some("inlineStr") => cell
            .children()
            .find(|n| n.tag_name().name() == "is")
            .map(text_of),
        Some("b") => raw.map(|r| if r.trim() == "1" { "True" } else { "False" }.to_string()),
        // Error cells (#N/A and friends) count as missing.
        Some("e") => None,
        _ => raw.map(String::from),
    };

    Ok(value)
}

/// Widest column reference a worksheet can hold (`XFD`, column 16384).
const MAX_COLUMN_LETTERS: usize = 3;

/// Zero-based column index from a cell reference such as `B12`.
///
/// Returns `None` for references without letters or wider than any real
/// worksheet column.
fn column_index(reference: &str) -> Option<usize> {
    let letters: Vec<u8> = reference
        .bytes()
        .take_while(|b| b.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() || letters.len() > MAX_COLUMN_LETTERS {
        return None;
    }

    let index = letters.iter().fold(0usize, |acc, b| {
        acc * 26 + (b.to_ascii_uppercase() - b'A' + 1) as usize
    });
    Some(index - 1)
}
