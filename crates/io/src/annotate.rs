//! In-place fill annotator: rewrites `xl/styles.xml` and the report
//! worksheet inside the workbook archive, leaving every other part
//! byte-identical.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use zip::ZipArchive;

use bomcheck_recon::model::{CellFill, Verdict};

use crate::error::WorkbookError;

/// Solid-fill colors written for each verdict.
pub const PASS_ARGB: &str = "FF00FF00";
pub const FAIL_ARGB: &str = "FFFF0000";

// =============================================================================
// Entry point
// =============================================================================

/// Apply verdict fills to the named sheet of the workbook at `path`.
///
/// The archive is rebuilt through a temp file next to the original and
/// renamed over it; on any failure the original workbook is untouched.
pub fn apply_fills(
    path: &Path,
    sheet_name: &str,
    fills: &[CellFill],
) -> Result<(), WorkbookError> {
    if fills.is_empty() {
        return Ok(());
    }

    let bytes = fs::read(path).map_err(|e| WorkbookError::Open {
        path: path.display().to_string(),
        detail: e.to_string(),
    })?;
    let mut parts = read_parts(&bytes)?;

    let ws_part = resolve_worksheet_part(&parts, sheet_name)?;
    let ws_xml = parts
        .get(&ws_part)
        .ok_or_else(|| WorkbookError::MissingPart(ws_part.clone()))?;

    // Current style id of every target cell; cells with no XML presence
    // style as 0, the workbook default.
    let targets: BTreeSet<(u32, u32)> = fills.iter().map(|f| (f.row, f.col)).collect();
    let current = scan_cell_styles(ws_xml, &targets)?;
    let style_of = |row: u32, col: u32| current.get(&(row, col)).copied().unwrap_or(0);

    let needed: BTreeSet<(u32, Verdict)> = fills
        .iter()
        .map(|f| (style_of(f.row, f.col), f.verdict))
        .collect();

    let styles_xml = parts
        .get("xl/styles.xml")
        .ok_or_else(|| WorkbookError::MissingPart("xl/styles.xml".to_string()))?;
    let (patched_styles, style_map) = patch_styles(styles_xml, &needed)?;

    let mut restyle: BTreeMap<(u32, u32), u32> = BTreeMap::new();
    for fill in fills {
        if let Some(&new_id) = style_map.get(&(style_of(fill.row, fill.col), fill.verdict)) {
            restyle.insert((fill.row, fill.col), new_id);
        }
    }
    let patched_ws = patch_worksheet(ws_xml, &restyle)?;

    parts.insert("xl/styles.xml".to_string(), patched_styles);
    parts.insert(ws_part, patched_ws);

    let out = write_archive(&parts)?;

    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "workbook.xlsx".into());
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    fs::write(&tmp, &out).map_err(|e| WorkbookError::Save {
        path: tmp.display().to_string(),
        detail: e.to_string(),
    })?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(WorkbookError::Save {
            path: path.display().to_string(),
            detail: e.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Archive handling
// =============================================================================

fn read_parts(bytes: &[u8]) -> Result<BTreeMap<String, Vec<u8>>, WorkbookError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut parts = BTreeMap::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if !file.is_file() {
            continue;
        }
        let name = file.name().to_string();
        let mut buf = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut buf)?;
        parts.insert(name, buf);
    }
    Ok(parts)
}

fn write_archive(parts: &BTreeMap<String, Vec<u8>>) -> Result<Vec<u8>, WorkbookError> {
    let cursor = Cursor::new(Vec::new());
    let mut zip = zip::ZipWriter::new(cursor);
    let options = zip::write::FileOptions::<()>::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for (name, bytes) in parts {
        zip.start_file(name.as_str(), options)?;
        zip.write_all(bytes)?;
    }
    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

/// Resolve a sheet name to its worksheet part path through
/// `xl/workbook.xml` (name -> r:id) and the workbook rels (r:id -> target).
fn resolve_worksheet_part(
    parts: &BTreeMap<String, Vec<u8>>,
    sheet_name: &str,
) -> Result<String, WorkbookError> {
    let workbook_xml = parts
        .get("xl/workbook.xml")
        .ok_or_else(|| WorkbookError::MissingPart("xl/workbook.xml".to_string()))?;
    let rels_xml = parts
        .get("xl/_rels/workbook.xml.rels")
        .ok_or_else(|| WorkbookError::MissingPart("xl/_rels/workbook.xml.rels".to_string()))?;

    let mut rid = None;
    let mut reader = Reader::from_reader(workbook_xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Empty(ref e) | Event::Start(ref e)
                if local_name(e.name().as_ref()) == b"sheet" =>
            {
                let mut name = None;
                let mut id = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"name" => {
                            name = Some(unescape_xml(&String::from_utf8_lossy(&attr.value)));
                        }
                        b"r:id" => {
                            id = Some(String::from_utf8_lossy(&attr.value).to_string());
                        }
                        _ => {}
                    }
                }
                if name.as_deref() == Some(sheet_name) {
                    rid = id;
                    break;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    let rid = rid.ok_or_else(|| {
        WorkbookError::Invalid(format!("sheet '{sheet_name}' not present in xl/workbook.xml"))
    })?;

    let mut target = None;
    let mut reader = Reader::from_reader(rels_xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Empty(ref e) | Event::Start(ref e)
                if local_name(e.name().as_ref()) == b"Relationship" =>
            {
                let mut id = None;
                let mut tgt = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => id = Some(String::from_utf8_lossy(&attr.value).to_string()),
                        b"Target" => {
                            tgt = Some(String::from_utf8_lossy(&attr.value).to_string());
                        }
                        _ => {}
                    }
                }
                if id.as_deref() == Some(rid.as_str()) {
                    target = tgt;
                    break;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    let target = target.ok_or_else(|| {
        WorkbookError::Invalid(format!("no worksheet relationship for sheet '{sheet_name}'"))
    })?;

    Ok(match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{target}"),
    })
}

// =============================================================================
// styles.xml patch
// =============================================================================

struct CapturedXf {
    /// Raw attribute text with `fillId` and `applyFill` removed.
    attrs: Vec<(String, String)>,
    /// Serialized inner XML; empty for self-closing entries.
    children: String,
}

struct StylesScan {
    fill_count: u32,
    xf_count: u32,
    captured: BTreeMap<u32, CapturedXf>,
    saw_fills: bool,
    saw_cellxfs: bool,
}

/// Append one solid fill per verdict color in use plus one cloned `<xf>`
/// per (existing style id, verdict) pair, and return the rewritten part
/// together with the pair -> new style id map.
fn patch_styles(
    xml: &[u8],
    needed: &BTreeSet<(u32, Verdict)>,
) -> Result<(Vec<u8>, BTreeMap<(u32, Verdict), u32>), WorkbookError> {
    let wanted: BTreeSet<u32> = needed.iter().map(|&(id, _)| id).collect();
    let scan = scan_styles(xml, &wanted)?;

    if !scan.saw_fills {
        return Err(WorkbookError::Invalid(
            "styles.xml has no fills element".to_string(),
        ));
    }
    if !scan.saw_cellxfs {
        return Err(WorkbookError::Invalid(
            "styles.xml has no cellXfs element".to_string(),
        ));
    }

    let pass_used = needed.iter().any(|&(_, v)| v == Verdict::Pass);
    let fail_used = needed.iter().any(|&(_, v)| v == Verdict::Fail);
    let pass_fill = scan.fill_count;
    let fail_fill = scan.fill_count + u32::from(pass_used);
    let fill_id_for = |v: Verdict| match v {
        Verdict::Pass => pass_fill,
        Verdict::Fail => fail_fill,
    };

    let mut new_fills = String::new();
    if pass_used {
        new_fills.push_str(&solid_fill_xml(PASS_ARGB));
    }
    if fail_used {
        new_fills.push_str(&solid_fill_xml(FAIL_ARGB));
    }

    let mut style_map: BTreeMap<(u32, Verdict), u32> = BTreeMap::new();
    let mut new_xfs = String::new();
    let mut next_xf = scan.xf_count;
    for &(orig, verdict) in needed {
        let src = scan.captured.get(&orig).ok_or_else(|| {
            WorkbookError::Invalid(format!(
                "cell style {orig} out of range (cellXfs has {} entries)",
                scan.xf_count
            ))
        })?;
        let mut tag = String::from("<xf");
        for (key, value) in &src.attrs {
            tag.push_str(&format!(r#" {key}="{value}""#));
        }
        tag.push_str(&format!(r#" fillId="{}" applyFill="1""#, fill_id_for(verdict)));
        if src.children.is_empty() {
            tag.push_str("/>");
        } else {
            tag.push('>');
            tag.push_str(&src.children);
            tag.push_str("</xf>");
        }
        new_xfs.push_str(&tag);
        style_map.insert((orig, verdict), next_xf);
        next_xf += 1;
    }

    let new_fill_count = scan.fill_count + u32::from(pass_used) + u32::from(fail_used);
    let new_xf_count = scan.xf_count + needed.len() as u32;

    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(
        xml.len() + new_fills.len() + new_xfs.len() + 64,
    ));
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if local_name(e.name().as_ref()) == b"fills" => {
                write_raw(&mut writer, &recounted_tag(&e, new_fill_count));
            }
            Event::Empty(e) if local_name(e.name().as_ref()) == b"fills" => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                write_raw(&mut writer, &recounted_tag(&e, new_fill_count));
                write_raw(&mut writer, &new_fills);
                writer.write_event(Event::End(BytesEnd::new(name)))?;
            }
            Event::End(e) if local_name(e.name().as_ref()) == b"fills" => {
                write_raw(&mut writer, &new_fills);
                writer.write_event(Event::End(e.into_owned()))?;
            }
            Event::Start(e) if local_name(e.name().as_ref()) == b"cellXfs" => {
                write_raw(&mut writer, &recounted_tag(&e, new_xf_count));
            }
            Event::Empty(e) if local_name(e.name().as_ref()) == b"cellXfs" => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                write_raw(&mut writer, &recounted_tag(&e, new_xf_count));
                write_raw(&mut writer, &new_xfs);
                writer.write_event(Event::End(BytesEnd::new(name)))?;
            }
            Event::End(e) if local_name(e.name().as_ref()) == b"cellXfs" => {
                write_raw(&mut writer, &new_xfs);
                writer.write_event(Event::End(e.into_owned()))?;
            }
            Event::Eof => break,
            ev => writer.write_event(ev.into_owned())?,
        }
        buf.clear();
    }

    Ok((writer.into_inner(), style_map))
}

fn solid_fill_xml(argb: &str) -> String {
    format!(
        r#"<fill><patternFill patternType="solid"><fgColor rgb="{argb}"/><bgColor indexed="64"/></patternFill></fill>"#
    )
}

/// Count fills and cellXfs entries; capture the raw shape of every xf
/// whose index is in `wanted` so it can be cloned with a new fill.
fn scan_styles(xml: &[u8], wanted: &BTreeSet<u32>) -> Result<StylesScan, WorkbookError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Section {
        None,
        Fills,
        CellXfs,
    }

    let mut scan = StylesScan {
        fill_count: 0,
        xf_count: 0,
        captured: BTreeMap::new(),
        saw_fills: false,
        saw_cellxfs: false,
    };
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut section = Section::None;
    let mut depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                match section {
                    Section::None => {
                        if local == b"fills" {
                            section = Section::Fills;
                            scan.saw_fills = true;
                            depth = 0;
                        } else if local == b"cellXfs" {
                            section = Section::CellXfs;
                            scan.saw_cellxfs = true;
                            depth = 0;
                        }
                    }
                    Section::Fills => {
                        if depth == 0 && local == b"fill" {
                            scan.fill_count += 1;
                        }
                        depth += 1;
                    }
                    Section::CellXfs => {
                        if depth == 0 && local == b"xf" {
                            let index = scan.xf_count;
                            scan.xf_count += 1;
                            if wanted.contains(&index) {
                                let attrs = xf_attrs(e);
                                let children = capture_children(&mut reader, b"xf")?;
                                scan.captured.insert(index, CapturedXf { attrs, children });
                            } else {
                                depth += 1;
                            }
                        } else {
                            depth += 1;
                        }
                    }
                }
            }
            Event::Empty(ref e) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                match section {
                    Section::None => {
                        if local == b"fills" {
                            scan.saw_fills = true;
                        } else if local == b"cellXfs" {
                            scan.saw_cellxfs = true;
                        }
                    }
                    Section::Fills => {
                        if depth == 0 && local == b"fill" {
                            scan.fill_count += 1;
                        }
                    }
                    Section::CellXfs => {
                        if depth == 0 && local == b"xf" {
                            let index = scan.xf_count;
                            scan.xf_count += 1;
                            if wanted.contains(&index) {
                                scan.captured.insert(
                                    index,
                                    CapturedXf {
                                        attrs: xf_attrs(e),
                                        children: String::new(),
                                    },
                                );
                            }
                        }
                    }
                }
            }
            Event::End(_) => {
                if section != Section::None {
                    if depth == 0 {
                        section = Section::None;
                    } else {
                        depth -= 1;
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(scan)
}

/// Serialize events until the matching end tag of `element`, consuming it.
fn capture_children<R: std::io::BufRead>(
    reader: &mut Reader<R>,
    element: &[u8],
) -> Result<String, WorkbookError> {
    let mut writer = Writer::new(Vec::new());
    let mut depth = 0usize;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                depth += 1;
                writer.write_event(Event::Start(e.into_owned()))?;
            }
            Event::End(e) => {
                if depth == 0 && local_name(e.name().as_ref()) == element {
                    break;
                }
                depth = depth.saturating_sub(1);
                writer.write_event(Event::End(e.into_owned()))?;
            }
            Event::Eof => {
                return Err(WorkbookError::Invalid(
                    "unexpected EOF inside styles.xml".to_string(),
                ));
            }
            ev => writer.write_event(ev.into_owned())?,
        }
        buf.clear();
    }
    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

fn xf_attrs(e: &BytesStart) -> Vec<(String, String)> {
    e.attributes()
        .flatten()
        .filter(|a| {
            let key = local_name(a.key.as_ref());
            key != b"fillId" && key != b"applyFill"
        })
        .map(|a| {
            (
                String::from_utf8_lossy(a.key.as_ref()).into_owned(),
                String::from_utf8_lossy(&a.value).into_owned(),
            )
        })
        .collect()
}

fn recounted_tag(e: &BytesStart, count: u32) -> String {
    let mut out = String::from("<");
    out.push_str(&String::from_utf8_lossy(e.name().as_ref()));
    let mut wrote = false;
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        if local_name(attr.key.as_ref()) == b"count" {
            out.push_str(&format!(r#" {key}="{count}""#));
            wrote = true;
        } else {
            let value = String::from_utf8_lossy(&attr.value);
            out.push_str(&format!(r#" {key}="{value}""#));
        }
    }
    if !wrote {
        out.push_str(&format!(r#" count="{count}""#));
    }
    out.push('>');
    out
}

// =============================================================================
// Worksheet patch
// =============================================================================

/// Read the current `s` attribute of each target cell. Cells with no XML
/// presence are simply absent from the result.
fn scan_cell_styles(
    xml: &[u8],
    targets: &BTreeSet<(u32, u32)>,
) -> Result<BTreeMap<(u32, u32), u32>, WorkbookError> {
    let mut out = BTreeMap::new();
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e)
                if local_name(e.name().as_ref()) == b"c" =>
            {
                let mut addr = None;
                let mut style = None;
                for attr in e.attributes().flatten() {
                    match local_name(attr.key.as_ref()) {
                        b"r" => addr = parse_a1(&String::from_utf8_lossy(&attr.value)),
                        b"s" => {
                            style = String::from_utf8_lossy(&attr.value).parse::<u32>().ok();
                        }
                        _ => {}
                    }
                }
                if let Some(addr) = addr {
                    if targets.contains(&addr) {
                        out.insert(addr, style.unwrap_or(0));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

/// Rewrite the `s` attribute of every cell in `restyle`, inserting `<c>`
/// and `<row>` elements in document order where the target has no XML
/// presence. Everything else passes through unchanged.
fn patch_worksheet(
    xml: &[u8],
    restyle: &BTreeMap<(u32, u32), u32>,
) -> Result<Vec<u8>, WorkbookError> {
    let mut by_row: BTreeMap<u32, Vec<(u32, u32)>> = BTreeMap::new();
    for (&(row, col), &style) in restyle {
        by_row.entry(row).or_default().push((col, style));
    }
    let pending_rows: Vec<u32> = by_row.keys().copied().collect();
    let mut row_idx = 0usize;

    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + restyle.len() * 32));
    let mut buf = Vec::new();
    let mut saw_sheet_data = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if local_name(e.name().as_ref()) == b"sheetData" => {
                saw_sheet_data = true;
                writer.write_event(Event::Start(e.into_owned()))?;
                patch_sheet_data(&mut reader, &mut writer, &by_row, &pending_rows, &mut row_idx)?;
            }
            Event::Empty(e) if local_name(e.name().as_ref()) == b"sheetData" => {
                saw_sheet_data = true;
                if by_row.is_empty() {
                    writer.write_event(Event::Empty(e.into_owned()))?;
                } else {
                    // Convert `<sheetData/>` into `<sheetData>...</sheetData>`
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    writer.write_event(Event::Start(e.into_owned()))?;
                    for row in pending_rows.iter().skip(row_idx).copied() {
                        let cells = by_row.get(&row).map(Vec::as_slice).unwrap_or_default();
                        write_new_row(&mut writer, row, cells)?;
                    }
                    row_idx = pending_rows.len();
                    writer.write_event(Event::End(BytesEnd::new(name)))?;
                }
            }
            Event::Eof => break,
            ev => writer.write_event(ev.into_owned())?,
        }
        buf.clear();
    }

    if !saw_sheet_data {
        return Err(WorkbookError::Invalid(
            "worksheet XML has no sheetData element".to_string(),
        ));
    }
    Ok(writer.into_inner())
}

fn patch_sheet_data<R: std::io::BufRead>(
    reader: &mut Reader<R>,
    writer: &mut Writer<Vec<u8>>,
    by_row: &BTreeMap<u32, Vec<(u32, u32)>>,
    pending_rows: &[u32],
    row_idx: &mut usize,
) -> Result<(), WorkbookError> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if local_name(e.name().as_ref()) == b"row" => {
                let row_start = e.into_owned();
                let Some(row_num) = parse_row_attr(&row_start) else {
                    writer.write_event(Event::Start(row_start))?;
                    continue;
                };
                flush_rows_before(writer, by_row, pending_rows, row_idx, row_num)?;
                if let Some(cells) = by_row.get(&row_num) {
                    if *row_idx < pending_rows.len() && pending_rows[*row_idx] == row_num {
                        *row_idx += 1;
                    }
                    writer.write_event(Event::Start(row_start))?;
                    patch_row(reader, writer, row_num, cells)?;
                } else {
                    writer.write_event(Event::Start(row_start))?;
                }
            }
            Event::Empty(e) if local_name(e.name().as_ref()) == b"row" => {
                let row_empty = e.into_owned();
                let Some(row_num) = parse_row_attr(&row_empty) else {
                    writer.write_event(Event::Empty(row_empty))?;
                    continue;
                };
                flush_rows_before(writer, by_row, pending_rows, row_idx, row_num)?;
                if let Some(cells) = by_row.get(&row_num) {
                    if *row_idx < pending_rows.len() && pending_rows[*row_idx] == row_num {
                        *row_idx += 1;
                    }
                    // Convert `<row/>` into `<row>...</row>`
                    let name = String::from_utf8_lossy(row_empty.name().as_ref()).into_owned();
                    writer.write_event(Event::Start(row_empty))?;
                    for &(col, style) in cells.iter() {
                        write_raw(writer, &styled_cell_xml(row_num, col, style));
                    }
                    writer.write_event(Event::End(BytesEnd::new(name)))?;
                } else {
                    writer.write_event(Event::Empty(row_empty))?;
                }
            }
            Event::End(e) if local_name(e.name().as_ref()) == b"sheetData" => {
                while *row_idx < pending_rows.len() {
                    let row = pending_rows[*row_idx];
                    let cells = by_row.get(&row).map(Vec::as_slice).unwrap_or_default();
                    write_new_row(writer, row, cells)?;
                    *row_idx += 1;
                }
                writer.write_event(Event::End(e.into_owned()))?;
                return Ok(());
            }
            Event::Eof => {
                return Err(WorkbookError::Invalid(
                    "unexpected EOF while patching sheetData".to_string(),
                ));
            }
            ev => writer.write_event(ev.into_owned())?,
        }
        buf.clear();
    }
}

fn patch_row<R: std::io::BufRead>(
    reader: &mut Reader<R>,
    writer: &mut Writer<Vec<u8>>,
    row_num: u32,
    cells: &[(u32, u32)],
) -> Result<(), WorkbookError> {
    let mut buf = Vec::new();
    let mut idx = 0usize;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if local_name(e.name().as_ref()) == b"c" => {
                let cell_start = e.into_owned();
                let Some((cell_row, cell_col)) = parse_cell_addr(&cell_start) else {
                    writer.write_event(Event::Start(cell_start))?;
                    continue;
                };
                if cell_row != row_num {
                    // Mismatched refs are preserved unchanged
                    writer.write_event(Event::Start(cell_start))?;
                    continue;
                }
                flush_cells_before(writer, row_num, cells, &mut idx, cell_col);
                if idx < cells.len() && cells[idx].0 == cell_col {
                    let style = cells[idx].1;
                    idx += 1;
                    write_raw(writer, &restyled_cell_tag(&cell_start, style, false));
                } else {
                    writer.write_event(Event::Start(cell_start))?;
                }
            }
            Event::Empty(e) if local_name(e.name().as_ref()) == b"c" => {
                let cell_empty = e.into_owned();
                let Some((cell_row, cell_col)) = parse_cell_addr(&cell_empty) else {
                    writer.write_event(Event::Empty(cell_empty))?;
                    continue;
                };
                if cell_row != row_num {
                    writer.write_event(Event::Empty(cell_empty))?;
                    continue;
                }
                flush_cells_before(writer, row_num, cells, &mut idx, cell_col);
                if idx < cells.len() && cells[idx].0 == cell_col {
                    let style = cells[idx].1;
                    idx += 1;
                    write_raw(writer, &restyled_cell_tag(&cell_empty, style, true));
                } else {
                    writer.write_event(Event::Empty(cell_empty))?;
                }
            }
            Event::End(e) if local_name(e.name().as_ref()) == b"row" => {
                while idx < cells.len() {
                    let (col, style) = cells[idx];
                    write_raw(writer, &styled_cell_xml(row_num, col, style));
                    idx += 1;
                }
                writer.write_event(Event::End(e.into_owned()))?;
                return Ok(());
            }
            Event::Eof => {
                return Err(WorkbookError::Invalid(
                    "unexpected EOF while patching row".to_string(),
                ));
            }
            ev => writer.write_event(ev.into_owned())?,
        }
        buf.clear();
    }
}

fn flush_rows_before(
    writer: &mut Writer<Vec<u8>>,
    by_row: &BTreeMap<u32, Vec<(u32, u32)>>,
    pending_rows: &[u32],
    row_idx: &mut usize,
    limit: u32,
) -> Result<(), WorkbookError> {
    while *row_idx < pending_rows.len() && pending_rows[*row_idx] < limit {
        let row = pending_rows[*row_idx];
        let cells = by_row.get(&row).map(Vec::as_slice).unwrap_or_default();
        write_new_row(writer, row, cells)?;
        *row_idx += 1;
    }
    Ok(())
}

fn flush_cells_before(
    writer: &mut Writer<Vec<u8>>,
    row_num: u32,
    cells: &[(u32, u32)],
    idx: &mut usize,
    limit: u32,
) {
    while *idx < cells.len() && cells[*idx].0 < limit {
        let (col, style) = cells[*idx];
        write_raw(writer, &styled_cell_xml(row_num, col, style));
        *idx += 1;
    }
}

fn write_new_row(
    writer: &mut Writer<Vec<u8>>,
    row_num: u32,
    cells: &[(u32, u32)],
) -> Result<(), WorkbookError> {
    let mut row = BytesStart::new("row");
    row.push_attribute(("r", row_num.to_string().as_str()));
    writer.write_event(Event::Start(row))?;
    for &(col, style) in cells {
        write_raw(writer, &styled_cell_xml(row_num, col, style));
    }
    writer.write_event(Event::End(BytesEnd::new("row")))?;
    Ok(())
}

fn styled_cell_xml(row: u32, col: u32, style: u32) -> String {
    format!(r#"<c r="{}" s="{style}"/>"#, a1(row, col))
}

/// Rebuild a cell tag with its `s` attribute replaced (or appended).
fn restyled_cell_tag(e: &BytesStart, style: u32, self_closing: bool) -> String {
    let mut out = String::from("<");
    out.push_str(&String::from_utf8_lossy(e.name().as_ref()));
    let mut wrote = false;
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        if local_name(attr.key.as_ref()) == b"s" {
            out.push_str(&format!(r#" {key}="{style}""#));
            wrote = true;
        } else {
            let value = String::from_utf8_lossy(&attr.value);
            out.push_str(&format!(r#" {key}="{value}""#));
        }
    }
    if !wrote {
        out.push_str(&format!(r#" s="{style}""#));
    }
    out.push_str(if self_closing { "/>" } else { ">" });
    out
}

// =============================================================================
// Helpers
// =============================================================================

fn write_raw(writer: &mut Writer<Vec<u8>>, xml: &str) {
    writer.get_mut().extend_from_slice(xml.as_bytes());
}

fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|b| *b == b':') {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}

/// Unescape the 5 predefined XML entities: &lt; &gt; &quot; &apos; &amp;
fn unescape_xml(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn parse_row_attr(row: &BytesStart) -> Option<u32> {
    for attr in row.attributes().flatten() {
        if local_name(attr.key.as_ref()) == b"r" {
            return String::from_utf8_lossy(&attr.value).parse::<u32>().ok();
        }
    }
    None
}

fn parse_cell_addr(cell: &BytesStart) -> Option<(u32, u32)> {
    for attr in cell.attributes().flatten() {
        if local_name(attr.key.as_ref()) == b"r" {
            return parse_a1(&String::from_utf8_lossy(&attr.value));
        }
    }
    None
}

fn a1(row: u32, col: u32) -> String {
    format!("{}{row}", col_letters(col))
}

/// 1-based column index to Excel letters (1 = A, 26 = Z, 27 = AA).
fn col_letters(col: u32) -> String {
    let mut result = String::new();
    let mut n = col.saturating_sub(1);
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

/// A1 reference to 1-based (row, col).
fn parse_a1(r: &str) -> Option<(u32, u32)> {
    let digits_at = r.find(|ch: char| ch.is_ascii_digit())?;
    let (letters, digits) = r.split_at(digits_at);
    if letters.is_empty() {
        return None;
    }
    let mut col: u32 = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_uppercase() {
            return None;
        }
        col = col * 26 + (ch as u32 - 'A' as u32 + 1);
    }
    let row = digits.parse::<u32>().ok()?;
    Some((row, col))
}

// =============================================================================
// Tests
// =============================================================================
