//! 表格解析
//!
//! - CSV：整份文件解析成一张表，单元格按数字/空值/文本推断
//! - PDF：逐页按文字坐标还原行和列，把连续的、列数一致的多列行识别成表格

use std::collections::BTreeMap;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use lopdf::content::Content;
use lopdf::{Document, Encoding, Object, ObjectId};
use regex::Regex;
use serde_json::{Number, Value as JsonValue};

use crate::models::Table;

/// 同一段文字内的列分隔：制表符或两个以上空白
fn column_separator() -> &'static Regex {
    static SEPARATOR: OnceLock<Regex> = OnceLock::new();
    SEPARATOR.get_or_init(|| Regex::new(r"\t+|\s{2,}").expect("列分隔正则无效"))
}

/// 单元格类型推断
pub fn infer_cell(raw: &str) -> JsonValue {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return JsonValue::Null;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return JsonValue::Number(i.into());
    }
    if let Some(n) = trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
        return JsonValue::Number(n);
    }
    JsonValue::String(trimmed.to_string())
}

/// 解析 CSV 字节为一张表（第一行为表头）
pub fn parse_delimited(bytes: &[u8]) -> Result<Table> {
    let bytes = bytes.strip_prefix("\u{feff}".as_bytes()).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(bytes);

    let columns: Vec<String> = reader
        .headers()
        .context("CSV 表头解析失败")?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("CSV 第 {} 行解析失败", line + 2))?;
        rows.push(record.iter().map(infer_cell).collect());
    }

    Ok(Table::new(columns, rows))
}

/// 从 PDF 字节中抽取所有页面的表格，按页序排列
///
/// 逐页解析内容流，按文字位置还原成行和单元格，再识别表格。
pub fn extract_document_tables(bytes: &[u8]) -> Result<Vec<Table>> {
    let document = Document::load_mem(bytes).context("PDF 解析失败")?;

    let mut tables = Vec::new();
    for (page_number, page_id) in document.get_pages() {
        let runs = page_text_runs(&document, page_id)
            .with_context(|| format!("PDF 第 {} 页内容解析失败", page_number))?;
        tables.extend(tables_from_rows(group_rows(runs)));
    }
    Ok(tables)
}

/// 同一行允许的基线偏差（PDF 用户空间单位）
const ROW_TOLERANCE: f32 = 2.0;

/// `[a b c d e f]`，PDF 的 3x3 仿射矩阵
type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

fn multiply(m1: &Matrix, m2: &Matrix) -> Matrix {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

fn translation(tx: f32, ty: f32) -> Matrix {
    [1.0, 0.0, 0.0, 1.0, tx, ty]
}

fn operand_numbers(operands: &[Object]) -> Vec<f32> {
    operands
        .iter()
        .map(|o| o.as_float().unwrap_or(0.0))
        .collect()
}

fn operand_matrix(operands: &[Object]) -> Option<Matrix> {
    let numbers = operand_numbers(operands);
    <[f32; 6]>::try_from(numbers.as_slice()).ok()
}

/// 一段连续绘制的文字及其起点（设备坐标）
#[derive(Debug, Clone, PartialEq)]
struct TextRun {
    x: f32,
    y: f32,
    text: String,
}

/// 解析一页内容流，得到带位置的文字段
///
/// 只跟踪定位相关的算子：`q`/`Q`/`cm`、`BT`、`Td`/`TD`/`Tm`/`T*`/`TL`，
/// 以及 `Tj`/`TJ`/`'`/`"`。两次绘制之间没有重新定位时，视为同一段文字。
fn page_text_runs(document: &Document, page_id: ObjectId) -> Result<Vec<TextRun>> {
    let encodings: BTreeMap<Vec<u8>, Encoding> = document
        .get_page_fonts(page_id)?
        .into_iter()
        .filter_map(|(name, font)| {
            font.get_font_encoding(document)
                .ok()
                .map(|encoding| (name, encoding))
        })
        .collect();
    let content = Content::decode(&document.get_page_content(page_id)?)?;

    let mut runs: Vec<TextRun> = Vec::new();
    let mut ctm = IDENTITY;
    let mut saved: Vec<Matrix> = Vec::new();
    let mut text_matrix = IDENTITY;
    let mut line_matrix = IDENTITY;
    let mut leading = 0.0_f32;
    let mut encoding: Option<&Encoding> = None;
    let mut continues_run = false;

    for operation in &content.operations {
        let operands = operation.operands.as_slice();
        let shown = match operation.operator.as_str() {
            "q" => {
                saved.push(ctm);
                None
            }
            "Q" => {
                ctm = saved.pop().unwrap_or(IDENTITY);
                None
            }
            "cm" => {
                if let Some(m) = operand_matrix(operands) {
                    ctm = multiply(&m, &ctm);
                }
                None
            }
            "BT" => {
                text_matrix = IDENTITY;
                line_matrix = IDENTITY;
                continues_run = false;
                None
            }
            "ET" => {
                continues_run = false;
                None
            }
            "Tf" => {
                encoding = operands
                    .first()
                    .and_then(|o| o.as_name().ok())
                    .and_then(|name| encodings.get(name));
                None
            }
            "TL" => {
                leading = operand_numbers(operands).first().copied().unwrap_or(0.0);
                None
            }
            "Td" | "TD" => {
                if let &[tx, ty] = operand_numbers(operands).as_slice() {
                    if operation.operator == "TD" {
                        leading = -ty;
                    }
                    line_matrix = multiply(&translation(tx, ty), &line_matrix);
                    text_matrix = line_matrix;
                    continues_run = false;
                }
                None
            }
            "Tm" => {
                if let Some(m) = operand_matrix(operands) {
                    line_matrix = m;
                    text_matrix = m;
                    continues_run = false;
                }
                None
            }
            "T*" => {
                line_matrix = multiply(&translation(0.0, -leading), &line_matrix);
                text_matrix = line_matrix;
                continues_run = false;
                None
            }
            "'" | "\"" => {
                line_matrix = multiply(&translation(0.0, -leading), &line_matrix);
                text_matrix = line_matrix;
                continues_run = false;
                operands.last().map(|o| shown_text(encoding, o))
            }
            "Tj" | "TJ" => Some(
                operands
                    .iter()
                    .map(|o| shown_text(encoding, o))
                    .collect::<String>(),
            ),
            _ => None,
        };

        let Some(text) = shown else { continue };
        match runs.last_mut() {
            Some(last) if continues_run => last.text.push_str(&text),
            _ => {
                let origin = multiply(&text_matrix, &ctm);
                runs.push(TextRun {
                    x: origin[4],
                    y: origin[5],
                    text,
                });
            }
        }
        continues_run = true;
    }

    Ok(runs)
}

/// 解码 `Tj`/`TJ` 的操作数
fn shown_text(encoding: Option<&Encoding>, operand: &Object) -> String {
    match operand {
        Object::String(bytes, _) => match encoding {
            Some(encoding) => Document::decode_text(encoding, bytes)
                .unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned()),
            None => String::from_utf8_lossy(bytes).into_owned(),
        },
        Object::Array(items) => items
            .iter()
            .map(|item| match item {
                Object::Integer(_) | Object::Real(_) => {
                    kerning_gap(item.as_float().unwrap_or(0.0)).to_string()
                }
                other => shown_text(encoding, other),
            })
            .collect(),
        _ => String::new(),
    }
}

/// `TJ` 字距（千分之一 em）：超过一个 em 的间隔按列分隔处理
fn kerning_gap(adjustment: f32) -> &'static str {
    if adjustment <= -1000.0 {
        "\t"
    } else if adjustment < -100.0 {
        " "
    } else {
        ""
    }
}

/// 按基线把文字段归成行（从上到下），行内按横坐标排成单元格
fn group_rows(mut runs: Vec<TextRun>) -> Vec<Vec<String>> {
    runs.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

    let mut rows: Vec<(f32, Vec<TextRun>)> = Vec::new();
    for run in runs {
        let same_row = rows
            .last()
            .is_some_and(|(y, _)| (y - run.y).abs() <= ROW_TOLERANCE);
        match rows.last_mut() {
            Some((_, row)) if same_row => row.push(run),
            _ => rows.push((run.y, vec![run])),
        }
    }

    rows.into_iter()
        .map(|(_, mut row)| {
            row.sort_by(|a, b| a.x.total_cmp(&b.x));
            row.iter().flat_map(|run| split_columns(&run.text)).collect()
        })
        .collect()
}

/// 从按行排列的单元格中识别表格
///
/// 连续的多列且列数一致的行组成一张表，至少要有表头加一行数据。
/// PDF 单元格保持文本形式。
fn tables_from_rows(rows: Vec<Vec<String>>) -> Vec<Table> {
    let mut tables = Vec::new();
    let mut block: Vec<Vec<String>> = Vec::new();

    let mut flush = |block: &mut Vec<Vec<String>>| {
        if block.len() >= 2 {
            let mut lines = std::mem::take(block).into_iter();
            let columns = lines.next().unwrap_or_default();
            let rows = lines
                .map(|cells| cells.into_iter().map(JsonValue::String).collect())
                .collect();
            tables.push(Table::new(columns, rows));
        }
        block.clear();
    };

    for cells in rows {
        let continues = cells.len() >= 2
            && block.first().map_or(true, |first| first.len() == cells.len());

        if continues {
            block.push(cells);
            continue;
        }

        flush(&mut block);
        if cells.len() >= 2 {
            block.push(cells);
        }
    }
    flush(&mut block);

    tables
}

/// 单段文字内部用制表符或多个空格对齐的列也拆开
fn split_columns(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    column_separator()
        .split(trimmed)
        .map(|cell| cell.trim().to_string())
        .filter(|cell| !cell.is_empty())
        .collect()
}
