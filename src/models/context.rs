//! 单步数据上下文
//!
//! 每一步重新构建，答案算完即丢弃，不跨步共享。

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

/// 内存中的二维表
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<JsonValue>>,
}

impl Table {
    /// 创建表，空列名和重复列名会被改写成唯一的名字
    pub fn new(columns: Vec<String>, rows: Vec<Vec<JsonValue>>) -> Self {
        Self {
            columns: normalize_columns(columns),
            rows,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// 行转成 `{列名: 值}` 对象，缺失单元格补 null，多余单元格丢弃
    pub fn records(&self) -> Vec<JsonValue> {
        self.rows
            .iter()
            .map(|row| {
                let mut record = Map::new();
                for (idx, column) in self.columns.iter().enumerate() {
                    let cell = row.get(idx).cloned().unwrap_or(JsonValue::Null);
                    record.insert(column.clone(), cell);
                }
                JsonValue::Object(record)
            })
            .collect()
    }

    /// 列名加前几行的 CSV 预览
    pub fn preview(&self, max_rows: usize) -> csv::Result<String> {
        let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
        writer.write_record(&self.columns)?;
        for row in self.rows.iter().take(max_rows) {
            writer.write_record(row.iter().map(cell_to_string))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))?;
        Ok(format!(
            "columns: {:?}\n{}",
            self.columns,
            String::from_utf8_lossy(&bytes)
        ))
    }
}

fn cell_to_string(cell: &JsonValue) -> String {
    match cell {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn normalize_columns(columns: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(columns.len());
    for (idx, column) in columns.into_iter().enumerate() {
        let base = match column.trim() {
            "" => format!("col_{}", idx),
            trimmed => trimmed.to_string(),
        };
        let mut name = base.clone();
        let mut suffix = 1;
        while seen.contains(&name) {
            name = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        seen.push(name);
    }
    seen
}

/// 下载得到的原始数据
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub url: String,
    pub format: String,
    pub bytes: Vec<u8>,
    /// 下载失败时记录原因，此时 `bytes` 为空
    pub error: Option<String>,
}

impl RawRecord {
    pub fn downloaded(url: impl Into<String>, format: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            url: url.into(),
            format: format.into(),
            bytes,
            error: None,
        }
    }

    pub fn failed(
        url: impl Into<String>,
        format: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            format: format.into(),
            bytes: Vec::new(),
            error: Some(reason.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// 内容能按 UTF-8 解码时返回文本
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }
}

/// 一步中所有数据源的解析结果
///
/// 各列表保持数据源描述的顺序。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestedDataContext {
    /// 从 PDF 中抽取的表
    pub document_tables: Vec<Table>,
    /// CSV 表
    pub delimited_tables: Vec<Table>,
    /// API / JSON 解析结果
    pub structured_payloads: Vec<JsonValue>,
    /// 所有数据源的原始内容（包括下载失败的记录）
    pub raw: Vec<RawRecord>,
}

impl IngestedDataContext {
    pub fn is_empty(&self) -> bool {
        self.document_tables.is_empty()
            && self.delimited_tables.is_empty()
            && self.structured_payloads.is_empty()
            && self.raw.is_empty()
    }

    pub fn failed_sources(&self) -> impl Iterator<Item = &RawRecord> {
        self.raw.iter().filter(|r| r.is_failed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_columns() {
        let table = Table::new(
            vec!["a".into(), "".into(), "a".into(), " b ".into()],
            vec![],
        );
        assert_eq!(table.columns, vec!["a", "col_1", "a_1", "b"]);
    }

    #[test]
    fn test_records_pad_missing_cells() {
        let table = Table::new(
            vec!["name".into(), "score".into()],
            vec![vec![json!("x"), json!(3)], vec![json!("y")]],
        );
        assert_eq!(
            table.records(),
            vec![
                json!({"name": "x", "score": 3}),
                json!({"name": "y", "score": null})
            ]
        );
    }

    #[test]
    fn test_preview_limits_rows() {
        let rows = (0..10).map(|i| vec![json!(i)]).collect();
        let table = Table::new(vec!["n".into()], rows);
        let preview = table.preview(2).unwrap();
        assert!(preview.starts_with("columns: [\"n\"]"));
        assert_eq!(preview.lines().count(), 4);
    }

    #[test]
    fn test_raw_record_text() {
        let ok = RawRecord::downloaded("u", "csv", b"a,b".to_vec());
        assert_eq!(ok.text(), Some("a,b"));
        let bad = RawRecord::failed("u", "pdf", "404");
        assert!(bad.is_failed());
    }
}
