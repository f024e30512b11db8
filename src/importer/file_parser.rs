// ==========================================
// 批量导入系统 - 文件解析器实现
// ==========================================
// 阶段 0: 文件读取与解析
// 支持: CSV（分号分隔）/ JSON（对象数组）/ Excel (.xlsx/.xls)
// ==========================================

use crate::domain::record::{FieldValue, RawRecord};
use crate::importer::error::{ImportError, ImporterResult};
use crate::importer::import_traits::FileParser;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use csv::ReaderBuilder;
use serde_json::Value;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// CSV 固定分隔符（避免与自由文本中的逗号冲突）
pub const CSV_DELIMITER: u8 = b';';

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

// ==========================================
// FileFormat - 文件格式
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Json,
    Xlsx,
    Xls,
}

impl FileFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Json => "json",
            FileFormat::Xlsx => "xlsx",
            FileFormat::Xls => "xls",
        }
    }

    /// 按扩展名识别（大小写不敏感）
    pub fn from_extension(ext: &str) -> ImporterResult<Self> {
        match ext.trim().trim_start_matches('.').to_lowercase().as_str() {
            "csv" => Ok(FileFormat::Csv),
            "json" => Ok(FileFormat::Json),
            "xlsx" => Ok(FileFormat::Xlsx),
            "xls" => Ok(FileFormat::Xls),
            other => Err(ImportError::UnsupportedFormat(other.to_string())),
        }
    }

    /// 按内容嗅探（无扩展名时使用）
    pub fn sniff(bytes: &[u8]) -> ImporterResult<Self> {
        if bytes.starts_with(b"PK\x03\x04") {
            return Ok(FileFormat::Xlsx);
        }
        if bytes.starts_with(b"\xD0\xCF\x11\xE0") {
            return Ok(FileFormat::Xls);
        }

        let text = std::str::from_utf8(strip_bom(bytes))
            .map_err(|_| ImportError::UnsupportedFormat("desconocido".to_string()))?;
        match text.trim_start().chars().next() {
            Some('[') => Ok(FileFormat::Json),
            _ => Ok(FileFormat::Csv),
        }
    }

    /// 声明格式优先（文件名扩展名），否则嗅探内容
    pub fn detect(file_name: &str, bytes: &[u8]) -> ImporterResult<Self> {
        match Path::new(file_name).extension().and_then(|e| e.to_str()) {
            Some(ext) => Self::from_extension(ext),
            None => Self::sniff(bytes),
        }
    }
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
}

/// 去掉一层包裹的双引号
fn strip_quotes(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// JSON 标量转文本（null → 空字符串）
fn json_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// 单元格清洗: TRIM → 去引号 → 形如 [..] 时尝试按 JSON 数组解码
///
/// 解码失败时保留原文本（静默回退，不视为错误）
pub fn normalize_cell(raw: &str) -> FieldValue {
    let value = strip_quotes(raw.trim());

    if value.starts_with('[') && value.ends_with(']') {
        if let Ok(items) = serde_json::from_str::<Vec<Value>>(value) {
            return FieldValue::List(items.iter().map(json_to_text).collect());
        }
        debug!(value = %value, "单元格形似数组但无法解码，按文本保留");
    }

    FieldValue::Text(value.to_string())
}

fn normalize_header(raw: &str) -> String {
    strip_quotes(raw.trim()).trim().to_string()
}

/// 按表头组装一行；缺失的尾部单元格读作空字符串，多余单元格忽略
fn build_record<I>(headers: &[String], cells: I) -> RawRecord
where
    I: IntoIterator<Item = FieldValue>,
{
    let mut cells = cells.into_iter();
    let mut record = RawRecord::new();
    for header in headers {
        let value = cells.next().unwrap_or_default();
        if !header.is_empty() {
            record.insert(header.clone(), value);
        }
    }
    record
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse_to_raw_records(&self, bytes: &[u8]) -> ImporterResult<Vec<RawRecord>> {
        let text = std::str::from_utf8(strip_bom(bytes))
            .map_err(|e| ImportError::malformed("csv", e))?;

        // 关闭引号处理：按分号逐字切分，引号由 normalize_cell 去除
        let mut reader = ReaderBuilder::new()
            .delimiter(CSV_DELIMITER)
            .quoting(false)
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut rows = reader.records();

        // 读取表头
        let headers: Vec<String> = match rows.next() {
            Some(header) => header?.iter().map(normalize_header).collect(),
            None => return Ok(Vec::new()),
        };

        // 读取数据行
        let mut records = Vec::new();
        for result in rows {
            let row = result?;

            // 跳过纯空白行（不占用行号）
            if row.len() <= 1 && row.iter().all(|v| v.trim().is_empty()) {
                continue;
            }

            records.push(build_record(&headers, row.iter().map(normalize_cell)));
        }

        debug!(columns = headers.len(), rows = records.len(), "CSV 解析完成");
        Ok(records)
    }
}

// ==========================================
// JSON Parser 实现
// ==========================================
// 内容必须是对象数组；每个对象原样成为一行
pub struct JsonParser;

impl FileParser for JsonParser {
    fn parse_to_raw_records(&self, bytes: &[u8]) -> ImporterResult<Vec<RawRecord>> {
        let document: Value = serde_json::from_slice(strip_bom(bytes))?;

        let items = match document {
            Value::Array(items) => items,
            _ => {
                return Err(ImportError::malformed(
                    "json",
                    "se esperaba un arreglo de objetos",
                ))
            }
        };

        let mut records = Vec::with_capacity(items.len());
        for (idx, item) in items.into_iter().enumerate() {
            let object = match item {
                Value::Object(object) => object,
                _ => {
                    return Err(ImportError::malformed(
                        "json",
                        format!("el elemento {} no es un objeto", idx + 1),
                    ))
                }
            };

            let record: RawRecord = object
                .into_iter()
                .map(|(key, value)| {
                    let field = match value {
                        Value::Array(items) => {
                            FieldValue::List(items.iter().map(json_to_text).collect())
                        }
                        other => FieldValue::Text(json_to_text(&other)),
                    };
                    (key, field)
                })
                .collect();
            records.push(record);
        }

        debug!(rows = records.len(), "JSON 解析完成");
        Ok(records)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
// 读取第一个工作表；第一行为表头
pub struct ExcelParser;

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        // 整数值不带小数部分
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

impl FileParser for ExcelParser {
    fn parse_to_raw_records(&self, bytes: &[u8]) -> ImporterResult<Vec<RawRecord>> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ImportError::malformed("excel", "el libro no tiene hojas"))?;
        let range = workbook.worksheet_range(&sheet_name)?;

        let mut rows = range.rows();
        let headers: Vec<String> = match rows.next() {
            Some(header_row) => header_row
                .iter()
                .map(|cell| normalize_header(&cell_text(cell)))
                .collect(),
            None => return Ok(Vec::new()),
        };

        let mut records = Vec::new();
        for data_row in rows {
            let cells: Vec<String> = data_row.iter().map(cell_text).collect();

            // 跳过完全空白的行
            if cells.iter().all(|v| v.trim().is_empty()) {
                continue;
            }

            records.push(build_record(
                &headers,
                cells.iter().map(|v| normalize_cell(v)),
            ));
        }

        debug!(sheet = %sheet_name, rows = records.len(), "Excel 解析完成");
        Ok(records)
    }
}

// ==========================================
// 通用文件解析器（根据格式自动选择）
// ==========================================
pub struct UniversalFileParser;

impl UniversalFileParser {
    pub fn parser_for(format: FileFormat) -> Box<dyn FileParser> {
        match format {
            FileFormat::Csv => Box::new(CsvParser),
            FileFormat::Json => Box::new(JsonParser),
            FileFormat::Xlsx | FileFormat::Xls => Box::new(ExcelParser),
        }
    }

    pub fn parse(&self, bytes: &[u8], format: FileFormat) -> ImporterResult<Vec<RawRecord>> {
        Self::parser_for(format).parse_to_raw_records(bytes)
    }

    /// 读取文件并按扩展名解析
    pub fn parse_path<P: AsRef<Path>>(&self, file_path: P) -> ImporterResult<Vec<RawRecord>> {
        let path = file_path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let format = FileFormat::detect(name, &bytes)?;
        self.parse(&bytes, format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn parse_csv(content: &str) -> Vec<RawRecord> {
        CsvParser.parse_to_raw_records(content.as_bytes()).unwrap()
    }

    #[test]
    fn test_csv_semicolon_delimiter() {
        let records = parse_csv("email;user_type\nalice@x.com;ORIENTADOR\n");

        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0],
            RawRecord::new()
                .with("email", "alice@x.com")
                .with("user_type", "ORIENTADOR")
        );
    }

    #[test]
    fn test_csv_commas_stay_inside_cell() {
        let records = parse_csv("email;first_name\na@x.com;Pérez, Ana\n");
        assert_eq!(records[0].text("first_name"), "Pérez, Ana");
    }

    #[test]
    fn test_csv_json_array_cell() {
        let records = parse_csv("email;allowed_groups\na@x.com;[\"A\",\"B\"]\n");
        assert_eq!(
            records[0].get("allowed_groups"),
            Some(&FieldValue::list(["A", "B"]))
        );
    }

    #[test]
    fn test_csv_quoted_json_array_cell() {
        let records = parse_csv("email;allowed_groups\na@x.com; \"[\"A\",\"B\"]\" \n");
        assert_eq!(
            records[0].get("allowed_groups"),
            Some(&FieldValue::list(["A", "B"]))
        );
    }

    #[test]
    fn test_csv_malformed_array_falls_back_to_text() {
        let records = parse_csv("email;allowed_groups\na@x.com;[A, B\n");
        assert_eq!(records[0].text("allowed_groups"), "[A, B");

        let records = parse_csv("email;allowed_groups\na@x.com;[A, B]\n");
        assert_eq!(
            records[0].get("allowed_groups"),
            Some(&FieldValue::text("[A, B]"))
        );
    }

    #[test]
    fn test_csv_trims_and_strips_quotes() {
        let records = parse_csv("\"email\" ; user_type\n  \"bob@x.com\"  ;  PROFESOR \n");
        assert_eq!(records[0].text("email"), "bob@x.com");
        assert_eq!(records[0].text("user_type"), "PROFESOR");
    }

    #[test]
    fn test_csv_skip_whitespace_lines() {
        let records = parse_csv("email;user_type\na@x.com;PROFESOR\n   \n\nb@x.com;CLINICO\n");

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].text("email"), "b@x.com");
    }

    #[test]
    fn test_csv_missing_cells_read_as_empty() {
        let records = parse_csv("email;user_type;center_id\na@x.com\n");

        assert_eq!(records[0].len(), 3);
        assert_eq!(records[0].text("user_type"), "");
        assert_eq!(records[0].text("center_id"), "");
    }

    #[test]
    fn test_csv_crlf_and_bom() {
        let mut content = UTF8_BOM.to_vec();
        content.extend_from_slice(b"email;user_type\r\na@x.com;PROFESOR\r\n");

        let records = CsvParser.parse_to_raw_records(&content).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text("email"), "a@x.com");
        assert_eq!(records[0].text("user_type"), "PROFESOR");
    }

    #[test]
    fn test_csv_does_not_validate() {
        let records = parse_csv("email;user_type\n;\n");
        assert_eq!(records.len(), 1);
        assert!(records[0].is_blank("email"));
    }

    #[test]
    fn test_csv_empty_content() {
        assert!(parse_csv("").is_empty());
    }

    #[test]
    fn test_csv_invalid_utf8_is_malformed() {
        let result = CsvParser.parse_to_raw_records(&[0x65, 0x3b, 0xff, 0xfe, 0x0a]);
        assert!(matches!(result, Err(ImportError::MalformedInput { .. })));
    }

    #[test]
    fn test_json_array_of_objects() {
        let content = r#"[
            {"email": "a@x.com", "user_type": "EXAMINADOR", "allowed_groups": ["G1", "G2"]},
            {"email": "b@x.com", "center_id": 12, "phone": null}
        ]"#;

        let records = JsonParser.parse_to_raw_records(content.as_bytes()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].get("allowed_groups"),
            Some(&FieldValue::list(["G1", "G2"]))
        );
        assert_eq!(records[1].text("center_id"), "12");
        assert_eq!(records[1].text("phone"), "");
        let names: Vec<&str> = records[0].field_names().collect();
        assert_eq!(names, vec!["email", "user_type", "allowed_groups"]);
    }

    #[test]
    fn test_json_not_an_array() {
        let result = JsonParser.parse_to_raw_records(br#"{"email": "a@x.com"}"#);
        assert!(matches!(result, Err(ImportError::MalformedInput { .. })));

        let result = JsonParser.parse_to_raw_records(br#"["a@x.com"]"#);
        assert!(matches!(result, Err(ImportError::MalformedInput { .. })));

        let result = JsonParser.parse_to_raw_records(b"[{");
        assert!(matches!(result, Err(ImportError::MalformedInput { .. })));
    }

    #[test]
    fn test_excel_workbook_rows() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("usuarios.xlsx");

        let records = UniversalFileParser.parse_path(&path).unwrap();

        // 第 3 行缺失、第 5 行只有空白单元格：都不产生记录
        assert_eq!(records.len(), 3);
        let names: Vec<&str> = records[0].field_names().collect();
        assert_eq!(
            names,
            vec!["email", "user_type", "center_id", "allowed_groups", "phone"]
        );

        assert_eq!(records[0].text("email"), "ana@x.com");
        assert_eq!(records[0].text("center_id"), "12");
        assert_eq!(records[0].text("phone"), "600123123");
        assert_eq!(records[0].text("allowed_groups"), "");

        assert_eq!(
            records[1].get("allowed_groups"),
            Some(&FieldValue::list(["1A", "1B"]))
        );
        assert_eq!(records[1].text("phone"), "2.5");

        assert_eq!(records[2].text("email"), "luis@x.com");
        assert_eq!(records[2].text("user_type"), "ORIENTADOR");
    }

    #[test]
    fn test_excel_garbage_is_malformed() {
        let result = ExcelParser.parse_to_raw_records(b"definitely not a workbook");
        assert!(matches!(result, Err(ImportError::MalformedInput { .. })));
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(FileFormat::from_extension("CSV").unwrap(), FileFormat::Csv);
        assert_eq!(FileFormat::from_extension(".xlsx").unwrap(), FileFormat::Xlsx);
        assert!(matches!(
            FileFormat::from_extension("pdf"),
            Err(ImportError::UnsupportedFormat(ref ext)) if ext == "pdf"
        ));

        assert_eq!(
            FileFormat::detect("usuarios.json", b"[]").unwrap(),
            FileFormat::Json
        );
        assert_eq!(FileFormat::detect("blob", b"  [{}]").unwrap(), FileFormat::Json);
        assert_eq!(FileFormat::detect("blob", b"email;x").unwrap(), FileFormat::Csv);
        assert_eq!(
            FileFormat::detect("blob", b"PK\x03\x04rest").unwrap(),
            FileFormat::Xlsx
        );
        assert!(FileFormat::detect("blob", &[0xff, 0xfe, 0x00]).is_err());
    }

    #[test]
    fn test_universal_parser_from_path() {
        let mut temp_file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(temp_file, "email;user_type").unwrap();
        writeln!(temp_file, "a@x.com;PROFESOR").unwrap();

        let records = UniversalFileParser.parse_path(temp_file.path()).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_universal_parser_unsupported_extension() {
        let temp_file = Builder::new().suffix(".pdf").tempfile().unwrap();
        let result = UniversalFileParser.parse_path(temp_file.path());
        assert!(matches!(result, Err(ImportError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_universal_parser_missing_file() {
        let result = UniversalFileParser.parse_path("no_existe.csv");
        assert!(matches!(result, Err(ImportError::FileReadError(_))));
    }
}
