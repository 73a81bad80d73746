//! CSV KB 변환
//!
//! 스프레드시트에서 내보낸 CSV를 KB 레코드(JSON 객체) 배열로 변환합니다.
//! 첫 줄은 헤더이며, 각 행은 `헤더 -> 셀 문자열` 객체가 됩니다.
//! `aliases` 셀은 `|`로 나누어 배열로 만듭니다.

use serde_json::{Map, Value};

use super::SourceError;

/// 별칭 셀 구분자
const ALIAS_SEPARATOR: char = '|';

/// CSV 텍스트를 레코드 배열로 파싱
///
/// 인용된 셀은 줄바꿈을 포함할 수 있습니다. 선행 UTF-8 BOM은 무시합니다.
pub fn parse_csv(text: &str) -> Result<Vec<Value>, SourceError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut records = split_records(text)?.into_iter();

    let header: Vec<String> = records
        .next()
        .ok_or_else(|| SourceError::Csv("empty CSV document".to_string()))?
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect();

    if header.iter().all(|h| h.is_empty()) {
        return Err(SourceError::Csv("CSV header has no column names".to_string()));
    }

    let mut rows = Vec::new();
    for cells in records {
        let mut row = Map::new();

        for (i, name) in header.iter().enumerate() {
            if name.is_empty() {
                continue;
            }
            let cell = cells.get(i).map(|c| c.trim()).unwrap_or("");
            let value = if name == "aliases" {
                Value::Array(
                    cell.split(ALIAS_SEPARATOR)
                        .map(str::trim)
                        .filter(|a| !a.is_empty())
                        .map(|a| Value::String(a.to_string()))
                        .collect(),
                )
            } else {
                Value::String(cell.to_string())
            };
            row.insert(name.clone(), value);
        }

        rows.push(Value::Object(row));
    }

    tracing::debug!("Parsed {} CSV rows ({} columns)", rows.len(), header.len());
    Ok(rows)
}

/// 전체 텍스트를 레코드(셀 목록) 단위로 분할
///
/// 큰따옴표 인용과 `""` 이스케이프를 지원하며, 인용 밖의 줄바꿈만 레코드를 끝냅니다.
/// `\r`은 모두 버리고, 빈 줄은 건너뜁니다.
fn split_records(text: &str) -> Result<Vec<Vec<String>>, SourceError> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut quote_line = 0;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\r' => {}
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if current.trim().is_empty() => {
                current.clear();
                in_quotes = true;
                quote_line = line;
            }
            ',' if !in_quotes => record.push(std::mem::take(&mut current)),
            '\n' if !in_quotes => {
                record.push(std::mem::take(&mut current));
                records.push(std::mem::take(&mut record));
                line += 1;
            }
            _ => {
                if c == '\n' {
                    line += 1;
                }
                current.push(c);
            }
        }
    }

    if in_quotes {
        return Err(SourceError::Csv(format!(
            "unterminated quote starting on line {}",
            quote_line
        )));
    }

    if !current.is_empty() || !record.is_empty() {
        record.push(current);
        records.push(record);
    }

    records.retain(|r: &Vec<String>| !(r.len() == 1 && r[0].trim().is_empty()));
    Ok(records)
}

// ============================================================================
// Tests
// ============================================================================
