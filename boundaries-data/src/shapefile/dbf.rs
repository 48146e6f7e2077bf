//! dBASE attribute tables.
//!
//! Character fields are returned as raw bytes; the boundary set decides how
//! to decode them.

use boundaries_core::RawValue;
use chrono::NaiveDate;

use super::FormatError;
use super::bytes::ByteReader;

const HEADER_LEN: usize = 32;
const DESCRIPTOR_LEN: usize = 32;
const DESCRIPTOR_TERMINATOR: u8 = 0x0D;
const DELETED_FLAG: u8 = b'*';

#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    name: String,
    kind: u8,
    length: usize,
    decimals: u8,
}

/// A parsed table header with access to individual records.
#[derive(Debug, Clone)]
pub(super) struct Table {
    fields: Vec<Field>,
    record_count: usize,
    first_record: usize,
    record_len: usize,
}

impl Table {
    pub(super) fn parse(bytes: &[u8]) -> Result<Self, FormatError> {
        let mut header = ByteReader::new(bytes);
        header.skip(4)?;
        let record_count = usize::try_from(header.u32_le()?).map_err(|_| FormatError::DbfHeader {
            reason: "record count does not fit in memory",
        })?;
        let header_len = usize::from(header.u16_le()?);
        let record_len = usize::from(header.u16_le()?);
        header.skip(HEADER_LEN - 12)?;

        let mut fields = Vec::new();
        let mut descriptors = ByteReader::at(bytes, HEADER_LEN);
        while descriptors.offset() < header_len {
            let mut peek = descriptors.clone();
            if peek.u8()? == DESCRIPTOR_TERMINATOR {
                break;
            }
            let raw = descriptors.take(DESCRIPTOR_LEN)?;
            fields.push(parse_descriptor(raw)?);
        }

        let field_width: usize = fields.iter().map(|field| field.length).sum();
        if field_width + 1 > record_len {
            return Err(FormatError::DbfHeader {
                reason: "record length is shorter than its fields",
            });
        }

        Ok(Self {
            fields,
            record_count,
            first_record: header_len,
            record_len,
        })
    }

    pub(super) const fn record_count(&self) -> usize {
        self.record_count
    }

    pub(super) fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }

    /// Read record `position`. Deleted records yield `None`.
    pub(super) fn record(
        &self,
        bytes: &[u8],
        position: usize,
    ) -> Result<Option<Vec<(String, RawValue)>>, FormatError> {
        let start = position
            .checked_mul(self.record_len)
            .and_then(|offset| offset.checked_add(self.first_record))
            .ok_or(FormatError::Truncated {
                offset: self.first_record,
            })?;
        let mut reader = ByteReader::at(bytes, start);
        if reader.u8()? == DELETED_FLAG {
            return Ok(None);
        }
        let mut values = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let raw = reader.take(field.length)?;
            values.push((field.name.clone(), parse_value(field, raw)));
        }
        Ok(Some(values))
    }
}

fn parse_descriptor(raw: &[u8]) -> Result<Field, FormatError> {
    let mut reader = ByteReader::new(raw);
    let name_bytes = reader.take(11)?;
    let name_end = name_bytes
        .iter()
        .position(|byte| *byte == 0)
        .unwrap_or(name_bytes.len());
    let name = String::from_utf8_lossy(name_bytes.get(..name_end).unwrap_or_default())
        .trim()
        .to_owned();
    let kind = reader.u8()?;
    reader.skip(4)?;
    let length = usize::from(reader.u8()?);
    let decimals = reader.u8()?;
    Ok(Field {
        name,
        kind,
        length,
        decimals,
    })
}

fn trim_padding(raw: &[u8]) -> &[u8] {
    let end = raw
        .iter()
        .rposition(|byte| *byte != b' ' && *byte != 0)
        .map_or(0, |last| last + 1);
    raw.get(..end).unwrap_or_default()
}

fn ascii_text(raw: &[u8]) -> Option<&str> {
    std::str::from_utf8(raw).ok().map(str::trim)
}

fn parse_value(field: &Field, raw: &[u8]) -> RawValue {
    match field.kind {
        b'C' => RawValue::Text(trim_padding(raw).to_vec()),
        b'N' | b'F' => parse_number(raw, field.decimals),
        b'L' => match raw.first() {
            Some(b'Y' | b'y' | b'T' | b't') => RawValue::Logical(true),
            Some(b'N' | b'n' | b'F' | b'f') => RawValue::Logical(false),
            _ => RawValue::Null,
        },
        b'D' => ascii_text(raw)
            .and_then(|text| NaiveDate::parse_from_str(text, "%Y%m%d").ok())
            .map_or(RawValue::Null, RawValue::Date),
        b'I' => <[u8; 4]>::try_from(raw)
            .map_or(RawValue::Null, |bytes| RawValue::Integer(i64::from(i32::from_le_bytes(bytes)))),
        b'O' => <[u8; 8]>::try_from(raw)
            .map_or(RawValue::Null, |bytes| RawValue::Number(f64::from_le_bytes(bytes))),
        b'M' => RawValue::Null,
        _ => RawValue::Text(trim_padding(raw).to_vec()),
    }
}

fn parse_number(raw: &[u8], decimals: u8) -> RawValue {
    let Some(text) = ascii_text(raw).filter(|t| !t.is_empty() && !t.starts_with('*')) else {
        return RawValue::Null;
    };
    if decimals == 0
        && let Ok(value) = text.parse::<i64>()
    {
        return RawValue::Integer(value);
    }
    text.parse::<f64>()
        .map_or(RawValue::Null, RawValue::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn field(kind: u8, length: usize, decimals: u8) -> Field {
        Field {
            name: "F".to_owned(),
            kind,
            length,
            decimals,
        }
    }

    #[rstest]
    #[case(b'C', b"Kings  ".as_slice(), 0, RawValue::Text(b"Kings".to_vec()))]
    #[case(b'N', b"   42".as_slice(), 0, RawValue::Integer(42))]
    #[case(b'N', b" 4.25".as_slice(), 2, RawValue::Number(4.25))]
    #[case(b'N', b"     ".as_slice(), 0, RawValue::Null)]
    #[case(b'N', b"*****".as_slice(), 0, RawValue::Null)]
    #[case(b'L', b"T".as_slice(), 0, RawValue::Logical(true))]
    #[case(b'L', b"?".as_slice(), 0, RawValue::Null)]
    #[case(b'D', b"        ".as_slice(), 0, RawValue::Null)]
    #[case(b'M', b"0000000001".as_slice(), 0, RawValue::Null)]
    fn parses_field_values(
        #[case] kind: u8,
        #[case] raw: &[u8],
        #[case] decimals: u8,
        #[case] expected: RawValue,
    ) {
        assert_eq!(parse_value(&field(kind, raw.len(), decimals), raw), expected);
    }

    #[rstest]
    fn parses_dates() {
        let expected = NaiveDate::from_ymd_opt(2011, 1, 31).expect("valid date");
        assert_eq!(
            parse_value(&field(b'D', 8, 0), b"20110131"),
            RawValue::Date(expected)
        );
    }

    #[rstest]
    fn keeps_non_ascii_bytes_undecoded() {
        assert_eq!(
            parse_value(&field(b'C', 6, 0), b"C\xf4te  "),
            RawValue::Text(b"C\xf4te".to_vec())
        );
    }

    #[rstest]
    fn rejects_records_shorter_than_fields() {
        let mut bytes = vec![0_u8; HEADER_LEN];
        if let Some(lengths) = bytes.get_mut(8..12) {
            lengths.copy_from_slice(&[65, 0, 2, 0]);
        }
        let mut descriptor = [0_u8; DESCRIPTOR_LEN];
        descriptor[..4].copy_from_slice(b"NAME");
        descriptor[11] = b'C';
        descriptor[16] = 10;
        bytes.extend_from_slice(&descriptor);
        bytes.push(DESCRIPTOR_TERMINATOR);
        assert!(matches!(
            Table::parse(&bytes),
            Err(FormatError::DbfHeader { .. })
        ));
    }
}
