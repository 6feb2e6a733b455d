//! `COPY ... FROM STDIN` text format encoding.

use bytes::{BufMut, BytesMut};

use crate::core::{Row, SqlValue};

/// Text-format marker for NULL.
const NULL: &str = "\\N";

/// Append one row per line, tab separated, values in `fields` order.
/// Fields missing from a row are written as NULL.
pub(crate) fn encode_rows(buf: &mut BytesMut, fields: &[&str], rows: &[Row]) {
    for row in rows {
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                buf.put_u8(b'\t');
            }
            match row.get(field) {
                Some(value) => encode_value(buf, value),
                None => buf.put_slice(NULL.as_bytes()),
            }
        }
        buf.put_u8(b'\n');
    }
}

fn encode_value(buf: &mut BytesMut, value: &SqlValue) {
    match value {
        SqlValue::Null => buf.put_slice(NULL.as_bytes()),
        SqlValue::Bool(b) => buf.put_u8(if *b { b't' } else { b'f' }),
        SqlValue::Int(i) => buf.put_slice(i.to_string().as_bytes()),
        SqlValue::Float(f) => buf.put_slice(float_text(*f).as_bytes()),
        SqlValue::Text(s) => escape_into(buf, s),
        // bytea hex input; the backslash itself is escaped for COPY.
        SqlValue::Bytes(b) => {
            buf.put_slice(b"\\\\x");
            buf.put_slice(hex::encode(b).as_bytes());
        }
        SqlValue::Timestamp(ts) => {
            buf.put_slice(ts.format("%Y-%m-%d %H:%M:%S%.f").to_string().as_bytes())
        }
    }
}

fn float_text(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        f.to_string()
    }
}

/// Escape backslash, tab, newline and carriage return.
fn escape_into(buf: &mut BytesMut, s: &str) {
    buf.reserve(s.len());
    for c in s.chars() {
        match c {
            '\\' => buf.put_slice(b"\\\\"),
            '\t' => buf.put_slice(b"\\t"),
            '\n' => buf.put_slice(b"\\n"),
            '\r' => buf.put_slice(b"\\r"),
            _ => {
                let mut utf8 = [0u8; 4];
                buf.put_slice(c.encode_utf8(&mut utf8).as_bytes());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn encode(fields: &[&str], rows: &[Row]) -> String {
        let mut buf = BytesMut::new();
        encode_rows(&mut buf, fields, rows);
        String::from_utf8(buf.to_vec()).unwrap()
    }

    #[test]
    fn test_escapes_text() {
        let row = Row::new().with("s", "tab\there\nnew\\line\r");
        assert_eq!(encode(&["s"], &[row]), "tab\\there\\nnew\\\\line\\r\n");
    }

    #[test]
    fn test_scalars_and_nulls() {
        let ts = NaiveDate::from_ymd_opt(2020, 5, 17)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        let row = Row::new()
            .with("id", 7i64)
            .with("ok", true)
            .with("ratio", 0.5f64)
            .with("gone", SqlValue::Null)
            .with("at", ts)
            .with("raw", vec![0xde_u8, 0xad]);
        assert_eq!(
            encode(&["id", "ok", "ratio", "gone", "missing", "at", "raw"], &[row]),
            "7\tt\t0.5\t\\N\t\\N\t2020-05-17 08:30:00\t\\\\xdead\n"
        );
    }

    #[test]
    fn test_special_floats() {
        assert_eq!(float_text(f64::NAN), "NaN");
        assert_eq!(float_text(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(float_text(1.25), "1.25");
    }

    #[test]
    fn test_real_values_keep_their_decimal_text() {
        let rows = vec![Row::new().with("ratio", 0.1f32)];
        let mut buf = BytesMut::new();
        encode_rows(&mut buf, &["ratio"], &rows);
        assert_eq!(&buf[..], b"0.1\n");
    }
}
