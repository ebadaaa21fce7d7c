//! Semicolon-separated export in the regional spreadsheet convention: decimal
//! commas, German column titles, `\r\n` line endings.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::models::{plain_decimal, Reading};

pub const CSV_HEADER: [&str; 4] = ["Datum", "Strom (kWh)", "Gas (m³)", "Wasser (m³)"];
const DELIMITER: char = ';';
const LINE_END: &str = "\r\n";

/// Render the whole export, header included, in collection order.
pub fn render_csv(readings: &[Reading]) -> String {
    let mut out = String::new();
    push_row(&mut out, CSV_HEADER.iter().map(|title| Cow::Borrowed(*title)));
    for reading in readings {
        push_row(
            &mut out,
            [
                Cow::Borrowed(reading.date.as_str()),
                Cow::Owned(decimal_comma(reading.electricity)),
                Cow::Owned(decimal_comma(reading.gas)),
                Cow::Owned(decimal_comma(reading.water)),
            ],
        );
    }
    out
}

/// `1234.5` becomes `1234,5`.
pub fn decimal_comma(value: f64) -> String {
    plain_decimal(value).replace('.', ",")
}

/// `<dir>/zaehlerstaende_YYYYmmdd_HHMMSS.csv`, with `_2`, `_3`, ... appended
/// when an export from the same second is already there.
pub fn default_export_path(dir: &Path, now: DateTime<Local>) -> PathBuf {
    let stem = format!("zaehlerstaende_{}", now.format("%Y%m%d_%H%M%S"));
    let mut candidate = dir.join(format!("{stem}.csv"));
    let mut counter = 2;
    while candidate.exists() {
        candidate = dir.join(format!("{stem}_{counter}.csv"));
        counter += 1;
    }
    candidate
}

fn push_row<'a>(out: &mut String, fields: impl IntoIterator<Item = Cow<'a, str>>) {
    for (idx, field) in fields.into_iter().enumerate() {
        if idx > 0 {
            out.push(DELIMITER);
        }
        out.push_str(&quote_field(&field));
    }
    out.push_str(LINE_END);
}

/// Quote only when the field would otherwise break the row.
fn quote_field(field: &str) -> Cow<'_, str> {
    if field.contains(&[DELIMITER, '"', '\r', '\n'][..]) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}
