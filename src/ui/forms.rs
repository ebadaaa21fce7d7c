use std::path::PathBuf;

use anyhow::{anyhow, Result};
use chrono::Local;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::models::Reading;

/// Fields of the reading form, in tab order.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) enum ReadingField {
    #[default]
    Date,
    Electricity,
    Gas,
    Water,
}

impl ReadingField {
    pub(crate) const ALL: [ReadingField; 4] = [
        ReadingField::Date,
        ReadingField::Electricity,
        ReadingField::Gas,
        ReadingField::Water,
    ];

    pub(crate) fn label(self) -> &'static str {
        match self {
            ReadingField::Date => "Date",
            ReadingField::Electricity => "Electricity (kWh)",
            ReadingField::Gas => "Gas (m³)",
            ReadingField::Water => "Water (m³)",
        }
    }

    fn placeholder(self) -> &'static str {
        match self {
            ReadingField::Date => "dd.mm.yyyy",
            ReadingField::Electricity => "e.g. 12345.5",
            ReadingField::Gas => "e.g. 8765.3",
            ReadingField::Water => "e.g. 456.8",
        }
    }

    fn index(self) -> usize {
        match self {
            ReadingField::Date => 0,
            ReadingField::Electricity => 1,
            ReadingField::Gas => 2,
            ReadingField::Water => 3,
        }
    }

    fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    fn previous(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// Input state for a new reading. Everything stays text until the user
/// submits, so half-typed numbers like `12,` are fine while editing.
#[derive(Clone, Debug, Default)]
pub(crate) struct ReadingForm {
    pub(crate) date: String,
    pub(crate) electricity: String,
    pub(crate) gas: String,
    pub(crate) water: String,
    pub(crate) active: ReadingField,
    pub(crate) error: Option<String>,
}

impl ReadingForm {
    /// Blank form with the date prefilled.
    pub(crate) fn with_date(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            ..Self::default()
        }
    }

    /// Blank form dated today, `dd.mm.yyyy`.
    pub(crate) fn today() -> Self {
        Self::with_date(today())
    }

    /// Clear the numbers and re-date the form after a successful save. Focus
    /// jumps to the first meter since the date is usually right.
    pub(crate) fn reset(&mut self) {
        *self = Self::today();
        self.active = ReadingField::Electricity;
    }

    pub(crate) fn focus_next(&mut self) {
        self.active = self.active.next();
    }

    pub(crate) fn focus_previous(&mut self) {
        self.active = self.active.previous();
    }

    pub(crate) fn value(&self, field: ReadingField) -> &str {
        match field {
            ReadingField::Date => &self.date,
            ReadingField::Electricity => &self.electricity,
            ReadingField::Gas => &self.gas,
            ReadingField::Water => &self.water,
        }
    }

    fn value_mut(&mut self, field: ReadingField) -> &mut String {
        match field {
            ReadingField::Date => &mut self.date,
            ReadingField::Electricity => &mut self.electricity,
            ReadingField::Gas => &mut self.gas,
            ReadingField::Water => &mut self.water,
        }
    }

    /// Append a character to the active field. Meter fields only take
    /// characters that can be part of a decimal number.
    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        let allowed = match self.active {
            ReadingField::Date => !ch.is_control(),
            _ => ch.is_ascii_digit() || matches!(ch, '.' | ',' | '-'),
        };
        if allowed {
            let field = self.active;
            self.value_mut(field).push(ch);
        }
        allowed
    }

    pub(crate) fn backspace(&mut self) {
        let field = self.active;
        self.value_mut(field).pop();
    }

    /// Validate the inputs and build the reading to store.
    pub(crate) fn parse_inputs(&self) -> Result<Reading> {
        if ReadingField::ALL
            .iter()
            .any(|field| self.value(*field).trim().is_empty())
        {
            return Err(anyhow!("Please fill in all fields."));
        }

        Ok(Reading::new(
            self.date.trim(),
            parse_decimal(&self.electricity)?,
            parse_decimal(&self.gas)?,
            parse_decimal(&self.water)?,
        ))
    }

    /// Render one `Label: value` line, highlighting the focused field.
    pub(crate) fn build_line(&self, field: ReadingField) -> Line<'static> {
        let value = self.value(field);
        let is_active = self.active == field;

        let (display, style) = if value.is_empty() {
            let style = if is_active {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            (String::new(), style)
        } else if is_active {
            (value.to_string(), Style::default().fg(Color::Yellow))
        } else {
            (value.to_string(), Style::default())
        };

        let mut spans = vec![
            Span::raw(format!("{}: ", field.label())),
            Span::styled(display, style),
        ];
        if value.is_empty() {
            spans.push(Span::styled(
                field.placeholder(),
                Style::default().fg(Color::DarkGray),
            ));
        }
        Line::from(spans)
    }

    /// Cursor column offset within the form for the active field.
    pub(crate) fn cursor_offset(&self) -> (u16, u16) {
        let field = self.active;
        let prefix = field.label().chars().count() + 2;
        let column = prefix.saturating_add(self.value(field).chars().count());
        (clamp_to_u16(column), clamp_to_u16(field.index()))
    }
}

/// Accept both `12.5` and `12,5`; reject anything that is not a finite number.
fn parse_decimal(raw: &str) -> Result<f64> {
    let value = raw
        .trim()
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|_| anyhow!("Invalid number entered."))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(anyhow!("Invalid number entered."))
    }
}

fn clamp_to_u16(value: usize) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

/// Today's date the way readings are written down.
pub(crate) fn today() -> String {
    Local::now().format("%d.%m.%Y").to_string()
}

/// Single-line path input used by the settings and new-file dialogs.
#[derive(Clone, Debug, Default)]
pub(crate) struct PathForm {
    pub(crate) value: String,
    pub(crate) error: Option<String>,
}

impl PathForm {
    pub(crate) fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            error: None,
        }
    }

    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        self.value.push(ch);
        true
    }

    pub(crate) fn backspace(&mut self) {
        self.value.pop();
    }

    pub(crate) fn parse_input(&self) -> Result<String> {
        let trimmed = self.value.trim();
        if trimmed.is_empty() {
            Err(anyhow!("Please enter a valid file path."))
        } else {
            Ok(trimmed.to_string())
        }
    }

    /// Cursor column for the value drawn after a `prefix_len`-wide label.
    pub(crate) fn cursor_column(&self, prefix_len: usize) -> u16 {
        clamp_to_u16(prefix_len.saturating_add(self.value.chars().count()))
    }
}

/// A path waiting for a yes/no answer before the session touches it.
#[derive(Clone, Debug)]
pub(crate) struct PendingPath {
    /// What the user typed, passed back to the session unchanged.
    pub(crate) hint: String,
    /// Where that hint points, for the confirmation message.
    pub(crate) target: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(date: &str, electricity: &str, gas: &str, water: &str) -> ReadingForm {
        ReadingForm {
            date: date.to_string(),
            electricity: electricity.to_string(),
            gas: gas.to_string(),
            water: water.to_string(),
            ..ReadingForm::default()
        }
    }

    #[test]
    fn complete_form_parses() {
        let form = filled("01.01.2024", "100", "50.5", "10");

        let reading = form.parse_inputs().unwrap();

        assert_eq!(reading, Reading::new("01.01.2024", 100.0, 50.5, 10.0));
    }

    #[test]
    fn comma_decimal_is_accepted() {
        let form = filled("01.01.2024", "12345,5", "8765,3", "456,8");

        let reading = form.parse_inputs().unwrap();

        assert_eq!(reading.electricity, 12345.5);
        assert_eq!(reading.water, 456.8);
    }

    #[test]
    fn missing_field_is_rejected() {
        let form = filled("01.01.2024", "100", "  ", "10");

        let err = form.parse_inputs().unwrap_err();

        assert_eq!(err.to_string(), "Please fill in all fields.");
    }

    #[test]
    fn non_numeric_value_is_rejected() {
        let form = filled("01.01.2024", "1.2.3", "50", "10");

        let err = form.parse_inputs().unwrap_err();

        assert_eq!(err.to_string(), "Invalid number entered.");
    }

    #[test]
    fn infinity_is_not_a_reading() {
        let form = filled("01.01.2024", "inf", "50", "10");

        assert!(form.parse_inputs().is_err());
    }

    #[test]
    fn meter_fields_ignore_letters() {
        let mut form = ReadingForm::with_date("01.01.2024");
        form.active = ReadingField::Gas;

        assert!(!form.push_char('x'));
        assert!(form.push_char('4'));
        assert!(form.push_char(','));
        assert!(form.push_char('2'));

        assert_eq!(form.gas, "4,2");
    }

    #[test]
    fn focus_cycles_through_all_fields() {
        let mut form = ReadingForm::default();
        let mut seen = vec![form.active];
        for _ in 0..3 {
            form.focus_next();
            seen.push(form.active);
        }
        form.focus_next();

        assert_eq!(seen, ReadingField::ALL.to_vec());
        assert_eq!(form.active, ReadingField::Date);
        form.focus_previous();
        assert_eq!(form.active, ReadingField::Water);
    }

    #[test]
    fn reset_clears_numbers_and_redates() {
        let mut form = filled("01.01.2000", "1", "2", "3");

        form.reset();

        assert_eq!(form.date, today());
        assert!(form.electricity.is_empty() && form.gas.is_empty() && form.water.is_empty());
        assert_eq!(form.active, ReadingField::Electricity);
    }

    #[test]
    fn blank_path_is_rejected() {
        assert!(PathForm::with_value("   ").parse_input().is_err());
        assert_eq!(
            PathForm::with_value(" ~/zaehler.json ").parse_input().unwrap(),
            "~/zaehler.json"
        );
    }

    #[test]
    fn cursor_math_saturates_on_huge_input() {
        let mut form = ReadingForm::with_date("01.01.2024");
        form.active = ReadingField::Water;
        form.water = "9".repeat(100_000);
        assert_eq!(form.cursor_offset(), (u16::MAX, 3));

        let path = PathForm::with_value("a".repeat(100_000));
        assert_eq!(path.cursor_column(6), u16::MAX);
        assert_eq!(PathForm::with_value("abc").cursor_column(6), 9);
    }
}
