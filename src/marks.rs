//! Marks, totals and letter grades.

/// Full marks of one marksheet component (theory, practical, typing).
pub const FULL_MARKS: i64 = 100;

/// Highest typing speed accepted, in words per minute.
pub const MAX_WPM: i64 = 300;

/// Letter grade for a summed mark.
///
/// | total  | grade |
/// |--------|-------|
/// | >= 90  | A+    |
/// | >= 80  | A     |
/// | >= 70  | B+    |
/// | >= 60  | B     |
/// | >= 50  | C     |
/// | >= 40  | D     |
/// | < 40   | Fail  |
pub fn grade(total: i64) -> &'static str {
    match total {
        t if t >= 90 => "A+",
        t if t >= 80 => "A",
        t if t >= 70 => "B+",
        t if t >= 60 => "B",
        t if t >= 50 => "C",
        t if t >= 40 => "D",
        _ => "Fail",
    }
}

/// Derived marks for one student after an update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkSheet {
    pub theory: i64,
    pub practical: i64,
    pub total: i64,
    pub grade: &'static str,
    pub typing_marks: i64,
    pub typing_wpm: i64,
    pub typing_grade: &'static str,
}

impl MarkSheet {
    /// Submitted values win, then stored values, then zero.
    ///
    /// Fails only when stored values are too large to add up.
    pub fn compute(submitted: MarkInput, stored: MarkInput) -> Result<MarkSheet, String> {
        let theory = submitted.theory.or(stored.theory).unwrap_or(0);
        let practical = submitted.practical.or(stored.practical).unwrap_or(0);
        let typing_marks = submitted.typing_marks.or(stored.typing_marks).unwrap_or(0);
        let typing_wpm = submitted.typing_wpm.or(stored.typing_wpm).unwrap_or(0);
        let total = theory
            .checked_add(practical)
            .ok_or_else(|| format!("Marks {} + {} are out of range", theory, practical))?;
        Ok(MarkSheet {
            theory,
            practical,
            total,
            grade: grade(total),
            typing_marks,
            typing_wpm,
            typing_grade: grade(typing_marks),
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MarkInput {
    pub theory: Option<i64>,
    pub practical: Option<i64>,
    pub typing_marks: Option<i64>,
    pub typing_wpm: Option<i64>,
}

/// Parse a submitted value in `0..=max`; blank means "not submitted".
pub fn parse_mark(field: &str, raw: Option<&str>, max: i64) -> Result<Option<i64>, String> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };
    match raw.parse::<i64>() {
        Ok(value) if (0..=max).contains(&value) => Ok(Some(value)),
        Ok(_) => Err(format!("`{}` must be between 0 and {}, got `{}`", field, max, raw)),
        Err(_) => Err(format!(
            "`{}` must be a whole number of marks, got `{}`",
            field, raw
        )),
    }
}
