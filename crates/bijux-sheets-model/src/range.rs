// SPDX-License-Identifier: Apache-2.0

use std::borrow::Cow;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RangeError {
    EmptySheetName,
    ZeroRow,
}

impl Display for RangeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySheetName => f.write_str("sheet name must not be empty"),
            Self::ZeroRow => f.write_str("sheet rows are 1-based; row 0 does not exist"),
        }
    }
}

impl std::error::Error for RangeError {}

/// Which cells of a sheet a range covers. Columns are 0-based, rows 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSpan {
    Sheet,
    Columns {
        first: u32,
        last: u32,
    },
    Cells {
        first_col: u32,
        last_col: u32,
        first_row: u32,
        last_row: u32,
    },
}

/// An A1-notation range such as `DB`, `DB!A:A` or `DB!A5:C5`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRange {
    sheet: String,
    span: RangeSpan,
}

impl SheetRange {
    pub fn sheet(name: &str) -> Result<Self, RangeError> {
        Self::build(name, RangeSpan::Sheet)
    }

    pub fn columns(name: &str, first: u32, last: u32) -> Result<Self, RangeError> {
        Self::build(
            name,
            RangeSpan::Columns {
                first: first.min(last),
                last: first.max(last),
            },
        )
    }

    pub fn row(name: &str, first_col: u32, last_col: u32, row: u32) -> Result<Self, RangeError> {
        if row == 0 {
            return Err(RangeError::ZeroRow);
        }
        Self::build(
            name,
            RangeSpan::Cells {
                first_col: first_col.min(last_col),
                last_col: first_col.max(last_col),
                first_row: row,
                last_row: row,
            },
        )
    }

    fn build(name: &str, span: RangeSpan) -> Result<Self, RangeError> {
        if name.is_empty() {
            return Err(RangeError::EmptySheetName);
        }
        Ok(Self {
            sheet: name.to_string(),
            span,
        })
    }

    #[must_use]
    pub fn sheet_name(&self) -> &str {
        &self.sheet
    }

    #[must_use]
    pub fn span(&self) -> RangeSpan {
        self.span
    }

    #[must_use]
    pub fn a1(&self) -> String {
        self.to_string()
    }
}

impl Display for SheetRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let sheet = quote_sheet_name(&self.sheet);
        match self.span {
            RangeSpan::Sheet => f.write_str(&sheet),
            RangeSpan::Columns { first, last } => write!(
                f,
                "{sheet}!{}:{}",
                column_letters(first),
                column_letters(last)
            ),
            RangeSpan::Cells {
                first_col,
                last_col,
                first_row,
                last_row,
            } => write!(
                f,
                "{sheet}!{}{first_row}:{}{last_row}",
                column_letters(first_col),
                column_letters(last_col)
            ),
        }
    }
}

fn quote_sheet_name(name: &str) -> Cow<'_, str> {
    if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("'{}'", name.replace('\'', "''")))
    }
}

/// `0 -> A`, `25 -> Z`, `26 -> AA`.
#[must_use]
pub fn column_letters(index: u32) -> String {
    let mut n = u64::from(index) + 1;
    let mut out = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        out.push(b'A' + rem);
        n = (n - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Inverse of [`column_letters`]; accepts upper or lower case.
#[must_use]
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    let mut n: u64 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = u64::from(c.to_ascii_uppercase() as u8 - b'A') + 1;
        n = n.checked_mul(26)?.checked_add(digit)?;
        if n > u64::from(u32::MAX) + 1 {
            return None;
        }
    }
    u32::try_from(n - 1).ok()
}
