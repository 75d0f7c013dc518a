use chrono::{DateTime, Local};

use crate::model::{RenderedTable, TableRow};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }

    pub fn glyph(self) -> &'static str {
        match self {
            Self::Ascending => "▲",
            Self::Descending => "▼",
        }
    }
}

/// Direction of the last sort. Unset until the control is first activated.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct SortState {
    direction: Option<SortDirection>,
}

impl SortState {
    pub fn direction(&self) -> Option<SortDirection> {
        self.direction
    }

    fn next(&self) -> SortDirection {
        self.direction
            .map(SortDirection::flipped)
            .unwrap_or(SortDirection::Ascending)
    }
}

/// A rendered table with one designated sortable column.
///
/// Sort state survives row replacement, but a replacement always shows rows in
/// fetch order until the next activation.
#[derive(Debug, Clone)]
pub struct SortableTable {
    column: String,
    table: RenderedTable,
    state: SortState,
}

impl SortableTable {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            table: RenderedTable::default(),
            state: SortState::default(),
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn table(&self) -> &RenderedTable {
        &self.table
    }

    pub fn state(&self) -> SortState {
        self.state
    }

    pub fn replace(&mut self, table: RenderedTable) {
        self.table = table;
    }

    /// Flips the direction and stably reorders rows by `key`. Empty tables are left alone.
    pub fn toggle_sort<K, F>(&mut self, key: F) -> Option<SortDirection>
    where
        K: Ord,
        F: Fn(&TableRow) -> K,
    {
        if self.table.is_empty() {
            return None;
        }

        let direction = self.state.next();
        self.state.direction = Some(direction);
        match direction {
            SortDirection::Ascending => self.table.rows.sort_by_key(|row| key(row)),
            SortDirection::Descending => self
                .table
                .rows
                .sort_by(|left, right| key(right).cmp(&key(left))),
        }
        Some(direction)
    }

    /// Sorts on the designated column's raw captured value, parsed as an instant.
    pub fn toggle_timestamp_sort(&mut self) -> Option<SortDirection> {
        let column = self.column.clone();
        self.toggle_sort(|row| row.data(&column).and_then(parse_instant))
    }

    pub fn indicator(&self) -> &'static str {
        self.state.direction().map(SortDirection::glyph).unwrap_or("")
    }
}

/// Milliseconds since the epoch for RFC 3339, RFC 2822 or bare epoch-millisecond input.
pub fn parse_instant(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .map(|instant| instant.timestamp_millis())
        .ok()
        .or_else(|| raw.parse::<i64>().ok())
}

/// Local wall-clock rendering of a raw timestamp; unparseable input is shown as-is.
pub fn local_display(raw: &str) -> String {
    let Some(millis) = parse_instant(raw) else {
        return raw.to_string();
    };

    DateTime::from_timestamp_millis(millis)
        .map(|instant| {
            instant
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| raw.to_string())
}
