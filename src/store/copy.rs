//! `COPY ... FROM STDIN` text-format encoding

/// Marker for a NULL column in text format
pub const NULL: &str = "\\N";

/// Accumulates rows in PostgreSQL's COPY text format
#[derive(Debug, Default)]
pub struct CopyEncoder {
    buf: String,
    rows: usize,
}

impl CopyEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one row; `None` columns are written as NULL
    pub fn push_row(&mut self, columns: &[Option<&str>]) {
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                self.buf.push('\t');
            }
            match column {
                Some(value) => escape_into(value, &mut self.buf),
                None => self.buf.push_str(NULL),
            }
        }
        self.buf.push('\n');
        self.rows += 1;
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf.into_bytes()
    }
}

fn escape_into(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
}
