//! Quarterly full-index parsing.
//!
//! An `xbrl.idx` file starts with a free-form header that ends at a line of
//! dashes, followed by one filing per line:
//!
//! ```text
//! CIK|Company Name|Form Type|Date Filed|Filename
//! --------------------------------------------------------------------------------
//! 1000045|NICHOLAS FINANCIAL INC|10-Q|2020-02-14|edgar/data/1000045/0001564590-20-005185.txt
//! ```
//!
//! [`IndexParser`] is fed raw body chunks as they arrive and only ever buffers
//! one line, capped at [`MAX_LINE_LEN`] bytes.

use screener_core::{Result, ScreenerError};

/// Longest accepted index line in bytes, excluding the newline.
pub const MAX_LINE_LEN: usize = 4096;

/// Marker that ends the header.
const HEADER_END: &str = "-------";

/// One filing row of a quarterly index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexRecord {
    /// CIK exactly as listed (may carry leading zeros).
    pub cik: String,
    /// Company name.
    pub company_name: String,
    /// Form type (e.g., "10-K", "10-Q/A").
    pub form_type: String,
    /// Filing date as listed.
    pub date_filed: String,
    /// Archive-relative path of the filing's `.txt` document.
    pub filename: String,
}

impl IndexRecord {
    /// Parses the CIK as a base-10 integer.
    ///
    /// # Errors
    /// Returns [`ScreenerError::InvalidCik`] if the CIK is not an integer.
    pub fn cik_number(&self) -> Result<i64> {
        self.cik
            .parse::<i64>()
            .map_err(|_| ScreenerError::InvalidCik(self.cik.clone()))
    }
}

/// Position of the parser within an index file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParseState {
    /// Before the dashed separator line.
    #[default]
    Header,
    /// Filing rows.
    List,
}

/// Incremental two-state index parser.
///
/// Each completed line yields at most one item: `Ok` for a filing row, `Err`
/// for a malformed row or an overlong line. Header lines and blank lines yield
/// nothing.
#[derive(Debug, Default)]
pub struct IndexParser {
    state: ParseState,
    line: Vec<u8>,
    overlong: bool,
}

impl IndexParser {
    /// Create a parser positioned at the start of the header.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> ParseState {
        self.state
    }

    /// Feeds a chunk of the body and returns the items for every line it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<IndexRecord>> {
        let mut items = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            self.append(&rest[..pos]);
            items.extend(self.take_line());
            rest = &rest[pos + 1..];
        }
        self.append(rest);

        items
    }

    /// Flushes a final line that was not terminated by a newline.
    pub fn finish(&mut self) -> Option<Result<IndexRecord>> {
        if self.line.is_empty() && !self.overlong {
            return None;
        }
        self.take_line()
    }

    /// Classifies one complete line.
    pub fn push_line(&mut self, line: &str) -> Option<Result<IndexRecord>> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        match self.state {
            ParseState::Header => {
                if line.contains(HEADER_END) {
                    self.state = ParseState::List;
                }
                None
            }
            ParseState::List => {
                if line.trim().is_empty() {
                    return None;
                }
                Some(parse_row(line))
            }
        }
    }

    fn append(&mut self, bytes: &[u8]) {
        if self.overlong {
            return;
        }
        // One byte of slack for the `\r` of a CRLF ending.
        if self.line.len() + bytes.len() > MAX_LINE_LEN + 1 {
            self.overlong = true;
            self.line.clear();
        } else {
            self.line.extend_from_slice(bytes);
        }
    }

    fn take_line(&mut self) -> Option<Result<IndexRecord>> {
        let content_len = match self.line.last() {
            Some(b'\r') => self.line.len() - 1,
            _ => self.line.len(),
        };
        if self.overlong || content_len > MAX_LINE_LEN {
            self.overlong = false;
            self.line.clear();
            return Some(Err(ScreenerError::LineTooLong {
                limit: MAX_LINE_LEN,
            }));
        }
        let bytes = std::mem::take(&mut self.line);
        let line = String::from_utf8_lossy(&bytes);
        self.push_line(&line)
    }
}

fn parse_row(line: &str) -> Result<IndexRecord> {
    let fields: Vec<&str> = line.split('|').collect();
    let [cik, company_name, form_type, date_filed, filename] = fields[..] else {
        return Err(ScreenerError::MalformedRow {
            fields: fields.len(),
        });
    };

    Ok(IndexRecord {
        cik: cik.to_string(),
        company_name: company_name.to_string(),
        form_type: form_type.to_string(),
        date_filed: date_filed.to_string(),
        filename: filename.to_string(),
    })
}

/// Parses a complete index held in memory.
pub fn parse_index(text: &str) -> Vec<Result<IndexRecord>> {
    let mut parser = IndexParser::new();
    let mut items = parser.feed(text.as_bytes());
    items.extend(parser.finish());
    items
}
