//! Streaming fact extraction from XBRL instance documents.

use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use screener_core::{FilingParser, RawFinancialReport, ReportFile, Result, ScreenerError};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Element carrying the reporting period end of the document (`dei` taxonomy).
const PERIOD_END_ELEMENT: &[u8] = b"DocumentPeriodEndDate";

/// A numeric fact candidate collected while reading.
#[derive(Debug)]
struct Fact {
    tag: String,
    context: String,
    nil: bool,
    text: String,
}

/// Element whose text is a date being read.
#[derive(Debug)]
enum DateText {
    /// `endDate` or `instant` of the named context.
    ContextEnd(String),
    /// The document period end.
    PeriodEnd,
}

/// Reads facts for a fixed set of tag names from an instance document.
///
/// Tags are matched on their local name, so `us-gaap:Assets` matches `Assets`.
/// Nil values, non-numeric text and facts bound to a context with a
/// dimensional `segment` are skipped. Decimal values are truncated toward zero.
///
/// When a tag appears more than once, the first usable fact whose context ends
/// on the document period end (`dei:DocumentPeriodEndDate`) is kept, so
/// prior-year comparatives never shadow current figures. Without such a fact,
/// or without a period end in the document, the first usable fact in document
/// order is kept.
#[derive(Clone, Copy, Debug, Default)]
pub struct XbrlFactParser;

impl XbrlFactParser {
    /// Create a parser.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Parses facts from any buffered reader.
    ///
    /// # Errors
    /// Returns [`ScreenerError::Parse`] if the document is not well-formed XML.
    pub fn parse_reader<R: std::io::BufRead>(
        reader: R,
        tags: &HashSet<String>,
    ) -> Result<HashMap<String, i64>> {
        let mut reader = Reader::from_reader(reader);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut dimensional = HashSet::new();
        let mut context_ends: HashMap<String, String> = HashMap::new();
        let mut period_end: Option<String> = None;
        let mut context: Option<String> = None;
        let mut date: Option<DateText> = None;
        let mut current: Option<Fact> = None;
        let mut facts = Vec::new();

        loop {
            let event = reader.read_event_into(&mut buf).map_err(|e| {
                ScreenerError::Parse(format!(
                    "XML error at position {}: {e}",
                    reader.buffer_position()
                ))
            })?;

            match event {
                Event::Start(ref e) => match e.local_name().as_ref() {
                    b"context" => context = attribute(e, b"id")?,
                    b"segment" => mark_dimensional(&context, &mut dimensional),
                    b"endDate" | b"instant" => date = context.clone().map(DateText::ContextEnd),
                    PERIOD_END_ELEMENT => date = Some(DateText::PeriodEnd),
                    name => {
                        if let Some(fact) = start_fact(e, name, tags)? {
                            current = Some(fact);
                        }
                    }
                },
                Event::Empty(ref e) => {
                    if e.local_name().as_ref() == b"segment" {
                        mark_dimensional(&context, &mut dimensional);
                    }
                }
                Event::Text(ref t) if current.is_some() || date.is_some() => {
                    let text = t
                        .unescape()
                        .map_err(|e| ScreenerError::Parse(e.to_string()))?;
                    if let Some(fact) = current.as_mut() {
                        fact.text.push_str(&text);
                    }
                    match date.take() {
                        Some(DateText::ContextEnd(id)) => {
                            context_ends.insert(id, text.trim().to_string());
                        }
                        Some(DateText::PeriodEnd) => period_end = Some(text.trim().to_string()),
                        None => {}
                    }
                }
                Event::End(ref e) => match e.local_name().as_ref() {
                    b"context" => context = None,
                    b"endDate" | b"instant" | PERIOD_END_ELEMENT => date = None,
                    name => {
                        if current.as_ref().is_some_and(|f| f.tag.as_bytes() == name) {
                            facts.extend(current.take());
                        }
                    }
                },
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        // Tag -> (value, context ends on the period end)
        let mut chosen: HashMap<String, (i64, bool)> = HashMap::new();
        for fact in facts {
            if fact.nil || dimensional.contains(&fact.context) {
                continue;
            }
            let Some(value) = parse_value(&fact.text) else {
                debug!(tag = %fact.tag, text = %fact.text, "Skipping non-numeric fact");
                continue;
            };
            let current = period_end
                .as_ref()
                .is_some_and(|end| context_ends.get(&fact.context) == Some(end));
            let replace = match chosen.get(&fact.tag) {
                Some(&(_, chosen_current)) => current && !chosen_current,
                None => true,
            };
            if replace {
                chosen.insert(fact.tag, (value, current));
            }
        }

        Ok(chosen
            .into_iter()
            .map(|(tag, (value, _))| (tag, value))
            .collect())
    }

    fn parse_file(path: &Path, tags: &HashSet<String>) -> Result<HashMap<String, i64>> {
        let file = File::open(path)?;
        Self::parse_reader(BufReader::new(file), tags)
    }
}

#[async_trait]
impl FilingParser for XbrlFactParser {
    async fn parse(
        &self,
        path: &Path,
        report_file: &ReportFile,
        tags: &[&str],
    ) -> Result<RawFinancialReport> {
        let period = report_file.period()?;
        let owned_path: PathBuf = path.to_path_buf();
        let wanted: HashSet<String> = tags.iter().map(|t| (*t).to_string()).collect();

        let raw_fields = tokio::task::spawn_blocking(move || Self::parse_file(&owned_path, &wanted))
            .await
            .map_err(|e| ScreenerError::Other(format!("Parser task failed: {e}")))??;

        debug!(
            cik = report_file.cik,
            path = %path.display(),
            facts = raw_fields.len(),
            "Parsed instance document"
        );

        let mut report = RawFinancialReport::new(report_file.cik, period);
        report.raw_fields = raw_fields;
        Ok(report)
    }
}

fn attribute(e: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| ScreenerError::Parse(err.to_string()))?;
        if attr.key.local_name().as_ref() == name {
            let value = attr
                .unescape_value()
                .map_err(|err| ScreenerError::Parse(err.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn mark_dimensional(context: &Option<String>, dimensional: &mut HashSet<String>) {
    if let Some(id) = context {
        dimensional.insert(id.clone());
    }
}

fn start_fact(e: &BytesStart<'_>, local: &[u8], tags: &HashSet<String>) -> Result<Option<Fact>> {
    let Ok(tag) = std::str::from_utf8(local) else {
        return Ok(None);
    };
    if !tags.contains(tag) {
        return Ok(None);
    }
    let Some(context) = attribute(e, b"contextRef")? else {
        return Ok(None);
    };
    let nil = attribute(e, b"nil")?.is_some_and(|v| v == "true");

    Ok(Some(Fact {
        tag: tag.to_string(),
        context,
        nil,
        text: String::new(),
    }))
}

fn parse_value(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(value) = text.parse::<i64>() {
        return Some(value);
    }
    let value = text.parse::<f64>().ok().filter(|v| v.is_finite())?;
    // `as` truncates toward zero and saturates at the i64 bounds.
    Some(value as i64)
}
