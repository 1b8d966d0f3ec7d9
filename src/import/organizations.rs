//! Organization export decoder
//!
//! Streams the register's XML export (plain or bzip2 compressed) and yields
//! one `Organization` per `interestRepresentative` element. Only the current
//! element is held in memory.

use super::source::ImportError;
use crate::types::{CountryTables, Organization};
use bzip2::read::BzDecoder;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Element holding one organization
pub const RECORD_ELEMENT: &str = "interestRepresentative";

/// Buffered reader over an export file, decompressing if needed
pub type ExportReader = BufReader<Box<dyn Read + Send>>;

/// Streaming source of organizations
pub struct OrganizationSource<R> {
    name: String,
    reader: Reader<R>,
    countries: Arc<CountryTables>,
    unmatched_countries: usize,
    finished: bool,
}

/// Fields collected while inside one record element
#[derive(Debug, Default)]
struct PartialOrganization {
    identification_code: Option<String>,
    name: String,
    country: String,
    legal_status: String,
    registration_date: Option<String>,
    last_update_date: Option<String>,
}

impl PartialOrganization {
    /// Store a leaf value by its path below the record element
    fn set(&mut self, path: &str, value: String) {
        match path {
            "identificationCode" => self.identification_code = Some(value),
            "name/originalName" => self.name = value,
            "contactDetails/country" => self.country = value,
            "legalStatus" => self.legal_status = value,
            "registrationDate" => self.registration_date = Some(value),
            "lastUpdateDate" => self.last_update_date = Some(value),
            _ => {}
        }
    }

    fn into_organization(self, countries: &CountryTables) -> Result<Organization, ImportError> {
        let code = self
            .identification_code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                ImportError::InvalidRecord(format!(
                    "{} without identificationCode (name {:?})",
                    RECORD_ELEMENT, self.name
                ))
            })?;

        let registered_at = required_timestamp(&code, "registrationDate", self.registration_date)?;
        let updated_at = required_timestamp(&code, "lastUpdateDate", self.last_update_date)?;
        let country_id = countries.id_for_name(&self.country);

        Ok(Organization {
            identification_code: code,
            name: self.name,
            country_name: self.country,
            country_id,
            legal_status: self.legal_status,
            registered_at,
            updated_at,
        })
    }
}

fn required_timestamp(
    code: &str,
    field: &str,
    value: Option<String>,
) -> Result<DateTime<Utc>, ImportError> {
    let value = value.unwrap_or_default();
    parse_timestamp(&value).ok_or_else(|| {
        ImportError::InvalidRecord(format!("{}: invalid {} {:?}", code, field, value))
    })
}

/// Parse an export timestamp.
///
/// Accepts RFC 3339, ISO 8601 without offset (taken as UTC) and plain dates.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = value.parse::<NaiveDateTime>() {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn local_name(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}

impl OrganizationSource<ExportReader> {
    /// Open an export file; `.bz2` files are decompressed on the fly
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ImportError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let is_bz2 = path.extension().is_some_and(|e| e == "bz2");

        let inner: Box<dyn Read + Send> = if is_bz2 {
            Box::new(BzDecoder::new(file))
        } else {
            Box::new(file)
        };
        let reader = BufReader::with_capacity(1024 * 1024, inner); // 1MB buffer

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("organization export")
            .to_string();
        Ok(Self::from_reader(reader).with_name(name))
    }
}

impl<R: BufRead> OrganizationSource<R> {
    /// Decode from any buffered reader
    pub fn from_reader(reader: R) -> Self {
        Self {
            name: "organization export".to_string(),
            reader: Reader::from_reader(reader),
            countries: Arc::new(CountryTables::default()),
            unmatched_countries: 0,
            finished: false,
        }
    }

    /// Set the country snapshot used for enrichment
    pub fn with_countries(mut self, countries: Arc<CountryTables>) -> Self {
        self.countries = countries;
        self
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn source_name(&self) -> &str {
        &self.name
    }

    /// Records so far whose country name was not in the lookup table
    pub fn unmatched_countries(&self) -> usize {
        self.unmatched_countries
    }

    /// Read events until the next record element has been decoded
    fn next_record(&mut self) -> Result<Option<Organization>, ImportError> {
        // Local names below the record element, outermost first
        let mut path: Vec<String> = Vec::new();
        let mut text = String::new();
        let mut record: Option<PartialOrganization> = None;
        let mut buf = Vec::with_capacity(8192);

        loop {
            buf.clear();
            match self.reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => {
                    let name = local_name(e.local_name().as_ref());
                    if record.is_some() {
                        path.push(name);
                        text.clear();
                    } else if name == RECORD_ELEMENT {
                        record = Some(PartialOrganization::default());
                    }
                }
                Event::Empty(ref e) => {
                    if record.is_none() && e.local_name().as_ref() == RECORD_ELEMENT.as_bytes() {
                        return Err(ImportError::InvalidRecord(format!(
                            "empty {} element",
                            RECORD_ELEMENT
                        )));
                    }
                }
                Event::Text(ref e) => {
                    if record.is_some() {
                        let unescaped = e.unescape()?;
                        text.push_str(&unescaped);
                    }
                }
                Event::CData(ref e) => {
                    if record.is_some() {
                        text.push_str(&String::from_utf8_lossy(&e.to_vec()));
                    }
                }
                Event::End(_) => {
                    let Some(partial) = record.as_mut() else {
                        continue;
                    };
                    if path.is_empty() {
                        // closing the record element itself
                        let partial = std::mem::take(partial);
                        return self.finish(partial).map(Some);
                    }
                    partial.set(&path.join("/"), text.trim().to_string());
                    path.pop();
                    text.clear();
                }
                Event::Eof => {
                    if record.is_some() {
                        return Err(ImportError::XmlParse(format!(
                            "unexpected end of document inside {}",
                            RECORD_ELEMENT
                        )));
                    }
                    return Ok(None);
                }
                _ => {}
            }
        }
    }

    fn finish(&mut self, partial: PartialOrganization) -> Result<Organization, ImportError> {
        let org = partial.into_organization(&self.countries)?;
        if org.country_id.is_none() {
            self.unmatched_countries += 1;
            debug!(
                "No country match for {:?} ({})",
                org.country_name, org.identification_code
            );
        }
        Ok(org)
    }
}

impl<R: BufRead> Iterator for OrganizationSource<R> {
    type Item = Result<Organization, ImportError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_record() {
            Ok(Some(org)) => Some(Ok(org)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
