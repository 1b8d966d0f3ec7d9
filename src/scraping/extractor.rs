//! Row extraction for meeting listing tables
//!
//! Every function here is total: a missing or malformed cell degrades to an
//! empty field instead of failing the row. Two listings share the same table
//! markup but differ in column layout:
//!
//! | listing   | columns                                              |
//! |-----------|------------------------------------------------------|
//! | by leader | date + cancellation, location, entities, subject     |
//! | by member | members, date + cancellation, location, entities, subject |

use super::resolver::EntityResolver;
use crate::types::{EntityRef, Meeting, Participants};
use chrono::NaiveDate;
use regex_lite::Regex;
use scraper::{ElementRef, Node};
use std::sync::OnceLock;

fn date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{2}/\d{2}/\d{4}").expect("valid date regex"))
}

fn entity_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"id=([0-9]+-[0-9]+)").expect("valid entity regex"))
}

/// Which listing a row came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingKind {
    ByLeader,
    ByMember,
}

impl ListingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingKind::ByLeader => "leader",
            ListingKind::ByMember => "member",
        }
    }
}

/// Whitespace-trimmed text content of a cell
pub fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// First `DD/MM/YYYY` date in the cell; `None` if absent or not a calendar date
pub fn meeting_date(cell: ElementRef<'_>) -> Option<NaiveDate> {
    let text = cell.text().collect::<String>();
    let found = date_regex().find(&text)?;
    NaiveDate::parse_from_str(found.as_str(), "%d/%m/%Y").ok()
}

/// True if the cell mentions a cancellation, in any letter case
pub fn meeting_cancelled(cell: ElementRef<'_>) -> bool {
    cell.text()
        .collect::<String>()
        .to_lowercase()
        .contains("cancelled")
}

/// One entity per HTML comment in the cell
pub fn meeting_entities(cell: ElementRef<'_>) -> Vec<EntityRef> {
    cell.descendants()
        .filter_map(|node| match node.value() {
            Node::Comment(comment) => Some(entity_from_comment(comment)),
            _ => None,
        })
        .collect()
}

fn entity_from_comment(comment: &str) -> EntityRef {
    entity_regex()
        .captures(comment)
        .and_then(|caps| caps.get(1))
        .map(|id| EntityRef::Registered(id.as_str().to_string()))
        .unwrap_or(EntityRef::Unregistered)
}

/// Text fragments separated by `<br>`, trimmed, empty fragments dropped
pub fn member_fragments(cell: ElementRef<'_>) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut current = String::new();

    for node in cell.descendants() {
        match node.value() {
            Node::Text(text) => current.push_str(text),
            Node::Element(el) if el.name() == "br" => {
                fragments.push(std::mem::take(&mut current));
            }
            _ => {}
        }
    }
    fragments.push(current);

    fragments
        .into_iter()
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .collect()
}

/// The `td` children of a row, in order
pub fn row_cells<'a>(row: ElementRef<'a>) -> Vec<ElementRef<'a>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "td")
        .collect()
}

struct MeetingCells<'a> {
    date: Option<ElementRef<'a>>,
    location: Option<ElementRef<'a>>,
    entities: Option<ElementRef<'a>>,
    subject: Option<ElementRef<'a>>,
}

impl<'a> MeetingCells<'a> {
    fn at(cells: &[ElementRef<'a>], offset: usize) -> Self {
        Self {
            date: cells.get(offset).copied(),
            location: cells.get(offset + 1).copied(),
            entities: cells.get(offset + 2).copied(),
            subject: cells.get(offset + 3).copied(),
        }
    }

    fn into_meeting(self, participants: Participants) -> Meeting {
        Meeting {
            date: self.date.and_then(meeting_date),
            cancelled: self.date.is_some_and(meeting_cancelled),
            location: self.location.map(cell_text).unwrap_or_default(),
            subject: self.subject.map(cell_text).unwrap_or_default(),
            entities: self.entities.map(meeting_entities).unwrap_or_default(),
            participants,
        }
    }
}

/// Extract a meeting from a by-leader listing row.
///
/// Rows without any `td` cell (header rows, spacers) yield `None`.
pub fn leader_meeting(row: ElementRef<'_>, leader_id: &str) -> Option<Meeting> {
    let cells = row_cells(row);
    if cells.is_empty() {
        return None;
    }
    Some(MeetingCells::at(&cells, 0).into_meeting(Participants::Leader(leader_id.to_string())))
}

/// Extract a meeting from a by-member listing row, resolving the
/// participant names against the department roster.
pub fn member_meeting(row: ElementRef<'_>, resolver: &EntityResolver) -> Option<Meeting> {
    let cells = row_cells(row);
    let (members, rest) = cells.split_first()?;

    let fragments = member_fragments(*members);
    let ids = resolver.resolve_all(fragments.iter().map(String::as_str));

    Some(MeetingCells::at(rest, 0).into_meeting(Participants::Members(ids)))
}
