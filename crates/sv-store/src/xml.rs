//! Listing XML decoding for the blob container.
//!
//! The service returns a flat list of record elements plus an optional
//! continuation element. Text inside the name element is kept verbatim:
//! object names may start or end with whitespace.

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::{ListPage, RawEntry, StoreError};

/// Element names for one backend's listing document.
pub(crate) struct ListingShape {
    pub record: &'static str,
    pub name: &'static str,
    pub size: &'static str,
    pub modified: &'static str,
    pub marker: &'static str,
    pub parse_time: fn(&str) -> Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Partial {
    name: Option<String>,
    size: Option<String>,
    modified: Option<String>,
}

pub(crate) fn parse_listing(xml: &str, shape: &ListingShape) -> Result<ListPage, StoreError> {
    let mut reader = Reader::from_str(xml);

    let mut stack: Vec<String> = Vec::new();
    let mut current: Option<Partial> = None;
    let mut page = ListPage::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if local == shape.record {
                    current = Some(Partial::default());
                }
                stack.push(local);
            }
            Ok(Event::End(e)) => {
                stack.pop();
                if e.local_name().as_ref() == shape.record.as_bytes() {
                    if let Some(p) = current.take() {
                        page.entries.push(finish(p, shape)?);
                    }
                }
            }
            Ok(Event::Text(e)) => {
                let Some(elem) = stack.last().map(String::as_str) else {
                    continue;
                };
                let slot = match current.as_mut() {
                    Some(p) if elem == shape.name => &mut p.name,
                    Some(p) if elem == shape.size => &mut p.size,
                    Some(p) if elem == shape.modified => &mut p.modified,
                    None if elem == shape.marker => &mut page.next,
                    // Indentation between elements.
                    _ => continue,
                };
                let text = e
                    .unescape()
                    .map_err(|err| StoreError::Decode(err.to_string()))?;
                slot.get_or_insert_with(String::new).push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(StoreError::Decode(format!(
                    "listing xml at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
    }

    page.next = page
        .next
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty());
    Ok(page)
}

fn finish(p: Partial, shape: &ListingShape) -> Result<RawEntry, StoreError> {
    let name = p
        .name
        .ok_or_else(|| StoreError::Decode(format!("<{}> without <{}>", shape.record, shape.name)))?;
    let size = p
        .size
        .as_deref()
        .ok_or_else(|| StoreError::Decode(format!("{name}: missing <{}>", shape.size)))?
        .trim()
        .parse::<u64>()
        .map_err(|e| StoreError::Decode(format!("{name}: bad size: {e}")))?;
    Ok(RawEntry {
        name,
        size,
        last_modified: p.modified.as_deref().and_then(shape.parse_time),
    })
}

/// `Mon, 08 Sep 2025 14:09:22 GMT`
pub(crate) fn parse_http_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(s.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}
