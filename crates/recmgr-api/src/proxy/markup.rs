//! Parsers for the proxy's XML-flavored markup.
//!
//! The proxy output is scanned like a tag soup: every matching element is
//! collected regardless of nesting, tag and attribute names are compared
//! case-insensitively, and mismatched end tags are tolerated.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::Reader;
use quick_xml::escape::{resolve_html5_entity, unescape_with};
use quick_xml::events::{BytesStart, Event};
use regex::Regex;

use super::error::MarkupError;
use super::types::{Channel, ChannelListing, RECORD_TIME_FORMAT, Recording, Telecast};

const CATEGORY: &str = "category";
const CHANNEL: &str = "channel";
const RECORD: &str = "record";
const TELECAST: &str = "telecast";

/// Splits `[prefix] name` recording titles.
#[allow(clippy::expect_used)]
static RECORD_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\[.*\])\s(.*)").expect("failed to compile record name regex")
});

/// An element picked out of the markup with its attributes.
#[derive(Debug)]
struct Element {
    name: &'static str,
    attrs: HashMap<String, String>,
}

impl Element {
    fn attr(&self, attribute: &'static str) -> Result<&str, MarkupError> {
        self.attrs
            .get(attribute)
            .map(String::as_str)
            .ok_or(MarkupError::MissingAttribute {
                element: self.name,
                attribute,
            })
    }

    fn owned_attr(&self, attribute: &'static str) -> Result<String, MarkupError> {
        self.attr(attribute).map(str::to_owned)
    }
}

/// Collects all elements whose tag is one of `wanted`, in document order.
fn collect_elements(markup: &str, wanted: &[&'static str]) -> Result<Vec<Element>, MarkupError> {
    let mut reader = Reader::from_str(markup);
    let config = reader.config_mut();
    config.trim_text(true);
    config.check_end_names = false;

    let mut elements = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                if let Some(name) = match_tag(&e, wanted) {
                    elements.push(Element {
                        name,
                        attrs: read_attributes(&e)?,
                    });
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(elements)
}

fn match_tag(e: &BytesStart<'_>, wanted: &[&'static str]) -> Option<&'static str> {
    let local = e.local_name();
    wanted
        .iter()
        .copied()
        .find(|w| local.as_ref().eq_ignore_ascii_case(w.as_bytes()))
}

fn read_attributes(e: &BytesStart<'_>) -> Result<HashMap<String, String>, MarkupError> {
    let mut attrs = HashMap::new();
    let mut iter = e.html_attributes();
    // Repeated attributes: the last one wins.
    iter.with_checks(false);
    for attr in iter {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase();
        let raw = String::from_utf8_lossy(attr.value.as_ref());
        // Unknown entities are kept verbatim.
        let value = unescape_with(&raw, resolve_html5_entity)
            .map_or_else(|_| raw.to_string(), Cow::into_owned);
        attrs.insert(key, value);
    }
    Ok(attrs)
}

fn parse_flag(element: &Element, attribute: &'static str) -> Result<bool, MarkupError> {
    let value = element.attr(attribute)?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "" | "0" | "false" | "no" => Ok(false),
        _ => Err(MarkupError::InvalidValue {
            element: element.name,
            attribute,
            value: value.to_owned(),
        }),
    }
}

/// Strips the bracketed prefix from a recording name.
fn record_display_name(raw: &str) -> Result<String, MarkupError> {
    RECORD_NAME_RE
        .captures(raw)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().to_owned())
        .ok_or_else(|| MarkupError::RecordName(raw.to_owned()))
}

fn parse_record_time(value: &str) -> Result<NaiveDateTime, MarkupError> {
    NaiveDateTime::parse_from_str(value, RECORD_TIME_FORMAT).map_err(|e| {
        MarkupError::Timestamp {
            value: value.to_owned(),
            reason: e.to_string(),
        }
    })
}

/// Converts epoch seconds (fractional allowed) to a UTC instant.
#[allow(
    clippy::as_conversions,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn parse_epoch(value: &str) -> Result<DateTime<Utc>, MarkupError> {
    let invalid = |reason: &str| MarkupError::Timestamp {
        value: value.to_owned(),
        reason: reason.to_owned(),
    };

    let secs: f64 = value
        .trim()
        .parse()
        .map_err(|e: std::num::ParseFloatError| invalid(&e.to_string()))?;
    if !secs.is_finite() {
        return Err(invalid("not a finite number"));
    }

    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos).ok_or_else(|| invalid("out of range"))
}

/// Parses a `channels/` document.
///
/// Group labels are resolved against the `category` elements of the same
/// document. Repeated channel IDs keep their first occurrence. The result
/// is sorted ascending by channel name.
pub(crate) fn parse_channels(markup: &str) -> Result<ChannelListing, MarkupError> {
    let elements = collect_elements(markup, &[CATEGORY, CHANNEL])?;

    let mut groups = BTreeMap::new();
    for category in elements.iter().filter(|e| e.name == CATEGORY) {
        groups.insert(category.owned_attr("id")?, category.owned_attr("name")?);
    }

    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut channels = Vec::new();
    for element in elements.iter().filter(|e| e.name == CHANNEL) {
        let id = element.owned_attr("id")?;
        if !seen_ids.insert(id.clone()) {
            tracing::debug!(%id, "Duplicate channel id, keeping first occurrence");
            continue;
        }
        let group_id = element.owned_attr("group")?;
        let group = groups
            .get(&group_id)
            .cloned()
            .unwrap_or_else(|| group_id.clone());

        channels.push(Channel {
            id,
            name: element.owned_attr("name")?,
            group,
            group_id,
            adult: parse_flag(element, "adult")?,
            epg_id: element.owned_attr("epg_id")?,
        });
    }

    channels.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(ChannelListing { channels, groups })
}

/// Parses a `records/all` document, sorted ascending by channel name.
///
/// A record whose name lacks the `[prefix] ` part fails the whole parse.
pub(crate) fn parse_records(markup: &str) -> Result<Vec<Recording>, MarkupError> {
    let mut records = collect_elements(markup, &[RECORD])?
        .iter()
        .map(|element| -> Result<Recording, MarkupError> {
            Ok(Recording {
                channel_name: record_display_name(element.attr("name")?)?,
                start: parse_record_time(element.attr("start")?)?,
                end: parse_record_time(element.attr("end")?)?,
                status: element.owned_attr("status")?,
                id: element.owned_attr("id")?,
            })
        })
        .collect::<Result<Vec<_>, MarkupError>>()?;

    records.sort_by(|a, b| a.channel_name.cmp(&b.channel_name));
    Ok(records)
}

/// Parses an `epg/` document, keeping the proxy's order.
pub(crate) fn parse_epg(markup: &str) -> Result<Vec<Telecast>, MarkupError> {
    collect_elements(markup, &[TELECAST])?
        .iter()
        .map(|element| -> Result<Telecast, MarkupError> {
            Ok(Telecast {
                start: parse_epoch(element.attr("btime")?)?,
                end: parse_epoch(element.attr("etime")?)?,
                name: element.owned_attr("name")?,
            })
        })
        .collect()
}
