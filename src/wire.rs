//! Vendor API wire format
//!
//! The classic resource API speaks XML: a collection document with a `<size>`
//! count and repeated `<printer><id>…</id></printer>` stubs, and a detail
//! document carrying the full field set. Audit metadata the platform has no
//! native fields for (owning site, created/updated stamps) rides inside the
//! `notes` element as a JSON-encoded string; missing or malformed notes
//! degrade to "unassigned"/"unknown" rather than failing the record.

use crate::error::{Error, Result};
use crate::types::{PrinterId, PrinterRecord};
use chrono::{DateTime, Utc};
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

/// Audit metadata embedded in the `notes` field as JSON.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct NotesPayload {
    /// Owning site name
    #[serde(rename = "Site", default)]
    pub site: Option<String>,
    /// Creation timestamp, RFC 3339
    #[serde(rename = "Created_at", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Username that created the record
    #[serde(rename = "Created_by", default)]
    pub created_by: Option<String>,
    /// Last-update timestamp, RFC 3339
    #[serde(rename = "Updated_at", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Username that last updated the record
    #[serde(rename = "Updated_by", default)]
    pub updated_by: Option<String>,
}

/// Parse the printer collection document into the list of record ids.
///
/// Duplicate ids are kept; each is looked up independently downstream.
pub(crate) fn parse_printer_ids(xml: &str) -> Result<Vec<PrinterId>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut ids = Vec::new();
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                path.push(String::from_utf8_lossy(start.name().as_ref()).into_owned());
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Text(text)) => {
                if matches!(path.as_slice(), [.., parent, leaf] if parent == "printer" && leaf == "id")
                {
                    let raw = text
                        .unescape()
                        .map_err(|e| Error::Wire(format!("bad id text: {}", e)))?;
                    let id = raw
                        .trim()
                        .parse::<PrinterId>()
                        .map_err(|e| Error::Wire(format!("bad printer id '{}': {}", raw, e)))?;
                    ids.push(id);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(Error::Wire(format!("malformed printer collection: {}", e))),
        }
    }

    Ok(ids)
}

/// Parse a printer detail document into a record.
///
/// The `notes` JSON supplies site and audit fields; when absent the record is
/// classified as "unassigned" with "unknown" authors, matching what older
/// records created outside this tool look like.
pub(crate) fn parse_printer_detail(xml: &str) -> Result<PrinterRecord> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut id: Option<PrinterId> = None;
    let mut display_name = String::new();
    let mut cups_name = String::new();
    let mut location = String::new();
    let mut device_uri = String::new();
    let mut model = String::new();
    let mut ppd_path = String::new();
    let mut ppd_contents = String::new();
    let mut notes_raw = String::new();
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                path.push(String::from_utf8_lossy(start.name().as_ref()).into_owned());
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Text(text)) => {
                let [.., parent, leaf] = path.as_slice() else {
                    continue;
                };
                if parent != "printer" {
                    continue;
                }
                let value = text
                    .unescape()
                    .map_err(|e| Error::Wire(format!("bad text in <{}>: {}", leaf, e)))?
                    .into_owned();
                match leaf.as_str() {
                    "id" => {
                        id = Some(value.trim().parse::<PrinterId>().map_err(|e| {
                            Error::Wire(format!("bad printer id '{}': {}", value, e))
                        })?);
                    }
                    "name" => display_name = value,
                    "CUPS_name" => cups_name = value,
                    "location" => location = value,
                    "uri" => device_uri = value,
                    "model" => model = value,
                    // ppd_path is the authoritative path; ppd is just the filename
                    "ppd_path" => ppd_path = value,
                    "ppd_contents" => ppd_contents = value,
                    "notes" => notes_raw = value,
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(Error::Wire(format!("malformed printer detail: {}", e))),
        }
    }

    if display_name.is_empty() {
        return Err(Error::Wire("printer detail is missing <name>".to_string()));
    }

    // Old records may carry free-form notes; treat anything unparseable as
    // having no embedded metadata
    let notes: NotesPayload = serde_json::from_str(&notes_raw).unwrap_or_default();

    Ok(PrinterRecord {
        id,
        display_name,
        cups_name,
        location,
        device_uri,
        model,
        ppd_path,
        ppd_contents,
        site: notes.site.unwrap_or_else(|| "unassigned".to_string()),
        created_at: notes.created_at,
        created_by: notes.created_by.unwrap_or_else(|| "unknown".to_string()),
        updated_at: notes.updated_at,
        updated_by: notes.updated_by.unwrap_or_else(|| "unknown".to_string()),
    })
}

/// Extract the server-assigned id from a create response body.
pub(crate) fn parse_created_id(xml: &str) -> Result<PrinterId> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                path.push(String::from_utf8_lossy(start.name().as_ref()).into_owned());
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Text(text)) => {
                if matches!(path.last(), Some(leaf) if leaf == "id") {
                    let raw = text
                        .unescape()
                        .map_err(|e| Error::Wire(format!("bad id text: {}", e)))?;
                    return raw
                        .trim()
                        .parse::<PrinterId>()
                        .map_err(|e| Error::Wire(format!("bad printer id '{}': {}", raw, e)));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(Error::Wire(format!("malformed create response: {}", e))),
        }
    }

    Err(Error::Wire(
        "create response did not contain an <id>".to_string(),
    ))
}

/// Build the create/update payload for a printer.
///
/// `id` is present for updates and omitted for creates (the create endpoint
/// uses the `/id/0` placeholder in the URL instead). `notes` carries the
/// site and audit metadata JSON-encoded.
pub(crate) fn build_printer_payload(
    id: Option<PrinterId>,
    record: &PrinterRecord,
    notes: &NotesPayload,
) -> Result<String> {
    let notes_json = serde_json::to_string(notes)?;

    let mut payload = String::from("<printer>");
    if let Some(id) = id {
        payload.push_str(&format!("<id>{}</id>", id));
    }
    payload.push_str(&format!("<name>{}</name>", escape(&record.display_name)));
    payload.push_str("<category>Printers</category>");
    payload.push_str(&format!("<uri>{}</uri>", escape(&record.device_uri)));
    payload.push_str(&format!(
        "<CUPS_name>{}</CUPS_name>",
        escape(&record.cups_name)
    ));
    payload.push_str(&format!("<location>{}</location>", escape(&record.location)));
    payload.push_str(&format!("<model>{}</model>", escape(&record.model)));
    payload.push_str(&format!("<ppd>{}.ppd</ppd>", escape(&record.cups_name)));
    payload.push_str(&format!(
        "<ppd_contents>{}</ppd_contents>",
        escape(&record.ppd_contents)
    ));
    payload.push_str(&format!("<notes>{}</notes>", escape(&notes_json)));
    payload.push_str(&format!("<ppd_path>{}</ppd_path>", escape(&record.ppd_path)));
    payload.push_str("</printer>");

    Ok(payload)
}

/// Parse the management agent's local-printer listing.
///
/// The agent prints `<printers>` with repeated `<printer>` children carrying
/// `display_name`, `cups_name`, `location`, `device_uri`, and `model`.
pub(crate) fn parse_local_printer_listing(xml: &str) -> Result<Vec<LocalPrinterEntry>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<LocalPrinterEntry> = None;
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                if name == "printer" {
                    current = Some(LocalPrinterEntry::default());
                }
                path.push(name);
            }
            Ok(Event::End(end)) => {
                if end.name().as_ref() == b"printer" {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                }
                path.pop();
            }
            Ok(Event::Text(text)) => {
                let (Some(entry), [.., parent, leaf]) = (current.as_mut(), path.as_slice()) else {
                    continue;
                };
                if parent != "printer" {
                    continue;
                }
                let value = text
                    .unescape()
                    .map_err(|e| Error::Wire(format!("bad text in <{}>: {}", leaf, e)))?
                    .into_owned();
                match leaf.as_str() {
                    "display_name" => entry.display_name = value,
                    "cups_name" => entry.cups_name = value,
                    "location" => entry.location = value,
                    "device_uri" => entry.device_uri = value,
                    "model" => entry.model = value,
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(Error::Wire(format!("malformed agent listing: {}", e))),
        }
    }

    Ok(entries)
}

/// One printer as reported by the management agent.
#[derive(Clone, Debug, Default)]
pub(crate) struct LocalPrinterEntry {
    pub display_name: String,
    pub cups_name: String,
    pub location: String,
    pub device_uri: String,
    pub model: String,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const COLLECTION: &str = "<printers><size>3</size>\
        <printer><id>1</id><name>Alpha</name></printer>\
        <printer><id>2</id><name>Beta</name></printer>\
        <printer><id>2</id><name>Beta Again</name></printer>\
        </printers>";

    #[test]
    fn collection_parsing_keeps_duplicate_ids() {
        let ids = parse_printer_ids(COLLECTION).unwrap();
        assert_eq!(
            ids,
            vec![PrinterId::new(1), PrinterId::new(2), PrinterId::new(2)]
        );
    }

    #[test]
    fn empty_collection_yields_no_ids() {
        let ids = parse_printer_ids("<printers><size>0</size></printers>").unwrap();
        assert!(ids.is_empty());
    }

    #[test]
    fn detail_parsing_reads_all_fields_and_notes_json() {
        let xml = r#"<printer>
            <id>7</id>
            <name>Lab Printer</name>
            <uri>ipp://printer.example.com</uri>
            <CUPS_name>lab_printer</CUPS_name>
            <location>Room 101</location>
            <model>Generic PostScript</model>
            <ppd>lab_printer.ppd</ppd>
            <ppd_contents>*PPD-Adobe: &quot;4.3&quot;</ppd_contents>
            <notes>{"Site": "Engineering", "Created_by": "siteadmin", "Updated_by": "siteadmin"}</notes>
            <ppd_path>/private/etc/cups/ppd/lab_printer.ppd</ppd_path>
        </printer>"#;

        let record = parse_printer_detail(xml).unwrap();
        assert_eq!(record.id, Some(PrinterId::new(7)));
        assert_eq!(record.display_name, "Lab Printer");
        assert_eq!(record.cups_name, "lab_printer");
        assert_eq!(record.device_uri, "ipp://printer.example.com");
        assert_eq!(record.ppd_contents, "*PPD-Adobe: \"4.3\"");
        assert_eq!(record.ppd_path, "/private/etc/cups/ppd/lab_printer.ppd");
        assert_eq!(record.site, "Engineering");
        assert_eq!(record.created_by, "siteadmin");
    }

    #[test]
    fn detail_without_notes_degrades_to_unassigned() {
        let xml = "<printer><id>3</id><name>Old Printer</name><notes>hand-written note</notes></printer>";
        let record = parse_printer_detail(xml).unwrap();
        assert_eq!(record.site, "unassigned");
        assert_eq!(record.created_by, "unknown");
        assert_eq!(record.updated_by, "unknown");
    }

    #[test]
    fn detail_without_name_is_rejected() {
        assert!(parse_printer_detail("<printer><id>3</id></printer>").is_err());
    }

    #[test]
    fn created_id_is_extracted_from_create_response() {
        let id = parse_created_id("<printer><id>41</id></printer>").unwrap();
        assert_eq!(id, PrinterId::new(41));
        assert!(parse_created_id("<printer></printer>").is_err());
    }

    #[test]
    fn payload_escapes_ppd_contents_and_roundtrips() {
        let mut record = PrinterRecord::local(
            "Lab & Office Printer",
            "lab_printer",
            "Room <101>",
            "ipp://printer.example.com",
            "Generic PostScript",
            "/private/etc/cups/ppd/lab_printer.ppd",
            "*PPD-Adobe: \"4.3\"\n*Product: <escape & me>",
        );
        record.site = "Engineering".to_string();

        let notes = NotesPayload {
            site: Some("Engineering".to_string()),
            created_by: Some("siteadmin".to_string()),
            updated_by: Some(String::new()),
            ..Default::default()
        };

        let payload = build_printer_payload(None, &record, &notes).unwrap();
        assert!(payload.contains("<name>Lab &amp; Office Printer</name>"));
        assert!(payload.contains("&lt;escape &amp; me&gt;"));
        assert!(!payload.contains("<id>"));

        // The payload we build is itself a parseable detail document
        let reparsed = parse_printer_detail(&payload).unwrap();
        assert_eq!(reparsed.display_name, "Lab & Office Printer");
        assert_eq!(reparsed.location, "Room <101>");
        assert_eq!(reparsed.site, "Engineering");
        assert_eq!(
            reparsed.ppd_contents,
            "*PPD-Adobe: \"4.3\"\n*Product: <escape & me>"
        );
    }

    #[test]
    fn update_payload_carries_the_record_id() {
        let record = PrinterRecord::local(
            "Lab Printer",
            "lab_printer",
            "Room 101",
            "ipp://printer.example.com",
            "Generic PostScript",
            "/private/etc/cups/ppd/lab_printer.ppd",
            "",
        );
        let payload = build_printer_payload(
            Some(PrinterId::new(12)),
            &record,
            &NotesPayload::default(),
        )
        .unwrap();
        assert!(payload.starts_with("<printer><id>12</id>"));
    }

    #[test]
    fn agent_listing_parses_each_printer() {
        let xml = "<printers>\
            <printer><display_name>Alpha</display_name><cups_name>alpha</cups_name>\
            <location>Lobby</location><device_uri>ipp://a</device_uri><model>M1</model></printer>\
            <printer><display_name>Beta</display_name><cups_name>beta</cups_name>\
            <location>Lab</location><device_uri>ipp://b</device_uri><model>M2</model></printer>\
            </printers>";

        let entries = parse_local_printer_listing(xml).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].display_name, "Alpha");
        assert_eq!(entries[1].cups_name, "beta");
        assert_eq!(entries[1].location, "Lab");
    }
}
