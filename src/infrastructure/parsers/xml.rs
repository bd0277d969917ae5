use chrono::{NaiveDate, NaiveDateTime};
use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::borrow::Cow;
use std::path::Path;
use tracing::debug;

use crate::domain::error::IngestionError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Minimal owned element tree built from quick-xml events.
///
/// Element and attribute names are stored without their namespace prefix, so
/// `asx:values` is looked up as `values`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    pub name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<XmlElement>,
}

impl XmlElement {
    fn from_start(start: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Self {
        let decoder = reader.decoder();
        let name = decode_lossy(&decoder, start.local_name().as_ref());
        let attributes = start
            .attributes()
            .flatten()
            .map(|attr| {
                let key = decode_lossy(&decoder, attr.key.local_name().as_ref());
                let value = attr
                    .decode_and_unescape_value(reader)
                    .map(Cow::into_owned)
                    .unwrap_or_else(|_| decode_lossy(&decoder, &attr.value));
                (key, value)
            })
            .collect();

        Self {
            name,
            attributes,
            text: String::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// All elements named `name` below this one, in document order.
    pub fn descendants<'a>(&'a self, name: &str) -> Vec<&'a XmlElement> {
        let mut found = Vec::new();
        self.collect_descendants(name, &mut found);
        found
    }

    fn collect_descendants<'a>(&'a self, name: &str, found: &mut Vec<&'a XmlElement>) {
        for child in &self.children {
            if child.name == name {
                found.push(child);
            }
            child.collect_descendants(name, found);
        }
    }

    /// Path lookup over direct children (`"Clubs/ClubId"`). A leading `.//`
    /// matches the first step anywhere below this element.
    pub fn find(&self, path: &str) -> Option<&XmlElement> {
        let (anywhere, path) = match path.strip_prefix(".//") {
            Some(rest) => (true, rest),
            None => (false, path),
        };
        let mut steps = path.split('/').filter(|s| !s.is_empty());
        let first = steps.next()?;

        let starts: Vec<&XmlElement> = if anywhere {
            self.descendants(first)
        } else {
            self.children.iter().filter(|c| c.name == first).collect()
        };
        let rest: Vec<&str> = steps.collect();

        starts.into_iter().find_map(|start| {
            rest.iter()
                .try_fold(start, |current, step| current.child(step))
        })
    }

    /// Text of the element at `path`, or `default` when missing or empty.
    pub fn text_or(&self, path: &str, default: &str) -> String {
        match self.find(path) {
            Some(el) if !el.text.is_empty() => el.text.clone(),
            _ => default.to_string(),
        }
    }

    pub fn int_or(&self, path: &str, default: i64) -> i64 {
        self.find(path)
            .and_then(|el| el.text.trim().parse().ok())
            .unwrap_or(default)
    }

    pub fn float_or(&self, path: &str, default: f64) -> f64 {
        self.find(path)
            .and_then(|el| el.text.trim().parse().ok())
            .unwrap_or(default)
    }

    pub fn date(&self, path: &str, formats: &[&str]) -> Option<NaiveDateTime> {
        self.find(path).and_then(|el| parse_date(&el.text, formats))
    }
}

/// Tries each `strftime` format in turn. Date-only formats resolve to midnight.
pub fn parse_date(value: &str, formats: &[&str]) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    formats.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(value, fmt).ok().or_else(|| {
            NaiveDate::parse_from_str(value, fmt)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
    })
}

/// Reads and parses a whole XML file. Any markup error fails the file.
pub fn parse_file(path: &Path) -> Result<XmlElement, IngestionError> {
    debug!("Parsing XML file: {}", path.display());
    let bytes = std::fs::read(path).map_err(|e| IngestionError::malformed(path, e))?;
    parse_bytes(&bytes).map_err(|reason| IngestionError::malformed(path, reason))
}

fn decode_lossy(decoder: &Decoder, bytes: &[u8]) -> String {
    decoder
        .decode(bytes)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned())
}

/// Parses a whole document. Text is decoded with the encoding named in the
/// XML declaration (`windows-1255`, `ISO-8859-8`, ...), UTF-8 when absent.
pub fn parse_bytes(bytes: &[u8]) -> Result<XmlElement, String> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = Reader::from_reader(bytes);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => stack.push(XmlElement::from_start(e, &reader)),
            Ok(Event::Empty(ref e)) => {
                attach(&mut stack, &mut root, XmlElement::from_start(e, &reader))?
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| "closing tag without matching opening tag".to_string())?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map(Cow::into_owned)
                    .unwrap_or_else(|_| decode_lossy(&reader.decoder(), e));
                push_text(&mut stack, &text)?;
            }
            Ok(Event::CData(e)) => {
                let text = decode_lossy(&reader.decoder(), &e);
                push_text(&mut stack, &text)?;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(format!(
                    "XML error at byte {}: {}",
                    reader.buffer_position(),
                    e
                ))
            }
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(format!("unexpected end of document inside <{}>", open.name));
    }
    root.ok_or_else(|| "no root element found".to_string())
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), String> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            Ok(())
        }
        None if root.is_some() => Err(format!(
            "junk after document element: <{}>",
            element.name
        )),
        None => {
            *root = Some(element);
            Ok(())
        }
    }
}

fn push_text(stack: &mut [XmlElement], text: &str) -> Result<(), String> {
    match stack.last_mut() {
        Some(current) => {
            current.text.push_str(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err("text outside of the document element".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Root Date="06/12/25">
  <ChainId>7290172900007</ChainId>
  <Empty></Empty>
  <Items Count="2">
    <Item><ItemCode>100</ItemCode><ItemPrice>12.90</ItemPrice><Qty>abc</Qty></Item>
    <Item><ItemCode>200</ItemCode><ItemPrice> 3 </ItemPrice><Note><![CDATA[a & b]]></Note></Item>
  </Items>
</Root>"#;

    #[test]
    fn test_parse_tree_and_paths() {
        let root = parse_bytes(SAMPLE.as_bytes()).unwrap();
        assert_eq!(root.name, "Root");
        assert_eq!(root.attr("Date"), Some("06/12/25"));
        assert_eq!(root.text_or("ChainId", ""), "7290172900007");
        assert_eq!(root.descendants("Item").len(), 2);
        assert_eq!(root.find("Items/Item/ItemCode").unwrap().text(), "100");
        assert_eq!(root.find(".//Note").unwrap().text(), "a & b");
    }

    #[test]
    fn test_extractors_fall_back_to_defaults() {
        let root = parse_bytes(SAMPLE.as_bytes()).unwrap();
        let items = root.descendants("Item");

        assert_eq!(items[0].float_or("ItemPrice", 0.0), 12.90);
        assert_eq!(items[1].float_or("ItemPrice", 0.0), 3.0);
        assert_eq!(items[0].int_or("Qty", 7), 7);
        assert_eq!(items[0].int_or("Missing", -1), -1);
        assert_eq!(root.text_or("Empty", "none"), "none");
        assert_eq!(root.text_or("Nope", ""), "");
    }

    #[test]
    fn test_namespace_prefix_is_stripped() {
        let xml = r#"<asx:abap xmlns:asx="http://www.sap.com/abapxml"><asx:values><CHAINID>7290027600007</CHAINID></asx:values></asx:abap>"#;
        let root = parse_bytes(xml.as_bytes()).unwrap();
        assert_eq!(root.text_or(".//values/CHAINID", ""), "7290027600007");
    }

    #[test]
    fn test_broken_markup_is_rejected() {
        assert!(parse_bytes(b"<Root><Item></Root>").is_err());
        assert!(parse_bytes(b"<Root><Item>").is_err());
        assert!(parse_bytes(b"not xml at all").is_err());
        assert!(parse_bytes(b"").is_err());
        assert!(parse_bytes(b"<A/><B/>").is_err());
    }

    #[test]
    fn test_bom_is_ignored() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"<Root><A>1</A></Root>");
        assert_eq!(parse_bytes(&bytes).unwrap().int_or("A", 0), 1);
    }

    #[test]
    fn test_find_with_owned_path() {
        let root = parse_bytes(SAMPLE.as_bytes()).unwrap();
        let found = {
            let path = format!("{}/{}", "Items", "Item");
            root.find(&path)
        };
        assert_eq!(found.unwrap().text_or("ItemCode", ""), "100");
        assert!(root.find(&String::from("Items/Missing")).is_none());
    }

    #[test]
    fn test_declared_hebrew_encodings_are_decoded() {
        let mut bytes = br#"<?xml version="1.0" encoding="windows-1255"?><Root><ItemName>"#.to_vec();
        bytes.extend_from_slice(&[0xE7, 0xEC, 0xE1]);
        bytes.extend_from_slice(b"</ItemName></Root>");
        assert_eq!(parse_bytes(&bytes).unwrap().text_or("ItemName", ""), "חלב");

        let mut bytes = br#"<?xml version="1.0" encoding="ISO-8859-8"?><Root City=""#.to_vec();
        bytes.extend_from_slice(&[0xE7, 0xEC, 0xE1]);
        bytes.extend_from_slice(b"\"/>");
        assert_eq!(parse_bytes(&bytes).unwrap().attr("City"), Some("חלב"));
    }

    #[test]
    fn test_undeclared_encoding_reads_utf8() {
        let xml = "<Root><ItemName>חלב 3%</ItemName></Root>";
        assert_eq!(parse_bytes(xml.as_bytes()).unwrap().text_or("ItemName", ""), "חלב 3%");
    }

    #[test]
    fn test_parse_date_formats() {
        let dt = parse_date("2025-12-06 00:55", &["%Y-%m-%d %H:%M"]).unwrap();
        assert_eq!(dt.to_string(), "2025-12-06 00:55:00");

        let midnight = parse_date("2018/08/07", &["%Y/%m/%d %H:%M", "%Y/%m/%d"]).unwrap();
        assert_eq!(midnight.to_string(), "2018-08-07 00:00:00");

        assert!(parse_date("", &["%Y-%m-%d"]).is_none());
        assert!(parse_date("yesterday", &["%Y-%m-%d"]).is_none());
    }
}
