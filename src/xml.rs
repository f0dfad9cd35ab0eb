//! Small quick-xml helpers shared by the net-file and trace readers

use quick_xml::events::BytesStart;
use std::collections::HashMap;

/// Collect all attributes of an element into owned key/value pairs
///
/// Values are taken verbatim; SUMO ids and numbers never carry entities.
pub(crate) fn attributes(element: &BytesStart<'_>) -> Result<HashMap<String, String>, String> {
    let mut out = HashMap::new();
    for attr in element.attributes() {
        let attr = attr.map_err(|e| format!("malformed attribute: {}", e))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = String::from_utf8_lossy(attr.value.as_ref()).to_string();
        out.insert(key, value);
    }
    Ok(out)
}

/// Value of a single attribute, if present
pub(crate) fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>, String> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| format!("malformed attribute: {}", e))?;
        if attr.key.as_ref() == name {
            return Ok(Some(String::from_utf8_lossy(attr.value.as_ref()).to_string()));
        }
    }
    Ok(None)
}
