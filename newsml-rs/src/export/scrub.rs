//! Removal of characters that are not allowed in the output encoding.

/// Entity the editor leaves behind that the output must not contain.
const NBSP_ENTITY: &str = "&nbsp;";

fn is_illegal(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}')
}

/// Strips control characters 0x00-0x08, 0x0B, 0x0C, 0x0E-0x1F and literal
/// `&nbsp;` from serialized XML.
pub(crate) fn scrub(xml: String) -> String {
    let controls = xml.chars().filter(|c| is_illegal(*c)).count();
    let entities = xml.matches(NBSP_ENTITY).count();
    if controls == 0 && entities == 0 {
        return xml;
    }

    tracing::warn!(controls, entities, "scrubbed illegal characters from output");
    xml.replace(NBSP_ENTITY, "")
        .chars()
        .filter(|c| !is_illegal(*c))
        .collect()
}
