//! Helpers for the inline markup stored in heading and paragraph blocks.

/// Visible text of an inline markup string: tags removed, common entities decoded.
pub fn plain_text(markup: &str) -> String {
    let mut output = String::with_capacity(markup.len());
    let mut cursor = 0;
    while let Some(start) = markup[cursor..].find('<') {
        let start_ix = cursor + start;
        output.push_str(&markup[cursor..start_ix]);
        match markup[start_ix..].find('>') {
            Some(end_rel) => cursor = start_ix + end_rel + 1,
            None => {
                output.push_str(&markup[start_ix..]);
                return decode_entities(&output);
            }
        }
    }
    output.push_str(&markup[cursor..]);
    decode_entities(&output)
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// True when the markup renders no visible characters.
pub fn is_blank(markup: &str) -> bool {
    plain_text(markup).trim().is_empty()
}

/// Clamps a byte offset into `text` down to the nearest char boundary.
pub fn clamp_to_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while offset > 0 && !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}
