use once_cell::sync::Lazy;
use regex::Regex;

static IMG_PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[IMG:([^\]]+?)\]").expect("img placeholder regex"));

pub fn image_placeholder(file_name: &str) -> String {
    format!("[IMG:{file_name}]")
}

/// File names referenced by `[IMG:...]` placeholders, in order of appearance.
pub fn placeholder_files(text: &str) -> Vec<String> {
    IMG_PLACEHOLDER_RE
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

/// Parse ASCII or full-width decimal digits.
pub fn parse_number(digits: &str) -> Option<u32> {
    let mut value: u32 = 0;
    let mut seen = false;
    for ch in digits.chars() {
        let d = match ch {
            '0'..='9' => ch as u32 - '0' as u32,
            '０'..='９' => ch as u32 - '０' as u32,
            c if c.is_whitespace() => continue,
            _ => return None,
        };
        value = value.checked_mul(10)?.checked_add(d)?;
        seen = true;
    }
    seen.then_some(value)
}

/// Append `text` to `field`, newline-joined when the field already has content.
pub fn join_line(field: &mut String, text: &str) {
    if field.is_empty() {
        field.push_str(text);
    } else {
        field.push('\n');
        field.push_str(text);
    }
}
