/// Split a complete response into display-sized pieces.
///
/// A piece ends right after a paragraph break (`\n\n`), a fence marker at line
/// start (`\n```), a table pipe at line start (`\n|`), or sentence-ending
/// punctuation plus the whitespace that follows it. The pieces concatenate
/// back to `text` exactly.
pub fn segment(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;

    for (idx, ch) in text.char_indices() {
        let end = idx + ch.len_utf8();
        if end < text.len() && is_boundary(&text[..end], ch) {
            out.push(&text[start..end]);
            start = end;
        }
    }

    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

fn is_boundary(head: &str, last: char) -> bool {
    if head.ends_with("\n\n") || head.ends_with("\n```") || head.ends_with("\n|") {
        return true;
    }
    if last.is_whitespace() {
        let before = &head[..head.len() - last.len_utf8()];
        return matches!(before.chars().next_back(), Some('.' | '?' | '!'));
    }
    false
}
