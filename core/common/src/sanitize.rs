//! Markup sanitization for free-text fields.
//!
//! Every free-text value the store persists passes through here first. This
//! is a security boundary: titles and descriptions are later rendered by
//! collaborating layers that must be able to trust stored content.

/// Strip markup from a free-text value.
///
/// Removes every `<...>` tag (and with it any event-handler attribute),
/// re-scanning until a fixpoint so that split tags such as
/// `<scr<script>ipt>` cannot reassemble into live markup. Any remaining
/// `javascript:` scheme is removed as well. A dangling unterminated `<`
/// drops the rest of the input.
pub fn sanitize_text(input: &str) -> String {
    let mut current = input.to_string();
    loop {
        let stripped = strip_tags(&current);
        if stripped == current {
            break;
        }
        current = stripped;
    }
    strip_js_scheme(&current).trim().to_string()
}

/// Sanitize each element of a tag list, dropping entries that sanitize to
/// empty. Order is preserved.
pub fn sanitize_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|t| sanitize_text(t))
        .filter(|t| !t.is_empty())
        .collect()
}

fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c == '<' {
            // Skip to the closing '>'; an unterminated tag swallows the rest.
            for t in chars.by_ref() {
                if t == '>' {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn strip_js_scheme(input: &str) -> String {
    const NEEDLE: &[u8] = b"javascript:";
    let mut current = input.to_string();
    loop {
        // Byte-wise ASCII search keeps offsets valid for arbitrary Unicode.
        let found = current
            .as_bytes()
            .windows(NEEDLE.len())
            .position(|window| window.eq_ignore_ascii_case(NEEDLE));
        match found {
            Some(pos) => current.replace_range(pos..pos + NEEDLE.len(), ""),
            None => return current,
        }
    }
}
