//! Inline color markup
//!
//! Rendered text may contain tags of the form `<red>...</red>` naming a
//! color or style. Tags nest; a close tag ends the nearest matching open
//! tag and the remaining stack is re-applied. Unclosed tags close at end of
//! string. Anything that does not parse as a known tag (stray `<`, `>`,
//! unknown names) passes through literally, so stripping markup from text
//! with no valid tags is the identity.

/// Maps a tag name to its canonical spelling, or None for unknown tags.
/// Style aliases (`b`, `i`, `u`, `s`) canonicalize so `</b>` closes `<bold>`.
pub(crate) fn canonical_tag(name: &str) -> Option<&'static str> {
    let canon = match name {
        "black" => "black",
        "red" => "red",
        "green" => "green",
        "yellow" => "yellow",
        "blue" => "blue",
        "magenta" => "magenta",
        "cyan" => "cyan",
        "white" => "white",
        "bright_black" => "bright_black",
        "bright_red" => "bright_red",
        "bright_green" => "bright_green",
        "bright_yellow" => "bright_yellow",
        "bright_blue" => "bright_blue",
        "bright_magenta" => "bright_magenta",
        "bright_cyan" => "bright_cyan",
        "bright_white" => "bright_white",
        "bold" | "b" => "bold",
        "italic" | "i" => "italic",
        "underline" | "u" => "underline",
        "dim" => "dim",
        "strike" | "s" => "strike",
        _ => return None,
    };
    Some(canon)
}

fn sgr_code(canon: &str) -> &'static str {
    match canon {
        "black" => "30",
        "red" => "31",
        "green" => "32",
        "yellow" => "33",
        "blue" => "34",
        "magenta" => "35",
        "cyan" => "36",
        "white" => "37",
        "bright_black" => "90",
        "bright_red" => "91",
        "bright_green" => "92",
        "bright_yellow" => "93",
        "bright_blue" => "94",
        "bright_magenta" => "95",
        "bright_cyan" => "96",
        "bright_white" => "97",
        "bold" => "1",
        "dim" => "2",
        "italic" => "3",
        "underline" => "4",
        "strike" => "9",
        _ => "0",
    }
}

/// Wraps `text` in open/close tags for each style name in a space-separated
/// list, innermost-first. Used to mark up rendered level names.
pub(crate) fn wrap_in_style(text: &str, style: &str) -> String {
    let tags: Vec<&str> = style.split_whitespace().collect();
    let mut out = String::with_capacity(text.len() + tags.len() * 16);
    for tag in &tags {
        out.push('<');
        out.push_str(tag);
        out.push('>');
    }
    out.push_str(text);
    for tag in tags.iter().rev() {
        out.push_str("</");
        out.push_str(tag);
        out.push('>');
    }
    out
}

/// Resolves markup to ANSI escape sequences.
pub fn paint(text: &str) -> String {
    render(text, true)
}

/// Removes markup tags, preserving their textual content verbatim.
pub fn strip(text: &str) -> String {
    render(text, false)
}

fn render(text: &str, apply: bool) -> String {
    let mut out = String::with_capacity(text.len() + if apply { 16 } else { 0 });
    let mut stack: Vec<&'static str> = Vec::new();
    let mut rest = text;

    while let Some(lt) = rest.find('<') {
        out.push_str(&rest[..lt]);
        let after = &rest[lt + 1..];
        let consumed = after.find('>').and_then(|gt| {
            let inner = &after[..gt];
            let (closing, name) = match inner.strip_prefix('/') {
                Some(name) => (true, name),
                None => (false, inner),
            };
            let canon = canonical_tag(name)?;
            if closing {
                // A close with no matching open is not markup.
                let pos = stack.iter().rposition(|t| *t == canon)?;
                stack.remove(pos);
                if apply {
                    out.push_str("\x1b[0m");
                    for tag in &stack {
                        out.push_str("\x1b[");
                        out.push_str(sgr_code(tag));
                        out.push('m');
                    }
                }
            } else {
                stack.push(canon);
                if apply {
                    out.push_str("\x1b[");
                    out.push_str(sgr_code(canon));
                    out.push('m');
                }
            }
            Some(gt + 1)
        });

        match consumed {
            Some(n) => rest = &after[n..],
            None => {
                // Stray '<': emit it literally and move on.
                out.push('<');
                rest = after;
            }
        }
    }
    out.push_str(rest);

    if apply && !stack.is_empty() {
        out.push_str("\x1b[0m");
    }
    out
}
