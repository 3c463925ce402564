//! Whitespace-collapsing HTML minifier.

/// Elements whose content is emitted byte for byte.
const RAW_TEXT_ELEMENTS: &[&str] = &["pre", "textarea", "script", "style"];

/// Elements that flow inline with text. Whitespace next to them is significant.
const INLINE_ELEMENTS: &[&str] = &[
    "a", "abbr", "acronym", "b", "bdi", "bdo", "big", "button", "cite", "code", "del", "dfn",
    "em", "font", "i", "img", "input", "ins", "kbd", "label", "mark", "math", "nobr", "object",
    "q", "rp", "rt", "rtc", "ruby", "s", "samp", "select", "small", "span", "strike", "strong",
    "sub", "sup", "svg", "textarea", "time", "tt", "u", "var",
];

#[derive(Debug, PartialEq)]
enum Token<'a> {
    /// Text between tags
    Text(&'a str),

    /// An element tag, opening or closing
    Tag { raw: &'a str, inline: bool },

    /// Comments, doctypes and raw element content
    Verbatim(&'a str),
}

impl Token<'_> {
    fn is_block_boundary(&self) -> bool {
        match self {
            Token::Tag { inline, .. } => !inline,
            Token::Verbatim(_) => true,
            Token::Text(_) => false,
        }
    }
}

/// Collapse insignificant whitespace in an HTML document.
///
/// Runs of whitespace in text become a single space. Whitespace-only text
/// between block-level tags is dropped, while whitespace touching inline
/// elements is kept as one space. `pre`, `textarea`, `script` and `style`
/// content is left untouched, as are comments.
pub fn minify_html(source: &str) -> String {
    let tokens = tokenize(source);
    let mut output = String::with_capacity(source.len());

    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::Text(text) => {
                let mut collapsed = collapse_whitespace(text);

                let after_block = i == 0 || tokens[i - 1].is_block_boundary();
                let before_block = tokens.get(i + 1).is_none_or(|t| t.is_block_boundary());

                if after_block {
                    collapsed = collapsed.trim_start().to_string();
                }
                if before_block {
                    collapsed = collapsed.trim_end().to_string();
                }

                output.push_str(&collapsed);
            }
            Token::Tag { raw, .. } => output.push_str(raw),
            Token::Verbatim(raw) => output.push_str(raw),
        }
    }

    output
}

fn collapse_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_space = false;

    for c in text.chars() {
        if c.is_ascii_whitespace() {
            if !in_space {
                result.push(' ');
                in_space = true;
            }
        } else {
            result.push(c);
            in_space = false;
        }
    }

    result
}

fn tokenize(source: &str) -> Vec<Token<'_>> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut text_start = 0;
    let mut pos = 0;

    while pos < bytes.len() {
        if bytes[pos] != b'<' || !starts_markup(&bytes[pos + 1..]) {
            pos += 1;
            continue;
        }

        if text_start < pos {
            tokens.push(Token::Text(&source[text_start..pos]));
        }

        let rest = &source[pos..];

        if rest.starts_with("<!--") {
            let end = rest.find("-->").map(|i| pos + i + 3).unwrap_or(source.len());
            tokens.push(Token::Verbatim(&source[pos..end]));
            pos = end;
        } else if rest.starts_with("<!") || rest.starts_with("<?") {
            let end = rest.find('>').map(|i| pos + i + 1).unwrap_or(source.len());
            tokens.push(Token::Verbatim(&source[pos..end]));
            pos = end;
        } else {
            let end = find_tag_end(bytes, pos);
            let raw = &source[pos..end];
            let (name, closing) = tag_name(raw);

            tokens.push(Token::Tag {
                raw,
                inline: INLINE_ELEMENTS.contains(&name.as_str()),
            });
            pos = end;

            if !closing && RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
                let close = find_closing_tag(source, pos, &name);
                if pos < close {
                    tokens.push(Token::Verbatim(&source[pos..close]));
                }
                pos = close;
            }
        }

        text_start = pos;
    }

    if text_start < source.len() {
        tokens.push(Token::Text(&source[text_start..]));
    }

    tokens
}

/// Whether the bytes after `<` begin a tag, comment or declaration.
fn starts_markup(after: &[u8]) -> bool {
    matches!(after.first(), Some(b) if b.is_ascii_alphabetic() || matches!(b, b'/' | b'!' | b'?'))
}

/// Find the byte index just past the `>` closing the tag at `start`.
fn find_tag_end(bytes: &[u8], start: usize) -> usize {
    let mut quote: Option<u8> = None;

    for (i, &b) in bytes.iter().enumerate().skip(start + 1) {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return i + 1,
            None => {}
        }
    }

    bytes.len()
}

/// Extract the lowercase element name and whether the tag is a closing tag.
fn tag_name(raw: &str) -> (String, bool) {
    let inner = raw.trim_start_matches('<');
    let (closing, inner) = match inner.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, inner),
    };

    let name: String = inner
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect::<String>()
        .to_ascii_lowercase();

    (name, closing)
}

/// Find where `</name` starts at or after `from`, or the end of input.
fn find_closing_tag(source: &str, from: usize, name: &str) -> usize {
    let needle = format!("</{}", name);
    source[from..]
        .to_ascii_lowercase()
        .find(&needle)
        .map(|i| from + i)
        .unwrap_or(source.len())
}
