//! Text normalization: display text to canonical text.
//!
//! Canonical text is what every identity and hash computation sees, so this
//! function is part of the versioned contract ([`crate::NORMALIZATION_VERSION`]).
//! It maps typographic spaces and quotes to plain forms, collapses whitespace,
//! and strips one leading numbering label such as `1.2(a)` or `(iii)`.

/// Produce the canonical form of a block's display text.
pub fn canonicalize(display: &str) -> String {
    let mapped: String = display.chars().map(plain_char).collect();
    let collapsed = mapped.split_whitespace().collect::<Vec<_>>().join(" ");
    strip_numbering_label(&collapsed).to_string()
}

fn plain_char(c: char) -> char {
    match c {
        '\u{00A0}' | '\u{2007}' | '\u{202F}' => ' ',
        '\u{2018}' | '\u{2019}' => '\'',
        '\u{201C}' | '\u{201D}' => '"',
        other => other,
    }
}

/// Remove a leading numbering label when text remains after it.
fn strip_numbering_label(text: &str) -> &str {
    match text.split_once(' ') {
        Some((first, rest)) if !rest.is_empty() && is_numbering_label(first) => rest,
        _ => text,
    }
}

fn is_numbering_label(label: &str) -> bool {
    // Peel trailing "(a)" / "(iii)" groups.
    let mut core = label;
    let mut had_group = false;
    while let Some(inner_end) = core.strip_suffix(')') {
        let Some(open) = inner_end.rfind('(') else {
            break;
        };
        let inner = &inner_end[open + 1..];
        if inner.is_empty() || inner.chars().count() > 4 || !inner.chars().all(char::is_alphanumeric) {
            break;
        }
        core = &inner_end[..open];
        had_group = true;
    }
    if core.is_empty() {
        return had_group;
    }

    let (body, terminated) = match core.strip_suffix('.').or_else(|| core.strip_suffix(')')) {
        Some(body) => (body, true),
        None => (core, false),
    };
    if body.is_empty() {
        return false;
    }

    let dotted_number = body.split('.').all(|seg| !seg.is_empty() && seg.chars().all(|c| c.is_ascii_digit()));
    if dotted_number {
        return terminated || had_group || body.contains('.');
    }

    if !(terminated || had_group) {
        return false;
    }
    let mut chars = body.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => true,
        _ => is_small_roman(body),
    }
}

/// Roman numerals up to 100 in canonical form, single-case.
fn is_small_roman(s: &str) -> bool {
    let upper = s.to_ascii_uppercase();
    if s != upper && s != s.to_ascii_lowercase() {
        return false;
    }
    let mut total = 0u32;
    let mut prev = 0u32;
    for c in upper.chars().rev() {
        let v = match c {
            'I' => 1,
            'V' => 5,
            'X' => 10,
            'L' => 50,
            'C' => 100,
            _ => return false,
        };
        if v < prev {
            total = total.saturating_sub(v);
        } else {
            total += v;
            prev = v;
        }
    }
    (1..=100).contains(&total) && to_roman(total) == upper
}

fn to_roman(mut n: u32) -> String {
    const TABLE: [(u32, &str); 9] = [
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    let mut out = String::new();
    for (value, glyph) in TABLE {
        while n >= value {
            out.push_str(glyph);
            n -= value;
        }
    }
    out
}
