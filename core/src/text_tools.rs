use crate::WordPair;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Case {
    Upper,
    Lower,
    Title,
}

/// Joins the non-blank lines of `input` with `sep`.
pub fn concatenate(input: &str, sep: &str) -> String {
    input
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join(sep)
}

/// Splits `input` on `sep` into trimmed, non-empty lines.
pub fn split(input: &str, sep: &str) -> String {
    if sep.is_empty() {
        return input.trim().to_string();
    }
    input
        .split(sep)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn change_case(input: &str, case: Case) -> String {
    match case {
        Case::Upper => input.to_uppercase(),
        Case::Lower => input.to_lowercase(),
        Case::Title => title_case(input),
    }
}

// Words start at the first alphanumeric character and run to the next
// whitespace; leading punctuation is kept as is.
fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_word = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            in_word = false;
            out.push(ch);
        } else if in_word {
            out.extend(ch.to_lowercase());
        } else if ch.is_alphanumeric() || ch == '_' {
            in_word = true;
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Trims every line, collapses inner whitespace and drops blank lines.
pub fn tidy_lines(input: &str) -> String {
    input
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parses `German;Ukrainian` or tab separated lines into cards. Lines with
/// fewer than two fields are skipped.
pub fn bulk_format(input: &str) -> Vec<WordPair> {
    input
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let mut parts = line.split([';', '\t']);
            let de = parts.next()?;
            let uk = parts.next()?;
            Some(WordPair::new(de.trim(), uk.trim()))
        })
        .collect()
}
