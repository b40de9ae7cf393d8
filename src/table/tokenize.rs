use super::Row;

/// Splits one CSV line into fields.
///
/// A single quote flag is toggled by every `"` and the quote characters are
/// dropped wherever they occur; commas only split while the flag is off.
/// Unbalanced quotes therefore carry over into the following fields.
pub fn tokenize_line(line: &str) -> Row {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);

    fields.iter().map(|field| clean_field(field)).collect()
}

fn clean_field(field: &str) -> String {
    let trimmed = field.trim();
    match trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        Some(inner) => inner.to_string(),
        None => trimmed.to_string(),
    }
}

pub fn tokenize_document(text: &str) -> Vec<Row> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    text.split('\n').map(tokenize_line).collect()
}

#[cfg(test)]
mod tests {
    use super::{tokenize_document, tokenize_line};

    #[test]
    fn splits_plain_fields() {
        assert_eq!(tokenize_line("a,b,c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn keeps_commas_inside_quotes() {
        assert_eq!(tokenize_line("\"a,b\",c"), vec!["a,b", "c"]);
    }

    #[test]
    fn empty_line_is_one_empty_field() {
        assert_eq!(tokenize_line(""), vec![""]);
    }

    #[test]
    fn trims_whitespace_around_fields() {
        assert_eq!(tokenize_line("  a , b\t,c  "), vec!["a", "b", "c"]);
        assert_eq!(tokenize_line("a,,"), vec!["a", "", ""]);
    }

    #[test]
    fn strips_quotes_anywhere_in_a_field() {
        assert_eq!(tokenize_line("ab\"cd\"ef,g"), vec!["abcdef", "g"]);
        assert_eq!(tokenize_line("x\"y,z\"w"), vec!["xy,zw"]);
    }

    #[test]
    fn unbalanced_quote_swallows_the_rest_of_the_line() {
        assert_eq!(tokenize_line("\"a,b,c"), vec!["a,b,c"]);
        assert_eq!(tokenize_line("a,\"b,c"), vec!["a", "b,c"]);
    }

    #[test]
    fn carriage_returns_are_trimmed() {
        assert_eq!(tokenize_line("a,b\r"), vec!["a", "b"]);
    }

    #[test]
    fn document_splits_lines_after_outer_trim() {
        let rows = tokenize_document("\n  name,age\nBob,30\n\n");
        assert_eq!(rows, vec![vec!["name", "age"], vec!["Bob", "30"]]);
    }

    #[test]
    fn blank_document_has_no_rows() {
        assert!(tokenize_document("").is_empty());
        assert!(tokenize_document("  \n\t ").is_empty());
    }
}
