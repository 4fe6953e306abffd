use crate::model::TextSearchTerm;

/// Parses a free-text search into terms.
///
/// Terms are separated by whitespace, `"quoted phrases"` keep their spaces
/// and a leading `-` negates a term.
pub fn parse_text_search(input: &str) -> Result<Vec<TextSearchTerm>, String> {
    let mut terms = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let negated = c == '-';
        if negated {
            chars.next();
        }

        let term = match chars.peek() {
            None => return Err("search term '-' is missing a value".to_string()),
            Some(c) if c.is_whitespace() => {
                return Err("search term '-' is missing a value".to_string())
            }
            Some('"') => {
                chars.next();
                let mut phrase = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some(c) => phrase.push(c),
                        None => return Err(format!("unterminated quote in search '{}'", input)),
                    }
                }
                if phrase.trim().is_empty() {
                    return Err("empty quoted search term".to_string());
                }
                phrase
            }
            Some(_) => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                word
            }
        };

        terms.push(TextSearchTerm { term, negated });
    }

    Ok(terms)
}

/// True when every term holds: a plain term must occur in at least one
/// haystack, a negated one in none. Case-insensitive.
pub fn matches_text_search(terms: &[TextSearchTerm], haystacks: &[&str]) -> bool {
    terms.iter().all(|t| {
        let needle = t.term.to_lowercase();
        let found = haystacks
            .iter()
            .any(|h| h.to_lowercase().contains(&needle));
        found != t.negated
    })
}
