//! Column names are snake_case in the database and camelCase on the wire.

/// `cover_content_type` -> `coverContentType`. Empty segments from doubled underscores are dropped.
pub fn to_camel_case(column: &str) -> String {
    let mut parts = column.split('_').filter(|p| !p.is_empty());
    let mut out = parts.next().unwrap_or_default().to_string();
    for part in parts {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::to_camel_case;

    #[test]
    fn snake_to_camel() {
        assert_eq!(to_camel_case("cover_content_type"), "coverContentType");
        assert_eq!(to_camel_case("title"), "title");
        assert_eq!(to_camel_case("publication_date"), "publicationDate");
        assert_eq!(to_camel_case("film__id"), "filmId");
    }
}
