//! Slug generation and input sanitization for catalog names.

/// Builds an SEO-friendly slug: lowercase, diacritics folded, everything that
/// is not `[a-z0-9]` collapsed into single hyphens, trimmed at both ends.
pub fn slugify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for ch in text.chars().flat_map(|c| c.to_lowercase()) {
        let ch = fold_diacritic(ch);
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(ch);
        } else {
            pending_hyphen = true;
        }
    }

    out
}

pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Maps Vietnamese accented characters to their ASCII base letter.
fn fold_diacritic(ch: char) -> char {
    match ch {
        'à' | 'á' | 'ạ' | 'ả' | 'ã' | 'â' | 'ầ' | 'ấ' | 'ậ' | 'ẩ' | 'ẫ' | 'ă' | 'ằ' | 'ắ' | 'ặ'
        | 'ẳ' | 'ẵ' => 'a',
        'è' | 'é' | 'ẹ' | 'ẻ' | 'ẽ' | 'ê' | 'ề' | 'ế' | 'ệ' | 'ể' | 'ễ' => 'e',
        'ì' | 'í' | 'ị' | 'ỉ' | 'ĩ' => 'i',
        'ò' | 'ó' | 'ọ' | 'ỏ' | 'õ' | 'ô' | 'ồ' | 'ố' | 'ộ' | 'ổ' | 'ỗ' | 'ơ' | 'ờ' | 'ớ' | 'ợ'
        | 'ở' | 'ỡ' => 'o',
        'ù' | 'ú' | 'ụ' | 'ủ' | 'ũ' | 'ư' | 'ừ' | 'ứ' | 'ự' | 'ử' | 'ữ' => 'u',
        'ỳ' | 'ý' | 'ỵ' | 'ỷ' | 'ỹ' => 'y',
        'đ' => 'd',
        other => other,
    }
}

/// Strips HTML tags and escapes characters usable for injection.
pub fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;

    for ch in input.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if in_tag => {}
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '&' => out.push_str("&amp;"),
            _ => out.push(ch),
        }
    }

    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_fold_vietnamese_names() {
        assert_eq!(slugify("Áo Thun Nam"), "ao-thun-nam");
        assert_eq!(slugify("Giày thể thao"), "giay-the-thao");
        assert_eq!(slugify("Đồng hồ"), "dong-ho");
    }

    #[test]
    fn slugs_collapse_punctuation_runs() {
        assert_eq!(slugify("  Hello --- World!! "), "hello-world");
        assert_eq!(slugify("a&b@c"), "a-b-c");
        assert_eq!(slugify("___"), "");
    }

    #[test]
    fn slug_validation() {
        assert!(is_valid_slug("ao-thun-nam"));
        assert!(is_valid_slug("x2"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("-leading"));
        assert!(!is_valid_slug("trailing-"));
        assert!(!is_valid_slug("double--hyphen"));
        assert!(!is_valid_slug("Upper"));
    }

    #[test]
    fn sanitize_strips_tags_and_escapes() {
        assert_eq!(sanitize("<script>alert(1)</script>hi"), "alert(1)hi");
        assert_eq!(
            sanitize("a \"b\" & 'c'"),
            "a &quot;b&quot; &amp; &#39;c&#39;"
        );
        assert_eq!(sanitize("  plain  "), "plain");
    }
}
