//! URL slugs for catalog entries.

/// Lowercase ASCII slug: alphanumerics kept, every other run collapsed to `-`.
///
/// ```
/// use bazaar_core::slugify;
///
/// assert_eq!(slugify("Cotton Kurta (Blue) - XL"), "cotton-kurta-blue-xl");
/// ```
#[must_use]
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Slug for a product: title slug followed by the lowercased public code,
/// which keeps slugs unique when titles repeat.
#[must_use]
pub fn product_slug(title: &str, code: &str) -> String {
    let title = slugify(title);
    let code = code.to_ascii_lowercase();
    if title.is_empty() {
        code
    } else {
        format!("{title}-{code}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_trims_separators() {
        assert_eq!(slugify("  --Hello,  World!-- "), "hello-world");
        assert_eq!(slugify("chai & coffee"), "chai-coffee");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_slugify_drops_non_ascii() {
        assert_eq!(slugify("Café Crème"), "caf-cr-me");
    }

    #[test]
    fn test_product_slug_appends_code() {
        assert_eq!(product_slug("Silk Saree", "PRD000012"), "silk-saree-prd000012");
        assert_eq!(product_slug("???", "PRD000013"), "prd000013");
    }
}
