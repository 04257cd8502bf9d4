//! Human-readable public codes and record references.
//!
//! Each entity carries a sequential code such as `PRD000042` next to its
//! numeric key. Path parameters accept either form, see [`RecordRef`].

use core::fmt;

/// Number of digits in the numeric part of a public code.
pub const PUBLIC_ID_WIDTH: usize = 6;

/// Entity families that receive a sequential public code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublicIdKind {
    Category,
    Product,
    Pickup,
    Variable,
    Attribute,
    Component,
    Customer,
    Coupon,
    Order,
    Payment,
    Review,
    StaffUser,
}

impl PublicIdKind {
    /// Three-letter prefix of the code.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Category => "CAT",
            Self::Product => "PRD",
            Self::Pickup => "PKP",
            Self::Variable => "VAR",
            Self::Attribute => "ATR",
            Self::Component => "CMP",
            Self::Customer => "CUS",
            Self::Coupon => "CPN",
            Self::Order => "ORD",
            Self::Payment => "PAY",
            Self::Review => "REV",
            Self::StaffUser => "USR",
        }
    }

    /// Key of the counter row backing this family.
    #[must_use]
    pub const fn counter_key(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Product => "product",
            Self::Pickup => "pickup",
            Self::Variable => "variable",
            Self::Attribute => "attribute",
            Self::Component => "component",
            Self::Customer => "customer",
            Self::Coupon => "coupon",
            Self::Order => "order",
            Self::Payment => "payment",
            Self::Review => "review",
            Self::StaffUser => "staff_user",
        }
    }

    /// Format the `n`th code of this family.
    ///
    /// Counters past the padded width simply grow wider.
    ///
    /// ```
    /// use bazaar_core::PublicIdKind;
    ///
    /// assert_eq!(PublicIdKind::Order.format(17), "ORD000017");
    /// assert_eq!(PublicIdKind::Order.format(1_234_567), "ORD1234567");
    /// ```
    #[must_use]
    pub fn format(self, n: i64) -> String {
        format!("{}{:0width$}", self.prefix(), n, width = PUBLIC_ID_WIDTH)
    }
}

impl fmt::Display for PublicIdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.counter_key())
    }
}

/// A path parameter naming a record by numeric key or by public code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordRef {
    Id(i32),
    Code(String),
}

impl RecordRef {
    /// Interpret a raw path segment.
    ///
    /// All-digit input is a numeric key; anything else is a code, matched
    /// case-insensitively (codes are stored uppercase).
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        raw.parse::<i32>()
            .map_or_else(|_| Self::Code(raw.to_uppercase()), Self::Id)
    }

    /// Bind values for `WHERE id = $1 OR code = $2`.
    ///
    /// Exactly one side is set so the other comparison is `NULL`.
    #[must_use]
    pub fn as_bind(&self) -> (Option<i32>, Option<&str>) {
        match self {
            Self::Id(id) => (Some(*id), None),
            Self::Code(code) => (None, Some(code.as_str())),
        }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Code(code) => f.write_str(code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_pads_to_width() {
        assert_eq!(PublicIdKind::Category.format(1), "CAT000001");
        assert_eq!(PublicIdKind::StaffUser.format(999_999), "USR999999");
    }

    #[test]
    fn test_prefixes_are_unique() {
        let kinds = [
            PublicIdKind::Category,
            PublicIdKind::Product,
            PublicIdKind::Pickup,
            PublicIdKind::Variable,
            PublicIdKind::Attribute,
            PublicIdKind::Component,
            PublicIdKind::Customer,
            PublicIdKind::Coupon,
            PublicIdKind::Order,
            PublicIdKind::Payment,
            PublicIdKind::Review,
            PublicIdKind::StaffUser,
        ];
        let prefixes: std::collections::HashSet<_> = kinds.iter().map(|k| k.prefix()).collect();
        assert_eq!(prefixes.len(), kinds.len());
    }

    #[test]
    fn test_record_ref_parse() {
        assert_eq!(RecordRef::parse("42"), RecordRef::Id(42));
        assert_eq!(
            RecordRef::parse("prd000042"),
            RecordRef::Code("PRD000042".to_string())
        );
        // Too large for i32, so it can only be a code
        assert_eq!(
            RecordRef::parse("99999999999"),
            RecordRef::Code("99999999999".to_string())
        );
    }

    #[test]
    fn test_record_ref_bind() {
        assert_eq!(RecordRef::Id(3).as_bind(), (Some(3), None));
        assert_eq!(
            RecordRef::Code("ORD000003".into()).as_bind(),
            (None, Some("ORD000003"))
        );
    }
}
