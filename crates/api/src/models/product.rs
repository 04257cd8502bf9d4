//! Product models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bazaar_core::{CategoryId, PickupId, ProductId, ProductType, VariableId};

use super::ImageAsset;

/// A catalog item.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub code: String,
    pub slug: String,
    pub title: String,
    pub category_id: CategoryId,
    pub sub_category: Option<String>,
    pub sub_sub_category: Option<String>,
    pub pickup_id: Option<PickupId>,
    pub product_type: ProductType,
    pub main_product_id: Option<ProductId>,
    pub price: Decimal,
    pub mrp: Decimal,
    pub in_stock: i32,
    pub attribute: Option<String>,
    pub discount: Option<Decimal>,
    pub description: Option<String>,
    pub variants: Vec<ProductVariant>,
    pub specification: Vec<SpecificationEntry>,
    pub images: Vec<ImageAsset>,
    pub hover_image: ImageAsset,
    pub thumbnail_image: Option<ImageAsset>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Every hosted asset owned by the product.
    pub fn all_images(&self) -> Vec<ImageAsset> {
        let mut assets = self.images.clone();
        assets.push(self.hover_image.clone());
        assets.extend(self.thumbnail_image.clone());
        assets
    }
}

/// One variation axis value of a variant product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub variable_id: VariableId,
    /// Free-form details, e.g. `{"value": "XL"}`.
    #[serde(default)]
    pub additional: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecificationEntry {
    pub key: String,
    pub value: String,
}

/// Compact product view embedded in carts, wishlists and orders.
#[derive(Debug, Clone, Serialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub code: String,
    pub slug: String,
    pub title: String,
    pub category_id: CategoryId,
    pub price: Decimal,
    pub mrp: Decimal,
    pub in_stock: i32,
    pub is_active: bool,
    pub thumbnail: Option<ImageAsset>,
}

/// Validated fields for a new product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub title: String,
    pub category_id: CategoryId,
    pub sub_category: Option<String>,
    pub sub_sub_category: Option<String>,
    pub pickup_id: Option<PickupId>,
    pub product_type: ProductType,
    pub main_product_id: Option<ProductId>,
    pub price: Decimal,
    pub mrp: Decimal,
    pub in_stock: i32,
    pub attribute: Option<String>,
    pub discount: Option<Decimal>,
    pub description: Option<String>,
    pub variants: Vec<ProductVariant>,
    pub specification: Vec<SpecificationEntry>,
    pub images: Vec<ImageAsset>,
    pub hover_image: ImageAsset,
    pub thumbnail_image: Option<ImageAsset>,
    pub is_active: bool,
}

/// Partial product update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub title: Option<String>,
    pub category_id: Option<CategoryId>,
    pub sub_category: Option<String>,
    pub sub_sub_category: Option<String>,
    pub pickup_id: Option<PickupId>,
    pub product_type: Option<ProductType>,
    pub main_product_id: Option<ProductId>,
    pub price: Option<Decimal>,
    pub mrp: Option<Decimal>,
    pub in_stock: Option<i32>,
    pub attribute: Option<String>,
    pub discount: Option<Decimal>,
    pub description: Option<String>,
    pub variants: Option<Vec<ProductVariant>>,
    pub specification: Option<Vec<SpecificationEntry>>,
    pub images: Option<Vec<ImageAsset>>,
    pub hover_image: Option<ImageAsset>,
    pub thumbnail_image: Option<ImageAsset>,
    pub is_active: Option<bool>,
}

/// Sortable product columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    CreatedAt,
    Price,
    Title,
    InStock,
}

impl ProductSort {
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "p.created_at",
            Self::Price => "p.price",
            Self::Title => "LOWER(p.title)",
            Self::InStock => "p.in_stock",
        }
    }
}

/// Filters for the product listing.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub product_type: Option<ProductType>,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
    pub min_stock: Option<i32>,
    pub category_ids: Vec<CategoryId>,
    pub category_codes: Vec<String>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

/// Outcome of reconciling a product's gallery during an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePlan {
    /// The gallery to store.
    pub images: Vec<ImageAsset>,
    /// Assets to delete from the image host.
    pub removed: Vec<ImageAsset>,
}

/// Keep the existing images whose public ids are listed in `keep`, then
/// append `uploaded`.
///
/// With `keep` absent the current gallery stays as is.
#[must_use]
pub fn plan_image_update(
    existing: &[ImageAsset],
    keep: Option<&[String]>,
    uploaded: Vec<ImageAsset>,
) -> ImagePlan {
    let (mut images, removed): (Vec<_>, Vec<_>) = match keep {
        Some(keep) => existing
            .iter()
            .cloned()
            .partition(|image| keep.contains(&image.public_id)),
        None => (existing.to_vec(), Vec::new()),
    };
    images.extend(uploaded);
    ImagePlan { images, removed }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(id: &str) -> ImageAsset {
        ImageAsset {
            secure_url: format!("https://res.cloudinary.com/demo/{id}.jpg"),
            public_id: id.to_string(),
        }
    }

    #[test]
    fn test_plan_keeps_listed_and_appends_uploads() {
        let existing = [asset("a"), asset("b"), asset("c")];
        let keep = vec!["c".to_string(), "a".to_string()];

        let plan = plan_image_update(&existing, Some(&keep), vec![asset("d")]);
        assert_eq!(plan.images, vec![asset("a"), asset("c"), asset("d")]);
        assert_eq!(plan.removed, vec![asset("b")]);
    }

    #[test]
    fn test_plan_without_keep_list_changes_nothing_but_appends() {
        let existing = [asset("a")];
        let plan = plan_image_update(&existing, None, vec![asset("b")]);
        assert_eq!(plan.images, vec![asset("a"), asset("b")]);
        assert!(plan.removed.is_empty());
    }

    #[test]
    fn test_plan_empty_keep_list_removes_all() {
        let existing = [asset("a"), asset("b")];
        let plan = plan_image_update(&existing, Some(&[]), Vec::new());
        assert!(plan.images.is_empty());
        assert_eq!(plan.removed.len(), 2);
    }

    #[test]
    fn test_sort_parse() {
        let sort: ProductSort = serde_json::from_str("\"in_stock\"").unwrap_or_default();
        assert_eq!(sort.column(), "p.in_stock");
    }

    #[test]
    fn test_all_images_covers_gallery_hover_and_thumbnail() {
        let now = Utc::now();
        let mut product = Product {
            id: ProductId::new(1),
            code: "PRD000001".to_string(),
            slug: "linen-shirt".to_string(),
            title: "Linen Shirt".to_string(),
            category_id: CategoryId::new(1),
            sub_category: None,
            sub_sub_category: None,
            pickup_id: None,
            product_type: ProductType::Single,
            main_product_id: None,
            price: Decimal::new(499, 0),
            mrp: Decimal::new(999, 0),
            in_stock: 3,
            attribute: None,
            discount: None,
            description: None,
            variants: Vec::new(),
            specification: Vec::new(),
            images: vec![asset("a"), asset("b")],
            hover_image: asset("h"),
            thumbnail_image: Some(asset("t")),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(
            product.all_images(),
            vec![asset("a"), asset("b"), asset("h"), asset("t")]
        );

        product.thumbnail_image = None;
        assert_eq!(product.all_images().len(), 3);
    }
}
