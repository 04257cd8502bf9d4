//! Category tree models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bazaar_core::{CategoryId, SubSubcategoryId, SubcategoryId};

use super::ImageAsset;

/// A top-level category with its two nested levels.
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub code: String,
    pub main_category: String,
    pub image: ImageAsset,
    pub is_active: bool,
    pub subcategories: Vec<Subcategory>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Subcategory {
    pub id: SubcategoryId,
    pub name: String,
    pub is_active: bool,
    pub sub_subcategories: Vec<SubSubcategory>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubSubcategory {
    pub id: SubSubcategoryId,
    pub name: String,
    pub is_active: bool,
}

impl Category {
    /// Drop inactive subcategories and inactive sub-subcategories.
    ///
    /// Public listings only show what shoppers can browse into.
    #[must_use]
    pub fn without_inactive_children(mut self) -> Self {
        self.subcategories.retain(|sub| sub.is_active);
        for sub in &mut self.subcategories {
            sub.sub_subcategories.retain(|leaf| leaf.is_active);
        }
        self
    }
}

/// A subcategory to create, with the names of its children.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSubcategory {
    pub name: String,
    #[serde(default)]
    pub sub_subcategories: Vec<String>,
}

/// Change to an existing subcategory, or a new one when `id` is absent.
#[derive(Debug, Clone, Deserialize)]
pub struct SubcategoryChange {
    pub id: Option<SubcategoryId>,
    pub name: Option<String>,
    pub is_active: Option<bool>,
    #[serde(default)]
    pub sub_subcategories: Vec<SubSubcategoryChange>,
}

/// Change to an existing sub-subcategory, or a new one when `id` is absent.
#[derive(Debug, Clone, Deserialize)]
pub struct SubSubcategoryChange {
    pub id: Option<SubSubcategoryId>,
    pub name: Option<String>,
    pub is_active: Option<bool>,
}

/// Fields accepted when creating a category (image handled separately).
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub main_category: String,
    pub is_active: bool,
    pub subcategories: Vec<NewSubcategory>,
}

/// Fields accepted when updating a category.
#[derive(Debug, Clone, Default)]
pub struct CategoryUpdate {
    pub main_category: Option<String>,
    pub is_active: Option<bool>,
    pub image: Option<ImageAsset>,
    pub subcategories: Vec<SubcategoryChange>,
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn leaf(id: i32, active: bool) -> SubSubcategory {
        SubSubcategory {
            id: SubSubcategoryId::new(id),
            name: format!("leaf-{id}"),
            is_active: active,
        }
    }

    #[test]
    fn test_without_inactive_children() {
        let category = Category {
            id: CategoryId::new(1),
            code: "CAT000001".to_string(),
            main_category: "Clothing".to_string(),
            image: ImageAsset {
                secure_url: "https://img/1.jpg".to_string(),
                public_id: "store/images/1".to_string(),
            },
            is_active: true,
            subcategories: vec![
                Subcategory {
                    id: SubcategoryId::new(10),
                    name: "Men".to_string(),
                    is_active: true,
                    sub_subcategories: vec![leaf(100, true), leaf(101, false)],
                },
                Subcategory {
                    id: SubcategoryId::new(11),
                    name: "Archive".to_string(),
                    is_active: false,
                    sub_subcategories: vec![leaf(110, true)],
                },
            ],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let filtered = category.without_inactive_children();
        assert_eq!(filtered.subcategories.len(), 1);
        let men = &filtered.subcategories[0];
        assert_eq!(men.name, "Men");
        assert_eq!(men.sub_subcategories.len(), 1);
        assert_eq!(men.sub_subcategories[0].id, SubSubcategoryId::new(100));
    }

    #[test]
    fn test_subcategory_change_without_id_is_new() {
        let changes: Vec<SubcategoryChange> = serde_json::from_str(
            r#"[{"id": 4, "is_active": false}, {"name": "Kids", "sub_subcategories": [{"name": "Shoes"}]}]"#,
        )
        .unwrap_or_default();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].id, Some(SubcategoryId::new(4)));
        assert!(changes[1].id.is_none());
        assert_eq!(changes[1].sub_subcategories[0].name.as_deref(), Some("Shoes"));
    }
}
