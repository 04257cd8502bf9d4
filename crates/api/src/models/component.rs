//! Storefront display components (sliders, banners, logos, popups).

use chrono::{DateTime, Utc};
use serde::Serialize;

use bazaar_core::{ComponentId, ComponentKind};

use super::ImageAsset;

#[derive(Debug, Clone, Serialize)]
pub struct Component {
    pub id: ComponentId,
    pub code: String,
    pub name: String,
    pub kind: ComponentKind,
    pub image: ImageAsset,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComponent {
    pub name: String,
    pub kind: ComponentKind,
    pub image: ImageAsset,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ComponentUpdate {
    pub name: Option<String>,
    pub kind: Option<ComponentKind>,
    pub image: Option<ImageAsset>,
    pub is_active: Option<bool>,
}

/// Entry in the name dropdown.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentOption {
    pub id: ComponentId,
    pub code: String,
    pub name: String,
    pub kind: ComponentKind,
}
