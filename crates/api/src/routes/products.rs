//! Product handlers.
//!
//! Create and update are multipart: scalar fields as text, `variants` and
//! `specification` as JSON strings, `product_image` (repeatable),
//! `hover_image` and `thumbnail_image` as files. Updates keep the gallery
//! images named in `kept_images` and append any new uploads.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::get,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use bazaar_core::{
    CategoryId, PageRequest, PickupId, ProductId, ProductType, RecordRef, SortOrder,
    pagination::DEFAULT_LIMIT,
};

use crate::db::{CategoryRepository, PickupRepository, ProductRepository, VariableRepository};
use crate::error::{AppError, Result};
use crate::middleware::{OptionalStaff, RequireStaffWriter};
use crate::models::product::plan_image_update;
use crate::models::{
    ImageAsset, NewProduct, Product, ProductFilter, ProductSort, ProductUpdate, ProductVariant,
    SpecificationEntry,
};
use crate::services::uploads::UploadForm;
use crate::state::AppState;

use super::{Message, Paged, SearchQuery, UPLOAD_BODY_LIMIT, found, record, upload, upload_all};

/// Build the products router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list).post(create))
        .route("/products/search", get(search))
        .route("/products/slug/{slug}", get(show_by_slug))
        .route("/products/{id}", get(show).put(update).delete(destroy))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
}

// =============================================================================
// Form fields
// =============================================================================

/// Text fields shared by create and update, all optional at this stage.
#[derive(Debug, Default)]
struct ProductFields {
    title: Option<String>,
    category: Option<RecordRef>,
    sub_category: Option<String>,
    sub_sub_category: Option<String>,
    pickup: Option<RecordRef>,
    product_type: Option<ProductType>,
    main_product: Option<RecordRef>,
    price: Option<Decimal>,
    mrp: Option<Decimal>,
    in_stock: Option<i32>,
    attribute: Option<String>,
    discount: Option<Decimal>,
    description: Option<String>,
    variants: Option<Vec<ProductVariant>>,
    specification: Option<Vec<SpecificationEntry>>,
    is_active: Option<bool>,
}

impl ProductFields {
    fn read(form: &UploadForm) -> Result<Self> {
        let text = |name: &str| form.text(name).map(str::to_owned);
        Ok(Self {
            title: text("title"),
            category: form.text("category").map(record),
            sub_category: text("sub_category"),
            sub_sub_category: text("sub_sub_category"),
            pickup: form.text("pickup").map(record),
            product_type: form.parse("product_type")?,
            main_product: form.text("main_product").map(record),
            price: form.parse("price")?,
            mrp: form.parse("mrp")?,
            in_stock: form.parse("in_stock")?,
            attribute: text("attribute"),
            discount: form.parse("discount")?,
            description: text("description"),
            variants: form.json("variants")?,
            specification: form.json("specification")?,
            is_active: form.parse("is_active")?,
        })
    }
}

/// References resolved to ids.
#[derive(Debug, Default)]
struct ResolvedRefs {
    category_id: Option<CategoryId>,
    pickup_id: Option<PickupId>,
    main_product_id: Option<ProductId>,
}

async fn resolve_refs(state: &AppState, fields: &ProductFields) -> Result<ResolvedRefs> {
    let mut refs = ResolvedRefs::default();

    if let Some(category) = &fields.category {
        let hit = CategoryRepository::new(state.pool()).get(category).await?;
        refs.category_id = Some(
            hit
                .ok_or_else(|| AppError::BadRequest("category does not exist".to_string()))?
                .id,
        );
    }
    if let Some(pickup) = &fields.pickup {
        let hit = PickupRepository::new(state.pool()).get(pickup).await?;
        refs.pickup_id = Some(
            hit
                .ok_or_else(|| AppError::BadRequest("pickup does not exist".to_string()))?
                .id,
        );
    }
    if let Some(main) = &fields.main_product {
        let hit = ProductRepository::new(state.pool()).get(main).await?;
        refs.main_product_id = Some(
            hit
                .ok_or_else(|| AppError::BadRequest("main product does not exist".to_string()))?
                .id,
        );
    }
    if let Some(variants) = &fields.variants {
        let mut ids: Vec<_> = variants.iter().map(|v| v.variable_id).collect();
        ids.sort_by_key(bazaar_core::VariableId::as_i32);
        ids.dedup();
        let existing = VariableRepository::new(state.pool())
            .existing_ids(&ids)
            .await?;
        if existing.len() != ids.len() {
            return Err(AppError::BadRequest(
                "variants reference an unknown variable".to_string(),
            ));
        }
    }

    Ok(refs)
}

/// Check the pricing and stock of the product as it will be stored.
fn check_values(price: Decimal, mrp: Decimal, in_stock: i32, discount: Option<Decimal>) -> Result<()> {
    if price.is_sign_negative() || mrp.is_sign_negative() {
        return Err(AppError::BadRequest("price and mrp cannot be negative".to_string()));
    }
    if price > mrp {
        return Err(AppError::BadRequest("price cannot exceed mrp".to_string()));
    }
    if in_stock < 0 {
        return Err(AppError::BadRequest("in_stock cannot be negative".to_string()));
    }
    if let Some(discount) = discount
        && (discount.is_sign_negative() || discount > Decimal::ONE_HUNDRED)
    {
        return Err(AppError::BadRequest(
            "discount must be between 0 and 100".to_string(),
        ));
    }
    Ok(())
}

/// A variant needs the product it varies.
fn check_variant(product_type: ProductType, main_product_id: Option<ProductId>) -> Result<()> {
    if product_type == ProductType::Variant && main_product_id.is_none() {
        return Err(AppError::BadRequest(
            "variant products need a main_product".to_string(),
        ));
    }
    Ok(())
}

// =============================================================================
// Handlers
// =============================================================================

#[instrument(skip(state, multipart), fields(staff = %staff.code))]
async fn create(
    RequireStaffWriter(staff): RequireStaffWriter,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Product>)> {
    let mut form = UploadForm::read(multipart).await?;
    let fields = ProductFields::read(&form)?;

    let title = fields
        .title
        .clone()
        .ok_or_else(|| AppError::BadRequest("title is required".to_string()))?;
    if fields.category.is_none() {
        return Err(AppError::BadRequest("category is required".to_string()));
    }
    let price = fields
        .price
        .ok_or_else(|| AppError::BadRequest("price is required".to_string()))?;
    let mrp = fields.mrp.unwrap_or(price);
    let in_stock = fields.in_stock.unwrap_or(0);
    check_values(price, mrp, in_stock, fields.discount)?;

    let refs = resolve_refs(&state, &fields).await?;
    let product_type = fields.product_type.unwrap_or_default();
    check_variant(product_type, refs.main_product_id)?;
    let category_id = refs
        .category_id
        .ok_or_else(|| AppError::BadRequest("category is required".to_string()))?;

    let gallery = form.take_files("product_image");
    if gallery.is_empty() {
        return Err(AppError::BadRequest(
            "at least one product_image is required".to_string(),
        ));
    }
    let hover = form.require_file("hover_image")?;
    let thumbnail = form.take_file("thumbnail_image");

    let images = upload_all(&state, gallery).await?;
    let mut uploaded: Vec<ImageAsset> = images.clone();
    let hover_image = match upload(&state, hover).await {
        Ok(asset) => asset,
        Err(e) => {
            state.cloudinary().destroy_quietly(&uploaded).await;
            return Err(e);
        }
    };
    uploaded.push(hover_image.clone());
    let thumbnail_image = match thumbnail {
        Some(file) => match upload(&state, file).await {
            Ok(asset) => Some(asset),
            Err(e) => {
                state.cloudinary().destroy_quietly(&uploaded).await;
                return Err(e);
            }
        },
        None => None,
    };
    uploaded.extend(thumbnail_image.clone());

    let input = NewProduct {
        title,
        category_id,
        sub_category: fields.sub_category,
        sub_sub_category: fields.sub_sub_category,
        pickup_id: refs.pickup_id,
        product_type,
        main_product_id: refs.main_product_id,
        price,
        mrp,
        in_stock,
        attribute: fields.attribute,
        discount: fields.discount,
        description: fields.description,
        variants: fields.variants.unwrap_or_default(),
        specification: fields.specification.unwrap_or_default(),
        images,
        hover_image,
        thumbnail_image,
        is_active: fields.is_active.unwrap_or(true),
    };

    match ProductRepository::new(state.pool()).create(&input).await {
        Ok(product) => {
            tracing::info!(product = %product.code, "Product created");
            Ok((StatusCode::CREATED, Json(product)))
        }
        Err(e) => {
            state.cloudinary().destroy_quietly(&uploaded).await;
            Err(e.into())
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProductQuery {
    page: Option<u32>,
    limit: Option<u32>,
    #[serde(default)]
    sort_by: ProductSort,
    #[serde(default)]
    order: SortOrder,
    product_type: Option<ProductType>,
    price_min: Option<Decimal>,
    price_max: Option<Decimal>,
    in_stock: Option<i32>,
    /// Comma-separated category ids or codes.
    categories: Option<String>,
    is_active: Option<bool>,
}

/// Split `categories=1,CAT000002` into ids and codes.
fn parse_categories(raw: Option<&str>) -> (Vec<CategoryId>, Vec<String>) {
    let mut ids = Vec::new();
    let mut codes = Vec::new();
    for part in raw.unwrap_or_default().split(',').map(str::trim) {
        if part.is_empty() {
            continue;
        }
        match RecordRef::parse(part) {
            RecordRef::Id(id) => ids.push(CategoryId::new(id)),
            RecordRef::Code(code) => codes.push(code),
        }
    }
    (ids, codes)
}

/// Shoppers only see active products; staff may filter freely.
fn visible_filter(is_staff: bool, requested: Option<bool>) -> Option<bool> {
    if is_staff { requested } else { Some(true) }
}

async fn list(
    OptionalStaff(staff): OptionalStaff,
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Paged<Product>>> {
    let page = PageRequest::new(query.page, query.limit, DEFAULT_LIMIT);
    let (category_ids, category_codes) = parse_categories(query.categories.as_deref());
    let filter = ProductFilter {
        product_type: query.product_type,
        price_min: query.price_min,
        price_max: query.price_max,
        min_stock: query.in_stock,
        category_ids,
        category_codes,
        is_active: visible_filter(staff.is_some(), query.is_active),
        search: None,
    };

    let result = ProductRepository::new(state.pool())
        .list(&filter, page, query.sort_by, query.order)
        .await?;
    Ok(Json(Paged::new(result, page)))
}

async fn search(
    OptionalStaff(staff): OptionalStaff,
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Paged<Product>>> {
    let page = query.page();
    let filter = ProductFilter {
        search: Some(query.q.clone()).filter(|q| !q.trim().is_empty()),
        is_active: visible_filter(staff.is_some(), None),
        ..ProductFilter::default()
    };
    let result = ProductRepository::new(state.pool())
        .list(&filter, page, ProductSort::CreatedAt, SortOrder::Desc)
        .await?;
    Ok(Json(Paged::new(result, page)))
}

/// Inactive products exist only for staff.
fn is_visible(is_active: bool, is_staff: bool) -> bool {
    is_active || is_staff
}

async fn show(
    OptionalStaff(staff): OptionalStaff,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Product>> {
    let product = ProductRepository::new(state.pool())
        .get(&record(&id))
        .await?
        .filter(|p| is_visible(p.is_active, staff.is_some()));
    Ok(Json(found(product, "Product")?))
}

async fn show_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Product>> {
    let product = ProductRepository::new(state.pool())
        .get_by_slug(&slug)
        .await?;
    Ok(Json(found(product, "Product")?))
}

#[instrument(skip(state, multipart), fields(staff = %staff.code))]
async fn update(
    RequireStaffWriter(staff): RequireStaffWriter,
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Product>> {
    let repo = ProductRepository::new(state.pool());
    let existing = found(repo.get(&record(&id)).await?, "Product")?;

    let mut form = UploadForm::read(multipart).await?;
    let fields = ProductFields::read(&form)?;
    let kept: Option<Vec<String>> = form.json("kept_images")?;

    check_values(
        fields.price.unwrap_or(existing.price),
        fields.mrp.unwrap_or(existing.mrp),
        fields.in_stock.unwrap_or(existing.in_stock),
        fields.discount,
    )?;
    let refs = resolve_refs(&state, &fields).await?;
    if refs.main_product_id == Some(existing.id) {
        return Err(AppError::BadRequest(
            "a product cannot be its own main product".to_string(),
        ));
    }
    check_variant(
        fields.product_type.unwrap_or(existing.product_type),
        refs.main_product_id.or(existing.main_product_id),
    )?;

    let new_gallery = form.take_files("product_image");
    let hover = form.take_file("hover_image");
    let thumbnail = form.take_file("thumbnail_image");

    // Check the gallery would not end up empty before uploading anything.
    let kept_count = kept.as_ref().map_or(existing.images.len(), |keep| {
        existing
            .images
            .iter()
            .filter(|image| keep.contains(&image.public_id))
            .count()
    });
    if kept_count + new_gallery.len() == 0 {
        return Err(AppError::BadRequest(
            "a product needs at least one image".to_string(),
        ));
    }

    let mut uploaded = upload_all(&state, new_gallery).await?;
    let plan = plan_image_update(&existing.images, kept.as_deref(), uploaded.clone());

    let mut hover_image = None;
    let mut thumbnail_image = None;
    for (file, slot) in [(hover, &mut hover_image), (thumbnail, &mut thumbnail_image)] {
        if let Some(file) = file {
            match upload(&state, file).await {
                Ok(asset) => {
                    uploaded.push(asset.clone());
                    *slot = Some(asset);
                }
                Err(e) => {
                    state.cloudinary().destroy_quietly(&uploaded).await;
                    return Err(e);
                }
            }
        }
    }

    let update = ProductUpdate {
        title: fields.title,
        category_id: refs.category_id,
        sub_category: fields.sub_category,
        sub_sub_category: fields.sub_sub_category,
        pickup_id: refs.pickup_id,
        product_type: fields.product_type,
        main_product_id: refs.main_product_id,
        price: fields.price,
        mrp: fields.mrp,
        in_stock: fields.in_stock,
        attribute: fields.attribute,
        discount: fields.discount,
        description: fields.description,
        variants: fields.variants,
        specification: fields.specification,
        images: Some(plan.images),
        hover_image,
        thumbnail_image,
        is_active: fields.is_active,
    };

    match repo.update(&existing, &update).await {
        Ok(product) => {
            let mut replaced = plan.removed;
            if update.hover_image.is_some() {
                replaced.push(existing.hover_image.clone());
            }
            if update.thumbnail_image.is_some() {
                replaced.extend(existing.thumbnail_image.clone());
            }
            state.cloudinary().destroy_quietly(&replaced).await;
            Ok(Json(product))
        }
        Err(e) => {
            state.cloudinary().destroy_quietly(&uploaded).await;
            Err(e.into())
        }
    }
}

#[instrument(skip(state), fields(staff = %staff.code))]
async fn destroy(
    RequireStaffWriter(staff): RequireStaffWriter,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Message>> {
    let repo = ProductRepository::new(state.pool());
    let product = found(repo.get(&record(&id)).await?, "Product")?;

    repo.delete(product.id).await?;
    state.cloudinary().destroy_quietly(&product.all_images()).await;

    tracing::info!(product = %product.code, "Product deleted");
    Ok(Json(Message::new("Product deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap_or_default()
    }

    #[test]
    fn test_parse_categories_splits_ids_and_codes() {
        let (ids, codes) = parse_categories(Some("3, cat000007,,12"));
        assert_eq!(ids, vec![CategoryId::new(3), CategoryId::new(12)]);
        assert_eq!(codes, vec!["CAT000007".to_string()]);

        let (ids, codes) = parse_categories(None);
        assert!(ids.is_empty() && codes.is_empty());
    }

    #[test]
    fn test_check_values() {
        assert!(check_values(dec("499"), dec("999"), 3, Some(dec("50"))).is_ok());
        assert!(check_values(dec("999"), dec("999"), 0, None).is_ok());
        assert!(check_values(dec("1000"), dec("999"), 0, None).is_err());
        assert!(check_values(dec("10"), dec("20"), -1, None).is_err());
        assert!(check_values(dec("10"), dec("20"), 1, Some(dec("101"))).is_err());
    }

    #[test]
    fn test_variant_needs_main_product() {
        assert!(check_variant(ProductType::Single, None).is_ok());
        assert!(check_variant(ProductType::Variant, None).is_err());
        assert!(check_variant(ProductType::Variant, Some(ProductId::new(4))).is_ok());
    }

    #[test]
    fn test_shoppers_only_see_active_products() {
        assert_eq!(visible_filter(false, Some(false)), Some(true));
        assert_eq!(visible_filter(true, Some(false)), Some(false));
        assert_eq!(visible_filter(true, None), None);
    }

    #[test]
    fn test_inactive_product_hidden_from_shoppers() {
        assert!(is_visible(true, false));
        assert!(!is_visible(false, false));
        assert!(is_visible(false, true));
    }

    #[test]
    fn test_router_builds() {
        let _router: Router<AppState> = router();
    }
}
