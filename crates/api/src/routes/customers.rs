//! Customer account handlers: authentication, profile, cart and wishlist.
//!
//! Everything under `/customers/me` acts on the customer in the session.
//! The plain `/customers` listing is staff-only.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use bazaar_core::{PageRequest, Phone, ProductId, SortOrder, pagination::DEFAULT_LIMIT};

use crate::db::{CustomerRepository, ProductRepository, RecordSort};
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{
    RequireCustomer, RequireStaff, RequireStaffWriter, clear_current_customer, login_rate_limiter,
    set_current_customer,
};
use crate::models::{Cart, CurrentCustomer, Customer, CustomerUpdate, WishlistEntry, WishlistFilter};
use crate::services::auth::{AuthService, hash_password, validate_password};
use crate::services::uploads::UploadForm;
use crate::state::AppState;

use super::{Message, Paged, SearchQuery, UPLOAD_BODY_LIMIT, found, record, upload};

/// Build the customers router.
pub fn router() -> Router<AppState> {
    let auth = Router::new()
        .route("/customers/register", post(register))
        .route("/customers/login", post(login))
        .route_layer(login_rate_limiter());

    let profile_image = Router::new()
        .route("/customers/me/profile-image", post(upload_profile_image))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT));

    Router::new()
        .merge(auth)
        .merge(profile_image)
        .route("/customers/logout", post(logout))
        .route("/customers/check-auth", get(check_auth))
        .route("/customers/me", get(me).put(update_me))
        .route("/customers/me/cart", get(cart).post(add_to_cart))
        .route(
            "/customers/me/cart/{product}",
            put(set_cart_quantity).delete(remove_from_cart),
        )
        .route("/customers/me/wishlist", get(wishlist).post(add_to_wishlist))
        .route("/customers/me/wishlist/{product}", delete(remove_from_wishlist))
        .route("/customers", get(list))
        .route("/customers/search", get(search))
        .route("/customers/{id}", get(show).delete(destroy))
}

async fn start_session(session: &Session, customer: &Customer) -> Result<()> {
    set_current_customer(
        session,
        &CurrentCustomer {
            id: customer.id,
            code: customer.code.clone(),
            email: customer.email.clone(),
        },
    )
    .await?;
    set_sentry_user(&customer.code, Some(customer.email.as_str()));
    Ok(())
}

async fn current(state: &AppState, customer: &CurrentCustomer) -> Result<Customer> {
    let row = CustomerRepository::new(state.pool())
        .get_by_id(customer.id)
        .await?;
    // A deleted account with a live session is treated as logged out.
    row.ok_or_else(|| AppError::Unauthorized("Please log in".to_string()))
}

// =============================================================================
// Authentication
// =============================================================================

#[derive(Debug, Deserialize)]
struct RegisterForm {
    name: String,
    email: String,
    mobile: String,
    password: String,
}

#[instrument(skip(state, session, form), fields(email = %form.email))]
async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<RegisterForm>,
) -> Result<(StatusCode, Json<Customer>)> {
    let auth = AuthService::new(state.pool());
    let customer = auth
        .register_customer(&form.name, &form.email, &form.mobile, &form.password)
        .await?;
    let customer = CustomerRepository::new(state.pool())
        .set_login(customer.id, true)
        .await?;

    start_session(&session, &customer).await?;
    tracing::info!(customer = %customer.code, "Customer registered");
    Ok((StatusCode::CREATED, Json(customer)))
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    email_or_mobile: String,
    password: String,
}

#[instrument(skip(state, session, form))]
async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<LoginForm>,
) -> Result<Json<Customer>> {
    let identifier = form.email_or_mobile.trim();
    let customer = AuthService::new(state.pool())
        .login_customer(identifier, &form.password)
        .await?;

    start_session(&session, &customer).await?;
    tracing::info!(customer = %customer.code, "Customer logged in");
    Ok(Json(customer))
}

async fn logout(
    State(state): State<AppState>,
    session: Session,
    RequireCustomer(customer): RequireCustomer,
) -> Result<Json<Message>> {
    if let Err(e) = CustomerRepository::new(state.pool())
        .set_login(customer.id, false)
        .await
    {
        tracing::warn!(customer = %customer.code, "Failed to clear login flag: {e}");
    }

    clear_current_customer(&session).await?;
    session.flush().await?;
    clear_sentry_user();
    Ok(Json(Message::new("Logged out")))
}

async fn check_auth(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
) -> Result<Json<Customer>> {
    Ok(Json(current(&state, &customer).await?))
}

// =============================================================================
// Own profile
// =============================================================================

async fn me(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
) -> Result<Json<Customer>> {
    Ok(Json(current(&state, &customer).await?))
}

#[instrument(skip(state, update), fields(customer = %customer.code))]
async fn update_me(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Json(mut update): Json<CustomerUpdate>,
) -> Result<Json<Customer>> {
    if let Some(name) = update.name.as_deref() {
        super::required(name, "name")?;
    }
    if let Some(mobile) = update.mobile.as_deref() {
        let phone = Phone::parse(mobile).map_err(|e| AppError::BadRequest(e.to_string()))?;
        update.mobile = Some(phone.into());
    }
    let password_hash = match update.password.take() {
        Some(password) => {
            validate_password(&password)?;
            Some(hash_password(&password)?)
        }
        None => None,
    };

    let updated = CustomerRepository::new(state.pool())
        .update(customer.id, &update, password_hash.as_deref())
        .await?;
    Ok(Json(updated))
}

#[instrument(skip(state, multipart), fields(customer = %customer.code))]
async fn upload_profile_image(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    multipart: Multipart,
) -> Result<Json<Customer>> {
    let existing = current(&state, &customer).await?;
    let mut form = UploadForm::read(multipart).await?;
    let image = upload(&state, form.require_file("profile_image")?).await?;

    match CustomerRepository::new(state.pool())
        .set_profile_image(customer.id, &image)
        .await
    {
        Ok(updated) => {
            state
                .cloudinary()
                .destroy_quietly(existing.profile_image.as_slice())
                .await;
            Ok(Json(updated))
        }
        Err(e) => {
            state.cloudinary().destroy_quietly(std::slice::from_ref(&image)).await;
            Err(e.into())
        }
    }
}

// =============================================================================
// Cart
// =============================================================================

#[derive(Debug, Deserialize)]
struct CartAdd {
    product_id: String,
    quantity: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct CartQuantity {
    quantity: i32,
}

fn check_quantity(quantity: i32) -> Result<i32> {
    if quantity < 1 {
        return Err(AppError::BadRequest(
            "quantity must be at least 1".to_string(),
        ));
    }
    Ok(quantity)
}

/// Resolve a product reference, optionally requiring it to be on sale.
async fn product_id(state: &AppState, raw: &str, active_only: bool) -> Result<ProductId> {
    let product = found(
        ProductRepository::new(state.pool()).get(&record(raw)).await?,
        "Product",
    )?;
    if active_only && !product.is_active {
        return Err(AppError::BadRequest(format!(
            "{} is not available",
            product.title
        )));
    }
    Ok(product.id)
}

async fn cart(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
) -> Result<Json<Cart>> {
    let cart = CustomerRepository::new(state.pool())
        .cart(customer.id)
        .await?;
    Ok(Json(cart))
}

#[instrument(skip(state), fields(customer = %customer.code))]
async fn add_to_cart(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Json(input): Json<CartAdd>,
) -> Result<Json<Cart>> {
    let quantity = check_quantity(input.quantity.unwrap_or(1))?;
    let product = product_id(&state, &input.product_id, true).await?;

    let repo = CustomerRepository::new(state.pool());
    repo.add_to_cart(customer.id, product, quantity).await?;
    Ok(Json(repo.cart(customer.id).await?))
}

#[instrument(skip(state), fields(customer = %customer.code))]
async fn set_cart_quantity(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Path(product): Path<String>,
    Json(input): Json<CartQuantity>,
) -> Result<Json<Cart>> {
    let quantity = check_quantity(input.quantity)?;
    let product = product_id(&state, &product, false).await?;

    let repo = CustomerRepository::new(state.pool());
    repo.set_cart_quantity(customer.id, product, quantity)
        .await?;
    Ok(Json(repo.cart(customer.id).await?))
}

#[instrument(skip(state), fields(customer = %customer.code))]
async fn remove_from_cart(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Path(product): Path<String>,
) -> Result<Json<Cart>> {
    let product = product_id(&state, &product, false).await?;

    let repo = CustomerRepository::new(state.pool());
    repo.remove_from_cart(customer.id, product).await?;
    Ok(Json(repo.cart(customer.id).await?))
}

// =============================================================================
// Wishlist
// =============================================================================

#[derive(Debug, Deserialize)]
struct WishlistAdd {
    product_id: String,
}

async fn wishlist(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Query(filter): Query<WishlistFilter>,
) -> Result<Json<Vec<WishlistEntry>>> {
    let entries = CustomerRepository::new(state.pool())
        .wishlist(customer.id, &filter)
        .await?;
    Ok(Json(entries))
}

async fn add_to_wishlist(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Json(input): Json<WishlistAdd>,
) -> Result<(StatusCode, Json<Message>)> {
    let product = product_id(&state, &input.product_id, false).await?;
    CustomerRepository::new(state.pool())
        .add_to_wishlist(customer.id, product)
        .await?;
    Ok((StatusCode::CREATED, Json(Message::new("Added to wishlist"))))
}

async fn remove_from_wishlist(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Path(product): Path<String>,
) -> Result<Json<Message>> {
    let product = product_id(&state, &product, false).await?;
    CustomerRepository::new(state.pool())
        .remove_from_wishlist(customer.id, product)
        .await?;
    Ok(Json(Message::new("Removed from wishlist")))
}

// =============================================================================
// Staff views
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct CustomerQuery {
    page: Option<u32>,
    limit: Option<u32>,
    #[serde(default)]
    sort_by: RecordSort,
    #[serde(default)]
    order: SortOrder,
    is_login: Option<bool>,
}

async fn list(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<CustomerQuery>,
) -> Result<Json<Paged<Customer>>> {
    let page = PageRequest::new(query.page, query.limit, DEFAULT_LIMIT);
    let result = CustomerRepository::new(state.pool())
        .list(query.is_login, None, page, query.sort_by, query.order)
        .await?;
    Ok(Json(Paged::new(result, page)))
}

async fn search(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Paged<Customer>>> {
    let page = query.page();
    let result = CustomerRepository::new(state.pool())
        .list(
            None,
            Some(&query.q),
            page,
            RecordSort::CreatedAt,
            SortOrder::Desc,
        )
        .await?;
    Ok(Json(Paged::new(result, page)))
}

async fn show(
    RequireStaff(_): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Customer>> {
    let customer = CustomerRepository::new(state.pool())
        .get(&record(&id))
        .await?;
    Ok(Json(found(customer, "Customer")?))
}

#[instrument(skip(state), fields(staff = %staff.code))]
async fn destroy(
    RequireStaffWriter(staff): RequireStaffWriter,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Message>> {
    let repo = CustomerRepository::new(state.pool());
    let customer = found(repo.get(&record(&id)).await?, "Customer")?;

    repo.delete(customer.id).await?;
    state
        .cloudinary()
        .destroy_quietly(customer.profile_image.as_slice())
        .await;

    tracing::info!(customer = %customer.code, "Customer deleted");
    Ok(Json(Message::new("Customer deleted")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_must_be_positive() {
        assert_eq!(check_quantity(3).unwrap(), 3);
        assert!(matches!(check_quantity(0), Err(AppError::BadRequest(_))));
        assert!(check_quantity(-2).is_err());
    }

    #[test]
    fn test_cart_add_quantity_is_optional() {
        let input: CartAdd = serde_json::from_str(r#"{"product_id": "PRD000004"}"#).unwrap();
        assert_eq!(input.quantity.unwrap_or(1), 1);
    }

    #[test]
    fn test_customer_query_defaults() {
        let query: CustomerQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.sort_by, RecordSort::CreatedAt);
        assert!(query.is_login.is_none());
    }
}
