//! HTTP middleware stack for the API.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS
//! 5. Session layer (tower-sessions with `PostgreSQL` store)
//! 6. Rate limiting on login routes (governor)

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod session;

pub use auth::{
    OptionalCustomer, OptionalStaff, RequireCustomer, RequireStaff, RequireStaffWriter,
    RequireSuperAdmin, clear_current_customer, clear_current_staff, set_current_customer,
    set_current_staff,
};
pub use rate_limit::login_rate_limiter;
pub use request_id::request_id_middleware;
pub use session::create_session_layer;
