//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Customer and staff registration, login, password hashing
//! - `checkout` - Transactional order placement, status changes and deletion
//! - `cloudinary` - Image host client
//! - `razorpay` - Payment gateway client
//! - `uploads` - Multipart form parsing

pub mod auth;
pub mod checkout;
pub mod cloudinary;
pub mod razorpay;
pub mod uploads;
