//! Domain models for the API.
//!
//! Plain data returned by repositories and serialized by handlers. Inputs
//! that arrive as JSON derive `Deserialize`; multipart inputs are assembled
//! by the route handlers.

pub mod attribute;
pub mod category;
pub mod component;
pub mod coupon;
pub mod customer;
pub mod image;
pub mod order;
pub mod payment;
pub mod pickup;
pub mod product;
pub mod review;
pub mod session;
pub mod staff;
pub mod variable;

pub use attribute::{Attribute, AttributeUpdate, NewAttribute};
pub use category::{Category, CategoryUpdate, NewCategory, Subcategory, SubSubcategory};
pub use component::{Component, ComponentOption, ComponentUpdate, NewComponent};
pub use coupon::{Coupon, CouponFilter, CouponUpdate, NewCoupon};
pub use customer::{Cart, CartLine, Customer, CustomerUpdate, WishlistEntry, WishlistFilter};
pub use image::ImageAsset;
pub use order::{
    CheckoutItem, CheckoutRequest, Order, OrderFilter, OrderItem, OrderUpdate, PlacedOrder,
};
pub use payment::{Payment, PaymentConfirmation, PaymentFilter};
pub use pickup::{NewPickup, Pickup, PickupUpdate};
pub use product::{
    NewProduct, Product, ProductFilter, ProductSort, ProductSummary, ProductUpdate,
    ProductVariant, SpecificationEntry,
};
pub use review::{NewReview, Review, ReviewFilter, ReviewUpdate};
pub use session::{CurrentCustomer, CurrentStaff, keys as session_keys};
pub use staff::{NewStaffUser, StaffUser, StaffUserUpdate};
pub use variable::{NewVariable, Variable, VariableUpdate};
