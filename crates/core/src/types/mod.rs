//! Value types shared by the API, CLI and tests.

pub mod email;
pub mod id;
pub mod money;
pub mod phone;
pub mod public_id;
pub mod slug;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{round_money, to_minor_units};
pub use phone::{Phone, PhoneError};
pub use public_id::{PUBLIC_ID_WIDTH, PublicIdKind, RecordRef};
pub use slug::{product_slug, slugify};
pub use status::*;
