pub mod payments;
pub mod traits;
pub mod types;
pub mod units;

pub use payments::{PaymentClient, RequestOptions};
pub use traits::{PaymentApi, UnitApi};
pub use types::UnitFilters;
pub use units::{encode_unit_form, FormEntry, ImageUpload, UnitClient, UnitForm};
