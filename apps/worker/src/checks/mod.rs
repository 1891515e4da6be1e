/// Check records as the worker sees them: the typed model and the sanitation
/// step that turns stored JSON into it.
pub mod model;
pub mod validation;

pub use model::{Check, CheckState, HttpMethod, Protocol};
pub use validation::{Eligibility, IneligibleRecord, validate_check};
