//! Pure evaluation helpers: condition evaluation, slot-path resolution,
//! template interpolation and input validation.

pub mod condition;
pub mod path;
pub mod template;
pub mod validate;

pub use condition::{Operator, evaluate_condition};
pub use path::{PathSegment, SlotPath, resolve_path};
pub use template::interpolate;
pub use validate::{DateRangeRule, ValidationKind, ValidationRule, Validity, validate_input};
