mod validation;

pub use validation::{
    normalize_currency_code,
    validate_code,
    validate_min_amount,
    validate_new_rate,
    validate_rules,
    validate_value,
    RateValidationError,
};
