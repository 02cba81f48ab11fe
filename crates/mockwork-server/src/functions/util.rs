//! Generators: `rand`, `uuid`.

use super::FunctionError;
use rand::Rng;

/// Inclusive random integer in `[min, max]`.
///
/// Both bounds must parse as integers and `min` must not exceed `max`.
pub(super) fn rand(min: &str, max: &str) -> Result<String, FunctionError> {
    let low: i64 = min
        .parse()
        .map_err(|_| FunctionError::Args(format!("rand: min {min:?} is not an integer")))?;
    let high: i64 = max
        .parse()
        .map_err(|_| FunctionError::Args(format!("rand: max {max:?} is not an integer")))?;
    if low > high {
        return Err(FunctionError::Args(format!(
            "rand: min {low} is greater than max {high}"
        )));
    }
    Ok(rand::thread_rng().gen_range(low..=high).to_string())
}

pub(super) fn uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}
