//! Raw verdict → [`Category`].

use crate::model::Category;

/// Classify a raw result by case-insensitive substring match.
///
/// Precedence: "expressive" with "true", "expressive" with "false", "true",
/// "false", otherwise unclassified.
pub fn classify(raw: &str) -> Category {
    let lower = raw.to_lowercase();
    let expressive = lower.contains("expressive");
    let has_true = lower.contains("true");
    let has_false = lower.contains("false");

    match (expressive, has_true, has_false) {
        (true, true, _) => Category::ExpressiveTrue,
        (true, false, true) => Category::ExpressiveFalse,
        (false, true, _) => Category::True,
        (false, false, true) => Category::False,
        _ => Category::Unclassified,
    }
}
