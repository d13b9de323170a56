pub mod attendance;
pub mod ingest;
pub mod parser;
pub mod progress;
pub mod sample;
pub mod scoring;

/// Integer percentage with round-to-nearest semantics.
/// A zero (or negative) denominator yields 0, never an error.
pub fn round_percent(part: f64, whole: f64) -> i64 {
    if whole <= 0.0 {
        return 0;
    }
    (100.0 * part / whole).round() as i64
}
