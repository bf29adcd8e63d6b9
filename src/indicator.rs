pub mod ma;
pub mod rsi;
pub mod sequential;

// All transforms take an oldest-first close slice and return a vector of
// the same length, NaN (or zero for the integer counter) while the value
// is undefined, so outputs stay index-aligned with the price series.
