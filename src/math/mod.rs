pub mod fixed_point;
pub mod math_helpers;
