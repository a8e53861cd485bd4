//! Parameter block layouts shared by problems and factors.

pub mod ham;
