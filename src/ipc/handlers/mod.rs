pub mod core;
pub mod generation;
pub mod goals;
pub mod parents;
pub mod psych;
pub mod students;
pub mod study;
pub mod teachers;
pub mod vocab;
