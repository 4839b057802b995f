pub mod inspect;
pub mod resume;
