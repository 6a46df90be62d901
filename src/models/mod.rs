pub mod decision;
pub mod document;
pub mod submission;
pub mod user;
