pub mod attendance;
pub mod auth;
pub mod catalog;
pub mod classes;
pub mod core;
pub mod extracurriculars;
pub mod grades;
pub mod profile;
pub mod reports;
pub mod students;
pub mod teachers;
