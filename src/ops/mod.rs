pub mod advisory;
pub mod edit_ops;
pub mod repository;
pub mod session;
pub mod view;
