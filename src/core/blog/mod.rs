// Blog content: posts, threaded comments, visibility rules.

pub mod blog_models;
pub mod blog_service;

pub use blog_models::*;
pub use blog_service::*;
