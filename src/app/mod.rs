pub mod auth;
pub mod comments;
pub mod pagination;
pub mod posts;
pub mod roles;
pub mod social;
pub mod tokens;
pub mod users;
