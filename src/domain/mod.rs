pub mod markup;
pub mod permission;
pub mod post;
pub mod role;
pub mod social_graph;
pub mod user;
