mod agent;
mod comment;
mod community;
mod post;
mod vote;

pub use agent::*;
pub use comment::*;
pub use community::*;
pub use post::*;
pub use vote::*;
