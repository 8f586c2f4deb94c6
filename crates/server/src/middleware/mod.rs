pub mod auth;
pub mod model_loaders;

pub use auth::{CurrentUser, require_admin, require_session};
pub use model_loaders::{load_member_middleware, load_publication_middleware};
