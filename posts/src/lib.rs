pub mod introduction;
pub mod service;
pub mod users;

pub use introduction::{Introduction, IntroductionError, IntroductionService};
pub use service::{NewPost, Pagination, PostError, PostPage, PostPatch, PostService, MAX_TITLE_CHARS};
pub use users::{AccessToken, Credentials, UserError, UserService, MIN_PASSWORD_CHARS};
