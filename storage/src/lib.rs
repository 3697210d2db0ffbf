pub mod post_store;
pub mod user_store;
pub mod vector_index;

pub use post_store::{InMemoryPostStore, PostStore, StoreError};
pub use user_store::{InMemoryUserStore, UserStore};
pub use vector_index::{IndexError, LinearVectorIndex, VectorIndex};
