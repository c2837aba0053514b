mod client;
mod error;
mod forms;

pub use client::ApiClient;
pub use error::{ApiError, ApiResult};
pub use forms::{ImageFile, NewPost, PostEdit};
