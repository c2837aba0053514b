mod comment_repository;
mod follow_repository;
mod like_repository;
mod post_repository;
mod user_repository;

pub use comment_repository::{CommentOwnership, CommentRepository};
pub use follow_repository::FollowRepository;
pub use like_repository::{LikeRepository, LikeTarget};
pub use post_repository::{PostFilter, PostRepository};
pub use user_repository::{UserRecord, UserRepository};
