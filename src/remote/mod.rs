pub mod http;
pub mod traits;
pub mod types;

pub use http::HttpRemoteStore;
pub use traits::RemoteStore;
pub use types::{CommentUpsert, LikeUpsert, PostUpsert, RemoteComment, RemoteLike, RemotePost};
