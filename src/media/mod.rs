pub mod object_store;
pub mod uploader;

pub use object_store::{HttpObjectStore, ObjectStore};
pub use uploader::MediaUploader;
