pub mod multipart;

pub use multipart::{parse_response, MultipartUploader, UploadResponse};
