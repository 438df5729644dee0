//! Classification of S3 requests into access types.

use http::Method;
use s3gw_authz::AccessType;

/// Query parameter selecting a bucket or object ACL.
const ACL_PARAM: &str = "acl";

/// Query parameter of multipart upload initiation.
const UPLOADS_PARAM: &str = "uploads";

/// Query parameter identifying a multipart upload.
const UPLOAD_ID_PARAM: &str = "uploadId";

/// Multipart upload step a request belongs to, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultipartStep {
    /// `POST ?uploads`
    Initiate,
    /// `DELETE ?uploadId=...`
    Abort,
}

/// Access type required by `method` with the given query string.
///
/// Returns `None` for methods that are always denied.
pub fn classify(method: &Method, query: Option<&str>) -> Option<AccessType> {
    let acl = has_param(query, ACL_PARAM);
    match *method {
        Method::GET if acl => Some(AccessType::ReadAcp),
        Method::GET | Method::HEAD => Some(AccessType::Read),
        Method::PUT if acl => Some(AccessType::WriteAcp),
        Method::PUT | Method::POST | Method::DELETE => Some(AccessType::Write),
        _ => None,
    }
}

/// Multipart step of the request. Informational only.
pub fn multipart_step(method: &Method, query: Option<&str>) -> Option<MultipartStep> {
    match *method {
        Method::POST if has_param(query, UPLOADS_PARAM) => Some(MultipartStep::Initiate),
        Method::DELETE if has_param(query, UPLOAD_ID_PARAM) => Some(MultipartStep::Abort),
        _ => None,
    }
}

/// Whether the query string carries parameter `name`, with or without value.
pub fn has_param(query: Option<&str>, name: &str) -> bool {
    query.is_some_and(|q| {
        q.split('&')
            .map(|pair| pair.split_once('=').map_or(pair, |(key, _)| key))
            .any(|key| key == name)
    })
}
