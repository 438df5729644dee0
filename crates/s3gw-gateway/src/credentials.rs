//! Access key extraction from `Authorization` headers.

/// Marker preceding the credential scope in signature v4 headers.
const CREDENTIAL_MARKER: &str = "Credential";

/// Scheme prefix of signature v2 headers.
const V2_PREFIX: &str = "AWS ";

/// Extract the access key id from an `Authorization` header value.
///
/// Signature v4 headers carry `Credential=<key>/<date>/<region>/...,`; the key
/// is the first `/`-separated component of the text between the marker and the
/// next comma. Signature v2 headers (`AWS <key>:<signature>`) are accepted too.
pub fn extract_access_key(header: &str) -> Option<&str> {
    let header = header.trim();

    if let Some(pos) = header.find(CREDENTIAL_MARKER) {
        let rest = &header[pos + CREDENTIAL_MARKER.len()..];
        let rest = rest.strip_prefix('=').unwrap_or(rest);
        let scope = rest.split(',').next().unwrap_or_default();
        let key = scope.split('/').next().unwrap_or_default().trim();
        return (!key.is_empty()).then_some(key);
    }

    if let Some(rest) = header.strip_prefix(V2_PREFIX) {
        let (key, signature) = rest.split_once(':')?;
        let key = key.trim();
        return (!key.is_empty() && !signature.is_empty()).then_some(key);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v4_header() {
        let header = "AWS4-HMAC-SHA256 Credential=AKIAABC/20240101/us-east-1/s3/aws4_request, \
                      SignedHeaders=host;x-amz-date, Signature=abcdef";
        assert_eq!(extract_access_key(header), Some("AKIAABC"));
    }

    #[test]
    fn test_v4_header_without_spaces() {
        let header = "AWS4-HMAC-SHA256 Credential=KEY2/20240101/eu/s3/aws4_request,SignedHeaders=host,Signature=0";
        assert_eq!(extract_access_key(header), Some("KEY2"));
    }

    #[test]
    fn test_v2_header() {
        assert_eq!(extract_access_key("AWS OLDKEY:c2lnbmF0dXJl"), Some("OLDKEY"));
        assert_eq!(extract_access_key("AWS OLDKEY"), None);
        assert_eq!(extract_access_key("AWS :sig"), None);
    }

    #[test]
    fn test_malformed_headers() {
        assert_eq!(extract_access_key(""), None);
        assert_eq!(extract_access_key("Bearer token"), None);
        assert_eq!(extract_access_key("AWS4-HMAC-SHA256 Credential=, Signature=x"), None);
        assert_eq!(extract_access_key("AWS4-HMAC-SHA256 Credential=/2024/x"), None);
    }
}
