//! Requester identity supplied by the upstream auth layer.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use docverify_types::{RequesterIdentity, RequesterType, UserId};

use crate::RpcError;

pub const REQUESTER_ID_HEADER: &str = "x-requester-id";
pub const REQUESTER_TYPE_HEADER: &str = "x-requester-type";

/// Extractor for the caller's resolved identity.
///
/// Missing or malformed headers reject the request with 401. The identity is
/// trusted as-is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Requester(pub RequesterIdentity);

impl Requester {
    /// Reject callers that may not issue documents.
    pub fn require_issuer(&self) -> Result<(), RpcError> {
        if self.0.kind.can_issue() {
            Ok(())
        } else {
            Err(RpcError::Forbidden(format!(
                "requester type {} may not issue documents",
                self.0.kind.as_str()
            )))
        }
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, RpcError> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(RpcError::Unauthorized)
}

#[async_trait]
impl<S> FromRequestParts<S> for Requester
where
    S: Send + Sync,
{
    type Rejection = RpcError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = UserId::new(header(parts, REQUESTER_ID_HEADER)?)
            .map_err(|_| RpcError::Unauthorized)?;
        let kind: RequesterType = header(parts, REQUESTER_TYPE_HEADER)?
            .parse()
            .map_err(|_| RpcError::Unauthorized)?;
        Ok(Self(RequesterIdentity::new(id, kind)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(req: Request<()>) -> Result<Requester, RpcError> {
        let (mut parts, _) = req.into_parts();
        Requester::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_both_headers() {
        let req = Request::builder()
            .header(REQUESTER_ID_HEADER, "uni-1")
            .header(REQUESTER_TYPE_HEADER, "University")
            .body(())
            .unwrap();
        let requester = extract(req).await.unwrap();
        assert_eq!(requester.0.id.as_str(), "uni-1");
        assert_eq!(requester.0.kind, RequesterType::University);
        assert!(requester.require_issuer().is_ok());
    }

    #[tokio::test]
    async fn missing_type_is_unauthorized() {
        let req = Request::builder()
            .header(REQUESTER_ID_HEADER, "uni-1")
            .body(())
            .unwrap();
        assert!(matches!(extract(req).await, Err(RpcError::Unauthorized)));
    }

    #[tokio::test]
    async fn unknown_type_is_unauthorized() {
        let req = Request::builder()
            .header(REQUESTER_ID_HEADER, "x")
            .header(REQUESTER_TYPE_HEADER, "admin")
            .body(())
            .unwrap();
        assert!(matches!(extract(req).await, Err(RpcError::Unauthorized)));
    }

    #[test]
    fn students_cannot_issue() {
        let requester = Requester(RequesterIdentity::new(
            UserId::new("student-1").unwrap(),
            RequesterType::Student,
        ));
        assert!(matches!(
            requester.require_issuer(),
            Err(RpcError::Forbidden(_))
        ));
    }
}
