//! The chat endpoint: SSE streaming in, conversation deletion out.

use {
    axum::{
        Json,
        body::Body,
        extract::{Query, State},
        http::{HeaderMap, header},
        response::{IntoResponse, Response},
    },
    bytes::Bytes,
    futures::StreamExt,
    serde::Deserialize,
    std::convert::Infallible,
    tandem_protocol::{ChatRequest, RequestHints},
    uuid::Uuid,
};

use crate::{auth::UserIdentity, error::Result, state::AppState};

/// Best-effort geographic hints set by the fronting proxy. Absent or
/// unparsable headers simply leave the field unset.
pub fn hints_from_headers(headers: &HeaderMap) -> RequestHints {
    let text = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let number = |name: &str| text(name).and_then(|v| v.parse::<f64>().ok());

    RequestHints {
        latitude: number("x-geo-latitude"),
        longitude: number("x-geo-longitude"),
        city: text("x-geo-city"),
        country: text("x-geo-country"),
    }
}

/// `POST /chat` — runs the pre-stream pipeline, then streams typed SSE
/// frames. Pipeline rejections surface as JSON error responses; anything
/// after that arrives as in-stream `error` frames on the 200 response.
pub async fn post_chat(
    State(state): State<AppState>,
    identity: UserIdentity,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Response> {
    let hints = hints_from_headers(&headers);
    let stream = state
        .chat
        .stream_chat(&identity.user_id, hints, request)
        .await?;

    let body = Body::from_stream(
        stream.map(|event| Ok::<_, Infallible>(Bytes::from(event.to_sse()))),
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        body,
    )
        .into_response())
}

#[derive(Deserialize)]
pub struct DeleteParams {
    pub id: Uuid,
}

/// `DELETE /chat?id=` — removes a conversation the caller owns and
/// returns the deleted record.
pub async fn delete_chat(
    State(state): State<AppState>,
    identity: UserIdentity,
    Query(params): Query<DeleteParams>,
) -> Result<Response> {
    let Some(conversation) = state.storage().get_conversation(params.id).await? else {
        return Err(crate::error::ApiError::not_found("conversation not found"));
    };
    if conversation.owner_id != identity.user_id {
        return Err(crate::error::ApiError::forbidden(
            "not the owner of this conversation",
        ));
    }

    let deleted = state.storage().delete_conversation(params.id).await?;
    Ok(Json(deleted).into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn hints_parse_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-geo-latitude", "59.91".parse().unwrap());
        headers.insert("x-geo-longitude", "10.75".parse().unwrap());
        headers.insert("x-geo-city", "Oslo".parse().unwrap());

        let hints = hints_from_headers(&headers);
        assert_eq!(hints.latitude, Some(59.91));
        assert_eq!(hints.city.as_deref(), Some("Oslo"));
        assert_eq!(hints.country, None);
    }

    #[test]
    fn unparsable_coordinates_are_dropped() {
        let mut headers = HeaderMap::new();
        headers.insert("x-geo-latitude", "north-ish".parse().unwrap());
        let hints = hints_from_headers(&headers);
        assert_eq!(hints.latitude, None);
    }
}
