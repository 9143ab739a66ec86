use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};

use crate::extractors::SessionId;
use crate::state::AppState;

/// Attach a session to every request, creating one on first contact.
/// Handlers read it back through the `SessionId` extractor.
pub async fn session_layer(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let cookie_name = state.config.auth.cookie_name.clone();
    let presented = session_token(req.headers(), &cookie_name).map(str::to_string);

    let (token, fresh) = {
        let mut sessions = state.sessions.lock().await;
        match presented {
            Some(token) if sessions.touch(&token) => (token, false),
            _ => (sessions.create(), true),
        }
    };

    req.extensions_mut().insert(SessionId(token.clone()));
    let mut response = next.run(req).await;

    if fresh {
        tracing::debug!("Started new session");
        let cookie = format!("{}={}; HttpOnly; SameSite=Strict; Path=/", cookie_name, token);
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::warn!("Could not set session cookie: {}", e),
        }
    }
    response
}

/// Value of the named cookie, if the request carries it.
pub fn session_token<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == cookie_name {
                Some(val)
            } else {
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_named_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("theme=dark; dietlens_session=abc123"));
        headers.append(header::COOKIE, HeaderValue::from_static("other=1"));
        assert_eq!(session_token(&headers, "dietlens_session"), Some("abc123"));
        assert_eq!(session_token(&headers, "missing"), None);
    }

    #[test]
    fn no_cookie_header_means_no_token() {
        assert_eq!(session_token(&HeaderMap::new(), "dietlens_session"), None);
    }
}
