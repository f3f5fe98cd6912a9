//! Route canonicalization for bucket keys.

use http::Method;

/// Collection roots whose limits apply per concrete resource id.
const PER_RESOURCE_ROOTS: [&str; 3] = ["/channels", "/guilds", "/webhooks"];

/// Map a request path and method to the key of the bucket that governs it.
///
/// The trailing numeric id is stripped so that every resource of a collection shares one
/// bucket (`/users/1` and `/users/2` both map to `/users`), except under the per-resource
/// roots (`/channels/1`, `/guilds/1`, `/webhooks/1` keep their id). Deleting a single message
/// has its own limit and is keyed as `"/channels/{id}/messages DELETE"`. Query strings never
/// take part in the key.
///
/// ```rust
/// use gatewire::rate_limit::parse_endpoint;
/// use http::Method;
///
/// assert_eq!(parse_endpoint("/users/1", &Method::GET), "/users");
/// assert_eq!(parse_endpoint("/channels/1", &Method::GET), "/channels/1");
/// assert_eq!(
///     parse_endpoint("/channels/1/messages/1", &Method::DELETE),
///     "/channels/1/messages DELETE"
/// );
/// ```
pub fn parse_endpoint(path: &str, method: &Method) -> String {
    let path = path.split('?').next().unwrap_or_default();

    let stripped = match path.rsplit_once('/') {
        Some((parent, last)) if is_id(last) => parent,
        _ => return path.to_string(),
    };

    if PER_RESOURCE_ROOTS.contains(&stripped) {
        return path.to_string();
    }

    if *method == Method::DELETE && is_message_collection(stripped) {
        return format!("{stripped} {method}");
    }

    stripped.to_string()
}

fn is_id(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// `/channels/{id}/messages`
fn is_message_collection(path: &str) -> bool {
    let mut segments = path.split('/');
    matches!(
        (segments.next(), segments.next(), segments.next(), segments.next(), segments.next()),
        (Some(""), Some("channels"), Some(id), Some("messages"), None) if is_id(id)
    )
}
