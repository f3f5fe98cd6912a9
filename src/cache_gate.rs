//! Decides whether a REST response should be written to the cache.
//!
//! A mutating call usually makes the gateway fire one or more events, and the default
//! handlers for those events perform the same upsert. Writing the REST result as well would
//! race them, so the write is skipped when every fired event type is covered by a default
//! handler.

use crate::events::EventType;
use crate::handlers::HandlerRegistry;
use http::Method;
use regex::Regex;
use std::sync::OnceLock;

const ID: &str = r"\d+";

/// `(method, pattern, fired events)`. `{id}` stands for a numeric snowflake; patterns are
/// matched against the whole path.
const ROUTES: &[(&str, &str, &[EventType])] = &[
    ("POST", "/channels/{id}/messages", &[EventType::MessageCreate]),
    ("POST", "/channels/{id}/messages/bulk-delete", &[EventType::MessageDeleteBulk]),
    ("POST", "/channels/{id}/typing", &[EventType::TypingStart]),
    ("POST", "/guilds", &[EventType::GuildCreate]),
    ("POST", "/guilds/{id}/channels", &[EventType::ChannelCreate]),
    ("POST", "/guilds/{id}/roles", &[EventType::GuildRoleCreate]),
    ("POST", "/guilds/{id}/emojis", &[EventType::GuildEmojisUpdate]),
    ("POST", "/users/@me/channels", &[EventType::ChannelCreate]),
    ("PUT", "/channels/{id}/messages/{id}/reactions/[^/]+/@me", &[EventType::MessageReactionAdd]),
    ("PUT", "/channels/{id}/pins/{id}", &[EventType::ChannelPinsUpdate]),
    ("PUT", "/guilds/{id}/bans/{id}", &[EventType::GuildBanAdd, EventType::GuildMemberRemove]),
    ("PUT", "/guilds/{id}/members/{id}", &[EventType::GuildMemberAdd]),
    ("PUT", "/guilds/{id}/members/{id}/roles/{id}", &[EventType::GuildMemberUpdate]),
    ("PATCH", "/channels/{id}", &[EventType::ChannelUpdate]),
    ("PATCH", "/channels/{id}/messages/{id}", &[EventType::MessageUpdate]),
    ("PATCH", "/guilds/{id}", &[EventType::GuildUpdate]),
    ("PATCH", "/guilds/{id}/members/{id}", &[EventType::GuildMemberUpdate]),
    ("PATCH", "/guilds/{id}/members/@me/nick", &[EventType::GuildMemberUpdate]),
    ("PATCH", "/guilds/{id}/roles", &[EventType::GuildRoleUpdate]),
    ("PATCH", "/guilds/{id}/roles/{id}", &[EventType::GuildRoleUpdate]),
    ("PATCH", "/guilds/{id}/emojis/{id}", &[EventType::GuildEmojisUpdate]),
    ("PATCH", "/users/@me", &[EventType::UserUpdate]),
    ("DELETE", "/channels/{id}", &[EventType::ChannelDelete]),
    ("DELETE", "/channels/{id}/messages/{id}", &[EventType::MessageDelete]),
    ("DELETE", "/channels/{id}/messages/{id}/reactions", &[EventType::MessageReactionRemoveAll]),
    (
        "DELETE",
        "/channels/{id}/messages/{id}/reactions/[^/]+/(?:@me|{id})",
        &[EventType::MessageReactionRemove],
    ),
    ("DELETE", "/channels/{id}/pins/{id}", &[EventType::ChannelPinsUpdate]),
    ("DELETE", "/guilds/{id}", &[EventType::GuildDelete]),
    ("DELETE", "/guilds/{id}/bans/{id}", &[EventType::GuildBanRemove]),
    ("DELETE", "/guilds/{id}/members/{id}", &[EventType::GuildMemberRemove]),
    ("DELETE", "/guilds/{id}/members/{id}/roles/{id}", &[EventType::GuildMemberUpdate]),
    ("DELETE", "/guilds/{id}/roles/{id}", &[EventType::GuildRoleDelete]),
    ("DELETE", "/guilds/{id}/emojis/{id}", &[EventType::GuildEmojisUpdate]),
    ("DELETE", "/users/@me/guilds/{id}", &[EventType::GuildDelete]),
];

struct Route {
    method: Method,
    pattern: Regex,
    fires: &'static [EventType],
}

fn same_method(a: &Method, b: &Method) -> bool {
    a.as_str().eq_ignore_ascii_case(b.as_str())
}

fn routes() -> &'static [Route] {
    static TABLE: OnceLock<Vec<Route>> = OnceLock::new();
    TABLE.get_or_init(|| {
        ROUTES
            .iter()
            .map(|(method, pattern, fires)| Route {
                method: Method::from_bytes(method.as_bytes()).expect("route table method is valid"),
                pattern: Regex::new(&format!("^{}$", pattern.replace("{id}", ID)))
                    .expect("route table pattern is valid"),
                fires: *fires,
            })
            .collect()
    })
}

/// Event types the remote service fires for `method` on `path`. Empty for reads and for
/// routes that fire nothing. Any query string is ignored.
pub fn fired_events(method: &Method, path: &str) -> &'static [EventType] {
    if same_method(method, &Method::GET) {
        return &[];
    }
    let path = path.split_once('?').map_or(path, |(p, _)| p);
    let path = path.strip_suffix('/').filter(|p| !p.is_empty()).unwrap_or(path);
    routes()
        .iter()
        .find(|r| same_method(&r.method, method) && r.pattern.is_match(path))
        .map(|r| r.fires)
        .unwrap_or(&[])
}

/// Whether a successful response to `method` on `path` should be upserted into the cache.
///
/// Reads always are. A mutating call is skipped only when it fires at least one event and
/// every fired event type has a live default handler.
pub fn should_put(method: &Method, path: &str, registry: &HandlerRegistry) -> bool {
    if same_method(method, &Method::GET) {
        return true;
    }
    let fires = fired_events(method, path);
    fires.is_empty() || !fires.iter().all(|t| registry.has_default(*t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_pattern_compiles() {
        assert_eq!(routes().len(), ROUTES.len());
    }

    #[test]
    fn patterns_are_anchored() {
        assert_eq!(fired_events(&Method::PATCH, "/channels/1"), &[EventType::ChannelUpdate]);
        assert_eq!(fired_events(&Method::PATCH, "/channels/1/messages/2"), &[EventType::MessageUpdate]);
        assert!(fired_events(&Method::PATCH, "/v9/channels/1").is_empty());
        assert!(fired_events(&Method::PATCH, "/channels/1/extra").is_empty());
        assert!(fired_events(&Method::PATCH, "/channels/abc").is_empty());
    }

    #[test]
    fn query_and_trailing_slash_are_ignored() {
        assert_eq!(
            fired_events(&Method::POST, "/channels/1/messages?wait=true"),
            &[EventType::MessageCreate]
        );
        assert_eq!(fired_events(&Method::DELETE, "/guilds/5/"), &[EventType::GuildDelete]);
    }

    #[test]
    fn reactions() {
        let path = "/channels/1/messages/2/reactions/%F0%9F%91%8D/@me";
        assert_eq!(fired_events(&Method::PUT, path), &[EventType::MessageReactionAdd]);
        assert_eq!(fired_events(&Method::DELETE, path), &[EventType::MessageReactionRemove]);
        assert_eq!(
            fired_events(&Method::DELETE, "/channels/1/messages/2/reactions"),
            &[EventType::MessageReactionRemoveAll]
        );
    }

    #[test]
    fn reads_always_put() {
        let reg = HandlerRegistry::default();
        assert!(should_put(&Method::GET, "/channels/1", &reg));
        crate::handlers::defaults::register(&reg);
        assert!(should_put(&Method::GET, "/channels/1", &reg));
        let lower = Method::from_bytes(b"get").unwrap();
        assert!(should_put(&lower, "/channels/1", &reg));
    }

    #[test]
    fn method_match_ignores_case() {
        let patch = Method::from_bytes(b"patch").unwrap();
        assert_eq!(fired_events(&patch, "/users/@me"), &[EventType::UserUpdate]);
    }
}
