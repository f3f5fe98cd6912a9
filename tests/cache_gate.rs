mod common;

use common::harness;
use gatewire::cache_gate::fired_events;
use gatewire::events::EventType;
use gatewire::handlers::{HandlerRegistry, Tag, DEFAULT_EVENT_TYPES};
use gatewire::should_put;
use http::Method;

#[test]
fn reads_are_always_cached() {
    let registry = HandlerRegistry::default();
    assert!(should_put(&Method::GET, "/channels/1/messages/2", &registry));
    assert!(fired_events(&Method::GET, "/channels/1").is_empty());
}

#[test]
fn mutations_map_to_the_events_they_fire() {
    assert_eq!(fired_events(&Method::POST, "/channels/1/messages"), &[EventType::MessageCreate]);
    assert_eq!(fired_events(&Method::PATCH, "/channels/1/messages/2"), &[EventType::MessageUpdate]);
    assert_eq!(
        fired_events(&Method::PUT, "/guilds/1/bans/2"),
        &[EventType::GuildBanAdd, EventType::GuildMemberRemove]
    );
    assert_eq!(fired_events(&Method::DELETE, "/guilds/1/roles/2"), &[EventType::GuildRoleDelete]);
    assert!(fired_events(&Method::POST, "/interactions/1/token/callback").is_empty());
}

#[test]
fn query_strings_and_trailing_slashes_are_ignored() {
    assert_eq!(fired_events(&Method::POST, "/channels/1/messages/"), &[EventType::MessageCreate]);
    assert_eq!(
        fired_events(&Method::DELETE, "/channels/1/messages/2?reason=spam"),
        &[EventType::MessageDelete]
    );
}

#[tokio::test]
async fn covered_mutations_are_left_to_the_gateway() {
    let h = harness();
    let registry = h.client.registry();
    for t in DEFAULT_EVENT_TYPES {
        assert!(registry.has_default(*t));
    }
    assert!(!should_put(&Method::POST, "/channels/1/messages", registry));
    assert!(!should_put(&Method::PATCH, "/users/@me", registry));
}

#[tokio::test]
async fn partially_covered_mutations_are_cached() {
    let h = harness();
    // Bans fire GUILD_BAN_ADD, which has no default handler.
    assert!(should_put(&Method::PUT, "/guilds/1/bans/2", h.client.registry()));
    // Routes firing nothing are cached too.
    assert!(should_put(&Method::POST, "/gateway/whatever", h.client.registry()));
}

#[tokio::test]
async fn removing_a_default_reenables_the_rest_write() {
    let h = harness();
    assert!(!should_put(&Method::POST, "/channels/1/messages", h.client.registry()));
    assert!(h.client.delete_handler(EventType::MessageCreate, &Tag::default_handler()));
    assert!(should_put(&Method::POST, "/channels/1/messages", h.client.registry()));
}

#[tokio::test]
async fn user_handlers_do_not_count_as_coverage() {
    let h = harness();
    h.client.delete_handlers(EventType::ChannelUpdate);
    h.client
        .add_handler(
            EventType::ChannelUpdate,
            gatewire::Callback::any(|_, _| async {}),
        )
        .unwrap();
    assert!(should_put(&Method::PATCH, "/channels/1", h.client.registry()));
}
