//! Built-in handlers that keep [`State`] in sync with gateway events.
//!
//! They are registered under
//! [`Tag::default_handler`](crate::handlers::Tag::default_handler) when a client is built,
//! do nothing while the cache is disabled, and can be removed like any other handler.

use crate::client::Client;
use crate::entities::Field;
use crate::events::*;
use crate::handlers::{Callback, HandlerRegistry};
use crate::state::State;
use std::future::{ready, Ready as ReadyFuture};

fn cache<T, F>(registry: &HandlerRegistry, apply: F)
where
    T: GatewayEvent,
    F: Fn(&State, T) + Send + Sync + 'static,
{
    let callback = Callback::on::<T, _, _>(move |client: Client, payload: T| -> ReadyFuture<()> {
        if client.cache_enabled() {
            apply(client.state(), payload);
        }
        ready(())
    });
    registry.insert_default(T::TYPE, callback);
}

/// Install every default handler into `registry`.
pub(crate) fn register(registry: &HandlerRegistry) {
    cache(registry, |state, ev: Ready| {
        state.set_current_user(ev.user);
        for guild in ev.guilds {
            state.put_guild(guild);
        }
    });
    cache(registry, |state, ev: GuildCreate| {
        state.put_guild(ev.guild);
    });
    cache(registry, |state, ev: GuildUpdate| {
        state.put_guild(ev.guild);
    });
    cache(registry, |state, ev: GuildDelete| {
        if ev.unavailable == Some(true) {
            state.guilds.modify(&ev.id, |g| g.unavailable = Field::Present(true));
        } else {
            state.remove_guild(ev.id);
        }
    });
    cache(registry, |state, ev: GuildEmojisUpdate| {
        state.guilds.modify(&ev.guild_id, |g| g.emojis = Field::Present(ev.emojis));
    });

    cache(registry, |state, ev: ChannelCreate| {
        state.put_channel(ev.channel);
    });
    cache(registry, |state, ev: ChannelUpdate| {
        state.put_channel(ev.channel);
    });
    cache(registry, |state, ev: ChannelDelete| {
        state.remove_channel(ev.channel.id);
    });

    cache(registry, |state, ev: GuildMemberAdd| {
        state.put_member(ev.guild_id, ev.member);
        state.guilds.modify(&ev.guild_id, |g| {
            if let Some(count) = g.member_count.as_mut_option() {
                *count += 1;
            }
        });
    });
    cache(registry, |state, ev: GuildMemberUpdate| {
        state.put_member(ev.guild_id, ev.member);
    });
    cache(registry, |state, ev: GuildMemberRemove| {
        state.remove_member(ev.guild_id, ev.user.id);
        state.guilds.modify(&ev.guild_id, |g| {
            if let Some(count) = g.member_count.as_mut_option() {
                *count = count.saturating_sub(1);
            }
        });
    });

    cache(registry, |state, ev: GuildRoleCreate| {
        state.put_role(ev.guild_id, ev.role);
    });
    cache(registry, |state, ev: GuildRoleUpdate| {
        state.put_role(ev.guild_id, ev.role);
    });
    cache(registry, |state, ev: GuildRoleDelete| {
        state.remove_role(ev.guild_id, ev.role_id);
    });

    cache(registry, |state, ev: MessageCreate| {
        let message = state.put_message(ev.message);
        state
            .channels
            .modify(&message.channel_id, |c| c.last_message_id = Field::Present(message.id));
    });
    cache(registry, |state, ev: MessageUpdate| {
        state.put_message(ev.message);
    });
    cache(registry, |state, ev: MessageDelete| {
        state.messages.remove(&ev.id);
    });
    cache(registry, |state, ev: MessageDeleteBulk| {
        for id in &ev.ids {
            state.messages.remove(id);
        }
    });

    cache(registry, |state, ev: PresenceUpdate| {
        let presence = ev.presence;
        if let Some(user) = presence.user.as_option() {
            state.users.upsert(user.id, user.clone());
        }
        state.put_presence(presence.guild_id.as_option().copied(), presence);
    });
    cache(registry, |state, ev: UserUpdate| {
        state.set_current_user(ev.user);
    });
}

/// Event types covered by a default handler.
pub const DEFAULT_EVENT_TYPES: &[EventType] = &[
    EventType::Ready,
    EventType::GuildCreate,
    EventType::GuildUpdate,
    EventType::GuildDelete,
    EventType::GuildEmojisUpdate,
    EventType::ChannelCreate,
    EventType::ChannelUpdate,
    EventType::ChannelDelete,
    EventType::GuildMemberAdd,
    EventType::GuildMemberUpdate,
    EventType::GuildMemberRemove,
    EventType::GuildRoleCreate,
    EventType::GuildRoleUpdate,
    EventType::GuildRoleDelete,
    EventType::MessageCreate,
    EventType::MessageUpdate,
    EventType::MessageDelete,
    EventType::MessageDeleteBulk,
    EventType::PresenceUpdate,
    EventType::UserUpdate,
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::Tag;

    #[test]
    fn every_listed_type_gets_a_default() {
        let registry = HandlerRegistry::default();
        register(&registry);
        for t in DEFAULT_EVENT_TYPES {
            assert!(registry.has_default(*t), "{t} has no default handler");
        }
        assert_eq!(registry.len(), DEFAULT_EVENT_TYPES.len());
        assert!(!registry.has_default(EventType::TypingStart));
        assert!(registry
            .handlers(EventType::Ready)
            .iter()
            .all(|h| h.tag() == &Tag::default_handler()));
    }
}
