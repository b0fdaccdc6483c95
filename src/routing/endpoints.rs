//! Routes for commonly used endpoints.
//!
//! Reaction arguments must already be URL-encoded (`name:id` for custom
//! emoji, the percent-encoded character otherwise).

use std::fmt::Display;

use super::{Route, RouteBuilder};

/// The current user, for routes that accept `@me` in place of an ID.
pub const ME: &str = "@me";

fn channels(channel_id: impl Display) -> RouteBuilder {
    Route::builder().segment("channels").major(channel_id)
}

fn guilds(guild_id: impl Display) -> RouteBuilder {
    Route::builder().segment("guilds").major(guild_id)
}

pub fn channel(channel_id: impl Display) -> Route {
    channels(channel_id).build()
}

pub fn channel_messages(channel_id: impl Display) -> Route {
    channels(channel_id).segment("messages").build()
}

pub fn channel_message(channel_id: impl Display, message_id: impl Display) -> Route {
    channels(channel_id)
        .segment("messages")
        .minor(message_id)
        .build()
}

pub fn message_reactions(channel_id: impl Display, message_id: impl Display) -> Route {
    channels(channel_id)
        .segment("messages")
        .minor(message_id)
        .segment("reactions")
        .build()
}

pub fn message_reaction(
    channel_id: impl Display,
    message_id: impl Display,
    reaction: &str,
) -> Route {
    channels(channel_id)
        .segment("messages")
        .minor(message_id)
        .segment("reactions")
        .minor(reaction)
        .build()
}

/// One user's reaction; pass [`ME`] for the current user.
pub fn message_reaction_user(
    channel_id: impl Display,
    message_id: impl Display,
    reaction: &str,
    user_id: impl Display,
) -> Route {
    channels(channel_id)
        .segment("messages")
        .minor(message_id)
        .segment("reactions")
        .minor(reaction)
        .minor(user_id)
        .build()
}

pub fn channel_pins(channel_id: impl Display) -> Route {
    channels(channel_id).segment("pins").build()
}

pub fn channel_pin(channel_id: impl Display, message_id: impl Display) -> Route {
    channels(channel_id).segment("pins").minor(message_id).build()
}

pub fn channel_typing(channel_id: impl Display) -> Route {
    channels(channel_id).segment("typing").build()
}

pub fn guild(guild_id: impl Display) -> Route {
    guilds(guild_id).build()
}

pub fn guild_bans(guild_id: impl Display) -> Route {
    guilds(guild_id).segment("bans").build()
}

pub fn guild_ban(guild_id: impl Display, user_id: impl Display) -> Route {
    guilds(guild_id).segment("bans").minor(user_id).build()
}

pub fn guild_members(guild_id: impl Display) -> Route {
    guilds(guild_id).segment("members").build()
}

pub fn guild_member(guild_id: impl Display, user_id: impl Display) -> Route {
    guilds(guild_id).segment("members").minor(user_id).build()
}

pub fn guild_member_role(
    guild_id: impl Display,
    user_id: impl Display,
    role_id: impl Display,
) -> Route {
    guilds(guild_id)
        .segment("members")
        .minor(user_id)
        .segment("roles")
        .minor(role_id)
        .build()
}

pub fn guild_roles(guild_id: impl Display) -> Route {
    guilds(guild_id).segment("roles").build()
}

pub fn guild_role(guild_id: impl Display, role_id: impl Display) -> Route {
    guilds(guild_id).segment("roles").minor(role_id).build()
}

pub fn user(user_id: impl Display) -> Route {
    Route::builder().segment("users").major(user_id).build()
}

pub fn user_guild(user_id: impl Display, guild_id: impl Display) -> Route {
    Route::builder()
        .segment("users")
        .major(user_id)
        .segment("guilds")
        .minor(guild_id)
        .build()
}

pub fn webhook(webhook_id: impl Display) -> Route {
    Route::builder().segment("webhooks").major(webhook_id).build()
}

/// The token never ends up in the bucket key.
pub fn webhook_with_token(webhook_id: impl Display, token: &str) -> Route {
    Route::builder()
        .segment("webhooks")
        .major(webhook_id)
        .minor(token)
        .build()
}

pub fn gateway() -> Route {
    Route::single("/gateway")
}

pub fn gateway_bot() -> Route {
    Route::single("/gateway/bot")
}

pub fn oauth2_application(application_id: impl Display) -> Route {
    Route::builder()
        .segment("oauth2")
        .segment("applications")
        .minor(application_id)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_in_one_channel_share_a_bucket() {
        let a = channel_message(10, 1);
        let b = channel_message(10, 2);
        let other_channel = channel_message(11, 1);

        assert_eq!(a.bucket, b.bucket);
        assert_ne!(a.bucket, other_channel.bucket);
        assert_eq!(a.bucket, "/channels/10/messages/{}");
        assert_eq!(a.path, "/channels/10/messages/1");
    }

    #[test]
    fn test_reaction_routes() {
        let route = message_reaction_user(10, 20, "%F0%9F%91%8D", ME);
        assert_eq!(route.path, "/channels/10/messages/20/reactions/%F0%9F%91%8D/@me");
        assert_eq!(route.bucket, "/channels/10/messages/{}/reactions/{}/{}");

        assert_eq!(
            message_reactions(10, 20).bucket,
            "/channels/10/messages/{}/reactions"
        );
        assert_eq!(
            message_reaction(10, 20, "blob:123").bucket,
            "/channels/10/messages/{}/reactions/{}"
        );
    }

    #[test]
    fn test_guild_routes() {
        assert_eq!(guild(5).bucket, "/guilds/5");
        assert_eq!(guild_member(5, 6).bucket, "/guilds/5/members/{}");
        assert_eq!(
            guild_member_role(5, 6, 7).path,
            "/guilds/5/members/6/roles/7"
        );
        assert_eq!(guild_member_role(5, 6, 7).bucket, "/guilds/5/members/{}/roles/{}");
        assert_eq!(guild_ban(5, 6).bucket, "/guilds/5/bans/{}");
        assert_eq!(guild_role(5, 8).bucket, "/guilds/5/roles/{}");
    }

    #[test]
    fn test_webhook_token_not_in_bucket() {
        let route = webhook_with_token(3, "s3cr3t");
        assert_eq!(route.path, "/webhooks/3/s3cr3t");
        assert!(!route.bucket.contains("s3cr3t"));
    }

    #[test]
    fn test_user_and_application_routes() {
        assert_eq!(user(ME).bucket, "/users/@me");
        assert_eq!(user_guild(ME, 9).bucket, "/users/@me/guilds/{}");
        assert_eq!(oauth2_application(ME).bucket, "/oauth2/applications/{}");
        assert_eq!(gateway_bot().path, "/gateway/bot");
    }
}
