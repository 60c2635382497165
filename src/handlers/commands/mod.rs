//! Command handlers module
//!
//! Every command passes the gates of [`AuthMiddleware::check_command`]
//! before its handler runs.
//!
//! [`AuthMiddleware::check_command`]: crate::middleware::auth::AuthMiddleware::check_command

pub mod admin;
pub mod broadcast;
pub mod help;
pub mod moderation;
pub mod start;

use teloxide::types::Message;
use teloxide::utils::command::BotCommands;
use tracing::{debug, info};

use crate::handlers::{is_group_chat, remember_user, reply_t, user_id, user_language};
use crate::i18n::params;
use crate::middleware::auth::Role;
use crate::models::TriggerType;
use crate::services::AppContext;
use crate::utils::errors::Result;

/// All available bot commands
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Bard's Sentinel commands:")]
pub enum Command {
    #[command(description = "Start the bot")]
    Start(String),
    #[command(description = "Show help information")]
    Help,
    #[command(description = "Check your verification channel membership")]
    Verify,
    #[command(description = "Set the punishment action (group admins)")]
    SetPunish(String),
    #[command(description = "Set all punishment durations (group admins)")]
    SetDuration(String),
    #[command(description = "Set the profile violation duration (group admins)")]
    SetDurationProfile(String),
    #[command(description = "Set the message violation duration (group admins)")]
    SetDurationMessage(String),
    #[command(description = "Set the mention violation duration (group admins)")]
    SetDurationMention(String),
    #[command(description = "Exempt a user in this group (group admins)")]
    FreePunish(String),
    #[command(description = "Remove a user's exemption in this group (group admins)")]
    UnfreePunish(String),
    #[command(description = "Exempt a user everywhere (super admins)")]
    GFreePunish(String),
    #[command(description = "Remove a global exemption (super admins)")]
    GUnfreePunish(String),
    #[command(description = "Clear profile and username caches (super admins)")]
    ClearCache,
    #[command(description = "Check a user's profile (super admins)")]
    CheckBio(String),
    #[command(description = "Set the verification channel (super admins)")]
    SetChannel(String),
    #[command(description = "Show bot statistics (super admins)")]
    Stats,
    #[command(description = "Disable a feature (super admins)")]
    Disable(String),
    #[command(description = "Enable a feature (super admins)")]
    Enable(String),
    #[command(description = "Toggle maintenance mode (super admins)")]
    Maintenance(String),
    #[command(description = "Broadcast to groups or one chat (super admins)")]
    Broadcast(String),
    #[command(description = "Broadcast to all groups and users (super admins)")]
    BcastAll(String),
    #[command(description = "Send the self-promotion message (super admins)")]
    BcastSelf(String),
    #[command(description = "Stop a timed broadcast (super admins)")]
    StopBroadcast(String),
    #[command(description = "Unmute everyone in a group (super admins)")]
    UnmuteAll(String),
    #[command(description = "Unmute everyone everywhere (super admins)")]
    GUnmuteAll,
}

impl Command {
    /// Name used for feature flags and logs
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start(_) => "start",
            Command::Help => "help",
            Command::Verify => "verify",
            Command::SetPunish(_) => "setpunish",
            Command::SetDuration(_) => "setduration",
            Command::SetDurationProfile(_) => "setdurationprofile",
            Command::SetDurationMessage(_) => "setdurationmessage",
            Command::SetDurationMention(_) => "setdurationmention",
            Command::FreePunish(_) => "freepunish",
            Command::UnfreePunish(_) => "unfreepunish",
            Command::GFreePunish(_) => "gfreepunish",
            Command::GUnfreePunish(_) => "gunfreepunish",
            Command::ClearCache => "clearcache",
            Command::CheckBio(_) => "checkbio",
            Command::SetChannel(_) => "setchannel",
            Command::Stats => "stats",
            Command::Disable(_) => "disable",
            Command::Enable(_) => "enable",
            Command::Maintenance(_) => "maintenance",
            Command::Broadcast(_) => "broadcast",
            Command::BcastAll(_) => "bcastall",
            Command::BcastSelf(_) => "bcastself",
            Command::StopBroadcast(_) => "stopbroadcast",
            Command::UnmuteAll(_) => "unmuteall",
            Command::GUnmuteAll => "gunmuteall",
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Command::Start(_) | Command::Help | Command::Verify => Role::Everyone,
            Command::SetPunish(_)
            | Command::SetDuration(_)
            | Command::SetDurationProfile(_)
            | Command::SetDurationMessage(_)
            | Command::SetDurationMention(_)
            | Command::FreePunish(_)
            | Command::UnfreePunish(_) => Role::GroupAdmin,
            _ => Role::SuperAdmin,
        }
    }
}

/// Run a command after its gates
pub async fn handle_command(ctx: &AppContext, msg: &Message, cmd: Command) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let sender = user_id(user);
    let lang = user_language(ctx, user);

    remember_user(ctx, user, None).await?;
    let group_chat = if is_group_chat(msg) {
        let chat_id = msg.chat.id.0;
        ctx.ensure_group(chat_id, msg.chat.title()).await?;
        ctx.db.groups.add_member(chat_id, sender, ctx.clock.now()).await?;
        Some(chat_id)
    } else {
        None
    };

    debug!(user_id = sender, chat_id = msg.chat.id.0, command = cmd.name(), "Processing command");

    let gate = ctx
        .auth
        .check_command(cmd.name(), cmd.role(), sender, group_chat)
        .await?;
    if let Some(key) = gate.message_key() {
        info!(user_id = sender, command = cmd.name(), gate = ?gate, "Command refused");
        return reply_t(ctx, msg, &lang, key, Some(&params([("command_name", cmd.name())]))).await;
    }

    match cmd {
        Command::Start(args) => start::handle_start(ctx, msg, user, &lang, args.trim()).await,
        Command::Help => help::handle_help(ctx, msg, &lang).await,
        Command::Verify => start::handle_verify(ctx, msg, user, &lang).await,
        Command::SetPunish(arg) => moderation::handle_setpunish(ctx, msg, &lang, arg.trim()).await,
        Command::SetDuration(arg) => {
            moderation::handle_setduration(ctx, msg, &lang, None, arg.trim()).await
        }
        Command::SetDurationProfile(arg) => {
            moderation::handle_setduration(ctx, msg, &lang, Some(TriggerType::Profile), arg.trim()).await
        }
        Command::SetDurationMessage(arg) => {
            moderation::handle_setduration(ctx, msg, &lang, Some(TriggerType::Message), arg.trim()).await
        }
        Command::SetDurationMention(arg) => {
            moderation::handle_setduration(ctx, msg, &lang, Some(TriggerType::MentionProfile), arg.trim())
                .await
        }
        Command::FreePunish(arg) => moderation::handle_freepunish(ctx, msg, &lang, arg.trim(), true).await,
        Command::UnfreePunish(arg) => {
            moderation::handle_freepunish(ctx, msg, &lang, arg.trim(), false).await
        }
        Command::GFreePunish(arg) => admin::handle_global_exemption(ctx, msg, &lang, arg.trim(), true).await,
        Command::GUnfreePunish(arg) => {
            admin::handle_global_exemption(ctx, msg, &lang, arg.trim(), false).await
        }
        Command::ClearCache => admin::handle_clearcache(ctx, msg, &lang).await,
        Command::CheckBio(arg) => admin::handle_checkbio(ctx, msg, &lang, arg.trim()).await,
        Command::SetChannel(arg) => admin::handle_setchannel(ctx, msg, &lang, arg.trim()).await,
        Command::Stats => admin::handle_stats(ctx, msg, &lang).await,
        Command::Disable(arg) => admin::handle_feature(ctx, msg, &lang, arg.trim(), false).await,
        Command::Enable(arg) => admin::handle_feature(ctx, msg, &lang, arg.trim(), true).await,
        Command::Maintenance(arg) => admin::handle_maintenance(ctx, msg, &lang, arg.trim()).await,
        Command::UnmuteAll(arg) => admin::handle_unmuteall(ctx, msg, &lang, arg.trim()).await,
        Command::GUnmuteAll => admin::handle_gunmuteall(ctx, msg, &lang).await,
        Command::Broadcast(args) => broadcast::handle_broadcast(ctx, msg, &lang, &args).await,
        Command::BcastAll(args) => broadcast::handle_bcastall(ctx, msg, &lang, &args).await,
        Command::BcastSelf(args) => broadcast::handle_bcastself(ctx, msg, &lang, args.trim()).await,
        Command::StopBroadcast(arg) => broadcast::handle_stopbroadcast(ctx, msg, &lang, arg.trim()).await,
    }
}
