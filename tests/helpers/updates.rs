//! Telegram updates built from Bot API JSON

use serde_json::{json, Value};
use teloxide::types::{CallbackQuery, Message};

use super::test_context::{GROUP_ID, GROUP_TITLE};

pub fn user_json(user_id: i64, first_name: &str) -> Value {
    json!({
        "id": user_id,
        "is_bot": false,
        "first_name": first_name,
        "language_code": "en"
    })
}

fn group_chat_json() -> Value {
    json!({ "id": GROUP_ID, "type": "supergroup", "title": GROUP_TITLE })
}

fn private_chat_json(user_id: i64, first_name: &str) -> Value {
    json!({ "id": user_id, "type": "private", "first_name": first_name })
}

fn message_json(chat: Value, user_id: i64, first_name: &str, message_id: i32, text: &str) -> Value {
    json!({
        "message_id": message_id,
        "date": 1_714_564_800,
        "chat": chat,
        "from": user_json(user_id, first_name),
        "text": text
    })
}

/// A text message in the test group
pub fn group_message(user_id: i64, first_name: &str, message_id: i32, text: &str) -> Message {
    serde_json::from_value(message_json(group_chat_json(), user_id, first_name, message_id, text))
        .expect("valid group message JSON")
}

/// A text message in a private chat with the bot
pub fn private_message(user_id: i64, first_name: &str, text: &str) -> Message {
    serde_json::from_value(message_json(
        private_chat_json(user_id, first_name),
        user_id,
        first_name,
        1,
        text,
    ))
    .expect("valid private message JSON")
}

/// A button press on a message the bot sent to the test group
pub fn group_callback(user_id: i64, first_name: &str, message_id: i32, data: &str) -> CallbackQuery {
    let mut message = message_json(group_chat_json(), 999_000, "Sentinel", message_id, "buttons");
    message["from"]["is_bot"] = json!(true);
    serde_json::from_value(json!({
        "id": "4382bfdwdsb323b2d9",
        "from": user_json(user_id, first_name),
        "chat_instance": "-7041820284620123456",
        "message": message,
        "data": data
    }))
    .expect("valid callback query JSON")
}
