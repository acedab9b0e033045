use anyhow::Result;
use tracing::{debug, info};

use courier_db::Database;
use courier_db::models::NewMessage;

/// Send `content` from `sender_id` to everyone on the active distribution
/// list. Nothing is sent when no setting is active or when the active one
/// has both auto-sending and recurring delivery switched off.
///
/// Returns the number of messages written.
pub fn manage_receptions_message(
    db: &Database,
    sender_id: i64,
    content: Option<&str>,
    is_recurring: bool,
) -> Result<usize> {
    let Some(setting) = db.get_active_message_setting()? else {
        debug!(sender_id, "No active message setting, skipping fan-out");
        return Ok(0);
    };

    if !(setting.is_recurring_on || setting.is_auto_sending_on) {
        debug!(setting_id = setting.id, "Fan-out disabled by active setting");
        return Ok(0);
    }

    let messages: Vec<NewMessage> = setting
        .receptions
        .iter()
        .map(|&receiver_id| NewMessage {
            sender_id,
            receiver_id,
            content: content.map(str::to_string),
            is_recurring,
            ..Default::default()
        })
        .collect();

    let sent = db.insert_messages(&messages)?;
    info!(setting_id = setting.id, sender_id, sent, "Fan-out delivered");
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_db::models::{NewMessageSetting, NewUser};

    fn seed_users(db: &Database, n: usize) -> Vec<i64> {
        (0..n)
            .map(|i| {
                db.create_user(&NewUser {
                    first_name: format!("User{i}"),
                    last_name: "Test".into(),
                    email: format!("user{i}@example.com"),
                    phone_number: format!("+9198765432{i:02}"),
                    address: None,
                })
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn no_active_setting_sends_nothing() {
        let db = Database::open_in_memory().unwrap();
        let users = seed_users(&db, 1);
        assert_eq!(manage_receptions_message(&db, users[0], Some("hi"), false).unwrap(), 0);
    }

    #[test]
    fn disabled_setting_sends_nothing() {
        let db = Database::open_in_memory().unwrap();
        let users = seed_users(&db, 3);
        db.create_message_setting(&NewMessageSetting {
            is_auto_sending_on: false,
            is_recurring_on: false,
            receptions: users[1..].to_vec(),
        })
        .unwrap();

        assert_eq!(manage_receptions_message(&db, users[0], Some("hi"), false).unwrap(), 0);
        assert!(db.list_messages_for_user(users[0], 50).unwrap().is_empty());
    }

    #[test]
    fn every_reception_gets_a_copy() {
        let db = Database::open_in_memory().unwrap();
        let users = seed_users(&db, 4);
        db.create_message_setting(&NewMessageSetting {
            is_auto_sending_on: false,
            is_recurring_on: true,
            receptions: users[1..].to_vec(),
        })
        .unwrap();

        let sent = manage_receptions_message(&db, users[0], Some("weekly sync"), true).unwrap();
        assert_eq!(sent, 3);

        let outbox = db.list_messages_for_user(users[0], 50).unwrap();
        assert_eq!(outbox.len(), 3);
        assert!(outbox.iter().all(|m| m.is_recurring && m.content.as_deref() == Some("weekly sync")));

        let mut receivers: Vec<i64> = outbox.iter().map(|m| m.receiver_id).collect();
        receivers.sort();
        assert_eq!(receivers, users[1..].to_vec());
    }
}
