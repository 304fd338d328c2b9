// [libs/domain/forwarder/src/grouping.rs]
//! Shunt grouping: partitions a batch of source messages so dedup is
//! applied per group rather than per message, when the operator has
//! configured a grouping strategy.

use chrono::Duration;
use spectra_domain_models::GroupingStrategy;
use spectra_telegram_client::RemoteMessage;

/// Splits `messages` (already in ascending id order) into groups under
/// `strategy`. `GroupingStrategy::None` returns one group per message.
pub fn partition(messages: Vec<RemoteMessage>, strategy: GroupingStrategy) -> Vec<Vec<RemoteMessage>> {
    match strategy {
        GroupingStrategy::None => messages.into_iter().map(|m| vec![m]).collect(),
        GroupingStrategy::Filename => partition_by_filename(messages),
        GroupingStrategy::Time { window_seconds } => partition_by_time(messages, Duration::seconds(window_seconds as i64)),
    }
}

fn filename_stem(original_filename: &str) -> String {
    let without_ext = original_filename.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(original_filename);
    without_ext.trim_end_matches(|c: char| c.is_ascii_digit()).trim_end_matches(['_', '-', ' ']).to_string()
}

fn partition_by_filename(messages: Vec<RemoteMessage>) -> Vec<Vec<RemoteMessage>> {
    let mut groups: Vec<(String, Vec<RemoteMessage>)> = Vec::new();
    for message in messages {
        let key = message
            .media
            .as_ref()
            .and_then(|m| m.original_filename.as_deref())
            .map(filename_stem)
            .unwrap_or_else(|| format!("__ungrouped_{}", message.message_id));

        match groups.iter_mut().find(|(existing_key, _)| *existing_key == key) {
            Some((_, group)) => group.push(message),
            None => groups.push((key, vec![message])),
        }
    }
    groups.into_iter().map(|(_, group)| group).collect()
}

fn partition_by_time(messages: Vec<RemoteMessage>, window: Duration) -> Vec<Vec<RemoteMessage>> {
    let mut groups: Vec<Vec<RemoteMessage>> = Vec::new();
    for message in messages {
        let fits_last_group = groups.last().and_then(|group| group.last()).is_some_and(|last: &RemoteMessage| {
            last.sender_id == message.sender_id && (message.date - last.date) <= window
        });
        if fits_last_group {
            groups.last_mut().unwrap().push(message);
        } else {
            groups.push(vec![message]);
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectra_domain_models::MessageKind;
    use spectra_telegram_client::RemoteMediaDescriptor;

    fn message(id: i64, sender: Option<i64>, date: chrono::DateTime<chrono::Utc>, filename: Option<&str>) -> RemoteMessage {
        RemoteMessage {
            message_id: id,
            sender_id: sender,
            kind: MessageKind::Media,
            date,
            edit_date: None,
            text: None,
            reply_to: None,
            media: filename.map(|f| RemoteMediaDescriptor { file_reference: format!("ref-{id}"), mime_type: "image/jpeg".into(), size_bytes: 10, original_filename: Some(f.to_string()) }),
            caption_entities: Vec::new(),
        }
    }

    #[test]
    fn no_grouping_is_one_message_per_group() {
        let now = chrono::Utc::now();
        let messages = vec![message(1, None, now, None), message(2, None, now, None)];
        assert_eq!(partition(messages, GroupingStrategy::None).len(), 2);
    }

    #[test]
    fn filename_groups_sequential_suffixes_together() {
        let now = chrono::Utc::now();
        let messages = vec![message(1, None, now, Some("photo_001.jpg")), message(2, None, now, Some("photo_002.jpg")), message(3, None, now, Some("other.jpg"))];
        let groups = partition(messages, GroupingStrategy::Filename);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups.iter().find(|g| g.len() == 2).unwrap().len(), 2);
    }

    #[test]
    fn time_groups_same_sender_within_window() {
        let base = chrono::Utc::now();
        let messages = vec![
            message(1, Some(7), base, None),
            message(2, Some(7), base + Duration::seconds(5), None),
            message(3, Some(7), base + Duration::seconds(120), None),
        ];
        let groups = partition(messages, GroupingStrategy::Time { window_seconds: 30 });
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[1].len(), 1);
    }
}
