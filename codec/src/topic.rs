// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Topic name and topic filter validation and matching.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicError {
    Empty,
    TooLong,
    ContainsWildcardInName,
    MultiWildcardNotLast,
    MultiWildcardNotAlone,
    SingleWildcardNotAlone,
}

/// A parsed topic name or filter, split into `/`-separated levels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    raw: String,
}

impl Topic {
    #[must_use]
    pub fn new(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn is_shared(&self) -> bool {
        self.raw.starts_with("$share/")
    }

    /// For a `$share/<group>/<filter>` subscription, returns (group, filter).
    #[must_use]
    pub fn shared_group(&self) -> Option<(&str, &str)> {
        let rest = self.raw.strip_prefix("$share/")?;
        let (group, filter) = rest.split_once('/')?;
        if group.is_empty() || filter.is_empty() {
            return None;
        }
        Some((group, filter))
    }

    /// The filter actually used for matching: for a shared subscription this
    /// strips the `$share/<group>/` prefix, for a plain subscription it is
    /// the topic filter itself.
    #[must_use]
    pub fn matching_filter(&self) -> &str {
        self.shared_group().map_or(self.raw.as_str(), |(_, f)| f)
    }

    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        matches(self.matching_filter(), name)
    }
}

/// A topic **name** (used in PUBLISH) must be non-empty and contain neither
/// wildcard character [MQTT-4.7.1-1].
pub fn validate_pub_topic(topic: &str) -> Result<(), TopicError> {
    if topic.is_empty() {
        return Err(TopicError::Empty);
    }
    if topic.len() > 65535 {
        return Err(TopicError::TooLong);
    }
    if topic.contains('+') || topic.contains('#') {
        return Err(TopicError::ContainsWildcardInName);
    }
    Ok(())
}

/// A topic **filter** (used in SUBSCRIBE) allows `+` as a whole level and `#`
/// only in the final level [MQTT-4.7.1-2], [MQTT-4.7.1-3].
pub fn validate_sub_topic(filter: &str) -> Result<(), TopicError> {
    let filter = strip_share_prefix(filter);
    if filter.is_empty() {
        return Err(TopicError::Empty);
    }
    if filter.len() > 65535 {
        return Err(TopicError::TooLong);
    }

    let levels: Vec<&str> = filter.split('/').collect();
    let last = levels.len() - 1;
    for (i, level) in levels.iter().enumerate() {
        if level.contains('#') {
            if *level != "#" {
                return Err(TopicError::MultiWildcardNotAlone);
            }
            if i != last {
                return Err(TopicError::MultiWildcardNotLast);
            }
        }
        if level.contains('+') && *level != "+" {
            return Err(TopicError::SingleWildcardNotAlone);
        }
    }
    Ok(())
}

fn strip_share_prefix(filter: &str) -> &str {
    if let Some(rest) = filter.strip_prefix("$share/") {
        if let Some((_, f)) = rest.split_once('/') {
            return f;
        }
    }
    filter
}

/// Decides whether `filter` matches the topic `name`, per the wildcard rules
/// of MQTT-4.7.1: `+` matches exactly one level, `#` matches zero or more
/// trailing levels, and a filter whose first level does not start with `+`
/// or `#` never matches a name starting with `$` [MQTT-4.7.2-1].
#[must_use]
pub fn matches(filter: &str, name: &str) -> bool {
    let filter_levels: Vec<&str> = filter.split('/').collect();
    let name_levels: Vec<&str> = name.split('/').collect();

    if name.starts_with('$') {
        let first = filter_levels[0];
        if first.starts_with('+') || first.starts_with('#') {
            return false;
        }
    }

    matches_levels(&filter_levels, &name_levels)
}

fn matches_levels(filter: &[&str], name: &[&str]) -> bool {
    match (filter.first(), name.first()) {
        (Some(&"#"), _) => true,
        (Some(&"+"), Some(_)) => matches_levels(&filter[1..], &name[1..]),
        (Some(f), Some(n)) => *f == *n && matches_levels(&filter[1..], &name[1..]),
        (None, None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_match() {
        assert!(matches("sport/tennis/player1", "sport/tennis/player1"));
        assert!(!matches("sport/tennis/player1", "sport/tennis/player2"));
    }

    #[test]
    fn test_single_wildcard() {
        assert!(matches("sport/+/player1", "sport/tennis/player1"));
        assert!(matches("+/+", "a/b"));
        assert!(!matches("+", "a/b"));
    }

    #[test]
    fn test_multi_wildcard() {
        assert!(matches("sport/#", "sport"));
        assert!(matches("sport/#", "sport/tennis"));
        assert!(matches("sport/#", "sport/tennis/player1"));
        assert!(matches("#", "a"));
        assert!(matches("#", "a/b/c"));
        assert!(!matches("#", "$SYS/a"));
        assert!(matches("/#", "/a"));
        assert!(!matches("/#", "a"));
    }

    #[test]
    fn test_dollar_prefix_excluded_from_first_level_wildcard() {
        assert!(!matches("+/monitor/Clients", "$SYS/monitor/Clients"));
        assert!(matches("$SYS/monitor/Clients", "$SYS/monitor/Clients"));
    }

    #[test]
    fn test_validate_sub_topic() {
        assert!(validate_sub_topic("sport/tennis/player1/#").is_ok());
        assert!(validate_sub_topic("sport/tennis/#/ranking").is_err());
        assert!(validate_sub_topic("sport/te+nis").is_err());
        assert!(validate_sub_topic("$share/group1/sport/tennis").is_ok());
    }

    #[test]
    fn test_validate_pub_topic() {
        assert!(validate_pub_topic("sport/tennis/player1").is_ok());
        assert!(validate_pub_topic("sport/+").is_err());
        assert!(validate_pub_topic("").is_err());
    }

    #[test]
    fn test_shared_subscription_group() {
        let topic = Topic::new("$share/consumers/sport/tennis");
        assert_eq!(topic.shared_group(), Some(("consumers", "sport/tennis")));
        assert_eq!(topic.matching_filter(), "sport/tennis");
    }
}
