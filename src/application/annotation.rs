//! Render the `data-cache` / `data-amber-behavior` attribute pair for a link.

use chrono::{DateTime, TimeZone, Utc};

use crate::domain::behavior::BehaviorConfig;
use crate::domain::entities::CacheRecord;
use crate::domain::types::{BehaviorAction, LinkStatus};

/// Upper bound for a rendered behavior string, country suffix included.
/// The rewriter also reserves this much space per matched link.
pub const MAX_ATTRIBUTE_SIZE: usize = 200;

const CACHE_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

fn fragment(status: LinkStatus, action: BehaviorAction, delay: u32) -> Option<String> {
    let status = status.as_str();
    match action {
        BehaviorAction::None => None,
        BehaviorAction::Hover => Some(format!("{status} hover:{delay}")),
        BehaviorAction::Popup | BehaviorAction::Cache => {
            Some(format!("{status} {}", action.as_str()))
        }
    }
}

/// Behavior string for a link in `status`: the primary fragment, then the
/// country override as `,<country> <fragment>` when one applies.
pub fn format_behavior(config: &BehaviorConfig, status: LinkStatus) -> String {
    let (action, delay) = config.behavior_for(status);
    let mut out = fragment(status, action, delay).unwrap_or_default();

    if let Some(country) = config.country.as_deref().filter(|c| !c.is_empty()) {
        let (action, delay) = config.country_behavior_for(status);
        if let Some(extra) = fragment(status, action, delay) {
            out.push(',');
            out.push_str(country);
            out.push(' ');
            out.push_str(&extra);
        }
    }

    truncate_to(&mut out, MAX_ATTRIBUTE_SIZE);
    out
}

fn truncate_to(value: &mut String, limit: usize) {
    if value.len() <= limit {
        return;
    }
    let mut end = limit;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value.truncate(end);
}

/// ISO-8601 rendering of a capture timestamp in `zone`, offset as `±HHMM`.
pub fn format_cache_date<Tz>(epoch_seconds: i64, zone: &Tz) -> Option<String>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let instant = DateTime::<Utc>::from_timestamp(epoch_seconds, 0)?;
    Some(
        instant
            .with_timezone(zone)
            .format(CACHE_DATE_FORMAT)
            .to_string(),
    )
}

/// Full attribute text to insert before `href=`, trailing space included.
///
/// Returns `None` when the configuration asks for no behavior in this state or
/// the capture date cannot be represented.
pub fn render_annotation<Tz>(config: &BehaviorConfig, record: &CacheRecord, zone: &Tz) -> Option<String>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let behavior = format_behavior(config, record.status);
    if behavior.is_empty() {
        return None;
    }
    let date = format_cache_date(record.date, zone)?;

    Some(format!(
        "data-cache='/{} {}' data-amber-behavior='{}' ",
        record.location, date, behavior
    ))
}

#[cfg(test)]
mod tests {
    use chrono::FixedOffset;

    use super::*;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).expect("offset")
    }

    #[test]
    fn hover_includes_delay() {
        let config = BehaviorConfig {
            behavior_up: BehaviorAction::Hover,
            hover_delay_up: 500,
            ..Default::default()
        };

        assert_eq!(format_behavior(&config, LinkStatus::Up), "up hover:500");
    }

    #[test]
    fn every_status_action_pair_follows_table() {
        let cases = [
            (LinkStatus::Up, BehaviorAction::None, ""),
            (LinkStatus::Up, BehaviorAction::Hover, "up hover:7"),
            (LinkStatus::Up, BehaviorAction::Popup, "up popup"),
            (LinkStatus::Up, BehaviorAction::Cache, "up cache"),
            (LinkStatus::Down, BehaviorAction::None, ""),
            (LinkStatus::Down, BehaviorAction::Hover, "down hover:9"),
            (LinkStatus::Down, BehaviorAction::Popup, "down popup"),
            (LinkStatus::Down, BehaviorAction::Cache, "down cache"),
        ];

        for (status, action, expected) in cases {
            let config = BehaviorConfig {
                behavior_up: action,
                behavior_down: action,
                hover_delay_up: 7,
                hover_delay_down: 9,
                ..Default::default()
            };
            assert_eq!(format_behavior(&config, status), expected, "{status:?}/{action:?}");
        }
    }

    #[test]
    fn country_override_is_appended() {
        let config = BehaviorConfig {
            behavior_down: BehaviorAction::Cache,
            country: Some("FR".to_string()),
            country_behavior_down: BehaviorAction::Popup,
            ..Default::default()
        };

        assert_eq!(format_behavior(&config, LinkStatus::Down), "down cache,FR down popup");
    }

    #[test]
    fn empty_country_fragment_is_omitted() {
        let config = BehaviorConfig {
            behavior_up: BehaviorAction::Popup,
            country: Some("FR".to_string()),
            country_behavior_up: BehaviorAction::None,
            ..Default::default()
        };

        assert_eq!(format_behavior(&config, LinkStatus::Up), "up popup");
    }

    #[test]
    fn country_fragment_without_primary_keeps_separator() {
        let config = BehaviorConfig {
            country: Some("DE".to_string()),
            country_behavior_up: BehaviorAction::Hover,
            country_hover_delay_up: 3,
            ..Default::default()
        };

        assert_eq!(format_behavior(&config, LinkStatus::Up), ",DE up hover:3");
    }

    #[test]
    fn oversized_output_is_truncated() {
        let config = BehaviorConfig {
            behavior_up: BehaviorAction::Popup,
            country: Some("é".repeat(150)),
            country_behavior_up: BehaviorAction::Popup,
            ..Default::default()
        };

        let behavior = format_behavior(&config, LinkStatus::Up);

        assert!(behavior.len() <= MAX_ATTRIBUTE_SIZE);
        assert!(behavior.starts_with("up popup,"));
    }

    #[test]
    fn cache_date_uses_numeric_offset() {
        let paris = FixedOffset::east_opt(2 * 3600).expect("offset");

        assert_eq!(
            format_cache_date(1_700_000_000, &utc()).as_deref(),
            Some("2023-11-14T22:13:20+0000")
        );
        assert_eq!(
            format_cache_date(1_700_000_000, &paris).as_deref(),
            Some("2023-11-15T00:13:20+0200")
        );
    }

    #[test]
    fn annotation_wraps_location_date_and_behavior() {
        let config = BehaviorConfig {
            behavior_up: BehaviorAction::Popup,
            ..Default::default()
        };
        let record = CacheRecord {
            url: "http://example.com/x".to_string(),
            location: "abc".to_string(),
            status: LinkStatus::Up,
            date: 0,
        };

        assert_eq!(
            render_annotation(&config, &record, &utc()).as_deref(),
            Some("data-cache='/abc 1970-01-01T00:00:00+0000' data-amber-behavior='up popup' ")
        );
    }

    #[test]
    fn no_annotation_when_behavior_is_empty() {
        let record = CacheRecord {
            url: "http://example.com/x".to_string(),
            location: "abc".to_string(),
            status: LinkStatus::Down,
            date: 0,
        };

        assert!(render_annotation(&BehaviorConfig::default(), &record, &utc()).is_none());
    }
}
