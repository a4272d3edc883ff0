use pickup_domain::{EventRecord, Notification};

use crate::commands::pipeline_commands::SourceReport;

const INDENT: &str = "    ";

/// Builds the single consolidated message for a cycle, or `None` when there is
/// nothing to report.
pub fn build_notification(
    reports: &[SourceReport],
    alerting: &[&SourceReport],
    retry_limit: u32,
) -> Option<Notification> {
    let total_new: usize = reports.iter().map(|r| r.new_events().len()).sum();
    if total_new == 0 && alerting.is_empty() {
        return None;
    }

    let subject = match (total_new, alerting.len()) {
        (0, failing) => format!("Pickup Watch: {} source(s) failing", failing),
        (found, 0) => format!("Pickup Watch: {} new event(s)", found),
        (found, failing) => format!(
            "Pickup Watch: {} new event(s), {} source(s) failing",
            found, failing
        ),
    };

    let mut sections = Vec::new();
    for report in reports.iter().filter(|r| !r.new_events().is_empty()) {
        let events = report.new_events();
        let mut blocks = vec![format!(
            "{} new {} event(s) found!",
            events.len(),
            report.display_name
        )];
        blocks.extend(
            events
                .iter()
                .map(|event| event_block(event, report.supports_registration)),
        );
        sections.push(blocks.join("\n\n"));
    }
    for report in alerting {
        sections.push(format!(
            "{} has failed {} consecutive times.",
            report.display_name, retry_limit
        ));
    }

    Some(Notification {
        subject,
        body: sections.join("\n\n"),
    })
}

pub fn event_block(event: &EventRecord, show_registration: bool) -> String {
    let mut lines = vec![format!(
        "{INDENT}Date: {} from {} to {}",
        event.start_time.format("%-m/%-d (%A)"),
        event.start_time.format("%-I:%M %p"),
        event.end_time.format("%-I:%M %p"),
    )];
    lines.push(format!("{INDENT}Location: {}", event.location));
    if let Some(level) = event.level.as_deref().filter(|l| !l.is_empty()) {
        lines.push(format!("{INDENT}Level: {}", level));
    }
    if let Some(price) = event.price.as_deref().filter(|p| !p.is_empty()) {
        lines.push(format!("{INDENT}Price: {}", price));
    }
    if let Some(status) = &event.status {
        lines.push(format!("{INDENT}Status: {}", status.as_str()));
    }
    if let Some(opens) = event.registration_date {
        lines.push(format!(
            "{INDENT}Registration opens: {}",
            opens.format("%-m/%-d %-I:%M %p")
        ));
    }
    if show_registration {
        let registered = match (&event.registration, event.registered) {
            (Some(attempt), _) => attempt.summary(),
            (None, Some(true)) => "yes".to_string(),
            (None, _) => "no".to_string(),
        };
        lines.push(format!("{INDENT}Registered: {}", registered));
    }
    lines.push(format!("{INDENT}Link: {}", event.url));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::pipeline_commands::SourceOutcome;
    use crate::testing::{at, event};
    use chrono::Duration;
    use pickup_domain::{EventStatus, SourceKey};

    fn report(name: &str, outcome: SourceOutcome, registration: bool) -> SourceReport {
        SourceReport {
            source: SourceKey::from(name),
            display_name: name.to_uppercase(),
            supports_registration: registration,
            outcome,
        }
    }

    #[test]
    fn nothing_to_say_means_no_message() {
        let reports = vec![report("a", SourceOutcome::Succeeded(Vec::new()), false)];
        assert!(build_notification(&reports, &[], 5).is_none());
    }

    #[test]
    fn lists_events_per_source() {
        let start = at(0).date().and_hms_opt(19, 30, 0).expect("start") + Duration::days(1);
        let mut record = event("a", "id1", start, Some(EventStatus::Available));
        record.level = Some("A".to_string());
        let reports = vec![report("a", SourceOutcome::Succeeded(vec![record]), false)];

        let message = build_notification(&reports, &[], 5).expect("message");
        assert_eq!(message.subject, "Pickup Watch: 1 new event(s)");
        assert!(message.body.starts_with("1 new A event(s) found!"));
        assert!(message.body.contains("from 7:30 PM to 9:30 PM"));
        assert!(message.body.contains("    Level: A"));
        assert!(message.body.contains("    Status: Available"));
        assert!(!message.body.contains("Registered:"));
    }

    #[test]
    fn reports_failing_sources() {
        let failed = report("b", SourceOutcome::Failed("boom".to_string()), false);
        let reports = vec![failed.clone()];
        let message = build_notification(&reports, &[&failed], 3).expect("message");
        assert_eq!(message.subject, "Pickup Watch: 1 source(s) failing");
        assert_eq!(message.body, "B has failed 3 consecutive times.");
    }

    #[test]
    fn shows_registration_outcome_for_registering_sources() {
        let start = at(0) + Duration::days(3);
        let mut record = event("v", "id1", start, None);
        record.registered = Some(false);
        let reports = vec![report("v", SourceOutcome::Succeeded(vec![record]), true)];
        let message = build_notification(&reports, &[], 5).expect("message");
        assert!(message.body.contains("    Registered: no"));
    }
}
