//! Assertions over event sequences.

use crate::core::Event;

/// Labels of `events`, e.g. `status(styling,1)`.
#[must_use]
pub fn event_labels(events: &[Event]) -> Vec<String> {
    events.iter().map(Event::label).collect()
}

/// Asserts the exact label sequence of `events`.
pub fn assert_event_labels(events: &[Event], expected: &[&str]) {
    let actual = event_labels(events);
    assert_eq!(
        actual, expected,
        "Unexpected event sequence.\n  actual:   {actual:?}\n  expected: {expected:?}"
    );
}

/// Asserts that the sequence ends with its only terminal event.
pub fn assert_single_terminal(events: &[Event]) {
    let terminal: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.is_terminal())
        .map(|(i, _)| i)
        .collect();
    assert_eq!(
        terminal.len(),
        1,
        "Expected exactly one terminal event, got {}: {:?}",
        terminal.len(),
        event_labels(events)
    );
    assert_eq!(
        terminal[0],
        events.len() - 1,
        "Terminal event is not last: {:?}",
        event_labels(events)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RunPhase;

    #[test]
    fn test_assert_single_terminal() {
        let events = vec![Event::status(RunPhase::Init, "start", None), Event::error("failed")];
        assert_single_terminal(&events);
        assert_event_labels(&events, &["status(init)", "error"]);
    }

    #[test]
    #[should_panic(expected = "Expected exactly one terminal event")]
    fn test_assert_single_terminal_missing() {
        assert_single_terminal(&[Event::status(RunPhase::Init, "start", None)]);
    }

    #[test]
    #[should_panic(expected = "Terminal event is not last")]
    fn test_assert_single_terminal_not_last() {
        assert_single_terminal(&[Event::error("failed"), Event::status(RunPhase::Init, "late", None)]);
    }
}
