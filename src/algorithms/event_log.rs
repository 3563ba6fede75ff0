use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::error::{RegimeError, RegimeResult};
use crate::core::segment::{Label, Segment};

/// Lifecycle marker of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Started,
    Completed,
}

/// One boundary of a segment in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event<T> {
    pub timestamp: T,
    pub label: Label,
    pub status: EventStatus,
}

/// Turn segments into chronological `started`/`completed` pairs.
///
/// Each segment contributes exactly two events: `started` at the timestamp
/// of its first sample and `completed` at the timestamp of its last. Adjacent
/// segments with the same label are not merged.
pub fn build_event_log<T: Clone>(
    segments: &[Segment],
    timestamps: &[T],
) -> RegimeResult<Vec<Event<T>>> {
    if let Some(last) = segments.last() {
        if last.end_index >= timestamps.len() {
            return Err(RegimeError::InvalidInput(format!(
                "segments cover {} samples but only {} timestamps were given",
                last.end_index + 1,
                timestamps.len()
            )));
        }
    }

    let mut events = Vec::with_capacity(segments.len() * 2);
    for segment in segments {
        events.push(Event {
            timestamp: timestamps[segment.start_index].clone(),
            label: segment.label,
            status: EventStatus::Started,
        });
        events.push(Event {
            timestamp: timestamps[segment.end_index].clone(),
            label: segment.label,
            status: EventStatus::Completed,
        });
    }
    Ok(events)
}

/// An event log tagged with the case (dataset run) it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct EventLog<T> {
    pub case: String,
    pub events: Vec<Event<T>>,
}

/// Flat row of the serialized event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord<T> {
    pub timestamp: T,
    pub label: Label,
    pub status: EventStatus,
    pub case: String,
}

impl<T: Clone> EventLog<T> {
    /// Build the log for `segments`. An empty `case` gets a random UUID.
    pub fn new(case: &str, segments: &[Segment], timestamps: &[T]) -> RegimeResult<Self> {
        let case = if case.trim().is_empty() {
            Uuid::new_v4().to_string()
        } else {
            case.to_string()
        };
        Ok(Self {
            case,
            events: build_event_log(segments, timestamps)?,
        })
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn records(&self) -> Vec<EventRecord<T>> {
        self.events
            .iter()
            .map(|e| EventRecord {
                timestamp: e.timestamp.clone(),
                label: e.label,
                status: e.status,
                case: self.case.clone(),
            })
            .collect()
    }
}
