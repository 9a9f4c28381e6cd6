//! Interview records as served by `/interviews`, reduced to what reminders need.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::reminders::ReminderEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterviewStatus {
    Scheduled,
    Confirmed,
    Completed,
    Rejected,
    Cancelled,
    /// Any status this client does not know; never upcoming.
    #[serde(other)]
    Unknown,
}

impl InterviewStatus {
    pub fn is_upcoming(self) -> bool {
        matches!(self, InterviewStatus::Scheduled | InterviewStatus::Confirmed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interview {
    pub id: String,
    pub company_name: String,
    pub position: String,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM` or `HH:MM:SS`
    pub time: String,
    pub status: InterviewStatus,
    #[serde(rename = "type", default)]
    pub interview_type: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Interview {
    /// Start time, interpreting `date` + `time` in the local timezone.
    pub fn starts_at(&self) -> Option<DateTime<Utc>> {
        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d").ok()?;
        let raw_time = self.time.trim();
        let time = NaiveTime::parse_from_str(raw_time, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(raw_time, "%H:%M"))
            .ok()?;
        let naive = NaiveDateTime::new(date, time);
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
    }

    pub fn to_reminder_event(&self) -> Option<ReminderEvent> {
        let starts_at = self.starts_at()?;
        Some(ReminderEvent {
            id: self.id.clone(),
            company: self.company_name.clone(),
            position: self.position.clone(),
            time_label: self.time.clone(),
            starts_at,
        })
    }
}

/// Scheduled or confirmed interviews, earliest date first.
pub fn upcoming(interviews: &[Interview]) -> Vec<&Interview> {
    let mut upcoming: Vec<&Interview> = interviews
        .iter()
        .filter(|interview| interview.status.is_upcoming())
        .collect();
    upcoming.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.time.cmp(&b.time)));
    upcoming
}

/// Reminder events for every upcoming interview with a parsable start time.
pub fn upcoming_reminder_events(interviews: &[Interview]) -> Vec<ReminderEvent> {
    upcoming(interviews)
        .into_iter()
        .filter_map(|interview| {
            let event = interview.to_reminder_event();
            if event.is_none() {
                tracing::warn!(
                    "skipping interview {} with unparsable date/time '{} {}'",
                    interview.id,
                    interview.date,
                    interview.time
                );
            }
            event
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interview(id: &str, date: &str, time: &str, status: InterviewStatus) -> Interview {
        Interview {
            id: id.to_string(),
            company_name: "Acme".to_string(),
            position: "Engineer".to_string(),
            date: date.to_string(),
            time: time.to_string(),
            status,
            interview_type: None,
            location: None,
            notes: None,
        }
    }

    #[test]
    fn parses_backend_payload() {
        let parsed: Interview = serde_json::from_str(
            r#"{"id":"i1","companyName":"Acme","position":"SRE","date":"2030-01-02",
                "time":"09:30","status":"confirmed","type":"remote","rating":4}"#,
        )
        .unwrap();
        assert_eq!(parsed.status, InterviewStatus::Confirmed);
        assert_eq!(parsed.interview_type.as_deref(), Some("remote"));
    }

    #[test]
    fn unknown_status_only_drops_that_interview() {
        let parsed: Vec<Interview> = serde_json::from_str(
            r#"[{"id":"a","companyName":"Acme","position":"SRE","date":"2030-01-02",
                 "time":"09:30","status":"postponed"},
                {"id":"b","companyName":"Acme","position":"SRE","date":"2030-01-03",
                 "time":"09:30","status":"scheduled"}]"#,
        )
        .unwrap();
        assert_eq!(parsed[0].status, InterviewStatus::Unknown);
        let events = upcoming_reminder_events(&parsed);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "b");
    }

    #[test]
    fn upcoming_filters_and_sorts() {
        let all = vec![
            interview("late", "2030-03-01", "10:00", InterviewStatus::Scheduled),
            interview("done", "2030-01-01", "10:00", InterviewStatus::Completed),
            interview("early", "2030-02-01", "10:00", InterviewStatus::Confirmed),
        ];
        let ids: Vec<&str> = upcoming(&all).iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn start_time_accepts_seconds() {
        let a = interview("a", "2030-02-01", "10:00", InterviewStatus::Scheduled);
        let b = interview("b", "2030-02-01", "10:00:00", InterviewStatus::Scheduled);
        assert!(a.starts_at().is_some());
        assert_eq!(a.starts_at(), b.starts_at());
    }

    #[test]
    fn unparsable_interviews_are_skipped() {
        let all = vec![
            interview("ok", "2030-02-01", "10:00", InterviewStatus::Scheduled),
            interview("bad", "next tuesday", "10:00", InterviewStatus::Scheduled),
        ];
        let events = upcoming_reminder_events(&all);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "ok");
        assert_eq!(events[0].time_label, "10:00");
    }
}
