use crate::error::Result;
use crate::session::SessionClient;
use crate::sport::Sport;
use crate::transport::{HttpTransport, Transport};
use crate::types::WorkoutRecord;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

pub const DEFAULT_LIMIT: u32 = 15;

/// Workout operations on top of an authenticated session.
///
/// Reads and edits go through the REST API; creation needs the legacy API,
/// which the session builds on first use.
pub struct Workouts<'a, T = HttpTransport> {
    api: &'a mut SessionClient<T>,
}

impl<'a, T: Transport + Clone> Workouts<'a, T> {
    pub const fn new(api: &'a mut SessionClient<T>) -> Self {
        Self { api }
    }

    pub fn get(&mut self, id: &str) -> Result<WorkoutRecord> {
        let raw = self.api.get(&format!("workouts/{id}"), &[])?;
        WorkoutRecord::from_wire(&raw)
    }

    /// PUTs `fields` to the workout and returns the backend's answer.
    pub fn edit(&mut self, id: &str, fields: &JsonValue) -> Result<JsonValue> {
        self.api.put(&format!("workouts/{id}"), fields)
    }

    /// Pushes a record's editable fields. Records without an id are created
    /// instead. Returns the workout id either way.
    pub fn save(&mut self, record: &WorkoutRecord) -> Result<String> {
        match record.id() {
            Some(id) => {
                let payload = JsonValue::Object(record.to_wire_payload());
                self.edit(id, &payload)?;
                Ok(id.to_string())
            }
            None => self.create(
                record.sport(),
                record.start(),
                record.duration(),
                record.distance(),
                record.calories(),
            ),
        }
    }

    pub fn delete(&mut self, id: &str) -> Result<JsonValue> {
        self.api.delete(&format!("workouts/{id}"))
    }

    /// Queries `workouts/history`; caller filters override the defaults.
    pub fn filter(&mut self, filters: &[(&str, &str)]) -> Result<Vec<WorkoutRecord>> {
        let mut query: BTreeMap<&str, &str> = BTreeMap::new();
        query.insert("expand", "workout");
        query.extend(filters.iter().copied());

        let pairs: Vec<(&str, &str)> = query.into_iter().collect();
        let listing = self.api.get("workouts/history", &pairs)?;
        let records = WorkoutRecord::list_from_wire(&listing)?;
        tracing::debug!(count = records.len(), "workout history");
        Ok(records)
    }

    pub fn last(&mut self, limit: u32) -> Result<Vec<WorkoutRecord>> {
        let limit = limit.to_string();
        self.filter(&[("limit", limit.as_str())])
    }

    pub fn by_dates(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<WorkoutRecord>> {
        let before = end.to_rfc3339_opts(SecondsFormat::Secs, false);
        let after = start.to_rfc3339_opts(SecondsFormat::Secs, false);
        let limit = limit.to_string();
        self.filter(&[
            ("before", before.as_str()),
            ("after", after.as_str()),
            ("limit", limit.as_str()),
        ])
    }

    /// Creates a workout through the legacy API and returns its new id.
    pub fn create(
        &mut self,
        sport: Sport,
        start: DateTime<Utc>,
        duration_secs: u64,
        distance_km: f64,
        calories: Option<f64>,
    ) -> Result<String> {
        self.api
            .legacy_api()?
            .create_workout(sport, start, duration_secs, distance_km, calories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::session::tests::logged_in;
    use crate::transport::fake::{FakeTransport, header, query};
    use chrono::TimeZone;
    use reqwest::Method;
    use serde_json::json;

    const ONE: &str = r#"{"id": 11, "sport": 18, "start_time": "2020-01-01T10:00:00.000Z", "duration": 600, "distance": 1.5}"#;

    #[test]
    fn test_get_wraps_record() {
        let fake = FakeTransport::new();
        let mut api = logged_in(&fake);
        fake.reply(200, ONE);

        let w = api.workouts().get("11").unwrap();
        assert_eq!(w.id(), Some("11"));
        assert_eq!(w.sport(), Sport::Walking);
        assert_eq!(fake.sent()[1].url.path(), "/rest/v1/users/7/workouts/11");
    }

    #[test]
    fn test_get_malformed_record() {
        let fake = FakeTransport::new();
        let mut api = logged_in(&fake);
        fake.reply(200, r#"{"id": 11, "start_time": "2020-01-01T10:00:00Z"}"#);
        assert!(matches!(api.workouts().get("11"), Err(Error::MalformedRecord(_))));
    }

    #[test]
    fn test_filter_empty_result_is_ok() {
        let fake = FakeTransport::new();
        let mut api = logged_in(&fake);
        fake.reply(200, r#"{"data": []}"#);
        assert!(api.workouts().filter(&[]).unwrap().is_empty());

        let sent = fake.sent();
        assert_eq!(sent[1].url.path(), "/rest/v1/users/7/workouts/history");
        assert_eq!(query(&sent[1], "expand").as_deref(), Some("workout"));
    }

    #[test]
    fn test_filter_merges_caller_filters() {
        let fake = FakeTransport::new();
        let mut api = logged_in(&fake);
        fake.reply(200, &format!(r#"{{"data": [{ONE}, {ONE}]}}"#));
        let list = api.workouts().filter(&[("sport", "18"), ("expand", "points")]).unwrap();
        assert_eq!(list.len(), 2);

        let sent = fake.sent();
        assert_eq!(query(&sent[1], "sport").as_deref(), Some("18"));
        assert_eq!(query(&sent[1], "expand").as_deref(), Some("points"));
    }

    #[test]
    fn test_last_honours_limit() {
        let fake = FakeTransport::new();
        let mut api = logged_in(&fake);
        fake.reply(200, r#"{"data": []}"#);
        api.workouts().last(3).unwrap();
        assert_eq!(query(&fake.sent()[1], "limit").as_deref(), Some("3"));
    }

    #[test]
    fn test_by_dates_uses_iso_bounds() {
        let fake = FakeTransport::new();
        let mut api = logged_in(&fake);
        fake.reply(200, r#"{"data": []}"#);
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2020, 2, 1, 0, 0, 0).unwrap();
        api.workouts().by_dates(start, end, DEFAULT_LIMIT).unwrap();

        let req = &fake.sent()[1];
        assert_eq!(query(req, "after").as_deref(), Some("2020-01-01T00:00:00+00:00"));
        assert_eq!(query(req, "before").as_deref(), Some("2020-02-01T00:00:00+00:00"));
        assert_eq!(query(req, "limit").as_deref(), Some("15"));
    }

    #[test]
    fn test_save_puts_wire_payload() {
        let fake = FakeTransport::new();
        let mut api = logged_in(&fake);
        fake.reply(200, ONE);
        let mut w = api.workouts().get("11").unwrap();
        w.set_sport(89).unwrap();

        fake.reply_with_cookies(200, "", &["CSRF_TOKEN=t1"]);
        fake.reply(200, "{}");
        assert_eq!(api.workouts().save(&w).unwrap(), "11");

        let sent = fake.sent();
        let put = &sent[3];
        assert_eq!(put.method, Method::PUT);
        assert_eq!(header(put, "X-CSRF-TOKEN"), Some("t1"));
        let body: JsonValue = serde_json::from_str(put.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["sport"], 89);
        assert_eq!(body["start_time"], "2020-01-01 10:00:00 UTC");
        assert!(body.get("calories").is_none());
    }

    #[test]
    fn test_delete() {
        let fake = FakeTransport::new();
        let mut api = logged_in(&fake);
        fake.reply_with_cookies(200, "", &["CSRF_TOKEN=t1"]);
        fake.reply(200, "");
        api.workouts().delete("11").unwrap();
        assert_eq!(fake.sent()[2].method, Method::DELETE);
    }

    #[test]
    fn test_create_bootstraps_legacy_once() {
        let fake = FakeTransport::new();
        let mut api = logged_in(&fake);
        let start = Utc.with_ymd_and_hms(2021, 6, 1, 7, 30, 0).unwrap();
        let listing = r#"{"data": [{"id": 321, "sport": 0, "start_time": "2021-06-02 00:00:00 UTC"}]}"#;

        fake.reply(200, "OK\naction=PAIRED\nauthToken=TOK\n");
        fake.reply(200, r#"{"data": {"id": 555}}"#);
        fake.reply(200, "OK\n");
        fake.reply(200, listing);
        fake.reply(200, r#"{"data": "OK"}"#);
        let id = api
            .workouts()
            .create(Sport::Running, start, 1800, 5.0, None)
            .unwrap();
        assert_eq!(id, "321");

        fake.reply(200, "OK\n");
        fake.reply(200, listing);
        fake.reply(200, r#"{"data": "OK"}"#);
        api.workouts()
            .create(Sport::Running, start, 1800, 5.0, None)
            .unwrap();

        let auth_calls = fake
            .sent()
            .iter()
            .filter(|r| r.url.path() == "/mobile/auth")
            .count();
        assert_eq!(auth_calls, 1);
        assert_eq!(query(&fake.sent()[1], "email").as_deref(), Some("ann@example.com"));
        assert_eq!(fake.pending(), 0);
    }

    #[test]
    fn test_save_new_record_creates_it() {
        let fake = FakeTransport::new();
        let mut api = logged_in(&fake);
        let start = Utc.with_ymd_and_hms(2021, 6, 1, 7, 30, 0).unwrap();
        let w = WorkoutRecord::new(Sport::Yoga, start, 3600, 0.0);

        fake.reply(200, "OK\nx=y\nauthToken=TOK\n");
        fake.reply(200, r#"{"data": {"id": 555}}"#);
        fake.reply(200, "OK\n");
        fake.reply(200, r#"{"data": [{"id": 8, "sport": 47, "start_time": "2021-06-01 07:30:00 UTC"}]}"#);
        fake.reply(200, r#"{"data": "OK"}"#);
        assert_eq!(api.workouts().save(&w).unwrap(), "8");
    }

    #[test]
    fn test_edit_passes_fields() {
        let fake = FakeTransport::new();
        let mut api = logged_in(&fake);
        fake.reply_with_cookies(200, "", &["CSRF_TOKEN=t1"]);
        fake.reply(200, r#"{"id": 11, "sport": 89}"#);
        let out = api.workouts().edit("11", &json!({"sport": 89})).unwrap();
        assert_eq!(out["sport"], 89);
    }
}
