use crate::error::{Error, Result};
use crate::gpx;
use crate::sport::Sport;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use once_cell::unsync::OnceCell;
use serde_json::{Map, Value as JsonValue, json};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Timestamp layout the backend accepts on update/create endpoints.
pub const WIRE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

pub fn format_wire_time(t: DateTime<Utc>) -> String {
    t.format(WIRE_TIME_FORMAT).to_string()
}

/// Accepts the layouts both API generations emit: RFC 3339,
/// `2020-01-01T10:00:00.000+0000` and `2020-01-01 10:00:00 UTC`.
pub fn parse_wire_time(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, WIRE_TIME_FORMAT)
        .ok()
        .map(|n| n.and_utc())
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackPoint {
    pub lat: f64,
    pub lon: f64,
    pub time: DateTime<Utc>,
    pub alt: Option<f64>,
    pub hr: Option<u32>,
}

impl TrackPoint {
    /// `None` when the point lacks a position or a readable time.
    fn from_wire(raw: &JsonValue) -> Option<Self> {
        let coord = |keys: &[&str]| keys.iter().find_map(|k| raw.get(*k).and_then(as_f64));

        let lat = coord(&["lat", "latitude"])?;
        let lon = coord(&["lng", "lon", "longitude"])?;
        let time = raw
            .get("time")
            .and_then(JsonValue::as_str)
            .and_then(parse_wire_time)?;

        let alt = coord(&["alt", "altitude"]);
        let hr = raw
            .get("hr")
            .and_then(as_f64)
            .filter(|v| *v >= 0.0)
            .map(|v| v.round() as u32);

        Some(Self {
            lat,
            lon,
            time,
            alt,
            hr,
        })
    }
}

/// A single workout as returned by the backend.
#[derive(Debug, Clone)]
pub struct WorkoutRecord {
    id: Option<String>,
    sport: Sport,
    start: DateTime<Utc>,
    duration: u64,
    distance: f64,
    calories: Option<f64>,
    points: Vec<TrackPoint>,
    raw: JsonValue,
    gpx: OnceCell<String>,
}

impl WorkoutRecord {
    /// An unpersisted record; the backend assigns the id on creation.
    pub fn new(sport: Sport, start: DateTime<Utc>, duration: u64, distance: f64) -> Self {
        Self {
            id: None,
            sport,
            start,
            duration,
            distance: distance.max(0.0),
            calories: None,
            points: Vec::new(),
            raw: JsonValue::Null,
            gpx: OnceCell::new(),
        }
    }

    pub fn from_wire(raw: &JsonValue) -> Result<Self> {
        if !raw.is_object() {
            return Err(Error::MalformedRecord(format!("expected object, got {raw}")));
        }

        let id = match raw.get("id") {
            Some(JsonValue::String(s)) if !s.is_empty() => s.clone(),
            Some(JsonValue::Number(n)) => n.to_string(),
            _ => return Err(Error::MalformedRecord("missing id".into())),
        };

        let start = raw
            .get("start_time")
            .and_then(JsonValue::as_str)
            .and_then(parse_wire_time)
            .ok_or_else(|| Error::MalformedRecord(format!("{id}: missing or bad start_time")))?;

        let code = raw
            .get("sport")
            .and_then(as_i64)
            .ok_or_else(|| Error::MalformedRecord(format!("{id}: missing or bad sport")))?;
        let sport = Sport::from_code(code)
            .map_err(|_| Error::MalformedRecord(format!("{id}: unknown sport code {code}")))?;

        let duration = raw
            .get("duration")
            .and_then(as_f64)
            .map_or(0, |d| d.max(0.0).round() as u64);
        let distance = raw.get("distance").and_then(as_f64).unwrap_or(0.0).max(0.0);
        let calories = raw.get("calories").and_then(as_f64).filter(|c| *c >= 0.0);

        let points = match raw.get("points") {
            Some(JsonValue::Array(items)) => {
                let points: Vec<_> = items.iter().filter_map(TrackPoint::from_wire).collect();
                if points.len() < items.len() {
                    tracing::debug!(
                        workout = %id,
                        skipped = items.len() - points.len(),
                        "dropped track points without position or time"
                    );
                }
                points
            }
            _ => Vec::new(),
        };

        Ok(Self {
            id: Some(id),
            sport,
            start,
            duration,
            distance,
            calories,
            points,
            raw: raw.clone(),
            gpx: OnceCell::new(),
        })
    }

    /// Maps a `{"data": [...]}` listing. A missing or null `data` is an empty list.
    pub fn list_from_wire(listing: &JsonValue) -> Result<Vec<Self>> {
        match listing.get("data") {
            None | Some(JsonValue::Null) => Ok(Vec::new()),
            Some(JsonValue::Array(items)) => items.iter().map(Self::from_wire).collect(),
            Some(other) => Err(Error::MalformedRecord(format!(
                "expected workout list, got {other}"
            ))),
        }
    }

    /// Fields accepted by the update and create endpoints.
    pub fn to_wire_payload(&self) -> Map<String, JsonValue> {
        let mut out = Map::new();
        out.insert("sport".into(), json!(self.sport.code()));
        out.insert("duration".into(), json!(self.duration));
        out.insert("distance".into(), json!(self.distance));
        out.insert("start_time".into(), json!(format_wire_time(self.start)));
        if let Some(c) = self.calories {
            out.insert("calories".into(), json!(c));
        }
        out
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub const fn sport(&self) -> Sport {
        self.sport
    }

    /// Changes the sport locally; call `Workouts::save` to push it.
    pub fn set_sport(&mut self, code: i64) -> Result<()> {
        let sport = Sport::from_code(code)?;
        if sport != self.sport {
            self.sport = sport;
            self.gpx.take();
        }
        Ok(())
    }

    pub fn set_calories(&mut self, calories: Option<f64>) {
        self.calories = calories.filter(|c| *c >= 0.0);
    }

    pub fn set_points(&mut self, points: Vec<TrackPoint>) {
        self.points = points;
        self.gpx.take();
    }

    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        let secs = i64::try_from(self.duration).unwrap_or(i64::MAX);
        self.start + Duration::seconds(secs)
    }

    /// Seconds.
    pub const fn duration(&self) -> u64 {
        self.duration
    }

    /// Kilometres.
    pub const fn distance(&self) -> f64 {
        self.distance
    }

    pub const fn calories(&self) -> Option<f64> {
        self.calories
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn heart_rate_avg(&self) -> Option<u32> {
        self.raw
            .get("heart_rate_avg")
            .and_then(as_f64)
            .map(|v| v.round() as u32)
    }

    /// Payload the record was built from (`Null` for local records).
    pub const fn raw(&self) -> &JsonValue {
        &self.raw
    }

    /// GPX 1.1 document for this workout, generated once and reused.
    pub fn to_gpx(&self) -> Result<&str> {
        self.gpx
            .get_or_try_init(|| gpx::render(self.sport, &self.points))
            .map(String::as_str)
    }

    pub fn save_gpx(&self, path: &Path) -> Result<()> {
        let doc = self.to_gpx()?;
        let mut out = BufWriter::new(File::create(path)?);
        out.write_all(doc.as_bytes())?;
        out.flush()?;
        tracing::debug!(path = %path.display(), points = self.points.len(), "wrote gpx");
        Ok(())
    }
}

impl fmt::Display for WorkoutRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let minutes = (self.duration as f64 / 60.0).round();
        write!(
            f,
            "{} ({}, {}, {}km, {minutes}min.)",
            self.id.as_deref().unwrap_or("new"),
            self.start.format("%H:%M:%S %d.%m.%Y"),
            self.sport.name(),
            self.distance,
        )
    }
}

fn as_f64(v: &JsonValue) -> Option<f64> {
    match v {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_i64(v: &JsonValue) -> Option<i64> {
    match v {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> JsonValue {
        json!({
            "id": 631_234_567,
            "sport": 2,
            "start_time": "2020-01-01T10:00:00.000+0000",
            "duration": 3725,
            "distance": 42.5,
            "calories": 900,
            "heart_rate_avg": 141.6,
            "points": [
                {"lat": 50.1, "lng": 14.4, "time": "2020-01-01T10:00:00Z", "alt": 230.5, "hr": 120},
                {"lat": 50.2, "lng": 14.5, "time": "2020-01-01T10:00:05Z"}
            ]
        })
    }

    #[test]
    fn test_from_wire_full() {
        let w = WorkoutRecord::from_wire(&sample()).unwrap();
        assert_eq!(w.id(), Some("631234567"));
        assert_eq!(w.sport(), Sport::CyclingSport);
        assert_eq!(w.start(), Utc.with_ymd_and_hms(2020, 1, 1, 10, 0, 0).unwrap());
        assert_eq!(w.duration(), 3725);
        assert!((w.distance() - 42.5).abs() < f64::EPSILON);
        assert_eq!(w.calories(), Some(900.0));
        assert_eq!(w.heart_rate_avg(), Some(142));
        assert_eq!(w.points().len(), 2);
        assert_eq!(w.points()[0].hr, Some(120));
        assert_eq!(w.points()[1].alt, None);
    }

    #[test]
    fn test_from_wire_skips_incomplete_points() {
        let mut raw = sample();
        raw["points"] = json!([
            {"lng": 14.4, "time": "2020-01-01T10:00:00Z"},
            {"lat": 50.2, "lng": 14.5, "time": "2020-01-01T10:00:05Z", "hr": 130},
            {"lat": 50.3, "time": "2020-01-01T10:00:10Z"},
            {"lat": 50.4, "lng": 14.6, "time": "yesterday"},
            {"lat": 50.5, "lng": 14.7}
        ]);
        let w = WorkoutRecord::from_wire(&raw).unwrap();
        assert_eq!(w.points().len(), 1);
        assert_eq!(w.points()[0].hr, Some(130));
        assert_eq!(w.to_gpx().unwrap().matches("<trkpt").count(), 1);
    }

    #[test]
    fn test_from_wire_defaults() {
        let w = WorkoutRecord::from_wire(&json!({
            "id": "abc",
            "sport": "0",
            "start_time": "2016-05-04 06:07:08 UTC"
        }))
        .unwrap();
        assert_eq!(w.duration(), 0);
        assert!(w.distance().abs() < f64::EPSILON);
        assert_eq!(w.calories(), None);
        assert!(w.points().is_empty());
        assert_eq!(w.heart_rate_avg(), None);
    }

    #[test]
    fn test_from_wire_without_sport_is_malformed() {
        let mut raw = sample();
        raw.as_object_mut().unwrap().remove("sport");
        assert!(matches!(
            WorkoutRecord::from_wire(&raw),
            Err(Error::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_from_wire_without_id_or_start_is_malformed() {
        let mut raw = sample();
        raw.as_object_mut().unwrap().remove("id");
        assert!(matches!(
            WorkoutRecord::from_wire(&raw),
            Err(Error::MalformedRecord(_))
        ));

        let mut raw = sample();
        raw["start_time"] = json!("yesterday");
        assert!(matches!(
            WorkoutRecord::from_wire(&raw),
            Err(Error::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_from_wire_unknown_sport_is_malformed() {
        let mut raw = sample();
        raw["sport"] = json!(999);
        let err = WorkoutRecord::from_wire(&raw).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord(ref m) if m.contains("999")));
    }

    #[test]
    fn test_payload_omits_absent_calories() {
        let mut raw = sample();
        raw.as_object_mut().unwrap().remove("calories");
        let w = WorkoutRecord::from_wire(&raw).unwrap();
        assert_eq!(w.calories(), None);
        let payload = w.to_wire_payload();
        assert!(!payload.contains_key("calories"));
        assert_eq!(payload["start_time"], json!("2020-01-01 10:00:00 UTC"));
        assert_eq!(payload["duration"], json!(3725));
        assert_eq!(payload["sport"], json!(2));
    }

    #[test]
    fn test_set_sport_round_trips_through_payload() {
        let mut w = WorkoutRecord::from_wire(&sample()).unwrap();
        for sport in Sport::all() {
            let code = i64::from(sport.code());
            w.set_sport(code).unwrap();
            assert_eq!(w.to_wire_payload()["sport"], json!(code));
        }
    }

    #[test]
    fn test_set_sport_rejects_unknown_code() {
        let mut w = WorkoutRecord::from_wire(&sample()).unwrap();
        assert!(matches!(w.set_sport(77), Err(Error::UnknownSport(77))));
        assert_eq!(w.sport(), Sport::CyclingSport);
    }

    #[test]
    fn test_gpx_regenerates_after_sport_change() {
        let mut w = WorkoutRecord::from_wire(&sample()).unwrap();
        let before = w.to_gpx().unwrap().to_owned();
        assert!(before.contains("<type>CYCLING_SPORT</type>"));
        assert_eq!(w.to_gpx().unwrap(), before);

        w.set_sport(0).unwrap();
        let after = w.to_gpx().unwrap();
        assert!(after.contains("<type>RUNNING</type>"));
    }

    #[test]
    fn test_end_time() {
        let w = WorkoutRecord::from_wire(&sample()).unwrap();
        assert_eq!(w.end_time(), Utc.with_ymd_and_hms(2020, 1, 1, 11, 2, 5).unwrap());
    }

    #[test]
    fn test_display_summary() {
        let w = WorkoutRecord::from_wire(&sample()).unwrap();
        assert_eq!(
            w.to_string(),
            "631234567 (10:00:00 01.01.2020, Cycling, sport, 42.5km, 62min.)"
        );
    }

    #[test]
    fn test_display_new_record() {
        let start = Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap();
        let w = WorkoutRecord::new(Sport::Hiking, start, 5400, 12.0);
        assert_eq!(w.id(), None);
        assert_eq!(w.to_string(), "new (05:06:07 04.03.2021, Hiking, 12km, 90min.)");
    }
}
