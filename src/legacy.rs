use crate::config::{DeviceProfile, LegacyConfig};
use crate::dlog;
use crate::error::{Error, Result};
use crate::sport::Sport;
use crate::transport::{HttpTransport, Request, Response, Transport, redacted};
use crate::types::{WorkoutRecord, format_wire_time};
use crate::utils::parse_base_url;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use reqwest::Method;
use serde_json::{Map, Value as JsonValue, json};
use url::Url;

pub const URL_AUTH: &str = "/mobile/auth";
pub const URL_WORKOUTS: &str = "/mobile/api/workout/list";
pub const URL_WORKOUT: &str = "/mobile/api/workout/get";
pub const URL_WORKOUT_POST: &str = "/mobile/api/workout/post";
pub const URL_WORKOUT_CREATE: &str = "/mobile/track";
pub const URL_PROFILE_GET: &str = "/mobile/api/profile/account/get";
pub const URL_PROFILE_POST: &str = "/mobile/api/profile/account/post";

const WORKOUT_FIELDS: &str = "basic,pictures,tagged_users,points,playlist,interval";
const PLACEHOLDER_ID_DIGITS: usize = 16;
pub const DEFAULT_LIST_SIZE: u32 = 40;

/// Token-authenticated session against the older mobile API.
///
/// Only this API can create workouts and change account fields. The token
/// is obtained once and reused until `request_auth_token` is called again.
pub struct LegacySessionClient<T = HttpTransport> {
    transport: T,
    base_url: Url,
    device: DeviceProfile,
    device_id: String,
    user_agent: String,
    auth_token: Option<String>,
    profile: Option<JsonValue>,
}

struct JsonReply {
    status: u16,
    body: String,
    json: JsonValue,
}

impl JsonReply {
    fn unexpected(self) -> Error {
        Error::Api {
            status: self.status,
            body: self.body,
        }
    }
}

impl<T: Transport> LegacySessionClient<T> {
    pub fn new(transport: T, cfg: &LegacyConfig) -> Result<Self> {
        Ok(Self {
            transport,
            base_url: parse_base_url(&cfg.base_url)?,
            device_id: cfg.device.resolved_device_id(),
            user_agent: cfg.device.user_agent(),
            device: cfg.device.clone(),
            auth_token: None,
            profile: None,
        })
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    pub fn set_auth_token(&mut self, token: impl Into<String>) {
        self.auth_token = Some(token.into());
        self.profile = None;
    }

    /// Pairs this "device" with the account and stores the returned token.
    pub fn request_auth_token(&mut self, email: &str, password: &str) -> Result<String> {
        let d = &self.device;
        let params = [
            ("email", email.to_string()),
            ("password", password.to_string()),
            ("country", d.country.clone()),
            ("deviceId", self.device_id.clone()),
            ("os", d.os.clone()),
            ("appVersion", d.app_version.clone()),
            ("appVariant", d.app_variant.clone()),
            ("osVersion", d.os_version.clone()),
            ("model", d.model.clone()),
            ("v", d.protocol_version.clone()),
            ("action", "PAIR".to_string()),
        ];

        let resp = self.call(URL_AUTH, &params)?;
        let token = parse_auth_response(&resp.body)?;
        self.set_auth_token(token.clone());
        tracing::info!("legacy session paired");
        Ok(token)
    }

    /// Account profile, fetched on first use and cached.
    pub fn profile(&mut self) -> Result<&JsonValue> {
        if self.profile.is_none() {
            let params = [("authToken", self.token()?)];
            let reply = self.call_json(URL_PROFILE_GET, &params)?;
            match reply.json.get("data") {
                Some(data) if data.is_object() => self.profile = Some(data.clone()),
                _ => return Err(reply.unexpected()),
            }
        }
        self.profile.as_ref().ok_or(Error::NotAuthenticated)
    }

    pub fn reset_profile(&mut self) {
        self.profile = None;
    }

    pub fn user_id(&mut self) -> Result<u64> {
        let profile = self.profile()?;
        profile
            .get("id")
            .and_then(|v| v.as_u64().or_else(|| v.as_str()?.parse().ok()))
            .ok_or_else(|| Error::Api {
                status: 200,
                body: format!("profile without id: {profile}"),
            })
    }

    /// Records a weight measurement (kilograms) taken at `date`.
    pub fn log_weight(&mut self, kg: f64, date: DateTime<Utc>) -> Result<JsonValue> {
        self.post_account_info(&json!({
            "weight_kg": kg,
            "weight_time": format_wire_time(date),
        }))
    }

    pub fn post_account_info(&mut self, input: &JsonValue) -> Result<JsonValue> {
        let params = [
            ("authToken", self.token()?),
            ("userId", self.user_id()?.to_string()),
            ("input", input.to_string()),
            ("gzip", "false".to_string()),
        ];
        let resp = self.call(URL_PROFILE_POST, &params)?;
        expect_ok_data(resp)
    }

    /// Workouts of `user_id`, or of the paired account when `None`.
    pub fn workout_list(&mut self, user_id: Option<u64>, max_results: u32) -> Result<Vec<WorkoutRecord>> {
        let mut params = vec![
            ("authToken", self.token()?),
            ("language", self.device.language.clone()),
            ("fields", WORKOUT_FIELDS.to_string()),
            ("maxResults", max_results.to_string()),
        ];
        if let Some(id) = user_id {
            params.push(("userId", id.to_string()));
        }

        let reply = self.call_json(URL_WORKOUTS, &params)?;
        WorkoutRecord::list_from_wire(&reply.json)
    }

    pub fn my_workout_list(&mut self, max_results: u32) -> Result<Vec<WorkoutRecord>> {
        let user_id = self.user_id()?;
        self.workout_list(Some(user_id), max_results)
    }

    pub fn workout(&mut self, workout_id: &str) -> Result<WorkoutRecord> {
        let params = [
            ("authToken", self.token()?),
            ("fields", WORKOUT_FIELDS.to_string()),
            ("workoutId", workout_id.to_string()),
        ];
        let reply = self.call_json(URL_WORKOUT, &params)?;
        let raw = reply
            .json
            .get("data")
            .filter(|d| d.is_object())
            .unwrap_or(&reply.json);
        WorkoutRecord::from_wire(raw)
    }

    /// Creates a workout and returns the id the backend assigned.
    ///
    /// The track endpoint ignores the start time and does not echo the new
    /// id, so creation is followed by a lookup and an edit. There is no
    /// rollback: if the edit fails the workout exists with default fields.
    pub fn create_workout(
        &mut self,
        sport: Sport,
        start: DateTime<Utc>,
        duration_secs: u64,
        distance_km: f64,
        calories: Option<f64>,
    ) -> Result<String> {
        let params = [
            ("authToken", self.token()?),
            ("userId", self.user_id()?.to_string()),
            ("workoutId", placeholder_workout_id()),
            ("duration", duration_secs.to_string()),
            ("sport", sport.code().to_string()),
            ("distance", distance_km.to_string()),
            ("trackPoints", "false".to_string()),
            ("extendedResponse", "true".to_string()),
            ("gzip", "false".to_string()),
        ];

        let resp = self
            .call(URL_WORKOUT_CREATE, &params)
            .map_err(|e| Error::creation_caused_by("track request failed", e))?;
        if !resp.is_success() || first_line(&resp.body) != "OK" {
            return Err(Error::creation(format!(
                "backend refused workout (status {}): {}",
                resp.status, resp.body
            )));
        }

        let id = self
            .find_created_workout_id()
            .map_err(|e| Error::creation_caused_by("could not look up the new workout", e))?;

        let end = i64::try_from(duration_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|d| start.checked_add_signed(d))
            .ok_or_else(|| Error::creation(format!("duration {duration_secs}s out of range")))?;
        let mut set = Map::new();
        set.insert("start_time".into(), json!(format_wire_time(start)));
        set.insert("end_time".into(), json!(format_wire_time(end)));
        set.insert("sport".into(), json!(sport.code()));
        set.insert("duration".into(), json!(duration_secs));
        set.insert("distance".into(), json!(distance_km));
        if let Some(c) = calories {
            set.insert("calories".into(), json!(c));
        }

        self.edit_workout(&id, &JsonValue::Object(set)).map_err(|e| {
            Error::creation_caused_by(format!("workout {id} was created but could not be updated"), e)
        })?;

        tracing::info!(workout_id = %id, sport = %sport, "workout created");
        Ok(id)
    }

    /// Id of the workout the track endpoint just created.
    ///
    /// The backend does not return it, so this takes the newest workout of
    /// the paired account. It is only correct when nothing else created a
    /// workout for the account in between; replace this lookup if the
    /// protocol ever starts returning the id.
    pub fn find_created_workout_id(&mut self) -> Result<String> {
        let newest = self.workout_list(None, 1)?;
        newest
            .first()
            .and_then(|w| w.id().map(str::to_owned))
            .ok_or_else(|| Error::creation("no workout listed after creation"))
    }

    pub fn edit_workout(&mut self, workout_id: &str, properties: &JsonValue) -> Result<JsonValue> {
        let params = [
            ("authToken", self.token()?),
            ("userId", self.user_id()?.to_string()),
            ("gzip", "false".to_string()),
            ("workoutId", workout_id.to_string()),
            ("input", properties.to_string()),
        ];
        let resp = self.call(URL_WORKOUT_POST, &params)?;
        expect_ok_data(resp)
    }

    fn token(&self) -> Result<String> {
        self.auth_token.clone().ok_or(Error::NotAuthenticated)
    }

    /// Every legacy call is a POST with its parameters in the query string.
    fn call(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Response> {
        let mut url = self.base_url.join(endpoint.trim_start_matches('/'))?;
        url.query_pairs_mut()
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
        dlog!("POST {}", redacted(&url));

        let req = Request::new(Method::POST, url).header("User-Agent", self.user_agent.clone());
        self.transport.send(req)
    }

    fn call_json(&self, endpoint: &str, params: &[(&str, String)]) -> Result<JsonReply> {
        let resp = self.call(endpoint, params)?;
        if !resp.is_success() {
            return Err(Error::Api {
                status: resp.status,
                body: resp.body,
            });
        }
        match serde_json::from_str(&resp.body) {
            Ok(json) => Ok(JsonReply {
                status: resp.status,
                body: resp.body,
                json,
            }),
            Err(_) => Err(Error::Api {
                status: resp.status,
                body: resp.body,
            }),
        }
    }
}

/// Extracts the token from the line-oriented auth reply.
///
/// ```text
/// OK
/// action=PAIRED
/// authToken=...
/// ```
///
/// The `authToken` key is preferred; otherwise the third line carries it.
pub fn parse_auth_response(body: &str) -> Result<String> {
    if !body.starts_with("OK") {
        return Err(Error::AuthenticationDenied(body.to_string()));
    }

    let lines: Vec<&str> = body.lines().map(str::trim).collect();
    let by_key = lines
        .iter()
        .filter_map(|l| l.split_once('='))
        .find(|(k, _)| *k == "authToken")
        .map(|(_, v)| v);
    let by_position = lines.get(2).and_then(|l| l.split_once('=')).map(|(_, v)| v);

    by_key
        .or(by_position)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| Error::AuthenticationDenied(body.to_string()))
}

/// Success means a JSON body whose `data` field is the string `"OK"`.
fn expect_ok_data(resp: Response) -> Result<JsonValue> {
    let parsed: Option<JsonValue> = serde_json::from_str(&resp.body).ok();
    match parsed {
        Some(json) if resp.is_success() && json.get("data").and_then(JsonValue::as_str) == Some("OK") => {
            Ok(json)
        }
        _ => Err(Error::WorkoutEdit(format!("status {}: {}", resp.status, resp.body))),
    }
}

fn first_line(body: &str) -> &str {
    body.lines().next().unwrap_or("").trim()
}

/// `-` followed by random digits; the backend replaces it with a real id.
fn placeholder_workout_id() -> String {
    let mut rng = rand::thread_rng();
    let digits: String = (0..PLACEHOLDER_ID_DIGITS)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect();
    format!("-{digits}")
}
