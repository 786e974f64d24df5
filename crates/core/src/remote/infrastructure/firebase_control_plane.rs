use reqwest::blocking::{Client, RequestBuilder, Response};
use serde_json::Value;

use crate::config::RemoteConfig;
use crate::remote::domain::control_plane::{ControlPlaneError, RemoteControlPlane};
use crate::remote::domain::records::{FaceRecord, StatusRecord};

/// Firebase Realtime Database over its REST interface.
///
/// - flag: `GET {db}/{control_path}.json`
/// - status: `PUT {db}/{status_path}.json` (overwrite)
/// - faces: `POST {db}/{faces_path}.json` (push)
///
/// Every request is bounded by the configured timeout.
pub struct FirebaseControlPlane {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
    control_path: String,
    status_path: String,
    faces_path: String,
}

impl FirebaseControlPlane {
    pub fn new(config: &RemoteConfig) -> Result<Self, ControlPlaneError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ControlPlaneError::Request {
                path: config.database_url.clone(),
                source: e,
            })?;
        Ok(Self {
            client,
            base_url: config.database_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
            control_path: config.control_path.clone(),
            status_path: config.status_path.clone(),
            faces_path: config.faces_path.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, path.trim_matches('/'))
    }

    fn send(&self, path: &str, request: RequestBuilder) -> Result<Response, ControlPlaneError> {
        let request = match &self.auth_token {
            Some(token) => request.query(&[("auth", token)]),
            None => request,
        };
        let response = request.send().map_err(|e| ControlPlaneError::Request {
            path: path.to_string(),
            source: e,
        })?;
        if !response.status().is_success() {
            return Err(ControlPlaneError::Http {
                path: path.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }
}

impl RemoteControlPlane for FirebaseControlPlane {
    fn running_flag(&self) -> Result<bool, ControlPlaneError> {
        let path = &self.control_path;
        let value: Value = self
            .send(path, self.client.get(self.url(path)))?
            .json()
            .map_err(|e| ControlPlaneError::Decode {
                path: path.clone(),
                source: e,
            })?;
        Ok(flag_from_json(&value))
    }

    fn publish_status(&self, status: &StatusRecord) -> Result<(), ControlPlaneError> {
        let path = &self.status_path;
        self.send(path, self.client.put(self.url(path)).json(status))?;
        Ok(())
    }

    fn publish_face(&self, face: &FaceRecord) -> Result<(), ControlPlaneError> {
        let path = &self.faces_path;
        self.send(path, self.client.post(self.url(path)).json(face))?;
        Ok(())
    }
}

/// Truthiness of a stored flag: null, false, 0, "" and empty containers are
/// off; anything else is on.
pub fn flag_from_json(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
