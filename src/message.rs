//! # Request & Response
//!
//! The two stable contract surfaces of the engine. Any transport or bus adapter
//! marshals exactly these shapes:
//!
//! - [`Request`] = `{app_id, app_version, module_id, actor_id, cmd, params, langs}`
//! - [`Response`] = `{status, message?, reference?, data?}`
//!
//! Both are immutable once built.

use crate::error::RequestError;
use crate::value::{Params, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of terminal (and one transitional) outcomes of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ResponseStatus {
    Ok = 0,
    /// An async operation started but has not resolved yet.
    Accepted = 1,
    Unauthorized = 2,
    LogicFailed = 3,
    Exception = 4,
    Timeout = 5,
    Reject = 6,
    NotFound = 7,
    BadParameters = 8,
}

impl ResponseStatus {
    /// Numeric wire value.
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        let status = match code {
            0 => ResponseStatus::Ok,
            1 => ResponseStatus::Accepted,
            2 => ResponseStatus::Unauthorized,
            3 => ResponseStatus::LogicFailed,
            4 => ResponseStatus::Exception,
            5 => ResponseStatus::Timeout,
            6 => ResponseStatus::Reject,
            7 => ResponseStatus::NotFound,
            8 => ResponseStatus::BadParameters,
            _ => return None,
        };
        Some(status)
    }

    /// Everything except `Accepted` ends a call.
    pub fn is_terminal(self) -> bool {
        self != ResponseStatus::Accepted
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResponseStatus::Ok => "OK",
            ResponseStatus::Accepted => "ACCEPTED",
            ResponseStatus::Unauthorized => "UNAUTHORIZED",
            ResponseStatus::LogicFailed => "LOGIC_FAILED",
            ResponseStatus::Exception => "EXCEPTION",
            ResponseStatus::Timeout => "TIMEOUT",
            ResponseStatus::Reject => "REJECT",
            ResponseStatus::NotFound => "NOT_FOUND",
            ResponseStatus::BadParameters => "BAD_PARAMETERS",
        };
        f.write_str(name)
    }
}

/// A call addressed to `app/module/actor/cmd`.
///
/// Deserialisation goes through [`Request::new`], so wire data is held to the
/// same address rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RequestData")]
pub struct Request {
    app_id: String,
    app_version: Option<String>,
    module_id: String,
    actor_id: String,
    cmd: String,
    params: Vec<Value>,
    langs: Vec<String>,
}

/// Unvalidated wire shape of a [`Request`].
#[derive(Deserialize)]
struct RequestData {
    app_id: String,
    app_version: Option<String>,
    module_id: String,
    actor_id: String,
    cmd: String,
    params: Vec<Value>,
    #[serde(default)]
    langs: Vec<String>,
}

impl TryFrom<RequestData> for Request {
    type Error = RequestError;

    fn try_from(data: RequestData) -> Result<Self, Self::Error> {
        Ok(Request::new(
            data.app_id,
            data.app_version.as_deref(),
            data.module_id,
            data.actor_id,
            data.cmd,
            data.params,
        )?
        .with_langs(data.langs))
    }
}

impl Request {
    /// Builds a request; every address part except the version must be non-empty.
    pub fn new(
        app_id: impl Into<String>,
        app_version: Option<&str>,
        module_id: impl Into<String>,
        actor_id: impl Into<String>,
        cmd: impl Into<String>,
        params: Vec<Value>,
    ) -> Result<Self, RequestError> {
        let app_id = app_id.into();
        let module_id = module_id.into();
        let actor_id = actor_id.into();
        let cmd = cmd.into();
        for (field, value) in [
            ("app_id", &app_id),
            ("module_id", &module_id),
            ("actor_id", &actor_id),
            ("cmd", &cmd),
        ] {
            if value.trim().is_empty() {
                return Err(RequestError::EmptyField(field));
            }
        }
        Ok(Self {
            app_id,
            app_version: app_version.map(str::to_string),
            module_id,
            actor_id,
            cmd,
            params,
            langs: Vec::new(),
        })
    }

    /// Attaches locale hints.
    pub fn with_langs<I, S>(mut self, langs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.langs = langs.into_iter().map(Into::into).collect();
        self
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn app_version(&self) -> Option<&str> {
        self.app_version.as_deref()
    }

    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn langs(&self) -> &[String] {
        &self.langs
    }

    pub(crate) fn to_params(&self) -> Params {
        Params::new(self.params.clone())
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}/{}/{}/{}{}",
            self.app_id,
            self.app_version.as_deref().unwrap_or("-"),
            self.module_id,
            self.actor_id,
            self.cmd,
            Params::new(self.params.clone())
        )
    }
}

/// User-facing message of every `EXCEPTION` response. Fault detail goes to
/// the response `reference` and the log, never here.
pub const INTERNAL_ERROR_MESSAGE: &str =
    "The request could not be processed because of an internal error.";

/// The outcome of a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    status: ResponseStatus,
    message: Option<String>,
    reference: Option<String>,
    data: Option<Value>,
}

impl Response {
    pub fn new(
        status: ResponseStatus,
        message: Option<String>,
        reference: Option<String>,
        data: Option<Value>,
    ) -> Self {
        Self {
            status,
            message,
            reference,
            data,
        }
    }

    /// A response carrying only a status.
    pub fn status_only(status: ResponseStatus) -> Self {
        Self::new(status, None, None, None)
    }

    pub fn ok(data: impl Into<Value>) -> Self {
        Self::new(ResponseStatus::Ok, None, None, Some(data.into()))
    }

    pub fn with_message(status: ResponseStatus, message: impl Into<String>) -> Self {
        Self::new(status, Some(message.into()), None, None)
    }

    /// An `EXCEPTION` response with the generic message and a diagnostic reference.
    pub fn exception(reference: impl Into<String>) -> Self {
        Self::new(
            ResponseStatus::Exception,
            Some(INTERNAL_ERROR_MESSAGE.to_string()),
            Some(reference.into()),
            None,
        )
    }

    pub fn status(&self) -> ResponseStatus {
        self.status
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Option<Value> {
        self.data
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{status={}", self.status)?;
        if let Some(msg) = &self.message {
            write!(f, ", msg={msg}")?;
        }
        if let Some(data) = &self.data {
            write!(f, ", data={data}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_validates_address() {
        let empty = "app_id = \"\"\nmodule_id = \"GLOBAL\"\nactor_id = \"Echo\"\ncmd = \"ping\"\nparams = []\nlangs = []";
        let err = toml::from_str::<Request>(empty).unwrap_err();
        assert!(err.to_string().contains("app_id"), "{err}");

        let valid = "app_id = \"Demo\"\nmodule_id = \"GLOBAL\"\nactor_id = \"Echo\"\ncmd = \"ping\"\nparams = []\nlangs = [\"en\"]";
        let request: Request = toml::from_str(valid).unwrap();
        assert_eq!(
            request,
            Request::new("Demo", None, "GLOBAL", "Echo", "ping", vec![])
                .unwrap()
                .with_langs(["en"])
        );
    }

    #[test]
    fn test_request_rejects_empty_address_parts() {
        assert_eq!(
            Request::new("", None, "GLOBAL", "Echo", "ping", vec![]),
            Err(RequestError::EmptyField("app_id"))
        );
        assert_eq!(
            Request::new("Demo", None, "GLOBAL", "  ", "ping", vec![]),
            Err(RequestError::EmptyField("actor_id"))
        );
        assert_eq!(
            Request::new("Demo", None, "GLOBAL", "Echo", "", vec![]),
            Err(RequestError::EmptyField("cmd"))
        );
    }

    #[test]
    fn test_request_accessors() {
        let req = Request::new("Demo", Some("2.0"), "GLOBAL", "Echo", "ping", vec![Value::from(1)])
            .unwrap()
            .with_langs(["en_US"]);
        assert_eq!(req.app_version(), Some("2.0"));
        assert_eq!(req.params().len(), 1);
        assert_eq!(req.langs(), &["en_US".to_string()]);
        assert_eq!(req.to_string(), "Demo@2.0/GLOBAL/Echo/ping(1)");
    }

    #[test]
    fn test_status_codes_are_distinct() {
        let mut seen = std::collections::HashSet::new();
        for code in 0..=8 {
            let status = ResponseStatus::from_code(code).unwrap();
            assert_eq!(status.code(), code);
            assert!(seen.insert(status));
        }
        assert_eq!(ResponseStatus::from_code(9), None);
        assert_eq!(ResponseStatus::LogicFailed.to_string(), "LOGIC_FAILED");
        assert!(!ResponseStatus::Accepted.is_terminal());
        assert!(ResponseStatus::Timeout.is_terminal());
    }

    #[test]
    fn test_exception_response_hides_detail_from_message() {
        let resp = Response::exception("Echo.fail(...): disk on fire");
        assert_eq!(resp.status(), ResponseStatus::Exception);
        assert_eq!(resp.message(), Some(INTERNAL_ERROR_MESSAGE));
        assert!(resp.reference().unwrap().contains("disk on fire"));
        assert!(resp.data().is_none());
    }
}
