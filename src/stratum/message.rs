use super::*;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Clone)]
#[serde(untagged)]
pub enum Id {
    Null,
    Number(u64),
    String(String),
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::Null => f.write_str("null"),
            Id::Number(n) => write!(f, "{n}"),
            Id::String(s) => f.write_str(s),
        }
    }
}

/// One Stratum frame. Params and errors stay raw `Value`s at this layer so
/// unknown or dialect-specific fields pass through untouched; the typed
/// structs in the sibling modules give them shape where it matters.
#[derive(Debug, Serialize, PartialEq, Clone)]
#[serde(untagged)]
pub enum Message {
    Request {
        id: Id,
        method: String,
        params: Value,
    },
    Response {
        id: Id,
        result: Option<Value>,
        error: Option<Value>,
    },
    Notification {
        method: String,
        params: Value,
    },
}

/// Stratum servers send notifications with `id: null`, which the JSON-RPC
/// spec says should have no id field at all. Classify by hand so both forms
/// land on `Notification`, and anything carrying a result or error lands on
/// `Response` regardless of the rest.
impl<'de> Deserialize<'de> for Message {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;

        let has_method = value.get("method").is_some();
        let is_response = value.get("result").is_some() || value.get("error").is_some();
        let null_id = matches!(value.get("id"), None | Some(Value::Null));

        if is_response && !has_method {
            #[derive(Deserialize)]
            struct Response {
                #[serde(default)]
                id: Option<Id>,
                result: Option<Value>,
                error: Option<Value>,
            }

            let response: Response = serde_json::from_value(value).map_err(de::Error::custom)?;

            return Ok(Message::Response {
                id: response.id.unwrap_or(Id::Null),
                result: response.result,
                error: response.error.filter(|error| !error.is_null()),
            });
        }

        if has_method {
            let method = value
                .get("method")
                .and_then(Value::as_str)
                .ok_or_else(|| de::Error::custom("method must be a string"))?
                .to_string();

            let params = value.get("params").cloned().unwrap_or(Value::Null);

            if null_id {
                return Ok(Message::Notification { method, params });
            }

            let id: Id = serde_json::from_value(value.get("id").cloned().unwrap_or(Value::Null))
                .map_err(de::Error::custom)?;

            return Ok(Message::Request { id, method, params });
        }

        Err(de::Error::custom("unknown message format"))
    }
}

impl Message {
    pub fn request(id: Id, method: impl Into<String>, params: Value) -> Self {
        Message::Request {
            id,
            method: method.into(),
            params,
        }
    }

    pub fn notification(method: impl Into<String>, params: Value) -> Self {
        Message::Notification {
            method: method.into(),
            params,
        }
    }

    pub fn ok(id: Id, result: Value) -> Self {
        Message::Response {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Id, error: StratumError) -> Self {
        Message::Response {
            id,
            result: None,
            error: Some(error.to_value()),
        }
    }

    /// Share rejection: result `false` plus the error triple, the form the
    /// widest range of miner firmware understands.
    pub fn rejected(id: Id, error: StratumError) -> Self {
        Message::Response {
            id,
            result: Some(json!(false)),
            error: Some(error.to_value()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn case(s: &str, expected: Message) {
        let actual = serde_json::from_str::<Message>(s).unwrap();
        assert_eq!(actual, expected, "deserialize Message from str");

        let round_trip =
            serde_json::from_str::<Message>(&serde_json::to_string(&actual).unwrap()).unwrap();
        assert_eq!(round_trip, expected, "roundtrip");
    }

    #[test]
    fn request() {
        case(
            r#"{"id":1,"method":"mining.subscribe","params":[]}"#,
            Message::Request {
                id: Id::Number(1),
                method: "mining.subscribe".into(),
                params: json!([]),
            },
        );
    }

    #[test]
    fn request_with_string_id() {
        case(
            r#"{"id":"a1","method":"mining.authorize","params":["worker","x"]}"#,
            Message::Request {
                id: Id::String("a1".into()),
                method: "mining.authorize".into(),
                params: json!(["worker", "x"]),
            },
        );
    }

    #[test]
    fn notification_without_id() {
        case(
            r#"{"method":"mining.notify","params":["1f"]}"#,
            Message::Notification {
                method: "mining.notify".into(),
                params: json!(["1f"]),
            },
        );
    }

    #[test]
    fn notification_with_null_id() {
        assert_eq!(
            serde_json::from_str::<Message>(r#"{"id":null,"method":"mining.notify","params":[]}"#)
                .unwrap(),
            Message::Notification {
                method: "mining.notify".into(),
                params: json!([]),
            },
        );
    }

    #[test]
    fn response_true() {
        case(
            r#"{"id":4,"result":true,"error":null}"#,
            Message::Response {
                id: Id::Number(4),
                result: Some(json!(true)),
                error: None,
            },
        );
    }

    #[test]
    fn response_with_error_triple() {
        case(
            r#"{"id":10,"result":null,"error":[21,"Stale share",null]}"#,
            Message::Response {
                id: Id::Number(10),
                result: None,
                error: Some(json!([21, "Stale share", null])),
            },
        );
    }

    #[test]
    fn rejected_share_shape() {
        let message = Message::rejected(Id::Number(7), StratumError::LowDifficulty);
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"id": 7, "result": false, "error": [23, "Low difficulty share", null]}),
        );
    }

    #[test]
    fn unknown_shape_is_error() {
        assert!(serde_json::from_str::<Message>(r#"{"params":[]}"#).is_err());
        assert!(serde_json::from_str::<Message>("[1,2,3]").is_err());
    }
}
