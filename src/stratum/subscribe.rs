use {super::*, serde::ser::SerializeSeq};

/// `mining.subscribe` request params. Both slots are optional: plenty of
/// firmware sends an empty array, and Goldshell units put their previous
/// session id in the second slot to ask for a resumed session.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Subscribe {
    pub user_agent: Option<String>,
    pub session_id: Option<String>,
}

impl Serialize for Subscribe {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let len = match (&self.user_agent, &self.session_id) {
            (_, Some(_)) => 2,
            (Some(_), None) => 1,
            (None, None) => 0,
        };
        let mut seq = serializer.serialize_seq(Some(len))?;
        if len >= 1 {
            seq.serialize_element(&self.user_agent)?;
        }
        if len == 2 {
            seq.serialize_element(&self.session_id)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Subscribe {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let params = Vec::<Value>::deserialize(deserializer)?;

        let string_at = |index: usize| {
            params
                .get(index)
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        Ok(Subscribe {
            user_agent: string_at(0),
            session_id: string_at(1),
        })
    }
}

/// `mining.subscribe` response payload. Pool mode sends
/// `[null, extranonce1, extranonce2_size]`; solo mode sends the
/// Goldshell-style resume triple with the session id standing in for the
/// extranonce1 slot.
#[derive(Debug, PartialEq, Clone)]
pub struct SubscribeResult {
    pub subscriptions: Option<Vec<(String, String)>>,
    pub extranonce1: String,
    pub extranonce2_size: u32,
}

impl SubscribeResult {
    pub fn resumed_session(session_id: &str, extranonce2_size: u32) -> Self {
        SubscribeResult {
            subscriptions: Some(vec![
                ("mining.set_difficulty".into(), session_id.into()),
                ("mining.notify".into(), session_id.into()),
            ]),
            extranonce1: session_id.into(),
            extranonce2_size,
        }
    }
}

impl Serialize for SubscribeResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(3))?;
        seq.serialize_element(&self.subscriptions)?;
        seq.serialize_element(&self.extranonce1)?;
        seq.serialize_element(&self.extranonce2_size)?;
        seq.end()
    }
}

impl<'de> Deserialize<'de> for SubscribeResult {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (subscriptions, extranonce1, extranonce2_size) =
            <(Option<Vec<(String, String)>>, String, u32)>::deserialize(deserializer)?;

        Ok(SubscribeResult {
            subscriptions,
            extranonce1,
            extranonce2_size,
        })
    }
}
