use {
    roost::stratum::{
        Extranonce, Id, JobId, Message, Nonce, Notify, SetDifficulty, SetTarget, StratumError,
        Submit, Subscribe, SubscribeResult,
    },
    roost::target::{Difficulty, Target},
    serde_json::{Value, json},
};

#[test]
fn subscribe_request_with_empty_params() {
    let frame = r#"{"id":1,"method":"mining.subscribe","params":[]}"#;
    let message: Message = serde_json::from_str(frame).unwrap();

    let Message::Request { id, method, params } = message else {
        panic!("expected a request");
    };
    assert_eq!(id, Id::Number(1));
    assert_eq!(method, "mining.subscribe");
    assert_eq!(serde_json::from_value::<Subscribe>(params).unwrap(), Subscribe::default());
}

#[test]
fn subscribe_reply_wire_shape() {
    let result = SubscribeResult {
        subscriptions: None,
        extranonce1: "0800000207".into(),
        extranonce2_size: 7,
    };
    let reply = Message::ok(Id::Number(1), json!(result));

    assert_eq!(
        serde_json::to_value(&reply).unwrap(),
        json!({"id": 1, "result": [null, "0800000207", 7], "error": null}),
    );
}

#[test]
fn solo_subscribe_reply_is_goldshell_triple() {
    let result = SubscribeResult::resumed_session("1a2b3c4d", 4);

    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!([
            [
                ["mining.set_difficulty", "1a2b3c4d"],
                ["mining.notify", "1a2b3c4d"]
            ],
            "1a2b3c4d",
            4
        ]),
    );
}

#[test]
fn submit_five_tuple() {
    let frame = r#"{"id":4,"method":"mining.submit","params":["ckbox.1","1f","aa","19078ce1234","00000000000000000000000000b2957c"]}"#;

    let Message::Request { params, .. } = serde_json::from_str::<Message>(frame).unwrap() else {
        panic!("expected a request");
    };

    let submit: Submit = serde_json::from_value(params).unwrap();
    assert_eq!(submit.worker, "ckbox.1");
    assert_eq!(submit.job_id.parse::<JobId>().unwrap(), JobId::from(0x1f));
    assert_eq!(submit.extranonce2, Extranonce::from_hex("aa").unwrap());
    assert_eq!(u64::from(submit.ntime), 0x19078ce1234);
    assert_eq!(submit.nonce, Nonce::from(0xb2957cu128));
}

#[test]
fn notify_five_parameters() {
    let notify = Notify {
        job_id: JobId::from(3u32),
        pow_hash: "9e4452fc7aed93d7240b7b55263792befd1be09252b456401122ba71a56f62a0".into(),
        height: 12_000_000,
        target: Difficulty::from(1.0).to_target(),
        clean_jobs: false,
    };

    let params = serde_json::to_value(&notify).unwrap();
    let message = Message::notification("mining.notify", params.clone());

    let encoded = serde_json::to_value(&message).unwrap();
    assert_eq!(encoded["method"], json!("mining.notify"));
    assert_eq!(encoded["params"], params);

    let fields = params.as_array().unwrap();
    assert_eq!(fields.len(), 5);
    assert!(fields[0].is_string());
    assert!(fields[1].is_string());
    assert!(fields[2].is_u64());
    assert!(fields[3].is_string());
    assert!(fields[4].is_boolean());
}

#[test]
fn set_target_is_64_hex_chars() {
    let params = serde_json::to_value(SetTarget(Difficulty::from(16.0).to_target())).unwrap();
    let target_hex = params.as_array().unwrap()[0].as_str().unwrap();
    assert_eq!(target_hex.len(), 64);
    assert!(target_hex.parse::<Target>().is_ok());
}

#[test]
fn set_difficulty_number_forms() {
    assert_eq!(
        serde_json::to_value(SetDifficulty(Difficulty::from(8u64))).unwrap(),
        json!([8]),
    );
    assert_eq!(
        serde_json::to_value(SetDifficulty(Difficulty::from(0.001))).unwrap(),
        json!([0.001]),
    );
}

#[test]
fn share_rejection_codes() {
    let reply = Message::rejected(Id::Number(6), StratumError::LowDifficulty);
    assert_eq!(
        serde_json::to_value(&reply).unwrap(),
        json!({"id": 6, "result": false, "error": [23, "Low difficulty share", null]}),
    );

    let reply = Message::rejected(Id::Number(7), StratumError::Stale);
    assert_eq!(
        serde_json::to_value(&reply).unwrap()["error"],
        json!([21, "Stale share", null]),
    );

    let reply = Message::rejected(Id::Number(8), StratumError::NoJob);
    assert_eq!(
        serde_json::to_value(&reply).unwrap()["error"][0],
        json!(20),
    );
}

#[test]
fn upstream_error_passthrough() {
    // A pool's error array survives parse and re-serialization untouched.
    let frame = r#"{"id":105,"result":false,"error":[23,"low difficulty share (1 < 64)",null]}"#;
    let message: Message = serde_json::from_str(frame).unwrap();

    let Message::Response { id, result, error } = &message else {
        panic!("expected a response");
    };
    assert_eq!(*id, Id::Number(105));
    assert_eq!(result.clone().unwrap(), json!(false));
    assert_eq!(
        error.clone().unwrap(),
        json!([23, "low difficulty share (1 < 64)", null]),
    );
}

#[test]
fn notification_with_null_id_classified() {
    let frame = r#"{"id":null,"method":"mining.set_target","params":["00ff"]}"#;
    let message: Message = serde_json::from_str(frame).unwrap();
    assert!(matches!(message, Message::Notification { .. }));
}

#[test]
fn garbage_is_rejected_as_a_frame() {
    for frame in [r#"{"params":[]}"#, "[]", "42", r#""hi""#] {
        assert!(
            serde_json::from_str::<Message>(frame).is_err(),
            "should reject {frame}"
        );
    }

    let value: Value = serde_json::from_str(r#"{"id":1,"method":5,"params":[]}"#).unwrap();
    assert!(serde_json::from_value::<Message>(value).is_err());
}
