use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::config::ConfigMap;

// === Page globals ===

/// The `POOLVR` global embedded in every rendered page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../src/generated/")]
pub struct PoolvrGlobal {
    #[ts(type = "Record<string, unknown>")]
    pub config: ConfigMap,
    pub version: String,
}

// === Client -> Server ===

/// Form body of `POST /log`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../src/generated/")]
pub struct LogForm {
    pub msg: String,
}

/// Form body of `POST /write` when the payload is plain text.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../src/generated/")]
pub struct WriteTextForm {
    pub text: String,
}

// === Server -> Client ===

/// Reply to `POST /log`. `status` is always 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../src/generated/")]
pub struct LogResponse {
    pub status: i32,
}

impl LogResponse {
    pub fn ok() -> Self {
        Self { status: 0 }
    }
}

/// Reply to `POST /write`: either the absolute path written or an error message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../src/generated/")]
#[serde(untagged)]
pub enum WriteResponse {
    Written { filename: String },
    Failed { error: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn write_response_wire_shapes() {
        let ok = WriteResponse::Written {
            filename: "/srv/saves/a.json".into(),
        };
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"filename": "/srv/saves/a.json"})
        );

        let err = WriteResponse::Failed {
            error: "invalid file name".into(),
        };
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({"error": "invalid file name"})
        );
    }

    #[test]
    fn write_response_parses_either_shape() {
        let parsed: WriteResponse = serde_json::from_str(r#"{"error":"boom"}"#).unwrap();
        assert_eq!(
            parsed,
            WriteResponse::Failed {
                error: "boom".into()
            }
        );
    }

    #[test]
    fn log_response_is_status_zero() {
        let json = serde_json::to_string(&LogResponse::ok()).unwrap();
        assert_eq!(json, r#"{"status":0}"#);
    }

    #[test]
    fn poolvr_global_nests_config_and_version() {
        let mut config = ConfigMap::new();
        config.insert("gravity".into(), json!(9.8));
        let global = PoolvrGlobal {
            config,
            version: "0.1.0dev".into(),
        };
        let value = serde_json::to_value(&global).unwrap();
        assert_eq!(value["config"]["gravity"], json!(9.8));
        assert_eq!(value["version"], "0.1.0dev");
    }
}
