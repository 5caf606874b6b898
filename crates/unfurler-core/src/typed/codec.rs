//! JobCodec - job レコードと property store の文字列値の相互変換
//!
//! # 保存形式
//! - レコード: key `job#<trigger id>`、値は JobRecord の JSON
//! - パラメータ: JSON 文字列としてレコード内に入れ子で保存
//!   （broker はパラメータの形を知らない）

use serde::Serialize;
use thiserror::Error;

use crate::domain::{JobRecord, TriggerId};

pub const RECORD_PREFIX: &str = "job#";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

pub struct JobCodec;

impl JobCodec {
    pub fn record_key(id: TriggerId) -> String {
        format!("{RECORD_PREFIX}{id}")
    }

    pub fn encode_record(record: &JobRecord) -> Result<String, CodecError> {
        serde_json::to_string(record).map_err(|source| CodecError::Encode {
            what: "job record",
            source,
        })
    }

    pub fn decode_record(value: &str) -> Result<JobRecord, CodecError> {
        serde_json::from_str(value).map_err(|source| CodecError::Decode {
            what: "job record",
            source,
        })
    }

    pub fn encode_parameter<P: Serialize + ?Sized>(parameter: &P) -> Result<String, CodecError> {
        serde_json::to_string(parameter).map_err(|source| CodecError::Encode {
            what: "job parameter",
            source,
        })
    }

    pub fn decode_parameter(value: &str) -> Result<serde_json::Value, CodecError> {
        serde_json::from_str(value).map_err(|source| CodecError::Decode {
            what: "job parameter",
            source,
        })
    }
}
