//! Raw JSON dumps of completion traffic for debugging.
//!
//! Enabled by `dump_queries = true` under `[logging]`. Each exchange writes
//! `./logs/queries/{timestamp}-{provider}-{model}.request.json` and a matching
//! `.response.json`. Credentials are never part of the dumped body. Write
//! failures only warn.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::Value;
use tracing::warn;

const QUERY_DIR: &str = "./logs/queries";

/// Pairs the request dump with its response.
pub struct QueryDump {
    dir: PathBuf,
    stem: String,
}

impl QueryDump {
    /// Dump the request JSON and return a handle for the paired response.
    pub async fn request(provider: &str, model: &str, value: &Value) -> Option<Self> {
        Self::request_in(Path::new(QUERY_DIR), provider, model, value).await
    }

    async fn request_in(dir: &Path, provider: &str, model: &str, value: &Value) -> Option<Self> {
        let timestamp = Utc::now().format("%Y%m%d-%H%M%S%.3f");
        let stem = format!("{}-{}-{}", timestamp, provider, sanitize_model(model));

        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            warn!("dump_queries: failed to create dir: {}", e);
            return None;
        }

        let dump = Self {
            dir: dir.to_path_buf(),
            stem,
        };
        write_json(&dump.path("request"), value).await;
        Some(dump)
    }

    /// Dump the response JSON next to the earlier request.
    pub async fn response(&self, value: &Value) {
        write_json(&self.path("response"), value).await;
    }

    // Appended rather than set with `with_extension`: the stem holds dots.
    fn path(&self, kind: &str) -> PathBuf {
        self.dir.join(format!("{}.{}.json", self.stem, kind))
    }
}

/// Sanitize a model name for safe use in filenames.
fn sanitize_model(model: &str) -> String {
    model
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

async fn write_json(path: &Path, value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(json_str) => {
            if let Err(e) = tokio::fs::write(path, json_str).await {
                warn!("dump_queries: failed to write {}: {}", path.display(), e);
            }
        }
        Err(e) => {
            warn!("dump_queries: failed to serialize: {}", e);
        }
    }
}
