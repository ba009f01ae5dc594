use crate::error::StorageError;
use crate::schema;
use crate::twitter::{FetchResult, FollowingsResult};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Flat-file cache layer: raw JSON responses under `<data_dir>/jsons`,
/// flattened CSV projections under `<data_dir>/csvs`.
pub struct Storage {
    data_dir: PathBuf,
}

impl Storage {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn json_dir(&self) -> PathBuf {
        self.data_dir.join("jsons")
    }

    fn csv_dir(&self) -> PathBuf {
        self.data_dir.join("csvs")
    }

    /// Strip characters that don't belong in a file name
    fn sanitize_handle(username: &str) -> String {
        username.trim().trim_start_matches('@').to_string()
    }

    pub fn tweets_json_path(&self, username: &str) -> PathBuf {
        self.json_dir()
            .join(format!("tweets_{}.json", Self::sanitize_handle(username)))
    }

    pub fn followings_json_path(&self, username: &str) -> PathBuf {
        self.json_dir()
            .join(format!("followings_{}.json", Self::sanitize_handle(username)))
    }

    pub fn tweets_csv_path(&self, username: &str) -> PathBuf {
        self.csv_dir()
            .join(format!("tweets_{}.csv", Self::sanitize_handle(username)))
    }

    pub fn followings_csv_path(&self, username: &str) -> PathBuf {
        self.csv_dir()
            .join(format!("followings_{}.csv", Self::sanitize_handle(username)))
    }

    /// Cache a fetched tweet batch as raw JSON; returns the written path
    pub fn save_tweets(
        &self,
        username: &str,
        result: &FetchResult,
    ) -> Result<PathBuf, StorageError> {
        let path = self.tweets_json_path(username);
        let value = serde_json::to_value(result).map_err(|e| StorageError::InvalidCache {
            path: path.display().to_string(),
            source: e,
        })?;
        self.write_json(&path, &value)?;
        Ok(path)
    }

    /// Cache a followings batch as raw JSON; returns the written path
    pub fn save_followings(
        &self,
        username: &str,
        result: &FollowingsResult,
    ) -> Result<PathBuf, StorageError> {
        let path = self.followings_json_path(username);
        let value = serde_json::to_value(result).map_err(|e| StorageError::InvalidCache {
            path: path.display().to_string(),
            source: e,
        })?;
        self.write_json(&path, &value)?;
        Ok(path)
    }

    /// Load a JSON cache if present; `None` when the file doesn't exist
    pub fn load_json(&self, path: &Path) -> Result<Option<Value>, StorageError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path).map_err(|e| StorageError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let value = serde_json::from_str(&content).map_err(|e| StorageError::InvalidCache {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(Some(value))
    }

    /// Write a flattened CSV projection of tweet records; returns the path
    pub fn write_tweets_csv(
        &self,
        username: &str,
        result: &FetchResult,
    ) -> Result<PathBuf, StorageError> {
        let path = self.tweets_csv_path(username);
        let records: Vec<Value> = result
            .tweets
            .iter()
            .filter_map(|t| serde_json::to_value(t).ok())
            .collect();
        self.write_csv(&path, &records, schema::TRUNCATED_TWEET_FIELDS)?;
        Ok(path)
    }

    /// Write a flattened CSV projection of followings records; returns the path
    pub fn write_followings_csv(
        &self,
        username: &str,
        result: &FollowingsResult,
    ) -> Result<PathBuf, StorageError> {
        let path = self.followings_csv_path(username);
        let records: Vec<Value> = result
            .followings
            .iter()
            .filter_map(|f| serde_json::to_value(f).ok())
            .collect();
        self.write_csv(&path, &records, schema::FOLLOWING_FIELDS)?;
        Ok(path)
    }

    fn write_json(&self, path: &Path, value: &Value) -> Result<(), StorageError> {
        self.ensure_parent(path)?;
        let content =
            serde_json::to_string_pretty(value).map_err(|e| StorageError::InvalidCache {
                path: path.display().to_string(),
                source: e,
            })?;
        fs::write(path, content).map_err(|e| StorageError::Write {
            path: path.display().to_string(),
            source: e,
        })?;
        info!("Wrote JSON cache: {}", path.display());
        Ok(())
    }

    fn write_csv(
        &self,
        path: &Path,
        records: &[Value],
        fields: &[&str],
    ) -> Result<(), StorageError> {
        self.ensure_parent(path)?;

        let mut out = String::new();
        out.push_str(
            &fields
                .iter()
                .map(|f| csv_escape(f))
                .collect::<Vec<_>>()
                .join(","),
        );
        out.push('\n');

        for record in records {
            let row = fields
                .iter()
                .map(|&field| csv_escape(&csv_cell(schema::pluck_path(record, field))))
                .collect::<Vec<_>>()
                .join(",");
            out.push_str(&row);
            out.push('\n');
        }

        fs::write(path, out).map_err(|e| StorageError::Write {
            path: path.display().to_string(),
            source: e,
        })?;
        info!("Wrote CSV ({} rows): {}", records.len(), path.display());
        Ok(())
    }

    fn ensure_parent(&self, path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                debug!("Creating data directory: {}", parent.display());
                fs::create_dir_all(parent).map_err(|e| StorageError::CreateDir {
                    path: parent.display().to_string(),
                    source: e,
                })?;
            }
        }
        Ok(())
    }
}

/// Render a JSON value as a single CSV cell. Nulls become empty cells;
/// nested structures are embedded as compact JSON.
fn csv_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// RFC 4180 style quoting: quote when the field contains a comma, quote,
/// or line break, and double any embedded quotes.
fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
