use serde_json::{Map, Value};

/// Canonical truncated column set used for CSV output.
///
/// Dotted entries are paths into nested objects (`author.userName` reads the
/// `userName` field of the `author` object). The full records keep every field
/// the service returns; this list is only the tabular projection.
pub const TRUNCATED_TWEET_FIELDS: &[&str] = &[
    // basic
    "type",
    "id",
    "url",
    "createdAt",
    "lang",
    "text",
    // stats
    "retweetCount",
    "replyCount",
    "likeCount",
    "quoteCount",
    "viewCount",
    "bookmarkCount",
    // reply
    "isReply",
    "inReplyToId",
    "inReplyToUsername",
    // author
    "author.userName",
    "author.url",
    "author.id",
    "author.isBlueVerified",
    "author.followers",
    "author.following",
];

/// Column set for followings CSV output
pub const FOLLOWING_FIELDS: &[&str] = &[
    "id",
    "userName",
    "name",
    "followers",
    "following",
    "isBlueVerified",
    "createdAt",
    "description",
    "location",
];

static NULL: Value = Value::Null;

/// Safely pluck a dotted path from a nested JSON object.
/// Returns `Value::Null` when any segment is missing or not an object.
pub fn pluck_path<'a>(value: &'a Value, path: &str) -> &'a Value {
    let mut current = value;
    for part in path.split('.') {
        match current.get(part) {
            Some(next) => current = next,
            None => return &NULL,
        }
    }
    current
}

/// Project a raw record onto the selected fields (dotted-path aware).
/// Missing fields are included with a null value; extra fields are dropped.
pub fn project_record(record: &Value, fields: &[&str]) -> Map<String, Value> {
    fields
        .iter()
        .map(|&field| (field.to_string(), pluck_path(record, field).clone()))
        .collect()
}

/// Collapse a list of raw records to the truncated schema
pub fn collapse_records(records: &[Value], fields: &[&str]) -> Vec<Map<String, Value>> {
    records.iter().map(|r| project_record(r, fields)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pluck_path_top_level() {
        let record = json!({"id": "1", "text": "hello"});
        assert_eq!(*pluck_path(&record, "id"), json!("1"));
        assert_eq!(*pluck_path(&record, "text"), json!("hello"));
    }

    #[test]
    fn test_pluck_path_nested() {
        let record = json!({
            "author": {"userName": "nelvOfficial", "followers": 1200}
        });
        assert_eq!(*pluck_path(&record, "author.userName"), json!("nelvOfficial"));
        assert_eq!(*pluck_path(&record, "author.followers"), json!(1200));
    }

    #[test]
    fn test_pluck_path_missing_is_null() {
        let record = json!({"author": {"userName": "x"}});
        assert!(pluck_path(&record, "author.followers").is_null());
        assert!(pluck_path(&record, "quoted_tweet.id").is_null());
        // A path through a non-object is also null
        assert!(pluck_path(&record, "author.userName.deep").is_null());
    }

    #[test]
    fn test_project_record_keeps_only_selected_fields() {
        let record = json!({
            "id": "42",
            "text": "hi",
            "likeCount": 7,
            "secret_internal_field": "dropped",
            "author": {"userName": "someone"}
        });

        let projected = project_record(&record, TRUNCATED_TWEET_FIELDS);

        assert_eq!(projected.len(), TRUNCATED_TWEET_FIELDS.len());
        assert_eq!(projected["id"], "42");
        assert_eq!(projected["likeCount"], 7);
        assert_eq!(projected["author.userName"], "someone");
        // Missing fields project as null, extras are gone
        assert!(projected["viewCount"].is_null());
        assert!(!projected.contains_key("secret_internal_field"));
    }

    #[test]
    fn test_collapse_records() {
        let records = vec![
            json!({"id": "1", "text": "a"}),
            json!({"id": "2", "text": "b", "likeCount": 3}),
        ];

        let collapsed = collapse_records(&records, TRUNCATED_TWEET_FIELDS);
        assert_eq!(collapsed.len(), 2);
        assert_eq!(collapsed[0]["id"], "1");
        assert_eq!(collapsed[1]["likeCount"], 3);
        assert!(collapsed[0]["likeCount"].is_null());
    }
}
