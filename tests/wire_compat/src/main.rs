fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use chunkyard_protocol::{
        CancelUploadResponse, CompleteUploadRequest, CompleteUploadResponse, InitUploadRequest,
        InitUploadResponse, UploadChunkRequest, UploadChunkResponse, UploadScope, UploadStatus,
        UploadStatusResponse,
    };

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Normalizes JSON values so that integer-valued floats compare equal.
    ///
    /// The browser client sends `40` where Rust serializes `40.0`.
    fn normalize_value(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Number(n) => {
                if let Some(f) = n.as_f64() {
                    serde_json::json!(f)
                } else {
                    v.clone()
                }
            }
            serde_json::Value::Object(map) => {
                let normalized: serde_json::Map<String, serde_json::Value> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), normalize_value(v)))
                    .collect();
                serde_json::Value::Object(normalized)
            }
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(normalize_value).collect())
            }
            _ => v.clone(),
        }
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values (order-independent, float-normalized comparison).
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            normalize_value(&fixture),
            normalize_value(&reserialized),
            "roundtrip mismatch for {name}:\n  client: {fixture}\n  Rust:   {reserialized}"
        );
        parsed
    }

    // --- Requests ---

    #[test]
    fn fixture_init_upload_request() {
        let req = roundtrip_test::<InitUploadRequest>("init_upload_request.json");
        assert_eq!(req.scope().unwrap(), UploadScope::Project("6f1c2b".into()));
    }

    #[test]
    fn fixture_init_upload_request_minimal() {
        let req = roundtrip_test::<InitUploadRequest>("init_upload_request_minimal.json");
        assert!(req.file_type.is_none());
        assert_eq!(req.scope().unwrap(), UploadScope::Temporary);
    }

    #[test]
    fn fixture_upload_chunk_request() {
        let req = roundtrip_test::<UploadChunkRequest>("upload_chunk_request.json");
        assert_eq!(req.chunk_index, 3);
    }

    #[test]
    fn fixture_complete_upload_request() {
        let req = roundtrip_test::<CompleteUploadRequest>("complete_upload_request.json");
        assert_eq!(req.chunks.len(), 5);
    }

    // --- Responses ---

    #[test]
    fn fixture_init_upload_response() {
        roundtrip_test::<InitUploadResponse>("init_upload_response.json");
    }

    #[test]
    fn fixture_upload_chunk_response() {
        roundtrip_test::<UploadChunkResponse>("upload_chunk_response.json");
    }

    #[test]
    fn fixture_complete_upload_response() {
        roundtrip_test::<CompleteUploadResponse>("complete_upload_response.json");
    }

    #[test]
    fn fixture_upload_status_response() {
        let resp = roundtrip_test::<UploadStatusResponse>("upload_status_response.json");
        assert_eq!(resp.status, UploadStatus::Initialized);
        assert_eq!(resp.missing_chunks, vec![1, 2, 4]);
    }

    #[test]
    fn fixture_cancel_upload_response() {
        roundtrip_test::<CancelUploadResponse>("cancel_upload_response.json");
    }

    // --- Lenient decoding of older clients ---

    #[test]
    fn complete_request_without_chunk_list() {
        let json = r#"{"uploadId":"u1","fileName":"a.txt"}"#;
        let req: CompleteUploadRequest = serde_json::from_str(json).unwrap();
        assert!(req.chunks.is_empty(), "missing chunks should default to empty");
    }

    #[test]
    fn chunk_request_without_checksum() {
        let json = r#"{"uploadId":"u1","chunkIndex":0}"#;
        let req: UploadChunkRequest = serde_json::from_str(json).unwrap();
        assert!(req.checksum.is_none());
    }

    #[test]
    fn chunk_response_without_duplicate_flag() {
        let json = r#"{"chunkIndex":0,"chunkSize":3,"accepted":true,"message":"ok"}"#;
        let resp: UploadChunkResponse = serde_json::from_str(json).unwrap();
        assert!(!resp.duplicate, "missing duplicate should default to false");
    }

    #[test]
    fn negative_chunk_index_decodes() {
        let json = r#"{"uploadId":"u1","chunkIndex":-1}"#;
        let req: UploadChunkRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.chunk_index, -1, "range checks belong to the session");
    }

    #[test]
    fn empty_scope_ids_mean_temporary() {
        let json = r#"{"fileName":"a","totalSize":1,"chunkSize":1,"totalChunks":1,"projectId":"","folderId":""}"#;
        let req: InitUploadRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.scope().unwrap(), UploadScope::Temporary);
    }
}
