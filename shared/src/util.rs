/// Current UTC timestamp in milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// New auto document id (uuid v4, simple form)
pub fn new_doc_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_ids_are_unique() {
        let a = new_doc_id();
        let b = new_doc_id();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }
}
