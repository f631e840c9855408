//! Tests for store operation and reply types.

use super::*;

#[test]
fn test_operation_names() {
    let queue = QueueName::new("jobs".to_string()).unwrap();
    let pending = QueueName::new("ack:jobs".to_string()).unwrap();

    assert_eq!(StoreOperation::Pop { queue: queue.clone() }.name(), "pop");
    assert_eq!(
        StoreOperation::Checkout {
            queue: queue.clone(),
            pending: pending.clone(),
            ttl: Duration::from_secs(1),
        }
        .name(),
        "checkout"
    );
    assert_eq!(
        StoreOperation::Acknowledge {
            pending,
            member: b"0|a".to_vec(),
            delivered_at: 1,
        }
        .name(),
        "acknowledge"
    );
    assert_eq!(
        StoreOperation::Stats {
            queue,
            pending: None
        }
        .name(),
        "stats"
    );
}

#[test]
fn test_value_kinds() {
    assert_eq!(StoreValue::Nil.kind(), "nil");
    assert_eq!(StoreValue::Integer(1).kind(), "integer");
    assert_eq!(StoreValue::Text("a".to_string()).kind(), "text");
    assert_eq!(StoreValue::Binary(vec![0xff]).kind(), "binary");
    assert_eq!(StoreValue::Array(vec![]).kind(), "array");
}

#[test]
fn test_bytes_become_text_only_when_utf8() {
    assert_eq!(
        StoreValue::from_bytes(b"job".to_vec()),
        StoreValue::Text("job".to_string())
    );
    assert_eq!(
        StoreValue::from_bytes(vec![0x6a, 0xff]),
        StoreValue::Binary(vec![0x6a, 0xff])
    );
}
