//! MagnetoDB request router.
//!
//! Requests name their operation in the envelope (`"operation": "put_item"`),
//! the transport-neutral equivalent of the REST route
//! `POST /v1/data/<project>/tables/<table>/put_item`.

use magnetodb_model::error::MagnetoError;
use magnetodb_model::operations::MagnetoOperation;

/// Resolve a MagnetoDB operation from its envelope name.
pub fn resolve_operation(name: &str) -> Result<MagnetoOperation, MagnetoError> {
    MagnetoOperation::from_name(name.trim()).ok_or_else(|| MagnetoError::unknown_operation(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use magnetodb_model::error::MagnetoErrorCode;

    #[test]
    fn test_should_resolve_all_operations() {
        let ops = [
            ("create_table", MagnetoOperation::CreateTable),
            ("delete_table", MagnetoOperation::DeleteTable),
            ("describe_table", MagnetoOperation::DescribeTable),
            ("list_tables", MagnetoOperation::ListTables),
            ("put_item", MagnetoOperation::PutItem),
            ("get_item", MagnetoOperation::GetItem),
            ("update_item", MagnetoOperation::UpdateItem),
            ("delete_item", MagnetoOperation::DeleteItem),
            ("query", MagnetoOperation::Query),
            ("scan", MagnetoOperation::Scan),
            ("batch_get_item", MagnetoOperation::BatchGetItem),
            ("batch_write_item", MagnetoOperation::BatchWriteItem),
            ("bulk_load", MagnetoOperation::BulkLoad),
        ];
        for (name, expected) in ops {
            let op = resolve_operation(name).unwrap();
            assert_eq!(op, expected, "failed for operation: {name}");
        }
    }

    #[test]
    fn test_should_error_on_unknown_operation() {
        let err = resolve_operation("create_backup").unwrap_err();
        assert_eq!(err.code, MagnetoErrorCode::UnknownOperation);
        assert_eq!(err.status_code, http::StatusCode::BAD_REQUEST);
        assert!(err.message.contains("create_backup"));
    }
}
