//! Bulk loading of newline-delimited items.
//!
//! Each non-blank line of the stream is one item in the JSON attribute value
//! format. Lines are parsed as they are read and stored by concurrent tasks,
//! bounded by [`StorageConfig::bulk_concurrency`](crate::StorageConfig).

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{info, warn};

use magnetodb_core::ProjectId;
use magnetodb_model::error::MagnetoError;
use magnetodb_model::output::BulkLoadOutput;
use magnetodb_model::types::Item;

use crate::provider::{MagnetoProvider, store_item};

/// Most failed records echoed back in `failed_items`.
pub const MAX_FAILED_ITEMS: usize = 100;

type StoreOutcome = (String, Result<(), MagnetoError>);

impl MagnetoProvider {
    /// Handle `bulk_load`: store every record of `reader` into a table.
    ///
    /// Per-record failures are counted, never returned. Once the table stops
    /// accepting writes the remaining records are read and counted as
    /// unprocessed. A stream read error ends the load with the counts
    /// gathered so far.
    pub async fn handle_bulk_load<R>(
        &self,
        project_id: &ProjectId,
        table_name: &str,
        mut reader: R,
    ) -> Result<BulkLoadOutput, MagnetoError>
    where
        R: AsyncBufRead + Unpin,
    {
        let table = self.data_table(project_id, table_name)?;
        let max_item_size = self.config().max_item_size;
        let permits = Arc::new(Semaphore::new(self.config().bulk_concurrency.max(1)));
        let mut tasks: JoinSet<StoreOutcome> = JoinSet::new();
        let mut output = BulkLoadOutput::default();
        let mut line = Vec::new();

        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(table = %table_name, error = %e, "bulk load stream read failed");
                    let partial = String::from_utf8_lossy(&line).trim().to_owned();
                    if !partial.is_empty() {
                        output.read += 1;
                        output.last_item = Some(partial.clone());
                        record_failure(&mut output, partial, "Record truncated by a stream error");
                    }
                    break;
                }
            }
            let (record, decoded) = match std::str::from_utf8(&line) {
                Ok(text) => (text.trim().to_owned(), Ok(())),
                Err(e) => (String::from_utf8_lossy(&line).trim().to_owned(), Err(e)),
            };
            if record.is_empty() {
                continue;
            }
            output.read += 1;
            output.last_item = Some(record.clone());

            if !table.status().is_writable() {
                output.unprocessed += 1;
                continue;
            }
            if let Err(e) = decoded {
                record_failure(&mut output, record, &format!("Record is not valid UTF-8: {e}"));
                continue;
            }

            let item = match serde_json::from_str::<Item>(&record) {
                Ok(item) => item,
                Err(e) => {
                    record_failure(&mut output, record, &e.to_string());
                    continue;
                }
            };

            let permit = Arc::clone(&permits)
                .acquire_owned()
                .await
                .map_err(|e| MagnetoError::internal_error("Bulk load aborted").with_source(e))?;
            let table = Arc::clone(&table);
            tasks.spawn(async move {
                let _permit = permit;
                let result = store_item(&table, item, max_item_size);
                (record, result)
            });

            while let Some(joined) = tasks.try_join_next() {
                collect_outcome(&mut output, joined);
            }
        }

        while let Some(joined) = tasks.join_next().await {
            collect_outcome(&mut output, joined);
        }

        info!(
            table = %table_name,
            project = %project_id,
            read = output.read,
            processed = output.processed,
            failed = output.failed,
            unprocessed = output.unprocessed,
            "bulk load finished"
        );
        Ok(output)
    }
}

fn collect_outcome(output: &mut BulkLoadOutput, joined: Result<StoreOutcome, JoinError>) {
    match joined {
        Ok((_, Ok(()))) => output.processed += 1,
        Ok((record, Err(e))) => record_failure(output, record, &e.message),
        Err(e) => {
            warn!(error = %e, "bulk load task failed");
            output.failed += 1;
        }
    }
}

fn record_failure(output: &mut BulkLoadOutput, record: String, reason: &str) {
    warn!(reason, "bulk load record failed");
    output.failed += 1;
    if output.failed_items.len() < MAX_FAILED_ITEMS {
        output.failed_items.push(record);
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::Write as _;

    use magnetodb_model::input::{CreateTableInput, ScanInput};
    use magnetodb_model::types::{AttributeDefinition, AttributeType, KeySchemaElement, KeyType};

    use super::*;
    use crate::config::StorageConfig;

    fn project() -> ProjectId {
        ProjectId::default()
    }

    fn setup(config: StorageConfig) -> MagnetoProvider {
        let provider = MagnetoProvider::new(config);
        provider
            .handle_create_table(
                &project(),
                CreateTableInput {
                    table_name: Some("events".to_owned()),
                    attribute_definitions: Some(vec![AttributeDefinition {
                        attribute_name: "id".to_owned(),
                        attribute_type: AttributeType::S,
                    }]),
                    key_schema: Some(vec![KeySchemaElement {
                        attribute_name: "id".to_owned(),
                        key_type: KeyType::Hash,
                    }]),
                    local_secondary_indexes: None,
                },
            )
            .unwrap();
        provider
    }

    fn records(count: usize) -> String {
        let mut body = String::new();
        for i in 0..count {
            writeln!(body, r#"{{"id": {{"S": "e{i}"}}, "n": {{"N": "{i}"}}}}"#).unwrap();
        }
        body
    }

    fn stored(provider: &MagnetoProvider) -> usize {
        provider
            .handle_scan(&project(), "events", ScanInput::default())
            .unwrap()
            .count
    }

    #[tokio::test]
    async fn test_should_load_all_records() {
        let provider = setup(StorageConfig::default());
        let body = records(50);
        let out = provider
            .handle_bulk_load(&project(), "events", body.as_bytes())
            .await
            .unwrap();
        assert_eq!(out.read, 50);
        assert_eq!(out.processed, 50);
        assert_eq!(out.failed, 0);
        assert_eq!(out.last_item.as_deref(), Some(r#"{"id": {"S": "e49"}, "n": {"N": "49"}}"#));
        assert_eq!(stored(&provider), 50);
    }

    #[tokio::test]
    async fn test_should_count_failed_records_and_continue() {
        let provider = setup(StorageConfig {
            bulk_concurrency: 2,
            ..StorageConfig::default()
        });
        let mut lines: Vec<String> = records(10).lines().map(str::to_owned).collect();
        lines[3] = r#"{"id": {"S": "broken""#.to_owned();
        let body = lines.join("\n");
        let out = provider
            .handle_bulk_load(&project(), "events", body.as_bytes())
            .await
            .unwrap();
        assert_eq!(out.read, 10);
        assert_eq!(out.processed, 9);
        assert_eq!(out.failed, 1);
        assert_eq!(out.unprocessed, 0);
        assert_eq!(out.failed_items, vec![r#"{"id": {"S": "broken""#.to_owned()]);
    }

    #[tokio::test]
    async fn test_should_fail_records_without_key() {
        let provider = setup(StorageConfig::default());
        let body = "{\"other\": {\"S\": \"x\"}}\n\n   \n{\"id\": {\"S\": \"ok\"}}";
        let out = provider
            .handle_bulk_load(&project(), "events", body.as_bytes())
            .await
            .unwrap();
        assert_eq!(out.read, 2);
        assert_eq!(out.processed, 1);
        assert_eq!(out.failed, 1);
    }

    #[test]
    fn test_should_read_final_record_without_newline() {
        let provider = setup(StorageConfig::default());
        let out = tokio_test::block_on(provider.handle_bulk_load(
            &project(),
            "events",
            &b"{\"id\": {\"S\": \"only\"}}"[..],
        ))
        .unwrap();
        assert_eq!(out.read, 1);
        assert_eq!(out.processed, 1);
    }

    #[tokio::test]
    async fn test_should_count_unprocessed_after_table_leaves_active() {
        let provider = setup(StorageConfig::default());
        let table = provider.catalog(&project()).require_table("events").unwrap();
        let loaded = provider
            .handle_bulk_load(&project(), "events", records(3).as_bytes())
            .await
            .unwrap();
        assert_eq!(loaded.processed, 3);

        let (tx, rx) = tokio::io::duplex(64 * 1024);
        let project_id = project();
        let load = provider.handle_bulk_load(&project_id, "events", tokio::io::BufReader::new(rx));
        let feed = async move {
            use tokio::io::AsyncWriteExt;
            let mut tx = tx;
            tx.write_all(records(2).as_bytes()).await.unwrap();
            tokio::task::yield_now().await;
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            assert!(table.mark_deleting());
            tx.write_all(records(4).as_bytes()).await.unwrap();
        };
        let (out, ()) = tokio::join!(load, feed);
        let out = out.unwrap();
        assert_eq!(out.read, 6);
        assert_eq!(out.processed, 2);
        assert_eq!(out.unprocessed, 4);
        assert_eq!(out.processed + out.failed + out.unprocessed, out.read);
    }

    #[tokio::test]
    async fn test_should_fail_records_with_invalid_utf8() {
        let provider = setup(StorageConfig::default());
        let body = b"{\"id\": {\"S\": \"a\xff\"}}\n{\"id\": {\"S\": \"b\"}}\n";
        let out = provider
            .handle_bulk_load(&project(), "events", &body[..])
            .await
            .unwrap();
        assert_eq!(out.read, 2);
        assert_eq!(out.processed, 1);
        assert_eq!(out.failed, 1);
        assert_eq!(out.failed_items.len(), 1);
        assert_eq!(stored(&provider), 1);
    }

    #[tokio::test]
    async fn test_should_keep_partial_counts_when_stream_fails() {
        let provider = setup(StorageConfig::default());
        let stream = tokio_test::io::Builder::new()
            .read(records(3).as_bytes())
            .read(b"{\"id\": {\"S\": \"cut")
            .read_error(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            ))
            .build();
        let out = provider
            .handle_bulk_load(&project(), "events", tokio::io::BufReader::new(stream))
            .await
            .unwrap();
        assert_eq!(out.read, 4);
        assert_eq!(out.processed, 3);
        assert_eq!(out.failed, 1);
        assert_eq!(out.failed_items, vec![r#"{"id": {"S": "cut"#.to_owned()]);
        assert_eq!(out.processed + out.failed + out.unprocessed, out.read);
        assert_eq!(stored(&provider), 3);
    }

    #[tokio::test]
    async fn test_should_reject_missing_table() {
        let provider = setup(StorageConfig::default());
        let err = provider
            .handle_bulk_load(&project(), "nothing", &b""[..])
            .await
            .unwrap_err();
        assert_eq!(
            err.code,
            magnetodb_model::error::MagnetoErrorCode::TableNotExistsException
        );
    }
}
