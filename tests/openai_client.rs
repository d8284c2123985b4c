//! OpenAiBatchClient 对本地 mock vendor 的集成测试

mod mock_vendor;

use std::sync::Arc;
use std::time::Duration;

use batchrun::application::{
    ApplicationError, BatchProcessor, BatchProviderPort, JobPage, PollOptions, ProcessorSettings,
    ProviderError,
};
use batchrun::domain::{BatchId, ChatMessage, JobStatus};
use batchrun::infrastructure::{
    FileBatchStorage, OpenAiBatchClient, StorageLayout, VendorClientConfig,
};
use mock_vendor::{MockVendor, API_KEY, OUTPUT_CONTENT};

fn client(vendor: &MockVendor, api_key: &str) -> OpenAiBatchClient {
    OpenAiBatchClient::new(VendorClientConfig::new(&vendor.url, api_key).with_timeout(5)).unwrap()
}

#[tokio::test]
async fn test_full_lifecycle_against_mock_vendor() {
    let vendor = MockVendor::spawn().await;
    let temp_dir = tempfile::tempdir().unwrap();
    let processor = BatchProcessor::new(
        ProcessorSettings::new("gpt-4o-mini"),
        Arc::new(client(&vendor, API_KEY)),
        Arc::new(FileBatchStorage::new(StorageLayout::under(temp_dir.path(), "demo"))),
    );

    let tasks = processor
        .create_tasks(
            vec!["req-1".to_string(), "req-2".to_string()],
            vec![
                vec![ChatMessage::system("Be brief."), ChatMessage::user("Hi")],
                vec![ChatMessage::user("Bye")],
            ],
        )
        .unwrap();
    let batch_id = BatchId::new("20240501120000_0").unwrap();
    processor.write_batch_file(&tasks, &batch_id).await.unwrap();

    let file = processor.upload_batch_file(&batch_id).await.unwrap();
    assert_eq!(file.id, "file-abc123");

    let job = processor.create_batch_job(&file).await.unwrap();
    assert_eq!(job.id, "batch_new");
    assert_eq!(job.status, JobStatus::Validating);

    {
        let recorded = vendor.recorded.lock().unwrap();
        let upload = &recorded.uploads[0];
        assert_eq!(upload.purpose, "batch");
        assert_eq!(upload.filename, "demo_batch_job20240501120000_0.jsonl");
        let text = String::from_utf8(upload.content.clone()).unwrap();
        let lines: Vec<serde_json::Value> =
            text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["custom_id"], "req-1");
        assert_eq!(lines[0]["method"], "POST");
        assert_eq!(lines[0]["url"], "/v1/chat/completions");
        assert_eq!(lines[0]["body"]["model"], "gpt-4o-mini");
        assert_eq!(lines[0]["body"]["messages"][0]["role"], "system");

        let request = &recorded.job_requests[0];
        assert_eq!(request["input_file_id"], "file-abc123");
        assert_eq!(request["endpoint"], "/v1/chat/completions");
        assert_eq!(request["completion_window"], "24h");
        assert!(request.get("metadata").is_none());
    }

    let options = PollOptions::every(Duration::from_millis(10))
        .with_timeout(Some(Duration::from_secs(5)));
    let done = processor
        .check_batch_job_status("batch_done", &options)
        .await
        .unwrap();
    assert_eq!(done.status, JobStatus::Completed);

    let path = processor.save_job_output(&done).await.unwrap();
    assert!(path.ends_with("batch_outputs/demo_batch_output_file-out.json"));
    assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), OUTPUT_CONTENT);

    vendor.stop();
}

#[tokio::test]
async fn test_poll_times_out_on_running_job() {
    let vendor = MockVendor::spawn().await;
    let temp_dir = tempfile::tempdir().unwrap();
    let processor = BatchProcessor::new(
        ProcessorSettings::new("gpt-4o-mini"),
        Arc::new(client(&vendor, API_KEY)),
        Arc::new(FileBatchStorage::new(StorageLayout::under(temp_dir.path(), "demo"))),
    );

    let options = PollOptions::every(Duration::from_millis(20))
        .with_timeout(Some(Duration::from_millis(60)));
    let err = processor
        .check_batch_job_status("batch_running", &options)
        .await
        .unwrap_err();
    assert!(matches!(err, ApplicationError::PollTimeout { .. }));

    vendor.stop();
}

#[tokio::test]
async fn test_retrieve_cancel_and_not_found() {
    let vendor = MockVendor::spawn().await;
    let client = client(&vendor, API_KEY);

    let running = client.retrieve_job("batch_x").await.unwrap();
    assert_eq!(running.status, JobStatus::Running);
    assert_eq!(running.raw_status, "in_progress");
    assert!(running.downloadable_output().is_none());

    let cancelling = client.cancel_job("batch_x").await.unwrap();
    assert_eq!(cancelling.status, JobStatus::Cancelling);
    assert!(!cancelling.status.is_terminal());

    let missing = client.retrieve_job("batch_missing").await.unwrap_err();
    assert!(matches!(missing, ProviderError::NotFound(_)));

    let missing_file = client.download_file("file-nope").await.unwrap_err();
    assert!(matches!(missing_file, ProviderError::NotFound(_)));

    vendor.stop();
}

#[tokio::test]
async fn test_ids_stay_inside_their_path_segment() {
    let vendor = MockVendor::spawn().await;
    let client = client(&vendor, API_KEY);

    // 编码后仍落在 GET /v1/batches/:id，而不是 cancel 路由
    let job = client.retrieve_job("batch_x/cancel").await.unwrap();
    assert_eq!(job.id, "batch_x/cancel");
    assert_eq!(job.status, JobStatus::Running);

    let err = client.retrieve_job("..").await.unwrap_err();
    assert!(matches!(err, ProviderError::NotFound(_)));

    vendor.stop();
}

#[tokio::test]
async fn test_list_follows_after_cursor() {
    let vendor = MockVendor::spawn().await;
    let client = client(&vendor, API_KEY);

    let first = client
        .list_jobs(JobPage {
            limit: 2,
            cursor: None,
        })
        .await
        .unwrap();
    let ids: Vec<_> = first.jobs.iter().map(|j| j.id.as_str()).collect();
    assert_eq!(ids, vec!["batch_3", "batch_2"]);
    assert_eq!(first.next_cursor.as_deref(), Some("batch_2"));

    let second = client
        .list_jobs(JobPage {
            limit: 2,
            cursor: first.next_cursor,
        })
        .await
        .unwrap();
    assert_eq!(second.jobs[0].status, JobStatus::Failed);
    assert!(second.next_cursor.is_none());

    {
        let recorded = vendor.recorded.lock().unwrap();
        assert_eq!(recorded.list_queries[0].get("limit").map(String::as_str), Some("2"));
        assert_eq!(recorded.list_queries[1].get("after").map(String::as_str), Some("batch_2"));
    }

    vendor.stop();
}

#[tokio::test]
async fn test_wrong_key_is_unauthorized() {
    let vendor = MockVendor::spawn().await;
    let err = client(&vendor, "wrong-key")
        .retrieve_job("batch_done")
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Unauthorized(_)));

    vendor.stop();
}
