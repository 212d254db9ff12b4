//! Job lifecycle tests against a scripted generation service.

mod common;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use common::{
    asset_url, failed, result_with, running, succeeded, FailingStorage, ParamsBuilder,
    TestHarness,
};
use songloom::client::RemoteStatus;
use songloom::generation::{GenerationResult, JobStatus, ReferenceUpload, HISTORY_LIMIT};
use songloom::GenerationError;

const USER: &str = "user-1";

async fn submit(harness: &TestHarness, params: songloom::GenerationParams) -> String {
    harness
        .orchestrator
        .submit(USER, params)
        .await
        .expect("submit failed")
        .job_id
}

// ============================================================================
// Submission
// ============================================================================

#[tokio::test]
async fn test_submit_binds_remote_task() {
    let harness = TestHarness::new();
    let params = ParamsBuilder::simple("a sea shanty about rust").build();

    let submitted = harness.orchestrator.submit(USER, params.clone()).await.unwrap();
    assert_eq!(submitted.status, JobStatus::Queued);
    assert_eq!(submitted.queue_position, 1);

    let job = harness.job(&submitted.job_id);
    assert_eq!(job.user_id, USER);
    assert_eq!(job.remote_task_id.as_deref(), Some("task-1"));
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.params, params);
    assert_eq!(*harness.client.submitted.lock().unwrap(), vec![params]);
}

#[tokio::test]
async fn test_invalid_params_create_nothing() {
    let harness = TestHarness::new();

    let err = harness
        .orchestrator
        .submit(USER, ParamsBuilder::custom().title("Only a title").build())
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::Validation(_)));
    assert_eq!(
        err.to_string(),
        "Style, lyrics, or reference audio required for custom mode"
    );
    assert!(harness.orchestrator.history(USER).unwrap().is_empty());
    assert!(harness.client.submitted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_refused_submission_leaves_queued_job() {
    let harness = TestHarness::new();
    harness.client.reject_submissions();

    let err = harness
        .orchestrator
        .submit(USER, ParamsBuilder::simple("lofi beats").build())
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Submission(_)));

    let history = harness.orchestrator.history(USER).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, JobStatus::Queued);
    assert!(history[0].remote_task_id.is_none());

    // Without a remote task there is nothing to ask about.
    let view = harness
        .orchestrator
        .poll_status(&history[0].id, USER)
        .await
        .unwrap();
    assert_eq!(view.status, JobStatus::Queued);
    assert_eq!(harness.client.status_query_count(), 0);
}

// ============================================================================
// Polling
// ============================================================================

#[tokio::test]
async fn test_running_job_reports_queue_info() {
    let harness = TestHarness::new();
    let job_id = submit(&harness, ParamsBuilder::simple("jazz").build()).await;
    harness
        .client
        .script("task-1", vec![running(Some(3), Some(42.5))]);

    let view = harness.orchestrator.poll_status(&job_id, USER).await.unwrap();

    assert_eq!(view.job_id, job_id);
    assert_eq!(view.status, JobStatus::Running);
    assert_eq!(view.queue_position, Some(3));
    assert_eq!(view.eta_seconds, Some(42.5));
    assert_eq!(harness.job(&job_id).status, JobStatus::Running);
}

#[tokio::test]
async fn test_non_terminal_change_is_persisted() {
    let harness = TestHarness::new();
    let job_id = submit(&harness, ParamsBuilder::simple("jazz").build()).await;
    harness
        .client
        .script("task-1", vec![RemoteStatus::of(JobStatus::Queued)]);

    let view = harness.orchestrator.poll_status(&job_id, USER).await.unwrap();

    assert_eq!(view.status, JobStatus::Queued);
    assert_eq!(harness.job(&job_id).status, JobStatus::Queued);
}

#[tokio::test]
async fn test_unknown_and_foreign_jobs() {
    let harness = TestHarness::new();
    let job_id = submit(&harness, ParamsBuilder::simple("jazz").build()).await;

    let missing = harness.orchestrator.poll_status("nope", USER).await;
    assert!(matches!(missing, Err(GenerationError::NotFound(_))));

    let foreign = harness.orchestrator.poll_status(&job_id, "user-2").await;
    assert!(matches!(foreign, Err(GenerationError::Forbidden)));
    assert_eq!(harness.client.status_query_count(), 0);
}

#[tokio::test]
async fn test_status_query_failure_returns_stored_view() {
    let harness = TestHarness::new();
    let job_id = submit(&harness, ParamsBuilder::simple("jazz").build()).await;
    harness.client.fail_status_queries(true);

    let view = harness.orchestrator.poll_status(&job_id, USER).await.unwrap();

    assert_eq!(view.status, JobStatus::Running);
    assert!(view.queue_position.is_none());
    assert_eq!(harness.job(&job_id).status, JobStatus::Running);

    // The next successful poll picks up where we left off.
    harness.client.fail_status_queries(false);
    harness
        .client
        .script("task-1", vec![succeeded(result_with(&[asset_url("a.mp3")]))]);
    let view = harness.orchestrator.poll_status(&job_id, USER).await.unwrap();
    assert_eq!(view.status, JobStatus::Succeeded);
}

// ============================================================================
// Materialization
// ============================================================================

#[tokio::test]
async fn test_success_materializes_each_variation() {
    let harness = TestHarness::new();
    let params = ParamsBuilder::custom()
        .title("Harbor Lights")
        .style("indie folk")
        .lyrics("[Verse]\nLights on the water")
        .bpm(96)
        .build();
    let job_id = submit(&harness, params.clone()).await;

    let urls = vec![asset_url("take1.mp3"), asset_url("take2.flac")];
    harness
        .client
        .script("task-1", vec![running(Some(1), None), succeeded(result_with(&urls))]);

    let first = harness.orchestrator.poll_status(&job_id, USER).await.unwrap();
    assert_eq!(first.status, JobStatus::Running);

    let view = harness.orchestrator.poll_status(&job_id, USER).await.unwrap();
    assert_eq!(view.status, JobStatus::Succeeded);

    let songs = harness.songs_for_job(&job_id);
    assert_eq!(songs.len(), 2);
    assert_eq!(songs[0].title, "Harbor Lights (v1)");
    assert_eq!(songs[1].title, "Harbor Lights (v2)");
    assert!(songs[0].audio_url.ends_with(".mp3"));
    assert!(songs[1].audio_url.ends_with(".flac"));

    for song in &songs {
        assert_eq!(song.user_id, USER);
        assert!(song.audio_url.starts_with(&format!("/audio/{}/", USER)));
        assert!(song.audio_url.contains(&song.id));
        assert!(harness.stored_file(&song.audio_url).exists());
        assert_eq!(song.style, "indie folk");
        assert_eq!(song.caption, "indie folk");
        assert_eq!(song.lyrics, "[Verse]\nLights on the water");
        assert_eq!(song.bpm, Some(96));
        assert_eq!(song.duration, 120.0);
        assert!(song.tags.is_empty());
        assert!(song.is_public);
        assert_eq!(song.generation_params.as_ref(), Some(&params));
    }

    let result = view.result.expect("result missing");
    let stored: Vec<&str> = songs.iter().map(|s| s.audio_url.as_str()).collect();
    assert_eq!(result.audio_urls, stored);
    assert_eq!(harness.job(&job_id).result, Some(result));
    assert_eq!(harness.client.released_tasks(), vec!["task-1"]);
}

#[tokio::test]
async fn test_terminal_job_is_never_reprocessed() {
    let harness = TestHarness::new();
    let job_id = submit(&harness, ParamsBuilder::simple("ambient").build()).await;
    harness
        .client
        .script("task-1", vec![succeeded(result_with(&[asset_url("a.mp3")]))]);

    let first = harness.orchestrator.poll_status(&job_id, USER).await.unwrap();
    for _ in 0..3 {
        let again = harness.orchestrator.poll_status(&job_id, USER).await.unwrap();
        assert_eq!(again.status, JobStatus::Succeeded);
        assert_eq!(again.result, first.result);
    }

    assert_eq!(harness.client.status_query_count(), 1);
    assert_eq!(harness.client.fetch_count(), 1);
    assert_eq!(harness.song_count(USER), 1);
    assert_eq!(harness.client.released_tasks().len(), 1);
}

#[tokio::test]
async fn test_single_variation_metadata() {
    let harness = TestHarness::new();
    let params = ParamsBuilder::simple("upbeat synthpop")
        .title("Neon")
        .instrumental()
        .lyrics("should be ignored")
        .duration(90.0)
        .bpm(120)
        .key_scale("E minor")
        .build();
    let job_id = submit(&harness, params).await;
    harness.client.script(
        "task-1",
        vec![succeeded(GenerationResult {
            audio_urls: vec![asset_url("neon.wav")],
            duration: Some(87.3),
            bpm: Some(124),
            time_signature: Some("4/4".to_string()),
            ..Default::default()
        })],
    );

    harness.orchestrator.poll_status(&job_id, USER).await.unwrap();

    let songs = harness.songs_for_job(&job_id);
    assert_eq!(songs.len(), 1);
    let song = &songs[0];
    assert_eq!(song.title, "Neon");
    assert_eq!(song.lyrics, "[Instrumental]");
    assert_eq!(song.duration, 87.3);
    assert_eq!(song.bpm, Some(124));
    assert_eq!(song.key_scale.as_deref(), Some("E minor"));
    assert_eq!(song.time_signature.as_deref(), Some("4/4"));
}

#[tokio::test]
async fn test_untitled_default() {
    let harness = TestHarness::new();
    let job_id = submit(&harness, ParamsBuilder::simple("drone").build()).await;
    harness
        .client
        .script("task-1", vec![succeeded(result_with(&[asset_url("d.ogg")]))]);

    harness.orchestrator.poll_status(&job_id, USER).await.unwrap();

    assert_eq!(harness.songs_for_job(&job_id)[0].title, "Untitled");
}

#[tokio::test]
async fn test_non_audio_entries_are_skipped() {
    let harness = TestHarness::new();
    let job_id = submit(&harness, ParamsBuilder::simple("blues").build()).await;
    let urls = vec![
        asset_url("meta.json"),
        asset_url("take.wav"),
        "http://gen.test/v1/preview".to_string(),
    ];
    harness
        .client
        .script("task-1", vec![succeeded(result_with(&urls))]);

    let view = harness.orchestrator.poll_status(&job_id, USER).await.unwrap();

    let songs = harness.songs_for_job(&job_id);
    assert_eq!(songs.len(), 1);
    assert_eq!(songs[0].title, "Untitled");
    assert_eq!(view.result.unwrap().audio_urls, vec![songs[0].audio_url.clone()]);
    assert_eq!(harness.client.fetch_count(), 1);
}

#[tokio::test]
async fn test_download_failure_keeps_remote_url() {
    let harness = TestHarness::new();
    let job_id = submit(&harness, ParamsBuilder::simple("funk").build()).await;
    let broken = asset_url("broken.mp3");
    let urls = vec![asset_url("ok.mp3"), broken.clone()];
    harness.client.fail_asset(&broken);
    harness
        .client
        .script("task-1", vec![succeeded(result_with(&urls))]);

    let view = harness.orchestrator.poll_status(&job_id, USER).await.unwrap();

    let songs = harness.songs_for_job(&job_id);
    assert_eq!(songs.len(), 2);
    assert!(songs[0].audio_url.starts_with("/audio/"));
    assert_eq!(songs[1].audio_url, broken);

    let result = view.result.unwrap();
    assert_eq!(result.audio_urls[1], broken);
    assert_eq!(harness.job(&job_id).status, JobStatus::Succeeded);
}

#[tokio::test]
async fn test_storage_failure_keeps_remote_url() {
    let harness = TestHarness::with_storage(Arc::new(FailingStorage));
    let job_id = submit(&harness, ParamsBuilder::simple("funk").build()).await;
    let url = asset_url("only.mp3");
    harness
        .client
        .script("task-1", vec![succeeded(result_with(&[url.clone()]))]);

    let view = harness.orchestrator.poll_status(&job_id, USER).await.unwrap();

    assert_eq!(view.status, JobStatus::Succeeded);
    assert_eq!(harness.songs_for_job(&job_id)[0].audio_url, url);
}

#[tokio::test]
async fn test_success_without_result_creates_no_songs() {
    let harness = TestHarness::new();
    let job_id = submit(&harness, ParamsBuilder::simple("noise").build()).await;
    harness
        .client
        .script("task-1", vec![RemoteStatus::of(JobStatus::Succeeded)]);

    let view = harness.orchestrator.poll_status(&job_id, USER).await.unwrap();

    assert_eq!(view.status, JobStatus::Succeeded);
    assert!(view.result.unwrap().audio_urls.is_empty());
    assert_eq!(harness.song_count(USER), 0);
    assert_eq!(harness.job(&job_id).status, JobStatus::Succeeded);
}

#[tokio::test]
async fn test_failure_is_recorded() {
    let harness = TestHarness::new();
    let job_id = submit(&harness, ParamsBuilder::simple("metal").build()).await;
    harness
        .client
        .script("task-1", vec![failed(Some("CUDA out of memory"))]);

    let view = harness.orchestrator.poll_status(&job_id, USER).await.unwrap();
    assert_eq!(view.status, JobStatus::Failed);
    assert_eq!(view.error.as_deref(), Some("CUDA out of memory"));

    let job = harness.job(&job_id);
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("CUDA out of memory"));
    assert_eq!(harness.song_count(USER), 0);
    assert!(harness.client.released_tasks().is_empty());

    let again = harness.orchestrator.poll_status(&job_id, USER).await.unwrap();
    assert_eq!(again.error.as_deref(), Some("CUDA out of memory"));
    assert_eq!(harness.client.status_query_count(), 1);
}

#[tokio::test]
async fn test_failure_without_message() {
    let harness = TestHarness::new();
    let job_id = submit(&harness, ParamsBuilder::simple("metal").build()).await;
    harness.client.script("task-1", vec![failed(None)]);

    let view = harness.orchestrator.poll_status(&job_id, USER).await.unwrap();

    assert_eq!(view.error.as_deref(), Some("Generation failed"));
}

// ============================================================================
// Concurrent polling
// ============================================================================

#[tokio::test]
async fn test_concurrent_polls_materialize_once() {
    let harness = TestHarness::new();
    let job_id = submit(&harness, ParamsBuilder::simple("disco").build()).await;
    let urls = vec![asset_url("a.mp3"), asset_url("b.mp3")];
    harness
        .client
        .script("task-1", vec![succeeded(result_with(&urls))]);
    harness.client.delay_queries(Duration::from_millis(20));

    let (a, b, c) = tokio::join!(
        harness.orchestrator.poll_status(&job_id, USER),
        harness.orchestrator.poll_status(&job_id, USER),
        harness.orchestrator.poll_status(&job_id, USER),
    );

    for view in [a.unwrap(), b.unwrap(), c.unwrap()] {
        assert_eq!(view.status, JobStatus::Succeeded);
    }
    assert_eq!(harness.client.status_query_count(), 1);
    assert_eq!(harness.songs_for_job(&job_id).len(), 2);
    assert_eq!(harness.client.fetch_count(), 2);
    assert_eq!(harness.client.released_tasks().len(), 1);
}

#[tokio::test]
async fn test_pollers_without_shared_locks_materialize_once() {
    let harness = TestHarness::new();
    let other = harness.second_orchestrator();
    let job_id = submit(&harness, ParamsBuilder::simple("disco").build()).await;
    harness
        .client
        .script("task-1", vec![succeeded(result_with(&[asset_url("a.mp3")]))]);
    harness.client.delay_queries(Duration::from_millis(20));

    let (a, b) = tokio::join!(
        harness.orchestrator.poll_status(&job_id, USER),
        other.poll_status(&job_id, USER),
    );

    assert_eq!(a.unwrap().status, JobStatus::Succeeded);
    assert_eq!(b.unwrap().status, JobStatus::Succeeded);
    assert_eq!(harness.songs_for_job(&job_id).len(), 1);
    assert_eq!(harness.client.released_tasks().len(), 1);
}

// ============================================================================
// History and uploads
// ============================================================================

#[tokio::test]
async fn test_history_is_per_user_and_newest_first() {
    let harness = TestHarness::new();
    let first = submit(&harness, ParamsBuilder::simple("one").build()).await;
    let second = submit(&harness, ParamsBuilder::simple("two").build()).await;
    harness
        .orchestrator
        .submit("user-2", ParamsBuilder::simple("theirs").build())
        .await
        .unwrap();

    let history = harness.orchestrator.history(USER).unwrap();
    let ids: Vec<&str> = history.iter().map(|j| j.id.as_str()).collect();
    assert_eq!(ids, vec![second.as_str(), first.as_str()]);
}

#[tokio::test]
async fn test_history_is_capped() {
    let harness = TestHarness::new();
    for i in 0..(HISTORY_LIMIT + 5) {
        submit(&harness, ParamsBuilder::simple(&format!("song {}", i)).build()).await;
    }

    let history = harness.orchestrator.history(USER).unwrap();
    assert_eq!(history.len(), HISTORY_LIMIT as usize);
}

#[tokio::test]
async fn test_reference_upload_is_stored() {
    let harness = TestHarness::new();

    let stored = harness
        .orchestrator
        .upload_reference(
            USER,
            ReferenceUpload {
                filename: Some("hum.wav".to_string()),
                mime_type: Some("audio/wav".to_string()),
                bytes: Bytes::from_static(b"RIFF"),
            },
        )
        .await
        .unwrap();

    assert!(stored.key.starts_with(&format!("references/{}/", USER)));
    assert!(stored.key.ends_with(".wav"));
    assert_eq!(stored.url, format!("/audio/{}", stored.key));
    assert_eq!(
        std::fs::read(harness.storage_root().join(&stored.key)).unwrap(),
        b"RIFF"
    );
}

#[tokio::test]
async fn test_reference_upload_rejects_non_audio() {
    let harness = TestHarness::new();

    let err = harness
        .orchestrator
        .upload_reference(
            USER,
            ReferenceUpload {
                filename: Some("notes.txt".to_string()),
                mime_type: Some("text/plain".to_string()),
                bytes: Bytes::from_static(b"hello"),
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::Validation(_)));
    assert!(!harness.storage_root().join("references").exists());
}
