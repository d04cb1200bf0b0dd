use super::*;
use crate::repositories::Fault;
use crate::services::error::ErrorKind;
use crate::test_support::{self, ReviewFixture};

fn upload(name: &str, content: &str) -> FileUpload {
    FileUpload { file_name: name.to_string(), bytes: content.as_bytes().to_vec() }
}

#[tokio::test]
async fn submitted_answer_starts_as_an_ungraded_draft() {
    let fx = ReviewFixture::new().await;
    let lifecycle = fx.lifecycle();

    let detail = lifecycle.submit(&fx.student, &fx.task.id, "  42 ", Vec::new()).await.unwrap();
    assert_eq!(detail.answer.text, "42");
    assert_eq!(detail.answer.status, AnswerStatus::Draft);
    assert_eq!(detail.answer.grade, UNGRADED);
    assert!(detail.files.is_empty());
    assert!(detail.capabilities.allows(Operation::RequestReview));

    let answer = lifecycle.request_review(&fx.student, &detail.answer.id).await.unwrap();
    assert_eq!(answer.status, AnswerStatus::AwaitingReview);
    assert!(answer.review_requested);
}

#[tokio::test]
async fn finalize_closes_every_open_request() {
    let fx = ReviewFixture::new().await;
    let lifecycle = fx.lifecycle();
    lifecycle.request_review(&fx.student, &fx.answer.id).await.unwrap();
    fx.assign(&fx.participant).await;

    let answer = lifecycle.finalize(&fx.author, &fx.answer.id, 87, false).await.unwrap();
    assert_eq!(answer.status, AnswerStatus::Reviewed);
    assert_eq!(answer.grade, 87);
    assert!(!answer.allow_resubmit);
    assert!(!answer.review_requested);

    let requests = fx.store.list_review_requests_for_answer(&fx.answer.id).await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests.iter().all(|request| request.completed));

    let sink = fx.sink.clone();
    let expected = format!("status:{}:reviewed", fx.answer.id);
    test_support::wait_for(|| sink.events().contains(&expected)).await;
}

#[tokio::test]
async fn retry_reopens_the_answer_for_the_student() {
    let fx = ReviewFixture::new().await;
    let lifecycle = fx.lifecycle();
    fx.assign(&fx.participant).await;
    lifecycle.finalize(&fx.author, &fx.answer.id, 87, false).await.unwrap();

    let error = lifecycle.edit(&fx.student, &fx.answer.id, "43", None).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Forbidden);

    let answer = lifecycle.allow_retry(&fx.author, &fx.answer.id).await.unwrap();
    assert_eq!(answer.status, AnswerStatus::ResubmitAllowed);
    assert_eq!(answer.grade, UNGRADED);
    assert!(answer.allow_resubmit);
    let requests = fx.store.list_review_requests_for_answer(&fx.answer.id).await.unwrap();
    assert!(requests.iter().all(|request| !request.completed));

    let detail = lifecycle.edit(&fx.student, &fx.answer.id, "43", None).await.unwrap();
    assert_eq!(detail.answer.status, AnswerStatus::Draft);
    assert_eq!(detail.answer.text, "43");
}

#[tokio::test]
async fn finalize_checks_the_actor_before_the_grade() {
    let fx = ReviewFixture::new().await;
    let lifecycle = fx.lifecycle();

    let error = lifecycle.finalize(&fx.student, &fx.answer.id, 500, false).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Forbidden);

    for grade in [-1, 101] {
        let error = lifecycle.finalize(&fx.author, &fx.answer.id, grade, false).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Invalid, "{grade}");
    }
    assert_eq!(fx.reload_answer().await.version, fx.answer.version);

    let error = lifecycle.finalize(&fx.author, "missing", 50, false).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn resubmit_flag_keeps_a_reviewed_answer_editable() {
    let fx = ReviewFixture::new().await;
    let lifecycle = fx.lifecycle();
    lifecycle.finalize(&fx.author, &fx.answer.id, 60, true).await.unwrap();

    let detail = lifecycle.edit(&fx.student, &fx.answer.id, "better", None).await.unwrap();
    assert_eq!(detail.answer.status, AnswerStatus::Draft);
    assert_eq!(detail.answer.grade, UNGRADED);
    assert!(detail.answer.allow_resubmit);
}

#[tokio::test]
async fn only_the_student_changes_their_answer() {
    let fx = ReviewFixture::new().await;
    let lifecycle = fx.lifecycle();

    for actor in [&fx.author, &fx.admin, &fx.participant, &fx.outsider] {
        let error = lifecycle.edit(actor, &fx.answer.id, "x", None).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Forbidden, "{}", actor.login);
        let error = lifecycle.request_review(actor, &fx.answer.id).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Forbidden, "{}", actor.login);
        let error = lifecycle.delete(actor, &fx.answer.id).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Forbidden, "{}", actor.login);
    }
    let error = lifecycle.allow_retry(&fx.student, &fx.answer.id).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn outsiders_cannot_submit_or_read() {
    let fx = ReviewFixture::new().await;
    let lifecycle = fx.lifecycle();

    let error = lifecycle.submit(&fx.outsider, &fx.task.id, "hi", Vec::new()).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Forbidden);
    let error = lifecycle.detail(&fx.outsider, &fx.answer.id).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Forbidden);

    let detail = lifecycle.detail(&fx.participant, &fx.answer.id).await.unwrap();
    assert!(!detail.capabilities.allows(Operation::Edit));
    assert!(!detail.capabilities.allows(Operation::AddComment));
}

#[tokio::test]
async fn replacing_files_swaps_rows_and_releases_old_blobs() {
    let fx = ReviewFixture::with_files(&[("main.py", "print(1)\n"), ("notes.md", "# notes\n")])
        .await;
    let lifecycle = fx.lifecycle();
    let old = fx.store.list_answer_files(&fx.answer.id).await.unwrap();

    let detail = lifecycle
        .edit(&fx.student, &fx.answer.id, "v2", Some(vec![upload("main.py", "print(2)\n")]))
        .await
        .unwrap();

    assert_eq!(detail.files.len(), 1);
    assert_eq!(detail.files[0].file_name, "main.py");
    assert_eq!(detail.files[0].position, 0);
    assert!(old.iter().all(|file| file.id != detail.files[0].id));
    for file in &old {
        assert!(!fx.blobs.contains(&file.relative_path), "{}", file.file_name);
    }
    assert!(fx.blobs.contains(&detail.files[0].relative_path));

    let preview = lifecycle.preview(&fx.student, &fx.answer.id, "main.py").await.unwrap();
    assert_eq!(preview.content.as_deref(), Some("print(2)\n"));
}

#[tokio::test]
async fn text_only_edit_keeps_existing_files() {
    let fx = ReviewFixture::with_files(&[("main.py", "print(1)\n")]).await;

    let detail = fx.lifecycle().edit(&fx.student, &fx.answer.id, "v2", None).await.unwrap();
    assert_eq!(detail.files.len(), 1);
    assert!(fx.blobs.contains(&detail.files[0].relative_path));
}

#[tokio::test]
async fn failed_upload_leaves_the_answer_untouched() {
    let fx = ReviewFixture::with_files(&[("main.py", "print(1)\n")]).await;
    let lifecycle = fx.lifecycle();
    let before = fx.reload_answer().await;
    let blobs_before = fx.blobs.len();
    fx.blobs.fail_saves_after(1);

    let error = lifecycle
        .edit(
            &fx.student,
            &fx.answer.id,
            "v2",
            Some(vec![upload("a.py", "a\n"), upload("b.py", "b\n")]),
        )
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Unavailable);

    let after = fx.reload_answer().await;
    assert_eq!(after.version, before.version);
    assert_eq!(after.text, before.text);
    let files = fx.store.list_answer_files(&fx.answer.id).await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].file_name, "main.py");
    assert_eq!(fx.blobs.len(), blobs_before);
}

#[tokio::test]
async fn rejected_file_rows_do_not_reset_the_answer() {
    let fx = ReviewFixture::with_files(&[("main.py", "print(1)\n")]).await;
    let lifecycle = fx.lifecycle();
    lifecycle.request_review(&fx.student, &fx.answer.id).await.unwrap();
    let before = fx.reload_answer().await;
    let blobs_before = fx.blobs.len();
    fx.store.inject(Fault::FileInsert).await;

    let error = lifecycle
        .edit(&fx.student, &fx.answer.id, "v2", Some(vec![upload("a.py", "a\n")]))
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Internal);

    let after = fx.reload_answer().await;
    assert_eq!(after.status, AnswerStatus::AwaitingReview);
    assert_eq!(after.version, before.version);
    assert_eq!(after.text, before.text);
    let files = fx.store.list_answer_files(&fx.answer.id).await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].file_name, "main.py");
    assert_eq!(fx.blobs.len(), blobs_before);
}

#[tokio::test]
async fn upload_limits_are_enforced() {
    let fx = ReviewFixture::new().await;
    let lifecycle = fx.lifecycle();
    let limits = test_support::UPLOAD_LIMITS;

    let duplicate = vec![upload("main.py", "a"), upload("dir/main.py", "b")];
    let oversized = vec![FileUpload {
        file_name: "big.txt".into(),
        bytes: vec![b'x'; limits.max_file_bytes as usize + 1],
    }];
    let crowded: Vec<FileUpload> =
        (0..=limits.max_files).map(|index| upload(&format!("f{index}.txt"), "x")).collect();

    for uploads in [duplicate, oversized, crowded] {
        let error = lifecycle.submit(&fx.student, &fx.task.id, "", uploads).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Invalid);
    }
    assert!(fx.blobs.is_empty());
    assert_eq!(fx.store.list_answers_for_task(&fx.task.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn task_listing_depends_on_the_role() {
    let fx = ReviewFixture::new().await;
    let lifecycle = fx.lifecycle();
    lifecycle.submit(&fx.participant, &fx.task.id, "mine", Vec::new()).await.unwrap();

    let own = lifecycle.list_for_task(&fx.student, &fx.task.id).await.unwrap();
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].answer.id, fx.answer.id);
    assert_eq!(own[0].student_login, fx.student.login);

    assert_eq!(lifecycle.list_for_task(&fx.author, &fx.task.id).await.unwrap().len(), 2);
    assert_eq!(lifecycle.list_for_task(&fx.admin, &fx.task.id).await.unwrap().len(), 2);
    let error = lifecycle.list_for_task(&fx.outsider, &fx.task.id).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn delete_removes_rows_and_blobs() {
    let fx = ReviewFixture::with_files(&[("main.py", "print(1)\n")]).await;
    let lifecycle = fx.lifecycle();
    let files = fx.store.list_answer_files(&fx.answer.id).await.unwrap();

    lifecycle.delete(&fx.student, &fx.answer.id).await.unwrap();
    assert!(fx.store.find_answer(&fx.answer.id).await.unwrap().is_none());
    assert!(fx.store.list_answer_files(&fx.answer.id).await.unwrap().is_empty());
    assert!(!fx.blobs.contains(&files[0].relative_path));

    let error = lifecycle.detail(&fx.student, &fx.answer.id).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn preview_of_an_unknown_file_is_not_found() {
    let fx = ReviewFixture::with_files(&[("main.py", "print(1)\n")]).await;
    let error = fx.lifecycle().preview(&fx.author, &fx.answer.id, "other.py").await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::NotFound);
}
