mod common;

use chrono::Duration;
use common::*;
use shift_reflect::clock::SystemClock;
use shift_reflect::directory::{DirectoryError, MemberDirectory};
use shift_reflect::model::{
    Member, MemberFlag, ReflectStatus, Slot, SubmitStatus, Submission, WishStatus,
};
use shift_reflect::reflect::{ReflectError, ReflectionOrchestrator};
use std::sync::Arc;

fn orchestrator(sheet: &FakeSheet, cap: usize) -> ReflectionOrchestrator {
    ReflectionOrchestrator::new(sheet.shared(), parser(), builder(), cap)
}

fn directory(sheet: &FakeSheet) -> MemberDirectory {
    MemberDirectory::new(sheet.shared(), Arc::new(SystemClock), Duration::seconds(300))
}

fn available_slots(grid: &[Slot]) -> Vec<usize> {
    grid.iter()
        .enumerate()
        .filter(|(_, s)| s.is_available())
        .map(|(i, _)| i)
        .collect()
}

#[tokio::test]
async fn batch_cap_takes_members_in_roster_order() {
    let roster: Vec<Member> = (0..50).rev().map(eligible).collect();
    let dates = vec![day(8, 25), day(8, 26)];
    let sheet = FakeSheet::new(roster, dates);
    let orch = orchestrator(&sheet, 15);
    let mut dir = directory(&sheet);

    let first = orch.run_once(&mut dir).await.unwrap();
    assert_eq!(first.eligible, 50);
    assert_eq!(first.processed, 15);
    assert_eq!(first.records_written, 30);
    assert_eq!(first.deferred, 35);
    assert!(first.failed.is_empty());
    assert!(!first.is_complete());

    let reflected: Vec<_> = sheet
        .flags()
        .await
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    assert_eq!(reflected, (0..15).map(id).collect::<Vec<_>>());

    let second = orch.run_once(&mut dir).await.unwrap();
    assert_eq!(second.eligible, 35);
    assert_eq!(second.processed, 15);
    assert_eq!(second.deferred, 20);
    assert_eq!(sheet.member(&id(29)).await.unwrap().reflect_status, ReflectStatus::Reflected);
    assert_eq!(sheet.member(&id(30)).await.unwrap().reflect_status, ReflectStatus::NotReflected);
}

#[tokio::test]
async fn only_checked_unreflected_submissions_are_touched() {
    let roster = vec![
        eligible(0),
        member(1, SubmitStatus::Submitted, false, ReflectStatus::NotReflected),
        member(2, SubmitStatus::NotSubmitted, true, ReflectStatus::NotReflected),
        member(3, SubmitStatus::Submitted, true, ReflectStatus::Reflected),
    ];
    let sheet = FakeSheet::new(roster, vec![day(8, 25)]);
    let summary = orchestrator(&sheet, 15)
        .run_once(&mut directory(&sheet))
        .await
        .unwrap();

    assert_eq!(summary.eligible, 1);
    assert_eq!(summary.processed, 1);
    assert!(summary.is_complete());
    let written = sheet.written().await;
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].member_id, id(0));
    assert_eq!(
        sheet.flags().await,
        vec![(id(0), MemberFlag::Reflect(ReflectStatus::Reflected))]
    );
}

#[tokio::test]
async fn grids_follow_submissions_and_defaults() {
    let dates = vec![day(8, 25), day(8, 26), day(8, 27), day(8, 28)];
    let sheet = FakeSheet::new(vec![eligible(0)], dates.clone());
    sheet.submit(&id(0), dates[0], available("9:00", "12:00", "late bus")).await;
    sheet.submit(&id(0), dates[1], available("指定なし", "", "")).await;
    sheet.submit(&id(0), dates[2], available("9am", "10:00", "")).await;
    // dates[3] has no row at all

    let summary = orchestrator(&sheet, 15)
        .run_once(&mut directory(&sheet))
        .await
        .unwrap();
    assert_eq!(summary.records_written, 4);

    let written = sheet.written().await;
    let on = |d: chrono::NaiveDate| written.iter().find(|r| r.date == d).unwrap();

    let r = on(dates[0]);
    assert_eq!(available_slots(&r.grid), (2..8).collect::<Vec<_>>());
    assert_eq!((r.start_label.as_str(), r.end_label.as_str()), ("9:00", "12:00"));
    assert_eq!(r.note, "late bus");

    let r = on(dates[1]);
    assert_eq!(available_slots(&r.grid).len(), 28);
    assert_eq!((r.start_label.as_str(), r.end_label.as_str()), ("full", "full"));

    let r = on(dates[2]);
    assert_eq!(available_slots(&r.grid), vec![0, 1, 2, 3]);
    assert_eq!(r.start_label, "error");

    let r = on(dates[3]);
    assert!(available_slots(&r.grid).is_empty());
    assert_eq!(r.grid.len(), 28);
    assert_eq!(r.note, "");
    assert_eq!((r.start_label.as_str(), r.end_label.as_str()), ("", ""));
}

#[tokio::test]
async fn unavailable_wish_keeps_the_note() {
    let sheet = FakeSheet::new(vec![eligible(0)], vec![day(8, 25)]);
    let submission = Submission {
        wish_status: WishStatus::Unavailable,
        raw_start: Some("9:00".into()),
        raw_end: Some("12:00".into()),
        note: "exam week".into(),
    };
    sheet.submit(&id(0), day(8, 25), submission).await;

    orchestrator(&sheet, 15)
        .run_once(&mut directory(&sheet))
        .await
        .unwrap();
    let written = sheet.written().await;
    assert!(written[0].grid.iter().all(|s| *s == Slot::Unavailable));
    assert_eq!(written[0].note, "exam week");
    assert_eq!(written[0].start_label, "");
}

#[tokio::test]
async fn rerunning_a_member_rewrites_identical_records() {
    let dates = vec![day(8, 25), day(8, 26)];
    let sheet = FakeSheet::new(vec![eligible(0)], dates.clone());
    sheet.submit(&id(0), dates[0], available("10:00", "15:30", "x")).await;
    let orch = orchestrator(&sheet, 15);
    let mut dir = directory(&sheet);

    orch.run_once(&mut dir).await.unwrap();
    let before = sheet.written().await;

    sheet.set_roster(vec![eligible(0)]).await;
    orch.run_once(&mut dir).await.unwrap();
    assert_eq!(sheet.written().await, before);
}

#[tokio::test]
async fn a_failing_date_leaves_only_that_member_unreflected() {
    let dates = vec![day(8, 25), day(8, 26), day(8, 27)];
    let sheet = FakeSheet::new(vec![eligible(0), eligible(1), eligible(2)], dates.clone());
    sheet.fail(Fail::Write(id(1), dates[1])).await;

    let summary = orchestrator(&sheet, 15)
        .run_once(&mut directory(&sheet))
        .await
        .unwrap();

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.records_written, 8);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].member_id, id(1));
    assert_eq!(summary.failed[0].date, Some(dates[1]));
    assert_eq!(summary.failed_members(), 1);
    assert!(!summary.is_complete());

    assert_eq!(sheet.member(&id(1)).await.unwrap().reflect_status, ReflectStatus::NotReflected);
    assert_eq!(sheet.member(&id(2)).await.unwrap().reflect_status, ReflectStatus::Reflected);
    let member1_dates: Vec<_> = sheet
        .written()
        .await
        .into_iter()
        .filter(|r| r.member_id == id(1))
        .map(|r| r.date)
        .collect();
    assert_eq!(member1_dates, vec![dates[0], dates[2]]);

    // next run retries the member
    sheet.heal(&Fail::Write(id(1), dates[1])).await;
    let summary = orchestrator(&sheet, 15)
        .run_once(&mut directory(&sheet))
        .await
        .unwrap();
    assert_eq!(summary.eligible, 1);
    assert!(summary.is_complete());
}

#[tokio::test]
async fn read_failure_is_isolated_like_a_write_failure() {
    let sheet = FakeSheet::new(vec![eligible(0), eligible(1)], vec![day(8, 25)]);
    sheet.fail(Fail::Submission(id(0), day(8, 25))).await;
    let summary = orchestrator(&sheet, 15)
        .run_once(&mut directory(&sheet))
        .await
        .unwrap();
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed[0].member_id, id(0));
}

#[tokio::test]
async fn status_flip_failure_is_reported_without_a_date() {
    let sheet = FakeSheet::new(vec![eligible(0)], vec![day(8, 25)]);
    sheet.fail(Fail::Flag(id(0))).await;
    let summary = orchestrator(&sheet, 15)
        .run_once(&mut directory(&sheet))
        .await
        .unwrap();
    assert_eq!(summary.processed, 0);
    assert_eq!(summary.records_written, 1);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].date, None);
}

#[tokio::test]
async fn roster_failure_aborts_before_any_write() {
    let sheet = FakeSheet::new(vec![eligible(0)], vec![day(8, 25)]);
    sheet.fail(Fail::Roster).await;
    let err = orchestrator(&sheet, 15)
        .run_once(&mut directory(&sheet))
        .await
        .unwrap_err();
    assert!(matches!(err, ReflectError::Directory(DirectoryError::Unreadable(_))));
    assert!(sheet.written().await.is_empty());
    assert!(sheet.flags().await.is_empty());
}

#[tokio::test]
async fn date_list_failure_aborts_before_any_write() {
    let sheet = FakeSheet::new(vec![eligible(0)], vec![day(8, 25)]);
    sheet.fail(Fail::DateList).await;
    let err = orchestrator(&sheet, 15)
        .run_once(&mut directory(&sheet))
        .await
        .unwrap_err();
    assert!(matches!(err, ReflectError::DateList(_)));
    assert!(sheet.written().await.is_empty());
}

#[tokio::test]
async fn no_dates_defers_everyone() {
    let sheet = FakeSheet::new(vec![eligible(0), eligible(1)], Vec::new());
    let summary = orchestrator(&sheet, 15)
        .run_once(&mut directory(&sheet))
        .await
        .unwrap();
    assert_eq!(summary.processed, 0);
    assert_eq!(summary.deferred, 2);
    assert!(!summary.is_complete());
    assert!(sheet.flags().await.is_empty());
}

#[tokio::test]
async fn reflection_always_reloads_the_roster() {
    let sheet = FakeSheet::new(vec![eligible(0)], vec![day(8, 25)]);
    let orch = orchestrator(&sheet, 15);
    let mut dir = directory(&sheet);
    dir.load(false).await.unwrap();
    assert_eq!(sheet.roster_reads().await, 1);

    orch.run_once(&mut dir).await.unwrap();
    assert_eq!(sheet.roster_reads().await, 2);
}

#[test]
fn record_for_is_pure() {
    let sheet = FakeSheet::default();
    let orch = orchestrator(&sheet, 1);
    let m = eligible(4);
    let s = available("21:00", "23:00", "closing");
    let a = orch.record_for(&m, day(8, 25), &s);
    let b = orch.record_for(&m, day(8, 25), &s);
    assert_eq!(a, b);
    assert_eq!(available_slots(&a.grid), vec![26, 27]);
    assert_eq!(a.end_label, "23:00");
}

#[tokio::test]
async fn second_run_without_a_reset_writes_nothing() {
    let sheet = FakeSheet::new(vec![eligible(0), eligible(1)], vec![day(8, 25), day(8, 26)]);
    sheet.submit(&id(0), day(8, 25), available("9:00", "12:00", "")).await;
    let orch = orchestrator(&sheet, 15);
    let mut dir = directory(&sheet);

    let first = orch.run_once(&mut dir).await.unwrap();
    assert_eq!(first.records_written, 4);
    let written = sheet.written().await;
    let flags = sheet.flags().await;

    let second = orch.run_once(&mut dir).await.unwrap();
    assert_eq!(second.eligible, 0);
    assert_eq!(second.records_written, 0);
    assert_eq!(sheet.written().await, written);
    assert_eq!(sheet.flags().await.len(), flags.len());
}
