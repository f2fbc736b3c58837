mod common;

use common::*;
use shift_reflect::model::ShareStatus;
use shift_reflect::share::{ShareError, ShareGate};
use shift_reflect::store::StoreError;

fn schedule() -> FakeSheet {
    FakeSheet::new(vec![eligible(0)], vec![day(8, 25), day(8, 26), day(8, 27), day(8, 28)])
}

#[tokio::test]
async fn only_complete_unshared_dates_are_shared() {
    let sheet = schedule();
    let gate = ShareGate::new(sheet.shared());
    gate.set_complete(day(8, 25), true).await.unwrap();
    gate.set_complete(day(8, 27), true).await.unwrap();

    let summary = gate.share_completed().await.unwrap();
    assert_eq!(summary.shared, vec![day(8, 25), day(8, 27)]);
    assert!(summary.failed.is_empty());
    assert_eq!(sheet.date_state(day(8, 25)).await, (true, ShareStatus::Shared));
    assert_eq!(sheet.date_state(day(8, 26)).await, (false, ShareStatus::NotShared));

    // already shared dates are left alone
    let again = gate.share_completed().await.unwrap();
    assert!(again.is_empty());
}

#[tokio::test]
async fn reopened_dates_are_not_shared() {
    let sheet = schedule();
    let gate = ShareGate::new(sheet.shared());
    gate.set_complete(day(8, 26), true).await.unwrap();
    gate.set_complete(day(8, 26), false).await.unwrap();
    assert!(gate.share_completed().await.unwrap().is_empty());
}

#[tokio::test]
async fn one_failed_date_does_not_stop_the_rest() {
    let sheet = schedule();
    for d in [day(8, 25), day(8, 26), day(8, 27)] {
        sheet.complete(d).await;
    }
    sheet.fail(Fail::DateFlag(day(8, 26))).await;

    let summary = ShareGate::new(sheet.shared()).share_completed().await.unwrap();
    assert_eq!(summary.shared, vec![day(8, 25), day(8, 27)]);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].date, day(8, 26));
    assert_eq!(sheet.date_state(day(8, 26)).await, (true, ShareStatus::NotShared));

    // the failed date is picked up once the store recovers
    sheet.heal(&Fail::DateFlag(day(8, 26))).await;
    let retry = ShareGate::new(sheet.shared()).share_completed().await.unwrap();
    assert_eq!(retry.shared, vec![day(8, 26)]);
}

#[tokio::test]
async fn unreadable_date_list_aborts() {
    let sheet = schedule();
    sheet.complete(day(8, 25)).await;
    sheet.fail(Fail::DateList).await;
    let err = ShareGate::new(sheet.shared()).share_completed().await.unwrap_err();
    assert!(matches!(err, ShareError::DateList(_)));
    assert_eq!(sheet.date_state(day(8, 25)).await, (true, ShareStatus::NotShared));
}

#[tokio::test]
async fn completing_an_unknown_date_is_not_found() {
    let sheet = schedule();
    let err = ShareGate::new(sheet.shared())
        .set_complete(day(9, 1), true)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ShareError::Flag { source: StoreError::NotFound { what: "schedule date", .. }, .. }
    ));
}
