//! Fallback retrieval tests
//!
//! Drives `FallbackRetriever` with a scripted fetcher and checks which calls
//! are made, in which pass, and what ends up in the report.

mod helpers;

use echo_etl::models::OrgScope;
use echo_etl::services::FallbackRetriever;
use helpers::{data_element_group, indicator, periods, row, Scripted, ScriptedFetcher};
use std::sync::Arc;
use std::time::Duration;

fn retriever(fetcher: &Arc<ScriptedFetcher>, concurrency: usize) -> FallbackRetriever {
    FallbackRetriever::new(fetcher.clone(), OrgScope::new("OUG1"), concurrency)
}

#[tokio::test]
async fn test_only_starved_sources_are_queried_coarsely() {
    // A has a row every month; B only ever publishes quarterly
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .rows("202301", "A", "a", 1)
            .rows("202302", "A", "a", 1)
            .rows("202303", "A", "a", 1)
            .rows("2023Q1", "A", "a_q", 5)
            .rows("2023Q1", "B", "b_q", 2),
    );
    let fine = periods(&["202301", "202302", "202303"]);
    let coarse = periods(&["2023Q1"]);

    let report = retriever(&fetcher, 4)
        .retrieve_with_fallback(&fine, &coarse, &[indicator("A"), indicator("B")])
        .await;

    assert_eq!(report.starved, vec!["B".to_string()]);
    assert_eq!(fetcher.calls_for("A"), ["202301", "202302", "202303"]);
    assert_eq!(fetcher.calls_for("B"), ["202301", "202302", "202303", "2023Q1"]);

    assert_eq!(report.fine.count_for("A"), 3);
    assert_eq!(report.fine.count_for("B"), 0);
    let coarse_pass = report.coarse.as_ref().unwrap();
    assert_eq!(coarse_pass.calls, 1);
    assert_eq!(coarse_pass.count_for("B"), 2);
    assert_eq!(report.row_count(), 5);

    // A's quarterly aggregate must never appear
    let rows = report.into_rows();
    assert!(rows.iter().all(|r| !r.data.starts_with("a_q")));
    assert_eq!(rows.iter().filter(|r| r.period == "2023Q1").count(), 2);
}

#[tokio::test]
async fn test_no_coarse_pass_when_every_source_has_fine_rows() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .rows("202301", "A", "a", 2)
            .rows("202302", "B", "b", 1),
    );
    let report = retriever(&fetcher, 2)
        .retrieve_with_fallback(
            &periods(&["202301", "202302"]),
            &periods(&["2023Q1"]),
            &[indicator("A"), indicator("B")],
        )
        .await;

    assert!(report.starved.is_empty());
    assert!(report.coarse.is_none());
    assert!(fetcher.calls().iter().all(|(p, _)| p != "2023Q1"));
    assert_eq!(report.row_count(), 3);
}

#[tokio::test]
async fn test_failed_fine_calls_count_as_no_data() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .on("202301", "A", Scripted::Fail)
            .on("202302", "A", Scripted::Fail)
            .rows("2023Q1", "A", "a_q", 1),
    );
    let report = retriever(&fetcher, 2)
        .retrieve_with_fallback(
            &periods(&["202301", "202302"]),
            &periods(&["2023Q1"]),
            &[indicator("A")],
        )
        .await;

    assert_eq!(report.fine.failures.len(), 2);
    assert_eq!(report.failure_count(), 2);
    assert_eq!(report.starved, vec!["A".to_string()]);
    assert_eq!(report.row_count(), 1);
}

#[tokio::test]
async fn test_partial_failure_keeps_source_out_of_fallback() {
    // One failed month does not make a source starved if another month has rows
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .on("202301", "A", Scripted::Fail)
            .rows("202302", "A", "a", 1),
    );
    let report = retriever(&fetcher, 1)
        .retrieve_with_fallback(
            &periods(&["202301", "202302"]),
            &periods(&["2023Q1"]),
            &[indicator("A")],
        )
        .await;

    assert!(report.coarse.is_none());
    assert_eq!(report.fine.failures.len(), 1);
    assert_eq!(report.row_count(), 1);
}

#[tokio::test]
async fn test_headers_with_zero_rows_are_starved() {
    let fetcher = Arc::new(
        ScriptedFetcher::new().on("202301", "A", Scripted::Rows(vec![])),
    );
    let report = retriever(&fetcher, 1)
        .retrieve_with_fallback(&periods(&["202301"]), &periods(&["2023Q1"]), &[indicator("A")])
        .await;

    assert_eq!(report.fine.empty, 0);
    assert_eq!(report.starved, vec!["A".to_string()]);
}

#[tokio::test]
async fn test_concurrency_bound_is_respected() {
    let fetcher = Arc::new(ScriptedFetcher::new().with_delay(Duration::from_millis(20)));
    let sources: Vec<_> = (0..6).map(|i| indicator(&format!("S{}", i))).collect();

    let report = retriever(&fetcher, 3)
        .collect_pass(&periods(&["202301", "202302"]), &sources, "fine")
        .await;

    assert_eq!(report.calls, 12);
    assert_eq!(fetcher.calls().len(), 12);
    assert!(fetcher.max_in_flight() <= 3, "max in flight {}", fetcher.max_in_flight());
    assert!(fetcher.max_in_flight() >= 2);
}

#[tokio::test]
async fn test_fine_pass_drains_before_coarse_pass_starts() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .with_delay(Duration::from_millis(5))
            .rows("202303", "A", "a", 1),
    );
    let fine = periods(&["202301", "202302", "202303"]);
    let sources = [indicator("A"), indicator("B"), indicator("C")];

    let report = retriever(&fetcher, 4)
        .retrieve_with_fallback(&fine, &periods(&["2023Q1"]), &sources)
        .await;

    assert_eq!(report.starved, vec!["B".to_string(), "C".to_string()]);
    let calls = fetcher.calls();
    let first_coarse = calls.iter().position(|(p, _)| p == "2023Q1").unwrap();
    assert_eq!(first_coarse, 9);
    assert_eq!(calls.len(), 11);
}

#[tokio::test]
async fn test_rows_come_back_in_call_order() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .with_delay(Duration::from_millis(2))
            .rows("202301", "A", "a1_", 1)
            .rows("202301", "B", "b1_", 1)
            .rows("202302", "A", "a2_", 1)
            .rows("202302", "B", "b2_", 1),
    );
    let report = retriever(&fetcher, 4)
        .collect_pass(&periods(&["202301", "202302"]), &[indicator("A"), indicator("B")], "fine")
        .await;

    let data: Vec<_> = report.rows.iter().map(|r| r.data.as_str()).collect();
    assert_eq!(data, ["a1_0", "b1_0", "a2_0", "b2_0"]);
}

#[tokio::test]
async fn test_data_element_rows_carry_category_option_combo() {
    let fetcher = Arc::new(ScriptedFetcher::new().rows("202301", "D", "de", 2));
    let report = retriever(&fetcher, 1)
        .collect_pass(&periods(&["202301"]), &[data_element_group("D")], "fine")
        .await;

    assert_eq!(report.rows.len(), 2);
    assert!(report
        .rows
        .iter()
        .all(|r| r.category_option_combo.as_deref() == Some("coc1")));
}

#[tokio::test]
async fn test_mismatched_batch_is_kept_unnamed() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .rows("202301", "A", "a", 1)
            .on(
                "202302",
                "A",
                Scripted::Custom(
                    row(&["pe", "dx", "ou", "value"]),
                    vec![row(&["202302", "a", "ou1", "1"])],
                ),
            ),
    );
    let report = retriever(&fetcher, 1)
        .collect_pass(&periods(&["202301", "202302"]), &[indicator("A")], "fine")
        .await;

    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.schema_errors.len(), 1);
    assert_eq!(report.unnamed_batches.len(), 1);
    assert_eq!(report.unnamed_batches[0].rows[0][0], "202302");
    // Raw rows still count toward the source
    assert_eq!(report.count_for("A"), 2);
}

#[tokio::test]
async fn test_empty_inputs_make_no_calls() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let retriever = retriever(&fetcher, 2);

    let no_periods = retriever
        .retrieve_with_fallback(&[], &periods(&["2023Q1"]), &[indicator("A")])
        .await;
    // With no fine periods every source is starved
    assert_eq!(no_periods.starved, vec!["A".to_string()]);

    let no_sources = retriever
        .retrieve_with_fallback(&periods(&["202301"]), &periods(&["2023Q1"]), &[])
        .await;
    assert_eq!(no_sources.row_count(), 0);
    assert!(no_sources.coarse.is_none());

    assert_eq!(fetcher.calls(), vec![("2023Q1".to_string(), "A".to_string())]);
}

#[test]
fn test_zero_concurrency_is_raised_to_one() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    assert_eq!(retriever(&fetcher, 0).concurrency(), 1);
}
