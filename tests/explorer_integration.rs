//! Integration tests for the recursive explorer
//!
//! These run the full plan → search → distill → recurse loop against the
//! deterministic backends in `common`.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{recording_observer, url_for, StubExtraction, StubSearch, SHARED_LEARNING};
use deep_explorer::research::ExplorerSettings;
use deep_explorer::{Config, ExplorationRequest, ExploreError, Explorer};

fn explorer(
    search: Arc<StubSearch>,
    extraction: Arc<StubExtraction>,
    concurrency: usize,
) -> Explorer {
    let settings = ExplorerSettings {
        concurrency_limit: concurrency,
        ..ExplorerSettings::default()
    };
    Explorer::new(search, extraction, settings)
}

#[tokio::test]
async fn test_breadth_four_depth_two() {
    let search = Arc::new(StubSearch::new());
    let extraction = Arc::new(StubExtraction::new());
    let explorer = explorer(search.clone(), extraction.clone(), 2);
    let (observer, seen) = recording_observer();

    let result = explorer
        .explore(ExplorationRequest::new("rust async runtimes", 4, 2), Some(observer))
        .await
        .unwrap();

    // 4 top-level branches, each recursing once with breadth 2
    let executed = search.executed();
    assert_eq!(executed.len(), 12);
    assert!(executed.contains(&"root.3".to_string()));
    assert!(executed.contains(&"root.3.2".to_string()));

    let mut maxima = extraction.planned_maxima();
    maxima.sort_unstable();
    assert_eq!(maxima, vec![2, 2, 2, 2, 4]);

    // 12 query-specific learnings plus one shared by all
    assert_eq!(result.learnings.len(), 13);
    assert_eq!(result.visited_sources.len(), 12);
    assert_eq!(
        result.learnings.iter().filter(|l| l.as_str() == SHARED_LEARNING).count(),
        1
    );
    assert!(result.visited_sources.contains(&url_for("root.4.1")));

    let seen = seen.lock().unwrap();
    let last = seen.last().unwrap();
    assert_eq!(last.total_queries, 12);
    assert_eq!(last.completed_queries, 12);
    assert!(last.is_complete());
}

#[tokio::test]
async fn test_breadth_halves_at_every_level() {
    let search = Arc::new(StubSearch::new());
    let extraction = Arc::new(StubExtraction::new());
    let explorer = explorer(search.clone(), extraction.clone(), 3);

    explorer
        .explore(ExplorationRequest::new("topic", 3, 3), None)
        .await
        .unwrap();

    // depth 3: one plan of 3, three plans of 2, six plans of 1
    let maxima = extraction.planned_maxima();
    assert_eq!(maxima.iter().filter(|m| **m == 3).count(), 1);
    assert_eq!(maxima.iter().filter(|m| **m == 2).count(), 3);
    assert_eq!(maxima.iter().filter(|m| **m == 1).count(), 6);
    assert_eq!(search.executed().len(), 3 + 6 + 6);
}

#[tokio::test]
async fn test_completed_never_exceeds_total() {
    let search = Arc::new(StubSearch::failing(&["root.2", "root.1.1"]));
    let extraction = Arc::new(StubExtraction::new());
    let explorer = explorer(search.clone(), extraction, 2);
    let (observer, seen) = recording_observer();

    explorer
        .explore(ExplorationRequest::new("topic", 3, 2), Some(observer))
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert!(!seen.is_empty());
    assert!(seen.iter().all(|s| s.completed_queries <= s.total_queries));

    let last = seen.last().unwrap();
    assert_eq!(last.completed_queries, search.executed().len());
    assert_eq!(last.completed_queries, last.total_queries);
}

#[tokio::test]
async fn test_failing_branch_does_not_affect_siblings() {
    let search = Arc::new(StubSearch::failing(&["root.1"]));
    let extraction = Arc::new(StubExtraction::new());
    let explorer = explorer(search.clone(), extraction, 2);
    let (observer, seen) = recording_observer();

    let result = explorer
        .explore(ExplorationRequest::new("topic", 3, 1), Some(observer))
        .await
        .unwrap();

    assert!(!result.learnings.contains("learning from root.1"));
    assert!(result.learnings.contains("learning from root.2"));
    assert!(result.learnings.contains("learning from root.3"));
    assert!(!result.visited_sources.contains(&url_for("root.1")));

    let last = seen.lock().unwrap().last().cloned().unwrap();
    assert_eq!(last.completed_queries, 3);
}

#[tokio::test]
async fn test_nested_planning_failure_is_contained() {
    let search = Arc::new(StubSearch::new());
    let extraction = Arc::new(StubExtraction::failing_plans(&["root.1"]));
    let explorer = explorer(search, extraction, 2);

    let result = explorer
        .explore(ExplorationRequest::new("topic", 2, 2), None)
        .await
        .unwrap();

    assert!(!result.learnings.contains("learning from root.1"));
    assert!(result.learnings.contains("learning from root.2"));
    assert!(result.learnings.contains("learning from root.2.1"));
}

#[tokio::test]
async fn test_initial_planning_failure_propagates() {
    let search = Arc::new(StubSearch::new());
    let extraction = Arc::new(StubExtraction::failing_plans(&["root"]));
    let explorer = explorer(search.clone(), extraction, 2);

    let err = explorer
        .explore(ExplorationRequest::new("topic", 2, 2), None)
        .await
        .unwrap_err();

    assert!(matches!(err, ExploreError::Planning(_)));
    assert!(search.executed().is_empty());
}

#[tokio::test]
async fn test_depth_zero_runs_single_round() {
    let search = Arc::new(StubSearch::new());
    let extraction = Arc::new(StubExtraction::new());
    let explorer = explorer(search.clone(), extraction.clone(), 2);

    let result = explorer
        .explore(ExplorationRequest::new("topic", 3, 0), None)
        .await
        .unwrap();

    assert_eq!(extraction.planned_maxima(), vec![3]);
    assert_eq!(search.executed().len(), 3);
    assert_eq!(result.learnings.len(), 4);
}

#[tokio::test]
async fn test_dedupe_is_idempotent_across_runs() {
    let run = || async {
        let explorer = explorer(Arc::new(StubSearch::new()), Arc::new(StubExtraction::new()), 2);
        explorer
            .explore(ExplorationRequest::new("topic", 2, 2), None)
            .await
            .unwrap()
    };

    let first = run().await;
    let second = run().await;

    let mut first_learnings: Vec<_> = first.learnings.into_iter().collect();
    let mut second_learnings: Vec<_> = second.learnings.into_iter().collect();
    first_learnings.sort();
    second_learnings.sort();
    assert_eq!(first_learnings, second_learnings);
    assert_eq!(first.visited_sources.len(), second.visited_sources.len());
}

#[tokio::test]
async fn test_concurrency_bound_within_level() {
    let search = Arc::new(StubSearch::new().with_delay(Duration::from_millis(20)));
    let extraction = Arc::new(StubExtraction::new());
    let explorer = explorer(search.clone(), extraction, 2);

    explorer
        .explore(ExplorationRequest::new("topic", 6, 1), None)
        .await
        .unwrap();

    assert_eq!(search.executed().len(), 6);
    assert_eq!(search.max_in_flight.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_seeded_context_is_kept() {
    let explorer = explorer(Arc::new(StubSearch::new()), Arc::new(StubExtraction::new()), 2);
    let request = ExplorationRequest::new("topic", 1, 1)
        .with_context(vec!["prior".to_string()], vec!["https://prior.test".to_string()]);

    let result = explorer.explore(request, None).await.unwrap();

    assert_eq!(result.learnings.first().map(String::as_str), Some("prior"));
    assert!(result.visited_sources.contains("https://prior.test"));
}

#[tokio::test]
async fn test_all_branches_failing_yields_empty_result() {
    let search = Arc::new(StubSearch::failing(&["root.1", "root.2"]));
    let explorer = explorer(search, Arc::new(StubExtraction::new()), 2);

    let result = explorer
        .explore(ExplorationRequest::new("topic", 2, 1), None)
        .await
        .unwrap();

    assert!(result.is_empty());
}

#[tokio::test]
async fn test_config_char_budget_reaches_distiller() {
    let extraction = Arc::new(StubExtraction::new());
    let config = Config {
        content_char_budget: 7,
        ..Config::default()
    };
    let explorer = Explorer::from_config(Arc::new(StubSearch::new()), extraction.clone(), &config);

    explorer
        .explore(ExplorationRequest::new("topic", 1, 1), None)
        .await
        .unwrap();

    let prompts = extraction.prompts.lock().unwrap();
    let distill = prompts
        .iter()
        .find(|p| p.contains("<query>root.1</query>"))
        .unwrap();
    assert!(!distill.contains("content for root.1"));
}
