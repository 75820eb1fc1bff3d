//! Ordering of concurrent turns within and across sessions.

use super::fakes::{is_verify_request, FakeLlm, Harness, KeywordIndex};
use crate::service::QaService;
use docqa_core::AppError;
use futures::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Echoes the question back as the draft; "(slow)" questions take longer.
fn echo_llm() -> FakeLlm {
    FakeLlm::new(|request| {
        if is_verify_request(request) {
            Ok("VERDICT: supported\nANSWER: ok".to_string())
        } else {
            Ok(format!("HNSW answer to: {}", current_question(&request.prompt)))
        }
    })
    .with_delay(|request| {
        if request.prompt.contains("(slow)") {
            Duration::from_millis(150)
        } else {
            Duration::ZERO
        }
    })
}

fn current_question(prompt: &str) -> &str {
    prompt
        .lines()
        .find_map(|line| line.strip_prefix("Current question: "))
        .unwrap_or("first")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_turns_commit_in_initiation_order() {
    let service = Harness::default().service(
        Arc::new(echo_llm()),
        Arc::new(KeywordIndex::hnsw()),
    );
    let session_id = service.new_session();

    let questions = [
        "HNSW one (slow)",
        "HNSW two",
        "HNSW three (slow)",
        "HNSW four",
        "HNSW five",
    ];
    let answers = join_all(
        questions
            .iter()
            .map(|q| service.answer_conversational(q, Some(&session_id))),
    )
    .await;

    let numbers: Vec<usize> = answers
        .into_iter()
        .map(|a| a.unwrap().turn_number)
        .collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5]);

    let history = service.get_history(&session_id).unwrap();
    let recorded: Vec<&str> = history.turns.iter().map(|t| t.question.as_str()).collect();
    assert_eq!(recorded, questions);
    for (i, turn) in history.turns.iter().enumerate() {
        assert_eq!(turn.index, i + 1);
    }
}

#[tokio::test]
async fn test_failed_turn_does_not_block_successors() {
    let llm = FakeLlm::new(|request| {
        if request.prompt.contains("explode") {
            Err(AppError::Llm("502 Bad Gateway".to_string()))
        } else if is_verify_request(request) {
            Ok("VERDICT: supported\nANSWER: ok".to_string())
        } else {
            Ok("HNSW builds a layered graph.".to_string())
        }
    })
    .with_delay(|request| {
        if request.prompt.contains("explode") {
            Duration::from_millis(30)
        } else {
            Duration::ZERO
        }
    });
    let service = Harness::default().service(Arc::new(llm), Arc::new(KeywordIndex::hnsw()));
    let session_id = service.new_session();

    let (failed, succeeded) = tokio::join!(
        service.answer_conversational("HNSW explode", Some(&session_id)),
        service.answer_conversational("HNSW layers", Some(&session_id)),
    );

    assert!(matches!(failed, Err(AppError::Generation(_))));
    let succeeded = succeeded.unwrap();
    assert_eq!(succeeded.turn_number, 1);
    assert!(!succeeded.history_used);

    let history = service.get_history(&session_id).unwrap();
    assert_eq!(history.total_turns, 1);
    assert_eq!(history.turns[0].question, "HNSW layers");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sessions_do_not_wait_on_each_other() {
    let service = Arc::new(Harness::default().service(
        Arc::new(echo_llm()),
        Arc::new(KeywordIndex::hnsw()),
    ));
    let slow_session = service.new_session();
    let fast_session = service.new_session();

    let slow = {
        let service = Arc::clone(&service);
        let session_id = slow_session.clone();
        tokio::spawn(async move {
            service
                .answer_conversational("HNSW slow one (slow)", Some(&session_id))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    let fast = service
        .answer_conversational("HNSW quick one", Some(&fast_session))
        .await
        .unwrap();
    assert_eq!(fast.turn_number, 1);
    assert!(!slow.is_finished(), "fast session waited on the slow one");

    assert_eq!(slow.await.unwrap().unwrap().turn_number, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_spawned_turns_are_contiguous() {
    let service: Arc<QaService> = Arc::new(Harness::default().service(
        Arc::new(echo_llm()),
        Arc::new(KeywordIndex::hnsw()),
    ));
    let session_id = service.new_session();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = Arc::clone(&service);
            let session_id = session_id.clone();
            let question = if i % 3 == 0 {
                format!("HNSW question {} (slow)", i)
            } else {
                format!("HNSW question {}", i)
            };
            tokio::spawn(async move {
                service
                    .answer_conversational(&question, Some(&session_id))
                    .await
            })
        })
        .collect();

    let mut numbers = BTreeSet::new();
    for handle in handles {
        numbers.insert(handle.await.unwrap().unwrap().turn_number);
    }
    assert_eq!(numbers, (1..=8).collect::<BTreeSet<_>>());

    let history = service.get_history(&session_id).unwrap();
    let questions: BTreeSet<&str> = history.turns.iter().map(|t| t.question.as_str()).collect();
    assert_eq!(questions.len(), 8);
    assert!(history
        .turns
        .iter()
        .enumerate()
        .all(|(i, turn)| turn.index == i + 1));
}
