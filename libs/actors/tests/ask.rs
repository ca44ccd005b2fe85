//! Request/response semantics of `ask`.

use mycelium_actors::{
    ActorError, ActorRef, ActorSystem, Behavior, DeadLetterReason, DeadLetterRecorder,
};
use std::time::Duration;
use tokio::time::Instant;

struct Request {
    reply_to: ActorRef<u32>,
}

#[tokio::test(start_paused = true)]
async fn test_ask_times_out_no_earlier_than_deadline() {
    let system = ActorSystem::builder().build().unwrap();
    let silent = system.spawn(Behavior::<Request>::ignore(), "silent").unwrap();

    let started = Instant::now();
    let error = silent
        .ask(Duration::from_millis(10), |reply_to| Request { reply_to })
        .await
        .unwrap_err();

    assert!(error.is_timeout());
    assert!(started.elapsed() >= Duration::from_millis(10));
    match error {
        ActorError::Timeout { timeout_ms, .. } => assert_eq!(timeout_ms, 10),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_deadline_is_fixed_at_send_time() {
    let system = ActorSystem::builder().build().unwrap();
    let silent = system.spawn(Behavior::<Request>::ignore(), "silent").unwrap();

    let response = silent.ask(Duration::from_millis(10), |reply_to| Request { reply_to });
    tokio::time::sleep(Duration::from_millis(25)).await;

    let started = Instant::now();
    assert!(response.await.unwrap_err().is_timeout());
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test]
async fn test_second_reply_goes_to_dead_letters() {
    let recorder = DeadLetterRecorder::new();
    let system = ActorSystem::builder()
        .dead_letters(recorder.clone())
        .build()
        .unwrap();
    let chatty = system
        .spawn(
            Behavior::receive_message(|Request { reply_to }| {
                reply_to.tell(1);
                reply_to.tell(2);
                Ok(Behavior::same())
            }),
            "chatty",
        )
        .unwrap();

    let reply = chatty
        .ask(Duration::from_secs(1), |reply_to| Request { reply_to })
        .await
        .unwrap();
    assert_eq!(reply, 1);

    let letters = recorder.take();
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].downcast_ref::<u32>(), Some(&2));
    assert_eq!(letters[0].reason, DeadLetterReason::ReplyAlreadyCompleted);
}

#[tokio::test]
async fn test_unbounded_timeout_still_gets_reply() {
    let system = ActorSystem::builder().build().unwrap();
    let echo = system
        .spawn(
            Behavior::receive_message(|Request { reply_to }| {
                reply_to.tell(7);
                Ok(Behavior::same())
            }),
            "echo",
        )
        .unwrap();

    let reply = echo
        .ask(Duration::MAX, |reply_to| Request { reply_to })
        .await
        .unwrap();
    assert_eq!(reply, 7);
}

enum Slow {
    Hold(ActorRef<u32>),
    Release,
    Sync(ActorRef<()>),
}

#[tokio::test(start_paused = true)]
async fn test_reply_after_timeout_goes_to_dead_letters() {
    let recorder = DeadLetterRecorder::new();
    let system = ActorSystem::builder()
        .dead_letters(recorder.clone())
        .build()
        .unwrap();

    let mut held = None;
    let slow = system
        .spawn(
            Behavior::receive_message(move |message| {
                match message {
                    Slow::Hold(reply_to) => held = Some(reply_to),
                    Slow::Release => {
                        if let Some(reply_to) = held.take() {
                            reply_to.tell(42);
                        }
                    }
                    Slow::Sync(reply_to) => reply_to.tell(()),
                }
                Ok(Behavior::same())
            }),
            "slow",
        )
        .unwrap();

    let error = slow
        .ask(Duration::from_millis(10), Slow::Hold)
        .await
        .unwrap_err();
    assert!(error.is_timeout());

    slow.tell(Slow::Release);
    slow.ask(Duration::from_secs(1), Slow::Sync).await.unwrap();

    assert_eq!(recorder.take_messages::<u32>(), vec![42]);
}

#[tokio::test]
async fn test_ask_to_stopped_actor_times_out() {
    let recorder = DeadLetterRecorder::new();
    let system = ActorSystem::builder()
        .dead_letters(recorder.clone())
        .build()
        .unwrap();
    let gone = system.spawn(Behavior::<Request>::stopped(), "gone").unwrap();

    let (done, wait) = tokio::sync::oneshot::channel();
    system.watch(gone.address(), move || {
        let _ = done.send(());
    });
    wait.await.unwrap();

    let error = gone
        .ask(Duration::from_millis(20), |reply_to| Request { reply_to })
        .await
        .unwrap_err();
    assert!(error.is_timeout());
    assert_eq!(recorder.len(), 1);
}

enum Front {
    Relay(ActorRef<String>),
    Answer(Result<u32, String>, ActorRef<String>),
}

#[tokio::test]
async fn test_context_ask_adapts_reply_into_message() {
    let system = ActorSystem::builder().build().unwrap();
    let backend = system
        .spawn(
            Behavior::receive_message(|Request { reply_to }| {
                reply_to.tell(7);
                Ok(Behavior::same())
            }),
            "backend",
        )
        .unwrap();

    let front = system
        .spawn(
            Behavior::<Front>::receive(move |ctx, message| {
                match message {
                    Front::Relay(client) => ctx.ask(
                        &backend,
                        Duration::from_secs(1),
                        |reply_to| Request { reply_to },
                        move |answer| Front::Answer(answer.map_err(|e| e.to_string()), client),
                    ),
                    Front::Answer(answer, client) => client.tell(format!("{:?}", answer)),
                }
                Ok(Behavior::same())
            }),
            "front",
        )
        .unwrap();

    let reply = front
        .ask(Duration::from_secs(1), Front::Relay)
        .await
        .unwrap();
    assert_eq!(reply, "Ok(7)");
}
