//! End-to-end runs of the catalog chains against scripted runtimes.

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::agent::{AgentInvoker, AgentReply, MockAgentRuntime};
    use crate::cancellation::CancellationToken;
    use crate::catalog::{nutrition_chain, training_chain, training_ids};
    use crate::errors::{ErrorKind, RuntimeError};
    use crate::events::{event_types, CollectingEventSink};
    use crate::pipeline::{JitterStrategy, Orchestrator, PipelineContext, RetryPolicy, RunOptions};
    use crate::plan::CoverageRules;
    use crate::testing::{k1_output, questionnaire, stub_output, ScriptedAgentRuntime};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::default()
            .with_base_delay_ms(1)
            .with_max_delay_ms(5)
    }

    fn training(runtime: &Arc<ScriptedAgentRuntime>) -> Orchestrator {
        let registry = training_chain(&CoverageRules::default()).unwrap();
        Orchestrator::new(Arc::new(registry), AgentInvoker::new(runtime.clone()))
            .with_retry_policy(fast_policy())
    }

    fn input_of(runtime: &ScriptedAgentRuntime, stage_id: &str, call: usize) -> Value {
        let requests = runtime.requests_for(stage_id);
        serde_json::from_str(&requests[call].input).unwrap()
    }

    fn keys(value: &Value) -> Vec<&str> {
        let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    fn weeks_six() -> Value {
        let mut value = k1_output();
        value["training_plan"]["weeks"] = json!(6);
        value
    }

    async fn run(orchestrator: &Orchestrator) -> Result<PipelineContext, crate::errors::PipelineError> {
        orchestrator.run(questionnaire(), &RunOptions::new()).await
    }

    #[tokio::test]
    async fn test_training_chain_runs_in_order() {
        let runtime = Arc::new(ScriptedAgentRuntime::new());
        let ctx = run(&training(&runtime)).await.unwrap();

        let order: Vec<&str> = ctx.results().iter().map(|r| r.stage_id.as_str()).collect();
        let expected = training_chain(&CoverageRules::default()).unwrap().stage_ids();
        assert_eq!(order, expected);
        assert!(ctx.results().iter().all(|r| r.valid && r.attempts == 1));

        let called: Vec<String> = runtime.requests().into_iter().map(|r| r.stage_id).collect();
        assert_eq!(called, expected);
    }

    #[tokio::test]
    async fn test_inputs_hold_only_declared_reads() {
        let runtime = Arc::new(ScriptedAgentRuntime::new());
        run(&training(&runtime)).await.unwrap();

        assert_eq!(
            keys(&input_of(&runtime, training_ids::CLIENT_PROFILE, 0)),
            vec!["questionnaire"]
        );
        assert_eq!(
            input_of(&runtime, training_ids::CLIENT_PROFILE, 0)["questionnaire"],
            questionnaire()
        );
        assert_eq!(
            keys(&input_of(&runtime, training_ids::CONSTRAINTS, 0)),
            vec![training_ids::CLIENT_PROFILE]
        );
        assert_eq!(
            keys(&input_of(&runtime, training_ids::SPLIT_DESIGN, 0)),
            vec![
                training_ids::CLIENT_PROFILE,
                training_ids::CONSTRAINTS,
                training_ids::OBJECTIVES
            ]
        );

        // upstream outputs arrive exactly as validated
        let plan_input = input_of(&runtime, training_ids::PROGRESSION, 0);
        assert_eq!(plan_input[training_ids::TRAINING_PLAN], k1_output());
    }

    #[tokio::test]
    async fn test_requests_carry_the_output_schema() {
        let runtime = Arc::new(ScriptedAgentRuntime::new());
        let orchestrator = training(&runtime);
        run(&orchestrator).await.unwrap();

        let request = &runtime.requests_for(training_ids::TRAINING_PLAN)[0];
        assert_eq!(request.code, "E5");
        assert_eq!(
            &request.output_schema,
            orchestrator
                .registry()
                .get_stage(training_ids::TRAINING_PLAN)
                .unwrap()
                .output_schema()
        );
        assert_eq!(request.output_schema["additionalProperties"], false);
    }

    #[tokio::test]
    async fn test_conforming_block_is_returned_field_for_field() {
        let runtime = Arc::new(ScriptedAgentRuntime::new().reply(training_ids::TRAINING_PLAN, k1_output()));
        let ctx = run(&training(&runtime)).await.unwrap();

        let result = ctx
            .results()
            .iter()
            .find(|r| r.stage_id == training_ids::TRAINING_PLAN)
            .unwrap();
        assert_eq!(result.output(), Some(&k1_output()));
        assert_eq!(result.raw_output, k1_output());
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_week_count_fails_after_retries() {
        let runtime = Arc::new(
            ScriptedAgentRuntime::new()
                .reply(training_ids::TRAINING_PLAN, weeks_six())
                .reply(training_ids::TRAINING_PLAN, weeks_six())
                .reply(training_ids::TRAINING_PLAN, weeks_six()),
        );
        let sink = Arc::new(CollectingEventSink::new());
        let orchestrator = training(&runtime).with_event_sink(sink.clone());

        let err = run(&orchestrator).await.unwrap_err();
        assert_eq!(err.failed_stage_id, training_ids::TRAINING_PLAN);
        assert_eq!(err.kind, ErrorKind::StructuralValidation);
        assert!(err.messages.iter().any(|m| m.starts_with("training_plan.weeks")));

        assert_eq!(runtime.call_count(training_ids::TRAINING_PLAN), 3);
        assert_eq!(runtime.call_count(training_ids::PROGRESSION), 0);
        assert_eq!(sink.events_of_type(event_types::STAGE_RETRYING).len(), 2);
        assert_eq!(
            sink.event_types().last().map(String::as_str),
            Some(event_types::PIPELINE_FAILED)
        );
    }

    #[tokio::test]
    async fn test_validation_retry_sends_feedback() {
        let runtime = Arc::new(
            ScriptedAgentRuntime::new()
                .reply(training_ids::TRAINING_PLAN, weeks_six())
                .reply(training_ids::TRAINING_PLAN, k1_output()),
        );
        let ctx = run(&training(&runtime)).await.unwrap();

        let first = input_of(&runtime, training_ids::TRAINING_PLAN, 0);
        assert!(first.get("retry_feedback").is_none());

        let second = input_of(&runtime, training_ids::TRAINING_PLAN, 1);
        assert_eq!(second["retry_feedback"]["attempt"], 1);
        let errors = second["retry_feedback"]["errors"].as_array().unwrap();
        assert!(errors[0].as_str().unwrap().contains("training_plan.weeks"));

        let result = ctx
            .results()
            .iter()
            .find(|r| r.stage_id == training_ids::TRAINING_PLAN)
            .unwrap();
        assert_eq!(result.attempts, 2);

        // the next stage reads clean input
        assert!(input_of(&runtime, training_ids::PROGRESSION, 0)
            .get("retry_feedback")
            .is_none());
    }

    #[tokio::test]
    async fn test_feedback_survives_a_failed_invocation() {
        let runtime = Arc::new(
            ScriptedAgentRuntime::new()
                .reply(training_ids::TRAINING_PLAN, weeks_six())
                .fail(
                    training_ids::TRAINING_PLAN,
                    RuntimeError::Transport("connection reset".to_string()),
                )
                .reply(training_ids::TRAINING_PLAN, k1_output()),
        );
        run(&training(&runtime)).await.unwrap();

        for call in 1..=2 {
            let input = input_of(&runtime, training_ids::TRAINING_PLAN, call);
            assert_eq!(input["retry_feedback"]["attempt"], 1, "call {call}");
            let errors = input["retry_feedback"]["errors"].as_array().unwrap();
            assert!(errors[0].as_str().unwrap().contains("training_plan.weeks"));
        }
        assert_eq!(runtime.call_count(training_ids::TRAINING_PLAN), 3);
    }

    #[tokio::test]
    async fn test_extra_keys_are_rejected() {
        let mut profile = stub_output(training_ids::CLIENT_PROFILE);
        profile["client_profile"]["favourite_colour"] = json!("azul");
        let runtime = Arc::new(ScriptedAgentRuntime::new().reply(training_ids::CLIENT_PROFILE, profile));
        let orchestrator =
            training(&runtime).with_retry_policy(fast_policy().with_max_validation_retries(0));

        let err = run(&orchestrator).await.unwrap_err();
        assert_eq!(err.failed_stage_id, training_ids::CLIENT_PROFILE);
        assert_eq!(err.kind, ErrorKind::StructuralValidation);
        assert_eq!(runtime.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_fixed_block_id_is_enforced() {
        let mut value = k1_output();
        value["training_plan"]["sessions"][1]["blocks"][0]["id"] = json!("A");
        let runtime = Arc::new(ScriptedAgentRuntime::new().reply(training_ids::TRAINING_PLAN, value));
        let orchestrator =
            training(&runtime).with_retry_policy(fast_policy().with_max_validation_retries(0));

        let err = run(&orchestrator).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::StructuralValidation);
        assert_eq!(
            err.messages,
            vec!["training_plan.sessions[1].blocks[0].id: must be exactly \"B\", found \"A\""]
        );
    }

    #[tokio::test]
    async fn test_raw_numbers_in_abstract_scales_are_semantic() {
        let mut value = k1_output();
        value["training_plan"]["sessions"][0]["blocks"][0]["exercises"][2]["series_abstracto"] =
            json!(4);
        let runtime = Arc::new(ScriptedAgentRuntime::new().reply(training_ids::TRAINING_PLAN, value));
        let orchestrator =
            training(&runtime).with_retry_policy(fast_policy().with_max_validation_retries(0));

        let err = run(&orchestrator).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::SemanticValidation);
        assert_eq!(err.messages.len(), 1);
        assert!(err.messages[0].starts_with(
            "training_plan.sessions[0].blocks[0].exercises[2].series_abstracto:"
        ));
    }

    #[tokio::test]
    async fn test_invocation_failures_retry_then_recover() {
        let runtime = Arc::new(
            ScriptedAgentRuntime::new()
                .fail(training_ids::OBJECTIVES, RuntimeError::Transport("reset".to_string()))
                .reply_text(training_ids::OBJECTIVES, "Lo siento, no puedo ayudar con eso."),
        );
        let ctx = run(&training(&runtime)).await.unwrap();

        let result = ctx
            .results()
            .iter()
            .find(|r| r.stage_id == training_ids::OBJECTIVES)
            .unwrap();
        assert_eq!(result.attempts, 3);
        assert_eq!(runtime.call_count(training_ids::OBJECTIVES), 3);
    }

    #[tokio::test]
    async fn test_invocation_failures_exhaust_budget() {
        let runtime = Arc::new(
            ScriptedAgentRuntime::new()
                .fail(
                    training_ids::CONSTRAINTS,
                    RuntimeError::Provider {
                        status: 500,
                        message: "internal stack trace".to_string(),
                    },
                )
                .fail(training_ids::CONSTRAINTS, RuntimeError::Transport("reset".to_string()))
                .fail(training_ids::CONSTRAINTS, RuntimeError::Transport("reset".to_string())),
        );
        let err = run(&training(&runtime)).await.unwrap_err();

        assert_eq!(err.failed_stage_id, training_ids::CONSTRAINTS);
        assert_eq!(err.kind, ErrorKind::InvocationFailure);
        assert_eq!(err.messages, vec!["agent runtime call failed"]);
        assert!(!err.to_response_body().to_string().contains("stack trace"));
        assert_eq!(runtime.call_count(training_ids::SPLIT_DESIGN), 0);
    }

    #[tokio::test]
    async fn test_slow_call_times_out_and_retries() {
        let runtime = Arc::new(ScriptedAgentRuntime::new().slow(
            training_ids::CLIENT_PROFILE,
            Duration::from_millis(500),
            stub_output(training_ids::CLIENT_PROFILE),
        ));
        let sink = Arc::new(CollectingEventSink::new());
        let orchestrator = training(&runtime)
            .with_stage_timeout(Duration::from_millis(50))
            .with_event_sink(sink.clone());

        let ctx = run(&orchestrator).await.unwrap();
        assert_eq!(ctx.results()[0].attempts, 2);

        let retrying = sink.events_of_type(event_types::STAGE_RETRYING);
        assert_eq!(retrying.len(), 1);
        let payload = retrying[0].1.as_ref().unwrap();
        assert_eq!(payload["kind"], "timeout");
        assert_eq!(payload["error"]["stage_id"], training_ids::CLIENT_PROFILE);
        assert!(payload["error"]["message"].as_str().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_cancel_during_agent_call() {
        let token = Arc::new(CancellationToken::new());
        let runtime = Arc::new(
            ScriptedAgentRuntime::new().cancel_on(training_ids::TRAINING_PLAN, token.clone()),
        );
        let sink = Arc::new(CollectingEventSink::new());
        let orchestrator = training(&runtime).with_event_sink(sink.clone());

        let err = orchestrator
            .run(questionnaire(), &RunOptions::new().with_cancellation(token))
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(err.failed_stage_id, training_ids::TRAINING_PLAN);
        assert_eq!(err.messages, vec!["cancelled during 'training-plan'"]);
        assert_eq!(runtime.call_count(training_ids::PROGRESSION), 0);

        let types = sink.event_types();
        assert_eq!(types.last().map(String::as_str), Some(event_types::PIPELINE_CANCELLED));
        assert!(!types.iter().any(|t| t == event_types::PIPELINE_COMPLETED));
    }

    #[tokio::test]
    async fn test_cancel_before_start_makes_no_calls() {
        let token = Arc::new(CancellationToken::new());
        token.cancel("client disconnected");
        let runtime = Arc::new(ScriptedAgentRuntime::new());

        let err = training(&runtime)
            .run(questionnaire(), &RunOptions::new().with_cancellation(token))
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Cancelled);
        assert_eq!(err.failed_stage_id, training_ids::CLIENT_PROFILE);
        assert_eq!(err.messages, vec!["client disconnected"]);
        assert!(runtime.requests().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_backoff() {
        let token = Arc::new(CancellationToken::new());
        let runtime = Arc::new(
            ScriptedAgentRuntime::new()
                .fail(training_ids::CLIENT_PROFILE, RuntimeError::Transport("reset".to_string())),
        );
        let orchestrator = training(&runtime).with_retry_policy(
            RetryPolicy::default()
                .with_base_delay_ms(5_000)
                .with_max_delay_ms(5_000)
                .with_jitter(JitterStrategy::None),
        );

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                token.cancel("shutdown");
            })
        };

        let started = std::time::Instant::now();
        let err = orchestrator
            .run(questionnaire(), &RunOptions::new().with_cancellation(token))
            .await
            .unwrap_err();
        canceller.await.unwrap();

        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(runtime.call_count(training_ids::CLIENT_PROFILE), 1);
    }

    #[tokio::test]
    async fn test_run_deadline() {
        let runtime = Arc::new(ScriptedAgentRuntime::new().with_delay(Duration::from_millis(100)));
        let orchestrator = training(&runtime);

        let err = orchestrator
            .run(
                questionnaire(),
                &RunOptions::new().with_deadline(Duration::from_millis(250)),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Timeout);
        assert_eq!(runtime.call_count(training_ids::TRAINING_PLAN), 0);
    }

    #[tokio::test]
    async fn test_event_sequence_of_a_clean_run() {
        let runtime = Arc::new(ScriptedAgentRuntime::new());
        let sink = Arc::new(CollectingEventSink::new());
        let ctx = run(&training(&runtime).with_event_sink(sink.clone()))
            .await
            .unwrap();

        let types = sink.event_types();
        assert_eq!(types.len(), 1 + 9 * 2 + 1);
        assert_eq!(types[0], event_types::PIPELINE_STARTED);
        assert_eq!(types[1], event_types::STAGE_STARTED);
        assert_eq!(types[2], event_types::STAGE_COMPLETED);
        assert_eq!(types[19], event_types::PIPELINE_COMPLETED);

        let run_id = ctx.run_id().to_string();
        assert_eq!(sink.events_for_run(&run_id).len(), types.len());

        let started = sink.events_of_type(event_types::STAGE_STARTED);
        assert_eq!(
            started[4].1.as_ref().unwrap()["stage_id"],
            json!(training_ids::TRAINING_PLAN)
        );
        assert_eq!(started[4].1.as_ref().unwrap()["code"], "E5");
    }

    #[tokio::test]
    async fn test_concurrent_runs_are_isolated() {
        let runtime = Arc::new(ScriptedAgentRuntime::new().with_delay(Duration::from_millis(5)));
        let orchestrator = training(&runtime);
        let options = RunOptions::new();

        let (a, b) = tokio::join!(
            orchestrator.run(json!({ "cliente": "a" }), &options),
            orchestrator.run(json!({ "cliente": "b" }), &options),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a.run_id(), b.run_id());
        assert_eq!(a.seed(), &json!({ "cliente": "a" }));
        assert_eq!(b.seed(), &json!({ "cliente": "b" }));
        assert_eq!(a.results().len(), 9);
        assert_eq!(b.results().len(), 9);

        let seeds: Vec<Value> = runtime
            .requests_for(training_ids::CLIENT_PROFILE)
            .iter()
            .map(|r| serde_json::from_str::<Value>(&r.input).unwrap()["questionnaire"].clone())
            .collect();
        assert!(seeds.contains(&json!({ "cliente": "a" })));
        assert!(seeds.contains(&json!({ "cliente": "b" })));
    }

    #[tokio::test]
    async fn test_nutrition_chain_with_fenced_text_replies() {
        let mut runtime = MockAgentRuntime::new();
        runtime.expect_call().times(9).returning(|request| {
            let body = stub_output(&request.stage_id);
            Ok(AgentReply::Text(format!(
                "Aqui tienes el resultado:\n```json\n{body}\n```\nSuerte!"
            )))
        });

        let registry = nutrition_chain().unwrap();
        let orchestrator = Orchestrator::new(Arc::new(registry), AgentInvoker::new(Arc::new(runtime)))
            .with_retry_policy(fast_policy());

        let ctx = orchestrator
            .run(json!("Peso 61 kg, mido 1,66. No como frutos secos."), &RunOptions::new())
            .await
            .unwrap();

        assert_eq!(ctx.results().len(), 9);
        assert_eq!(
            ctx.output("macro-targets"),
            Some(&stub_output("macro-targets"))
        );
    }
}
