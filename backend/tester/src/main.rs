use std::{
    process::ExitCode,
    time::{Duration, Instant},
};

use anyhow::{Context, Error};
use chrono::Utc;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use payloads::{
    QUESTION_COUNT, QUESTION_KEYS, TEST_SESSION_PREFIX, is_test_session,
    remote::{DEFAULT_API_URL, HeaderMap, StatusCode, SurveyClient},
    responses::{Analytics, ProgressiveEntry, ResponseEntry},
    submission::{Answers, CompleteSubmission, ProgressiveSubmission, Submission},
};
use serde_json::{Map, Value, json};
use uuid::Uuid;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const RESPONSE_BUDGET: Duration = Duration::from_secs(5);
const SMOKE_ORIGIN: &str = "https://tester.local";

const SAMPLE_ANSWERS: [&str; QUESTION_COUNT as usize] = [
    "sempre",
    "maioria",
    "engajado",
    "sim",
    "talvez",
    "recomendaria",
];

#[derive(Parser)]
#[command(name = "tester")]
#[command(about = "QA tool for the survey collection API", long_about = None)]
struct Cli {
    /// Base URL of the deployed API
    #[arg(long, global = true, env = "SURVEY_API_URL", default_value = DEFAULT_API_URL)]
    url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check the health endpoint
    Health,
    /// Run the API checks and print a pass/fail report
    Smoke,
    /// Post a full progressive session, one answer at a time
    Simulate {
        #[arg(long)]
        session: Option<String>,

        #[arg(long, default_value = "test_campaign")]
        campaign: String,
    },
    /// List records that belong to test sessions
    Preview,
    /// Delete test sessions from both collections
    Cleanup {
        /// Actually delete, otherwise only preview
        #[arg(long)]
        yes: bool,
    },
    /// Print completion and drop-off numbers
    Analytics,
}

struct Check {
    name: &'static str,
    outcome: Result<(), String>,
}

impl Check {
    fn new(name: &'static str, outcome: Result<(), String>) -> Self {
        Self { name, outcome }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Error> {
    let cli = Cli::parse();
    let client = SurveyClient::new(&cli.url, REQUEST_TIMEOUT)?;

    println!("Target: {}\n", cli.url);

    match cli.command {
        Command::Health => health(&client).await?,
        Command::Smoke => return smoke(&client).await,
        Command::Simulate { session, campaign } => {
            let session = session.unwrap_or_else(test_session_id);
            simulate(&client, &session, &campaign).await?;
        }
        Command::Preview => preview(&client).await?,
        Command::Cleanup { yes } => cleanup(&client, yes).await?,
        Command::Analytics => analytics(&client).await?,
    }

    Ok(ExitCode::SUCCESS)
}

async fn health(client: &SurveyClient) -> Result<(), Error> {
    let (status, body) = client.health().await?;

    println!("{status}: {body}");

    Ok(())
}

async fn smoke(client: &SurveyClient) -> Result<ExitCode, Error> {
    let mut checks = Vec::new();

    let outcome = match client.health().await {
        Ok((status, body)) if status.is_success() && body == "OK" => Ok(()),
        Ok((status, body)) => Err(format!("{status}: {body}")),
        Err(e) => Err(e.to_string()),
    };
    checks.push(Check::new("health returns OK", outcome));

    let session = test_session_id();
    let submission = sample_submission(&session);

    let started = Instant::now();
    let result = client.collect(&submission).await;
    let elapsed = started.elapsed();

    let accepted = match result {
        Ok((status, body)) if status.is_success() && body["ok"] == true => body["id"]
            .as_str()
            .filter(|id| !id.is_empty())
            .map(|_| ())
            .ok_or_else(|| format!("no id in {body}")),
        Ok((status, body)) => Err(format!("{status}: {body}")),
        Err(e) => Err(e.to_string()),
    };
    let timing = match &accepted {
        Ok(()) => within_budget(elapsed),
        Err(_) => Err("submission failed, nothing to time".to_string()),
    };
    checks.push(Check::new("complete submission is accepted", accepted));
    checks.push(Check::new("complete submission answers in time", timing));

    let partial = json!({"q1": "sempre", "q2": "maioria", "session_id": session});
    let outcome = match client.collect(&partial).await {
        Ok((status, body)) if status == StatusCode::BAD_REQUEST => {
            expect_missing(&body, &QUESTION_KEYS[2..])
        }
        Ok((status, body)) => Err(format!("expected 400, got {status}: {body}")),
        Err(e) => Err(e.to_string()),
    };
    checks.push(Check::new("partial submission lists missing answers", outcome));

    let outcome = match client.collect_from(&submission, Some(SMOKE_ORIGIN)).await {
        Ok((status, headers, _)) => cross_origin_accepted(status, &headers, SMOKE_ORIGIN),
        Err(e) => Err(e.to_string()),
    };
    checks.push(Check::new("submission with Origin is allowed", outcome));

    let outcome = match client.preflight(SMOKE_ORIGIN).await {
        Ok(response) => preflight_accepted(response.status(), response.headers(), SMOKE_ORIGIN),
        Err(e) => Err(e.to_string()),
    };
    checks.push(Check::new("preflight returns 204 with CORS headers", outcome));

    let failed = report(&checks);

    println!("\nSmoke session: {session}, remove it with `cleanup --yes`");

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn simulate(client: &SurveyClient, session: &str, campaign: &str) -> Result<(), Error> {
    let pb = ProgressBar::new(u64::from(QUESTION_COUNT));
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("=> "),
    );

    let mut all_answers = Map::new();

    for (question, answer) in (1..=QUESTION_COUNT).zip(SAMPLE_ANSWERS) {
        pb.set_message(format!("Question {question}"));

        all_answers.insert(format!("q{question}"), Value::from(answer));

        let mut submission = ProgressiveSubmission::new(session, question, answer);
        submission.tracking.campaign_id = Some(Value::from(campaign));
        submission.timestamp = Some(Utc::now().to_rfc3339());

        if question == QUESTION_COUNT {
            submission = submission.completing(all_answers.clone());
            submission.completion_timestamp = submission.timestamp.clone();
        }

        let (status, body) = client
            .collect(&Submission::Progressive(submission))
            .await
            .with_context(|| format!("Failed to post question {question}"))?;

        pb.println(format!("q{question}: {status} {body}"));
        pb.inc(1);
    }

    pb.finish_with_message("Done");

    println!("\nSession {session} submitted");

    Ok(())
}

async fn preview(client: &SurveyClient) -> Result<(), Error> {
    let responses = client.responses().await?;
    let progressive = client.progressive_responses().await?;

    let responses = test_responses(&responses.responses);
    let progressive = test_progressive(&progressive.responses);

    println!("Test responses: {}", responses.len());
    for entry in &responses {
        println!("  {} session={} ts={}", entry.id, entry.session_id, entry.timestamp);
    }

    println!("Test progressive responses: {}", progressive.len());
    for entry in &progressive {
        println!(
            "  {} session={} q{}={}",
            entry.id, entry.session_id, entry.question_number, entry.answer
        );
    }

    Ok(())
}

async fn cleanup(client: &SurveyClient, yes: bool) -> Result<(), Error> {
    preview(client).await?;

    if !yes {
        println!("\nNothing deleted, rerun with --yes to remove {TEST_SESSION_PREFIX}* sessions");
        return Ok(());
    }

    let report = client.cleanup_test_sessions().await?;

    println!(
        "\n{}: {} responses, {} progressive, {} total",
        report.message, report.deleted.responses, report.deleted.progressive, report.deleted.total
    );

    Ok(())
}

async fn analytics(client: &SurveyClient) -> Result<(), Error> {
    let report = client.analytics().await?;

    print!("{}", render_analytics(&report.analytics));

    Ok(())
}

fn test_session_id() -> String {
    format!("{TEST_SESSION_PREFIX}{}", Uuid::new_v4())
}

fn sample_submission(session: &str) -> Submission {
    let mut complete = CompleteSubmission::new(Answers::new(SAMPLE_ANSWERS.map(Value::from)));
    complete.session_id = Some(session.to_string());
    complete.tracking.campaign_id = Some(Value::from("test_campaign"));
    complete.completion_timestamp = Some(Utc::now().to_rfc3339());

    Submission::Complete(complete)
}

fn within_budget(elapsed: Duration) -> Result<(), String> {
    if elapsed <= RESPONSE_BUDGET {
        Ok(())
    } else {
        Err(format!("took {elapsed:?}, budget {RESPONSE_BUDGET:?}"))
    }
}

fn allows_origin(headers: &HeaderMap, origin: &str) -> Result<(), String> {
    let allowed = headers
        .get("access-control-allow-origin")
        .and_then(|value| value.to_str().ok());

    match allowed {
        Some(allowed) if allowed == origin || allowed == "*" => Ok(()),
        Some(allowed) => Err(format!("unexpected allow-origin '{allowed}'")),
        None => Err("missing allow-origin".to_string()),
    }
}

fn cross_origin_accepted(status: StatusCode, headers: &HeaderMap, origin: &str) -> Result<(), String> {
    if !status.is_success() {
        return Err(format!("expected 2xx, got {status}"));
    }

    allows_origin(headers, origin)
}

fn preflight_accepted(status: StatusCode, headers: &HeaderMap, origin: &str) -> Result<(), String> {
    if status != StatusCode::NO_CONTENT {
        return Err(format!("expected 204, got {status}"));
    }

    allows_origin(headers, origin)?;

    if !headers.contains_key("access-control-allow-methods") {
        return Err("missing allow-methods".to_string());
    }

    Ok(())
}

fn expect_missing(body: &Value, expected: &[&str]) -> Result<(), String> {
    let missing: Vec<&str> = body["missing"]
        .as_array()
        .map(|keys| keys.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    if missing == expected {
        Ok(())
    } else {
        Err(format!("expected missing {expected:?}, got {missing:?}"))
    }
}

fn session_of(value: &Value) -> bool {
    value.as_str().is_some_and(is_test_session)
}

fn test_responses(entries: &[ResponseEntry]) -> Vec<&ResponseEntry> {
    entries.iter().filter(|e| session_of(&e.session_id)).collect()
}

fn test_progressive(entries: &[ProgressiveEntry]) -> Vec<&ProgressiveEntry> {
    entries.iter().filter(|e| session_of(&e.session_id)).collect()
}

/// Prints one line per check and returns the number of failures.
fn report(checks: &[Check]) -> usize {
    println!("Results:");

    for check in checks {
        match &check.outcome {
            Ok(()) => println!("  PASS {}", check.name),
            Err(reason) => println!("  FAIL {}: {reason}", check.name),
        }
    }

    let failed = checks.iter().filter(|c| c.outcome.is_err()).count();
    println!("\n{} passed, {failed} failed", checks.len() - failed);

    failed
}

fn render_analytics(analytics: &Analytics) -> String {
    let mut out = format!(
        "Sessions: {} ({} completed, {:.2}%)\n\nDrop-off:\n",
        analytics.total_sessions, analytics.completed_sessions, analytics.completion_rate
    );

    for (question, drop_off) in &analytics.drop_off_by_question {
        out.push_str(&format!(
            "  q{question}: {} answered, {:.1}% dropped\n",
            drop_off.answered, drop_off.drop_off_rate
        ));
    }

    out.push_str("\nAnswers:\n");
    for (question, stats) in &analytics.question_statistics {
        let answers: Vec<String> = stats
            .answers
            .iter()
            .map(|(answer, count)| format!("{answer}={count}"))
            .collect();

        out.push_str(&format!("  q{question} ({}): {}\n", stats.total, answers.join(", ")));
    }

    out
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use payloads::responses::{DropOff, QuestionStats};

    use super::*;

    #[test]
    fn test_session_ids_are_test_sessions() {
        let session = test_session_id();

        assert!(is_test_session(&session));
        assert_ne!(session, test_session_id());
    }

    #[test]
    fn test_sample_submission_is_complete() {
        let value = serde_json::to_value(sample_submission("test_x")).unwrap();

        for key in QUESTION_KEYS {
            assert!(value[key].is_string(), "{key} should be answered");
        }
        assert_eq!(value["session_id"], "test_x");
        assert_eq!(value["is_complete"], true);
    }

    #[test]
    fn test_expect_missing() {
        let body = json!({"ok": false, "error": "missing_answers", "missing": ["q3", "q4", "q5", "q6"]});

        assert!(expect_missing(&body, &QUESTION_KEYS[2..]).is_ok());
        assert!(expect_missing(&body, &QUESTION_KEYS[3..]).is_err());
        assert!(expect_missing(&json!({}), &QUESTION_KEYS[2..]).is_err());
    }

    fn cors_headers(origin: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("access-control-allow-origin", origin.parse().unwrap());
        headers.insert(
            "access-control-allow-methods",
            "GET, POST, DELETE, OPTIONS".parse().unwrap(),
        );
        headers
    }

    #[test]
    fn test_cross_origin_accepted() {
        let origin = "https://tester.local";

        assert!(cross_origin_accepted(StatusCode::OK, &cors_headers(origin), origin).is_ok());
        assert!(cross_origin_accepted(StatusCode::OK, &cors_headers("*"), origin).is_ok());

        assert!(
            cross_origin_accepted(StatusCode::INTERNAL_SERVER_ERROR, &cors_headers(origin), origin)
                .is_err()
        );
        assert!(
            cross_origin_accepted(StatusCode::OK, &cors_headers("https://other.example"), origin)
                .is_err()
        );
        assert!(cross_origin_accepted(StatusCode::OK, &HeaderMap::new(), origin).is_err());
    }

    #[test]
    fn test_preflight_accepted() {
        let origin = "https://tester.local";

        assert!(preflight_accepted(StatusCode::NO_CONTENT, &cors_headers(origin), origin).is_ok());
        assert!(preflight_accepted(StatusCode::OK, &cors_headers(origin), origin).is_err());

        let mut headers = cors_headers(origin);
        headers.remove("access-control-allow-methods");
        assert!(preflight_accepted(StatusCode::NO_CONTENT, &headers, origin).is_err());
    }

    #[test]
    fn test_budget() {
        assert!(within_budget(Duration::from_millis(200)).is_ok());
        assert!(within_budget(Duration::from_secs(6)).is_err());
    }

    #[test]
    fn test_report_counts_failures() {
        let checks = [
            Check::new("a", Ok(())),
            Check::new("b", Err("nope".into())),
            Check::new("c", Err("nope".into())),
        ];

        assert_eq!(report(&checks), 2);
    }

    #[test]
    fn test_render_analytics() {
        let analytics = Analytics {
            total_sessions: 2,
            completed_sessions: 1,
            completion_rate: 50.0,
            drop_off_by_question: BTreeMap::from([(
                1,
                DropOff {
                    answered: 2,
                    drop_off_rate: 0.0,
                },
            )]),
            question_statistics: BTreeMap::from([(
                "1".to_string(),
                QuestionStats {
                    total: 2,
                    answers: BTreeMap::from([("nunca".to_string(), 1), ("sempre".to_string(), 1)]),
                },
            )]),
        };

        let out = render_analytics(&analytics);

        assert!(out.contains("Sessions: 2 (1 completed, 50.00%)"));
        assert!(out.contains("q1: 2 answered, 0.0% dropped"));
        assert!(out.contains("q1 (2): nunca=1, sempre=1"));
    }
}
