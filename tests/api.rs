mod common;

use common::TestCluster;
use reqwest::StatusCode;
use serde_json::{Value, json};

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

async fn create_team(cluster: &TestCluster, team_name: &str, members: &[(&str, bool)]) {
    let members: Vec<Value> = members
        .iter()
        .map(|(id, active)| {
            json!({ "user_id": id, "username": id.to_uppercase(), "is_active": active })
        })
        .collect();

    let resp = client()
        .post(format!("{}/api/team/create", cluster.gateway_url))
        .header("X-Username", members[0]["user_id"].as_str().unwrap())
        .json(&json!({ "team_name": team_name, "members": members }))
        .send()
        .await
        .expect("create team");
    assert_eq!(resp.status(), StatusCode::CREATED);
}

async fn init_repo(
    cluster: &TestCluster,
    username: &str,
    team_name: &str,
    repo_name: &str,
    commit_name: &str,
    code: &[u8],
) -> Value {
    let form = reqwest::multipart::Form::new()
        .text("team_name", team_name.to_string())
        .text("repo_name", repo_name.to_string())
        .text("commit_name", commit_name.to_string())
        .part(
            "code",
            reqwest::multipart::Part::bytes(code.to_vec()).file_name("code.zip"),
        );

    let resp = client()
        .post(format!("{}/api/repo/init", cluster.gateway_url))
        .header("X-Username", username)
        .multipart(form)
        .send()
        .await
        .expect("init repo");
    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.expect("parse init response")
}

async fn push(
    cluster: &TestCluster,
    username: &str,
    team_name: &str,
    repo_name: &str,
    parent: &str,
    commit_name: &str,
    code: &[u8],
) -> Value {
    let form = reqwest::multipart::Form::new()
        .text("team_name", team_name.to_string())
        .text("repo_name", repo_name.to_string())
        .text("parent_commit_name", parent.to_string())
        .text("commit_name", commit_name.to_string())
        .part(
            "code",
            reqwest::multipart::Part::bytes(code.to_vec()).file_name("code.zip"),
        );

    let resp = client()
        .post(format!("{}/api/repo/push", cluster.gateway_url))
        .header("X-Username", username)
        .multipart(form)
        .send()
        .await
        .expect("push");
    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.expect("parse push response")
}

async fn create_pr(
    cluster: &TestCluster,
    username: &str,
    team_name: &str,
    pr_name: &str,
    repo_name: &str,
    source: &str,
    target: &str,
) -> Value {
    let resp = client()
        .post(format!("{}/api/pr/create", cluster.gateway_url))
        .header("X-Username", username)
        .json(&json!({
            "team_name": team_name,
            "pr_name": pr_name,
            "repo_name": repo_name,
            "source_commit": source,
            "target_commit": target,
        }))
        .send()
        .await
        .expect("create pr");
    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.expect("parse pr response")
}

async fn checkout(
    cluster: &TestCluster,
    username: &str,
    team_name: &str,
    repo_name: &str,
    commit_name: &str,
) -> reqwest::Response {
    client()
        .get(format!("{}/api/repo/checkout", cluster.gateway_url))
        .header("X-Username", username)
        .query(&[
            ("team_name", team_name),
            ("repo_name", repo_name),
            ("commit_name", commit_name),
        ])
        .send()
        .await
        .expect("checkout")
}

fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or("")
}

#[tokio::test]
async fn team_lifecycle_and_profile() {
    let cluster = TestCluster::start(1).await;
    create_team(&cluster, "alpha", &[("u1", true), ("u2", true)]).await;

    // Duplicate team names are rejected with the stable code.
    let resp = client()
        .post(format!("{}/api/team/create", cluster.gateway_url))
        .header("X-Username", "u1")
        .json(&json!({
            "team_name": "alpha",
            "members": [{ "user_id": "u9", "username": "U9", "is_active": true }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(error_code(&body), "TEAM_EXISTS");

    let resp = client()
        .get(format!("{}/api/team/get", cluster.gateway_url))
        .header("X-Username", "u1")
        .query(&[("team_name", "alpha")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["team"]["team_name"], "alpha");
    assert_eq!(body["team"]["members"].as_array().unwrap().len(), 2);

    let resp = client()
        .get(format!("{}/api/me", cluster.gateway_url))
        .header("X-Username", "u2")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["user"]["user_id"], "u2");
    assert_eq!(body["user"]["team_name"], "alpha");

    let resp = client()
        .get(format!("{}/api/me", cluster.gateway_url))
        .header("X-Username", "ghost")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(error_code(&body), "USER_NOT_FOUND");

    // Every /api endpoint requires the username header.
    let resp = client()
        .get(format!("{}/api/me", cluster.gateway_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn repo_init_push_checkout_round_trip() {
    let cluster = TestCluster::start(1).await;
    create_team(&cluster, "alpha", &[("u1", true), ("u2", true)]).await;

    let body = init_repo(&cluster, "u1", "alpha", "svc", "main", b"Z0").await;
    let commit = &body["commit"];
    assert_eq!(commit["commit_id"], commit["root_commit"]);
    assert_eq!(commit["parent_commit_ids"].as_array().unwrap().len(), 0);
    assert_eq!(commit["commit_name"], "main");
    let root_id = commit["commit_id"].as_str().unwrap().to_string();

    // Branch twice off main; both children carry main's commit as parent.
    let feat = push(&cluster, "u1", "alpha", "svc", "main", "feat", b"Z1").await;
    let fix = push(&cluster, "u1", "alpha", "svc", "main", "fix", b"Z2").await;
    for child in [&feat, &fix] {
        let parents = child["commit"]["parent_commit_ids"].as_array().unwrap();
        assert_eq!(parents.len(), 1);
        assert_eq!(parents[0].as_str().unwrap(), root_id);
    }

    let resp = checkout(&cluster, "u1", "alpha", "svc", "feat").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()["content-type"].to_str().unwrap(),
        "application/zip"
    );
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"Z1");

    // The repository name addresses the root commit.
    let resp = checkout(&cluster, "u1", "alpha", "svc", "svc").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"Z0");

    let resp = checkout(&cluster, "u1", "alpha", "svc", "ghost").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(error_code(&body), "COMMIT_NOT_FOUND");
}

#[tokio::test]
async fn repo_access_is_team_scoped() {
    let cluster = TestCluster::start(1).await;
    create_team(&cluster, "alpha", &[("u1", true), ("u2", true)]).await;
    create_team(&cluster, "beta", &[("b1", true)]).await;
    init_repo(&cluster, "u1", "alpha", "svc", "main", b"Z0").await;

    // A member of another team is denied.
    let resp = checkout(&cluster, "b1", "alpha", "svc", "main").await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(error_code(&body), "ACCESS_DENIED");

    // The team endpoints are team-scoped too: no peeking at another team's
    // roster, and no deactivating a team the caller is not a member of.
    let resp = client()
        .get(format!("{}/api/team/get", cluster.gateway_url))
        .header("X-Username", "b1")
        .query(&[("team_name", "alpha")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(error_code(&body), "ACCESS_DENIED");

    let resp = client()
        .post(format!("{}/api/team/deactivateUsers", cluster.gateway_url))
        .header("X-Username", "b1")
        .json(&json!({ "team_name": "alpha" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(error_code(&body), "ACCESS_DENIED");

    // Nobody in alpha was deactivated by the denied request.
    let resp = client()
        .get(format!("{}/users/get", cluster.allocation_url))
        .query(&[("user_id", "u2")])
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["user"]["is_active"], true);

    // An inactive member is rejected before team checks.
    let resp = client()
        .post(format!("{}/users/setIsActive", cluster.allocation_url))
        .json(&json!({ "user_id": "u2", "is_active": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = checkout(&cluster, "u2", "alpha", "svc", "main").await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(error_code(&body), "USER_INACTIVE");
}

#[tokio::test]
async fn pr_allocation_assigns_the_only_candidate() {
    let cluster = TestCluster::start(1).await;
    create_team(&cluster, "alpha", &[("u1", true), ("u2", true)]).await;
    init_repo(&cluster, "u1", "alpha", "svc", "main", b"Z0").await;
    push(&cluster, "u1", "alpha", "svc", "main", "feat", b"Z1").await;

    let body = create_pr(&cluster, "u1", "alpha", "pr-x", "svc", "feat", "main").await;
    let pr = &body["pull_request"];
    assert_eq!(pr["status"], "OPEN");
    assert_eq!(pr["author_id"], "u1");
    assert_eq!(pr["assigned_reviewers"], json!(["u2"]));
    assert_eq!(pr["repo_name"], "svc");
    assert_eq!(pr["source_commit_name"], "feat");
    assert_eq!(pr["target_commit_name"], "main");
    assert!(pr["pr_id"].as_str().unwrap().starts_with("pr-"));

    // The assigned reviewer sees it in their review queue.
    let resp = client()
        .get(format!("{}/api/pr/reviews", cluster.gateway_url))
        .header("X-Username", "u2")
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let reviews = body["pull_requests"].as_array().unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0]["pr_name"], "pr-x");

    // The author sees it under /my; the reviewer does not.
    let resp = client()
        .get(format!("{}/api/pr/my", cluster.gateway_url))
        .header("X-Username", "u1")
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["pull_requests"].as_array().unwrap().len(), 1);

    let resp = client()
        .get(format!("{}/api/pr/my", cluster.gateway_url))
        .header("X-Username", "u2")
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["pull_requests"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn approve_and_merge_sequences_both_backends() {
    let cluster = TestCluster::start(1).await;
    create_team(&cluster, "alpha", &[("u1", true), ("u2", true)]).await;
    init_repo(&cluster, "u1", "alpha", "svc", "main", b"Z0").await;
    let feat = push(&cluster, "u1", "alpha", "svc", "main", "feat", b"Z1").await;
    let body = create_pr(&cluster, "u1", "alpha", "pr-x", "svc", "feat", "main").await;
    let pr_id = body["pull_request"]["pr_id"].as_str().unwrap().to_string();

    // A non-reviewer (the author) cannot approve.
    let resp = client()
        .post(format!("{}/api/pr/approve", cluster.gateway_url))
        .header("X-Username", "u1")
        .query(&[("team_name", "alpha"), ("pr_name", "pr-x")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let error: Value = resp.json().await.unwrap();
    assert_eq!(error_code(&error), "NOT_REVIEWER");

    // The sole reviewer approves: gate closes, DAG merge lands, PR flips.
    let resp = client()
        .post(format!("{}/api/pr/approve", cluster.gateway_url))
        .header("X-Username", "u2")
        .query(&[("team_name", "alpha"), ("pr_name", "pr-x")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["pull_request"]["status"], "MERGED");
    assert_eq!(body["pull_request"]["approved_by"], json!(["u2"]));
    assert!(body["pull_request"]["merged_at"].is_string());

    let merge_commit = &body["merge_commit"];
    let parents = merge_commit["parent_commit_ids"].as_array().unwrap();
    assert_eq!(parents.len(), 2);
    assert_eq!(
        parents[0].as_str().unwrap(),
        feat["commit"]["commit_id"].as_str().unwrap()
    );

    // First-parent semantics: the merge commit's code is the source's.
    let resp = client()
        .get(format!("{}/storage/checkout", cluster.storage_url))
        .query(&[
            ("team_id", merge_commit["team_id"].as_str().unwrap()),
            ("root_commit", merge_commit["root_commit"].as_str().unwrap()),
            ("commit_id", merge_commit["commit_id"].as_str().unwrap()),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"Z1");

    // The PR's code endpoint serves the source blob.
    let resp = client()
        .get(format!("{}/api/pr/code", cluster.gateway_url))
        .header("X-Username", "u2")
        .query(&[("team_name", "alpha"), ("pr_name", "pr-x")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"Z1");

    // Allocation-side merge is idempotent: the recorded merged_at persists.
    let resp = client()
        .post(format!("{}/pullRequest/merge", cluster.allocation_url))
        .json(&json!({ "pull_request_id": pr_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["pr"]["status"], "MERGED");
}

#[tokio::test]
async fn reject_is_terminal_for_approval() {
    let cluster = TestCluster::start(1).await;
    create_team(&cluster, "alpha", &[("u1", true), ("u2", true)]).await;
    init_repo(&cluster, "u1", "alpha", "svc", "main", b"Z0").await;
    push(&cluster, "u1", "alpha", "svc", "main", "feat", b"Z1").await;
    create_pr(&cluster, "u1", "alpha", "pr-y", "svc", "feat", "main").await;

    let resp = client()
        .post(format!("{}/api/pr/reject", cluster.gateway_url))
        .header("X-Username", "u2")
        .query(&[("team_name", "alpha"), ("pr_name", "pr-y")])
        .json(&json!({ "reason": "needs work" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["pull_request"]["status"], "REJECTED");

    let resp = client()
        .post(format!("{}/api/pr/approve", cluster.gateway_url))
        .header("X-Username", "u2")
        .query(&[("team_name", "alpha"), ("pr_name", "pr-y")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(error_code(&body), "PR_NOT_OPEN");

    let resp = client()
        .post(format!("{}/api/pr/approve", cluster.gateway_url))
        .header("X-Username", "u2")
        .query(&[("team_name", "alpha"), ("pr_name", "missing")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(error_code(&body), "PR_NOT_FOUND");
}

#[tokio::test]
async fn bulk_deactivation_empties_reviewer_list_and_gate() {
    let cluster = TestCluster::start(1).await;
    create_team(&cluster, "alpha", &[("u1", true), ("u2", true)]).await;
    init_repo(&cluster, "u1", "alpha", "svc", "main", b"Z0").await;
    push(&cluster, "u1", "alpha", "svc", "main", "feat", b"Z1").await;
    let body = create_pr(&cluster, "u1", "alpha", "pr-x", "svc", "feat", "main").await;
    let pr_id = body["pull_request"]["pr_id"].as_str().unwrap().to_string();

    let resp = client()
        .post(format!("{}/api/team/deactivateUsers", cluster.gateway_url))
        .header("X-Username", "u1")
        .json(&json!({ "team_name": "alpha" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let report: Value = resp.json().await.unwrap();
    assert_eq!(report["deactivated_count"], 2);
    let reassigned = report["reassigned_prs"].as_array().unwrap();
    assert_eq!(reassigned.len(), 1);
    assert_eq!(reassigned[0]["old_reviewers"], json!(["u2"]));
    assert_eq!(reassigned[0]["new_reviewers"], json!([]));

    let resp = client()
        .get(format!("{}/users/get", cluster.allocation_url))
        .query(&[("user_id", "u2")])
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["user"]["is_active"], false);

    // Emergent semantics: the emptied reviewer set trivially passes the
    // allocation merge gate.
    let resp = client()
        .post(format!("{}/pullRequest/merge", cluster.allocation_url))
        .json(&json!({ "pull_request_id": pr_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["pr"]["status"], "MERGED");
}

#[tokio::test]
async fn two_reviewer_profile_requires_both_approvals() {
    let cluster = TestCluster::start(2).await;
    create_team(
        &cluster,
        "alpha",
        &[("u1", true), ("u2", true), ("u3", true)],
    )
    .await;
    init_repo(&cluster, "u1", "alpha", "svc", "main", b"Z0").await;
    push(&cluster, "u1", "alpha", "svc", "main", "feat", b"Z1").await;

    let body = create_pr(&cluster, "u1", "alpha", "pr-x", "svc", "feat", "main").await;
    let reviewers: Vec<String> = body["pull_request"]["assigned_reviewers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert_eq!(reviewers.len(), 2);
    assert!(!reviewers.contains(&"u1".to_string()));

    // First approval leaves the PR open with no merge commit.
    let resp = client()
        .post(format!("{}/api/pr/approve", cluster.gateway_url))
        .header("X-Username", &reviewers[0])
        .query(&[("team_name", "alpha"), ("pr_name", "pr-x")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["pull_request"]["status"], "OPEN");
    assert!(body["merge_commit"].is_null());

    // Second approval closes the gate.
    let resp = client()
        .post(format!("{}/api/pr/approve", cluster.gateway_url))
        .header("X-Username", &reviewers[1])
        .query(&[("team_name", "alpha"), ("pr_name", "pr-x")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["pull_request"]["status"], "MERGED");
    assert!(body["merge_commit"]["commit_id"].is_string());
}
