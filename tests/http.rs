use once_cell::sync::Lazy;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordResponse {
    data: Record,
    is_loaded: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Record {
    first_opened_date: Option<i64>,
    last_relapse_date: Option<i64>,
    relapse_history: Vec<serde_json::Value>,
    trigger_history: Vec<TriggerEntry>,
    play_later_videos: Vec<String>,
    day_statuses: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TriggerEntry {
    timestamp: i64,
    action_completed: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResponse {
    streak_days: u32,
    time_since_relapse: Option<String>,
}

struct TestServer {
    base_url: String,
    child: Child,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static TEST_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));

#[cfg(unix)]
mod cleanup {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Once;

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn unique_data_dir() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("quit_tracker_http_{}_{}", std::process::id(), nanos));
    path.to_string_lossy().to_string()
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/api/record")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server() -> TestServer {
    let port = pick_free_port();
    let data_dir = unique_data_dir();
    let child = Command::new(env!("CARGO_BIN_EXE_quit_tracker"))
        .env("PORT", port.to_string())
        .env("APP_DATA_PATH", data_dir)
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer { base_url, child }
}

async fn shared_server() -> Arc<TestServer> {
    let mut guard = SERVER.lock().await;
    if let Some(server) = guard.as_ref() {
        return Arc::clone(server);
    }
    let server = Arc::new(spawn_server().await);
    *guard = Some(Arc::clone(&server));
    server
}

async fn fetch_record(client: &Client, base_url: &str) -> RecordResponse {
    client
        .get(format!("{base_url}/api/record"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

async fn fetch_summary(client: &Client, base_url: &str) -> SummaryResponse {
    client
        .get(format!("{base_url}/api/summary"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn http_record_is_loaded_with_first_opened_date() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let record = fetch_record(&client, &server.base_url).await;
    assert!(record.is_loaded);
    assert!(record.data.first_opened_date.is_some());
}

#[tokio::test]
async fn http_relapse_marks_today_and_resets_streak() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let before = fetch_record(&client, &server.base_url).await;

    let response = client
        .post(format!("{}/api/relapse", server.base_url))
        .json(&serde_json::json!({ "lie": "just one", "change": "delete the app" }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let after: RecordResponse = response.json().await.unwrap();

    assert_eq!(
        after.data.relapse_history.len(),
        before.data.relapse_history.len() + 1
    );
    assert!(after.data.last_relapse_date.is_some());
    assert!(after.data.day_statuses.values().any(|status| status == "slip"));

    let summary = fetch_summary(&client, &server.base_url).await;
    assert_eq!(summary.streak_days, 0);
    assert!(summary.time_since_relapse.is_some());
}

#[tokio::test]
async fn http_play_later_double_toggle_is_unchanged() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let before = fetch_record(&client, &server.base_url).await;
    for _ in 0..2 {
        let response = client
            .post(format!("{}/api/play-later", server.base_url))
            .json(&serde_json::json!({ "videoId": "focus-video" }))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
    }
    let after = fetch_record(&client, &server.base_url).await;
    assert_eq!(after.data.play_later_videos, before.data.play_later_videos);
}

#[tokio::test]
async fn http_trigger_can_be_logged_and_deleted() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let logged: RecordResponse = client
        .post(format!("{}/api/trigger", server.base_url))
        .json(&serde_json::json!({ "triggers": ["stress"], "actionCompleted": "called a friend" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let entry = logged
        .data
        .trigger_history
        .iter()
        .find(|entry| entry.action_completed == "called a friend")
        .expect("missing trigger entry");

    let response = client
        .delete(format!("{}/api/trigger/{}", server.base_url, entry.timestamp))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let after: RecordResponse = response.json().await.unwrap();
    assert_eq!(
        after.data.trigger_history.len(),
        logged.data.trigger_history.len() - 1
    );
}

#[tokio::test]
async fn http_invalid_day_status_is_rejected() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let response = client
        .put(format!("{}/api/day-status", server.base_url))
        .json(&serde_json::json!({ "date": "not-a-day", "status": "good" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let response = client
        .post(format!("{}/api/day-status/toggle", server.base_url))
        .json(&serde_json::json!({ "date": "1999-01-01" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let response = client
        .get(format!("{}/api/calendar?year=2026&month=13", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn http_play_later_keeps_video_id_verbatim() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    for video_id in [" padded-id", "padded-id"] {
        let response = client
            .post(format!("{}/api/play-later", server.base_url))
            .json(&serde_json::json!({ "videoId": video_id }))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
    }
    let record = fetch_record(&client, &server.base_url).await;
    assert!(record.data.play_later_videos.contains(&" padded-id".to_string()));
    assert!(record.data.play_later_videos.contains(&"padded-id".to_string()));

    let response = client
        .post(format!("{}/api/play-later", server.base_url))
        .json(&serde_json::json!({ "videoId": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn http_relapse_entry_can_be_deleted() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let logged: RecordResponse = client
        .post(format!("{}/api/relapse", server.base_url))
        .json(&serde_json::json!({ "lie": "nobody will know" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let timestamp = logged
        .data
        .relapse_history
        .last()
        .and_then(|entry| entry["timestamp"].as_i64())
        .expect("missing relapse entry");

    let response = client
        .delete(format!("{}/api/relapse/{timestamp}", server.base_url))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let after: RecordResponse = response.json().await.unwrap();
    assert_eq!(
        after.data.relapse_history.len(),
        logged.data.relapse_history.len() - 1
    );
    assert!(after
        .data
        .relapse_history
        .iter()
        .all(|entry| entry["timestamp"].as_i64() != Some(timestamp)));
}

#[tokio::test]
async fn http_calendar_lists_every_day_of_the_month() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let response = client
        .get(format!("{}/api/calendar?year=2024&month=2", server.base_url))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let month: serde_json::Value = response.json().await.unwrap();
    assert_eq!(month["year"], 2024);
    assert_eq!(month["month"], 2);
    let days = month["days"].as_array().expect("days array");
    assert_eq!(days.len(), 29);
    assert_eq!(days[0]["date"], "2024-02-01");
    assert!(days.iter().all(|day| day["status"].is_null()));
}

#[tokio::test]
async fn http_reflections_are_newest_first() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let response = client
        .post(format!("{}/api/trigger", server.base_url))
        .json(&serde_json::json!({ "triggers": ["craving"], "actionCompleted": "drank water" }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let response = client
        .get(format!("{}/api/reflections", server.base_url))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let items: Vec<serde_json::Value> = response.json().await.unwrap();
    assert!(!items.is_empty());
    assert_eq!(items[0]["type"], "action");
    assert_eq!(items[0]["actionCompleted"], "drank water");
    let stamps: Vec<i64> = items
        .iter()
        .map(|item| item["timestamp"].as_i64().unwrap())
        .collect();
    assert!(stamps.windows(2).all(|pair| pair[0] >= pair[1]));
}
