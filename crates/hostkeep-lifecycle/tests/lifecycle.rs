use std::sync::Arc;
use std::time::{Duration, Instant};

use hostkeep_exec::{ExecError, ExecOptions, Reply, ScriptedConnector};
use hostkeep_facts::{Facts, OsFamily, ServiceInfo};
use hostkeep_lifecycle::*;

const ACTIVE_TASK: &str =
    "ctr: cannot delete a non stopped container: failed precondition: has active task";

fn engine(connector: &Arc<ScriptedConnector>) -> Engine {
    Engine::new(connector.clone())
}

#[tokio::test]
async fn test_remove_busy_container_stops_then_retries_once() {
    let connector = Arc::new(
        ScriptedConnector::new("ubuntu")
            .on("ctr -n k8s.io container rm c1", Reply::fail(1, ACTIVE_TASK))
            .on("ctr -n k8s.io container rm c1", Reply::ok(""))
            .on("ctr -n k8s.io task kill --signal SIGTERM c1", Reply::ok(""))
            .on("ctr -n k8s.io task kill --signal SIGKILL c1", Reply::ok("")),
    );
    let client = ContainerdClient::new(engine(&connector));

    client.remove_container("c1").await.unwrap();

    assert_eq!(
        connector.commands(),
        vec![
            "ctr -n k8s.io container rm c1",
            "ctr -n k8s.io task kill --signal SIGTERM c1",
            "ctr -n k8s.io task kill --signal SIGKILL c1",
            "ctr -n k8s.io container rm c1",
        ]
    );
}

#[tokio::test]
async fn test_remove_retry_failure_is_surfaced() {
    let connector = Arc::new(
        ScriptedConnector::new("ubuntu")
            .on("ctr -n k8s.io container rm c1", Reply::fail(1, ACTIVE_TASK))
            .on("ctr -n k8s.io container rm c1", Reply::fail(1, "permission denied"))
            .on("ctr -n k8s.io task kill --signal SIGTERM c1", Reply::ok(""))
            .on("ctr -n k8s.io task kill --signal SIGKILL c1", Reply::ok("")),
    );
    let client = ContainerdClient::new(engine(&connector));

    let err = client.remove_container("c1").await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::RemoveRetry));
    assert!(err.failure().unwrap().stderr.contains("permission denied"));
    assert_eq!(connector.count("ctr -n k8s.io container rm c1"), 2);
}

#[tokio::test]
async fn test_remove_retries_even_when_stop_fails() {
    let connector = Arc::new(
        ScriptedConnector::new("ubuntu")
            .on("ctr -n k8s.io container rm c1", Reply::fail(1, ACTIVE_TASK))
            .on("ctr -n k8s.io container rm c1", Reply::ok(""))
            .on("ctr -n k8s.io task kill --signal SIGTERM c1", Reply::fail(1, "boom"))
            .on("ctr -n k8s.io task kill --signal SIGKILL c1", Reply::fail(1, "boom")),
    );
    let client = ContainerdClient::new(engine(&connector));

    assert!(client.remove_container("c1").await.is_ok());
    assert_eq!(connector.count("ctr -n k8s.io container rm c1"), 2);
}

#[tokio::test]
async fn test_graceful_success_and_forceful_noop_is_success() {
    let connector = Arc::new(
        ScriptedConnector::new("ubuntu")
            .on("ctr -n k8s.io task kill --signal SIGTERM c1", Reply::ok(""))
            .on(
                "ctr -n k8s.io task kill --signal SIGKILL c1",
                Reply::fail(1, "ctr: no such process"),
            ),
    );
    let client = ContainerdClient::new(engine(&connector));

    client.stop_container("c1", Duration::ZERO).await.unwrap();
}

#[tokio::test]
async fn test_forceful_failure_after_absent_task_is_an_error() {
    let connector = Arc::new(
        ScriptedConnector::new("ubuntu")
            .on(
                "ctr -n k8s.io task kill --signal SIGTERM c1",
                Reply::fail(1, "ctr: task c1 not found"),
            )
            .on(
                "ctr -n k8s.io task kill --signal SIGKILL c1",
                Reply::fail(1, "permission denied"),
            ),
    );
    let client = ContainerdClient::new(engine(&connector));

    let err = client.stop_container("c1", Duration::ZERO).await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::ForcefulStop));
    assert!(err.failure().unwrap().stderr.contains("permission denied"));
}

#[tokio::test]
async fn test_graceful_failure_then_forceful_success_is_success() {
    let connector = Arc::new(
        ScriptedConnector::new("ubuntu")
            .on("crictl stop c1", Reply::fail(1, "boom"))
            .on("crictl stop --timeout 0 c1", Reply::ok("")),
    );
    let client = CriClient::new(engine(&connector));

    client.stop_container("c1", Duration::ZERO).await.unwrap();

    assert_eq!(
        connector.commands(),
        vec!["crictl stop c1", "crictl stop --timeout 0 c1"]
    );
}

#[tokio::test]
async fn test_graceful_failure_then_forceful_noop_is_success() {
    let connector = Arc::new(
        ScriptedConnector::new("ubuntu")
            .on("crictl stop c1", Reply::fail(1, "boom"))
            .on(
                "crictl stop --timeout 0 c1",
                Reply::fail(1, "rpc error: code = NotFound desc = container c1"),
            ),
    );
    let client = CriClient::new(engine(&connector));

    assert!(client.stop_container("c1", Duration::ZERO).await.is_ok());
}

#[tokio::test]
async fn test_both_stop_stages_fatal_reports_forceful_first() {
    let connector = Arc::new(
        ScriptedConnector::new("ubuntu")
            .on("crictl stop c1", Reply::fail(1, "connection refused"))
            .on("crictl stop --timeout 0 c1", Reply::fail(1, "deadline exceeded")),
    );
    let client = CriClient::new(engine(&connector));

    let err = client.stop_container("c1", Duration::ZERO).await.unwrap_err();

    let LifecycleError::Stop {
        forceful, graceful, ..
    } = &err
    else {
        panic!("expected stop error, got {err}");
    };
    assert!(forceful.stderr.contains("deadline exceeded"));
    assert!(graceful.stderr.contains("connection refused"));
    assert!(err.to_string().starts_with("forceful stop of container c1 failed"));
}

#[tokio::test]
async fn test_grace_period_waits_after_graceful_success() {
    let connector = Arc::new(
        ScriptedConnector::new("ubuntu")
            .on("ctr -n k8s.io task kill --signal SIGTERM c1", Reply::ok(""))
            .on("ctr -n k8s.io task kill --signal SIGKILL c1", Reply::ok("")),
    );
    let client = ContainerdClient::new(engine(&connector));
    let started = Instant::now();

    client
        .stop_container("c1", Duration::from_millis(200))
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_millis(200));
}

#[tokio::test]
async fn test_repeated_operations_on_absent_targets_are_noops() {
    let connector = Arc::new(
        ScriptedConnector::new("ubuntu")
            .on(
                "crictl stopp p1",
                Reply::fail(1, "could not find sandbox \"p1\""),
            )
            .on(
                "crictl rmp p1",
                Reply::fail(1, "rpc error: code = NotFound desc = sandbox p1"),
            )
            .on("crictl rmi nginx:1.27", Reply::fail(1, "image nginx:1.27 not found")),
    );
    let client = CriClient::new(engine(&connector));

    for _ in 0..2 {
        client.stop_pod("p1").await.unwrap();
        client.remove_pod("p1").await.unwrap();
        client.remove_image("nginx:1.27").await.unwrap();
    }
    assert_eq!(connector.count("crictl rmp p1"), 2);
}

#[tokio::test]
async fn test_stop_pod_failure_names_graceful_stage() {
    let connector = Arc::new(
        ScriptedConnector::new("ubuntu").on("crictl stopp p1", Reply::fail(1, "runtime down")),
    );
    let client = CriClient::new(engine(&connector));

    let err = client.stop_pod("p1").await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::GracefulStop));
}

#[tokio::test]
async fn test_input_errors_come_before_remote_calls() {
    let connector = Arc::new(ScriptedConnector::new("ubuntu"));
    let client = ContainerdClient::new(engine(&connector));

    let err = client.start_container("").await.unwrap_err();
    assert!(matches!(err, LifecycleError::InvalidInput(_)));

    let offline = Arc::new(ScriptedConnector::new("ubuntu").disconnected());
    let err = CriClient::new(engine(&offline))
        .remove_container("c1")
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::NotConnected));

    assert!(connector.commands().is_empty());
    assert!(offline.commands().is_empty());
}

#[tokio::test]
async fn test_transport_timeout_is_fatal() {
    let connector = Arc::new(ScriptedConnector::new("ubuntu").on(
        "crictl start c1",
        Reply::ok("").after(Duration::from_secs(5)),
    ));
    let engine = engine(&connector).with_options(
        ExecOptions::new()
            .with_sudo(true)
            .with_timeout(Duration::from_millis(50)),
    );

    let err = CriClient::new(engine).start_container("c1").await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Start));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_systemd_service_state_uses_exit_status() {
    let connector = Arc::new(
        ScriptedConnector::new("ubuntu")
            .on("systemctl is-active --quiet kubelet", Reply::ok(""))
            .on("systemctl is-active --quiet etcd", Reply::fail(3, ""))
            .on("systemctl is-enabled --quiet kubelet", Reply::ok("")),
    );
    let services = ServiceManager::new(engine(&connector), ServiceInfo::systemd());

    assert!(services.is_active("kubelet").await.unwrap());
    assert!(!services.is_active("etcd").await.unwrap());
    assert!(services.is_enabled("kubelet").await.unwrap());
}

#[tokio::test]
async fn test_sysvinit_service_state_needs_keywords() {
    let connector = Arc::new(
        ScriptedConnector::new("centos")
            .on("service crond status", Reply::ok("crond (pid 812) is running..."))
            .on("service ntpd status", Reply::ok("ntpd is stopped"))
            .on(
                "chkconfig --list crond",
                Reply::ok("crond  0:off 1:off 2:on 3:on 4:on 5:on 6:off"),
            )
            .on(
                "chkconfig --list ntpd",
                Reply::ok("ntpd  0:off 1:off 2:off 3:off 4:off 5:off 6:off"),
            ),
    );
    let services = ServiceManager::new(engine(&connector), ServiceInfo::sysvinit(&OsFamily::RedHat));

    assert!(services.is_active("crond").await.unwrap());
    assert!(!services.is_active("ntpd").await.unwrap());
    assert!(services.is_enabled("crond").await.unwrap());
    assert!(!services.is_enabled("ntpd").await.unwrap());
}

#[tokio::test]
async fn test_service_stop_escalates_to_kill() {
    let connector = Arc::new(
        ScriptedConnector::new("ubuntu")
            .on("systemctl stop kubelet", Reply::ok(""))
            .on(
                "systemctl kill --signal=SIGKILL kubelet",
                Reply::fail(1, "Failed to kill unit kubelet.service: No main process to kill"),
            )
            .on("systemctl daemon-reload", Reply::ok("")),
    );
    let services = ServiceManager::new(engine(&connector), ServiceInfo::systemd());

    services.stop("kubelet", Duration::ZERO).await.unwrap();
    services.daemon_reload().await.unwrap();

    assert_eq!(
        connector.commands(),
        vec![
            "systemctl stop kubelet",
            "systemctl kill --signal=SIGKILL kubelet",
            "systemctl daemon-reload",
        ]
    );
}

#[tokio::test]
async fn test_daemon_reload_failure_names_init_system() {
    let connector = Arc::new(
        ScriptedConnector::new("ubuntu")
            .on("systemctl daemon-reload", Reply::fail(1, "Access denied")),
    );
    let services = ServiceManager::new(engine(&connector), ServiceInfo::systemd());

    let err = services.daemon_reload().await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::DaemonReload));
    assert!(
        err.to_string()
            .starts_with("daemon reload of init system systemd failed")
    );
}

#[tokio::test]
async fn test_service_status_rejects_bad_input_before_querying() {
    let connector = Arc::new(ScriptedConnector::new("ubuntu"));
    let services = ServiceManager::new(engine(&connector), ServiceInfo::systemd());

    let err = services.is_active("  ").await.unwrap_err();
    assert!(matches!(err, LifecycleError::InvalidInput(_)));

    let offline = Arc::new(ScriptedConnector::new("ubuntu").disconnected());
    let services = ServiceManager::new(engine(&offline), ServiceInfo::systemd());
    let err = services.is_enabled("kubelet").await.unwrap_err();
    assert!(matches!(err, LifecycleError::NotConnected));

    assert!(connector.commands().is_empty());
}

#[tokio::test]
async fn test_sysvinit_daemon_reload_is_a_noop() {
    let connector = Arc::new(ScriptedConnector::new("debian"));
    let services = ServiceManager::new(engine(&connector), ServiceInfo::sysvinit(&OsFamily::Debian));

    services.daemon_reload().await.unwrap();

    assert!(connector.commands().is_empty());
}

#[tokio::test]
async fn test_service_manager_requires_init_system() {
    let connector: Arc<ScriptedConnector> = Arc::new(ScriptedConnector::new("darwin"));
    let facts = Facts::new(hostkeep_exec::OsInfo::new("darwin"));

    let err = ServiceManager::from_facts(connector, &facts).unwrap_err();

    assert!(matches!(err, LifecycleError::NoInitSystem));
}

#[tokio::test]
async fn test_enable_failure_names_stage() {
    let connector = Arc::new(ScriptedConnector::new("debian").on(
        "update-rc.d kubelet defaults",
        Reply::error(ExecError::IoError("broken pipe".into())),
    ));
    let services = ServiceManager::new(engine(&connector), ServiceInfo::sysvinit(&OsFamily::Debian));

    let err = services.enable("kubelet").await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Enable));
    assert!(err.to_string().starts_with("enable of service kubelet failed"));
}

#[tokio::test]
async fn test_set_toml_value_writes_only_on_change() {
    let path = "/etc/containerd/config.toml";
    let connector = ScriptedConnector::new("ubuntu").with_file(
        path,
        "version = 2\n\n[plugins.cri]\n  sandbox_image = \"pause:3.8\"\n",
    );

    let first = set_toml_value(&connector, path, "plugins.cri", "sandbox_image", "\"pause:3.9\"")
        .await
        .unwrap();
    let second = set_toml_value(&connector, path, "plugins.cri", "sandbox_image", "\"pause:3.9\"")
        .await
        .unwrap();

    assert_eq!(first, PatchOutcome::Updated);
    assert_eq!(second, PatchOutcome::Unchanged);
    assert_eq!(
        String::from_utf8(connector.file(path).unwrap()).unwrap(),
        "version = 2\n\n[plugins.cri]\n  sandbox_image = \"pause:3.9\"\n"
    );
}

#[tokio::test]
async fn test_set_toml_value_creates_missing_file() {
    let connector = ScriptedConnector::new("ubuntu");

    let outcome = set_toml_value(&connector, "/etc/hostkeep/extra.toml", "agent", "debug", "true")
        .await
        .unwrap();

    assert_eq!(outcome, PatchOutcome::Updated);
    assert_eq!(
        connector.file("/etc/hostkeep/extra.toml").unwrap(),
        b"[agent]\ndebug = true\n"
    );
}
