use async_trait::async_trait;
use devwatch::{
    AlertStore, AlertStoreConfig, Availability, DeviceRegistry, DeviceReport, DeviceType,
    DevwatchError, FamilyOutcome, MessageFilter, ProbeAdapter, RegistryConfig, Result, Severity,
    Supervisor, SupervisorConfig,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn registry() -> Arc<DeviceRegistry> {
    Arc::new(DeviceRegistry::new(
        RegistryConfig::default(),
        Arc::new(AlertStore::with_defaults()),
    ))
}

fn supervisor(registry: Arc<DeviceRegistry>, adapters: Vec<Arc<dyn ProbeAdapter>>) -> Supervisor {
    Supervisor::new(
        SupervisorConfig {
            poll_interval: Duration::from_millis(50),
            probe_timeout: Duration::from_millis(100),
        },
        registry,
        adapters,
    )
}

/// Family whose vendor client is not installed
struct MissingLibrary(&'static str);

#[async_trait]
impl ProbeAdapter for MissingLibrary {
    fn family(&self) -> &str {
        self.0
    }

    fn availability(&self) -> Availability {
        Availability::Unavailable(format!("{} client library not installed", self.0))
    }

    async fn probe(&self) -> Result<Vec<DeviceReport>> {
        unreachable!("unavailable adapters are never probed")
    }
}

/// Family that panics while probing
struct Exploding;

#[async_trait]
impl ProbeAdapter for Exploding {
    fn family(&self) -> &str {
        "doorbell"
    }

    async fn probe(&self) -> Result<Vec<DeviceReport>> {
        panic!("doorbell SDK crashed");
    }
}

/// Family that returns an unexpected error
struct Broken;

#[async_trait]
impl ProbeAdapter for Broken {
    fn family(&self) -> &str {
        "light"
    }

    async fn probe(&self) -> Result<Vec<DeviceReport>> {
        Err(DevwatchError::ProbeFailed {
            family: "light".to_string(),
            reason: "malformed response".to_string(),
        })
    }
}

/// Family whose client acquisition depends on a slow subsystem
struct SlowAcquire {
    slow: AtomicBool,
}

#[async_trait]
impl ProbeAdapter for SlowAcquire {
    fn family(&self) -> &str {
        "weather"
    }

    async fn acquire(&self) -> Result<()> {
        if self.slow.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        Ok(())
    }

    async fn probe(&self) -> Result<Vec<DeviceReport>> {
        Ok(vec![DeviceReport::online(
            "weather_roof",
            DeviceType::Weather,
            "Roof Station",
        )
        .with_detail("temperature_c", 18.5)])
    }
}

struct Plugs;

#[async_trait]
impl ProbeAdapter for Plugs {
    fn family(&self) -> &str {
        "plug"
    }

    async fn probe(&self) -> Result<Vec<DeviceReport>> {
        Ok(vec![
            DeviceReport::online("plug_1", DeviceType::Plug, "Desk Lamp"),
            DeviceReport::online("plug_2", DeviceType::Plug, "Heater"),
        ])
    }
}

#[tokio::test]
async fn camera_lifecycle_scenario() {
    let registry = registry();
    let online = || DeviceReport::online("camera_1", DeviceType::Camera, "Camera 1");
    let offline =
        || DeviceReport::offline("camera_1", DeviceType::Camera, "Camera 1", "timeout");

    registry.update(online()).await;
    let summary = registry.summary().await;
    assert_eq!(summary.total_devices, 1);
    assert_eq!(summary.online, 1);

    let warning = registry.update(offline()).await.unwrap();
    assert_eq!(warning.severity, Severity::Warning);
    assert!(warning.description.contains("timeout"));
    assert_eq!(
        registry.get("camera_1").await.unwrap().consecutive_failures,
        1
    );

    assert!(registry.update(offline()).await.is_none());
    let alarm = registry.update(offline()).await.unwrap();
    assert_eq!(alarm.severity, Severity::Alarm);
    assert_eq!(alarm.details["error_count"], 3);

    let reconnected = registry.update(online()).await.unwrap();
    assert_eq!(reconnected.severity, Severity::Info);
    assert_eq!(reconnected.title, "Camera 1 Reconnected");
    assert_eq!(
        registry.get("camera_1").await.unwrap().consecutive_failures,
        0
    );

    let alerts = registry.alerts();
    let open_alarms = MessageFilter::default()
        .severity(Severity::Alarm)
        .acknowledged(false);
    let found = alerts.query(&open_alarms).await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, alarm.id);

    assert_eq!(alerts.acknowledge_all(Some(Severity::Alarm)).await, 1);
    assert!(alerts.query(&open_alarms).await.is_empty());
}

#[tokio::test]
async fn missing_dependencies_show_up_as_offline_devices() {
    let registry = registry();
    let adapters: Vec<Arc<dyn ProbeAdapter>> = vec![
        Arc::new(MissingLibrary("camera")),
        Arc::new(MissingLibrary("doorbell")),
        Arc::new(Plugs),
    ];
    let supervisor = supervisor(Arc::clone(&registry), adapters);

    let outcomes = supervisor.poll_once().await;
    assert_eq!(outcomes[0].1, FamilyOutcome::Unavailable);
    assert_eq!(outcomes[1].1, FamilyOutcome::Unavailable);
    assert_eq!(outcomes[2].1, FamilyOutcome::Probed { devices: 2 });

    let summary = registry.summary().await;
    assert_eq!(summary.total_devices, 4);
    assert_eq!(summary.offline, 2);
    assert_eq!(summary.health_percentage, 50.0);

    let offline_ids: Vec<String> = registry
        .offline()
        .await
        .into_iter()
        .map(|d| d.device_id)
        .collect();
    assert_eq!(offline_ids, vec!["system_camera", "system_doorbell"]);

    let camera = registry.get("system_camera").await.unwrap();
    assert!(camera
        .last_error
        .unwrap()
        .contains("client library not installed"));
    assert_eq!(camera.details["failure_reason"], "family_unavailable");
}

#[tokio::test]
async fn failing_families_do_not_affect_siblings() {
    let registry = registry();
    let adapters: Vec<Arc<dyn ProbeAdapter>> =
        vec![Arc::new(Exploding), Arc::new(Broken), Arc::new(Plugs)];
    let supervisor = supervisor(Arc::clone(&registry), adapters);

    let outcomes = supervisor.poll_once().await;
    assert!(matches!(outcomes[0].1, FamilyOutcome::Failed(_)));
    assert!(matches!(outcomes[1].1, FamilyOutcome::Failed(_)));
    assert_eq!(outcomes[2].1, FamilyOutcome::Probed { devices: 2 });

    // Unexpected failures skip the family rather than guessing a state
    assert!(registry.get("system_doorbell").await.is_none());
    assert!(registry.get("system_light").await.is_none());
    assert_eq!(registry.summary().await.online, 2);

    // The loop survives and keeps ticking
    let outcomes = supervisor.poll_once().await;
    assert_eq!(outcomes[2].1, FamilyOutcome::Probed { devices: 2 });
    let stats = supervisor.stats().await;
    assert_eq!(stats.ticks, 2);
    assert_eq!(stats.family_errors, 4);
}

#[tokio::test]
async fn family_recovers_after_acquisition_timeout() {
    let registry = registry();
    let weather = Arc::new(SlowAcquire {
        slow: AtomicBool::new(true),
    });
    let adapter: Arc<dyn ProbeAdapter> = weather.clone();
    let supervisor = supervisor(Arc::clone(&registry), vec![adapter]);

    let outcomes = supervisor.poll_once().await;
    assert_eq!(outcomes[0].1, FamilyOutcome::TimedOut);
    let synthetic = registry.get("system_weather").await.unwrap();
    assert!(!synthetic.connected);
    assert_eq!(synthetic.details["failure_reason"], "timeout");

    weather.slow.store(false, Ordering::SeqCst);
    let outcomes = supervisor.poll_once().await;
    assert_eq!(outcomes[0].1, FamilyOutcome::Probed { devices: 1 });

    assert!(registry.get("system_weather").await.unwrap().connected);
    let station = registry.get("weather_roof").await.unwrap();
    assert!(station.connected);
    assert_eq!(station.details["temperature_c"], 18.5);

    let reconnected = registry
        .alerts()
        .query(&MessageFilter::default().source("system_weather"))
        .await;
    assert_eq!(reconnected[0].title, "weather integration Reconnected");
}

#[tokio::test]
async fn background_loop_runs_until_stopped() {
    let registry = registry();
    let adapters: Vec<Arc<dyn ProbeAdapter>> = vec![Arc::new(Plugs)];
    let supervisor = supervisor(Arc::clone(&registry), adapters);

    supervisor.start().await;
    tokio::time::sleep(Duration::from_millis(180)).await;
    supervisor.stop().await;

    let ticks = supervisor.stats().await.ticks;
    assert!(ticks >= 2);
    assert_eq!(registry.summary().await.online, 2);

    // Discovery is reported once per device, not once per tick
    let discovered = registry
        .alerts()
        .query(&MessageFilter::default().severity(Severity::Info))
        .await;
    assert_eq!(discovered.len(), 2);

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(supervisor.stats().await.ticks, ticks);
}

#[tokio::test]
async fn alert_store_capacity_is_bounded() {
    let alerts = Arc::new(AlertStore::new(AlertStoreConfig {
        capacity: 5,
        ..Default::default()
    }));
    let registry = DeviceRegistry::with_defaults(Arc::clone(&alerts));

    for i in 0..6 {
        let id = format!("plug_{}", i);
        registry
            .update(DeviceReport::online(&id, DeviceType::Plug, &id))
            .await;
    }

    assert_eq!(alerts.len().await, 5);
    let sources: Vec<String> = alerts
        .query(&MessageFilter::default())
        .await
        .into_iter()
        .map(|m| m.source)
        .collect();
    assert_eq!(sources.first().map(String::as_str), Some("plug_5"));
    assert!(!sources.iter().any(|s| s == "plug_0"));
    assert_eq!(alerts.metrics().await.total_count, 6);
}
